//! Spatial equations
//!
//! Equations are inlined into the owning datatype's file as JSON text.

use serde::{Deserialize, Serialize};

use crate::error::{H5Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters")]
pub enum Equation {
    Gaussian {
        amp: f64,
        sigma: f64,
        midpoint: f64,
        offset: f64,
    },
    DoubleGaussian {
        amp_1: f64,
        std_1: f64,
        midpoint_1: f64,
        amp_2: f64,
        std_2: f64,
        midpoint_2: f64,
    },
    Sigmoid {
        amp: f64,
        radius: f64,
        sigma: f64,
        offset: f64,
    },
    Linear {
        a: f64,
        b: f64,
    },
}

impl Default for Equation {
    fn default() -> Self {
        Equation::Gaussian {
            amp: 1.0,
            sigma: 1.0,
            midpoint: 0.0,
            offset: 0.0,
        }
    }
}

impl Equation {
    pub fn name(&self) -> &'static str {
        match self {
            Equation::Gaussian { .. } => "Gaussian",
            Equation::DoubleGaussian { .. } => "DoubleGaussian",
            Equation::Sigmoid { .. } => "Sigmoid",
            Equation::Linear { .. } => "Linear",
        }
    }

    /// JSON form of the equation. Non-finite parameters have no JSON
    /// representation and are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let json = serde_json::to_value(self)?;
        if let Some(parameters) = json.get("parameters").and_then(|p| p.as_object()) {
            // serde_json writes NaN and infinities as null
            if let Some((name, _)) = parameters.iter().find(|(_, v)| v.is_null()) {
                return Err(H5Error::validation(
                    "equation",
                    format!("{} parameter {} is not finite", self.name(), name),
                ));
            }
        }
        Ok(json)
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }
}
