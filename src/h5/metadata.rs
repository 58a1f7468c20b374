//! Cached dataset summaries
//!
//! Viewers read global bounds (e.g. for color scales) from the sidecar
//! metadata instead of scanning large, expanding arrays.

use crate::neotraits::ArrayData;
use crate::storage::{MetaValue, Metadata};

pub const MINIMUM_KEY: &str = "Minimum";
pub const MAXIMUM_KEY: &str = "Maximum";

/// Global min/max of a stored array. Both are `None` for non-numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataSetMetaData {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DataSetMetaData {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn from_array(array: &ArrayData) -> Self {
        match array.bounds() {
            Some((min, max)) => Self::new(Some(min), Some(max)),
            None => Self::default(),
        }
    }

    /// Read from a sidecar map. Absent keys read as `None`.
    pub fn from_dict(dict: &Metadata) -> Self {
        Self {
            min: dict.get(MINIMUM_KEY).and_then(MetaValue::as_f64),
            max: dict.get(MAXIMUM_KEY).and_then(MetaValue::as_f64),
        }
    }

    /// Sidecar entries; `None` bounds are omitted
    pub fn to_dict(&self) -> Metadata {
        let mut dict = Metadata::new();
        if let Some(min) = self.min {
            dict.insert(MINIMUM_KEY.to_string(), MetaValue::Float(min));
        }
        if let Some(max) = self.max {
            dict.insert(MAXIMUM_KEY.to_string(), MetaValue::Float(max));
        }
        dict
    }

    /// Pairwise min/max with `other`. A `None` bound defers to the other side.
    pub fn merge(&mut self, other: &DataSetMetaData) {
        self.min = pick(self.min, other.min, f64::min);
        self.max = pick(self.max, other.max, f64::max);
    }
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}
