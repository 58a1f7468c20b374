//! Scalar codecs
//!
//! A codec attached to a [`Scalar`](super::Scalar) accessor turns a structured
//! field value into one metadata entry and back, so fields like an inlined
//! equation still flow through the generic store/load iteration.

use std::fmt;

use crate::error::{H5Error, Result};
use crate::neotraits::Value;
use crate::storage::MetaValue;

pub trait Codec: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, field: &str, value: &Value) -> Result<MetaValue>;

    fn decode(&self, field: &str, raw: MetaValue) -> Result<Value>;
}

/// Stores a [`Value::Json`] as its compact JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, _field: &str, value: &Value) -> Result<MetaValue> {
        match value {
            Value::Json(json) => Ok(MetaValue::Str(serde_json::to_string(json)?)),
            other => Err(H5Error::Type {
                expected: "json",
                got: other.type_name().to_string(),
            }),
        }
    }

    fn decode(&self, field: &str, raw: MetaValue) -> Result<Value> {
        match raw {
            MetaValue::Str(text) => Ok(Value::Json(serde_json::from_str(&text)?)),
            other => Err(H5Error::validation(
                field,
                format!("expected JSON text, found {:?}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec() {
        let value = Value::Json(json!({"type": "Gaussian", "parameters": {"sigma": 1.0}}));
        let raw = JsonCodec.encode("equation", &value).unwrap();
        assert!(raw.as_str().unwrap().contains("Gaussian"));
        assert_eq!(JsonCodec.decode("equation", raw).unwrap(), value);

        assert!(JsonCodec.encode("equation", &Value::Int(1)).is_err());
        assert!(JsonCodec.decode("equation", MetaValue::Int(1)).is_err());
        assert!(JsonCodec.decode("equation", MetaValue::from("{not json")).is_err());
    }
}
