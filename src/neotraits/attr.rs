//! Typed attribute declarations
//!
//! An [`Attr`] describes one field of a domain entity: its name, semantic
//! kind, whether it is required, and the coercions applied on assignment.
//! Declarations live in `lazy_static` blocks next to the entity type and are
//! shared read-only by every accessor bound to them.

use std::fmt;

use super::{ArrayData, DType, Value};
use crate::error::{H5Error, Result};

/// Semantic type of an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrKind {
    Str,
    Int,
    Float,
    Bool,
    Gid,
    /// N-dimensional array, optionally constrained in element type and rank
    Array { dtype: Option<DType>, ndim: Option<usize> },
    Sparse,
    /// Identity of another entity of the named type
    Reference { target: &'static str },
    Json,
}

#[derive(Debug, Clone)]
pub struct Attr {
    field_name: Option<&'static str>,
    kind: AttrKind,
    required: bool,
    default: Option<Value>,
    choices: Option<Vec<&'static str>>,
    doc: &'static str,
}

impl Attr {
    /// An attribute not bound to any entity field. Accessors over it need an explicit name.
    pub fn new(kind: AttrKind) -> Self {
        Self {
            field_name: None,
            kind,
            required: true,
            default: None,
            choices: None,
            doc: "",
        }
    }

    /// An attribute bound to the entity field `name`
    pub fn field(name: &'static str, kind: AttrKind) -> Self {
        Self {
            field_name: Some(name),
            ..Self::new(kind)
        }
    }

    pub fn array(name: &'static str, dtype: DType, ndim: usize) -> Self {
        Self::field(
            name,
            AttrKind::Array {
                dtype: Some(dtype),
                ndim: Some(ndim),
            },
        )
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_choices(mut self, choices: &[&'static str]) -> Self {
        self.choices = Some(choices.to_vec());
        self
    }

    pub fn with_doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn field_name(&self) -> Option<&'static str> {
        self.field_name
    }

    pub fn kind(&self) -> &AttrKind {
        &self.kind
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }

    /// Check `value` against this declaration and return the coerced value.
    ///
    /// An absent value becomes the default when one is declared; otherwise it
    /// is accepted only for optional attributes.
    pub fn validate(&self, value: Value) -> Result<Value> {
        let field = self.field_name.unwrap_or("<independent>");

        if value.is_none() {
            if let Some(default) = &self.default {
                return Ok(default.clone());
            }
            if self.required {
                return Err(H5Error::validation(field, "is required but no value was given"));
            }
            return Ok(Value::None);
        }

        let reject = |value: &Value| {
            H5Error::validation(
                field,
                format!("expected {:?}, got {}", self.kind, value.type_name()),
            )
        };

        match (&self.kind, value) {
            (AttrKind::Str, Value::Str(s)) => {
                if let Some(choices) = &self.choices {
                    if !choices.iter().any(|c| *c == s) {
                        return Err(H5Error::validation(
                            field,
                            format!("{:?} is not one of {:?}", s, choices),
                        ));
                    }
                }
                Ok(Value::Str(s))
            }
            (AttrKind::Int, v @ Value::Int(_)) => Ok(v),
            (AttrKind::Float, v @ Value::Float(_)) => Ok(v),
            (AttrKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (AttrKind::Bool, v @ Value::Bool(_)) => Ok(v),
            (AttrKind::Gid, v @ Value::Gid(_)) => Ok(v),
            (AttrKind::Array { dtype, ndim }, Value::Array(a)) => {
                if let Some(n) = ndim {
                    if a.ndim() != *n {
                        return Err(H5Error::validation(
                            field,
                            format!("expected a {}-d array, got shape {:?}", n, a.shape()),
                        ));
                    }
                }
                match (dtype, a) {
                    (Some(DType::Float), ArrayData::Int(i)) => {
                        Ok(Value::Array(ArrayData::Float(i.mapv(|v| v as f64))))
                    }
                    (Some(expected), a) if a.dtype() != *expected => Err(H5Error::validation(
                        field,
                        format!("expected {:?} elements, got {:?}", expected, a.dtype()),
                    )),
                    (_, a) => Ok(Value::Array(a)),
                }
            }
            (AttrKind::Sparse, v @ Value::Sparse(_)) => Ok(v),
            (AttrKind::Reference { .. }, v @ (Value::Gid(_) | Value::Entity(_))) => Ok(v),
            (AttrKind::Json, v @ Value::Json(_)) => Ok(v),
            (_, other) => Err(reject(&other)),
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field_name {
            Some(name) => write!(f, "Attr({}: {:?})", name, self.kind),
            None => write!(f, "Attr({:?})", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_required_and_optional_absent_values() {
        let required = Attr::field("title", AttrKind::Str);
        assert!(required.validate(Value::None).is_err());

        let optional = Attr::field("title", AttrKind::Str).optional();
        assert_eq!(optional.validate(Value::None).unwrap(), Value::None);

        let defaulted = Attr::field("unit", AttrKind::Str).with_default("ms");
        assert_eq!(defaulted.validate(Value::None).unwrap(), Value::from("ms"));
    }

    #[test]
    fn test_float_accepts_int() {
        let attr = Attr::field("cutoff", AttrKind::Float);
        assert_eq!(attr.validate(Value::Int(4)).unwrap(), Value::Float(4.0));
        assert!(attr.validate(Value::from("4")).is_err());
    }

    #[test]
    fn test_choices() {
        let attr = Attr::field("unit", AttrKind::Str).with_choices(&["ms", "s"]);
        assert!(attr.validate(Value::from("ms")).is_ok());
        assert!(attr.validate(Value::from("h")).is_err());
    }

    #[test]
    fn test_array_rank_and_dtype() {
        let attr = Attr::array("weights", DType::Float, 2);
        let ints: ArrayData = array![[1i64, 2], [3, 4]].into();
        let coerced = attr.validate(Value::Array(ints)).unwrap();
        assert_eq!(coerced, Value::Array(array![[1.0, 2.0], [3.0, 4.0]].into()));

        let flat: ArrayData = array![1.0, 2.0].into();
        assert!(attr.validate(Value::Array(flat)).is_err());

        let labels = Attr::array("labels", DType::Text, 1);
        let floats: ArrayData = array![1.0].into();
        assert!(labels.validate(Value::Array(floats)).is_err());
    }
}
