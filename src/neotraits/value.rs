//! Dynamic attribute values exchanged between entities and accessors

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::{ArrayData, HasTraits, SparseMatrix};
use crate::error::{H5Error, Result};

/// The value of one typed attribute
#[derive(Clone)]
pub enum Value {
    /// Absent optional value
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Gid(Uuid),
    Array(ArrayData),
    Sparse(SparseMatrix),
    Json(serde_json::Value),
    /// A related entity, persisted only by its gid
    Entity(Arc<dyn HasTraits>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Gid(_) => "uuid",
            Value::Array(_) => "array",
            Value::Sparse(_) => "sparse matrix",
            Value::Json(_) => "json",
            Value::Entity(_) => "entity",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    fn mismatch(self, field: &str, expected: &str) -> H5Error {
        H5Error::validation(field, format!("expected {}, got {}", expected, self.type_name()))
    }

    pub fn into_string(self, field: &str) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch(field, "str")),
        }
    }

    pub fn into_i64(self, field: &str) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(i),
            other => Err(other.mismatch(field, "int")),
        }
    }

    pub fn into_f64(self, field: &str) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(other.mismatch(field, "float")),
        }
    }

    pub fn into_bool(self, field: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch(field, "bool")),
        }
    }

    pub fn into_gid(self, field: &str) -> Result<Uuid> {
        match self {
            Value::Gid(g) => Ok(g),
            Value::Entity(e) => Ok(e.gid()),
            other => Err(other.mismatch(field, "uuid")),
        }
    }

    pub fn into_array(self, field: &str) -> Result<ArrayData> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.mismatch(field, "array")),
        }
    }

    pub fn into_sparse(self, field: &str) -> Result<SparseMatrix> {
        match self {
            Value::Sparse(m) => Ok(m),
            other => Err(other.mismatch(field, "sparse matrix")),
        }
    }

    pub fn into_json(self, field: &str) -> Result<serde_json::Value> {
        match self {
            Value::Json(j) => Ok(j),
            other => Err(other.mismatch(field, "json")),
        }
    }

    /// `None` for [`Value::None`], otherwise the converted value
    pub fn into_option<T>(self, convert: impl FnOnce(Value) -> Result<T>) -> Result<Option<T>> {
        match self {
            Value::None => Ok(None),
            other => convert(other).map(Some),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Gid(g) => write!(f, "Gid({})", g),
            Value::Array(a) => write!(f, "Array({:?}, shape={:?})", a.dtype(), a.shape()),
            Value::Sparse(m) => write!(f, "Sparse(shape={:?}, nnz={})", m.shape(), m.nnz()),
            Value::Json(j) => write!(f, "Json({})", j),
            Value::Entity(e) => write!(f, "Entity({}, gid={})", e.type_name(), e.gid()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Gid(a), Value::Gid(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Sparse(a), Value::Sparse(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.gid() == b.gid(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Gid(v)
    }
}

impl From<ArrayData> for Value {
    fn from(v: ArrayData) -> Self {
        Value::Array(v)
    }
}

impl From<SparseMatrix> for Value {
    fn from(v: SparseMatrix) -> Self {
        Value::Sparse(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::None)
    }
}
