//! Storage Manager
//!
//! The capability interface the H5 layer persists through: a root metadata
//! map plus named N-dimensional datasets, each with its own sidecar metadata.
//!
//! Implementations:
//! 1. [`ContainerStorage`]: one zstd-compressed bincode container per path,
//!    opened lazily and written back on `close_file`.
//! 2. [`MemoryStorage`]: the same model kept in RAM, for tests and scratch use.

pub mod container;
pub mod file;
pub mod memory;

pub use container::Container;
pub use file::ContainerStorage;
pub use memory::MemoryStorage;

use std::collections::BTreeMap;

use ndarray::Slice;
use serde::{Deserialize, Serialize};

use crate::error::{H5Error, Result};
use crate::neotraits::{ArrayData, Value};

/// A primitive metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Key-value metadata attached to the container root or to one dataset
pub type Metadata = BTreeMap<String, MetaValue>;

impl MetaValue {
    /// Convert a scalar [`Value`]; anything non-primitive is rejected
    pub fn from_value(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(MetaValue::Bool(*b)),
            Value::Int(i) => Ok(MetaValue::Int(*i)),
            Value::Float(f) => Ok(MetaValue::Float(*f)),
            Value::Str(s) => Ok(MetaValue::Str(s.clone())),
            other => Err(H5Error::validation(
                field,
                format!("a {} cannot be stored as scalar metadata", other.type_name()),
            )),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<MetaValue> for Value {
    fn from(m: MetaValue) -> Self {
        match m {
            MetaValue::Bool(b) => Value::Bool(b),
            MetaValue::Int(i) => Value::Int(i),
            MetaValue::Float(f) => Value::Float(f),
            MetaValue::Str(s) => Value::Str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<f64> for MetaValue {
    fn from(f: f64) -> Self {
        MetaValue::Float(f)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

/// Driver over one hierarchical container
///
/// Methods take `&mut self` because implementations may open the underlying
/// container lazily and release it on [`close_file`](StorageManager::close_file).
pub trait StorageManager: Send {
    /// Root metadata when `dataset_name` is `None`, else that dataset's sidecar map
    fn get_metadata(&mut self, dataset_name: Option<&str>) -> Result<Metadata>;

    /// Merge `meta` into the root map or a dataset's sidecar map
    fn set_metadata(&mut self, meta: Metadata, dataset_name: Option<&str>) -> Result<()>;

    /// Create or overwrite a dataset
    fn store_data(&mut self, name: &str, data: &ArrayData) -> Result<()>;

    /// The whole dataset, or the sub-array selected by `slice`
    fn get_data(&mut self, name: &str, slice: Option<&[Slice]>) -> Result<ArrayData>;

    /// Grow a dataset along `grow_dimension`, creating it if absent
    fn append_data(
        &mut self,
        name: &str,
        data: &ArrayData,
        grow_dimension: isize,
        close_file: bool,
    ) -> Result<()>;

    fn get_data_shape(&mut self, name: &str) -> Result<Vec<usize>>;

    fn dataset_names(&mut self) -> Result<Vec<String>>;

    fn has_dataset(&mut self, name: &str) -> Result<bool> {
        Ok(self.dataset_names()?.iter().any(|n| n == name))
    }

    /// Flush pending changes and release the container
    fn close_file(&mut self) -> Result<()>;
}
