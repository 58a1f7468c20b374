//! Typed attributes and the entity contract
//!
//! Domain entities expose their fields through [`HasTraits`] by name; each
//! field is described by an [`Attr`] declaration.

pub mod array;
pub mod attr;
pub mod sparse;
pub mod value;

pub use array::{ArrayData, DType};
pub use attr::{Attr, AttrKind};
pub use sparse::SparseMatrix;
pub use value::Value;

use std::fmt;

use lazy_static::lazy_static;
use uuid::Uuid;

use crate::error::Result;

lazy_static! {
    /// The global identity every entity carries
    pub static ref GID: Attr = Attr::field("gid", AttrKind::Gid)
        .with_doc("Global identity of the entity");
}

/// A typed entity whose fields can be read and written by name
pub trait HasTraits: fmt::Debug + Send + Sync {
    /// Short type name used in diagnostics
    fn type_name(&self) -> &'static str;

    fn gid(&self) -> Uuid;

    /// Current value of `field`, or `None` if the entity has no such field
    fn get_attr(&self, field: &str) -> Option<Value>;

    /// Assign `field`. Fails for unknown fields or values of the wrong type.
    fn set_attr(&mut self, field: &str, value: Value) -> Result<()>;

    /// Whole-entity checks run before anything is stored
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
