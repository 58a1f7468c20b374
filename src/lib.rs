//! Typed H5 persistence for neuroscience datatypes
//!
//! Binds strongly typed entity attributes to a hierarchical container:
//! - Scalars, identities and cross-file references in root metadata
//! - N-dimensional and sparse arrays as named datasets with cached bounds
//! - A self-describing `written_by` tag to reopen any file with its descriptor

pub mod config;
pub mod datatypes;
pub mod error;
pub mod h5;
pub mod neotraits;
pub mod storage;

// Re-exports for convenience
pub use config::StorageConfig;
pub use error::{H5Error, Result};
pub use h5::{from_file, register_format, DataSetMetaData, FileFormat, H5Descriptor, H5File};
pub use neotraits::{ArrayData, Attr, AttrKind, HasTraits, SparseMatrix, Value};
pub use storage::{ContainerStorage, MemoryStorage, StorageManager};
