//! Typed H5 persistence
//!
//! Binds typed entity attributes to container storage:
//! - [`Scalar`], [`UuidScalar`], [`Reference`]: root metadata entries
//! - [`DataSet`], [`SparseDataSet`]: arrays with cached min/max
//! - [`H5File`]: a closed set of accessors over one container
//! - [`FormatRegistry`]: reconstructs the right descriptor from `written_by`

pub mod accessor;
pub mod codec;
pub mod descriptor;
pub mod file;
pub mod metadata;
pub mod registry;

pub use accessor::{Accessor, DataSet, Reference, Scalar, SparseDataSet, UuidScalar};
pub use codec::{Codec, JsonCodec};
pub use descriptor::{FileFormat, H5Descriptor};
pub use file::{lock_file_path, DataSetHandle, H5File, WRITTEN_BY_KEY};
pub use metadata::DataSetMetaData;
pub use registry::{from_file, register_format, registered_formats, FormatRegistry};
