//! Concrete file descriptor traits

use std::any::Any;
use std::path::Path;

use uuid::Uuid;

use super::file::H5File;
use crate::error::Result;
use crate::neotraits::HasTraits;

/// A concrete file format: an [`H5File`] with a fixed accessor declaration
pub trait H5Descriptor: Any + Send {
    fn file(&self) -> &H5File;

    fn file_mut(&mut self) -> &mut H5File;

    fn into_file(self: Box<Self>) -> H5File;

    fn as_any(&self) -> &dyn Any;

    /// The tag written into `written_by` on close
    fn written_by(&self) -> &'static str {
        self.file().format()
    }

    fn store(&mut self, entity: &dyn HasTraits, scalars_only: bool) -> Result<()> {
        self.file_mut().store(entity, scalars_only)
    }

    fn load_into(&mut self, entity: &mut dyn HasTraits) -> Result<()> {
        self.file_mut().load_into(entity)
    }

    fn gather_references(&mut self) -> Result<Vec<(String, Option<Uuid>)>> {
        self.file_mut().gather_references()
    }

    fn close_boxed(self: Box<Self>) -> Result<()> {
        self.into_file().close()
    }
}

impl dyn H5Descriptor {
    pub fn is<T: H5Descriptor>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: H5Descriptor>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// A descriptor type that can be registered for reconstruction from its tag
pub trait FileFormat: H5Descriptor + Sized {
    /// Fully qualified type name, stored as the file's `written_by` tag
    const WRITTEN_BY: &'static str;

    fn open(path: &Path) -> Result<Self>;
}

/// Implements [`H5Descriptor`] for a struct holding its [`H5File`] in a `file` field
#[macro_export]
macro_rules! impl_h5_descriptor {
    ($ty:ty) => {
        impl $crate::h5::H5Descriptor for $ty {
            fn file(&self) -> &$crate::h5::H5File {
                &self.file
            }

            fn file_mut(&mut self) -> &mut $crate::h5::H5File {
                &mut self.file
            }

            fn into_file(self: Box<Self>) -> $crate::h5::H5File {
                self.file
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}
