//! Format registry
//!
//! Maps `written_by` tags to descriptor constructors so a file can be
//! reopened with the right descriptor from its contents alone. The global
//! registry starts with the built-in datatypes; plugins add theirs with
//! [`register_format`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;

use lazy_static::lazy_static;
use tracing::info;

use super::descriptor::{FileFormat, H5Descriptor};
use super::file::{PathLock, WRITTEN_BY_KEY};
use crate::config::StorageConfig;
use crate::datatypes::{ConnectivityH5, LocalConnectivityH5, TimeSeriesH5};
use crate::error::{H5Error, Result};
use crate::storage::{ContainerStorage, MetaValue, StorageManager};

pub type DescriptorFactory = fn(&Path) -> Result<Box<dyn H5Descriptor>>;

fn open_boxed<F: FileFormat>(path: &Path) -> Result<Box<dyn H5Descriptor>> {
    Ok(Box::new(F::open(path)?))
}

#[derive(Clone, Default)]
pub struct FormatRegistry {
    factories: HashMap<&'static str, DescriptorFactory>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl FormatRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<ConnectivityH5>();
        registry.register::<LocalConnectivityH5>();
        registry.register::<TimeSeriesH5>();
        registry
    }

    pub fn register<F: FileFormat>(&mut self) {
        self.register_factory(F::WRITTEN_BY, open_boxed::<F>);
    }

    pub fn register_factory(&mut self, tag: &'static str, factory: DescriptorFactory) {
        self.factories.insert(tag, factory);
    }

    pub fn formats(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.factories.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn resolve(&self, tag: &str) -> Result<DescriptorFactory> {
        self.factories
            .get(tag)
            .copied()
            .ok_or_else(|| H5Error::UnknownFormat(tag.to_string()))
    }

    /// Open `path` with the descriptor named by its `written_by` tag
    pub fn from_file(&self, path: impl AsRef<Path>) -> Result<Box<dyn H5Descriptor>> {
        let path = path.as_ref();
        let tag = read_format_tag(path)?;
        let factory = self.resolve(&tag)?;
        info!("Resolved {:?} as {}", path, tag);
        factory(path)
    }
}

/// Read only the `written_by` tag of the container at `path`
pub fn read_format_tag(path: &Path) -> Result<String> {
    let _lock = PathLock::acquire_exclusive(path)?;
    let mut storage = ContainerStorage::new(path, StorageConfig::from_env());
    let tag = storage.get_metadata(None)?.remove(WRITTEN_BY_KEY);
    storage.close_file()?;
    match tag {
        Some(MetaValue::Str(tag)) => Ok(tag),
        _ => Err(H5Error::MissingFormatTag(path.to_path_buf())),
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<FormatRegistry> = RwLock::new(FormatRegistry::with_builtin());
}

/// Add a descriptor type to the global registry
pub fn register_format<F: FileFormat>() {
    REGISTRY
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .register::<F>();
}

/// Tags known to the global registry
pub fn registered_formats() -> Vec<&'static str> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner()).formats()
}

/// Open `path` with the descriptor its `written_by` tag names, using the global registry
pub fn from_file(path: impl AsRef<Path>) -> Result<Box<dyn H5Descriptor>> {
    let path = path.as_ref();
    let tag = read_format_tag(path)?;
    // the guard is released before the factory runs, factories may register formats
    let factory = REGISTRY
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .resolve(&tag)?;
    info!("Resolved {:?} as {}", path, tag);
    factory(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_formats() {
        let registry = FormatRegistry::with_builtin();
        assert_eq!(registry.formats().len(), 3);
        assert!(registry.resolve(TimeSeriesH5::WRITTEN_BY).is_ok());
        assert!(matches!(
            registry.resolve("nowhere::Missing"),
            Err(H5Error::UnknownFormat(_))
        ));
    }

    fn open_and_register(path: &Path) -> Result<Box<dyn H5Descriptor>> {
        register_format::<ConnectivityH5>();
        open_boxed::<LocalConnectivityH5>(path)
    }

    #[test]
    fn test_factory_may_register_formats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plugin_lc.h5");
        LocalConnectivityH5::open(&path)?.close()?;
        let mut storage = ContainerStorage::new(&path, StorageConfig::default());
        let mut meta = crate::storage::Metadata::new();
        meta.insert(WRITTEN_BY_KEY.to_string(), MetaValue::from("test::Reentrant"));
        storage.set_metadata(meta, None)?;
        storage.close_file()?;

        {
            let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
            registry.register_factory("test::Reentrant", open_and_register);
        }
        let descriptor = from_file(&path)?;
        assert!(descriptor.is::<LocalConnectivityH5>());
        descriptor.close_boxed()
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = FormatRegistry::new();
        assert!(registry.resolve(LocalConnectivityH5::WRITTEN_BY).is_err());
    }
}
