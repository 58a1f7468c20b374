//! On-disk container storage
//!
//! A container is persisted as a zstd-compressed bincode image. It is read on
//! first access, mutated in RAM, and written back by `close_file` when dirty.
//! Any call after `close_file` transparently re-opens it.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Slice;
use tracing::{debug, warn};

use super::{Container, Metadata, StorageManager};
use crate::config::StorageConfig;
use crate::error::Result;
use crate::neotraits::ArrayData;

pub struct ContainerStorage {
    path: PathBuf,
    config: StorageConfig,
    container: Option<Container>,
    dirty: bool,
}

impl ContainerStorage {
    pub fn new(path: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            path: path.into(),
            config,
            container: None,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.container.is_some()
    }

    fn container(&mut self) -> Result<&mut Container> {
        if self.container.is_none() {
            self.container = Some(Self::read(&self.path)?);
        }
        Ok(self.container.get_or_insert_with(Container::default))
    }

    fn container_mut(&mut self) -> Result<&mut Container> {
        self.dirty = true;
        self.container()
    }

    fn read(path: &Path) -> Result<Container> {
        if !path.exists() {
            debug!("Container {:?} does not exist yet, starting empty", path);
            return Ok(Container::default());
        }
        let file = File::open(path)?;
        let decoder = zstd::stream::read::Decoder::new(BufReader::new(file))?;
        let container: Container = bincode::deserialize_from(decoder)?;
        debug!("Opened container {:?}", path);
        Ok(container)
    }

    fn write(&self, container: &Container) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let target = if self.config.atomic_writes {
            let mut name = OsString::from(self.path.as_os_str());
            name.push(".tmp");
            PathBuf::from(name)
        } else {
            self.path.clone()
        };

        let writer = BufWriter::new(File::create(&target)?);
        let mut encoder =
            zstd::stream::write::Encoder::new(writer, self.config.compression_level)?;
        bincode::serialize_into(&mut encoder, container)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;

        if target != self.path {
            fs::rename(&target, &self.path)?;
        }
        debug!("Wrote container {:?}", self.path);
        Ok(())
    }
}

impl StorageManager for ContainerStorage {
    fn get_metadata(&mut self, dataset_name: Option<&str>) -> Result<Metadata> {
        self.container()?.metadata(dataset_name)
    }

    fn set_metadata(&mut self, meta: Metadata, dataset_name: Option<&str>) -> Result<()> {
        self.container_mut()?.set_metadata(meta, dataset_name)
    }

    fn store_data(&mut self, name: &str, data: &ArrayData) -> Result<()> {
        self.container_mut()?.store_data(name, data);
        Ok(())
    }

    fn get_data(&mut self, name: &str, slice: Option<&[Slice]>) -> Result<ArrayData> {
        self.container()?.data(name, slice)
    }

    fn append_data(
        &mut self,
        name: &str,
        data: &ArrayData,
        grow_dimension: isize,
        close_file: bool,
    ) -> Result<()> {
        self.container_mut()?.append_data(name, data, grow_dimension)?;
        if close_file {
            self.close_file()?;
        }
        Ok(())
    }

    fn get_data_shape(&mut self, name: &str) -> Result<Vec<usize>> {
        self.container()?.data_shape(name)
    }

    fn dataset_names(&mut self) -> Result<Vec<String>> {
        Ok(self.container()?.dataset_names())
    }

    fn close_file(&mut self) -> Result<()> {
        // the image stays in memory until it is safely on disk
        if self.dirty {
            if let Some(container) = &self.container {
                self.write(container)?;
            }
        }
        self.container = None;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for ContainerStorage {
    fn drop(&mut self) {
        if self.dirty {
            warn!("Container {:?} dropped with unsaved changes, flushing", self.path);
            if let Err(e) = self.close_file() {
                warn!("Failed to flush container {:?}: {}", self.path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MetaValue;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_close_persists_and_reopens_lazily() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("a.h5");

        let mut storage = ContainerStorage::new(&path, StorageConfig::default());
        storage.store_data("m", &array![[1.0, 2.0]].into())?;
        let mut meta = Metadata::new();
        meta.insert("title".into(), MetaValue::from("net1"));
        storage.set_metadata(meta, None)?;
        storage.close_file()?;
        assert!(path.exists());
        assert!(!storage.is_open());

        // re-opened transparently
        assert_eq!(storage.get_data_shape("m")?, vec![1, 2]);

        let mut other = ContainerStorage::new(&path, StorageConfig::default());
        assert_eq!(other.get_metadata(None)?["title"], MetaValue::from("net1"));
        Ok(())
    }

    #[test]
    fn test_reads_do_not_write() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ghost.h5");
        let mut storage = ContainerStorage::new(&path, StorageConfig::default());
        assert!(storage.get_metadata(None)?.is_empty());
        storage.close_file()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_failed_close_keeps_unsaved_changes() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let path = blocker.join("a.h5");

        let mut storage = ContainerStorage::new(&path, StorageConfig::default());
        let mut meta = Metadata::new();
        meta.insert("title".into(), MetaValue::from("net1"));
        storage.set_metadata(meta, None)?;
        assert!(storage.close_file().is_err());
        assert!(storage.is_open());
        assert_eq!(storage.get_metadata(None)?["title"], MetaValue::from("net1"));

        fs::remove_file(&blocker)?;
        storage.close_file()?;
        assert!(!storage.is_open());

        let mut other = ContainerStorage::new(&path, StorageConfig::default());
        assert_eq!(other.get_metadata(None)?["title"], MetaValue::from("net1"));
        Ok(())
    }

    #[test]
    fn test_append_with_close_flushes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ts.h5");
        let mut storage = ContainerStorage::new(&path, StorageConfig::default());
        storage.append_data("data", &array![[1.0], [2.0]].into(), 0, true)?;
        assert!(path.exists());
        storage.append_data("data", &array![[3.0]].into(), 0, false)?;
        assert!(storage.is_open());
        assert_eq!(storage.get_data_shape("data")?, vec![3, 1]);
        Ok(())
    }
}
