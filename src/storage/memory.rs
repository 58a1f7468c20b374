//! RAM-only storage

use ndarray::Slice;

use super::{Container, Metadata, StorageManager};
use crate::error::Result;
use crate::neotraits::ArrayData;

/// Keeps the container in memory. `close_file` is a no-op so contents survive it.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    container: Container,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_container(container: Container) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

impl StorageManager for MemoryStorage {
    fn get_metadata(&mut self, dataset_name: Option<&str>) -> Result<Metadata> {
        self.container.metadata(dataset_name)
    }

    fn set_metadata(&mut self, meta: Metadata, dataset_name: Option<&str>) -> Result<()> {
        self.container.set_metadata(meta, dataset_name)
    }

    fn store_data(&mut self, name: &str, data: &ArrayData) -> Result<()> {
        self.container.store_data(name, data);
        Ok(())
    }

    fn get_data(&mut self, name: &str, slice: Option<&[Slice]>) -> Result<ArrayData> {
        self.container.data(name, slice)
    }

    fn append_data(
        &mut self,
        name: &str,
        data: &ArrayData,
        grow_dimension: isize,
        _close_file: bool,
    ) -> Result<()> {
        self.container.append_data(name, data, grow_dimension)
    }

    fn get_data_shape(&mut self, name: &str) -> Result<Vec<usize>> {
        self.container.data_shape(name)
    }

    fn dataset_names(&mut self) -> Result<Vec<String>> {
        Ok(self.container.dataset_names())
    }

    fn close_file(&mut self) -> Result<()> {
        Ok(())
    }
}
