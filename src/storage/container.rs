//! In-memory image of one container

use std::collections::BTreeMap;

use ndarray::Slice;
use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::error::{H5Error, Result};
use crate::neotraits::array::resolve_axis;
use crate::neotraits::ArrayData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredDataSet {
    data: ArrayData,
    metadata: Metadata,
}

/// Root metadata plus named datasets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    metadata: Metadata,
    datasets: BTreeMap<String, StoredDataSet>,
}

fn missing(name: &str) -> H5Error {
    H5Error::MissingDataSet {
        name: name.to_string(),
    }
}

impl Container {
    pub fn metadata(&self, dataset_name: Option<&str>) -> Result<Metadata> {
        match dataset_name {
            None => Ok(self.metadata.clone()),
            Some(name) => self
                .datasets
                .get(name)
                .map(|d| d.metadata.clone())
                .ok_or_else(|| missing(name)),
        }
    }

    pub fn set_metadata(&mut self, meta: Metadata, dataset_name: Option<&str>) -> Result<()> {
        let target = match dataset_name {
            None => &mut self.metadata,
            Some(name) => {
                &mut self
                    .datasets
                    .get_mut(name)
                    .ok_or_else(|| missing(name))?
                    .metadata
            }
        };
        target.extend(meta);
        Ok(())
    }

    /// Overwrite `name`; sidecar metadata from any previous version is dropped
    pub fn store_data(&mut self, name: &str, data: &ArrayData) {
        self.datasets.insert(
            name.to_string(),
            StoredDataSet {
                data: data.clone(),
                metadata: Metadata::new(),
            },
        );
    }

    pub fn data(&self, name: &str, slice: Option<&[Slice]>) -> Result<ArrayData> {
        let stored = self.datasets.get(name).ok_or_else(|| missing(name))?;
        match slice {
            None => Ok(stored.data.clone()),
            Some(s) => stored.data.slice(s),
        }
    }

    pub fn append_data(
        &mut self,
        name: &str,
        data: &ArrayData,
        grow_dimension: isize,
    ) -> Result<()> {
        match self.datasets.get_mut(name) {
            Some(stored) => {
                stored.data = stored.data.concatenate(data, grow_dimension)?;
            }
            None => {
                resolve_axis(data.ndim(), grow_dimension)?;
                self.store_data(name, data);
            }
        }
        Ok(())
    }

    pub fn data_shape(&self, name: &str) -> Result<Vec<usize>> {
        self.datasets
            .get(name)
            .map(|d| d.data.shape())
            .ok_or_else(|| missing(name))
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MetaValue;
    use ndarray::array;

    #[test]
    fn test_dataset_metadata_requires_dataset() {
        let mut c = Container::default();
        let mut meta = Metadata::new();
        meta.insert("Minimum".into(), MetaValue::Float(0.0));
        assert!(matches!(
            c.set_metadata(meta.clone(), Some("nope")),
            Err(H5Error::MissingDataSet { .. })
        ));

        c.store_data("x", &array![1.0].into());
        c.set_metadata(meta, Some("x")).unwrap();
        assert_eq!(c.metadata(Some("x")).unwrap()["Minimum"], MetaValue::Float(0.0));
        assert!(c.metadata(None).unwrap().is_empty());
    }

    #[test]
    fn test_append_creates_then_grows() {
        let mut c = Container::default();
        c.append_data("ts", &array![[1i64, 2]].into(), 0).unwrap();
        c.append_data("ts", &array![[3i64, 4]].into(), 0).unwrap();
        assert_eq!(c.data_shape("ts").unwrap(), vec![2, 2]);
        assert!(c.append_data("scalar", &ndarray::arr0(1.0).into(), -1).is_err());
    }
}
