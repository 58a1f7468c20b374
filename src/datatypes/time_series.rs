//! Time series
//!
//! Simulated or recorded signals, written incrementally: the first axis of
//! both `data` and `time` grows one chunk at a time.

use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use ndarray::{Array1, ArrayD, IxDyn, Slice};
use uuid::Uuid;

use super::{float_array, unknown_field, Connectivity};
use crate::error::{H5Error, Result};
use crate::h5::{Accessor, DataSet, FileFormat, H5File, Reference, Scalar};
use crate::impl_h5_descriptor;
use crate::neotraits::{ArrayData, Attr, AttrKind, DType, HasTraits, Value};
use crate::storage::StorageManager;

lazy_static! {
    pub static ref TITLE: Attr = Attr::field("title", AttrKind::Str).with_default("");
    pub static ref DATA: Attr = Attr::field(
        "data",
        AttrKind::Array {
            dtype: Some(DType::Float),
            ndim: None,
        },
    )
    .with_doc("Samples, time along the first axis");
    pub static ref TIME: Attr = Attr::array("time", DType::Float, 1).optional();
    pub static ref SAMPLE_PERIOD: Attr =
        Attr::field("sample_period", AttrKind::Float).with_default(1.0);
    pub static ref SAMPLE_PERIOD_UNIT: Attr = Attr::field("sample_period_unit", AttrKind::Str)
        .with_choices(&["ms", "s", "us"])
        .with_default("ms");
    pub static ref START_TIME: Attr = Attr::field("start_time", AttrKind::Float).with_default(0.0);
    pub static ref CONNECTIVITY: Attr =
        Attr::field("connectivity", AttrKind::Reference { target: "Connectivity" }).optional();
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub gid: Uuid,
    pub title: String,
    pub data: ArrayD<f64>,
    pub time: Option<Array1<f64>>,
    pub sample_period: f64,
    pub sample_period_unit: String,
    pub start_time: f64,
    /// Only persisted as a reference; never populated by a load
    pub connectivity: Option<Arc<Connectivity>>,
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self {
            gid: Uuid::new_v4(),
            title: String::new(),
            data: ArrayD::zeros(IxDyn(&[0])),
            time: None,
            sample_period: 1.0,
            sample_period_unit: "ms".to_string(),
            start_time: 0.0,
            connectivity: None,
        }
    }
}

impl HasTraits for TimeSeries {
    fn type_name(&self) -> &'static str {
        "TimeSeries"
    }

    fn gid(&self) -> Uuid {
        self.gid
    }

    fn get_attr(&self, field: &str) -> Option<Value> {
        Some(match field {
            "gid" => Value::Gid(self.gid),
            "title" => Value::from(self.title.as_str()),
            "data" => Value::Array(self.data.clone().into()),
            "time" => self
                .time
                .clone()
                .map(|t| Value::Array(t.into()))
                .unwrap_or(Value::None),
            "sample_period" => Value::Float(self.sample_period),
            "sample_period_unit" => Value::from(self.sample_period_unit.as_str()),
            "start_time" => Value::Float(self.start_time),
            "connectivity" => match &self.connectivity {
                Some(conn) => Value::Entity(conn.clone()),
                None => Value::None,
            },
            _ => return None,
        })
    }

    fn set_attr(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "gid" => self.gid = value.into_gid(field)?,
            "title" => self.title = value.into_string(field)?,
            "data" => self.data = float_array(field, value)?,
            "time" => self.time = value.into_option(|v| float_array(field, v))?,
            "sample_period" => self.sample_period = value.into_f64(field)?,
            "sample_period_unit" => self.sample_period_unit = value.into_string(field)?,
            "start_time" => self.start_time = value.into_f64(field)?,
            "connectivity" => match value {
                Value::None => self.connectivity = None,
                other => {
                    return Err(H5Error::validation(
                        field,
                        format!(
                            "cannot assign {}, load the connectivity from its own file",
                            other.type_name()
                        ),
                    ))
                }
            },
            _ => return Err(unknown_field(self.type_name(), field)),
        }
        Ok(())
    }
}

pub struct TimeSeriesH5 {
    file: H5File,
}

impl TimeSeriesH5 {
    pub fn accessors() -> Result<Vec<Accessor>> {
        Ok(vec![
            Scalar::new(&TITLE, None)?.into(),
            DataSet::new(&DATA, None)?.with_expand_dimension(0).into(),
            DataSet::new(&TIME, None)?.with_expand_dimension(0).into(),
            Scalar::new(&SAMPLE_PERIOD, None)?.into(),
            Scalar::new(&SAMPLE_PERIOD_UNIT, None)?.into(),
            Scalar::new(&START_TIME, None)?.into(),
            Reference::new(&CONNECTIVITY, None)?.into(),
        ])
    }

    pub fn with_storage(path: impl AsRef<Path>, storage: Box<dyn StorageManager>) -> Result<Self> {
        Ok(Self {
            file: H5File::with_storage(path, Self::WRITTEN_BY, Self::accessors()?, storage)?,
        })
    }

    /// Append a chunk of samples; the container stays open for the next chunk
    pub fn write_data_slice(&mut self, chunk: impl Into<ArrayData>) -> Result<()> {
        self.file.dataset("data")?.append(chunk, false)
    }

    pub fn write_time_slice(&mut self, times: impl Into<ArrayData>) -> Result<()> {
        self.file.dataset("time")?.append(times, false)
    }

    /// Samples in `[start, end)` along the time axis, every other axis whole
    pub fn read_data_slice(&mut self, start: usize, end: usize) -> Result<ArrayData> {
        let mut data = self.file.dataset("data")?;
        let ndim = data.shape()?.len();
        let mut slice = vec![Slice::from(..); ndim];
        if let Some(first) = slice.first_mut() {
            *first = Slice::from(start as isize..end as isize);
        }
        data.slice(&slice)
    }

    pub fn data_shape(&mut self) -> Result<Vec<usize>> {
        self.file.dataset("data")?.shape()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

impl_h5_descriptor!(TimeSeriesH5);

impl FileFormat for TimeSeriesH5 {
    const WRITTEN_BY: &'static str = concat!(module_path!(), "::TimeSeriesH5");

    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: H5File::open(path, Self::WRITTEN_BY, Self::accessors()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h5::H5Descriptor;
    use crate::storage::MemoryStorage;
    use ndarray::array;

    fn memory(path: &str) -> Result<TimeSeriesH5> {
        TimeSeriesH5::with_storage(path, Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_chunked_writes_merge_bounds() -> Result<()> {
        let ts = TimeSeries {
            title: "bold".to_string(),
            data: array![[0.5, 1.0], [2.0, -1.0]].into_dyn(),
            time: Some(array![0.0, 1.0]),
            ..TimeSeries::default()
        };
        let mut h5 = memory("/scratch/ts_chunks.h5")?;
        h5.store(&ts, false)?;
        h5.write_data_slice(array![[7.0, 3.0]])?;
        h5.write_time_slice(array![2.0])?;

        assert_eq!(h5.data_shape()?, vec![3, 2]);
        let bounds = h5.file_mut().dataset("data")?.get_cached_metadata()?;
        assert_eq!((bounds.min, bounds.max), (Some(-1.0), Some(7.0)));

        let tail = h5.read_data_slice(1, 3)?;
        assert_eq!(tail, ArrayData::from(array![[2.0, -1.0], [7.0, 3.0]]));
        h5.close()
    }

    #[test]
    fn test_connectivity_stored_as_reference() -> Result<()> {
        let conn = Arc::new(Connectivity::default());
        let ts = TimeSeries {
            data: array![1.0, 2.0].into_dyn(),
            connectivity: Some(conn.clone()),
            ..TimeSeries::default()
        };
        let mut h5 = memory("/scratch/ts_ref.h5")?;
        h5.store(&ts, false)?;

        let refs = h5.gather_references()?;
        assert_eq!(refs, vec![("connectivity".to_string(), Some(conn.gid))]);

        let mut loaded = TimeSeries::default();
        h5.load_into(&mut loaded)?;
        assert!(loaded.connectivity.is_none());
        assert_eq!(loaded.data, ts.data);
        h5.close()
    }

    #[test]
    fn test_unit_outside_choices_rejected() -> Result<()> {
        let ts = TimeSeries {
            data: array![1.0].into_dyn(),
            sample_period_unit: "hours".to_string(),
            ..TimeSeries::default()
        };
        let mut h5 = memory("/scratch/ts_unit.h5")?;
        assert!(matches!(h5.store(&ts, false), Err(H5Error::Validation { .. })));
        h5.close()
    }

    #[test]
    fn test_missing_reference_is_none() -> Result<()> {
        let ts = TimeSeries {
            data: array![1.0].into_dyn(),
            ..TimeSeries::default()
        };
        let mut h5 = memory("/scratch/ts_noref.h5")?;
        h5.store(&ts, false)?;
        assert_eq!(h5.gather_references()?, vec![("connectivity".to_string(), None)]);
        h5.close()
    }
}
