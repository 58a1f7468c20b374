//! Region-level connectivity
//!
//! Region labels, positions and the weight and tract length matrices
//! between every pair of regions.

use std::path::Path;

use lazy_static::lazy_static;
use ndarray::{Array1, Array2};
use uuid::Uuid;

use super::{float_array, text_array, unknown_field};
use crate::error::Result;
use crate::h5::{Accessor, DataSet, FileFormat, H5File, Scalar};
use crate::impl_h5_descriptor;
use crate::neotraits::{ArrayData, Attr, AttrKind, DType, HasTraits, Value};
use crate::storage::StorageManager;

lazy_static! {
    pub static ref REGION_LABELS: Attr = Attr::array("region_labels", DType::Text, 1)
        .with_doc("Short names of the regions");
    pub static ref WEIGHTS: Attr = Attr::array("weights", DType::Float, 2)
        .with_doc("Connection strengths, one row per target region");
    pub static ref TRACT_LENGTHS: Attr = Attr::array("tract_lengths", DType::Float, 2);
    pub static ref CENTRES: Attr = Attr::array("centres", DType::Float, 2)
        .with_doc("Region positions, one `x y z` row per region");
    pub static ref ORIENTATIONS: Attr = Attr::array("orientations", DType::Float, 2).optional();
    pub static ref NUMBER_OF_REGIONS: Attr = Attr::field("number_of_regions", AttrKind::Int);
    pub static ref UNDIRECTED: Attr = Attr::field("undirected", AttrKind::Bool)
        .with_default(false)
        .with_doc("Whether the weights are known to be symmetric");
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    pub gid: Uuid,
    pub region_labels: Array1<String>,
    pub weights: Array2<f64>,
    pub tract_lengths: Array2<f64>,
    pub centres: Array2<f64>,
    pub orientations: Option<Array2<f64>>,
    pub number_of_regions: i64,
    pub undirected: bool,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            gid: Uuid::new_v4(),
            region_labels: Array1::from(Vec::<String>::new()),
            weights: Array2::zeros((0, 0)),
            tract_lengths: Array2::zeros((0, 0)),
            centres: Array2::zeros((0, 3)),
            orientations: None,
            number_of_regions: 0,
            undirected: false,
        }
    }
}

impl Connectivity {
    /// A fully connected network with unit tract lengths
    pub fn from_weights(labels: &[&str], weights: Array2<f64>, centres: Array2<f64>) -> Self {
        let n = labels.len();
        Self {
            region_labels: labels.iter().map(|l| l.to_string()).collect(),
            tract_lengths: Array2::ones(weights.raw_dim()),
            weights,
            centres,
            number_of_regions: n as i64,
            ..Self::default()
        }
    }
}

impl HasTraits for Connectivity {
    fn type_name(&self) -> &'static str {
        "Connectivity"
    }

    fn gid(&self) -> Uuid {
        self.gid
    }

    fn get_attr(&self, field: &str) -> Option<Value> {
        let array = |a: ArrayData| Value::Array(a);
        Some(match field {
            "gid" => Value::Gid(self.gid),
            "region_labels" => array(self.region_labels.clone().into()),
            "weights" => array(self.weights.clone().into()),
            "tract_lengths" => array(self.tract_lengths.clone().into()),
            "centres" => array(self.centres.clone().into()),
            "orientations" => self
                .orientations
                .clone()
                .map(|o| array(o.into()))
                .unwrap_or(Value::None),
            "number_of_regions" => Value::Int(self.number_of_regions),
            "undirected" => Value::Bool(self.undirected),
            _ => return None,
        })
    }

    fn set_attr(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "gid" => self.gid = value.into_gid(field)?,
            "region_labels" => self.region_labels = text_array(field, value)?,
            "weights" => self.weights = float_array(field, value)?,
            "tract_lengths" => self.tract_lengths = float_array(field, value)?,
            "centres" => self.centres = float_array(field, value)?,
            "orientations" => self.orientations = value.into_option(|v| float_array(field, v))?,
            "number_of_regions" => self.number_of_regions = value.into_i64(field)?,
            "undirected" => self.undirected = value.into_bool(field)?,
            _ => return Err(unknown_field(self.type_name(), field)),
        }
        Ok(())
    }
}

pub struct ConnectivityH5 {
    file: H5File,
}

impl ConnectivityH5 {
    pub fn accessors() -> Result<Vec<Accessor>> {
        Ok(vec![
            DataSet::new(&REGION_LABELS, None)?.into(),
            DataSet::new(&WEIGHTS, None)?.into(),
            DataSet::new(&TRACT_LENGTHS, None)?.into(),
            DataSet::new(&CENTRES, None)?.into(),
            DataSet::new(&ORIENTATIONS, None)?.into(),
            Scalar::new(&NUMBER_OF_REGIONS, None)?.into(),
            Scalar::new(&UNDIRECTED, None)?.into(),
        ])
    }

    pub fn with_storage(path: impl AsRef<Path>, storage: Box<dyn StorageManager>) -> Result<Self> {
        Ok(Self {
            file: H5File::with_storage(path, Self::WRITTEN_BY, Self::accessors()?, storage)?,
        })
    }

    pub fn weights(&mut self) -> Result<ArrayData> {
        self.file.dataset("weights")?.load()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

impl_h5_descriptor!(ConnectivityH5);

impl FileFormat for ConnectivityH5 {
    const WRITTEN_BY: &'static str = concat!(module_path!(), "::ConnectivityH5");

    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: H5File::open(path, Self::WRITTEN_BY, Self::accessors()?)?,
        })
    }
}
