//! Local (surface) connectivity
//!
//! A sparse vertex-to-vertex matrix over a cortical surface, the equation it
//! was computed from, and the distance cutoff.

use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use uuid::Uuid;

use super::{unknown_field, Equation};
use crate::error::Result;
use crate::h5::{Accessor, FileFormat, H5File, JsonCodec, Reference, Scalar, SparseDataSet};
use crate::impl_h5_descriptor;
use crate::neotraits::{Attr, AttrKind, HasTraits, SparseMatrix, Value};
use crate::storage::StorageManager;

lazy_static! {
    pub static ref SURFACE: Attr = Attr::field("surface", AttrKind::Reference { target: "Surface" })
        .with_doc("Surface the connectivity is defined on");
    pub static ref MATRIX: Attr = Attr::field("matrix", AttrKind::Sparse).optional();
    pub static ref EQUATION: Attr = Attr::field("equation", AttrKind::Json)
        .optional()
        .with_doc("Spatial equation used to compute the matrix");
    pub static ref CUTOFF: Attr = Attr::field("cutoff", AttrKind::Float)
        .with_default(40.0)
        .with_doc("Distance (mm) beyond which connections are dropped");
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalConnectivity {
    pub gid: Uuid,
    pub surface: Option<Uuid>,
    pub matrix: Option<SparseMatrix>,
    pub equation: Option<Equation>,
    pub cutoff: f64,
}

impl Default for LocalConnectivity {
    fn default() -> Self {
        Self {
            gid: Uuid::new_v4(),
            surface: None,
            matrix: None,
            equation: Some(Equation::default()),
            cutoff: 40.0,
        }
    }
}

impl HasTraits for LocalConnectivity {
    fn type_name(&self) -> &'static str {
        "LocalConnectivity"
    }

    fn gid(&self) -> Uuid {
        self.gid
    }

    fn get_attr(&self, field: &str) -> Option<Value> {
        Some(match field {
            "gid" => Value::Gid(self.gid),
            "surface" => self.surface.into(),
            "matrix" => self.matrix.clone().into(),
            "equation" => self
                .equation
                .as_ref()
                .and_then(|e| e.to_json().ok())
                .into(),
            "cutoff" => Value::Float(self.cutoff),
            _ => return None,
        })
    }

    fn set_attr(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "gid" => self.gid = value.into_gid(field)?,
            "surface" => self.surface = value.into_option(|v| v.into_gid(field))?,
            "matrix" => self.matrix = value.into_option(|v| v.into_sparse(field))?,
            "equation" => {
                self.equation =
                    value.into_option(|v| Equation::from_json(v.into_json(field)?))?
            }
            "cutoff" => self.cutoff = value.into_f64(field)?,
            _ => return Err(unknown_field(self.type_name(), field)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if let Some(equation) = &self.equation {
            equation.to_json()?;
        }
        Ok(())
    }
}

pub struct LocalConnectivityH5 {
    file: H5File,
}

impl LocalConnectivityH5 {
    pub fn accessors() -> Result<Vec<Accessor>> {
        Ok(vec![
            Reference::new(&SURFACE, None)?.into(),
            SparseDataSet::new(&MATRIX, None)?.into(),
            // inlined equation, kept as JSON text
            Scalar::new(&EQUATION, None)?
                .with_codec(Arc::new(JsonCodec))
                .into(),
            Scalar::new(&CUTOFF, None)?.into(),
        ])
    }

    pub fn with_storage(path: impl AsRef<Path>, storage: Box<dyn StorageManager>) -> Result<Self> {
        Ok(Self {
            file: H5File::with_storage(path, Self::WRITTEN_BY, Self::accessors()?, storage)?,
        })
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

impl_h5_descriptor!(LocalConnectivityH5);

impl FileFormat for LocalConnectivityH5 {
    const WRITTEN_BY: &'static str = concat!(module_path!(), "::LocalConnectivityH5");

    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: H5File::open(path, Self::WRITTEN_BY, Self::accessors()?)?,
        })
    }
}
