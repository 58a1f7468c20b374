//! Shared fixture: a small network datatype with one scalar, one growable
//! matrix, an optional note and an optional reference to a parent network.

#![allow(dead_code)]

use std::path::Path;

use lazy_static::lazy_static;
use ndarray::Array2;
use uuid::Uuid;

use datatype_h5::h5::{Accessor, DataSet, FileFormat, H5File, Reference, Scalar};
use datatype_h5::neotraits::DType;
use datatype_h5::{impl_h5_descriptor, Attr, AttrKind, H5Error, HasTraits, Result, Value};

lazy_static! {
    static ref TITLE: Attr = Attr::field("title", AttrKind::Str);
    static ref MATRIX: Attr = Attr::array("matrix", DType::Float, 2);
    static ref NOTES: Attr = Attr::field("notes", AttrKind::Str).optional();
    static ref PARENT: Attr =
        Attr::field("parent", AttrKind::Reference { target: "Network" }).optional();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub gid: Uuid,
    pub title: String,
    pub matrix: Array2<f64>,
    pub notes: Option<String>,
    pub parent: Option<Uuid>,
}

impl Network {
    pub fn new(title: &str, matrix: Array2<f64>) -> Self {
        Self {
            gid: Uuid::new_v4(),
            title: title.to_string(),
            matrix,
            notes: None,
            parent: None,
        }
    }

    pub fn empty() -> Self {
        Self::new("", Array2::zeros((0, 0)))
    }
}

impl HasTraits for Network {
    fn type_name(&self) -> &'static str {
        "Network"
    }

    fn gid(&self) -> Uuid {
        self.gid
    }

    fn get_attr(&self, field: &str) -> Option<Value> {
        Some(match field {
            "gid" => Value::Gid(self.gid),
            "title" => Value::from(self.title.as_str()),
            "matrix" => Value::Array(self.matrix.clone().into()),
            "notes" => self.notes.clone().into(),
            "parent" => self.parent.into(),
            _ => return None,
        })
    }

    fn set_attr(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "gid" => self.gid = value.into_gid(field)?,
            "title" => self.title = value.into_string(field)?,
            "matrix" => {
                let data = value
                    .into_array(field)?
                    .to_float()
                    .ok_or_else(|| H5Error::Type {
                        expected: "numeric array",
                        got: "text".to_string(),
                    })?;
                self.matrix = data.into_dimensionality()?;
            }
            "notes" => self.notes = value.into_option(|v| v.into_string(field))?,
            "parent" => self.parent = value.into_option(|v| v.into_gid(field))?,
            _ => {
                return Err(H5Error::Validation {
                    field: field.to_string(),
                    reason: "unknown field".to_string(),
                })
            }
        }
        Ok(())
    }
}

/// A network-like entity that lacks the `matrix` field
#[derive(Debug)]
pub struct Headline {
    pub gid: Uuid,
    pub title: String,
}

impl HasTraits for Headline {
    fn type_name(&self) -> &'static str {
        "Headline"
    }

    fn gid(&self) -> Uuid {
        self.gid
    }

    fn get_attr(&self, field: &str) -> Option<Value> {
        match field {
            "gid" => Some(Value::Gid(self.gid)),
            "title" => Some(Value::from(self.title.as_str())),
            _ => None,
        }
    }

    fn set_attr(&mut self, field: &str, _value: Value) -> Result<()> {
        Err(H5Error::Validation {
            field: field.to_string(),
            reason: "read only".to_string(),
        })
    }
}

pub struct NetworkH5 {
    file: H5File,
}

impl NetworkH5 {
    pub fn accessors() -> Result<Vec<Accessor>> {
        Ok(vec![
            Scalar::new(&TITLE, None)?.into(),
            DataSet::new(&MATRIX, None)?.with_expand_dimension(0).into(),
            Scalar::new(&NOTES, None)?.into(),
            Reference::new(&PARENT, None)?.into(),
        ])
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }
}

impl_h5_descriptor!(NetworkH5);

impl FileFormat for NetworkH5 {
    const WRITTEN_BY: &'static str = concat!(module_path!(), "::NetworkH5");

    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: H5File::open(path, Self::WRITTEN_BY, Self::accessors()?)?,
        })
    }
}
