//! Error types for the H5 persistence layer

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while binding typed attributes to container storage
#[derive(Error, Debug)]
pub enum H5Error {
    /// An accessor was declared for an attribute with no field name and no explicit name
    #[error("Independent accessor {attr} needs a name")]
    UnnamedAccessor { attr: String },

    /// A value failed the attribute declaration's type or shape contract
    #[error("Validation failed for \"{field}\": {reason}")]
    Validation { field: String, reason: String },

    /// A dataset is absent from the container
    #[error("Missing data set \"{name}\"")]
    MissingDataSet { name: String },

    /// A metadata key is absent from the container
    #[error("Missing metadata key \"{key}\"")]
    MissingMetadata { key: String },

    /// The entity lacks a field the descriptor expects
    #[error(
        "{entity} has no attribute \"{field}\" (declared by {accessor}). \
         Is that datatype compatible with the field declarations in {descriptor}?"
    )]
    ContractMismatch {
        accessor: String,
        field: String,
        entity: String,
        descriptor: String,
    },

    /// A descriptor has no accessor of the requested kind under this name
    #[error("{descriptor} declares no {kind} accessor named \"{name}\"")]
    UnknownAccessor {
        descriptor: String,
        kind: &'static str,
        name: String,
    },

    /// `written_by` names a format that is not registered
    #[error("Unknown file format \"{0}\"")]
    UnknownFormat(String),

    /// The container carries no `written_by` tag
    #[error("{0:?} has no written_by tag")]
    MissingFormatTag(PathBuf),

    /// A value is neither the expected identity type nor an entity exposing one
    #[error("Expected {expected}, got {got}")]
    Type { expected: &'static str, got: String },

    /// Another descriptor already holds this path open
    #[error("{0:?} is already open by another descriptor")]
    AlreadyOpen(PathBuf),

    #[error("Invalid slice on axis {axis}: {reason}")]
    InvalidSlice { axis: usize, reason: String },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Container encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl H5Error {
    /// True for the two "data not present" variants that the optional-field policy may recover
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            H5Error::MissingDataSet { .. } | H5Error::MissingMetadata { .. }
        )
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        H5Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, H5Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_classification() {
        assert!(H5Error::MissingDataSet { name: "x".into() }.is_missing_data());
        assert!(H5Error::MissingMetadata { key: "x".into() }.is_missing_data());
        assert!(!H5Error::UnknownFormat("x".into()).is_missing_data());
    }

    #[test]
    fn test_contract_mismatch_message_names_everything() {
        let err = H5Error::ContractMismatch {
            accessor: "Scalar(cutoff)".into(),
            field: "cutoff".into(),
            entity: "TimeSeries".into(),
            descriptor: "LocalConnectivityH5".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cutoff"));
        assert!(msg.contains("TimeSeries"));
        assert!(msg.contains("LocalConnectivityH5"));
    }
}
