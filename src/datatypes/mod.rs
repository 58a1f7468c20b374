//! Domain datatypes and their file descriptors
//!
//! Each datatype declares its attributes once, implements [`HasTraits`] by
//! field name, and pairs with an `*H5` descriptor listing its accessors.
//!
//! [`HasTraits`]: crate::neotraits::HasTraits

pub mod connectivity;
pub mod equation;
pub mod local_connectivity;
pub mod time_series;

pub use connectivity::{Connectivity, ConnectivityH5};
pub use equation::Equation;
pub use local_connectivity::{LocalConnectivity, LocalConnectivityH5};
pub use time_series::{TimeSeries, TimeSeriesH5};

use ndarray::{Array, Dimension};

use crate::error::{H5Error, Result};
use crate::neotraits::{ArrayData, Value};

pub(crate) fn unknown_field(type_name: &str, field: &str) -> H5Error {
    H5Error::validation(field, format!("{} has no such field", type_name))
}

/// Numeric array of a fixed rank; integer arrays are widened
pub(crate) fn float_array<D: Dimension>(field: &str, value: Value) -> Result<Array<f64, D>> {
    let data = value
        .into_array(field)?
        .to_float()
        .ok_or_else(|| H5Error::validation(field, "expected a numeric array"))?;
    Ok(data.into_dimensionality::<D>()?)
}

pub(crate) fn text_array<D: Dimension>(field: &str, value: Value) -> Result<Array<String, D>> {
    match value.into_array(field)? {
        ArrayData::Text(a) => Ok(a.into_dimensionality::<D>()?),
        other => Err(H5Error::validation(
            field,
            format!("expected a text array, got {:?}", other.dtype()),
        )),
    }
}
