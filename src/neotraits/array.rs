//! N-dimensional array payloads
//!
//! Datasets hold one of three element types. Numeric arrays report bounds for
//! the cached min/max metadata; text arrays never do.

use ndarray::{concatenate, Array, ArrayD, Axis, Dimension, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{H5Error, Result};

/// Element type of an [`ArrayData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float,
    Int,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Text(ArrayD<String>),
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Float(_) => DType::Float,
            ArrayData::Int(_) => DType::Int,
            ArrayData::Text(_) => DType::Text,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            ArrayData::Float(a) => a.shape().to_vec(),
            ArrayData::Int(a) => a.shape().to_vec(),
            ArrayData::Text(a) => a.shape().to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            ArrayData::Float(a) => a.ndim(),
            ArrayData::Int(a) => a.ndim(),
            ArrayData::Text(a) => a.ndim(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float(a) => a.len(),
            ArrayData::Int(a) => a.len(),
            ArrayData::Text(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global (min, max) of a numeric array. NaN entries are ignored.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let fold = |it: &mut dyn Iterator<Item = f64>| {
            it.fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
        };
        match self {
            ArrayData::Float(a) => fold(&mut a.iter().copied().filter(|v| !v.is_nan())),
            ArrayData::Int(a) => fold(&mut a.iter().map(|&v| v as f64)),
            ArrayData::Text(_) => None,
        }
    }

    /// Float view of the data, converting integers. `None` for text.
    pub fn to_float(&self) -> Option<ArrayD<f64>> {
        match self {
            ArrayData::Float(a) => Some(a.clone()),
            ArrayData::Int(a) => Some(a.mapv(|v| v as f64)),
            ArrayData::Text(_) => None,
        }
    }

    /// Sub-array selected by one [`Slice`] per leading axis.
    ///
    /// Axes beyond `slices.len()` are taken whole. Out of range bounds are
    /// reported as [`H5Error::InvalidSlice`] rather than panicking.
    pub fn slice(&self, slices: &[Slice]) -> Result<ArrayData> {
        Ok(match self {
            ArrayData::Float(a) => ArrayData::Float(slice_array(a, slices)?),
            ArrayData::Int(a) => ArrayData::Int(slice_array(a, slices)?),
            ArrayData::Text(a) => ArrayData::Text(slice_array(a, slices)?),
        })
    }

    /// Concatenate `other` after `self` along `axis` (negative counts from the end).
    ///
    /// Integer chunks are widened when appended to a float array.
    pub fn concatenate(&self, other: &ArrayData, axis: isize) -> Result<ArrayData> {
        let ax = resolve_axis(self.ndim(), axis)?;
        Ok(match (self, other) {
            (ArrayData::Float(a), ArrayData::Float(b)) => {
                ArrayData::Float(concatenate(Axis(ax), &[a.view(), b.view()])?)
            }
            (ArrayData::Float(a), ArrayData::Int(b)) => {
                let b = b.mapv(|v| v as f64);
                ArrayData::Float(concatenate(Axis(ax), &[a.view(), b.view()])?)
            }
            (ArrayData::Int(a), ArrayData::Int(b)) => {
                ArrayData::Int(concatenate(Axis(ax), &[a.view(), b.view()])?)
            }
            (ArrayData::Text(a), ArrayData::Text(b)) => {
                ArrayData::Text(concatenate(Axis(ax), &[a.view(), b.view()])?)
            }
            (a, b) => {
                return Err(H5Error::Type {
                    expected: dtype_name(a.dtype()),
                    got: format!("{:?} array", b.dtype()),
                })
            }
        })
    }
}

fn dtype_name(dtype: DType) -> &'static str {
    match dtype {
        DType::Float => "float array",
        DType::Int => "int array",
        DType::Text => "text array",
    }
}

/// Resolve a possibly negative axis index against `ndim`.
pub(crate) fn resolve_axis(ndim: usize, axis: isize) -> Result<usize> {
    let resolved = if axis < 0 { ndim as isize + axis } else { axis };
    if resolved < 0 || resolved >= ndim as isize {
        return Err(H5Error::InvalidSlice {
            axis: axis.unsigned_abs(),
            reason: format!("axis {} out of range for a {}-d array", axis, ndim),
        });
    }
    Ok(resolved as usize)
}

fn checked_slice(axis: usize, len: usize, slice: Slice) -> Result<Slice> {
    let invalid = |reason: String| H5Error::InvalidSlice { axis, reason };
    if slice.step == 0 {
        return Err(invalid("step must be non-zero".into()));
    }
    let len = len as isize;
    let resolve = |i: isize| if i < 0 { len + i } else { i };
    let start = resolve(slice.start);
    let end = slice.end.map(resolve).unwrap_or(len);
    if !(0..=len).contains(&start) || !(0..=len).contains(&end) {
        return Err(invalid(format!(
            "bounds {}..{:?} exceed axis length {}",
            slice.start, slice.end, len
        )));
    }
    Ok(Slice::new(start, Some(end.max(start)), slice.step))
}

fn slice_array<T: Clone>(array: &ArrayD<T>, slices: &[Slice]) -> Result<ArrayD<T>> {
    if slices.len() > array.ndim() {
        return Err(H5Error::InvalidSlice {
            axis: array.ndim(),
            reason: format!("{} slices for a {}-d array", slices.len(), array.ndim()),
        });
    }
    let mut view = array.view();
    for (axis, slice) in slices.iter().enumerate() {
        let slice = checked_slice(axis, view.len_of(Axis(axis)), *slice)?;
        view.slice_axis_inplace(Axis(axis), slice);
    }
    Ok(view.to_owned())
}

impl<D: Dimension> From<Array<f64, D>> for ArrayData {
    fn from(a: Array<f64, D>) -> Self {
        ArrayData::Float(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<i64, D>> for ArrayData {
    fn from(a: Array<i64, D>) -> Self {
        ArrayData::Int(a.into_dyn())
    }
}

impl<D: Dimension> From<Array<String, D>> for ArrayData {
    fn from(a: Array<String, D>) -> Self {
        ArrayData::Text(a.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_bounds_numeric_and_text() {
        let a: ArrayData = array![[1.0, -2.5], [f64::NAN, 7.0]].into();
        assert_eq!(a.bounds(), Some((-2.5, 7.0)));

        let i: ArrayData = array![3i64, 9, -1].into();
        assert_eq!(i.bounds(), Some((-1.0, 9.0)));

        let t: ArrayData = Array1::from(vec!["a".to_string(), "b".to_string()]).into();
        assert_eq!(t.bounds(), None);

        let empty: ArrayData = Array1::<f64>::zeros(0).into();
        assert_eq!(empty.bounds(), None);
    }

    #[test]
    fn test_slice_rows_and_negative_bounds() {
        let a: ArrayData = array![[1i64, 2], [3, 4], [5, 6]].into();
        let rows = a.slice(&[Slice::from(1..)]).unwrap();
        assert_eq!(rows, ArrayData::from(array![[3i64, 4], [5, 6]]));

        let last_col = a.slice(&[Slice::from(..), Slice::from(-1..)]).unwrap();
        assert_eq!(last_col, ArrayData::from(array![[2i64], [4], [6]]));
    }

    #[test]
    fn test_slice_out_of_range_is_an_error() {
        let a: ArrayData = array![1.0, 2.0].into();
        assert!(matches!(
            a.slice(&[Slice::from(0..5)]),
            Err(H5Error::InvalidSlice { .. })
        ));
        assert!(a.slice(&[Slice::from(..), Slice::from(..)]).is_err());
    }

    #[test]
    fn test_concatenate_widens_ints() {
        let a: ArrayData = array![[1.5, 2.0]].into();
        let b: ArrayData = array![[3i64, 4]].into();
        let c = a.concatenate(&b, 0).unwrap();
        assert_eq!(c, ArrayData::from(array![[1.5, 2.0], [3.0, 4.0]]));
    }

    #[test]
    fn test_concatenate_last_axis_and_mismatch() {
        let a: ArrayData = array![[1i64], [2]].into();
        let b: ArrayData = array![[3i64], [4]].into();
        assert_eq!(a.concatenate(&b, -1).unwrap().shape(), vec![2, 2]);

        let t: ArrayData = Array1::from(vec!["x".to_string()]).into();
        assert!(matches!(a.concatenate(&t, 0), Err(H5Error::Type { .. })));
    }
}
