//! Accessors
//!
//! An accessor binds one [`Attr`] declaration to one storage slot. Accessors
//! do not hold their file; the owning [`H5File`](super::H5File) lends its
//! storage manager for each call.

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Slice};
use tracing::debug;
use uuid::Uuid;

use super::codec::Codec;
use super::metadata::DataSetMetaData;
use crate::error::{H5Error, Result};
use crate::neotraits::{ArrayData, Attr, SparseMatrix, Value};
use crate::storage::{MetaValue, Metadata, StorageManager};

fn resolve_name(attr: &Attr, name: Option<&str>) -> Result<String> {
    match name.or(attr.field_name()) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(H5Error::UnnamedAccessor {
            attr: attr.to_string(),
        }),
    }
}

fn single(key: &str, value: MetaValue) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(key.to_string(), value);
    meta
}

/// A primitive value kept in the root metadata map
#[derive(Debug, Clone)]
pub struct Scalar {
    attr: &'static Attr,
    name: String,
    codec: Option<Arc<dyn Codec>>,
}

impl Scalar {
    pub fn new(attr: &'static Attr, name: Option<&str>) -> Result<Self> {
        Ok(Self {
            attr,
            name: resolve_name(attr, name)?,
            codec: None,
        })
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn field_name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self) -> &'static Attr {
        self.attr
    }

    /// Validate and write. An absent optional value writes nothing.
    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        let value = self.attr.validate(value)?;
        if value.is_none() {
            return Ok(());
        }
        let raw = match &self.codec {
            Some(codec) => {
                debug!("Encoding {} with the {} codec", self.name, codec.name());
                codec.encode(&self.name, &value)?
            }
            None => MetaValue::from_value(&self.name, &value)?,
        };
        self.store_raw(storage, raw)
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<Value> {
        let raw = self.load_raw(storage)?;
        match &self.codec {
            Some(codec) => codec.decode(&self.name, raw),
            None => Ok(raw.into()),
        }
    }

    fn store_raw(&self, storage: &mut dyn StorageManager, raw: MetaValue) -> Result<()> {
        storage.set_metadata(single(&self.name, raw), None)
    }

    fn load_raw(&self, storage: &mut dyn StorageManager) -> Result<MetaValue> {
        storage
            .get_metadata(None)?
            .remove(&self.name)
            .ok_or_else(|| H5Error::MissingMetadata {
                key: self.name.clone(),
            })
    }
}

/// An identity, stored as its URN so it cannot be confused with a plain string
#[derive(Debug, Clone)]
pub struct UuidScalar {
    scalar: Scalar,
}

impl UuidScalar {
    pub fn new(attr: &'static Attr, name: Option<&str>) -> Result<Self> {
        Ok(Self {
            scalar: Scalar::new(attr, name)?,
        })
    }

    pub fn field_name(&self) -> &str {
        self.scalar.field_name()
    }

    pub fn attr(&self) -> &'static Attr {
        self.scalar.attr
    }

    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        match value {
            // optional and missing
            Value::None if !self.attr().required() => Ok(()),
            Value::Gid(gid) => self
                .scalar
                .store_raw(storage, MetaValue::Str(gid.urn().to_string())),
            other => Err(H5Error::Type {
                expected: "uuid",
                got: other.type_name().to_string(),
            }),
        }
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<Uuid> {
        match self.scalar.load_raw(storage)? {
            MetaValue::Str(text) => {
                let hex = text.strip_prefix("urn:uuid:").unwrap_or(&text);
                Uuid::parse_str(hex).map_err(|e| {
                    H5Error::validation(
                        self.field_name(),
                        format!("{:?} is not a uuid: {}", text, e),
                    )
                })
            }
            other => Err(H5Error::Type {
                expected: "uuid urn",
                got: format!("{:?}", other),
            }),
        }
    }
}

/// A pointer to another stored entity, persisted by identity only
#[derive(Debug, Clone)]
pub struct Reference {
    uuid: UuidScalar,
}

impl Reference {
    pub fn new(attr: &'static Attr, name: Option<&str>) -> Result<Self> {
        Ok(Self {
            uuid: UuidScalar::new(attr, name)?,
        })
    }

    pub fn field_name(&self) -> &str {
        self.uuid.field_name()
    }

    pub fn attr(&self) -> &'static Attr {
        self.uuid.attr()
    }

    /// Accepts a gid or a full entity, whose own gid is stored
    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        match value {
            Value::None if !self.attr().required() => Ok(()),
            Value::Entity(entity) => self.uuid.store(storage, Value::Gid(entity.gid())),
            gid @ Value::Gid(_) => self.uuid.store(storage, gid),
            other => Err(H5Error::Type {
                expected: "uuid or entity",
                got: other.type_name().to_string(),
            }),
        }
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<Uuid> {
        self.uuid.load(storage)
    }
}

/// An N-dimensional array with cached min/max in its sidecar metadata
#[derive(Debug, Clone)]
pub struct DataSet {
    attr: &'static Attr,
    name: String,
    expand_dimension: isize,
}

impl DataSet {
    /// The last axis is the growable one unless changed with
    /// [`with_expand_dimension`](Self::with_expand_dimension)
    pub fn new(attr: &'static Attr, name: Option<&str>) -> Result<Self> {
        Ok(Self {
            attr,
            name: resolve_name(attr, name)?,
            expand_dimension: -1,
        })
    }

    pub fn with_expand_dimension(mut self, dimension: isize) -> Self {
        self.expand_dimension = dimension;
        self
    }

    pub fn field_name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self) -> &'static Attr {
        self.attr
    }

    pub fn expand_dimension(&self) -> isize {
        self.expand_dimension
    }

    /// Overwrite the dataset and recompute its cached metadata
    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        let value = self.attr.validate(value)?;
        if value.is_none() {
            return Ok(());
        }
        let data = value.into_array(&self.name)?;
        storage.store_data(&self.name, &data)?;
        storage.set_metadata(DataSetMetaData::from_array(&data).to_dict(), Some(&self.name))
    }

    /// Grow along the expand dimension and merge the chunk's bounds into the cache
    pub fn append(
        &self,
        storage: &mut dyn StorageManager,
        data: &ArrayData,
        close_file: bool,
    ) -> Result<()> {
        storage.append_data(&self.name, data, self.expand_dimension, false)?;

        let new_meta = DataSetMetaData::from_array(data);
        let cached = storage.get_metadata(Some(&self.name))?;
        let meta = if cached.is_empty() {
            // fresh dataset, nothing to merge
            new_meta
        } else {
            let mut meta = DataSetMetaData::from_dict(&cached);
            meta.merge(&new_meta);
            meta
        };
        storage.set_metadata(meta.to_dict(), Some(&self.name))?;
        debug!("Appended {:?} to {} (bounds {:?})", data.shape(), self.name, meta);

        if close_file {
            storage.close_file()?;
        }
        Ok(())
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<ArrayData> {
        storage.get_data(&self.name, None)
    }

    /// A sub-array, without loading the rest
    pub fn slice(&self, storage: &mut dyn StorageManager, slice: &[Slice]) -> Result<ArrayData> {
        storage.get_data(&self.name, Some(slice))
    }

    pub fn shape(&self, storage: &mut dyn StorageManager) -> Result<Vec<usize>> {
        storage.get_data_shape(&self.name)
    }

    /// Last persisted bounds, read without touching the array
    pub fn get_cached_metadata(&self, storage: &mut dyn StorageManager) -> Result<DataSetMetaData> {
        Ok(DataSetMetaData::from_dict(&storage.get_metadata(Some(&self.name))?))
    }
}

pub const SPARSE_FORMAT_KEY: &str = "format";
pub const SPARSE_ROWS_KEY: &str = "rows";
pub const SPARSE_COLS_KEY: &str = "cols";

/// A CSR matrix split over three datasets: `<name>_data`, `<name>_indices`, `<name>_indptr`
#[derive(Debug, Clone)]
pub struct SparseDataSet {
    attr: &'static Attr,
    name: String,
}

impl SparseDataSet {
    pub fn new(attr: &'static Attr, name: Option<&str>) -> Result<Self> {
        Ok(Self {
            attr,
            name: resolve_name(attr, name)?,
        })
    }

    pub fn field_name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self) -> &'static Attr {
        self.attr
    }

    pub fn data_name(&self) -> String {
        format!("{}_data", self.name)
    }

    pub fn indices_name(&self) -> String {
        format!("{}_indices", self.name)
    }

    pub fn indptr_name(&self) -> String {
        format!("{}_indptr", self.name)
    }

    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        let value = self.attr.validate(value)?;
        if value.is_none() {
            return Ok(());
        }
        let matrix = value.into_sparse(&self.name)?;
        let as_i64 = |v: &[usize]| -> ArrayData {
            Array1::from_iter(v.iter().map(|&i| i as i64)).into()
        };

        let data: ArrayData = Array1::from(matrix.data().to_vec()).into();
        storage.store_data(&self.data_name(), &data)?;
        storage.store_data(&self.indices_name(), &as_i64(matrix.indices()))?;
        storage.store_data(&self.indptr_name(), &as_i64(matrix.indptr()))?;

        let (rows, cols) = matrix.shape();
        let mut meta = DataSetMetaData::from_array(&data).to_dict();
        meta.insert(SPARSE_FORMAT_KEY.to_string(), MetaValue::from("csr"));
        meta.insert(SPARSE_ROWS_KEY.to_string(), MetaValue::Int(rows as i64));
        meta.insert(SPARSE_COLS_KEY.to_string(), MetaValue::Int(cols as i64));
        storage.set_metadata(meta, Some(&self.data_name()))
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<SparseMatrix> {
        let meta = storage.get_metadata(Some(&self.data_name()))?;
        let dim = |key: &str| -> Result<usize> {
            meta.get(key)
                .and_then(MetaValue::as_i64)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| H5Error::MissingMetadata {
                    key: format!("{}.{}", self.data_name(), key),
                })
        };
        let shape = (dim(SPARSE_ROWS_KEY)?, dim(SPARSE_COLS_KEY)?);

        let data: Vec<f64> = match storage.get_data(&self.data_name(), None)?.to_float() {
            Some(a) => a.iter().copied().collect(),
            None => {
                return Err(H5Error::validation(&self.name, "sparse values must be numeric"));
            }
        };
        let indices = self.load_index(storage, &self.indices_name())?;
        let indptr = self.load_index(storage, &self.indptr_name())?;

        SparseMatrix::from_csr(shape, data, indices, indptr)
    }

    fn load_index(&self, storage: &mut dyn StorageManager, name: &str) -> Result<Vec<usize>> {
        match storage.get_data(name, None)? {
            ArrayData::Int(a) => a
                .iter()
                .map(|&i| {
                    usize::try_from(i).map_err(|_| {
                        H5Error::validation(name, format!("negative index {}", i))
                    })
                })
                .collect(),
            other => Err(H5Error::validation(
                name,
                format!("expected integer indices, found {:?}", other.dtype()),
            )),
        }
    }

    /// Cached bounds of the stored non-zero values
    pub fn get_cached_metadata(&self, storage: &mut dyn StorageManager) -> Result<DataSetMetaData> {
        Ok(DataSetMetaData::from_dict(&storage.get_metadata(Some(&self.data_name()))?))
    }
}

/// Every accessor kind a file descriptor may declare
#[derive(Debug, Clone)]
pub enum Accessor {
    Scalar(Scalar),
    Uuid(UuidScalar),
    Reference(Reference),
    DataSet(DataSet),
    SparseMatrix(SparseDataSet),
}

impl Accessor {
    pub fn field_name(&self) -> &str {
        match self {
            Accessor::Scalar(a) => a.field_name(),
            Accessor::Uuid(a) => a.field_name(),
            Accessor::Reference(a) => a.field_name(),
            Accessor::DataSet(a) => a.field_name(),
            Accessor::SparseMatrix(a) => a.field_name(),
        }
    }

    pub fn attr(&self) -> &'static Attr {
        match self {
            Accessor::Scalar(a) => a.attr(),
            Accessor::Uuid(a) => a.attr(),
            Accessor::Reference(a) => a.attr(),
            Accessor::DataSet(a) => a.attr(),
            Accessor::SparseMatrix(a) => a.attr(),
        }
    }

    /// Scalars, identities and references all live in root metadata
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Accessor::Scalar(_) | Accessor::Uuid(_) | Accessor::Reference(_)
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Accessor::Reference(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Accessor::Scalar(_) => "Scalar",
            Accessor::Uuid(_) => "Uuid",
            Accessor::Reference(_) => "Reference",
            Accessor::DataSet(_) => "DataSet",
            Accessor::SparseMatrix(_) => "SparseMatrix",
        }
    }

    pub fn store(&self, storage: &mut dyn StorageManager, value: Value) -> Result<()> {
        match self {
            Accessor::Scalar(a) => a.store(storage, value),
            Accessor::Uuid(a) => a.store(storage, value),
            Accessor::Reference(a) => a.store(storage, value),
            Accessor::DataSet(a) => a.store(storage, value),
            Accessor::SparseMatrix(a) => a.store(storage, value),
        }
    }

    pub fn load(&self, storage: &mut dyn StorageManager) -> Result<Value> {
        Ok(match self {
            Accessor::Scalar(a) => a.load(storage)?,
            Accessor::Uuid(a) => Value::Gid(a.load(storage)?),
            Accessor::Reference(a) => Value::Gid(a.load(storage)?),
            Accessor::DataSet(a) => Value::Array(a.load(storage)?),
            Accessor::SparseMatrix(a) => Value::Sparse(a.load(storage)?),
        })
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, name=\"{}\")", self.kind(), self.attr(), self.field_name())
    }
}

impl From<Scalar> for Accessor {
    fn from(a: Scalar) -> Self {
        Accessor::Scalar(a)
    }
}

impl From<UuidScalar> for Accessor {
    fn from(a: UuidScalar) -> Self {
        Accessor::Uuid(a)
    }
}

impl From<Reference> for Accessor {
    fn from(a: Reference) -> Self {
        Accessor::Reference(a)
    }
}

impl From<DataSet> for Accessor {
    fn from(a: DataSet) -> Self {
        Accessor::DataSet(a)
    }
}

impl From<SparseDataSet> for Accessor {
    fn from(a: SparseDataSet) -> Self {
        Accessor::SparseMatrix(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neotraits::{AttrKind, DType, HasTraits};
    use crate::storage::MemoryStorage;
    use lazy_static::lazy_static;
    use ndarray::array;

    lazy_static! {
        static ref TITLE: Attr = Attr::field("title", AttrKind::Str);
        static ref LINK: Attr = Attr::field("link", AttrKind::Gid).optional();
        static ref PARENT: Attr =
            Attr::field("parent", AttrKind::Reference { target: "Node" }).optional();
        static ref MATRIX: Attr = Attr::array("matrix", DType::Float, 2);
        static ref LABELS: Attr = Attr::array("labels", DType::Text, 1).optional();
        static ref WEIGHTS: Attr = Attr::field("weights", AttrKind::Sparse);
        static ref ANON: Attr = Attr::new(AttrKind::Int);
    }

    #[derive(Debug)]
    struct Node {
        gid: Uuid,
    }

    impl HasTraits for Node {
        fn type_name(&self) -> &'static str {
            "Node"
        }
        fn gid(&self) -> Uuid {
            self.gid
        }
        fn get_attr(&self, _field: &str) -> Option<Value> {
            None
        }
        fn set_attr(&mut self, field: &str, _value: Value) -> Result<()> {
            Err(H5Error::validation(field, "read only"))
        }
    }

    #[test]
    fn test_independent_accessor_needs_name() {
        assert!(matches!(
            Scalar::new(&ANON, None),
            Err(H5Error::UnnamedAccessor { .. })
        ));
        assert!(Scalar::new(&ANON, Some("")).is_err());
        assert_eq!(Scalar::new(&ANON, Some("count")).unwrap().field_name(), "count");
        assert_eq!(Scalar::new(&TITLE, None).unwrap().field_name(), "title");
    }

    #[test]
    fn test_scalar_round_trip_and_validation() {
        let mut storage = MemoryStorage::new();
        let title = Scalar::new(&TITLE, None).unwrap();
        title.store(&mut storage, Value::from("net1")).unwrap();
        assert_eq!(title.load(&mut storage).unwrap(), Value::from("net1"));

        assert!(matches!(
            title.store(&mut storage, Value::Int(3)),
            Err(H5Error::Validation { .. })
        ));
    }

    #[test]
    fn test_uuid_is_stored_as_urn() {
        let mut storage = MemoryStorage::new();
        let link = UuidScalar::new(&LINK, None).unwrap();
        let gid = Uuid::new_v4();
        link.store(&mut storage, Value::Gid(gid)).unwrap();

        let raw = storage.get_metadata(None).unwrap()["link"].clone();
        assert_eq!(raw, MetaValue::Str(format!("urn:uuid:{}", gid)));
        assert_eq!(link.load(&mut storage).unwrap(), gid);
    }

    #[test]
    fn test_uuid_optional_none_is_noop_and_wrong_type_fails() {
        let mut storage = MemoryStorage::new();
        let link = UuidScalar::new(&LINK, None).unwrap();
        link.store(&mut storage, Value::None).unwrap();
        assert!(storage.get_metadata(None).unwrap().is_empty());

        assert!(matches!(
            link.store(&mut storage, Value::from("not-a-uuid")),
            Err(H5Error::Type { .. })
        ));
    }

    #[test]
    fn test_reference_accepts_entity() {
        let mut storage = MemoryStorage::new();
        let parent = Reference::new(&PARENT, None).unwrap();
        let node = Node { gid: Uuid::new_v4() };
        parent
            .store(&mut storage, Value::Entity(Arc::new(Node { gid: node.gid })))
            .unwrap();
        assert_eq!(parent.load(&mut storage).unwrap(), node.gid);

        assert!(matches!(
            parent.store(&mut storage, Value::Float(1.0)),
            Err(H5Error::Type { .. })
        ));
    }

    #[test]
    fn test_dataset_store_append_slice() {
        let mut storage = MemoryStorage::new();
        let matrix = DataSet::new(&MATRIX, None).unwrap().with_expand_dimension(0);

        matrix
            .store(&mut storage, Value::Array(array![[1.0, 2.0], [3.0, 4.0]].into()))
            .unwrap();
        matrix
            .append(&mut storage, &array![[5.0, 6.0]].into(), true)
            .unwrap();

        assert_eq!(matrix.shape(&mut storage).unwrap(), vec![3, 2]);
        assert_eq!(
            matrix.load(&mut storage).unwrap(),
            ArrayData::from(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])
        );
        assert_eq!(
            matrix.slice(&mut storage, &[Slice::from(2..)]).unwrap(),
            ArrayData::from(array![[5.0, 6.0]])
        );
        assert_eq!(
            matrix.get_cached_metadata(&mut storage).unwrap(),
            DataSetMetaData::new(Some(1.0), Some(6.0))
        );
    }

    #[test]
    fn test_store_overwrites_cache() {
        let mut storage = MemoryStorage::new();
        let matrix = DataSet::new(&MATRIX, None).unwrap();
        matrix.store(&mut storage, Value::Array(array![[100.0]].into())).unwrap();
        matrix.store(&mut storage, Value::Array(array![[1.0, 2.0]].into())).unwrap();
        assert_eq!(
            matrix.get_cached_metadata(&mut storage).unwrap(),
            DataSetMetaData::new(Some(1.0), Some(2.0))
        );
    }

    #[test]
    fn test_optional_dataset_absent_is_noop_required_fails() {
        let mut storage = MemoryStorage::new();
        let labels = DataSet::new(&LABELS, None).unwrap();
        labels.store(&mut storage, Value::None).unwrap();
        assert!(!storage.has_dataset("labels").unwrap());

        let matrix = DataSet::new(&MATRIX, None).unwrap();
        assert!(matrix.store(&mut storage, Value::None).is_err());
        assert!(matches!(
            matrix.load(&mut storage),
            Err(H5Error::MissingDataSet { .. })
        ));
    }

    #[test]
    fn test_sparse_round_trip() {
        let mut storage = MemoryStorage::new();
        let weights = SparseDataSet::new(&WEIGHTS, None).unwrap();
        let m = SparseMatrix::from_triplets((3, 4), &[(0, 3, 2.0), (2, 1, -1.0)]).unwrap();
        weights.store(&mut storage, Value::Sparse(m.clone())).unwrap();

        assert_eq!(weights.load(&mut storage).unwrap(), m);
        assert_eq!(
            weights.get_cached_metadata(&mut storage).unwrap(),
            DataSetMetaData::new(Some(-1.0), Some(2.0))
        );
        let mut names = storage.dataset_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["weights_data", "weights_indices", "weights_indptr"]);
    }
}
