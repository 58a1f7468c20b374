//! H5 file descriptors
//!
//! An [`H5File`] owns one storage manager and the closed list of accessors
//! that make up a file format. Lifecycle:
//! 1. constructed: path bound and locked, accessors registered
//! 2. active: `store` / `load_into` / `gather_references` any number of times
//! 3. closed: `written_by` tag written, storage closed, path released
//!
//! `close` consumes the file; dropping an unclosed file closes it implicitly.
//!
//! Known limitation: there is no transactional rollback. A failure in the
//! middle of `store` can leave the container partially written.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use lazy_static::lazy_static;
use ndarray::Slice;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accessor::{Accessor, DataSet, Scalar, UuidScalar};
use super::metadata::DataSetMetaData;
use crate::config::StorageConfig;
use crate::error::{H5Error, Result};
use crate::neotraits::{ArrayData, Attr, AttrKind, HasTraits, Value, GID};
use crate::storage::{ContainerStorage, MetaValue, Metadata, StorageManager};

pub const WRITTEN_BY_KEY: &str = "written_by";

lazy_static! {
    static ref WRITTEN_BY: Attr =
        Attr::new(AttrKind::Str).with_doc("Descriptor type that produced the file");
    static ref OPEN_PATHS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Exclusive claim on a path for the lifetime of one descriptor.
///
/// Within this process the claim is keyed on the path with its parent
/// directory canonicalized, so aliases like `dir/sub/../a.h5` collide with
/// `dir/a.h5`. Container-backed files additionally hold an advisory lock on
/// a sibling `<name>.lock` file, which other processes observe.
#[derive(Debug)]
pub(crate) struct PathLock {
    key: PathBuf,
    file: Option<File>,
}

impl PathLock {
    /// Claim `path` within this process only
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let key = lock_key(path)?;
        let mut open = OPEN_PATHS.lock().unwrap_or_else(|e| e.into_inner());
        if !open.insert(key.clone()) {
            return Err(H5Error::AlreadyOpen(path.to_path_buf()));
        }
        Ok(Self { key, file: None })
    }

    /// Claim `path` within this process and lock its sibling lock file
    pub(crate) fn acquire_exclusive(path: &Path) -> Result<Self> {
        let absolute = absolute(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock = Self::acquire(path)?;
        let lock_path = lock_file_path(&lock.key);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if is_contended(&e) => {
                debug!("{:?} is held by another process", lock_path);
                return Err(H5Error::AlreadyOpen(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }
        lock.file = Some(file);
        Ok(lock)
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
        OPEN_PATHS
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// Sibling file holding the cross-process lock for the container at `path`
pub fn lock_file_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn lock_key(path: &Path) -> Result<PathBuf> {
    let absolute = absolute(path)?;
    let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
        return Ok(absolute);
    };
    // parents that do not exist yet keep their lexical spelling
    Ok(match parent.canonicalize() {
        Ok(parent) => parent.join(name),
        Err(_) => absolute,
    })
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

pub struct H5File {
    path: PathBuf,
    written_by: &'static str,
    storage: Box<dyn StorageManager>,
    accessors: Vec<Accessor>,
    lock: Option<PathLock>,
}

impl H5File {
    /// Bind a container on disk. The universal `gid` and `written_by`
    /// accessors are registered ahead of `accessors`.
    pub fn open(
        path: impl AsRef<Path>,
        written_by: &'static str,
        accessors: Vec<Accessor>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let storage = ContainerStorage::new(path, StorageConfig::from_env());
        Self::bind(
            path,
            written_by,
            accessors,
            Box::new(storage),
            PathLock::acquire_exclusive,
        )
    }

    /// Bind any storage manager. The path is claimed within this process only.
    pub fn with_storage(
        path: impl AsRef<Path>,
        written_by: &'static str,
        accessors: Vec<Accessor>,
        storage: Box<dyn StorageManager>,
    ) -> Result<Self> {
        Self::bind(path.as_ref(), written_by, accessors, storage, PathLock::acquire)
    }

    fn bind(
        path: &Path,
        written_by: &'static str,
        accessors: Vec<Accessor>,
        storage: Box<dyn StorageManager>,
        acquire: fn(&Path) -> Result<PathLock>,
    ) -> Result<Self> {
        let path = path.to_path_buf();

        let mut all: Vec<Accessor> = vec![
            UuidScalar::new(&GID, None)?.into(),
            Scalar::new(&WRITTEN_BY, Some(WRITTEN_BY_KEY))?.into(),
        ];
        all.extend(accessors);

        let mut seen = HashSet::new();
        for accessor in &all {
            if !seen.insert(accessor.field_name()) {
                return Err(H5Error::validation(
                    accessor.field_name(),
                    format!("declared twice in {}", written_by),
                ));
            }
        }

        let lock = acquire(&path)?;
        info!("Opened {} at {:?} ({} accessors)", written_by, path, all.len());

        Ok(Self {
            path,
            written_by,
            storage,
            accessors: all,
            lock: Some(lock),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The tag this descriptor writes into `written_by`
    pub fn format(&self) -> &'static str {
        self.written_by
    }

    pub fn iter_accessors(&self) -> impl Iterator<Item = &Accessor> {
        self.accessors.iter()
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.iter().find(|a| a.field_name() == name)
    }

    pub fn storage_mut(&mut self) -> &mut dyn StorageManager {
        &mut *self.storage
    }

    /// Root metadata map: every scalar, identity and the `written_by` tag
    pub fn get_metadata(&mut self) -> Result<Metadata> {
        self.storage.get_metadata(None)
    }

    pub fn gid(&mut self) -> Result<Uuid> {
        match self.load_value(GID.field_name().unwrap_or("gid"))? {
            Value::Gid(gid) => Ok(gid),
            other => Err(H5Error::Type {
                expected: "uuid",
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Store through the accessor named `name`
    pub fn store_value(&mut self, name: &str, value: Value) -> Result<()> {
        let accessor = find(&self.accessors, self.written_by, name)?;
        accessor.store(&mut *self.storage, value)
    }

    /// Load through the accessor named `name`
    pub fn load_value(&mut self, name: &str) -> Result<Value> {
        let accessor = find(&self.accessors, self.written_by, name)?;
        accessor.load(&mut *self.storage)
    }

    /// Array-level operations on the data set accessor named `name`
    pub fn dataset(&mut self, name: &str) -> Result<DataSetHandle<'_>> {
        let accessor = self
            .accessors
            .iter()
            .find_map(|a| match a {
                Accessor::DataSet(d) if d.field_name() == name => Some(d),
                _ => None,
            })
            .ok_or_else(|| H5Error::UnknownAccessor {
                descriptor: self.written_by.to_string(),
                kind: "DataSet",
                name: name.to_string(),
            })?;
        Ok(DataSetHandle {
            accessor,
            storage: &mut *self.storage,
        })
    }

    /// Fail with a contract mismatch if `entity` lacks any field bound by an accessor
    pub fn check_entity(&self, entity: &dyn HasTraits) -> Result<()> {
        for accessor in &self.accessors {
            if let Some(field) = accessor.attr().field_name() {
                if entity.get_attr(field).is_none() {
                    return Err(H5Error::ContractMismatch {
                        accessor: accessor.to_string(),
                        field: field.to_string(),
                        entity: format!("{}({})", entity.type_name(), entity.gid()),
                        descriptor: self.written_by.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Write every bound field of `entity`.
    ///
    /// Independent accessors (no field name) are skipped. With `scalars_only`
    /// only root-metadata accessors are written, leaving arrays untouched.
    pub fn store(&mut self, entity: &dyn HasTraits, scalars_only: bool) -> Result<()> {
        self.check_entity(entity)?;
        entity.validate()?;

        for accessor in &self.accessors {
            let Some(field) = accessor.attr().field_name() else {
                continue;
            };
            if scalars_only && !accessor.is_scalar() {
                continue;
            }
            let value = entity.get_attr(field).unwrap_or(Value::None);
            debug!("Storing {} from {}.{}", accessor, entity.type_name(), field);
            accessor.store(&mut *self.storage, value)?;
        }
        Ok(())
    }

    /// Read every bound field into `entity`.
    ///
    /// References are never followed. Missing data for an optional field
    /// leaves the entity field at its default (or prior) value; missing
    /// data for a required field is an error.
    pub fn load_into(&mut self, entity: &mut dyn HasTraits) -> Result<()> {
        self.check_entity(entity)?;

        for accessor in &self.accessors {
            if accessor.is_reference() {
                continue;
            }
            let Some(field) = accessor.attr().field_name() else {
                continue;
            };

            let value = match accessor.load(&mut *self.storage) {
                Ok(value) => value,
                Err(e) if e.is_missing_data() && !accessor.attr().required() => {
                    debug!("{} is optional and missing from {:?}", accessor, self.path);
                    match accessor.attr().default_value() {
                        Some(default) => default.clone(),
                        None => continue,
                    }
                }
                Err(e) => return Err(e),
            };
            entity.set_attr(field, value)?;
        }
        Ok(())
    }

    /// `(field, gid)` for every reference accessor; `None` for absent optional references
    pub fn gather_references(&mut self) -> Result<Vec<(String, Option<Uuid>)>> {
        let mut references = Vec::new();
        for accessor in &self.accessors {
            let Accessor::Reference(reference) = accessor else {
                continue;
            };
            let gid = match reference.load(&mut *self.storage) {
                Ok(gid) => Some(gid),
                Err(e) if e.is_missing_data() && !reference.attr().required() => None,
                Err(e) => return Err(e),
            };
            references.push((reference.field_name().to_string(), gid));
        }
        Ok(references)
    }

    /// Write the `written_by` tag and close the storage manager
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.lock.is_none() {
            return Ok(());
        }

        let result = self.write_tag().and_then(|_| self.storage.close_file());
        self.lock = None;
        info!("Closed {} at {:?}", self.written_by, self.path);
        result
    }

    fn write_tag(&mut self) -> Result<()> {
        let current = self.storage.get_metadata(None)?.remove(WRITTEN_BY_KEY);
        if current.as_ref().and_then(MetaValue::as_str) == Some(self.written_by) {
            return Ok(());
        }
        self.store_value(WRITTEN_BY_KEY, Value::from(self.written_by))
    }
}

fn find<'a>(accessors: &'a [Accessor], written_by: &str, name: &str) -> Result<&'a Accessor> {
    accessors
        .iter()
        .find(|a| a.field_name() == name)
        .ok_or_else(|| H5Error::UnknownAccessor {
            descriptor: written_by.to_string(),
            kind: "any",
            name: name.to_string(),
        })
}

impl Drop for H5File {
    fn drop(&mut self) {
        if self.lock.is_some() {
            warn!("{} at {:?} dropped without close, closing", self.written_by, self.path);
            if let Err(e) = self.finish() {
                warn!("Implicit close of {:?} failed: {}", self.path, e);
            }
        }
    }
}

impl std::fmt::Debug for H5File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}(\"{}\")>", self.written_by, self.path.display())
    }
}

/// A data set accessor together with the storage it reads and writes
pub struct DataSetHandle<'a> {
    accessor: &'a DataSet,
    storage: &'a mut dyn StorageManager,
}

impl<'a> DataSetHandle<'a> {
    pub fn accessor(&self) -> &DataSet {
        self.accessor
    }

    pub fn store(&mut self, data: impl Into<ArrayData>) -> Result<()> {
        self.accessor.store(self.storage, Value::Array(data.into()))
    }

    pub fn append(&mut self, data: impl Into<ArrayData>, close_file: bool) -> Result<()> {
        self.accessor.append(self.storage, &data.into(), close_file)
    }

    pub fn load(&mut self) -> Result<ArrayData> {
        self.accessor.load(self.storage)
    }

    pub fn slice(&mut self, slice: &[Slice]) -> Result<ArrayData> {
        self.accessor.slice(self.storage, slice)
    }

    pub fn shape(&mut self) -> Result<Vec<usize>> {
        self.accessor.shape(self.storage)
    }

    pub fn get_cached_metadata(&mut self) -> Result<DataSetMetaData> {
        self.accessor.get_cached_metadata(self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn scratch(path: &str) -> Result<H5File> {
        H5File::with_storage(path, "test::Scratch", vec![], Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_universal_accessors_present() -> Result<()> {
        let file = scratch("/scratch/universal.h5")?;
        assert!(matches!(file.accessor("gid"), Some(Accessor::Uuid(_))));
        assert!(matches!(file.accessor("written_by"), Some(Accessor::Scalar(_))));
        file.close()
    }

    #[test]
    fn test_same_path_cannot_be_opened_twice() -> Result<()> {
        let first = scratch("/scratch/locked.h5")?;
        assert!(matches!(
            scratch("/scratch/locked.h5"),
            Err(H5Error::AlreadyOpen(_))
        ));
        first.close()?;
        scratch("/scratch/locked.h5")?.close()
    }

    #[test]
    fn test_drop_releases_path() -> Result<()> {
        {
            let _file = scratch("/scratch/dropped.h5")?;
        }
        scratch("/scratch/dropped.h5")?.close()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        lazy_static! {
            static ref COUNT: Attr = Attr::new(AttrKind::Int);
        }
        let accessors = vec![
            Scalar::new(&COUNT, Some("n")).unwrap().into(),
            Scalar::new(&COUNT, Some("n")).unwrap().into(),
        ];
        let result = H5File::with_storage(
            "/scratch/dup.h5",
            "test::Dup",
            accessors,
            Box::new(MemoryStorage::new()),
        );
        assert!(matches!(result, Err(H5Error::Validation { .. })));
    }

    #[test]
    fn test_unknown_dataset_handle() -> Result<()> {
        let mut file = scratch("/scratch/unknown.h5")?;
        assert!(matches!(
            file.dataset("nope"),
            Err(H5Error::UnknownAccessor { .. })
        ));
        file.close()
    }
}
