//! The flat byte store that replay artifacts and index snapshots live in.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use awbw_integrations::Log;

use crate::StorageError;

/// A flat namespace of named byte blobs.
///
/// Writes must be atomic: a reader never observes a half-written entry.
pub trait ReplayStorage: Send + Sync {
    /// Names of every entry, in no particular order.
    fn list(&self) -> Result<Vec<String>, StorageError>;

    fn exists(&self, name: &str) -> bool;

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Stores entries as files in a single directory.
#[derive(Clone, Debug)]
pub struct FolderStorage {
    root: Arc<PathBuf>,
}

impl FolderStorage {
    /// Uses `root` as the store, creating it if needed.
    pub fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            operation: "create",
            name: root.display().to_string(),
            source,
        })?;

        tracing::info!(target: Log::Catalog, path = ?root, "Using replay folder");

        Ok(Self { root: Arc::new(root) })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn io_error<'a>(operation: &'static str, name: &'a str) -> impl FnOnce(io::Error) -> StorageError + 'a {
    move |source| match source.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
        _ => StorageError::Io {
            operation,
            name: name.to_string(),
            source,
        },
    }
}

impl ReplayStorage for FolderStorage {
    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(self.root()).map_err(io_error("list", "."))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error("list", "."))?;

            if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                continue;
            }

            // Names that aren't valid UTF-8 can't be replay ids anyway.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path(name)).map_err(io_error("read", name))
    }

    /// Writes to a sibling temp file and renames it over the target.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.path(name);
        let temp = self.path(&format!("{name}.tmp"));

        let file = fs::File::create(&temp).map_err(io_error("create", name))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(bytes).map_err(io_error("write", name))?;

        let file = writer
            .into_inner()
            .map_err(|error| io_error("flush", name)(error.into_error()))?;
        file.sync_all().map_err(io_error("flush", name))?;

        fs::rename(&temp, &target).map_err(|source| {
            let _ = fs::remove_file(&temp);
            io_error("replace", name)(source)
        })
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.path(name)).map_err(io_error("delete", name))
    }
}

/// Keeps entries in memory. Clones share the same entries, so a test can keep a
/// handle and inspect what the catalog wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayStorage for MemoryStorage {
    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().expect("Unable to lock memory storage");
        Ok(entries.keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> bool {
        let entries = self.entries.lock().expect("Unable to lock memory storage");
        entries.contains_key(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let entries = self.entries.lock().expect("Unable to lock memory storage");

        entries
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("Unable to lock memory storage");
        entries.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("Unable to lock memory storage");

        match entries.remove(name) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(name.to_string())),
        }
    }
}
