//! Access to raw `.dbc` file bytes

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::dbc::DbcHeader;
use crate::error::{Error, Result};

pub const DBC_EXTENSION: &str = "dbc";

/// Where table files come from
pub trait TableSource: Send + Sync {
    /// Whole file image for `name`, `NotFound` when absent
    fn read_table(&self, name: &str) -> Result<Vec<u8>>;

    /// The first [`DbcHeader::SIZE`] bytes (fewer if the file is shorter)
    fn read_header(&self, name: &str) -> Result<Vec<u8>> {
        let mut data = self.read_table(name)?;
        data.truncate(DbcHeader::SIZE);
        Ok(data)
    }

    fn contains(&self, name: &str) -> bool;

    /// Names of the available tables, sorted
    fn table_files(&self) -> Vec<String>;
}

/// `<root>/<name>.dbc` files
///
/// Names are matched case-sensitively against the directory listing, so the
/// behaviour is the same on case-insensitive file systems.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error::NotFound(format!("table file {}", name)));
        }
        let file_name = format!("{}.{}", name, DBC_EXTENSION);
        let entries = fs::read_dir(&self.root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("dbc directory {}", self.root.display()))
            }
            _ => Error::Io(e),
        })?;
        let exists = entries
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name().to_str() == Some(file_name.as_str()));
        if exists {
            Ok(self.root.join(file_name))
        } else {
            Err(Error::NotFound(format!(
                "table file {}",
                self.root.join(file_name).display()
            )))
        }
    }
}

impl TableSource for DirectorySource {
    fn read_table(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        Ok(fs::read(path)?)
    }

    fn read_header(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        let mut data = Vec::with_capacity(DbcHeader::SIZE);
        File::open(path)?
            .take(DbcHeader::SIZE as u64)
            .read_to_end(&mut data)?;
        Ok(data)
    }

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    fn table_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(DBC_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }
}

/// In-memory table images
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, data: Vec<u8>) {
        self.tables.write().insert(name.into(), data);
    }
}

impl TableSource for MemorySource {
    fn read_table(&self, name: &str) -> Result<Vec<u8>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("table file {}", name)))
    }

    fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    fn table_files(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}
