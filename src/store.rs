//! File store seam: where uploaded images are looked up and read.
//!
//! The pipeline treats report paths as opaque strings and only ever asks
//! the store two questions: does this path exist, and give me its bytes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// Read-only access to uploaded files.
///
/// Implementations must be `Send + Sync`: images are read from blocking
/// worker threads concurrently.
pub trait FileStore: Send + Sync {
    /// Whether `path` exists.
    fn exists(&self, path: &str) -> bool;

    /// Open `path` for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// The local filesystem, optionally rooted at a base directory.
///
/// Relative report paths (`uploads/ship1.jpg`) resolve against `base_dir`
/// when one is set, otherwise against the process working directory.
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore {
    base_dir: Option<PathBuf>,
}

impl LocalFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    /// Filesystem location a report path refers to.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        match &self.base_dir {
            Some(base) if p.is_relative() => base.join(p),
            _ => p.to_path_buf(),
        }
    }
}

impl FileStore for LocalFileStore {
    fn exists(&self, path: &str) -> bool {
        !path.is_empty() && self.resolve(path).exists()
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.resolve(path))?))
    }
}

/// In-memory store keyed by report path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl FileStore for MemoryFileStore {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        self.files
            .get(path)
            .map(|b| Box::new(Cursor::new(b.clone())) as Box<dyn Read + Send>)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}
