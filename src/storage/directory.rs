//! Directory abstraction for the storage substrate.
//!
//! Mirrors `rank-retrieve`'s persistence-layer `Directory` trait: same
//! create/open/append/atomic-rename/atomic-write surface, trimmed to what
//! `storage::fs` actually needs (no `list_dir`/`file_path`, since this
//! crate never memory-maps or enumerates a directory's contents itself).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::{IndexError, IndexResult};

/// Storage backend abstraction: filesystem, in-memory, or anything else that
/// can create/open/append/rename named byte streams.
pub trait Directory: Send + Sync {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write>>;
    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read>>;
    fn exists(&self, path: &str) -> bool;
    fn delete(&self, path: &str) -> IndexResult<()>;
    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()>;
    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write>>;

    /// Write via a temp file + fsync + rename, so a crash mid-write never
    /// leaves `path` holding a half-written file.
    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()>;
}

/// Filesystem-backed directory rooted at a fixed path.
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> IndexResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Directory for FsDirectory {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write>> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Box::new(std::fs::File::create(full_path)?))
    }

    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read>> {
        Ok(Box::new(std::fs::File::open(self.resolve(path))?))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn delete(&self, path: &str) -> IndexResult<()> {
        let full_path = self.resolve(path);
        if full_path.is_dir() {
            std::fs::remove_dir_all(full_path)?;
        } else {
            std::fs::remove_file(full_path)?;
        }
        Ok(())
    }

    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()> {
        let to_path = self.resolve(to);
        if let Some(parent) = to_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(self.resolve(from), to_path)?;
        Ok(())
    }

    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write>> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)?;
        Ok(Box::new(file))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        let temp_path = format!("{path}.tmp");
        let full_temp_path = self.resolve(&temp_path);
        if let Some(parent) = full_temp_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut temp_file = std::fs::File::create(&full_temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;

        let full_path = self.resolve(path);
        std::fs::rename(&full_temp_path, &full_path)?;
        if let Some(parent) = full_path.parent() {
            if let Ok(parent_file) = std::fs::File::open(parent) {
                let _ = parent_file.sync_all();
            }
        }
        Ok(())
    }
}

/// In-memory directory, for tests that exercise `storage::fs` without
/// touching the filesystem.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for MemoryDirectory {
    fn create_file(&self, path: &str) -> IndexResult<Box<dyn Write>> {
        Ok(Box::new(MemoryWriter {
            files: self.files.clone(),
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn open_file(&self, path: &str) -> IndexResult<Box<dyn Read>> {
        let files = self.files.read().unwrap();
        let data = files
            .get(path)
            .ok_or_else(|| IndexError::NotFound(path.to_string()))?
            .clone();
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn delete(&self, path: &str) -> IndexResult<()> {
        self.files.write().unwrap().remove(path);
        Ok(())
    }

    fn atomic_rename(&self, from: &str, to: &str) -> IndexResult<()> {
        let mut files = self.files.write().unwrap();
        if let Some(data) = files.remove(from) {
            files.insert(to.to_string(), data);
        }
        Ok(())
    }

    fn append_file(&self, path: &str) -> IndexResult<Box<dyn Write>> {
        let existing = self.files.read().unwrap().get(path).cloned().unwrap_or_default();
        Ok(Box::new(MemoryWriter {
            files: self.files.clone(),
            path: path.to_string(),
            buffer: existing,
        }))
    }

    fn atomic_write(&self, path: &str, data: &[u8]) -> IndexResult<()> {
        self.files.write().unwrap().insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

struct MemoryWriter {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.files.write().unwrap().insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_directory_round_trips_and_renames() {
        let temp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::new(temp.path()).unwrap();

        let mut file = dir.create_file("a.bin").unwrap();
        file.write_all(b"hello").unwrap();
        drop(file);

        let mut contents = String::new();
        dir.open_file("a.bin").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");

        dir.atomic_rename("a.bin", "b.bin").unwrap();
        assert!(!dir.exists("a.bin"));
        assert!(dir.exists("b.bin"));

        dir.delete("b.bin").unwrap();
        assert!(!dir.exists("b.bin"));
    }

    #[test]
    fn memory_directory_append_accumulates() {
        let dir = MemoryDirectory::new();
        dir.create_file("x").unwrap().write_all(b"12").unwrap();
        dir.append_file("x").unwrap().write_all(b"34").unwrap();

        let mut contents = String::new();
        dir.open_file("x").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "1234");
    }

    #[test]
    fn atomic_write_is_all_or_nothing() {
        let dir = MemoryDirectory::new();
        dir.atomic_write("y", b"payload").unwrap();
        let mut contents = String::new();
        dir.open_file("y").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "payload");
    }
}
