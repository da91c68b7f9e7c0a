use std::{
    collections::HashMap,
    fs::File,
    io::{self, Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::trace;

use crate::{Error, Result};

/// A readable, seekable byte stream handed out by an [`ImportSource`].
pub trait SourceStream: Read + Seek {
    /// Total size of the stream in bytes.
    fn size(&mut self) -> Result<u64> {
        let position = self.stream_position()?;
        let size = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(position))?;
        Ok(size)
    }
}

impl<T> SourceStream for T where T: Read + Seek {}

/// Abstraction over the place model files are read from.
///
/// The importer and all format decoders access files exclusively through
/// this trait so that callers can substitute archive-indexed or in-memory
/// backends for the default [`FileSystem`].
pub trait ImportSource {
    /// Returns `true` if a file exists at the given path.
    fn exists(&self, path: &Path) -> bool;

    /// Opens the file at the given path for reading.
    fn open(&self, path: &Path) -> Result<Box<dyn SourceStream>>;
}

/// [`ImportSource`] that reads from the host filesystem.
#[derive(Debug, Default)]
pub struct FileSystem;

impl ImportSource for FileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(&self, path: &Path) -> Result<Box<dyn SourceStream>> {
        trace!("Opening file '{}'", path.display());
        let file = File::open(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_owned()),
            _ => Error::IoError(error),
        })?;
        Ok(Box::new(file))
    }
}

/// [`ImportSource`] that serves files from an in-memory map.
///
/// # Example
///
/// ```
/// use skarn::source::{ImportSource, MemorySource};
/// let source = MemorySource::new().with_file("cube.obj", b"v 0 0 0".to_vec());
/// assert!(source.exists(std::path::Path::new("cube.obj")));
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the source, replacing any previous content at the path.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        self.files.insert(path.into(), content);
        self
    }
}

impl ImportSource for MemorySource {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn SourceStream>> {
        let content = self.files.get(path).ok_or_else(|| Error::FileNotFound(path.to_owned()))?;
        Ok(Box::new(Cursor::new(content.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::*;

    #[test]
    fn filesystem_roundtrip() {
        let root = TempDir::new("source").unwrap();
        let path = root.path().join("triangle.stl");
        fs::write(&path, b"solid triangle").unwrap();

        let source = FileSystem;
        assert!(source.exists(&path));
        let mut stream = source.open(&path).unwrap();
        assert_eq!(stream.size().unwrap(), 14);
        let mut content = String::new();
        stream.read_to_string(&mut content).unwrap();
        assert_eq!(content, "solid triangle");
    }

    #[test]
    fn filesystem_missing_file() {
        let source = FileSystem;
        let path = Path::new("does/not/exist.obj");
        assert!(!source.exists(path));
        assert!(matches!(source.open(path), Err(Error::FileNotFound(_))));
    }

    #[test]
    fn memory_source_serves_content() {
        let source = MemorySource::new().with_file("a/b.off", b"OFF".to_vec());
        let mut stream = source.open(Path::new("a/b.off")).unwrap();
        let mut content = Vec::new();
        stream.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"OFF");
        assert!(!source.exists(Path::new("a/c.off")));
    }

    #[test]
    fn stream_size_preserves_position() {
        let source = MemorySource::new().with_file("f", vec![0u8; 32]);
        let mut stream = source.open(Path::new("f")).unwrap();
        let mut prefix = [0u8; 8];
        stream.read_exact(&mut prefix).unwrap();
        assert_eq!(stream.size().unwrap(), 32);
        assert_eq!(stream.stream_position().unwrap(), 8);
    }
}
