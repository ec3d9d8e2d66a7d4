use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

/// A read-only memory mapping of a served file.
///
/// The mapping is released when the value is dropped, which the
/// [`ResponseBuilder`](crate::codec::ResponseBuilder) does before establishing
/// the next one and on connection teardown.
#[derive(Debug)]
pub struct MappedFile {
    mmap: Mmap,
}

impl MappedFile {
    /// Maps the whole file at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns the error of opening or mapping the file.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is private and read-only. Served documents must not
        // be truncated while they are mapped, the same contract as `sendfile`.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn map_file_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<html>hello</html>").unwrap();
        file.flush().unwrap();

        let mapped = MappedFile::open(file.path()).unwrap();
        assert_eq!(mapped.len(), 18);
        assert_eq!(mapped.as_slice(), b"<html>hello</html>");
    }

    #[test]
    fn map_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappedFile::open(&dir.path().join("missing.html")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
