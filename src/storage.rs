//! File I/O helpers.
//!
//! Safe whole-file reads and atomic writes. Atomic writes go through a
//! temporary file in the target directory so the destination is either fully
//! written or untouched.

use crate::error::{EngineError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::Builder;

/// Reads the entire contents of a file into a vector.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    Ok(data)
}

/// Writes data to a file atomically using a temporary file.
///
/// # Errors
///
/// Returns an error if:
/// - The output path has no parent directory
/// - The temporary file cannot be created
/// - Writing fails
/// - The temporary file cannot be persisted
///
/// # Examples
///
/// ```no_run
/// # use sealstream::storage::write_file_atomic;
/// # use std::path::Path;
/// let data = b"important data";
/// write_file_atomic(Path::new("output.bin"), data).unwrap();
/// ```
pub fn write_file_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_atomically(path, |file| file.write_all(data))
}

/// Performs an atomic file write operation using a closure.
///
/// Creates a temporary file in the same directory as the target, calls the
/// provided function to write data, then atomically renames the temporary
/// file to the target path.
///
/// # Errors
///
/// Returns an error if any step of the operation fails.
pub fn write_atomically<F>(path: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::result::Result<(), std::io::Error>,
{
    let output_dir = path.parent().ok_or(EngineError::InvalidOutputPath)?;

    let mut temp_file = Builder::new()
        .prefix("sealstream")
        .suffix(".tmp")
        .tempfile_in(output_dir)?;

    write_fn(temp_file.as_file_mut())?;

    temp_file.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_file_returns_full_contents() {
        let mut source = NamedTempFile::new().unwrap();
        let contents: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        source.write_all(&contents).unwrap();
        source.flush().unwrap();

        assert_eq!(read_file(source.path()).unwrap(), contents);
    }

    #[test]
    fn test_read_file_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_write_file_atomic_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("container.bin");

        write_file_atomic(&target, b"sealed bytes").unwrap();
        assert_eq!(read_file(&target).unwrap(), b"sealed bytes");
    }

    #[test]
    fn test_write_file_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("container.bin");

        write_file_atomic(&target, b"first version").unwrap();
        write_file_atomic(&target, b"second").unwrap();
        assert_eq!(read_file(&target).unwrap(), b"second");
    }

    #[test]
    fn test_write_atomically_streams_through_closure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("streamed.bin");

        write_atomically(&target, |file| {
            for chunk in [&b"head:"[..], b"body:", b"tail"] {
                file.write_all(chunk)?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(read_file(&target).unwrap(), b"head:body:tail");
    }

    #[test]
    fn test_write_file_atomic_leaves_no_temp_on_success() {
        let temp_dir = tempfile::tempdir().unwrap();
        let temp_path = temp_dir.path().join("out.bin");
        write_file_atomic(&temp_path, b"data").unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.bin")]);
    }
}
