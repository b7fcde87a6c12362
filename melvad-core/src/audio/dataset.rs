//! Dataset enumeration for batch training.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// List the files directly inside `dir`, skipping subdirectories.
///
/// Entries are sorted by path so training order is reproducible.
pub fn list_dir(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_subdirectories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();
        fs::write(dir.path().join("a.wav"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.wav"), b"").unwrap();

        let files = list_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = list_dir("/no/such/melvad/dir").unwrap_err();
        assert!(matches!(err, crate::error::VadError::Io(_)));
    }
}
