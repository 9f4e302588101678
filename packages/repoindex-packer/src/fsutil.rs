//! Atomic file publication: temp sibling plus rename.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use repoindex_core::error::{IndexError, Result};

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IndexError::invalid(format!("unusable path {}", path.display())))?;
    Ok(path.with_file_name(format!(".{}.tmp", file_name)))
}

/// Write bytes so that readers either see the old file or the new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path)?;
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Stream into a temp sibling, then rename into place on success. The temp
/// file is removed whenever the producer or the rename fails.
pub fn write_atomic_with<F>(path: &Path, produce: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let tmp = temp_sibling(path)?;
    let file = File::create(&tmp)?;
    match produce(file).and_then(|()| fs::rename(&tmp, path).map_err(IndexError::from)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
