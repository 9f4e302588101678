//! Streaming SHA-1 and MD5 over publication files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use repoindex_core::error::Result;

use crate::fsutil::write_atomic;

pub fn sha1_hex(path: &Path) -> Result<String> {
    use sha1::{Digest, Sha1};
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn md5_hex(path: &Path) -> Result<String> {
    use md5::{Digest, Md5};
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write the `.sha1` and `.md5` siblings of a publication file: lowercase
/// hex only, no filename, no trailing newline.
pub fn write_checksum_files(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    write_atomic(
        &path.with_file_name(format!("{}.sha1", name)),
        sha1_hex(path)?.as_bytes(),
    )?;
    write_atomic(
        &path.with_file_name(format!("{}.md5", name)),
        md5_hex(path)?.as_bytes(),
    )?;
    Ok(())
}
