//! Temp-file-then-rename helper used by every subsystem that must write a
//! file such that concurrent readers never observe a partial write.
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::RcError;

/// Writes `contents` to `path` atomically: written to a sibling temp file
/// first, then renamed into place. `rename(2)` is atomic within a
/// filesystem, so a reader either sees the old file or the new one, never a
/// truncated one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RcError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = tmp_sibling(path);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pid = std::process::id();
    path.with_file_name(format!(".{file_name}.{pid}.tmp"))
}
