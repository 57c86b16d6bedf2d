pub mod excel_read;
pub mod excel_write;
pub mod yaml;

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::seaf::convert::error::{Result, ToolError};

/// Writes `bytes` to a temporary file next to `path` and renames it into
/// place, so an interrupted run never leaves a truncated file behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|err| ToolError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}
