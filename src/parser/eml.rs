//! Individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::{Path, PathBuf};

use crate::error::{HarvestError, Result};

/// `.eml` files directly inside `dir`, sorted by file name.
pub fn list_eml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| HarvestError::open(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| HarvestError::io(dir, e))?.path();
        if path.is_file() && is_eml(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_eml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
}

/// The header block of a message: everything before the first blank line.
pub fn header_block(data: &[u8]) -> &[u8] {
    &data[..find_header_end(data).unwrap_or(data.len())]
}

/// Byte offset of the first blank line (`\n\n` or `\r\n\r\n`).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w == b"\n\n")
        .into_iter()
        .chain(data.windows(4).position(|w| w == b"\r\n\r\n"))
        .min()
}
