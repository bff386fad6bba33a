//! Streaming MBOX splitter.
//!
//! Reads the file line by line through a large buffer and reports, for each
//! message, where it lives in the file and what its header block contains.
//! Bodies are never held in memory here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{HarvestError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Header blocks larger than this are cut; the message itself is kept.
const MAX_HEADER_SIZE: usize = 1024 * 1024;

/// Location of one message inside an MBOX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpan {
    /// Byte offset of the `From ` separator line.
    pub offset: u64,
    /// Bytes up to the next separator or EOF.
    pub length: u64,
}

/// Splits an MBOX file into messages.
///
/// Tolerates mixed `\n` / `\r\n` endings, a UTF-8 BOM, `From ` lines without
/// a preceding blank line (logged) and a truncated last message.
pub struct MboxScanner {
    path: PathBuf,
}

impl MboxScanner {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Call `on_message(span, headers)` for every message, in file order.
    ///
    /// `headers` starts with the separator line and stops before the first
    /// blank line. Return `false` from the callback to stop early.
    /// Returns the number of messages reported.
    pub fn scan(&self, on_message: &mut dyn FnMut(MessageSpan, &[u8]) -> bool) -> Result<u64> {
        let file = File::open(&self.path).map_err(|e| HarvestError::open(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count = 0u64;
        let mut offset = 0u64;
        let mut line = Vec::with_capacity(4096);
        let mut pending: Option<(u64, Vec<u8>)> = None;
        let mut in_headers = false;
        let mut prev_blank = true;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| HarvestError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            if is_separator(&line, offset == 0) {
                if !prev_blank {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if let Some((start, headers)) = pending.take() {
                    let span = MessageSpan {
                        offset: start,
                        length: offset - start,
                    };
                    count += 1;
                    if !on_message(span, &headers) {
                        return Ok(count);
                    }
                }
                pending = Some((offset, line.clone()));
                in_headers = true;
            } else if in_headers {
                if is_blank(&line) {
                    in_headers = false;
                } else if let Some((start, headers)) = pending.as_mut() {
                    if headers.len() + line.len() <= MAX_HEADER_SIZE {
                        headers.extend_from_slice(&line);
                    } else {
                        warn!(offset = *start, "Header block too large, truncating");
                        in_headers = false;
                    }
                }
            }

            prev_blank = is_blank(&line);
            offset += read as u64;
        }

        if let Some((start, headers)) = pending {
            let span = MessageSpan {
                offset: start,
                length: offset - start,
            };
            count += 1;
            on_message(span, &headers);
        }

        Ok(count)
    }
}

/// `From ` at the start of a line. The very first line may carry a BOM.
fn is_separator(line: &[u8], first_line: bool) -> bool {
    let line = if first_line {
        line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line)
    } else {
        line
    };
    line.starts_with(b"From ")
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
}
