//! Raw message access with a small LRU cache.
//!
//! A message with several attachments is read once and decoded once per
//! attachment; the cache keeps the raw bytes between those saves.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::model::mail::MessageId;

/// Number of raw messages kept in memory.
const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(8) {
    Some(n) => n,
    None => unreachable!(),
};

/// Where the bytes of one message live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLocation {
    /// A slice of an MBOX file.
    Mbox { offset: u64, length: u64 },
    /// A whole `.eml` file.
    File(PathBuf),
}

/// Reads raw messages from an MBOX file or from individual files.
pub struct MessageStore {
    mbox: Option<(PathBuf, File)>,
    cache: LruCache<MessageId, Vec<u8>>,
}

impl MessageStore {
    /// A store for messages that each live in their own file.
    pub fn files() -> Self {
        Self {
            mbox: None,
            cache: LruCache::new(DEFAULT_CACHE_SIZE),
        }
    }

    /// A store backed by one MBOX file, kept open for the store's lifetime.
    pub fn open_mbox(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| HarvestError::open(&path, e))?;
        Ok(Self {
            mbox: Some((path, file)),
            cache: LruCache::new(DEFAULT_CACHE_SIZE),
        })
    }

    /// Raw bytes of a message. Cached results are returned immediately.
    pub fn raw(&mut self, id: MessageId, location: &MessageLocation) -> Result<&[u8]> {
        if !self.cache.contains(&id) {
            let bytes = self.read(location)?;
            self.cache.put(id, bytes);
        }
        self.cache
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| HarvestError::Provider(format!("message {id} evicted while reading")))
    }

    fn read(&mut self, location: &MessageLocation) -> Result<Vec<u8>> {
        match location {
            MessageLocation::File(path) => {
                debug!(path = %path.display(), "Reading message file");
                std::fs::read(path).map_err(|e| HarvestError::open(path, e))
            }
            MessageLocation::Mbox { offset, length } => {
                let (path, file) = self.mbox.as_mut().ok_or_else(|| {
                    HarvestError::Provider("MBOX location without an open MBOX file".into())
                })?;
                debug!(offset, length, "Reading message from MBOX");
                file.seek(SeekFrom::Start(*offset))
                    .map_err(|e| HarvestError::io(path.as_path(), e))?;
                let mut buf = vec![0u8; *length as usize];
                file.read_exact(&mut buf)
                    .map_err(|e| HarvestError::io(path.as_path(), e))?;
                Ok(buf)
            }
        }
    }
}
