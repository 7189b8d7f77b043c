//! Offline channels exported as JSON
//!
//! A snapshot directory holds one `<Channel>.json` file per channel, each an
//! array of raw records stored oldest first.

use std::fs;
use std::path::{Path, PathBuf};

use seclog_types::RawRecord;
use tracing::debug;

use crate::{ChannelReader, LogProvider, SourceError};

/// Provider reading channels from a snapshot directory
#[derive(Clone, Debug)]
pub struct SnapshotProvider {
    dir: PathBuf,
}

impl SnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn channel_path(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}.json", channel))
    }
}

impl LogProvider for SnapshotProvider {
    fn open(&self, channel: &str) -> Result<Box<dyn ChannelReader + '_>, SourceError> {
        let path = self.channel_path(channel);
        let content =
            fs::read_to_string(&path).map_err(|e| SourceError::unavailable(channel, e))?;
        let records: Vec<RawRecord> =
            serde_json::from_str(&content).map_err(|e| SourceError::unavailable(channel, e))?;

        debug!(channel, path = %path.display(), records = records.len(), "opened snapshot");
        Ok(Box::new(SnapshotReader {
            name: channel.to_string(),
            records,
        }))
    }
}

struct SnapshotReader {
    name: String,
    /// Unread records, oldest first; batches are taken from the end
    records: Vec<RawRecord>,
}

impl ChannelReader for SnapshotReader {
    fn channel(&self) -> &str {
        &self.name
    }

    fn record_count(&self) -> Result<u32, SourceError> {
        u32::try_from(self.records.len()).map_err(|e| SourceError::read(&self.name, e))
    }

    fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        let start = self.records.len().saturating_sub(max);
        let mut batch = self.records.split_off(start);
        batch.reverse();
        Ok(batch)
    }
}
