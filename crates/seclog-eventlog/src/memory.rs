use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use seclog_types::RawRecord;

use crate::{ChannelReader, LogProvider, SourceError};

/// In-memory provider with optional injected failures
#[derive(Debug, Default)]
pub struct MemoryProvider {
    channels: HashMap<String, MemoryChannel>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryChannel {
    /// Stored oldest first, like a real log
    records: Vec<RawRecord>,
    open_error: Option<String>,
    /// Fail the read after this many successful batches
    fail_after_batches: Option<usize>,
    /// Overrides the advertised record count
    advertised: Option<u32>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel holding `records` (oldest first)
    pub fn with_channel(mut self, name: &str, records: Vec<RawRecord>) -> Self {
        self.channel_mut(name).records = records;
        self
    }

    /// Make `open` fail for this channel
    pub fn with_unavailable(mut self, name: &str, reason: &str) -> Self {
        self.channel_mut(name).open_error = Some(reason.to_string());
        self
    }

    /// Make reads fail once `batches` batches have been served
    pub fn with_read_failure(mut self, name: &str, batches: usize) -> Self {
        self.channel_mut(name).fail_after_batches = Some(batches);
        self
    }

    /// Advertise a record count different from what is stored
    pub fn with_advertised_count(mut self, name: &str, count: u32) -> Self {
        self.channel_mut(name).advertised = Some(count);
        self
    }

    /// Number of successful opens so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of readers released so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn channel_mut(&mut self, name: &str) -> &mut MemoryChannel {
        self.channels.entry(name.to_string()).or_default()
    }
}

impl LogProvider for MemoryProvider {
    fn open(&self, channel: &str) -> Result<Box<dyn ChannelReader + '_>, SourceError> {
        let Some(stored) = self.channels.get(channel) else {
            return Err(SourceError::unavailable(channel, "no such channel"));
        };
        if let Some(reason) = &stored.open_error {
            return Err(SourceError::unavailable(channel, reason));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryReader {
            name: channel.to_string(),
            stored,
            remaining: stored.records.len(),
            batches: 0,
            closed: &self.closed,
        }))
    }
}

struct MemoryReader<'a> {
    name: String,
    stored: &'a MemoryChannel,
    /// Records not yet served; served from the end backwards
    remaining: usize,
    batches: usize,
    closed: &'a AtomicUsize,
}

impl ChannelReader for MemoryReader<'_> {
    fn channel(&self) -> &str {
        &self.name
    }

    fn record_count(&self) -> Result<u32, SourceError> {
        Ok(self
            .stored
            .advertised
            .unwrap_or(self.stored.records.len() as u32))
    }

    fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        if self
            .stored
            .fail_after_batches
            .is_some_and(|limit| self.batches >= limit)
        {
            return Err(SourceError::read(&self.name, "injected read failure"));
        }

        let start = self.remaining.saturating_sub(max);
        let batch = self.stored.records[start..self.remaining]
            .iter()
            .rev()
            .cloned()
            .collect();
        self.remaining = start;
        self.batches += 1;
        Ok(batch)
    }
}

impl Drop for MemoryReader<'_> {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
