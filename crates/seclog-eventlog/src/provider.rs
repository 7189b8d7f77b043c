use seclog_types::RawRecord;

use crate::SourceError;

/// Number of records requested per native read
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// A source of named event log channels
///
/// Providers are shared between the monitor task and interactive fetches,
/// but every `open` hands out a reader of its own.
pub trait LogProvider: Send + Sync {
    /// Open a channel by name.
    ///
    /// Fails with [`SourceError::ChannelUnavailable`] if the channel is
    /// missing or cannot be accessed.
    fn open(&self, channel: &str) -> Result<Box<dyn ChannelReader + '_>, SourceError>;
}

/// An open channel, read backwards from the most recent record.
///
/// Dropping the reader releases the underlying handle, so the handle is closed
/// exactly once on every exit path.
pub trait ChannelReader {
    /// Name the channel was opened with
    fn channel(&self) -> &str;

    /// Total number of records the channel advertises
    fn record_count(&self) -> Result<u32, SourceError>;

    /// Read up to `max` further records, newest first.
    ///
    /// An empty batch means the channel is exhausted.
    fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError>;
}
