//! Event log providers for seclog
//!
//! This crate opens named log channels and pages through their records,
//! newest first. The native Windows provider sits next to a JSON snapshot
//! provider and an in-memory provider.

mod error;
mod memory;
mod provider;
mod record;
mod snapshot;
#[cfg(windows)]
mod win32;

use std::sync::Arc;

pub use error::SourceError;
pub use memory::MemoryProvider;
pub use provider::{ChannelReader, DEFAULT_BATCH_SIZE, LogProvider};
pub use record::decode_records;
pub use snapshot::SnapshotProvider;
#[cfg(windows)]
pub use win32::EventLogProvider;

// Re-export types that are used in our public API
pub use seclog_types::RawRecord;

/// The provider for this host's own event log, if the platform has one
pub fn native_provider() -> Option<Arc<dyn LogProvider>> {
    #[cfg(windows)]
    {
        Some(Arc::new(EventLogProvider::new()))
    }
    #[cfg(not(windows))]
    {
        None
    }
}
