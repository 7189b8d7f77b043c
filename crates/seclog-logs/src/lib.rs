//! Log processing for seclog
//!
//! This crate provides filtering, multi-channel fetching, background
//! monitoring, and CSV export of event log records.

mod error;
mod export;
mod fetch;
mod filter;
mod monitor;

pub use error::{ExportError, FetchError, MonitorError};
pub use export::{export_csv, write_records};
pub use fetch::{ChannelReport, ChannelStatus, FetchReport, Fetcher};
pub use filter::{FilterCriteria, parse_date};
pub use monitor::{DEFAULT_POLL_INTERVAL, Monitor, MonitorState, MonitorUpdate};

// Re-export types used in our public API
pub use seclog_types::{Channel, ChannelCounts, EventRecord};
