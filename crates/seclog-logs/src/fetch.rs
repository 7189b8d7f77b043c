use std::sync::Arc;

use seclog_eventlog::{DEFAULT_BATCH_SIZE, LogProvider};
use seclog_types::{ChannelCounts, EventRecord};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{FetchError, FilterCriteria};

/// Outcome of one fetch across all requested channels
#[derive(Clone, Debug, Default)]
pub struct FetchReport {
    /// Accepted records, channel by channel in request order, newest first within each
    pub records: Vec<EventRecord>,

    /// Accepted records per recognized channel
    pub counts: ChannelCounts,

    /// What happened on each requested channel
    pub channels: Vec<ChannelReport>,
}

impl FetchReport {
    /// Channels that could not be opened
    pub fn unavailable(&self) -> impl Iterator<Item = &ChannelReport> {
        self.channels
            .iter()
            .filter(|c| matches!(c.status, ChannelStatus::Unavailable { .. }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub status: ChannelStatus,
}

/// Per-channel result, so "no matching records" and "could not read" stay distinct
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Read to the end
    Read { scanned: usize, accepted: usize },

    /// Open failed; the channel contributed nothing
    Unavailable { reason: String },

    /// A read failed part way; records accepted before the failure are kept
    Interrupted {
        scanned: usize,
        accepted: usize,
        reason: String,
    },
}

/// Fans a fetch out over the requested channels of a provider
#[derive(Clone)]
pub struct Fetcher {
    provider: Arc<dyn LogProvider>,
    batch_size: usize,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn LogProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Validate user input, then fetch.
    ///
    /// Date validation happens before any channel is opened.
    pub fn fetch<S: AsRef<str>>(
        &self,
        channels: &[S],
        start: &str,
        end: &str,
        keyword: &str,
    ) -> Result<FetchReport, FetchError> {
        let names = channels.iter().map(|c| AsRef::<str>::as_ref(c));
        let criteria = FilterCriteria::parse(names, start, end, keyword)?;
        Ok(self.fetch_with(&criteria))
    }

    /// Fetch every requested channel. Blocks for the duration of the reads.
    pub fn fetch_with(&self, criteria: &FilterCriteria) -> FetchReport {
        let mut report = FetchReport::default();

        for channel in criteria.channels() {
            let status = self.fetch_channel(channel, criteria, &mut report);
            report.channels.push(ChannelReport {
                channel: channel.clone(),
                status,
            });
        }

        info!(
            records = report.records.len(),
            counted = report.counts.total(),
            "fetch complete"
        );
        report
    }

    /// Run [`Fetcher::fetch_with`] on a blocking worker and send the report to `tx`
    pub fn spawn_fetch(
        &self,
        criteria: FilterCriteria,
        tx: mpsc::UnboundedSender<FetchReport>,
    ) -> tokio::task::JoinHandle<()> {
        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || {
            let report = fetcher.fetch_with(&criteria);
            if tx.send(report).is_err() {
                debug!("fetch result dropped, receiver closed");
            }
        })
    }

    fn fetch_channel(
        &self,
        channel: &str,
        criteria: &FilterCriteria,
        report: &mut FetchReport,
    ) -> ChannelStatus {
        // The reader is closed when it goes out of scope, on every return below
        let mut reader = match self.provider.open(channel) {
            Ok(reader) => reader,
            Err(e) => {
                warn!(channel, error = %e, "skipping channel");
                return ChannelStatus::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let mut scanned = 0;
        let mut accepted = 0;
        let interrupted = |scanned: usize, accepted: usize, reason: String| {
            warn!(channel, scanned, accepted, error = %reason, "channel read interrupted");
            ChannelStatus::Interrupted {
                scanned,
                accepted,
                reason,
            }
        };

        let total = match reader.record_count() {
            Ok(total) => total as usize,
            Err(e) => return interrupted(scanned, accepted, e.to_string()),
        };

        while scanned < total {
            let batch = match reader.read_batch(self.batch_size) {
                Ok(batch) => batch,
                Err(e) => return interrupted(scanned, accepted, e.to_string()),
            };
            if batch.is_empty() {
                break;
            }
            debug!(channel, size = batch.len(), "read batch");
            scanned += batch.len();

            for raw in &batch {
                if let Some(record) = criteria.apply(raw) {
                    report.counts.increment(channel);
                    report.records.push(record);
                    accepted += 1;
                }
            }
        }

        info!(channel, total, scanned, accepted, "channel read");
        ChannelStatus::Read { scanned, accepted }
    }
}
