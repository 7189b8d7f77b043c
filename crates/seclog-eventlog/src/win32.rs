//! Native provider over the classic Win32 event log API

use std::collections::VecDeque;

use seclog_types::RawRecord;
use tracing::{debug, warn};
use windows::Win32::Foundation::{ERROR_HANDLE_EOF, ERROR_INSUFFICIENT_BUFFER, HANDLE};
use windows::Win32::System::EventLog::{
    CloseEventLog, EVENTLOG_SEQUENTIAL_READ, GetNumberOfEventLogRecords, OpenEventLogW,
    READ_EVENT_LOG_READ_FLAGS, ReadEventLogW,
};
use windows::Win32::System::SystemServices::EVENTLOG_BACKWARDS_READ;
use windows::core::{HSTRING, PCWSTR};

use crate::{ChannelReader, LogProvider, SourceError, decode_records};

/// Initial read buffer size; grown on `ERROR_INSUFFICIENT_BUFFER`
const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Newest first, each read continuing where the last one stopped
const READ_FLAGS: READ_EVENT_LOG_READ_FLAGS =
    READ_EVENT_LOG_READ_FLAGS(EVENTLOG_BACKWARDS_READ | EVENTLOG_SEQUENTIAL_READ.0);

/// Provider for the local machine's event logs
#[derive(Clone, Debug, Default)]
pub struct EventLogProvider;

impl EventLogProvider {
    pub fn new() -> Self {
        Self
    }
}

impl LogProvider for EventLogProvider {
    fn open(&self, channel: &str) -> Result<Box<dyn ChannelReader + '_>, SourceError> {
        let name = HSTRING::from(channel);
        // SAFETY: `name` outlives the call; a null server name means the local machine.
        let handle = unsafe { OpenEventLogW(PCWSTR::null(), &name) }
            .map_err(|e| SourceError::unavailable(channel, e))?;

        debug!(channel, "opened event log");
        Ok(Box::new(EventLogReader {
            name: channel.to_string(),
            handle,
            buffer: vec![0; READ_BUFFER_BYTES],
            pending: VecDeque::new(),
            exhausted: false,
        }))
    }
}

struct EventLogReader {
    name: String,
    handle: HANDLE,
    buffer: Vec<u8>,
    /// Decoded records not yet handed out
    pending: VecDeque<RawRecord>,
    exhausted: bool,
}

impl EventLogReader {
    /// One sequential backwards read into the buffer, decoded into `pending`
    fn fill(&mut self) -> Result<(), SourceError> {
        loop {
            let mut read = 0u32;
            let mut needed = 0u32;
            // SAFETY: the buffer pointer and length describe `self.buffer`, which
            // stays alive and unaliased for the duration of the call.
            let result = unsafe {
                ReadEventLogW(
                    self.handle,
                    READ_FLAGS,
                    0,
                    self.buffer.as_mut_ptr().cast(),
                    self.buffer.len() as u32,
                    &mut read,
                    &mut needed,
                )
            };

            match result {
                Ok(()) => {
                    let decoded = decode_records(&self.name, &self.buffer[..read as usize])?;
                    self.pending.extend(decoded);
                    return Ok(());
                }
                Err(e) if e.code() == ERROR_HANDLE_EOF.to_hresult() => {
                    self.exhausted = true;
                    return Ok(());
                }
                Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => {
                    self.buffer.resize(needed as usize, 0);
                }
                Err(e) => return Err(SourceError::read(&self.name, e)),
            }
        }
    }
}

impl ChannelReader for EventLogReader {
    fn channel(&self) -> &str {
        &self.name
    }

    fn record_count(&self) -> Result<u32, SourceError> {
        let mut count = 0u32;
        // SAFETY: `self.handle` is open until drop.
        unsafe { GetNumberOfEventLogRecords(self.handle, &mut count) }
            .map_err(|e| SourceError::read(&self.name, e))?;
        Ok(count)
    }

    fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        while self.pending.len() < max && !self.exhausted {
            let before = self.pending.len();
            self.fill()?;
            if self.pending.len() == before && !self.exhausted {
                break;
            }
        }
        let take = max.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}

impl Drop for EventLogReader {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful OpenEventLogW and is closed only here.
        if let Err(e) = unsafe { CloseEventLog(self.handle) } {
            warn!(channel = %self.name, error = %e, "failed to close event log");
        }
    }
}
