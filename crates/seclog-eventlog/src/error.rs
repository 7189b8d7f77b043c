use thiserror::Error;

/// Failures raised while opening or reading a log channel
#[derive(Debug, Error)]
pub enum SourceError {
    /// The channel could not be opened (missing, or access denied)
    #[error("channel {channel} unavailable: {reason}")]
    ChannelUnavailable { channel: String, reason: String },

    /// The channel was opened but a read failed part way through
    #[error("failed reading channel {channel}: {reason}")]
    Read { channel: String, reason: String },
}

impl SourceError {
    pub fn unavailable(channel: &str, reason: impl ToString) -> Self {
        Self::ChannelUnavailable {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn read(channel: &str, reason: impl ToString) -> Self {
        Self::Read {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }
}
