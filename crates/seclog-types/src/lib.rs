//! Shared types for seclog
//!
//! This crate contains data structures used across multiple seclog crates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Date input format accepted for filter bounds
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Second-precision rendering used for display, search and export
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Channels
// ============================================================================

/// The recognized event log channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Security,
    System,
    Application,
}

impl Channel {
    /// All recognized channels, in monitor fetch order
    pub const ALL: [Channel; 3] = [Channel::Security, Channel::System, Channel::Application];

    /// Look up a recognized channel by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Security" => Some(Self::Security),
            "System" => Some(Self::System),
            "Application" => Some(Self::Application),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "Security",
            Self::System => "System",
            Self::Application => "Application",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of accepted records per recognized channel
///
/// All three channels are always present and start at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelCounts {
    pub security: usize,
    pub system: usize,
    pub application: usize,
}

impl ChannelCounts {
    /// Increment the count for `channel` if it is a recognized name.
    ///
    /// Returns false (and counts nothing) for any other name.
    pub fn increment(&mut self, channel: &str) -> bool {
        match Channel::from_name(channel) {
            Some(known) => {
                *self.slot_mut(known) += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, channel: Channel) -> usize {
        match channel {
            Channel::Security => self.security,
            Channel::System => self.system,
            Channel::Application => self.application,
        }
    }

    /// Add another map's counts into this one
    pub fn merge(&mut self, other: &ChannelCounts) {
        for channel in Channel::ALL {
            *self.slot_mut(channel) += other.get(channel);
        }
    }

    pub fn total(&self) -> usize {
        self.security + self.system + self.application
    }

    /// Iterate `(channel, count)` pairs in fixed order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, usize)> + '_ {
        Channel::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut usize {
        match channel {
            Channel::Security => &mut self.security,
            Channel::System => &mut self.system,
            Channel::Application => &mut self.application,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// An entry as handed over by a log provider, before normalization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Generation time in local time
    pub time_generated: NaiveDateTime,

    /// Subsystem that raised the event
    pub source_name: String,

    /// Full event code, including severity/facility bits
    pub event_code: u32,

    pub event_type: u16,

    pub category: u16,

    /// Insert strings, if the provider supplied any
    #[serde(default)]
    pub string_inserts: Vec<String>,
}

/// A normalized event log entry
///
/// Built once from a [`RawRecord`] and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: NaiveDateTime,
    source_name: String,
    event_id: u16,
    event_type: u16,
    category: u16,
    message: String,
}

impl EventRecord {
    /// Normalize a raw provider record
    pub fn from_raw(raw: &RawRecord) -> Self {
        Self {
            timestamp: truncate_to_second(raw.time_generated),
            source_name: raw.source_name.clone(),
            event_id: event_id_from_code(raw.event_code),
            event_type: raw.event_type,
            category: raw.category,
            message: join_inserts(&raw.string_inserts),
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn event_id(&self) -> u16 {
        self.event_id
    }

    pub fn event_type(&self) -> u16 {
        self.event_type
    }

    pub fn category(&self) -> u16 {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Timestamp formatted at second precision
    pub fn timestamp_str(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// The whole record as one string, every field included.
    ///
    /// Keyword search runs against this, so a keyword can hit the source
    /// name or event id as well as the message.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.timestamp_str(),
            self.source_name,
            self.event_id,
            self.event_type,
            self.category,
            self.message
        )
    }

    /// The calendar day the event was generated on
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Drop the severity/facility bits packed above the low 16 bits
pub fn event_id_from_code(code: u32) -> u16 {
    (code & 0xFFFF) as u16
}

fn join_inserts(inserts: &[String]) -> String {
    inserts
        .iter()
        .map(|s| s.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    use chrono::Timelike;
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: u32, inserts: &[&str]) -> RawRecord {
        RawRecord {
            time_generated: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_milli_opt(12, 30, 5, 750)
                .unwrap(),
            source_name: "AuthSvc".to_string(),
            event_code: code,
            event_type: 2,
            category: 12,
            string_inserts: inserts.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_event_id_masks_high_bits() {
        for code in [0u32, 4624, 0xC000_1388, 0x8000_FFFF, u32::MAX] {
            assert_eq!(u32::from(event_id_from_code(code)), code & 0xFFFF);
        }
        assert_eq!(EventRecord::from_raw(&raw(0xC000_1B58, &[])).event_id(), 7000);
    }

    #[test]
    fn test_message_joins_trimmed_inserts() {
        let record = EventRecord::from_raw(&raw(1, &["  user1 ", "\tlogon\n", "ok"]));
        assert_eq!(record.message(), "user1 logon ok");

        let empty = EventRecord::from_raw(&raw(1, &[]));
        assert_eq!(empty.message(), "");
    }

    #[test]
    fn test_timestamp_second_precision() {
        let record = EventRecord::from_raw(&raw(1, &[]));
        assert_eq!(record.timestamp_str(), "2024-03-01 12:30:05");
        assert_eq!(record.timestamp().and_utc().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_searchable_text_covers_all_fields() {
        let record = EventRecord::from_raw(&raw(4625, &["bad password"]));
        let text = record.searchable_text();
        assert!(text.contains("AuthSvc"));
        assert!(text.contains("4625"));
        assert!(text.contains("2024-03-01 12:30:05"));
        assert!(text.contains("bad password"));
    }

    #[test]
    fn test_counts_ignore_unknown_channels() {
        let mut counts = ChannelCounts::default();
        assert!(counts.increment("Security"));
        assert!(counts.increment("Application"));
        assert!(!counts.increment("Setup"));
        assert!(!counts.increment("security"));
        assert_eq!(counts.get(Channel::Security), 1);
        assert_eq!(counts.get(Channel::System), 0);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_counts_merge_and_serialize() {
        let mut a = ChannelCounts::default();
        a.increment("System");
        let mut b = ChannelCounts::default();
        b.increment("System");
        b.increment("Security");
        a.merge(&b);
        assert_eq!(a.system, 2);
        assert_eq!(a.security, 1);

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"Security":1,"System":2,"Application":0}"#);
    }
}
