//! Plain-text rendering of fetch results

use seclog_logs::{ChannelCounts, ChannelStatus, EventRecord, FetchReport};

/// Severity label for a classic event type code
pub fn event_type_label(event_type: u16) -> &'static str {
    match event_type {
        0 | 4 => "Information",
        1 => "Error",
        2 => "Warning",
        8 => "Audit Success",
        16 => "Audit Failure",
        _ => "Unknown",
    }
}

/// `[<timestamp>] <type label> <source> (ID <id>): <message>`
pub fn record_line(record: &EventRecord) -> String {
    format!(
        "[{}] {} {} (ID {}): {}",
        record.timestamp_str(),
        event_type_label(record.event_type()),
        record.source_name(),
        record.event_id(),
        record.message()
    )
}

/// Per-channel tallies on one line
pub fn counts_line(counts: &ChannelCounts) -> String {
    counts
        .iter()
        .map(|(channel, count)| format!("{}: {}", channel, count))
        .collect::<Vec<_>>()
        .join("  ")
}

/// One line per channel that did not read cleanly
pub fn channel_problems(report: &FetchReport) -> Vec<String> {
    report
        .channels
        .iter()
        .filter_map(|c| match &c.status {
            ChannelStatus::Read { .. } => None,
            ChannelStatus::Unavailable { reason } => {
                Some(format!("{}: unavailable ({})", c.channel, reason))
            }
            ChannelStatus::Interrupted {
                accepted, reason, ..
            } => Some(format!(
                "{}: stopped after {} records ({})",
                c.channel, accepted, reason
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use seclog_logs::ChannelReport;
    use seclog_types::RawRecord;

    fn record() -> EventRecord {
        EventRecord::from_raw(&RawRecord {
            time_generated: NaiveDate::from_ymd_opt(2024, 7, 4)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            source_name: "Microsoft-Windows-Security-Auditing".to_string(),
            event_code: 4625,
            event_type: 16,
            category: 12544,
            string_inserts: vec!["alice".to_string(), "0xC000006A".to_string()],
        })
    }

    #[test]
    fn test_record_line() {
        assert_eq!(
            record_line(&record()),
            "[2024-07-04 09:05:00] Audit Failure Microsoft-Windows-Security-Auditing (ID 4625): alice 0xC000006A"
        );
    }

    #[test]
    fn test_event_type_labels() {
        assert_eq!(event_type_label(0), "Information");
        assert_eq!(event_type_label(4), "Information");
        assert_eq!(event_type_label(1), "Error");
        assert_eq!(event_type_label(2), "Warning");
        assert_eq!(event_type_label(8), "Audit Success");
        assert_eq!(event_type_label(16), "Audit Failure");
        assert_eq!(event_type_label(99), "Unknown");
    }

    #[test]
    fn test_counts_line() {
        let mut counts = ChannelCounts::default();
        counts.increment("System");
        assert_eq!(counts_line(&counts), "Security: 0  System: 1  Application: 0");
    }

    #[test]
    fn test_channel_problems() {
        let report = FetchReport {
            channels: vec![
                ChannelReport {
                    channel: "System".to_string(),
                    status: ChannelStatus::Read {
                        scanned: 3,
                        accepted: 3,
                    },
                },
                ChannelReport {
                    channel: "Security".to_string(),
                    status: ChannelStatus::Unavailable {
                        reason: "access denied".to_string(),
                    },
                },
            ],
            ..FetchReport::default()
        };
        assert_eq!(
            channel_problems(&report),
            ["Security: unavailable (access denied)"]
        );
    }
}
