//! Decoding of `EVENTLOGRECORD` buffers
//!
//! `ReadEventLogW` fills a byte buffer with back-to-back variable length
//! records. Each starts with a fixed 56 byte header, followed by the
//! NUL-terminated UTF-16 source name; the insert strings sit at `StringOffset`.

use chrono::{DateTime, Local, NaiveDateTime};
use seclog_types::RawRecord;
use tracing::warn;

use crate::SourceError;

const HEADER_LEN: usize = 56;

/// "LfLe"
const SIGNATURE: u32 = 0x654c_664c;

// Header field offsets
const OFF_SIGNATURE: usize = 4;
const OFF_TIME_GENERATED: usize = 12;
const OFF_EVENT_ID: usize = 20;
const OFF_EVENT_TYPE: usize = 24;
const OFF_NUM_STRINGS: usize = 26;
const OFF_CATEGORY: usize = 28;
const OFF_STRING_OFFSET: usize = 36;

/// Decode every record in a buffer returned by a native read.
///
/// Records whose generation time cannot be represented are skipped, so every
/// returned record carries a valid timestamp.
pub fn decode_records(channel: &str, buf: &[u8]) -> Result<Vec<RawRecord>, SourceError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let length = read_u32(buf, offset)
            .ok_or_else(|| SourceError::read(channel, "truncated record length"))?
            as usize;
        if length < HEADER_LEN || offset + length > buf.len() {
            return Err(SourceError::read(
                channel,
                format!("invalid record length {} at offset {}", length, offset),
            ));
        }

        let record = &buf[offset..offset + length];
        if let Some(raw) = decode_one(channel, record)? {
            records.push(raw);
        }
        offset += length;
    }

    Ok(records)
}

fn decode_one(channel: &str, rec: &[u8]) -> Result<Option<RawRecord>, SourceError> {
    let header = |off| read_u32(rec, off).ok_or_else(|| SourceError::read(channel, "short header"));
    let header16 =
        |off| read_u16(rec, off).ok_or_else(|| SourceError::read(channel, "short header"));

    if header(OFF_SIGNATURE)? != SIGNATURE {
        return Err(SourceError::read(channel, "bad record signature"));
    }

    let generated = header(OFF_TIME_GENERATED)?;
    let Some(time_generated) = local_time(generated) else {
        warn!(channel, generated, "skipping record with unrepresentable timestamp");
        return Ok(None);
    };

    let (source_name, _) = read_utf16z(rec, HEADER_LEN);
    let num_strings = header16(OFF_NUM_STRINGS)?;
    let mut cursor = header(OFF_STRING_OFFSET)? as usize;
    let mut string_inserts = Vec::with_capacity(num_strings as usize);
    for _ in 0..num_strings {
        if cursor >= rec.len() {
            break;
        }
        let (s, next) = read_utf16z(rec, cursor);
        string_inserts.push(s);
        cursor = next;
    }

    Ok(Some(RawRecord {
        time_generated,
        source_name,
        event_code: header(OFF_EVENT_ID)?,
        event_type: header16(OFF_EVENT_TYPE)?,
        category: header16(OFF_CATEGORY)?,
        string_inserts,
    }))
}

/// Seconds since the Unix epoch (UTC) to local wall-clock time
fn local_time(secs: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(i64::from(secs), 0).map(|utc| utc.with_timezone(&Local).naive_local())
}

fn read_u32(buf: &[u8], off: usize) -> Option<u32> {
    let bytes = buf.get(off..off + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u16(buf: &[u8], off: usize) -> Option<u16> {
    let bytes = buf.get(off..off + 2)?;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a NUL-terminated UTF-16LE string; returns it and the offset past the NUL
fn read_utf16z(buf: &[u8], start: usize) -> (String, usize) {
    let mut units = Vec::new();
    let mut off = start;
    while let Some(unit) = read_u16(buf, off) {
        off += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    (String::from_utf16_lossy(&units), off)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16z(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect()
    }

    fn encode(time: u32, code: u32, event_type: u16, category: u16, source: &str, inserts: &[&str]) -> Vec<u8> {
        let mut tail = utf16z(source);
        tail.extend(utf16z("HOST"));
        let string_offset = HEADER_LEN + tail.len();
        for s in inserts {
            tail.extend(utf16z(s));
        }
        let length = HEADER_LEN + tail.len() + 4;

        let mut rec = Vec::with_capacity(length);
        rec.extend((length as u32).to_le_bytes());
        rec.extend(SIGNATURE.to_le_bytes());
        rec.extend(1u32.to_le_bytes()); // record number
        rec.extend(time.to_le_bytes());
        rec.extend(time.to_le_bytes()); // time written
        rec.extend(code.to_le_bytes());
        rec.extend(event_type.to_le_bytes());
        rec.extend((inserts.len() as u16).to_le_bytes());
        rec.extend(category.to_le_bytes());
        rec.extend(0u16.to_le_bytes());
        rec.extend(0u32.to_le_bytes()); // closing record number
        rec.extend((string_offset as u32).to_le_bytes());
        rec.extend([0u8; 16]); // sid length/offset, data length/offset
        rec.extend(tail);
        rec.extend((length as u32).to_le_bytes());
        rec
    }

    #[test]
    fn test_decodes_consecutive_records() {
        let mut buf = encode(1_700_000_000, 0xC000_1B58, 1, 0, "Service Control Manager", &["Spooler ", " stopped"]);
        buf.extend(encode(1_700_000_100, 4624, 8, 12544, "Microsoft-Windows-Security-Auditing", &[]));

        let records = decode_records("System", &buf).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].source_name, "Service Control Manager");
        assert_eq!(records[0].event_code, 0xC000_1B58);
        assert_eq!(records[0].event_type, 1);
        assert_eq!(records[0].string_inserts, vec!["Spooler ", " stopped"]);
        assert_eq!(records[0].time_generated, local_time(1_700_000_000).unwrap());

        assert_eq!(records[1].category, 12544);
        assert!(records[1].string_inserts.is_empty());
    }

    #[test]
    fn test_rejects_truncated_buffer() {
        let buf = encode(1_700_000_000, 1, 4, 0, "src", &[]);
        let err = decode_records("Application", &buf[..buf.len() - 8]).unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut buf = encode(1_700_000_000, 1, 4, 0, "src", &[]);
        buf[4] = 0;
        assert!(decode_records("Application", &buf).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        assert!(decode_records("Application", &[]).unwrap().is_empty());
    }
}
