//! Conversion of decoded entries into storable records.

use chrono::{DateTime, Utc};
use feedtable_core::{FeedEntry, NormalizedRecord};

use crate::error::DateFormatError;

/// The only accepted publish-date layout, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUBLISH_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse a publish date written in [`PUBLISH_DATE_FORMAT`].
///
/// The weekday must be a valid abbreviation but is not checked against the
/// calendar date; feeds frequently get it wrong. Zone names such as `GMT`
/// are not accepted, only numeric offsets.
///
/// # Errors
///
/// Returns [`DateFormatError`] if `value` does not match the layout.
pub fn parse_publish_date(value: &str) -> Result<DateTime<Utc>, DateFormatError> {
    let fail = |reason: String| DateFormatError {
        value: value.to_string(),
        expected: PUBLISH_DATE_FORMAT,
        reason,
    };

    let (weekday, rest) = value
        .split_once(", ")
        .ok_or_else(|| fail("missing weekday prefix".to_string()))?;
    if !WEEKDAYS.contains(&weekday) {
        return Err(fail(format!("unknown weekday `{weekday}`")));
    }

    check_layout(rest).map_err(|reason| fail(reason.to_string()))?;

    DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| fail(e.to_string()))
}

/// Shape check for the `02 Jan 2006 15:04:05 -0700` tail, which chrono alone
/// would accept with one-digit fields, colon offsets or repeated spaces.
fn check_layout(rest: &str) -> Result<(), &'static str> {
    const SHAPE: &[u8; 26] = b"00 Aaa 0000 00:00:00 +0000";

    let bytes = rest.as_bytes();
    if bytes.len() != SHAPE.len() {
        return Err("wrong field widths");
    }
    for (&b, &want) in bytes.iter().zip(SHAPE) {
        let ok = match want {
            b'0' => b.is_ascii_digit(),
            b'A' | b'a' => b.is_ascii_alphabetic(),
            b'+' => b == b'+' || b == b'-',
            _ => b == want,
        };
        if !ok {
            return Err("wrong field widths");
        }
    }
    Ok(())
}

/// Build the stored form of an entry.
///
/// The description is carried over verbatim; no markup stripping or
/// whitespace normalization happens here.
///
/// # Errors
///
/// Returns [`DateFormatError`] if the entry's publish date cannot be parsed;
/// no record is produced in that case.
pub fn normalize_entry(entry: &FeedEntry) -> Result<NormalizedRecord, DateFormatError> {
    let publish_timestamp = parse_publish_date(&entry.publish_date)?;
    Ok(NormalizedRecord {
        title: entry.title.clone(),
        publish_timestamp,
        description: entry.description.clone(),
        source_id: entry.identity().to_string(),
    })
}
