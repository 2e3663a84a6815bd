//! Call duration formatting and survey bucket classification.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationBucket {
    /// Exclusive upper bound in minutes.
    #[serde(skip)]
    pub upper_minutes: f64,
    /// Option value of the survey's call-duration select.
    pub value: &'static str,
    pub label: &'static str,
}

/// Ordered; the first bucket whose bound exceeds the duration wins.
pub const DURATION_BUCKETS: [DurationBucket; 6] = [
    DurationBucket { upper_minutes: 1.0, value: "1", label: "0-1 min" },
    DurationBucket { upper_minutes: 2.0, value: "2", label: "1-2 min" },
    DurationBucket { upper_minutes: 3.0, value: "3", label: "2-3 min" },
    DurationBucket { upper_minutes: 4.0, value: "4", label: "3-4 min" },
    DurationBucket { upper_minutes: 5.0, value: "5", label: "4-5 min" },
    DurationBucket { upper_minutes: f64::INFINITY, value: "6", label: "5+ min" },
];

pub const ZERO_DURATION: &str = "00:00:00";

pub fn format_duration(delta_ms: i64) -> String {
    let total_secs = delta_ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format_duration((end - start).num_milliseconds())
}

/// `HH:MM:SS` with at least two hour digits and minutes/seconds below 60.
pub fn is_well_formed(text: &str) -> bool {
    let parts: Vec<&str> = text.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return false;
    };

    hours.len() >= 2
        && is_digits(hours)
        && minutes.len() == 2
        && seconds.len() == 2
        && matches!(minutes.parse::<u8>(), Ok(m) if m < 60)
        && matches!(seconds.parse::<u8>(), Ok(s) if s < 60)
}

/// The desk leaves its timer at zero until the call panel refreshes, so a zero
/// reading is never trusted.
pub fn is_valid_interface_duration(text: &str) -> bool {
    is_well_formed(text) && text != ZERO_DURATION
}

/// Parses `HH:MM:SS` or `MM:SS` into fractional minutes.
pub fn parse_minutes(text: &str) -> Option<f64> {
    let fields = text
        .trim()
        .split(':')
        .map(|part| {
            if is_digits(part) {
                part.parse::<u64>().ok()
            } else {
                None
            }
        })
        .collect::<Option<Vec<u64>>>()?;

    // Overflow counts as malformed.
    let seconds = match fields.as_slice() {
        [hours, minutes, seconds] => hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(*seconds)?,
        [minutes, seconds] => minutes.checked_mul(60)?.checked_add(*seconds)?,
        _ => return None,
    };

    Some(seconds as f64 / 60.0)
}

/// Like [`parse_minutes`] but total: malformed input is logged and counts as zero.
pub fn duration_minutes(text: &str) -> f64 {
    parse_minutes(text).unwrap_or_else(|| {
        warn!("Unrecognised duration '{text}', treating as zero minutes");
        0.0
    })
}

pub fn bucket_for_minutes(minutes: f64) -> &'static DurationBucket {
    DURATION_BUCKETS
        .iter()
        .find(|bucket| minutes < bucket.upper_minutes)
        .unwrap_or(&DURATION_BUCKETS[DURATION_BUCKETS.len() - 1])
}

pub fn classify(text: &str) -> &'static DurationBucket {
    bucket_for_minutes(duration_minutes(text))
}

fn is_digits(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}
