//! Client-side aggregation of raw webhook records.
//!
//! Pure functions over slices of [`WebhookRecord`]; no I/O and no clock reads
//! (callers pass the reference time). Provides:
//! - **Day buckets**: per-source per-day counts over a trailing window
//! - **Source tally**: raw per-source counts for the stat counters
//! - **Recent projection**: the first N records in caller-supplied order
//! - **Date ranges**: the filter form's preset ranges (see [`date_range`])

pub mod date_range;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, TimeZone};

use crate::model::{ChartSeries, Dataset, StatsView, WebhookRecord};
use crate::palette::Palette;

pub use date_range::{DateRange, DateRangeOption, derive_date_range};

/// Default trailing window for the time-series chart.
pub const DEFAULT_WINDOW_DAYS: usize = 7;

/// Label format for chart days.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Offset-less timestamp layouts accepted in addition to RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

// ---------------------------------------------------------------------------
// Day buckets
// ---------------------------------------------------------------------------

/// Count records per source per calendar day over the `window_days` days
/// ending at `reference` (inclusive).
///
/// Records whose timestamp is absent or unparseable are dropped. Every
/// source seen on a parseable record gets a dataset, in first-seen order,
/// even when none of its records fall inside the window.
pub fn bucket_by_day_and_source<Tz: TimeZone>(
    records: &[WebhookRecord],
    window_days: usize,
    reference: &DateTime<Tz>,
    palette: &Palette,
) -> ChartSeries {
    let tz = reference.timezone();
    let days = trailing_window(reference.date_naive(), window_days);

    let mut counts: Vec<(String, Vec<u64>)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(day) = record.timestamp.as_deref().and_then(|ts| parse_day(ts, &tz)) else {
            continue;
        };

        let source = record.source_or_other();
        let slot = *slots.entry(source.to_string()).or_insert_with(|| {
            counts.push((source.to_string(), vec![0; days.len()]));
            counts.len() - 1
        });

        if let Some(pos) = day_position(&days, day) {
            counts[slot].1[pos] += 1;
        }
    }

    let datasets = counts
        .into_iter()
        .map(|(source, data)| Dataset {
            label: capitalize(&source),
            color: palette.color_for(&source).to_string(),
            data,
        })
        .collect();

    ChartSeries {
        labels: days.iter().map(|d| d.format(DAY_FORMAT).to_string()).collect(),
        datasets,
    }
}

/// The `window_days` consecutive dates ending at `end`, ascending.
pub fn trailing_window(end: NaiveDate, window_days: usize) -> Vec<NaiveDate> {
    (0..window_days as u64)
        .rev()
        .filter_map(|back| end.checked_sub_days(Days::new(back)))
        .collect()
}

/// Window labels with no datasets, as shown by an empty line chart.
pub fn window_labels(end: NaiveDate, window_days: usize) -> Vec<String> {
    trailing_window(end, window_days)
        .iter()
        .map(|d| d.format(DAY_FORMAT).to_string())
        .collect()
}

fn day_position(days: &[NaiveDate], day: NaiveDate) -> Option<usize> {
    let first = *days.first()?;
    let offset = usize::try_from((day - first).num_days()).ok()?;
    (offset < days.len()).then_some(offset)
}

/// Parse a record timestamp into a calendar day in `tz`.
pub fn parse_day<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDate> {
    parse_wall_clock(raw, tz).map(|dt| dt.date())
}

/// Parse a record timestamp into wall-clock time in `tz`.
///
/// Timestamps with an offset are converted into `tz`; naive timestamps are
/// taken as already being wall-clock time. A bare date means midnight.
pub fn parse_wall_clock<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(tz).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(tz).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DAY_FORMAT)
                .ok()
                .map(date_range::start_of_day)
        })
}

/// Uppercase the first character, leave the rest untouched.
fn capitalize(source: &str) -> String {
    let mut chars = source.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Source tally
// ---------------------------------------------------------------------------

/// Raw per-source counts. `total` always equals the number of records
/// tallied, whether or not their timestamps parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTally {
    pub total: u64,
    pub by_source: BTreeMap<String, u64>,
}

/// Tally records by source, counting absent sources as `"other"`.
pub fn count_by_source(records: &[WebhookRecord]) -> SourceTally {
    let mut tally = SourceTally::default();
    for record in records {
        *tally
            .by_source
            .entry(record.source_or_other().to_string())
            .or_default() += 1;
        tally.total += 1;
    }
    tally
}

impl From<SourceTally> for StatsView {
    fn from(tally: SourceTally) -> Self {
        Self {
            total: tally.total,
            source_counts: tally.by_source,
        }
    }
}

// ---------------------------------------------------------------------------
// Recent projection
// ---------------------------------------------------------------------------

/// The first `limit` records in input order. Callers sort newest-first.
pub fn most_recent<T>(records: &[T], limit: usize) -> &[T] {
    &records[..limit.min(records.len())]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn reference(date: &str) -> DateTime<Utc> {
        let day = NaiveDate::parse_from_str(date, DAY_FORMAT).unwrap();
        day.and_hms_opt(23, 59, 59).unwrap().and_utc()
    }

    #[test]
    fn labels_are_seven_ascending_days_ending_at_reference() {
        let series = bucket_by_day_and_source(&[], 7, &reference("2024-03-02"), &Palette::default());
        assert_eq!(
            series.labels,
            vec![
                "2024-02-25",
                "2024-02-26",
                "2024-02-27",
                "2024-02-28",
                "2024-02-29",
                "2024-03-01",
                "2024-03-02",
            ]
        );
        assert!(series.datasets.is_empty());
    }

    #[test]
    fn crm_and_bad_date_scenario() {
        let records = vec![
            WebhookRecord::new("2024-01-01T10:00:00Z", "crm"),
            WebhookRecord::new("bad-date", "form"),
        ];
        let series = bucket_by_day_and_source(&records, 7, &reference("2024-01-01"), &Palette::default());

        let crm = series.dataset("Crm").expect("crm dataset");
        assert_eq!(crm.data, vec![0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(crm.color, "#4CAF50");
        assert!(series.dataset("Form").is_none());

        let tally = count_by_source(&records);
        assert_eq!(tally.total, 2);
        assert_eq!(tally.by_source.get("crm"), Some(&1));
        assert_eq!(tally.by_source.get("form"), Some(&1));
    }

    #[test]
    fn source_outside_window_still_gets_a_dataset() {
        let records = vec![WebhookRecord::new("2023-06-01T00:00:00Z", "email")];
        let series = bucket_by_day_and_source(&records, 7, &reference("2024-01-01"), &Palette::default());
        let email = series.dataset("Email").unwrap();
        assert_eq!(email.total(), 0);
        assert_eq!(email.data.len(), 7);
    }

    #[test]
    fn day_sums_match_valid_records_in_window() {
        let records = vec![
            WebhookRecord::new("2024-01-05T01:00:00Z", "crm"),
            WebhookRecord::new("2024-01-05T02:00:00Z", "form"),
            WebhookRecord::new("2024-01-05 03:00:00", "form"),
            WebhookRecord::new("2024-01-03", "webhook-x"),
            WebhookRecord::new("not a date", "crm"),
            WebhookRecord {
                timestamp: Some("2024-01-04T12:00:00".into()),
                source: None,
                data: None,
            },
            WebhookRecord::default(),
        ];
        let series = bucket_by_day_and_source(&records, 7, &reference("2024-01-05"), &Palette::default());

        let pos = |d: &str| series.labels.iter().position(|l| l == d).unwrap();
        assert_eq!(series.column_total(pos("2024-01-05")), 3);
        assert_eq!(series.column_total(pos("2024-01-04")), 1);
        assert_eq!(series.column_total(pos("2024-01-03")), 1);
        assert_eq!(series.column_total(pos("2024-01-02")), 0);

        let other = series.dataset("Other").unwrap();
        assert_eq!(other.color, "#9C27B0");
        let custom = series.dataset("Webhook-x").unwrap();
        assert_eq!(custom.color, "#9C27B0");

        assert_eq!(count_by_source(&records).total, records.len() as u64);
    }

    #[test]
    fn datasets_keep_first_seen_order() {
        let records = vec![
            WebhookRecord::new("2024-01-01", "form"),
            WebhookRecord::new("2024-01-01", "crm"),
            WebhookRecord::new("2024-01-01", "form"),
        ];
        let series = bucket_by_day_and_source(&records, 7, &reference("2024-01-01"), &Palette::default());
        let labels: Vec<&str> = series.datasets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Form", "Crm"]);
    }

    #[test]
    fn offset_timestamps_convert_to_reference_zone() {
        // 23:30 UTC on Jan 1 is already Jan 2 at UTC+02:00.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let reference = tz.with_ymd_and_hms(2024, 1, 2, 23, 59, 59).unwrap();
        let records = vec![WebhookRecord::new("2024-01-01T23:30:00Z", "crm")];
        let series = bucket_by_day_and_source(&records, 2, &reference, &Palette::default());
        assert_eq!(series.labels, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(series.dataset("Crm").unwrap().data, vec![0, 1]);
    }

    #[test]
    fn zero_window_yields_empty_labels() {
        let records = vec![WebhookRecord::new("2024-01-01", "crm")];
        let series = bucket_by_day_and_source(&records, 0, &reference("2024-01-01"), &Palette::default());
        assert!(series.labels.is_empty());
        assert!(series.misaligned_dataset().is_none());
    }

    #[test]
    fn count_by_source_empty() {
        let tally = count_by_source(&[]);
        assert_eq!(tally.total, 0);
        assert!(tally.by_source.is_empty());
    }

    #[test]
    fn most_recent_bounds_and_preserves_order() {
        let records: Vec<u32> = (0..8).collect();
        assert_eq!(most_recent(&records, 5), &[0, 1, 2, 3, 4]);
        assert_eq!(most_recent(&records[..3], 5), &[0, 1, 2]);
        assert!(most_recent::<u32>(&[], 5).is_empty());
    }

    #[test]
    fn capitalize_only_touches_first_char() {
        assert_eq!(capitalize("crm"), "Crm");
        assert_eq!(capitalize("hubSpot"), "HubSpot");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn parse_day_formats() {
        let utc = Utc;
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(parse_day("2024-01-01T10:00:00Z", &utc), jan1);
        assert_eq!(parse_day("2024-01-01T10:00:00.123456", &utc), jan1);
        assert_eq!(parse_day("2024-01-01 10:00:00", &utc), jan1);
        assert_eq!(parse_day("2024-01-01T10:00:00+0000", &utc), jan1);
        assert_eq!(parse_day("2024-01-01", &utc), jan1);
        assert_eq!(parse_day("bad-date", &utc), None);
        assert_eq!(parse_day("", &utc), None);
    }
}
