//! Data types exchanged with the webhook backend and the render adapters.
//!
//! Inbound records are deserialized leniently: a record with a missing or
//! oddly-typed field is still a record, it just contributes less to the
//! aggregates. Shape problems that break an invariant (e.g. a chart dataset
//! whose length does not match its labels) are rejected in [`crate::api`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Source name used when a record carries no (or an empty) source.
pub const OTHER_SOURCE: &str = "other";

// ---------------------------------------------------------------------------
// Webhook record
// ---------------------------------------------------------------------------

/// One ingested webhook event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookRecord {
    /// ISO-8601 (or otherwise parseable) timestamp, if the backend sent a string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
    /// Arbitrary payload. Non-object payloads are dropped.
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: Option<Map<String, Value>>,
}

impl WebhookRecord {
    /// Build a record from a timestamp and source. Mostly useful in tests.
    pub fn new(timestamp: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            source: Some(source.into()),
            data: None,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// The record's source, defaulting to `"other"` when absent or empty.
    pub fn source_or_other(&self) -> &str {
        match self.source.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => OTHER_SOURCE,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

/// One line of the time-series chart: a source and its per-day counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<u64>,
    /// Hex color. The backend calls this `backgroundColor`.
    #[serde(default, alias = "backgroundColor")]
    pub color: String,
}

impl Dataset {
    /// Sum of all counts in this dataset.
    pub fn total(&self) -> u64 {
        self.data.iter().sum()
    }
}

/// Positionally aligned labels and datasets for the time-series chart.
///
/// Every dataset's `data` has exactly `labels.len()` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

impl ChartSeries {
    /// The "no data" series used to clear both charts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sum of every dataset's count at label position `index`.
    pub fn column_total(&self, index: usize) -> u64 {
        self.datasets
            .iter()
            .filter_map(|d| d.data.get(index))
            .sum()
    }

    /// Return the label of the first dataset whose length differs from the
    /// label count, if any.
    pub fn misaligned_dataset(&self) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.data.len() != self.labels.len())
    }

    pub fn dataset(&self, label: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.label == label)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// The backend's pre-aggregated view for the default trailing-week dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_webhooks: u64,
    #[serde(default)]
    pub source_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub chart_data: ChartSeries,
    #[serde(default)]
    pub latest_records: Vec<WebhookRecord>,
    /// Configured data sources, used to populate the source checkboxes.
    #[serde(default, deserialize_with = "source_names")]
    pub sources: Vec<String>,
}

/// Accept either `["crm", ...]` or `[{"name": "crm", ...}, ...]`.
fn source_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            Value::Object(mut obj) => match obj.remove("name") {
                Some(Value::String(name)) => Some(name),
                _ => None,
            },
            _ => None,
        })
        .collect())
}

/// What the stat counters display: a total and per-source counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub total: u64,
    pub source_counts: BTreeMap<String, u64>,
}

impl StatsView {
    /// Zero total and no per-source counts.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<&DashboardSummary> for StatsView {
    fn from(summary: &DashboardSummary) -> Self {
        Self {
            total: summary.total_webhooks,
            source_counts: summary.source_counts.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
