//! Filter form state and the criteria it produces.
//!
//! [`FilterForm`] is the terminal counterpart of the dashboard's filter
//! panel: a date-range selector, custom from/to inputs that are only shown
//! for the `custom` option, and one checkbox per source. Submitting the form
//! yields [`FilterCriteria`], which the controller resolves against today's
//! date into concrete request bounds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::aggregate::date_range::{end_of_day, start_of_day};
use crate::aggregate::{DAY_FORMAT, DateRangeOption, derive_date_range};
use crate::error::DashboardError;
use crate::model::WebhookRecord;

/// Timestamp layout for the `from`/`to` query parameters.
const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Custom date inputs must look like `YYYY-MM-DD`.
static FORM_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("form date regex must compile"));

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// A submitted filter, still in raw form-input shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub date_range: DateRangeOption,
    /// Raw custom lower bound; only consulted for `custom`.
    pub date_from: Option<String>,
    /// Raw custom upper bound; only consulted for `custom`.
    pub date_to: Option<String>,
    /// Selected sources. Empty means every source.
    pub sources: BTreeSet<String>,
}

/// Request bounds and source selection after resolving presets and
/// validating custom input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub sources: BTreeSet<String>,
}

impl FilterCriteria {
    /// Resolve the date range relative to `today`.
    ///
    /// Invalid custom bounds are dropped rather than rejected, so a bad
    /// `from` still lets the request go out with only `to` set.
    pub fn resolve(&self, today: NaiveDate) -> ResolvedFilter {
        let (from, to) = match derive_date_range(self.date_range, today) {
            Some(range) => (Some(range.from), Some(range.to)),
            None => (
                custom_bound("from", self.date_from.as_deref()),
                custom_bound("to", self.date_to.as_deref()),
            ),
        };

        ResolvedFilter {
            from,
            to,
            sources: self.sources.clone(),
        }
    }
}

fn custom_bound(name: &str, input: Option<&str>) -> Option<NaiveDate> {
    let input = input.map(str::trim).filter(|s| !s.is_empty())?;
    match parse_form_date(input) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::debug!(bound = name, error = %e, "dropping custom date bound");
            None
        }
    }
}

/// Validate a `YYYY-MM-DD` form input.
pub fn parse_form_date(input: &str) -> Result<NaiveDate, DashboardError> {
    if !FORM_DATE_RE.is_match(input) {
        return Err(DashboardError::Validation(format!(
            "'{input}' is not in YYYY-MM-DD format"
        )));
    }
    NaiveDate::parse_from_str(input, DAY_FORMAT)
        .map_err(|_| DashboardError::Validation(format!("'{input}' is not a calendar date")))
}

impl ResolvedFilter {
    /// Query string for the records endpoint, without the leading `?`.
    ///
    /// `from` is widened to the start of its day and `to` to the end.
    pub fn query(&self) -> String {
        let mut params = Vec::new();
        if let Some(from) = self.from {
            params.push(format!("from={}", start_of_day(from).format(QUERY_TIMESTAMP_FORMAT)));
        }
        if let Some(to) = self.to {
            params.push(format!("to={}", end_of_day(to).format(QUERY_TIMESTAMP_FORMAT)));
        }
        params.join("&")
    }

    /// Keep only records whose source is selected. An empty selection keeps
    /// everything.
    pub fn apply(&self, records: Vec<WebhookRecord>) -> Vec<WebhookRecord> {
        filter_by_sources(records, &self.sources)
    }
}

/// Keep records whose source (absent → `"other"`) is in `sources`.
/// Matching ignores case.
///
/// No selection is treated as "all sources", not "no results".
pub fn filter_by_sources(
    records: Vec<WebhookRecord>,
    sources: &BTreeSet<String>,
) -> Vec<WebhookRecord> {
    if sources.is_empty() {
        return records;
    }
    let wanted: BTreeSet<String> = sources.iter().map(|s| s.to_lowercase()).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(&r.source_or_other().to_lowercase()))
        .collect()
}

// ---------------------------------------------------------------------------
// Form state
// ---------------------------------------------------------------------------

/// The filter panel's current UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterForm {
    pub date_range: DateRangeOption,
    /// Whether the custom from/to inputs are shown.
    pub custom_visible: bool,
    pub date_from: String,
    pub date_to: String,
    checkboxes: BTreeMap<String, bool>,
}

impl FilterForm {
    /// A form with one checked box per source and the `week` preset.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date_range: DateRangeOption::Week,
            custom_visible: false,
            date_from: String::new(),
            date_to: String::new(),
            checkboxes: sources.into_iter().map(|s| (s.into(), true)).collect(),
        }
    }

    /// Change the date-range selector. Custom inputs show only for `custom`.
    pub fn select_range(&mut self, option: DateRangeOption) {
        self.date_range = option;
        self.custom_visible = option == DateRangeOption::Custom;
    }

    pub fn set_custom_dates(&mut self, from: Option<&str>, to: Option<&str>) {
        self.date_from = from.unwrap_or_default().to_string();
        self.date_to = to.unwrap_or_default().to_string();
    }

    /// Check exactly the given sources and uncheck the rest. Unknown
    /// sources get a new checked box.
    pub fn check_only(&mut self, selected: &BTreeSet<String>) {
        for (source, checked) in self.checkboxes.iter_mut() {
            *checked = selected.contains(source);
        }
        for source in selected {
            self.checkboxes.entry(source.clone()).or_insert(true);
        }
    }

    pub fn set_checked(&mut self, source: &str, checked: bool) {
        self.checkboxes.insert(source.to_string(), checked);
    }

    pub fn is_checked(&self, source: &str) -> bool {
        self.checkboxes.get(source).copied().unwrap_or(false)
    }

    /// Add checkboxes for newly reported sources (checked). Existing boxes
    /// keep their state.
    pub fn sync_sources(&mut self, sources: &[String]) {
        for source in sources {
            self.checkboxes.entry(source.clone()).or_insert(true);
        }
    }

    /// Every source with a checkbox, in display order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.checkboxes.keys().map(String::as_str)
    }

    /// Restore the defaults: `week`, custom inputs hidden, all boxes checked.
    pub fn reset(&mut self) {
        self.select_range(DateRangeOption::Week);
        for checked in self.checkboxes.values_mut() {
            *checked = true;
        }
    }

    /// Read the form into criteria. Custom inputs are only read when the
    /// `custom` option is selected.
    pub fn criteria(&self) -> FilterCriteria {
        let custom = self.date_range == DateRangeOption::Custom;
        let input = |s: &String| (custom && !s.is_empty()).then(|| s.clone());

        FilterCriteria {
            date_range: self.date_range,
            date_from: input(&self.date_from),
            date_to: input(&self.date_to),
            sources: self
                .checkboxes
                .iter()
                .filter(|(_, checked)| **checked)
                .map(|(source, _)| source.clone())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
