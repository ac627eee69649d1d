//! Render adapters and the presentation object that owns them.
//!
//! The controller never draws anything itself. It hands data to a
//! [`Presentation`], which fans it out to its adapters: line chart,
//! doughnut chart, stat counters, recent-activity table, filter form and
//! the status banner. Every adapter must accept an explicitly empty value, which is how
//! the controller clears stale content after a failure.

pub mod terminal;

use serde::Serialize;
use serde_json::Value;

use crate::filter::FilterForm;
use crate::model::{ChartSeries, StatsView, WebhookRecord};
use crate::palette::PLACEHOLDER_COLOR;

/// Characters of payload shown in the recent-activity table.
pub const SAMPLE_CHARS: usize = 30;

// ---------------------------------------------------------------------------
// Adapter traits
// ---------------------------------------------------------------------------

/// A widget that displays one kind of data and is fully redrawn on each call.
pub trait RenderAdapter<T: ?Sized> {
    /// Prepare the widget and show its "no data" state.
    fn init(&mut self) {}

    /// Replace whatever is displayed with `data`.
    fn render(&mut self, data: &T);

    /// Release the widget.
    fn dispose(&mut self) {}
}

/// Transient loading/error/info banners.
pub trait StatusBanner {
    fn show_loading(&mut self);
    fn hide_loading(&mut self);
    /// Show the red error panel.
    fn show_error(&mut self, message: &str);
    /// Show a neutral notice, distinct from the error panel.
    fn show_info(&mut self, message: &str);
    /// Remove the error and info banners (not the loading indicator).
    fn clear_messages(&mut self);
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// The set of adapters a controller drives, with an explicit lifecycle.
pub struct Presentation {
    line_chart: Box<dyn RenderAdapter<ChartSeries>>,
    doughnut_chart: Box<dyn RenderAdapter<ChartSeries>>,
    stats: Box<dyn RenderAdapter<StatsView>>,
    table: Box<dyn RenderAdapter<[WebhookRecord]>>,
    filter_form: Box<dyn RenderAdapter<FilterForm>>,
    banner: Box<dyn StatusBanner>,
    active: bool,
}

impl Presentation {
    pub fn new(
        line_chart: Box<dyn RenderAdapter<ChartSeries>>,
        doughnut_chart: Box<dyn RenderAdapter<ChartSeries>>,
        stats: Box<dyn RenderAdapter<StatsView>>,
        table: Box<dyn RenderAdapter<[WebhookRecord]>>,
        filter_form: Box<dyn RenderAdapter<FilterForm>>,
        banner: Box<dyn StatusBanner>,
    ) -> Self {
        Self {
            line_chart,
            doughnut_chart,
            stats,
            table,
            filter_form,
            banner,
            active: false,
        }
    }

    /// Initialize every adapter. Idempotent.
    pub fn init(&mut self) {
        if self.active {
            return;
        }
        self.line_chart.init();
        self.doughnut_chart.init();
        self.stats.init();
        self.table.init();
        self.filter_form.init();
        self.active = true;
    }

    /// Dispose every adapter. Idempotent.
    pub fn dispose(&mut self) {
        if !self.active {
            return;
        }
        self.line_chart.dispose();
        self.doughnut_chart.dispose();
        self.stats.dispose();
        self.table.dispose();
        self.filter_form.dispose();
        self.active = false;
    }

    /// Feed one series to both charts.
    pub fn render_charts(&mut self, series: &ChartSeries) {
        self.line_chart.render(series);
        self.doughnut_chart.render(series);
    }

    pub fn render_stats(&mut self, stats: &StatsView) {
        self.stats.render(stats);
    }

    pub fn render_table(&mut self, records: &[WebhookRecord]) {
        self.table.render(records);
    }

    /// Show the form's current selections.
    pub fn render_filter_form(&mut self, form: &FilterForm) {
        self.filter_form.render(form);
    }

    /// Reset stats, charts and table to their empty representation.
    pub fn clear_widgets(&mut self) {
        self.render_stats(&StatsView::empty());
        self.render_charts(&ChartSeries::empty());
        self.render_table(&[]);
    }

    pub fn banner(&mut self) -> &mut dyn StatusBanner {
        self.banner.as_mut()
    }
}

impl Drop for Presentation {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Shared shaping helpers
// ---------------------------------------------------------------------------

/// One slice of the doughnut chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: u64,
    pub color: String,
}

/// Per-dataset totals for the doughnut chart.
///
/// When there are no datasets or every total is zero, a single grey
/// "No Data" slice stands in.
pub fn doughnut_slices(series: &ChartSeries) -> Vec<Slice> {
    let slices: Vec<Slice> = series
        .datasets
        .iter()
        .map(|d| Slice {
            label: d.label.clone(),
            value: d.total(),
            color: d.color.clone(),
        })
        .collect();

    if slices.iter().all(|s| s.value == 0) {
        return vec![Slice {
            label: "No Data".to_string(),
            value: 1,
            color: PLACEHOLDER_COLOR.to_string(),
        }];
    }
    slices
}

/// A short preview of a record's payload: the first key other than
/// `source`, with its value cut to [`SAMPLE_CHARS`] characters.
pub fn payload_sample(record: &WebhookRecord) -> Option<String> {
    let data = record.data.as_ref()?;
    let (key, value) = data.iter().find(|(key, _)| key.as_str() != "source")?;

    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let cut: String = text.chars().take(SAMPLE_CHARS).collect();
    Some(format!("{key}: {cut}..."))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
