//! Dashboard controller: fetch → validate → aggregate → render.
//!
//! Each refresh or filter cycle is split in two. `begin_*` updates the UI
//! synchronously (loading indicator, form state) and returns a
//! self-contained [`Pending`] future that owns its request; `complete`
//! renders the finished [`Outcome`]. The split lets the watch loop keep
//! several requests in flight at once while all rendering stays on one
//! task. The `refresh`/`apply_filters`/`reset_filters` methods run a single
//! cycle end to end.
//!
//! Failures never leave this module. Every error is turned into empty
//! widgets plus a banner, and the next timer tick tries again.

pub mod event_loop;

use std::time::Duration;

use chrono::Local;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::activity::{CycleLog, CycleLogEntry};
use crate::aggregate::{bucket_by_day_and_source, count_by_source, most_recent};
use crate::api::ApiClient;
use crate::config::schema::RefreshConfig;
use crate::config::ResponseOrdering;
use crate::error::{DashboardError, ErrorKind};
use crate::filter::{FilterCriteria, FilterForm, ResolvedFilter};
use crate::model::{DashboardSummary, StatsView, WebhookRecord};
use crate::palette::Palette;
use crate::render::Presentation;

pub use event_loop::{UserAction, run};

/// Banner shown when a filter matches nothing.
pub const NO_MATCHES_MESSAGE: &str = "No webhooks match the selected filters.";

/// Where the current (or last) cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Rendered,
    ErrorDisplayed,
}

/// Which endpoint a cycle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Refresh,
    Filter,
}

impl CycleKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Filter => "filter",
        }
    }
}

/// The result of one request, tagged with the generation it was issued as.
#[derive(Debug)]
pub struct Outcome {
    pub generation: u64,
    started: Instant,
    payload: Payload,
}

impl Outcome {
    pub fn kind(&self) -> CycleKind {
        match self.payload {
            Payload::Summary(_) => CycleKind::Refresh,
            Payload::Records { .. } => CycleKind::Filter,
        }
    }
}

#[derive(Debug)]
enum Payload {
    Summary(Result<DashboardSummary, DashboardError>),
    Records {
        filter: ResolvedFilter,
        result: Result<Vec<WebhookRecord>, DashboardError>,
    },
}

/// An in-flight request. Owns everything it needs.
pub type Pending = BoxFuture<'static, Outcome>;

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct DashboardController {
    client: ApiClient,
    presentation: Presentation,
    form: FilterForm,
    settings: RefreshConfig,
    palette: Palette,
    cycle_log: CycleLog,
    phase: CyclePhase,
    /// Last generation handed out.
    issued: u64,
    /// Newest generation whose outcome reached the screen.
    latest_rendered: u64,
    filters_in_flight: usize,
}

impl DashboardController {
    /// A controller for the given sources. Nothing is drawn until
    /// [`start`](Self::start).
    pub fn new(
        client: ApiClient,
        presentation: Presentation,
        settings: RefreshConfig,
        palette: Palette,
        sources: &[String],
    ) -> Self {
        Self {
            client,
            presentation,
            form: FilterForm::new(sources.iter().cloned()),
            settings,
            palette,
            cycle_log: CycleLog::Disabled,
            phase: CyclePhase::Idle,
            issued: 0,
            latest_rendered: 0,
            filters_in_flight: 0,
        }
    }

    pub fn with_cycle_log(mut self, cycle_log: CycleLog) -> Self {
        self.cycle_log = cycle_log;
        self
    }

    /// Initialize the presentation and show the form.
    pub fn start(&mut self) {
        self.presentation.init();
        self.presentation.render_filter_form(&self.form);
    }

    /// Dispose the presentation.
    pub fn shutdown(&mut self) {
        self.presentation.dispose();
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn form(&self) -> &FilterForm {
        &self.form
    }

    // -----------------------------------------------------------------------
    // One-shot cycles
    // -----------------------------------------------------------------------

    /// Fetch the summary and render it, or the error state.
    pub async fn refresh(&mut self) {
        let pending = self.begin_refresh();
        let outcome = pending.await;
        self.complete(outcome);
    }

    /// Fetch records for `criteria`, aggregate them and render.
    pub async fn apply_filters(&mut self, criteria: &FilterCriteria) {
        let pending = self.begin_filter(criteria);
        let outcome = pending.await;
        self.complete(outcome);
    }

    /// Restore the default form, then refresh.
    pub async fn reset_filters(&mut self) {
        let pending = self.begin_reset();
        let outcome = pending.await;
        self.complete(outcome);
    }

    // -----------------------------------------------------------------------
    // Issuing
    // -----------------------------------------------------------------------

    fn next_generation(&mut self) -> u64 {
        self.issued += 1;
        self.phase = CyclePhase::Fetching;
        self.issued
    }

    /// Issue a summary request.
    pub fn begin_refresh(&mut self) -> Pending {
        let generation = self.next_generation();
        let request = self.client.fetch_summary();
        tracing::debug!(generation, "refresh issued");

        async move {
            let started = Instant::now();
            let result = request.await;
            Outcome {
                generation,
                started,
                payload: Payload::Summary(result),
            }
        }
        .boxed()
    }

    /// Reset the form and issue a summary request.
    pub fn begin_reset(&mut self) -> Pending {
        self.form.reset();
        self.presentation.render_filter_form(&self.form);
        self.begin_refresh()
    }

    /// Issue a records request for `criteria` and show the loading
    /// indicator. The request is abandoned after `filter_timeout_secs`.
    pub fn begin_filter(&mut self, criteria: &FilterCriteria) -> Pending {
        self.sync_form(criteria);

        let generation = self.next_generation();
        let filter = criteria.resolve(Local::now().date_naive());
        let request = self.client.fetch_records(&filter);
        let deadline = Duration::from_secs(self.settings.filter_timeout_secs);

        self.filters_in_flight += 1;
        self.presentation.banner().show_loading();
        tracing::debug!(generation, query = %filter.query(), "filter issued");

        async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(deadline, request).await {
                Ok(result) => result,
                Err(_) => Err(DashboardError::Timeout(deadline)),
            };
            Outcome {
                generation,
                started,
                payload: Payload::Records { filter, result },
            }
        }
        .boxed()
    }

    /// Mirror submitted criteria into the form and redraw it.
    fn sync_form(&mut self, criteria: &FilterCriteria) {
        self.form.select_range(criteria.date_range);
        self.form
            .set_custom_dates(criteria.date_from.as_deref(), criteria.date_to.as_deref());

        if criteria.sources.is_empty() {
            let all: Vec<String> = self.form.sources().map(str::to_string).collect();
            for source in all {
                self.form.set_checked(&source, true);
            }
        } else {
            self.form.check_only(&criteria.sources);
        }
        self.presentation.render_filter_form(&self.form);
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Render a finished request, or discard it if it is stale.
    pub fn complete(&mut self, outcome: Outcome) {
        let kind = outcome.kind();
        let latency_ms = outcome.started.elapsed().as_millis() as u64;

        if kind == CycleKind::Filter {
            self.filters_in_flight = self.filters_in_flight.saturating_sub(1);
            if self.filters_in_flight == 0 {
                self.presentation.banner().hide_loading();
            }
        }

        if self.settings.ordering == ResponseOrdering::LatestIssued
            && outcome.generation < self.latest_rendered
        {
            tracing::debug!(
                generation = outcome.generation,
                latest = self.latest_rendered,
                "discarding stale response"
            );
            self.cycle_log.record(&CycleLogEntry::now(
                kind.as_str(),
                outcome.generation,
                "discarded",
                latency_ms,
            ));
            return;
        }
        self.latest_rendered = self.latest_rendered.max(outcome.generation);

        let mut entry = CycleLogEntry::now(kind.as_str(), outcome.generation, "rendered", latency_ms);

        let rendered = match outcome.payload {
            Payload::Summary(Ok(summary)) => Ok(self.render_summary(summary)),
            Payload::Records {
                filter,
                result: Ok(records),
            } => Ok(self.render_filtered(&filter, records)),
            Payload::Summary(Err(e)) | Payload::Records { result: Err(e), .. } => Err(e),
        };

        match rendered {
            Ok(count) => {
                entry.records = Some(count);
                self.phase = CyclePhase::Rendered;
            }
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "cycle failed");
                self.render_error(kind, &e);
                entry.outcome = "error".to_string();
                entry.error_kind = Some(e.kind().to_string());
                entry.message = Some(e.to_string());
                self.phase = CyclePhase::ErrorDisplayed;
            }
        }

        self.cycle_log.record(&entry);
    }

    /// Returns the total shown.
    fn render_summary(&mut self, summary: DashboardSummary) -> u64 {
        if !summary.sources.is_empty() {
            self.form.sync_sources(&summary.sources);
            self.presentation.render_filter_form(&self.form);
        }

        self.presentation.banner().clear_messages();
        self.presentation.render_stats(&StatsView::from(&summary));
        self.presentation.render_charts(&summary.chart_data);
        self.presentation.render_table(&summary.latest_records);
        summary.total_webhooks
    }

    /// Returns the number of records that matched.
    fn render_filtered(&mut self, filter: &ResolvedFilter, records: Vec<WebhookRecord>) -> u64 {
        let filtered = filter.apply(records);
        let series = bucket_by_day_and_source(
            &filtered,
            self.settings.window_days,
            &Local::now(),
            &self.palette,
        );
        let stats = StatsView::from(count_by_source(&filtered));

        self.presentation.banner().clear_messages();
        self.presentation.render_charts(&series);
        self.presentation.render_stats(&stats);
        self.presentation
            .render_table(most_recent(&filtered, self.settings.recent_limit));

        if filtered.is_empty() {
            self.presentation.banner().show_info(NO_MATCHES_MESSAGE);
        }
        stats.total
    }

    fn render_error(&mut self, kind: CycleKind, error: &DashboardError) {
        self.presentation.clear_widgets();
        let message = error_message(kind, error, self.settings.interval_secs);
        self.presentation.banner().show_error(&message);
    }
}

/// Banner text for a failed cycle.
pub fn error_message(kind: CycleKind, error: &DashboardError, interval_secs: u64) -> String {
    let retry = format!("Retrying automatically in {interval_secs}s.");
    match (kind, error.kind()) {
        (_, ErrorKind::Timeout) => format!("Filter request timed out ({error}). {retry}"),
        (CycleKind::Refresh, _) => format!("Failed to load dashboard data: {error}. {retry}"),
        (CycleKind::Filter, _) => format!("Failed to apply filters: {error}. {retry}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_mention_retry() {
        let msg = error_message(
            CycleKind::Refresh,
            &DashboardError::Rejected(Some("DB down".into())),
            60,
        );
        assert_eq!(
            msg,
            "Failed to load dashboard data: server reported an error: DB down. Retrying automatically in 60s."
        );

        let msg = error_message(
            CycleKind::Filter,
            &DashboardError::Timeout(Duration::from_secs(15)),
            60,
        );
        assert!(msg.starts_with("Filter request timed out (request timed out after 15s)."));

        let msg = error_message(CycleKind::Filter, &DashboardError::Status(500, None), 30);
        assert!(msg.contains("HTTP 500"));
        assert!(msg.ends_with("in 30s."));
    }
}
