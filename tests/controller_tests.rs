/// Controller cycle tests.
///
/// The controller is driven against a scripted in-memory backend whose
/// responses resolve after fixed (virtual) delays, and renders into a
/// terminal screen backed by `io::sink()` so the resulting state can be
/// inspected directly. Time is paused, so timeouts and overlapping requests
/// resolve deterministically.
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use hookdash::aggregate::DateRangeOption;
use hookdash::api::ApiClient;
use hookdash::api::client::{FetchFuture, Transport};
use hookdash::config::ResponseOrdering;
use hookdash::config::schema::{ApiConfig, RefreshConfig};
use hookdash::controller::{self, CyclePhase, DashboardController, NO_MATCHES_MESSAGE, UserAction};
use hookdash::error::DashboardError;
use hookdash::filter::FilterCriteria;
use hookdash::palette::Palette;
use hookdash::render::terminal::{Screen, ScreenOptions, ScreenState, SharedScreen, terminal_presentation};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

type Scripted = (Duration, Result<Value, DashboardError>);

struct ScriptedBackend {
    responses: Mutex<VecDeque<Scripted>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedBackend {
    fn get_json(&self, url: String) -> FetchFuture {
        self.urls.lock().unwrap().push(url);
        let (delay, response) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Duration::ZERO, Err(DashboardError::Transport("no scripted response".into()))));

        async move {
            tokio::time::sleep(delay).await;
            response
        }
        .boxed()
    }
}

struct Harness {
    controller: DashboardController,
    screen: SharedScreen,
    backend: Arc<ScriptedBackend>,
}

impl Harness {
    fn new(ordering: ResponseOrdering, responses: Vec<Scripted>) -> Self {
        let backend = ScriptedBackend::new(responses);
        let api = ApiConfig {
            base_url: "http://backend.test".to_string(),
            cache_bust: false,
            ..ApiConfig::default()
        };
        let client = ApiClient::with_transport(&api, backend.clone());

        let screen = Screen::new(Box::new(io::sink()), Palette::default(), ScreenOptions::default()).shared();
        let settings = RefreshConfig {
            ordering,
            ..RefreshConfig::default()
        };
        let sources: Vec<String> = ["crm", "form", "email", "other"].iter().map(|s| s.to_string()).collect();

        let mut controller = DashboardController::new(
            client,
            terminal_presentation(&screen),
            settings,
            Palette::default(),
            &sources,
        );
        controller.start();

        Self {
            controller,
            screen,
            backend,
        }
    }

    fn state(&self) -> ScreenState {
        self.screen.borrow().state().clone()
    }
}

fn at_once() -> Duration {
    Duration::ZERO
}

fn success(data: Value) -> Result<Value, DashboardError> {
    Ok(json!({ "status": "success", "data": data }))
}

fn summary(total: u64) -> Result<Value, DashboardError> {
    success(json!({
        "total_webhooks": total,
        "source_counts": { "crm": total },
        "chart_data": {
            "labels": ["2024-01-01", "2024-01-02"],
            "datasets": [{ "label": "Crm", "data": [1, 2], "backgroundColor": "#4CAF50" }]
        },
        "latest_records": [
            { "timestamp": "2024-01-02T10:00:00", "source": "crm", "data": { "email": "a@example.com" } }
        ],
        "sources": ["crm", "form", "stripe"]
    }))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A record stamped at noon on `day` (local wall clock).
fn record_on(day: NaiveDate, source: &str) -> Value {
    let ts = format!("{}T12:00:00", day.format("%Y-%m-%d"));
    json!({ "timestamp": ts, "source": source, "data": { "id": 1 } })
}

fn records(day: NaiveDate, sources: &[&str]) -> Result<Value, DashboardError> {
    success(Value::Array(sources.iter().map(|s| record_on(day, s)).collect()))
}

fn criteria(range: DateRangeOption, sources: &[&str]) -> FilterCriteria {
    FilterCriteria {
        date_range: range,
        sources: sources.iter().map(|s| s.to_string()).collect(),
        ..FilterCriteria::default()
    }
}

// ---------------------------------------------------------------------------
// refresh
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn summary_success_renders_every_widget() {
    let mut h = Harness::new(ResponseOrdering::LastResolved, vec![(at_once(), summary(42))]);
    h.controller.refresh().await;

    let state = h.state();
    assert_eq!(state.stats.total, 42);
    assert_eq!(state.stats.source_counts.get("crm"), Some(&42));
    assert_eq!(state.series.labels, vec!["2024-01-01", "2024-01-02"]);
    assert_eq!(state.series.datasets[0].color, "#4CAF50");
    assert_eq!(state.slices[0].value, 3);
    assert_eq!(state.recent.len(), 1);
    assert_eq!(state.error, None);
    assert_eq!(h.controller.phase(), CyclePhase::Rendered);

    assert!(h.controller.form().is_checked("stripe"));
    assert_eq!(h.backend.urls(), vec!["http://backend.test/api/dashboard/summary"]);
}

#[tokio::test(start_paused = true)]
async fn error_envelope_clears_widgets_and_shows_banner() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![
            (at_once(), summary(42)),
            (at_once(), Ok(json!({ "status": "error", "message": "DB down" }))),
        ],
    );
    h.controller.refresh().await;
    h.controller.refresh().await;

    let state = h.state();
    assert_eq!(state.stats.total, 0);
    assert!(state.stats.source_counts.is_empty());
    assert!(state.series.labels.is_empty());
    assert!(state.series.datasets.is_empty());
    assert_eq!(state.slices[0].label, "No Data");
    assert!(state.recent.is_empty());

    let banner = state.error.expect("error banner");
    assert!(banner.contains("DB down"));
    assert!(banner.contains("Retrying automatically"));
    assert_eq!(h.controller.phase(), CyclePhase::ErrorDisplayed);
}

#[tokio::test(start_paused = true)]
async fn transport_and_shape_failures_take_the_error_path() {
    let misaligned = success(json!({
        "total_webhooks": 1,
        "chart_data": { "labels": ["2024-01-01"], "datasets": [{ "label": "Crm", "data": [1, 2] }] }
    }));
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![
            (at_once(), Err(DashboardError::Status(503, None))),
            (at_once(), misaligned),
            (at_once(), success(json!({ "source_counts": {} }))),
        ],
    );

    h.controller.refresh().await;
    assert!(h.state().error.unwrap().contains("HTTP 503"));

    h.controller.refresh().await;
    assert!(h.state().error.unwrap().contains("malformed response"));

    h.controller.refresh().await;
    assert!(h.state().error.unwrap().contains("malformed response"));
    assert_eq!(h.state().stats.total, 0);
}

#[tokio::test(start_paused = true)]
async fn success_after_error_clears_the_banner() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![
            (at_once(), Err(DashboardError::Transport("connection refused".into()))),
            (at_once(), summary(7)),
        ],
    );
    h.controller.refresh().await;
    assert!(h.state().error.is_some());

    h.controller.refresh().await;
    assert_eq!(h.state().error, None);
    assert_eq!(h.state().stats.total, 7);
}

// ---------------------------------------------------------------------------
// applyFilters
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn filter_aggregates_selected_sources() {
    let today = today();
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(at_once(), records(today, &["crm", "form", "crm", "", "crm", "crm", "crm", "crm"]))],
    );
    h.controller
        .apply_filters(&criteria(DateRangeOption::Week, &["crm"]))
        .await;

    let state = h.state();
    assert_eq!(state.stats.total, 6);
    assert_eq!(state.stats.source_counts.len(), 1);
    assert_eq!(state.series.labels.len(), 7);
    assert_eq!(state.series.datasets.len(), 1);
    assert_eq!(state.series.datasets[0].label, "Crm");
    assert_eq!(state.series.datasets[0].data[6], 6);
    assert_eq!(state.recent.len(), 5);
    assert!(!state.loading);
    assert_eq!(state.info, None);

    let url = &h.backend.urls()[0];
    let week_start = today - chrono::Days::new(6);
    assert_eq!(
        url,
        &format!(
            "http://backend.test/api/webhook/data?from={}T00:00:00&to={}T23:59:59",
            week_start.format("%Y-%m-%d"),
            today.format("%Y-%m-%d")
        )
    );
}

#[tokio::test(start_paused = true)]
async fn empty_source_selection_means_all_sources() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(at_once(), records(today(), &["crm", "form", "email"]))],
    );
    h.controller
        .apply_filters(&criteria(DateRangeOption::Today, &[]))
        .await;

    assert_eq!(h.state().stats.total, 3);
    assert!(h.controller.form().is_checked("crm"));
    assert!(h.controller.form().is_checked("email"));
}

#[tokio::test(start_paused = true)]
async fn source_selection_ignores_record_case() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(at_once(), records(today(), &["Stripe", "stripe", "crm"]))],
    );
    h.controller
        .apply_filters(&criteria(DateRangeOption::Today, &["stripe"]))
        .await;

    let state = h.state();
    assert_eq!(state.stats.total, 2);
    assert_eq!(state.info, None);
}

#[tokio::test(start_paused = true)]
async fn malformed_custom_from_is_dropped() {
    let mut h = Harness::new(ResponseOrdering::LastResolved, vec![(at_once(), success(json!([])))]);
    let criteria = FilterCriteria {
        date_range: DateRangeOption::Custom,
        date_from: Some("01-01-2024".to_string()),
        date_to: Some("2024-01-31".to_string()),
        sources: BTreeSet::new(),
    };
    h.controller.apply_filters(&criteria).await;

    assert_eq!(
        h.backend.urls(),
        vec!["http://backend.test/api/webhook/data?to=2024-01-31T23:59:59"]
    );

    let state = h.state();
    assert_eq!(state.error, None);
    assert_eq!(state.info.as_deref(), Some(NO_MATCHES_MESSAGE));
    assert_eq!(state.stats.total, 0);
    assert!(!state.loading);
    assert!(h.controller.form().custom_visible);
}

#[tokio::test(start_paused = true)]
async fn filter_timeout_clears_loading_and_shows_banner() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(Duration::from_secs(20), records(today(), &["crm"]))],
    );
    h.controller
        .apply_filters(&criteria(DateRangeOption::Week, &[]))
        .await;

    let state = h.state();
    assert!(!state.loading);
    assert!(state.error.unwrap().contains("timed out after 15s"));
    assert_eq!(state.stats.total, 0);
    assert_eq!(h.controller.phase(), CyclePhase::ErrorDisplayed);
}

#[tokio::test(start_paused = true)]
async fn filter_error_clears_loading() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(at_once(), Ok(json!({ "status": "error" })))],
    );
    h.controller
        .apply_filters(&criteria(DateRangeOption::Month, &[]))
        .await;

    let state = h.state();
    assert!(!state.loading);
    assert!(state.error.unwrap().starts_with("Failed to apply filters"));
}

// ---------------------------------------------------------------------------
// Overlapping requests
// ---------------------------------------------------------------------------

/// Issue two filters; the first resolves after the second.
async fn overlapping(ordering: ResponseOrdering) -> Harness {
    let mut h = Harness::new(
        ordering,
        vec![
            (Duration::from_secs(2), records(today(), &["crm"])),
            (Duration::from_secs(1), records(today(), &["form", "form", "form"])),
        ],
    );

    let first = h.controller.begin_filter(&criteria(DateRangeOption::Week, &[]));
    let second = h.controller.begin_filter(&criteria(DateRangeOption::Week, &[]));
    assert!(h.state().loading);

    let mut pending: FuturesUnordered<_> = [first, second].into_iter().collect();

    let early = pending.next().await.unwrap();
    assert_eq!(early.generation, 2);
    h.controller.complete(early);
    assert_eq!(h.state().stats.total, 3);
    assert!(h.state().loading, "one request still in flight");

    let late = pending.next().await.unwrap();
    assert_eq!(late.generation, 1);
    h.controller.complete(late);
    assert!(!h.state().loading);

    h
}

#[tokio::test(start_paused = true)]
async fn last_resolved_response_wins_by_default() {
    let h = overlapping(ResponseOrdering::LastResolved).await;
    assert_eq!(h.state().stats.total, 1);
    assert_eq!(h.state().stats.source_counts.get("crm"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn latest_issued_ordering_discards_stale_response() {
    let h = overlapping(ResponseOrdering::LatestIssued).await;
    assert_eq!(h.state().stats.total, 3);
    assert_eq!(h.state().stats.source_counts.get("form"), Some(&3));
}

// ---------------------------------------------------------------------------
// resetFilters
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reset_restores_form_and_refreshes() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![(at_once(), records(today(), &["crm"])), (at_once(), summary(9))],
    );
    let custom = FilterCriteria {
        date_range: DateRangeOption::Custom,
        date_from: Some("2024-01-01".into()),
        date_to: None,
        sources: BTreeSet::from(["crm".to_string()]),
    };
    h.controller.apply_filters(&custom).await;
    assert!(!h.controller.form().is_checked("form"));
    {
        let frame = h.screen.borrow().frame();
        assert!(frame.contains("Range: custom"));
        assert!(frame.contains("From: 2024-01-01  To: -"));
        assert!(frame.contains("[ ] "));
    }

    h.controller.reset_filters().await;

    let form = h.controller.form();
    assert_eq!(form.date_range, DateRangeOption::Week);
    assert!(!form.custom_visible);
    assert!(form.sources().all(|s| form.is_checked(s)));

    assert_eq!(h.state().stats.total, 9);
    assert_eq!(
        h.backend.urls().last().map(String::as_str),
        Some("http://backend.test/api/dashboard/summary")
    );

    assert_eq!(h.state().filter.as_ref(), Some(h.controller.form()));
    let frame = h.screen.borrow().frame();
    assert!(frame.contains("Range: week"));
    assert!(!frame.contains("From:"));
    assert!(!frame.contains("[ ] "));
}

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn watch_loop_refreshes_on_interval_and_handles_actions() {
    let mut h = Harness::new(
        ResponseOrdering::LastResolved,
        vec![
            (at_once(), summary(1)),
            (at_once(), records(today(), &["email", "email"])),
            (at_once(), summary(2)),
        ],
    );
    let (tx, rx) = mpsc::unbounded_channel();

    let user = async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(UserAction::Filter(criteria(DateRangeOption::Today, &["email"])))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(UserAction::Refresh).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(UserAction::Quit).unwrap();
    };

    tokio::join!(
        controller::run(&mut h.controller, rx, Duration::from_secs(60)),
        user
    );

    let urls = h.backend.urls();
    assert_eq!(urls.len(), 3);
    assert!(urls[1].contains("/api/webhook/data?from="));
    assert_eq!(h.state().stats.total, 2);
    assert!(!h.controller.form().is_checked("crm"));
}

#[tokio::test(start_paused = true)]
async fn watch_loop_stops_when_input_closes() {
    let mut h = Harness::new(ResponseOrdering::LastResolved, vec![(at_once(), summary(5))]);
    let (tx, rx) = mpsc::unbounded_channel::<UserAction>();

    let user = async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);
    };

    tokio::join!(
        controller::run(&mut h.controller, rx, Duration::from_secs(60)),
        user
    );

    assert_eq!(h.backend.urls().len(), 1);
    assert_eq!(h.state().stats.total, 5);
}
