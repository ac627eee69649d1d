//! Terminal render adapters.
//!
//! Every adapter writes into one shared [`Screen`], which keeps the
//! latest value of every widget and redraws the whole frame after each
//! update. A redraw always replaces the previous frame, so whichever render
//! call lands last is what the user sees.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Local;
use colored::{ColoredString, Colorize};
use serde::Serialize;

use super::{Presentation, RenderAdapter, Slice, StatusBanner, doughnut_slices, payload_sample};
use crate::aggregate::{self, DEFAULT_WINDOW_DAYS};
use crate::filter::FilterForm;
use crate::model::{ChartSeries, StatsView, WebhookRecord};
use crate::palette::{Palette, hex_to_rgb};

/// Width of the longest bar in the chart panels.
const BAR_WIDTH: usize = 30;

/// ANSI: clear screen and move the cursor home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub type SharedScreen = Rc<RefCell<Screen>>;

// ---------------------------------------------------------------------------
// Screen model
// ---------------------------------------------------------------------------

/// The latest value shown by each widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenState {
    pub stats: StatsView,
    pub series: ChartSeries,
    pub slices: Vec<Slice>,
    pub recent: Vec<WebhookRecord>,
    /// The filter form, once the controller has shown it.
    pub filter: Option<FilterForm>,
    pub loading: bool,
    pub error: Option<String>,
    pub info: Option<String>,
}

/// Layout and redraw behavior.
#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Heading printed at the top of every frame.
    pub title: String,
    /// Emit a clear-screen sequence before each frame.
    pub clear: bool,
    /// Redraw after every widget update (watch mode). One-shot commands
    /// turn this off and call [`Screen::draw`] once at the end.
    pub auto_redraw: bool,
    /// Sources that always get a counter, even at zero.
    pub known_sources: Vec<String>,
    /// Days shown by the empty line chart.
    pub window_days: usize,
    /// Help line printed under the frame.
    pub footer: Option<String>,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            title: "hookdash".to_string(),
            clear: false,
            auto_redraw: false,
            known_sources: Vec::new(),
            window_days: DEFAULT_WINDOW_DAYS,
            footer: None,
        }
    }
}

/// A full-frame terminal dashboard.
pub struct Screen {
    state: ScreenState,
    out: Box<dyn Write>,
    palette: Palette,
    options: ScreenOptions,
}

impl Screen {
    pub fn new(out: Box<dyn Write>, palette: Palette, options: ScreenOptions) -> Self {
        Self {
            state: ScreenState::default(),
            out,
            palette,
            options,
        }
    }

    pub fn shared(self) -> SharedScreen {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Write the current frame.
    pub fn draw(&mut self) -> io::Result<()> {
        let frame = self.frame();
        if self.options.clear {
            write!(self.out, "{CLEAR_SCREEN}")?;
        }
        write!(self.out, "{frame}")?;
        self.out.flush()
    }

    fn changed(&mut self) {
        if self.options.auto_redraw
            && let Err(e) = self.draw()
        {
            tracing::debug!(error = %e, "terminal redraw failed");
        }
    }

    /// Render the current state as text.
    pub fn frame(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{}  {}",
            self.options.title.bold().cyan(),
            format!("updated {}", Local::now().format("%H:%M:%S")).dimmed()
        ));
        lines.push("=".repeat(60));

        if self.state.loading {
            lines.push(format!("{}", "⟳ Loading...".yellow()));
        }
        if let Some(error) = &self.state.error {
            lines.push(format!("{} {}", "✗".red().bold(), error.red()));
        }
        if let Some(info) = &self.state.info {
            lines.push(format!("{} {}", "ℹ".blue().bold(), info.blue()));
        }
        lines.push(String::new());

        if self.filter_lines(&mut lines) {
            lines.push(String::new());
        }
        self.stats_lines(&mut lines);
        lines.push(String::new());
        self.line_chart_lines(&mut lines);
        lines.push(String::new());
        self.doughnut_lines(&mut lines);
        lines.push(String::new());
        self.table_lines(&mut lines);

        if let Some(footer) = &self.options.footer {
            lines.push(String::new());
            lines.push(format!("{}", footer.dimmed()));
        }

        let mut frame = lines.join("\n");
        frame.push('\n');
        frame
    }

    /// Returns whether anything was drawn.
    fn filter_lines(&self, lines: &mut Vec<String>) -> bool {
        let Some(form) = &self.state.filter else {
            return false;
        };
        lines.push(format!("{}  Range: {}", "Filters".bold().cyan(), form.date_range));

        if form.custom_visible {
            let input = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
            lines.push(format!(
                "  From: {}  To: {}",
                input(&form.date_from),
                input(&form.date_to)
            ));
        }

        let boxes: Vec<String> = form
            .sources()
            .map(|source| {
                let mark = if form.is_checked(source) { "[x]" } else { "[ ]" };
                format!("{mark} {}", self.paint(source, self.palette.color_for(source)))
            })
            .collect();
        if !boxes.is_empty() {
            lines.push(format!("  {}", boxes.join("  ")));
        }
        true
    }

    fn stats_lines(&self, lines: &mut Vec<String>) {
        let stats = &self.state.stats;
        lines.push(format!("  {} {}", "Total webhooks:".bold(), format_number(stats.total)));

        let mut sources: Vec<&str> = self.options.known_sources.iter().map(String::as_str).collect();
        for source in stats.source_counts.keys() {
            if !sources.contains(&source.as_str()) {
                sources.push(source);
            }
        }

        let counters: Vec<String> = sources
            .iter()
            .map(|source| {
                let count = stats.source_counts.get(*source).copied().unwrap_or(0);
                format!("{}: {}", self.paint(source, self.palette.color_for(source)), count)
            })
            .collect();
        if !counters.is_empty() {
            lines.push(format!("  {}", counters.join("   ")));
        }
    }

    fn line_chart_lines(&self, lines: &mut Vec<String>) {
        let series = &self.state.series;
        lines.push(format!("{}", "Webhooks Over Time".bold().cyan()));

        if series.labels.is_empty() {
            lines.push(format!("  {}", "No chart data".dimmed()));
            return;
        }

        let mut header = format!("  {:<12}", "Date");
        for dataset in &series.datasets {
            header.push_str(&format!(
                " {}",
                self.paint(&format!("{:>8}", truncate(&dataset.label, 8)), &dataset.color)
            ));
        }
        header.push_str(&format!(" {:>7}", "Total"));
        lines.push(header);

        let max = (0..series.labels.len())
            .map(|i| series.column_total(i))
            .max()
            .unwrap_or(0);

        for (i, label) in series.labels.iter().enumerate() {
            let mut row = format!("  {label:<12}");
            for dataset in &series.datasets {
                let value = dataset.data.get(i).copied().unwrap_or(0);
                row.push_str(&format!(" {value:>8}"));
            }
            let total = series.column_total(i);
            row.push_str(&format!(" {total:>7}  {}", bar(total, max)));
            lines.push(row);
        }
    }

    fn doughnut_lines(&self, lines: &mut Vec<String>) {
        lines.push(format!("{}", "Source Distribution".bold().cyan()));

        let slices = &self.state.slices;
        let total: u64 = slices.iter().map(|s| s.value).sum();
        let max = slices.iter().map(|s| s.value).max().unwrap_or(0);

        for slice in slices {
            let pct = if total == 0 {
                0.0
            } else {
                slice.value as f64 / total as f64 * 100.0
            };
            lines.push(format!(
                "  {} {} {:>5.1}%",
                self.paint(&format!("{:<10}", truncate(&slice.label, 10)), &slice.color),
                self.paint(&format!("{:<width$}", bar(slice.value, max), width = BAR_WIDTH), &slice.color),
                pct
            ));
        }
    }

    fn table_lines(&self, lines: &mut Vec<String>) {
        lines.push(format!("{}", "Recent Webhooks".bold().cyan()));

        if self.state.recent.is_empty() {
            lines.push(format!("  {}", "No webhook data yet".dimmed()));
            return;
        }

        lines.push(format!("  {:<10} {:<10} {}", "Time", "Source", "Data"));
        lines.push(format!("  {}", "-".repeat(58)));
        for record in &self.state.recent {
            let time = record
                .timestamp
                .as_deref()
                .and_then(|ts| aggregate::parse_wall_clock(ts, &Local))
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let source = record.source_or_other();
            let sample = payload_sample(record).unwrap_or_else(|| "No data".to_string());

            lines.push(format!(
                "  {:<10} {} {}",
                time,
                self.paint(&format!("{source:<10}"), self.palette.color_for(source)),
                sample
            ));
        }
    }

    fn paint(&self, text: &str, hex: &str) -> ColoredString {
        match hex_to_rgb(hex) {
            Some((r, g, b)) => text.truecolor(r, g, b),
            None => text.normal(),
        }
    }
}

fn bar(value: u64, max: u64) -> String {
    if max == 0 || value == 0 {
        return String::new();
    }
    let width = ((value as f64 / max as f64) * BAR_WIDTH as f64).ceil() as usize;
    "█".repeat(width.clamp(1, BAR_WIDTH))
}

/// Format a number with comma separators for readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

struct LineChartPanel(SharedScreen);

impl RenderAdapter<ChartSeries> for LineChartPanel {
    fn init(&mut self) {
        let mut screen = self.0.borrow_mut();
        let today = Local::now().date_naive();
        screen.state.series = ChartSeries {
            labels: aggregate::window_labels(today, screen.options.window_days),
            datasets: Vec::new(),
        };
        screen.changed();
    }

    fn render(&mut self, series: &ChartSeries) {
        let mut screen = self.0.borrow_mut();
        screen.state.series = series.clone();
        screen.changed();
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().state.series = ChartSeries::empty();
    }
}

struct DoughnutPanel(SharedScreen);

impl RenderAdapter<ChartSeries> for DoughnutPanel {
    fn init(&mut self) {
        self.render(&ChartSeries::empty());
    }

    fn render(&mut self, series: &ChartSeries) {
        let mut screen = self.0.borrow_mut();
        screen.state.slices = doughnut_slices(series);
        screen.changed();
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().state.slices.clear();
    }
}

struct StatsPanel(SharedScreen);

impl RenderAdapter<StatsView> for StatsPanel {
    fn render(&mut self, stats: &StatsView) {
        let mut screen = self.0.borrow_mut();
        screen.state.stats = stats.clone();
        screen.changed();
    }
}

struct RecentTablePanel(SharedScreen);

impl RenderAdapter<[WebhookRecord]> for RecentTablePanel {
    fn render(&mut self, records: &[WebhookRecord]) {
        let mut screen = self.0.borrow_mut();
        screen.state.recent = records.to_vec();
        screen.changed();
    }
}

struct FilterPanel(SharedScreen);

impl RenderAdapter<FilterForm> for FilterPanel {
    fn render(&mut self, form: &FilterForm) {
        let mut screen = self.0.borrow_mut();
        screen.state.filter = Some(form.clone());
        screen.changed();
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().state.filter = None;
    }
}

struct BannerPanel(SharedScreen);

impl BannerPanel {
    fn update(&mut self, f: impl FnOnce(&mut ScreenState)) {
        let mut screen = self.0.borrow_mut();
        f(&mut screen.state);
        screen.changed();
    }
}

impl StatusBanner for BannerPanel {
    fn show_loading(&mut self) {
        self.update(|s| s.loading = true);
    }

    fn hide_loading(&mut self) {
        self.update(|s| s.loading = false);
    }

    fn show_error(&mut self, message: &str) {
        self.update(|s| {
            s.error = Some(message.to_string());
            s.info = None;
        });
    }

    fn show_info(&mut self, message: &str) {
        self.update(|s| s.info = Some(message.to_string()));
    }

    fn clear_messages(&mut self) {
        self.update(|s| {
            s.error = None;
            s.info = None;
        });
    }
}

/// Build a [`Presentation`] whose adapters all draw into `screen`.
pub fn terminal_presentation(screen: &SharedScreen) -> Presentation {
    Presentation::new(
        Box::new(LineChartPanel(screen.clone())),
        Box::new(DoughnutPanel(screen.clone())),
        Box::new(StatsPanel(screen.clone())),
        Box::new(RecentTablePanel(screen.clone())),
        Box::new(FilterPanel(screen.clone())),
        Box::new(BannerPanel(screen.clone())),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
