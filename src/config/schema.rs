/// Configuration schema and defaults for hookdash.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[api]`, `[refresh]`, `[palette]`, `[display]` and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

use crate::palette::Palette;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level hookdash configuration.
///
/// Maps directly to `~/.hookdash/config.toml` and `.hookdash.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookdashConfig {
    pub api: ApiConfig,
    pub refresh: RefreshConfig,
    pub palette: Palette,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [api]
// ---------------------------------------------------------------------------

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    pub summary_path: String,
    pub records_path: String,
    /// Append `?_=<millis>` to summary requests so proxies never serve a
    /// stale copy.
    pub cache_bust: bool,
    /// Transport-level timeout for any single request (milliseconds).
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            summary_path: "/api/dashboard/summary".to_string(),
            records_path: "/api/webhook/data".to_string(),
            cache_bust: true,
            request_timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [refresh]
// ---------------------------------------------------------------------------

/// How overlapping responses are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseOrdering {
    /// Whichever response resolves last is rendered (default).
    #[default]
    LastResolved,
    /// Responses older than the newest rendered request are discarded.
    LatestIssued,
}

impl std::fmt::Display for ResponseOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastResolved => write!(f, "last-resolved"),
            Self::LatestIssued => write!(f, "latest-issued"),
        }
    }
}

/// Refresh cadence and client-side aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between automatic summary refreshes.
    pub interval_secs: u64,
    /// Client-side deadline for filter requests (seconds).
    pub filter_timeout_secs: u64,
    /// Rows shown in the recent-activity table for filtered views.
    pub recent_limit: usize,
    /// Trailing days in the filtered time-series chart.
    pub window_days: usize,
    pub ordering: ResponseOrdering,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            filter_timeout_secs: 15,
            recent_limit: 5,
            window_days: 7,
            ordering: ResponseOrdering::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

/// Terminal presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Emit ANSI colors.
    pub color: bool,
    /// Clear the terminal before each redraw in `watch` mode.
    pub clear_screen: bool,
    /// Sources that always get a counter and a filter checkbox.
    pub sources: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            clear_screen: true,
            sources: ["crm", "form", "email", "other"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Diagnostics and the cycle log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append one JSON line per refresh cycle to `~/.hookdash/cycles.jsonl`.
    pub cycle_log: bool,
    /// Default `tracing` filter when `HOOKDASH_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            cycle_log: true,
            level: "warn".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl HookdashConfig {
    /// The annotated config written by `hookdash config init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}

const DEFAULT_CONFIG_TOML: &str = r##"# hookdash configuration
#
# Precedence (highest last): built-in defaults, ~/.hookdash/config.toml,
# ./.hookdash.toml, HOOKDASH_* environment variables.

[api]
# Backend base URL
base_url = "http://127.0.0.1:5000"
summary_path = "/api/dashboard/summary"
records_path = "/api/webhook/data"
# Append ?_=<millis> to summary requests
cache_bust = true
# Per-request transport timeout (ms)
request_timeout_ms = 30000

[refresh]
# Seconds between automatic refreshes
interval_secs = 60
# Filter request deadline (s); late responses are discarded
filter_timeout_secs = 15
# Rows in the recent-activity table for filtered views
recent_limit = 5
# Trailing days in the filtered time-series chart
window_days = 7
# "last-resolved" renders whichever response arrives last;
# "latest-issued" drops responses older than the newest one rendered
ordering = "last-resolved"

[palette]
# Fallback for sources not listed below
fallback = "#9C27B0"

[palette.colors]
crm = "#4CAF50"
form = "#2196F3"
email = "#F44336"
other = "#9C27B0"

[display]
color = true
clear_screen = true
sources = ["crm", "form", "email", "other"]

[logging]
# Append one JSON line per refresh cycle to ~/.hookdash/cycles.jsonl
cycle_log = true
# tracing filter used when HOOKDASH_LOG is unset
level = "warn"
"##;
