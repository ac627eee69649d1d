/// Configuration system for hookdash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::HookdashConfig::default()`]
/// 2. **User global config**: `~/.hookdash/config.toml`
/// 3. **Project local config**: `.hookdash.toml` in the current working directory
/// 4. **Environment variables**: `HOOKDASH_*` overrides (highest precedence)
///
/// Layers are merged key by key: a file that only sets `refresh.ordering`
/// leaves every other value from the previous layer intact.
///
/// # Usage
///
/// ```rust,ignore
/// let cfg = hookdash::config::load();
/// let client = hookdash::api::ApiClient::from_config(&cfg.api);
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{HookdashConfig, ResponseOrdering};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges defaults → global TOML → project TOML → env vars. Unreadable or
/// malformed files are skipped so a typo never stops the dashboard.
pub fn load() -> HookdashConfig {
    let paths = [global_config_path(), project_config_path()];
    let mut config = load_layers(paths.iter().flatten().map(PathBuf::as_path));
    apply_env_overrides(&mut config);
    config
}

/// Merge the given TOML files over the defaults, in order.
pub fn load_layers<'a>(paths: impl IntoIterator<Item = &'a Path>) -> HookdashConfig {
    let Ok(mut merged) = toml::Value::try_from(HookdashConfig::default()) else {
        return HookdashConfig::default();
    };

    for path in paths {
        if let Some(layer) = load_toml_value(path) {
            merge_values(&mut merged, layer);
        }
    }

    merged.try_into().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "merged config is invalid; using defaults");
        HookdashConfig::default()
    })
}

/// Read a TOML file as a raw value tree. Missing or malformed files yield
/// `None`.
fn load_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key; any
/// other value replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.hookdash/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}

/// Path to the project local config: `.hookdash.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".hookdash.toml"))
}

/// The `~/.hookdash/` directory holding the global config and cycle log.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hookdash"))
}

pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `HOOKDASH_API_URL`: backend base URL
/// - `HOOKDASH_REFRESH_SECS`: automatic refresh interval
/// - `HOOKDASH_FILTER_TIMEOUT_SECS`: filter request deadline
/// - `HOOKDASH_ORDERING`: `last-resolved` or `latest-issued`
/// - `HOOKDASH_COLOR`: `0`/`false` disables ANSI colors
fn apply_env_overrides(config: &mut HookdashConfig) {
    if let Ok(val) = std::env::var("HOOKDASH_API_URL")
        && !val.is_empty()
    {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("HOOKDASH_REFRESH_SECS")
        && let Ok(secs) = val.parse::<u64>()
        && secs > 0
    {
        config.refresh.interval_secs = secs;
    }
    if let Ok(val) = std::env::var("HOOKDASH_FILTER_TIMEOUT_SECS")
        && let Ok(secs) = val.parse::<u64>()
        && secs > 0
    {
        config.refresh.filter_timeout_secs = secs;
    }
    if let Ok(val) = std::env::var("HOOKDASH_ORDERING")
        && let Some(ordering) = parse_ordering(&val)
    {
        config.refresh.ordering = ordering;
    }
    if let Ok(val) = std::env::var("HOOKDASH_COLOR") {
        config.display.color = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a response-ordering name.
fn parse_ordering(val: &str) -> Option<ResponseOrdering> {
    match val.to_ascii_lowercase().as_str() {
        "last-resolved" | "last_resolved" | "last" => Some(ResponseOrdering::LastResolved),
        "latest-issued" | "latest_issued" | "latest" => Some(ResponseOrdering::LatestIssued),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.hookdash/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    write_config_file(&path, HookdashConfig::default_toml())?;
    Ok(path)
}

/// Set a single dotted key (e.g. `refresh.interval_secs`) in the global
/// config file, creating the file from defaults if needed.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(HookdashConfig::default())
            .context("failed to serialize default config")?
    };

    set_toml_value(&mut root, key, value)?;

    // Refuse to write something that would no longer load.
    let _: HookdashConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("'{value}' is not a valid value for '{key}'"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    write_config_file(&path, &output)
}

fn write_config_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.hookdash/ directory")?;
    }
    fs::write(path, content).context("failed to write config file")
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// The new value takes the type of the existing one. Keys under
/// `palette.colors` may be new, so users can add sources.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{}'", sections.join(".")))?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Array(_)) => toml::Value::Array(
            raw_value
                .split(',')
                .map(|s| toml::Value::String(s.trim().to_string()))
                .collect(),
        ),
        Some(toml::Value::Table(_)) => {
            anyhow::bail!("'{key}' is a section, not a value");
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None if sections == ["palette", "colors"] => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
