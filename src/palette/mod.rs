//! Shared source → color table.
//!
//! Both the chart datasets and the table badges take their colors from here,
//! and the table is loaded as the `[palette]` section of the config file so
//! users can add their own sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Color used for sources that have no entry in the table (the `other` color).
pub const FALLBACK_COLOR: &str = "#9C27B0";

/// Color used by the doughnut chart's "No Data" placeholder slice.
pub const PLACEHOLDER_COLOR: &str = "#e0e0e0";

/// Source-to-color lookup keyed by lowercase source name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub fallback: String,
    pub colors: BTreeMap<String, String>,
}

impl Default for Palette {
    fn default() -> Self {
        let colors = [
            ("crm", "#4CAF50"),
            ("form", "#2196F3"),
            ("email", "#F44336"),
            ("other", "#9C27B0"),
        ]
        .into_iter()
        .map(|(source, color)| (source.to_string(), color.to_string()))
        .collect();

        Self {
            fallback: FALLBACK_COLOR.to_string(),
            colors,
        }
    }
}

impl Palette {
    /// Hex color for a source. Lookup is case-insensitive.
    pub fn color_for(&self, source: &str) -> &str {
        self.colors
            .get(&source.to_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }
}

/// Parse `#RRGGBB` (or `RRGGBB`) into an RGB triple.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sources_resolve() {
        let palette = Palette::default();
        assert_eq!(palette.color_for("crm"), "#4CAF50");
        assert_eq!(palette.color_for("CRM"), "#4CAF50");
        assert_eq!(palette.color_for("other"), "#9C27B0");
    }

    #[test]
    fn unknown_source_uses_fallback() {
        let palette = Palette::default();
        assert_eq!(palette.color_for("stripe"), FALLBACK_COLOR);
        assert_eq!(palette.color_for("stripe"), palette.color_for("other"));
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(hex_to_rgb("#4CAF50"), Some((0x4c, 0xaf, 0x50)));
        assert_eq!(hex_to_rgb("ffffff"), Some((255, 255, 255)));
        assert_eq!(hex_to_rgb("#fff"), None);
        assert_eq!(hex_to_rgb("#zzzzzz"), None);
    }
}
