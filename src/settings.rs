use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chart::DEFAULT_BINS;
use crate::data::schema::{SchemaInspector, DEFAULT_CATEGORICAL_THRESHOLD};

/// Environment variable naming an optional JSON settings file.
pub const SETTINGS_ENV: &str = "RUSTY_LENS_SETTINGS";

/// Application-wide tunables. Every field has a default, so a settings file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Distinct-value count at which a string column is treated as free text.
    pub categorical_threshold: usize,
    /// Try to parse every non-numeric column as dates.
    pub infer_temporal: bool,
    /// How many categorical columns get a membership filter by default.
    pub membership_filters: usize,
    /// How many numeric columns get a range filter by default.
    pub range_filters: usize,
    pub default_bins: usize,
    /// Rows shown in the data preview table.
    pub preview_rows: usize,
    pub default_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            infer_temporal: true,
            membership_filters: 3,
            range_filters: 5,
            default_bins: DEFAULT_BINS,
            preview_rows: 1000,
            default_title: "Interactive Data Chart".to_string(),
        }
    }
}

impl Settings {
    /// Settings from `$RUSTY_LENS_SETTINGS` if set and readable, defaults otherwise.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os(SETTINGS_ENV) else {
            return Self::default();
        };
        match Self::from_file(Path::new(&path)) {
            Ok(settings) => {
                log::info!("loaded settings from {}", Path::new(&path).display());
                settings
            }
            Err(e) => {
                log::warn!("ignoring settings file: {e:#}");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Schema inspector configured from these settings.
    pub fn inspector(&self) -> SchemaInspector {
        SchemaInspector::new()
            .with_categorical_threshold(self.categorical_threshold)
            .with_temporal_inference(self.infer_temporal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "range_filters": 2, "infer_temporal": false }"#).unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.range_filters, 2);
        assert!(!s.infer_temporal);
        assert_eq!(s.membership_filters, 3);
        assert_eq!(s.default_bins, DEFAULT_BINS);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
