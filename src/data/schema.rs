use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{CellValue, Column, Dataset};

/// Default number of distinct values below which a string column is offered
/// as a pick-list rather than a free-text column.
pub const DEFAULT_CATEGORICAL_THRESHOLD: usize = 50;

// ---------------------------------------------------------------------------
// Column kinds
// ---------------------------------------------------------------------------

/// Semantic kind of a column, fixed once per dataset by [`SchemaInspector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Temporal,
    Categorical,
    Text,
}

impl ColumnKind {
    /// Categorical and Text columns are both string-valued; filters and chart
    /// roles treat them the same.
    pub fn is_string_valued(self) -> bool {
        matches!(self, ColumnKind::Categorical | ColumnKind::Text)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// A column's name and inferred kind, plus the counts used to infer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub distinct_count: usize,
    pub null_count: usize,
}

/// Look up a descriptor by column name.
pub fn find_descriptor<'a>(
    descriptors: &'a [ColumnDescriptor],
    name: &str,
) -> Option<&'a ColumnDescriptor> {
    descriptors.iter().find(|d| d.name == name)
}

/// A filter clause or role binding that does not fit the dataset's columns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{column}' is {actual}, expected {expected}")]
    KindMismatch {
        column: String,
        expected: &'static str,
        actual: ColumnKind,
    },
    #[error("invalid range on column '{column}': {reason}")]
    InvalidRange { column: String, reason: String },
}

/// Resolve `name` to its descriptor and check its kind with `accepts`.
/// `expected` names the accepted kinds in the error message.
pub fn require_column<'a>(
    descriptors: &'a [ColumnDescriptor],
    name: &str,
    expected: &'static str,
    accepts: impl Fn(ColumnKind) -> bool,
) -> Result<&'a ColumnDescriptor, ConfigurationError> {
    let descriptor = find_descriptor(descriptors, name)
        .ok_or_else(|| ConfigurationError::UnknownColumn(name.to_string()))?;
    if !accepts(descriptor.kind) {
        return Err(ConfigurationError::KindMismatch {
            column: name.to_string(),
            expected,
            actual: descriptor.kind,
        });
    }
    Ok(descriptor)
}

// ---------------------------------------------------------------------------
// Temporal parsing
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y", "%b %d %Y",
];

/// Parse a text cell as a date/time. Non-text cells never parse.
pub fn parse_temporal(value: &CellValue) -> Option<NaiveDateTime> {
    match value {
        CellValue::Text(s) => parse_temporal_str(s),
        _ => None,
    }
}

pub fn parse_temporal_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// SchemaInspector
// ---------------------------------------------------------------------------

/// Infers a [`ColumnKind`] for every column of a dataset.
#[derive(Debug, Clone)]
pub struct SchemaInspector {
    categorical_threshold: usize,
    infer_temporal: bool,
}

impl SchemaInspector {
    pub fn new() -> Self {
        Self {
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            infer_temporal: true,
        }
    }

    /// Set the distinct-value count at which a string column becomes Text.
    pub fn with_categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    /// Turn the date-parsing attempt on non-numeric columns on or off.
    pub fn with_temporal_inference(mut self, enabled: bool) -> Self {
        self.infer_temporal = enabled;
        self
    }

    /// Classify every column, in column order.
    pub fn classify(&self, dataset: &Dataset) -> Vec<ColumnDescriptor> {
        dataset
            .columns()
            .iter()
            .map(|col| self.describe(col))
            .collect()
    }

    fn describe(&self, column: &Column) -> ColumnDescriptor {
        let non_null: Vec<&CellValue> = column.values.iter().filter(|v| !v.is_null()).collect();
        let null_count = column.values.len() - non_null.len();
        let distinct_count = non_null.iter().copied().collect::<HashSet<_>>().len();

        // Temporal parsing is attempted on every non-numeric column. Short
        // strings that happen to match a date format are misread as dates.
        let kind = if non_null.iter().all(|v| v.as_f64().is_some()) {
            ColumnKind::Numeric
        } else if self.infer_temporal && non_null.iter().all(|v| parse_temporal(v).is_some()) {
            ColumnKind::Temporal
        } else if distinct_count < self.categorical_threshold {
            ColumnKind::Categorical
        } else {
            ColumnKind::Text
        };

        log::debug!(
            "column '{}' classified as {kind} ({distinct_count} distinct, {null_count} null)",
            column.name
        );

        ColumnDescriptor {
            name: column.name.clone(),
            kind,
            distinct_count,
            null_count,
        }
    }
}

impl Default for SchemaInspector {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the default inspector settings.
pub fn classify(dataset: &Dataset) -> Vec<ColumnDescriptor> {
    SchemaInspector::default().classify(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|s| CellValue::guess(s)).collect()
    }

    fn kinds(ds: &Dataset, inspector: &SchemaInspector) -> Vec<ColumnKind> {
        inspector.classify(ds).into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn classifies_each_kind() {
        let ds = Dataset::new(vec![
            Column::new("n", text(&["1", "2.5", ""])),
            Column::new("d", text(&["2024-01-02", "2024-02-03 10:00:00", ""])),
            Column::new("c", text(&["a", "b", "a"])),
            Column::new("t", text(&["x", "y", "z"])),
        ])
        .unwrap();
        let inspector = SchemaInspector::new().with_categorical_threshold(3);
        assert_eq!(
            kinds(&ds, &inspector),
            vec![
                ColumnKind::Numeric,
                ColumnKind::Temporal,
                ColumnKind::Categorical,
                ColumnKind::Text
            ]
        );
    }

    #[test]
    fn numeric_strings_count_as_numbers() {
        let ds = Dataset::new(vec![Column::new(
            "n",
            vec![CellValue::Text(" 3 ".into()), CellValue::Integer(4)],
        )])
        .unwrap();
        assert_eq!(classify(&ds)[0].kind, ColumnKind::Numeric);
    }

    #[test]
    fn one_bad_date_makes_the_column_categorical() {
        let ds = Dataset::new(vec![Column::new("d", text(&["2024-01-02", "soon"]))]).unwrap();
        assert_eq!(classify(&ds)[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn temporal_inference_can_be_disabled() {
        let ds = Dataset::new(vec![Column::new("d", text(&["2024-01-02", "2024-01-03"]))]).unwrap();
        let inspector = SchemaInspector::new().with_temporal_inference(false);
        assert_eq!(kinds(&ds, &inspector), vec![ColumnKind::Categorical]);
    }

    #[test]
    fn counts_nulls_and_distinct_values() {
        let ds = Dataset::new(vec![Column::new("c", text(&["a", "", "a", "b"]))]).unwrap();
        let d = &classify(&ds)[0];
        assert_eq!((d.distinct_count, d.null_count), (2, 1));
    }

    #[test]
    fn parses_common_date_layouts() {
        for s in [
            "2024-03-01",
            "2024/03/01",
            "01/03/2024",
            "2024-03-01T08:30:00",
            "2024-03-01T08:30:00Z",
            "01-Mar-2024",
        ] {
            assert!(parse_temporal_str(s).is_some(), "{s}");
        }
        assert!(parse_temporal_str("next week").is_none());
    }
}
