use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::model::{CellValue, Dataset};
use super::schema::{parse_temporal, require_column, ColumnDescriptor, ColumnKind, ConfigurationError};

// ---------------------------------------------------------------------------
// Filter clauses
// ---------------------------------------------------------------------------

/// One typed predicate over a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// Case-insensitive substring search. An empty query keeps every row.
    TextContains { column: String, query: String },
    /// Keep rows whose value is in `allowed`. An empty set keeps every row.
    CategoricalMembership {
        column: String,
        allowed: BTreeSet<CellValue>,
    },
    /// Inclusive numeric bounds.
    NumericRange { column: String, min: f64, max: f64 },
    /// Inclusive date/time bounds.
    DateRange {
        column: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl FilterClause {
    pub fn text_contains(column: impl Into<String>, query: impl Into<String>) -> Self {
        FilterClause::TextContains {
            column: column.into(),
            query: query.into(),
        }
    }

    pub fn membership(
        column: impl Into<String>,
        allowed: impl IntoIterator<Item = CellValue>,
    ) -> Self {
        FilterClause::CategoricalMembership {
            column: column.into(),
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn numeric_range(column: impl Into<String>, min: f64, max: f64) -> Self {
        FilterClause::NumericRange {
            column: column.into(),
            min,
            max,
        }
    }

    pub fn date_range(column: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        FilterClause::DateRange {
            column: column.into(),
            start,
            end,
        }
    }

    /// Date range covering whole days: `start` from midnight through the last
    /// instant of `end`.
    pub fn date_range_days(column: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        let end = end
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap_or_else(|| end.and_time(NaiveTime::default()));
        Self::date_range(column, start.and_time(NaiveTime::default()), end)
    }

    pub fn column(&self) -> &str {
        match self {
            FilterClause::TextContains { column, .. }
            | FilterClause::CategoricalMembership { column, .. }
            | FilterClause::NumericRange { column, .. }
            | FilterClause::DateRange { column, .. } => column,
        }
    }

    /// Check the clause against the dataset's descriptors.
    pub fn validate(&self, descriptors: &[ColumnDescriptor]) -> Result<(), ConfigurationError> {
        match self {
            FilterClause::TextContains { column, .. }
            | FilterClause::CategoricalMembership { column, .. } => {
                require_column(descriptors, column, "categorical or text", ColumnKind::is_string_valued)?;
            }
            FilterClause::NumericRange { column, min, max } => {
                require_column(descriptors, column, "numeric", |k| k == ColumnKind::Numeric)?;
                if min.is_nan() || max.is_nan() {
                    return Err(ConfigurationError::InvalidRange {
                        column: column.clone(),
                        reason: "bound is NaN".into(),
                    });
                }
                if min > max {
                    return Err(ConfigurationError::InvalidRange {
                        column: column.clone(),
                        reason: format!("min {min} is greater than max {max}"),
                    });
                }
            }
            FilterClause::DateRange { column, start, end } => {
                require_column(descriptors, column, "temporal", |k| k == ColumnKind::Temporal)?;
                if start > end {
                    return Err(ConfigurationError::InvalidRange {
                        column: column.clone(),
                        reason: format!("start {start} is after end {end}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether the cell passes this clause.
    fn matches(&self, cell: &CellValue, lowered_query: Option<&str>) -> bool {
        match self {
            FilterClause::TextContains { .. } => match lowered_query {
                None => true,
                Some(_) if cell.is_null() => false,
                Some(q) => cell.to_string().to_lowercase().contains(q),
            },
            FilterClause::CategoricalMembership { allowed, .. } => {
                allowed.is_empty() || allowed.contains(cell)
            }
            FilterClause::NumericRange { min, max, .. } => cell
                .as_f64()
                .is_some_and(|v| *min <= v && v <= *max),
            FilterClause::DateRange { start, end, .. } => {
                parse_temporal(cell).is_some_and(|t| *start <= t && t <= *end)
            }
        }
    }

    /// Narrow `rows` to those that pass. Missing columns keep nothing.
    fn retain(&self, dataset: &Dataset, rows: &mut Vec<usize>) {
        let lowered_query = match self {
            FilterClause::TextContains { query, .. } if !query.is_empty() => {
                Some(query.to_lowercase())
            }
            _ => None,
        };
        match dataset.column(self.column()) {
            Some(col) => rows.retain(|&r| self.matches(&col.values[r], lowered_query.as_deref())),
            None => rows.clear(),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterPipeline
// ---------------------------------------------------------------------------

/// An ordered, AND-combined list of validated clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPipeline {
    clauses: Vec<FilterClause>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a clause. Rejected clauses never enter the pipeline.
    pub fn push(
        &mut self,
        clause: FilterClause,
        descriptors: &[ColumnDescriptor],
    ) -> Result<(), ConfigurationError> {
        clause.validate(descriptors)?;
        self.clauses.push(clause);
        Ok(())
    }

    /// Build a pipeline from every valid clause. Each rejected clause is
    /// reported with its position in `clauses`; the others still apply.
    pub fn from_clauses<'a>(
        clauses: impl IntoIterator<Item = &'a FilterClause>,
        descriptors: &[ColumnDescriptor],
    ) -> (Self, Vec<(usize, ConfigurationError)>) {
        let mut pipeline = Self::new();
        let mut errors = Vec::new();
        for (i, clause) in clauses.into_iter().enumerate() {
            if let Err(e) = pipeline.push(clause.clone(), descriptors) {
                log::warn!("filter #{i} on '{}' rejected: {e}", clause.column());
                errors.push((i, e));
            }
        }
        (pipeline, errors)
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Indices of rows passing every clause, in original order.
    pub fn filtered_indices(&self, dataset: &Dataset) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..dataset.len()).collect();
        for clause in &self.clauses {
            if rows.is_empty() {
                break;
            }
            clause.retain(dataset, &mut rows);
        }
        rows
    }

    /// The dataset narrowed to rows passing every clause.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        if self.clauses.is_empty() {
            return dataset.clone();
        }
        dataset.take(&self.filtered_indices(dataset))
    }
}

/// Apply a pipeline to a dataset.
pub fn apply(dataset: &Dataset, pipeline: &FilterPipeline) -> Dataset {
    pipeline.apply(dataset)
}

// ---------------------------------------------------------------------------
// Default bounds (always over the original dataset)
// ---------------------------------------------------------------------------

/// Min and max of a column's numeric values, ignoring nulls.
pub fn numeric_bounds(dataset: &Dataset, column: &str) -> Option<(f64, f64)> {
    dataset
        .column(column)?
        .values
        .iter()
        .filter_map(CellValue::as_f64)
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
        })
}

/// Earliest and latest parsed date/time of a column.
pub fn temporal_bounds(dataset: &Dataset, column: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let parsed = dataset.column(column)?.values.iter().filter_map(parse_temporal);
    parsed.fold(None, |acc, t| match acc {
        None => Some((t, t)),
        Some((lo, hi)) => Some((t.min(lo), t.max(hi))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;
    use crate::data::schema::classify;
    use pretty_assertions::assert_eq;

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|s| CellValue::guess(s)).collect()
    }

    fn people() -> Dataset {
        Dataset::new(vec![
            Column::new("name", cells(&["ali", "bob", "alice", ""])),
            Column::new("age", cells(&["20", "35", "22", "41"])),
            Column::new("joined", cells(&["2023-01-05", "2023-06-01", "2024-02-10", "2024-03-01"])),
        ])
        .unwrap()
    }

    fn pipeline(ds: &Dataset, clauses: &[FilterClause]) -> FilterPipeline {
        let (p, errors) = FilterPipeline::from_clauses(clauses, &classify(ds));
        assert!(errors.is_empty(), "{errors:?}");
        p
    }

    fn names(ds: &Dataset) -> Vec<String> {
        ds.column("name").unwrap().values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn range_then_text_search() {
        let ds = people();
        let p = pipeline(
            &ds,
            &[
                FilterClause::numeric_range("age", 20.0, 25.0),
                FilterClause::text_contains("name", "ALI"),
            ],
        );
        let out = p.apply(&ds);
        assert_eq!(names(&out), vec!["ali", "alice"]);
        assert_eq!(
            out.column("age").unwrap().values,
            vec![CellValue::Integer(20), CellValue::Integer(22)]
        );
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let ds = people();
        assert_eq!(apply(&ds, &FilterPipeline::new()), ds);
    }

    #[test]
    fn text_search_skips_nulls_and_empty_query_keeps_all() {
        let ds = people();
        let p = pipeline(&ds, &[FilterClause::text_contains("name", "")]);
        assert_eq!(p.apply(&ds).len(), 4);
        let p = pipeline(&ds, &[FilterClause::text_contains("name", "b")]);
        assert_eq!(names(&p.apply(&ds)), vec!["bob"]);
    }

    #[test]
    fn empty_membership_set_is_no_filter() {
        let ds = people();
        let p = pipeline(&ds, &[FilterClause::membership("name", Vec::new())]);
        assert_eq!(p.apply(&ds).len(), 4);
        let p = pipeline(
            &ds,
            &[FilterClause::membership("name", [CellValue::Text("bob".into())])],
        );
        assert_eq!(names(&p.apply(&ds)), vec!["bob"]);
    }

    #[test]
    fn date_range_is_inclusive_on_whole_days() {
        let ds = people();
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let p = pipeline(
            &ds,
            &[FilterClause::date_range_days("joined", day(2023, 6, 1), day(2024, 2, 10))],
        );
        assert_eq!(names(&p.apply(&ds)), vec!["bob", "alice"]);
    }

    #[test]
    fn rejects_unknown_columns_and_wrong_kinds() {
        let ds = people();
        let descriptors = classify(&ds);
        let mut p = FilterPipeline::new();
        assert_eq!(
            p.push(FilterClause::text_contains("nope", "x"), &descriptors),
            Err(ConfigurationError::UnknownColumn("nope".into()))
        );
        assert!(matches!(
            p.push(FilterClause::numeric_range("name", 0.0, 1.0), &descriptors),
            Err(ConfigurationError::KindMismatch { .. })
        ));
        assert!(matches!(
            p.push(FilterClause::numeric_range("age", 5.0, 1.0), &descriptors),
            Err(ConfigurationError::InvalidRange { .. })
        ));
        assert!(p.is_empty());
    }

    #[test]
    fn bad_clause_does_not_block_the_others() {
        let ds = people();
        let clauses = vec![
            FilterClause::text_contains("age", "2"),
            FilterClause::numeric_range("age", 30.0, 50.0),
        ];
        let (p, errors) = FilterPipeline::from_clauses(&clauses, &classify(&ds));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 0);
        assert_eq!(names(&p.apply(&ds)), vec!["bob", ""]);
    }

    #[test]
    fn bounds_come_from_the_given_dataset() {
        let ds = people();
        assert_eq!(numeric_bounds(&ds, "age"), Some((20.0, 41.0)));
        let (lo, hi) = temporal_bounds(&ds, "joined").unwrap();
        assert_eq!(lo.date(), NaiveDate::from_ymd_opt(2023, 1, 5).unwrap());
        assert_eq!(hi.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(numeric_bounds(&ds, "missing"), None);
    }
}
