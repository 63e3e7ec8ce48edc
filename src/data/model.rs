use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as produced by the loaders.
/// Using `BTreeMap` / `BTreeSet` downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

/// The stringified form of a cell. This is what CSV export writes, so it has
/// to parse back into the same value: nulls are empty and floats keep their
/// fractional part (`2.0`, not `2`).
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:?}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Interpret the value as an `f64`. Text cells count when they parse as a
    /// number, which is the same rule the schema inspector uses.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Guess the type of a raw text field (CSV / spreadsheet string cells).
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Column / Dataset
// ---------------------------------------------------------------------------

/// Raised when columns handed to [`Dataset::new`] do not form a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("column '{column}' has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Sorted set of distinct non-null values.
    pub fn unique_values(&self) -> BTreeSet<CellValue> {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .collect()
    }
}

/// An immutable table: ordered, uniquely named, equal-length columns.
///
/// Derivations (`take`, `select`) build new datasets and leave `self` intact,
/// so a loaded dataset can be shared by reference across recomputations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, DataError> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DataError::DuplicateColumn(col.name.clone()));
            }
            if col.values.len() != row_count {
                return Err(DataError::RaggedColumn {
                    column: col.name.clone(),
                    expected: row_count,
                    actual: col.values.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_count
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.columns.get(column)?.values.get(row)
    }

    /// One row as a vector of cell references, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<&CellValue>> {
        if row >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[row]).collect())
    }

    /// Keep only the given rows, in the order given. Out-of-range indices are skipped.
    pub fn take(&self, rows: &[usize]) -> Dataset {
        let rows: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&r| r < self.row_count)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Dataset {
            columns,
            row_count: rows.len(),
        }
    }

    /// Project onto the named columns (in the order given). Unknown and
    /// repeated names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Dataset {
        let mut seen = BTreeSet::new();
        let columns = names
            .iter()
            .filter(|n| seen.insert(n.as_ref().to_string()))
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect::<Vec<_>>();
        let row_count = if columns.is_empty() { 0 } else { self.row_count };
        Dataset { columns, row_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Dataset {
        Dataset::new(vec![
            Column::new("name", vec![CellValue::guess("ali"), CellValue::guess("bob")]),
            Column::new("age", vec![CellValue::Integer(20), CellValue::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::new("a", vec![CellValue::Integer(1)]),
            Column::new("b", vec![]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DataError::RaggedColumn {
                column: "b".into(),
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(vec![Column::new("a", vec![]), Column::new("a", vec![])]).unwrap_err();
        assert_eq!(err, DataError::DuplicateColumn("a".into()));
    }

    #[test]
    fn guess_types_text_fields() {
        assert_eq!(CellValue::guess(""), CellValue::Null);
        assert_eq!(CellValue::guess("42"), CellValue::Integer(42));
        assert_eq!(CellValue::guess("4.5"), CellValue::Float(4.5));
        assert_eq!(CellValue::guess("true"), CellValue::Bool(true));
        assert_eq!(CellValue::guess("abc"), CellValue::Text("abc".into()));
    }

    #[test]
    fn display_round_trips_through_guess() {
        for v in [
            CellValue::Integer(-3),
            CellValue::Float(2.0),
            CellValue::Float(0.1),
            CellValue::Bool(false),
            CellValue::Text("x y".into()),
            CellValue::Null,
        ] {
            assert_eq!(CellValue::guess(&v.to_string()), v);
        }
    }

    #[test]
    fn take_and_select_derive_new_datasets() {
        let ds = people();
        let taken = ds.take(&[1, 7]);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken.cell(0, 0), Some(&CellValue::Text("bob".into())));

        let projected = ds.select(&["age", "missing", "age"]);
        assert_eq!(projected.column_names().collect::<Vec<_>>(), vec!["age"]);
        assert_eq!(projected.len(), 2);
        assert_eq!(ds.columns().len(), 2);
    }

    #[test]
    fn unique_values_skip_nulls() {
        let ds = people();
        let ages = ds.column("age").unwrap().unique_values();
        assert_eq!(ages.into_iter().collect::<Vec<_>>(), vec![CellValue::Integer(20)]);
    }
}
