use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type};
use arrow::util::display::array_value_to_string;
use calamine::{Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{CellValue, Column, DataError, Dataset};

/// Extensions accepted by [`ingest`], for file dialogs.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "tsv", "json", "xlsx", "xls", "parquet"];

/// Raw bytes could not be turned into a [`Dataset`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("unexpected layout: {0}")]
    Layout(String),
    #[error(transparent)]
    Shape(#[from] DataError),
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Parse an uploaded file's bytes. Dispatch by (case-insensitive) extension.
///
/// Supported formats:
/// * `.csv`          – comma-separated, header row
/// * `.txt` / `.tsv` – tab-separated, header row
/// * `.json`         – `[{ "col": value, ... }, ...]` or `{ "col": [values] | {"0": value} }`
/// * `.xlsx` / `.xls` – first worksheet, first row is the header
/// * `.parquet`      – flat columns of primitive / string / temporal types
pub fn ingest(bytes: &[u8], extension: &str) -> Result<Dataset, ParseError> {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "csv" => parse_delimited(bytes, b','),
        "txt" | "tsv" => parse_delimited(bytes, b'\t'),
        "json" => parse_json(bytes),
        "xlsx" | "xls" | "xlsm" | "xlsb" => parse_spreadsheet(bytes),
        "parquet" | "pq" => parse_parquet(bytes),
        other => Err(ParseError::UnsupportedExtension(other.to_string())),
    }
}

/// Read a dataset from disk, dispatching on the file's extension.
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ingest(&bytes, &ext).with_context(|| format!("parsing {}", path.display()))
}

/// Build a dataset from a header and row-major cells, deduplicating header names.
fn from_rows(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Dataset, ParseError> {
    let headers = dedupe_headers(headers);
    let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for (row_no, row) in rows.into_iter().enumerate() {
        if row.len() > headers.len() {
            return Err(ParseError::Layout(format!(
                "row {row_no} has {} fields but the header has {}",
                row.len(),
                headers.len()
            )));
        }
        let mut row = row;
        row.resize(headers.len(), CellValue::Null);
        for (col, cell) in columns.iter_mut().zip(row) {
            col.push(cell);
        }
    }
    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Ok(Dataset::new(columns)?)
}

/// Rename repeated header names to `name.1`, `name.2`, …
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if h.is_empty() { format!("column_{i}") } else { h };
            let mut name = base.clone();
            while taken.contains(&name) {
                let n = counters.entry(base.clone()).or_insert(0);
                *n += 1;
                name = format!("{base}.{n}");
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV / TSV loader
// ---------------------------------------------------------------------------

/// Header row with column names; every field is typed by [`CellValue::guess`].
/// Rows with more fields than the header are rejected, short rows are padded with nulls.
fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Dataset, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::Layout("missing header row".into()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::guess).collect());
    }
    from_rows(headers, rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepted layouts:
///
/// ```json
/// [ { "name": "ali", "age": 20 }, { "name": "bob", "age": 35 } ]
/// { "name": ["ali", "bob"], "age": [20, 35] }
/// { "name": { "0": "ali", "1": "bob" }, "age": { "0": 20, "1": 35 } }
/// ```
fn parse_json(bytes: &[u8]) -> Result<Dataset, ParseError> {
    let root: JsonValue = serde_json::from_slice(bytes)?;
    match root {
        JsonValue::Array(records) => parse_json_records(&records),
        JsonValue::Object(columns) => parse_json_columns(columns),
        _ => Err(ParseError::Layout(
            "expected a top-level JSON array or object".into(),
        )),
    }
}

/// Column orientation. Columns keyed by index label are aligned on the union of
/// their labels, numerically when every label is an integer; a label missing
/// from a column becomes a null. Array columns keep their positions.
fn parse_json_columns(columns: serde_json::Map<String, JsonValue>) -> Result<Dataset, ParseError> {
    let mut labels: Vec<&String> = Vec::new();
    for values in columns.values() {
        if let JsonValue::Object(by_index) = values {
            for key in by_index.keys() {
                if !labels.contains(&key) {
                    labels.push(key);
                }
            }
        }
    }
    let numeric: Option<Vec<i64>> = labels.iter().map(|k| k.trim().parse().ok()).collect();
    if let Some(numeric) = numeric {
        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.sort_by_key(|&i| numeric[i]);
        labels = order.into_iter().map(|i| labels[i]).collect();
    }

    let mut out = Vec::with_capacity(columns.len());
    for (name, values) in &columns {
        let values: Vec<CellValue> = match values {
            JsonValue::Array(items) => items.iter().map(json_to_cell).collect(),
            JsonValue::Object(by_index) => labels
                .iter()
                .map(|k| by_index.get(k.as_str()).map_or(CellValue::Null, json_to_cell))
                .collect(),
            other => {
                return Err(ParseError::Layout(format!(
                    "column '{name}' is {other}, expected an array or object"
                )))
            }
        };
        out.push(Column::new(name.clone(), values));
    }
    Ok(Dataset::new(out)?)
}

fn parse_json_records(records: &[JsonValue]) -> Result<Dataset, ParseError> {
    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| ParseError::Layout(format!("record {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map_or(CellValue::Null, json_to_cell))
                .collect()
        })
        .collect();
    from_rows(headers, rows)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) if s.is_empty() => CellValue::Null,
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// First worksheet; the first row holds the column names.
fn parse_spreadsheet(bytes: &[u8]) -> Result<Dataset, ParseError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Layout("workbook has no worksheets".into()))??;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| ParseError::Layout("worksheet is empty".into()))?
        .iter()
        .map(header_text)
        .collect();
    let rows = rows
        .map(|row| row.iter().map(spreadsheet_to_cell).collect())
        .collect();
    from_rows(headers, rows)
}

/// Whole-number headers read back as floats; print them without the `.0`.
fn header_text(cell: &Data) -> String {
    match cell {
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (*f as i64).to_string(),
        other => spreadsheet_to_cell(other).to_string(),
    }
}

fn spreadsheet_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::guess(s),
        // Dates become ISO text so the schema inspector sees them as temporal.
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(t) => CellValue::Text(t.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Nested columns are shown as text.
fn parse_parquet(bytes: &[u8]) -> Result<Dataset, ParseError> {
    let data = bytes::Bytes::copy_from_slice(bytes);
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for batch in reader {
        let batch = batch?;
        for (values, array) in columns.iter_mut().zip(batch.columns()) {
            for row in 0..batch.num_rows() {
                values.push(arrow_to_cell(array, row));
            }
        }
    }
    let columns = dedupe_headers(headers)
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Ok(Dataset::new(columns)?)
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_to_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        _ => match array_value_to_string(col, row) {
            Ok(s) => CellValue::guess(&s),
            Err(_) => CellValue::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{classify, ColumnKind};
    use pretty_assertions::assert_eq;

    fn column_values(ds: &Dataset, name: &str) -> Vec<CellValue> {
        ds.column(name).unwrap().values.clone()
    }

    #[test]
    fn csv_with_header_and_typed_cells() {
        let ds = ingest(b"name,age,score\nali,20,1.5\nbob,,2\n", "CSV").unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["name", "age", "score"]);
        assert_eq!(column_values(&ds, "age"), vec![CellValue::Integer(20), CellValue::Null]);
        assert_eq!(
            column_values(&ds, "score"),
            vec![CellValue::Float(1.5), CellValue::Integer(2)]
        );
    }

    #[test]
    fn txt_is_tab_separated() {
        let ds = ingest(b"a\tb\n1\tx\n", "txt").unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(column_values(&ds, "b"), vec![CellValue::Text("x".into())]);
    }

    #[test]
    fn csv_rows_wider_than_header_are_rejected() {
        let err = ingest(b"a,b\n1,2,3\n", "csv").unwrap_err();
        assert!(matches!(err, ParseError::Layout(_)), "{err}");
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let ds = ingest(b"a,a,a\n1,2,3\n", "csv").unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn json_records_keep_key_order_and_fill_missing() {
        let ds = ingest(br#"[{"b": 1, "a": "x"}, {"a": "y", "c": true}]"#, "json").unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(column_values(&ds, "b"), vec![CellValue::Integer(1), CellValue::Null]);
        assert_eq!(column_values(&ds, "c"), vec![CellValue::Null, CellValue::Bool(true)]);
    }

    #[test]
    fn json_column_orientation() {
        let ds = ingest(br#"{"n": {"0": 1.5, "1": 2}, "s": ["p", "q"]}"#, "json").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(
            column_values(&ds, "n"),
            vec![CellValue::Float(1.5), CellValue::Integer(2)]
        );
    }

    #[test]
    fn json_index_labels_align_rows_across_columns() {
        let ds = ingest(br#"{"a": {"0": 1, "1": 2}, "b": {"1": "y", "0": "x"}}"#, "json").unwrap();
        assert_eq!(ds.cell(0, 1), Some(&CellValue::Text("x".into())));
        assert_eq!(
            column_values(&ds, "b"),
            vec![CellValue::Text("x".into()), CellValue::Text("y".into())]
        );
    }

    #[test]
    fn json_index_labels_sort_numerically_and_fill_gaps() {
        let ds = ingest(br#"{"a": {"10": 3, "2": 1}, "b": {"2": true, "7": false}}"#, "json").unwrap();
        assert_eq!(
            column_values(&ds, "a"),
            vec![CellValue::Integer(1), CellValue::Null, CellValue::Integer(3)]
        );
        assert_eq!(
            column_values(&ds, "b"),
            vec![CellValue::Bool(true), CellValue::Bool(false), CellValue::Null]
        );
    }

    #[test]
    fn json_text_index_labels_keep_first_seen_order() {
        let ds = ingest(br#"{"a": {"r2": 2, "r1": 1}, "b": {"r1": "p", "r2": "q"}}"#, "json").unwrap();
        assert_eq!(column_values(&ds, "a"), vec![CellValue::Integer(2), CellValue::Integer(1)]);
        assert_eq!(
            column_values(&ds, "b"),
            vec![CellValue::Text("q".into()), CellValue::Text("p".into())]
        );
    }

    #[test]
    fn json_scalar_root_is_a_parse_error() {
        assert!(matches!(ingest(b"42", "json"), Err(ParseError::Layout(_))));
        assert!(matches!(ingest(b"[1, 2", "json"), Err(ParseError::Json(_))));
    }

    #[test]
    fn unsupported_extension_is_a_parse_error() {
        let err = ingest(b"whatever", "docx").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedExtension(ref e) if e == "docx"));
    }

    #[test]
    fn garbage_spreadsheet_is_a_parse_error() {
        assert!(ingest(b"not a workbook", "xlsx").is_err());
    }

    #[test]
    fn xlsx_first_sheet_with_dates_and_numeric_header() {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        sheet.write_string(0, 0, "joined").unwrap();
        sheet.write_string(0, 1, "team").unwrap();
        sheet.write_number(0, 2, 2024).unwrap();
        for (row, (day, team, units)) in [(15, "red", 3.0), (16, "blue", 4.5)].into_iter().enumerate() {
            let row = row as u32 + 1;
            let date = ExcelDateTime::from_ymd(2024, 1, day).unwrap();
            sheet.write_datetime_with_format(row, 0, &date, &date_format).unwrap();
            sheet.write_string(row, 1, team).unwrap();
            sheet.write_number(row, 2, units).unwrap();
        }
        let bytes = workbook.save_to_buffer().unwrap();

        let ds = ingest(&bytes, "xlsx").unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["joined", "team", "2024"]);
        assert_eq!(
            column_values(&ds, "joined"),
            vec![
                CellValue::Text("2024-01-15 00:00:00".into()),
                CellValue::Text("2024-01-16 00:00:00".into()),
            ]
        );
        assert_eq!(ds.cell(1, 1), Some(&CellValue::Text("blue".into())));
        assert_eq!(ds.cell(1, 2).and_then(CellValue::as_f64), Some(4.5));

        let kinds: Vec<ColumnKind> = classify(&ds).into_iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Temporal, ColumnKind::Categorical, ColumnKind::Numeric]
        );
    }

    #[test]
    fn whole_number_headers_print_as_integers() {
        assert_eq!(header_text(&Data::Float(2024.0)), "2024");
        assert_eq!(header_text(&Data::Float(0.5)), "0.5");
        assert_eq!(header_text(&Data::Int(7)), "7");
        assert_eq!(header_text(&Data::String("region".into())), "region");
        assert_eq!(header_text(&Data::Empty), "");
    }

    #[test]
    fn parquet_columns_keep_types_and_nulls() {
        use std::sync::Arc;

        use arrow::array::{Date32Array, Int64Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("joined", DataType::Date32, true),
            Field::new("units", DataType::Int64, true),
            Field::new("team", DataType::Utf8, true),
        ]));
        let columns: Vec<ArrayRef> = vec![
            // 2024-01-01 and 2024-01-02 as days since the epoch.
            Arc::new(Date32Array::from(vec![Some(19723), None, Some(19724)])),
            Arc::new(Int64Array::from(vec![Some(3), Some(5), None])),
            Arc::new(StringArray::from(vec![Some("red"), None, Some("blue")])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = ingest(&buf, "parquet").unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(
            column_values(&ds, "joined"),
            vec![
                CellValue::Text("2024-01-01".into()),
                CellValue::Null,
                CellValue::Text("2024-01-02".into()),
            ]
        );
        assert_eq!(
            column_values(&ds, "units"),
            vec![CellValue::Integer(3), CellValue::Integer(5), CellValue::Null]
        );
        assert_eq!(ds.cell(1, 2), Some(&CellValue::Null));

        let kinds: Vec<ColumnKind> = classify(&ds).into_iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Temporal, ColumnKind::Numeric, ColumnKind::Categorical]
        );
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name\nali\n").unwrap();
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 1);
    }
}
