use std::path::Path;

use thiserror::Error;

use super::model::Dataset;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a dataset as CSV: header row of column names in order, one
/// comma-delimited row per record with each cell's stringified form, no
/// row-index column.
pub fn to_csv(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.column_names())?;
    for row in 0..dataset.len() {
        let fields = dataset
            .columns()
            .iter()
            .map(|c| c.values[row].to_string());
        writer.write_record(fields)?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Write [`to_csv`] output to a file.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<(), ExportError> {
    let bytes = to_csv(dataset)?;
    std::fs::write(path, bytes)?;
    log::info!("exported {} rows to {}", dataset.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::ingest;
    use crate::data::model::{CellValue, Column};

    #[test]
    fn writes_header_and_stringified_cells() {
        let ds = Dataset::new(vec![
            Column::new("name", vec![CellValue::Text("o'neil, jr".into()), CellValue::Null]),
            Column::new("score", vec![CellValue::Float(2.0), CellValue::Integer(7)]),
        ])
        .unwrap();
        let text = String::from_utf8(to_csv(&ds).unwrap()).unwrap();
        assert_eq!(text, "name,score\n\"o'neil, jr\",2.0\n,7\n");
    }

    #[test]
    fn empty_dataset_still_has_a_header() {
        let ds = Dataset::new(vec![Column::new("a", vec![])]).unwrap();
        assert_eq!(to_csv(&ds).unwrap(), b"a\n");
    }

    #[test]
    fn write_csv_round_trips_through_ingest() {
        let ds = ingest(b"a,b\nx,1\ny,2.5\n", "csv").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered_data.csv");
        write_csv(&ds, &path).unwrap();
        let back = ingest(&std::fs::read(&path).unwrap(), "csv").unwrap();
        assert_eq!(back, ds);
    }
}
