// src/sheets.rs
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Number, Value};

use crate::error::ServiceError;
use crate::models::dataset::TabularDataset;

/// Parses an uploaded spreadsheet into a dataset.
///
/// The first row is the header and defines the column order for the whole
/// sheet. Cells that are empty are omitted from their row, so a row's key
/// set is always a subset of the columns. A file that yields zero data rows
/// is reported as empty or unreadable.
pub fn parse_dataset(filename: &str, bytes: &[u8]) -> Result<TabularDataset, ServiceError> {
    let lowered = filename.to_lowercase();
    if lowered.ends_with(".csv") {
        parse_csv(filename, bytes)
    } else if lowered.ends_with(".xlsx") || lowered.ends_with(".xls") {
        parse_workbook(filename, bytes)
    } else {
        let extension = filename
            .rsplit('.')
            .next()
            .unwrap_or("unknown")
            .to_string();
        Err(ServiceError::UnsupportedFormat(extension))
    }
}

fn parse_csv(filename: &str, bytes: &[u8]) -> Result<TabularDataset, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let columns = {
        let headers = reader.headers().map_err(|e| {
            tracing::warn!("failed to read CSV header from '{}': {}", filename, e);
            ServiceError::EmptyDataset
        })?;
        unique_columns(headers.iter().map(str::to_string).collect())
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            tracing::warn!("failed to read CSV record from '{}': {}", filename, e);
            ServiceError::EmptyDataset
        })?;
        let mut row = Map::new();
        for (column, cell) in columns.iter().zip(record.iter()) {
            if cell.is_empty() {
                continue;
            }
            row.insert(column.clone(), infer_cell_value(cell));
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    finish(filename, columns, rows)
}

fn parse_workbook(filename: &str, bytes: &[u8]) -> Result<TabularDataset, ServiceError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::warn!("failed to open workbook '{}': {}", filename, e);
        ServiceError::EmptyDataset
    })?;

    // The first worksheet is the one analyzed, as in the browser uploader.
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ServiceError::EmptyDataset)?
        .map_err(|e| {
            tracing::warn!("failed to read worksheet from '{}': {}", filename, e);
            ServiceError::EmptyDataset
        })?;

    let mut iter = range.rows();
    let header = iter.next().ok_or(ServiceError::EmptyDataset)?;
    let columns = unique_columns(
        header
            .iter()
            .enumerate()
            .map(|(index, cell)| match cell {
                Data::Empty => format!("Column{}", index + 1),
                other => other.to_string(),
            })
            .collect(),
    );

    let mut rows = Vec::new();
    for cells in iter {
        let mut row = Map::new();
        for (column, cell) in columns.iter().zip(cells.iter()) {
            if let Some(value) = cell_to_value(cell) {
                row.insert(column.clone(), value);
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    finish(filename, columns, rows)
}

fn finish(
    filename: &str,
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
) -> Result<TabularDataset, ServiceError> {
    if rows.is_empty() {
        return Err(ServiceError::EmptyDataset);
    }
    tracing::info!(
        "parsed '{}': {} columns, {} rows",
        filename,
        columns.len(),
        rows.len()
    );
    Ok(TabularDataset {
        filename: filename.to_string(),
        columns,
        rows,
    })
}

/// Header names must be unique; duplicates get a numeric suffix.
fn unique_columns(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        if !seen.contains(&name) {
            seen.push(name);
            continue;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{name}_{suffix}");
            if !seen.contains(&candidate) {
                seen.push(candidate);
                break;
            }
            suffix += 1;
        }
    }
    seen
}

/// CSV cells are untyped text; numbers are recovered so the model can sum
/// them, everything else stays a string.
fn infer_cell_value(cell: &str) -> Value {
    if let Ok(int) = cell.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = cell.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(cell.to_string())
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(_) => Some(Value::String(cell.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_with_typed_cells() {
        let csv = b"Cliente,Valor\nA,10\nB,5.5\nC,loja\n";
        let dataset = parse_dataset("vendas.csv", csv).unwrap();
        assert_eq!(dataset.columns, vec!["Cliente", "Valor"]);
        assert_eq!(dataset.rows.len(), 3);
        assert_eq!(dataset.rows[0]["Valor"], serde_json::json!(10));
        assert_eq!(dataset.rows[1]["Valor"], serde_json::json!(5.5));
        assert_eq!(dataset.rows[2]["Valor"], serde_json::json!("loja"));
    }

    #[test]
    fn empty_cells_are_omitted_from_rows() {
        let csv = b"Cliente,Valor,Regiao\nA,10,\n";
        let dataset = parse_dataset("vendas.csv", csv).unwrap();
        assert!(!dataset.rows[0].contains_key("Regiao"));
        assert_eq!(dataset.rows[0].len(), 2);
    }

    #[test]
    fn header_only_csv_is_empty() {
        let csv = b"Cliente,Valor\n";
        assert!(matches!(
            parse_dataset("vendas.csv", csv),
            Err(ServiceError::EmptyDataset)
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(matches!(
            parse_dataset("notes.txt", b"hello"),
            Err(ServiceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn corrupt_workbook_is_unreadable() {
        assert!(matches!(
            parse_dataset("vendas.xlsx", b"not a zip archive"),
            Err(ServiceError::EmptyDataset)
        ));
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let columns = unique_columns(vec![
            "Valor".to_string(),
            "Valor".to_string(),
            "Valor".to_string(),
        ]);
        assert_eq!(columns, vec!["Valor", "Valor_2", "Valor_3"]);
    }
}
