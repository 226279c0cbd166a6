// src/models/dataset.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One parsed spreadsheet, immutable after creation.
///
/// `columns` is the ordered header of the sheet; every row is a mapping from
/// column name to cell value whose key set is a subset of `columns` (cells
/// that were empty in the source file are simply absent from the row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularDataset {
    pub filename: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TabularDataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Lightweight view returned to the browser after an upload, so the full row
/// payload is not echoed back.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub filename: String,
    pub columns: Vec<String>,
    pub row_count: usize,
}

impl From<&TabularDataset> for DatasetSummary {
    fn from(dataset: &TabularDataset) -> Self {
        Self {
            filename: dataset.filename.clone(),
            columns: dataset.columns.clone(),
            row_count: dataset.rows.len(),
        }
    }
}
