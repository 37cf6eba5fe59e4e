//! CSV batch scoring
//!
//! Upload contract:
//! - every manifest column must be present (any order); otherwise
//!   [`BatchError::MissingColumns`] names them and nothing is scored
//! - extra columns are copied to the output untouched
//! - empty or non-numeric cells in required columns are replaced by the
//!   missing-value default and counted as coerced
//!
//! Output: the uploaded columns followed by `P_confirmed` and `Prediction`.

use serde::Serialize;
use thiserror::Error;

use crate::classifier::{ClassificationFacade, Label};

/// Appended probability column
pub const PROBABILITY_COLUMN: &str = "P_confirmed";

/// Appended label column
pub const LABEL_COLUMN: &str = "Prediction";

/// Rows included in the response preview
pub const PREVIEW_ROWS: usize = 20;

/// Suggested file name for the scored download
pub const OUTPUT_FILE_NAME: &str = "koi_predictions.csv";

/// Batch scoring errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Required columns absent from the header, in manifest order
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Input is not readable as CSV
    #[error("Malformed CSV: {0}")]
    Malformed(String),
}

impl From<csv::Error> for BatchError {
    fn from(e: csv::Error) -> Self {
        BatchError::Malformed(e.to_string())
    }
}

/// Scored upload with summary statistics
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Output header (input columns plus the two appended ones)
    pub columns: Vec<String>,
    /// Input columns that are not features
    pub extra_columns: Vec<String>,
    pub total_records: usize,
    pub confirmed: usize,
    pub false_positive: usize,
    /// Mean P(CONFIRMED); `None` for an upload without data rows
    pub average_probability: Option<f64>,
    /// Required cells replaced by the missing-value default
    pub coerced_cells: usize,
    pub threshold: f64,
    /// First [`PREVIEW_ROWS`] output rows
    pub preview: Vec<Vec<String>>,
    /// Complete scored CSV
    #[serde(skip)]
    pub csv: String,
}

/// Check the header of an upload against the manifest
///
/// Returns the positions of the manifest columns and the extra column names.
fn align_columns(
    facade: &ClassificationFacade,
    headers: &csv::StringRecord,
) -> Result<(Vec<usize>, Vec<String>), BatchError> {
    let header_names: Vec<&str> = headers.iter().map(str::trim).collect();

    let mut positions = Vec::with_capacity(facade.manifest().len());
    let mut missing = Vec::new();
    for name in facade.manifest().names() {
        match header_names.iter().position(|h| h == name) {
            Some(pos) => positions.push(pos),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(BatchError::MissingColumns(missing));
    }

    let extra = header_names
        .iter()
        .filter(|h| !facade.manifest().contains(h))
        .map(|h| h.to_string())
        .collect();

    Ok((positions, extra))
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
}

/// Score every row of an uploaded CSV
pub fn score_csv(
    facade: &ClassificationFacade,
    input: &[u8],
    threshold: f64,
) -> Result<BatchOutcome, BatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(BatchError::Malformed("missing header row".to_string()));
    }

    let (positions, extra_columns) = align_columns(facade, &headers)?;

    let mut columns: Vec<String> = headers.iter().map(str::to_string).collect();
    columns.push(PROBABILITY_COLUMN.to_string());
    columns.push(LABEL_COLUMN.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;

    let mut total_records = 0usize;
    let mut confirmed = 0usize;
    let mut coerced_cells = 0usize;
    let mut probability_sum = 0.0;
    let mut preview = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            let line = record.position().map_or(0, |p| p.line());
            return Err(BatchError::Malformed(format!(
                "line {}: expected {} fields, found {}",
                line,
                headers.len(),
                record.len()
            )));
        }

        let cells: Vec<Option<f64>> = positions
            .iter()
            .map(|&pos| parse_cell(record.get(pos)))
            .collect();
        let vector = facade
            .manifest()
            .resolve_ordered(&cells, facade.missing_default());
        coerced_cells += vector.substituted().len();

        let result = facade.classify_vector(&vector, threshold);
        total_records += 1;
        probability_sum += result.probability;
        if result.label == Label::Confirmed {
            confirmed += 1;
        }

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        // Short rows are padded so appended columns stay aligned
        row.resize(headers.len(), String::new());
        row.push(result.probability.to_string());
        row.push(result.label.display_name().to_string());

        writer.write_record(&row)?;
        if preview.len() < PREVIEW_ROWS {
            preview.push(row);
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BatchError::Malformed(e.to_string()))?;
    let csv = String::from_utf8(bytes).map_err(|e| BatchError::Malformed(e.to_string()))?;

    if coerced_cells > 0 {
        tracing::warn!(
            coerced_cells,
            default = facade.missing_default(),
            "Non-numeric cells replaced with default for prediction"
        );
    }
    tracing::info!(total_records, confirmed, "CSV batch scored");

    Ok(BatchOutcome {
        columns,
        extra_columns,
        total_records,
        confirmed,
        false_positive: total_records - confirmed,
        average_probability: (total_records > 0).then(|| probability_sum / total_records as f64),
        coerced_cells,
        threshold,
        preview,
        csv,
    })
}
