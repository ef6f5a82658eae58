// file: src/exporter/accumulator.rs
// description: buffers successful records, infers the column schema, sorts and serializes
// reference: https://docs.rs/csv

use crate::error::Result;
use crate::exporter::document::CsvDocument;
use crate::exporter::response::Response;
use crate::exporter::sanitize::escape_formula;
use crate::models::SubmissionData;
use crate::utils::ReferenceZone;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RESPONSE_ID_HEADER: &str = "Response ID";
pub const TIMESTAMP_HEADER: &str = "Timestamp";
/// Rows written by `add_metadata_from_submission`.
pub const SUMMARY_ROWS: usize = 5;

#[derive(Debug, Clone)]
struct ColumnSchema {
    question: String,
    created: String,
    num_cols: usize,
}

#[derive(Debug, Clone)]
struct UnprocessedRecord {
    created: String,
    submission_id: String,
    record: HashMap<String, Response>,
}

pub struct CsvAccumulator {
    expected_count: u64,
    zone: ReferenceZone,
    document: CsvDocument,
    /// Field ids in discovery order.
    field_order: Vec<String>,
    schema: HashMap<String, ColumnSchema>,
    unprocessed: Vec<UnprocessedRecord>,
    sorted: bool,
    processed: bool,
}

impl CsvAccumulator {
    pub fn new(expected_count: u64, metadata_rows: usize, zone: ReferenceZone) -> Self {
        Self {
            expected_count,
            zone,
            document: CsvDocument::new(metadata_rows, expected_count as usize),
            field_order: Vec::new(),
            schema: HashMap::new(),
            unprocessed: Vec::new(),
            sorted: false,
            processed: false,
        }
    }

    /// Number of accepted records.
    pub fn len(&self) -> usize {
        self.unprocessed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unprocessed.is_empty()
    }

    pub fn document(&self) -> &CsvDocument {
        &self.document
    }

    /// Adds one decrypted submission. Nothing is recorded if any field cannot be classified.
    pub fn add_record(&mut self, data: SubmissionData) -> Result<()> {
        let responses = data
            .record
            .iter()
            .map(|field| Response::classify(field).map(|r| (field, r)))
            .collect::<Result<Vec<_>>>()?;

        let zone = self.zone;
        for (field, response) in &responses {
            if response.is_header() {
                continue;
            }
            let num_cols = response.num_cols();
            match self.schema.get_mut(&field.id) {
                Some(column) => {
                    if is_newer(zone, &data.created, &column.created) {
                        column.question = field.question.clone();
                        column.created = data.created.clone();
                    }
                    column.num_cols = column.num_cols.max(num_cols);
                }
                None => {
                    self.field_order.push(field.id.clone());
                    self.schema.insert(
                        field.id.clone(),
                        ColumnSchema {
                            question: field.question.clone(),
                            created: data.created.clone(),
                            num_cols,
                        },
                    );
                }
            }
        }

        let record = responses
            .into_iter()
            .map(|(field, response)| (field.id.clone(), response))
            .collect();
        self.unprocessed.push(UnprocessedRecord {
            created: data.created,
            submission_id: data.submission_id,
            record,
        });
        self.sorted = false;
        self.processed = false;
        Ok(())
    }

    /// Orders records oldest first. Unparseable timestamps go last, in arrival order.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let zone = self.zone;
        self.unprocessed.sort_by(|a, b| {
            match (zone.parse(&a.created), zone.parse(&b.created)) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        self.sorted = true;
    }

    /// Builds the header and one row per record.
    pub fn process(&mut self) -> Result<()> {
        if self.processed {
            return Ok(());
        }

        let mut header = vec![RESPONSE_ID_HEADER.to_string(), TIMESTAMP_HEADER.to_string()];
        for field_id in &self.field_order {
            if let Some(column) = self.schema.get(field_id) {
                header.extend(std::iter::repeat_n(column.question.clone(), column.num_cols));
            }
        }
        self.document.set_header(&header)?;

        self.document.clear_rows();
        for up in &self.unprocessed {
            let mut row = vec![up.submission_id.clone(), self.zone.display(&up.created)];
            for field_id in &self.field_order {
                let Some(column) = self.schema.get(field_id) else {
                    continue;
                };
                for col in 0..column.num_cols {
                    let cell = up
                        .record
                        .get(field_id)
                        .map(|response| escape_formula(&response.answer(col)).into_owned())
                        .unwrap_or_default();
                    row.push(cell);
                }
            }
            self.document.add_line(&row)?;
        }

        debug!(
            "Processed {} records into {} columns",
            self.unprocessed.len(),
            header.len()
        );
        self.processed = true;
        Ok(())
    }

    /// Writes or replaces the leading summary rows.
    pub fn add_metadata_from_submission(&mut self, error_count: u64, unverified_count: u64) -> Result<()> {
        let rows: [Vec<String>; SUMMARY_ROWS] = [
            vec!["Expected total responses".to_string(), self.expected_count.to_string()],
            vec!["Success count".to_string(), self.len().to_string()],
            vec!["Error count".to_string(), error_count.to_string()],
            vec!["Unverified response count".to_string(), unverified_count.to_string()],
            vec!["See download status column for download errors".to_string()],
        ];
        self.document.set_metadata(&rows)
    }

    /// Sorts, processes and writes `dir/filename`.
    pub async fn download_csv(&mut self, dir: &Path, filename: &str) -> Result<PathBuf> {
        self.sort();
        self.process()?;
        let path = dir.join(filename);
        self.document.save(&path).await?;
        info!("Saved {} responses to {}", self.len(), path.display());
        Ok(path)
    }
}

fn is_newer(zone: ReferenceZone, candidate: &str, current: &str) -> bool {
    match (zone.parse(candidate), zone.parse(current)) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => candidate > current,
    }
}
