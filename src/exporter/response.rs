// file: src/exporter/response.rs
// description: classification of decrypted answers into csv column shapes

use crate::error::{ExportError, Result};
use crate::models::{AnswerArray, DecryptedField};

const LIST_SEPARATOR: &str = ";";

/// Column layout of one answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Section headers carry no answer and get no column.
    Header,
    Single(String),
    List(Vec<String>),
    /// One column per table row, each cell the joined row.
    Table(Vec<Vec<String>>),
}

impl Response {
    pub fn classify(field: &DecryptedField) -> Result<Self> {
        if field.is_section() {
            return Ok(Response::Header);
        }
        if let Some(answer) = &field.answer {
            return Ok(Response::Single(answer.clone()));
        }
        match &field.answer_array {
            Some(AnswerArray::List(items)) => Ok(Response::List(items.clone())),
            Some(AnswerArray::Table(rows)) if rows.is_empty() => Ok(Response::List(Vec::new())),
            Some(AnswerArray::Table(rows)) => Ok(Response::Table(rows.clone())),
            None => Err(ExportError::UnknownResponseType {
                field_id: field.id.clone(),
            }),
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Response::Header)
    }

    pub fn num_cols(&self) -> usize {
        match self {
            Response::Header => 0,
            Response::Single(_) | Response::List(_) => 1,
            Response::Table(rows) => rows.len(),
        }
    }

    /// Raw text for column `col`; empty past the answer's own width.
    pub fn answer(&self, col: usize) -> String {
        match self {
            Response::Single(answer) if col == 0 => answer.clone(),
            Response::List(items) if col == 0 => items.join(LIST_SEPARATOR),
            Response::Table(rows) => rows
                .get(col)
                .map(|row| row.join(LIST_SEPARATOR))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}
