// file: src/exporter/document.rs
// description: csv document laid out as bom, metadata block, header, then data rows
// reference: https://docs.rs/csv

use crate::error::{ExportError, Result};
use std::path::Path;
use tracing::debug;

/// Marks the file as UTF-8 for spreadsheet applications.
pub const UTF8_BOM: &str = "\u{FEFF}";

#[derive(Debug, Clone, Default)]
pub struct CsvDocument {
    metadata: Vec<String>,
    header: Option<String>,
    rows: Vec<String>,
}

/// Encodes one record as a CRLF terminated csv line.
pub fn stringify<I, S>(cells: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;

    String::from_utf8(bytes)
        .map_err(|e| ExportError::Validation(format!("csv line is not UTF-8: {}", e)))
}

impl CsvDocument {
    pub fn new(metadata_rows: usize, expected_rows: usize) -> Self {
        Self {
            metadata: vec![String::new(); metadata_rows],
            header: None,
            rows: Vec::with_capacity(expected_rows),
        }
    }

    pub fn add_line<I, S>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.rows.push(stringify(cells)?);
        Ok(())
    }

    pub fn set_header<I, S>(&mut self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.header = Some(stringify(cells)?);
        Ok(())
    }

    /// Replaces the metadata block. The block keeps its configured size.
    pub fn set_metadata(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let slots = self.metadata.len();
        let mut block = rows
            .iter()
            .take(slots)
            .map(stringify)
            .collect::<Result<Vec<_>>>()?;
        block.resize(slots, String::new());
        self.metadata = block;
        Ok(())
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn render(&self) -> String {
        let mut out = String::from(UTF8_BOM);
        for line in self
            .metadata
            .iter()
            .chain(self.header.iter())
            .chain(self.rows.iter())
        {
            out.push_str(line);
        }
        out
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = self.render();
        tokio::fs::write(path, content.as_bytes()).await?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stringify_quotes_when_needed() {
        assert_eq!(stringify(["a", "b"]).unwrap(), "a,b\r\n");
        assert_eq!(stringify(["a,b", "say \"hi\""]).unwrap(), "\"a,b\",\"say \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn test_render_layout() {
        let mut doc = CsvDocument::new(2, 1);
        doc.set_header(["Response ID", "Timestamp"]).unwrap();
        doc.add_line(["id1", "ts1"]).unwrap();
        assert_eq!(doc.render(), "\u{FEFF}Response ID,Timestamp\r\nid1,ts1\r\n");

        doc.set_metadata(&[vec!["Expected".to_string(), "1".to_string()]])
            .unwrap();
        assert_eq!(
            doc.render(),
            "\u{FEFF}Expected,1\r\nResponse ID,Timestamp\r\nid1,ts1\r\n"
        );
    }

    #[test]
    fn test_metadata_replacement_keeps_size() {
        let mut doc = CsvDocument::new(2, 0);
        let rows = vec![
            vec!["a".to_string()],
            vec!["b".to_string()],
            vec!["c".to_string()],
        ];
        doc.set_metadata(&rows).unwrap();
        doc.set_metadata(&rows[1..]).unwrap();
        assert_eq!(doc.render(), "\u{FEFF}b\r\nc\r\n");
        assert_eq!(doc.len(), 0);
    }

    #[tokio::test]
    async fn test_save_writes_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut doc = CsvDocument::new(0, 0);
        doc.set_header(["h"]).unwrap();
        doc.save(&path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    }
}
