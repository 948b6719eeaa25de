//! FMEA table export
//!
//! CSV download (`fmea_analysis.csv`, `text/csv`, UTF-8) and a plain-text
//! table for the terminal. Rows are always ordered by descending RPN.

use crate::error::{FishboneError, Result};
use crate::fmea::{rank, CauseRecord, Rating, Ratings};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

pub const CSV_FILENAME: &str = "fmea_analysis.csv";
pub const CSV_MIME: &str = "text/csv";
pub const CSV_HEADER: [&str; 6] = ["Category", "Cause", "Severity", "Occurrence", "Detectability", "RPN"];

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Cause")]
    cause: String,
    #[serde(rename = "Severity")]
    severity: i64,
    #[serde(rename = "Occurrence")]
    occurrence: i64,
    #[serde(rename = "Detectability")]
    detectability: i64,
    #[serde(rename = "RPN")]
    rpn: i64,
}

impl From<&CauseRecord> for CsvRow {
    fn from(record: &CauseRecord) -> Self {
        Self {
            category: record.category().to_string(),
            cause: record.cause().to_string(),
            severity: record.severity().value() as i64,
            occurrence: record.occurrence().value() as i64,
            detectability: record.detectability().value() as i64,
            rpn: record.rpn() as i64,
        }
    }
}

impl TryFrom<CsvRow> for CauseRecord {
    type Error = FishboneError;

    fn try_from(row: CsvRow) -> Result<Self> {
        let ratings = Ratings::new(
            Rating::try_from(row.severity)?,
            Rating::try_from(row.occurrence)?,
            Rating::try_from(row.detectability)?,
        );
        let record = CauseRecord::new(row.category, row.cause, ratings);
        if record.rpn() as i64 != row.rpn {
            return Err(FishboneError::Export(format!(
                "row '{}' has RPN {} but its ratings give {}",
                record.cause(),
                row.rpn,
                record.rpn()
            )));
        }
        Ok(record)
    }
}

/// A file ready to be handed to the user.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Serialize records to CSV, header first, highest RPN first.
pub fn to_csv(records: &[CauseRecord]) -> Result<Vec<u8>> {
    let mut sorted = records.to_vec();
    rank(&mut sorted);

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in &sorted {
        writer.serialize(CsvRow::from(record))?;
    }
    writer
        .into_inner()
        .map_err(|e| FishboneError::Export(format!("failed to flush CSV: {}", e)))
}

pub fn csv_artifact(records: &[CauseRecord]) -> Result<ExportArtifact> {
    Ok(ExportArtifact {
        filename: CSV_FILENAME,
        mime: CSV_MIME,
        bytes: to_csv(records)?,
    })
}

/// Parse an exported table back into records, checking every RPN.
pub fn from_csv(bytes: &[u8]) -> Result<Vec<CauseRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = reader.headers()?.clone();
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(FishboneError::Export(format!(
            "unexpected CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    reader
        .deserialize::<CsvRow>()
        .map(|row| CauseRecord::try_from(row?))
        .collect()
}

/// Aligned text table; high-risk rows are marked.
pub fn render_table(records: &[CauseRecord]) -> String {
    let mut sorted = records.to_vec();
    rank(&mut sorted);

    let rows: Vec<[String; 6]> = sorted
        .iter()
        .map(|r| {
            [
                r.category().to_string(),
                r.cause().to_string(),
                r.severity().to_string(),
                r.occurrence().to_string(),
                r.detectability().to_string(),
                r.rpn().to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = CSV_HEADER.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_line = |cells: &[&str]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = format_line(&CSV_HEADER[..]);
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    out.push('\n');
    for (row, record) in rows.iter().zip(&sorted) {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        let line = format_line(&cells);
        if record.is_high_risk() {
            out.push_str(&format!("{}  HIGH RISK", line));
        } else {
            out.push_str(line.trim_end());
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, cause: &str, s: u8, o: u8, d: u8) -> CauseRecord {
        CauseRecord::new(
            category,
            cause,
            Ratings::new(Rating::new(s).unwrap(), Rating::new(o).unwrap(), Rating::new(d).unwrap()),
        )
    }

    #[test]
    fn test_header_and_order() {
        let records = vec![
            record("Process", "No validation", 3, 3, 3),
            record("People", "Untrained staff", 8, 6, 4),
        ];
        let csv = String::from_utf8(to_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Category,Cause,Severity,Occurrence,Detectability,RPN");
        assert_eq!(lines[1], "People,Untrained staff,8,6,4,192");
        assert_eq!(lines[2], "Process,No validation,3,3,3,27");
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let csv = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), "Category,Cause,Severity,Occurrence,Detectability,RPN");
        assert!(from_csv(csv.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_quoting_survives_reparse() {
        let records = vec![record("Source Systems", "Feed \"A\", late, truncated", 9, 9, 9)];
        let bytes = to_csv(&records).unwrap();
        assert_eq!(from_csv(&bytes).unwrap(), records);
    }

    #[test]
    fn test_reparse_rejects_tampered_rpn() {
        let csv = "Category,Cause,Severity,Occurrence,Detectability,RPN\nPeople,x,2,2,2,9\n";
        assert!(matches!(from_csv(csv.as_bytes()), Err(FishboneError::Export(_))));
    }

    #[test]
    fn test_reparse_rejects_out_of_range() {
        let csv = "Category,Cause,Severity,Occurrence,Detectability,RPN\nPeople,x,11,1,1,11\n";
        assert!(matches!(from_csv(csv.as_bytes()), Err(FishboneError::InvalidRating(11))));
    }

    #[test]
    fn test_reparse_rejects_wrong_header() {
        let csv = "category,cause,s,o,d,rpn\nPeople,x,1,1,1,1\n";
        assert!(from_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_artifact_metadata() {
        let artifact = csv_artifact(&[]).unwrap();
        assert_eq!(artifact.filename, "fmea_analysis.csv");
        assert_eq!(artifact.mime, "text/csv");
    }

    #[test]
    fn test_render_table_marks_high_risk() {
        let table = render_table(&[record("People", "Untrained staff", 8, 6, 4), record("ETL", "x", 1, 1, 1)]);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("Category"));
        assert!(lines[2].contains("Untrained staff") && lines[2].ends_with("HIGH RISK"));
        assert!(!lines[3].contains("HIGH RISK"));
    }
}
