use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

/// The named sheets of the portal workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Students,
    Faculty,
    Transactions,
    Messages,
}

impl Sheet {
    pub const ALL: [Sheet; 4] = [
        Sheet::Students,
        Sheet::Faculty,
        Sheet::Transactions,
        Sheet::Messages,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sheet::Students => "Students",
            Sheet::Faculty => "Faculty",
            Sheet::Transactions => "Transactions",
            Sheet::Messages => "Messages",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Sheet::ALL
            .into_iter()
            .find(|sheet| sheet.name().eq_ignore_ascii_case(s.trim()))
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    /// The fixed header row of the sheet.
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Sheet::Students => &[
                "Username",
                "Password",
                "Full_Name",
                "Major",
                "GPA",
                "Email",
                "Advisor_Assigned",
                "Course_Registered",
                "Transcript_Level",
                "Attendance",
                "Full_Time/Part_Time",
                "Qualification",
                "Account_Balance",
            ],
            Sheet::Faculty => &[
                "Username",
                "Password",
                "Full_Name",
                "Course",
                "Schedule",
                "Advisor_Number",
                "Email",
            ],
            Sheet::Transactions => &[
                "Username",
                "Role",
                "Type",
                "Amount",
                "Old_Balance",
                "New_Balance",
                "Timestamp",
                "Id",
            ],
            Sheet::Messages => &["Sender", "Receiver", "Message", "Timestamp", "Id"],
        }
    }
}

impl std::fmt::Display for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Header cells are trimmed and inner spaces become underscores, so
/// "Full Name " and "Full_Name" address the same column.
pub fn normalize_header(header: &str) -> String {
    header.trim().replace(' ', "_")
}

/// One sheet read into memory: normalized headers plus raw string rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Table {
    /// An empty table carrying the sheet's known headers.
    pub fn empty(sheet: Sheet) -> Self {
        Self::with_headers(sheet.headers().iter().map(|h| h.to_string()).collect())
    }

    fn with_headers(headers: Vec<String>) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        Self {
            headers,
            rows: Vec::new(),
            index,
        }
    }

    /// Parse CSV text into a table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(normalize_header)
            .collect();

        let mut table = Self::with_headers(headers);
        for (i, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("CSV parse error on line {}", i + 2))?;
            table.rows.push(record.iter().map(String::from).collect());
        }
        Ok(table)
    }

    /// Read a sheet file. A missing file is an empty table with the sheet's
    /// known headers, not an error.
    pub fn load(path: &Path, sheet: Sheet) -> Result<Self> {
        match File::open(path) {
            Ok(file) => Self::from_reader(file)
                .with_context(|| format!("Failed to read {} sheet from {}", sheet, path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(sheet = %sheet, path = %path.display(), "sheet file missing, using empty table");
                Ok(Self::empty(sheet))
            }
            Err(e) => Err(e).with_context(|| format!("Failed to open {}", path.display())),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cell value for `column` in `row`, or "" when the column or cell is
    /// absent.
    pub fn cell<'a>(&self, row: &'a [String], column: &str) -> &'a str {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a timestamp cell: RFC 3339, a spreadsheet-style
/// "YYYY-MM-DD HH:MM:SS[.ffffff]", or a bare date. Naive values are UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    anyhow::bail!("Invalid timestamp format: {}", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Full Name "), "Full_Name");
        assert_eq!(normalize_header("Account_Balance"), "Account_Balance");
    }

    #[test]
    fn test_table_reads_cells_by_normalized_header() {
        let csv = "Username , Full Name,GPA\namy,Amy Lee,3.5\nbob,Bob\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert!(table.has_column("Full_Name"));
        assert_eq!(table.cell(&table.rows[0], "Full_Name"), "Amy Lee");
        assert_eq!(table.cell(&table.rows[1], "GPA"), "");
        assert_eq!(table.cell(&table.rows[0], "Major"), "");
    }

    #[test]
    fn test_missing_file_is_empty_table_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::load(&dir.path().join("Messages.csv"), Sheet::Messages).unwrap();

        assert!(table.is_empty());
        assert_eq!(
            table.headers,
            vec!["Sender", "Receiver", "Message", "Timestamp", "Id"]
        );
    }

    #[test]
    fn test_sheet_from_name() {
        assert_eq!(Sheet::from_name("students"), Some(Sheet::Students));
        assert_eq!(Sheet::from_name(" Messages "), Some(Sheet::Messages));
        assert_eq!(Sheet::from_name("Grades"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-03-01T10:00:00Z").unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
        assert_eq!(
            parse_timestamp("2024-03-01 10:00:00.123456")
                .unwrap()
                .format("%H:%M:%S%.6f")
                .to_string(),
            "10:00:00.123456"
        );
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
