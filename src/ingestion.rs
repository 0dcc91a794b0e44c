use crate::error::{HierarchyError, Result};
use crate::sheet::{Cell, Sheet};
use crate::utils::excel_serial_to_date;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use log::{debug, warn};
use std::path::Path;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Reads every worksheet of `path`. Worksheets that cannot be decoded are logged and
/// skipped; only failing to open the file is an error.
pub fn read_workbook(path: impl AsRef<Path>) -> Result<Vec<Sheet>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if extension == "csv" {
        let bytes = std::fs::read(path)?;
        return Ok(vec![read_csv(&file_stem(path), &bytes)?]);
    }

    if !WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        return Err(HierarchyError::UnsupportedFormat(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let grid: Vec<Vec<Cell>> = range
                    .rows()
                    .map(|row| row.iter().map(cell_from_data).collect())
                    .collect();
                debug!("{}: sheet '{}' has {} rows", path.display(), name, grid.len());
                sheets.push(Sheet::from_grid(name, grid));
            }
            Err(e) => warn!("{}: cannot read sheet '{}': {}", path.display(), name, e),
        }
    }
    Ok(sheets)
}

/// Parses CSV bytes into one sheet. The delimiter (`;` or `,`) is guessed from the
/// first line; numeric fields are typed as numbers, everything else stays text.
pub fn read_csv(name: &str, bytes: &[u8]) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(cell_from_field).collect());
    }
    Ok(Sheet::from_grid(name, grid))
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let count = |needle: u8| first_line.iter().filter(|&&b| b == needle).count();
    if count(b';') > count(b',') {
        b';'
    } else {
        b','
    }
}

fn cell_from_field(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::text(trimmed),
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::text(s.as_str()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) => parse_iso_date(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.as_str())),
        Data::DurationIso(s) => Cell::text(s.as_str()),
        // Formula errors (#DIV/0!, #REF!) read as blanks.
        _ => Cell::Empty,
    }
}

fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    text.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
