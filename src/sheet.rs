use chrono::NaiveDate;

/// A single decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// The trimmed string content of a text cell, if it is non-blank.
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// How the cell reads when used as a column header.
    pub fn header_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            // Month-first headers are typed as dates by Excel; keep the month visible.
            Cell::Date(d) => d.format("%Y-%m").to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

/// One worksheet: a header row followed by data rows. Column roles are not fixed;
/// see [`crate::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Builds a sheet from a raw cell grid whose first row holds the headers.
    pub fn from_grid(name: impl Into<String>, mut grid: Vec<Vec<Cell>>) -> Self {
        if grid.is_empty() {
            return Self::new(name, Vec::new(), Vec::new());
        }
        let header_row = grid.remove(0);
        let headers = header_row.iter().map(Cell::header_text).collect();
        Self::new(name, headers, grid)
    }

    /// Number of columns, counting the widest of the header row and the data rows.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self, col: usize) -> &str {
        self.headers.get(col).map(String::as_str).unwrap_or("")
    }

    /// Out-of-range positions read as empty cells.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &Cell> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_grid_splits_headers() {
        let sheet = Sheet::from_grid(
            "2023",
            vec![
                vec![Cell::text("Item"), Cell::text("JAN"), Cell::Number(2023.0)],
                vec![Cell::text("FATURAMENTO"), Cell::Number(10.0)],
            ],
        );

        assert_eq!(sheet.headers, vec!["Item", "JAN", "2023"]);
        assert_eq!(sheet.row_count(), 1);
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.cell(0, 2), &Cell::Empty);
        assert_eq!(sheet.cell(9, 9), &Cell::Empty);
    }

    #[test]
    fn test_date_header_keeps_month() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(Cell::Date(date).header_text(), "2024-10");
    }

    #[test]
    fn test_as_label() {
        assert_eq!(Cell::text("  Seguros ").as_label(), Some("Seguros"));
        assert_eq!(Cell::text("   ").as_label(), None);
        assert_eq!(Cell::Number(1.0).as_label(), None);
    }
}
