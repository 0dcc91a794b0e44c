use crate::schema::MonthCode;
use crate::sheet::{Cell, Sheet};
use crate::utils::{fold_label, trailing_month_number};
use log::debug;
use std::collections::BTreeMap;

const ANNUAL_HEADER_TERMS: [&str; 4] = ["ANUAL", "TOTAL", "ANO", "YEAR"];

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRoles {
    pub label: usize,
    pub annual: Option<usize>,
    pub months: BTreeMap<MonthCode, usize>,
}

impl ColumnRoles {
    /// Detects every role at once. `None` when the sheet has no label column, which
    /// makes the sheet unusable.
    pub fn detect(sheet: &Sheet, probe_rows: usize) -> Option<Self> {
        let label = detect_label_column_within(sheet, probe_rows)?;
        let months = detect_month_columns(sheet);
        let annual = annual_column_for(sheet, label, &months);

        debug!(
            "Sheet '{}': label column {}, annual column {:?}, {} month columns",
            sheet.name,
            label,
            annual,
            months.len()
        );

        Some(Self {
            label,
            annual,
            months,
        })
    }
}

/// The first column holding a non-blank string within the first ten data rows.
pub fn detect_label_column(sheet: &Sheet) -> Option<usize> {
    detect_label_column_within(sheet, crate::config::DEFAULT_LABEL_PROBE_ROWS)
}

fn detect_label_column_within(sheet: &Sheet, probe_rows: usize) -> Option<usize> {
    let probe = probe_rows.min(sheet.row_count());
    (0..sheet.width()).find(|&col| (0..probe).any(|row| sheet.cell(row, col).as_label().is_some()))
}

/// Maps each month to its column, by abbreviation first and then by trailing month
/// numbers ("2024-03", "MES/1"). The first column found for a month keeps it.
pub fn detect_month_columns(sheet: &Sheet) -> BTreeMap<MonthCode, usize> {
    let mut months = BTreeMap::new();
    let mut unmatched = Vec::new();

    for (col, header) in sheet.headers.iter().enumerate() {
        let folded = fold_label(header);
        match MonthCode::ALL
            .iter()
            .find(|m| folded.contains(m.abbreviation()))
        {
            Some(month) => {
                months.entry(*month).or_insert(col);
            }
            None => unmatched.push(col),
        }
    }

    for col in unmatched {
        if let Some(month) = trailing_month_number(sheet.header(col)).and_then(MonthCode::from_number)
        {
            months.entry(month).or_insert(col);
        }
    }

    months
}

/// The first column whose header mentions ANUAL/TOTAL/ANO/YEAR, falling back to a
/// numeric column right after the last month column.
pub fn detect_annual_column(sheet: &Sheet) -> Option<usize> {
    let label = detect_label_column(sheet);
    let months = detect_month_columns(sheet);
    match label {
        Some(label) => annual_column_for(sheet, label, &months),
        None => annual_column_for(sheet, usize::MAX, &months),
    }
}

fn annual_column_for(
    sheet: &Sheet,
    label: usize,
    months: &BTreeMap<MonthCode, usize>,
) -> Option<usize> {
    let is_month = |col: usize| months.values().any(|&c| c == col);

    let by_header = sheet.headers.iter().enumerate().find_map(|(col, header)| {
        if col == label || is_month(col) {
            return None;
        }
        let folded = fold_label(header);
        ANNUAL_HEADER_TERMS
            .iter()
            .any(|term| folded.contains(term))
            .then_some(col)
    });
    if by_header.is_some() {
        return by_header;
    }

    let next = months.values().max()? + 1;
    (next < sheet.width() && next != label && is_numeric_column(sheet, next)).then_some(next)
}

/// A column is numeric when it holds at least one number and no text.
fn is_numeric_column(sheet: &Sheet, col: usize) -> bool {
    let mut has_number = false;
    for cell in sheet.column(col) {
        match cell {
            Cell::Number(_) => has_number = true,
            Cell::Text(s) if !s.trim().is_empty() => return false,
            _ => {}
        }
    }
    has_number
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn monthly_headers(suffix: &str) -> Vec<String> {
        MonthCode::ALL
            .iter()
            .map(|m| format!("{}{}", m.abbreviation(), suffix))
            .collect()
    }

    #[test]
    fn test_month_and_annual_headers() {
        let mut names = vec!["Item".to_string()];
        names.extend(monthly_headers("/24"));
        names.push("ANUAL".to_string());
        let sheet = Sheet::new(
            "2024",
            names,
            vec![vec![Cell::text("FATURAMENTO"), Cell::Number(1.0)]],
        );

        let months = detect_month_columns(&sheet);
        assert_eq!(months.len(), 12);
        assert_eq!(months[&MonthCode::Jan], 1);
        assert_eq!(months[&MonthCode::Dez], 12);
        assert_eq!(detect_annual_column(&sheet), Some(13));
        assert_eq!(detect_label_column(&sheet), Some(0));
    }

    #[test]
    fn test_numeric_month_headers() {
        let mut names = vec!["Conta".to_string()];
        names.extend((1..=12).map(|m| format!("2024-{:02}", m)));
        let sheet = Sheet::new("2024", names, vec![vec![Cell::text("x")]]);

        let months = detect_month_columns(&sheet);
        assert_eq!(months.len(), 12);
        assert_eq!(months[&MonthCode::Out], 10);
    }

    #[test]
    fn test_numeric_indicator_does_not_overwrite() {
        let sheet = Sheet::new(
            "s",
            headers(&["Item", "JAN", "MES/1", "FEV"]),
            vec![vec![Cell::text("x")]],
        );
        let months = detect_month_columns(&sheet);
        assert_eq!(months[&MonthCode::Jan], 1);
        assert_eq!(months[&MonthCode::Fev], 3);
        assert_eq!(months.len(), 2);
    }

    #[test]
    fn test_label_column_skips_numeric_columns() {
        let sheet = Sheet::new(
            "s",
            headers(&["#", "Descrição", "JAN"]),
            vec![
                vec![Cell::Number(1.0), Cell::text("FATURAMENTO"), Cell::Number(10.0)],
                vec![Cell::Number(2.0), Cell::text("Vendas"), Cell::Number(10.0)],
            ],
        );
        assert_eq!(detect_label_column(&sheet), Some(1));
    }

    #[test]
    fn test_no_label_column() {
        let sheet = Sheet::new(
            "s",
            headers(&["JAN", "FEV"]),
            vec![vec![Cell::Number(1.0), Cell::Number(2.0)]],
        );
        assert_eq!(detect_label_column(&sheet), None);
        assert!(ColumnRoles::detect(&sheet, 10).is_none());
    }

    #[test]
    fn test_annual_fallback_after_last_month() {
        let mut names = vec!["Item".to_string()];
        names.extend(monthly_headers(""));
        names.push(String::new());
        let mut row = vec![Cell::text("FATURAMENTO")];
        row.extend((0..12).map(|_| Cell::Number(10.0)));
        row.push(Cell::Number(120.0));
        let sheet = Sheet::new("s", names, vec![row]);

        assert_eq!(detect_annual_column(&sheet), Some(13));
    }

    #[test]
    fn test_annual_fallback_rejects_text_column() {
        let mut names = vec!["Item".to_string()];
        names.extend(monthly_headers(""));
        names.push("Obs".to_string());
        let mut row = vec![Cell::text("FATURAMENTO")];
        row.extend((0..12).map(|_| Cell::Number(10.0)));
        row.push(Cell::text("revisar"));
        let sheet = Sheet::new("s", names, vec![row]);

        assert_eq!(detect_annual_column(&sheet), None);
    }

    #[test]
    fn test_label_header_with_ano_is_not_annual() {
        let sheet = Sheet::new(
            "s",
            headers(&["PLANO DE CONTAS", "JAN", "TOTAL"]),
            vec![vec![Cell::text("FATURAMENTO"), Cell::Number(1.0), Cell::Number(1.0)]],
        );
        assert_eq!(detect_annual_column(&sheet), Some(2));
    }
}
