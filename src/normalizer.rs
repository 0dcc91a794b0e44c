use crate::sheet::Cell;

/// Parses a cell into a number. Blank, unparsable and non-numeric cells read as `0.0`.
pub fn parse_cell(cell: &Cell) -> f64 {
    normalize_cell(cell).unwrap_or(0.0)
}

/// Like [`parse_cell`] but distinguishes blank cells (`None`) from zero.
pub fn normalize_cell(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        Cell::Text(s) if s.trim().is_empty() => None,
        Cell::Text(s) => Some(parse_text(s)),
        Cell::Bool(_) | Cell::Date(_) => Some(0.0),
    }
}

/// Parses a currency string.
///
/// Plain numerals ("1234.5") are taken as-is. Anything else is reduced to digits,
/// commas, dots and minus signs, then read with Brazilian separators: `.` groups
/// thousands and `,` marks decimals.
pub fn parse_text(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        return if value.is_finite() { value } else { 0.0 };
    }

    let cleaned: String = trimmed
        .replace("R$", "")
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let canonical = cleaned.replace('.', "").replace(',', ".");
    match canonical.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_strings() {
        assert_eq!(parse_text("R$ 1.234,56"), 1234.56);
        assert_eq!(parse_text("R$ 0,00"), 0.0);
        assert_eq!(parse_text("R$ 1.000.000,00"), 1_000_000.0);
        assert_eq!(parse_text("-R$ 250,50"), -250.5);
        assert_eq!(parse_text("12,5%"), 12.5);
    }

    #[test]
    fn test_plain_numerals_pass_through() {
        assert_eq!(parse_text("1234.5"), 1234.5);
        assert_eq!(parse_text(" 42 "), 42.0);
    }

    #[test]
    fn test_garbage_degrades_to_zero() {
        assert_eq!(parse_text(""), 0.0);
        assert_eq!(parse_text("-"), 0.0);
        assert_eq!(parse_text("n/d"), 0.0);
        assert_eq!(parse_text("NaN"), 0.0);
        assert_eq!(parse_text("1,2,3"), 0.0);
    }

    #[test]
    fn test_cells() {
        assert_eq!(parse_cell(&Cell::Number(1234.5)), 1234.5);
        assert_eq!(parse_cell(&Cell::text("R$ 1.234,56")), 1234.56);
        assert_eq!(parse_cell(&Cell::Empty), 0.0);
        assert_eq!(parse_cell(&Cell::Number(f64::NAN)), 0.0);
        assert_eq!(normalize_cell(&Cell::Empty), None);
        assert_eq!(normalize_cell(&Cell::text("  ")), None);
        assert_eq!(normalize_cell(&Cell::text("abc")), Some(0.0));
    }
}
