use chrono::{Duration, NaiveDate};
use unicode_normalization::UnicodeNormalization;

/// Upper-cases `text` and strips diacritics, so "Custos Variáveis" and
/// "CUSTOS VARIAVEIS" compare equal.
pub fn fold_label(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_uppercase()
}

/// Accent- and case-insensitive substring test against an already folded needle.
pub fn contains_folded(haystack_folded: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack_folded.contains(needle))
}

/// True when the text has at least one cased character and none of them are lower-case.
pub fn is_upper_text(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// Excel serial date conversion using the 1899-12-30 base.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

/// Reads the month number a header ends with: "JAN/01" or "2024-03" or "Mês 7".
/// A bare trailing two-digit "01".."12" counts too ("M01").
pub fn trailing_month_number(header: &str) -> Option<u32> {
    let trimmed = header.trim();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    let digits = &trimmed[digits_start..];
    let prefix = &trimmed[..digits_start];
    let separated = prefix.is_empty() || prefix.ends_with(['/', '-', ' ', '.', '_']);

    if !(separated || digits.len() == 2) || digits.len() > 2 {
        return None;
    }

    let number: u32 = digits.parse().ok()?;
    (1..=12).contains(&number).then_some(number)
}
