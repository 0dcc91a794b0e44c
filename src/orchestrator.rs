use crate::builder::build_hierarchy;
use crate::config::ExtractorConfig;
use crate::schema::{ExtractionMap, YearlyExtraction};
use crate::sheet::Sheet;
use crate::utils::fold_label;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"20\d{2}").expect("valid year regex"))
}

fn year_range_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"20\d{2}_20\d{2}").expect("valid year range regex"))
}

/// Which sheet wins when several resolve to the same year. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SheetPriority {
    Resultado,
    NumericName,
    Forecast,
    Other,
}

pub fn sheet_priority(sheet_name: &str) -> SheetPriority {
    let folded = fold_label(sheet_name);
    let forecast = folded.contains("PREVISAO");

    if folded.contains("RESULTADO") && !forecast {
        SheetPriority::Resultado
    } else if !sheet_name.trim().is_empty() && sheet_name.trim().chars().all(|c| c.is_ascii_digit()) {
        SheetPriority::NumericName
    } else if forecast {
        SheetPriority::Forecast
    } else {
        SheetPriority::Other
    }
}

/// Resolves the fiscal year of a sheet from its name, falling back to the file name.
///
/// The file-name fallback is disabled for multi-year files (`2023_2024.xlsx`): their
/// sheets must carry the year themselves.
pub fn resolve_year(sheet_name: &str, file_name: &str, config: &ExtractorConfig) -> Option<i32> {
    let in_range = |year: i32| config.year_in_range(year).then_some(year);

    if let Some(year) = first_year(sheet_name).and_then(in_range) {
        return Some(year);
    }

    if let Some(year) = sheet_name.trim().parse::<i32>().ok().and_then(in_range) {
        return Some(year);
    }

    if year_range_pattern().is_match(file_name) {
        return None;
    }
    first_year(file_name).and_then(in_range)
}

fn first_year(text: &str) -> Option<i32> {
    year_pattern()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

pub struct Orchestrator<'a> {
    config: &'a ExtractorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extracts every year found in one workbook. `file_name` is only used for year
    /// resolution.
    pub fn extract_workbook(&self, file_name: &str, sheets: &[Sheet]) -> ExtractionMap {
        let mut by_year: BTreeMap<i32, Vec<&Sheet>> = BTreeMap::new();
        for sheet in sheets {
            match resolve_year(&sheet.name, file_name, self.config) {
                Some(year) => by_year.entry(year).or_default().push(sheet),
                None => warn!(
                    "{}: sheet '{}' has no recognizable year, skipping",
                    file_name, sheet.name
                ),
            }
        }

        let mut result = ExtractionMap::new();
        for (year, mut candidates) in by_year {
            candidates.sort_by_key(|sheet| sheet_priority(&sheet.name));

            match self.first_non_empty(year, &candidates) {
                Some(extraction) => {
                    info!(
                        "{}: year {} extracted from sheet '{}' ({} sections)",
                        file_name,
                        year,
                        extraction.sheet_name,
                        extraction.sections.len()
                    );
                    result.insert(year, extraction);
                }
                None => warn!("{}: no data extracted for year {}", file_name, year),
            }
        }
        result
    }

    fn first_non_empty(&self, year: i32, candidates: &[&Sheet]) -> Option<YearlyExtraction> {
        candidates.iter().find_map(|sheet| {
            let extraction = build_hierarchy(sheet, year, self.config);
            if extraction.is_empty() {
                debug!("Sheet '{}' produced nothing for {}", sheet.name, year);
                None
            } else {
                Some(extraction)
            }
        })
    }
}

/// Merges per-file results; later maps replace earlier ones year by year.
pub fn merge_extractions(maps: impl IntoIterator<Item = ExtractionMap>) -> ExtractionMap {
    let mut merged = ExtractionMap::new();
    for map in maps {
        for (year, extraction) in map {
            if let Some(previous) = merged.insert(year, extraction) {
                info!(
                    "Year {} from sheet '{}' replaced by a later file",
                    year, previous.sheet_name
                );
            }
        }
    }
    merged
}
