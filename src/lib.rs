//! # P&L Hierarchy
//!
//! Reconstructs the implicit section / subcategory / item hierarchy of free-form
//! Brazilian P&L spreadsheets.
//!
//! ## Core Concepts
//!
//! - **Sections** (level 1): top-level groups such as `CUSTOS FIXOS`, recognized by name
//!   or by an all-caps label using the P&L vocabulary
//! - **Subcategories** (level 2): rows whose annual value reconciles with the rows below
//!   them, or which are followed by dash-prefixed rows
//! - **Items** (level 3): the rows that make up a subcategory
//! - **Calculations**: summary rows (`RESULTADO`, `MARGEM DE LUCRO`, ...) kept out of the
//!   tree and reported separately
//! - **Years**: each worksheet is mapped to a fiscal year; one sheet is kept per year
//!
//! Nothing inside a sheet is fatal. Unreadable cells read as zero, unusable sheets
//! yield nothing, and ambiguous groups fall back to standalone rows.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_hierarchy::*;
//!
//! let years = extract_from_file("Resultado_2024.xlsx")?;
//! for (year, extraction) in &years {
//!     for item in extraction.leaf_items() {
//!         println!("{} {} / {:?} / {}: {:.2}", year, item.section, item.category, item.name, item.value);
//!     }
//! }
//! ```

pub mod builder;
pub mod classifier;
pub mod columns;
pub mod config;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod normalizer;
pub mod orchestrator;
pub mod report;
pub mod schema;
pub mod sheet;
pub mod utils;

pub use builder::{build_hierarchy, HierarchyBuilder, ScanState, Transition};
pub use classifier::{classify, classify_rows, Classification, Row};
pub use columns::{detect_annual_column, detect_label_column, detect_month_columns, ColumnRoles};
pub use config::ExtractorConfig;
pub use error::{HierarchyError, Result};
pub use inference::{infer_parent, is_parent, ChildScan, ParentInference};
pub use ingestion::{read_csv, read_workbook};
pub use normalizer::{normalize_cell, parse_cell, parse_text};
pub use orchestrator::{merge_extractions, resolve_year, sheet_priority, Orchestrator, SheetPriority};
pub use report::{ExtractionReport, LineItem};
pub use schema::*;
pub use sheet::{Cell, Sheet};

use log::{info, warn};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct HierarchyExtractor {
    config: ExtractorConfig,
}

impl HierarchyExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Builds the hierarchy of one sheet whose year is already known.
    pub fn extract_sheet(&self, sheet: &Sheet, year: i32) -> YearlyExtraction {
        build_hierarchy(sheet, year, &self.config)
    }

    /// Extracts in-memory sheets. `file_name` is consulted when a sheet name carries no
    /// year.
    pub fn extract_workbook(&self, file_name: &str, sheets: &[Sheet]) -> ExtractionMap {
        Orchestrator::new(&self.config).extract_workbook(file_name, sheets)
    }

    pub fn extract_file(&self, path: impl AsRef<Path>) -> Result<ExtractionMap> {
        let path = path.as_ref();
        let sheets = read_workbook(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Extracting {} ({} sheets)", path.display(), sheets.len());
        Ok(self.extract_workbook(&file_name, &sheets))
    }

    /// Extracts several files. A file that cannot be read is logged and skipped; for a
    /// year found in several files the last one wins.
    pub fn extract_files<P: AsRef<Path>>(&self, paths: &[P]) -> ExtractionMap {
        let maps = paths.iter().filter_map(|path| {
            let path = path.as_ref();
            match self.extract_file(path) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        });
        merge_extractions(maps)
    }
}

pub fn extract_from_file(path: impl AsRef<Path>) -> Result<ExtractionMap> {
    HierarchyExtractor::default().extract_file(path)
}

pub fn extract_from_files<P: AsRef<Path>>(paths: &[P]) -> ExtractionMap {
    HierarchyExtractor::default().extract_files(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, annual: f64) -> Vec<Cell> {
        vec![Cell::text(label), Cell::Number(annual)]
    }

    #[test]
    fn test_end_to_end_sheet() {
        let sheet = Sheet::new(
            "2023",
            vec!["Conta".into(), "Total".into()],
            vec![
                row("RECEITAS", 5000.0),
                row("Serviços", 5000.0),
                row("- Consultoria", 3000.0),
                row("- Treinamentos", 2000.0),
                row("RESULTADO", 1200.0),
            ],
        );

        let extraction = HierarchyExtractor::default().extract_sheet(&sheet, 2023);

        let revenue = extraction.section("RECEITAS").unwrap();
        let services = revenue.find_child("Serviços").unwrap();
        assert_eq!(services.children.len(), 2);
        assert_eq!(services.grouping, Some(Grouping::TightReconciliation));
        assert_eq!(extraction.calculations["RESULTADO"].value, 1200.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExtractorConfig {
            overflow_ratio: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            HierarchyExtractor::new(config),
            Err(HierarchyError::InvalidConfig { .. })
        ));
    }
}
