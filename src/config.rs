use crate::error::{HierarchyError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TIGHT_ABSOLUTE_TOLERANCE: f64 = 100.0;
pub const DEFAULT_TIGHT_RELATIVE_TOLERANCE: f64 = 0.02;
pub const DEFAULT_LOOSE_ABSOLUTE_TOLERANCE: f64 = 500.0;
pub const DEFAULT_LOOSE_RELATIVE_TOLERANCE: f64 = 0.10;
pub const DEFAULT_LOOSE_MIN_CHILDREN: usize = 2;
pub const DEFAULT_COMPLETION_RELATIVE_TOLERANCE: f64 = 0.05;
pub const DEFAULT_OVERSIZED_CHILD_RATIO: f64 = 0.9;
pub const DEFAULT_OVERFLOW_RATIO: f64 = 1.1;
pub const DEFAULT_LOOKAHEAD_ROWS: usize = 20;
pub const DEFAULT_TRAVEL_LOOKAHEAD_ROWS: usize = 10;
pub const DEFAULT_LABEL_PROBE_ROWS: usize = 10;
pub const DEFAULT_MIN_YEAR: i32 = 2018;
pub const DEFAULT_MAX_YEAR: i32 = 2030;
pub const DEFAULT_IMPLICIT_SUBCATEGORY: &str = "Outros";

/// Tuning knobs for the hierarchy heuristics.
///
/// The defaults were tuned against one family of spreadsheets; other layouts may need
/// different tolerances. Every field is optional when loading from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractorConfig {
    #[schemars(description = "A parent is confirmed when |value - children| is below this amount")]
    pub tight_absolute_tolerance: f64,

    #[schemars(description = "...or below this fraction of the parent value")]
    pub tight_relative_tolerance: f64,

    #[schemars(description = "Absolute tolerance for groups of several unmarked children")]
    pub loose_absolute_tolerance: f64,

    #[schemars(description = "Relative tolerance for groups of several unmarked children")]
    pub loose_relative_tolerance: f64,

    #[schemars(description = "Children required before the loose tier applies")]
    pub loose_min_children: usize,

    #[schemars(
        description = "While scanning, stop collecting children once the running sum is within this fraction of the parent (or the tight absolute tolerance)"
    )]
    pub completion_relative_tolerance: f64,

    #[schemars(description = "A row larger than this fraction of the parent cannot be one of its children")]
    pub oversized_child_ratio: f64,

    #[schemars(description = "Stop collecting when the running sum would exceed the parent by this factor")]
    pub overflow_ratio: f64,

    #[schemars(description = "How far below a candidate (in sheet rows) children are searched for")]
    pub lookahead_rows: usize,

    #[schemars(description = "How far below a travel category travel-related rows are searched for")]
    pub travel_lookahead_rows: usize,

    #[schemars(description = "Data rows inspected when looking for the label column")]
    pub label_probe_rows: usize,

    pub min_year: i32,
    pub max_year: i32,

    #[schemars(description = "Name given to the subcategory synthesized for orphan dash items")]
    pub implicit_subcategory_name: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tight_absolute_tolerance: DEFAULT_TIGHT_ABSOLUTE_TOLERANCE,
            tight_relative_tolerance: DEFAULT_TIGHT_RELATIVE_TOLERANCE,
            loose_absolute_tolerance: DEFAULT_LOOSE_ABSOLUTE_TOLERANCE,
            loose_relative_tolerance: DEFAULT_LOOSE_RELATIVE_TOLERANCE,
            loose_min_children: DEFAULT_LOOSE_MIN_CHILDREN,
            completion_relative_tolerance: DEFAULT_COMPLETION_RELATIVE_TOLERANCE,
            oversized_child_ratio: DEFAULT_OVERSIZED_CHILD_RATIO,
            overflow_ratio: DEFAULT_OVERFLOW_RATIO,
            lookahead_rows: DEFAULT_LOOKAHEAD_ROWS,
            travel_lookahead_rows: DEFAULT_TRAVEL_LOOKAHEAD_ROWS,
            label_probe_rows: DEFAULT_LABEL_PROBE_ROWS,
            min_year: DEFAULT_MIN_YEAR,
            max_year: DEFAULT_MAX_YEAR,
            implicit_subcategory_name: DEFAULT_IMPLICIT_SUBCATEGORY.to_string(),
        }
    }
}

impl ExtractorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(ExtractorConfig);
        serde_json::to_string_pretty(&schema)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("tight_absolute_tolerance", self.tight_absolute_tolerance),
            ("tight_relative_tolerance", self.tight_relative_tolerance),
            ("loose_absolute_tolerance", self.loose_absolute_tolerance),
            ("loose_relative_tolerance", self.loose_relative_tolerance),
            (
                "completion_relative_tolerance",
                self.completion_relative_tolerance,
            ),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("must be a non-negative number, got {}", value)));
            }
        }

        if self.loose_absolute_tolerance < self.tight_absolute_tolerance
            || self.loose_relative_tolerance < self.tight_relative_tolerance
        {
            return Err(invalid(
                "loose_relative_tolerance",
                "the loose tier must not be stricter than the tight tier".to_string(),
            ));
        }

        if !(self.oversized_child_ratio > 0.0 && self.oversized_child_ratio <= 1.0) {
            return Err(invalid(
                "oversized_child_ratio",
                format!("must be in (0, 1], got {}", self.oversized_child_ratio),
            ));
        }

        if !(self.overflow_ratio.is_finite() && self.overflow_ratio >= 1.0) {
            return Err(invalid(
                "overflow_ratio",
                format!("must be at least 1.0, got {}", self.overflow_ratio),
            ));
        }

        for (field, value) in [
            ("lookahead_rows", self.lookahead_rows),
            ("travel_lookahead_rows", self.travel_lookahead_rows),
            ("label_probe_rows", self.label_probe_rows),
            ("loose_min_children", self.loose_min_children),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero".to_string()));
            }
        }

        if self.min_year > self.max_year {
            return Err(invalid(
                "min_year",
                format!(
                    "year range {}..={} is empty",
                    self.min_year, self.max_year
                ),
            ));
        }

        if self.implicit_subcategory_name.trim().is_empty() {
            return Err(invalid(
                "implicit_subcategory_name",
                "must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }

    /// Tolerance used to decide that a running sum already accounts for the parent.
    pub fn completion_tolerance(&self, parent_value: f64) -> f64 {
        self.tight_absolute_tolerance
            .max(parent_value * self.completion_relative_tolerance)
    }
}

fn invalid(field: &str, details: String) -> HierarchyError {
    HierarchyError::InvalidConfig {
        field: field.to_string(),
        details,
    }
}
