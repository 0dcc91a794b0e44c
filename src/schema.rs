use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Portuguese month abbreviations as they appear in P&L headers, in calendar order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonthCode {
    Jan,
    Fev,
    Mar,
    Abr,
    Mai,
    Jun,
    Jul,
    Ago,
    Set,
    Out,
    Nov,
    Dez,
}

impl MonthCode {
    pub const ALL: [MonthCode; 12] = [
        MonthCode::Jan,
        MonthCode::Fev,
        MonthCode::Mar,
        MonthCode::Abr,
        MonthCode::Mai,
        MonthCode::Jun,
        MonthCode::Jul,
        MonthCode::Ago,
        MonthCode::Set,
        MonthCode::Out,
        MonthCode::Nov,
        MonthCode::Dez,
    ];

    pub fn abbreviation(self) -> &'static str {
        match self {
            MonthCode::Jan => "JAN",
            MonthCode::Fev => "FEV",
            MonthCode::Mar => "MAR",
            MonthCode::Abr => "ABR",
            MonthCode::Mai => "MAI",
            MonthCode::Jun => "JUN",
            MonthCode::Jul => "JUL",
            MonthCode::Ago => "AGO",
            MonthCode::Set => "SET",
            MonthCode::Out => "OUT",
            MonthCode::Nov => "NOV",
            MonthCode::Dez => "DEZ",
        }
    }

    /// 1-based calendar month number.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn from_number(number: u32) -> Option<MonthCode> {
        match number {
            1..=12 => Some(Self::ALL[(number - 1) as usize]),
            _ => None,
        }
    }
}

impl fmt::Display for MonthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Monthly figures keyed by month. Months with a zero value are not stored.
pub type MonthlyValues = BTreeMap<MonthCode, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[schemars(description = "Top-level section such as CUSTOS FIXOS (level 1)")]
    Section,

    #[schemars(description = "Subcategory inside a section such as Infraestrutura (level 2)")]
    Subcategory,

    #[schemars(description = "Line item inside a subcategory, often dash-prefixed (level 3)")]
    Item,
}

impl Level {
    pub fn depth(self) -> u8 {
        match self {
            Level::Section => 1,
            Level::Subcategory => 2,
            Level::Item => 3,
        }
    }
}

/// How a level-2 node came to own children.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    #[schemars(description = "Travel category followed by travel-related rows; sums were not checked")]
    TravelKeywords,

    #[schemars(description = "Value matched the sum of following rows within the tight tolerance")]
    TightReconciliation,

    #[schemars(description = "Value matched the sum of two or more following rows within the loose tolerance")]
    LooseReconciliation,

    #[schemars(description = "Childless subcategory re-opened by dash-prefixed rows that followed it")]
    DashMarkers,

    #[schemars(description = "Synthesized holder for dash-prefixed rows with no subcategory to attach to")]
    Implicit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HierarchyNode {
    #[schemars(description = "Row label with any leading dash marker removed")]
    pub name: String,

    pub level: Level,

    #[schemars(
        description = "Annual total of the row. Sections without a value of their own and implicit subcategories carry the sum of their children."
    )]
    pub value: f64,

    #[serde(default)]
    pub monthly: MonthlyValues,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<Grouping>,

    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn new(name: impl Into<String>, level: Level, value: f64, monthly: MonthlyValues) -> Self {
        Self {
            name: name.into(),
            level,
            value,
            monthly,
            grouping: None,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children_sum(&self) -> f64 {
        self.children.iter().map(|c| c.value).sum()
    }

    pub fn find_child(&self, name: &str) -> Option<&HierarchyNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A derived/summary row (RESULTADO, MARGEM DE LUCRO, ...) kept out of the tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CalculationEntry {
    pub value: f64,
    #[serde(default)]
    pub monthly: MonthlyValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MonthlyTotals {
    #[schemars(
        description = "Sum over every node of every section for this month. Sections, subcategories and items are all included."
    )]
    pub total: f64,
    pub by_section: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct YearlyExtraction {
    pub year: i32,

    #[schemars(description = "The worksheet this extraction was built from")]
    pub sheet_name: String,

    pub sections: Vec<HierarchyNode>,

    #[serde(default)]
    pub calculations: BTreeMap<String, CalculationEntry>,

    #[serde(default)]
    pub monthly_aggregate: BTreeMap<MonthCode, MonthlyTotals>,
}

impl YearlyExtraction {
    pub fn empty(year: i32, sheet_name: impl Into<String>) -> Self {
        Self {
            year,
            sheet_name: sheet_name.into(),
            sections: Vec::new(),
            calculations: BTreeMap::new(),
            monthly_aggregate: BTreeMap::new(),
        }
    }

    /// True when the sheet produced neither a section nor a calculation row.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.calculations.is_empty()
    }

    pub fn section(&self, name: &str) -> Option<&HierarchyNode> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(YearlyExtraction)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Extractions keyed by fiscal year.
pub type ExtractionMap = BTreeMap<i32, YearlyExtraction>;
