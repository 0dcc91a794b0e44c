use crate::error::Result;
use crate::schema::{ExtractionMap, HierarchyNode, Level, MonthCode, MonthlyValues, YearlyExtraction};
use serde::{Deserialize, Serialize};

/// One node of the tree with its provenance spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub year: i32,
    pub section: String,
    /// The level-2 node the row belongs to (its own name for level-2 rows). `None`
    /// for sections.
    pub category: Option<String>,
    pub name: String,
    pub level: Level,
    pub value: f64,
    pub monthly: MonthlyValues,
    pub is_leaf: bool,
}

impl YearlyExtraction {
    /// Every node in depth-first order, sections first.
    pub fn line_items(&self) -> Vec<LineItem> {
        let mut items = Vec::new();
        for section in &self.sections {
            items.push(self.line_item(section, section, None));
            for sub in &section.children {
                items.push(self.line_item(section, sub, Some(&sub.name)));
                for item in &sub.children {
                    items.push(self.line_item(section, item, Some(&sub.name)));
                }
            }
        }
        items
    }

    /// Only the leaves, so figures can be summed without counting a parent and its
    /// children twice.
    pub fn leaf_items(&self) -> Vec<LineItem> {
        self.line_items()
            .into_iter()
            .filter(|item| item.is_leaf)
            .collect()
    }

    fn line_item(&self, section: &HierarchyNode, node: &HierarchyNode, category: Option<&str>) -> LineItem {
        LineItem {
            year: self.year,
            section: section.name.clone(),
            category: category.map(str::to_string),
            name: node.name.clone(),
            level: node.level,
            value: node.value,
            monthly: node.monthly.clone(),
            is_leaf: node.is_leaf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub extractions: Vec<YearlyExtraction>,
}

impl ExtractionReport {
    pub fn new(extractions: &ExtractionMap) -> Self {
        Self {
            extractions: extractions.values().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.extractions)?)
    }

    /// One record per node, with the twelve months as columns.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["Year", "Section", "Category", "Name", "Level", "Value"];
        header.extend(MonthCode::ALL.iter().map(|m| m.abbreviation()));
        header.push("Is Leaf");
        writer.write_record(&header)?;

        for extraction in &self.extractions {
            for item in extraction.line_items() {
                let mut record = vec![
                    item.year.to_string(),
                    item.section.clone(),
                    item.category.clone().unwrap_or_default(),
                    item.name.clone(),
                    item.level.depth().to_string(),
                    format!("{:.2}", item.value),
                ];
                record.extend(MonthCode::ALL.iter().map(|m| {
                    item.monthly
                        .get(m)
                        .map(|v| format!("{:.2}", v))
                        .unwrap_or_default()
                }));
                record.push(item.is_leaf.to_string());
                writer.write_record(&record)?;
            }
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("# P&L Hierarchy\n\n");

        for extraction in &self.extractions {
            output.push_str(&format!(
                "## {} (sheet: {})\n\n",
                extraction.year, extraction.sheet_name
            ));

            for section in &extraction.sections {
                output.push_str(&format!("- **{}**: {:.2}\n", section.name, section.value));
                for sub in &section.children {
                    output.push_str(&format!("  - {}: {:.2}\n", sub.name, sub.value));
                    for item in &sub.children {
                        output.push_str(&format!("    - {}: {:.2}\n", item.name, item.value));
                    }
                }
            }

            if !extraction.calculations.is_empty() {
                output.push_str("\n| Calculation | Value |\n|---|---:|\n");
                for (label, entry) in &extraction.calculations {
                    output.push_str(&format!("| {} | {:.2} |\n", label, entry.value));
                }
            }
            output.push('\n');
        }

        output
    }
}
