use crate::classifier::{classify_rows, is_travel_item, Classification, Row};
use crate::columns::ColumnRoles;
use crate::config::ExtractorConfig;
use crate::inference::{Admission, ChildScan, ParentInference};
use crate::schema::{
    CalculationEntry, Grouping, HierarchyNode, Level, MonthCode, MonthlyTotals, YearlyExtraction,
};
use crate::sheet::Sheet;
use log::{debug, warn};
use std::collections::BTreeMap;

/// A subcategory that is still collecting children.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenParent {
    /// Sheet row index of the parent, used to bound the child window.
    pub row_index: usize,
    pub travel: bool,
    pub scan: ChildScan,
}

/// Cursor into the tree being built. `section` and `subcategory` index into the
/// builder's section list and the current section's children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanState {
    pub section: Option<usize>,
    pub subcategory: Option<usize>,
    pub expecting: Option<OpenParent>,
    /// Sheet row of the section's last level-2 node, where a re-opened group starts.
    pub last_subcategory_row: Option<usize>,
}

impl ScanState {
    pub fn is_expecting_children(&self) -> bool {
        self.expecting.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    RecordCalculation,
    OpenSection,
    /// Dash row attached to the open subcategory.
    AttachItem(String),
    /// Dash row that re-opens the section's last, still childless, subcategory.
    ReopenAndAttach(String),
    /// Dash row with nowhere to go: a miscellaneous subcategory is created for it.
    AttachToImplicit(String),
    /// Unmarked row accepted as a child of the open parent.
    AttachChild,
    /// The open parent is done; the same row is then handled again.
    CloseAndReprocess,
    OpenSubcategory(Grouping),
    AppendLeaf,
    /// Rows before the first section have no place in the tree.
    Ignore,
}

pub struct HierarchyBuilder<'a> {
    config: &'a ExtractorConfig,
    state: ScanState,
    sections: Vec<HierarchyNode>,
    calculations: BTreeMap<String, CalculationEntry>,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self {
            config,
            state: ScanState::default(),
            sections: Vec::new(),
            calculations: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Builds the extraction for a full row stream.
    pub fn build(rows: &[Row], config: &ExtractorConfig, year: i32, sheet_name: &str) -> YearlyExtraction {
        let builder = (0..rows.len()).fold(HierarchyBuilder::new(config), |builder, pos| {
            builder.step(rows, pos)
        });
        builder.finish(year, sheet_name)
    }

    /// Consumes one row, re-dispatching it after a parent closes.
    pub fn step(mut self, rows: &[Row], pos: usize) -> Self {
        let Some(row) = rows.get(pos) else {
            return self;
        };

        let mut transition = self.transition(rows, pos);
        if transition == Transition::CloseAndReprocess {
            self.apply(transition, row);
            transition = self.transition(rows, pos);
        }
        self.apply(transition, row);
        self
    }

    /// Chooses what to do with `rows[pos]` given the current state.
    pub fn transition(&self, rows: &[Row], pos: usize) -> Transition {
        let Some(row) = rows.get(pos) else {
            return Transition::Ignore;
        };

        match &row.classification {
            Classification::Calculation => Transition::RecordCalculation,
            Classification::Level1Section => Transition::OpenSection,
            Classification::ExplicitLevel3(name) => self.dash_transition(name),
            Classification::Candidate => {
                if self.state.section.is_none() {
                    return Transition::Ignore;
                }
                if let Some(open) = &self.state.expecting {
                    return self.child_transition(open, row);
                }
                match ParentInference::new(self.config).infer(rows, pos) {
                    Some(grouping) => Transition::OpenSubcategory(grouping),
                    None => Transition::AppendLeaf,
                }
            }
        }
    }

    fn dash_transition(&self, name: &str) -> Transition {
        let Some(section) = self.state.section.and_then(|i| self.sections.get(i)) else {
            return Transition::Ignore;
        };

        if self.state.subcategory.is_some() {
            return Transition::AttachItem(name.to_string());
        }

        match section.children.last() {
            Some(last) if last.level == Level::Subcategory && last.is_leaf() => {
                Transition::ReopenAndAttach(name.to_string())
            }
            _ => Transition::AttachToImplicit(name.to_string()),
        }
    }

    fn child_transition(&self, open: &OpenParent, row: &Row) -> Transition {
        if open.travel {
            return if is_travel_item(&row.label) {
                Transition::AttachChild
            } else {
                Transition::CloseAndReprocess
            };
        }

        if row.index - open.row_index >= self.config.lookahead_rows {
            return Transition::CloseAndReprocess;
        }

        match open.scan.admission(row.annual, self.config) {
            Admission::Stop => Transition::CloseAndReprocess,
            Admission::Accept | Admission::Skip => Transition::AttachChild,
        }
    }

    fn apply(&mut self, transition: Transition, row: &Row) {
        match transition {
            Transition::RecordCalculation => {
                self.calculations.insert(
                    row.label.clone(),
                    CalculationEntry {
                        value: row.annual,
                        monthly: row.monthly.clone(),
                    },
                );
                self.state.expecting = None;
            }
            Transition::OpenSection => {
                self.sections.push(node_for(row, &row.label, Level::Section));
                self.state = ScanState {
                    section: Some(self.sections.len() - 1),
                    ..ScanState::default()
                };
            }
            Transition::AttachItem(name) => {
                if let Some(open) = self.state.expecting.as_mut() {
                    open.scan.take_definite(row.annual);
                }
                self.push_item(node_for(row, &name, Level::Item));
            }
            Transition::ReopenAndAttach(name) => {
                let reopened = self.current_section_mut().and_then(|section| {
                    let index = section.children.len().checked_sub(1)?;
                    let node = section.children.get_mut(index)?;
                    if node.grouping.is_none() {
                        node.grouping = Some(Grouping::DashMarkers);
                    }
                    Some((index, node.value))
                });
                if let Some((index, value)) = reopened {
                    debug!("Subcategory {} re-opened by dash row '{}'", index, name);
                    let mut scan = ChildScan::new(value);
                    scan.take_definite(row.annual);
                    self.state.subcategory = Some(index);
                    self.state.expecting = Some(OpenParent {
                        row_index: self.state.last_subcategory_row.unwrap_or(row.index),
                        travel: false,
                        scan,
                    });
                    self.push_item(node_for(row, &name, Level::Item));
                }
            }
            Transition::AttachToImplicit(name) => {
                let mut implicit = HierarchyNode::new(
                    self.config.implicit_subcategory_name.clone(),
                    Level::Subcategory,
                    0.0,
                    Default::default(),
                );
                implicit.grouping = Some(Grouping::Implicit);
                if let Some(index) = self.push_subcategory(implicit) {
                    self.state.subcategory = Some(index);
                    self.state.expecting = None;
                    self.state.last_subcategory_row = None;
                    self.push_item(node_for(row, &name, Level::Item));
                }
            }
            Transition::AttachChild => {
                if let Some(open) = self.state.expecting.as_mut() {
                    open.scan.offer(row.annual, self.config);
                }
                self.push_item(node_for(row, &row.label, Level::Item));
            }
            Transition::CloseAndReprocess => {
                self.state.subcategory = None;
                self.state.expecting = None;
            }
            Transition::OpenSubcategory(grouping) => {
                let mut node = node_for(row, &row.label, Level::Subcategory);
                node.grouping = Some(grouping);
                if let Some(index) = self.push_subcategory(node) {
                    self.state.subcategory = Some(index);
                    self.state.last_subcategory_row = Some(row.index);
                    self.state.expecting = Some(OpenParent {
                        row_index: row.index,
                        travel: grouping == Grouping::TravelKeywords,
                        scan: ChildScan::new(row.annual),
                    });
                }
            }
            Transition::AppendLeaf => {
                self.push_subcategory(node_for(row, &row.label, Level::Subcategory));
                self.state.subcategory = None;
                self.state.expecting = None;
                self.state.last_subcategory_row = Some(row.index);
            }
            Transition::Ignore => {
                debug!("Row '{}' ignored: no open section", row.label);
            }
        }
    }

    fn current_section_mut(&mut self) -> Option<&mut HierarchyNode> {
        self.state.section.and_then(|i| self.sections.get_mut(i))
    }

    /// Appends to the current section, returning the new node's position.
    fn push_subcategory(&mut self, node: HierarchyNode) -> Option<usize> {
        let section = self.current_section_mut()?;
        section.children.push(node);
        Some(section.children.len() - 1)
    }

    fn push_item(&mut self, item: HierarchyNode) {
        let Some(sub) = self.state.subcategory else {
            return;
        };
        if let Some(parent) = self
            .current_section_mut()
            .and_then(|section| section.children.get_mut(sub))
        {
            parent.children.push(item);
        }
    }

    /// Runs the post-pass and produces the immutable extraction.
    pub fn finish(mut self, year: i32, sheet_name: &str) -> YearlyExtraction {
        for section in &mut self.sections {
            for sub in &mut section.children {
                if sub.grouping == Some(Grouping::Implicit) {
                    sub.value = sub.children_sum();
                }
            }
            if section.value == 0.0 && !section.children.is_empty() {
                section.value = section.children_sum();
            }
        }

        let monthly_aggregate = aggregate_monthly(&self.sections);
        YearlyExtraction {
            year,
            sheet_name: sheet_name.to_string(),
            sections: self.sections,
            calculations: self.calculations,
            monthly_aggregate,
        }
    }
}

fn node_for(row: &Row, name: &str, level: Level) -> HierarchyNode {
    HierarchyNode::new(name, level, row.annual, row.monthly.clone())
}

/// Per-month totals over every node of every section. Section figures include
/// subcategories and items, so a section that repeats its children's totals is
/// counted more than once.
pub fn aggregate_monthly(sections: &[HierarchyNode]) -> BTreeMap<MonthCode, MonthlyTotals> {
    MonthCode::ALL
        .iter()
        .map(|&month| {
            let mut totals = MonthlyTotals::default();
            for section in sections {
                let section_total = month_sum(section, month);
                if section_total > 0.0 {
                    *totals.by_section.entry(section.name.clone()).or_insert(0.0) += section_total;
                    totals.total += section_total;
                }
            }
            (month, totals)
        })
        .collect()
}

fn month_sum(node: &HierarchyNode, month: MonthCode) -> f64 {
    node.monthly.get(&month).copied().unwrap_or(0.0)
        + node.children.iter().map(|c| month_sum(c, month)).sum::<f64>()
}

/// Detects column roles, classifies rows and builds the tree for one sheet. A sheet
/// without a label column yields an empty extraction.
pub fn build_hierarchy(sheet: &Sheet, year: i32, config: &ExtractorConfig) -> YearlyExtraction {
    let Some(roles) = ColumnRoles::detect(sheet, config.label_probe_rows) else {
        warn!("Sheet '{}': no label column found, skipping", sheet.name);
        return YearlyExtraction::empty(year, sheet.name.clone());
    };

    let rows = classify_rows(sheet, &roles);
    let extraction = HierarchyBuilder::build(&rows, config, year, &sheet.name);

    debug!(
        "Sheet '{}' ({}): {} rows, {} sections, {} calculations",
        sheet.name,
        year,
        rows.len(),
        extraction.sections.len(),
        extraction.calculations.len()
    );
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MonthlyValues;

    fn labelled(entries: &[(&str, f64)]) -> Vec<Row> {
        entries.iter()
            .enumerate()
            .map(|(i, (label, value))| Row::new(i, *label, *value, MonthlyValues::new()))
            .collect()
    }

    fn build(rows: &[Row]) -> YearlyExtraction {
        HierarchyBuilder::build(rows, &ExtractorConfig::default(), 2024, "2024")
    }

    #[test]
    fn test_parent_collects_children_then_sibling() {
        let rows = labelled(&[
            ("CUSTOS FIXOS", 100000.0),
            ("Infraestrutura", 3000.0),
            ("Aluguel", 2000.0),
            ("Energia", 1000.0),
            ("Marketing", 5000.0),
        ]);
        let extraction = build(&rows);

        let section = &extraction.sections[0];
        assert_eq!(section.children.len(), 2);
        let infra = &section.children[0];
        assert_eq!(infra.children.len(), 2);
        assert_eq!(infra.grouping, Some(Grouping::TightReconciliation));
        assert_eq!(section.children[1].name, "Marketing");
        assert!(section.children[1].is_leaf());
    }

    #[test]
    fn test_dash_row_reopens_standalone_subcategory() {
        // Funcionários does not reconcile with its dash rows, but they still belong to it.
        let rows = labelled(&[
            ("DESPESAS OPERACIONAIS", 0.0),
            ("Funcionários", 9000.0),
            ("- Salário", 1000.0),
            ("- Férias", 500.0),
        ]);
        let extraction = build(&rows);

        let section = &extraction.sections[0];
        assert_eq!(section.children.len(), 1);
        let staff = &section.children[0];
        assert_eq!(staff.grouping, Some(Grouping::DashMarkers));
        assert_eq!(staff.children.len(), 2);
        assert_eq!(staff.children[0].name, "Salário");
        assert_eq!(section.value, 9000.0);
    }

    #[test]
    fn test_zero_valued_reopened_parent_takes_only_dash_rows() {
        let rows = labelled(&[
            ("DESPESAS OPERACIONAIS", 0.0),
            ("Funcionários", 0.0),
            ("- Salário", 500.0),
            ("Aluguel", 3000.0),
        ]);
        let extraction = build(&rows);

        let section = &extraction.sections[0];
        assert_eq!(section.children.len(), 2);
        assert_eq!(section.children[0].children.len(), 1);
        assert_eq!(section.children[1].name, "Aluguel");
        assert!(section.children[1].is_leaf());
    }

    #[test]
    fn test_reopened_group_window_starts_at_parent() {
        let config = ExtractorConfig {
            lookahead_rows: 5,
            ..Default::default()
        };
        let mut rows = labelled(&[
            ("DESPESAS OPERACIONAIS", 0.0),
            ("Funcionários", 1000.0),
            ("- Salário", 600.0),
            ("Encargos", 400.0),
        ]);
        rows[2].index = 4;
        rows[3].index = 6;
        let extraction = HierarchyBuilder::build(&rows, &config, 2024, "2024");

        let section = &extraction.sections[0];
        assert_eq!(section.children.len(), 2);
        assert_eq!(section.children[0].grouping, Some(Grouping::DashMarkers));
        assert_eq!(section.children[0].children.len(), 1);
        assert_eq!(section.children[1].name, "Encargos");
    }

    #[test]
    fn test_orphan_dash_rows_get_implicit_subcategory() {
        let rows = labelled(&[
            ("CUSTOS VARIÁVEIS", 0.0),
            ("- Comissões", 300.0),
            ("- Fretes", 200.0),
        ]);
        let extraction = build(&rows);

        let outros = &extraction.sections[0].children[0];
        assert_eq!(outros.name, "Outros");
        assert_eq!(outros.grouping, Some(Grouping::Implicit));
        assert_eq!(outros.value, 500.0);
        assert_eq!(outros.children.len(), 2);
        assert_eq!(extraction.sections[0].value, 500.0);
    }

    #[test]
    fn test_calculation_rows_are_kept_aside() {
        let rows = labelled(&[
            ("FATURAMENTO", 1000.0),
            ("Vendas", 1000.0),
            ("MARGEM DE LUCRO", 250.0),
        ]);
        let extraction = build(&rows);

        assert_eq!(extraction.calculations["MARGEM DE LUCRO"].value, 250.0);
        assert!(extraction.sections.iter().all(|s| s.find_child("MARGEM DE LUCRO").is_none()));
    }

    #[test]
    fn test_calculation_resets_expectation_only() {
        let config = ExtractorConfig::default();
        let rows = labelled(&[
            ("CUSTOS FIXOS", 0.0),
            ("Impostos", 300.0),
            ("ISS", 300.0),
            ("SALDO", 0.0),
            ("- PIS", 200.0),
        ]);
        let builder = (0..4).fold(HierarchyBuilder::new(&config), |b, pos| b.step(&rows, pos));

        assert!(!builder.state().is_expecting_children());
        assert_eq!(builder.state().subcategory, Some(0));
        assert_eq!(
            builder.transition(&rows, 4),
            Transition::AttachItem("PIS".to_string())
        );
    }

    #[test]
    fn test_rows_before_first_section_are_ignored() {
        let rows = labelled(&[("Empresa XYZ", 0.0), ("- nota", 10.0), ("RECEITAS", 10.0)]);
        let extraction = build(&rows);

        assert_eq!(extraction.sections.len(), 1);
        assert!(extraction.sections[0].is_leaf());
    }

    #[test]
    fn test_travel_parent_keeps_only_travel_rows() {
        let rows = labelled(&[
            ("DESPESAS OPERACIONAIS", 0.0),
            ("Viagens e Deslocamentos", 90000.0),
            ("Combustível", 1000.0),
            ("Hotel", 2000.0),
            ("Material de escritório", 400.0),
        ]);
        let extraction = build(&rows);

        let section = &extraction.sections[0];
        let travel = &section.children[0];
        assert_eq!(travel.grouping, Some(Grouping::TravelKeywords));
        assert_eq!(travel.children.len(), 2);
        assert_eq!(section.children[1].name, "Material de escritório");
    }

    #[test]
    fn test_monthly_aggregate_sums_every_level() {
        let month = |v: f64| MonthlyValues::from([(MonthCode::Jan, v)]);
        let rows = vec![
            Row::new(0, "RECEITAS", 0.0, MonthlyValues::new()),
            Row::new(1, "Serviços", 30.0, month(30.0)),
            Row::new(2, "- Consultoria", 30.0, month(30.0)),
        ];
        let extraction = build(&rows);

        let jan = &extraction.monthly_aggregate[&MonthCode::Jan];
        assert_eq!(jan.total, 60.0);
        assert_eq!(jan.by_section["RECEITAS"], 60.0);
        assert_eq!(extraction.monthly_aggregate.len(), 12);
        assert!(extraction.monthly_aggregate[&MonthCode::Fev].by_section.is_empty());
    }
}
