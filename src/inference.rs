use crate::classifier::{is_travel_category, is_travel_item, Classification, Row};
use crate::config::ExtractorConfig;
use crate::schema::Grouping;
use log::debug;

/// What the scan does with the next non-dash row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Zero-valued row: kept in the group without counting toward the sum.
    Skip,
    Stop,
}

/// Running sum of the potential children of one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildScan {
    parent_value: f64,
    sum: f64,
    count: usize,
}

impl ChildScan {
    pub fn new(parent_value: f64) -> Self {
        Self {
            parent_value,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Dash-prefixed rows are children whatever their value.
    pub fn take_definite(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Applies the admission rule to an unmarked row, recording it when accepted.
    pub fn offer(&mut self, value: f64, config: &ExtractorConfig) -> Admission {
        let admission = self.admission(value, config);
        if admission == Admission::Accept {
            self.sum += value;
            self.count += 1;
        }
        admission
    }

    /// The admission rule without recording anything. A parent without a positive
    /// value only takes dash rows, and a negative row always ends the group.
    pub fn admission(&self, value: f64, config: &ExtractorConfig) -> Admission {
        if self.parent_value <= 0.0 || value < 0.0 || self.is_complete(config) {
            return Admission::Stop;
        }

        if self.count >= config.loose_min_children {
            if value > self.parent_value * config.oversized_child_ratio {
                return Admission::Stop;
            }
            if self.sum + value > self.parent_value * config.overflow_ratio {
                return Admission::Stop;
            }
        }

        if value > 0.0 {
            Admission::Accept
        } else {
            Admission::Skip
        }
    }

    /// The children collected so far already account for the parent.
    pub fn is_complete(&self, config: &ExtractorConfig) -> bool {
        self.sum > 0.0
            && (self.parent_value - self.sum).abs() < config.completion_tolerance(self.parent_value)
    }

    /// Final reconciliation verdict, tight tier first.
    pub fn verdict(&self, config: &ExtractorConfig) -> Option<Grouping> {
        if self.count == 0 || self.sum <= 0.0 {
            return None;
        }

        let diff = (self.parent_value - self.sum).abs();
        let ratio = diff / self.parent_value;

        if diff < config.tight_absolute_tolerance || ratio < config.tight_relative_tolerance {
            return Some(Grouping::TightReconciliation);
        }

        if self.count >= config.loose_min_children
            && (diff < config.loose_absolute_tolerance || ratio < config.loose_relative_tolerance)
        {
            return Some(Grouping::LooseReconciliation);
        }

        None
    }
}

pub struct ParentInference<'a> {
    config: &'a ExtractorConfig,
}

impl<'a> ParentInference<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self { config }
    }

    /// Decides whether `rows[pos]` is a parent, and on what grounds. `None` means the
    /// row is a standalone leaf.
    pub fn infer(&self, rows: &[Row], pos: usize) -> Option<Grouping> {
        let candidate = rows.get(pos)?;

        if is_travel_category(&candidate.label) && self.has_travel_children(rows, pos) {
            debug!("'{}' forced to parent by travel keywords", candidate.label);
            return Some(Grouping::TravelKeywords);
        }

        if candidate.annual <= 0.0 {
            return None;
        }

        let mut scan = ChildScan::new(candidate.annual);
        for row in self.window(rows, pos, self.config.lookahead_rows) {
            if row.is_boundary() {
                break;
            }
            if row.is_dash_item() {
                scan.take_definite(row.annual);
                continue;
            }
            if scan.offer(row.annual, self.config) == Admission::Stop {
                break;
            }
        }

        let verdict = scan.verdict(self.config);
        debug!(
            "'{}' ({:.2}): {} potential children summing to {:.2} -> {:?}",
            candidate.label,
            candidate.annual,
            scan.count(),
            scan.sum(),
            verdict
        );
        verdict
    }

    fn has_travel_children(&self, rows: &[Row], pos: usize) -> bool {
        for row in self.window(rows, pos, self.config.travel_lookahead_rows) {
            if row.classification == Classification::Level1Section {
                return false;
            }
            if is_travel_item(&row.label) {
                return true;
            }
        }
        false
    }

    /// Rows after `pos` lying less than `size` sheet rows below it.
    fn window<'r>(&self, rows: &'r [Row], pos: usize, size: usize) -> impl Iterator<Item = &'r Row> {
        let start = rows.get(pos).map(|row| row.index).unwrap_or(0);
        rows.iter()
            .skip(pos + 1)
            .take_while(move |row| row.index - start < size)
    }
}

pub fn infer_parent(rows: &[Row], pos: usize, config: &ExtractorConfig) -> Option<Grouping> {
    ParentInference::new(config).infer(rows, pos)
}

pub fn is_parent(rows: &[Row], pos: usize, config: &ExtractorConfig) -> bool {
    infer_parent(rows, pos, config).is_some()
}
