use crate::columns::ColumnRoles;
use crate::normalizer::parse_cell;
use crate::schema::MonthlyValues;
use crate::sheet::Sheet;
use crate::utils::{contains_folded, fold_label, is_upper_text};

/// Summary rows kept out of the tree. Matched as folded substrings, so accents and
/// case do not matter.
pub const CALCULATION_TERMS: [&str; 13] = [
    "RESULTADO",
    "MARGEM DE CONTRIBUICAO",
    "MARGEM DE LUCRO",
    "PONTO EQUILIBRIO",
    "PONTO DE EQUILIBRIO",
    "TOTAL DESPESAS",
    "DESPESAS TOTAL",
    "DESPESAS - TOTAL",
    "TOTAL GERAL",
    "APLICACOES",
    "RETIRADA EXCEDENTE",
    "SALDO",
    "LUCRO LIQUIDO",
];

pub const KNOWN_SECTIONS: [&str; 8] = [
    "FATURAMENTO",
    "RECEITAS",
    "CUSTOS FIXOS",
    "CUSTOS VARIAVEIS",
    "CUSTOS NAO OPERACIONAIS",
    "DESPESAS ADMINISTRATIVAS",
    "DESPESAS OPERACIONAIS",
    "DESPESAS FINANCEIRAS",
];

/// An all-caps label only counts as a section when it uses one of these words.
pub const SECTION_VOCABULARY: [&str; 4] = ["CUSTOS", "DESPESAS", "RECEITA", "FATURAMENTO"];

pub const TRAVEL_CATEGORY_TERMS: [&str; 2] = ["VIAGENS", "DESLOCAMENTO"];

pub const TRAVEL_KEYWORDS: [&str; 9] = [
    "ALIMENTA",
    "COMBUST",
    "HOTEL",
    "ESTACION",
    "PEDAGIO",
    "ALUGUEL",
    "TAXI",
    "PASSAGEN",
    "REEMBOLSO",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Level1Section,
    Calculation,
    /// Dash-prefixed item; carries the name with the marker removed.
    ExplicitLevel3(String),
    Candidate,
}

/// A labelled sheet row with its figures read and its label classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position among the sheet's data rows. Rows without a label are dropped, so
    /// indices may skip; look-ahead windows are measured with this index.
    pub index: usize,
    pub label: String,
    pub monthly: MonthlyValues,
    /// The annual column's value, or the sum of `monthly` when the sheet has none.
    pub annual: f64,
    pub classification: Classification,
}

impl Row {
    pub fn new(index: usize, label: impl Into<String>, annual: f64, monthly: MonthlyValues) -> Self {
        let label = label.into();
        let classification = classify(&label);
        Self {
            index,
            label,
            monthly,
            annual,
            classification,
        }
    }

    pub fn is_dash_item(&self) -> bool {
        matches!(self.classification, Classification::ExplicitLevel3(_))
    }

    /// Section or calculation rows end any group above them.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self.classification,
            Classification::Level1Section | Classification::Calculation
        )
    }
}

/// Reads every labelled data row of `sheet`. Rows whose label cell is blank or not
/// text are skipped.
pub fn classify_rows(sheet: &Sheet, roles: &ColumnRoles) -> Vec<Row> {
    (0..sheet.row_count())
        .filter_map(|index| {
            let label = sheet.cell(index, roles.label).as_label()?;

            let monthly: MonthlyValues = roles
                .months
                .iter()
                .map(|(month, &col)| (*month, parse_cell(sheet.cell(index, col))))
                .filter(|(_, value)| *value != 0.0)
                .collect();

            let annual = match roles.annual {
                Some(col) => parse_cell(sheet.cell(index, col)),
                None => monthly.values().sum(),
            };

            Some(Row::new(index, label, annual, monthly))
        })
        .collect()
}

/// Calculation rows are checked before sections, since summary rows are often in capitals.
pub fn classify(label: &str) -> Classification {
    let label = label.trim();
    if is_calculation(label) {
        Classification::Calculation
    } else if is_level1(label) {
        Classification::Level1Section
    } else if let Some(name) = strip_dash_marker(label) {
        Classification::ExplicitLevel3(name.to_string())
    } else {
        Classification::Candidate
    }
}

pub fn is_calculation(label: &str) -> bool {
    contains_folded(&fold_label(label), &CALCULATION_TERMS)
}

pub fn is_level1(label: &str) -> bool {
    let folded = fold_label(label);
    if contains_folded(&folded, &KNOWN_SECTIONS) {
        return true;
    }

    is_upper_text(label)
        && label.chars().count() > 3
        && !is_calculation(label)
        && contains_folded(&folded, &SECTION_VOCABULARY)
}

/// Removes a leading dash marker ("- Salário", "- - Férias", "-13º").
/// Returns `None` when the label carries no marker.
pub fn strip_dash_marker(label: &str) -> Option<&str> {
    let trimmed = label.trim();
    if !trimmed.starts_with('-') {
        return None;
    }
    Some(trimmed.trim_start_matches(['-', ' ']).trim())
}

pub fn is_travel_category(label: &str) -> bool {
    let folded = fold_label(label);
    TRAVEL_CATEGORY_TERMS.iter().all(|term| folded.contains(term))
}

pub fn is_travel_item(label: &str) -> bool {
    contains_folded(&fold_label(label), &TRAVEL_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections() {
        assert_eq!(classify("CUSTOS FIXOS"), Classification::Level1Section);
        assert_eq!(classify("Custos Variáveis"), Classification::Level1Section);
        assert_eq!(classify("CUSTOS NÃO OPERACIONAIS"), Classification::Level1Section);
        assert_eq!(classify("DESPESAS COM PESSOAL"), Classification::Level1Section);
        assert_eq!(classify("RECEITA BRUTA"), Classification::Level1Section);
    }

    #[test]
    fn test_upper_case_without_vocabulary_is_candidate() {
        assert_eq!(classify("IRRF"), Classification::Candidate);
        assert_eq!(classify("PRO LABORE"), Classification::Candidate);
    }

    #[test]
    fn test_calculations_win_over_sections() {
        assert_eq!(classify("MARGEM DE LUCRO"), Classification::Calculation);
        assert_eq!(classify("TOTAL DESPESAS"), Classification::Calculation);
        assert_eq!(classify("DESPESAS - TOTAL"), Classification::Calculation);
        assert_eq!(classify("Margem de Contribuição"), Classification::Calculation);
        assert_eq!(classify("PONTO DE EQUILÍBRIO - LÍQUIDO"), Classification::Calculation);
        assert_eq!(classify("Lucro Liquido"), Classification::Calculation);
        assert_eq!(classify("RESULTADO"), Classification::Calculation);
    }

    #[test]
    fn test_dash_items() {
        assert_eq!(
            classify("- Salário"),
            Classification::ExplicitLevel3("Salário".to_string())
        );
        assert_eq!(
            classify("- - Férias"),
            Classification::ExplicitLevel3("Férias".to_string())
        );
        assert_eq!(classify("Funcionários"), Classification::Candidate);
        assert_eq!(strip_dash_marker("Seguros"), None);
    }

    #[test]
    fn test_classify_rows_reads_figures() {
        use crate::schema::MonthCode;
        use crate::sheet::Cell;

        let sheet = Sheet::new(
            "2023",
            vec!["Item".into(), "JAN".into(), "FEV".into()],
            vec![
                vec![Cell::text("FATURAMENTO"), Cell::Number(100.0), Cell::text("R$ 50,00")],
                vec![Cell::Empty, Cell::Number(1.0)],
                vec![Cell::text("- Vendas"), Cell::Number(0.0), Cell::Number(150.0)],
            ],
        );
        let roles = ColumnRoles::detect(&sheet, 10).unwrap();
        let rows = classify_rows(&sheet, &roles);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].annual, 150.0);
        assert_eq!(rows[0].monthly[&MonthCode::Fev], 50.0);
        assert_eq!(rows[1].index, 2);
        assert!(rows[1].is_dash_item());
        assert!(!rows[1].monthly.contains_key(&MonthCode::Jan));
    }

    #[test]
    fn test_travel() {
        assert!(is_travel_category("Viagens e Deslocamentos"));
        assert!(!is_travel_category("Viagens"));
        assert!(is_travel_item("Combustível"));
        assert!(is_travel_item("Pedágios"));
        assert!(is_travel_item("Táxi"));
        assert!(!is_travel_item("Seguros"));
    }
}
