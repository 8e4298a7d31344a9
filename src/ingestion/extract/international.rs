//! Direct investment positions for the energy industry (StatCan 36-10-0009-01)

use crate::ingestion::classify::{Classifier, Rule};
use crate::ingestion::derive::{billions, billions_meta, millions_meta, point};
use crate::ingestion::extract::{group_by_year, warn_missing};
use crate::ingestion::table::Table;
use crate::ingestion::types::{CalcBatch, Extract, InternationalCalc, MetadataRecord};
use crate::round_to;
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "international_investment";
const FIRST_YEAR: i32 = 2007;

const ENERGY_INDUSTRIES: &[Rule<()>] = &[
    Rule::exact((), "Oil and gas extraction [211]"),
    Rule::exact((), "Support activities for mining and oil and gas extraction [213]"),
    Rule::exact((), "Utilities [22]"),
    Rule::exact((), "Petroleum and coal products manufacturing [324]"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Direction {
    Cdia,
    Fdi,
}

const DIRECTIONS: &[Rule<Direction>] = &[
    Rule::contains(Direction::Cdia, "Canadian direct investment abroad"),
    Rule::contains(Direction::Fdi, "Foreign direct investment in Canada"),
];

pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let Some(naics_col) = table.column(&[
        "North American Industry Classification System (NAICS)",
        "NAICS",
        "Industry",
    ]) else {
        warn_missing(SOURCE_KEY, "NAICS", table);
        return out;
    };
    let Some(kind_col) = table.column(&[
        "Canadian and foreign direct investment",
        "Investment type",
        "Type",
    ]) else {
        warn_missing(SOURCE_KEY, "investment type", table);
        return out;
    };
    let (Some(date_col), Some(value_col)) = (table.column(&["REF_DATE"]), table.column(&["VALUE"]))
    else {
        warn_missing(SOURCE_KEY, "REF_DATE/VALUE", table);
        return out;
    };

    let (industries, directions) = match (
        Classifier::new(ENERGY_INDUSTRIES),
        Classifier::new(DIRECTIONS),
    ) {
        (Ok(i), Ok(d)) => (i, d),
        (Err(e), _) | (_, Err(e)) => {
            warn!("{}: invalid label rules: {}", SOURCE_KEY, e);
            return out;
        }
    };

    let energy_rows = table.select(|r| {
        table
            .cell(r, naics_col)
            .is_some_and(|label| industries.matches_any(label))
    });

    let mut calc = Vec::new();

    for (year, rows) in group_by_year(table, &energy_rows, date_col) {
        if year < FIRST_YEAR {
            continue;
        }

        let sums = directions.sum_by_bucket(table, kind_col, value_col, &rows);
        let cdia = sums.get(&Direction::Cdia).copied().unwrap_or(0.0);
        let fdi = sums.get(&Direction::Fdi).copied().unwrap_or(0.0);

        if cdia <= 0.0 && fdi <= 0.0 {
            continue;
        }

        for (vector, kind, value) in [("intl_cdia", "cdia", cdia), ("intl_fdi", "fdi", fdi)] {
            out.data.push(point(vector, year, value, 1));
            out.derived.push(billions(vector, year, value, 1));
            calc.push(InternationalCalc {
                ref_year: year,
                investment_type: kind.to_string(),
                industry_category: "energy".to_string(),
                value: round_to(value, 1),
            });
        }
    }

    info!("{}: {} calc rows", SOURCE_KEY, calc.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::International(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        millions_meta("intl_cdia", "Canadian direct investment abroad (CDIA) - Energy industry"),
        millions_meta("intl_fdi", "Foreign direct investment in Canada (FDI) - Energy industry"),
        billions_meta("intl_cdia_billions", "CDIA - Energy industry (billions)"),
        billions_meta("intl_fdi_billions", "FDI - Energy industry (billions)"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: &str, industry: &str, kind: &str, value: &str) -> Vec<String> {
        [year, industry, kind, value].iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: Vec<Vec<String>>) -> Table {
        Table::from_rows(
            &[
                "REF_DATE",
                "North American Industry Classification System (NAICS)",
                "Canadian and foreign direct investment",
                "VALUE",
            ],
            rows,
        )
    }

    #[test]
    fn test_cdia_and_fdi_over_energy_industries() {
        let table = table(vec![
            row("2023", "Oil and gas extraction [211]", "Canadian direct investment abroad", "1000"),
            row("2023", "Utilities [22]", "Canadian direct investment abroad", "500"),
            row("2023", "Utilities [22]", "Foreign direct investment in Canada", "250"),
            row("2023", "Manufacturing [31-33]", "Foreign direct investment in Canada", "9999"),
        ]);

        let extract = extract(&table);

        assert_eq!(extract.value("intl_cdia", 2023), Some(1500.0));
        assert_eq!(extract.value("intl_fdi", 2023), Some(250.0));
        assert_eq!(extract.value("intl_cdia_billions", 2023), Some(1.5));
        assert_eq!(extract.value("intl_fdi_billions", 2023), Some(0.3));
        assert_eq!(extract.calc[0].len(), 2);
    }

    #[test]
    fn test_years_without_positions_are_dropped() {
        let table = table(vec![
            row("2006", "Utilities [22]", "Canadian direct investment abroad", "10"),
            row("2020", "Utilities [22]", "Canadian direct investment abroad", ""),
        ]);

        let extract = extract(&table);
        assert!(extract.is_empty());
    }

    #[test]
    fn test_missing_investment_type_column() {
        let table = Table::from_rows(
            &["REF_DATE", "NAICS", "VALUE"],
            vec![vec!["2020".to_string(), "Utilities [22]".to_string(), "1".to_string()]],
        );
        assert!(extract(&table).is_empty());
    }
}
