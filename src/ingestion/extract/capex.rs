//! Capital expenditures (StatCan 34-10-0036-01)

use crate::ingestion::classify::{Classifier, Rule};
use crate::ingestion::derive::{billions, millions_meta, pct, percent_meta, point, billions_meta};
use crate::ingestion::extract::{group_by_year, warn_missing};
use crate::ingestion::table::{native_points, Table};
use crate::ingestion::types::{CalcBatch, CapexCalc, Extract, MetadataRecord};
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "capital_expenditures";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    OilGas,
    Electricity,
    Other,
}

const RULES: &[Rule<Bucket>] = &[
    Rule::pattern(Bucket::OilGas, r"^Oil and gas extraction \[211\]$"),
    Rule::pattern(Bucket::Electricity, r"\[2211\]"),
    Rule::pattern(Bucket::Other, r"\[213\]|\[2212\]|\[324\]|\[486\]"),
];

/// Energy industries counted as investment by the economic contributions page
pub(crate) const INVESTMENT_RULES: &[Rule<()>] = &[Rule::pattern(
    (),
    r"\[211\]|\[2211\]|\[2212\]|\[486\]|\[324\]",
)];

/// Column positions plus the rows already filtered to `Capital expenditures`
#[derive(Debug)]
pub struct CapitalRows {
    pub date: usize,
    pub naics: usize,
    pub value: usize,
    pub rows: Vec<usize>,
}

pub fn capital_expenditure_rows(table: &Table) -> Option<CapitalRows> {
    let Some(date) = table.column(&["REF_DATE"]) else {
        warn_missing(SOURCE_KEY, "REF_DATE", table);
        return None;
    };
    let Some(naics) = table.find_column(|h| h.contains("naics") || h.contains("industry")) else {
        warn_missing(SOURCE_KEY, "NAICS/Industry", table);
        return None;
    };
    let Some(value) = table.column(&["VALUE"]) else {
        warn_missing(SOURCE_KEY, "VALUE", table);
        return None;
    };

    let rows = match table.find_column(|h| h.contains("capital") && h.contains("repair")) {
        Some(kind) => table.select(|r| table.cell(r, kind) == Some("Capital expenditures")),
        None => (0..table.len()).collect(),
    };

    Some(CapitalRows {
        date,
        naics,
        value,
        rows,
    })
}

pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let (raw, raw_metadata) = native_points(table, SOURCE_KEY);
    out.raw = raw;
    out.raw_metadata = raw_metadata;

    let Some(cols) = capital_expenditure_rows(table) else {
        return out;
    };

    let classifier = match Classifier::new(RULES) {
        Ok(c) => c,
        Err(e) => {
            warn!("{}: invalid label rules: {}", SOURCE_KEY, e);
            return out;
        }
    };

    let mut calc = Vec::new();

    for (year, rows) in group_by_year(table, &cols.rows, cols.date) {
        let sums = classifier.sum_by_bucket(table, cols.naics, cols.value, &rows);
        let oil_gas = sums.get(&Bucket::OilGas).copied().unwrap_or(0.0);
        let electricity = sums.get(&Bucket::Electricity).copied().unwrap_or(0.0);
        let other = sums.get(&Bucket::Other).copied().unwrap_or(0.0);
        let total = oil_gas + electricity + other;

        if total <= 0.0 {
            continue;
        }

        let parts = [
            ("capex_oil_gas", oil_gas),
            ("capex_electricity", electricity),
            ("capex_other", other),
            ("capex_total", total),
        ];

        for (vector, value) in parts {
            out.data.push(point(vector, year, value, 1));
        }
        for (vector, value) in &parts[..3] {
            out.derived.extend(pct(vector, year, *value, total, 1));
        }
        for (vector, value) in parts {
            out.derived.push(billions(vector, year, value, 2));
        }

        calc.push(CapexCalc {
            ref_year: year,
            oil_gas: crate::round_to(oil_gas, 1),
            electricity: crate::round_to(electricity, 1),
            other_energy: crate::round_to(other, 1),
            total: crate::round_to(total, 1),
        });
    }

    info!("{}: {} years with capital expenditures", SOURCE_KEY, calc.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::Capex(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        millions_meta("capex_oil_gas", "Capital expenditures - Oil and gas extraction"),
        millions_meta("capex_electricity", "Capital expenditures - Electric power"),
        millions_meta("capex_other", "Capital expenditures - Other energy"),
        millions_meta("capex_total", "Capital expenditures - Total energy sector"),
        percent_meta("capex_oil_gas_pct", "Capital expenditures - Oil and gas (% of total)"),
        percent_meta("capex_electricity_pct", "Capital expenditures - Electric power (% of total)"),
        percent_meta("capex_other_pct", "Capital expenditures - Other energy (% of total)"),
        billions_meta("capex_oil_gas_billions", "Capital expenditures - Oil and gas extraction"),
        billions_meta("capex_electricity_billions", "Capital expenditures - Electric power"),
        billions_meta("capex_other_billions", "Capital expenditures - Other energy"),
        billions_meta("capex_total_billions", "Capital expenditures - Total energy sector"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "REF_DATE,GEO,North American Industry Classification System (NAICS),Capital and repair expenditures,VECTOR,COORDINATE,UOM,SCALAR_FACTOR,VALUE\n";

    fn csv(rows: &[&str]) -> Table {
        Table::from_csv(&format!("{}{}\n", HEADER, rows.join("\n"))).unwrap()
    }

    #[test]
    fn test_two_naics_rows_give_four_data_rows() {
        let table = csv(&[
            "2022,Canada,Oil and gas extraction [211],Capital expenditures,v1,1.1,Dollars,millions,100",
            "2022,Canada,Electric power generation transmission and distribution [2211],Capital expenditures,v2,1.2,Dollars,millions,50",
        ]);

        let extract = extract(&table);
        let data: Vec<(&str, f64)> = extract
            .data
            .iter()
            .filter(|p| p.ref_date == "2022")
            .map(|p| (p.vector.as_str(), p.value))
            .collect();

        assert_eq!(
            data,
            vec![
                ("capex_oil_gas", 100.0),
                ("capex_electricity", 50.0),
                ("capex_other", 0.0),
                ("capex_total", 150.0),
            ]
        );
        assert_eq!(extract.value("capex_oil_gas_pct", 2022), Some(66.7));
        assert_eq!(extract.value("capex_total_billions", 2022), Some(0.15));
        assert_eq!(extract.raw.len(), 2);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let table = csv(&[
            "2021,Canada,Oil and gas extraction [211],Capital expenditures,v1,1.1,Dollars,millions,40.25",
            "2021,Canada,Support activities for mining and oil and gas extraction [213],Capital expenditures,v3,1.3,Dollars,millions,10",
            "2021,Canada,Pipeline transportation [486],Capital expenditures,v4,1.4,Dollars,millions,5.5",
            "2021,Canada,Natural gas distribution [2212],Capital expenditures,v5,1.5,Dollars,millions,2",
            "2021,Canada,Oil and gas extraction [211],Repair expenditures,v6,1.6,Dollars,millions,999",
        ]);

        let extract = extract(&table);
        let get = |v: &str| extract.value(v, 2021).unwrap();

        assert_eq!(get("capex_oil_gas"), 40.3);
        assert_eq!(get("capex_other"), 17.5);
        assert_eq!(get("capex_total"), 57.8);
        assert_eq!(
            get("capex_total"),
            crate::round_to(get("capex_oil_gas") + get("capex_electricity") + get("capex_other"), 1)
        );

        match &extract.calc[0] {
            CalcBatch::Capex(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].other_energy, 17.5);
            }
            other => panic!("Unexpected calc batch: {:?}", other),
        }
    }

    #[test]
    fn test_years_without_matches_are_dropped() {
        let table = csv(&[
            "2020,Canada,Utilities [22],Capital expenditures,v7,1.7,Dollars,millions,80",
            "2020,Canada,Oil and gas extraction [211],Capital expenditures,v1,1.1,Dollars,millions,",
            "2022,Canada,Oil and gas extraction [211],Capital expenditures,v1,1.1,Dollars,millions,10",
        ]);

        let extract = extract(&table);

        assert!(extract.data.iter().all(|p| p.ref_date != "2020"));
        assert_eq!(extract.value("capex_total", 2022), Some(10.0));
    }

    #[test]
    fn test_missing_naics_column() {
        let table = Table::from_csv("REF_DATE,GEO,VALUE\n2022,Canada,10\n").unwrap();
        let extract = extract(&table);

        assert!(extract.is_empty());
        assert!(extract.calc.is_empty());
    }
}
