//! Economic contributions of the energy sector (StatCan 36-10-0610-01) joined with capex investment

use crate::ingestion::classify::Classifier;
use crate::ingestion::derive::{billions, billions_meta, count_meta, millions_meta, point, thousands};
use crate::ingestion::extract::capex::{capital_expenditure_rows, INVESTMENT_RULES};
use crate::ingestion::extract::{group_by_year, vector_id, warn_missing};
use crate::ingestion::table::{native_points, Table};
use crate::ingestion::types::{CalcBatch, EconomicCalc, Extract, MetadataRecord};
use crate::round_to;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "economic_contributions";

pub const JOBS_DIRECT: &str = "v1044855486";
pub const JOBS_INDIRECT: &str = "v1044855495";
pub const INCOME_DIRECT: &str = "v1044301086";
pub const INCOME_INDIRECT: &str = "v1044301095";
pub const GDP_DIRECT: &str = "v1044578286";
pub const GDP_INDIRECT: &str = "v1044578295";

const VECTORS: [&str; 6] = [
    JOBS_DIRECT,
    JOBS_INDIRECT,
    INCOME_DIRECT,
    INCOME_INDIRECT,
    GDP_DIRECT,
    GDP_INDIRECT,
];

/// Capex investment in energy industries per year, millions of dollars
fn investment_by_year(capex: &Table) -> BTreeMap<i32, f64> {
    let mut by_year = BTreeMap::new();

    let Some(cols) = capital_expenditure_rows(capex) else {
        return by_year;
    };
    let classifier = match Classifier::new(INVESTMENT_RULES) {
        Ok(c) => c,
        Err(e) => {
            warn!("{}: invalid label rules: {}", SOURCE_KEY, e);
            return by_year;
        }
    };

    for (year, rows) in group_by_year(capex, &cols.rows, cols.date) {
        let sums = classifier.sum_by_bucket(capex, cols.naics, cols.value, &rows);
        by_year.insert(year, sums.get(&()).copied().unwrap_or(0.0));
    }
    by_year
}

pub fn extract(econ: &Table, capex: Option<&Table>) -> Extract {
    let mut out = Extract::default();

    let (raw, raw_metadata) = native_points(econ, SOURCE_KEY);
    out.raw = raw;
    out.raw_metadata = raw_metadata;

    let (Some(vector_col), Some(date_col), Some(value_col)) = (
        econ.column(&["VECTOR"]),
        econ.column(&["REF_DATE"]),
        econ.column(&["VALUE"]),
    ) else {
        warn_missing(SOURCE_KEY, "VECTOR/REF_DATE/VALUE", econ);
        return out;
    };

    let investment = capex.map(investment_by_year).unwrap_or_default();

    let rows = econ.select(|r| {
        econ.cell(r, vector_col)
            .is_some_and(|v| VECTORS.contains(&vector_id(v).as_str()))
    });

    let mut calc = Vec::new();

    for (year, rows) in group_by_year(econ, &rows, date_col) {
        // First row per vector; blank values count as zero
        let get = |vector: &str| {
            rows.iter()
                .find(|&&r| econ.cell(r, vector_col).map(vector_id).as_deref() == Some(vector))
                .and_then(|&r| econ.number(r, value_col))
                .unwrap_or(0.0)
        };

        let jobs_direct = get(JOBS_DIRECT);
        let jobs_indirect = get(JOBS_INDIRECT);
        let jobs_total = (jobs_direct + jobs_indirect) * 1000.0;
        let income_direct = get(INCOME_DIRECT);
        let income_indirect = get(INCOME_INDIRECT);
        let income_total = income_direct + income_indirect;
        let gdp_direct = get(GDP_DIRECT);
        let gdp_indirect = get(GDP_INDIRECT);
        let gdp_total = gdp_direct + gdp_indirect;

        if jobs_total == 0.0 && income_total == 0.0 && gdp_total == 0.0 {
            continue;
        }

        let investment_value = investment.get(&year).copied().unwrap_or(0.0);

        out.data.push(point("econ_jobs", year, jobs_total, 0));
        out.data.push(point("econ_employment_income", year, income_total, 1));
        out.data.push(point("econ_gdp", year, gdp_total, 1));
        out.data.push(point("econ_investment_value", year, investment_value, 1));

        out.derived.push(thousands("econ_jobs", year, jobs_total, 1));
        out.derived.push(billions("econ_employment_income", year, income_total, 2));
        out.derived.push(billions("econ_gdp", year, gdp_total, 2));
        out.derived.push(billions("econ_investment_value", year, investment_value, 2));

        calc.push(EconomicCalc {
            ref_year: year,
            gdp_direct: round_to(gdp_direct, 1),
            gdp_indirect: round_to(gdp_indirect, 1),
            gdp_total: round_to(gdp_total, 1),
            jobs_direct: round_to(jobs_direct * 1000.0, 0),
            jobs_indirect: round_to(jobs_indirect * 1000.0, 0),
            jobs_total: round_to(jobs_total, 0),
            income_direct: round_to(income_direct, 1),
            income_indirect: round_to(income_indirect, 1),
            income_total: round_to(income_total, 1),
        });
    }

    info!("{}: {} years of contributions", SOURCE_KEY, calc.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::Economic(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        count_meta("econ_jobs", "Economic contributions - Jobs (direct + indirect)"),
        millions_meta("econ_employment_income", "Economic contributions - Employment income"),
        millions_meta("econ_gdp", "Economic contributions - GDP"),
        millions_meta("econ_investment_value", "Annual investment - Fuel, energy and pipelines"),
        MetadataRecord::new("econ_jobs_thousands", "Economic contributions - Jobs (thousands)", "Thousands", "thousands"),
        billions_meta("econ_employment_income_billions", "Economic contributions - Employment income (billions)"),
        billions_meta("econ_gdp_billions", "Economic contributions - GDP (billions)"),
        billions_meta("econ_investment_value_billions", "Annual investment (billions)"),
    ]
}
