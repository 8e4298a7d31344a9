//! Energy sub-sector GDP by province (StatCan 36-10-0624-01) with a reference-year estimate

use crate::ingestion::derive::{millions_meta, point};
use crate::ingestion::extract::{group_by_year, warn_missing};
use crate::ingestion::table::Table;
use crate::ingestion::types::{CalcBatch, DataPoint, Extract, MetadataRecord, ProvincialGdpCalc};
use crate::{round_to, share_pct};
use std::collections::BTreeMap;
use tracing::info;

pub const SOURCE_KEY: &str = "provincial_gdp";
const FIRST_YEAR: i32 = 2009;

/// National direct energy GDP for the reference year, millions of dollars
pub const DEFAULT_REFERENCE_YEAR_TOTAL: f64 = 231_776.0;

pub const NATIONAL: &str = "national_total";

/// (GEO label, code, display name) in publication order
pub const PROVINCES: [(&str, &str, &str); 14] = [
    ("Canada", NATIONAL, "Canada total"),
    ("Newfoundland and Labrador", "nl", "Newfoundland and Labrador"),
    ("Prince Edward Island", "pe", "Prince Edward Island"),
    ("Nova Scotia", "ns", "Nova Scotia"),
    ("New Brunswick", "nb", "New Brunswick"),
    ("Quebec", "qc", "Quebec"),
    ("Ontario", "on", "Ontario"),
    ("Manitoba", "mb", "Manitoba"),
    ("Saskatchewan", "sk", "Saskatchewan"),
    ("Alberta", "ab", "Alberta"),
    ("British Columbia", "bc", "British Columbia"),
    ("Yukon", "yt", "Yukon"),
    ("Northwest Territories", "nt", "Northwest Territories"),
    ("Nunavut", "nu", "Nunavut"),
];

fn province(geo: &str) -> Option<(&'static str, &'static str)> {
    PROVINCES
        .iter()
        .find(|(label, _, _)| *label == geo)
        .map(|(_, code, name)| (*code, *name))
}

pub fn extract(table: &Table, reference_year_total: f64) -> Extract {
    let mut out = Extract::default();

    let (Some(sector_col), Some(indicator_col), Some(geo_col)) = (
        table.column(&["Sector"]),
        table.column(&["Economic indicator"]),
        table.column(&["GEO"]),
    ) else {
        warn_missing(SOURCE_KEY, "Sector/Economic indicator/GEO", table);
        return out;
    };
    let (Some(date_col), Some(value_col)) = (table.column(&["REF_DATE"]), table.column(&["VALUE"]))
    else {
        warn_missing(SOURCE_KEY, "REF_DATE/VALUE", table);
        return out;
    };

    let rows = table.select(|r| {
        table.cell(r, sector_col) == Some("Energy sub-sector")
            && table.cell(r, indicator_col) == Some("Gross domestic product")
    });

    // year -> (code, name, value), years ascending
    let mut by_year: BTreeMap<i32, Vec<(&str, &str, f64)>> = BTreeMap::new();

    for (year, rows) in group_by_year(table, &rows, date_col) {
        if year < FIRST_YEAR {
            continue;
        }
        let entries = by_year.entry(year).or_default();
        for r in rows {
            let Some((code, name)) = table.cell(r, geo_col).and_then(province) else {
                continue;
            };
            if let Some(value) = table.number(r, value_col) {
                out.data.push(point(&format!("gdp_prov_{}", code), year, value, 0));
                entries.push((code, name, value));
            }
        }
    }

    let mut calc = Vec::new();
    for (year, entries) in &by_year {
        let national = national_value(entries);
        for (code, name, value) in entries {
            calc.push(ProvincialGdpCalc {
                ref_year: *year,
                province_code: code.to_string(),
                province_name: name.to_string(),
                energy_gdp: round_to(*value, 0),
                energy_share_pct: national.and_then(|n| share_pct(*value, n, 1)),
                is_estimate: false,
            });
        }
    }

    // Extrapolate the unpublished reference year from the latest year's provincial shares
    if let Some((&latest, entries)) = by_year.iter().next_back() {
        if let Some(national) = national_value(entries) {
            let reference_year = latest + 1;
            let mut estimates = 0;

            for (code, name, value) in entries.iter().filter(|(code, _, _)| *code != NATIONAL) {
                let estimated = round_to(reference_year_total * value / national, 0);
                out.data.push(DataPoint::new(format!("gdp_prov_{}", code), reference_year, estimated));
                calc.push(ProvincialGdpCalc {
                    ref_year: reference_year,
                    province_code: code.to_string(),
                    province_name: name.to_string(),
                    energy_gdp: estimated,
                    energy_share_pct: share_pct(estimated, reference_year_total, 1),
                    is_estimate: true,
                });
                estimates += 1;
            }

            out.data.push(DataPoint::new(format!("gdp_prov_{}", NATIONAL), reference_year, reference_year_total));
            calc.push(ProvincialGdpCalc {
                ref_year: reference_year,
                province_code: NATIONAL.to_string(),
                province_name: "Canada total".to_string(),
                energy_gdp: reference_year_total,
                energy_share_pct: Some(100.0),
                is_estimate: true,
            });

            info!(
                "{}: estimated {} provinces for reference year {}",
                SOURCE_KEY, estimates, reference_year
            );
        }
    }

    info!("{}: {} data rows", SOURCE_KEY, out.data.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::ProvincialGdp(calc));
    }
    out.metadata = metadata();
    out
}

fn national_value(entries: &[(&str, &str, f64)]) -> Option<f64> {
    entries
        .iter()
        .find(|(code, _, _)| *code == NATIONAL)
        .map(|(_, _, value)| *value)
        .filter(|v| *v != 0.0)
}

fn metadata() -> Vec<MetadataRecord> {
    PROVINCES
        .iter()
        .map(|(_, code, name)| {
            millions_meta(
                &format!("gdp_prov_{}", code),
                &format!("Energy sector direct nominal GDP - {}", name),
            )
        })
        .collect()
}
