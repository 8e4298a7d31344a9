//! Energy's nominal GDP contribution, parsed from the GDP&EMP forecast document

use crate::ingestion::derive::{billions, billions_meta, millions_meta, pct, percent_meta, point};
use crate::ingestion::types::{Extract, MetadataRecord};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

pub const SOURCE_KEY: &str = "nominal_gdp";
const FIRST_YEAR: i32 = 2009;

const ENERGY: &str = "Energy";
const ENERGY_PLUS: &str = "Energy Plus (includes coal, fuel wood and uranium)";
const PETROLEUM: &str = "Petroleum Sector (Energy less electricity and \"other services\")";
const ELECTRICITY: &str = "Electricity (+ Services linked to electricity production)";
const SECTORS: [&str; 4] = [ENERGY, ENERGY_PLUS, PETROLEUM, ELECTRICITY];

const CURRENT_GDP: &str = "Current GDP ($ millions)";
const TYPES: [&str; 3] = ["Direct", "Indirect", "Induced"];

/// (sector, year, indicator, type)
pub type ForecastKey = (String, i32, String, String);

/// Nominal GDP at market prices, millions of dollars
pub fn market_gdp(year: i32) -> f64 {
    match year {
        2024 => 2_879_000.0,
        2023 => 2_765_000.0,
        2022 => 2_773_000.0,
        _ => 2_700_000.0,
    }
}

/// Walk the document line by line; headings set context, numbers record a value once
/// sector, year, indicator and type are all known
pub fn parse_forecast(text: &str) -> HashMap<ForecastKey, f64> {
    let mut values = HashMap::new();

    let mut sector: Option<&str> = None;
    let mut year: Option<i32> = None;
    let mut indicator: Option<&str> = None;
    let mut kind: Option<&str> = None;

    for line in text.trim().lines().map(str::trim) {
        if SECTORS.contains(&line) {
            sector = Some(line);
        } else if line.len() == 4 && line.bytes().all(|b| b.is_ascii_digit()) {
            year = line.parse().ok();
        } else if line.contains("GDP") || line.contains("Jobs") {
            indicator = Some(line);
        } else if TYPES.contains(&line) {
            kind = Some(line);
        } else if let Ok(value) = line.replace(',', "").parse::<f64>() {
            if let (Some(s), Some(y), Some(i), Some(k)) = (sector, year, indicator, kind) {
                values.insert((s.to_string(), y, i.to_string(), k.to_string()), value);
            }
        }
    }

    debug!("Parsed {} forecast values", values.len());
    values
}

pub fn extract(text: &str) -> Extract {
    let values = parse_forecast(text);
    let mut out = Extract::default();

    let get = |sector: &str, year: i32, kind: &str| {
        values
            .get(&(sector.to_string(), year, CURRENT_GDP.to_string(), kind.to_string()))
            .copied()
            .unwrap_or(0.0)
    };

    let years: BTreeSet<i32> = values.keys().map(|(_, year, _, _)| *year).collect();

    for year in years.into_iter().filter(|y| *y >= FIRST_YEAR) {
        let direct = get(ENERGY_PLUS, year, "Direct");
        let indirect = get(ENERGY_PLUS, year, "Indirect");
        let petroleum = get(PETROLEUM, year, "Direct");
        let electricity = get(ELECTRICITY, year, "Direct");
        let other = (direct - petroleum - electricity).max(0.0);
        let total = direct + indirect;
        let market = market_gdp(year);

        if total <= 0.0 {
            continue;
        }

        let shares = [
            ("gdp_nominal_total", total),
            ("gdp_nominal_direct", direct),
            ("gdp_nominal_indirect", indirect),
            ("gdp_nominal_petroleum", petroleum),
            ("gdp_nominal_electricity", electricity),
            ("gdp_nominal_other", other),
        ];

        for (vector, value) in shares {
            out.data.push(point(vector, year, value, 0));
        }
        out.data.push(point("gdp_nominal_market", year, market, 0));

        out.derived
            .extend(shares.iter().filter_map(|(vector, value)| pct(vector, year, *value, market, 1)));
        for (vector, value) in shares.into_iter().chain([("gdp_nominal_market", market)]) {
            out.derived.push(billions(vector, year, value, 0));
        }
    }

    info!("{}: {} rows from forecast", SOURCE_KEY, out.row_count());

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    let parts = [
        ("total", "Total"),
        ("direct", "Direct"),
        ("indirect", "Indirect"),
        ("petroleum", "Petroleum"),
        ("electricity", "Electricity"),
        ("other", "Other"),
    ];

    let mut records: Vec<MetadataRecord> = parts
        .iter()
        .map(|(key, label)| {
            millions_meta(
                &format!("gdp_nominal_{}", key),
                &format!("Energy's nominal GDP contribution - {}", label),
            )
        })
        .collect();
    records.push(millions_meta("gdp_nominal_market", "Nominal GDP at market prices"));

    records.extend(parts.iter().map(|(key, label)| {
        percent_meta(
            &format!("gdp_nominal_{}_pct", key),
            &format!("Energy's nominal GDP share - {}", label),
        )
    }));
    records.extend(parts.iter().map(|(key, label)| {
        billions_meta(
            &format!("gdp_nominal_{}_billions", key),
            &format!("Energy's nominal GDP - {} (billions)", label),
        )
    }));
    records.push(billions_meta(
        "gdp_nominal_market_billions",
        "Nominal GDP at market prices (billions)",
    ));
    records
}
