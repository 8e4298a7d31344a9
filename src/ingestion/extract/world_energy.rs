//! World primary energy production rankings from the IEA World Energy Balances workbook

use crate::ingestion::derive::point;
use crate::ingestion::extract::warn_missing;
use crate::ingestion::table::Table;
use crate::ingestion::types::{DataPoint, Extract, MetadataRecord};
use tracing::info;

pub const SOURCE_KEY: &str = "world_energy_production";

pub const SHEET: &str = "TimeSeries_1971-2024";
pub const HEADER_ROW: usize = 1;

const YEARS: std::ops::RangeInclusive<i32> = 2007..=2024;
const BASE_YEAR: &str = "2005";
const TOP_N: usize = 10;

const AGGREGATES: [&str; 15] = [
    "World",
    "Non-OECD Total",
    "IEA Total",
    "OECD Total",
    "Non-OECD Asia (including China)",
    "Middle East",
    "Non-OECD Europe and Eurasia",
    "Africa",
    "Non-OECD Americas",
    "IEA and Accession/Association countries",
    "OECD Europe",
    "OECD Americas",
    "OECD Asia Oceania",
    "European Union - 28 countries",
    "European Union - 27 countries",
];

const COUNTRIES: [(&str, &str); 14] = [
    ("People's Republic of China", "china"),
    ("United States", "united_states"),
    ("India", "india"),
    ("Canada", "canada"),
    ("Indonesia", "indonesia"),
    ("Australia", "australia"),
    ("Brazil", "brazil"),
    ("Norway", "norway"),
    ("Mexico", "mexico"),
    ("South Africa", "south_africa"),
    ("Colombia", "colombia"),
    ("United Kingdom", "united_kingdom"),
    ("Egypt", "egypt"),
    ("Argentina", "argentina"),
];

fn country_key(name: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(country, _)| *country == name)
        .map(|(_, key)| *key)
}

fn growth(current: f64, base: f64) -> f64 {
    (current - base) / base * 100.0
}

/// `table` is the time-series sheet with the header row applied
pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let (Some(country_col), Some(flow_col), Some(product_col)) = (
        table.column(&["Country"]),
        table.column(&["Flow"]),
        table.column(&["Product"]),
    ) else {
        warn_missing(SOURCE_KEY, "Country/Flow/Product", table);
        return out;
    };

    let production = table.select(|r| {
        table.cell(r, flow_col) == Some("Production (PJ)")
            && table.cell(r, product_col) == Some("Total")
    });

    let country_of = |r: usize| table.cell(r, country_col).unwrap_or_default();
    let world_row = production.iter().copied().find(|&r| country_of(r) == "World");
    let countries: Vec<usize> = production
        .iter()
        .copied()
        .filter(|&r| !AGGREGATES.contains(&country_of(r)))
        .collect();
    let canada_row = countries.iter().copied().find(|&r| country_of(r) == "Canada");

    let base_col = table.column(&[BASE_YEAR]);
    let value = |row: Option<usize>, col: Option<usize>| match (row, col) {
        (Some(r), Some(c)) => table.number(r, c),
        _ => None,
    };
    let canada_base = value(canada_row, base_col).filter(|v| *v > 0.0);
    let world_base = value(world_row, base_col).filter(|v| *v > 0.0);

    let mut years = 0;

    for year in YEARS {
        let label = year.to_string();
        let Some(col) = table.column(&[label.as_str()]) else {
            continue;
        };

        let world = value(world_row, Some(col));
        let canada = value(canada_row, Some(col));

        if let Some(world) = world.filter(|w| *w > 0.0) {
            years += 1;
            out.data.push(point("energy_prod_world_total", year, world, 2));

            if let Some(canada) = canada {
                out.data.push(point("energy_prod_canada_pj", year, canada, 2));
                out.derived.push(point("energy_prod_canada_pct", year, canada / world * 100.0, 1));
            }

            // (key, pj, pct) for mapped producers, ranked by share
            let mut ranked: Vec<(&str, f64, f64)> = countries
                .iter()
                .filter_map(|&r| {
                    let key = country_key(country_of(r))?;
                    let pj = table.number(r, col).filter(|v| *v > 0.0)?;
                    Some((key, crate::round_to(pj, 2), crate::round_to(pj / world * 100.0, 1)))
                })
                .collect();
            ranked.sort_by(|a, b| b.2.total_cmp(&a.2));

            for (rank, (key, pj, pct)) in ranked.into_iter().take(TOP_N).enumerate() {
                out.data.push(DataPoint::new(format!("energy_prod_{}_pj", key), year, pj));
                out.derived.push(DataPoint::new(format!("energy_prod_{}_pct", key), year, pct));
                out.data.push(DataPoint::new(
                    format!("energy_prod_{}_rank", key),
                    year,
                    (rank + 1) as f64,
                ));
            }
        }

        if let (Some(base), Some(current)) = (canada_base, canada) {
            out.derived.push(point(
                "energy_prod_canada_growth_since_2005",
                year,
                growth(current, base),
                0,
            ));
        }
        if let (Some(base), Some(current)) = (world_base, world.filter(|w| *w != 0.0)) {
            out.derived.push(point(
                "energy_prod_world_growth_since_2005",
                year,
                growth(current, base),
                0,
            ));
        }
    }

    info!("{}: {} years, {} rows", SOURCE_KEY, years, out.row_count());

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    let mut records = vec![
        MetadataRecord::new(
            "energy_prod_world_total",
            "World Total Primary Energy Production",
            "PJ",
            "petajoules",
        ),
        MetadataRecord::new(
            "energy_prod_canada_pj",
            "Canada Primary Energy Production",
            "PJ",
            "petajoules",
        ),
    ];

    let shares = [
        ("energy_prod_canada_pct", "Canada Share of World Energy Production"),
        ("energy_prod_canada_growth_since_2005", "Canada Energy Production Growth Since 2005"),
        ("energy_prod_world_growth_since_2005", "World Energy Production Growth Since 2005"),
        ("energy_prod_china_pct", "China Share of World Energy Production"),
        ("energy_prod_united_states_pct", "United States Share of World Energy Production"),
        ("energy_prod_india_pct", "India Share of World Energy Production"),
        ("energy_prod_indonesia_pct", "Indonesia Share of World Energy Production"),
        ("energy_prod_australia_pct", "Australia Share of World Energy Production"),
    ];
    records.extend(
        shares
            .iter()
            .map(|(vector, title)| MetadataRecord::new(vector, title, "%", "percent")),
    );
    records
}
