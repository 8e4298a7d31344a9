//! Canadian Energy Assets (NRCan CEA workbook): total, domestic, abroad and by region
//!
//! The summary ("Evolution" / "By region") pivot gives A1 (Grand Total) and A3 (Canada) per
//! year; A4 = A1 - A3. Years missing from the pivot fall back to the per-year detailed sheets.

use crate::ingestion::derive::{billions_meta, point};
use crate::ingestion::types::{Extract, MetadataRecord};
use crate::ingestion::workbook::Sheet;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const SOURCE_KEY: &str = "canadian_energy_assets";

const FIRST_YEAR: i32 = 2012;
const LAST_YEAR: i32 = 2023;

/// Label fragment (case-insensitive contains) to region key; first match wins
const REGIONS: [(&str, &str); 7] = [
    ("Africa", "africa"),
    ("Asia", "asia"),
    ("Canada", "canada"),
    ("Europe", "europe"),
    ("Latin America and Caribbean", "latin_america"),
    ("North America (US and Mexico)", "north_america"),
    ("Oceania", "oceania"),
];

#[derive(Debug, Clone, Default, PartialEq)]
struct YearAssets {
    total: f64,
    domestic: f64,
    abroad: f64,
    regions: BTreeMap<&'static str, f64>,
}

fn region_key(label: &str) -> Option<&'static str> {
    let label = label.to_lowercase();
    REGIONS
        .iter()
        .find(|(fragment, _)| label.contains(&fragment.to_lowercase()))
        .map(|(_, key)| *key)
}

/// First run of four digits in `text`
fn first_year(text: &str) -> Option<i32> {
    text.as_bytes()
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|i| text[i..i + 4].parse().ok())
}

fn in_range(year: i32) -> bool {
    (FIRST_YEAR..=LAST_YEAR).contains(&year)
}

fn is_assets_header(lower: &str) -> bool {
    lower.contains("non-current") || lower.contains("noncurrent") || lower.contains("assets")
}

fn is_summary_sheet(name: &str) -> bool {
    name.to_lowercase().contains("evolution")
}

/// Detailed sheet year, e.g. "Canadian Energy Assets 2019"
fn detailed_sheet_year(name: &str) -> Option<i32> {
    if !name.contains("Canadian Energy Assets") {
        return None;
    }
    first_year(name).filter(|y| in_range(*y))
}

fn header_row(sheet: &Sheet) -> Option<usize> {
    let rows = sheet.rows.len().min(100);

    let evolution_start = (0..rows).find(|&r| {
        let text = (0..5)
            .map(|c| sheet.cell(r, c))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        text.to_lowercase().contains("evolution") && text.contains("2012") && text.contains("2023")
    });
    let (start, end) = match evolution_start {
        Some(start) => (start, (start + 20).min(sheet.rows.len())),
        None => (0, rows),
    };

    let mut header = None;
    let mut has_years = false;

    for r in start..end {
        for c in 0..15 {
            let lower = sheet.cell(r, c).to_lowercase();
            if lower.contains("row labels") && header.is_none() {
                header = Some(r);
            }
            let sum_header = lower.contains("assets") && (lower.contains("somme") || lower.contains("sum"));
            if lower.contains("non-current") || lower.contains("noncurrent") || sum_header {
                if first_year(&lower).is_some_and(in_range) {
                    header.get_or_insert(r);
                    has_years = true;
                }
            }
        }
    }

    header.filter(|_| has_years)
}

fn parse_summary(sheet: &Sheet) -> BTreeMap<i32, YearAssets> {
    let mut years = BTreeMap::new();

    let Some(header) = header_row(sheet) else {
        warn!("{}: no Row Labels header in sheet '{}'", SOURCE_KEY, sheet.name);
        return years;
    };
    let headers = sheet.rows.get(header).cloned().unwrap_or_default();

    let label_col = headers
        .iter()
        .position(|h| h.to_lowercase().contains("row labels"));
    let mut year_cols = BTreeMap::new();
    for (c, h) in headers.iter().enumerate() {
        let lower = h.to_lowercase();
        if is_assets_header(&lower) {
            if let Some(year) = first_year(h).filter(|y| in_range(*y)) {
                year_cols.insert(year, c);
            }
        }
    }

    let Some(label_col) = label_col else {
        warn!("{}: sheet '{}' has year columns but no Row Labels", SOURCE_KEY, sheet.name);
        return years;
    };

    for (year, col) in year_cols {
        let mut assets = YearAssets::default();
        let mut column_sum = 0.0;

        for r in header + 1..sheet.rows.len() {
            let Some(value) = sheet.number(r, col) else {
                continue;
            };
            column_sum += value;
            if value == 0.0 {
                continue;
            }

            let label = sheet.cell(r, label_col);
            if label.contains("Grand Total") {
                assets.total = value;
                continue;
            }
            if label.contains("Total ABROAD") || label.contains("Total Abroad") {
                continue;
            }
            if let Some(region) = region_key(label) {
                *assets.regions.entry(region).or_insert(0.0) += value;
                if region == "canada" && assets.domestic == 0.0 {
                    assets.domestic = value;
                }
            }
        }

        if assets.total == 0.0 {
            assets.total = column_sum;
        }
        assets.abroad = assets.total - assets.domestic;

        debug!(
            "{}: {} A1={:.0} A3={:.0} A4={:.0}",
            SOURCE_KEY, year, assets.total, assets.domestic, assets.abroad
        );
        years.insert(year, assets);
    }

    years
}

fn position_containing(headers: &[String], needle: &str) -> Option<usize> {
    headers.iter().position(|h| h.to_lowercase().contains(needle))
}

fn parse_detailed(sheet: &Sheet, year: i32) -> Option<YearAssets> {
    let headers = sheet.rows.first()?;
    let year_label = year.to_string();

    let assets_col = headers.iter().position(|h| {
        let lower = h.to_lowercase();
        (lower.contains("non-current") || lower.contains("noncurrent")) && h.contains(&year_label)
    })?;
    let country_col = position_containing(headers, "country");
    let continent_col = position_containing(headers, "continent");

    let rows: Vec<(usize, f64)> = (1..sheet.rows.len())
        .filter_map(|r| sheet.number(r, assets_col).map(|v| (r, v)))
        .collect();

    let total: f64 = rows.iter().map(|(_, v)| v).sum();
    let domestic = match country_col.or(continent_col) {
        Some(col) => rows
            .iter()
            .filter(|(r, _)| sheet.cell(*r, col).to_lowercase().contains("canada"))
            .map(|(_, v)| v)
            .sum(),
        None => 0.0,
    };

    let mut regions = BTreeMap::new();
    if let Some(col) = continent_col {
        let mut by_continent: BTreeMap<&str, f64> = BTreeMap::new();
        for (r, v) in &rows {
            *by_continent.entry(sheet.cell(*r, col)).or_insert(0.0) += v;
        }
        for (continent, value) in by_continent {
            if let Some(region) = region_key(continent) {
                regions.insert(region, value);
            }
        }
    }

    Some(YearAssets {
        total,
        domestic,
        abroad: total - domestic,
        regions,
    })
}

pub fn extract(sheets: &[Sheet]) -> Extract {
    let mut out = Extract::default();

    let detailed: BTreeMap<i32, &Sheet> = sheets
        .iter()
        .filter_map(|s| detailed_sheet_year(&s.name).map(|y| (y, s)))
        .collect();

    let summary = sheets
        .iter()
        .find(|s| is_summary_sheet(&s.name))
        .or_else(|| sheets.iter().find(|s| s.name == "By region"))
        .or_else(|| if detailed.is_empty() { sheets.first() } else { None });

    let mut years = summary.map(parse_summary).unwrap_or_default();

    for (year, sheet) in detailed {
        if years.contains_key(&year) {
            continue;
        }
        match parse_detailed(sheet, year) {
            Some(assets) => {
                years.insert(year, assets);
            }
            None => warn!("{}: no non-current assets column in '{}'", SOURCE_KEY, sheet.name),
        }
    }

    if years.is_empty() {
        warn!("{}: no data extracted from any sheet", SOURCE_KEY);
        return out;
    }

    for (year, mut assets) in years {
        if assets.domestic == 0.0 {
            if let Some(canada) = assets.regions.get("canada") {
                assets.domestic = *canada;
                assets.abroad = assets.total - assets.domestic;
            }
        }

        out.data.push(point("cea_total", year, assets.total / 1000.0, 1));
        out.data.push(point("cea_domestic", year, assets.domestic / 1000.0, 1));
        out.data.push(point("cea_abroad", year, assets.abroad / 1000.0, 1));

        for (region, value) in assets.regions.iter().filter(|(_, v)| **v > 0.0) {
            out.data.push(point(&format!("cea_{}", region), year, value / 1000.0, 1));
        }
    }

    info!("{}: {} data rows", SOURCE_KEY, out.data.len());

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    [
        ("cea_total", "Canadian Energy Assets - Total (A1)"),
        ("cea_domestic", "Canadian Energy Assets - Domestic (A3, Country=Canada)"),
        ("cea_abroad", "Canadian Energy Assets - Abroad (A4)"),
        ("cea_canada", "Canadian Energy Assets - Canada (by Continent)"),
        ("cea_north_america", "Canadian Energy Assets - North America (US and Mexico)"),
        ("cea_latin_america", "Canadian Energy Assets - Latin America and Caribbean"),
        ("cea_europe", "Canadian Energy Assets - Europe"),
        ("cea_africa", "Canadian Energy Assets - Africa"),
        ("cea_asia", "Canadian Energy Assets - Asia"),
        ("cea_oceania", "Canadian Energy Assets - Oceania"),
    ]
    .iter()
    .map(|(vector, title)| billions_meta(vector, title))
    .collect()
}
