//! Clean technology projects by technology (NRCan MPI, Table 4)

use crate::ingestion::classify::{Classifier, Rule};
use crate::ingestion::derive::{billions_meta, count_meta};
use crate::ingestion::extract::mpi::{MpiParser, ProjectsByYear};
use crate::ingestion::html::{HtmlDocument, HtmlTable};
use crate::ingestion::types::{CalcBatch, CleanTechCalc, DataPoint, Extract, MetadataRecord};
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "clean_tech";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Technology {
    Total,
    Hydro,
    Wind,
    Biomass,
    Solar,
    Nuclear,
    Ccs,
    Geothermal,
    Tidal,
    Storage,
    Multiple,
    Other,
}

/// Output order
pub const TECHNOLOGIES: [Technology; 12] = [
    Technology::Total,
    Technology::Hydro,
    Technology::Wind,
    Technology::Biomass,
    Technology::Solar,
    Technology::Nuclear,
    Technology::Ccs,
    Technology::Geothermal,
    Technology::Tidal,
    Technology::Storage,
    Technology::Multiple,
    Technology::Other,
];

impl Technology {
    pub fn key(&self) -> &'static str {
        match self {
            Technology::Total => "total",
            Technology::Hydro => "hydro",
            Technology::Wind => "wind",
            Technology::Biomass => "biomass",
            Technology::Solar => "solar",
            Technology::Nuclear => "nuclear",
            Technology::Ccs => "ccs",
            Technology::Geothermal => "geothermal",
            Technology::Tidal => "tidal",
            Technology::Storage => "storage",
            Technology::Multiple => "multiple",
            Technology::Other => "other",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Technology::Total => "Total clean technology",
            Technology::Hydro => "Hydro",
            Technology::Wind => "Wind",
            Technology::Biomass => "Biomass/Biofuels",
            Technology::Solar => "Solar",
            Technology::Nuclear => "Nuclear",
            Technology::Ccs => "Carbon Capture and Storage",
            Technology::Geothermal => "Geothermal",
            Technology::Tidal => "Tidal",
            Technology::Storage => "Energy Storage",
            Technology::Multiple => "Multiple",
            Technology::Other => "Other",
        }
    }
}

/// Row labels, first match wins
const ROWS: &[Rule<Technology>] = &[
    Rule::contains(Technology::Total, "total clean technology"),
    Rule::contains(Technology::Hydro, "hydro"),
    Rule::contains(Technology::Biomass, "bioenergy"),
    Rule::contains(Technology::Biomass, "biomass"),
    Rule::contains(Technology::Solar, "solar"),
    Rule::contains(Technology::Wind, "wind"),
    Rule::contains(Technology::Ccs, "carbon capture"),
    Rule::contains(Technology::Tidal, "tidal"),
    Rule::contains(Technology::Geothermal, "geothermal"),
    Rule::contains(Technology::Nuclear, "nuclear"),
    Rule::contains(Technology::Storage, "energy storage"),
    Rule::contains(Technology::Multiple, "multiple"),
    Rule::contains(Technology::Other, "other"),
];

const TEXT_LINES: [(Technology, &str); 12] = [
    (Technology::Total, r"Total Clean Technology[^\n]*"),
    (Technology::Hydro, r"\bHydro[^\n]*\$[\d.]+B"),
    (Technology::Wind, r"\bWind[^\n]*\$[\d.]+B"),
    (Technology::Solar, r"\bSolar[^\n]*\$[\d.]+B"),
    (Technology::Nuclear, r"\bNuclear[^\n]*\$[\d.]+B"),
    (Technology::Ccs, r"Carbon Capture[^\n]*\$[\d.]+B"),
    (Technology::Biomass, r"\bBioenergy[^\n]*\$[\d.]+B"),
    (Technology::Tidal, r"\bTidal[^\n]*\$[\d.]+B"),
    (Technology::Geothermal, r"\bGeothermal[^\n]*\$[\d.]+B"),
    (Technology::Storage, r"Energy Storage[^\n]*\$[\d.]+B"),
    (Technology::Multiple, r"\bMultiple[^\n]*\$[\d.]+B"),
    (Technology::Other, r"\bOther1?[^\n]*\$[\d.]+B"),
];

/// First table with a clean technology total (or hydro row) and a carbon capture row
pub fn find_table(doc: &HtmlDocument) -> Option<&HtmlTable> {
    doc.tables.iter().find(|t| {
        let text = t.text();
        (text.contains("Total Clean Technology") || text.contains("Hydro"))
            && text.contains("Carbon Capture")
    })
}

fn parse(doc: &HtmlDocument) -> Result<ProjectsByYear<Technology>, regex::Error> {
    let parser = MpiParser::new()?;
    let classifier = Classifier::new(ROWS)?;

    let from_table = find_table(doc)
        .map(|t| parser.parse_table(t, &classifier))
        .unwrap_or_default();
    if !from_table.is_empty() {
        return Ok(from_table);
    }

    warn!("{}: could not parse clean technology table, using page text", SOURCE_KEY);
    parser.parse_text(&doc.text, &TEXT_LINES)
}

pub fn extract(doc: &HtmlDocument) -> Extract {
    let mut out = Extract::default();

    let data = match parse(doc) {
        Ok(data) => data,
        Err(e) => {
            warn!("{}: invalid page patterns: {}", SOURCE_KEY, e);
            return out;
        }
    };
    if data.is_empty() {
        warn!("{}: no clean technology data on page", SOURCE_KEY);
        return out;
    }

    let mut calc = Vec::new();

    for (year, technologies) in &data {
        for tech in TECHNOLOGIES {
            let Some(projects) = technologies.get(&tech) else {
                continue;
            };
            if let Some(count) = projects.count {
                out.data.push(DataPoint::new(
                    format!("cleantech_{}_count", tech.key()),
                    *year,
                    count as f64,
                ));
            }
            if let Some(value) = projects.value {
                out.data.push(DataPoint::new(format!("cleantech_{}_value", tech.key()), *year, value));
            }
            if projects.count.is_some() || projects.value.is_some() {
                calc.push(CleanTechCalc {
                    ref_year: *year,
                    category: tech.key().to_string(),
                    project_count: projects.count,
                    project_value: projects.value,
                });
            }
        }
    }

    info!("{}: {} data rows, {} calc rows", SOURCE_KEY, out.data.len(), calc.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::CleanTech(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    let mut records = Vec::with_capacity(TECHNOLOGIES.len() * 2);
    for tech in TECHNOLOGIES {
        records.push(count_meta(
            &format!("cleantech_{}_count", tech.key()),
            &format!("{} - Number of projects", tech.label()),
        ));
        records.push(billions_meta(
            &format!("cleantech_{}_value", tech.key()),
            &format!("{} - Project value", tech.label()),
        ));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::html::HtmlParser;

    const PAGE: &str = r#"
        <table>
          <tr><th>Technology</th><th>2023</th><th>2024</th></tr>
          <tr><td>Oil and Gas</td><td>120 ($250B)</td><td>125 ($260B)</td></tr>
        </table>
        <table>
          <tr><th>Clean technology</th><th>2023</th><th>2024</th></tr>
          <tr><td>Hydro</td><td>40 ($90.5B)</td><td>42 ($95B)</td></tr>
          <tr><td>Bioenergy</td><td>15 ($6B)</td><td>16 ($7B)</td></tr>
          <tr><td>Carbon Capture, Use and Storage</td><td>12 ($30B)</td><td>14 ($35B)</td></tr>
          <tr><td>Energy Storage</td><td>5 ($400M)</td><td>6 ($2B)</td></tr>
          <tr><td>Total Clean Technology</td><td>150 ($200B)</td><td>160 ($210B)</td></tr>
        </table>"#;

    #[test]
    fn test_clean_tech_table() {
        let doc = HtmlParser::new().unwrap().parse(PAGE);
        let extract = extract(&doc);

        assert_eq!(extract.value("cleantech_hydro_value", 2023), Some(90.5));
        assert_eq!(extract.value("cleantech_biomass_count", 2024), Some(16.0));
        assert_eq!(extract.value("cleantech_ccs_count", 2023), Some(12.0));
        assert_eq!(extract.value("cleantech_storage_value", 2023), Some(0.4));
        assert_eq!(extract.value("cleantech_total_value", 2024), Some(210.0));
        assert_eq!(extract.value("cleantech_wind_count", 2023), None);
        assert_eq!(extract.metadata.len(), 24);
        assert_eq!(extract.calc[0].len(), 10);
    }

    #[test]
    fn test_output_order_starts_with_total() {
        let doc = HtmlParser::new().unwrap().parse(PAGE);
        let extract = extract(&doc);

        assert_eq!(extract.data[0].vector, "cleantech_total_count");
        assert_eq!(extract.data[1].vector, "cleantech_total_value");
        assert_eq!(extract.data[2].vector, "cleantech_hydro_count");
    }
}
