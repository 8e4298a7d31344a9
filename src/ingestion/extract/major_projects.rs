//! Energy projects planned or under construction (NRCan MPI, Table 1)

use crate::ingestion::classify::{Classifier, Rule};
use crate::ingestion::derive::{billions_meta, count_meta};
use crate::ingestion::extract::mpi::{MpiParser, Projects, ProjectsByYear};
use crate::ingestion::html::{HtmlDocument, HtmlTable};
use crate::ingestion::types::{DataPoint, Extract, MetadataRecord};
use crate::round_to;
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "major_projects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Total,
    OilGas,
    Electricity,
    Other,
}

impl Category {
    pub fn key(&self) -> &'static str {
        match self {
            Category::Total => "total",
            Category::OilGas => "oil_gas",
            Category::Electricity => "electricity",
            Category::Other => "other",
        }
    }
}

const ROWS: &[Rule<Category>] = &[
    Rule::contains(Category::Total, "total energy"),
    Rule::contains(Category::OilGas, "oil and gas"),
    Rule::contains(Category::Electricity, "electricity"),
    Rule::contains(Category::Other, "other"),
];

const TEXT_LINES: [(Category, &str); 4] = [
    (Category::Total, r"Total Energy Projects[^\n]*"),
    (Category::OilGas, r"Oil and Gas[^\n]*"),
    (Category::Electricity, r"Electricity Generation[^\n]*"),
    (Category::Other, r"Other[^\n]*\$[\d.]+B"),
];

/// First table mentioning energy project totals or oil and gas
pub fn find_table(doc: &HtmlDocument) -> Option<&HtmlTable> {
    doc.tables.iter().find(|t| {
        let text = t.text();
        text.contains("Total Energy Projects") || text.contains("Oil and Gas")
    })
}

fn parse(doc: &HtmlDocument) -> Result<ProjectsByYear<Category>, regex::Error> {
    let parser = MpiParser::new()?;
    let classifier = Classifier::new(ROWS)?;

    let from_table = find_table(doc)
        .map(|t| parser.parse_table(t, &classifier))
        .unwrap_or_default();
    if !from_table.is_empty() {
        return Ok(from_table);
    }

    warn!("{}: could not parse energy table, using page text", SOURCE_KEY);
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
        warn!("{}: no energy project data on page", SOURCE_KEY);
        return out;
    }

    for (year, categories) in &data {
        let year = *year;
        let get = |c: Category| categories.get(&c).copied().unwrap_or_default();

        for category in [Category::OilGas, Category::Electricity, Category::Other] {
            let Projects { count, value } = get(category);
            if let Some(value) = value {
                out.data.push(DataPoint::new(format!("projects_{}_value", category.key()), year, value));
            }
            if let Some(count) = count {
                out.data.push(DataPoint::new(
                    format!("projects_{}_count", category.key()),
                    year,
                    count as f64,
                ));
            }
        }

        // Totals from the page, otherwise summed when every part is present
        let parts = [Category::OilGas, Category::Electricity, Category::Other].map(get);
        let total = get(Category::Total);

        let total_value = total.value.or_else(|| {
            parts
                .iter()
                .map(|p| p.value)
                .sum::<Option<f64>>()
                .map(|v| round_to(v, 1))
        });
        if let Some(value) = total_value {
            out.data.push(DataPoint::new("projects_total_value", year, value));
        }

        let total_count = total
            .count
            .or_else(|| parts.iter().map(|p| p.count).sum::<Option<i64>>());
        if let Some(count) = total_count {
            out.data.push(DataPoint::new("projects_total_count", year, count as f64));
        }
    }

    info!(
        "{}: {} data rows for years {:?}",
        SOURCE_KEY,
        out.data.len(),
        data.keys().collect::<Vec<_>>()
    );

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    let mut records = Vec::new();
    for (key, label) in [
        ("oil_gas", "Oil and gas"),
        ("electricity", "Electricity"),
        ("other", "Other"),
        ("total", "Total"),
    ] {
        records.push(billions_meta(
            &format!("projects_{}_value", key),
            &format!("{} - Project value", label),
        ));
        records.push(count_meta(
            &format!("projects_{}_count", key),
            &format!("{} - Number of projects", label),
        ));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::html::HtmlParser;

    const PAGE: &str = r#"
        <h2>Table 1: Energy projects</h2>
        <table>
          <thead><tr><th>Category</th><th>2023</th><th>2024</th></tr></thead>
          <tbody>
            <tr><td>Oil and Gas</td><td>120 ($250.5B)</td><td>125 ($260B)</td></tr>
            <tr><td>Electricity Generation</td><td>200 ($220B)</td><td>210 ($230B)</td></tr>
            <tr><td>Other</td><td>20 ($40.2B)</td><td>22 ($900M)</td></tr>
            <tr><td>Total Energy Projects</td><td>340 ($510.7B)</td><td></td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn test_table_values_and_totals() {
        let doc = HtmlParser::new().unwrap().parse(PAGE);
        let extract = extract(&doc);

        assert_eq!(extract.value("projects_oil_gas_value", 2023), Some(250.5));
        assert_eq!(extract.value("projects_other_value", 2024), Some(0.9));
        assert_eq!(extract.value("projects_total_value", 2023), Some(510.7));
        assert_eq!(extract.value("projects_total_count", 2023), Some(340.0));
        // 2024 has no published total; summed from the parts
        assert_eq!(extract.value("projects_total_value", 2024), Some(490.9));
        assert_eq!(extract.value("projects_total_count", 2024), Some(357.0));
        assert_eq!(extract.metadata.len(), 8);
    }

    #[test]
    fn test_text_fallback_without_table() {
        let page = "<p>Projects 2023 2024</p>\
                    <p>Total Energy Projects 340 ($510B) 350 ($530B)</p>\
                    <p>Oil and Gas 120 ($250B) 125 ($260B)</p>";
        let doc = HtmlParser::new().unwrap().parse(page);
        let extract = extract(&doc);

        assert_eq!(extract.value("projects_total_value", 2024), Some(530.0));
        assert_eq!(extract.value("projects_oil_gas_count", 2023), Some(120.0));
        assert_eq!(extract.value("projects_electricity_value", 2023), None);
    }

    #[test]
    fn test_page_without_projects() {
        let doc = HtmlParser::new().unwrap().parse("<p>Nothing to see</p>");
        assert!(extract(&doc).is_empty());
    }
}
