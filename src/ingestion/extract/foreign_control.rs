//! Foreign-controlled share of assets (StatCan 33-10-0570-01)

use crate::ingestion::derive::{percent_meta, point};
use crate::ingestion::extract::{group_by_year, warn_missing};
use crate::ingestion::table::Table;
use crate::ingestion::types::{Extract, MetadataRecord};
use tracing::info;

pub const SOURCE_KEY: &str = "foreign_control";

/// StatCan wording is matched exactly; a relabelled industry silently drops out
const INDUSTRIES: [(&str, &str); 3] = [
    (
        "Total non-financial industries (excluding management of companies and enterprises)",
        "foreign_all_non_financial",
    ),
    (
        "Oil and gas extraction and support activities [211, 213]",
        "foreign_oil_gas",
    ),
    ("Utilities [22]", "foreign_utilities"),
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
    let (Some(date_col), Some(value_col)) = (table.column(&["REF_DATE"]), table.column(&["VALUE"]))
    else {
        warn_missing(SOURCE_KEY, "REF_DATE/VALUE", table);
        return out;
    };

    let rows: Vec<usize> = (0..table.len()).collect();

    for (year, rows) in group_by_year(table, &rows, date_col) {
        for (label, vector) in INDUSTRIES {
            // First row for the industry wins; a blank value emits nothing
            let first = rows
                .iter()
                .find(|&&r| table.cell(r, naics_col) == Some(label));
            if let Some(value) = first.and_then(|&r| table.number(r, value_col)) {
                out.data.push(point(vector, year, value, 1));
            }
        }
    }

    info!("{}: {} data rows", SOURCE_KEY, out.data.len());

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        percent_meta("foreign_all_non_financial", "Foreign control - Total non-financial industries"),
        percent_meta("foreign_oil_gas", "Foreign control - Oil and gas extraction"),
        percent_meta("foreign_utilities", "Foreign control - Utilities"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_labels_only() {
        let rows = vec![
            vec!["2021", "Utilities [22]", "45.06"],
            vec!["2021", "Utilities [22]", "99"],
            vec!["2021", "Oil and gas extraction and support activities [211,213]", "30"],
            vec!["2021", "Oil and gas extraction and support activities [211, 213]", ""],
            vec!["2022", "Oil and gas extraction and support activities [211, 213]", "28.44"],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect();
        let table = Table::from_rows(&["REF_DATE", "NAICS", "VALUE"], rows);

        let extract = extract(&table);

        assert_eq!(extract.value("foreign_utilities", 2021), Some(45.1));
        assert_eq!(extract.value("foreign_oil_gas", 2021), None);
        assert_eq!(extract.value("foreign_oil_gas", 2022), Some(28.4));
        assert_eq!(extract.data.len(), 2);
        assert_eq!(extract.metadata[0].uom, "Percent");
    }
}
