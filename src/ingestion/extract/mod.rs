//! Source extractors - pure functions from fetched tables to semantic vectors
//!
//! Each extractor returns an [`Extract`](crate::ingestion::types::Extract). Shape problems
//! (missing columns, unrecognized labels) degrade to a warning and an empty or partial
//! result; nothing here returns an error.

pub mod asset;
pub mod capex;
pub mod cea;
pub mod clean_tech;
pub mod economic;
pub mod environmental;
pub mod foreign_control;
pub mod infrastructure;
pub mod international;
pub mod major_projects;
pub mod map;
pub mod mpi;
pub mod nominal_gdp;
pub mod provincial;
pub mod world_energy;

use crate::ingestion::table::Table;
use std::collections::BTreeMap;
use tracing::warn;

/// Rows grouped by the integer year in `date_col`
pub(crate) fn group_by_year(
    table: &Table,
    rows: &[usize],
    date_col: usize,
) -> BTreeMap<i32, Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        if let Some(year) = table.year(row, date_col) {
            groups.entry(year).or_default().push(row);
        }
    }
    groups
}

pub(crate) fn warn_missing(source_key: &str, what: &str, table: &Table) {
    warn!(
        "{}: no {} column found. Columns: {:?}",
        source_key,
        what,
        table.headers.iter().take(10).collect::<Vec<_>>()
    );
}

/// Rows whose cell in `col` equals `expected` exactly
pub(crate) fn rows_equal(table: &Table, col: usize, expected: &str) -> Vec<usize> {
    table.select(|r| table.cell(r, col) == Some(expected))
}

/// Normalized vector id with a leading `v`
pub(crate) fn vector_id(cell: &str) -> String {
    if cell.starts_with('v') {
        cell.to_string()
    } else {
        format!("v{}", cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_year() {
        let table = Table::from_rows(
            &["REF_DATE", "VALUE"],
            vec![
                vec!["2021".to_string(), "1".to_string()],
                vec!["2022".to_string(), "2".to_string()],
                vec!["n/a".to_string(), "3".to_string()],
                vec!["2021".to_string(), "4".to_string()],
            ],
        );
        let rows: Vec<usize> = (0..table.len()).collect();
        let groups = group_by_year(&table, &rows, 0);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&2021], vec![0, 3]);
        assert_eq!(groups[&2022], vec![1]);
    }

    #[test]
    fn test_vector_id() {
        assert_eq!(vector_id("1043878336"), "v1043878336");
        assert_eq!(vector_id("v1043878336"), "v1043878336");
    }
}
