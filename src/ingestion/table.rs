//! Header-indexed string grid parsed from StatCan CSV downloads

use crate::error::FetchError;
use crate::ingestion::types::{DataPoint, MetadataRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV text, stripping a leading UTF-8 BOM from the first header
    pub fn from_csv(text: &str) -> Result<Self, FetchError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        debug!("Parsed table with {} columns, {} rows", headers.len(), rows.len());

        Ok(Self { headers, rows })
    }

    pub fn from_rows(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First header matching any candidate, case-insensitive
    pub fn column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        })
    }

    /// First header satisfying the predicate (given the lowercased header)
    pub fn find_column<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.headers
            .iter()
            .position(|h| predicate(&h.to_lowercase()))
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|c| c.trim())
    }

    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col).and_then(parse_number)
    }

    pub fn year(&self, row: usize, col: usize) -> Option<i32> {
        self.cell(row, col).and_then(parse_year)
    }

    /// Row indices for which `predicate` holds
    pub fn select<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(usize) -> bool,
    {
        (0..self.rows.len()).filter(|&i| predicate(i)).collect()
    }

    /// Sorted distinct years found in `col` among `rows`
    pub fn years(&self, rows: &[usize], col: usize) -> Vec<i32> {
        let mut years: Vec<i32> = rows
            .iter()
            .filter_map(|&r| self.year(r, col))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        years.sort_unstable();
        years
    }

    /// Sum of numeric `value_col` cells among `rows`; unparseable cells count as zero
    pub fn sum(&self, rows: &[usize], value_col: usize) -> f64 {
        rows.iter().filter_map(|&r| self.number(r, value_col)).sum()
    }
}

/// Lenient numeric parse: empty or unparseable cells give None
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whole-cell integer year; "2022.0" is accepted since spreadsheets render years as floats
pub fn parse_year(cell: &str) -> Option<i32> {
    let cell = cell.trim();
    if let Ok(year) = cell.parse::<i32>() {
        return Some(year);
    }
    parse_number(cell)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i32)
}

/// Native StatCan points and one metadata record per vector
pub fn native_points(table: &Table, source_key: &str) -> (Vec<DataPoint>, Vec<MetadataRecord>) {
    let mut points = Vec::new();
    let mut metadata = Vec::new();

    let (Some(vector_col), Some(date_col)) = (
        table.column(&["VECTOR"]),
        table.column(&["REF_DATE"]),
    ) else {
        warn!(
            "{}: no VECTOR/REF_DATE column found. Columns: {:?}",
            source_key,
            table.headers.iter().take(10).collect::<Vec<_>>()
        );
        return (points, metadata);
    };

    let value_col = table.column(&["VALUE"]);
    let coord_col = table.column(&["Coordinate"]);
    let uom_col = table.column(&["UOM", "UNIT_MEASURE", "Unit of measure"]);
    let scalar_col = table.column(&["SCALAR_FACTOR"]);

    let mut seen = HashSet::new();

    for row in 0..table.len() {
        let vector = match table.cell(row, vector_col) {
            Some(v) if !v.is_empty() => {
                if v.starts_with('v') {
                    v.to_string()
                } else {
                    format!("v{}", v)
                }
            }
            _ => continue,
        };

        let ref_date = table.cell(row, date_col).unwrap_or_default();
        let value = value_col.and_then(|c| table.number(row, c));

        match value {
            Some(value) if !ref_date.is_empty() => points.push(DataPoint {
                vector: vector.clone(),
                ref_date: ref_date.to_string(),
                value,
            }),
            _ => {}
        }

        if seen.insert(vector.clone()) {
            let text = |col: Option<usize>| {
                col.and_then(|c| table.cell(row, c))
                    .unwrap_or_default()
                    .to_string()
            };
            let title = text(coord_col);
            if !title.is_empty() {
                metadata.push(MetadataRecord {
                    vector,
                    title,
                    uom: text(uom_col),
                    scalar_factor: text(scalar_col),
                });
            }
        }
    }

    (points, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}REF_DATE,GEO,VECTOR,COORDINATE,UOM,SCALAR_FACTOR,VALUE\n\
        2021,Canada,v1043878336,1.1.3,Dollars,millions,120.5\n\
        2022,Canada,v1043878336,1.1.3,Dollars,millions,130\n\
        2022,Canada,1043880016,1.2.3,Dollars,millions,\n\
        2022,Canada,,1.3.3,Dollars,millions,5\n";

    #[test]
    fn test_from_csv_strips_bom() {
        let table = Table::from_csv(SAMPLE).unwrap();

        assert_eq!(table.headers[0], "REF_DATE");
        assert_eq!(table.len(), 4);
        assert_eq!(table.column(&["ref_date"]), Some(0));
        assert_eq!(table.column(&["missing", "Value"]), Some(6));
    }

    #[test]
    fn test_number_coerces_blanks() {
        let table = Table::from_csv(SAMPLE).unwrap();

        assert_eq!(table.number(0, 6), Some(120.5));
        assert_eq!(table.number(2, 6), None);
        assert_eq!(table.year(1, 0), Some(2022));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2022"), Some(2022));
        assert_eq!(parse_year("2022.0"), Some(2022));
        assert_eq!(parse_year("2022-01"), None);
        assert_eq!(parse_number("x"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_native_points() {
        let table = Table::from_csv(SAMPLE).unwrap();
        let (points, metadata) = native_points(&table, "infrastructure");

        // Blank value and blank vector rows are skipped
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].vector, "v1043878336");
        assert_eq!(points[1].ref_date, "2022");
        assert_eq!(points[1].value, 130.0);

        // One record per vector; the v prefix is added when missing
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[1].vector, "v1043880016");
        assert_eq!(metadata[1].title, "1.2.3");
        assert_eq!(metadata[1].scalar_factor, "millions");
    }

    #[test]
    fn test_native_points_without_vector_column() {
        let table = Table::from_csv("REF_DATE,GEO,VALUE\n2022,Canada,1\n").unwrap();
        let (points, metadata) = native_points(&table, "capital_expenditures");

        assert!(points.is_empty());
        assert!(metadata.is_empty());
    }
}
