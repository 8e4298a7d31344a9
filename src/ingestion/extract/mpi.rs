//! Shared parsing for the NRCan Major Projects Inventory tables
//!
//! Cells read like `120 ($45.2B)`: a project count followed by a value in billions
//! (or millions with an `M` suffix). Years come from the header rows.

use crate::ingestion::classify::Classifier;
use crate::ingestion::html::HtmlTable;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use tracing::debug;

const FIRST_YEAR: i32 = 2015;
const LAST_YEAR: i32 = 2050;
const MAX_TEXT_YEARS: usize = 10;

/// Project count and value (billions of dollars) for one category and year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Projects {
    pub count: Option<i64>,
    pub value: Option<f64>,
}

/// year -> category -> projects
pub type ProjectsByYear<C> = BTreeMap<i32, BTreeMap<C, Projects>>;

pub struct MpiParser {
    year: Regex,
    count: Regex,
    value: Regex,
    text_cell: Regex,
}

impl MpiParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            year: Regex::new(r"\b(20\d{2})\b")?,
            count: Regex::new(r"^(\d+)")?,
            value: Regex::new(r"\$?([\d.]+)([BM])\)?")?,
            text_cell: Regex::new(r"(\d+)\s*\(\$?([\d.]+)B\)")?,
        })
    }

    pub fn parse_cell(&self, text: &str) -> Projects {
        let text = text.trim();

        let count = self
            .count
            .captures(text)
            .and_then(|c| c[1].parse::<i64>().ok());
        let value = self.value.captures(text).and_then(|c| {
            let value = c[1].parse::<f64>().ok()?;
            Some(if &c[2] == "M" { value / 1000.0 } else { value })
        });

        Projects { count, value }
    }

    fn years_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = i32> + 'a {
        self.year
            .captures_iter(text)
            .filter_map(|c| c[1].parse::<i32>().ok())
            .filter(|y| (FIRST_YEAR..=LAST_YEAR).contains(y))
    }

    /// First ten distinct years in `text`, sorted
    pub fn text_years(&self, text: &str) -> Vec<i32> {
        let mut years = Vec::new();
        for year in self.years_in(text) {
            if !years.contains(&year) {
                years.push(year);
                if years.len() >= MAX_TEXT_YEARS {
                    break;
                }
            }
        }
        years.sort_unstable();
        years
    }

    /// Years from the first three rows, falling back to the whole table text
    pub fn table_years(&self, table: &HtmlTable) -> Vec<i32> {
        let mut years = Vec::new();
        for cell in table.rows.iter().take(3).flatten() {
            for year in self.years_in(cell) {
                if !years.contains(&year) {
                    years.push(year);
                }
            }
        }

        if years.is_empty() {
            return self.text_years(&table.text());
        }
        years.sort_unstable();
        years
    }

    /// (column, year) pairs from the first row mentioning (nearly) all the years
    fn year_positions(&self, table: &HtmlTable, years: &[i32]) -> Vec<(usize, i32)> {
        let labels: Vec<String> = years.iter().map(|y| y.to_string()).collect();

        let header = table.rows.iter().find(|row| {
            let text = row.join(" ");
            let hits = labels.iter().filter(|l| text.contains(l.as_str())).count();
            hits + 1 >= labels.len()
        });

        let mut positions: Vec<(usize, i32)> = Vec::new();
        if let Some(header) = header {
            for (i, cell) in header.iter().enumerate() {
                let unused = years
                    .iter()
                    .zip(&labels)
                    .find(|(y, l)| cell.contains(l.as_str()) && !positions.iter().any(|(_, p)| p == *y));
                if let Some((year, _)) = unused {
                    positions.push((i, *year));
                }
            }
        }

        if positions.is_empty() {
            positions = years.iter().enumerate().map(|(i, y)| (i + 1, *y)).collect();
        }
        positions
    }

    /// Rows whose first cell names a category, read at each year's column
    pub fn parse_table<C: Copy + Ord>(
        &self,
        table: &HtmlTable,
        categories: &Classifier<C>,
    ) -> ProjectsByYear<C> {
        let mut data: ProjectsByYear<C> = BTreeMap::new();

        let years = self.table_years(table);
        if years.is_empty() {
            return data;
        }
        debug!("MPI table years: {:?}", years);

        let positions = self.year_positions(table, &years);

        for row in table.rows.iter().filter(|r| r.len() >= 2) {
            let Some(category) = categories.first(&row[0]) else {
                continue;
            };
            for (col, year) in &positions {
                let Some(cell) = row.get(*col) else {
                    continue;
                };
                let parsed = self.parse_cell(cell);
                let entry = data.entry(*year).or_default().entry(category).or_default();
                if parsed.count.is_some() {
                    entry.count = parsed.count;
                }
                if parsed.value.is_some() {
                    entry.value = parsed.value;
                }
            }
        }

        data
    }

    /// Page-text fallback: one case-insensitive line pattern per category, cells in year order
    pub fn parse_text<C: Copy + Ord>(
        &self,
        text: &str,
        lines: &[(C, &str)],
    ) -> Result<ProjectsByYear<C>, regex::Error> {
        let mut data: ProjectsByYear<C> = BTreeMap::new();

        let years = self.text_years(text);
        if years.is_empty() {
            return Ok(data);
        }

        for (category, pattern) in lines {
            let line = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            let Some(found) = line.find(text) else {
                continue;
            };

            for (cell, year) in self.text_cell.captures_iter(found.as_str()).zip(&years) {
                let count = cell[1].parse::<i64>().ok();
                let value = cell[2].parse::<f64>().ok();
                data.entry(*year)
                    .or_default()
                    .insert(*category, Projects { count, value });
            }
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::classify::Rule;

    fn table(rows: &[&[&str]]) -> HtmlTable {
        HtmlTable {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_parse_cell() {
        let parser = MpiParser::new().unwrap();

        assert_eq!(
            parser.parse_cell("120 ($45.2B)"),
            Projects { count: Some(120), value: Some(45.2) }
        );
        let millions = parser.parse_cell("3 ($750M)");
        assert_eq!(millions.count, Some(3));
        assert!((millions.value.unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(parser.parse_cell("n/a"), Projects::default());
    }

    #[test]
    fn test_years_from_header_rows() {
        let parser = MpiParser::new().unwrap();
        let t = table(&[
            &["Category", "2024", "2023", "2014"],
            &["Total", "1 ($1B)", "2 ($2B)", "3 ($3B)"],
        ]);
        assert_eq!(parser.table_years(&t), vec![2023, 2024]);
    }

    #[test]
    fn test_text_years_first_ten_distinct() {
        let parser = MpiParser::new().unwrap();
        let text = "2030 2016 2016 2017 2018 2019 2020 2021 2022 2023 2024 2025";
        let years = parser.text_years(text);
        assert_eq!(years.len(), 10);
        assert_eq!(years[0], 2016);
        assert!(!years.contains(&2025));
    }

    #[test]
    fn test_parse_table_by_header_position() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        enum Cat {
            Total,
            Oil,
        }
        let rules = [Rule::contains(Cat::Total, "total"), Rule::contains(Cat::Oil, "oil")];
        let classifier = Classifier::new(&rules).unwrap();
        let parser = MpiParser::new().unwrap();

        let t = table(&[
            &["Table 1", "Major projects"],
            &["", "2023", "2024"],
            &["Oil and Gas", "100 ($300B)", "110 ($320.5B)"],
            &["Total", "200 ($500B)", "210 ($520B)"],
        ]);

        let data = parser.parse_table(&t, &classifier);
        assert_eq!(data[&2024][&Cat::Oil].value, Some(320.5));
        assert_eq!(data[&2023][&Cat::Total].count, Some(200));
    }

    #[test]
    fn test_parse_text_fallback() {
        let parser = MpiParser::new().unwrap();
        let text = "Planned 2023 and 2024\nTotal Energy Projects 340 ($510B) 350 ($530.1B)\nnotes";

        let data = parser
            .parse_text(text, &[("total", r"Total Energy Projects[^\n]*")])
            .unwrap();

        assert_eq!(data[&2023]["total"], Projects { count: Some(340), value: Some(510.0) });
        assert_eq!(data[&2024]["total"].value, Some(530.1));
    }
}
