//! Local Excel workbooks (IEA balances, CEA assets) read into text grids

use crate::ingestion::table::{parse_number, Table};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info};

/// One worksheet with every cell rendered as text
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: &str, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_string(),
            rows,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|c| c.trim())
            .unwrap_or_default()
    }

    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        parse_number(self.cell(row, col))
    }

    /// Table using `header_row` as headers and everything below it as rows
    pub fn to_table(&self, header_row: usize) -> Table {
        let headers = self
            .rows
            .get(header_row)
            .map(|r| r.iter().map(|h| h.trim().to_string()).collect())
            .unwrap_or_default();
        let rows = self.rows.iter().skip(header_row + 1).cloned().collect();

        Table { headers, rows }
    }
}

fn render(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.0}", f),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read the named sheets; all of them when `names` is None
pub fn read_sheets(path: &Path, names: Option<&[&str]>) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let wanted: Vec<String> = match names {
        Some(names) => names.iter().map(|n| n.to_string()).collect(),
        None => workbook.sheet_names().to_vec(),
    };
    info!("Reading {} sheet(s) from {}", wanted.len(), path.display());

    let mut sheets = Vec::with_capacity(wanted.len());
    for name in wanted {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}'", name))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(render).collect())
            .collect();
        debug!("Sheet '{}': {} rows", name, rows.len());

        sheets.push(Sheet { name, rows });
    }

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&Data::Float(2005.0)), "2005");
        assert_eq!(render(&Data::Float(12.5)), "12.5");
        assert_eq!(render(&Data::Int(7)), "7");
        assert_eq!(render(&Data::String(" Canada ".to_string())), "Canada");
        assert_eq!(render(&Data::Empty), "");
    }

    #[test]
    fn test_to_table() {
        let sheet = Sheet::new(
            "TimeSeries_1971-2024",
            vec![
                strings(&["World Energy Balances", "", ""]),
                strings(&["Country", "Flow", "2005"]),
                strings(&["Canada", "Production (PJ)", "16000"]),
            ],
        );

        let table = sheet.to_table(1);
        assert_eq!(table.headers, vec!["Country", "Flow", "2005"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.number(0, 2), Some(16000.0));
        assert_eq!(sheet.number(2, 2), Some(16000.0));
        assert_eq!(sheet.cell(9, 9), "");
    }

    #[test]
    fn test_missing_workbook() {
        assert!(read_sheets(Path::new("/nonexistent/book.xlsx"), None).is_err());
    }
}
