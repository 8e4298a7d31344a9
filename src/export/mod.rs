//! Website file export - data.csv, metadata.csv and major_projects_map.csv
//!
//! Unfiltered exports dump the export tables. Filtered exports merge fresh rows for the
//! selected vectors into the existing files and leave every other row untouched.

pub mod filters;

pub use filters::{match_vector_pattern, ExportFilter};

use crate::config::Config;
use crate::db::Store;
use crate::ingestion::types::MapRow;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DATA_HEADER: [&str; 3] = ["vector", "ref_date", "value"];
pub const METADATA_HEADER: [&str; 4] = ["vector", "title", "uom", "scalar_factor"];
pub const MAP_HEADER: [&str; 16] = [
    "lang",
    "id",
    "company",
    "project_name",
    "province",
    "location",
    "capital_cost",
    "capital_cost_range",
    "status",
    "clean_technology",
    "clean_technology_type",
    "line_type",
    "lat",
    "lon",
    "paths",
    "type",
];

/// Whole numbers without a fractional part, otherwise the shortest round-trip form
pub fn render_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Success,
    Skipped,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Success => f.write_str("success"),
            FileStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Outcome for one exported file
#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub file: String,
    pub status: FileStatus,
    pub rows: usize,
    pub path: Option<PathBuf>,
    pub reason: Option<String>,
}

impl FileResult {
    fn written(file: &str, rows: usize, path: &Path) -> Self {
        Self {
            file: file.to_string(),
            status: FileStatus::Success,
            rows,
            path: Some(path.to_path_buf()),
            reason: None,
        }
    }

    fn skipped(file: &str, path: Option<&Path>, reason: &str) -> Self {
        Self {
            file: file.to_string(),
            status: FileStatus::Skipped,
            rows: 0,
            path: path.map(Path::to_path_buf),
            reason: Some(reason.to_string()),
        }
    }
}

impl fmt::Display for FileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({} rows)", self.file, self.status, self.rows)?;
        if let Some(path) = &self.path {
            write!(f, " -> {}", path.display())?;
        }
        if let Some(reason) = &self.reason {
            write!(f, " [{}]", reason)?;
        }
        Ok(())
    }
}

/// Export all website files, applying `filter`
pub async fn export_all(
    store: &dyn Store,
    config: &Config,
    filter: &ExportFilter,
) -> Result<Vec<FileResult>> {
    info!("Step 1/4: Preparing export data");
    store
        .prepare_export()
        .await
        .context("Failed to prepare export tables")?;

    let files = &config.export.files;
    let mut results = Vec::with_capacity(3);

    info!("Step 2/4: Exporting {}{}", files.data_csv, filter.describe());
    let data = store.export_data().await?;
    let rows: Vec<((String, String), String)> = data
        .into_iter()
        .map(|r| ((r.vector, r.ref_date), r.value))
        .collect();
    let path = config.export_path(&files.data_csv);
    let written = write_data_csv(&path, rows, filter)?;
    results.push(FileResult::written(&files.data_csv, written, &path));

    info!("Step 3/4: Exporting {}{}", files.metadata_csv, filter.describe());
    let metadata = store.export_metadata().await?;
    let rows: Vec<(String, [String; 3])> = metadata
        .into_iter()
        .map(|m| (m.vector, [m.title, m.uom, m.scalar_factor]))
        .collect();
    let path = config.export_path(&files.metadata_csv);
    let written = write_metadata_csv(&path, rows, filter)?;
    results.push(FileResult::written(&files.metadata_csv, written, &path));

    info!("Step 4/4: Exporting {}", files.major_projects_csv);
    let path = config.export_path(&files.major_projects_csv);
    if filter.includes_map() {
        let rows = store.export_major_projects_map().await?;
        if rows.is_empty() {
            info!("  No major projects map data available");
            results.push(FileResult::skipped(&files.major_projects_csv, Some(&path), "no data"));
        } else {
            write_map_csv(&path, &rows)?;
            results.push(FileResult::written(&files.major_projects_csv, rows.len(), &path));
        }
    } else {
        results.push(FileResult::skipped(&files.major_projects_csv, None, "filtered"));
    }

    Ok(results)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Rows of an existing CSV file with at least `min_len` columns; a missing file is empty
fn read_existing(path: &Path, min_len: usize) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
        if record.len() >= min_len {
            rows.push(record.iter().map(str::to_string).collect());
        }
    }
    Ok(rows)
}

fn write_data_csv(
    path: &Path,
    rows: Vec<((String, String), String)>,
    filter: &ExportFilter,
) -> Result<usize> {
    create_parent(path)?;

    let merged: BTreeMap<(String, String), String> = if filter.is_active() {
        let mut existing: BTreeMap<(String, String), String> = read_existing(path, 3)?
            .into_iter()
            .map(|r| ((r[0].clone(), r[1].clone()), r[2].clone()))
            .collect();

        let fresh: Vec<_> = rows.into_iter().filter(|((v, _), _)| filter.accepts(v)).collect();
        let updated = fresh.len();
        existing.extend(fresh);

        info!("  Updated {} rows, total {} rows", updated, existing.len());
        existing
    } else {
        rows.into_iter().collect()
    };

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(DATA_HEADER)?;
    for ((vector, ref_date), value) in &merged {
        writer.write_record([vector, ref_date, value])?;
    }
    writer.flush()?;

    info!("  Wrote {} rows to {}", merged.len(), path.display());
    Ok(merged.len())
}

fn write_metadata_csv(
    path: &Path,
    rows: Vec<(String, [String; 3])>,
    filter: &ExportFilter,
) -> Result<usize> {
    create_parent(path)?;

    let merged: BTreeMap<String, [String; 3]> = if filter.is_active() {
        let mut existing: BTreeMap<String, [String; 3]> = read_existing(path, 4)?
            .into_iter()
            .map(|r| (r[0].clone(), [r[1].clone(), r[2].clone(), r[3].clone()]))
            .collect();

        let fresh: Vec<_> = rows.into_iter().filter(|(v, _)| filter.accepts(v)).collect();
        let updated = fresh.len();
        existing.extend(fresh);

        info!("  Updated {} vectors, total {} rows", updated, existing.len());
        existing
    } else {
        rows.into_iter().collect()
    };

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(METADATA_HEADER)?;
    for (vector, [title, uom, scalar_factor]) in &merged {
        writer.write_record([vector, title, uom, scalar_factor])?;
    }
    writer.flush()?;

    info!("  Wrote {} rows to {}", merged.len(), path.display());
    Ok(merged.len())
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_map_csv(path: &Path, rows: &[MapRow]) -> Result<()> {
    create_parent(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(MAP_HEADER)?;
    for row in rows {
        let lat = optional_number(row.lat);
        let lon = optional_number(row.lon);
        writer.write_record([
            row.lang.as_str(),
            row.feature_id.as_str(),
            row.company.as_str(),
            row.project_name.as_str(),
            row.province.as_str(),
            row.location.as_str(),
            row.capital_cost.as_str(),
            row.capital_cost_range.as_str(),
            row.status.as_str(),
            row.clean_technology.as_str(),
            row.clean_technology_type.as_str(),
            row.line_type.as_str(),
            lat.as_str(),
            lon.as_str(),
            row.paths.as_deref().unwrap_or_default(),
            row.feature_type.as_str(),
        ])?;
    }
    writer.flush()?;

    info!("  Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
