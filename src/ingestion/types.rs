//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observation of a vector: (vector, ref_date, value)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub vector: String,
    pub ref_date: String,
    pub value: f64,
}

impl DataPoint {
    /// Annual data point; ref_date is the year rendered as a string
    pub fn new(vector: impl Into<String>, year: i32, value: f64) -> Self {
        Self {
            vector: vector.into(),
            ref_date: year.to_string(),
            value,
        }
    }
}

/// Description of a vector (title, unit of measure, scalar factor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetadataRecord {
    pub vector: String,
    pub title: String,
    pub uom: String,
    pub scalar_factor: String,
}

impl MetadataRecord {
    pub fn new(vector: &str, title: &str, uom: &str, scalar_factor: &str) -> Self {
        Self {
            vector: vector.to_string(),
            title: title.to_string(),
            uom: uom.to_string(),
            scalar_factor: scalar_factor.to_string(),
        }
    }
}

/// Row of the export_data table; value is already rendered as text
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ExportRow {
    pub vector: String,
    pub ref_date: String,
    pub value: String,
}

/// Run history status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(RunStatus::Started),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(anyhow::anyhow!("Unknown run status: {}", other)),
        }
    }
}

/// Run history audit record
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: i64,
    pub source_key: String,
    pub run_type: String,
    pub status: RunStatus,
    pub rows_affected: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl WriteStats {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn merge(&mut self, other: &WriteStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted: {}, updated: {}, skipped: {}, errors: {}",
            self.inserted, self.updated, self.skipped, self.errors
        )
    }
}

// Calculated (per-topic) rows. Monetary values are millions of dollars.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapexCalc {
    pub ref_year: i32,
    pub oil_gas: f64,
    pub electricity: f64,
    pub other_energy: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfrastructureCalc {
    pub ref_year: i32,
    pub fuel_energy_pipelines: f64,
    pub transport: f64,
    pub education: f64,
    pub health_housing: f64,
    pub environmental: f64,
    pub public_safety: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomicCalc {
    pub ref_year: i32,
    pub gdp_direct: f64,
    pub gdp_indirect: f64,
    pub gdp_total: f64,
    pub jobs_direct: f64,
    pub jobs_indirect: f64,
    pub jobs_total: f64,
    pub income_direct: f64,
    pub income_indirect: f64,
    pub income_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternationalCalc {
    pub ref_year: i32,
    /// "cdia" or "fdi"
    pub investment_type: String,
    pub industry_category: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentalCalc {
    pub ref_year: i32,
    pub industry_category: String,
    pub wastewater: Option<f64>,
    pub soil_groundwater: Option<f64>,
    pub air_pollution: Option<f64>,
    pub solid_waste: Option<f64>,
    pub other: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvincialGdpCalc {
    pub ref_year: i32,
    pub province_code: String,
    pub province_name: String,
    pub energy_gdp: f64,
    /// Share of the national total for the same year
    pub energy_share_pct: Option<f64>,
    /// True for the reference-year extrapolation
    pub is_estimate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanTechCalc {
    pub ref_year: i32,
    pub category: String,
    pub project_count: Option<i64>,
    /// Billions of dollars
    pub project_value: Option<f64>,
}

/// A batch of calculated rows bound for one calc_* table
#[derive(Debug, Clone, PartialEq)]
pub enum CalcBatch {
    Capex(Vec<CapexCalc>),
    Infrastructure(Vec<InfrastructureCalc>),
    Economic(Vec<EconomicCalc>),
    International(Vec<InternationalCalc>),
    Environmental(Vec<EnvironmentalCalc>),
    ProvincialGdp(Vec<ProvincialGdpCalc>),
    CleanTech(Vec<CleanTechCalc>),
}

impl CalcBatch {
    pub fn table(&self) -> &'static str {
        match self {
            CalcBatch::Capex(_) => "calc_capital_expenditures",
            CalcBatch::Infrastructure(_) => "calc_infrastructure",
            CalcBatch::Economic(_) => "calc_economic_contributions",
            CalcBatch::International(_) => "calc_international_investment",
            CalcBatch::Environmental(_) => "calc_environmental_protection",
            CalcBatch::ProvincialGdp(_) => "calc_provincial_gdp",
            CalcBatch::CleanTech(_) => "calc_clean_tech",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CalcBatch::Capex(rows) => rows.len(),
            CalcBatch::Infrastructure(rows) => rows.len(),
            CalcBatch::Economic(rows) => rows.len(),
            CalcBatch::International(rows) => rows.len(),
            CalcBatch::Environmental(rows) => rows.len(),
            CalcBatch::ProvincialGdp(rows) => rows.len(),
            CalcBatch::CleanTech(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Natural key of every row, rendered as a string, paired with the row as JSON
    pub fn keyed_rows(&self) -> Vec<(String, serde_json::Value)> {
        fn keyed<T: Serialize>(rows: &[T], key: impl Fn(&T) -> String) -> Vec<(String, serde_json::Value)> {
            rows.iter()
                .map(|r| (key(r), serde_json::to_value(r).unwrap_or(serde_json::Value::Null)))
                .collect()
        }

        match self {
            CalcBatch::Capex(rows) => keyed(rows, |r| r.ref_year.to_string()),
            CalcBatch::Infrastructure(rows) => keyed(rows, |r| r.ref_year.to_string()),
            CalcBatch::Economic(rows) => keyed(rows, |r| r.ref_year.to_string()),
            CalcBatch::International(rows) => keyed(rows, |r| {
                format!("{}/{}/{}", r.ref_year, r.investment_type, r.industry_category)
            }),
            CalcBatch::Environmental(rows) => {
                keyed(rows, |r| format!("{}/{}", r.ref_year, r.industry_category))
            }
            CalcBatch::ProvincialGdp(rows) => {
                keyed(rows, |r| format!("{}/{}", r.ref_year, r.province_code))
            }
            CalcBatch::CleanTech(rows) => keyed(rows, |r| format!("{}/{}", r.ref_year, r.category)),
        }
    }
}

/// One row of the major projects map (point or line feature)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MapRow {
    pub lang: String,
    pub feature_id: String,
    pub company: String,
    pub project_name: String,
    pub province: String,
    pub location: String,
    pub capital_cost: String,
    pub capital_cost_range: String,
    pub status: String,
    pub clean_technology: String,
    pub clean_technology_type: String,
    pub line_type: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// JSON array of paths, each an array of {lon, lat}
    pub paths: Option<String>,
    /// "point" or "line"
    pub feature_type: String,
}

/// Everything one source run produces
#[derive(Debug, Clone, Default)]
pub struct Extract {
    /// Published semantic vectors
    pub data: Vec<DataPoint>,
    /// Display vectors (_pct, _billions, _thousands)
    pub derived: Vec<DataPoint>,
    pub metadata: Vec<MetadataRecord>,
    pub calc: Vec<CalcBatch>,
    /// Native StatCan points, stored under `<source>_raw`
    pub raw: Vec<DataPoint>,
    pub raw_metadata: Vec<MetadataRecord>,
}

impl Extract {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.derived.is_empty()
    }

    /// Number of semantic rows (data plus derived)
    pub fn row_count(&self) -> usize {
        self.data.len() + self.derived.len()
    }

    pub fn value(&self, vector: &str, year: i32) -> Option<f64> {
        let ref_date = year.to_string();
        self.data
            .iter()
            .chain(self.derived.iter())
            .find(|p| p.vector == vector && p.ref_date == ref_date)
            .map(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_round_trip() {
        for status in [RunStatus::Started, RunStatus::Success, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("done".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_write_stats_merge() {
        let mut stats = WriteStats {
            inserted: 2,
            updated: 1,
            ..Default::default()
        };
        stats.merge(&WriteStats {
            inserted: 1,
            updated: 3,
            skipped: 1,
            errors: 0,
        });

        assert_eq!(stats.written(), 7);
        assert_eq!(
            stats.to_string(),
            "inserted: 3, updated: 4, skipped: 1, errors: 0"
        );
    }

    #[test]
    fn test_calc_batch_keys() {
        let batch = CalcBatch::ProvincialGdp(vec![ProvincialGdpCalc {
            ref_year: 2023,
            province_code: "ab".to_string(),
            province_name: "Alberta".to_string(),
            energy_gdp: 90000.0,
            energy_share_pct: Some(40.0),
            is_estimate: false,
        }]);

        let rows = batch.keyed_rows();
        assert_eq!(batch.table(), "calc_provincial_gdp");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "2023/ab");
        assert_eq!(rows[0].1["energy_gdp"], 90000.0);
    }

    #[test]
    fn test_extract_value_lookup() {
        let extract = Extract {
            data: vec![DataPoint::new("capex_total", 2022, 150.0)],
            derived: vec![DataPoint::new("capex_total_billions", 2022, 0.15)],
            ..Default::default()
        };

        assert_eq!(extract.value("capex_total", 2022), Some(150.0));
        assert_eq!(extract.value("capex_total_billions", 2022), Some(0.15));
        assert_eq!(extract.value("capex_total", 2021), None);
        assert_eq!(extract.row_count(), 2);
    }
}
