//! In-memory store with the same semantics as the Postgres store

use super::Store;
use crate::export::render_value;
use crate::ingestion::types::{
    CalcBatch, DataPoint, ExportRow, MapRow, MetadataRecord, RunRecord, RunStatus, WriteStats,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredPoint {
    value: f64,
    source_key: String,
}

#[derive(Debug, Clone)]
struct StoredMetadata {
    record: MetadataRecord,
    source_key: String,
}

#[derive(Debug, Clone)]
struct SourceEntry {
    section_key: String,
    is_enabled: bool,
    last_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    runs: Vec<RunRecord>,
    sources: BTreeMap<String, SourceEntry>,
    data: BTreeMap<(String, String), StoredPoint>,
    metadata: BTreeMap<String, StoredMetadata>,
    calc: BTreeMap<&'static str, BTreeMap<String, serde_json::Value>>,
    map: Vec<MapRow>,
    export_data: Vec<ExportRow>,
    export_metadata: Vec<MetadataRecord>,
}

impl Tables {
    fn write_points(&mut self, source_key: &str, points: &[DataPoint]) -> WriteStats {
        let mut stats = WriteStats::default();
        for point in points {
            let previous = self.data.insert(
                (point.vector.clone(), point.ref_date.clone()),
                StoredPoint {
                    value: point.value,
                    source_key: source_key.to_string(),
                },
            );
            if previous.is_some() {
                stats.updated += 1;
            } else {
                stats.inserted += 1;
            }
        }
        stats
    }

    fn write_metadata(&mut self, source_key: &str, records: &[MetadataRecord]) -> WriteStats {
        let mut stats = WriteStats::default();
        for record in records {
            let previous = self.metadata.insert(
                record.vector.clone(),
                StoredMetadata {
                    record: record.clone(),
                    source_key: source_key.to_string(),
                },
            );
            if previous.is_some() {
                stats.updated += 1;
            } else {
                stats.inserted += 1;
            }
        }
        stats
    }

    fn clear(&mut self, source_key: &str) {
        self.data.retain(|_, p| p.source_key != source_key);
        self.metadata.retain(|_, m| m.source_key != source_key);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Register a source as enabled or disabled in the registry
    pub fn register_source(&self, section_key: &str, source_key: &str, is_enabled: bool) -> Result<()> {
        let mut tables = self.lock()?;
        tables.sources.insert(
            source_key.to_string(),
            SourceEntry {
                section_key: section_key.to_string(),
                is_enabled,
                last_refresh_at: None,
            },
        );
        Ok(())
    }

    pub fn source_last_refresh(&self, source_key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .lock()?
            .sources
            .get(source_key)
            .and_then(|s| s.last_refresh_at))
    }

    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.lock()?.runs.clone())
    }

    /// Raw value of a vector for a ref_date
    pub fn value(&self, vector: &str, ref_date: &str) -> Result<Option<f64>> {
        Ok(self
            .lock()?
            .data
            .get(&(vector.to_string(), ref_date.to_string()))
            .map(|p| p.value))
    }

    pub fn data_len(&self) -> Result<usize> {
        Ok(self.lock()?.data.len())
    }

    pub fn calc_rows(&self, table: &str) -> Result<usize> {
        Ok(self.lock()?.calc.get(table).map(BTreeMap::len).unwrap_or(0))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn log_run_start(&self, source_key: &str, run_type: &str) -> Result<i64> {
        let mut tables = self.lock()?;
        let run_id = tables.runs.len() as i64 + 1;
        tables.runs.push(RunRecord {
            run_id,
            source_key: source_key.to_string(),
            run_type: run_type.to_string(),
            status: RunStatus::Started,
            rows_affected: None,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        });
        Ok(run_id)
    }

    async fn log_run_complete(
        &self,
        run_id: i64,
        status: RunStatus,
        rows_affected: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.lock()?;
        let run = tables
            .runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| anyhow!("Run {} not found", run_id))?;

        run.status = status;
        run.rows_affected = rows_affected;
        run.error_message = error_message.map(str::to_string);
        // Strictly after started_at even on a coarse clock
        let now = Utc::now();
        run.completed_at = Some(if now > run.started_at {
            now
        } else {
            run.started_at + chrono::Duration::microseconds(1)
        });
        Ok(())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        Ok(self.lock()?.runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn last_run(&self, source_key: &str) -> Result<Option<RunRecord>> {
        Ok(self
            .lock()?
            .runs
            .iter()
            .filter(|r| r.source_key == source_key && r.status == RunStatus::Success)
            .max_by_key(|r| (r.completed_at, r.run_id))
            .cloned())
    }

    async fn update_source_last_refresh(&self, section_key: &str, source_key: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let entry = tables
            .sources
            .entry(source_key.to_string())
            .or_insert_with(|| SourceEntry {
                section_key: section_key.to_string(),
                is_enabled: true,
                last_refresh_at: None,
            });
        entry.section_key = section_key.to_string();
        entry.last_refresh_at = Some(Utc::now());
        Ok(())
    }

    async fn count_enabled_sources(&self) -> Result<i64> {
        Ok(self.lock()?.sources.values().filter(|s| s.is_enabled).count() as i64)
    }

    async fn upsert_data_points(&self, source_key: &str, points: &[DataPoint]) -> Result<WriteStats> {
        Ok(self.lock()?.write_points(source_key, points))
    }

    async fn upsert_metadata(&self, source_key: &str, records: &[MetadataRecord]) -> Result<WriteStats> {
        Ok(self.lock()?.write_metadata(source_key, records))
    }

    async fn clear_source(&self, source_key: &str) -> Result<()> {
        self.lock()?.clear(source_key);
        Ok(())
    }

    async fn replace_source(
        &self,
        source_key: &str,
        points: &[DataPoint],
        records: &[MetadataRecord],
    ) -> Result<WriteStats> {
        // One guard for the whole replacement
        let mut tables = self.lock()?;
        tables.clear(source_key);
        let mut stats = tables.write_points(source_key, points);
        stats.merge(&tables.write_metadata(source_key, records));
        Ok(stats)
    }

    async fn upsert_calc(&self, batch: &CalcBatch) -> Result<usize> {
        let mut tables = self.lock()?;
        let table = tables.calc.entry(batch.table()).or_default();
        let rows = batch.keyed_rows();
        let count = rows.len();
        table.extend(rows);
        Ok(count)
    }

    async fn replace_major_projects_map(&self, rows: &[MapRow]) -> Result<usize> {
        let mut tables = self.lock()?;
        tables.map = rows.to_vec();
        Ok(rows.len())
    }

    async fn prepare_export(&self) -> Result<()> {
        let mut tables = self.lock()?;

        let data: Vec<ExportRow> = tables
            .data
            .iter()
            .map(|((vector, ref_date), point)| ExportRow {
                vector: vector.clone(),
                ref_date: ref_date.clone(),
                value: render_value(point.value),
            })
            .collect();
        let metadata: Vec<MetadataRecord> =
            tables.metadata.values().map(|m| m.record.clone()).collect();

        tables.export_data = data;
        tables.export_metadata = metadata;
        Ok(())
    }

    async fn export_data(&self) -> Result<Vec<ExportRow>> {
        let mut rows = self.lock()?.export_data.clone();
        rows.sort_by(|a, b| (&a.vector, &a.ref_date).cmp(&(&b.vector, &b.ref_date)));
        Ok(rows)
    }

    async fn export_metadata(&self) -> Result<Vec<MetadataRecord>> {
        let mut rows = self.lock()?.export_metadata.clone();
        rows.sort_by(|a, b| a.vector.cmp(&b.vector));
        Ok(rows)
    }

    async fn export_major_projects_map(&self) -> Result<Vec<MapRow>> {
        let mut rows = self.lock()?.map.clone();
        rows.sort_by(|a, b| {
            (&a.lang, &a.feature_type, &a.province, &a.project_name)
                .cmp(&(&b.lang, &b.feature_type, &b.province, &b.project_name))
        });
        Ok(rows)
    }
}

/// Delegates to a [`MemoryStore`] but errors on one named operation
#[cfg(test)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_on: &'static str,
}

#[cfg(test)]
impl FailingStore {
    pub fn new(fail_on: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on,
        }
    }

    fn check(&self, operation: &str) -> Result<()> {
        if operation == self.fail_on {
            return Err(anyhow!("{} failed: connection reset", operation));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl Store for FailingStore {
    async fn ping(&self) -> Result<()> {
        self.check("ping")?;
        self.inner.ping().await
    }

    async fn log_run_start(&self, source_key: &str, run_type: &str) -> Result<i64> {
        self.check("log_run_start")?;
        self.inner.log_run_start(source_key, run_type).await
    }

    async fn log_run_complete(
        &self,
        run_id: i64,
        status: RunStatus,
        rows_affected: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.check("log_run_complete")?;
        self.inner
            .log_run_complete(run_id, status, rows_affected, error_message)
            .await
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        self.inner.get_run(run_id).await
    }

    async fn last_run(&self, source_key: &str) -> Result<Option<RunRecord>> {
        self.inner.last_run(source_key).await
    }

    async fn update_source_last_refresh(&self, section_key: &str, source_key: &str) -> Result<()> {
        self.check("update_source_last_refresh")?;
        self.inner.update_source_last_refresh(section_key, source_key).await
    }

    async fn count_enabled_sources(&self) -> Result<i64> {
        self.inner.count_enabled_sources().await
    }

    async fn upsert_data_points(&self, source_key: &str, points: &[DataPoint]) -> Result<WriteStats> {
        self.check("upsert_data_points")?;
        self.inner.upsert_data_points(source_key, points).await
    }

    async fn upsert_metadata(&self, source_key: &str, records: &[MetadataRecord]) -> Result<WriteStats> {
        self.check("upsert_metadata")?;
        self.inner.upsert_metadata(source_key, records).await
    }

    async fn clear_source(&self, source_key: &str) -> Result<()> {
        self.check("clear_source")?;
        self.inner.clear_source(source_key).await
    }

    async fn replace_source(
        &self,
        source_key: &str,
        points: &[DataPoint],
        records: &[MetadataRecord],
    ) -> Result<WriteStats> {
        self.check("replace_source")?;
        self.inner.replace_source(source_key, points, records).await
    }

    async fn upsert_calc(&self, batch: &CalcBatch) -> Result<usize> {
        self.check("upsert_calc")?;
        self.inner.upsert_calc(batch).await
    }

    async fn replace_major_projects_map(&self, rows: &[MapRow]) -> Result<usize> {
        self.check("replace_major_projects_map")?;
        self.inner.replace_major_projects_map(rows).await
    }

    async fn prepare_export(&self) -> Result<()> {
        self.inner.prepare_export().await
    }

    async fn export_data(&self) -> Result<Vec<ExportRow>> {
        self.inner.export_data().await
    }

    async fn export_metadata(&self) -> Result<Vec<MetadataRecord>> {
        self.inner.export_metadata().await
    }

    async fn export_major_projects_map(&self) -> Result<Vec<MapRow>> {
        self.inner.export_major_projects_map().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::types::CapexCalc;

    #[tokio::test]
    async fn test_run_lifecycle() {
        let store = MemoryStore::new();

        let run_id = store.log_run_start("capital_expenditures", "fetch").await.unwrap();
        let started = store.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(started.status, RunStatus::Started);
        assert!(started.completed_at.is_none());

        store
            .log_run_complete(run_id, RunStatus::Success, Some(120), None)
            .await
            .unwrap();

        let done = store.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(done.status, RunStatus::Success);
        assert_eq!(done.rows_affected, Some(120));
        assert!(done.completed_at.unwrap() > done.started_at);
        assert_eq!(
            store.last_run("capital_expenditures").await.unwrap().unwrap().run_id,
            run_id
        );
    }

    #[tokio::test]
    async fn test_failed_runs_are_not_last_run() {
        let store = MemoryStore::new();

        let run_id = store.log_run_start("clean_tech", "fetch").await.unwrap();
        store
            .log_run_complete(run_id, RunStatus::Failed, None, Some("timeout"))
            .await
            .unwrap();

        assert!(store.last_run("clean_tech").await.unwrap().is_none());
        assert_eq!(
            store.get_run(run_id).await.unwrap().unwrap().error_message.as_deref(),
            Some("timeout")
        );
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let points = vec![
            DataPoint::new("capex_total", 2022, 150.0),
            DataPoint::new("capex_total", 2023, 160.0),
        ];

        let first = store.upsert_data_points("capital_expenditures", &points).await.unwrap();
        let second = store.upsert_data_points("capital_expenditures", &points).await.unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(store.data_len().unwrap(), 2);

        // Last write wins
        store
            .upsert_data_points("capital_expenditures", &[DataPoint::new("capex_total", 2022, 155.0)])
            .await
            .unwrap();
        assert_eq!(store.value("capex_total", "2022").unwrap(), Some(155.0));
    }

    #[tokio::test]
    async fn test_clear_source_keeps_other_sources() {
        let store = MemoryStore::new();
        store
            .upsert_data_points("infrastructure", &[DataPoint::new("infra_total", 2022, 10.0)])
            .await
            .unwrap();
        store
            .upsert_data_points("investment_by_asset", &[DataPoint::new("asset_total", 2022, 20.0)])
            .await
            .unwrap();

        store.clear_source("infrastructure").await.unwrap();

        assert_eq!(store.value("infra_total", "2022").unwrap(), None);
        assert_eq!(store.value("asset_total", "2022").unwrap(), Some(20.0));
    }

    #[tokio::test]
    async fn test_replace_source_drops_stale_vectors() {
        let store = MemoryStore::new();
        store
            .upsert_data_points(
                "world_energy_production",
                &[DataPoint::new("energy_prod_norway_rank", 2023, 10.0)],
            )
            .await
            .unwrap();
        store
            .upsert_data_points("capital_expenditures", &[DataPoint::new("capex_total", 2023, 1.0)])
            .await
            .unwrap();

        let stats = store
            .replace_source(
                "world_energy_production",
                &[DataPoint::new("energy_prod_world_total", 2023, 650000.0)],
                &[MetadataRecord::new("energy_prod_world_total", "World", "PJ", "units")],
            )
            .await
            .unwrap();

        assert_eq!(stats.inserted, 2);
        assert_eq!(store.value("energy_prod_norway_rank", "2023").unwrap(), None);
        assert_eq!(store.value("energy_prod_world_total", "2023").unwrap(), Some(650000.0));
        assert_eq!(store.value("capex_total", "2023").unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_calc_upsert_by_key() {
        let store = MemoryStore::new();
        let row = |total| CapexCalc {
            ref_year: 2022,
            oil_gas: 1.0,
            electricity: 2.0,
            other_energy: 3.0,
            total,
        };

        store.upsert_calc(&CalcBatch::Capex(vec![row(6.0)])).await.unwrap();
        store.upsert_calc(&CalcBatch::Capex(vec![row(7.0)])).await.unwrap();

        assert_eq!(store.calc_rows("calc_capital_expenditures").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prepare_export_renders_values() {
        let store = MemoryStore::new();
        store
            .upsert_data_points(
                "nominal_gdp",
                &[
                    DataPoint::new("gdp_nominal_total_pct", 2023, 12.5),
                    DataPoint::new("gdp_nominal_total", 2023, 150.0),
                ],
            )
            .await
            .unwrap();

        store.prepare_export().await.unwrap();
        let rows = store.export_data().await.unwrap();

        assert_eq!(rows[0].vector, "gdp_nominal_total");
        assert_eq!(rows[0].value, "150");
        assert_eq!(rows[1].value, "12.5");
    }

    #[tokio::test]
    async fn test_map_is_replaced() {
        let store = MemoryStore::new();
        let row = |id: &str| MapRow {
            lang: "en".to_string(),
            feature_id: id.to_string(),
            feature_type: "point".to_string(),
            ..Default::default()
        };

        store.replace_major_projects_map(&[row("1"), row("2")]).await.unwrap();
        store.replace_major_projects_map(&[row("3")]).await.unwrap();

        let rows = store.export_major_projects_map().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feature_id, "3");
    }

    #[tokio::test]
    async fn test_enabled_source_count() {
        let store = MemoryStore::new();
        store.register_source("section2_investment", "clean_tech", true).unwrap();
        store.register_source("section2_investment", "foreign_control", false).unwrap();

        assert_eq!(store.count_enabled_sources().await.unwrap(), 1);

        store
            .update_source_last_refresh("section2_investment", "clean_tech")
            .await
            .unwrap();
        assert!(store.source_last_refresh("clean_tech").unwrap().is_some());
    }
}
