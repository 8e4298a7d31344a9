//! Database access layer - connection handling and the repository trait

pub mod connection;
pub mod memory;
pub mod postgres;

pub use connection::{connect, with_retry, DatabaseSettings};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::ingestion::types::{
    CalcBatch, DataPoint, ExportRow, MapRow, MetadataRecord, RunRecord, RunStatus, WriteStats,
};
use anyhow::Result;
use async_trait::async_trait;

/// Everything the pipeline reads from and writes to the database
#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    // Run history

    /// Insert a `started` run record and return its id
    async fn log_run_start(&self, source_key: &str, run_type: &str) -> Result<i64>;

    /// Close a run record: set its final status and stamp `completed_at`
    async fn log_run_complete(
        &self,
        run_id: i64,
        status: RunStatus,
        rows_affected: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>>;

    /// Most recent successful run of a source
    async fn last_run(&self, source_key: &str) -> Result<Option<RunRecord>>;

    // Data sources registry

    async fn update_source_last_refresh(&self, section_key: &str, source_key: &str) -> Result<()>;

    async fn count_enabled_sources(&self) -> Result<i64>;

    // Raw data, unique by (vector, ref_date) and by vector for metadata

    async fn upsert_data_points(&self, source_key: &str, points: &[DataPoint]) -> Result<WriteStats>;

    async fn upsert_metadata(&self, source_key: &str, records: &[MetadataRecord]) -> Result<WriteStats>;

    /// Remove the data and metadata a source wrote
    async fn clear_source(&self, source_key: &str) -> Result<()>;

    /// Clear a source and write its new data and metadata as one unit; on error the
    /// previous rows stay in place
    async fn replace_source(
        &self,
        source_key: &str,
        points: &[DataPoint],
        records: &[MetadataRecord],
    ) -> Result<WriteStats>;

    // Calculated tables

    async fn upsert_calc(&self, batch: &CalcBatch) -> Result<usize>;

    // Major projects map

    /// Replace the whole map feature set
    async fn replace_major_projects_map(&self, rows: &[MapRow]) -> Result<usize>;

    // Export

    /// Rebuild the export tables from the raw tables
    async fn prepare_export(&self) -> Result<()>;

    /// Export rows sorted by (vector, ref_date)
    async fn export_data(&self) -> Result<Vec<ExportRow>>;

    /// Export metadata sorted by vector
    async fn export_metadata(&self) -> Result<Vec<MetadataRecord>>;

    /// Map rows sorted by (lang, type, province, project_name)
    async fn export_major_projects_map(&self) -> Result<Vec<MapRow>>;
}
