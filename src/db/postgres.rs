//! Postgres store - upserts with ON CONFLICT, one transaction per batch

use super::Store;
use crate::export::render_value;
use crate::ingestion::types::{
    CalcBatch, DataPoint, ExportRow, MapRow, MetadataRecord, RunRecord, RunStatus, WriteStats,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

/// Rows per multi-row INSERT; 16 binds per map row stays under the 65535 parameter limit
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    run_id: i64,
    source_key: String,
    run_type: String,
    status: String,
    rows_affected: Option<i64>,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRow> for RunRecord {
    type Error = anyhow::Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(RunRecord {
            run_id: row.run_id,
            source_key: row.source_key,
            run_type: row.run_type,
            status: row.status.parse()?,
            rows_affected: row.rows_affected,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to apply migrations")?;
        info!("✓ Migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn log_run_start(&self, source_key: &str, run_type: &str) -> Result<i64> {
        let run_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO run_history (source_key, run_type, status, started_at)
            VALUES ($1, $2, 'started', NOW())
            RETURNING run_id
            "#,
        )
        .bind(source_key)
        .bind(run_type)
        .fetch_one(&self.pool)
        .await
        .context("Failed to log run start")?;

        Ok(run_id)
    }

    async fn log_run_complete(
        &self,
        run_id: i64,
        status: RunStatus,
        rows_affected: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE run_history
            SET status = $1, rows_affected = $2, error_message = $3,
                completed_at = GREATEST(NOW(), started_at + INTERVAL '1 microsecond')
            WHERE run_id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(rows_affected)
        .bind(error_message)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .context("Failed to log run completion")?;

        Ok(())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM run_history WHERE run_id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RunRecord::try_from).transpose()
    }

    async fn last_run(&self, source_key: &str) -> Result<Option<RunRecord>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT * FROM run_history
            WHERE source_key = $1 AND status = 'success'
            ORDER BY completed_at DESC, run_id DESC
            LIMIT 1
            "#,
        )
        .bind(source_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RunRecord::try_from).transpose()
    }

    async fn update_source_last_refresh(&self, section_key: &str, source_key: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO data_sources (source_key, section_key, is_enabled, last_refresh_at, updated_at)
            VALUES ($1, $2, TRUE, NOW(), NOW())
            ON CONFLICT (source_key) DO UPDATE SET
                section_key = EXCLUDED.section_key,
                last_refresh_at = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(source_key)
        .bind(section_key)
        .execute(&self.pool)
        .await
        .context("Failed to update data source refresh time")?;

        Ok(())
    }

    async fn count_enabled_sources(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM data_sources WHERE is_enabled",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn upsert_data_points(&self, source_key: &str, points: &[DataPoint]) -> Result<WriteStats> {
        if points.is_empty() {
            return Ok(WriteStats::default());
        }

        let mut tx = self.pool.begin().await?;
        let stats = write_points(&mut tx, source_key, points).await?;
        tx.commit().await?;

        debug!("{}: data points {}", source_key, stats);
        Ok(stats)
    }

    async fn upsert_metadata(&self, source_key: &str, records: &[MetadataRecord]) -> Result<WriteStats> {
        if records.is_empty() {
            return Ok(WriteStats::default());
        }

        let mut tx = self.pool.begin().await?;
        let stats = write_metadata(&mut tx, source_key, records).await?;
        tx.commit().await?;

        debug!("{}: metadata {}", source_key, stats);
        Ok(stats)
    }

    async fn clear_source(&self, source_key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        delete_source(&mut tx, source_key).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_source(
        &self,
        source_key: &str,
        points: &[DataPoint],
        records: &[MetadataRecord],
    ) -> Result<WriteStats> {
        // Rolled back on drop, so a failed write keeps the previous rows
        let mut tx = self.pool.begin().await?;
        delete_source(&mut tx, source_key).await?;
        let mut stats = write_points(&mut tx, source_key, points).await?;
        stats.merge(&write_metadata(&mut tx, source_key, records).await?);
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit {} replacement", source_key))?;

        debug!("{}: replaced, {}", source_key, stats);
        Ok(stats)
    }

    async fn upsert_calc(&self, batch: &CalcBatch) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let written = match batch {
            CalcBatch::Capex(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_capital_expenditures (ref_year, oil_gas, electricity, other_energy, total)
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (ref_year) DO UPDATE SET
                            oil_gas = EXCLUDED.oil_gas,
                            electricity = EXCLUDED.electricity,
                            other_energy = EXCLUDED.other_energy,
                            total = EXCLUDED.total,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(row.oil_gas)
                    .bind(row.electricity)
                    .bind(row.other_energy)
                    .bind(row.total)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::Infrastructure(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_infrastructure (
                            ref_year, fuel_energy_pipelines, transport, education,
                            health_housing, environmental, public_safety, total
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                        ON CONFLICT (ref_year) DO UPDATE SET
                            fuel_energy_pipelines = EXCLUDED.fuel_energy_pipelines,
                            transport = EXCLUDED.transport,
                            education = EXCLUDED.education,
                            health_housing = EXCLUDED.health_housing,
                            environmental = EXCLUDED.environmental,
                            public_safety = EXCLUDED.public_safety,
                            total = EXCLUDED.total,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(row.fuel_energy_pipelines)
                    .bind(row.transport)
                    .bind(row.education)
                    .bind(row.health_housing)
                    .bind(row.environmental)
                    .bind(row.public_safety)
                    .bind(row.total)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::Economic(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_economic_contributions (
                            ref_year, gdp_direct, gdp_indirect, gdp_total,
                            jobs_direct, jobs_indirect, jobs_total,
                            income_direct, income_indirect, income_total
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                        ON CONFLICT (ref_year) DO UPDATE SET
                            gdp_direct = EXCLUDED.gdp_direct,
                            gdp_indirect = EXCLUDED.gdp_indirect,
                            gdp_total = EXCLUDED.gdp_total,
                            jobs_direct = EXCLUDED.jobs_direct,
                            jobs_indirect = EXCLUDED.jobs_indirect,
                            jobs_total = EXCLUDED.jobs_total,
                            income_direct = EXCLUDED.income_direct,
                            income_indirect = EXCLUDED.income_indirect,
                            income_total = EXCLUDED.income_total,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(row.gdp_direct)
                    .bind(row.gdp_indirect)
                    .bind(row.gdp_total)
                    .bind(row.jobs_direct)
                    .bind(row.jobs_indirect)
                    .bind(row.jobs_total)
                    .bind(row.income_direct)
                    .bind(row.income_indirect)
                    .bind(row.income_total)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::International(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_international_investment (ref_year, investment_type, industry_category, value)
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT (ref_year, investment_type, industry_category) DO UPDATE SET
                            value = EXCLUDED.value,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(&row.investment_type)
                    .bind(&row.industry_category)
                    .bind(row.value)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::Environmental(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_environmental_protection (
                            ref_year, industry_category, wastewater, soil_groundwater,
                            air_pollution, solid_waste, other, total
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                        ON CONFLICT (ref_year, industry_category) DO UPDATE SET
                            wastewater = EXCLUDED.wastewater,
                            soil_groundwater = EXCLUDED.soil_groundwater,
                            air_pollution = EXCLUDED.air_pollution,
                            solid_waste = EXCLUDED.solid_waste,
                            other = EXCLUDED.other,
                            total = EXCLUDED.total,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(&row.industry_category)
                    .bind(row.wastewater)
                    .bind(row.soil_groundwater)
                    .bind(row.air_pollution)
                    .bind(row.solid_waste)
                    .bind(row.other)
                    .bind(row.total)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::ProvincialGdp(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_provincial_gdp (
                            ref_year, province_code, province_name, energy_gdp,
                            energy_share_pct, is_estimate
                        ) VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (ref_year, province_code) DO UPDATE SET
                            province_name = EXCLUDED.province_name,
                            energy_gdp = EXCLUDED.energy_gdp,
                            energy_share_pct = EXCLUDED.energy_share_pct,
                            is_estimate = EXCLUDED.is_estimate,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(&row.province_code)
                    .bind(&row.province_name)
                    .bind(row.energy_gdp)
                    .bind(row.energy_share_pct)
                    .bind(row.is_estimate)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
            CalcBatch::CleanTech(rows) => {
                for row in rows {
                    sqlx::query(
                        r#"
                        INSERT INTO calc_clean_tech (ref_year, category, project_count, project_value)
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT (ref_year, category) DO UPDATE SET
                            project_count = EXCLUDED.project_count,
                            project_value = EXCLUDED.project_value,
                            calculated_at = NOW()
                        "#,
                    )
                    .bind(row.ref_year)
                    .bind(&row.category)
                    .bind(row.project_count)
                    .bind(row.project_value)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len()
            }
        };

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit {}", batch.table()))?;

        debug!("{}: {} rows upserted", batch.table(), written);
        Ok(written)
    }

    async fn replace_major_projects_map(&self, rows: &[MapRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM major_projects_map")
            .execute(&mut *tx)
            .await
            .context("Failed to clear major projects map")?;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO major_projects_map (lang, feature_id, company, project_name, province, \
                 location, capital_cost, capital_cost_range, status, clean_technology, \
                 clean_technology_type, line_type, lat, lon, paths, feature_type) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.lang)
                    .push_bind(&row.feature_id)
                    .push_bind(&row.company)
                    .push_bind(&row.project_name)
                    .push_bind(&row.province)
                    .push_bind(&row.location)
                    .push_bind(&row.capital_cost)
                    .push_bind(&row.capital_cost_range)
                    .push_bind(&row.status)
                    .push_bind(&row.clean_technology)
                    .push_bind(&row.clean_technology_type)
                    .push_bind(&row.line_type)
                    .push_bind(row.lat)
                    .push_bind(row.lon)
                    .push_bind(&row.paths)
                    .push_bind(&row.feature_type);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to insert major projects map rows")?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    async fn prepare_export(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM export_data").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM export_metadata").execute(&mut *tx).await?;

        let raw: Vec<(String, String, f64)> =
            sqlx::query_as("SELECT vector, ref_date, value FROM raw_data")
                .fetch_all(&mut *tx)
                .await
                .context("Failed to read raw data")?;

        // Values are rendered here so both stores format them identically
        for chunk in raw.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO export_data (vector, ref_date, value) ");
            builder.push_values(chunk, |mut b, (vector, ref_date, value)| {
                b.push_bind(vector)
                    .push_bind(ref_date)
                    .push_bind(render_value(*value));
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO export_metadata (vector, title, uom, scalar_factor)
            SELECT vector, title, uom, scalar_factor FROM raw_metadata
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await.context("Failed to prepare export tables")?;

        info!("Export tables prepared ({} data rows)", raw.len());
        Ok(())
    }

    async fn export_data(&self) -> Result<Vec<ExportRow>> {
        let rows = sqlx::query_as::<_, ExportRow>(
            "SELECT vector, ref_date, value FROM export_data ORDER BY vector, ref_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn export_metadata(&self) -> Result<Vec<MetadataRecord>> {
        let rows = sqlx::query_as::<_, MetadataRecord>(
            "SELECT vector, title, uom, scalar_factor FROM export_metadata ORDER BY vector",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn export_major_projects_map(&self) -> Result<Vec<MapRow>> {
        let rows = sqlx::query_as::<_, MapRow>(
            r#"
            SELECT lang, feature_id, company, project_name, province, location,
                   capital_cost, capital_cost_range, status, clean_technology,
                   clean_technology_type, line_type, lat, lon, paths, feature_type
            FROM major_projects_map
            ORDER BY lang, feature_type, province, project_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn delete_source(conn: &mut PgConnection, source_key: &str) -> Result<()> {
    sqlx::query("DELETE FROM raw_data WHERE source_key = $1")
        .bind(source_key)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM raw_metadata WHERE source_key = $1")
        .bind(source_key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn write_points(conn: &mut PgConnection, source_key: &str, points: &[DataPoint]) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    for point in points {
        // xmax is zero only for freshly inserted tuples
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO raw_data (vector, ref_date, value, source_key, fetched_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (vector, ref_date) DO UPDATE SET
                value = EXCLUDED.value,
                source_key = EXCLUDED.source_key,
                fetched_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&point.vector)
        .bind(&point.ref_date)
        .bind(point.value)
        .bind(source_key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to upsert {} {}", point.vector, point.ref_date))?;

        if inserted {
            stats.inserted += 1;
        } else {
            stats.updated += 1;
        }
    }
    Ok(stats)
}

async fn write_metadata(
    conn: &mut PgConnection,
    source_key: &str,
    records: &[MetadataRecord],
) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    for record in records {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO raw_metadata (vector, title, uom, scalar_factor, source_key, fetched_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (vector) DO UPDATE SET
                title = EXCLUDED.title,
                uom = EXCLUDED.uom,
                scalar_factor = EXCLUDED.scalar_factor,
                source_key = EXCLUDED.source_key,
                fetched_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&record.vector)
        .bind(&record.title)
        .bind(&record.uom)
        .bind(&record.scalar_factor)
        .bind(source_key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to upsert metadata for {}", record.vector))?;

        if inserted {
            stats.inserted += 1;
        } else {
            stats.updated += 1;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseSettings;

    // Requires a reachable Postgres with the migrations applied (DB_* env vars)
    #[tokio::test]
    #[ignore]
    async fn test_upsert_round_trip_against_postgres() {
        let mut settings = DatabaseSettings::default();
        if let Ok(server) = std::env::var("DB_SERVER") {
            settings.server = server;
        }
        settings.username = std::env::var("DB_USERNAME").ok();
        settings.password = std::env::var("DB_PASSWORD").ok();

        let pool = crate::db::connect(&settings).await.unwrap();
        let store = PgStore::new(pool);
        store.migrate().await.unwrap();

        let points = [DataPoint::new("test_vector", 2000, 1.5)];
        store.upsert_data_points("test_source", &points).await.unwrap();
        let second = store.upsert_data_points("test_source", &points).await.unwrap();
        assert_eq!(second.updated, 1);

        store.clear_source("test_source").await.unwrap();
    }
}
