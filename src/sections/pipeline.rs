//! Production source runner - fetch, extract and store each source

use super::{Source, SourceRunner};
use crate::config::Config;
use crate::db::Store;
use crate::error::FetchError;
use crate::ingestion::extract::map::{self, Layer, MapLanguage, LANGUAGES};
use crate::ingestion::extract::{
    asset, capex, cea, clean_tech, economic, environmental, foreign_control, infrastructure,
    international, major_projects, nominal_gdp, provincial, world_energy,
};
use crate::ingestion::fetch::{fetch_json, fetch_statcan_table, fetch_text};
use crate::ingestion::html::{HtmlDocument, HtmlParser};
use crate::ingestion::table::Table;
use crate::ingestion::types::{Extract, MapRow};
use crate::ingestion::urls::{self, StatcanTable};
use crate::ingestion::workbook::{read_sheets, sheet_names};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct Pipeline<'a> {
    config: &'a Config,
    client: &'a Client,
    store: &'a dyn Store,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, client: &'a Client, store: &'a dyn Store) -> Self {
        Self { config, client, store }
    }

    async fn statcan(&self, table: &StatcanTable) -> Result<Table> {
        let url = table.url();
        let table = fetch_statcan_table(self.client, &url).await?;
        info!("Fetched {} rows", table.len());
        Ok(table)
    }

    /// Fetch the NRCan MPI page; None (after a warning) when it cannot be fetched
    async fn mpi_page(&self, source: Source) -> Result<Option<HtmlDocument>> {
        match fetch_text(self.client, urls::MAJOR_PROJECTS_PAGE).await {
            Ok(html) => {
                let parser = HtmlParser::new().context("Failed to build HTML parser")?;
                Ok(Some(parser.parse(&html)))
            }
            Err(e) => {
                warn!("{}: failed to fetch NRCan page: {}", source, e);
                Ok(None)
            }
        }
    }

    /// Configured workbook path, if set and present on disk
    fn workbook_path(&self, source: Source) -> Option<PathBuf> {
        let configured = self
            .config
            .source_config(source.section().as_str(), source.as_str())
            .and_then(|s| s.path.as_ref());

        let Some(path) = configured else {
            warn!("{}: no workbook path configured", source);
            return None;
        };

        let path = self.config.resolve_path(path);
        if !path.exists() {
            warn!("{}: workbook not found at {}", source, path.display());
            return None;
        }
        Some(path)
    }

    /// Persist everything an extractor produced; returns the number of semantic rows
    async fn store_extract(&self, source: Source, extract: Extract) -> Result<usize> {
        let source_key = source.as_str();

        if !extract.raw.is_empty() {
            let raw_key = format!("{}_raw", source_key);
            let stats = self.store.upsert_data_points(&raw_key, &extract.raw).await?;
            self.store
                .upsert_metadata(&raw_key, &extract.raw_metadata)
                .await?;
            info!("{}: {} native points ({})", raw_key, extract.raw.len(), stats);
        }

        if extract.is_empty() {
            warn!("{}: no data extracted", source_key);
            return Ok(0);
        }

        // Vectors that dropped out of this run (e.g. a country leaving the top 10) go too
        let rows = extract.row_count();
        let points: Vec<_> = extract.data.into_iter().chain(extract.derived).collect();
        let stats = self
            .store
            .replace_source(source_key, &points, &extract.metadata)
            .await
            .with_context(|| format!("Failed to store {} data", source_key))?;

        for batch in &extract.calc {
            let written = self.store.upsert_calc(batch).await?;
            info!("{}: {} rows in {}", source_key, written, batch.table());
        }

        info!("{}: {}", source_key, stats);
        Ok(rows)
    }

    async fn economic_contributions(&self) -> Result<usize> {
        let econ = self.statcan(&urls::ECONOMIC_CONTRIBUTIONS).await?;

        // Investment value is optional; the remaining vectors stand on their own
        let capex = match self.statcan(&urls::CAPITAL_EXPENDITURES).await {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("{}: capital expenditures unavailable: {:#}", Source::EconomicContributions, e);
                None
            }
        };

        let extract = economic::extract(&econ, capex.as_ref());
        self.store_extract(Source::EconomicContributions, extract).await
    }

    async fn nominal_gdp(&self) -> Result<usize> {
        let text = match fetch_text(self.client, urls::GDP_FORECAST_DOC).await {
            Ok(text) => text,
            Err(e) => {
                warn!("{}: failed to fetch forecast document: {}", Source::NominalGdp, e);
                return Ok(0);
            }
        };
        self.store_extract(Source::NominalGdp, nominal_gdp::extract(&text))
            .await
    }

    async fn provincial_gdp(&self) -> Result<usize> {
        let table = self.statcan(&urls::PROVINCIAL_GDP).await?;
        let reference_year_total = self
            .config
            .source_config(Source::ProvincialGdp.section().as_str(), Source::ProvincialGdp.as_str())
            .and_then(|s| s.reference_year_total)
            .unwrap_or(provincial::DEFAULT_REFERENCE_YEAR_TOTAL);

        let extract = provincial::extract(&table, reference_year_total);
        self.store_extract(Source::ProvincialGdp, extract).await
    }

    async fn world_energy_production(&self) -> Result<usize> {
        let source = Source::WorldEnergyProduction;
        let Some(path) = self.workbook_path(source) else {
            return Ok(0);
        };

        if !sheet_names(&path)?.iter().any(|n| n == world_energy::SHEET) {
            warn!("{}: sheet {} not found in {}", source, world_energy::SHEET, path.display());
            return Ok(0);
        }

        let sheets = read_sheets(&path, Some(&[world_energy::SHEET]))?;
        let Some(sheet) = sheets.first() else {
            return Ok(0);
        };

        let extract = world_energy::extract(&sheet.to_table(world_energy::HEADER_ROW));
        self.store_extract(source, extract).await
    }

    async fn canadian_energy_assets(&self) -> Result<usize> {
        let source = Source::CanadianEnergyAssets;
        let Some(path) = self.workbook_path(source) else {
            return Ok(0);
        };

        let sheets = read_sheets(&path, None)?;
        self.store_extract(source, cea::extract(&sheets)).await
    }

    async fn major_projects(&self) -> Result<usize> {
        let Some(doc) = self.mpi_page(Source::MajorProjects).await? else {
            return Ok(0);
        };
        self.store_extract(Source::MajorProjects, major_projects::extract(&doc))
            .await
    }

    async fn clean_tech(&self) -> Result<usize> {
        let Some(doc) = self.mpi_page(Source::CleanTech).await? else {
            return Ok(0);
        };
        self.store_extract(Source::CleanTech, clean_tech::extract(&doc))
            .await
    }

    /// One MapServer layer, falling back to an unfiltered query when the server rejects
    /// the sector filter
    async fn map_layer(&self, language: MapLanguage, layer: Layer) -> Result<Vec<MapRow>, FetchError> {
        let url = urls::arcgis_query_url(language.lang, layer.id());

        let params = map::query_params(language.sector);
        let body = fetch_json(self.client, &url, &as_pairs(&params)).await?;
        if !map::is_error_response(&body) {
            return Ok(map::parse_layer(&body, language.lang, layer, None));
        }

        warn!(
            "{} {} layer rejected the sector filter, querying all features",
            language.lang,
            layer.as_str()
        );
        let body = fetch_json(self.client, &url, &as_pairs(&map::fallback_params())).await?;
        Ok(map::parse_layer(&body, language.lang, layer, Some(language.sector)))
    }

    async fn major_projects_map(&self) -> Result<usize> {
        let mut rows = Vec::new();

        for language in LANGUAGES {
            for layer in [Layer::Points, Layer::Lines] {
                match self.map_layer(language, layer).await {
                    Ok(mut layer_rows) => {
                        info!(
                            "{}: {} {} features ({})",
                            map::SOURCE_KEY,
                            layer_rows.len(),
                            layer.as_str(),
                            language.lang
                        );
                        rows.append(&mut layer_rows);
                    }
                    Err(e) => warn!(
                        "{}: {} {} layer failed: {}",
                        map::SOURCE_KEY,
                        language.lang,
                        layer.as_str(),
                        e
                    ),
                }
            }
        }

        if rows.is_empty() {
            warn!("{}: no features fetched, keeping the existing map", map::SOURCE_KEY);
            return Ok(0);
        }

        self.store
            .replace_major_projects_map(&rows)
            .await
            .context("Failed to store major projects map")
    }
}

fn as_pairs<'p>(params: &'p [(&'static str, String)]) -> Vec<(&'static str, &'p str)> {
    params.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

#[async_trait]
impl SourceRunner for Pipeline<'_> {
    async fn run(&self, source: Source) -> Result<usize> {
        match source {
            Source::EconomicContributions => self.economic_contributions().await,
            Source::NominalGdp => self.nominal_gdp().await,
            Source::ProvincialGdp => self.provincial_gdp().await,
            Source::WorldEnergyProduction => self.world_energy_production().await,
            Source::CanadianEnergyAssets => self.canadian_energy_assets().await,
            Source::CapitalExpenditures => {
                let table = self.statcan(&urls::CAPITAL_EXPENDITURES).await?;
                self.store_extract(source, capex::extract(&table)).await
            }
            Source::Infrastructure => {
                let table = self.statcan(&urls::INFRASTRUCTURE).await?;
                self.store_extract(source, infrastructure::extract(&table)).await
            }
            Source::InvestmentByAsset => {
                let table = self.statcan(&urls::INVESTMENT_BY_ASSET).await?;
                self.store_extract(source, asset::extract(&table)).await
            }
            Source::InternationalInvestment => {
                let table = self.statcan(&urls::INTERNATIONAL_INVESTMENT).await?;
                self.store_extract(source, international::extract(&table)).await
            }
            Source::ForeignControl => {
                let table = self.statcan(&urls::FOREIGN_CONTROL).await?;
                self.store_extract(source, foreign_control::extract(&table)).await
            }
            Source::EnvironmentalProtection => {
                let table = self.statcan(&urls::ENVIRONMENTAL_PROTECTION).await?;
                self.store_extract(source, environmental::extract(&table)).await
            }
            Source::MajorProjects => self.major_projects().await,
            Source::CleanTech => self.clean_tech().await,
            Source::MajorProjectsMap => self.major_projects_map().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::FailingStore;
    use crate::db::MemoryStore;
    use crate::ingestion::types::{CalcBatch, CapexCalc, DataPoint, MetadataRecord};
    use crate::ingestion::utils::build_client;
    use std::time::Duration;

    fn extract() -> Extract {
        Extract {
            data: vec![DataPoint::new("capex_total", 2022, 150.0)],
            derived: vec![DataPoint::new("capex_total_billions", 2022, 0.15)],
            metadata: vec![MetadataRecord::new("capex_total", "Total", "Dollars", "millions")],
            calc: vec![CalcBatch::Capex(vec![CapexCalc {
                ref_year: 2022,
                oil_gas: 100.0,
                electricity: 30.0,
                other_energy: 20.0,
                total: 150.0,
            }])],
            raw: vec![DataPoint::new("v1043878336", 2022, 9.5)],
            raw_metadata: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_store_extract_writes_every_part() {
        let config = Config::default();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(&config, &client, &store);

        let rows = pipeline
            .store_extract(Source::CapitalExpenditures, extract())
            .await
            .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(store.value("capex_total_billions", "2022").unwrap(), Some(0.15));
        assert_eq!(store.value("v1043878336", "2022").unwrap(), Some(9.5));
        assert_eq!(store.calc_rows("calc_capital_expenditures").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_vectors_are_replaced() {
        let config = Config::default();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(&config, &client, &store);

        store
            .upsert_data_points(
                "world_energy_production",
                &[DataPoint::new("energy_prod_norway_rank", 2023, 10.0)],
            )
            .await
            .unwrap();

        let fresh = Extract {
            data: vec![DataPoint::new("energy_prod_world_total", 2023, 650000.0)],
            ..Default::default()
        };
        pipeline
            .store_extract(Source::WorldEnergyProduction, fresh)
            .await
            .unwrap();

        assert_eq!(store.value("energy_prod_norway_rank", "2023").unwrap(), None);
        assert!(store.value("energy_prod_world_total", "2023").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_extract_keeps_previous_rows() {
        let config = Config::default();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(&config, &client, &store);

        store
            .upsert_data_points("foreign_control", &[DataPoint::new("foreign_oil_gas", 2021, 31.2)])
            .await
            .unwrap();

        let rows = pipeline
            .store_extract(Source::ForeignControl, Extract::default())
            .await
            .unwrap();

        assert_eq!(rows, 0);
        assert_eq!(store.value("foreign_oil_gas", "2021").unwrap(), Some(31.2));
    }

    #[tokio::test]
    async fn test_missing_workbook_gives_zero_rows() {
        let config = Config::from_yaml_str(
            r#"
sections:
  section1_indicators:
    enabled: true
    sources:
      world_energy_production:
        enabled: true
        path: /nonexistent/WorldEnergyBalances.xlsx
"#,
        )
        .unwrap();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(&config, &client, &store);

        let rows = pipeline.run(Source::WorldEnergyProduction).await.unwrap();
        assert_eq!(rows, 0);

        let rows = pipeline.run(Source::CanadianEnergyAssets).await.unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_rows() {
        let config = Config::default();
        let client = build_client(Duration::from_secs(1)).unwrap();
        let store = FailingStore::new("replace_source");
        let pipeline = Pipeline::new(&config, &client, &store);

        store
            .inner
            .upsert_data_points("foreign_control", &[DataPoint::new("foreign_oil_gas", 2021, 31.2)])
            .await
            .unwrap();

        let fresh = Extract {
            data: vec![DataPoint::new("foreign_oil_gas", 2022, 29.8)],
            metadata: vec![MetadataRecord::new("foreign_oil_gas", "Oil and gas", "Percent", "units")],
            ..Default::default()
        };
        let result = pipeline.store_extract(Source::ForeignControl, fresh).await;

        assert!(result.is_err());
        assert_eq!(store.inner.value("foreign_oil_gas", "2021").unwrap(), Some(31.2));
        assert_eq!(store.inner.value("foreign_oil_gas", "2022").unwrap(), None);
    }

    // Hits StatCan over the network
    #[tokio::test]
    #[ignore]
    async fn test_capital_expenditures_live() {
        let config = Config::default();
        let client = build_client(config.http.timeout()).unwrap();
        let store = MemoryStore::new();
        let pipeline = Pipeline::new(&config, &client, &store);

        let rows = pipeline.run(Source::CapitalExpenditures).await.unwrap();
        assert!(rows > 0);
        assert!(store.calc_rows("calc_capital_expenditures").unwrap() > 0);
    }
}
