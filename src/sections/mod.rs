//! Sections group sources; the processor runs them and keeps the run-history audit log

pub mod pipeline;

pub use pipeline::Pipeline;

use crate::config::Config;
use crate::db::Store;
use crate::ingestion::types::RunStatus;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKey {
    Indicators,
    Investment,
}

impl SectionKey {
    pub const ALL: [SectionKey; 2] = [SectionKey::Indicators, SectionKey::Investment];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Indicators => "section1_indicators",
            SectionKey::Investment => "section2_investment",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SectionKey::Indicators => "Key Indicators",
            SectionKey::Investment => "Investment",
        }
    }

    /// Sources in the order they run
    pub fn sources(&self) -> &'static [Source] {
        match self {
            SectionKey::Indicators => &[
                Source::EconomicContributions,
                Source::NominalGdp,
                Source::ProvincialGdp,
                Source::WorldEnergyProduction,
                Source::CanadianEnergyAssets,
            ],
            SectionKey::Investment => &[
                Source::CapitalExpenditures,
                Source::Infrastructure,
                Source::InvestmentByAsset,
                Source::InternationalInvestment,
                Source::ForeignControl,
                Source::EnvironmentalProtection,
                Source::MajorProjects,
                Source::CleanTech,
                Source::MajorProjectsMap,
            ],
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let available: Vec<&str> = SectionKey::ALL.iter().map(|k| k.as_str()).collect();
                anyhow!("Unknown section '{}'. Available: {}", s, available.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    EconomicContributions,
    NominalGdp,
    ProvincialGdp,
    WorldEnergyProduction,
    CanadianEnergyAssets,
    CapitalExpenditures,
    Infrastructure,
    InvestmentByAsset,
    InternationalInvestment,
    ForeignControl,
    EnvironmentalProtection,
    MajorProjects,
    CleanTech,
    MajorProjectsMap,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::EconomicContributions => "economic_contributions",
            Source::NominalGdp => "nominal_gdp",
            Source::ProvincialGdp => "provincial_gdp",
            Source::WorldEnergyProduction => "world_energy_production",
            Source::CanadianEnergyAssets => "canadian_energy_assets",
            Source::CapitalExpenditures => "capital_expenditures",
            Source::Infrastructure => "infrastructure",
            Source::InvestmentByAsset => "investment_by_asset",
            Source::InternationalInvestment => "international_investment",
            Source::ForeignControl => "foreign_control",
            Source::EnvironmentalProtection => "environmental_protection",
            Source::MajorProjects => "major_projects",
            Source::CleanTech => "clean_tech",
            Source::MajorProjectsMap => "major_projects_map",
        }
    }

    pub fn section(&self) -> SectionKey {
        match self {
            Source::EconomicContributions
            | Source::NominalGdp
            | Source::ProvincialGdp
            | Source::WorldEnergyProduction
            | Source::CanadianEnergyAssets => SectionKey::Indicators,
            _ => SectionKey::Investment,
        }
    }

    pub fn all() -> impl Iterator<Item = Source> {
        SectionKey::ALL.into_iter().flat_map(|s| s.sources().iter().copied())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        find_source(s).map(|(_, source)| source)
    }
}

/// Look a source up across all sections
pub fn find_source(key: &str) -> Result<(SectionKey, Source)> {
    Source::all()
        .find(|s| s.as_str() == key)
        .map(|s| (s.section(), s))
        .ok_or_else(|| {
            let available: Vec<&str> = Source::all().map(|s| s.as_str()).collect();
            anyhow!("Unknown source '{}'. Available: {}", key, available.join(", "))
        })
}

/// Runs one source end to end and reports the number of rows stored
#[async_trait]
pub trait SourceRunner: Send + Sync {
    async fn run(&self, source: Source) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: Source,
    pub status: RunStatus,
    pub rows: usize,
    pub error: Option<String>,
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(e) => write!(f, "{}: {} ({})", self.source, self.status, e),
            None => write!(f, "{}: {} ({} rows)", self.source, self.status, self.rows),
        }
    }
}

pub struct SectionProcessor<'a> {
    config: &'a Config,
    store: &'a dyn Store,
    runner: &'a dyn SourceRunner,
}

impl<'a> SectionProcessor<'a> {
    pub fn new(config: &'a Config, store: &'a dyn Store, runner: &'a dyn SourceRunner) -> Self {
        Self { config, store, runner }
    }

    /// Run every enabled source of a section; a failing source never stops the others
    pub async fn refresh_all(&self, section: SectionKey) -> Vec<SourceOutcome> {
        let mut outcomes = Vec::new();

        if !self.config.is_section_enabled(section.as_str()) {
            warn!("Section {} is disabled", section);
            return outcomes;
        }

        for &source in section.sources() {
            if !self.config.is_source_enabled(section.as_str(), source.as_str()) {
                info!("[{}] Skipping disabled source: {}", section.name(), source);
                continue;
            }

            info!("[{}] Processing: {}", section.name(), source);
            let outcome = match self.refresh_source(section, source).await {
                Ok(rows) => SourceOutcome {
                    source,
                    status: RunStatus::Success,
                    rows,
                    error: None,
                },
                Err(e) => SourceOutcome {
                    source,
                    status: RunStatus::Failed,
                    rows: 0,
                    error: Some(format!("{:#}", e)),
                },
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Run one source inside a run-history record; the record is always closed
    pub async fn refresh_source(&self, section: SectionKey, source: Source) -> Result<usize> {
        let run_id = self.store.log_run_start(source.as_str(), "fetch").await?;

        let result = match self.runner.run(source).await {
            Ok(rows) => self
                .store
                .update_source_last_refresh(section.as_str(), source.as_str())
                .await
                .with_context(|| format!("Failed to update data source registry for {}", source))
                .map(|_| rows),
            Err(e) => Err(e),
        };

        match result {
            Ok(rows) => {
                self.store
                    .log_run_complete(run_id, RunStatus::Success, Some(rows as i64), None)
                    .await?;
                info!("✓ {} completed: {} rows", source, rows);
                Ok(rows)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("✗ {} failed: {}", source, message);
                // The run error is what the caller needs; a close failure is only logged
                if let Err(close) = self
                    .store
                    .log_run_complete(run_id, RunStatus::Failed, None, Some(&message))
                    .await
                {
                    error!("Failed to close run {} for {}: {:#}", run_id, source, close);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::FailingStore;
    use crate::db::MemoryStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns canned results and records the order sources were run in
    struct FakeRunner {
        results: HashMap<Source, std::result::Result<usize, String>>,
        calls: Mutex<Vec<Source>>,
    }

    impl FakeRunner {
        fn new(results: &[(Source, std::result::Result<usize, &str>)]) -> Self {
            Self {
                results: results
                    .iter()
                    .map(|(s, r)| (*s, r.map_err(|e| e.to_string())))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SourceRunner for FakeRunner {
        async fn run(&self, source: Source) -> Result<usize> {
            self.calls.lock().unwrap().push(source);
            match self.results.get(&source) {
                Some(Ok(rows)) => Ok(*rows),
                Some(Err(e)) => Err(anyhow!("{}", e)),
                None => Ok(0),
            }
        }
    }

    const CONFIG: &str = r#"
sections:
  section2_investment:
    enabled: true
    sources:
      capital_expenditures:
        enabled: true
      infrastructure:
        enabled: true
      foreign_control:
        enabled: false
      clean_tech:
        enabled: true
  section1_indicators:
    enabled: false
    sources:
      nominal_gdp:
        enabled: true
"#;

    #[test]
    fn test_keys_round_trip() {
        for source in Source::all() {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
            assert!(source.section().sources().contains(&source));
        }
        assert_eq!(Source::all().count(), 14);
        assert_eq!(
            "section2_investment".parse::<SectionKey>().unwrap(),
            SectionKey::Investment
        );
    }

    #[test]
    fn test_unknown_source_lists_available() {
        let err = find_source("capex").unwrap_err().to_string();
        assert!(err.starts_with("Unknown source 'capex'. Available: economic_contributions"));
        assert!(err.contains("major_projects_map"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        let store = MemoryStore::new();
        let runner = FakeRunner::new(&[
            (Source::CapitalExpenditures, Ok(120)),
            (Source::Infrastructure, Err("StatCan returned error page")),
            (Source::CleanTech, Ok(48)),
        ]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        let outcomes = processor.refresh_all(SectionKey::Investment).await;

        // Declared order; disabled and unconfigured sources are skipped
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec![Source::CapitalExpenditures, Source::Infrastructure, Source::CleanTech]
        );
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, RunStatus::Success);
        assert_eq!(outcomes[0].rows, 120);
        assert_eq!(outcomes[1].status, RunStatus::Failed);
        assert_eq!(outcomes[1].error.as_deref(), Some("StatCan returned error page"));
        assert_eq!(outcomes[2].rows, 48);
    }

    #[tokio::test]
    async fn test_run_history_is_written() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        let store = MemoryStore::new();
        let runner = FakeRunner::new(&[
            (Source::CapitalExpenditures, Ok(10)),
            (Source::Infrastructure, Err("timeout")),
        ]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        processor.refresh_all(SectionKey::Investment).await;

        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 3);
        assert!(runs.iter().all(|r| r.run_type == "fetch" && r.completed_at.is_some()));
        assert_eq!(runs[0].rows_affected, Some(10));
        assert_eq!(runs[1].status, RunStatus::Failed);
        assert_eq!(runs[1].error_message.as_deref(), Some("timeout"));

        assert!(store.source_last_refresh("capital_expenditures").unwrap().is_some());
        assert!(store.source_last_refresh("infrastructure").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_section_runs_nothing() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        let store = MemoryStore::new();
        let runner = FakeRunner::new(&[]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        let outcomes = processor.refresh_all(SectionKey::Indicators).await;

        assert!(outcomes.is_empty());
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_source_propagates_error() {
        let config = Config::default();
        let store = MemoryStore::new();
        let runner = FakeRunner::new(&[(Source::NominalGdp, Err("boom"))]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        let result = processor
            .refresh_source(SectionKey::Indicators, Source::NominalGdp)
            .await;

        assert!(result.is_err());
        assert_eq!(store.runs().unwrap()[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_registry_failure_closes_run_as_failed() {
        let config = Config::default();
        let store = FailingStore::new("update_source_last_refresh");
        let runner = FakeRunner::new(&[(Source::CapitalExpenditures, Ok(5))]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        let err = processor
            .refresh_source(SectionKey::Investment, Source::CapitalExpenditures)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("data source registry"));

        let run = store.inner.runs().unwrap().remove(0);
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.completed_at.is_some());
        assert!(run.error_message.unwrap().contains("update_source_last_refresh failed"));
    }

    #[tokio::test]
    async fn test_close_failure_keeps_runner_error() {
        let config = Config::default();
        let store = FailingStore::new("log_run_complete");
        let runner = FakeRunner::new(&[(Source::NominalGdp, Err("forecast document moved"))]);
        let processor = SectionProcessor::new(&config, &store, &runner);

        let err = processor
            .refresh_source(SectionKey::Indicators, Source::NominalGdp)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "forecast document moved");
    }
}
