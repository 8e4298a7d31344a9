//! Investment in fuel, energy and pipeline infrastructure by asset (36-10-0608-01 asset view)

use crate::ingestion::classify::{Classifier, Rule};
use crate::ingestion::derive::{billions, billions_meta, millions_meta, point};
use crate::ingestion::extract::{group_by_year, warn_missing};
use crate::ingestion::table::Table;
use crate::ingestion::types::{Extract, MetadataRecord};
use tracing::{info, warn};

pub const SOURCE_KEY: &str = "investment_by_asset";
const FIRST_YEAR: i32 = 2009;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Asset {
    WindSolar,
    SteamThermal,
    Nuclear,
    Hydraulic,
    OtherElectric,
    TransmissionNetworks,
    DistributionNetworks,
    Pipelines,
    Transformers,
}

const RULES: &[Rule<Asset>] = &[
    Rule::exact(Asset::WindSolar, "Wind and solar power plants"),
    Rule::exact(Asset::SteamThermal, "Steam production plants"),
    Rule::exact(Asset::Nuclear, "Nuclear production plants"),
    Rule::exact(Asset::Hydraulic, "Hydraulic production plants"),
    Rule::exact(Asset::OtherElectric, "Other electric power construction"),
    Rule::exact(Asset::TransmissionNetworks, "Power transmission networks"),
    Rule::exact(Asset::DistributionNetworks, "Power distribution networks"),
    Rule::exact(Asset::Pipelines, "Pipelines"),
    Rule::exact(Asset::Transformers, "Power and distribution transformers"),
];

pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let Some(asset_col) = table.column(&["Asset"]) else {
        warn_missing(SOURCE_KEY, "Asset", table);
        return out;
    };
    let (Some(date_col), Some(value_col)) = (table.column(&["REF_DATE"]), table.column(&["VALUE"]))
    else {
        warn_missing(SOURCE_KEY, "REF_DATE/VALUE", table);
        return out;
    };

    let classifier = match Classifier::new(RULES) {
        Ok(c) => c,
        Err(e) => {
            warn!("{}: invalid label rules: {}", SOURCE_KEY, e);
            return out;
        }
    };

    let rows: Vec<usize> = (0..table.len()).collect();
    let mut years = 0;

    for (year, rows) in group_by_year(table, &rows, date_col) {
        if year < FIRST_YEAR {
            continue;
        }

        let sums = classifier.sum_by_bucket(table, asset_col, value_col, &rows);
        let get = |a: Asset| sums.get(&a).copied().unwrap_or(0.0);

        let transmission_distribution = get(Asset::TransmissionNetworks)
            + get(Asset::DistributionNetworks)
            + get(Asset::Transformers);

        let parts = [
            ("asset_wind_solar", get(Asset::WindSolar)),
            ("asset_transmission_distribution", transmission_distribution),
            ("asset_pipelines", get(Asset::Pipelines)),
            ("asset_nuclear", get(Asset::Nuclear)),
            ("asset_hydraulic", get(Asset::Hydraulic)),
            ("asset_steam_thermal", get(Asset::SteamThermal)),
            ("asset_other_electric", get(Asset::OtherElectric)),
        ];
        let total: f64 = parts.iter().map(|(_, v)| v).sum();

        if total <= 0.0 {
            continue;
        }
        years += 1;

        for (vector, value) in parts.into_iter().chain([("asset_total", total)]) {
            out.data.push(point(vector, year, value, 1));
            out.derived.push(billions(vector, year, value, 2));
        }
    }

    info!("{}: {} years of asset investment", SOURCE_KEY, years);

    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    let names = [
        ("asset_wind_solar", "Investment by asset - Wind and solar"),
        ("asset_transmission_distribution", "Investment by asset - Transmission and distribution"),
        ("asset_pipelines", "Investment by asset - Pipelines"),
        ("asset_nuclear", "Investment by asset - Nuclear"),
        ("asset_hydraulic", "Investment by asset - Hydraulic"),
        ("asset_steam_thermal", "Investment by asset - Steam/thermal"),
        ("asset_other_electric", "Investment by asset - Other electric"),
        ("asset_total", "Investment - Total fuel, energy and pipeline"),
    ];

    let mut records: Vec<MetadataRecord> = names
        .iter()
        .map(|(vector, title)| millions_meta(vector, title))
        .collect();
    records.extend(names.iter().map(|(vector, title)| {
        billions_meta(&format!("{}_billions", vector), &format!("{} (billions)", title))
    }));
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: &str, asset: &str, value: &str) -> Vec<String> {
        vec![year.to_string(), asset.to_string(), value.to_string()]
    }

    #[test]
    fn test_transmission_distribution_rollup() {
        let table = Table::from_rows(
            &["REF_DATE", "Asset", "VALUE"],
            vec![
                row("2008", "Pipelines", "999"),
                row("2022", "Power transmission networks", "100"),
                row("2022", "Power distribution networks", "200"),
                row("2022", "Power and distribution transformers", "50"),
                row("2022", "Pipelines", "1000"),
                row("2022", "Wind and solar power plants", "25.56"),
                row("2022", "Pipelines (other)", "7"),
            ],
        );

        let extract = extract(&table);

        assert_eq!(extract.value("asset_transmission_distribution", 2022), Some(350.0));
        assert_eq!(extract.value("asset_wind_solar", 2022), Some(25.6));
        assert_eq!(extract.value("asset_total", 2022), Some(1375.6));
        assert_eq!(extract.value("asset_total_billions", 2022), Some(1.38));
        assert_eq!(extract.value("asset_pipelines", 2008), None);
        assert_eq!(extract.data.len(), 8);
        assert_eq!(extract.derived.len(), 8);
        assert_eq!(extract.metadata.len(), 16);
    }
}
