//! Infrastructure net stock by category (StatCan 36-10-0608-01)

use crate::ingestion::derive::{billions, billions_meta, millions_meta, pct, percent_meta, point};
use crate::ingestion::extract::{group_by_year, vector_id, warn_missing};
use crate::ingestion::table::{native_points, Table};
use crate::ingestion::types::{CalcBatch, Extract, InfrastructureCalc, MetadataRecord};
use crate::round_to;
use std::collections::HashMap;
use tracing::info;

pub const SOURCE_KEY: &str = "infrastructure";

pub const FUEL_AND_ENERGY: &str = "v1043878336";
pub const TRANSPORT: &str = "v1043880016";
pub const HEALTH: &str = "v1043876656";
pub const HOUSING: &str = "v1043879176";
pub const EDUCATION: &str = "v1043877496";
pub const PUBLIC_ORDER: &str = "v1043884216";
pub const TRANSIT: &str = "v1043880856";
pub const ENVIRONMENTAL: &str = "v1043881696";
pub const COMMUNICATION: &str = "v1043882536";
pub const RECREATION: &str = "v1043883376";
pub const PIPELINE_TRANSPORT: &str = "v1043880063";

const VECTORS: [&str; 11] = [
    FUEL_AND_ENERGY,
    TRANSPORT,
    HEALTH,
    HOUSING,
    EDUCATION,
    PUBLIC_ORDER,
    TRANSIT,
    ENVIRONMENTAL,
    COMMUNICATION,
    RECREATION,
    PIPELINE_TRANSPORT,
];

pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let (raw, raw_metadata) = native_points(table, SOURCE_KEY);
    out.raw = raw;
    out.raw_metadata = raw_metadata;

    let (Some(vector_col), Some(date_col), Some(value_col)) = (
        table.column(&["VECTOR"]),
        table.column(&["REF_DATE"]),
        table.column(&["VALUE"]),
    ) else {
        warn_missing(SOURCE_KEY, "VECTOR/REF_DATE/VALUE", table);
        return out;
    };

    let rows = table.select(|r| {
        table
            .cell(r, vector_col)
            .is_some_and(|v| VECTORS.contains(&vector_id(v).as_str()))
    });

    let mut calc = Vec::new();

    for (year, rows) in group_by_year(table, &rows, date_col) {
        let mut sums: HashMap<String, f64> = HashMap::new();
        for &r in &rows {
            let (Some(v), Some(value)) = (table.cell(r, vector_col), table.number(r, value_col))
            else {
                continue;
            };
            *sums.entry(vector_id(v)).or_insert(0.0) += value;
        }
        let get = |v: &str| sums.get(v).copied().unwrap_or(0.0);

        let pipeline = get(PIPELINE_TRANSPORT);
        let fuel_energy_pipelines = get(FUEL_AND_ENERGY) + pipeline;
        let transport = get(TRANSPORT) - pipeline;
        let health_housing = get(HEALTH) + get(HOUSING);
        let education = get(EDUCATION);
        let public_safety =
            get(PUBLIC_ORDER) + get(TRANSIT) + get(COMMUNICATION) + get(RECREATION);
        let environmental = get(ENVIRONMENTAL);

        let total = fuel_energy_pipelines
            + transport
            + health_housing
            + education
            + public_safety
            + environmental;

        if total <= 0.0 {
            continue;
        }

        let parts = [
            ("infra_fuel_energy_pipelines", fuel_energy_pipelines),
            ("infra_transport", transport),
            ("infra_health_housing", health_housing),
            ("infra_education", education),
            ("infra_public_safety", public_safety),
            ("infra_environmental", environmental),
            ("infra_total", total),
        ];

        for (vector, value) in parts {
            out.data.push(point(vector, year, value, 1));
        }
        for (vector, value) in &parts[..6] {
            out.derived.extend(pct(vector, year, *value, total, 1));
        }
        for (vector, value) in parts {
            out.derived.push(billions(vector, year, value, 2));
        }

        calc.push(InfrastructureCalc {
            ref_year: year,
            fuel_energy_pipelines: round_to(fuel_energy_pipelines, 1),
            transport: round_to(transport, 1),
            education: round_to(education, 1),
            health_housing: round_to(health_housing, 1),
            environmental: round_to(environmental, 1),
            public_safety: round_to(public_safety, 1),
            total: round_to(total, 1),
        });
    }

    info!("{}: {} years of net stock", SOURCE_KEY, calc.len());

    if !calc.is_empty() {
        out.calc.push(CalcBatch::Infrastructure(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        millions_meta("infra_fuel_energy_pipelines", "Infrastructure - Fuel, energy and pipelines"),
        millions_meta("infra_transport", "Infrastructure - Transport (less pipelines)"),
        millions_meta("infra_health_housing", "Infrastructure - Health and housing"),
        millions_meta("infra_education", "Infrastructure - Education"),
        millions_meta("infra_public_safety", "Infrastructure - Public safety and other"),
        millions_meta("infra_environmental", "Infrastructure - Environmental protection"),
        millions_meta("infra_total", "Infrastructure - Total net stock"),
        percent_meta("infra_fuel_energy_pipelines_pct", "Infrastructure - Fuel, energy and pipelines (% of total)"),
        percent_meta("infra_transport_pct", "Infrastructure - Transport (% of total)"),
        percent_meta("infra_health_housing_pct", "Infrastructure - Health and housing (% of total)"),
        percent_meta("infra_education_pct", "Infrastructure - Education (% of total)"),
        percent_meta("infra_public_safety_pct", "Infrastructure - Public safety (% of total)"),
        percent_meta("infra_environmental_pct", "Infrastructure - Environmental protection (% of total)"),
        billions_meta("infra_fuel_energy_pipelines_billions", "Infrastructure - Fuel, energy and pipelines"),
        billions_meta("infra_transport_billions", "Infrastructure - Transport"),
        billions_meta("infra_health_housing_billions", "Infrastructure - Health and housing"),
        billions_meta("infra_education_billions", "Infrastructure - Education"),
        billions_meta("infra_public_safety_billions", "Infrastructure - Public safety"),
        billions_meta("infra_environmental_billions", "Infrastructure - Environmental protection"),
        billions_meta("infra_total_billions", "Infrastructure - Total net stock"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(year: &str, values: &[(&str, &str)]) -> Table {
        let rows = values
            .iter()
            .map(|(vector, value)| vec![year.to_string(), vector.to_string(), value.to_string()])
            .collect();
        Table::from_rows(&["REF_DATE", "VECTOR", "VALUE"], rows)
    }

    #[test]
    fn test_pipelines_move_from_transport_to_energy() {
        let table = table(
            "2022",
            &[
                (FUEL_AND_ENERGY, "500"),
                (TRANSPORT, "300"),
                (PIPELINE_TRANSPORT, "100"),
                (HEALTH, "20"),
                ("1043879176", "30"),
                (EDUCATION, "40"),
                (PUBLIC_ORDER, "1"),
                (TRANSIT, "2"),
                (COMMUNICATION, "3"),
                (RECREATION, "4"),
                (ENVIRONMENTAL, "50"),
                ("v999", "1000"),
            ],
        );

        let extract = extract(&table);
        let get = |v: &str| extract.value(v, 2022).unwrap();

        assert_eq!(get("infra_fuel_energy_pipelines"), 600.0);
        assert_eq!(get("infra_transport"), 200.0);
        assert_eq!(get("infra_health_housing"), 50.0);
        assert_eq!(get("infra_public_safety"), 10.0);
        assert_eq!(get("infra_total"), 950.0);
        assert_eq!(get("infra_fuel_energy_pipelines_pct"), 63.2);
        assert_eq!(get("infra_total_billions"), 0.95);

        assert_eq!(extract.data.len(), 7);
        assert_eq!(extract.derived.len(), 13);
        assert_eq!(extract.calc[0].len(), 1);
    }

    #[test]
    fn test_zero_total_year_is_dropped() {
        let table = table("2021", &[(EDUCATION, "0"), ("v999", "10")]);
        let extract = extract(&table);

        assert!(extract.is_empty());
        assert!(extract.calc.is_empty());
    }
}
