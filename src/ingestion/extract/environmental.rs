//! Environmental protection expenditures by industry and activity (StatCan 38-10-0130-01)

use crate::ingestion::derive::{billions, billions_meta, millions_meta};
use crate::ingestion::extract::{group_by_year, rows_equal, warn_missing};
use crate::ingestion::table::Table;
use crate::ingestion::types::{CalcBatch, DataPoint, EnvironmentalCalc, Extract, MetadataRecord};
use std::collections::HashMap;
use tracing::info;

pub const SOURCE_KEY: &str = "environmental_protection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Industry {
    OilGas,
    Electric,
    NaturalGas,
    Petroleum,
    AllIndustries,
}

impl Industry {
    const ALL: [Industry; 5] = [
        Industry::OilGas,
        Industry::Electric,
        Industry::NaturalGas,
        Industry::Petroleum,
        Industry::AllIndustries,
    ];

    fn label(self) -> &'static str {
        match self {
            Industry::OilGas => "Oil and gas extraction [211]",
            Industry::Electric => "Electric power generation, transmission and distribution [2211]",
            Industry::NaturalGas => "Natural gas distribution [2212]",
            Industry::Petroleum => "Petroleum and coal product manufacturing [324]",
            Industry::AllIndustries => "Total, industries",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Industry::OilGas => "oil_gas",
            Industry::Electric => "electric",
            Industry::NaturalGas => "natural_gas",
            Industry::Petroleum => "petroleum",
            Industry::AllIndustries => "all_industries",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Activity {
    Wastewater,
    Soil,
    Air,
    SolidWaste,
    Total,
    Biodiversity,
    Charges,
    OtherActivities,
}

impl Activity {
    /// Published per-activity vectors, in emission order
    const MAIN: [Activity; 5] = [
        Activity::Wastewater,
        Activity::Soil,
        Activity::Air,
        Activity::SolidWaste,
        Activity::Total,
    ];
    const OTHER: [Activity; 3] = [
        Activity::Biodiversity,
        Activity::Charges,
        Activity::OtherActivities,
    ];
    const POLLUTION: [Activity; 4] = [
        Activity::Air,
        Activity::Wastewater,
        Activity::SolidWaste,
        Activity::Soil,
    ];

    fn label(self) -> &'static str {
        match self {
            Activity::Wastewater => "Wastewater management",
            Activity::Soil => "Protection and remediation of soil, groundwater and surface water",
            Activity::Air => "Air pollution management",
            Activity::SolidWaste => "Solid waste management",
            Activity::Total => "Total, environmental protection activities",
            Activity::Biodiversity => "Protection of biodiversity and habitat",
            Activity::Charges => "Environmental charges",
            Activity::OtherActivities => "Other environmental protection activities",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Activity::Wastewater => "wastewater",
            Activity::Soil => "soil",
            Activity::Air => "air",
            Activity::SolidWaste => "solid_waste",
            Activity::Total => "total",
            Activity::Biodiversity => "biodiversity",
            Activity::Charges => "charges",
            Activity::OtherActivities => "other_activities",
        }
    }

    fn from_label(label: &str) -> Option<Activity> {
        Activity::MAIN
            .into_iter()
            .chain(Activity::OTHER)
            .find(|a| a.label() == label)
    }
}

fn industry_from_label(label: &str) -> Option<Industry> {
    Industry::ALL.into_iter().find(|i| i.label() == label)
}

pub fn extract(table: &Table) -> Extract {
    let mut out = Extract::default();

    let (Some(kind_col), Some(industry_col), Some(activity_col)) = (
        table.column(&["Expenditures"]),
        table.column(&["Industries"]),
        table.column(&["Environmental protection activities"]),
    ) else {
        warn_missing(SOURCE_KEY, "Expenditures/Industries/Environmental protection activities", table);
        return out;
    };
    let (Some(date_col), Some(value_col)) = (table.column(&["REF_DATE"]), table.column(&["VALUE"]))
    else {
        warn_missing(SOURCE_KEY, "REF_DATE/VALUE", table);
        return out;
    };

    let rows = rows_equal(table, kind_col, "Total, expenditures");
    let mut calc = Vec::new();

    for (year, rows) in group_by_year(table, &rows, date_col) {
        // First value per (industry, activity), as published
        let mut cells: HashMap<(Industry, Activity), Option<f64>> = HashMap::new();
        for &r in &rows {
            let industry = table.cell(r, industry_col).and_then(industry_from_label);
            let activity = table.cell(r, activity_col).and_then(Activity::from_label);
            if let (Some(industry), Some(activity)) = (industry, activity) {
                cells
                    .entry((industry, activity))
                    .or_insert_with(|| table.number(r, value_col));
            }
        }
        let get = |i: Industry, a: Activity| cells.get(&(i, a)).copied().flatten();

        for activity in Activity::MAIN {
            if let Some(value) = get(Industry::OilGas, activity) {
                out.data.push(DataPoint::new(format!("enviro_oil_gas_{}", activity.key()), year, value));
            }
        }

        let other_sum: f64 = Activity::OTHER
            .iter()
            .filter_map(|&a| get(Industry::OilGas, a))
            .sum();
        if other_sum > 0.0 {
            out.data.push(DataPoint::new("enviro_oil_gas_other", year, other_sum));
        }

        for industry in [Industry::Electric, Industry::NaturalGas, Industry::Petroleum] {
            if let Some(value) = get(industry, Activity::Total) {
                out.data.push(DataPoint::new(format!("enviro_{}_total", industry.key()), year, value));
            }
        }

        let pollution: f64 = Activity::POLLUTION
            .iter()
            .filter_map(|&a| get(Industry::Petroleum, a))
            .sum();
        if pollution > 0.0 {
            out.data.push(DataPoint::new("enviro_petroleum_pollution", year, pollution));
        }

        if let Some(value) = get(Industry::AllIndustries, Activity::Total) {
            out.data.push(DataPoint::new("enviro_all_industries_total", year, value));
        }

        for industry in Industry::ALL {
            let other: f64 = Activity::OTHER
                .iter()
                .filter_map(|&a| get(industry, a))
                .sum();
            let row = EnvironmentalCalc {
                ref_year: year,
                industry_category: industry.key().to_string(),
                wastewater: get(industry, Activity::Wastewater),
                soil_groundwater: get(industry, Activity::Soil),
                air_pollution: get(industry, Activity::Air),
                solid_waste: get(industry, Activity::SolidWaste),
                other: (other > 0.0).then_some(other),
                total: get(industry, Activity::Total),
            };
            let has_values = [
                row.wastewater,
                row.soil_groundwater,
                row.air_pollution,
                row.solid_waste,
                row.other,
                row.total,
            ]
            .iter()
            .any(Option::is_some);
            if has_values {
                calc.push(row);
            }
        }
    }

    // One billions rule: every published *_total vector
    out.derived = out
        .data
        .iter()
        .filter(|p| p.vector.ends_with("_total"))
        .filter_map(|p| {
            p.ref_date
                .parse::<i32>()
                .ok()
                .map(|year| billions(&p.vector, year, p.value, 2))
        })
        .collect();

    info!(
        "{}: {} data rows, {} calc rows",
        SOURCE_KEY,
        out.data.len(),
        calc.len()
    );

    if !calc.is_empty() {
        out.calc.push(CalcBatch::Environmental(calc));
    }
    out.metadata = metadata();
    out
}

fn metadata() -> Vec<MetadataRecord> {
    vec![
        millions_meta("enviro_oil_gas_total", "Oil and gas extraction - Total environmental protection expenditures"),
        millions_meta("enviro_oil_gas_wastewater", "Oil and gas extraction - Wastewater management"),
        millions_meta("enviro_oil_gas_soil", "Oil and gas extraction - Protection and remediation of soil, groundwater and surface water"),
        millions_meta("enviro_oil_gas_air", "Oil and gas extraction - Air pollution management"),
        millions_meta("enviro_oil_gas_solid_waste", "Oil and gas extraction - Solid waste management"),
        millions_meta("enviro_oil_gas_other", "Oil and gas extraction - Other environmental protection activities"),
        millions_meta("enviro_electric_total", "Electric power generation - Total environmental protection expenditures"),
        millions_meta("enviro_natural_gas_total", "Natural gas distribution - Total environmental protection expenditures"),
        millions_meta("enviro_petroleum_total", "Petroleum and coal product manufacturing - Total environmental protection expenditures"),
        millions_meta("enviro_petroleum_pollution", "Petroleum and coal product manufacturing - Pollution abatement and control"),
        millions_meta("enviro_all_industries_total", "Total industries - Total environmental protection expenditures"),
        billions_meta("enviro_oil_gas_total_billions", "Oil and gas - Total (billions)"),
        billions_meta("enviro_electric_total_billions", "Electric power - Total (billions)"),
        billions_meta("enviro_natural_gas_total_billions", "Natural gas distribution - Total (billions)"),
        billions_meta("enviro_petroleum_total_billions", "Petroleum and coal products - Total (billions)"),
        billions_meta("enviro_all_industries_total_billions", "All industries - Total (billions)"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const OIL_GAS: &str = "Oil and gas extraction [211]";
    const PETROLEUM: &str = "Petroleum and coal product manufacturing [324]";

    fn row(kind: &str, industry: &str, activity: &str, value: &str) -> Vec<String> {
        ["2020", kind, industry, activity, value]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn table() -> Table {
        let total = "Total, expenditures";
        Table::from_rows(
            &[
                "REF_DATE",
                "Expenditures",
                "Industries",
                "Environmental protection activities",
                "VALUE",
            ],
            vec![
                row(total, OIL_GAS, "Total, environmental protection activities", "2500"),
                row(total, OIL_GAS, "Wastewater management", "300"),
                row(total, OIL_GAS, "Protection of biodiversity and habitat", "40"),
                row(total, OIL_GAS, "Environmental charges", "10"),
                row(total, OIL_GAS, "Other environmental protection activities", ""),
                row("Capital expenditures", OIL_GAS, "Air pollution management", "900"),
                row(total, PETROLEUM, "Total, environmental protection activities", "800"),
                row(total, PETROLEUM, "Air pollution management", "200"),
                row(total, PETROLEUM, "Solid waste management", "50"),
                row(total, "Total, industries", "Total, environmental protection activities", "12000"),
            ],
        )
    }

    #[test]
    fn test_oil_gas_activities_and_other_bucket() {
        let extract = extract(&table());

        assert_eq!(extract.value("enviro_oil_gas_total", 2020), Some(2500.0));
        assert_eq!(extract.value("enviro_oil_gas_wastewater", 2020), Some(300.0));
        assert_eq!(extract.value("enviro_oil_gas_other", 2020), Some(50.0));
        // Only the "Total, expenditures" rows count
        assert_eq!(extract.value("enviro_oil_gas_air", 2020), None);
    }

    #[test]
    fn test_petroleum_pollution_bucket() {
        let extract = extract(&table());

        assert_eq!(extract.value("enviro_petroleum_pollution", 2020), Some(250.0));
        assert_eq!(extract.value("enviro_petroleum_total", 2020), Some(800.0));
        assert_eq!(extract.value("enviro_electric_total", 2020), None);
    }

    #[test]
    fn test_billions_only_for_totals() {
        let extract = extract(&table());

        let mut derived: Vec<&str> = extract.derived.iter().map(|p| p.vector.as_str()).collect();
        derived.sort_unstable();
        assert_eq!(
            derived,
            vec![
                "enviro_all_industries_total_billions",
                "enviro_oil_gas_total_billions",
                "enviro_petroleum_total_billions",
            ]
        );
        assert_eq!(extract.value("enviro_all_industries_total_billions", 2020), Some(12.0));
    }

    #[test]
    fn test_calc_rows_per_industry() {
        let extract = extract(&table());

        let CalcBatch::Environmental(rows) = &extract.calc[0] else {
            panic!("Expected environmental calc rows");
        };
        assert_eq!(rows.len(), 3);

        let oil_gas = rows.iter().find(|r| r.industry_category == "oil_gas").unwrap();
        assert_eq!(oil_gas.other, Some(50.0));
        assert_eq!(oil_gas.air_pollution, None);
        assert_eq!(oil_gas.total, Some(2500.0));
    }
}
