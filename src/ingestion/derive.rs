//! Display-vector helpers shared by the extractors (_pct, _billions, _thousands)

use crate::ingestion::types::{DataPoint, MetadataRecord};

pub use crate::{round_to, share_pct};

/// `{vector}{suffix}` holding `value / divisor` rounded to `decimals`
pub fn scaled(vector: &str, suffix: &str, year: i32, value: f64, divisor: f64, decimals: i32) -> DataPoint {
    DataPoint::new(format!("{}{}", vector, suffix), year, round_to(value / divisor, decimals))
}

/// Millions of dollars to billions
pub fn billions(vector: &str, year: i32, millions: f64, decimals: i32) -> DataPoint {
    scaled(vector, "_billions", year, millions, 1000.0, decimals)
}

pub fn thousands(vector: &str, year: i32, units: f64, decimals: i32) -> DataPoint {
    scaled(vector, "_thousands", year, units, 1000.0, decimals)
}

/// `{vector}_pct`, or None when the total is not positive
pub fn pct(vector: &str, year: i32, part: f64, total: f64, decimals: i32) -> Option<DataPoint> {
    share_pct(part, total, decimals).map(|v| DataPoint::new(format!("{}_pct", vector), year, v))
}

/// Rounded data point
pub fn point(vector: &str, year: i32, value: f64, decimals: i32) -> DataPoint {
    DataPoint::new(vector, year, round_to(value, decimals))
}

pub fn millions_meta(vector: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(vector, title, "Millions of dollars", "millions")
}

pub fn billions_meta(vector: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(vector, title, "Billions of dollars", "billions")
}

pub fn percent_meta(vector: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(vector, title, "Percent", "percent")
}

pub fn count_meta(vector: &str, title: &str) -> MetadataRecord {
    MetadataRecord::new(vector, title, "Number", "units")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billions() {
        let p = billions("capex_total", 2022, 1234.5, 2);
        assert_eq!(p.vector, "capex_total_billions");
        assert_eq!(p.ref_date, "2022");
        assert_eq!(p.value, 1.23);
    }

    #[test]
    fn test_thousands() {
        let p = thousands("econ_jobs", 2021, 123_456.0, 1);
        assert_eq!(p.vector, "econ_jobs_thousands");
        assert_eq!(p.value, 123.5);
    }

    #[test]
    fn test_pct() {
        let p = pct("capex_oil_gas", 2022, 100.0, 150.0, 1).unwrap();
        assert_eq!(p.vector, "capex_oil_gas_pct");
        assert_eq!(p.value, 66.7);
        assert!(pct("capex_oil_gas", 2022, 1.0, 0.0, 1).is_none());
    }
}
