// Library module for the factbook pipeline

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod sections;

/// Round half away from zero to a fixed number of decimal places
/// Formula: round(value × 10^decimals) / 10^decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Percentage of `part` in `total`, or None when the total is not positive
pub fn share_pct(part: f64, total: f64, decimals: i32) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    Some(round_to(part / total * 100.0, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_decimals() {
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(12.35, 0), 12.0);
        assert_eq!(round_to(1234.5678, 2), 1234.57);
    }

    #[test]
    fn test_round_to_half_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }

    #[test]
    fn test_share_pct() {
        let pct = share_pct(100.0, 150.0, 1);
        assert!(pct.is_some());
        let pct = pct.unwrap();
        assert!((pct - 66.7).abs() < 0.001);
    }

    #[test]
    fn test_share_pct_zero_total() {
        assert_eq!(share_pct(10.0, 0.0, 1), None);
        assert_eq!(share_pct(10.0, -5.0, 1), None);
    }
}
