//! Major projects map features from the NRCan ArcGIS MapServer (points and lines, EN and FR)

use crate::ingestion::types::MapRow;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub const SOURCE_KEY: &str = "major_projects_map";

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Points,
    Lines,
}

impl Layer {
    pub fn id(&self) -> u8 {
        match self {
            Layer::Points => 0,
            Layer::Lines => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Points => "point",
            Layer::Lines => "line",
        }
    }
}

/// MapServer language and the sector name it uses for energy
#[derive(Debug, Clone, Copy)]
pub struct MapLanguage {
    pub lang: &'static str,
    pub sector: &'static str,
}

pub const LANGUAGES: [MapLanguage; 2] = [
    MapLanguage { lang: "en", sector: "Energy" },
    MapLanguage { lang: "fr", sector: "Énergie" },
];

/// Server-side sector filter
pub fn query_params(sector: &str) -> Vec<(&'static str, String)> {
    vec![
        ("where", format!("sector='{}'", sector)),
        ("outFields", "*".to_string()),
        ("f", "json".to_string()),
        ("returnGeometry", "true".to_string()),
        ("outSR", "4326".to_string()),
        ("resultRecordCount", "2000".to_string()),
    ]
}

/// Unfiltered query, used when the server rejects the sector filter
pub fn fallback_params() -> Vec<(&'static str, String)> {
    vec![
        ("where", "1=1".to_string()),
        ("outFields", "*".to_string()),
        ("f", "json".to_string()),
        ("returnGeometry", "true".to_string()),
        ("outSR", "4326".to_string()),
    ]
}

/// ArcGIS reports query failures in the body with a 200 status
pub fn is_error_response(body: &Value) -> bool {
    body.get("error").is_some()
}

pub fn features(body: &Value) -> &[Value] {
    body.get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Client-side sector filter for the unfiltered fallback query. Lines match loosely on
/// "nerg" so mis-encoded "Énergie" values still pass.
pub fn sector_matches(layer: Layer, sector: &str, wanted: &str) -> bool {
    match layer {
        Layer::Points => sector == wanted,
        Layer::Lines => sector.to_lowercase().contains("nerg"),
    }
}

#[derive(Debug, Serialize)]
struct Coordinate {
    lon: f64,
    lat: f64,
}

fn attr_text(attrs: &Value, key: &str) -> String {
    match attrs.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Paths as `[[{lon, lat}, ...], ...]`; short coordinates and empty paths are dropped
fn line_paths(geometry: &Value) -> Vec<Vec<Coordinate>> {
    let Some(paths) = geometry.get("paths").and_then(Value::as_array) else {
        return Vec::new();
    };

    paths
        .iter()
        .filter_map(Value::as_array)
        .map(|path| {
            path.iter()
                .filter_map(Value::as_array)
                .filter(|coord| coord.len() >= 2)
                .filter_map(|coord| {
                    Some(Coordinate {
                        lon: coord[0].as_f64()?,
                        lat: coord[1].as_f64()?,
                    })
                })
                .collect::<Vec<_>>()
        })
        .filter(|path| !path.is_empty())
        .collect()
}

fn feature_row(feature: &Value, lang: &str, layer: Layer) -> MapRow {
    let attrs = feature.get("attributes").unwrap_or(&NULL);
    let geometry = feature.get("geometry").unwrap_or(&NULL);

    let mut row = MapRow {
        lang: lang.to_string(),
        feature_id: attr_text(attrs, "id"),
        company: attr_text(attrs, "company"),
        project_name: attr_text(attrs, "project_name"),
        province: attr_text(attrs, "province"),
        location: attr_text(attrs, "location"),
        capital_cost: attr_text(attrs, "capital_cost"),
        capital_cost_range: attr_text(attrs, "capital_cost_range"),
        status: attr_text(attrs, "status"),
        clean_technology: attr_text(attrs, "clean_technology"),
        clean_technology_type: attr_text(attrs, "clean_technology_type"),
        feature_type: layer.as_str().to_string(),
        ..Default::default()
    };

    match layer {
        Layer::Points => {
            row.lat = geometry.get("y").and_then(Value::as_f64);
            row.lon = geometry.get("x").and_then(Value::as_f64);
        }
        Layer::Lines => {
            row.line_type = attr_text(attrs, "type");
            row.paths = serde_json::to_string(&line_paths(geometry)).ok();
        }
    }

    row
}

/// Rows for one layer response. `client_filter` carries the wanted sector when the
/// response came from the unfiltered fallback query.
pub fn parse_layer(body: &Value, lang: &str, layer: Layer, client_filter: Option<&str>) -> Vec<MapRow> {
    let rows: Vec<MapRow> = features(body)
        .iter()
        .filter(|feature| match client_filter {
            Some(wanted) => {
                let sector = feature
                    .get("attributes")
                    .and_then(|a| a.get("sector"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                sector_matches(layer, sector, wanted)
            }
            None => true,
        })
        .map(|feature| feature_row(feature, lang, layer))
        .collect();

    debug!("{} {} {} features", rows.len(), lang, layer.as_str());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_points() {
        let body = json!({
            "features": [{
                "attributes": {"id": 42, "company": "Acme", "project_name": "Wind Farm", "sector": "Energy",
                               "capital_cost": 1500.5, "status": null},
                "geometry": {"x": -113.5, "y": 53.5}
            }]
        });

        let rows = parse_layer(&body, "en", Layer::Points, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feature_id, "42");
        assert_eq!(rows[0].capital_cost, "1500.5");
        assert_eq!(rows[0].status, "");
        assert_eq!(rows[0].lat, Some(53.5));
        assert_eq!(rows[0].lon, Some(-113.5));
        assert_eq!(rows[0].feature_type, "point");
        assert_eq!(rows[0].paths, None);
    }

    #[test]
    fn test_line_paths() {
        let body = json!({
            "features": [{
                "attributes": {"id": "L1", "type": "Pipeline"},
                "geometry": {"paths": [[[-110.0, 50.0], [-111.0, 51.0], [1.0]], []]}
            }]
        });

        let rows = parse_layer(&body, "fr", Layer::Lines, None);
        assert_eq!(rows[0].line_type, "Pipeline");
        assert_eq!(
            rows[0].paths.as_deref(),
            Some(r#"[[{"lon":-110.0,"lat":50.0},{"lon":-111.0,"lat":51.0}]]"#)
        );
        assert_eq!(rows[0].lat, None);
    }

    #[test]
    fn test_fallback_sector_filter_heuristic() {
        // Points need the exact sector; lines accept anything containing "nerg"
        assert!(sector_matches(Layer::Points, "Énergie", "Énergie"));
        assert!(!sector_matches(Layer::Points, "Ã‰nergie", "Énergie"));
        assert!(sector_matches(Layer::Lines, "Ã‰nergie", "Énergie"));
        assert!(sector_matches(Layer::Lines, "ENERGY", "Energy"));
        assert!(sector_matches(Layer::Lines, "Synergies", "Energy"));
        assert!(!sector_matches(Layer::Lines, "Mining", "Energy"));

        let body = json!({
            "features": [
                {"attributes": {"id": 1, "sector": "Energy"}, "geometry": {"paths": []}},
                {"attributes": {"id": 2, "sector": "Mining"}, "geometry": {"paths": []}},
                {"attributes": {"id": 3}, "geometry": {"paths": []}}
            ]
        });
        let rows = parse_layer(&body, "en", Layer::Lines, Some("Energy"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feature_id, "1");
    }

    #[test]
    fn test_error_response() {
        assert!(is_error_response(&json!({"error": {"code": 400}})));
        assert!(!is_error_response(&json!({"features": []})));
        assert!(features(&json!({"error": {}})).is_empty());
    }
}
