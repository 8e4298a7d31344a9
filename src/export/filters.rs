//! Selective export filters - by source, by website page, or by vector glob

use crate::error::FilterError;
use globset::{Glob, GlobMatcher};

/// Source whose output is the map file rather than vectors
pub const MAP_SOURCE: &str = "major_projects_map";

/// Vector prefixes each source writes
pub const SOURCE_VECTOR_PREFIXES: &[(&str, &[&str])] = &[
    ("economic_contributions", &["econ_"]),
    ("nominal_gdp", &["gdp_nominal_"]),
    ("provincial_gdp", &["gdp_prov_"]),
    ("world_energy_production", &["energy_prod_"]),
    ("canadian_energy_assets", &["cea_"]),
    ("capital_expenditures", &["capex_"]),
    ("infrastructure", &["infra_"]),
    ("investment_by_asset", &["asset_"]),
    ("international_investment", &["intl_"]),
    ("foreign_control", &["foreign_"]),
    ("environmental_protection", &["enviro_"]),
    ("major_projects", &["projects_"]),
    ("clean_tech", &["cleantech_"]),
    (MAP_SOURCE, &[]),
];

/// Vector prefixes each website page reads
pub const PAGE_VECTORS: &[(&str, &[&str])] = &[
    ("Page2", &["energy_prod_"]),
    ("Page3", &["energy_prod_"]),
    ("Page4", &["energy_prod_"]),
    ("Page7", &["gdp_nominal_"]),
    ("Page8", &["gdp_prov_"]),
    ("Page9", &["gdp_nominal_"]),
    ("Page10", &["gdp_nominal_"]),
    ("Page11", &["econ_"]),
    ("Page23", &["capex_"]),
    ("Page24", &["capex_"]),
    ("Page25", &["infra_"]),
    ("Page26", &["asset_"]),
    ("Page27", &["intl_"]),
    ("Page28", &["projects_"]),
    ("Page29", &["intl_"]),
    ("Page30", &["foreign_"]),
    ("Page31", &["intl_", "foreign_"]),
    ("Page32", &["enviro_"]),
    ("Page33", &["cleantech_"]),
    ("Page37", &["enviro_"]),
    ("Page39", &["cea_"]),
];

pub fn source_prefixes(source: &str) -> Option<&'static [&'static str]> {
    SOURCE_VECTOR_PREFIXES
        .iter()
        .find(|(key, _)| *key == source)
        .map(|(_, prefixes)| *prefixes)
}

/// Case-insensitive page lookup, returning the canonical page name
pub fn page_prefixes(page: &str) -> Option<(&'static str, &'static [&'static str])> {
    PAGE_VECTORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(page))
        .copied()
}

pub fn all_sources() -> Vec<&'static str> {
    let mut sources: Vec<&str> = SOURCE_VECTOR_PREFIXES.iter().map(|(key, _)| *key).collect();
    sources.sort_unstable();
    sources
}

pub fn all_pages() -> Vec<&'static str> {
    let mut pages: Vec<&str> = PAGE_VECTORS.iter().map(|(name, _)| *name).collect();
    pages.sort_unstable();
    pages
}

/// Pages reading any of the given prefixes
pub fn pages_for_prefixes(prefixes: &[&str]) -> Vec<&'static str> {
    PAGE_VECTORS
        .iter()
        .filter(|(_, page)| page.iter().any(|p| prefixes.contains(p)))
        .map(|(name, _)| *name)
        .collect()
}

/// Shell-style glob match (`*`, `?`, `[...]`); an invalid pattern matches nothing
pub fn match_vector_pattern(vector: &str, pattern: &str) -> bool {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher().is_match(vector))
        .unwrap_or(false)
}

/// Active export filters; a vector must pass every one of them
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    source: Option<(String, &'static [&'static str])>,
    page: Option<(&'static str, &'static [&'static str])>,
    pattern: Option<(String, GlobMatcher)>,
}

impl ExportFilter {
    pub fn new(
        source: Option<&str>,
        vectors: Option<&str>,
        page: Option<&str>,
    ) -> Result<Self, FilterError> {
        let source = source
            .map(|name| {
                source_prefixes(name)
                    .map(|prefixes| (name.to_string(), prefixes))
                    .ok_or_else(|| FilterError::UnknownSource {
                        name: name.to_string(),
                        available: all_sources().join(", "),
                    })
            })
            .transpose()?;

        let page = page
            .map(|name| {
                page_prefixes(name).ok_or_else(|| FilterError::UnknownPage {
                    name: name.to_string(),
                    available: all_pages().join(", "),
                })
            })
            .transpose()?;

        let pattern = vectors
            .map(|p| Ok::<_, FilterError>((p.to_string(), Glob::new(p)?.compile_matcher())))
            .transpose()?;

        Ok(Self { source, page, pattern })
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some() || self.page.is_some() || self.pattern.is_some()
    }

    pub fn accepts(&self, vector: &str) -> bool {
        if let Some((_, prefixes)) = &self.source {
            if !prefixes.iter().any(|p| vector.starts_with(p)) {
                return false;
            }
        }
        if let Some((_, prefixes)) = &self.page {
            if !prefixes.iter().any(|p| vector.starts_with(p)) {
                return false;
            }
        }
        if let Some((_, matcher)) = &self.pattern {
            if !matcher.is_match(vector) {
                return false;
            }
        }
        true
    }

    /// The map file is written unfiltered, or when the map source itself is selected
    pub fn includes_map(&self) -> bool {
        !self.is_active()
            || self
                .source
                .as_ref()
                .map(|(name, _)| name == MAP_SOURCE)
                .unwrap_or(false)
    }

    /// Short description for log lines, e.g. ` (source: capital_expenditures)`
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some((name, _)) = &self.source {
            parts.push(format!("source: {}", name));
        }
        if let Some((name, _)) = &self.page {
            parts.push(format!("page: {}", name));
        }
        if let Some((pattern, _)) = &self.pattern {
            parts.push(format!("pattern: {}", pattern));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_vector_pattern() {
        assert!(match_vector_pattern("capex_total", "capex_*"));
        assert!(!match_vector_pattern("infra_total", "capex_*"));
        assert!(match_vector_pattern("gdp_nominal_total_pct", "*_pct"));
        assert!(match_vector_pattern("capex_total", "capex_total"));
        assert!(match_vector_pattern("gdp_prov_ab", "gdp_prov_??"));
        assert!(!match_vector_pattern("capex_total", "[bad"));
    }

    #[test]
    fn test_page_lookup_is_case_insensitive() {
        let (name, prefixes) = page_prefixes("page24").unwrap();
        assert_eq!(name, "Page24");
        assert_eq!(prefixes, &["capex_"]);
        assert!(page_prefixes("Page99").is_none());
    }

    #[test]
    fn test_unknown_source_lists_available() {
        let err = ExportFilter::new(Some("capex"), None, None).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Unknown source 'capex'"));
        assert!(message.contains("capital_expenditures"));

        let err = ExportFilter::new(None, None, Some("Page1")).unwrap_err();
        assert!(matches!(err, FilterError::UnknownPage { .. }));
    }

    #[test]
    fn test_every_filter_must_accept() {
        let filter = ExportFilter::new(Some("capital_expenditures"), Some("*_pct"), None).unwrap();
        assert!(filter.accepts("capex_oil_gas_pct"));
        assert!(!filter.accepts("capex_total"));
        assert!(!filter.accepts("infra_total_pct"));

        let page31 = ExportFilter::new(None, None, Some("page31")).unwrap();
        assert!(page31.accepts("intl_cdia_total"));
        assert!(page31.accepts("foreign_assets_pct"));
        assert!(!page31.accepts("capex_total"));
    }

    #[test]
    fn test_map_file_inclusion() {
        assert!(ExportFilter::default().includes_map());
        assert!(ExportFilter::new(Some(MAP_SOURCE), None, None).unwrap().includes_map());
        assert!(!ExportFilter::new(None, Some("capex_*"), None).unwrap().includes_map());
        assert!(!ExportFilter::new(Some("clean_tech"), None, None).unwrap().includes_map());
    }

    #[test]
    fn test_pages_for_prefixes() {
        assert_eq!(pages_for_prefixes(&["cea_"]), vec!["Page39"]);
        assert!(pages_for_prefixes(&[]).is_empty());
    }
}
