//! Upstream endpoints: StatCan table downloads, the NRCan page, ArcGIS and the forecast doc

use chrono::{Datelike, Utc};

const STATCAN_BASE: &str = "https://www150.statcan.gc.ca/t1/tbl1/en/dtl!";

/// A StatCan table-download query
#[derive(Debug, Clone, Copy)]
pub struct StatcanTable {
    pub pid: &'static str,
    pub start_date: &'static str,
    /// URL-encoded member selection, e.g. `%5B%5B%5D%2C%5B1%5D%5D`
    pub selected_members: &'static str,
    pub checked_levels: &'static str,
    pub non_translated: bool,
}

impl StatcanTable {
    pub fn url(&self) -> String {
        statcan_download_url(
            self.pid,
            self.start_date,
            &future_end_date(Utc::now().year()),
            self.selected_members,
            self.checked_levels,
            self.non_translated,
        )
    }
}

/// End date five years ahead so new releases are always in range
pub fn future_end_date(current_year: i32) -> String {
    format!("{}0101", current_year + 5)
}

pub fn statcan_download_url(
    pid: &str,
    start_date: &str,
    end_date: &str,
    selected_members: &str,
    checked_levels: &str,
    non_translated: bool,
) -> String {
    let action = if non_translated {
        "downloadDbLoadingData-nonTraduit.action"
    } else {
        "downloadDbLoadingData.action"
    };
    format!(
        "{STATCAN_BASE}{action}?pid={pid}&latestN=0&startDate={start_date}&endDate={end_date}\
         &csvLocale=en&selectedMembers={selected_members}&checkedLevels={checked_levels}"
    )
}

/// 34-10-0036-01 Capital and repair expenditures
pub const CAPITAL_EXPENDITURES: StatcanTable = StatcanTable {
    pid: "3410003601",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B1%5D%2C%5B8%2C9%2C11%2C34%2C36%2C37%2C50%2C91%5D%5D",
    checked_levels: "0D1",
    non_translated: true,
};

/// 36-10-0608-01 Infrastructure economic accounts, by category
pub const INFRASTRUCTURE: StatcanTable = StatcanTable {
    pid: "3610060801",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B3%5D%2C%5B1%5D%2C%5B%5D%2C%5B48%5D%2C%5B%5D%5D",
    checked_levels: "0D1%2C3D1%2C4D1%2C5D1%2C5D2",
    non_translated: false,
};

/// 36-10-0608-01 asset view
pub const INVESTMENT_BY_ASSET: StatcanTable = StatcanTable {
    pid: "3610060801",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B1%5D%2C%5B2%5D%2C%5B%5D%2C%5B40%2C41%2C42%2C43%2C44%2C45%2C46%2C48%2C57%5D%2C%5B%5D%5D",
    checked_levels: "0D1%2C3D1%2C5D1",
    non_translated: false,
};

/// 36-10-0610-01 Natural resources satellite account, economic contributions
pub const ECONOMIC_CONTRIBUTIONS: StatcanTable = StatcanTable {
    pid: "3610061001",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B%5D%2C%5B%5D%2C%5B%5D%2C%5B39%2C48%2C54%2C55%2C57%5D%2C%5B%5D%5D",
    checked_levels: "0D1%2C1D1%2C2D1%2C3D1%2C5D1",
    non_translated: false,
};

/// 36-10-0009-01 International investment position
pub const INTERNATIONAL_INVESTMENT: StatcanTable = StatcanTable {
    pid: "3610000901",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B1%2C16%2C18%2C19%2C30%5D%2C%5B%5D%2C%5B%5D%5D",
    checked_levels: "0D1%2C2D1%2C3D1",
    non_translated: false,
};

/// 33-10-0570-01 Foreign control of corporate assets
pub const FOREIGN_CONTROL: StatcanTable = StatcanTable {
    pid: "3310057001",
    start_date: "20100101",
    selected_members: "%5B%5B%5D%2C%5B3%2C9%2C11%5D%2C%5B2%5D%2C%5B2%5D%5D",
    checked_levels: "0D1",
    non_translated: false,
};

/// 38-10-0130-01 Environmental protection expenditures
pub const ENVIRONMENTAL_PROTECTION: StatcanTable = StatcanTable {
    pid: "3810013001",
    start_date: "20070101",
    selected_members: "%5B%5B%5D%2C%5B%5D%2C%5B3%2C5%2C6%2C11%5D%2C%5B12%2C13%2C14%2C15%5D%5D",
    checked_levels: "0D1%2C1D1%2C2D1%2C3D1%2C3D2",
    non_translated: false,
};

/// 36-10-0624-01 Provincial natural resources satellite account
pub const PROVINCIAL_GDP: StatcanTable = StatcanTable {
    pid: "3610062401",
    start_date: "20070101",
    selected_members: "%5B%5B1%2C2%2C3%2C4%2C5%2C6%2C7%2C8%2C9%2C10%2C11%2C12%2C13%2C14%5D%2C%5B2%5D%2C%5B2%5D%5D",
    checked_levels: "",
    non_translated: true,
};

/// GDP and employment forecast, Google Docs plaintext export
pub const GDP_FORECAST_DOC: &str =
    "https://docs.google.com/document/d/11ad-aqY6WjcQwHRWuSrZgQKxMD_U6jKaXlR5q-p0CXI/export?format=txt";

/// NRCan Major Projects Inventory publication
pub const MAJOR_PROJECTS_PAGE: &str = "https://natural-resources.canada.ca/science-data/data-analysis/natural-resources-major-projects-planned-under-construction-2024-2034";

const ARCGIS_BASE: &str =
    "https://maps-cartes.services.geo.ca/server_serveur/rest/services/NRCan";

/// MapServer layer query endpoint; layer 0 holds points, layer 1 lines
pub fn arcgis_query_url(lang: &str, layer: u8) -> String {
    format!("{ARCGIS_BASE}/major_projects_inventory_{lang}/MapServer/{layer}/query")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_end_date() {
        assert_eq!(future_end_date(2025), "20300101");
    }

    #[test]
    fn test_capex_url() {
        let url = statcan_download_url(
            CAPITAL_EXPENDITURES.pid,
            CAPITAL_EXPENDITURES.start_date,
            "20300101",
            CAPITAL_EXPENDITURES.selected_members,
            CAPITAL_EXPENDITURES.checked_levels,
            CAPITAL_EXPENDITURES.non_translated,
        );

        assert_eq!(
            url,
            "https://www150.statcan.gc.ca/t1/tbl1/en/dtl!downloadDbLoadingData-nonTraduit.action\
             ?pid=3410003601&latestN=0&startDate=20070101&endDate=20300101&csvLocale=en\
             &selectedMembers=%5B%5B%5D%2C%5B1%5D%2C%5B8%2C9%2C11%2C34%2C36%2C37%2C50%2C91%5D%5D\
             &checkedLevels=0D1"
        );
    }

    #[test]
    fn test_translated_endpoint() {
        let url = INFRASTRUCTURE.url();
        assert!(url.contains("dtl!downloadDbLoadingData.action?pid=3610060801"));
        assert!(PROVINCIAL_GDP.url().ends_with("&checkedLevels="));
    }

    #[test]
    fn test_arcgis_url() {
        assert_eq!(
            arcgis_query_url("fr", 1),
            "https://maps-cartes.services.geo.ca/server_serveur/rest/services/NRCan/major_projects_inventory_fr/MapServer/1/query"
        );
    }
}
