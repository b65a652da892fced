//! Element locators and sentinel values of the road-wise progress report.

use crate::session::Locator;

/// Primary menu entry ("Progress Monitoring").
pub const PRIMARY_MENU: &str = r#"//*[@id="divMenuBar"]/div/div/ul/li[4]/a"#;

/// Secondary menu entry ("Road Wise Progress").
pub const REPORT_MENU_ENTRY: &str =
    r#"//*[@id="divMenuBar"]/div/div/ul/li[4]/ul/div/li[1]/ul/li[7]/a"#;

pub const STATE_LIST: &str = r#"//*[@id="StateList_RoadWiseProgressDetails"]"#;
pub const YEAR_LIST: &str = r#"//*[@id="YearList_RoadWiseProgressDetails"]"#;
pub const SCHEME_LIST: &str = r#"//*[@id="SchemeList_RoadWiseProgressDetails"]"#;
pub const DISTRICT_LIST: &str = r#"//*[@id="DistrictList_RoadWiseProgressDetails"]"#;
pub const BLOCK_LIST: &str = r#"//*[@id="BlockList_RoadWiseProgressDetails"]"#;

pub const VIEW_BUTTON: &str = r#"//*[@id="btnViewRoadWiseProgressWork"]"#;

/// The frame the report viewer renders into.
pub const REPORT_FRAME: &str = r#"//div[@id="loadReport"]/iframe"#;

/// Option value meaning "All Districts" / "All Blocks".
pub const SENTINEL_VALUE: &str = "0";

/// Block label that requests the district-level summary table.
pub const ALL_BLOCKS: &str = "All Blocks";

pub const BLOCK_HEADER: &str = "Block Name";
pub const DISTRICT_HEADER: &str = "District Name";

pub fn locator(xpath: &str) -> Locator {
    Locator::xpath(xpath)
}

/// Header label of the result table for a given block selection.
///
/// Selecting a specific block renders a per-block table; "All Blocks" renders
/// the district summary instead.
pub fn header_label_for(block: &str) -> &'static str {
    if block == ALL_BLOCKS {
        DISTRICT_HEADER
    } else {
        BLOCK_HEADER
    }
}
