//! Work items and harvested records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One report query: a block of a district of a state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Block")]
    pub block: String,
}

/// An entry of the enumerated state/district/block universe.
pub type BlockTaxonomyEntry = WorkItem;

impl WorkItem {
    pub fn new(
        state: impl Into<String>,
        district: impl Into<String>,
        block: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            district: district.into(),
            block: block.into(),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State: {}, District: {}, Block: {}",
            self.state, self.district, self.block
        )
    }
}

/// The three values read from the report row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub total_works: String,
    pub road_length: String,
    pub sanction_cost: String,
}

impl RecordFields {
    pub fn new(
        total_works: impl Into<String>,
        road_length: impl Into<String>,
        sanction_cost: impl Into<String>,
    ) -> Self {
        Self {
            total_works: total_works.into(),
            road_length: road_length.into(),
            sanction_cost: sanction_cost.into(),
        }
    }

    /// The degraded result: three empty strings.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_works.is_empty() && self.road_length.is_empty() && self.sanction_cost.is_empty()
    }
}

/// One output row: the work item plus what was extracted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Block")]
    pub block: String,
    #[serde(rename = "Total No. Of Works")]
    pub total_works: String,
    #[serde(rename = "Road Length")]
    pub road_length: String,
    #[serde(rename = "Sanction Cost")]
    pub sanction_cost: String,
}

impl ResultRecord {
    pub fn new(item: WorkItem, fields: RecordFields) -> Self {
        Self {
            state: item.state,
            district: item.district,
            block: item.block,
            total_works: fields.total_works,
            road_length: fields.road_length,
            sanction_cost: fields.sanction_cost,
        }
    }

    /// Record for an item whose data could not be fetched.
    pub fn empty(item: WorkItem) -> Self {
        Self::new(item, RecordFields::empty())
    }

    /// The identity fields this record was produced for.
    pub fn work_item(&self) -> WorkItem {
        WorkItem::new(&self.state, &self.district, &self.block)
    }

    /// Whether any extracted field carries a value.
    pub fn is_populated(&self) -> bool {
        !(self.total_works.is_empty() && self.road_length.is_empty() && self.sanction_cost.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_identity() {
        let item = WorkItem::new("Bihar", "Patna", "All Blocks");
        let record = ResultRecord::new(item.clone(), RecordFields::new("12", "34.5", "678"));
        assert_eq!(record.work_item(), item);
        assert!(record.is_populated());
    }

    #[test]
    fn test_empty_record() {
        let record = ResultRecord::empty(WorkItem::new("Haryana", "Hisar", "Adampur"));
        assert!(!record.is_populated());
        assert_eq!(record.total_works, "");
        assert!(RecordFields::empty().is_empty());
    }

    #[test]
    fn test_work_item_display() {
        let item = WorkItem::new("Bihar", "Patna", "Bakhtiyarpur");
        assert_eq!(
            item.to_string(),
            "State: Bihar, District: Patna, Block: Bakhtiyarpur"
        );
    }
}
