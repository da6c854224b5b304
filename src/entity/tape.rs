use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of `lstape`, keyed by the column headers, plus the
/// `/dev/tape/by-id` name of the device when one exists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeDevice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, String>,
}

impl TapeDevice {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}
