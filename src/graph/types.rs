//! Wire types for the Graph endpoints this service touches.

use serde::{Deserialize, Serialize};

/// Rectangular 2D cell values as Graph exchanges them.
pub type CellValues = Vec<Vec<serde_json::Value>>;

/// Generic Graph collection envelope; `@odata` annotations are ignored.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveItemInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub visibility: String,
}

/// A worksheet range as Graph returns it from get/patch calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeData {
    pub address: String,
    #[serde(default)]
    pub values: CellValues,
    #[serde(rename = "rowCount", default)]
    pub row_count: u32,
    #[serde(rename = "columnCount", default)]
    pub column_count: u32,
}
