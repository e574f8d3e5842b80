//! Shared fixtures: an in-memory Graph collaborator and a manual clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use rustysheets::graph::client::GraphApi;
use rustysheets::graph::error::GraphError;
use rustysheets::graph::types::{
    CellValues, DriveInfo, DriveItemInfo, RangeData, WorksheetInfo,
};
use rustysheets::resolver::Clock;

/// Canned Graph backend recording the calls made against it.
#[derive(Default)]
pub struct FakeGraph {
    pub drives: Vec<DriveInfo>,
    pub items: Vec<DriveItemInfo>,
    pub worksheets: Vec<WorksheetInfo>,
    pub drive_listings: AtomicUsize,
    pub item_listings: AtomicUsize,
    pub worksheet_listings: AtomicUsize,
    /// (worksheet_id, address, values) per successful patch.
    pub patches: Mutex<Vec<(String, String, CellValues)>>,
    /// (table, rows) per successful row append.
    pub row_appends: Mutex<Vec<(String, CellValues)>>,
}

impl FakeGraph {
    /// One drive, one workbook, one worksheet: the usual fixture.
    pub fn seeded() -> Self {
        Self {
            drives: vec![DriveInfo {
                id: "drive-1".to_string(),
                name: "Documents".to_string(),
            }],
            items: vec![DriveItemInfo {
                id: "item-1".to_string(),
                name: "Budget.xlsx".to_string(),
            }],
            worksheets: vec![WorksheetInfo {
                id: "ws-1".to_string(),
                name: "Sheet1".to_string(),
                position: 0,
                visibility: "Visible".to_string(),
            }],
            ..Default::default()
        }
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl GraphApi for FakeGraph {
    async fn list_drives(&self, _site_id: &str) -> Result<Vec<DriveInfo>, GraphError> {
        self.drive_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.drives.clone())
    }

    async fn list_items(&self, _drive_id: &str) -> Result<Vec<DriveItemInfo>, GraphError> {
        self.item_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }

    async fn list_worksheets(
        &self,
        _drive_id: &str,
        _item_id: &str,
    ) -> Result<Vec<WorksheetInfo>, GraphError> {
        self.worksheet_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.worksheets.clone())
    }

    async fn get_range(
        &self,
        _drive_id: &str,
        _item_id: &str,
        _worksheet_id: &str,
        address: &str,
    ) -> Result<RangeData, GraphError> {
        Ok(RangeData {
            address: address.to_string(),
            values: vec![vec![serde_json::json!("cell")]],
            row_count: 1,
            column_count: 1,
        })
    }

    async fn patch_range(
        &self,
        _drive_id: &str,
        _item_id: &str,
        worksheet_id: &str,
        address: &str,
        values: CellValues,
    ) -> Result<RangeData, GraphError> {
        let row_count = values.len() as u32;
        let column_count = values.first().map(|r| r.len()).unwrap_or(0) as u32;
        self.patches.lock().unwrap().push((
            worksheet_id.to_string(),
            address.to_string(),
            values.clone(),
        ));
        Ok(RangeData {
            address: address.to_string(),
            values,
            row_count,
            column_count,
        })
    }

    async fn get_table_range(
        &self,
        _drive_id: &str,
        _item_id: &str,
        _table: &str,
    ) -> Result<RangeData, GraphError> {
        Ok(RangeData {
            address: "A1:B2".to_string(),
            values: vec![
                vec![serde_json::json!("h1"), serde_json::json!("h2")],
                vec![serde_json::json!(1), serde_json::json!(2)],
            ],
            row_count: 2,
            column_count: 2,
        })
    }

    async fn add_table_rows(
        &self,
        _drive_id: &str,
        _item_id: &str,
        table: &str,
        rows: CellValues,
    ) -> Result<(), GraphError> {
        self.row_appends
            .lock()
            .unwrap()
            .push((table.to_string(), rows));
        Ok(())
    }
}

/// Steerable clock for TTL tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard = *guard + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
