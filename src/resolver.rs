// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Name-to-ID resolution with TTL caching.
//!
//! Callers address drives, files, and worksheets by the names humans know;
//! Graph wants stable IDs. Each scope has its own cache map: drives keyed
//! by drive name, items by `driveId:itemName`, worksheets by
//! `itemId:worksheetName`, so equal names in different parents never
//! collide. Entries are fresh for ten minutes and are overwritten in place
//! on refresh; stale entries are never purged, only replaced on the next
//! lookup, so the maps grow with the number of distinct names seen.
//!
//! Name matching is exact but case-insensitive. If a listing carries
//! duplicate names, the first match in listing order wins.
//!
//! Concurrent misses for the same key each hit Graph independently and the
//! last write wins; unlike the token provider there is no single-flight
//! here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use tokio::sync::RwLock;

use crate::graph::client::GraphApi;
use crate::graph::error::GraphError;

/// Cache entries stay fresh for ten minutes.
pub const CACHE_TTL_SECONDS: i64 = 600;

/// Time source, injectable so tests can steer TTL expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    id: String,
    cached_at: DateTime<Utc>,
}

pub struct NameResolver {
    graph: Arc<dyn GraphApi>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    drives: RwLock<HashMap<String, CacheEntry>>,
    items: RwLock<HashMap<String, CacheEntry>>,
    worksheets: RwLock<HashMap<String, CacheEntry>>,
}

impl NameResolver {
    pub fn new(graph: Arc<dyn GraphApi>) -> Self {
        Self::with_clock(graph, Arc::new(SystemClock))
    }

    pub fn with_clock(graph: Arc<dyn GraphApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            graph,
            clock,
            ttl: Duration::seconds(CACHE_TTL_SECONDS),
            drives: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            worksheets: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a drive name within the configured site.
    pub async fn resolve_drive_id(
        &self,
        site_id: &str,
        drive_name: &str,
    ) -> Result<String, GraphError> {
        let key = drive_name.to_lowercase();
        if let Some(id) = self.cached(&self.drives, &key).await {
            debug!("Drive '{}' resolved from cache", drive_name);
            return Ok(id);
        }

        let listing = self.graph.list_drives(site_id).await?;
        match listing.iter().find(|drive| drive.name.to_lowercase() == key) {
            Some(drive) => {
                self.store(&self.drives, key, drive.id.clone()).await;
                Ok(drive.id.clone())
            }
            None => {
                let available: Vec<String> = listing.into_iter().map(|d| d.name).collect();
                warn!("Drive '{}' not found among {:?}", drive_name, available);
                Err(GraphError::DriveNotFound {
                    name: drive_name.to_string(),
                    available,
                })
            }
        }
    }

    /// Resolve an item (file) name within a drive.
    pub async fn resolve_item_id(
        &self,
        drive_id: &str,
        item_name: &str,
    ) -> Result<String, GraphError> {
        let key = format!("{}:{}", drive_id, item_name.to_lowercase());
        if let Some(id) = self.cached(&self.items, &key).await {
            debug!("Item '{}' resolved from cache", item_name);
            return Ok(id);
        }

        let name_lower = item_name.to_lowercase();
        let listing = self.graph.list_items(drive_id).await?;
        match listing.iter().find(|item| item.name.to_lowercase() == name_lower) {
            Some(item) => {
                self.store(&self.items, key, item.id.clone()).await;
                Ok(item.id.clone())
            }
            None => {
                let available: Vec<String> = listing.into_iter().map(|i| i.name).collect();
                warn!("Item '{}' not found among {:?}", item_name, available);
                Err(GraphError::ItemNotFound {
                    name: item_name.to_string(),
                    available,
                })
            }
        }
    }

    /// Resolve a worksheet name within a workbook item.
    pub async fn resolve_worksheet_id(
        &self,
        drive_id: &str,
        item_id: &str,
        worksheet_name: &str,
    ) -> Result<String, GraphError> {
        let key = format!("{}:{}", item_id, worksheet_name.to_lowercase());
        if let Some(id) = self.cached(&self.worksheets, &key).await {
            debug!("Worksheet '{}' resolved from cache", worksheet_name);
            return Ok(id);
        }

        let name_lower = worksheet_name.to_lowercase();
        let listing = self.graph.list_worksheets(drive_id, item_id).await?;
        match listing.iter().find(|ws| ws.name.to_lowercase() == name_lower) {
            Some(worksheet) => {
                self.store(&self.worksheets, key, worksheet.id.clone()).await;
                Ok(worksheet.id.clone())
            }
            None => {
                let available: Vec<String> = listing.into_iter().map(|w| w.name).collect();
                warn!(
                    "Worksheet '{}' not found among {:?}",
                    worksheet_name, available
                );
                Err(GraphError::WorksheetNotFound {
                    name: worksheet_name.to_string(),
                    available,
                })
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.cached_at < self.ttl
    }

    async fn cached(&self, map: &RwLock<HashMap<String, CacheEntry>>, key: &str) -> Option<String> {
        let guard = map.read().await;
        guard
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.id.clone())
    }

    async fn store(&self, map: &RwLock<HashMap<String, CacheEntry>>, key: String, id: String) {
        let entry = CacheEntry {
            id,
            cached_at: self.clock.now(),
        };
        // Replaces any previous entry for the key, stale or not.
        map.write().await.insert(key, entry);
    }
}
