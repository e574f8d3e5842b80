// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Structured audit records for workbook writes.
//!
//! Every write-path policy decision produces one event, allowed or not.
//! The service only EMITS events; persistence, shipping, and rotation
//! belong to whatever sink is plugged in. The default sink writes one JSON
//! line per event through the `log` facade under the `audit` target, so
//! operators can route it with an env_logger filter.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::policy::DecisionCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    WriteRange,
    AddTableRows,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub principal: String,
    pub operation: AuditOperation,
    pub drive_id: String,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worksheet: Option<String>,
    /// Range address or table name, as the caller gave it.
    pub target: String,
    pub allowed: bool,
    pub code: DecisionCode,
    pub reason: String,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: JSON lines through the `log` facade.
#[derive(Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                if event.allowed {
                    info!(target: "audit", "{}", line);
                } else {
                    warn!(target: "audit", "{}", line);
                }
            }
            Err(err) => warn!(target: "audit", "unserializable audit event: {}", err),
        }
    }
}

/// Collecting sink for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().expect("audit lock poisoned").push(event);
    }
}
