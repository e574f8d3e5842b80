// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Policy document loading.
//!
//! The write policy lives in an operator-edited JSON document and is
//! re-read on every validation call, so edits take effect immediately
//! without a restart. The read itself sits behind the [`PolicySource`]
//! trait so tests can substitute in-memory fixtures without touching the
//! filesystem.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy document: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The operator-edited policy document.
///
/// `allowedRanges` and `lockedRanges` are ordered lists of range strings,
/// each either bare (`"A1:C10"`) or sheet-qualified (`"Sheet1!A1:C10"`).
/// `principals` is the coarse capability table; when empty, the capability
/// layer is inactive and the range lists alone govern writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyDocument {
    pub allowed_ranges: Vec<String>,
    pub locked_ranges: Vec<String>,
    pub principals: Vec<PrincipalEntry>,
}

/// A named API caller and its coarse write capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalEntry {
    pub name: String,
    /// Admins bypass every range check.
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub write_grants: Vec<GrantScope>,
}

/// A write grant at workbook, worksheet, or table granularity.
///
/// `item` matches either the Graph item ID or the file name the caller
/// used, case-insensitively. Workbook grants cover every worksheet and
/// table in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum GrantScope {
    Workbook { item: String },
    Worksheet { item: String, worksheet: String },
    Table { item: String, table: String },
}

/// Provides the current policy document on demand.
pub trait PolicySource: Send + Sync {
    fn current_policy(&self) -> Result<PolicyDocument, PolicyError>;
}

/// Reads the policy JSON from disk on every call.
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PolicySource for FilePolicySource {
    fn current_policy(&self) -> Result<PolicyDocument, PolicyError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// In-memory policy source for tests and embedded defaults.
#[derive(Debug, Default)]
pub struct InMemoryPolicySource {
    document: RwLock<PolicyDocument>,
}

impl InMemoryPolicySource {
    pub fn new(document: PolicyDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    /// Swap the held document, taking effect on the next validation call.
    pub fn replace(&self, document: PolicyDocument) {
        *self.document.write().expect("policy lock poisoned") = document;
    }
}

impl PolicySource for InMemoryPolicySource {
    fn current_policy(&self) -> Result<PolicyDocument, PolicyError> {
        Ok(self.document.read().expect("policy lock poisoned").clone())
    }
}
