// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Write-policy enforcement for workbook ranges.
//!
//! The policy document holds two ordered range lists. Locked ranges are
//! checked first and an OVERLAP with any of them denies the write, so a
//! lock always wins over an allow entry. Allowed ranges admit a write only
//! when one of them fully CONTAINS the requested range; overlapping an
//! allow entry without being contained is still a denial.
//!
//! The document is re-read from its source on every validation call.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::excel::address::ParsedRange;
use crate::excel::geometry::{contains, overlaps};

pub mod capability;
pub mod source;

pub use capability::{evaluate_write, read_permitted, CapabilityDecision, WriteTarget};
pub use source::{
    FilePolicySource, GrantScope, InMemoryPolicySource, PolicyDocument, PolicyError,
    PolicySource, PrincipalEntry,
};

/// Decision codes carried on every policy result and audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionCode {
    RangeLocked,
    RangeAllowed,
    RangeNotAllowed,
    ValidationError,
}

impl DecisionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCode::RangeLocked => "RANGE_LOCKED",
            DecisionCode::RangeAllowed => "RANGE_ALLOWED",
            DecisionCode::RangeNotAllowed => "RANGE_NOT_ALLOWED",
            DecisionCode::ValidationError => "VALIDATION_ERROR",
        }
    }
}

/// Structured outcome of a write-policy check.
#[derive(Debug, Clone, Serialize)]
pub struct WriteDecision {
    pub allowed: bool,
    pub reason: String,
    pub code: DecisionCode,
}

impl WriteDecision {
    fn denied(code: DecisionCode, reason: String) -> Self {
        Self {
            allowed: false,
            reason,
            code,
        }
    }

    fn allowed(reason: String) -> Self {
        Self {
            allowed: true,
            reason,
            code: DecisionCode::RangeAllowed,
        }
    }
}

/// Prefix a bare range with the worksheet context as its sheet name.
///
/// Ranges that already carry a `!` qualifier are passed through untouched.
pub fn qualify_range(range: &str, worksheet_context: &str) -> String {
    if range.contains('!') || worksheet_context.is_empty() {
        range.to_string()
    } else {
        format!("{}!{}", worksheet_context, range)
    }
}

/// Range-level write policy backed by a re-read-per-call source.
pub struct RangePolicy {
    source: Arc<dyn PolicySource>,
}

impl RangePolicy {
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self { source }
    }

    /// Check a requested range against the current lock/allow lists.
    ///
    /// `worksheet_context` qualifies the range when the raw string lacks a
    /// sheet name. The evaluation order is strict: reload, qualify, parse,
    /// locked-overlap scan, allowed-containment scan.
    pub fn validate_write(&self, requested_range: &str, worksheet_context: &str) -> WriteDecision {
        match self.source.current_policy() {
            Ok(document) => self.validate_against(&document, requested_range, worksheet_context),
            Err(err) => WriteDecision::denied(
                DecisionCode::ValidationError,
                format!("policy source error: {}", err),
            ),
        }
    }

    /// Full write authorization: capability gate first, then range lists.
    pub fn authorize_write(
        &self,
        principal: &str,
        target: &WriteTarget<'_>,
        requested_range: &str,
        worksheet_context: &str,
    ) -> WriteDecision {
        let document = match self.source.current_policy() {
            Ok(document) => document,
            Err(err) => {
                return WriteDecision::denied(
                    DecisionCode::ValidationError,
                    format!("policy source error: {}", err),
                )
            }
        };

        match evaluate_write(&document, principal, target) {
            CapabilityDecision::AdminBypass => WriteDecision::allowed(format!(
                "principal '{}' is an administrator",
                principal
            )),
            CapabilityDecision::Denied(reason) => {
                warn!("Write capability denied: {}", reason);
                WriteDecision::denied(DecisionCode::RangeNotAllowed, reason)
            }
            CapabilityDecision::Permitted => {
                self.validate_against(&document, requested_range, worksheet_context)
            }
        }
    }

    /// Table writes have no range to check; only the capability gate runs.
    pub fn authorize_table_write(
        &self,
        principal: &str,
        target: &WriteTarget<'_>,
    ) -> WriteDecision {
        let document = match self.source.current_policy() {
            Ok(document) => document,
            Err(err) => {
                return WriteDecision::denied(
                    DecisionCode::ValidationError,
                    format!("policy source error: {}", err),
                )
            }
        };

        match evaluate_write(&document, principal, target) {
            CapabilityDecision::AdminBypass => WriteDecision::allowed(format!(
                "principal '{}' is an administrator",
                principal
            )),
            CapabilityDecision::Permitted => {
                WriteDecision::allowed("table write permitted".to_string())
            }
            CapabilityDecision::Denied(reason) => {
                warn!("Table write capability denied: {}", reason);
                WriteDecision::denied(DecisionCode::RangeNotAllowed, reason)
            }
        }
    }

    /// The current allow list, for 403 response bodies. Empty when the
    /// source cannot be read; the denial itself already reported that.
    pub fn allowed_ranges(&self) -> Vec<String> {
        self.source
            .current_policy()
            .map(|document| document.allowed_ranges)
            .unwrap_or_default()
    }

    fn validate_against(
        &self,
        document: &PolicyDocument,
        requested_range: &str,
        worksheet_context: &str,
    ) -> WriteDecision {
        let qualified = qualify_range(requested_range, worksheet_context);

        let requested = match ParsedRange::parse(&qualified) {
            Ok(parsed) => parsed,
            Err(err) => {
                return WriteDecision::denied(DecisionCode::ValidationError, err.to_string())
            }
        };

        // Locked ranges short-circuit before any allow entry is consulted.
        for entry in &document.locked_ranges {
            let locked = match ParsedRange::parse(entry) {
                Ok(parsed) => parsed,
                Err(err) => {
                    return WriteDecision::denied(
                        DecisionCode::ValidationError,
                        format!("malformed locked range '{}': {}", entry, err),
                    )
                }
            };
            if overlaps(&requested, &locked) {
                warn!("Write to {} denied: overlaps locked range {}", qualified, entry);
                return WriteDecision::denied(
                    DecisionCode::RangeLocked,
                    format!("range {} overlaps locked range {}", qualified, entry),
                );
            }
        }

        for entry in &document.allowed_ranges {
            let allowed = match ParsedRange::parse(entry) {
                Ok(parsed) => parsed,
                Err(err) => {
                    return WriteDecision::denied(
                        DecisionCode::ValidationError,
                        format!("malformed allowed range '{}': {}", entry, err),
                    )
                }
            };
            if overlaps(&requested, &allowed) && contains(&requested, &allowed) {
                return WriteDecision::allowed(format!(
                    "range {} is contained in allowed range {}",
                    qualified, entry
                ));
            }
        }

        WriteDecision::denied(
            DecisionCode::RangeNotAllowed,
            format!("no allowed range fully contains {}", qualified),
        )
    }
}
