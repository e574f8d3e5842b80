// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Coarse, principal-level capability checks.
//!
//! This is the simpler rule set that composes with the range policy:
//! admins bypass every range check, reads default to allowed, and writes
//! default to denied unless an explicit grant covers the target at
//! workbook, worksheet, or table granularity. Grants inherit downward: a
//! workbook grant covers all of its worksheets and tables.
//!
//! When the policy document lists no principals at all, the layer is
//! inactive and the range lists alone govern writes.

use crate::policy::source::{GrantScope, PolicyDocument, PrincipalEntry};

/// What the caller is trying to write to, outermost scope first.
#[derive(Debug, Clone, Copy)]
pub struct WriteTarget<'a> {
    pub item_id: &'a str,
    /// The file name the caller used, when they addressed it by name.
    pub item_name: Option<&'a str>,
    pub worksheet: Option<&'a str>,
    pub table: Option<&'a str>,
}

/// Outcome of the capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityDecision {
    /// Principal is an admin; skip the range policy entirely.
    AdminBypass,
    /// Write capability granted; the range policy still applies.
    Permitted,
    Denied(String),
}

/// Reads are allowed by default at every scope.
pub fn read_permitted(_document: &PolicyDocument, _principal: &str) -> bool {
    true
}

pub fn evaluate_write(
    document: &PolicyDocument,
    principal: &str,
    target: &WriteTarget<'_>,
) -> CapabilityDecision {
    if document.principals.is_empty() {
        return CapabilityDecision::Permitted;
    }

    let Some(entry) = find_principal(document, principal) else {
        return CapabilityDecision::Denied(format!(
            "principal '{}' has no write access",
            principal
        ));
    };

    if entry.admin {
        return CapabilityDecision::AdminBypass;
    }

    if entry.write_grants.iter().any(|grant| covers(grant, target)) {
        CapabilityDecision::Permitted
    } else {
        CapabilityDecision::Denied(format!(
            "principal '{}' holds no write grant for this target",
            principal
        ))
    }
}

fn find_principal<'a>(document: &'a PolicyDocument, name: &str) -> Option<&'a PrincipalEntry> {
    document
        .principals
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
}

fn covers(grant: &GrantScope, target: &WriteTarget<'_>) -> bool {
    match grant {
        GrantScope::Workbook { item } => item_matches(item, target),
        GrantScope::Worksheet { item, worksheet } => {
            item_matches(item, target)
                && target
                    .worksheet
                    .is_some_and(|w| w.eq_ignore_ascii_case(worksheet))
        }
        GrantScope::Table { item, table } => {
            item_matches(item, target)
                && target.table.is_some_and(|t| t.eq_ignore_ascii_case(table))
        }
    }
}

fn item_matches(grant_item: &str, target: &WriteTarget<'_>) -> bool {
    grant_item.eq_ignore_ascii_case(target.item_id)
        || target
            .item_name
            .is_some_and(|name| grant_item.eq_ignore_ascii_case(name))
}
