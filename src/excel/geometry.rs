// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Overlap and containment tests between parsed ranges.
//!
//! Sheet qualification rule: when BOTH ranges name a sheet and the names
//! differ (case-insensitively), the ranges never overlap and are never
//! contained, whatever the coordinates say. When either side omits the
//! sheet name, coordinates alone decide. The second half of that rule is a
//! known laxity inherited from the policy format, where bare entries like
//! `"A1:C10"` are meant to apply to the request's worksheet context.

use crate::excel::address::ParsedRange;

fn sheets_disjoint(a: &ParsedRange, b: &ParsedRange) -> bool {
    match (&a.sheet_name, &b.sheet_name) {
        (Some(left), Some(right)) => !left.eq_ignore_ascii_case(right),
        _ => false,
    }
}

/// Whether two ranges share at least one cell.
///
/// Two axis-aligned rectangles overlap unless one lies entirely to the
/// left, right, above, or below the other.
pub fn overlaps(a: &ParsedRange, b: &ParsedRange) -> bool {
    if sheets_disjoint(a, b) {
        return false;
    }
    !(a.end.column < b.start.column
        || b.end.column < a.start.column
        || a.end.row < b.start.row
        || b.end.row < a.start.row)
}

/// Whether `inner` lies entirely within `outer`.
pub fn contains(inner: &ParsedRange, outer: &ParsedRange) -> bool {
    if sheets_disjoint(inner, outer) {
        return false;
    }
    inner.start.column >= outer.start.column
        && inner.end.column <= outer.end.column
        && inner.start.row >= outer.start.row
        && inner.end.row <= outer.end.row
}
