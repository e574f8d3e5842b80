// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Excel A1-notation address parsing.
//!
//! Accepts the four address shapes the workbook endpoints see in practice:
//! a single cell (`B5`), a rectangle (`A1:D10`), full columns (`A:B`) and
//! full rows (`1:5`), each optionally prefixed with a sheet name and `!`
//! (`Sheet1!A1:D10`, `'My Sheet'!A1`).
//!
//! Column letters are bijective base-26: A=1 .. Z=26, AA=27. There is no
//! zero digit, so this is not positional base-26 arithmetic.
//!
//! Reversed ranges (`C10:A1`) are rejected rather than normalized. Sheet
//! names containing `!` are unsupported: only the first `!` splits, and
//! the remainder must parse as a plain address.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Highest column Excel supports (`XFD`).
pub const MAX_COLUMNS: u32 = 16_384;

/// Highest row Excel supports.
pub const MAX_ROWS: u32 = 1_048_576;

lazy_static! {
    static ref CELL_RE: Regex = Regex::new(r"^([A-Z]+)(\d+)$").unwrap();
    static ref LETTERS_RE: Regex = Regex::new(r"^[A-Z]+$").unwrap();
    static ref DIGITS_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid range format: {0}")]
    InvalidRangeFormat(String),
}

/// A 1-based cell position, matching Excel's A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellCoordinate {
    pub column: u32,
    pub row: u32,
}

/// A parsed range with an optional sheet qualifier.
///
/// Single cells parse with `start == end`. The original input is kept in
/// `raw` for diagnostics and audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRange {
    pub sheet_name: Option<String>,
    pub start: CellCoordinate,
    pub end: CellCoordinate,
    pub raw: String,
}

impl ParsedRange {
    /// Parse an A1-notation range string, optionally sheet-qualified.
    pub fn parse(range: &str) -> Result<Self, AddressError> {
        let trimmed = range.trim();
        if trimmed.is_empty() {
            return Err(AddressError::InvalidRangeFormat(
                "empty range string".to_string(),
            ));
        }

        // Everything before the first '!' is the sheet name.
        let (sheet_name, address) = match trimmed.find('!') {
            Some(idx) => {
                let sheet = trimmed[..idx].trim_matches('\'');
                if sheet.is_empty() {
                    return Err(AddressError::InvalidRangeFormat(format!(
                        "missing sheet name before '!' in '{}'",
                        trimmed
                    )));
                }
                (Some(sheet.to_string()), &trimmed[idx + 1..])
            }
            None => (None, trimmed),
        };

        let (start, end) = parse_address(address)?;

        if start.column > end.column || start.row > end.row {
            return Err(AddressError::InvalidRangeFormat(format!(
                "reversed range '{}': start must not be below or right of end",
                address
            )));
        }

        Ok(ParsedRange {
            sheet_name,
            start,
            end,
            raw: trimmed.to_string(),
        })
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn column_count(&self) -> u32 {
        self.end.column - self.start.column + 1
    }

    /// The address portion of the raw input, without any sheet qualifier.
    pub fn address(&self) -> &str {
        match self.raw.find('!') {
            Some(idx) => &self.raw[idx + 1..],
            None => &self.raw,
        }
    }
}

fn parse_address(address: &str) -> Result<(CellCoordinate, CellCoordinate), AddressError> {
    match address.split_once(':') {
        None => {
            let cell = parse_cell(address)?;
            Ok((cell, cell))
        }
        Some((lhs, rhs)) => {
            if CELL_RE.is_match(lhs) && CELL_RE.is_match(rhs) {
                Ok((parse_cell(lhs)?, parse_cell(rhs)?))
            } else if LETTERS_RE.is_match(lhs) && LETTERS_RE.is_match(rhs) {
                // Full-column form, e.g. "A:C".
                let start_col = column_letter_to_number(lhs)?;
                let end_col = column_letter_to_number(rhs)?;
                Ok((
                    CellCoordinate { column: start_col, row: 1 },
                    CellCoordinate { column: end_col, row: MAX_ROWS },
                ))
            } else if DIGITS_RE.is_match(lhs) && DIGITS_RE.is_match(rhs) {
                // Full-row form, e.g. "1:5".
                let start_row = parse_row(lhs)?;
                let end_row = parse_row(rhs)?;
                Ok((
                    CellCoordinate { column: 1, row: start_row },
                    CellCoordinate { column: MAX_COLUMNS, row: end_row },
                ))
            } else {
                Err(AddressError::InvalidRangeFormat(format!(
                    "unrecognized range '{}'",
                    address
                )))
            }
        }
    }
}

fn parse_cell(cell: &str) -> Result<CellCoordinate, AddressError> {
    let captures = CELL_RE.captures(cell).ok_or_else(|| {
        AddressError::InvalidRangeFormat(format!("invalid cell reference '{}'", cell))
    })?;
    let column = column_letter_to_number(&captures[1])?;
    let row = parse_row(&captures[2])?;
    Ok(CellCoordinate { column, row })
}

fn parse_row(digits: &str) -> Result<u32, AddressError> {
    let row: u32 = digits.parse().map_err(|_| {
        AddressError::InvalidRangeFormat(format!("invalid row number '{}'", digits))
    })?;
    if row == 0 || row > MAX_ROWS {
        return Err(AddressError::InvalidRangeFormat(format!(
            "row {} out of bounds (1..={})",
            row, MAX_ROWS
        )));
    }
    Ok(row)
}

/// Convert column letters to a 1-based column number (A=1, Z=26, AA=27).
pub fn column_letter_to_number(letters: &str) -> Result<u32, AddressError> {
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(AddressError::InvalidRangeFormat(format!(
            "invalid column letters '{}'",
            letters
        )));
    }
    let mut result: u32 = 0;
    for byte in letters.bytes() {
        result = result * 26 + u32::from(byte - b'A') + 1;
        if result > MAX_COLUMNS {
            return Err(AddressError::InvalidRangeFormat(format!(
                "column '{}' is beyond Excel's limit",
                letters
            )));
        }
    }
    Ok(result)
}

/// Convert a 1-based column number back to letters (1=A, 27=AA).
pub fn column_number_to_letter(column: u32) -> Result<String, AddressError> {
    if column == 0 || column > MAX_COLUMNS {
        return Err(AddressError::InvalidRangeFormat(format!(
            "column number {} out of bounds (1..={})",
            column, MAX_COLUMNS
        )));
    }
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push(b'A' + ((n - 1) % 26) as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    Ok(letters.into_iter().map(char::from).collect())
}
