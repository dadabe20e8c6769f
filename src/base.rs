// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core identifier types for tickets and validators.

use crate::TicketError;
use serde::Serialize;
use std::fmt;

/// Unique code identifying a single ticket.
///
/// Stored in canonical form: trimmed and uppercased. Codes arrive from QR
/// decoders and keyboards, so [`TicketCode::parse`] accepts any casing and
/// surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    /// Canonicalizes a raw code string.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::MissingField`] if the input is empty after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, TicketError> {
        let canonical = raw.trim().to_uppercase();
        if canonical.is_empty() {
            return Err(TicketError::MissingField("code"));
        }
        Ok(TicketCode(canonical))
    }

    /// Wraps a string already in canonical form.
    pub(crate) fn from_canonical(code: String) -> Self {
        debug_assert!(
            code == code.trim().to_uppercase(),
            "code not in canonical form: {code}"
        );
        TicketCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short alphanumeric code identifying an on-site validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ValidatorCode(String);

impl ValidatorCode {
    /// Canonicalizes a raw validator code.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::MissingField`] if the input is empty after
    /// trimming.
    pub fn parse(raw: &str) -> Result<Self, TicketError> {
        let canonical = raw.trim().to_uppercase();
        if canonical.is_empty() {
            return Err(TicketError::MissingField("validator"));
        }
        Ok(ValidatorCode(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-site validator reference record.
///
/// Validators are static configuration: seeded by an administrator, never
/// created or mutated by the user-facing flows. An inactive validator is
/// refused at sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validator {
    pub code: ValidatorCode,
    pub name: String,
    pub active: bool,
}

impl Validator {
    /// Creates an active validator. The code is uppercased.
    pub fn new(code: &str, name: &str) -> Self {
        Validator {
            code: ValidatorCode(code.trim().to_uppercase()),
            name: name.to_string(),
            active: true,
        }
    }

    /// Creates a deactivated validator.
    pub fn inactive(code: &str, name: &str) -> Self {
        Validator {
            active: false,
            ..Validator::new(code, name)
        }
    }

    pub fn code(&self) -> &ValidatorCode {
        &self.code
    }
}
