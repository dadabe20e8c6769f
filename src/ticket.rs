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

//! Ticket records and their single-use state machine.
//!
//! Every ticket starts `Unused` and makes at most one transition:
//! `Unused` → `Used { used_at, validated_by }`. `Used` is terminal.

use crate::base::{TicketCode, ValidatorCode};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Ticket category.
///
/// At most one `Graduate` ticket may exist per account; `Family` tickets are
/// limited only by the account quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Graduate,
    Family,
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketType::Graduate => write!(f, "graduate"),
            TicketType::Family => write!(f, "family"),
        }
    }
}

impl FromStr for TicketType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "graduate" => Ok(TicketType::Graduate),
            "family" => Ok(TicketType::Family),
            _ => Err(()),
        }
    }
}

/// Consumption state of a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    Unused,
    Used {
        /// Consumption instant, milliseconds since the Unix epoch.
        used_at: u64,
        /// Validator that performed the consumption.
        validated_by: ValidatorCode,
    },
}

/// Parameters for a generation request: everything the graduate chooses.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRequest {
    pub kind: TicketType,
    pub guest_name: Option<String>,
    pub notes: Option<String>,
}

impl TicketRequest {
    /// A graduate's own admission ticket.
    pub fn graduate() -> Self {
        TicketRequest {
            kind: TicketType::Graduate,
            guest_name: None,
            notes: None,
        }
    }

    /// A guest ticket carrying the guest's name.
    pub fn family(guest_name: impl Into<String>) -> Self {
        TicketRequest {
            kind: TicketType::Family,
            guest_name: Some(guest_name.into()),
            notes: None,
        }
    }

    /// Attaches free-text notes (seating, accessibility, ...).
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A single-use admission record.
///
/// Created once at generation time, mutated exactly once by validation,
/// never deleted or regenerated.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    code: TicketCode,
    account_name: String,
    guest_name: Option<String>,
    kind: TicketType,
    status: TicketStatus,
    notes: Option<String>,
    created_at: u64,
}

impl Ticket {
    /// Builds a fresh unused ticket for the given account.
    pub(crate) fn issue(
        code: TicketCode,
        account_name: &str,
        request: &TicketRequest,
        created_at: u64,
    ) -> Self {
        Ticket {
            code,
            account_name: account_name.to_string(),
            guest_name: request.guest_name.clone(),
            kind: request.kind,
            status: TicketStatus::Unused,
            notes: request.notes.clone(),
            created_at,
        }
    }

    /// Rebuilds a ticket from stored fields. For [`Ledger`] implementations
    /// materializing rows; user-facing flows go through the engine.
    ///
    /// [`Ledger`]: crate::ledger::Ledger
    pub fn from_parts(
        code: TicketCode,
        account_name: impl Into<String>,
        guest_name: Option<String>,
        kind: TicketType,
        status: TicketStatus,
        notes: Option<String>,
        created_at: u64,
    ) -> Self {
        Ticket {
            code,
            account_name: account_name.into(),
            guest_name,
            kind,
            status,
            notes,
            created_at,
        }
    }

    pub fn code(&self) -> &TicketCode {
        &self.code
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn guest_name(&self) -> Option<&str> {
        self.guest_name.as_deref()
    }

    pub fn kind(&self) -> TicketType {
        self.kind
    }

    pub fn status(&self) -> &TicketStatus {
        &self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_used(&self) -> bool {
        matches!(self.status, TicketStatus::Used { .. })
    }

    /// Attempts the single `Unused` → `Used` transition.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// ticket was already used. The caller must hold whatever exclusion the
    /// ledger provides for this code while calling.
    pub(crate) fn consume(&mut self, validator: &ValidatorCode, now: u64) -> bool {
        match self.status {
            TicketStatus::Unused => {
                self.status = TicketStatus::Used {
                    used_at: now,
                    validated_by: validator.clone(),
                };
                true
            }
            TicketStatus::Used { .. } => false,
        }
    }
}

/// Flat serialization so tickets land cleanly in CSV rows and JSON bodies:
/// the status enum becomes `used` / `used_at` / `validated_by` columns.
impl Serialize for Ticket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (used, used_at, validated_by) = match &self.status {
            TicketStatus::Unused => (false, None, None),
            TicketStatus::Used {
                used_at,
                validated_by,
            } => (true, Some(*used_at), Some(validated_by.as_str())),
        };

        let mut state = serializer.serialize_struct("Ticket", 9)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("account", &self.account_name)?;
        state.serialize_field("guest", &self.guest_name)?;
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("used", &used)?;
        state.serialize_field("used_at", &used_at)?;
        state.serialize_field("validated_by", &validated_by)?;
        state.serialize_field("notes", &self.notes)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.end()
    }
}
