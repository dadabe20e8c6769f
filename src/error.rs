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

//! Error types for ticket generation and validation.

use thiserror::Error;

/// Ticket engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// A required input field is empty or absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Registration name is already taken
    #[error("account name already registered")]
    DuplicateAccount,

    /// No account exists under the given name
    #[error("account not found")]
    AccountNotFound,

    /// Password does not match the stored credential
    #[error("invalid credentials")]
    CredentialMismatch,

    /// Validator code is unknown or deactivated
    #[error("validator code invalid or inactive")]
    ValidatorNotFound,

    /// Account has generated its maximum number of tickets
    #[error("ticket quota exhausted")]
    QuotaExceeded,

    /// Account already holds a graduate-type ticket
    #[error("graduate ticket already generated")]
    DuplicateGraduateTicket,

    /// Generated code collided with an existing ticket
    #[error("duplicate ticket code")]
    DuplicateCode,

    /// The backing store failed or returned inconsistent data
    #[error("ledger unavailable")]
    LedgerUnavailable,
}

#[cfg(test)]
mod tests {
    use super::TicketError;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            TicketError::MissingField("name").to_string(),
            "missing required field: name"
        );
        assert_eq!(
            TicketError::DuplicateAccount.to_string(),
            "account name already registered"
        );
        assert_eq!(TicketError::AccountNotFound.to_string(), "account not found");
        assert_eq!(TicketError::CredentialMismatch.to_string(), "invalid credentials");
        assert_eq!(
            TicketError::ValidatorNotFound.to_string(),
            "validator code invalid or inactive"
        );
        assert_eq!(TicketError::QuotaExceeded.to_string(), "ticket quota exhausted");
        assert_eq!(
            TicketError::DuplicateGraduateTicket.to_string(),
            "graduate ticket already generated"
        );
        assert_eq!(TicketError::DuplicateCode.to_string(), "duplicate ticket code");
        assert_eq!(TicketError::LedgerUnavailable.to_string(), "ledger unavailable");
    }

    #[test]
    fn errors_are_cloneable() {
        let error = TicketError::QuotaExceeded;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
