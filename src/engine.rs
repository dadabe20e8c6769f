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

//! Ticket engine: registration, generation and validation flows.
//!
//! The [`Engine`] wires the code generator, the quota rules and the
//! single-use state machine to a [`Ledger`]. It holds no session state of
//! its own. Who is acting is an argument to every operation, so many
//! graduate and validator sessions can share one engine.
//!
//! # Invariants
//!
//! - Ticket codes are globally unique across all tickets ever recorded.
//! - An account's counter never exceeds its quota.
//! - At most one graduate-type ticket exists per account.
//! - A ticket is consumed at most once; of two simultaneous validations of
//!   one code, exactly one reports [`Validation::Valid`].

use crate::account::{authorize_generation, Account, AccountSnapshot};
use crate::base::{TicketCode, Validator, ValidatorCode};
use crate::code::generate_code;
use crate::ledger::{Consumption, Ledger, MemoryLedger};
use crate::ticket::{Ticket, TicketRequest, TicketStatus};
use crate::TicketError;
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of one validation attempt.
///
/// Only `Valid` mutates the ledger; the other outcomes are reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validation {
    /// This attempt consumed the ticket.
    Valid { ticket: Ticket },
    /// The ticket was consumed earlier; carries the original record.
    AlreadyUsed {
        ticket: Ticket,
        used_at: u64,
        validated_by: ValidatorCode,
    },
    /// No ticket exists under the code.
    Invalid,
}

/// One account whose stored counter disagrees with its actual ticket count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterDrift {
    pub account_name: String,
    pub recorded: u32,
    pub actual: u32,
}

/// Ticket engine over a pluggable ledger.
pub struct Engine<L: Ledger = MemoryLedger> {
    ledger: L,
}

impl Engine<MemoryLedger> {
    /// Engine backed by the in-memory reference ledger.
    pub fn in_memory() -> Self {
        Engine::new(MemoryLedger::new())
    }

    /// Seeds a validator record into the in-memory ledger.
    pub fn register_validator(&self, validator: Validator) {
        self.ledger.insert_validator(validator);
    }
}

impl Default for Engine<MemoryLedger> {
    fn default() -> Self {
        Engine::in_memory()
    }
}

impl<L: Ledger> Engine<L> {
    pub fn new(ledger: L) -> Self {
        Engine { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Registers a new graduate account with the default quota.
    ///
    /// # Errors
    ///
    /// - [`TicketError::MissingField`] for an empty name or password.
    /// - [`TicketError::DuplicateAccount`] if the name is taken.
    pub fn register(&self, name: &str, password: &str) -> Result<AccountSnapshot, TicketError> {
        let account = Account::new(name, password)?;
        self.ledger.insert_account(account)
    }

    /// Signs a graduate in, returning an account snapshot for the caller to
    /// carry as its session context.
    pub fn login(&self, name: &str, password: &str) -> Result<AccountSnapshot, TicketError> {
        if name.trim().is_empty() {
            return Err(TicketError::MissingField("name"));
        }
        if password.is_empty() {
            return Err(TicketError::MissingField("password"));
        }
        self.ledger.authenticate(name.trim(), password)
    }

    /// Signs a validator in by code. Unknown and deactivated codes are
    /// indistinguishable to the caller.
    pub fn validator_login(&self, raw_code: &str) -> Result<Validator, TicketError> {
        let code = ValidatorCode::parse(raw_code)?;
        match self.ledger.find_validator(code.as_str())? {
            Some(validator) if validator.active => Ok(validator),
            _ => Err(TicketError::ValidatorNotFound),
        }
    }

    pub fn account(&self, name: &str) -> Result<Option<AccountSnapshot>, TicketError> {
        self.ledger.find_account(name)
    }

    pub fn accounts(&self) -> Result<Vec<AccountSnapshot>, TicketError> {
        self.ledger.accounts()
    }

    pub fn tickets(&self) -> Result<Vec<Ticket>, TicketError> {
        self.ledger.tickets()
    }

    pub fn find_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, TicketError> {
        self.ledger.find_ticket(code)
    }

    /// Generates one ticket for the account, at the given issuing instant
    /// (milliseconds since the Unix epoch, expected monotonic across calls).
    ///
    /// The quota decision runs twice: once here for an early terminal
    /// rejection, and again inside the ledger's atomic commit, which is the
    /// authoritative check under concurrency. A duplicate code from the
    /// ledger is retried once with a fresh instant before surfacing.
    ///
    /// # Errors
    ///
    /// - [`TicketError::AccountNotFound`] for an unknown account.
    /// - [`TicketError::QuotaExceeded`] once the counter reaches the quota.
    /// - [`TicketError::DuplicateGraduateTicket`] for a second graduate
    ///   ticket.
    /// - [`TicketError::DuplicateCode`] if both code attempts collided.
    pub fn generate(
        &self,
        account_name: &str,
        request: TicketRequest,
        issued_at: u64,
    ) -> Result<Ticket, TicketError> {
        let account_name = account_name.trim();
        let snapshot = self
            .ledger
            .find_account(account_name)?
            .ok_or(TicketError::AccountNotFound)?;
        let has_graduate = self.ledger.has_graduate_ticket(account_name)?;
        authorize_generation(
            snapshot.generated,
            snapshot.max_allowed,
            request.kind,
            has_graduate,
        )?;

        let code = generate_code(account_name, issued_at)?;
        let ticket = Ticket::issue(code, account_name, &request, issued_at);
        match self.ledger.record_ticket(ticket) {
            Err(TicketError::DuplicateCode) => {
                // Recoverable: regenerate with a fresh instant, retry once.
                let retry_at = issued_at.wrapping_add(1);
                let code = generate_code(account_name, retry_at)?;
                let ticket = Ticket::issue(code, account_name, &request, retry_at);
                self.ledger.record_ticket(ticket)
            }
            result => result,
        }
    }

    /// Validates a raw code string (any casing, surrounding whitespace).
    pub fn validate(
        &self,
        raw_code: &str,
        validator: &ValidatorCode,
        now: u64,
    ) -> Result<Validation, TicketError> {
        let code = TicketCode::parse(raw_code)?;
        self.validate_code(&code, validator, now)
    }

    /// Validates a canonical code: at most one caller ever sees `Valid` for
    /// a given code, decided by the ledger's conditional update.
    ///
    /// # Errors
    ///
    /// [`TicketError::LedgerUnavailable`] if the store fails mid-update; the
    /// ticket then remains unused and the call is safe to retry.
    pub fn validate_code(
        &self,
        code: &TicketCode,
        validator: &ValidatorCode,
        now: u64,
    ) -> Result<Validation, TicketError> {
        match self.ledger.consume_if_unused(code, validator, now)? {
            Consumption::Consumed(ticket) => Ok(Validation::Valid { ticket }),
            Consumption::AlreadyUsed(ticket) => {
                let TicketStatus::Used {
                    used_at,
                    validated_by,
                } = ticket.status().clone()
                else {
                    // Unreachable for a conforming ledger: AlreadyUsed
                    // carries a used ticket by contract. A store that breaks
                    // it is treated as unavailable rather than trusted.
                    debug_assert!(false, "AlreadyUsed carried an unused ticket");
                    return Err(TicketError::LedgerUnavailable);
                };
                Ok(Validation::AlreadyUsed {
                    ticket,
                    used_at,
                    validated_by,
                })
            }
            Consumption::Missing => Ok(Validation::Invalid),
        }
    }

    /// Compares every account's stored counter against its actual ticket
    /// count and reports drift. Empty output means the ledger is consistent.
    ///
    /// The insert and the increment are one atomic step in this crate's
    /// ledgers, but a backend that splits them can strand a row on partial
    /// failure; this is the reconciliation pass for that case.
    pub fn audit_counters(&self) -> Result<Vec<CounterDrift>, TicketError> {
        let mut actual: HashMap<String, u32> = HashMap::new();
        for ticket in self.ledger.tickets()? {
            *actual.entry(ticket.account_name().to_string()).or_default() += 1;
        }

        let mut drift = Vec::new();
        for snapshot in self.ledger.accounts()? {
            let counted = actual.get(&snapshot.name).copied().unwrap_or(0);
            if counted != snapshot.generated {
                drift.push(CounterDrift {
                    account_name: snapshot.name,
                    recorded: snapshot.generated,
                    actual: counted,
                });
            }
        }
        drift.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        Ok(drift)
    }
}
