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

//! The ledger: authoritative store of accounts, tickets and validators.
//!
//! All exclusion is pushed here. The [`Ledger`] trait captures the row-level
//! contract the engine needs: point lookups by unique key, inserts with
//! uniqueness rejection, a conditional "consume if still unused" update and
//! a transactional generation commit. No joins, no aggregation.
//!
//! [`MemoryLedger`] is the in-process reference implementation, built on
//! [`DashMap`] shards plus a per-account mutex, mirroring how a relational
//! backend would use unique constraints and short transactions.

use crate::account::{Account, AccountSnapshot};
use crate::base::{TicketCode, Validator, ValidatorCode};
use crate::ticket::Ticket;
use crate::TicketError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Outcome of the conditional consumption update.
///
/// The ledger answers the race directly: the caller that flipped the row wins
/// `Consumed`; anyone else observes `AlreadyUsed` with the stamped record.
#[derive(Debug, Clone, PartialEq)]
pub enum Consumption {
    /// This call performed the `unused` → `used` transition.
    Consumed(Ticket),
    /// The ticket was already used. Contract: the carried ticket is in its
    /// `Used` state, so callers can read the stamped consumption details.
    AlreadyUsed(Ticket),
    /// No ticket exists under the code.
    Missing,
}

/// Row-level contract of the authoritative store.
///
/// Implementations must make [`Ledger::consume_if_unused`] atomic per code
/// (a conditional `UPDATE ... WHERE used = false`, with the affected-row
/// count deciding the winner) and [`Ledger::record_ticket`] atomic per
/// account (a transaction wrapping the quota re-check, the unique-code
/// insert and the counter increment).
pub trait Ledger: Send + Sync {
    /// Point lookup of an account by its display name.
    fn find_account(&self, name: &str) -> Result<Option<AccountSnapshot>, TicketError>;

    /// Inserts a freshly registered account.
    ///
    /// # Errors
    ///
    /// [`TicketError::DuplicateAccount`] if the name is taken.
    fn insert_account(&self, account: Account) -> Result<AccountSnapshot, TicketError>;

    /// Looks up an account and checks its credential in one step, so the
    /// stored hash never leaves the ledger.
    fn authenticate(&self, name: &str, password: &str) -> Result<AccountSnapshot, TicketError>;

    /// Whether a graduate-type ticket already exists for the account.
    fn has_graduate_ticket(&self, name: &str) -> Result<bool, TicketError>;

    /// Persists a new ticket row and increments the owner's counter as one
    /// atomic step, re-checking the quota and graduate rules inside.
    ///
    /// # Errors
    ///
    /// - [`TicketError::AccountNotFound`] for an unknown owner.
    /// - [`TicketError::DuplicateCode`] if the code is taken (recoverable:
    ///   the caller regenerates and retries once).
    /// - [`TicketError::QuotaExceeded`] / [`TicketError::DuplicateGraduateTicket`]
    ///   from the re-check.
    fn record_ticket(&self, ticket: Ticket) -> Result<Ticket, TicketError>;

    /// Point lookup of a ticket by its canonical code. Read-only.
    fn find_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, TicketError>;

    /// Conditionally flips a ticket to used, stamping validator and instant.
    /// Atomic per code: of any number of simultaneous calls, exactly one
    /// receives [`Consumption::Consumed`].
    fn consume_if_unused(
        &self,
        code: &TicketCode,
        validator: &ValidatorCode,
        now: u64,
    ) -> Result<Consumption, TicketError>;

    /// Point lookup of a validator by uppercase code, active or not.
    fn find_validator(&self, code: &str) -> Result<Option<Validator>, TicketError>;

    /// All account snapshots, for reports and the counter audit.
    fn accounts(&self) -> Result<Vec<AccountSnapshot>, TicketError>;

    /// All tickets, for reports and the counter audit.
    fn tickets(&self) -> Result<Vec<Ticket>, TicketError>;
}

/// In-memory ledger used by the CLI, the demo server and the test suite.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    /// Accounts by display name. The `Arc` lets a generation hold the
    /// account's own lock without blocking the map shard.
    accounts: DashMap<String, Arc<Account>>,
    /// Tickets by canonical code; the shard write lock makes the
    /// conditional consumption update atomic.
    tickets: DashMap<TicketCode, Ticket>,
    /// Validator reference data by uppercase code.
    validators: DashMap<String, Validator>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger::default()
    }

    /// Seeds a validator record. Reference data only: no user-facing flow
    /// calls this.
    pub fn insert_validator(&self, validator: Validator) {
        self.validators
            .insert(validator.code().as_str().to_string(), validator);
    }

    fn account(&self, name: &str) -> Result<Arc<Account>, TicketError> {
        self.accounts
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TicketError::AccountNotFound)
    }
}

impl Ledger for MemoryLedger {
    fn find_account(&self, name: &str) -> Result<Option<AccountSnapshot>, TicketError> {
        Ok(self.accounts.get(name).map(|entry| entry.snapshot()))
    }

    fn insert_account(&self, account: Account) -> Result<AccountSnapshot, TicketError> {
        let snapshot = account.snapshot();
        // Entry API gives an atomic check-and-insert, the in-memory stand-in
        // for a unique constraint on the name column.
        match self.accounts.entry(snapshot.name.clone()) {
            Entry::Occupied(_) => Err(TicketError::DuplicateAccount),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(account));
                Ok(snapshot)
            }
        }
    }

    fn authenticate(&self, name: &str, password: &str) -> Result<AccountSnapshot, TicketError> {
        let account = self.account(name)?;
        if !account.verify_password(password) {
            return Err(TicketError::CredentialMismatch);
        }
        Ok(account.snapshot())
    }

    fn has_graduate_ticket(&self, name: &str) -> Result<bool, TicketError> {
        Ok(self.account(name)?.has_graduate_ticket())
    }

    fn record_ticket(&self, ticket: Ticket) -> Result<Ticket, TicketError> {
        let account = self.account(ticket.account_name())?;
        // The account lock is held across check, insert and increment; the
        // unique-code entry check nests inside it. Lock order is always
        // account → ticket shard, never the reverse.
        account.commit_generation(ticket.kind(), || {
            match self.tickets.entry(ticket.code().clone()) {
                Entry::Occupied(_) => Err(TicketError::DuplicateCode),
                Entry::Vacant(slot) => {
                    slot.insert(ticket.clone());
                    Ok(())
                }
            }
        })?;
        Ok(ticket)
    }

    fn find_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, TicketError> {
        Ok(self.tickets.get(code).map(|entry| entry.clone()))
    }

    fn consume_if_unused(
        &self,
        code: &TicketCode,
        validator: &ValidatorCode,
        now: u64,
    ) -> Result<Consumption, TicketError> {
        // get_mut holds the shard write lock for the read-check-write, so
        // concurrent calls for one code serialize here and exactly one
        // observes the unused state.
        let Some(mut entry) = self.tickets.get_mut(code) else {
            return Ok(Consumption::Missing);
        };
        if entry.consume(validator, now) {
            Ok(Consumption::Consumed(entry.clone()))
        } else {
            Ok(Consumption::AlreadyUsed(entry.clone()))
        }
    }

    fn find_validator(&self, code: &str) -> Result<Option<Validator>, TicketError> {
        Ok(self.validators.get(code).map(|entry| entry.clone()))
    }

    fn accounts(&self) -> Result<Vec<AccountSnapshot>, TicketError> {
        Ok(self.accounts.iter().map(|entry| entry.snapshot()).collect())
    }

    fn tickets(&self) -> Result<Vec<Ticket>, TicketError> {
        Ok(self.tickets.iter().map(|entry| entry.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::generate_code;
    use crate::ticket::{TicketRequest, TicketStatus};

    fn ledger_with_account(name: &str) -> MemoryLedger {
        let ledger = MemoryLedger::new();
        ledger
            .insert_account(Account::new(name, "pw").unwrap())
            .unwrap();
        ledger
    }

    fn issue(ledger: &MemoryLedger, name: &str, at: u64) -> Ticket {
        let code = generate_code(name, at).unwrap();
        let ticket = Ticket::issue(code, name, &TicketRequest::family("Guest"), at);
        ledger.record_ticket(ticket).unwrap()
    }

    #[test]
    fn duplicate_account_rejected() {
        let ledger = ledger_with_account("Maria Gonzalez");
        let result = ledger.insert_account(Account::new("Maria Gonzalez", "other").unwrap());
        assert_eq!(result.unwrap_err(), TicketError::DuplicateAccount);
    }

    #[test]
    fn authenticate_checks_hash() {
        let ledger = ledger_with_account("Maria Gonzalez");
        assert!(ledger.authenticate("Maria Gonzalez", "pw").is_ok());
        assert_eq!(
            ledger.authenticate("Maria Gonzalez", "nope").unwrap_err(),
            TicketError::CredentialMismatch
        );
        assert_eq!(
            ledger.authenticate("Nadie", "pw").unwrap_err(),
            TicketError::AccountNotFound
        );
    }

    #[test]
    fn record_ticket_rejects_duplicate_code() {
        let ledger = ledger_with_account("Maria Gonzalez");
        let first = issue(&ledger, "Maria Gonzalez", 1);

        let clash = Ticket::issue(
            first.code().clone(),
            "Maria Gonzalez",
            &TicketRequest::family("Otra"),
            2,
        );
        assert_eq!(
            ledger.record_ticket(clash).unwrap_err(),
            TicketError::DuplicateCode
        );
        // The failed insert must not bump the counter.
        assert_eq!(
            ledger.find_account("Maria Gonzalez").unwrap().unwrap().generated,
            1
        );
    }

    #[test]
    fn record_ticket_unknown_account() {
        let ledger = MemoryLedger::new();
        let code = generate_code("Nadie", 1).unwrap();
        let ticket = Ticket::issue(code, "Nadie", &TicketRequest::graduate(), 1);
        assert_eq!(
            ledger.record_ticket(ticket).unwrap_err(),
            TicketError::AccountNotFound
        );
    }

    #[test]
    fn consume_wins_then_loses() {
        let ledger = ledger_with_account("Maria Gonzalez");
        let ticket = issue(&ledger, "Maria Gonzalez", 1);
        let validator = ValidatorCode::parse("VAL001").unwrap();

        let first = ledger
            .consume_if_unused(ticket.code(), &validator, 100)
            .unwrap();
        assert!(matches!(first, Consumption::Consumed(_)));

        let second = ledger
            .consume_if_unused(ticket.code(), &validator, 200)
            .unwrap();
        match second {
            Consumption::AlreadyUsed(seen) => assert_eq!(
                *seen.status(),
                TicketStatus::Used {
                    used_at: 100,
                    validated_by: validator,
                }
            ),
            other => panic!("expected AlreadyUsed, got {other:?}"),
        }
    }

    #[test]
    fn consume_missing_code() {
        let ledger = MemoryLedger::new();
        let validator = ValidatorCode::parse("VAL001").unwrap();
        let code = TicketCode::parse("NEVER999").unwrap();
        assert_eq!(
            ledger.consume_if_unused(&code, &validator, 1).unwrap(),
            Consumption::Missing
        );
    }

    #[test]
    fn validator_lookup_by_code() {
        let ledger = MemoryLedger::new();
        ledger.insert_validator(Validator::new("val001", "Puerta Principal"));
        let found = ledger.find_validator("VAL001").unwrap().unwrap();
        assert_eq!(found.name, "Puerta Principal");
        assert!(ledger.find_validator("VAL999").unwrap().is_none());
    }
}
