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

//! Account management and quota enforcement.
//!
//! The display name is the natural key: registration rejects an exact name
//! match and nothing else identifies an account. Credentials are stored as a
//! salted SHA-256 hash; the password itself is never retained.
//!
//! # Example
//!
//! ```
//! use gradpass::Account;
//!
//! let account = Account::new("Maria Gonzalez", "capandgown").unwrap();
//! assert_eq!(account.generated(), 0);
//! assert_eq!(account.max_allowed(), 5);
//! ```

use crate::ticket::TicketType;
use crate::TicketError;
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use sha2::{Digest, Sha256};

/// Default per-account ticket quota.
pub const DEFAULT_MAX_TICKETS: u32 = 5;

/// Decides whether an account may generate one more ticket of the requested
/// type. Pure; both the engine's early check and the ledger's critical
/// section go through here.
///
/// # Errors
///
/// - [`TicketError::QuotaExceeded`] once `generated >= max_allowed`.
/// - [`TicketError::DuplicateGraduateTicket`] for a second graduate ticket.
pub fn authorize_generation(
    generated: u32,
    max_allowed: u32,
    kind: TicketType,
    has_graduate: bool,
) -> Result<(), TicketError> {
    if generated >= max_allowed {
        return Err(TicketError::QuotaExceeded);
    }
    if kind == TicketType::Graduate && has_graduate {
        return Err(TicketError::DuplicateGraduateTicket);
    }
    Ok(())
}

/// Salted one-way credential hash.
#[derive(Debug, Clone)]
struct Credential {
    salt: [u8; 16],
    hash: [u8; 32],
}

impl Credential {
    fn new(password: &str) -> Self {
        let salt: [u8; 16] = rand::random();
        Credential {
            salt,
            hash: Credential::derive(password, &salt),
        }
    }

    fn derive(password: &str, salt: &[u8; 16]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }

    fn verify(&self, password: &str) -> bool {
        self.hash == Credential::derive(password, &self.salt)
    }
}

#[derive(Debug)]
struct AccountData {
    name: String,
    credential: Credential,
    generated: u32,
    max_allowed: u32,
    graduate_issued: bool,
}

/// A registered graduate able to generate tickets.
#[derive(Debug)]
pub struct Account {
    inner: Mutex<AccountData>,
}

impl Account {
    /// Creates an account with the default quota of [`DEFAULT_MAX_TICKETS`].
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::MissingField`] if name or password is empty
    /// after trimming.
    pub fn new(name: &str, password: &str) -> Result<Self, TicketError> {
        Account::with_limit(name, password, DEFAULT_MAX_TICKETS)
    }

    /// Creates an account with an explicit quota.
    pub fn with_limit(name: &str, password: &str, max_allowed: u32) -> Result<Self, TicketError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TicketError::MissingField("name"));
        }
        if password.is_empty() {
            return Err(TicketError::MissingField("password"));
        }
        Ok(Account {
            inner: Mutex::new(AccountData {
                name: name.to_string(),
                credential: Credential::new(password),
                generated: 0,
                max_allowed,
                graduate_issued: false,
            }),
        })
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    /// Number of tickets generated so far.
    pub fn generated(&self) -> u32 {
        self.inner.lock().generated
    }

    pub fn max_allowed(&self) -> u32 {
        self.inner.lock().max_allowed
    }

    /// Whether a graduate-type ticket has been issued for this account.
    pub fn has_graduate_ticket(&self) -> bool {
        self.inner.lock().graduate_issued
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.inner.lock().credential.verify(password)
    }

    /// Point-in-time copy of the public fields.
    pub fn snapshot(&self) -> AccountSnapshot {
        let data = self.inner.lock();
        AccountSnapshot {
            name: data.name.clone(),
            generated: data.generated,
            max_allowed: data.max_allowed,
        }
    }

    /// Runs one generation as a critical section: quota and graduate checks,
    /// the ticket insert, and the counter increment all happen under this
    /// account's lock, so two concurrent requests reading a stale counter
    /// cannot both slip past the quota.
    ///
    /// `insert` performs the ledger write for the new ticket row; if it
    /// fails, the counter is not touched.
    pub(crate) fn commit_generation(
        &self,
        kind: TicketType,
        insert: impl FnOnce() -> Result<(), TicketError>,
    ) -> Result<(), TicketError> {
        let mut data = self.inner.lock();
        authorize_generation(data.generated, data.max_allowed, kind, data.graduate_issued)?;
        insert()?;
        data.generated += 1;
        if kind == TicketType::Graduate {
            data.graduate_issued = true;
        }
        debug_assert!(
            data.generated <= data.max_allowed,
            "quota overshot: {}/{}",
            data.generated,
            data.max_allowed
        );
        Ok(())
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("name", &data.name)?;
        state.serialize_field("generated", &data.generated)?;
        state.serialize_field("max_allowed", &data.max_allowed)?;
        state.end()
    }
}

/// Public view of an account, safe to hand to callers and serialize.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AccountSnapshot {
    pub name: String,
    pub generated: u32,
    pub max_allowed: u32,
}

impl AccountSnapshot {
    /// Tickets the account may still generate.
    pub fn remaining(&self) -> u32 {
        self.max_allowed.saturating_sub(self.generated)
    }
}
