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

//! # Gradpass
//!
//! A single-use ticket engine for graduation ceremonies. Graduates register
//! and generate up to a fixed quota of uniquely-coded tickets; on-site
//! validators consume codes exactly once.
//!
//! ## Core Components
//!
//! - [`Engine`]: registration, generation and validation flows
//! - [`Ledger`]: row-level contract of the authoritative store, with
//!   [`MemoryLedger`] as the in-process reference implementation
//! - [`generate_code`]: offline, side-effect-free code derivation
//! - [`Validation`]: outcome of a validation attempt (valid, already used,
//!   invalid)
//!
//! ## Example
//!
//! ```
//! use gradpass::{Engine, TicketRequest, Validation, Validator};
//!
//! let engine = Engine::in_memory();
//! engine.register_validator(Validator::new("VAL001", "Main gate"));
//! engine.register("Maria Gonzalez", "capandgown").unwrap();
//!
//! let ticket = engine
//!     .generate("Maria Gonzalez", TicketRequest::family("Juan Gonzalez"), 1_700_000_000_000)
//!     .unwrap();
//! assert!(!ticket.is_used());
//!
//! let validator = engine.validator_login("VAL001").unwrap();
//! let outcome = engine
//!     .validate(ticket.code().as_str(), validator.code(), 1_700_000_100_000)
//!     .unwrap();
//! assert!(matches!(outcome, Validation::Valid { .. }));
//! ```
//!
//! ## Concurrency
//!
//! Many graduates generate and many validators consume concurrently against
//! one shared ledger; all exclusion lives in the [`Ledger`] implementation.
//! Two simultaneous validations of the same code yield exactly one
//! [`Validation::Valid`], never two.

pub mod account;
mod base;
pub mod code;
mod engine;
pub mod error;
pub mod ledger;
pub mod scan;
mod ticket;

pub use account::{Account, AccountSnapshot, DEFAULT_MAX_TICKETS};
pub use base::{TicketCode, Validator, ValidatorCode};
pub use code::generate_code;
pub use engine::{CounterDrift, Engine, Validation};
pub use error::TicketError;
pub use ledger::{Consumption, Ledger, MemoryLedger};
pub use ticket::{Ticket, TicketRequest, TicketStatus, TicketType};
