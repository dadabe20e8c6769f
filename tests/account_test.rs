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

//! Account and quota public API integration tests.

use gradpass::account::authorize_generation;
use gradpass::{Account, Engine, TicketError, TicketRequest, TicketType, DEFAULT_MAX_TICKETS};
use std::sync::Arc;
use std::thread;

#[test]
fn new_account_has_empty_counter() {
    let account = Account::new("Maria Gonzalez", "capandgown").unwrap();
    assert_eq!(account.generated(), 0);
    assert_eq!(account.max_allowed(), DEFAULT_MAX_TICKETS);
    assert!(!account.has_graduate_ticket());
}

#[test]
fn password_never_verifies_against_other_input() {
    let account = Account::new("Maria Gonzalez", "capandgown").unwrap();
    assert!(account.verify_password("capandgown"));
    assert!(!account.verify_password("Capandgown"));
    assert!(!account.verify_password(""));
}

#[test]
fn authorize_quota_boundaries() {
    assert_eq!(authorize_generation(0, 5, TicketType::Family, false), Ok(()));
    assert_eq!(authorize_generation(4, 5, TicketType::Family, false), Ok(()));
    assert_eq!(
        authorize_generation(5, 5, TicketType::Family, false),
        Err(TicketError::QuotaExceeded)
    );
    // A ceiling of zero admits nothing.
    assert_eq!(
        authorize_generation(0, 0, TicketType::Family, false),
        Err(TicketError::QuotaExceeded)
    );
}

#[test]
fn authorize_graduate_rule_is_per_account() {
    assert_eq!(
        authorize_generation(0, 5, TicketType::Graduate, false),
        Ok(())
    );
    assert_eq!(
        authorize_generation(1, 5, TicketType::Graduate, true),
        Err(TicketError::DuplicateGraduateTicket)
    );
    // The graduate rule never blocks family tickets.
    assert_eq!(authorize_generation(1, 5, TicketType::Family, true), Ok(()));
}

#[test]
fn concurrent_generations_never_overshoot_quota() {
    // 20 threads race to generate for one account with a quota of 5:
    // exactly 5 must succeed and the counter must land exactly on 5.
    let engine = Arc::new(Engine::in_memory());
    engine.register("Maria Gonzalez", "capandgown").unwrap();

    let handles: Vec<_> = (0..20u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine.generate(
                    "Maria Gonzalez",
                    TicketRequest::family(format!("Guest {i}")),
                    1_700_000_000_000 + i,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let quota_errors = results
        .iter()
        .filter(|r| matches!(r, Err(TicketError::QuotaExceeded)))
        .count();

    assert_eq!(successes, 5);
    assert_eq!(quota_errors, 15);

    let account = engine.account("Maria Gonzalez").unwrap().unwrap();
    assert_eq!(account.generated, 5);
    assert_eq!(engine.tickets().unwrap().len(), 5);
    assert!(engine.audit_counters().unwrap().is_empty());
}

#[test]
fn concurrent_graduate_requests_yield_one_graduate() {
    let engine = Arc::new(Engine::in_memory());
    engine.register("Maria Gonzalez", "capandgown").unwrap();

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine.generate(
                    "Maria Gonzalez",
                    TicketRequest::graduate(),
                    1_700_000_000_000 + i,
                )
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(successes, 1);

    let graduates = engine
        .tickets()
        .unwrap()
        .iter()
        .filter(|t| t.kind() == TicketType::Graduate)
        .count();
    assert_eq!(graduates, 1);
}

#[test]
fn accounts_are_independent() {
    let engine = Engine::in_memory();
    engine.register("Maria Gonzalez", "pw1").unwrap();
    engine.register("Ana Ruiz", "pw2").unwrap();

    for i in 0..5u64 {
        engine
            .generate(
                "Maria Gonzalez",
                TicketRequest::family("Guest"),
                1_700_000_000_000 + i,
            )
            .unwrap();
    }

    // Maria's exhausted quota does not touch Ana.
    let ticket = engine
        .generate("Ana Ruiz", TicketRequest::graduate(), 1_700_000_000_099)
        .unwrap();
    assert_eq!(ticket.account_name(), "Ana Ruiz");
    assert_eq!(engine.account("Ana Ruiz").unwrap().unwrap().generated, 1);
}
