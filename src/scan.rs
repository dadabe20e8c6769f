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

//! Scanning and rendering seams.
//!
//! The engine has zero dependency on any camera, QR or drawing technology.
//! A decoder is anything that yields code strings ([`CodeSource`]); a
//! renderer is anything that turns a ticket into image bytes
//! ([`TicketRenderer`]). [`ScanSession`] sits between a decoder and the
//! engine, keeping one validation in flight and swallowing the rapid
//! repeated frames a camera produces for a single ticket.

use crate::base::{TicketCode, ValidatorCode};
use crate::engine::{Engine, Validation};
use crate::ledger::Ledger;
use crate::ticket::Ticket;
use crate::TicketError;
use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// A pull-based stream of decoded code strings.
pub trait CodeSource {
    /// Next decoded code, or `None` when the stream is currently empty.
    fn next_code(&mut self) -> Option<String>;
}

/// Lock-free frame queue bridging a decoder thread to a scan session.
///
/// The decoder side pushes through a cloned [`ScannerFeed`]; the session
/// side pops via [`CodeSource`].
#[derive(Debug, Default)]
pub struct QueuedScanner {
    frames: Arc<SegQueue<String>>,
}

impl QueuedScanner {
    pub fn new() -> Self {
        QueuedScanner::default()
    }

    /// Producer handle for the decoding side.
    pub fn feed(&self) -> ScannerFeed {
        ScannerFeed {
            frames: Arc::clone(&self.frames),
        }
    }
}

impl CodeSource for QueuedScanner {
    fn next_code(&mut self) -> Option<String> {
        self.frames.pop()
    }
}

/// Cloneable producer handle of a [`QueuedScanner`].
#[derive(Debug, Clone)]
pub struct ScannerFeed {
    frames: Arc<SegQueue<String>>,
}

impl ScannerFeed {
    pub fn push(&self, code: impl Into<String>) {
        self.frames.push(code.into());
    }
}

/// Renders a ticket to image bytes (QR card, printable pass, ...).
pub trait TicketRenderer {
    fn render(&self, ticket: &Ticket) -> Result<Vec<u8>, TicketError>;
}

/// One validator's scanning session.
///
/// Submissions are serialized by construction (`&mut self`), and a code
/// identical to the immediately preceding one is dropped without touching
/// the ledger, since a camera decodes the same QR many times per second.
pub struct ScanSession<'a, L: Ledger> {
    engine: &'a Engine<L>,
    validator: ValidatorCode,
    last_code: Option<TicketCode>,
}

impl<'a, L: Ledger> ScanSession<'a, L> {
    pub fn new(engine: &'a Engine<L>, validator: ValidatorCode) -> Self {
        ScanSession {
            engine,
            validator,
            last_code: None,
        }
    }

    /// Submits one decoded code. Returns `Ok(None)` for a repeated frame.
    pub fn submit(&mut self, raw: &str, now: u64) -> Result<Option<Validation>, TicketError> {
        let code = TicketCode::parse(raw)?;
        if self.last_code.as_ref() == Some(&code) {
            return Ok(None);
        }
        let outcome = self.engine.validate_code(&code, &self.validator, now)?;
        self.last_code = Some(code);
        Ok(Some(outcome))
    }

    /// Drains a decoder until it runs empty, validating each distinct code.
    pub fn drain<S: CodeSource>(
        &mut self,
        source: &mut S,
        now: u64,
    ) -> Result<Vec<Validation>, TicketError> {
        let mut outcomes = Vec::new();
        while let Some(raw) = source.next_code() {
            if let Some(outcome) = self.submit(&raw, now)? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }
}
