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

//! Ticket code generation.
//!
//! Codes are derived from the owning account's name and the issuing instant,
//! so generation needs no central sequence counter and has no side effects.
//! Uniqueness is NOT guaranteed here: the ledger enforces it with a unique
//! constraint on the code column, and the caller regenerates with a fresh
//! timestamp when an insert is rejected as a duplicate.

use crate::TicketError;
use crate::base::TicketCode;

/// Output alphabet. Uppercase base-32 with the glyphs I, O, 0 and 1 removed
/// so codes survive handwriting and low-quality camera frames.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Fixed code length: 8 symbols, 40 bits of state.
pub const CODE_LENGTH: usize = 8;

/// Derives a ticket code from an account name and an issuing instant
/// (milliseconds since the Unix epoch).
///
/// The same (name, instant) pair always yields the same code; callers retry
/// a ledger duplicate rejection by bumping the instant.
///
/// # Errors
///
/// Returns [`TicketError::MissingField`] if the name is empty after trimming.
pub fn generate_code(name: &str, issued_at: u64) -> Result<TicketCode, TicketError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TicketError::MissingField("name"));
    }

    // FNV-1a over the name bytes, then the timestamp folded in and the whole
    // state diffused with the splitmix64 finalizer. Unpredictable enough that
    // a guest cannot enumerate codes without the exact name/time pair.
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.as_bytes() {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(0x0000_0100_0000_01b3);
    }
    state ^= issued_at;
    state = mix64(state);

    let mut code = String::with_capacity(CODE_LENGTH);
    for symbol in 0..CODE_LENGTH {
        let index = ((state >> (symbol * 5)) & 0x1f) as usize;
        code.push(CODE_ALPHABET[index] as char);
    }
    Ok(TicketCode::from_canonical(code))
}

/// splitmix64 finalizer.
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}
