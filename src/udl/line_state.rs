//! Persisted per-line state
//!
//! The host stores one opaque `u32` per line. The engine packs the
//! automaton state at the line end, a hash of the active delimiter and the
//! state-stack depth into it:
//!
//! ```text
//!  31  30        24 23            12 11             0
//! +---+------------+----------------+----------------+
//! | 0 |   depth    | delimiter hash |     state      |
//! +---+------------+----------------+----------------+
//! ```

use std::hash::Hasher;

use rustc_hash::FxHasher;

use super::family::Family;
use super::transition::StateId;

const STATE_BITS: u32 = 12;
const HASH_BITS: u32 = 12;
const DEPTH_BITS: u32 = 7;

const STATE_MASK: u32 = (1 << STATE_BITS) - 1;
const HASH_MASK: u32 = (1 << HASH_BITS) - 1;
const DEPTH_MASK: u32 = (1 << DEPTH_BITS) - 1;

/// Largest state id that survives packing
pub const MAX_STATE: StateId = STATE_MASK;
/// Largest stack depth that survives packing
pub const MAX_DEPTH: usize = DEPTH_MASK as usize;

/// An automaton state together with the family it lexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateFamily {
    pub state: StateId,
    pub family: Family,
}

impl StateFamily {
    pub fn new(state: StateId, family: Family) -> Self {
        Self { state, family }
    }
}

/// Unpacked line state.
///
/// `state == 0` marks a line end that must not be used as a restart point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineState {
    pub state: StateId,
    pub delimiter_hash: u32,
    pub depth: usize,
}

impl LineState {
    pub fn pack(self) -> u32 {
        let depth = self.depth.min(MAX_DEPTH) as u32;
        (self.state & STATE_MASK)
            | ((self.delimiter_hash & HASH_MASK) << STATE_BITS)
            | (depth << (STATE_BITS + HASH_BITS))
    }

    pub fn unpack(raw: u32) -> Self {
        Self {
            state: raw & STATE_MASK,
            delimiter_hash: (raw >> STATE_BITS) & HASH_MASK,
            depth: ((raw >> (STATE_BITS + HASH_BITS)) & DEPTH_MASK) as usize,
        }
    }

    /// Whether resynchronization may restart right after this line end
    pub fn is_resumable(&self) -> bool {
        self.state != 0 && self.delimiter_hash == 0
    }
}

/// 12-bit hash of a delimiter; the empty delimiter hashes to 0 and every
/// other delimiter to a non-zero value.
pub fn delimiter_hash(delimiter: &[u8]) -> u32 {
    if delimiter.is_empty() {
        return 0;
    }
    let mut hasher = FxHasher::default();
    hasher.write(delimiter);
    let full = hasher.finish();
    let folded = (full ^ (full >> 12) ^ (full >> 24) ^ (full >> 36) ^ (full >> 48)) as u32 & HASH_MASK;
    if folded == 0 {
        1
    } else {
        folded
    }
}
