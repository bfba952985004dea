//! Processing and search options.

use crate::board::Color;
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::CodecError;

pub const ALGO_FINALPOS: u32 = 1;
pub const ALGO_MOVELIST: u32 = 2;
pub const ALGO_HASH_FULL: u32 = 4;
pub const ALGO_HASH_CORNER: u32 = 8;
pub const ALGO_SIGNATURE: u32 = 16;

/// Set of search algorithms / indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AlgoSet(u32);

impl AlgoSet {
    pub const ALL: AlgoSet =
        AlgoSet(ALGO_FINALPOS | ALGO_MOVELIST | ALGO_HASH_FULL | ALGO_HASH_CORNER | ALGO_SIGNATURE);

    pub fn new(bits: u32) -> Self {
        AlgoSet(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, algo: u32) -> bool {
        self.0 & algo == algo
    }

    pub fn with(self, algo: u32) -> Self {
        AlgoSet::new(self.0 | algo)
    }

    pub fn without(self, algo: u32) -> Self {
        AlgoSet(self.0 & !algo)
    }
}

impl Default for AlgoSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// How games are processed into the indexes.
///
/// Final positions and move lists are always built; `algos` selects the
/// optional hash and signature indexes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOptions {
    pub process_variations: bool,
    pub algos: AlgoSet,
    pub hash_full_max_stones: usize,
    pub hash_corner_max_stones: usize,
    pub corner_size: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            process_variations: true,
            algos: AlgoSet::ALL,
            hash_full_max_stones: HASH_FULL_MAX_STONES,
            hash_corner_max_stones: HASH_CORNER_MAX_STONES,
            corner_size: HASH_CORNER_SIZE,
        }
    }
}

impl ProcessOptions {
    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_bool(self.process_variations);
        w.put_int(self.algos.bits() as i32);
        w.put_int(self.hash_full_max_stones as i32);
        w.put_int(self.hash_corner_max_stones as i32);
        w.put_int(self.corner_size as i32);
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        Ok(Self {
            process_variations: r.get_bool()?,
            algos: AlgoSet::new(r.get_int()? as u32),
            hash_full_max_stones: r.get_len()?,
            hash_corner_max_stones: r.get_len()?,
            corner_size: r.get_len()?,
        })
    }
}

/// Parameters of one search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Do not search the color-exchanged pattern.
    pub fixed_color: bool,
    /// Only count occurrences continued by this color.
    pub next_move: Option<Color>,
    /// Ignore occurrences completed after this move number.
    pub move_limit: u32,
    /// Report full-board hash hits without replaying the games.
    pub trust_hash_full: bool,
    pub search_in_variations: bool,
    pub algos: AlgoSet,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fixed_color: false,
            next_move: None,
            move_limit: MOVE_LIMIT,
            trust_hash_full: false,
            search_in_variations: true,
            algos: AlgoSet::ALL,
        }
    }
}

impl SearchOptions {
    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_bool(self.fixed_color);
        w.put_char(self.next_move.map_or(0, |c| c.letter() as u8));
        w.put_int(self.move_limit as i32);
        w.put_bool(self.trust_hash_full);
        w.put_bool(self.search_in_variations);
        w.put_int(self.algos.bits() as i32);
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let fixed_color = r.get_bool()?;
        let next = r.get_char()?;
        let next_move = match next {
            0 => None,
            c => Some(Color::from_letter(c).ok_or(CodecError::InvalidValue {
                what: "next move",
                value: c as i64,
            })?),
        };
        let limit = r.get_int()?;
        let move_limit = u32::try_from(limit).map_err(|_| CodecError::InvalidValue {
            what: "move limit",
            value: limit as i64,
        })?;
        Ok(Self {
            fixed_color,
            next_move,
            move_limit,
            trust_hash_full: r.get_bool()?,
            search_in_variations: r.get_bool()?,
            algos: AlgoSet::new(r.get_int()? as u32),
        })
    }
}
