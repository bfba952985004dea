//! Final-position bitmaps.
//!
//! For every game one 100-byte bitmap records which points ever held a
//! black stone and which ever held a white stone. The board is cut into
//! 2x2 blocks; block `(x/2, y/2)` is byte `y/2 + 10 * (x/2)`, and point
//! `(x, y)` owns bits `2 * (x%2 + 2 * (y%2))` (black) and the next one
//! (white). Bits start set and are *cleared* when a stone appears.
//!
//! A pattern placement is a candidate only if every stone it requires
//! appeared at some point of the game, which is checked a byte at a time
//! against precomputed pattern bit blocks.

use std::collections::BTreeMap;

use crate::board::{Color, Point};
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::CodecError;
use crate::game::GameProcessor;
use crate::hit::{Candidate, insert_if_new};
use crate::pattern::Pattern;
use crate::symmetry::PatternList;

/// Byte index and black bit of point `(x, y)`.
fn slot(x: usize, y: usize) -> (usize, u8) {
    (y / 2 + FINALPOS_STRIDE * (x / 2), (2 * (x % 2 + 2 * (y % 2))) as u8)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalPos {
    bytes: [u8; FINALPOS_BYTES],
}

impl Default for FinalPos {
    fn default() -> Self {
        Self::new()
    }
}

impl FinalPos {
    pub fn new() -> Self {
        Self {
            bytes: [0xFF; FINALPOS_BYTES],
        }
    }

    pub fn from_bytes(bytes: [u8; FINALPOS_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; FINALPOS_BYTES] {
        &self.bytes
    }

    pub fn mark(&mut self, x: usize, y: usize, color: Color) {
        let (i, bit) = slot(x, y);
        let bit = match color {
            Color::Black => bit,
            Color::White => bit + 1,
        };
        if let Some(b) = self.bytes.get_mut(i) {
            *b &= !(1 << bit);
        }
    }

    /// Whether a stone of `color` was ever on `(x, y)`.
    pub fn had(&self, x: usize, y: usize, color: Color) -> bool {
        let (i, bit) = slot(x, y);
        let bit = match color {
            Color::Black => bit,
            Color::White => bit + 1,
        };
        self.bytes.get(i).is_some_and(|b| b & (1 << bit) == 0)
    }

    /// Hash of the bitmap used to spot strict duplicates.
    pub fn fingerprint(&self) -> u64 {
        self.bytes.iter().fold(0u64, |hash, &b| {
            (b as i8 as i64 as u64)
                .wrapping_add(hash << 6)
                .wrapping_add(hash << 16)
                .wrapping_sub(hash)
        })
    }
}

/// One row of a pattern bit block: bytes starting `start` bytes into the row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitRow {
    pub start: usize,
    pub bits: Vec<u8>,
}

/// Pattern bit blocks of one orientation, one per placement parity.
///
/// Block `2 * i + j` is used for placements with `y % 2 == i` and `x % 2 == j`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternBits {
    phases: [Vec<BitRow>; 4],
}

impl PatternBits {
    pub fn new(pattern: &Pattern) -> Self {
        let (sx, sy) = (pattern.size_x, pattern.size_y);
        let mut phases: [Vec<BitRow>; 4] = Default::default();
        for i in 0..2 {
            for j in 0..2 {
                let bytes_per_row = (sy + i + 1) / 2;
                let rows = (sx + j + 1) / 2;
                let mut block = Vec::with_capacity(rows);
                for k1 in 0..rows {
                    let mut row = vec![0u8; bytes_per_row];
                    for (k2, byte) in row.iter_mut().enumerate() {
                        for x in 0..2 {
                            for y in 0..2 {
                                let (Some(px), Some(py)) =
                                    ((k1 * 2 + y).checked_sub(j), (k2 * 2 + x).checked_sub(i))
                                else {
                                    continue;
                                };
                                if px >= sx || py >= sy {
                                    continue;
                                }
                                match pattern.get(px, py) {
                                    STONE_BLACK => *byte |= 1 << (2 * (2 * x + y)),
                                    STONE_WHITE => *byte |= 1 << (2 * (2 * x + y) + 1),
                                    _ => {}
                                }
                            }
                        }
                    }
                    let start = row.iter().position(|&b| b != 0).unwrap_or(row.len());
                    let end = row.iter().rposition(|&b| b != 0).map_or(start, |e| e + 1);
                    block.push(BitRow {
                        start,
                        bits: row[start..end].to_vec(),
                    });
                }
                phases[2 * i + j] = block;
            }
        }
        Self { phases }
    }

    /// Whether every stone of the pattern placed at `(a0, a1)` appeared in `fp`.
    pub fn matches(&self, fp: &FinalPos, a0: usize, a1: usize) -> bool {
        let block = &self.phases[2 * (a1 % 2) + (a0 % 2)];
        let mut index = a1 / 2 + (a0 / 2) * FINALPOS_STRIDE;
        for row in block {
            index += row.start;
            for &bits in &row.bits {
                match fp.bytes.get(index) {
                    Some(&b) if b & bits == 0 => index += 1,
                    _ => return false,
                }
            }
            index += FINALPOS_STRIDE - row.start - row.bits.len();
        }
        true
    }
}

/// Final-position bitmaps of all games, keyed by game id.
#[derive(Debug, Default)]
pub struct FinalPosIndex {
    data: BTreeMap<i32, FinalPos>,
    current: Option<(i32, FinalPos)>,
}

impl FinalPosIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_id: i32) -> Option<&FinalPos> {
        self.data.get(&game_id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fingerprint of the game being processed.
    pub fn current_fingerprint(&self) -> Option<u64> {
        self.current.as_ref().map(|(_, fp)| fp.fingerprint())
    }

    /// Placements of every orientation that survive the bitmap filter.
    pub fn candidates(&self, plist: &PatternList, bits: &[PatternBits], game_id: i32) -> Vec<Candidate> {
        let mut out = Vec::new();
        let Some(fp) = self.data.get(&game_id) else {
            return out;
        };
        for (orientation, (p, b)) in plist.data.iter().zip(bits).enumerate() {
            for a1 in p.top..=p.bottom {
                for a0 in p.left..=p.right {
                    if b.matches(fp, a0, a1) {
                        insert_if_new(&mut out, Candidate::new(a0, a1, orientation));
                    }
                }
            }
        }
        out
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_int(self.data.len() as i32);
        for (&id, fp) in &self.data {
            w.put_int(id);
            w.put_raw(&fp.bytes);
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let n = r.get_len()?;
        let mut data = BTreeMap::new();
        for _ in 0..n {
            let id = r.get_int()?;
            let mut bytes = [0u8; FINALPOS_BYTES];
            bytes.copy_from_slice(r.get_raw(FINALPOS_BYTES)?);
            data.insert(id, FinalPos::from_bytes(bytes));
        }
        Ok(Self {
            data,
            current: None,
        })
    }
}

impl GameProcessor for FinalPosIndex {
    fn begin_game(&mut self, game_id: i32) {
        self.current = Some((game_id, FinalPos::new()));
    }

    fn setup_stone(&mut self, x: usize, y: usize, color: Color) {
        if let Some((_, fp)) = self.current.as_mut() {
            fp.mark(x, y, color);
        }
    }

    fn play(&mut self, x: usize, y: usize, color: Color, _captures: &[Point]) {
        if let Some((_, fp)) = self.current.as_mut() {
            fp.mark(x, y, color);
        }
    }

    fn end_game(&mut self, commit: bool) {
        if let Some((id, fp)) = self.current.take()
            && commit
        {
            self.data.insert(id, fp);
        }
    }
}
