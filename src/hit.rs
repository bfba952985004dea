//! Search results: positions in a game tree, hits, and candidates.

use std::cmp::Ordering;
use std::fmt;

use crate::constants::NO_CONT;

/// Position in a game tree with variations.
///
/// Even indices count moves along a line, odd indices number the
/// alternative taken at a branch point: `[12]` is move 12 of the main
/// line, `[10, 2, 3]` takes the second alternative to move 10 and plays
/// three more moves. The represented move number is the sum of the
/// even-index entries (13 in the example).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtendedMoveNumber {
    data: Vec<u32>,
}

impl Default for ExtendedMoveNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendedMoveNumber {
    pub fn new() -> Self {
        Self { data: vec![0] }
    }

    pub fn from_parts(data: Vec<u32>) -> Self {
        if data.is_empty() {
            return Self::new();
        }
        Self { data }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Advances to the next node of the current line.
    pub fn next(&mut self) {
        if self.data.len() % 2 == 1 {
            if let Some(last) = self.data.last_mut() {
                *last += 1;
            }
        } else {
            self.data.push(1);
        }
    }

    /// Steps into the next variation at the current branch point.
    pub fn down(&mut self) {
        if self.data.len() % 2 == 1 {
            self.data.push(1);
        } else if let Some(last) = self.data.last_mut() {
            *last += 1;
        }
    }

    pub fn total_move_num(&self) -> u32 {
        self.data.iter().step_by(2).sum()
    }
}

impl Ord for ExtendedMoveNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data
            .len()
            .cmp(&other.data.len())
            .then_with(|| self.data.cmp(&other.data))
    }
}

impl PartialOrd for ExtendedMoveNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ExtendedMoveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

/// What follows a hit: the continuation point in canonical pattern
/// coordinates, or none if the line ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HitLabel {
    pub point: Option<(u8, u8)>,
    /// The occurrence had colors exchanged relative to the pattern.
    pub color_switch: bool,
}

impl HitLabel {
    pub fn at(x: usize, y: usize, color_switch: bool) -> Self {
        Self {
            point: Some((x as u8, y as u8)),
            color_switch,
        }
    }

    pub fn no_continuation(color_switch: bool) -> Self {
        Self {
            point: None,
            color_switch,
        }
    }

    /// Three-byte form `[x, y, color_switch]`, with `x = 255` for no continuation.
    pub fn to_bytes(self) -> [u8; 3] {
        let (x, y) = self.point.unwrap_or((NO_CONT, 0));
        [x, y, self.color_switch as u8]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            point: if bytes[0] == NO_CONT {
                None
            } else {
                Some((bytes[0], bytes[1]))
            },
            color_switch: bytes[2] != 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    pub position: ExtendedMoveNumber,
    pub label: HitLabel,
}

impl Hit {
    pub fn new(position: ExtendedMoveNumber, label: HitLabel) -> Self {
        Self { position, label }
    }
}

impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.label.to_bytes().cmp(&other.label.to_bytes()))
    }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A placement of one orientation still to be verified in a game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub x: usize,
    pub y: usize,
    pub orientation: usize,
}

impl Candidate {
    pub fn new(x: usize, y: usize, orientation: usize) -> Self {
        Self { x, y, orientation }
    }
}

/// Appends `c` unless it is already present.
pub fn insert_if_new(candidates: &mut Vec<Candidate>, c: Candidate) {
    if !candidates.contains(&c) {
        candidates.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_line_counting() {
        let mut n = ExtendedMoveNumber::new();
        for _ in 0..5 {
            n.next();
        }
        assert_eq!(n.as_slice(), &[5]);
        assert_eq!(n.total_move_num(), 5);
    }

    #[test]
    fn test_variation_counting() {
        let mut n = ExtendedMoveNumber::from_parts(vec![10]);
        n.down();
        assert_eq!(n.as_slice(), &[10, 1]);
        n.next();
        n.next();
        assert_eq!(n.as_slice(), &[10, 1, 2]);
        assert_eq!(n.total_move_num(), 12);
        n.down();
        n.down();
        assert_eq!(n.as_slice(), &[10, 1, 2, 2]);
        assert_eq!(n.total_move_num(), 12);
        assert_eq!(n.to_string(), "10-1-2-2");
    }

    #[test]
    fn test_ordering_by_depth_then_value() {
        let a = ExtendedMoveNumber::from_parts(vec![50]);
        let b = ExtendedMoveNumber::from_parts(vec![3, 1, 1]);
        let c = ExtendedMoveNumber::from_parts(vec![3, 2, 1]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_label_bytes() {
        assert_eq!(HitLabel::at(3, 4, true).to_bytes(), [3, 4, 1]);
        assert_eq!(HitLabel::no_continuation(false).to_bytes(), [255, 0, 0]);
        assert_eq!(HitLabel::from_bytes([255, 0, 1]), HitLabel::no_continuation(true));
        assert_eq!(HitLabel::from_bytes([1, 2, 0]), HitLabel::at(1, 2, false));
    }

    #[test]
    fn test_insert_if_new() {
        let mut v = Vec::new();
        insert_if_new(&mut v, Candidate::new(0, 0, 1));
        insert_if_new(&mut v, Candidate::new(0, 0, 1));
        insert_if_new(&mut v, Candidate::new(0, 0, 2));
        assert_eq!(v.len(), 2);
    }
}
