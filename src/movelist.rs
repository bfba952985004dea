//! Compact move-list encoding.
//!
//! Each game is stored as a stream of two-byte entries `(x | markers,
//! y | flags)`, see the move-list markers in [`crate::constants`]. The
//! stream starts with an end-of-node marker for a root node without
//! content, and every node's last entry carries the end-of-node bit.
//! Next to the stream a 50-byte bitmap records every point on which a
//! stone was ever captured.

use std::collections::BTreeMap;

use crate::board::{Color, Point};
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::CodecError;
use crate::game::GameProcessor;

fn color_flag(color: Color) -> u8 {
    match color {
        Color::Black => BLACK,
        Color::White => WHITE,
    }
}

fn capture_slot(x: usize, y: usize) -> (usize, u8) {
    (y / 4 + 5 * (x / 2), (x % 2 + 2 * (y % 4)) as u8)
}

/// Encoded move list and capture bitmap of one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameMoves {
    pub moves: Vec<u8>,
    pub captures: [u8; CAPTURE_BYTES],
}

impl Default for GameMoves {
    fn default() -> Self {
        Self {
            moves: Vec::new(),
            captures: [0; CAPTURE_BYTES],
        }
    }
}

impl GameMoves {
    /// Whether a stone was ever captured on `(x, y)` in this game.
    pub fn captured_at(&self, x: usize, y: usize) -> bool {
        let (i, bit) = capture_slot(x, y);
        self.captures.get(i).is_some_and(|b| b & (1 << bit) != 0)
    }

    fn push(&mut self, a: u8, b: u8) {
        self.moves.push(a);
        self.moves.push(b);
    }

    fn mark_capture(&mut self, x: usize, y: usize) {
        let (i, bit) = capture_slot(x, y);
        if let Some(b) = self.captures.get_mut(i) {
            *b |= 1 << bit;
        }
    }

    fn setup(&mut self, x: usize, y: usize, color: Color) {
        self.push(x as u8, y as u8 | color_flag(color));
    }

    fn clear(&mut self, x: usize, y: usize, removed: Option<Color>) {
        let flags = REMOVE | removed.map_or(0, color_flag);
        self.push(x as u8, y as u8 | flags);
    }

    fn play(&mut self, x: usize, y: usize, color: Color, captures: &[Point]) {
        if self.moves.is_empty() {
            self.push(ENDOFNODE, 0);
        }
        self.push(x as u8, y as u8 | color_flag(color));
        let removed = REMOVE | color_flag(color.opponent());
        for &(cx, cy) in captures {
            self.push(cx as u8, cy as u8 | removed);
            self.mark_capture(cx, cy);
        }
    }

    fn pass(&mut self) {
        self.push(PASS_COORD, PASS_COORD);
    }

    fn end_of_node(&mut self) {
        let n = self.moves.len();
        if n == 0 || self.moves[n - 2] & (ENDOFNODE | BRANCHPOINT | ENDOFVARIATION) != 0 {
            self.push(ENDOFNODE, 0);
        } else {
            self.moves[n - 2] |= ENDOFNODE;
        }
    }

    pub fn entries(&self) -> Vec<MoveListEntry> {
        decode(&self.moves)
    }
}

/// Decoded form of a move-list entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveListEntry {
    Place { x: u8, y: u8, color: Color },
    Remove { x: u8, y: u8, color: Option<Color> },
    Pass,
    EndOfNode,
    BranchPoint,
    EndOfVariation,
}

/// Decodes an encoded move list. An entry with the end-of-node bit
/// yields its event followed by [`MoveListEntry::EndOfNode`].
pub fn decode(moves: &[u8]) -> Vec<MoveListEntry> {
    let mut out = Vec::with_capacity(moves.len() / 2);
    for pair in moves.chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        if a & BRANCHPOINT != 0 {
            out.push(MoveListEntry::BranchPoint);
            continue;
        }
        if a & ENDOFVARIATION != 0 {
            out.push(MoveListEntry::EndOfVariation);
            continue;
        }
        let x = a & COORD_MASK;
        let y = b & COORD_MASK;
        let color = if b & BLACK != 0 {
            Some(Color::Black)
        } else if b & WHITE != 0 {
            Some(Color::White)
        } else {
            None
        };
        if b & REMOVE != 0 {
            out.push(MoveListEntry::Remove { x, y, color });
        } else if let Some(color) = color {
            out.push(MoveListEntry::Place { x, y, color });
        } else if x == PASS_COORD && y == PASS_COORD {
            out.push(MoveListEntry::Pass);
        }
        if a & ENDOFNODE != 0 {
            out.push(MoveListEntry::EndOfNode);
        }
    }
    out
}

/// Move lists of all games, keyed by game id.
#[derive(Debug, Default)]
pub struct MoveListIndex {
    data: BTreeMap<i32, GameMoves>,
    current: Option<(i32, GameMoves)>,
}

impl MoveListIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_id: i32) -> Option<&GameMoves> {
        self.data.get(&game_id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_int(self.data.len() as i32);
        for (&id, g) in &self.data {
            w.put_int(id);
            w.put_int(g.moves.len() as i32);
            w.put_bytes(&g.moves);
            w.put_bytes(&g.captures);
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let n = r.get_len()?;
        let mut data = BTreeMap::new();
        for _ in 0..n {
            let id = r.get_int()?;
            let len = r.get_len()?;
            let moves = r.get_bytes()?;
            if moves.len() != len || len % 2 != 0 {
                return Err(CodecError::InvalidValue {
                    what: "move list length",
                    value: len as i64,
                });
            }
            let captured = r.get_bytes()?;
            if captured.len() != CAPTURE_BYTES {
                return Err(CodecError::InvalidValue {
                    what: "capture bitmap length",
                    value: captured.len() as i64,
                });
            }
            let mut captures = [0u8; CAPTURE_BYTES];
            captures.copy_from_slice(&captured);
            data.insert(id, GameMoves { moves, captures });
        }
        Ok(Self {
            data,
            current: None,
        })
    }
}

impl GameProcessor for MoveListIndex {
    fn begin_game(&mut self, game_id: i32) {
        self.current = Some((game_id, GameMoves::default()));
    }

    fn setup_stone(&mut self, x: usize, y: usize, color: Color) {
        if let Some((_, g)) = self.current.as_mut() {
            g.setup(x, y, color);
        }
    }

    fn clear_point(&mut self, x: usize, y: usize, removed: Option<Color>) {
        if let Some((_, g)) = self.current.as_mut() {
            g.clear(x, y, removed);
        }
    }

    fn play(&mut self, x: usize, y: usize, color: Color, captures: &[Point]) {
        if let Some((_, g)) = self.current.as_mut() {
            g.play(x, y, color, captures);
        }
    }

    fn pass(&mut self) {
        if let Some((_, g)) = self.current.as_mut() {
            g.pass();
        }
    }

    fn end_of_node(&mut self) {
        if let Some((_, g)) = self.current.as_mut() {
            g.end_of_node();
        }
    }

    fn branch_point(&mut self) {
        if let Some((_, g)) = self.current.as_mut() {
            g.push(BRANCHPOINT, 0);
        }
    }

    fn end_of_variation(&mut self) {
        if let Some((_, g)) = self.current.as_mut() {
            g.push(ENDOFVARIATION, 0);
        }
    }

    fn end_game(&mut self, commit: bool) {
        if let Some((id, g)) = self.current.take()
            && commit
        {
            self.data.insert(id, g);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameNode, GameTree, dispatch};

    fn encode(tree: &GameTree) -> GameMoves {
        let mut index = MoveListIndex::new();
        index.begin_game(1);
        dispatch(&mut index, &tree.events(true).unwrap());
        index.end_game(true);
        index.get(1).cloned().unwrap()
    }

    #[test]
    fn test_linear_encoding() {
        let g = encode(&GameTree::from_moves(19, &[(3, 3), (15, 15)]));
        assert_eq!(
            g.moves,
            vec![ENDOFNODE, 0, 3 | ENDOFNODE, 3 | BLACK, 15 | ENDOFNODE, 15 | WHITE]
        );
    }

    #[test]
    fn test_captures_are_listed_and_marked() {
        let mut tree = GameTree::new(19);
        tree.root.setup = vec![(0, 0, Color::White), (1, 0, Color::Black)];
        tree.add_line(&[], vec![GameNode::play(0, 1, Color::Black)]);
        let g = encode(&tree);
        assert_eq!(
            g.entries(),
            vec![
                MoveListEntry::Place { x: 0, y: 0, color: Color::White },
                MoveListEntry::Place { x: 1, y: 0, color: Color::Black },
                MoveListEntry::EndOfNode,
                MoveListEntry::Place { x: 0, y: 1, color: Color::Black },
                MoveListEntry::Remove { x: 0, y: 0, color: Some(Color::White) },
                MoveListEntry::EndOfNode,
            ]
        );
        assert!(g.captured_at(0, 0));
        assert!(!g.captured_at(1, 0));
    }

    #[test]
    fn test_capture_bitmap_covers_board() {
        let mut g = GameMoves::default();
        for x in 0..19 {
            for y in 0..19 {
                g.mark_capture(x, y);
            }
        }
        let bits: u32 = g.captures.iter().map(|b| b.count_ones()).sum();
        assert_eq!(bits, 361);
        let mut g = GameMoves::default();
        g.mark_capture(18, 18);
        assert!(g.captured_at(18, 18));
        assert!(!g.captured_at(17, 18));
    }

    #[test]
    fn test_markers_are_separate_entries() {
        let mut tree = GameTree::from_moves(19, &[(3, 3), (4, 4)]);
        tree.add_line(&[0], vec![GameNode::pass(), GameNode::play(5, 5, Color::Black)]);
        let g = encode(&tree);
        assert_eq!(
            g.entries(),
            vec![
                MoveListEntry::EndOfNode,
                MoveListEntry::Place { x: 3, y: 3, color: Color::Black },
                MoveListEntry::EndOfNode,
                MoveListEntry::BranchPoint,
                MoveListEntry::Place { x: 4, y: 4, color: Color::White },
                MoveListEntry::EndOfNode,
                MoveListEntry::EndOfVariation,
                MoveListEntry::Pass,
                MoveListEntry::EndOfNode,
                MoveListEntry::Place { x: 5, y: 5, color: Color::Black },
                MoveListEntry::EndOfNode,
            ]
        );
    }

    #[test]
    fn test_node_after_marker_gets_its_own_end() {
        let mut g = GameMoves::default();
        g.push(BRANCHPOINT, 0);
        g.end_of_node();
        assert_eq!(g.moves, vec![BRANCHPOINT, 0, ENDOFNODE, 0]);
    }

    #[test]
    fn test_setup_removal_of_empty_point() {
        let mut g = GameMoves::default();
        g.clear(2, 3, None);
        assert_eq!(
            g.entries(),
            vec![MoveListEntry::Remove { x: 2, y: 3, color: None }]
        );
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let g = encode(&GameTree::from_moves(19, &[(3, 3), (15, 15), (16, 3)]));
        let mut index = MoveListIndex::new();
        index.data.insert(42, g.clone());
        let mut w = SnapshotWriter::new();
        index.write_snapshot(&mut w);
        let bytes = w.into_bytes();
        let back = MoveListIndex::read_snapshot(&mut SnapshotReader::new(&bytes)).unwrap();
        assert_eq!(back.get(42), Some(&g));
    }
}
