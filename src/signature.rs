//! Symmetrized move signatures.
//!
//! The signature of a game lists the coordinates of moves 20, 40, 60, 31,
//! 51 and 71 of its main line as letters (`a` = 0), `??` for moves the
//! game does not reach and `tt` for passes. Taking the smallest of its
//! eight flipped versions makes it independent of the board orientation,
//! so games recorded in different orientations collide.

use std::collections::BTreeMap;

use crate::board::{Color, Point};
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::error::CodecError;
use crate::game::GameProcessor;
use crate::pattern::{flip_x, flip_y};

pub type Signature = [u8; 12];

const SIGNATURE_MOVES: [u32; 6] = [20, 40, 60, 31, 51, 71];
const PASS_LETTER: u8 = b't';

fn is_coord(c: u8) -> bool {
    (b'a'..=b's').contains(&c)
}

fn flipped(f: u8, sig: &Signature, boardsize: usize) -> Signature {
    let mut out = *sig;
    let m = boardsize - 1;
    for pair in out.chunks_exact_mut(2) {
        if is_coord(pair[0]) && is_coord(pair[1]) {
            let (x, y) = ((pair[0] - b'a') as usize, (pair[1] - b'a') as usize);
            pair[0] = flip_x(f, x, y, m, m) as u8 + b'a';
            pair[1] = flip_y(f, x, y, m, m) as u8 + b'a';
        }
    }
    out
}

/// Smallest of the eight flipped versions of `sig`.
pub fn symmetrize(sig: &Signature, boardsize: usize) -> Signature {
    (0..8)
        .map(|f| flipped(f, sig, boardsize))
        .min()
        .unwrap_or(*sig)
}

#[derive(Debug)]
struct SignatureState {
    game_id: i32,
    signature: Signature,
    counter: u32,
    main_line: bool,
}

/// Symmetrized signatures of all games.
#[derive(Debug)]
pub struct SignatureIndex {
    boardsize: usize,
    data: BTreeMap<Signature, Vec<i32>>,
    current: Option<SignatureState>,
}

impl SignatureIndex {
    pub fn new(boardsize: usize) -> Self {
        Self {
            boardsize,
            data: BTreeMap::new(),
            current: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Symmetrized signature of the game being processed.
    pub fn current_signature(&self) -> Option<Signature> {
        self.current
            .as_ref()
            .map(|s| symmetrize(&s.signature, self.boardsize))
    }

    /// Games with the given (symmetrized) signature.
    pub fn search(&self, signature: &Signature) -> &[i32] {
        self.data.get(signature).map(Vec::as_slice).unwrap_or_default()
    }

    /// All signatures shared by at least two games.
    pub fn collisions(&self) -> impl Iterator<Item = (&Signature, &[i32])> {
        self.data
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(sig, ids)| (sig, ids.as_slice()))
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_int(self.len() as i32);
        for (sig, ids) in &self.data {
            for &id in ids {
                w.put_bytes(sig);
                w.put_int(id);
            }
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader, boardsize: usize) -> Result<Self, CodecError> {
        let n = r.get_len()?;
        let mut index = Self::new(boardsize);
        for _ in 0..n {
            let bytes = r.get_bytes()?;
            let sig: Signature = bytes.as_slice().try_into().map_err(|_| CodecError::InvalidValue {
                what: "signature length",
                value: bytes.len() as i64,
            })?;
            let id = r.get_int()?;
            index.data.entry(sig).or_default().push(id);
        }
        Ok(index)
    }

    fn record_move(&mut self, x: u8, y: u8) {
        let Some(state) = self.current.as_mut().filter(|s| s.main_line) else {
            return;
        };
        state.counter += 1;
        if let Some(slot) = SIGNATURE_MOVES.iter().position(|&n| n == state.counter) {
            state.signature[2 * slot] = x;
            state.signature[2 * slot + 1] = y;
        }
    }
}

impl GameProcessor for SignatureIndex {
    fn begin_game(&mut self, game_id: i32) {
        self.current = Some(SignatureState {
            game_id,
            signature: [b'?'; 12],
            counter: 0,
            main_line: true,
        });
    }

    fn play(&mut self, x: usize, y: usize, _color: Color, _captures: &[Point]) {
        self.record_move(x as u8 + b'a', y as u8 + b'a');
    }

    fn pass(&mut self) {
        self.record_move(PASS_LETTER, PASS_LETTER);
    }

    fn end_of_variation(&mut self) {
        if let Some(state) = self.current.as_mut() {
            state.main_line = false;
        }
    }

    fn end_game(&mut self, commit: bool) {
        if let Some(state) = self.current.take()
            && commit
        {
            let sig = symmetrize(&state.signature, self.boardsize);
            self.data.entry(sig).or_default().push(state.game_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameNode, GameTree, dispatch};

    fn spiral(n: usize) -> Vec<Point> {
        let mut moves = Vec::new();
        'outer: for y in 0..19 {
            for x in 0..19 {
                if (x + y) % 3 == 0 {
                    moves.push((x, y));
                    if moves.len() == n {
                        break 'outer;
                    }
                }
            }
        }
        moves
    }

    fn signature_of(index: &mut SignatureIndex, id: i32, tree: &GameTree) -> Signature {
        index.begin_game(id);
        dispatch(index, &tree.events(true).unwrap());
        let sig = index.current_signature().unwrap();
        index.end_game(true);
        sig
    }

    #[test]
    fn test_short_game_is_unknown() {
        let mut index = SignatureIndex::new(19);
        let sig = signature_of(&mut index, 1, &GameTree::from_moves(19, &spiral(10)));
        assert_eq!(&sig, b"????????????");
    }

    #[test]
    fn test_signature_moves() {
        let moves = spiral(45);
        let mut index = SignatureIndex::new(19);
        index.begin_game(1);
        dispatch(&mut index, &GameTree::from_moves(19, &moves).events(true).unwrap());
        let raw = index.current.as_ref().unwrap().signature;
        let letters = |(x, y): Point| [x as u8 + b'a', y as u8 + b'a'];
        assert_eq!(raw[0..2], letters(moves[19]));
        assert_eq!(raw[2..4], letters(moves[39]));
        assert_eq!(&raw[4..6], b"??");
        assert_eq!(raw[6..8], letters(moves[30]));
    }

    #[test]
    fn test_flipped_games_collide() {
        let moves = spiral(80);
        let mirrored: Vec<Point> = moves.iter().map(|&(x, y)| (18 - x, y)).collect();
        let mut index = SignatureIndex::new(19);
        let a = signature_of(&mut index, 1, &GameTree::from_moves(19, &moves));
        let b = signature_of(&mut index, 2, &GameTree::from_moves(19, &mirrored));
        assert_eq!(a, b);
        assert_eq!(index.search(&a), &[1, 2]);
        assert_eq!(index.collisions().count(), 1);
    }

    #[test]
    fn test_variations_do_not_count() {
        let moves = spiral(25);
        let mut tree = GameTree::from_moves(19, &moves);
        // A sidelined variation at move 1 must not shift the move count.
        tree.add_line(&[], vec![GameNode::play(9, 9, Color::Black)]);
        let mut index = SignatureIndex::new(19);
        let with_var = signature_of(&mut index, 1, &tree);
        let plain = signature_of(&mut index, 2, &GameTree::from_moves(19, &moves));
        assert_eq!(with_var, plain);
    }

    #[test]
    fn test_passes_are_not_flipped() {
        let sig: Signature = *b"ttaa????????";
        assert_eq!(&symmetrize(&sig, 19)[..4], b"ttaa");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut index = SignatureIndex::new(19);
        signature_of(&mut index, 3, &GameTree::from_moves(19, &spiral(30)));
        signature_of(&mut index, 4, &GameTree::from_moves(19, &spiral(30)));
        let mut w = SnapshotWriter::new();
        index.write_snapshot(&mut w);
        let bytes = w.into_bytes();
        let back = SignatureIndex::read_snapshot(&mut SnapshotReader::new(&bytes), 19).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.data, index.data);
    }
}
