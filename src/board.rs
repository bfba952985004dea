//! Minimal 2D board used to turn game trees into replay events.
//!
//! The search engine never checks legality itself; it consumes the
//! `(x, y, color, captures)` events produced here. Only what a replay
//! needs is implemented: placement, capture of liberty-less groups,
//! suicide rejection, and setup stones.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Pattern symbol of a stone of this color (`'X'` / `'O'`).
    pub fn symbol(self) -> u8 {
        match self {
            Color::Black => b'X',
            Color::White => b'O',
        }
    }

    /// Game-record letter (`'B'` / `'W'`).
    pub fn letter(self) -> char {
        match self {
            Color::Black => 'B',
            Color::White => 'W',
        }
    }

    /// Parses `B`/`W` as well as the pattern symbols `X`/`O`.
    pub fn from_letter(c: u8) -> Option<Color> {
        match c {
            b'B' | b'X' => Some(Color::Black),
            b'W' | b'O' => Some(Color::White),
            _ => None,
        }
    }
}

pub type Point = (usize, usize);

/// Reasons a move cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("illegal move at {0:?}: off the board")]
    OffBoard(Point),
    #[error("illegal move at {0:?}: point not empty")]
    Occupied(Point),
    #[error("illegal move at {0:?}: suicide")]
    Suicide(Point),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    pub size: usize,
    cells: Vec<Option<Color>>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.cells[self.idx(x, y)]
    }

    pub fn num_stones(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = Point> + '_ {
        let s = self.size;
        let mut v = Vec::with_capacity(4);
        if x > 0 {
            v.push((x - 1, y));
        }
        if x + 1 < s {
            v.push((x + 1, y));
        }
        if y > 0 {
            v.push((x, y - 1));
        }
        if y + 1 < s {
            v.push((x, y + 1));
        }
        v.into_iter()
    }

    /// Plays a move and returns the captured stones.
    pub fn play(&mut self, x: usize, y: usize, color: Color) -> Result<Vec<Point>, MoveError> {
        if x >= self.size || y >= self.size {
            return Err(MoveError::OffBoard((x, y)));
        }
        if self.get(x, y).is_some() {
            return Err(MoveError::Occupied((x, y)));
        }
        let idx = self.idx(x, y);
        self.cells[idx] = Some(color);

        let opp = color.opponent();
        let mut captured: Vec<Point> = Vec::new();
        let adjacent: Vec<Point> = self.neighbors(x, y).collect();
        for (nx, ny) in adjacent {
            if self.get(nx, ny) == Some(opp)
                && !captured.contains(&(nx, ny))
                && self.group_liberties(nx, ny) == 0
            {
                self.collect_group(nx, ny, &mut captured);
            }
        }
        for &(rx, ry) in &captured {
            let i = self.idx(rx, ry);
            self.cells[i] = None;
        }

        if captured.is_empty() && self.group_liberties(x, y) == 0 {
            self.cells[idx] = None;
            return Err(MoveError::Suicide((x, y)));
        }
        Ok(captured)
    }

    /// Puts a setup stone on the board, returning what was there before.
    pub fn place(&mut self, x: usize, y: usize, color: Color) -> Result<Option<Color>, MoveError> {
        if x >= self.size || y >= self.size {
            return Err(MoveError::OffBoard((x, y)));
        }
        let idx = self.idx(x, y);
        Ok(self.cells[idx].replace(color))
    }

    /// Empties a point, returning the removed stone.
    pub fn clear(&mut self, x: usize, y: usize) -> Result<Option<Color>, MoveError> {
        if x >= self.size || y >= self.size {
            return Err(MoveError::OffBoard((x, y)));
        }
        let idx = self.idx(x, y);
        Ok(self.cells[idx].take())
    }

    fn collect_group(&self, x: usize, y: usize, out: &mut Vec<Point>) {
        let Some(color) = self.get(x, y) else {
            return;
        };
        let mut stack = vec![(x, y)];
        let mut visited = vec![false; self.size * self.size];
        while let Some((cx, cy)) = stack.pop() {
            let i = self.idx(cx, cy);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            if self.get(cx, cy) == Some(color) {
                out.push((cx, cy));
                for (nx, ny) in self.neighbors(cx, cy) {
                    let ni = self.idx(nx, ny);
                    if !visited[ni] && self.get(nx, ny) == Some(color) {
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }

    fn group_liberties(&self, x: usize, y: usize) -> usize {
        let Some(color) = self.get(x, y) else {
            return 0;
        };
        let mut stack = vec![(x, y)];
        let mut visited = vec![false; self.size * self.size];
        let mut liberties = 0;
        while let Some((cx, cy)) = stack.pop() {
            let i = self.idx(cx, cy);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            for (nx, ny) in self.neighbors(cx, cy) {
                let ni = self.idx(nx, ny);
                match self.get(nx, ny) {
                    None if !visited[ni] => {
                        visited[ni] = true;
                        liberties += 1;
                    }
                    Some(c) if c == color && !visited[ni] => stack.push((nx, ny)),
                    _ => {}
                }
            }
        }
        liberties
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.size {
            for x in 0..self.size {
                let ch = match self.get(x, y) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stone_capture() {
        let mut b = Board::new(9);
        b.play(1, 0, Color::Black).unwrap();
        b.play(0, 0, Color::White).unwrap();
        let captured = b.play(0, 1, Color::Black).unwrap();
        assert_eq!(captured, vec![(0, 0)]);
        assert_eq!(b.get(0, 0), None);
    }

    #[test]
    fn test_group_capture() {
        let mut b = Board::new(5);
        b.place(0, 0, Color::White).unwrap();
        b.place(1, 0, Color::White).unwrap();
        b.place(2, 0, Color::Black).unwrap();
        b.place(0, 1, Color::Black).unwrap();
        let mut captured = b.play(1, 1, Color::Black).unwrap();
        captured.sort();
        assert_eq!(captured, vec![(0, 0), (1, 0)]);
        assert_eq!(b.num_stones(), 3);
    }

    #[test]
    fn test_occupied_and_suicide() {
        let mut b = Board::new(5);
        b.play(1, 0, Color::Black).unwrap();
        b.play(0, 1, Color::Black).unwrap();
        assert_eq!(b.play(1, 0, Color::White), Err(MoveError::Occupied((1, 0))));
        assert_eq!(b.play(0, 0, Color::White), Err(MoveError::Suicide((0, 0))));
        assert_eq!(b.get(0, 0), None);
        assert_eq!(b.play(5, 0, Color::White), Err(MoveError::OffBoard((5, 0))));
    }

    #[test]
    fn test_liberties_count_shared_points_once() {
        let mut b = Board::new(5);
        b.place(1, 1, Color::Black).unwrap();
        b.place(2, 1, Color::Black).unwrap();
        assert_eq!(b.group_liberties(1, 1), 6);
    }

    #[test]
    fn test_setup_and_clear() {
        let mut b = Board::new(5);
        assert_eq!(b.place(2, 2, Color::Black).unwrap(), None);
        assert_eq!(b.place(2, 2, Color::White).unwrap(), Some(Color::Black));
        assert_eq!(b.clear(2, 2).unwrap(), Some(Color::White));
        assert_eq!(b.clear(2, 2).unwrap(), None);
    }

    #[test]
    fn test_color_helpers() {
        assert_eq!(Color::Black.opponent(), Color::White);
        assert_eq!(Color::from_letter(b'W'), Some(Color::White));
        assert_eq!(Color::from_letter(b'X'), Some(Color::Black));
        assert_eq!(Color::from_letter(b'?'), None);
        assert_eq!(Color::White.symbol(), b'O');
    }

    #[test]
    fn test_move_error_messages() {
        let mut b = Board::new(9);
        b.play(3, 4, Color::Black).unwrap();
        let err = b.play(3, 4, Color::White).unwrap_err();
        assert_eq!(err.to_string(), "illegal move at (3, 4): point not empty");
        assert_eq!(MoveError::OffBoard((9, 0)).to_string(), "illegal move at (9, 0): off the board");
        let source: &dyn std::error::Error = &MoveError::Suicide((0, 0));
        assert!(source.source().is_none());
    }
}
