//! Search patterns and board symmetry arithmetic.
//!
//! A [`Pattern`] is a rectangle of point symbols together with the
//! rectangle of anchor positions (legal placements of its top-left corner)
//! and an optional list of follow-up moves. Points are stored row by row:
//! point `(i, j)` lives at index `i + j * size_x`.
//!
//! ## Symbols
//!
//! - `.` must be empty
//! - `X` black stone, `O` white stone
//! - `x` black stone or empty, `o` white stone or empty
//! - `*` anything
//!
//! ## Flips
//!
//! The eight board symmetries are numbered 0..8 and applied with
//! [`flip_x`] / [`flip_y`]; `XX` and `YY` are the largest coordinates of
//! the area being flipped. [`compose_flips`]`(i, j)` is "first `j`, then `i`".

use std::fmt;

use crate::board::Color;
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::{CodecError, PatternError};

/// x coordinate of `(x, y)` under flip `f`.
pub fn flip_x(f: u8, x: usize, y: usize, xx: usize, yy: usize) -> usize {
    match f {
        0 | 2 => x,
        1 | 3 => xx - x,
        4 | 6 => y,
        _ => yy - y,
    }
}

/// y coordinate of `(x, y)` under flip `f`.
pub fn flip_y(f: u8, x: usize, y: usize, xx: usize, yy: usize) -> usize {
    match f {
        0 | 1 => y,
        2 | 3 => yy - y,
        4 | 5 => x,
        _ => xx - x,
    }
}

/// Inverse of a flip. Only the two quarter turns are not involutions.
pub fn inverse_flip(f: u8) -> u8 {
    match f {
        5 => 6,
        6 => 5,
        other => other,
    }
}

const COMPOSITION_TABLE: [u8; 64] = [
    0, 1, 2, 3, 4, 5, 6, 7, //
    1, 0, 3, 2, 5, 4, 7, 6, //
    2, 3, 0, 1, 6, 7, 4, 5, //
    3, 2, 1, 0, 7, 6, 5, 4, //
    4, 6, 5, 7, 0, 2, 1, 3, //
    5, 7, 4, 6, 1, 3, 0, 2, //
    6, 4, 7, 5, 2, 0, 3, 1, //
    7, 5, 6, 4, 3, 1, 2, 0, //
];

/// The flip equivalent to applying `j` and then `i`.
pub fn compose_flips(i: u8, j: u8) -> u8 {
    COMPOSITION_TABLE[j as usize + 8 * i as usize]
}

/// Size of a `size_x` x `size_y` rectangle after flip `f`.
pub fn flipped_size(f: u8, size_x: usize, size_y: usize) -> (usize, usize) {
    if f < 4 { (size_x, size_y) } else { (size_y, size_x) }
}

/// Exchanges black and white in a pattern symbol.
pub fn invert_symbol(c: u8) -> u8 {
    match c {
        STONE_BLACK => STONE_WHITE,
        STONE_WHITE => STONE_BLACK,
        BLACK_OR_EMPTY => WHITE_OR_EMPTY,
        WHITE_OR_EMPTY => BLACK_OR_EMPTY,
        other => other,
    }
}

fn is_symbol(c: u8) -> bool {
    matches!(
        c,
        EMPTY | STONE_BLACK | STONE_WHITE | BLACK_OR_EMPTY | WHITE_OR_EMPTY | WILDCARD
    )
}

/// Where on the board a pattern may be placed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    FullBoard,
    CornerNW,
    CornerNE,
    CornerSE,
    CornerSW,
    SideN,
    SideE,
    SideS,
    SideW,
    Center,
}

/// A move the game must continue with after the pattern appeared.
///
/// Coordinates are relative to the pattern; `color` is `X`, `O`, or `-`
/// for a stone that must be removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FollowUp {
    pub x: usize,
    pub y: usize,
    pub color: u8,
}

impl FollowUp {
    pub fn new(x: usize, y: usize, color: Color) -> Self {
        Self {
            x,
            y,
            color: color.symbol(),
        }
    }

    pub fn removal(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            color: REMOVED,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Pattern {
    pub boardsize: usize,
    pub size_x: usize,
    pub size_y: usize,
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
    points: Vec<u8>,
    pub follow_ups: Vec<FollowUp>,
    /// Pre-assigned continuation labels, `.` for none.
    pub labels: Option<Vec<u8>>,
    /// Flip that produced this pattern from the search pattern.
    pub flip: u8,
    /// Whether colors were exchanged to produce this pattern.
    pub color_switch: bool,
}

/// Structural equality: flip, color switch and labels are bookkeeping.
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.boardsize == other.boardsize
            && self.size_x == other.size_x
            && self.size_y == other.size_y
            && self.left == other.left
            && self.right == other.right
            && self.top == other.top
            && self.bottom == other.bottom
            && self.points == other.points
            && self.follow_ups == other.follow_ups
    }
}

impl Eq for Pattern {}

fn parse_points(grid: &str, size_x: usize, size_y: usize) -> Result<Vec<u8>, PatternError> {
    let points: Vec<u8> = grid.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    if points.len() != size_x * size_y {
        return Err(PatternError::WrongLength {
            expected: size_x * size_y,
            actual: points.len(),
        });
    }
    if let Some(&bad) = points.iter().find(|&&c| !is_symbol(c)) {
        return Err(PatternError::InvalidSymbol(bad as char));
    }
    Ok(points)
}

impl Pattern {
    /// Builds a pattern whose anchors follow from its kind.
    ///
    /// `grid` lists the points row by row; whitespace is ignored.
    pub fn new(
        kind: PatternKind,
        boardsize: usize,
        size_x: usize,
        size_y: usize,
        grid: &str,
    ) -> Result<Self, PatternError> {
        let bs = boardsize as isize;
        let sx = size_x as isize;
        let sy = size_y as isize;
        let (left, right, top, bottom) = match kind {
            PatternKind::FullBoard | PatternKind::CornerNW => (0, 0, 0, 0),
            PatternKind::CornerNE => (bs - sx, bs - sx, 0, 0),
            PatternKind::CornerSE => (bs - sx, bs - sx, bs - sy, bs - sy),
            PatternKind::CornerSW => (0, 0, bs - sy, bs - sy),
            PatternKind::SideN => (1, bs - 1 - sx, 0, 0),
            PatternKind::SideE => (bs - sx, bs - sx, 1, bs - 1 - sy),
            PatternKind::SideS => (1, bs - 1 - sx, bs - sy, bs - sy),
            PatternKind::SideW => (0, 0, 1, bs - 1 - sy),
            PatternKind::Center => (1, bs - 1 - sx, 1, bs - 1 - sy),
        };
        if kind == PatternKind::FullBoard && (size_x != boardsize || size_y != boardsize) {
            return Err(PatternError::InvalidSize {
                size_x,
                size_y,
                boardsize,
            });
        }
        if left < 0 || right < 0 || top < 0 || bottom < 0 {
            return Err(PatternError::InvalidAnchor {
                left: left.max(0) as usize,
                right: right.max(0) as usize,
                top: top.max(0) as usize,
                bottom: bottom.max(0) as usize,
                size_x,
                size_y,
                boardsize,
            });
        }
        Self::with_anchors(
            left as usize,
            right as usize,
            top as usize,
            bottom as usize,
            boardsize,
            size_x,
            size_y,
            grid,
        )
    }

    /// Builds a pattern with an explicit anchor rectangle.
    #[allow(clippy::too_many_arguments)]
    pub fn with_anchors(
        left: usize,
        right: usize,
        top: usize,
        bottom: usize,
        boardsize: usize,
        size_x: usize,
        size_y: usize,
        grid: &str,
    ) -> Result<Self, PatternError> {
        let points = parse_points(grid, size_x, size_y)?;
        let pattern = Pattern {
            boardsize,
            size_x,
            size_y,
            left,
            right,
            top,
            bottom,
            points,
            follow_ups: Vec::new(),
            labels: None,
            flip: 0,
            color_switch: false,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    fn validate(&self) -> Result<(), PatternError> {
        if self.boardsize == 0 || self.boardsize > MAX_BOARDSIZE {
            return Err(PatternError::UnsupportedBoardSize(self.boardsize));
        }
        if self.size_x == 0
            || self.size_y == 0
            || self.size_x > self.boardsize
            || self.size_y > self.boardsize
        {
            return Err(PatternError::InvalidSize {
                size_x: self.size_x,
                size_y: self.size_y,
                boardsize: self.boardsize,
            });
        }
        if self.right < self.left
            || self.bottom < self.top
            || self.right + self.size_x > self.boardsize
            || self.bottom + self.size_y > self.boardsize
        {
            return Err(PatternError::InvalidAnchor {
                left: self.left,
                right: self.right,
                top: self.top,
                bottom: self.bottom,
                size_x: self.size_x,
                size_y: self.size_y,
                boardsize: self.boardsize,
            });
        }
        if self.points.len() != self.size_x * self.size_y {
            return Err(PatternError::WrongLength {
                expected: self.size_x * self.size_y,
                actual: self.points.len(),
            });
        }
        for f in &self.follow_ups {
            if f.x >= self.size_x
                || f.y >= self.size_y
                || !matches!(f.color, STONE_BLACK | STONE_WHITE | REMOVED)
            {
                return Err(PatternError::InvalidFollowUp {
                    x: f.x,
                    y: f.y,
                    color: f.color as char,
                });
            }
        }
        if let Some(labels) = &self.labels
            && labels.len() != self.size_x * self.size_y
        {
            return Err(PatternError::WrongLength {
                expected: self.size_x * self.size_y,
                actual: labels.len(),
            });
        }
        Ok(())
    }

    pub fn with_follow_ups(mut self, follow_ups: Vec<FollowUp>) -> Result<Self, PatternError> {
        self.follow_ups = follow_ups;
        self.validate()?;
        Ok(self)
    }

    /// Attaches pre-assigned labels, one character per point (`.` for none).
    pub fn with_labels(mut self, labels: &str) -> Result<Self, PatternError> {
        let labels: Vec<u8> = labels.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
        self.labels = Some(labels);
        self.validate()?;
        Ok(self)
    }

    /// Symbol at pattern point `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> u8 {
        self.points[i + self.size_x * j]
    }

    pub fn points(&self) -> &[u8] {
        &self.points
    }

    pub fn label_at(&self, i: usize, j: usize) -> u8 {
        self.labels
            .as_ref()
            .map_or(NO_LABEL, |l| l[i + self.size_x * j])
    }

    pub fn is_full_board(&self) -> bool {
        self.size_x == self.boardsize && self.size_y == self.boardsize
    }

    /// Number of points requiring a stone.
    pub fn num_stones(&self) -> usize {
        self.points
            .iter()
            .filter(|&&c| c == STONE_BLACK || c == STONE_WHITE)
            .count()
    }

    /// The pattern under flip `f`, optionally with colors exchanged.
    ///
    /// Anchors move with the board; contents and follow-ups move within
    /// the pattern rectangle.
    pub fn transformed(&self, f: u8, invert: bool) -> Pattern {
        let bs1 = self.boardsize - 1;
        let (sx, sy) = (self.size_x, self.size_y);
        let (new_sx, new_sy) = flipped_size(f, sx, sy);

        let (ax, ay) = (self.left, self.top);
        let (bx, by) = (self.right + sx - 1, self.bottom + sy - 1);
        let x1 = flip_x(f, ax, ay, bs1, bs1);
        let x2 = flip_x(f, bx, by, bs1, bs1);
        let y1 = flip_y(f, ax, ay, bs1, bs1);
        let y2 = flip_y(f, bx, by, bs1, bs1);

        let mut points = vec![EMPTY; sx * sy];
        for i in 0..sx {
            for j in 0..sy {
                let c = self.get(i, j);
                let fi = flip_x(f, i, j, sx - 1, sy - 1);
                let fj = flip_y(f, i, j, sx - 1, sy - 1);
                points[fi + new_sx * fj] = if invert { invert_symbol(c) } else { c };
            }
        }

        let follow_ups = self
            .follow_ups
            .iter()
            .map(|m| FollowUp {
                x: flip_x(f, m.x, m.y, sx - 1, sy - 1),
                y: flip_y(f, m.x, m.y, sx - 1, sy - 1),
                color: if invert { invert_symbol(m.color) } else { m.color },
            })
            .collect();

        Pattern {
            boardsize: self.boardsize,
            size_x: new_sx,
            size_y: new_sy,
            left: x1.min(x2),
            right: x1.max(x2) - (new_sx - 1),
            top: y1.min(y2),
            bottom: y1.max(y2) - (new_sy - 1),
            points,
            follow_ups,
            labels: None,
            flip: f,
            color_switch: invert,
        }
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_int(self.flip as i32);
        w.put_int(self.color_switch as i32);
        w.put_int(self.left as i32);
        w.put_int(self.right as i32);
        w.put_int(self.top as i32);
        w.put_int(self.bottom as i32);
        w.put_int(self.boardsize as i32);
        w.put_int(self.size_x as i32);
        w.put_int(self.size_y as i32);
        match &self.labels {
            Some(labels) => {
                w.put_char(1);
                w.put_bytes(labels);
            }
            None => w.put_char(0),
        }
        w.put_bytes(&self.points);
        w.put_int(self.follow_ups.len() as i32);
        for m in &self.follow_ups {
            w.put_char(m.x as u8);
            w.put_char(m.y as u8);
            w.put_char(m.color);
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Pattern, CodecError> {
        fn non_negative(what: &'static str, v: i32) -> Result<usize, CodecError> {
            usize::try_from(v).map_err(|_| CodecError::InvalidValue {
                what,
                value: v as i64,
            })
        }
        let flip = non_negative("flip", r.get_int()?)?;
        let color_switch = r.get_int()? != 0;
        let left = non_negative("left", r.get_int()?)?;
        let right = non_negative("right", r.get_int()?)?;
        let top = non_negative("top", r.get_int()?)?;
        let bottom = non_negative("bottom", r.get_int()?)?;
        let boardsize = non_negative("boardsize", r.get_int()?)?;
        let size_x = non_negative("size_x", r.get_int()?)?;
        let size_y = non_negative("size_y", r.get_int()?)?;
        let labels = if r.get_char()? != 0 {
            Some(r.get_bytes()?)
        } else {
            None
        };
        let points = r.get_bytes()?;
        let n = r.get_len()?;
        let mut follow_ups = Vec::with_capacity(n);
        for _ in 0..n {
            let x = r.get_char()? as usize;
            let y = r.get_char()? as usize;
            let color = r.get_char()?;
            follow_ups.push(FollowUp { x, y, color });
        }
        let pattern = Pattern {
            boardsize,
            size_x,
            size_y,
            left,
            right,
            top,
            bottom,
            points,
            follow_ups,
            labels,
            flip: (flip % 8) as u8,
            color_switch,
        };
        pattern
            .validate()
            .map_err(|_| CodecError::InvalidValue {
                what: "pattern",
                value: flip as i64,
            })?;
        Ok(pattern)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}x{} anchors [{},{}]x[{},{}] flip {}{}",
            self.size_x,
            self.size_y,
            self.left,
            self.right,
            self.top,
            self.bottom,
            self.flip,
            if self.color_switch { " cs" } else { "" }
        )?;
        for j in 0..self.size_y {
            for i in 0..self.size_x {
                write!(f, "{}", self.get(i, j) as char)?;
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
    fn test_flips_are_the_dihedral_group() {
        for f in 0..8u8 {
            let g = inverse_flip(f);
            assert_eq!(compose_flips(f, g), 0, "flip {f} with its inverse");
            assert_eq!(compose_flips(g, f), 0);
            for x in 0..5 {
                for y in 0..5 {
                    let fx = flip_x(f, x, y, 4, 4);
                    let fy = flip_y(f, x, y, 4, 4);
                    assert_eq!(flip_x(g, fx, fy, 4, 4), x);
                    assert_eq!(flip_y(g, fx, fy, 4, 4), y);
                }
            }
        }
    }

    #[test]
    fn test_compose_is_first_j_then_i() {
        for i in 0..8u8 {
            for j in 0..8u8 {
                let k = compose_flips(i, j);
                for x in 0..4 {
                    for y in 0..4 {
                        let (jx, jy) = (flip_x(j, x, y, 3, 3), flip_y(j, x, y, 3, 3));
                        let (ix, iy) = (flip_x(i, jx, jy, 3, 3), flip_y(i, jx, jy, 3, 3));
                        assert_eq!((ix, iy), (flip_x(k, x, y, 3, 3), flip_y(k, x, y, 3, 3)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_anchor_rectangles() {
        let p = Pattern::new(PatternKind::CornerSE, 19, 3, 2, "......").unwrap();
        assert_eq!((p.left, p.right, p.top, p.bottom), (16, 16, 17, 17));
        let p = Pattern::new(PatternKind::SideN, 19, 3, 2, "......").unwrap();
        assert_eq!((p.left, p.right, p.top, p.bottom), (1, 15, 0, 0));
        let p = Pattern::new(PatternKind::SideW, 19, 3, 2, "......").unwrap();
        assert_eq!((p.left, p.right, p.top, p.bottom), (0, 0, 1, 16));
        let p = Pattern::new(PatternKind::Center, 19, 3, 2, "......").unwrap();
        assert_eq!((p.left, p.right, p.top, p.bottom), (1, 15, 1, 16));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            Pattern::with_anchors(0, 17, 0, 0, 19, 3, 3, "........."),
            Err(PatternError::InvalidAnchor { .. })
        ));
        assert!(matches!(
            Pattern::with_anchors(5, 4, 0, 0, 19, 3, 3, "........."),
            Err(PatternError::InvalidAnchor { .. })
        ));
        assert!(matches!(
            Pattern::new(PatternKind::CornerNW, 9, 10, 1, ".........."),
            Err(PatternError::InvalidSize { .. })
        ));
        assert!(matches!(
            Pattern::new(PatternKind::Center, 5, 4, 4, "................"),
            Err(PatternError::InvalidAnchor { .. })
        ));
        assert_eq!(
            Pattern::new(PatternKind::CornerNW, 19, 2, 2, "X.O"),
            Err(PatternError::WrongLength {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            Pattern::new(PatternKind::CornerNW, 19, 2, 2, "X.O?"),
            Err(PatternError::InvalidSymbol('?'))
        );
    }

    #[test]
    fn test_invalid_follow_up() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 2, 2, "X.O.").unwrap();
        assert!(p.with_follow_ups(vec![FollowUp::new(2, 0, Color::Black)]).is_err());
    }

    #[test]
    fn test_transform_moves_contents_and_anchors() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 3, 2, "XO. ...").unwrap();
        // Mirror left/right: the pattern goes to the NE corner.
        let q = p.transformed(1, false);
        assert_eq!((q.left, q.right, q.top, q.bottom), (16, 16, 0, 0));
        assert_eq!(q.get(2, 0), b'X');
        assert_eq!(q.get(1, 0), b'O');
        // Transpose swaps the dimensions.
        let t = p.transformed(4, true);
        assert_eq!((t.size_x, t.size_y), (2, 3));
        assert_eq!(t.get(0, 0), b'O');
        assert_eq!(t.get(0, 1), b'X');
        assert!(t.color_switch);
    }

    #[test]
    fn test_follow_ups_are_transformed() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 3, 3, ".........")
            .unwrap()
            .with_follow_ups(vec![FollowUp::new(0, 1, Color::Black), FollowUp::removal(2, 2)])
            .unwrap();
        let q = p.transformed(2, true);
        assert_eq!(
            q.follow_ups,
            vec![
                FollowUp {
                    x: 0,
                    y: 1,
                    color: b'O'
                },
                FollowUp {
                    x: 2,
                    y: 0,
                    color: b'-'
                }
            ]
        );
    }

    #[test]
    fn test_equality_ignores_bookkeeping() {
        let p = Pattern::new(PatternKind::Center, 19, 2, 2, "....").unwrap();
        let q = p.transformed(3, true);
        assert_eq!(p, q);
        assert_ne!(q.flip, p.flip);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let p = Pattern::new(PatternKind::SideS, 19, 4, 2, "X.o* O.x.")
            .unwrap()
            .with_follow_ups(vec![FollowUp::new(1, 1, Color::White)])
            .unwrap()
            .with_labels("A... ..B.")
            .unwrap();
        let mut w = SnapshotWriter::new();
        p.write_snapshot(&mut w);
        let bytes = w.into_bytes();
        let q = Pattern::read_snapshot(&mut SnapshotReader::new(&bytes)).unwrap();
        assert_eq!(p, q);
        assert_eq!(q.labels, p.labels);
    }
}
