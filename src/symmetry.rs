//! Symmetry orbit of a search pattern.
//!
//! [`PatternList`] holds every distinct image of the search pattern under
//! the eight flips and, unless colors are fixed, under color exchange.
//! Each image ("orientation") is searched independently; the tables here
//! map what is found in an orientation back to the coordinates and colors
//! of the pattern the user entered, so that symmetric continuations land
//! on one point.

use crate::board::Color;
use crate::constants::*;
use crate::error::PatternError;
use crate::pattern::{Pattern, compose_flips, flip_x, flip_y, flipped_size, inverse_flip};

/// Where a point of an orientation maps to in the canonical pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymmetryEntry {
    pub x: usize,
    pub y: usize,
    pub color_switch: bool,
}

/// Point remapping table of one orientation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symmetries {
    pub size_x: usize,
    pub size_y: usize,
    entries: Vec<Option<SymmetryEntry>>,
}

impl Symmetries {
    pub fn new(size_x: usize, size_y: usize) -> Self {
        Self {
            size_x,
            size_y,
            entries: vec![None; size_x * size_y],
        }
    }

    /// Table mapping every point to itself without color exchange.
    pub fn identity(size_x: usize, size_y: usize) -> Self {
        let mut s = Self::new(size_x, size_y);
        for j in 0..size_y {
            for i in 0..size_x {
                s.entries[i + size_x * j] = Some(SymmetryEntry {
                    x: i,
                    y: j,
                    color_switch: false,
                });
            }
        }
        s
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, PatternError> {
        if x >= self.size_x || y >= self.size_y {
            return Err(PatternError::SymmetryIndex {
                x,
                y,
                size_x: self.size_x,
                size_y: self.size_y,
            });
        }
        Ok(x + self.size_x * y)
    }

    pub fn set(
        &mut self,
        x: usize,
        y: usize,
        to_x: usize,
        to_y: usize,
        color_switch: bool,
    ) -> Result<(), PatternError> {
        let i = self.index(x, y)?;
        self.entries[i] = Some(SymmetryEntry {
            x: to_x,
            y: to_y,
            color_switch,
        });
        Ok(())
    }

    pub fn has_key(&self, x: usize, y: usize) -> Result<bool, PatternError> {
        Ok(self.entries[self.index(x, y)?].is_some())
    }

    /// Entry for `(x, y)`. Unset entries are reported like out-of-range ones.
    pub fn get(&self, x: usize, y: usize) -> Result<SymmetryEntry, PatternError> {
        self.entries[self.index(x, y)?].ok_or(PatternError::SymmetryIndex {
            x,
            y,
            size_x: self.size_x,
            size_y: self.size_y,
        })
    }
}

/// A continuation mapped into the canonical pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolvedContinuation {
    pub x: usize,
    pub y: usize,
    pub color: Color,
    pub color_switch: bool,
}

/// The search pattern together with its orbit.
#[derive(Clone, Debug)]
pub struct PatternList {
    pub pattern: Pattern,
    pub fixed_color: bool,
    pub next_move: Option<Color>,
    /// Distinct orientations; `data[0]` is the pattern itself.
    pub data: Vec<Pattern>,
    /// Orientation index for flip `f` (entry `f`) and for flip `f` with
    /// colors exchanged (entry `8 + f`).
    flip_table: [Option<usize>; 16],
    symmetries: Vec<Symmetries>,
    /// Self-symmetry used to remap continuations of the wrong color when
    /// the pattern is color-symmetric and a next move is required.
    special: Option<u8>,
}

impl PatternList {
    pub fn new(
        pattern: Pattern,
        fixed_color: bool,
        next_move: Option<Color>,
    ) -> Result<Self, PatternError> {
        let mut data: Vec<Pattern> = Vec::with_capacity(16);
        let mut flip_table = [None; 16];
        let mut self_symmetries: Vec<(u8, bool)> = Vec::new();
        let mut special = None;

        let mut switched: Vec<Pattern> = Vec::new();
        let mut switched_index = [0usize; 8];

        for f in 0..8u8 {
            let image = pattern.transformed(f, false);
            flip_table[f as usize] = Some(match data.iter().position(|p| *p == image) {
                Some(i) => i,
                None => {
                    data.push(image.clone());
                    data.len() - 1
                }
            });
            if image == pattern {
                self_symmetries.push((f, false));
            }

            if !fixed_color {
                let image = pattern.transformed(f, true);
                switched_index[f as usize] = match switched.iter().position(|p| *p == image) {
                    Some(i) => i,
                    None => {
                        switched.push(image.clone());
                        switched.len() - 1
                    }
                };
                if image == pattern {
                    self_symmetries.push((f, true));
                    if next_move.is_some() {
                        special = Some(inverse_flip(f));
                    }
                }
            }
        }

        if !fixed_color {
            let mut switched_to_data = Vec::with_capacity(switched.len());
            for image in switched {
                match data.iter().position(|p| *p == image) {
                    Some(i) => switched_to_data.push(i),
                    None => {
                        switched_to_data.push(data.len());
                        data.push(image);
                    }
                }
            }
            for f in 0..8 {
                flip_table[8 + f] = Some(switched_to_data[switched_index[f]]);
            }
        }

        let canonical = canonical_symmetries(&pattern, &self_symmetries)?;
        let mut symmetries = Vec::with_capacity(data.len());
        symmetries.push(canonical.clone());
        let (sx, sy) = (pattern.size_x, pattern.size_y);
        for member in data.iter().skip(1) {
            let mut s = Symmetries::new(member.size_x, member.size_y);
            for i in 0..sx {
                for j in 0..sy {
                    let e = canonical.get(i, j)?;
                    s.set(
                        flip_x(member.flip, i, j, sx - 1, sy - 1),
                        flip_y(member.flip, i, j, sx - 1, sy - 1),
                        e.x,
                        e.y,
                        e.color_switch ^ member.color_switch,
                    )?;
                }
            }
            symmetries.push(s);
        }

        log::debug!(
            "pattern orbit: {} orientations, {} self-symmetries",
            data.len(),
            self_symmetries.len()
        );

        Ok(Self {
            pattern,
            fixed_color,
            next_move,
            data,
            flip_table,
            symmetries,
            special,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Orientation produced by flip `f`, with colors exchanged if
    /// `color_switch`. `None` for color-exchanged images when colors are fixed.
    pub fn orientation(&self, f: u8, color_switch: bool) -> Option<usize> {
        self.flip_table[(f % 8) as usize + if color_switch { 8 } else { 0 }]
    }

    /// Orientation matching a stored position: the stored position was
    /// normalized with `stored_flip`, the query with `query_flip`.
    pub fn orientation_for(&self, stored_flip: u8, query_flip: u8, color_switch: bool) -> Option<usize> {
        self.orientation(compose_flips(inverse_flip(stored_flip), query_flip), color_switch)
    }

    /// Whether the orbit contains color-exchanged images distinct from the
    /// plain ones.
    pub fn has_switched_members(&self) -> bool {
        self.data.iter().any(|p| p.color_switch)
    }

    pub fn symmetries(&self, orientation: usize) -> Result<&Symmetries, PatternError> {
        self.symmetries.get(orientation).ok_or(PatternError::OrbitIndex {
            index: orientation,
            len: self.symmetries.len(),
        })
    }

    /// Maps a move at `(x, y)` relative to orientation `orientation` into
    /// the canonical pattern.
    ///
    /// Returns `None` when a next move is required and the continuation
    /// has the wrong color (after using a color-exchanging self-symmetry,
    /// if the pattern has one).
    pub fn resolve_continuation(
        &self,
        orientation: usize,
        x: usize,
        y: usize,
        color: Color,
    ) -> Result<Option<ResolvedContinuation>, PatternError> {
        let e = self.symmetries(orientation)?.get(x, y)?;
        let mut resolved = ResolvedContinuation {
            x: e.x,
            y: e.y,
            color: if e.color_switch { color.opponent() } else { color },
            color_switch: e.color_switch,
        };
        if let Some(next) = self.next_move
            && resolved.color != next
        {
            let Some(sp) = self.special else {
                return Ok(None);
            };
            let (sx, sy) = (self.pattern.size_x, self.pattern.size_y);
            let (rx, ry) = (resolved.x, resolved.y);
            resolved.x = flip_x(sp, rx, ry, sx - 1, sy - 1);
            resolved.y = flip_y(sp, rx, ry, sx - 1, sy - 1);
            resolved.color = resolved.color.opponent();
            resolved.color_switch = !resolved.color_switch;
        }
        Ok(Some(resolved))
    }
}

/// Remapping table of the pattern itself: every point goes to the
/// representative of its class under the self-symmetries, and
/// pre-assigned labels become representatives of their class.
fn canonical_symmetries(
    pattern: &Pattern,
    self_symmetries: &[(u8, bool)],
) -> Result<Symmetries, PatternError> {
    let (sx, sy) = (pattern.size_x, pattern.size_y);
    let mut symm = Symmetries::identity(sx, sy);

    for &(s, c) in self_symmetries {
        let (nsx, nsy) = flipped_size(s, sx, sy);
        let mut step = Symmetries::new(nsx, nsy);
        for i in 0..sx {
            for j in 0..sy {
                let fx = flip_x(s, i, j, sx - 1, sy - 1);
                let fy = flip_y(s, i, j, sx - 1, sy - 1);
                if (i != fx || j != fy) && !step.has_key(fx, fy)? {
                    step.set(i, j, fx, fy, c)?;
                }
            }
        }
        for i in 0..sx {
            for j in 0..sy {
                let e = symm.get(i, j)?;
                if step.has_key(e.x, e.y)? {
                    let t = step.get(e.x, e.y)?;
                    symm.set(i, j, t.x, t.y, e.color_switch ^ t.color_switch)?;
                }
            }
        }
    }

    if pattern.labels.is_some() {
        for i in 0..sx {
            for j in 0..sy {
                let rep = symm.get(i, j)?;
                if (rep.x, rep.y) == (i, j)
                    || pattern.label_at(i, j) == NO_LABEL
                    || pattern.label_at(rep.x, rep.y) != NO_LABEL
                {
                    continue;
                }
                // A labelled point becomes the representative of its class.
                for ii in 0..sx {
                    for jj in 0..sy {
                        let other = symm.get(ii, jj)?;
                        if (other.x, other.y) == (rep.x, rep.y) {
                            symm.set(ii, jj, i, j, other.color_switch)?;
                        }
                    }
                }
                let cs = symm.get(i, j)?.color_switch;
                symm.set(rep.x, rep.y, i, j, cs)?;
                symm.set(i, j, i, j, false)?;
            }
        }
    }
    Ok(symm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    fn corner(grid: &str, sx: usize, sy: usize) -> Pattern {
        Pattern::new(PatternKind::CornerNW, 19, sx, sy, grid).unwrap()
    }

    #[test]
    fn test_asymmetric_corner_has_eight_orientations() {
        // A corner pattern keeps its size only under the flips that move
        // it to another corner; all eight images are distinct.
        let p = corner("XO. ... ...", 3, 3);
        let plist = PatternList::new(p, true, None).unwrap();
        assert_eq!(plist.len(), 8);
        assert_eq!(plist.orientation(0, false), Some(0));
        assert_eq!(plist.orientation(3, true), None);
    }

    #[test]
    fn test_color_switch_doubles_the_orbit() {
        let p = corner("XO. ... ...", 3, 3);
        let plist = PatternList::new(p, false, None).unwrap();
        assert_eq!(plist.len(), 16);
        assert!(plist.has_switched_members());
    }

    #[test]
    fn test_empty_pattern_has_one_image_per_corner() {
        // All-empty corner: images only differ by their anchor.
        let p = corner(".........", 3, 3);
        let plist = PatternList::new(p, false, None).unwrap();
        assert_eq!(plist.len(), 4);
        assert!(!plist.has_switched_members());
        assert_eq!(plist.orientation(4, true), Some(0));
    }

    #[test]
    fn test_orbit_members_are_distinct_and_closed() {
        let p = Pattern::new(PatternKind::Center, 19, 3, 2, "X.O .X.").unwrap();
        let plist = PatternList::new(p, false, None).unwrap();
        for (i, a) in plist.data.iter().enumerate() {
            for b in plist.data.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        for f in 0..8u8 {
            for cs in [false, true] {
                let ind = plist.orientation(f, cs).unwrap();
                assert_eq!(plist.data[ind], plist.pattern.transformed(f, cs));
            }
        }
    }

    #[test]
    fn test_diagonal_symmetry_merges_continuations() {
        // Symmetric about the main diagonal: (2,0) and (0,2) are one class.
        let p = corner("X.. .O. ...", 3, 3);
        let plist = PatternList::new(p, true, None).unwrap();
        let canonical = plist.symmetries(0).unwrap();
        let a = canonical.get(2, 0).unwrap();
        let b = canonical.get(0, 2).unwrap();
        assert_eq!((a.x, a.y), (b.x, b.y));
        assert!(!a.color_switch);
        assert_eq!(canonical.get(1, 1).unwrap(), SymmetryEntry { x: 1, y: 1, color_switch: false });
    }

    #[test]
    fn test_orientation_maps_back_to_canonical_point() {
        let p = corner("XO. ... ...", 3, 3);
        let plist = PatternList::new(p, false, None).unwrap();
        let ind = plist.orientation(1, true).unwrap();
        // Point (2,2) of the pattern sits at (0,2) of the mirrored image.
        let r = plist
            .resolve_continuation(ind, 0, 2, Color::White)
            .unwrap()
            .unwrap();
        assert_eq!((r.x, r.y), (2, 2));
        assert_eq!(r.color, Color::Black);
        assert!(r.color_switch);
    }

    #[test]
    fn test_next_move_filters_wrong_color() {
        let p = corner("XO. ... ...", 3, 3);
        let plist = PatternList::new(p, true, Some(Color::Black)).unwrap();
        assert!(plist.resolve_continuation(0, 2, 2, Color::White).unwrap().is_none());
        assert!(plist.resolve_continuation(0, 2, 2, Color::Black).unwrap().is_some());
    }

    #[test]
    fn test_next_move_uses_color_symmetry() {
        // X at (0,0), O at (1,1) is its own color-exchanged image under
        // the flip (x, y) -> (1 - y, 1 - x).
        let p = Pattern::new(PatternKind::Center, 19, 2, 2, "X. .O").unwrap();
        let plist = PatternList::new(p, false, Some(Color::Black)).unwrap();
        let r = plist
            .resolve_continuation(0, 1, 0, Color::White)
            .unwrap()
            .unwrap();
        assert_eq!(r.color, Color::Black);
        assert!(r.color_switch);
        assert_eq!((r.x, r.y), (1, 0));
    }

    #[test]
    fn test_labels_become_representatives() {
        let p = corner("X.. .O. ...", 3, 3).with_labels("... ... A..").unwrap();
        let plist = PatternList::new(p, true, None).unwrap();
        let canonical = plist.symmetries(0).unwrap();
        let e = canonical.get(2, 0).unwrap();
        assert_eq!((e.x, e.y), (0, 2));
        let e = canonical.get(0, 2).unwrap();
        assert_eq!((e.x, e.y), (0, 2));
    }

    #[test]
    fn test_out_of_range_access() {
        let s = Symmetries::identity(2, 2);
        assert!(matches!(s.get(2, 0), Err(PatternError::SymmetryIndex { .. })));
        let p = corner("X...", 2, 2);
        let plist = PatternList::new(p, true, None).unwrap();
        assert!(matches!(
            plist.resolve_continuation(99, 0, 0, Color::Black),
            Err(PatternError::OrbitIndex { .. })
        ));
    }
}
