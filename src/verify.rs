//! Move-list verifier.
//!
//! Replays the encoded move list of one game and tracks, for every
//! candidate placement, how far the position inside the pattern rectangle
//! is from the pattern. Each candidate keeps a grid of outstanding
//! requirements and a count of unsatisfied points; when the count drops
//! to zero at the end of a node the pattern is on the board. The next
//! move inside the rectangle is the continuation.
//!
//! Requirement grid values:
//!
//! - `0`: satisfied, nothing to watch
//! - `X` / `O`: a stone of that color is missing (counted)
//! - `.`: a stone must disappear (counted)
//! - `x` / `o` / `*`: constraint that is currently satisfied
//!
//! A stone placed on a point that must stay empty ends the candidate,
//! unless the capture bitmap says a stone on that point is captured later
//! in the game.
//!
//! Branch points save the state of all candidates; the end of a
//! variation restores it.

use crate::board::Color;
use crate::constants::*;
use crate::error::PatternError;
use crate::hit::{Candidate, ExtendedMoveNumber, Hit, HitLabel};
use crate::movelist::GameMoves;
use crate::options::SearchOptions;
use crate::pattern::FollowUp;
use crate::symmetry::{PatternList, ResolvedContinuation};

/// A continuation seen while verifying one game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContinuationEvent {
    pub resolved: ResolvedContinuation,
    pub tenuki: bool,
}

/// Everything one game contributes to a search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameVerdict {
    pub hits: Vec<Hit>,
    /// Hits whose occurrence had colors exchanged.
    pub switched: usize,
    pub continuations: Vec<ContinuationEvent>,
}

#[derive(Clone, Debug)]
struct CandidateState {
    orientation: usize,
    x0: usize,
    y0: usize,
    size_x: usize,
    size_y: usize,
    expected: Vec<u8>,
    remaining: i32,
    follow_ups: Vec<FollowUp>,
    follow_index: usize,
    found: Option<ExtendedMoveNumber>,
    found_initial: bool,
    do_not_restore: bool,
    touched: bool,
}

impl CandidateState {
    fn new(plist: &PatternList, c: &Candidate) -> Option<Self> {
        let p = plist.data.get(c.orientation)?;
        let expected: Vec<u8> = p
            .points()
            .iter()
            .map(|&s| if s == EMPTY { 0 } else { s })
            .collect();
        let remaining = expected
            .iter()
            .filter(|&&s| s == STONE_BLACK || s == STONE_WHITE)
            .count() as i32;
        Some(Self {
            orientation: c.orientation,
            x0: c.x,
            y0: c.y,
            size_x: p.size_x,
            size_y: p.size_y,
            expected,
            remaining,
            follow_ups: p.follow_ups.clone(),
            follow_index: 0,
            found: None,
            found_initial: false,
            do_not_restore: false,
            touched: false,
        })
    }

    fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x0 + self.size_x && y >= self.y0 && y < self.y0 + self.size_y
    }

    /// Same placement, starting over at the first follow-up move.
    fn restart(&self, plist: &PatternList) -> Self {
        let mut c = self.clone();
        c.follow_ups = plist
            .data
            .get(self.orientation)
            .map_or_else(|| self.follow_ups.clone(), |p| p.follow_ups.clone());
        c.follow_index = 0;
        c.found_initial = true;
        c.do_not_restore = false;
        c
    }

    fn complete_follow_up(&mut self, counter: &ExtendedMoveNumber) {
        self.follow_index += 1;
        if self.follow_index == self.follow_ups.len() {
            self.found = Some(counter.clone());
        }
    }

    /// Handles a stone placed inside the rectangle. Returns `false` if the
    /// candidate is finished.
    fn place(
        &mut self,
        plist: &PatternList,
        moves: &GameMoves,
        (x, y): (usize, usize),
        color: Color,
        counter: &ExtendedMoveNumber,
        verdict: &mut GameVerdict,
    ) -> Result<bool, PatternError> {
        self.touched = true;
        let (px, py) = (x - self.x0, y - self.y0);

        if let Some(found_at) = &self.found {
            if let Some(r) = plist.resolve_continuation(self.orientation, px, py, color)? {
                let gap = counter
                    .total_move_num()
                    .saturating_sub(found_at.total_move_num());
                if r.color_switch {
                    verdict.switched += 1;
                }
                verdict
                    .hits
                    .push(Hit::new(found_at.clone(), HitLabel::at(r.x, r.y, r.color_switch)));
                verdict.continuations.push(ContinuationEvent {
                    resolved: r,
                    tenuki: gap > TENUKI_GAP,
                });
            }
            return Ok(false);
        }

        let symbol = color.symbol();
        if self.found_initial {
            let Some(next) = self.follow_ups.get(self.follow_index).copied() else {
                return Ok(false);
            };
            if (px, py, symbol) == (next.x, next.y, next.color) {
                self.complete_follow_up(counter);
            } else if self.do_not_restore {
                return Ok(false);
            } else {
                self.follow_index = 0;
                self.found_initial = false;
            }
        }

        let i = px + self.size_x * py;
        let opposite_or_empty = match color {
            Color::Black => WHITE_OR_EMPTY,
            Color::White => BLACK_OR_EMPTY,
        };
        let e = self.expected[i];
        if e == 0 || e == opposite_or_empty {
            if !moves.captured_at(x, y) {
                if self.follow_index == 0 {
                    return Ok(false);
                }
                self.do_not_restore = true;
            } else {
                if e == 0 {
                    self.expected[i] = EMPTY;
                }
                self.remaining += 1;
            }
        } else if e == symbol {
            self.expected[i] = 0;
            self.remaining -= 1;
        }
        Ok(true)
    }

    /// Handles a stone removed inside the rectangle. Returns `false` if the
    /// candidate is finished.
    fn remove(&mut self, (x, y): (usize, usize), color: Color, counter: &ExtendedMoveNumber) -> bool {
        self.touched = true;
        if self.found.is_some() {
            return true;
        }
        let (px, py) = (x - self.x0, y - self.y0);

        if self.found_initial {
            // Consecutive removals may come in any order.
            let mut ii = self.follow_index;
            while ii < self.follow_ups.len()
                && self.follow_ups[ii].color == REMOVED
                && (self.follow_ups[ii].x, self.follow_ups[ii].y) != (px, py)
            {
                ii += 1;
            }
            if ii < self.follow_ups.len() && self.follow_ups[ii].color == REMOVED {
                self.follow_ups.swap(ii, self.follow_index);
                self.complete_follow_up(counter);
            } else if self.do_not_restore {
                return false;
            } else {
                self.follow_index = 0;
                self.found_initial = false;
            }
        }

        let i = px + self.size_x * py;
        let opposite_or_empty = match color {
            Color::Black => WHITE_OR_EMPTY,
            Color::White => BLACK_OR_EMPTY,
        };
        let e = self.expected[i];
        if e == 0 {
            self.expected[i] = color.symbol();
            self.remaining += 1;
        } else if e == opposite_or_empty {
            self.remaining -= 1;
        } else if e == EMPTY {
            self.expected[i] = 0;
            self.remaining -= 1;
        }
        true
    }
}

fn retire_unfinished(slots: &mut [Option<CandidateState>]) {
    for slot in slots.iter_mut() {
        if slot.as_ref().is_some_and(|c| c.found.is_none()) {
            *slot = None;
        }
    }
}

/// Found candidates whose line ended without a continuation.
fn emit_line_end(slots: &[Option<CandidateState>], plist: &PatternList, verdict: &mut GameVerdict) {
    for c in slots.iter().flatten() {
        let Some(found_at) = &c.found else {
            continue;
        };
        let color_switch = plist
            .data
            .get(c.orientation)
            .is_some_and(|p| p.color_switch);
        if color_switch {
            verdict.switched += 1;
        }
        verdict.hits.push(Hit::new(
            found_at.clone(),
            HitLabel::no_continuation(color_switch),
        ));
    }
}

/// Verifies `candidates` against the move list of one game.
pub fn verify_game(
    plist: &PatternList,
    options: &SearchOptions,
    moves: &GameMoves,
    candidates: &[Candidate],
) -> Result<GameVerdict, PatternError> {
    let mut verdict = GameVerdict::default();
    let mut slots: Vec<Option<CandidateState>> = candidates
        .iter()
        .map(|c| CandidateState::new(plist, c))
        .collect();
    let mut counter = ExtendedMoveNumber::new();
    let mut branches: Vec<(Vec<Option<CandidateState>>, ExtendedMoveNumber)> = Vec::new();
    let limit = options.move_limit.saturating_add(1);

    for pair in moves.moves.chunks_exact(2) {
        if counter.total_move_num() == limit {
            retire_unfinished(&mut slots);
        }
        let (a, b) = (pair[0], pair[1]);

        if a & BRANCHPOINT != 0 {
            if options.search_in_variations {
                branches.push((slots.clone(), counter.clone()));
            }
        } else if a & ENDOFVARIATION != 0 {
            if !options.search_in_variations {
                break;
            }
            if plist.next_move.is_none() {
                emit_line_end(&slots, plist, &mut verdict);
            }
            let Some((saved, at)) = branches.pop() else {
                log::warn!("end of variation without branch point");
                break;
            };
            slots = saved;
            counter = at;
            counter.down();
        } else {
            let (x, y) = ((a & COORD_MASK) as usize, (b & COORD_MASK) as usize);
            let color = if b & BLACK != 0 {
                Some(Color::Black)
            } else if b & WHITE != 0 {
                Some(Color::White)
            } else {
                None
            };
            let mut node_marker = true;
            if let Some(color) = color {
                node_marker = false;
                let removal = b & REMOVE != 0;
                for slot in slots.iter_mut() {
                    let Some(c) = slot.as_mut() else {
                        continue;
                    };
                    if !c.contains(x, y) {
                        continue;
                    }
                    let keep = if removal {
                        c.remove((x, y), color, &counter)
                    } else {
                        c.place(plist, moves, (x, y), color, &counter, &mut verdict)?
                    };
                    if !keep {
                        *slot = None;
                    }
                }
            }

            if a & ENDOFNODE != 0 {
                let mut spawned = Vec::new();
                for c in slots.iter_mut().flatten() {
                    if (node_marker || c.touched) && c.remaining == 0 && c.found.is_none() {
                        if c.follow_ups.is_empty() {
                            c.found = Some(counter.clone());
                        } else if !c.found_initial {
                            c.found_initial = true;
                        } else if !c.do_not_restore && c.follow_index > 0 {
                            // The pattern reappeared while its follow-up
                            // was being replayed.
                            spawned.push(c.restart(plist));
                        }
                    }
                    c.touched = false;
                }
                slots.extend(spawned.into_iter().map(Some));
                counter.next();
            }
        }

        if branches.is_empty() && slots.iter().all(Option::is_none) {
            break;
        }
    }

    if plist.next_move.is_none() {
        emit_line_end(&slots, plist, &mut verdict);
    }
    verdict.hits.sort();
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameNode, GameProcessor, GameTree, dispatch};
    use crate::movelist::MoveListIndex;
    use crate::pattern::{Pattern, PatternKind};

    fn encode(tree: &GameTree) -> GameMoves {
        let mut index = MoveListIndex::new();
        index.begin_game(1);
        dispatch(&mut index, &tree.events(true).unwrap());
        index.end_game(true);
        index.get(1).cloned().unwrap()
    }

    fn all_placements(plist: &PatternList) -> Vec<Candidate> {
        let mut out = Vec::new();
        for (i, p) in plist.data.iter().enumerate() {
            for y in p.top..=p.bottom {
                for x in p.left..=p.right {
                    out.push(Candidate::new(x, y, i));
                }
            }
        }
        out
    }

    fn fixed(pattern: Pattern) -> PatternList {
        PatternList::new(pattern, true, None).unwrap()
    }

    #[test]
    fn test_corner_hit_with_continuation() {
        // B(0,0), W(1,0), B(1,1); after an exchange elsewhere Black plays (0,1).
        let tree = GameTree::from_moves(9, &[(0, 0), (1, 0), (1, 1), (5, 5), (0, 1)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "XO .X").unwrap();
        let plist = fixed(p);
        let cands = vec![Candidate::new(0, 0, 0)];
        let v = verify_game(&plist, &SearchOptions::default(), &encode(&tree), &cands).unwrap();
        assert_eq!(v.hits.len(), 1);
        assert_eq!(v.hits[0].position.as_slice(), &[3]);
        assert_eq!(v.hits[0].label, HitLabel::at(0, 1, false));
        let c = v.continuations[0];
        assert_eq!(c.resolved.color, Color::Black);
        // Found after move 3, continued at move 5.
        assert!(!c.tenuki);
    }

    #[test]
    fn test_tenuki_flag() {
        let tree = GameTree::from_moves(
            9,
            &[(0, 0), (8, 8), (7, 7), (6, 6), (5, 5), (1, 1)],
        );
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let plist = fixed(p);
        let v = verify_game(
            &plist,
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert_eq!(v.hits.len(), 1);
        assert!(v.continuations[0].tenuki);
    }

    #[test]
    fn test_line_end_without_continuation() {
        let tree = GameTree::from_moves(9, &[(0, 0), (8, 8)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let v = verify_game(
            &fixed(p),
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert_eq!(v.hits, vec![Hit::new(ExtendedMoveNumber::from_parts(vec![1]), HitLabel::no_continuation(false))]);
        assert!(v.continuations.is_empty());
    }

    #[test]
    fn test_stone_on_empty_point_ends_candidate() {
        // The pattern needs (1,1) empty; Black plays there and it is never captured.
        let tree = GameTree::from_moves(9, &[(1, 1), (8, 8), (0, 0)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let v = verify_game(
            &fixed(p),
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert!(v.hits.is_empty());
    }

    #[test]
    fn test_captured_stone_keeps_candidate_alive() {
        // W(0,0) lands on a point that must be empty, but is captured later.
        let mut tree = GameTree::new(9);
        tree.add_line(
            &[],
            vec![
                GameNode::play(1, 0, Color::Black),
                GameNode::play(0, 0, Color::White),
                GameNode::play(0, 1, Color::Black),
            ],
        );
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, ".X X.").unwrap();
        let v = verify_game(
            &fixed(p),
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert_eq!(v.hits.len(), 1);
        assert_eq!(v.hits[0].position.as_slice(), &[3]);
    }

    #[test]
    fn test_variation_hit_reports_branch_position() {
        // Main line never completes the pattern; the alternative to move 2 does.
        let mut tree = GameTree::from_moves(9, &[(0, 0), (8, 8), (7, 7)]);
        tree.add_line(
            &[0],
            vec![GameNode::play(1, 0, Color::White), GameNode::play(4, 4, Color::Black)],
        );
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "XO ..").unwrap();
        let plist = fixed(p);
        let moves = encode(&tree);
        let v = verify_game(&plist, &SearchOptions::default(), &moves, &[Candidate::new(0, 0, 0)])
            .unwrap();
        assert_eq!(v.hits.len(), 1);
        assert_eq!(v.hits[0].position.as_slice(), &[2, 1]);
        assert_eq!(v.hits[0].label, HitLabel::no_continuation(false));

        let main_line = SearchOptions {
            search_in_variations: false,
            ..Default::default()
        };
        let v = verify_game(&plist, &main_line, &moves, &[Candidate::new(0, 0, 0)]).unwrap();
        assert!(v.hits.is_empty());
    }

    #[test]
    fn test_move_limit() {
        let tree = GameTree::from_moves(9, &[(8, 8), (7, 7), (0, 0), (6, 6)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let plist = fixed(p);
        let moves = encode(&tree);
        let limited = SearchOptions {
            move_limit: 2,
            ..Default::default()
        };
        assert!(verify_game(&plist, &limited, &moves, &[Candidate::new(0, 0, 0)])
            .unwrap()
            .hits
            .is_empty());
        let enough = SearchOptions {
            move_limit: 3,
            ..Default::default()
        };
        assert_eq!(
            verify_game(&plist, &enough, &moves, &[Candidate::new(0, 0, 0)])
                .unwrap()
                .hits
                .len(),
            1
        );
    }

    #[test]
    fn test_follow_up_sequence() {
        // Pattern: empty 2x2 corner at the start, followed by B(0,0) then W(1,1).
        let tree = GameTree::from_moves(9, &[(0, 0), (1, 1), (8, 8)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, ".. ..")
            .unwrap()
            .with_follow_ups(vec![
                FollowUp::new(0, 0, Color::Black),
                FollowUp::new(1, 1, Color::White),
            ])
            .unwrap();
        let v = verify_game(
            &fixed(p),
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert_eq!(v.hits.len(), 1);
        assert_eq!(v.hits[0].position.as_slice(), &[2]);
    }

    #[test]
    fn test_follow_up_with_capture() {
        // W(0,0) sits in the corner; B(0,1) captures it.
        let mut tree = GameTree::new(9);
        tree.root.setup = vec![(0, 0, Color::White), (1, 0, Color::Black)];
        tree.add_line(&[], vec![GameNode::play(0, 1, Color::Black)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "OX ..")
            .unwrap()
            .with_follow_ups(vec![FollowUp::new(0, 1, Color::Black), FollowUp::removal(0, 0)])
            .unwrap();
        let v = verify_game(
            &fixed(p),
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        assert_eq!(v.hits.len(), 1);
    }

    #[test]
    fn test_next_move_restricts_continuations() {
        let tree = GameTree::from_moves(9, &[(0, 0), (1, 1)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let plist = PatternList::new(p, true, Some(Color::Black)).unwrap();
        let v = verify_game(
            &plist,
            &SearchOptions::default(),
            &encode(&tree),
            &[Candidate::new(0, 0, 0)],
        )
        .unwrap();
        // White continued, and without a continuation nothing is reported.
        assert!(v.hits.is_empty());
    }

    #[test]
    fn test_color_switched_occurrence() {
        // White stone in the corner matches the color-exchanged pattern.
        let tree = GameTree::from_moves(9, &[(4, 4), (0, 0), (1, 1)]);
        let p = Pattern::new(PatternKind::CornerNW, 9, 2, 2, "X. ..").unwrap();
        let plist = PatternList::new(p, false, None).unwrap();
        let v = verify_game(
            &plist,
            &SearchOptions::default(),
            &encode(&tree),
            &all_placements(&plist),
        )
        .unwrap();
        assert_eq!(v.hits.len(), 1);
        assert_eq!(v.switched, 1);
        let c = v.continuations[0].resolved;
        // Black's reply becomes White's move in pattern colors.
        assert_eq!(c.color, Color::White);
        assert_eq!((c.x, c.y), (1, 1));
    }
}
