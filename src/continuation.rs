//! Continuation statistics.
//!
//! Every hit that is followed by a move inside the pattern contributes to
//! the [`Continuation`] at the canonical point of that move. After a search
//! the points with continuations receive letters, most frequent first.

use crate::board::Color;
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::CodecError;
use crate::pattern::Pattern;
use crate::symmetry::ResolvedContinuation;

/// Date bucket of a game date, if it falls into the profiled range.
pub fn date_bucket(date: i32) -> Option<usize> {
    let year = date / 12;
    if (DATE_PROFILE_START..DATE_PROFILE_END).contains(&year) {
        Some((year - DATE_PROFILE_START) as usize)
    } else {
        None
    }
}

/// Statistics of one continuation point.
///
/// Win and loss counters are from Black's point of view after mapping
/// the game's colors onto the pattern: `wins_b` counts games won by
/// (canonical) Black where Black continued here, `wins_w` the same for
/// White continuations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Continuation {
    pub x: usize,
    pub y: usize,
    pub black: u32,
    pub white: u32,
    pub tenuki_black: u32,
    pub tenuki_white: u32,
    pub wins_b: u32,
    pub losses_b: u32,
    pub wins_w: u32,
    pub losses_w: u32,
    pub label: u8,
    pub dates_black: Vec<u32>,
    pub dates_white: Vec<u32>,
}

impl Continuation {
    pub fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            black: 0,
            white: 0,
            tenuki_black: 0,
            tenuki_white: 0,
            wins_b: 0,
            losses_b: 0,
            wins_w: 0,
            losses_w: 0,
            label: NO_LABEL,
            dates_black: vec![0; DATE_BUCKETS],
            dates_white: vec![0; DATE_BUCKETS],
        }
    }

    pub fn total(&self) -> u32 {
        self.black + self.white
    }

    pub fn record(
        &mut self,
        color: Color,
        color_switch: bool,
        tenuki: bool,
        winner: Option<Color>,
        date: i32,
    ) {
        let canonical_black_won = match winner {
            Some(Color::Black) => Some(!color_switch),
            Some(Color::White) => Some(color_switch),
            None => None,
        };
        let bucket = date_bucket(date);
        match color {
            Color::Black => {
                self.black += 1;
                if tenuki {
                    self.tenuki_black += 1;
                }
                match canonical_black_won {
                    Some(true) => self.wins_b += 1,
                    Some(false) => self.losses_b += 1,
                    None => {}
                }
                if let Some(b) = bucket {
                    self.dates_black[b] += 1;
                }
            }
            Color::White => {
                self.white += 1;
                if tenuki {
                    self.tenuki_white += 1;
                }
                match canonical_black_won {
                    Some(true) => self.wins_w += 1,
                    Some(false) => self.losses_w += 1,
                    None => {}
                }
                if let Some(b) = bucket {
                    self.dates_white[b] += 1;
                }
            }
        }
    }

    /// Adds the counts of `other` into `self`.
    pub fn add(&mut self, other: &Continuation) {
        self.black += other.black;
        self.white += other.white;
        self.tenuki_black += other.tenuki_black;
        self.tenuki_white += other.tenuki_white;
        self.wins_b += other.wins_b;
        self.losses_b += other.losses_b;
        self.wins_w += other.wins_w;
        self.losses_w += other.losses_w;
        for (a, b) in self.dates_black.iter_mut().zip(&other.dates_black) {
            *a += b;
        }
        for (a, b) in self.dates_white.iter_mut().zip(&other.dates_white) {
            *a += b;
        }
    }

    fn dates(&self, color: Option<Color>) -> Vec<u32> {
        match color {
            Some(Color::Black) => self.dates_black.clone(),
            Some(Color::White) => self.dates_white.clone(),
            None => self
                .dates_black
                .iter()
                .zip(&self.dates_white)
                .map(|(b, w)| b + w)
                .collect(),
        }
    }

    /// First year with a continuation of `color` (both colors if `None`), -1 if none.
    pub fn earliest(&self, color: Option<Color>) -> i32 {
        self.dates(color)
            .iter()
            .position(|&n| n > 0)
            .map_or(-1, |i| i as i32 + DATE_PROFILE_START)
    }

    /// Last year with a continuation of `color` (both colors if `None`), -1 if none.
    pub fn latest(&self, color: Option<Color>) -> i32 {
        self.dates(color)
            .iter()
            .rposition(|&n| n > 0)
            .map_or(-1, |i| i as i32 + DATE_PROFILE_START)
    }

    /// Mean year of the continuation, each game weighted by the inverse of
    /// the number of games in its year. 0 without continuations, -1 if
    /// none of them is dated.
    pub fn average_date(&self, color: Option<Color>, games_per_year: &[u32]) -> f64 {
        if self.count(color) == 0 {
            return 0.0;
        }
        let dates = self.dates(color);
        let mut weight = 0.0;
        let mut sum = 0.0;
        for (i, &n) in dates.iter().enumerate() {
            let all = games_per_year.get(i).copied().unwrap_or(0);
            if n == 0 || all == 0 {
                continue;
            }
            let w = n as f64 / all as f64;
            weight += w;
            sum += w * (i as f64 + DATE_PROFILE_START as f64);
        }
        if weight == 0.0 { -1.0 } else { sum / weight }
    }

    /// Relative frequencies `d_i / all_i` and their root mean square over
    /// the years in which the continuation was played.
    fn relative_profile(&self, color: Option<Color>, games_per_year: &[u32]) -> (Vec<f64>, f64) {
        let dates = self.dates(color);
        let mut rel = vec![0.0; dates.len()];
        let mut sq = 0.0;
        let mut years = 0usize;
        for (i, &n) in dates.iter().enumerate() {
            let all = games_per_year.get(i).copied().unwrap_or(0);
            if all == 0 || n == 0 {
                continue;
            }
            rel[i] = n as f64 / all as f64;
            sq += rel[i] * rel[i];
            years += 1;
        }
        let threshold = if years == 0 {
            0.0
        } else {
            (sq / years as f64).sqrt()
        };
        (rel, threshold)
    }

    /// First year in which the continuation reached its typical relative
    /// frequency. 0 without continuations, -1 if no year qualifies.
    pub fn became_popular(&self, color: Option<Color>, games_per_year: &[u32]) -> i32 {
        if self.count(color) == 0 {
            return 0;
        }
        let (rel, threshold) = self.relative_profile(color, games_per_year);
        rel.iter()
            .position(|&r| r > 0.0 && r >= threshold)
            .map_or(-1, |i| i as i32 + DATE_PROFILE_START)
    }

    /// Last year in which the continuation was at its typical relative
    /// frequency. 0 without continuations, -1 if no year qualifies.
    pub fn became_unpopular(&self, color: Option<Color>, games_per_year: &[u32]) -> i32 {
        if self.count(color) == 0 {
            return 0;
        }
        let (rel, threshold) = self.relative_profile(color, games_per_year);
        rel.iter()
            .rposition(|&r| r > 0.0 && r >= threshold)
            .map_or(-1, |i| i as i32 + DATE_PROFILE_START)
    }

    fn count(&self, color: Option<Color>) -> u32 {
        match color {
            Some(Color::Black) => self.black,
            Some(Color::White) => self.white,
            None => self.total(),
        }
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        for v in [
            self.x as u32,
            self.y as u32,
            self.black,
            self.white,
            self.tenuki_black,
            self.tenuki_white,
            self.wins_b,
            self.losses_b,
            self.wins_w,
            self.losses_w,
        ] {
            w.put_int(v as i32);
        }
        w.put_char(self.label);
        for &d in &self.dates_black {
            w.put_int(d as i32);
        }
        for &d in &self.dates_white {
            w.put_int(d as i32);
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        fn count(r: &mut SnapshotReader, what: &'static str) -> Result<u32, CodecError> {
            let v = r.get_int()?;
            u32::try_from(v).map_err(|_| CodecError::InvalidValue {
                what,
                value: v as i64,
            })
        }
        let x = count(r, "continuation x")? as usize;
        let y = count(r, "continuation y")? as usize;
        let mut c = Continuation::new(x, y);
        c.black = count(r, "B")?;
        c.white = count(r, "W")?;
        c.tenuki_black = count(r, "tB")?;
        c.tenuki_white = count(r, "tW")?;
        c.wins_b = count(r, "wB")?;
        c.losses_b = count(r, "lB")?;
        c.wins_w = count(r, "wW")?;
        c.losses_w = count(r, "lW")?;
        c.label = r.get_char()?;
        for i in 0..DATE_BUCKETS {
            c.dates_black[i] = count(r, "date")?;
        }
        for i in 0..DATE_BUCKETS {
            c.dates_white[i] = count(r, "date")?;
        }
        Ok(c)
    }
}

/// Per-point continuation statistics of one search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Continuations {
    pub size_x: usize,
    pub size_y: usize,
    points: Vec<Continuation>,
}

impl Continuations {
    pub fn new(size_x: usize, size_y: usize) -> Self {
        let mut points = Vec::with_capacity(size_x * size_y);
        for j in 0..size_y {
            for i in 0..size_x {
                points.push(Continuation::new(i, j));
            }
        }
        Self {
            size_x,
            size_y,
            points,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Continuation> {
        if x >= self.size_x || y >= self.size_y {
            return None;
        }
        self.points.get(x + self.size_x * y)
    }

    /// Points with at least one continuation.
    pub fn played(&self) -> impl Iterator<Item = &Continuation> {
        self.points.iter().filter(|c| c.total() > 0)
    }

    /// Records one continuation of a hit in a game with the given result and date.
    pub fn record(
        &mut self,
        c: &ResolvedContinuation,
        tenuki: bool,
        winner: Option<Color>,
        date: i32,
    ) {
        if c.x >= self.size_x || c.y >= self.size_y {
            log::warn!("continuation ({}, {}) outside the pattern", c.x, c.y);
            return;
        }
        let i = c.x + self.size_x * c.y;
        self.points[i].record(c.color, c.color_switch, tenuki, winner, date);
    }

    pub fn add(&mut self, other: &Continuations) {
        for (a, b) in self.points.iter_mut().zip(&other.points) {
            a.add(b);
        }
    }

    /// Hands out labels: pre-assigned pattern labels first, then the
    /// remaining letters to the most frequent continuations. Returns the
    /// label grid (`.` for unlabelled points).
    pub fn assign_labels(&mut self, pattern: &Pattern) -> Vec<u8> {
        const PENDING: u8 = b'?';
        let mut labels: Vec<u8> = self
            .points
            .iter()
            .map(|c| if c.total() > 0 { PENDING } else { NO_LABEL })
            .collect();
        let mut alphabet: Vec<u8> = LABEL_ALPHABET.bytes().collect();

        if let Some(preset) = &pattern.labels {
            for (i, &l) in preset.iter().enumerate().take(labels.len()) {
                if l != NO_LABEL {
                    labels[i] = l;
                    alphabet.retain(|&a| a != l);
                }
            }
        }

        let mut letters = alphabet.into_iter();
        loop {
            let mut best: Option<usize> = None;
            for (i, &l) in labels.iter().enumerate() {
                if l != PENDING {
                    continue;
                }
                if best.is_none_or(|b| self.points[i].total() > self.points[b].total()) {
                    best = Some(i);
                }
            }
            let Some(i) = best else {
                break;
            };
            match letters.next() {
                Some(letter) => labels[i] = letter,
                None => break,
            }
        }

        for l in labels.iter_mut() {
            if *l == PENDING {
                *l = NO_LABEL;
            }
        }
        for (c, &l) in self.points.iter_mut().zip(&labels) {
            c.label = l;
        }
        labels
    }

    pub fn write_snapshot(&self, w: &mut SnapshotWriter) {
        w.put_int(self.size_x as i32);
        w.put_int(self.size_y as i32);
        for c in &self.points {
            c.write_snapshot(w);
        }
    }

    pub fn read_snapshot(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let size_x = r.get_len()?;
        let size_y = r.get_len()?;
        if size_x > MAX_BOARDSIZE || size_y > MAX_BOARDSIZE {
            return Err(CodecError::InvalidValue {
                what: "continuation grid size",
                value: size_x.max(size_y) as i64,
            });
        }
        let mut points = Vec::with_capacity(size_x * size_y);
        for _ in 0..size_x * size_y {
            points.push(Continuation::read_snapshot(r)?);
        }
        Ok(Self {
            size_x,
            size_y,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    fn resolved(x: usize, y: usize, color: Color, color_switch: bool) -> ResolvedContinuation {
        ResolvedContinuation {
            x,
            y,
            color,
            color_switch,
        }
    }

    #[test]
    fn test_record_counts_and_results() {
        let mut c = Continuations::new(3, 3);
        let date = 1990 * 12;
        c.record(&resolved(1, 1, Color::Black, false), false, Some(Color::Black), date);
        c.record(&resolved(1, 1, Color::Black, true), true, Some(Color::Black), date);
        c.record(&resolved(1, 1, Color::White, false), false, Some(Color::White), date);
        c.record(&resolved(1, 1, Color::White, false), false, None, 0);
        let p = c.get(1, 1).unwrap();
        assert_eq!((p.black, p.white), (2, 2));
        assert_eq!(p.tenuki_black, 1);
        assert_eq!((p.wins_b, p.losses_b), (1, 1));
        assert_eq!((p.wins_w, p.losses_w), (0, 1));
        assert_eq!(p.dates_black[390], 2);
        assert_eq!(p.dates_white[390], 1);
    }

    #[test]
    fn test_dates_outside_profile_are_ignored() {
        let mut c = Continuation::new(0, 0);
        c.record(Color::Black, false, false, None, 1599 * 12 + 11);
        c.record(Color::Black, false, false, None, 2020 * 12);
        assert_eq!(c.black, 2);
        assert!(c.dates_black.iter().all(|&n| n == 0));
        assert_eq!(c.earliest(None), -1);
    }

    #[test]
    fn test_labels_by_frequency() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 2, 2, "....").unwrap();
        let mut c = Continuations::new(2, 2);
        for _ in 0..3 {
            c.record(&resolved(1, 0, Color::Black, false), false, None, 0);
        }
        c.record(&resolved(0, 1, Color::White, false), false, None, 0);
        c.record(&resolved(1, 1, Color::White, false), false, None, 0);
        let labels = c.assign_labels(&p);
        assert_eq!(labels, b".ABC".to_vec());
        assert_eq!(c.get(1, 0).unwrap().label, b'A');
    }

    #[test]
    fn test_preset_labels_are_kept() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 2, 2, "....")
            .unwrap()
            .with_labels("A...")
            .unwrap();
        let mut c = Continuations::new(2, 2);
        c.record(&resolved(1, 1, Color::Black, false), false, None, 0);
        let labels = c.assign_labels(&p);
        assert_eq!(labels, b"A..B".to_vec());
    }

    #[test]
    fn test_date_statistics() {
        let mut per_year = vec![0u32; DATE_BUCKETS];
        per_year[350] = 10;
        per_year[380] = 2;
        per_year[400] = 4;
        let mut c = Continuation::new(0, 0);
        c.record(Color::Black, false, false, None, 1950 * 12);
        c.record(Color::White, false, false, None, 1980 * 12);
        c.record(Color::White, false, false, None, 1980 * 12 + 5);
        c.record(Color::Black, false, false, None, 2000 * 12);

        assert_eq!(c.earliest(None), 1950);
        assert_eq!(c.latest(None), 2000);
        assert_eq!(c.earliest(Some(Color::White)), 1980);
        assert_eq!(c.latest(Some(Color::White)), 1980);

        // Weights: 0.1 at 1950, 1.0 at 1980, 0.25 at 2000.
        let avg = c.average_date(None, &per_year);
        let expected = (0.1 * 1950.0 + 1.0 * 1980.0 + 0.25 * 2000.0) / 1.35;
        assert!((avg - expected).abs() < 1e-9);

        assert_eq!(c.became_popular(None, &per_year), 1980);
        assert_eq!(c.became_unpopular(None, &per_year), 1980);
        assert_eq!(Continuation::new(0, 0).became_popular(None, &per_year), 0);
    }

    #[test]
    fn test_add_merges() {
        let mut a = Continuation::new(0, 0);
        a.record(Color::Black, false, true, Some(Color::Black), 1990 * 12);
        let mut b = Continuation::new(0, 0);
        b.record(Color::Black, false, false, Some(Color::White), 1990 * 12);
        a.add(&b);
        assert_eq!(a.black, 2);
        assert_eq!(a.tenuki_black, 1);
        assert_eq!((a.wins_b, a.losses_b), (1, 1));
        assert_eq!(a.dates_black[390], 2);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut c = Continuations::new(2, 1);
        c.record(&resolved(1, 0, Color::White, true), true, Some(Color::Black), 1975 * 12);
        let p = Pattern::new(PatternKind::CornerNW, 19, 2, 1, "..").unwrap();
        c.assign_labels(&p);
        let mut w = SnapshotWriter::new();
        c.write_snapshot(&mut w);
        let bytes = w.into_bytes();
        let back = Continuations::read_snapshot(&mut SnapshotReader::new(&bytes)).unwrap();
        assert_eq!(back, c);
    }
}
