//! Hash indexes over the positions of all games.
//!
//! [`HashStore`] keeps postings on disk in two files: a records file with,
//! per key in ascending order, a count followed by `(game id, payload)`
//! entries, and a key file with the sorted `(key, offset)` table that is
//! loaded at open and binary-searched on lookup. New postings collect in
//! memory until [`HashStore::rebuild`] merges them into the files.
//!
//! [`FullBoardIndex`] hashes whole-board positions up to a stone ceiling,
//! [`CornerIndex`] hashes the four corner squares. Both store the flip
//! that normalized each position so that a hit can be mapped back to an
//! orientation of the search pattern.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::board::{Color, Point};
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::error::{CodecError, StorageError};
use crate::game::GameProcessor;
use crate::hash::{HashRegion, QueryKey, region_key};
use crate::hit::{Candidate, ExtendedMoveNumber, insert_if_new};
use crate::pattern::Pattern;
use crate::symmetry::PatternList;

/// Payload stored with each `(key, game id)` pair.
pub trait Posting: Clone + Sized {
    fn write(&self, w: &mut SnapshotWriter);
    fn read(r: &mut SnapshotReader) -> Result<Self, CodecError>;
}

// =============================================================================
// HashStore
// =============================================================================

pub struct HashStore<P> {
    records_path: PathBuf,
    keys_path: PathBuf,
    records: File,
    records_len: u64,
    keys: Vec<(i64, u64)>,
    pending: Vec<(i64, i32, P)>,
}

impl<P: Posting> HashStore<P> {
    /// Opens (or creates) `<name>.db` and `<name>.keys` in `dir`.
    pub fn open(dir: &Path, name: &str) -> Result<Self, StorageError> {
        let records_path = dir.join(format!("{name}.db"));
        let keys_path = dir.join(format!("{name}.keys"));
        let records = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&records_path)
            .map_err(|e| StorageError::io(&records_path, e))?;
        let records_len = records
            .metadata()
            .map_err(|e| StorageError::io(&records_path, e))?
            .len();
        let keys = if keys_path.exists() {
            read_keys(&keys_path, records_len)?
        } else {
            Vec::new()
        };
        log::debug!("opened {}: {} keys", records_path.display(), keys.len());
        Ok(Self {
            records_path,
            keys_path,
            records,
            records_len,
            keys,
            pending: Vec::new(),
        })
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn insert(&mut self, key: i64, game_id: i32, posting: P) {
        self.pending.push((key, game_id, posting));
    }

    /// Drops uncommitted postings.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Committed postings of `key`.
    pub fn lookup(&self, key: i64) -> Result<Vec<(i32, P)>, StorageError> {
        match self.keys.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(i) => self.read_postings(i),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn read_postings(&self, i: usize) -> Result<Vec<(i32, P)>, StorageError> {
        let start = self.keys[i].1;
        let end = self.keys.get(i + 1).map_or(self.records_len, |&(_, o)| o);
        let mut buf = vec![0u8; end.saturating_sub(start) as usize];
        let mut file = &self.records;
        file.seek(SeekFrom::Start(start))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| StorageError::io(&self.records_path, e))?;
        let mut r = SnapshotReader::new(&buf);
        let n = r.get_len()?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let game_id = r.get_int()?;
            out.push((game_id, P::read(&mut r)?));
        }
        Ok(out)
    }

    /// Merges pending postings into the files, rewriting both.
    pub fn rebuild(&mut self) -> Result<(), StorageError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut all: BTreeMap<i64, Vec<(i32, P)>> = BTreeMap::new();
        for i in 0..self.keys.len() {
            let key = self.keys[i].0;
            let postings = self.read_postings(i)?;
            all.entry(key).or_default().extend(postings);
        }
        let added = self.pending.len();
        for (key, game_id, posting) in std::mem::take(&mut self.pending) {
            all.entry(key).or_default().push((game_id, posting));
        }

        let mut w = SnapshotWriter::new();
        let mut keys = Vec::with_capacity(all.len());
        for (key, mut postings) in all {
            postings.sort_by_key(|&(game_id, _)| game_id);
            keys.push((key, w.len() as u64));
            w.put_int(postings.len() as i32);
            for (game_id, posting) in &postings {
                w.put_int(*game_id);
                posting.write(&mut w);
            }
        }
        if w.len() > i32::MAX as usize {
            return Err(StorageError::CorruptIndex {
                path: self.records_path.clone(),
                reason: format!("records file of {} bytes exceeds offset range", w.len()),
            });
        }

        let path = &self.records_path;
        self.records
            .set_len(0)
            .and_then(|_| self.records.seek(SeekFrom::Start(0)))
            .and_then(|_| self.records.write_all(w.as_bytes()))
            .and_then(|_| self.records.flush())
            .map_err(|e| StorageError::io(path, e))?;
        self.records_len = w.len() as u64;

        let mut kw = SnapshotWriter::with_capacity(8 + 12 * keys.len());
        kw.put_int64(keys.len() as i64);
        for &(key, offset) in &keys {
            kw.put_int64(key);
            kw.put_int(offset as i32);
        }
        fs::write(&self.keys_path, kw.as_bytes()).map_err(|e| StorageError::io(&self.keys_path, e))?;

        log::info!(
            "rebuilt {}: {} keys, {} new postings, {} bytes",
            self.records_path.display(),
            keys.len(),
            added,
            self.records_len
        );
        self.keys = keys;
        Ok(())
    }
}

fn read_keys(path: &Path, records_len: u64) -> Result<Vec<(i64, u64)>, StorageError> {
    let corrupt = |reason: String| StorageError::CorruptIndex {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let mut r = SnapshotReader::new(&bytes);
    let n = r.get_int64()?;
    if n < 0 {
        return Err(corrupt(format!("negative key count {n}")));
    }
    let mut keys: Vec<(i64, u64)> = Vec::with_capacity((n as usize).min(bytes.len() / 12));
    for _ in 0..n {
        let key = r.get_int64()?;
        let offset = r.get_int()?;
        if offset < 0 || offset as u64 > records_len {
            return Err(corrupt(format!("offset {offset} outside records file")));
        }
        if let Some(&(prev_key, prev_offset)) = keys.last()
            && (prev_key >= key || prev_offset > offset as u64)
        {
            return Err(corrupt(format!("keys out of order at {key}")));
        }
        keys.push((key, offset as u64));
    }
    Ok(keys)
}

// =============================================================================
// Full-board index
// =============================================================================

/// A full-board position of a game and what followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullBoardPosting {
    /// Flip that normalized the position.
    pub flip: u8,
    /// Next stone placed, in game coordinates.
    pub continuation: Option<(u8, u8, Color)>,
    pub move_number: ExtendedMoveNumber,
}

impl Posting for FullBoardPosting {
    fn write(&self, w: &mut SnapshotWriter) {
        w.put_int((self.flip as i32) << 16);
        let parts = self.move_number.as_slice();
        let mut blob = Vec::with_capacity(7 + 2 * parts.len());
        match self.continuation {
            Some((x, y, color)) => blob.extend_from_slice(&[x, y, color.letter() as u8]),
            None => blob.extend_from_slice(&[NO_CONT, NO_CONT, NO_CONT]),
        }
        blob.extend_from_slice(&[0, 0]);
        blob.extend_from_slice(&(parts.len() as u16).to_be_bytes());
        for &n in parts {
            blob.extend_from_slice(&(n as u16).to_be_bytes());
        }
        w.put_bytes(&blob);
    }

    fn read(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let v = r.get_int()?;
        let flip = v >> 16;
        if !(0..8).contains(&flip) {
            return Err(CodecError::InvalidValue {
                what: "flip",
                value: flip as i64,
            });
        }
        let blob = r.get_bytes()?;
        let invalid = |what| CodecError::InvalidValue {
            what,
            value: blob.len() as i64,
        };
        if blob.len() < 7 {
            return Err(invalid("full-board posting"));
        }
        let continuation = if blob[2] == NO_CONT {
            None
        } else {
            let color = Color::from_letter(blob[2]).ok_or(invalid("continuation color"))?;
            Some((blob[0], blob[1], color))
        };
        let n = u16::from_be_bytes([blob[5], blob[6]]) as usize;
        if blob.len() != 7 + 2 * n {
            return Err(invalid("move number"));
        }
        let parts = blob[7..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]) as u32)
            .collect();
        Ok(Self {
            flip: flip as u8,
            continuation,
            move_number: ExtendedMoveNumber::from_parts(parts),
        })
    }
}

/// A stored full-board position matching the search pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullBoardMatch {
    pub game_id: i32,
    /// Orientation of the search pattern the position equals.
    pub orientation: usize,
    pub posting: FullBoardPosting,
}

pub struct FullBoardIndex {
    boardsize: usize,
    max_stones: usize,
    store: HashStore<FullBoardPosting>,
    region: HashRegion,
    game_id: Option<i32>,
    move_number: ExtendedMoveNumber,
    /// Positions waiting for their continuation.
    awaiting: Vec<(i64, u8, ExtendedMoveNumber)>,
    branches: Vec<(Vec<(i64, u8, ExtendedMoveNumber)>, ExtendedMoveNumber)>,
    postings: Vec<(i64, FullBoardPosting)>,
}

impl FullBoardIndex {
    pub fn open(dir: &Path, boardsize: usize, max_stones: usize) -> Result<Self, StorageError> {
        Ok(Self {
            boardsize,
            max_stones,
            store: HashStore::open(dir, "hash_full")?,
            region: HashRegion::full_board(boardsize),
            game_id: None,
            move_number: ExtendedMoveNumber::new(),
            awaiting: Vec::new(),
            branches: Vec::new(),
            postings: Vec::new(),
        })
    }

    pub fn commit(&mut self) -> Result<(), StorageError> {
        self.store.rebuild()
    }

    pub fn has_pending(&self) -> bool {
        self.store.has_pending()
    }

    pub fn discard_pending(&mut self) {
        self.store.discard_pending();
    }

    fn flush(&mut self, continuation: Option<(u8, u8, Color)>) {
        for (key, flip, move_number) in self.awaiting.drain(..) {
            self.postings.push((
                key,
                FullBoardPosting {
                    flip,
                    continuation,
                    move_number,
                },
            ));
        }
    }

    /// Query key of a full-board pattern, `None` if it cannot be hashed.
    fn query_key(&self, plist: &PatternList, pattern: &Pattern) -> Option<QueryKey> {
        if !pattern.is_full_board() || pattern.boardsize != self.boardsize {
            return None;
        }
        let bs = self.boardsize;
        region_key(plist, pattern, (0, 0), (bs, bs)).filter(|k| k.num_stones <= self.max_stones)
    }

    /// Stored positions equal to some orientation of the pattern.
    ///
    /// Returns `None` if the pattern cannot be answered from this index.
    pub fn query(&self, plist: &PatternList) -> Result<Option<Vec<FullBoardMatch>>, StorageError> {
        let Some(k1) = self.query_key(plist, &plist.pattern) else {
            return Ok(None);
        };
        let k2 = if plist.has_switched_members() {
            plist
                .orientation(0, true)
                .and_then(|i| self.query_key(plist, &plist.data[i]))
        } else {
            None
        };

        let mut out = Vec::new();
        for (key, color_switch) in [(Some(&k1), false), (k2.as_ref(), true)] {
            let Some(key) = key else {
                continue;
            };
            if color_switch && key.key == k1.key {
                continue;
            }
            let Some(&f) = key.flips.first() else {
                continue;
            };
            for (game_id, posting) in self.store.lookup(key.key)? {
                if let Some(orientation) = plist.orientation_for(posting.flip, f, color_switch) {
                    out.push(FullBoardMatch {
                        game_id,
                        orientation,
                        posting,
                    });
                }
            }
        }
        log::debug!("full-board index: {} matching positions", out.len());
        Ok(Some(out))
    }
}

impl GameProcessor for FullBoardIndex {
    fn begin_game(&mut self, game_id: i32) {
        self.game_id = Some(game_id);
        self.region.reset();
        self.move_number = ExtendedMoveNumber::new();
        self.awaiting.clear();
        self.branches.clear();
        self.postings.clear();
    }

    fn setup_stone(&mut self, x: usize, y: usize, color: Color) {
        self.flush(Some((x as u8, y as u8, color)));
        self.region.add(x, y, color);
    }

    fn clear_point(&mut self, x: usize, y: usize, removed: Option<Color>) {
        if let Some(color) = removed {
            self.region.remove(x, y, color);
        }
    }

    fn play(&mut self, x: usize, y: usize, color: Color, captures: &[Point]) {
        self.flush(Some((x as u8, y as u8, color)));
        self.region.add(x, y, color);
        for &(cx, cy) in captures {
            self.region.remove(cx, cy, color.opponent());
        }
    }

    fn end_of_node(&mut self) {
        if self.region.num_stones() <= self.max_stones {
            let (key, flip) = self.region.canonical();
            self.awaiting.push((key, flip, self.move_number.clone()));
        }
        self.move_number.next();
    }

    fn branch_point(&mut self) {
        self.region.push();
        self.branches
            .push((self.awaiting.clone(), self.move_number.clone()));
    }

    fn end_of_variation(&mut self) {
        self.flush(None);
        self.region.pop();
        if let Some((awaiting, move_number)) = self.branches.pop() {
            self.awaiting = awaiting;
            self.move_number = move_number;
            self.move_number.down();
        }
    }

    fn end_game(&mut self, commit: bool) {
        self.flush(None);
        if let Some(game_id) = self.game_id.take()
            && commit
        {
            for (key, posting) in self.postings.drain(..) {
                self.store.insert(key, game_id, posting);
            }
        }
        self.postings.clear();
    }
}

// =============================================================================
// Corner index
// =============================================================================

/// A corner position of a game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CornerPosting {
    pub flip: u8,
    /// Board index of the corner square's top-left point.
    pub position: u32,
}

impl Posting for CornerPosting {
    fn write(&self, w: &mut SnapshotWriter) {
        w.put_int(self.flip as i32 * 65536 + self.position as i32);
    }

    fn read(r: &mut SnapshotReader) -> Result<Self, CodecError> {
        let v = r.get_int()?;
        if !(0..8 * 65536).contains(&v) {
            return Err(CodecError::InvalidValue {
                what: "corner posting",
                value: v as i64,
            });
        }
        Ok(Self {
            flip: (v / 65536) as u8,
            position: (v % 65536) as u32,
        })
    }
}

pub struct CornerIndex {
    boardsize: usize,
    size: usize,
    max_stones: usize,
    store: HashStore<CornerPosting>,
    regions: Vec<HashRegion>,
    game_id: Option<i32>,
    postings: Vec<(i64, CornerPosting)>,
}

impl CornerIndex {
    pub fn open(
        dir: &Path,
        boardsize: usize,
        size: usize,
        max_stones: usize,
    ) -> Result<Self, StorageError> {
        let mut regions: Vec<HashRegion> = Vec::with_capacity(4);
        if size > 0 && size <= boardsize {
            let far = boardsize - size;
            for (x0, y0) in [(0, 0), (0, far), (far, 0), (far, far)] {
                if !regions.iter().any(|r| (r.x0, r.y0) == (x0, y0)) {
                    regions.push(HashRegion::new(x0, y0, size, size, boardsize));
                }
            }
        }
        Ok(Self {
            boardsize,
            size,
            max_stones,
            store: HashStore::open(dir, "hash_corner")?,
            regions,
            game_id: None,
            postings: Vec::new(),
        })
    }

    pub fn commit(&mut self) -> Result<(), StorageError> {
        self.store.rebuild()
    }

    pub fn has_pending(&self) -> bool {
        self.store.has_pending()
    }

    pub fn discard_pending(&mut self) {
        self.store.discard_pending();
    }

    /// Key of the most populated corner square covered by `pattern`.
    ///
    /// The pattern must be anchored in a corner and cover at least one
    /// corner square; the square must hold more than two and at most
    /// `max_stones` stones.
    pub fn query_key(&self, plist: &PatternList, pattern: &Pattern) -> Option<QueryKey> {
        let bs = self.boardsize;
        let p = pattern;
        if p.size_x < self.size || p.size_y < self.size {
            return None;
        }
        if p.left != p.right || p.top != p.bottom {
            return None;
        }
        if !(p.left == 0 || p.left + p.size_x == bs) || !(p.top == 0 || p.top + p.size_y == bs) {
            return None;
        }
        let mut best: Option<QueryKey> = None;
        for r in &self.regions {
            if r.x0 < p.left
                || r.x0 + self.size > p.left + p.size_x
                || r.y0 < p.top
                || r.y0 + self.size > p.top + p.size_y
            {
                continue;
            }
            let k = region_key(plist, p, (r.x0, r.y0), (self.size, self.size))?;
            if k.num_stones <= 2 || k.num_stones > self.max_stones {
                continue;
            }
            if best.as_ref().is_none_or(|b| k.num_stones > b.num_stones) {
                best = Some(k);
            }
        }
        best
    }

    fn add_candidates(
        plist: &PatternList,
        key: &QueryKey,
        color_switch: bool,
        posting: &CornerPosting,
        out: &mut Vec<Candidate>,
    ) {
        for &f in &key.flips {
            if let Some(ind) = plist.orientation_for(posting.flip, f, color_switch) {
                let m = &plist.data[ind];
                insert_if_new(out, Candidate::new(m.left, m.top, ind));
            }
        }
    }

    /// Candidate placements per game, `None` if the pattern cannot be
    /// answered from this index.
    pub fn query(
        &self,
        plist: &PatternList,
    ) -> Result<Option<BTreeMap<i32, Vec<Candidate>>>, StorageError> {
        let Some(k1) = self.query_key(plist, &plist.pattern) else {
            return Ok(None);
        };
        let k2 = if plist.has_switched_members() {
            plist
                .orientation(0, true)
                .and_then(|i| self.query_key(plist, &plist.data[i]))
        } else {
            None
        };
        // A color-symmetric pattern matches both ways under one key.
        let same = k2.as_ref().is_some_and(|k| k.key == k1.key);

        let mut out: BTreeMap<i32, Vec<Candidate>> = BTreeMap::new();
        for (game_id, posting) in self.store.lookup(k1.key)? {
            let cands = out.entry(game_id).or_default();
            Self::add_candidates(plist, &k1, false, &posting, cands);
            if let (true, Some(k2)) = (same, k2.as_ref()) {
                Self::add_candidates(plist, k2, true, &posting, cands);
            }
        }
        if let Some(k2) = k2.as_ref().filter(|_| !same) {
            for (game_id, posting) in self.store.lookup(k2.key)? {
                Self::add_candidates(plist, k2, true, &posting, out.entry(game_id).or_default());
            }
        }
        log::debug!("corner index: candidates in {} games", out.len());
        Ok(Some(out))
    }
}

impl GameProcessor for CornerIndex {
    fn begin_game(&mut self, game_id: i32) {
        self.game_id = Some(game_id);
        for r in &mut self.regions {
            r.reset();
        }
        self.postings.clear();
    }

    fn setup_stone(&mut self, x: usize, y: usize, color: Color) {
        for r in &mut self.regions {
            r.add(x, y, color);
        }
    }

    fn clear_point(&mut self, x: usize, y: usize, removed: Option<Color>) {
        if let Some(color) = removed {
            for r in &mut self.regions {
                r.remove(x, y, color);
            }
        }
    }

    fn play(&mut self, x: usize, y: usize, color: Color, captures: &[Point]) {
        for r in &mut self.regions {
            r.add(x, y, color);
            for &(cx, cy) in captures {
                r.remove(cx, cy, color.opponent());
            }
        }
    }

    fn end_of_node(&mut self) {
        for r in &mut self.regions {
            if r.num_stones() <= self.max_stones && r.take_changed() {
                let (key, flip) = r.canonical();
                self.postings.push((
                    key,
                    CornerPosting {
                        flip,
                        position: r.position(),
                    },
                ));
            }
        }
    }

    fn branch_point(&mut self) {
        for r in &mut self.regions {
            r.push();
        }
    }

    fn end_of_variation(&mut self) {
        for r in &mut self.regions {
            r.pop();
        }
    }

    fn end_game(&mut self, commit: bool) {
        if let Some(game_id) = self.game_id.take()
            && commit
        {
            for (key, posting) in self.postings.drain(..) {
                self.store.insert(key, game_id, posting);
            }
        }
        self.postings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameTree, dispatch};
    use crate::pattern::PatternKind;

    fn process(index: &mut dyn GameProcessor, id: i32, tree: &GameTree) {
        index.begin_game(id);
        dispatch(index, &tree.events(true).unwrap());
        index.end_game(true);
    }

    #[test]
    fn test_store_roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store: HashStore<CornerPosting> = HashStore::open(dir.path(), "t").unwrap();
            store.insert(5, 2, CornerPosting { flip: 1, position: 0 });
            store.insert(-3, 1, CornerPosting { flip: 0, position: 12 });
            store.insert(5, 1, CornerPosting { flip: 7, position: 360 });
            assert!(store.lookup(5).unwrap().is_empty());
            store.rebuild().unwrap();
            let got = store.lookup(5).unwrap();
            assert_eq!(got.len(), 2);
            assert_eq!(got[0].0, 1);
            assert_eq!(got[0].1, CornerPosting { flip: 7, position: 360 });
        }
        let mut store: HashStore<CornerPosting> = HashStore::open(dir.path(), "t").unwrap();
        assert_eq!(store.num_keys(), 2);
        assert_eq!(store.lookup(-3).unwrap().len(), 1);
        assert!(store.lookup(4).unwrap().is_empty());
        // A second rebuild merges with what is on disk.
        store.insert(4, 9, CornerPosting { flip: 2, position: 1 });
        store.insert(5, 9, CornerPosting { flip: 2, position: 1 });
        store.rebuild().unwrap();
        assert_eq!(store.lookup(5).unwrap().len(), 3);
        assert_eq!(store.lookup(4).unwrap().len(), 1);
        assert_eq!(store.lookup(-3).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_key_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("t.keys"), [1, 0, 0, 0, 0, 0, 0, 0, 9]).unwrap();
        let r: Result<HashStore<CornerPosting>, _> = HashStore::open(dir.path(), "t");
        assert!(matches!(r, Err(StorageError::Codec(_))));

        let mut w = SnapshotWriter::new();
        w.put_int64(1);
        w.put_int64(7);
        w.put_int(100);
        fs::write(dir.path().join("t.keys"), w.as_bytes()).unwrap();
        let r: Result<HashStore<CornerPosting>, _> = HashStore::open(dir.path(), "t");
        assert!(matches!(r, Err(StorageError::CorruptIndex { .. })));
    }

    #[test]
    fn test_full_board_posting_bytes() {
        let p = FullBoardPosting {
            flip: 3,
            continuation: Some((4, 5, Color::White)),
            move_number: ExtendedMoveNumber::from_parts(vec![12, 1, 3]),
        };
        let mut w = SnapshotWriter::new();
        p.write(&mut w);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], &(3i32 << 16).to_le_bytes());
        assert_eq!(&bytes[8..15], &[4, 5, b'W', 0, 0, 0, 3]);
        let back = FullBoardPosting::read(&mut SnapshotReader::new(&bytes)).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_full_board_index_finds_flipped_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = FullBoardIndex::open(dir.path(), 9, 50).unwrap();
        // The game position after two moves is the pattern mirrored left/right.
        process(&mut index, 1, &GameTree::from_moves(9, &[(6, 2), (2, 6), (4, 4)]));
        index.commit().unwrap();

        let grid = "\
            .........\
            .........\
            ..X......\
            .........\
            .........\
            .........\
            ......O..\
            .........\
            .........";
        let p = Pattern::new(PatternKind::FullBoard, 9, 9, 9, grid).unwrap();
        let plist = PatternList::new(p, true, None).unwrap();
        let matches = index.query(&plist).unwrap().unwrap();
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.game_id, 1);
        assert_eq!(m.posting.move_number.as_slice(), &[2]);
        assert_eq!(m.posting.continuation, Some((4, 4, Color::Black)));
        let image = &plist.data[m.orientation];
        assert_eq!(image.get(6, 2), b'X');
        assert_eq!(image.get(2, 6), b'O');
    }

    #[test]
    fn test_full_board_index_rejects_unhashable() {
        let dir = tempfile::tempdir().unwrap();
        let index = FullBoardIndex::open(dir.path(), 9, 50).unwrap();
        let p = Pattern::new(PatternKind::CornerNW, 9, 3, 3, "X........").unwrap();
        let plist = PatternList::new(p, true, None).unwrap();
        assert!(index.query(&plist).unwrap().is_none());
    }

    #[test]
    fn test_corner_index_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = CornerIndex::open(dir.path(), 19, 7, 20).unwrap();
        // The pattern rotated into the lower right corner.
        process(&mut index, 4, &GameTree::from_moves(19, &[(15, 15), (16, 13), (14, 14)]));
        process(&mut index, 5, &GameTree::from_moves(19, &[(3, 3), (9, 9), (10, 10)]));
        index.commit().unwrap();

        let grid = "\
            .......\
            .......\
            .......\
            ...X...\
            ....X..\
            ..O....\
            .......";
        let p = Pattern::new(PatternKind::CornerNW, 19, 7, 7, grid).unwrap();
        let plist = PatternList::new(p, true, None).unwrap();
        let got = index.query(&plist).unwrap().unwrap();
        assert_eq!(got.len(), 1);
        let cands = &got[&4];
        assert!(!cands.is_empty());
        for c in cands {
            let m = &plist.data[c.orientation];
            assert_eq!((c.x, c.y), (12, 12));
            assert_eq!(m.get(3, 3), b'X');
            assert_eq!(m.get(2, 2), b'X');
            assert_eq!(m.get(4, 1), b'O');
        }
    }

    #[test]
    fn test_corner_query_requires_corner_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let index = CornerIndex::open(dir.path(), 19, 7, 20).unwrap();
        let grid = "XXX.... ....... ....... ....... ....... ....... .......";
        let side = Pattern::new(PatternKind::SideN, 19, 7, 7, grid).unwrap();
        let plist = PatternList::new(side, true, None).unwrap();
        assert!(index.query(&plist).unwrap().is_none());
        let corner = Pattern::new(PatternKind::CornerNW, 19, 7, 7, grid).unwrap();
        let plist = PatternList::new(corner, true, None).unwrap();
        assert!(index.query_key(&plist, &plist.pattern).is_some());
        let sparse = Pattern::new(PatternKind::CornerNW, 19, 7, 7, &grid.replacen("XX", "..", 1)).unwrap();
        let plist = PatternList::new(sparse, true, None).unwrap();
        assert!(index.query_key(&plist, &plist.pattern).is_none());
    }
}
