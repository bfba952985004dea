//! The game list: processing, persistence and pattern search.
//!
//! A [`GameList`] owns a database directory and the indexes built from the
//! games added to it. Final positions and move lists are held in memory
//! and written as snapshot files on [`GameList::commit`]; the hash indexes
//! keep their postings on disk.
//!
//! A search picks its candidate source in a fixed order: the full-board
//! hash index for full-board patterns, then the corner hash index, then
//! the final-position filter. Candidates are verified game by game on the
//! rayon pool; verdicts travel over a channel to a single consumer that
//! owns all aggregate state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use rayon::prelude::*;

use crate::board::{Color, MoveError};
use crate::codec::{SnapshotReader, SnapshotWriter};
use crate::constants::*;
use crate::continuation::{Continuations, date_bucket};
use crate::error::{Error, PatternError, Result, StorageError};
use crate::finalpos::{FinalPosIndex, PatternBits};
use crate::game::{GameEvent, GameProcessor, GameRecord, dispatch, main_line};
use crate::hashindex::{CornerIndex, FullBoardIndex, FullBoardMatch};
use crate::hit::{Candidate, Hit, HitLabel, insert_if_new};
use crate::movelist::MoveListIndex;
use crate::options::*;
use crate::pattern::Pattern;
use crate::signature::SignatureIndex;
use crate::symmetry::PatternList;
use crate::verify::{ContinuationEvent, GameVerdict, verify_game};

const GAMES_FILE: &str = "games.snap";
const FINALPOS_FILE: &str = "finalpos.snap";
const MOVELIST_FILE: &str = "movelist.snap";
const SIGNATURE_FILE: &str = "signature.snap";

/// Metadata kept for every game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GameEntry {
    pub id: i32,
    pub winner: Option<Color>,
    pub date: i32,
}

/// Hits of one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameResult {
    pub game_id: i32,
    pub hits: Vec<Hit>,
}

/// Where the candidates of a search came from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    HashFull,
    HashCorner,
    #[default]
    FinalPos,
    MoveList,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub strategy: Strategy,
    /// Games with at least one hit.
    pub num_games: usize,
    pub num_hits: usize,
    /// Hits with colors exchanged relative to the pattern.
    pub num_switched: usize,
    /// Hits in games won by the player in the pattern's Black role.
    pub b_wins: usize,
    pub w_wins: usize,
}

/// Duplicate handling when adding games.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateCheck {
    /// Also require equal final-position fingerprints.
    pub strict: bool,
    /// Reject duplicates instead of only reporting them.
    pub omit: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub committed: bool,
    /// Games already in the list that this game duplicates.
    pub duplicates: Vec<i32>,
}

enum Gathered {
    /// Trusted full-board hits, no verification needed.
    Direct(BTreeMap<i32, GameVerdict>),
    Candidates(Vec<(i32, Vec<Candidate>)>),
}

struct Aggregate {
    summary: SearchSummary,
    continuations: Continuations,
    hits: HashMap<i32, Vec<Hit>>,
}

impl Aggregate {
    fn new(strategy: Strategy, pattern: &Pattern) -> Self {
        Self {
            summary: SearchSummary {
                strategy,
                ..Default::default()
            },
            continuations: Continuations::new(pattern.size_x, pattern.size_y),
            hits: HashMap::new(),
        }
    }

    fn absorb(&mut self, entry: &GameEntry, verdict: GameVerdict) {
        if verdict.hits.is_empty() {
            return;
        }
        let n = verdict.hits.len();
        let s = verdict.switched;
        let sm = &mut self.summary;
        sm.num_games += 1;
        sm.num_hits += n;
        sm.num_switched += s;
        match entry.winner {
            Some(Color::Black) => {
                sm.b_wins += n.saturating_sub(s);
                sm.w_wins += s;
            }
            Some(Color::White) => {
                sm.b_wins += s;
                sm.w_wins += n.saturating_sub(s);
            }
            None => {}
        }
        for ev in &verdict.continuations {
            self.continuations
                .record(&ev.resolved, ev.tenuki, entry.winner, entry.date);
        }
        self.hits.insert(entry.id, verdict.hits);
    }
}

pub struct GameList {
    dir: PathBuf,
    boardsize: usize,
    options: ProcessOptions,
    games: Vec<GameEntry>,
    positions: HashMap<i32, usize>,
    current: Vec<i32>,
    finalpos: FinalPosIndex,
    movelist: MoveListIndex,
    signatures: Option<SignatureIndex>,
    hash_full: Option<FullBoardIndex>,
    hash_corner: Option<CornerIndex>,
    pattern: Option<PatternList>,
    results: Vec<GameResult>,
    continuations: Option<Continuations>,
    labels: Vec<u8>,
    summary: SearchSummary,
}

fn read_file(path: &Path) -> std::result::Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn write_file(path: &Path, w: &SnapshotWriter) -> std::result::Result<(), StorageError> {
    fs::write(path, w.as_bytes()).map_err(|e| StorageError::io(path, e))
}

fn check_consumed(path: &Path, r: &SnapshotReader) -> std::result::Result<(), StorageError> {
    if r.is_empty() {
        Ok(())
    } else {
        Err(StorageError::CorruptIndex {
            path: path.to_path_buf(),
            reason: format!("{} trailing bytes", r.remaining()),
        })
    }
}

fn off_board(events: &[GameEvent], boardsize: usize) -> Option<(usize, usize)> {
    events.iter().find_map(|e| match e {
        GameEvent::Setup { x, y, .. } | GameEvent::Clear { x, y, .. } | GameEvent::Move { x, y, .. }
            if *x >= boardsize || *y >= boardsize =>
        {
            Some((*x, *y))
        }
        GameEvent::Move { captures, .. } => captures
            .iter()
            .find(|&&(cx, cy)| cx >= boardsize || cy >= boardsize)
            .copied(),
        _ => None,
    })
}

impl GameList {
    /// Opens the database in `dir`, creating it if needed.
    ///
    /// An existing database keeps the processing options it was built
    /// with; `options` only applies to a new one.
    pub fn open(dir: impl AsRef<Path>, boardsize: usize, options: ProcessOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !(1..=MAX_BOARDSIZE).contains(&boardsize) {
            return Err(PatternError::UnsupportedBoardSize(boardsize).into());
        }
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let mut options = options;
        let mut games = Vec::new();
        let games_path = dir.join(GAMES_FILE);
        if let Some(bytes) = read_file(&games_path)? {
            let mut r = SnapshotReader::new(&bytes);
            let stored = r.get_len()?;
            if stored != boardsize {
                return Err(Error::BoardSizeMismatch {
                    expected: stored,
                    actual: boardsize,
                });
            }
            let stored_options = ProcessOptions::read_snapshot(&mut r)?;
            if stored_options != options {
                log::info!("using the processing options stored in {}", dir.display());
                options = stored_options;
            }
            let n = r.get_len()?;
            for _ in 0..n {
                let id = r.get_int()?;
                let winner = Color::from_letter(r.get_char()?);
                let date = r.get_int()?;
                games.push(GameEntry { id, winner, date });
            }
            check_consumed(&games_path, &r)?;
        }

        let finalpos_path = dir.join(FINALPOS_FILE);
        let finalpos = match read_file(&finalpos_path)? {
            Some(bytes) => {
                let mut r = SnapshotReader::new(&bytes);
                let index = FinalPosIndex::read_snapshot(&mut r)?;
                check_consumed(&finalpos_path, &r)?;
                index
            }
            None => FinalPosIndex::new(),
        };
        let movelist_path = dir.join(MOVELIST_FILE);
        let movelist = match read_file(&movelist_path)? {
            Some(bytes) => {
                let mut r = SnapshotReader::new(&bytes);
                let index = MoveListIndex::read_snapshot(&mut r)?;
                check_consumed(&movelist_path, &r)?;
                index
            }
            None => MoveListIndex::new(),
        };
        let signatures = if options.algos.contains(ALGO_SIGNATURE) {
            let path = dir.join(SIGNATURE_FILE);
            Some(match read_file(&path)? {
                Some(bytes) => {
                    let mut r = SnapshotReader::new(&bytes);
                    let index = SignatureIndex::read_snapshot(&mut r, boardsize)?;
                    check_consumed(&path, &r)?;
                    index
                }
                None => SignatureIndex::new(boardsize),
            })
        } else {
            None
        };
        let hash_full = if options.algos.contains(ALGO_HASH_FULL) {
            Some(FullBoardIndex::open(&dir, boardsize, options.hash_full_max_stones)?)
        } else {
            None
        };
        let hash_corner = if options.algos.contains(ALGO_HASH_CORNER) {
            Some(CornerIndex::open(
                &dir,
                boardsize,
                options.corner_size,
                options.hash_corner_max_stones,
            )?)
        } else {
            None
        };

        let positions = games.iter().enumerate().map(|(i, g)| (g.id, i)).collect();
        let current = games.iter().map(|g| g.id).collect();
        log::info!("opened {} with {} games", dir.display(), games.len());
        Ok(Self {
            dir,
            boardsize,
            options,
            games,
            positions,
            current,
            finalpos,
            movelist,
            signatures,
            hash_full,
            hash_corner,
            pattern: None,
            results: Vec::new(),
            continuations: None,
            labels: Vec::new(),
            summary: SearchSummary::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn boardsize(&self) -> usize {
        self.boardsize
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Number of games in the current selection.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn num_games(&self) -> usize {
        self.games.len()
    }

    /// Ids of the current selection, in processing order.
    pub fn current(&self) -> &[i32] {
        &self.current
    }

    pub fn entry(&self, game_id: i32) -> Option<&GameEntry> {
        self.positions.get(&game_id).and_then(|&i| self.games.get(i))
    }

    fn processors(&mut self) -> Vec<&mut dyn GameProcessor> {
        let mut ps: Vec<&mut dyn GameProcessor> = vec![&mut self.finalpos, &mut self.movelist];
        if let Some(s) = self.signatures.as_mut() {
            ps.push(s);
        }
        if let Some(h) = self.hash_full.as_mut() {
            ps.push(h);
        }
        if let Some(h) = self.hash_corner.as_mut() {
            ps.push(h);
        }
        ps
    }

    pub fn add_game(&mut self, record: &GameRecord) -> Result<ProcessReport> {
        self.add_game_with(record, DuplicateCheck::default())
    }

    /// Runs a game through all indexes.
    ///
    /// The game becomes part of the list (and of the current selection)
    /// unless it is a duplicate and `check.omit` is set. Hash postings
    /// become searchable after the next [`GameList::commit`].
    pub fn add_game_with(&mut self, record: &GameRecord, check: DuplicateCheck) -> Result<ProcessReport> {
        if record.boardsize != self.boardsize {
            return Err(Error::BoardSizeMismatch {
                expected: self.boardsize,
                actual: record.boardsize,
            });
        }
        if self.positions.contains_key(&record.id) {
            return Err(Error::DuplicateGameId(record.id));
        }
        if let Some(p) = off_board(&record.events, self.boardsize) {
            return Err(Error::Replay {
                game_id: record.id,
                source: MoveError::OffBoard(p),
            });
        }
        let trimmed;
        let events = if self.options.process_variations {
            &record.events
        } else {
            trimmed = main_line(&record.events);
            &trimmed
        };

        for p in self.processors() {
            p.begin_game(record.id);
            dispatch(p, events);
        }

        let mut duplicates = Vec::new();
        if let Some(sig) = self.signatures.as_ref().and_then(|s| s.current_signature()) {
            let fingerprint = self.finalpos.current_fingerprint();
            for &id in self.signatures.iter().flat_map(|s| s.search(&sig)) {
                let same_fp = self
                    .finalpos
                    .get(id)
                    .is_some_and(|fp| Some(fp.fingerprint()) == fingerprint);
                if !check.strict || same_fp {
                    duplicates.push(id);
                }
            }
        }
        let committed = !(check.omit && !duplicates.is_empty());
        for p in self.processors() {
            p.end_game(committed);
        }

        if committed {
            self.positions.insert(record.id, self.games.len());
            self.games.push(GameEntry {
                id: record.id,
                winner: record.winner,
                date: record.date,
            });
            self.current.push(record.id);
        }
        if duplicates.is_empty() {
            log::debug!("processed game {}", record.id);
        } else {
            log::info!(
                "game {} duplicates {:?}{}",
                record.id,
                duplicates,
                if committed { "" } else { ", omitted" }
            );
        }
        Ok(ProcessReport {
            committed,
            duplicates,
        })
    }

    /// Merges pending hash postings and writes all snapshot files.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(h) = self.hash_full.as_mut() {
            h.commit()?;
        }
        if let Some(h) = self.hash_corner.as_mut() {
            h.commit()?;
        }

        let mut w = SnapshotWriter::new();
        w.put_int(self.boardsize as i32);
        self.options.write_snapshot(&mut w);
        w.put_int(self.games.len() as i32);
        for g in &self.games {
            w.put_int(g.id);
            w.put_char(g.winner.map_or(0, |c| c.letter() as u8));
            w.put_int(g.date);
        }
        write_file(&self.dir.join(GAMES_FILE), &w)?;

        let mut w = SnapshotWriter::new();
        self.finalpos.write_snapshot(&mut w);
        write_file(&self.dir.join(FINALPOS_FILE), &w)?;

        let mut w = SnapshotWriter::new();
        self.movelist.write_snapshot(&mut w);
        write_file(&self.dir.join(MOVELIST_FILE), &w)?;

        if let Some(s) = &self.signatures {
            let mut w = SnapshotWriter::new();
            s.write_snapshot(&mut w);
            write_file(&self.dir.join(SIGNATURE_FILE), &w)?;
        }
        log::info!("committed {} games to {}", self.games.len(), self.dir.display());
        Ok(())
    }

    /// Restores the full game list as the current selection and clears
    /// the last search.
    pub fn reset(&mut self) {
        self.current = self.games.iter().map(|g| g.id).collect();
        self.pattern = None;
        self.results.clear();
        self.continuations = None;
        self.labels.clear();
        self.summary = SearchSummary::default();
    }

    /// Searches the current selection and narrows it to the games with hits.
    pub fn search(&mut self, pattern: Pattern, options: &SearchOptions) -> Result<SearchSummary> {
        if pattern.boardsize != self.boardsize {
            log::warn!(
                "pattern for board size {} on a {} list, nothing matches",
                pattern.boardsize,
                self.boardsize
            );
            self.current.clear();
            self.results.clear();
            self.continuations = Some(Continuations::new(pattern.size_x, pattern.size_y));
            self.labels = vec![NO_LABEL; pattern.size_x * pattern.size_y];
            self.summary = SearchSummary::default();
            self.pattern = None;
            return Ok(self.summary);
        }
        let plist = PatternList::new(pattern, options.fixed_color, options.next_move)?;
        let (strategy, gathered) = self.gather(&plist, options)?;
        log::debug!("search strategy {:?}", strategy);

        let mut agg = Aggregate::new(strategy, &plist.pattern);
        match gathered {
            Gathered::Direct(verdicts) => {
                for (game_id, verdict) in verdicts {
                    if let Some(entry) = self.entry(game_id) {
                        agg.absorb(entry, verdict);
                    }
                }
            }
            Gathered::Candidates(work) => self.verify_all(&plist, options, work, &mut agg),
        }

        let mut hits = agg.hits;
        self.results = self
            .current
            .iter()
            .filter_map(|&game_id| hits.remove(&game_id).map(|hits| GameResult { game_id, hits }))
            .collect();
        self.current = self.results.iter().map(|r| r.game_id).collect();
        self.labels = agg.continuations.assign_labels(&plist.pattern);
        self.continuations = Some(agg.continuations);
        self.summary = agg.summary;
        self.pattern = Some(plist);
        log::info!(
            "{} hits ({} color-switched) in {} games",
            self.summary.num_hits,
            self.summary.num_switched,
            self.summary.num_games
        );
        Ok(self.summary)
    }

    fn within_limits(options: &SearchOptions, m: &FullBoardMatch) -> bool {
        m.posting.move_number.total_move_num() <= options.move_limit
            && (options.search_in_variations || m.posting.move_number.as_slice().len() == 1)
    }

    fn in_selection_order(&self, mut by_game: BTreeMap<i32, Vec<Candidate>>) -> Vec<(i32, Vec<Candidate>)> {
        self.current
            .iter()
            .filter_map(|&id| by_game.remove(&id).map(|c| (id, c)))
            .filter(|(_, c)| !c.is_empty())
            .collect()
    }

    fn gather(&self, plist: &PatternList, options: &SearchOptions) -> Result<(Strategy, Gathered)> {
        let algos = options.algos;

        if algos.contains(ALGO_HASH_FULL)
            && let Some(index) = self.hash_full.as_ref()
        {
            if index.has_pending() {
                log::debug!("full-board index has uncommitted games, not used");
            } else if let Some(matches) = index.query(plist)? {
                let selected: HashSet<i32> = self.current.iter().copied().collect();
                let matches = matches
                    .into_iter()
                    .filter(|m| selected.contains(&m.game_id) && Self::within_limits(options, m));
                // Follow-ups are only checked by the verifier.
                if options.trust_hash_full && plist.pattern.follow_ups.is_empty() {
                    let verdicts = trusted_verdicts(plist, matches)?;
                    return Ok((Strategy::HashFull, Gathered::Direct(verdicts)));
                }
                let mut by_game: BTreeMap<i32, Vec<Candidate>> = BTreeMap::new();
                for m in matches {
                    insert_if_new(by_game.entry(m.game_id).or_default(), Candidate::new(0, 0, m.orientation));
                }
                return Ok((Strategy::HashFull, Gathered::Candidates(self.in_selection_order(by_game))));
            }
        }

        if algos.contains(ALGO_HASH_CORNER)
            && let Some(index) = self.hash_corner.as_ref()
        {
            if index.has_pending() {
                log::debug!("corner index has uncommitted games, not used");
            } else if let Some(by_game) = index.query(plist)? {
                return Ok((Strategy::HashCorner, Gathered::Candidates(self.in_selection_order(by_game))));
            }
        }

        if algos.contains(ALGO_FINALPOS) {
            let bits: Vec<PatternBits> = plist.data.iter().map(PatternBits::new).collect();
            let work: Vec<(i32, Vec<Candidate>)> = self
                .current
                .par_iter()
                .map(|&id| (id, self.finalpos.candidates(plist, &bits, id)))
                .filter(|(_, c)| !c.is_empty())
                .collect();
            return Ok((Strategy::FinalPos, Gathered::Candidates(work)));
        }

        let mut placements = Vec::new();
        for (i, p) in plist.data.iter().enumerate() {
            for y in p.top..=p.bottom {
                for x in p.left..=p.right {
                    placements.push(Candidate::new(x, y, i));
                }
            }
        }
        let work = self.current.iter().map(|&id| (id, placements.clone())).collect();
        Ok((Strategy::MoveList, Gathered::Candidates(work)))
    }

    fn verify_all(
        &self,
        plist: &PatternList,
        options: &SearchOptions,
        work: Vec<(i32, Vec<Candidate>)>,
        agg: &mut Aggregate,
    ) {
        log::debug!("verifying candidates in {} games", work.len());
        let (tx, rx) = mpsc::channel::<(i32, GameVerdict)>();
        let movelist = &self.movelist;
        std::thread::scope(|s| {
            s.spawn(move || {
                work.par_iter().for_each_with(tx, |tx, (game_id, candidates)| {
                    let Some(moves) = movelist.get(*game_id) else {
                        log::warn!("game {game_id} has no move list");
                        return;
                    };
                    match verify_game(plist, options, moves, candidates) {
                        Ok(verdict) => {
                            let _ = tx.send((*game_id, verdict));
                        }
                        Err(e) => log::warn!("game {game_id} skipped: {e}"),
                    }
                });
            });
            for (game_id, verdict) in rx {
                if let Some(entry) = self.entry(game_id) {
                    agg.absorb(entry, verdict);
                }
            }
        });
    }

    pub fn pattern(&self) -> Option<&PatternList> {
        self.pattern.as_ref()
    }

    /// Hits of the last search, in game order.
    pub fn results(&self) -> &[GameResult] {
        &self.results
    }

    pub fn continuations(&self) -> Option<&Continuations> {
        self.continuations.as_ref()
    }

    /// Label grid of the last search (`.` for unlabelled points).
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn summary(&self) -> SearchSummary {
        self.summary
    }

    /// Number of games per date bucket over the whole list, independent of
    /// the current selection.
    pub fn games_per_year(&self) -> Vec<u32> {
        year_profile(self.games.iter())
    }

    /// Number of games per date bucket in the current selection.
    pub fn selection_per_year(&self) -> Vec<u32> {
        year_profile(self.current.iter().filter_map(|&id| self.entry(id)))
    }

    /// Groups of games with equal signatures; with `strict` the final
    /// positions must agree as well.
    pub fn duplicates(&self, strict: bool) -> Vec<Vec<i32>> {
        let Some(signatures) = &self.signatures else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (_, ids) in signatures.collisions() {
            if !strict {
                out.push(ids.to_vec());
                continue;
            }
            let mut by_fingerprint: BTreeMap<u64, Vec<i32>> = BTreeMap::new();
            for &id in ids {
                if let Some(fp) = self.finalpos.get(id) {
                    by_fingerprint.entry(fp.fingerprint()).or_default().push(id);
                }
            }
            out.extend(by_fingerprint.into_values().filter(|g| g.len() > 1));
        }
        out
    }
}

/// Hits straight from full-board postings. A full-board continuation is
/// always the next move, so none of them is tenuki.
fn trusted_verdicts(
    plist: &PatternList,
    matches: impl Iterator<Item = FullBoardMatch>,
) -> std::result::Result<BTreeMap<i32, GameVerdict>, PatternError> {
    let mut out: BTreeMap<i32, GameVerdict> = BTreeMap::new();
    for m in matches {
        match m.posting.continuation {
            Some((x, y, color)) => {
                let Some(r) = plist.resolve_continuation(m.orientation, x as usize, y as usize, color)? else {
                    continue;
                };
                let v = out.entry(m.game_id).or_default();
                if r.color_switch {
                    v.switched += 1;
                }
                v.hits.push(Hit::new(
                    m.posting.move_number,
                    HitLabel::at(r.x, r.y, r.color_switch),
                ));
                v.continuations.push(ContinuationEvent {
                    resolved: r,
                    tenuki: false,
                });
            }
            None if plist.next_move.is_none() => {
                let color_switch = plist.data.get(m.orientation).is_some_and(|p| p.color_switch);
                let v = out.entry(m.game_id).or_default();
                if color_switch {
                    v.switched += 1;
                }
                v.hits
                    .push(Hit::new(m.posting.move_number, HitLabel::no_continuation(color_switch)));
            }
            None => {}
        }
    }
    for v in out.values_mut() {
        v.hits.sort();
    }
    Ok(out)
}

fn year_profile<'a>(entries: impl Iterator<Item = &'a GameEntry>) -> Vec<u32> {
    let mut out = vec![0u32; DATE_BUCKETS];
    for g in entries {
        if let Some(b) = date_bucket(g.date) {
            out[b] += 1;
        }
    }
    out
}
