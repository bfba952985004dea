//! Kombilo-Rust: pattern search in collections of Go game records.
//!
//! Games are processed once into compact per-game encodings and hash
//! indexes; a search then finds every occurrence of a board pattern in
//! any of its 16 symmetric forms and collects statistics about the moves
//! that followed.
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry, move-list markers, pattern symbols
//! - [`codec`] - Little-endian snapshot encoding
//! - [`board`] - Capture-computing board used to replay game trees
//! - [`game`] - Replay events and the per-game processing lifecycle
//! - [`pattern`] - Patterns and flip arithmetic
//! - [`symmetry`] - Pattern orbits and continuation remapping
//! - [`finalpos`] - Final-position bitmaps and the bitmap filter
//! - [`movelist`] - Move-list encoding
//! - [`verify`] - Move-list verifier
//! - [`hash`], [`hashindex`] - Symmetrized position hashing and the on-disk indexes
//! - [`signature`] - Game signatures for duplicate detection
//! - [`continuation`] - Continuation statistics and labels
//! - [`gamelist`] - Processing, persistence and search
//!
//! ## Example
//!
//! ```
//! use kombilo_rust::game::GameTree;
//! use kombilo_rust::gamelist::GameList;
//! use kombilo_rust::options::{ProcessOptions, SearchOptions};
//! use kombilo_rust::pattern::{Pattern, PatternKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut games = GameList::open(dir.path(), 9, ProcessOptions::default()).unwrap();
//! let game = GameTree::from_moves(9, &[(2, 2), (4, 4)]);
//! games.add_game(&game.into_record(1, true).unwrap()).unwrap();
//! games.commit().unwrap();
//!
//! let pattern = Pattern::new(PatternKind::CornerNW, 9, 4, 4, "
//!     ....
//!     ....
//!     ..X.
//!     ....").unwrap();
//! let summary = games.search(pattern, &SearchOptions::default()).unwrap();
//! assert_eq!(summary.num_hits, 1);
//! ```

pub mod board;
pub mod codec;
pub mod constants;
pub mod continuation;
pub mod error;
pub mod finalpos;
pub mod game;
pub mod gamelist;
pub mod hash;
pub mod hashindex;
pub mod hit;
pub mod movelist;
pub mod options;
pub mod pattern;
pub mod signature;
pub mod symmetry;
pub mod verify;

pub use error::{Error, Result};
