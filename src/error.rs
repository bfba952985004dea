//! Error types.
//!
//! A search either succeeds completely or fails with one of these errors;
//! there are no partial results. "Not hashable" is not an error: index
//! queries return `None` and the caller falls back to the next strategy.

use std::path::PathBuf;

use crate::board::MoveError;

/// Malformed pattern geometry or an invalid access into a symmetry table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Anchor rectangle does not fit on the board.
    #[error(
        "anchor rectangle [{left},{right}]x[{top},{bottom}] for a {size_x}x{size_y} pattern does not fit a {boardsize}x{boardsize} board"
    )]
    InvalidAnchor {
        left: usize,
        right: usize,
        top: usize,
        bottom: usize,
        size_x: usize,
        size_y: usize,
        boardsize: usize,
    },

    /// Pattern is empty or larger than the board.
    #[error("pattern of size {size_x}x{size_y} does not fit a {boardsize}x{boardsize} board")]
    InvalidSize {
        size_x: usize,
        size_y: usize,
        boardsize: usize,
    },

    /// Board size outside the supported range.
    #[error("unsupported board size {0}")]
    UnsupportedBoardSize(usize),

    /// Point grid has the wrong number of entries.
    #[error("expected {expected} pattern points, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// Unknown point symbol.
    #[error("invalid pattern symbol {0:?}")]
    InvalidSymbol(char),

    /// Follow-up move outside the pattern rectangle or with an unknown color.
    #[error("invalid follow-up move ({x}, {y}, {color:?})")]
    InvalidFollowUp { x: usize, y: usize, color: char },

    /// Access outside a symmetry table.
    #[error("symmetry table index ({x}, {y}) out of range for {size_x}x{size_y}")]
    SymmetryIndex {
        x: usize,
        y: usize,
        size_x: usize,
        size_y: usize,
    },

    /// Orientation index outside the pattern's orbit.
    #[error("orientation {index} out of range for an orbit of {len} patterns")]
    OrbitIndex { index: usize, len: usize },
}

/// Malformed snapshot bytes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("snapshot truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("negative length {0} in snapshot")]
    NegativeLength(i32),

    #[error("invalid UTF-8 in snapshot string")]
    InvalidString,

    #[error("invalid {what} value {value} in snapshot")]
    InvalidValue { what: &'static str, value: i64 },
}

/// Failure reading or writing an on-disk structure.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("corrupt index {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-level error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("game {game_id}: {source}")]
    Replay {
        game_id: i32,
        #[source]
        source: MoveError,
    },

    #[error("game {0} is already in the game list")]
    DuplicateGameId(i32),

    #[error("game list board size is {expected}, game has {actual}")]
    BoardSizeMismatch { expected: usize, actual: usize },
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::Storage(StorageError::Codec(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
