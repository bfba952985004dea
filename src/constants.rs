//! Constants for board geometry, stored encodings, and search defaults.
//!
//! The stored encodings (final-position bitmaps, move lists, hash postings)
//! are byte-exact formats, so the values here must not change once a
//! database has been written.

// =============================================================================
// Board Geometry
// =============================================================================

/// Largest supported board size. The stored formats are laid out for 19x19.
pub const MAX_BOARDSIZE: usize = 19;

/// Default board size for new game lists.
pub const DEFAULT_BOARDSIZE: usize = 19;

/// Bytes in a final-position bitmap: 2 bits per point, 4 points per byte.
pub const FINALPOS_BYTES: usize = 100;

/// Row stride (in bytes) of the final-position bitmap.
pub const FINALPOS_STRIDE: usize = 10;

/// Bytes in the per-game capture bitmap stored next to each move list.
pub const CAPTURE_BYTES: usize = 50;

// =============================================================================
// Move-list Markers
// =============================================================================
//
// Each move-list event occupies two bytes: (x | markers, y | flags).
// Coordinates always fit into the low five bits.

/// Mask selecting the coordinate bits of either byte.
pub const COORD_MASK: u8 = 31;

/// First byte: the event closes a node.
pub const ENDOFNODE: u8 = 128;

/// First byte: a branch point (state must be saved).
pub const BRANCHPOINT: u8 = 64;

/// First byte: end of a variation (state must be restored).
pub const ENDOFVARIATION: u8 = 32;

/// Second byte: the stone is removed (captured or cleared).
pub const REMOVE: u8 = 128;

/// Second byte: black stone.
pub const BLACK: u8 = 64;

/// Second byte: white stone.
pub const WHITE: u8 = 32;

/// Coordinate used for a pass in the move list.
pub const PASS_COORD: u8 = 19;

/// Label byte meaning "no continuation was played".
pub const NO_CONT: u8 = 255;

// =============================================================================
// Pattern Symbols
// =============================================================================

/// Point must be empty.
pub const EMPTY: u8 = b'.';

/// Point must hold a black stone.
pub const STONE_BLACK: u8 = b'X';

/// Point must hold a white stone.
pub const STONE_WHITE: u8 = b'O';

/// Point may hold a black stone or be empty.
pub const BLACK_OR_EMPTY: u8 = b'x';

/// Point may hold a white stone or be empty.
pub const WHITE_OR_EMPTY: u8 = b'o';

/// Point is unconstrained.
pub const WILDCARD: u8 = b'*';

/// Follow-up color meaning "a stone is removed here".
pub const REMOVED: u8 = b'-';

/// Marker for "no pre-assigned label" in a label grid.
pub const NO_LABEL: u8 = b'.';

// =============================================================================
// Continuations
// =============================================================================

/// First year of the date histogram.
pub const DATE_PROFILE_START: i32 = 1600;

/// Last year (exclusive for recording) of the date histogram.
pub const DATE_PROFILE_END: i32 = 2020;

/// Number of yearly buckets in a date histogram.
pub const DATE_BUCKETS: usize = (DATE_PROFILE_END - DATE_PROFILE_START + 1) as usize;

/// Letters handed out to continuation points, in order.
pub const LABEL_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A continuation played more than this many moves after the pattern completed is tenuki.
pub const TENUKI_GAP: u32 = 2;

// =============================================================================
// Index Defaults
// =============================================================================

/// Stone ceiling for positions recorded in the full-board hash index.
pub const HASH_FULL_MAX_STONES: usize = 50;

/// Stone ceiling for corner regions recorded in the corner hash index.
pub const HASH_CORNER_MAX_STONES: usize = 20;

/// Edge length of the square corner regions tracked by the corner hash index.
pub const HASH_CORNER_SIZE: usize = 7;

/// Default move-number ceiling for searches.
pub const MOVE_LIMIT: u32 = 10000;
