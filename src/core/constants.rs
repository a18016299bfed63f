//! Engine-wide defaults for zoom limits and substitution search depth.
//! Keeping them in a single place makes it easier to tweak coverage behaviour.

/// Lowest zoom level requested by default.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Highest zoom level requested by default.
pub const DEFAULT_MAX_ZOOM: u8 = 14;

/// Highest zoom a configuration may ask for. `2^30` tiles per axis still fits
/// in a `u32` coordinate with headroom for child derivation.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// How many levels below the ideal zoom to look for loaded child tiles.
pub const DEFAULT_CHILD_SEARCH_DEPTH: u8 = 1;

/// Deepest child search a configuration may ask for. The search visits up
/// to `4^depth` descendants per missing tile.
pub const MAX_CHILD_SEARCH_DEPTH: u8 = 4;

/// How many levels above the ideal zoom to look for a loaded parent tile.
pub const DEFAULT_PARENT_SEARCH_DEPTH: u8 = 10;

/// Failed loads allowed per tile before it stops being re-requested.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between retries of a failed tile.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Concurrent fetches allowed by the default loader.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Per-fetch timeout of the default loader.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
