//! # tilecover
//!
//! Tile coverage and cache management for slippy-map renderers.
//!
//! Given the current zoom and the viewport's corners in tile space, the
//! [`CoverageEngine`] decides which tiles are required, keeps already loaded
//! parent or child tiles around as substitutes while the ideal tiles are still
//! loading, evicts everything else, and drives each tile through its load
//! lifecycle via a [`LoadDispatcher`].

pub mod core;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::TileRange,
    config::{CoverageConfig, CoverageProfile, LoaderConfig, RetryConfig},
    geo::{Point, TileId},
    viewport::{StaticViewport, ViewportProvider},
};

pub use crate::tiles::{
    coverage::{ChildCoverage, CoverageEngine, LoadOutcome, RefreshReport},
    dispatcher::{LoadDispatcher, LoadRequest, LoadResult},
    manager::{CoverageEvent, TileManager},
    render::{RenderSelector, RenderTile},
    tile::{Tile, TileState},
};

#[cfg(feature = "tokio-runtime")]
pub use crate::tiles::loader::{TileFetcher, TileLoader};

/// Installs `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
/// Returns `false` if a logger was already installed.
#[cfg(feature = "debug")]
pub fn init_logging() -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .is_ok()
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("Tile {id} failed to load: {reason}")]
    LoadFailure { id: TileId, reason: String },

    #[error("Stale callback for tile {0}")]
    StaleCallback(TileId),

    #[error("Invalid transition for tile {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: TileId,
        from: TileState,
        to: TileState,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Loader error: {0}")]
    Loader(String),
}

/// Error type alias for convenience
pub type Error = CoverageError;
