//! Prelude module for common tilecover types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilecover::prelude::*;`

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

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::traits::{Configurable, RetryLogic};

pub use crate::{CoverageError, Error, Result};

pub use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
