//! Boundary between the coverage engine and whatever actually loads tiles

use crate::{core::geo::TileId, Result};
use serde::{Deserialize, Serialize};

/// A single dispatched load. The token is unique per dispatch, so a callback
/// carrying an older token is recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadRequest {
    pub id: TileId,
    pub token: u64,
}

impl LoadRequest {
    pub fn new(id: TileId, token: u64) -> Self {
        Self { id, token }
    }
}

/// Result of a tile loading operation, reported back to the cache
#[derive(Debug)]
pub struct LoadResult {
    pub request: LoadRequest,
    pub data: Result<Vec<u8>>,
}

/// Accepts load requests and later reports their outcome.
///
/// Both calls must return without blocking: they run inside the cache's
/// critical section.
pub trait LoadDispatcher: Send + Sync {
    /// Start loading a tile. The outcome arrives later through
    /// `on_load_succeeded` / `on_load_failed`.
    fn request(&self, request: LoadRequest);

    /// Best-effort cancellation of any in-flight load for `id`.
    fn abandon(&self, id: TileId);
}

impl<D: LoadDispatcher + ?Sized> LoadDispatcher for std::sync::Arc<D> {
    fn request(&self, request: LoadRequest) {
        (**self).request(request)
    }

    fn abandon(&self, id: TileId) {
        (**self).abandon(id)
    }
}
