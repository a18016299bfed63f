//! Viewport coverage and cache maintenance
//!
//! A refresh computes the tiles that cover the viewport at the ideal zoom,
//! keeps already loaded children or the nearest loaded parent of every tile
//! that is not ready yet, starts loads for new tiles and evicts everything
//! else. Relevance to the current view is the only eviction criterion.

use crate::{
    core::{
        bounds::TileRange,
        config::CoverageConfig,
        geo::{Point, TileId},
        viewport::ViewportProvider,
    },
    prelude::{HashMap, HashSet},
    tiles::{
        dispatcher::{LoadDispatcher, LoadRequest},
        tile::{Tile, TileState},
    },
    traits::{Configurable, RetryLogic},
    CoverageError, Result,
};
use std::cmp::Ordering;

/// Zoom and tile-space corners of the viewport a refresh was computed for
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub zoom: u8,
    pub corners: [Point; 4],
}

impl ViewSnapshot {
    /// Reads the viewport, clamping its zoom into the configured limits
    pub fn capture(viewport: &dyn ViewportProvider, config: &CoverageConfig) -> Self {
        let raw_zoom = viewport.current_zoom();
        let zoom = config.clamp_zoom(raw_zoom);
        if raw_zoom != zoom as i32 {
            log::debug!("viewport zoom {} clamped to {}", raw_zoom, zoom);
        }
        Self {
            zoom,
            corners: viewport.corners_at_zoom(zoom),
        }
    }
}

/// Loaded descendants found for a tile that is not ready yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildCoverage {
    /// Every part of the tile is covered by a ready descendant
    pub complete: bool,
    pub found: Vec<TileId>,
}

/// What a refresh changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub zoom: u8,
    /// Tiles covering the viewport at `zoom`, row-major
    pub required: Vec<TileId>,
    /// Ready parents or children kept in place of required tiles
    pub substitutes: Vec<TileId>,
    pub requested: Vec<LoadRequest>,
    pub evicted: Vec<TileId>,
}

/// How a load callback was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// The tile was evicted, replaced, or is not waiting for this request
    Stale,
}

/// Recursively find ready children of `id`, down to `max_covering_zoom`.
///
/// A child that is not ready but is itself completely covered by ready
/// descendants counts towards `complete`.
pub fn find_loaded_children(
    tiles: &HashMap<TileId, Tile>,
    id: TileId,
    max_covering_zoom: u8,
) -> ChildCoverage {
    if id.z >= max_covering_zoom {
        return ChildCoverage::default();
    }

    let mut coverage = ChildCoverage {
        complete: true,
        found: Vec::new(),
    };
    for child in id.children(id.z + 1) {
        if tiles.get(&child).map_or(false, Tile::is_ready) {
            coverage.found.push(child);
        } else if child.z < max_covering_zoom {
            let nested = find_loaded_children(tiles, child, max_covering_zoom);
            coverage.complete &= nested.complete;
            coverage.found.extend(nested.found);
        } else {
            coverage.complete = false;
        }
    }
    coverage
}

/// Nearest ready ancestor of `id` no higher than `min_covering_zoom`
pub fn find_loaded_parent(
    tiles: &HashMap<TileId, Tile>,
    id: TileId,
    min_covering_zoom: u8,
) -> Option<TileId> {
    (min_covering_zoom..id.z)
        .rev()
        .filter_map(|zoom| id.parent(zoom))
        .find(|parent| tiles.get(parent).map_or(false, Tile::is_ready))
}

/// Back-to-front-safe render order: detailed tiles first
fn render_cmp(a: &TileId, b: &TileId) -> Ordering {
    b.z.cmp(&a.z).then_with(|| a.cmp(b))
}

fn invariant_violation(message: String) {
    debug_assert!(false, "{}", message);
    log::error!("{}", CoverageError::InvariantViolation(message));
}

/// Tile cache plus the coverage algorithm that maintains it
#[derive(Debug)]
pub struct CoverageEngine {
    config: CoverageConfig,
    tiles: HashMap<TileId, Tile>,
    next_token: u64,
    last_view: Option<ViewSnapshot>,
}

impl CoverageEngine {
    pub fn new(config: CoverageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tiles: HashMap::default(),
            next_token: 1,
            last_view: None,
        })
    }

    /// Tiles covering the viewport box at `zoom`
    pub fn required_tiles(&self, zoom: u8, corners: &[Point; 4]) -> Vec<TileId> {
        TileRange::from_corners(corners, zoom).iter().collect()
    }

    pub fn find_loaded_children(&self, id: TileId, max_covering_zoom: u8) -> ChildCoverage {
        find_loaded_children(&self.tiles, id, max_covering_zoom)
    }

    pub fn find_loaded_parent(&self, id: TileId, min_covering_zoom: u8) -> Option<TileId> {
        find_loaded_parent(&self.tiles, id, min_covering_zoom)
    }

    /// Required tiles plus the substitutes kept for those not ready yet.
    ///
    /// Ready children are preferred; the nearest ready parent is only added
    /// when the children do not cover the whole tile.
    pub fn retain_set(&self, required: &[TileId], zoom: u8) -> HashSet<TileId> {
        let max_covering_zoom = self.config.max_covering_zoom(zoom);
        let min_covering_zoom = self.config.min_covering_zoom(zoom);

        let mut retain: HashSet<TileId> = required.iter().copied().collect();
        for id in required {
            if self.tiles.get(id).map_or(false, Tile::is_ready) {
                continue;
            }

            let children = self.find_loaded_children(*id, max_covering_zoom);
            retain.extend(children.found);
            if !children.complete {
                if let Some(parent) = self.find_loaded_parent(*id, min_covering_zoom) {
                    retain.insert(parent);
                }
            }
        }
        retain
    }

    /// Recomputes coverage for `viewport`: creates and requests missing
    /// tiles, keeps substitutes, evicts everything else.
    pub fn refresh<D>(&mut self, viewport: &dyn ViewportProvider, dispatcher: &D) -> RefreshReport
    where
        D: LoadDispatcher + ?Sized,
    {
        let view = ViewSnapshot::capture(viewport, &self.config);
        self.refresh_view(view, dispatcher)
    }

    /// Repeats the last refresh, e.g. after a tile became ready or the
    /// configuration changed. `None` before the first refresh.
    pub fn refresh_last<D>(&mut self, dispatcher: &D) -> Option<RefreshReport>
    where
        D: LoadDispatcher + ?Sized,
    {
        let last = self.last_view.clone()?;
        // Zoom limits may have moved since the snapshot was taken.
        let zoom = self.config.clamp_zoom(last.zoom as i32);
        let view = if zoom == last.zoom {
            last
        } else {
            let scale = 2_f64.powi(zoom as i32 - last.zoom as i32);
            ViewSnapshot {
                zoom,
                corners: last.corners.map(|corner| corner.multiply(scale)),
            }
        };
        Some(self.refresh_view(view, dispatcher))
    }

    fn refresh_view<D>(&mut self, view: ViewSnapshot, dispatcher: &D) -> RefreshReport
    where
        D: LoadDispatcher + ?Sized,
    {
        let zoom = view.zoom;
        let required = self.required_tiles(zoom, &view.corners);
        if required.is_empty() {
            log::debug!("viewport covers no tiles at zoom {}", zoom);
        }

        let retain = self.retain_set(&required, zoom);
        let required_set: HashSet<TileId> = required.iter().copied().collect();
        let mut substitutes: Vec<TileId> = retain.difference(&required_set).copied().collect();
        substitutes.sort_by(render_cmp);

        let requested = self.dispatch_required(&required, dispatcher);
        let evicted = self.evict_except(&retain, dispatcher);

        log::debug!(
            "refresh at zoom {}: {} required, {} substitutes, {} requested, {} evicted, {} cached",
            zoom,
            required.len(),
            substitutes.len(),
            requested.len(),
            evicted.len(),
            self.tiles.len()
        );
        if self.config.debug {
            for id in self.render_order() {
                if let Some(tile) = self.tiles.get(&id) {
                    log::info!("  {} [{}] {:?}", id, id.quadkey(), tile.state());
                }
            }
        }

        self.last_view = Some(view);
        RefreshReport {
            zoom,
            required,
            substitutes,
            requested,
            evicted,
        }
    }

    /// Inserts missing required tiles and starts loads for those in `Initial`
    /// that the retry policy allows.
    fn dispatch_required<D>(&mut self, required: &[TileId], dispatcher: &D) -> Vec<LoadRequest>
    where
        D: LoadDispatcher + ?Sized,
    {
        let mut requested = Vec::new();
        for id in required {
            let tile = self.tiles.entry(*id).or_insert_with(|| Tile::new(*id));
            if tile.state() != TileState::Initial || !tile.should_retry(&self.config.retry) {
                continue;
            }

            let token = self.next_token;
            self.next_token += 1;
            match tile.begin_loading(token) {
                Ok(()) => {
                    let request = LoadRequest::new(*id, token);
                    log::debug!("requesting tile {} (token {})", id, token);
                    dispatcher.request(request);
                    requested.push(request);
                }
                Err(e) => invariant_violation(e.to_string()),
            }
        }
        requested
    }

    /// Cancels and removes every cached tile outside `retain`
    fn evict_except<D>(&mut self, retain: &HashSet<TileId>, dispatcher: &D) -> Vec<TileId>
    where
        D: LoadDispatcher + ?Sized,
    {
        let mut obsolete: Vec<TileId> = self
            .tiles
            .keys()
            .filter(|id| !retain.contains(id))
            .copied()
            .collect();
        obsolete.sort();

        let mut evicted = Vec::with_capacity(obsolete.len());
        for id in obsolete {
            let Some(mut tile) = self.tiles.remove(&id) else {
                invariant_violation(format!("tile {} vanished during eviction", id));
                continue;
            };
            match tile.cancel() {
                Ok(previous) => log::debug!("evicting tile {} ({:?})", id, previous),
                Err(e) => invariant_violation(e.to_string()),
            }
            dispatcher.abandon(id);
            evicted.push(id);
        }
        evicted
    }

    /// Evicts every cached tile
    pub fn clear<D>(&mut self, dispatcher: &D) -> Vec<TileId>
    where
        D: LoadDispatcher + ?Sized,
    {
        self.evict_except(&HashSet::default(), dispatcher)
    }

    /// Success callback from the dispatcher
    pub fn on_load_succeeded(&mut self, request: LoadRequest, payload: Vec<u8>) -> LoadOutcome {
        let Some(tile) = self.awaiting_tile(request) else {
            return LoadOutcome::Stale;
        };
        match tile.complete(payload) {
            Ok(()) => {
                log::debug!("tile {} ready", request.id);
                LoadOutcome::Applied
            }
            Err(e) => {
                invariant_violation(e.to_string());
                LoadOutcome::Stale
            }
        }
    }

    /// Failure callback from the dispatcher. The tile becomes eligible for a
    /// retry on a later refresh, within the retry budget.
    pub fn on_load_failed(&mut self, request: LoadRequest, reason: &str) -> LoadOutcome {
        let retry = self.config.retry.clone();
        let Some(tile) = self.awaiting_tile(request) else {
            return LoadOutcome::Stale;
        };
        if let Err(e) = tile.fail() {
            invariant_violation(e.to_string());
            return LoadOutcome::Stale;
        }

        log::warn!(
            "{}",
            CoverageError::LoadFailure {
                id: request.id,
                reason: reason.to_string(),
            }
        );
        if tile.retries_exhausted(&retry) {
            log::warn!("giving up on tile {} after {} failures", request.id, tile.failures());
        }
        LoadOutcome::Applied
    }

    fn awaiting_tile(&mut self, request: LoadRequest) -> Option<&mut Tile> {
        match self.tiles.get_mut(&request.id) {
            Some(tile) if tile.is_awaiting(request.token) => Some(tile),
            _ => {
                log::trace!("{}", CoverageError::StaleCallback(request.id));
                None
            }
        }
    }

    /// Ready tiles, most detailed zoom first
    pub fn tiles_for_render(&self) -> Vec<&Tile> {
        let mut ready: Vec<&Tile> = self.tiles.values().filter(|t| t.is_ready()).collect();
        ready.sort_by(|a, b| render_cmp(&a.id(), &b.id()));
        ready
    }

    /// Every cached tile id, most detailed zoom first
    pub fn render_order(&self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self.tiles.keys().copied().collect();
        ids.sort_by(render_cmp);
        ids
    }

    pub fn tile(&self, id: &TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.tiles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn last_view(&self) -> Option<&ViewSnapshot> {
        self.last_view.as_ref()
    }
}

impl Default for CoverageEngine {
    fn default() -> Self {
        Self {
            config: CoverageConfig::default(),
            tiles: HashMap::default(),
            next_token: 1,
            last_view: None,
        }
    }
}

impl Configurable for CoverageEngine {
    type Config = CoverageConfig;

    fn config(&self) -> &CoverageConfig {
        &self.config
    }

    fn set_config(&mut self, config: CoverageConfig) -> Result<()> {
        Self::validate_config(&config)?;
        self.config = config;
        Ok(())
    }

    fn validate_config(config: &CoverageConfig) -> Result<()> {
        config.validate()
    }
}
