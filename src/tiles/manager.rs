//! Thread-safe front end to the coverage engine
//!
//! Viewport changes and load callbacks may arrive on different threads. The
//! manager serializes them through one mutex around the engine and tells
//! interested parties what changed through [`CoverageEvent`]s.

use crate::{
    core::{config::CoverageConfig, geo::TileId, viewport::ViewportProvider},
    prelude::{Arc, Mutex},
    tiles::{
        coverage::{CoverageEngine, LoadOutcome, RefreshReport},
        dispatcher::{LoadDispatcher, LoadRequest, LoadResult},
        render::{RenderSelector, RenderTile},
        tile::TileState,
    },
    traits::Configurable,
    Result,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{MutexGuard, PoisonError};

/// Notification sent to subscribers after the cache changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageEvent {
    /// A refresh ran; the render set may have changed
    Refreshed {
        zoom: u8,
        requested: usize,
        evicted: usize,
    },
    TileReady(TileId),
    TileFailed { id: TileId, reason: String },
    ConfigChanged,
}

impl From<&RefreshReport> for CoverageEvent {
    fn from(report: &RefreshReport) -> Self {
        Self::Refreshed {
            zoom: report.zoom,
            requested: report.requested.len(),
            evicted: report.evicted.len(),
        }
    }
}

pub struct TileManager<D: LoadDispatcher> {
    engine: Arc<Mutex<CoverageEngine>>,
    dispatcher: Arc<D>,
    subscribers: Mutex<Vec<Sender<CoverageEvent>>>,
}

impl<D: LoadDispatcher> TileManager<D> {
    pub fn new(config: CoverageConfig, dispatcher: Arc<D>) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Mutex::new(CoverageEngine::new(config)?)),
            dispatcher,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// The engine holds no invariant a panicking reader could leave broken
    fn engine(&self) -> MutexGuard<'_, CoverageEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point for every viewport change: pan, zoom, rotate, resize
    pub fn refresh(&self, viewport: &dyn ViewportProvider) -> RefreshReport {
        let report = self.engine().refresh(viewport, self.dispatcher.as_ref());
        self.emit(CoverageEvent::from(&report));
        report
    }

    /// Success callback. Re-runs the last refresh so substitutes that are no
    /// longer needed get evicted.
    pub fn on_load_succeeded(&self, request: LoadRequest, payload: Vec<u8>) -> LoadOutcome {
        let (outcome, report) = {
            let mut engine = self.engine();
            let outcome = engine.on_load_succeeded(request, payload);
            let report = match outcome {
                LoadOutcome::Applied => engine.refresh_last(self.dispatcher.as_ref()),
                LoadOutcome::Stale => None,
            };
            (outcome, report)
        };

        if outcome == LoadOutcome::Applied {
            self.emit(CoverageEvent::TileReady(request.id));
        }
        if let Some(report) = report {
            self.emit(CoverageEvent::from(&report));
        }
        outcome
    }

    pub fn on_load_failed(&self, request: LoadRequest, reason: &str) -> LoadOutcome {
        let outcome = self.engine().on_load_failed(request, reason);
        if outcome == LoadOutcome::Applied {
            self.emit(CoverageEvent::TileFailed {
                id: request.id,
                reason: reason.to_string(),
            });
        }
        outcome
    }

    /// Routes a dispatcher result to the matching callback
    pub fn handle_result(&self, result: LoadResult) -> LoadOutcome {
        match result.data {
            Ok(payload) => self.on_load_succeeded(result.request, payload),
            Err(e) => self.on_load_failed(result.request, &e.to_string()),
        }
    }

    /// Runs `f` over the current draw list while the cache is locked
    pub fn with_render_tiles<R>(&self, f: impl FnOnce(&[RenderTile<'_>]) -> R) -> R {
        let engine = self.engine();
        let tiles = RenderSelector::new(&engine).tiles();
        f(&tiles)
    }

    pub fn subscribe(&self) -> Receiver<CoverageEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn emit(&self, event: CoverageEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn config(&self) -> CoverageConfig {
        self.engine().config().clone()
    }

    /// Applies a validated configuration change and refreshes the last view
    pub fn update_config<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut CoverageConfig),
    {
        let report = {
            let mut engine = self.engine();
            engine.update_config(updater)?;
            engine.refresh_last(self.dispatcher.as_ref())
        };

        self.emit(CoverageEvent::ConfigChanged);
        if let Some(report) = report {
            self.emit(CoverageEvent::from(&report));
        }
        Ok(())
    }

    /// Flips the debug flag, returning the new value
    pub fn toggle_debug(&self) -> Result<bool> {
        let mut debug = false;
        self.update_config(|config| {
            config.debug = !config.debug;
            debug = config.debug;
        })?;
        log::info!("debug mode {}", if debug { "on" } else { "off" });
        Ok(debug)
    }

    pub fn tile_state(&self, id: &TileId) -> Option<TileState> {
        self.engine().tile(id).map(|tile| tile.state())
    }

    pub fn tile_count(&self) -> usize {
        self.engine().len()
    }

    /// Evicts the whole cache, abandoning in-flight loads
    pub fn clear(&self) -> Vec<TileId> {
        self.engine().clear(self.dispatcher.as_ref())
    }
}

#[cfg(feature = "tokio-runtime")]
impl TileManager<crate::tiles::loader::TileLoader> {
    /// Feeds finished loads back into the cache. Returns how many results
    /// were applied.
    pub fn pump_results(&self) -> usize {
        self.dispatcher
            .try_recv_results()
            .into_iter()
            .map(|result| self.handle_result(result))
            .filter(|outcome| *outcome == LoadOutcome::Applied)
            .count()
    }
}
