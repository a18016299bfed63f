use async_trait::async_trait;
use fxhash::FxHashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tilecover::{
    CoverageConfig, CoverageEvent, LoaderConfig, Point, StaticViewport, TileFetcher, TileId,
    TileLoader, TileManager,
};

/// Camera moves replayed by the demo
#[derive(Debug, Clone, Copy)]
enum Step {
    Pan(f64, f64),
    ZoomTo(i32),
    Rotate(f64),
    ToggleDebug,
}

const SCRIPT: &[(&str, Step)] = &[
    ("pan east", Step::Pan(2.0, 0.0)),
    ("zoom in", Step::ZoomTo(6)),
    ("zoom in", Step::ZoomTo(7)),
    ("pan south", Step::Pan(0.0, 3.0)),
    ("rotate", Step::Rotate(0.5)),
    ("debug on", Step::ToggleDebug),
    ("zoom out", Step::ZoomTo(5)),
    ("debug off", Step::ToggleDebug),
    ("zoom out", Step::ZoomTo(3)),
];

/// Stands in for a tile server: fixed latency, and every seventh tile fails
/// on its first attempt.
struct SyntheticFetcher {
    latency: Duration,
    attempts: Mutex<FxHashMap<TileId, u32>>,
}

#[async_trait]
impl TileFetcher for SyntheticFetcher {
    async fn fetch(&self, id: TileId) -> tilecover::Result<Vec<u8>> {
        let attempt = {
            let mut attempts = self
                .attempts
                .lock()
                .map_err(|e| format!("attempt table poisoned: {}", e))?;
            let count = attempts.entry(id).or_insert(0);
            *count += 1;
            *count
        };

        tokio::time::sleep(self.latency).await;
        if attempt == 1 && (id.x + id.y * 3 + id.z as u32) % 7 == 0 {
            return Err(format!("HTTP 503 for tile {}", id).into());
        }
        Ok(id.quadkey().into_bytes())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tilecover::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => CoverageConfig::from_json_file(&path)?,
        None => CoverageConfig::default(),
    };
    log::info!("starting with {:?}", config);

    let fetcher = Arc::new(SyntheticFetcher {
        latency: Duration::from_millis(20),
        attempts: Mutex::new(FxHashMap::default()),
    });
    let loader = TileLoader::new(fetcher, LoaderConfig::default());
    let manager = TileManager::new(config, Arc::new(loader))?;
    let events = manager.subscribe();

    let mut viewport = StaticViewport::centered(5, Point::new(16.0, 11.0), 4.0, 3.0);
    manager.refresh(&viewport);
    run_frames(&manager, &viewport, "initial view").await;

    for (label, step) in SCRIPT {
        match *step {
            Step::Pan(dx, dy) => viewport.pan_by(Point::new(dx, dy)),
            Step::ZoomTo(zoom) => viewport.zoom_to(zoom),
            Step::Rotate(radians) => viewport.rotate(radians),
            Step::ToggleDebug => {
                manager.toggle_debug()?;
            }
        }
        manager.refresh(&viewport);
        run_frames(&manager, &viewport, label).await;
    }

    let ready = events
        .try_iter()
        .filter(|event| matches!(event, CoverageEvent::TileReady(_)))
        .count();
    println!("done: {} tiles became ready over the session", ready);
    Ok(())
}

/// Renders frames until the loader goes idle
async fn run_frames(manager: &TileManager<TileLoader>, viewport: &StaticViewport, label: &str) {
    for frame in 0..50 {
        manager.pump_results();
        // Failed tiles are retried on refresh.
        manager.refresh(viewport);

        let (drawn, zooms) = manager.with_render_tiles(|tiles| {
            let zooms: Vec<String> = tiles.iter().map(|tile| tile.id.z.to_string()).collect();
            (tiles.len(), zooms.join(","))
        });
        let pending = manager.dispatcher().pending_count();
        println!(
            "[{}] frame {:>2}: zoom {} drawn {:>3} [{}] cached {:>3} pending {:>3}",
            label,
            frame,
            viewport.zoom(),
            drawn,
            zooms,
            manager.tile_count(),
            pending
        );

        if pending == 0 && manager.dispatcher().result_receiver().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
