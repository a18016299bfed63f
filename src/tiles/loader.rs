use crate::{
    core::{config::LoaderConfig, geo::TileId},
    prelude::{Arc, HashMap, Mutex},
    runtime::{spawners::tokio_impl::TokioSpawner, AsyncHandle, AsyncSpawner},
    tiles::dispatcher::{LoadDispatcher, LoadRequest, LoadResult},
    CoverageError, Result,
};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{MutexGuard, PoisonError};
use tokio::{runtime::Handle, sync::Semaphore};

/// Source of tile content: network, disk, a test fixture...
#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    async fn fetch(&self, id: TileId) -> Result<Vec<u8>>;
}

struct InFlight {
    token: u64,
    handle: Box<dyn AsyncHandle>,
}

type InFlightMap = Arc<Mutex<HashMap<TileId, InFlight>>>;

fn lock_in_flight(in_flight: &Mutex<HashMap<TileId, InFlight>>) -> MutexGuard<'_, HashMap<TileId, InFlight>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Async load dispatcher with bounded concurrency.
///
/// Every request runs as its own task; results are delivered over a channel
/// and picked up with [`TileLoader::try_recv_results`] or
/// [`TileLoader::result_receiver`].
///
/// A loader built inside a tokio runtime keeps spawning onto that runtime, so
/// refreshes may come from any thread. One built elsewhere falls back to the
/// runtime installed with [`crate::runtime::init_runtime`].
pub struct TileLoader {
    fetcher: Arc<dyn TileFetcher>,
    config: LoaderConfig,
    semaphore: Arc<Semaphore>,
    result_tx: Sender<LoadResult>,
    result_rx: Receiver<LoadResult>,
    in_flight: InFlightMap,
    spawner: Option<TokioSpawner>,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn TileFetcher>, config: LoaderConfig) -> Self {
        Self::build(fetcher, config, TokioSpawner::capture())
    }

    /// Loader that spawns its fetches onto `handle`
    pub fn with_handle(fetcher: Arc<dyn TileFetcher>, config: LoaderConfig, handle: Handle) -> Self {
        Self::build(fetcher, config, Some(TokioSpawner::with_handle(handle)))
    }

    fn build(fetcher: Arc<dyn TileFetcher>, config: LoaderConfig, spawner: Option<TokioSpawner>) -> Self {
        let (result_tx, result_rx) = unbounded();
        let permits = config.max_concurrent.max(1);
        log::debug!(
            "tile loader starting with max_concurrent: {}, timeout: {:?}, pinned runtime: {}",
            permits,
            config.fetch_timeout(),
            spawner.is_some()
        );

        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            result_tx,
            result_rx,
            in_flight: Arc::new(Mutex::new(HashMap::default())),
            spawner,
        }
    }

    pub fn with_default_config(fetcher: Arc<dyn TileFetcher>) -> Self {
        Self::new(fetcher, LoaderConfig::default())
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Try to receive completed results (non-blocking)
    pub fn try_recv_results(&self) -> Vec<LoadResult> {
        self.result_rx.try_iter().collect()
    }

    /// Get the result receiver, e.g. for a blocking pump thread
    pub fn result_receiver(&self) -> &Receiver<LoadResult> {
        &self.result_rx
    }

    /// Number of fetches started and neither finished nor abandoned
    pub fn pending_count(&self) -> usize {
        let mut in_flight = lock_in_flight(&self.in_flight);
        in_flight.retain(|_, entry| !entry.handle.is_finished());
        in_flight.len()
    }

    fn spawn_fetch(&self, request: LoadRequest) -> Result<Box<dyn AsyncHandle>> {
        let fetcher = Arc::clone(&self.fetcher);
        let semaphore = Arc::clone(&self.semaphore);
        let result_tx = self.result_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.config.fetch_timeout();

        let task = async move {
            let data = match semaphore.acquire_owned().await {
                Ok(_permit) => match tokio::time::timeout(timeout, fetcher.fetch(request.id)).await {
                    Ok(result) => result,
                    Err(_) => Err(CoverageError::Loader(format!(
                        "fetch of tile {} timed out after {:?}",
                        request.id, timeout
                    ))
                    .into()),
                },
                Err(e) => Err(CoverageError::Loader(e.to_string()).into()),
            };

            {
                let mut in_flight = lock_in_flight(&in_flight);
                if in_flight.get(&request.id).map(|entry| entry.token) == Some(request.token) {
                    in_flight.remove(&request.id);
                }
            }
            let _ = result_tx.send(LoadResult { request, data });
        };

        match &self.spawner {
            Some(spawner) => spawner.spawn_boxed(Box::pin(task)),
            None => crate::runtime::spawn(task),
        }
    }
}

impl LoadDispatcher for TileLoader {
    fn request(&self, request: LoadRequest) {
        // Held across the spawn so the task cannot finish before it is tracked.
        let mut in_flight = lock_in_flight(&self.in_flight);
        match self.spawn_fetch(request) {
            Ok(handle) => {
                log::trace!("fetching tile {} (token {})", request.id, request.token);
                let entry = InFlight {
                    token: request.token,
                    handle,
                };
                if let Some(superseded) = in_flight.insert(request.id, entry) {
                    superseded.handle.cancel();
                }
            }
            Err(e) => {
                log::error!("failed to spawn fetch for tile {}: {}", request.id, e);
                let _ = self.result_tx.send(LoadResult {
                    request,
                    data: Err(e),
                });
            }
        }
    }

    fn abandon(&self, id: TileId) {
        if let Some(entry) = lock_in_flight(&self.in_flight).remove(&id) {
            log::debug!("abandoning fetch for tile {}", id);
            entry.handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedFetcher {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TileFetcher for ScriptedFetcher {
        async fn fetch(&self, id: TileId) -> Result<Vec<u8>> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if id.x % 2 == 1 {
                return Err(format!("HTTP 404 for tile {}", id).into());
            }
            Ok(id.quadkey().into_bytes())
        }
    }

    async fn collect(loader: &TileLoader, expected: usize) -> Vec<LoadResult> {
        let mut results = Vec::new();
        for _ in 0..200 {
            results.extend(loader.try_recv_results());
            if results.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        results
    }

    #[tokio::test]
    async fn test_results_are_delivered() {
        let loader = TileLoader::new(ScriptedFetcher::new(1), LoaderConfig::for_testing());
        loader.request(LoadRequest::new(TileId::new(2, 1, 2), 1));
        loader.request(LoadRequest::new(TileId::new(1, 1, 2), 2));

        let mut results = collect(&loader, 2).await;
        results.sort_by_key(|r| r.request.token);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].data.as_ref().unwrap(), b"12");
        assert!(results[1].data.is_err());
        assert_eq!(results[1].request.id, TileId::new(1, 1, 2));
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let fetcher = ScriptedFetcher::new(10);
        let loader = TileLoader::new(fetcher.clone(), LoaderConfig::for_testing());
        for x in 0..6 {
            loader.request(LoadRequest::new(TileId::new(x * 2, 0, 4), x as u64));
        }

        let results = collect(&loader, 6).await;
        assert_eq!(results.len(), 6);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let config = LoaderConfig {
            max_concurrent: 1,
            fetch_timeout_ms: 20,
        };
        let loader = TileLoader::new(ScriptedFetcher::new(1_000), config);
        loader.request(LoadRequest::new(TileId::new(0, 0, 0), 9));

        let results = collect(&loader, 1).await;
        let err = results[0].data.as_ref().unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_abandoned_fetch_reports_nothing() {
        let loader = TileLoader::new(ScriptedFetcher::new(50), LoaderConfig::for_testing());
        let id = TileId::new(0, 0, 3);
        loader.request(LoadRequest::new(id, 1));
        assert_eq!(loader.pending_count(), 1);

        loader.abandon(id);
        assert_eq!(loader.pending_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(loader.try_recv_results().is_empty());
    }

    #[test]
    fn test_requests_from_plain_threads_use_the_loader_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let loader = {
            let _guard = rt.enter();
            Arc::new(TileLoader::new(ScriptedFetcher::new(1), LoaderConfig::for_testing()))
        };
        let pinned = TileLoader::with_handle(ScriptedFetcher::new(1), LoaderConfig::for_testing(), rt.handle().clone());

        let requester = {
            let loader = Arc::clone(&loader);
            std::thread::spawn(move || loader.request(LoadRequest::new(TileId::new(2, 1, 2), 1)))
        };
        requester.join().unwrap();
        pinned.request(LoadRequest::new(TileId::new(0, 1, 2), 2));

        for (loader, expected) in [(loader.as_ref(), &b"12"[..]), (&pinned, &b"02"[..])] {
            let result = loader.result_receiver().recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(result.data.unwrap(), expected);
        }
    }

    #[test]
    fn test_request_without_runtime_fails_the_load() {
        let loader = TileLoader::new(ScriptedFetcher::new(0), LoaderConfig::for_testing());
        loader.request(LoadRequest::new(TileId::new(0, 0, 1), 4));

        let results = loader.try_recv_results();
        assert_eq!(results.len(), 1);
        assert!(results[0].data.is_err());
        assert_eq!(loader.pending_count(), 0);
    }
}
