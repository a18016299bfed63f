//! Runtime abstraction layer for async operations
//!
//! The tile loader spawns its fetches through this module instead of calling
//! a specific executor, so embedders can plug in their own runtime with
//! [`init_runtime`].

use crate::prelude::{Future, Pin};
use crate::{CoverageError, Result};
use once_cell::sync::OnceCell;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Result<Box<dyn AsyncHandle>>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning with type safety
pub fn spawn<F>(future: F) -> Result<Box<dyn AsyncHandle>>
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime()?.spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::super::*;
        use ::tokio::task::JoinHandle;

        use ::tokio::runtime::Handle;

        /// Tokio-based async spawner. Spawns onto its pinned runtime, or onto
        /// the runtime the caller is running in when none was given.
        #[derive(Default, Clone)]
        pub struct TokioSpawner {
            handle: Option<Handle>,
        }

        impl TokioSpawner {
            /// Spawner bound to `handle`, usable from any thread
            pub fn with_handle(handle: Handle) -> Self {
                Self { handle: Some(handle) }
            }

            /// Binds to the runtime of the calling context, if there is one
            pub fn capture() -> Option<Self> {
                Handle::try_current().ok().map(Self::with_handle)
            }
        }

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Result<Box<dyn AsyncHandle>> {
                let handle = match &self.handle {
                    Some(handle) => handle.clone(),
                    None => Handle::try_current().map_err(|e| CoverageError::Loader(e.to_string()))?,
                };
                Ok(Box::new(TokioHandle(handle.spawn(future))))
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

/// Global runtime instance
static RUNTIME: OnceCell<Box<dyn AsyncSpawner>> = OnceCell::new();

/// Initialize the runtime with a specific spawner. Returns `false` if a
/// runtime was already installed.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) -> bool {
    RUNTIME.set(spawner).is_ok()
}

/// Get the global runtime spawner
pub fn runtime() -> Result<&'static dyn AsyncSpawner> {
    let spawner = RUNTIME.get_or_try_init(default_spawner)?;
    Ok(spawner.as_ref())
}

#[cfg(feature = "tokio-runtime")]
fn default_spawner() -> Result<Box<dyn AsyncSpawner>> {
    Ok(Box::new(spawners::tokio_impl::TokioSpawner::default()))
}

#[cfg(not(feature = "tokio-runtime"))]
fn default_spawner() -> Result<Box<dyn AsyncSpawner>> {
    Err(CoverageError::Loader(
        "No async runtime available. Enable 'tokio-runtime' or call init_runtime.".to_string(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_spawner() {
        let handle = spawn(async {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(10)).await;
        })
        .unwrap();

        // Should not be finished immediately
        assert!(!handle.is_finished());

        // Wait a bit and check again
        ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_cancel_stops_task() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn(async move {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
            let _ = tx.send(());
        })
        .unwrap();

        handle.cancel();
        ::tokio::time::sleep(::tokio::time::Duration::from_millis(100)).await;
        assert!(handle.is_finished());
        assert!(rx.try_recv().is_err());
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_spawn_outside_runtime_is_an_error() {
        assert!(spawn(async {}).is_err());
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_pinned_spawner_works_from_plain_threads() {
        use spawners::tokio_impl::TokioSpawner;

        assert!(TokioSpawner::capture().is_none());

        let rt = ::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let spawner = TokioSpawner::with_handle(rt.handle().clone());

        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::spawn(move || {
            spawner
                .spawn_boxed(Box::pin(async move {
                    let _ = tx.send(7);
                }))
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(2)), Ok(7));
    }
}
