pub mod coverage;
pub mod dispatcher;
#[cfg(feature = "tokio-runtime")]
pub mod loader;
pub mod manager;
pub mod render;
pub mod tile;
