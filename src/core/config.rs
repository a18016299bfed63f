//! Configuration for coverage computation, retry behaviour and tile loading
//!
//! Configurations can be built from presets through [`CoverageProfile`],
//! assembled by hand, or read from JSON. They are explicit inputs to the
//! engine rather than mutable shared state.

use crate::constants::{
    DEFAULT_CHILD_SEARCH_DEPTH, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_PARENT_SEARCH_DEPTH,
    DEFAULT_RETRY_DELAY_MS, MAX_CHILD_SEARCH_DEPTH, MAX_SUPPORTED_ZOOM,
};
use crate::{CoverageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageProfile {
    Balanced,
    LowMemory,
    HighQuality,
    Custom(CoverageConfig),
}

impl CoverageProfile {
    pub fn resolve(&self) -> CoverageConfig {
        match self {
            Self::Balanced => CoverageConfig::default(),
            Self::LowMemory => CoverageConfig {
                child_search_depth: 1,
                parent_search_depth: 2,
                retry: RetryConfig {
                    max_retries: 1,
                    retry_delay_ms: 1000,
                    exponential_backoff: false,
                },
                ..CoverageConfig::default()
            },
            Self::HighQuality => CoverageConfig {
                max_zoom: 18,
                child_search_depth: 2,
                parent_search_depth: 10,
                retry: RetryConfig {
                    max_retries: 5,
                    retry_delay_ms: 250,
                    exponential_backoff: true,
                },
                ..CoverageConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for CoverageProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Zoom limits and substitution search bounds of a [`crate::CoverageEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Levels below the ideal zoom searched for loaded children
    pub child_search_depth: u8,
    /// Levels above the ideal zoom searched for a loaded parent
    pub parent_search_depth: u8,
    pub retry: RetryConfig,
    /// Expose pending tiles to the renderer and log the tile table per refresh
    pub debug: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            child_search_depth: DEFAULT_CHILD_SEARCH_DEPTH,
            parent_search_depth: DEFAULT_PARENT_SEARCH_DEPTH,
            retry: RetryConfig::default(),
            debug: false,
        }
    }
}

impl CoverageConfig {
    pub fn with_zoom_limits(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_zoom > self.max_zoom {
            return Err(CoverageError::InvalidConfig(format!(
                "min_zoom {} is above max_zoom {}",
                self.min_zoom, self.max_zoom
            ))
            .into());
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(CoverageError::InvalidConfig(format!(
                "max_zoom {} exceeds the supported maximum {}",
                self.max_zoom, MAX_SUPPORTED_ZOOM
            ))
            .into());
        }
        if self.child_search_depth > MAX_CHILD_SEARCH_DEPTH {
            return Err(CoverageError::InvalidConfig(format!(
                "child_search_depth {} exceeds the supported maximum {}",
                self.child_search_depth, MAX_CHILD_SEARCH_DEPTH
            ))
            .into());
        }
        Ok(())
    }

    /// Clamps a raw viewport zoom into `[min_zoom, max_zoom]`
    pub fn clamp_zoom(&self, zoom: i32) -> u8 {
        zoom.clamp(self.min_zoom as i32, self.max_zoom as i32) as u8
    }

    /// Deepest zoom searched for loaded children of a tile at `zoom`
    pub fn max_covering_zoom(&self, zoom: u8) -> u8 {
        self.clamp_zoom(zoom as i32 + self.child_search_depth as i32)
    }

    /// Shallowest zoom searched for a loaded parent of a tile at `zoom`
    pub fn min_covering_zoom(&self, zoom: u8) -> u8 {
        self.clamp_zoom(zoom as i32 - self.parent_search_depth as i32)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(CoverageError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(CoverageError::from)?;
        Self::from_json_str(&json)
    }
}

/// Bounded retry policy for tiles whose load failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts allowed after the first one fails
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            exponential_backoff: true,
        }
    }
}

impl RetryConfig {
    /// Retries as soon as the next refresh runs, up to `max_retries` times
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_delay_ms: 0,
            exponential_backoff: false,
        }
    }
}

/// Configuration for the asynchronous tile loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum concurrent fetches
    pub max_concurrent: usize,
    /// Fetches running longer than this are reported as failed
    pub fetch_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl LoaderConfig {
    pub fn low_resource() -> Self {
        Self {
            max_concurrent: 4,
            fetch_timeout_ms: 20_000,
        }
    }

    pub fn high_performance() -> Self {
        Self {
            max_concurrent: 64,
            fetch_timeout_ms: 5_000,
        }
    }

    pub fn for_testing() -> Self {
        Self {
            max_concurrent: 2,
            fetch_timeout_ms: 500,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
