// this_file: src/config.rs
//! Process-wide configuration
//!
//! Read once at startup, from a JSON file or defaults, with optional
//! environment overrides.

use crate::error::{Error, Result};
use crate::lru_index::MAX_CAPACITY;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `cache_size_log2`
pub const ENV_CACHE_SIZE: &str = "GLYPHCACHE_CACHE_SIZE";
/// Environment variable overriding `render_filter`
pub const ENV_RENDER_FILTER: &str = "GLYPHCACHE_RENDER_FILTER";

/// Horizontal FIR filter applied to rendered coverage masks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFilter {
    None,
    #[default]
    Default,
    Light,
}

impl RenderFilter {
    /// Five-tap weights summing to 256
    pub fn weights(self) -> Option<[u16; 5]> {
        match self {
            RenderFilter::None => None,
            RenderFilter::Default => Some([8, 77, 86, 77, 8]),
            RenderFilter::Light => Some([0, 85, 86, 85, 0]),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "none" => Ok(RenderFilter::None),
            "default" => Ok(RenderFilter::Default),
            "light" => Ok(RenderFilter::Light),
            other => Err(Error::Config(format!("Unknown render filter: {}", other))),
        }
    }
}

fn default_cache_size_log2() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cache service configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Base-2 logarithm of the glyph-run cache capacity, in strings
    #[serde(default = "default_cache_size_log2")]
    pub cache_size_log2: u32,
    #[serde(default)]
    pub render_filter: RenderFilter,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size_log2: default_cache_size_log2(),
            render_filter: RenderFilter::default(),
            log_level: default_log_level(),
        }
    }
}

impl CacheConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_json(&json)
    }

    /// Apply `GLYPHCACHE_*` environment overrides.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_CACHE_SIZE) {
            self.cache_size_log2 = value.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be an integer, got '{}'", ENV_CACHE_SIZE, value))
            })?;
        }
        if let Ok(value) = std::env::var(ENV_RENDER_FILTER) {
            self.render_filter = RenderFilter::parse(value.trim())?;
        }
        Ok(self)
    }

    /// Glyph-run cache capacity in strings, at most 2^24.
    pub fn capacity(&self) -> usize {
        let max_log2 = MAX_CAPACITY.trailing_zeros();
        if self.cache_size_log2 > max_log2 {
            warn!(
                "cache_size_log2 {} exceeds {}, clamping",
                self.cache_size_log2, max_log2
            );
        }
        1usize << self.cache_size_log2.min(max_log2)
    }
}
