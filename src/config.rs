// src/config.rs

//! Defines the configuration structures for `subserial`.
//!
//! The whole tree deserializes from a JSON file; every section and field has a
//! default, so a file only needs to name what it changes. Command-line flags
//! are applied on top of whatever is loaded here.

use crate::engine::dispatch::{BackendKind, DEFAULT_PARALLEL_THRESHOLD};
use crate::engine::TraceFlags;
use crate::render::{DEFAULT_HEIGHT, DEFAULT_RADIUS_PX, DEFAULT_WIDTH};
use crate::series::SeriesFunction;
use anyhow::{Context, Result};
use log::{info, warn};
use num_complex::Complex64;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};


/// Environment variable naming a config file for `CONFIG`.
pub const CONFIG_ENV_VAR: &str = "SUBSERIAL_CONFIG";

/// Process-wide configuration: `$SUBSERIAL_CONFIG` if set and readable,
/// defaults otherwise.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match std::env::var_os(CONFIG_ENV_VAR) {
    Some(path) => Config::load(Path::new(&path)).unwrap_or_else(|e| {
        warn!("Ignoring {}: {:#}", CONFIG_ENV_VAR, e);
        Config::default()
    }),
    None => Config::default(),
});

// --- Top-Level Configuration Structure ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub series: SeriesConfig,
    pub sink: SinkConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

// --- Engine Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Parallelism exponent `k`: `2^k` lanes, codes reset every `k` terms.
    pub parallelism: u32,
    pub backend: BackendKind,
    /// Worker threads for the parallel backend. `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Lane counts below this run serially even on the parallel backend.
    pub parallel_threshold: usize,
    pub trace: TraceFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parallelism: 15,
            backend: BackendKind::Parallel,
            threads: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            trace: TraceFlags::empty(),
        }
    }
}

// --- Series Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeriesConfig {
    pub function: SeriesFunction,
    /// Number of terms to feed the engine.
    pub terms: usize,
    /// Expansion point `a`, as `[re, im]`.
    pub base_point: Complex64,
    /// Evaluation point `z0`, as `[re, im]`.
    pub eval_point: Complex64,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        SeriesConfig {
            function: SeriesFunction::Exp,
            terms: 30,
            base_point: Complex64::new(0.0, 0.0),
            eval_point: Complex64::new(1.0, 1.5),
        }
    }
}

// --- Sink Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    /// Write into a buffer shared with a monitor thread instead of host memory.
    pub shared: bool,
    /// Re-centre Points each step. `None` follows the sink (on for shared).
    pub recenter: Option<bool>,
    pub monitor_interval_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            shared: false,
            recenter: None,
            monitor_interval_ms: 16,
        }
    }
}

// --- Output Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub image_path: PathBuf,
    /// JSON dump of the final Points. `None` disables the dump.
    pub dump_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    /// Distance in pixels from the canvas centre to the farthest Point.
    pub radius_px: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            image_path: PathBuf::from("output.png"),
            dump_path: Some(PathBuf::from("dump.json")),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            radius_px: DEFAULT_RADIUS_PX,
        }
    }
}
