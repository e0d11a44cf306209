// src/engine/dispatch.rs

//! Data-parallel "apply `f` to every lane" primitive.
//!
//! Every stage of a step (reset, decode, accumulate, advance) is a single call
//! to `LaneDispatch::for_each_lane`. The call returns only after every lane has
//! been visited, which is the barrier between consecutive stages.

use crate::error::EngineError;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lane counts below this stay on the calling thread even with a thread pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Which dispatcher to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Serial,
    #[default]
    Parallel,
}

impl FromStr for BackendKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(BackendKind::Serial),
            "parallel" | "rayon" => Ok(BackendKind::Parallel),
            other => Err(EngineError::BackendInit(format!(
                "unknown backend '{}' (expected serial or parallel)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Serial => write!(f, "serial"),
            BackendKind::Parallel => write!(f, "parallel"),
        }
    }
}

/// Executes a per-lane closure over a lane-indexed slice.
#[derive(Debug)]
pub enum LaneDispatch {
    /// Plain loop on the calling thread.
    Serial,
    /// Rayon pool owned by the engine. Slices shorter than `threshold` run serially.
    Parallel {
        pool: rayon::ThreadPool,
        threshold: usize,
    },
}

impl LaneDispatch {
    /// Builds a dispatcher. Pool construction failure is the only backend
    /// initialisation error this crate can hit.
    pub fn new(
        kind: BackendKind,
        threads: Option<usize>,
        threshold: usize,
    ) -> Result<Self, EngineError> {
        match kind {
            BackendKind::Serial => {
                debug!("LaneDispatch: using serial lane loop");
                Ok(LaneDispatch::Serial)
            }
            BackendKind::Parallel => {
                let mut builder =
                    rayon::ThreadPoolBuilder::new().thread_name(|i| format!("lane-worker-{}", i));
                if let Some(n) = threads {
                    builder = builder.num_threads(n);
                }
                let pool = builder
                    .build()
                    .map_err(|e| EngineError::BackendInit(e.to_string()))?;
                info!(
                    "LaneDispatch: rayon pool with {} threads (serial below {} lanes)",
                    pool.current_num_threads(),
                    threshold
                );
                Ok(LaneDispatch::Parallel { pool, threshold })
            }
        }
    }

    pub fn serial() -> Self {
        LaneDispatch::Serial
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            LaneDispatch::Serial => BackendKind::Serial,
            LaneDispatch::Parallel { .. } => BackendKind::Parallel,
        }
    }

    /// Calls `f(lane_index, &mut lanes[lane_index])` for every lane.
    ///
    /// `f` must only touch its own lane plus shared read-only state; there is no
    /// ordering between lanes.
    pub fn for_each_lane<T, F>(&self, lanes: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        match self {
            LaneDispatch::Parallel { pool, threshold } if lanes.len() >= *threshold => {
                pool.install(|| {
                    lanes
                        .par_iter_mut()
                        .enumerate()
                        .for_each(|(i, lane)| f(i, lane))
                });
            }
            _ => lanes
                .iter_mut()
                .enumerate()
                .for_each(|(i, lane)| f(i, lane)),
        }
    }
}
