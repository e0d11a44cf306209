// src/error.rs

//! Error types for the lane engine and the series front end.

use thiserror::Error;

/// Failures raised while building or driving a `ComputeEngine`.
///
/// Everything except `SinkPoisoned` is a setup-time error: once an engine
/// exists, stepping it cannot fail unless a reader of a shared buffer panicked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("parallelism exponent k = {k} is out of range (expected 1..={max})")]
    InvalidParallelism { k: u32, max: u32 },
    #[error("failed to initialise lane dispatch backend: {0}")]
    BackendInit(String),
    #[error("point sink holds {actual} lanes, engine expects {expected}")]
    LaneCountMismatch { expected: usize, actual: usize },
    #[error("shared point buffer lock poisoned by a panicking reader")]
    SinkPoisoned,
}

/// Failures raised while configuring a term source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("unknown series function '{0}' (expected exp, geometric, sin, cos or log1p)")]
    UnknownFunction(String),
    #[error("invalid complex literal '{0}'")]
    InvalidComplex(String),
}
