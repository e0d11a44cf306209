// src/lib.rs

//! Subserial library crate.
//!
//! Splits the summation of a complex term stream across `2^k` lanes. Each lane
//! sums the terms whose block position matches a set bit of its index, so
//! linear combinations of lane sums recover per-position partial sums.
//!
//! This exposes the engine and its collaborators for the binary and for tests.

/// Configuration management.
pub mod config;
/// Lane engine: codes, decoding, accumulation and the step protocol.
pub mod engine;
/// Error types.
pub mod error;
/// Background reader of a shared Point buffer.
pub mod monitor;
/// PNG and JSON output.
pub mod render;
/// Term sources.
pub mod series;
/// Point buffers the engine writes into.
pub mod sink;
/// Reconstruction of per-position sums from lane Points.
pub mod spectral;

pub use engine::accumulator::Point;
pub use engine::ComputeEngine;
pub use error::{EngineError, SeriesError};
