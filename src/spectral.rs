// src/spectral.rs

//! Recovering per-position sums from lane Points.
//!
//! Lane `i` holds `seed + shift + sum of every term whose block position t has
//! bit t set in i`. Exactly half of the lanes carry a given bit, so for each
//! position t:
//!
//! ```text
//! sum(P_i : bit t of i set) - sum(P_i : bit t of i clear) = 2^(k-1) * S_t
//! ```
//!
//! where `S_t` is the sum of all processed terms at position `t` (mod k). Both
//! halves contain the same number of lanes, so the seed and any uniform
//! re-centring shift cancel.

use crate::engine::accumulator::Point;
use crate::engine::lane_count;
use crate::error::EngineError;

/// `S_t` for every block position `t` in `0..k`.
pub fn position_sums(points: &[Point], k: u32) -> Result<Vec<Point>, EngineError> {
    let lanes = lane_count(k)?;
    if points.len() != lanes {
        return Err(EngineError::LaneCountMismatch {
            expected: lanes,
            actual: points.len(),
        });
    }
    let half = (lanes / 2) as f64;

    Ok((0..k)
        .map(|t| {
            let mask = 1usize << t;
            let (set, clear) = points.iter().enumerate().fold(
                (Point::default(), Point::default()),
                |(set, clear), (i, p)| {
                    if i & mask != 0 {
                        (set + p, clear)
                    } else {
                        (set, clear + p)
                    }
                },
            );
            (set - clear) / half
        })
        .collect())
}

/// Sum of every processed term, recovered from the lanes.
pub fn series_sum(points: &[Point], k: u32) -> Result<Point, EngineError> {
    Ok(position_sums(points, k)?.into_iter().sum())
}
