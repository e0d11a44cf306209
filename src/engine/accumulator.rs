// src/engine/accumulator.rs

//! Per-lane complex running sums.

use super::dispatch::LaneDispatch;
use num_complex::Complex64;

/// A lane's running partial sum.
pub type Point = Complex64;

/// Initial value of every lane. Off the origin so a lane that never includes a
/// term stays distinguishable from one whose terms cancel.
pub const SEED: Point = Complex64::new(1.0, 0.0);

/// Stateless operations over a borrowed Point slice.
///
/// Points live in a `PointSink`; the accumulator only mutates them while the
/// engine holds the sink's write access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneAccumulator {
    seed: Point,
}

impl Default for LaneAccumulator {
    fn default() -> Self {
        LaneAccumulator { seed: SEED }
    }
}

impl LaneAccumulator {
    pub fn new(seed: Point) -> Self {
        LaneAccumulator { seed }
    }

    pub fn seed_value(&self) -> Point {
        self.seed
    }

    /// Overwrites every Point with the seed.
    pub fn seed(&self, dispatch: &LaneDispatch, points: &mut [Point]) {
        let seed = self.seed;
        dispatch.for_each_lane(points, |_, point| *point = seed);
    }

    /// `points[i] += term` for every lane whose switch is set. No validation of
    /// `term`: non-finite input lands in every selected lane.
    pub fn apply(&self, dispatch: &LaneDispatch, points: &mut [Point], term: Point, switches: &[bool]) {
        debug_assert_eq!(points.len(), switches.len());
        dispatch.for_each_lane(points, |i, point| {
            if switches[i] {
                *point += term;
            }
        });
    }

    /// Shifts every lane by `-offset`, independent of switches.
    pub fn recenter(&self, dispatch: &LaneDispatch, points: &mut [Point], offset: Point) {
        dispatch.for_each_lane(points, |_, point| *point -= offset);
    }
}
