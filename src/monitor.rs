// src/monitor.rs

//! SnapshotMonitor - background reader of a shared Point buffer.
//!
//! Plays the role of the live display: it waits for the engine to release a
//! new generation, takes the buffer under the same lock the engine writes
//! under, and records frame statistics. It never sees a half-applied step.

use crate::engine::accumulator::Point;
use crate::sink::SharedPointBuffer;
use anyhow::{Context, Result};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Summary of one observed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub generation: u64,
    /// Mean of the finite Points.
    pub centroid: Point,
    /// Largest distance of a finite Point from the centroid.
    pub max_radius: f64,
    pub non_finite: usize,
}

impl FrameStats {
    pub fn from_points(generation: u64, points: &[Point]) -> Self {
        let finite: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
        let non_finite = points.len() - finite.len();
        if finite.is_empty() {
            return FrameStats {
                generation,
                centroid: Point::default(),
                max_radius: 0.0,
                non_finite,
            };
        }
        let centroid = finite.iter().sum::<Point>() / finite.len() as f64;
        let max_radius = finite
            .iter()
            .map(|p| (p - centroid).norm())
            .fold(0.0, f64::max);
        FrameStats {
            generation,
            centroid,
            max_radius,
            non_finite,
        }
    }
}

/// What the monitor saw over its lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub frames_observed: usize,
    pub last: Option<FrameStats>,
}

impl MonitorReport {
    fn record(&mut self, stats: FrameStats) {
        trace!(
            "SnapshotMonitor: frame {} centroid {} radius {:.4}",
            stats.generation,
            stats.centroid,
            stats.max_radius
        );
        self.frames_observed += 1;
        self.last = Some(stats);
    }
}

pub struct SnapshotMonitor {
    stop: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<MonitorReport>>,
}

impl SnapshotMonitor {
    /// Spawns the monitor thread.
    ///
    /// `poll_interval` bounds how long the thread waits for a new generation
    /// before re-checking its stop flag.
    pub fn spawn(buffer: SharedPointBuffer, poll_interval: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread_handle = thread::Builder::new()
            .name("snapshot-monitor".to_string())
            .spawn(move || {
                info!("SnapshotMonitor: Started ({} lanes)", buffer.lane_count());
                let mut report = MonitorReport::default();
                let mut seen = 0;
                while !thread_stop.load(Ordering::Relaxed) {
                    match buffer.wait_newer(seen, poll_interval) {
                        Ok(Some((generation, points))) => {
                            seen = generation;
                            report.record(FrameStats::from_points(generation, &points));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!("SnapshotMonitor: {}", e);
                            return report;
                        }
                    }
                }
                // Pick up whatever the engine released after the last wake-up.
                match buffer.snapshot() {
                    Ok((generation, points)) if generation > seen => {
                        report.record(FrameStats::from_points(generation, &points));
                    }
                    Ok(_) => {}
                    Err(e) => error!("SnapshotMonitor: {}", e),
                }
                debug!("SnapshotMonitor: Thread exiting");
                report
            })
            .context("Failed to spawn snapshot monitor thread")?;

        Ok(SnapshotMonitor {
            stop,
            thread_handle: Some(thread_handle),
        })
    }

    /// Stops the thread and returns its report.
    pub fn finish(mut self) -> MonitorReport {
        self.join().unwrap_or_default()
    }

    fn join(&mut self) -> Option<MonitorReport> {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(e) => {
                error!("SnapshotMonitor thread panicked: {:?}", e);
                None
            }
        }
    }
}

impl Drop for SnapshotMonitor {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!("SnapshotMonitor dropped");
            self.join();
        }
    }
}
