// src/sink/mod.rs

//! Destinations for lane Points.
//!
//! A `PointSink` owns the Point buffer the engine accumulates into. The engine
//! never touches Points except through `PointSink::write`, which brackets the
//! update with the sink's acquire/release pair:
//!
//! - `HostSink`: a plain `Vec` owned by the engine. Acquire/release are no-ops.
//! - `SharedSink`: a buffer also read by another thread (a renderer, a
//!   monitor). Acquire locks the buffer, release unlocks it and wakes readers.

use crate::engine::accumulator::Point;
use crate::engine::lane_buffer;
use crate::error::EngineError;
use log::trace;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;


/// Write-side contract the engine relies on.
pub trait PointSink {
    /// Number of lanes the buffer holds.
    fn lane_count(&self) -> usize;

    /// Acquires exclusive access, runs `update` over all Points, releases.
    fn write(&mut self, update: &mut dyn FnMut(&mut [Point])) -> Result<(), EngineError>;

    /// Copy of all Points, indexed by lane.
    fn snapshot(&self) -> Result<Vec<Point>, EngineError>;

    /// Whether the engine should re-centre Points after each accumulate when
    /// writing into this sink.
    fn recenters_by_default(&self) -> bool {
        false
    }
}

/// Points resident in host memory, owned exclusively by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSink {
    points: Vec<Point>,
}

impl HostSink {
    pub fn new(lane_count: usize) -> Self {
        HostSink {
            points: vec![Point::default(); lane_count],
        }
    }

    /// Like `new`, but reports a failed allocation instead of aborting.
    pub fn try_new(lane_count: usize) -> Result<Self, EngineError> {
        Ok(HostSink {
            points: lane_buffer(lane_count, Point::default())?,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl PointSink for HostSink {
    fn lane_count(&self) -> usize {
        self.points.len()
    }

    fn write(&mut self, update: &mut dyn FnMut(&mut [Point])) -> Result<(), EngineError> {
        update(&mut self.points);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<Point>, EngineError> {
        Ok(self.points.clone())
    }
}

/// Contents of a shared buffer. Only the engine's `SharedSink` gets to mutate it.
#[derive(Debug, Clone, Default, PartialEq)]
struct SharedFrame {
    points: Vec<Point>,
    /// Number of completed writes. Readers use it to detect fresh frames.
    generation: u64,
}

/// A Point buffer shared between the engine and external readers.
///
/// Cloning hands out another handle to the same buffer. Handles outside the
/// engine are read-only: they can copy, borrow or wait for frames, never write.
///
/// ```compile_fail
/// let buffer = subserial::sink::SharedPointBuffer::new(2);
/// buffer.acquire().unwrap().points.push(Default::default());
/// ```
#[derive(Debug, Clone)]
pub struct SharedPointBuffer {
    lane_count: usize,
    inner: Arc<(Mutex<SharedFrame>, Condvar)>,
}

impl SharedPointBuffer {
    pub fn new(lane_count: usize) -> Self {
        Self::from_points(vec![Point::default(); lane_count])
    }

    /// Like `new`, but reports a failed allocation instead of aborting.
    pub fn try_new(lane_count: usize) -> Result<Self, EngineError> {
        Ok(Self::from_points(lane_buffer(lane_count, Point::default())?))
    }

    fn from_points(points: Vec<Point>) -> Self {
        SharedPointBuffer {
            lane_count: points.len(),
            inner: Arc::new((
                Mutex::new(SharedFrame {
                    points,
                    generation: 0,
                }),
                Condvar::new(),
            )),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Blocks until the buffer is free and returns the guard. Dropping the
    /// guard releases the buffer.
    fn acquire(&self) -> Result<MutexGuard<'_, SharedFrame>, EngineError> {
        self.inner.0.lock().map_err(|_| EngineError::SinkPoisoned)
    }

    pub fn generation(&self) -> Result<u64, EngineError> {
        Ok(self.acquire()?.generation)
    }

    /// Runs `f` over the current Points while holding the buffer, without
    /// copying them.
    pub fn read<R>(&self, f: impl FnOnce(u64, &[Point]) -> R) -> Result<R, EngineError> {
        let frame = self.acquire()?;
        Ok(f(frame.generation, &frame.points))
    }

    /// Current generation together with a copy of its Points.
    pub fn snapshot(&self) -> Result<(u64, Vec<Point>), EngineError> {
        let frame = self.acquire()?;
        Ok((frame.generation, frame.points.clone()))
    }

    /// Waits up to `timeout` for a generation newer than `seen`.
    ///
    /// Returns `None` when the timeout elapses without a new write.
    pub fn wait_newer(
        &self,
        seen: u64,
        timeout: Duration,
    ) -> Result<Option<(u64, Vec<Point>)>, EngineError> {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().map_err(|_| EngineError::SinkPoisoned)?;
        let (frame, _) = cvar
            .wait_timeout_while(guard, timeout, |frame| frame.generation <= seen)
            .map_err(|_| EngineError::SinkPoisoned)?;
        if frame.generation > seen {
            Ok(Some((frame.generation, frame.points.clone())))
        } else {
            Ok(None)
        }
    }

    fn publish(&self, update: &mut dyn FnMut(&mut [Point])) -> Result<(), EngineError> {
        {
            let mut frame = self.acquire()?;
            update(&mut frame.points);
            frame.generation += 1;
            trace!("SharedPointBuffer: released generation {}", frame.generation);
        }
        self.inner.1.notify_all();
        Ok(())
    }
}

/// Engine-side handle to a `SharedPointBuffer`.
#[derive(Debug, Clone)]
pub struct SharedSink {
    buffer: SharedPointBuffer,
}

impl SharedSink {
    pub fn new(buffer: SharedPointBuffer) -> Self {
        SharedSink { buffer }
    }

    pub fn buffer(&self) -> &SharedPointBuffer {
        &self.buffer
    }
}

impl PointSink for SharedSink {
    fn lane_count(&self) -> usize {
        self.buffer.lane_count()
    }

    fn write(&mut self, update: &mut dyn FnMut(&mut [Point])) -> Result<(), EngineError> {
        self.buffer.publish(update)
    }

    fn snapshot(&self) -> Result<Vec<Point>, EngineError> {
        self.buffer.snapshot().map(|(_, points)| points)
    }

    fn recenters_by_default(&self) -> bool {
        true
    }
}
