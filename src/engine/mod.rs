// src/engine/mod.rs

//! The lane engine.
//!
//! `ComputeEngine` sums one term stream into `W = 2^k` lanes. Lane `i` includes
//! the term at block position `t` exactly when bit `t` of `i` is set, so every
//! term lands in exactly half of the lanes. Per term the engine runs, in order:
//!
//! 1. reset guard: `iteration % k == 0` restores every code to its master
//! 2. decode: one switch per lane from the current code
//! 3. accumulate: `point += term` where the switch is set (plus optional
//!    re-centring), inside a single sink acquire/release
//! 4. advance: move every code one bit along
//! 5. count: `iteration += 1`
//!
//! Each stage is one `LaneDispatch` call and finishes for all lanes before the
//! next begins. Steps are strictly sequential; `&mut self` enforces a single
//! writer.

pub mod accumulator;
pub mod codes;
pub mod dispatch;


use crate::error::EngineError;
use crate::series::{Term, TermSource};
use crate::sink::PointSink;
use accumulator::{LaneAccumulator, Point};
use bitflags::bitflags;
use codes::{Code, CodePolicy, CodeRegister, LowBitFirst};
use dispatch::LaneDispatch;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Largest supported `k`. Codes are `u32`, and `2^30` lanes is already 16 GiB
/// of Points.
pub const MAX_PARALLELISM: u32 = 30;

bitflags! {
    /// Buffers to dump at `debug!` level after every step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TraceFlags: u8 {
        const CODES    = 1 << 0;
        const SWITCHES = 1 << 1;
        const POINTS   = 1 << 2;
    }
}

impl TraceFlags {
    /// Parses `codes,points`, `CODES | SWITCHES` and similar lists.
    pub fn parse(s: &str) -> Result<Self, bitflags::parser::ParseError> {
        let normalized = s.replace(',', "|").to_ascii_uppercase();
        bitflags::parser::from_str::<TraceFlags>(&normalized)
    }
}

/// Lane count for parallelism exponent `k`.
///
/// Only validates `k`. Buffers of this size are allocated with
/// `lane_buffer`, which reports a failed allocation instead of aborting.
pub fn lane_count(k: u32) -> Result<usize, EngineError> {
    if !(1..=MAX_PARALLELISM).contains(&k) {
        return Err(EngineError::InvalidParallelism {
            k,
            max: MAX_PARALLELISM,
        });
    }
    Ok(1usize << k)
}

/// A `lanes`-long buffer filled with `value`, or `BackendInit` if it cannot be
/// allocated.
pub fn lane_buffer<T: Clone>(lanes: usize, value: T) -> Result<Vec<T>, EngineError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(lanes).map_err(|e| {
        EngineError::BackendInit(format!("cannot allocate {} lanes: {}", lanes, e))
    })?;
    buffer.resize(lanes, value);
    Ok(buffer)
}

/// Lock-step lane engine writing into a `PointSink`.
#[derive(Debug)]
pub struct ComputeEngine<S: PointSink, P: CodePolicy = LowBitFirst> {
    k: u32,
    iteration: u64,
    codes: CodeRegister,
    switches: Vec<bool>,
    accumulator: LaneAccumulator,
    policy: P,
    dispatch: LaneDispatch,
    sink: S,
    recenter: bool,
    trace: TraceFlags,
    warned_non_finite: bool,
}

impl<S: PointSink> ComputeEngine<S, LowBitFirst> {
    /// Builds an engine with the least-significant-bit-first code schedule.
    pub fn new(k: u32, dispatch: LaneDispatch, sink: S) -> Result<Self, EngineError> {
        Self::with_policy(k, dispatch, sink, LowBitFirst)
    }
}

impl<S: PointSink, P: CodePolicy> ComputeEngine<S, P> {
    /// Validates `k`, checks the sink size and seeds every Point.
    pub fn with_policy(
        k: u32,
        dispatch: LaneDispatch,
        mut sink: S,
        policy: P,
    ) -> Result<Self, EngineError> {
        let lanes = lane_count(k)?;
        if sink.lane_count() != lanes {
            return Err(EngineError::LaneCountMismatch {
                expected: lanes,
                actual: sink.lane_count(),
            });
        }

        let accumulator = LaneAccumulator::default();
        sink.write(&mut |points: &mut [Point]| accumulator.seed(&dispatch, points))?;
        let recenter = sink.recenters_by_default();

        info!(
            "ComputeEngine: k = {}, {} lanes, {} dispatch, recenter = {}",
            k,
            lanes,
            dispatch.kind(),
            recenter
        );

        Ok(ComputeEngine {
            k,
            iteration: 0,
            codes: CodeRegister::new(lanes)?,
            switches: lane_buffer(lanes, false)?,
            accumulator,
            policy,
            dispatch,
            sink,
            recenter,
            trace: TraceFlags::empty(),
            warned_non_finite: false,
        })
    }

    /// Overrides the sink's default re-centring choice.
    pub fn with_recentering(mut self, enabled: bool) -> Self {
        self.recenter = enabled;
        self
    }

    pub fn with_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    pub fn parallelism(&self) -> u32 {
        self.k
    }

    pub fn lane_count(&self) -> usize {
        self.codes.lane_count()
    }

    /// Number of terms processed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn recenters(&self) -> bool {
        self.recenter
    }

    pub fn master_codes(&self) -> &[Code] {
        self.codes.master()
    }

    pub fn codes(&self) -> &[Code] {
        self.codes.current()
    }

    /// Switches decoded during the most recent step.
    pub fn switches(&self) -> &[bool] {
        &self.switches
    }

    pub fn seed(&self) -> Point {
        self.accumulator.seed_value()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn snapshot(&self) -> Result<Vec<Point>, EngineError> {
        self.sink.snapshot()
    }

    /// Runs the full five-stage protocol for one term.
    ///
    /// Fails only if the sink cannot be acquired.
    pub fn process_next_term(&mut self, term: Term) -> Result<(), EngineError> {
        self.reset_guard();
        self.decode();

        if !self.warned_non_finite && !term.is_finite() {
            warn!(
                "ComputeEngine: non-finite term {} at iteration {}; selected lanes will carry it from now on",
                term, self.iteration
            );
            self.warned_non_finite = true;
        }

        let accumulator = &self.accumulator;
        let dispatch = &self.dispatch;
        let switches = &self.switches;
        let recenter = self.recenter;
        self.sink.write(&mut |points: &mut [Point]| {
            accumulator.apply(dispatch, points, term, switches);
            if recenter {
                accumulator.recenter(dispatch, points, term * 0.5);
            }
        })?;

        self.codes.advance(&self.dispatch, &self.policy);
        self.iteration += 1;
        trace!("ComputeEngine: step {} applied term {}", self.iteration, term);
        self.trace_buffers()
    }

    /// Pulls up to `count` terms from `source`, one step each.
    ///
    /// `cancel` is checked before every step; returns the number of terms
    /// actually processed.
    pub fn process_terms<T>(
        &mut self,
        source: &mut T,
        count: usize,
        cancel: &AtomicBool,
    ) -> Result<usize, EngineError>
    where
        T: TermSource + ?Sized,
    {
        for processed in 0..count {
            if cancel.load(Ordering::Relaxed) {
                info!(
                    "ComputeEngine: cancelled after {} of {} terms",
                    processed, count
                );
                return Ok(processed);
            }
            let term = source.next_term();
            self.process_next_term(term)?;
        }
        debug!("ComputeEngine: processed {} terms", count);
        Ok(count)
    }

    /// Steps the code schedule without a term: reset guard, decode, advance,
    /// count. Points are untouched. Returns the switches that were decoded.
    pub fn step_codes(&mut self) -> &[bool] {
        self.reset_guard();
        self.decode();
        self.codes.advance(&self.dispatch, &self.policy);
        self.iteration += 1;
        &self.switches
    }

    fn reset_guard(&mut self) {
        if self.iteration % u64::from(self.k) == 0 {
            trace!("ComputeEngine: block boundary at iteration {}", self.iteration);
            self.codes.reset(&self.dispatch);
        }
    }

    fn decode(&mut self) {
        self.codes
            .decode_into(&self.dispatch, &self.policy, &mut self.switches);
    }

    fn trace_buffers(&self) -> Result<(), EngineError> {
        if self.trace.is_empty() {
            return Ok(());
        }
        if self.trace.contains(TraceFlags::CODES) {
            debug!("codes[{}]: {:?}", self.iteration, self.codes.current());
        }
        if self.trace.contains(TraceFlags::SWITCHES) {
            debug!("switches[{}]: {:?}", self.iteration, self.switches);
        }
        if self.trace.contains(TraceFlags::POINTS) {
            debug!("points[{}]: {:?}", self.iteration, self.sink.snapshot()?);
        }
        Ok(())
    }
}
