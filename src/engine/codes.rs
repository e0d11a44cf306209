// src/engine/codes.rs

//! Per-lane code state and the rule that turns a code into a switch.
//!
//! Each lane `i` owns an immutable master code equal to `i` and a current code.
//! Within a block of `k` steps the current code walks `i, i >> 1, i >> 2, ...`,
//! so the switch decoded at block position `t` is bit `t` of the lane index.

use super::dispatch::LaneDispatch;
use super::lane_buffer;
use crate::error::EngineError;

/// Integer code carried by each lane.
pub type Code = u32;

/// Decode and advance rule applied uniformly to every lane.
///
/// The orchestration in `ComputeEngine` only ever goes through this trait, so
/// a different bit schedule can be dropped in without touching the step
/// protocol.
pub trait CodePolicy: Send + Sync {
    /// Inclusion flag for the current step.
    fn decode(&self, code: Code) -> bool;
    /// Code for the next step within the same block.
    fn advance(&self, code: Code) -> Code;
}

/// Least-significant bit first: `switch = code & 1`, `advance = code >> 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowBitFirst;

impl CodePolicy for LowBitFirst {
    #[inline]
    fn decode(&self, code: Code) -> bool {
        code & 1 != 0
    }

    #[inline]
    fn advance(&self, code: Code) -> Code {
        code >> 1
    }
}

/// Master and current codes for all lanes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRegister {
    master: Box<[Code]>,
    current: Vec<Code>,
}

impl CodeRegister {
    /// Creates the register with `current == master == [0, 1, .., lane_count - 1]`.
    ///
    /// `lane_count` is bounded by `2^MAX_PARALLELISM`, so every index fits a
    /// `Code`. Fails with `EngineError::BackendInit` if the codes cannot be
    /// allocated.
    pub fn new(lane_count: usize) -> Result<Self, EngineError> {
        let mut current: Vec<Code> = lane_buffer(lane_count, 0)?;
        for (i, code) in current.iter_mut().enumerate() {
            *code = i as Code;
        }
        let mut master = lane_buffer(lane_count, 0)?;
        master.copy_from_slice(&current);
        Ok(CodeRegister {
            master: master.into_boxed_slice(),
            current,
        })
    }

    pub fn lane_count(&self) -> usize {
        self.master.len()
    }

    pub fn master(&self) -> &[Code] {
        &self.master
    }

    pub fn current(&self) -> &[Code] {
        &self.current
    }

    /// Restores every lane's current code to its master code.
    pub fn reset(&mut self, dispatch: &LaneDispatch) {
        let master = &self.master;
        dispatch.for_each_lane(&mut self.current, |i, code| *code = master[i]);
    }

    /// Moves every lane one position further through its bit mask.
    pub fn advance<P: CodePolicy>(&mut self, dispatch: &LaneDispatch, policy: &P) {
        dispatch.for_each_lane(&mut self.current, |_, code| *code = policy.advance(*code));
    }

    /// Writes each lane's switch for the current (pre-advance) code into `switches`.
    pub fn decode_into<P: CodePolicy>(
        &self,
        dispatch: &LaneDispatch,
        policy: &P,
        switches: &mut [bool],
    ) {
        debug_assert_eq!(switches.len(), self.current.len());
        let current = &self.current;
        dispatch.for_each_lane(switches, |i, switch| *switch = policy.decode(current[i]));
    }
}
