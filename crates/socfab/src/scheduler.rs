//! Cycle scheduling for a built fabric.
//!
//! The fabric is ticked in quanta so stop conditions and the wall-clock
//! timeout are checked between batches of cycles rather than every cycle.

use crate::fabric::Fabric;
use tracing::{debug, error_span};

/// Cycles run per quantum when none is configured
pub const DEFAULT_QUANTUM: u64 = 64;

/// Result of running a single quantum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantumResult {
    /// Traffic still pending, keep going
    Continue,
    /// All traffic done and nothing in flight
    Idle,
    /// The cycle limit was reached
    CycleLimit,
}

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cycles per quantum
    pub quantum: u64,
    /// Stop after this many fabric cycles
    pub max_cycles: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            max_cycles: None,
        }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    quanta: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config, quanta: 0 }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Quanta run so far
    pub fn quanta(&self) -> u64 {
        self.quanta
    }

    fn limit_reached(&self, fabric: &Fabric) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| fabric.cycle() >= max)
    }

    /// Tick `fabric` for up to one quantum, stopping early once it is idle
    /// or the cycle limit is hit.
    pub fn run_quantum(&mut self, fabric: &mut Fabric) -> QuantumResult {
        let _span = error_span!("quantum", n = self.quanta).entered();
        self.quanta += 1;

        for _ in 0..self.config.quantum.max(1) {
            if fabric.is_idle() {
                debug!("Fabric idle at cycle {}", fabric.cycle());
                return QuantumResult::Idle;
            }
            if self.limit_reached(fabric) {
                return QuantumResult::CycleLimit;
            }
            fabric.tick();
        }

        if fabric.is_idle() {
            QuantumResult::Idle
        } else if self.limit_reached(fabric) {
            QuantumResult::CycleLimit
        } else {
            QuantumResult::Continue
        }
    }
}
