//! Simulation driver.
//!
//! Wraps a built [`Fabric`] with a [`Scheduler`] and the stop conditions the
//! CLI and integration tests use.

use crate::fabric::Fabric;
use crate::scheduler::{DEFAULT_QUANTUM, QuantumResult, Scheduler, SchedulerConfig};
use socfab_hw::specs::clock;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Stop conditions for a simulation run
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Stop after this many fabric cycles
    pub max_cycles: Option<u64>,
    /// Optional timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Cycles per scheduler quantum
    pub quantum: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            timeout_ms: None,
            quantum: DEFAULT_QUANTUM,
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All traffic finished
    Idle,
    /// Cycle limit reached with traffic pending
    CycleLimit,
    /// Timeout reached
    Timeout,
}

pub struct SimulationCore {
    fabric: Fabric,
    scheduler: Scheduler,
    timeout_ms: Option<u64>,
    start_time: Instant,
}

impl SimulationCore {
    pub fn new(fabric: Fabric, config: SimulationConfig) -> Self {
        Self {
            fabric,
            scheduler: Scheduler::new(SchedulerConfig {
                quantum: config.quantum,
                max_cycles: config.max_cycles,
            }),
            timeout_ms: config.timeout_ms,
            start_time: Instant::now(),
        }
    }

    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    pub fn fabric_mut(&mut self) -> &mut Fabric {
        &mut self.fabric
    }

    pub fn into_fabric(self) -> Fabric {
        self.fabric
    }

    /// Run a single quantum
    pub fn step(&mut self) -> QuantumResult {
        self.scheduler.run_quantum(&mut self.fabric)
    }

    fn timed_out(&self) -> bool {
        self.timeout_ms.is_some_and(|timeout_ms| {
            let elapsed_ms = self.start_time.elapsed().as_millis() as u64;
            if elapsed_ms >= timeout_ms {
                info!("Timeout reached: {} ms", elapsed_ms);
                true
            } else {
                false
            }
        })
    }

    /// Run until the fabric is idle or a limit is reached
    pub fn run(&mut self) -> StopReason {
        self.start_time = Instant::now();
        loop {
            if self.timed_out() {
                return StopReason::Timeout;
            }
            match self.step() {
                QuantumResult::Continue => {}
                QuantumResult::Idle => return StopReason::Idle,
                QuantumResult::CycleLimit => return StopReason::CycleLimit,
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Cycles run, as time at the fabric clock
    pub fn simulated_time(&self) -> Duration {
        Duration::from_nanos(self.fabric.cycle().saturating_mul(1_000_000_000) / clock::SYS_HZ)
    }

    pub fn print_final_state(&self) {
        let fabric = &self.fabric;
        info!(
            "Cycles: {} ({:.2?} at {} MHz)",
            fabric.cycle(),
            self.simulated_time(),
            clock::SYS_HZ / 1_000_000
        );
        info!("Elapsed time: {:.2?}", self.elapsed());
        info!(
            "Decode errors: {}, protocol faults: {}",
            fabric.interconnect().decode_errors(),
            fabric.faults().len()
        );
        for fault in fabric.faults() {
            error!("{}", fault);
        }
    }
}
