//! Arrival times, the timing cursor and the stage clock
//!
//! A time is a `(cycle, critical_path)` pair: the pipeline cycle a signal
//! belongs to and the combinational delay (seconds) accumulated since the
//! start of that cycle. Stages discretize time in units of one elementary
//! (LUT plus local wire) delay so that compression rounds can step through it.

mod target;

pub use target::{GenericTarget, TechnologyModel};

use std::cmp::Ordering;

/// Discrete compression stage
pub type Stage = u64;

/// Tolerance applied when flooring critical paths into stages
const STAGE_EPSILON: f64 = 1e-9;

/// Arrival time of a signal
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct Arrival {
    /// Pipeline cycle
    pub cycle: u32,
    /// Combinational delay within the cycle, in seconds
    pub critical_path: f64,
}

impl Arrival {
    /// Cycle 0, no delay
    pub const ZERO: Arrival = Arrival {
        cycle: 0,
        critical_path: 0.0,
    };

    /// Create an arrival time
    pub fn new(cycle: u32, critical_path: f64) -> Self {
        Self {
            cycle,
            critical_path,
        }
    }

    /// Absolute time in seconds for the given clock period
    pub fn seconds(&self, clock_period: f64) -> f64 {
        self.cycle as f64 * clock_period + self.critical_path
    }
}

impl PartialEq for Arrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Arrival {}

impl PartialOrd for Arrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Arrival {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cycle
            .cmp(&other.cycle)
            .then(self.critical_path.total_cmp(&other.critical_path))
    }
}

/// Timing cursor threaded through insertion and compression
///
/// Units read the cursor to stamp the bits they produce; compression moves
/// it forward as it schedules compressors and adders.
#[derive(Debug, Clone)]
pub struct TimingContext {
    cycle: u32,
    critical_path: f64,
    clock_period: f64,
    ff_delay: f64,
    pipelined: bool,
}

impl TimingContext {
    /// Cursor at cycle 0 for the given target
    pub fn new(target: &dyn TechnologyModel) -> Self {
        Self {
            cycle: 0,
            critical_path: 0.0,
            clock_period: target.clock_period(),
            ff_delay: target.ff_delay(),
            pipelined: target.is_pipelined(),
        }
    }

    /// Current cycle
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Current critical path within the cycle
    pub fn critical_path(&self) -> f64 {
        self.critical_path
    }

    /// Current time as an [`Arrival`]
    pub fn arrival(&self) -> Arrival {
        Arrival::new(self.cycle, self.critical_path)
    }

    /// Whether register insertion is enabled
    pub fn is_pipelined(&self) -> bool {
        self.pipelined
    }

    /// Move the cursor to a given cycle, keeping the critical path
    pub fn set_cycle(&mut self, cycle: u32) {
        self.cycle = cycle;
    }

    /// Overwrite the critical path
    pub fn set_critical_path(&mut self, critical_path: f64) {
        self.critical_path = critical_path;
    }

    /// Move the cursor to an arrival time
    pub fn set_arrival(&mut self, arrival: Arrival) {
        self.cycle = arrival.cycle;
        self.critical_path = arrival.critical_path;
    }

    /// Move the cursor forward to `arrival` if it lies in the future
    pub fn sync_to(&mut self, arrival: Arrival) {
        if arrival > self.arrival() {
            self.set_arrival(arrival);
        }
    }

    /// Start a new cycle with an empty critical path
    pub fn advance_to_next_cycle(&mut self) {
        self.cycle += 1;
        self.critical_path = 0.0;
    }

    /// Account for `delay` more seconds of logic.
    ///
    /// When pipelined and the logic would overflow the clock period, the
    /// cursor moves to the next cycle and the critical path restarts at
    /// `min(delay, period)`. Returns `true` when a register boundary was crossed.
    pub fn advance_critical_path(&mut self, delay: f64) -> bool {
        if self.pipelined && self.ff_delay + self.critical_path + delay > self.clock_period {
            self.cycle += 1;
            self.critical_path = delay.min(self.clock_period);
            true
        } else {
            self.critical_path += delay;
            false
        }
    }
}

/// Maps arrival times onto discrete compression stages
#[derive(Debug, Clone, Copy)]
pub struct StageClock {
    stages_per_cycle: u64,
    elementary_delay: f64,
}

impl StageClock {
    /// Build the stage clock of a target
    pub fn new(target: &dyn TechnologyModel) -> Self {
        let elementary_delay = target.elementary_delay();
        let per_cycle = (target.clock_period() / elementary_delay).floor();
        let stages_per_cycle = if per_cycle.is_finite() && per_cycle >= 1.0 {
            per_cycle as u64
        } else {
            1
        };
        Self {
            stages_per_cycle,
            elementary_delay,
        }
    }

    /// Stages that fit in one clock cycle (at least 1)
    pub fn stages_per_cycle(&self) -> u64 {
        self.stages_per_cycle
    }

    /// Delay of one stage
    pub fn elementary_delay(&self) -> f64 {
        self.elementary_delay
    }

    /// Stage at which a signal with this arrival becomes usable
    pub fn stage_of(&self, arrival: Arrival) -> Stage {
        let within = (arrival.critical_path / self.elementary_delay + STAGE_EPSILON).floor();
        let within = if within.is_finite() && within > 0.0 {
            within as u64
        } else {
            0
        };
        arrival.cycle as u64 * self.stages_per_cycle + within
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_ordering() {
        let a = Arrival::new(0, 1.5e-9);
        let b = Arrival::new(1, 0.0);
        let c = Arrival::new(0, 0.7e-9);
        assert!(c < a);
        assert!(a < b);
        assert_eq!(a.max(b), b);
        assert_eq!(Arrival::new(2, 0.5e-9), Arrival::new(2, 0.5e-9));
    }

    #[test]
    fn test_advance_crosses_cycle() {
        let target = GenericTarget::default();
        let mut ctx = TimingContext::new(&target);
        let delay = target.elementary_delay();

        assert!(!ctx.advance_critical_path(delay));
        assert!(!ctx.advance_critical_path(delay));
        assert_eq!(ctx.cycle(), 0);

        // A third level does not fit in the period once the register delay is counted
        assert!(ctx.advance_critical_path(delay));
        assert_eq!(ctx.cycle(), 1);
        assert!((ctx.critical_path() - delay).abs() < 1e-15);
    }

    #[test]
    fn test_combinational_never_crosses() {
        let target = GenericTarget::default().with_pipelining(false);
        let mut ctx = TimingContext::new(&target);
        for _ in 0..10 {
            assert!(!ctx.advance_critical_path(target.elementary_delay()));
        }
        assert_eq!(ctx.cycle(), 0);
    }

    #[test]
    fn test_stage_of() {
        let target = GenericTarget::default();
        let clock = StageClock::new(&target);
        let elem = target.elementary_delay();
        assert_eq!(clock.stages_per_cycle(), 3);
        assert_eq!(clock.stage_of(Arrival::ZERO), 0);
        assert_eq!(clock.stage_of(Arrival::new(0, 2.0 * elem)), 2);
        assert_eq!(clock.stage_of(Arrival::new(1, elem)), 4);
        // 3 * 0.8ns accumulates rounding error below 2.4ns
        assert_eq!(clock.stage_of(Arrival::new(0, elem + elem + elem)), 3);
    }

    #[test]
    fn test_sync_only_moves_forward() {
        let target = GenericTarget::default();
        let mut ctx = TimingContext::new(&target);
        ctx.set_arrival(Arrival::new(1, 0.3e-9));
        ctx.sync_to(Arrival::new(0, 2.0e-9));
        assert_eq!(ctx.arrival(), Arrival::new(1, 0.3e-9));
        ctx.sync_to(Arrival::new(2, 0.0));
        assert_eq!(ctx.cycle(), 2);
    }
}
