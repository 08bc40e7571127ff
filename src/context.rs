use crate::params::TimingParams;

/// Per-cycle global state. Created and advanced only by the network coordinator; every
/// kernel receives it by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Context {
    pub seed: u64,
    /// Cycle within the current trial, from 0 to `theta_cycles - 1`.
    pub cycle: u32,
    /// Cycles since the last full reset. Used to stamp synaptic calcium updates and to
    /// index the delay rings.
    pub cycles_total: i64,
    pub theta_cycles: u32,
    pub plus_cycles: u32,
    pub plus_phase: bool,
    /// Advanced once per cycle, keys the counter-based runtime randomness.
    pub rand_ctr: u64,
    pub trial: u64,
    pub da: f32,
    pub ach: f32,
}

impl Context {
    pub fn new(seed: u64, timing: &TimingParams) -> Self {
        Self {
            seed,
            cycle: 0,
            cycles_total: 0,
            theta_cycles: timing.theta_cycles,
            plus_cycles: timing.plus_cycles,
            plus_phase: false,
            rand_ctr: 0,
            trial: 0,
            da: 0.0,
            ach: 1.0,
        }
    }

    pub fn minus_cycles(&self) -> u32 {
        self.theta_cycles - self.plus_cycles
    }

    pub fn advance_cycle(&mut self) {
        self.cycle += 1;
        self.cycles_total += 1;
        self.rand_ctr += 1;
    }

    pub fn new_trial(&mut self) {
        self.cycle = 0;
        self.plus_phase = false;
        self.trial += 1;
    }

    pub fn reset(&mut self) {
        self.cycle = 0;
        self.cycles_total = 0;
        self.plus_phase = false;
        self.rand_ctr = 0;
        self.trial = 0;
    }

    /// Key for a counter-based random draw tied to this cycle and an element.
    pub fn rand_key(&self, idx: usize, fun_id: u8) -> (u64, u64, usize, u8) {
        (self.seed, self.rand_ctr, idx, fun_id)
    }
}

/// Identifies independent runtime random streams.
pub mod rand_fun {
    pub const GE_NOISE: u8 = 0;
    pub const GI_NOISE: u8 = 1;
    pub const SYN_FAIL: u8 = 2;
}
