//! Three-stage calcium cascades. Neurons step theirs every cycle; synapses step theirs
//! only on spike events and catch up on idle cycles with a closed-form decay.

use crate::params::{CaDtParams, KinaseCaParams};
use crate::synapse::Synapse;

type Mat3 = [[f32; 3]; 3];

const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

impl CaDtParams {
    pub fn m_dt(&self) -> f32 {
        1.0 / self.m_tau
    }

    pub fn p_dt(&self) -> f32 {
        1.0 / self.p_tau
    }

    pub fn d_dt(&self) -> f32 {
        1.0 / self.d_tau
    }

    /// One cascade step driven by `ca`. Each stage integrates the freshly updated stage
    /// before it.
    pub fn from_ca(&self, ca: f32, m: &mut f32, p: &mut f32, d: &mut f32) {
        *m += self.m_dt() * (ca - *m);
        *p += self.p_dt() * (*m - *p);
        *d += self.d_dt() * (*p - *d);
    }

    /// Matrix of a single zero-input step, acting on `(m, p, d)`.
    fn decay_step(&self) -> Mat3 {
        let a = 1.0 - self.m_dt();
        let b = 1.0 - self.p_dt();
        let c = 1.0 - self.d_dt();
        let pm = self.p_dt() * a;
        let dp = self.d_dt() * b;
        let dm = self.d_dt() * pm;
        [[a, 0.0, 0.0], [pm, b, 0.0], [dm, dp, c]]
    }

    /// Applies `steps` zero-input steps at once.
    pub fn decay_n(&self, steps: u32, m: &mut f32, p: &mut f32, d: &mut f32) {
        if steps == 0 {
            return;
        }

        let mat = mat_pow(self.decay_step(), steps);
        let (m0, p0, d0) = (*m, *p, *d);
        *m = mat[0][0] * m0;
        *p = mat[1][0] * m0 + mat[1][1] * p0;
        *d = mat[2][0] * m0 + mat[2][1] * p0 + mat[2][2] * d0;
    }
}

fn mat_mul(x: &Mat3, y: &Mat3) -> Mat3 {
    let mut result = [[0.0; 3]; 3];
    for (i, row) in result.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| x[i][k] * y[k][j]).sum();
        }
    }
    result
}

fn mat_pow(mut base: Mat3, mut exp: u32) -> Mat3 {
    let mut result = IDENTITY;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mat_mul(&result, &base);
        }
        base = mat_mul(&base, &base);
        exp >>= 1;
    }
    result
}

// the cascade is numerically zero long before the step count saturates
fn idle_steps(cycles: i64) -> u32 {
    u32::try_from(cycles).unwrap_or(u32::MAX)
}

impl KinaseCaParams {
    /// Brings the synaptic cascade forward to `cycle`, treating cycles since the last
    /// stamp as idle and stepping `cycle` itself with `ca`. No-op if already stamped.
    pub fn advance_to(&self, syn: &mut Synapse, cycle: i64, ca: f32) {
        if syn.ca_up_t >= cycle {
            return;
        }

        let idle = idle_steps(cycle - syn.ca_up_t - 1);
        self.dt
            .decay_n(idle, &mut syn.ca_m, &mut syn.ca_p, &mut syn.ca_d);
        self.dt
            .from_ca(ca, &mut syn.ca_m, &mut syn.ca_p, &mut syn.ca_d);
        syn.ca_up_t = cycle;
    }

    /// Catches up on idle cycles through `cycle` without any new input.
    pub fn decay_to(&self, syn: &mut Synapse, cycle: i64) {
        if syn.ca_up_t >= cycle {
            return;
        }

        let idle = idle_steps(cycle - syn.ca_up_t);
        self.dt
            .decay_n(idle, &mut syn.ca_m, &mut syn.ca_p, &mut syn.ca_d);
        syn.ca_up_t = cycle;
    }

    pub fn syn_ca(&self, send_ca_syn: f32, recv_ca_syn: f32) -> f32 {
        self.spike_g * send_ca_syn * recv_ca_syn
    }
}
