//! Ion channel dynamics. Membrane potential is in normalized units where 0 maps to
//! -100mV and 1 maps to 0mV; the voltage-dependent gating functions work in biological
//! millivolts.

use crate::params::{
    AkParams, GabaBParams, KnaChanParams, KnaParams, MahpParams, NmdaParams, SahpParams,
    SkcaParams, VgccParams,
};

/// Ca driving-force slope shared by NMDA and VGCC, per millivolt.
const CA_V_SLOPE: f32 = 0.0756;

pub fn v_to_bio(vm: f32) -> f32 {
    vm * 100.0 - 100.0
}

pub fn v_from_bio(vbio: f32) -> f32 {
    (vbio + 100.0) / 100.0
}

/// z / (exp(z) - 1), continuous through zero.
fn efun(z: f32) -> f32 {
    if z.abs() < 1.0e-4 {
        1.0 - 0.5 * z
    } else {
        z / (z.exp() - 1.0)
    }
}

fn ca_driving_force(vbio: f32) -> f32 {
    if vbio.abs() < 0.1 {
        1.0 / CA_V_SLOPE
    } else {
        -vbio / (1.0 - (CA_V_SLOPE * vbio).exp())
    }
}

impl NmdaParams {
    pub fn dt(&self) -> f32 {
        1.0 / self.tau
    }

    /// Fraction of channels not blocked by magnesium.
    pub fn mg_g_from_vbio(&self, vbio: f32) -> f32 {
        let vbio = vbio + self.voff;
        1.0 / (1.0 + (self.mg_c / 3.57) * (-0.062 * vbio).exp())
    }

    pub fn mg_g_from_v(&self, vm: f32) -> f32 {
        self.mg_g_from_vbio(v_to_bio(vm))
    }

    pub fn ca_from_v(&self, vm: f32) -> f32 {
        let vbio = v_to_bio(vm);
        ca_driving_force(vbio + self.voff) * self.mg_g_from_vbio(vbio)
    }

    /// Integrates the synaptic activation variable from raw excitatory input.
    pub fn nmda_syn(&self, nmda: f32, raw: f32) -> f32 {
        nmda + raw - self.dt() * nmda
    }

    pub fn gnmda(&self, nmda: f32, vm: f32) -> f32 {
        self.gbar * self.mg_g_from_v(vm) * nmda
    }
}

impl GabaBParams {
    pub fn rise_dt(&self) -> f32 {
        1.0 / self.rise_tau
    }

    pub fn decay_dt(&self) -> f32 {
        1.0 / self.decay_tau
    }

    /// Normalizes the double-exponential peak to 1.
    pub fn tau_fact(&self) -> f32 {
        (self.decay_tau / self.rise_tau).powf(self.rise_tau / (self.decay_tau - self.rise_tau))
    }

    pub fn g_from_v(&self, vm: f32) -> f32 {
        let vbio = v_to_bio(vm).max(-90.0);
        1.0 / (1.0 + (0.1 * ((vbio + 90.0) + 10.0)).exp())
    }

    pub fn g_from_s(&self, gi: f32) -> f32 {
        let ss = gi * self.gi_spike;
        if ss > 20.0 {
            1.0
        } else {
            1.0 / (1.0 + (-(ss - 7.1) / 1.4).exp())
        }
    }

    pub fn update(&self, gaba_b: &mut f32, gaba_bx: &mut f32, gi: f32) {
        let dg = (self.tau_fact() * *gaba_bx - *gaba_b) * self.rise_dt();
        let dx = -*gaba_bx * self.decay_dt();
        *gaba_b += dg;
        *gaba_bx += self.g_from_s(gi) + dx;
    }

    pub fn ggaba_b(&self, gaba_b: f32, vm: f32) -> f32 {
        self.gbar * self.g_from_v(vm) * (gaba_b + self.gbase)
    }
}

impl VgccParams {
    pub fn g_from_v(&self, vm: f32) -> f32 {
        ca_driving_force(v_to_bio(vm))
    }

    fn m_from_vbio(vbio: f32) -> f32 {
        1.0 / (1.0 + (-(vbio + 37.0)).exp())
    }

    fn h_from_vbio(vbio: f32) -> f32 {
        1.0 / (1.0 + ((vbio + 41.0) * 2.0).exp())
    }

    /// Moves the activation and inactivation gates toward their voltage asymptotes.
    pub fn update_gates(&self, vm: f32, m: &mut f32, h: &mut f32) {
        let vbio = v_to_bio(vm).min(0.0);
        *m += (Self::m_from_vbio(vbio) - *m) / 3.6;
        *h += (Self::h_from_vbio(vbio) - *h) / 29.0;
    }

    pub fn gvgcc(&self, vm: f32, m: f32, h: f32) -> f32 {
        self.gbar * self.g_from_v(vm) * m * m * m * h
    }

    pub fn ca_from_g(&self, vm: f32, g: f32) -> f32 {
        -v_to_bio(vm) * self.ca * g
    }
}

impl AkParams {
    pub fn m_from_vbio(&self, vbio: f32) -> f32 {
        let vbio = vbio.min(self.vmax);
        self.hf / (1.0 + (-self.mf * (vbio + self.voff)).exp())
    }

    pub fn gak(&self, vm: f32) -> f32 {
        self.gbar * self.m_from_vbio(v_to_bio(vm))
    }
}

impl MahpParams {
    pub fn ninf_tau_from_v(&self, vm: f32) -> (f32, f32) {
        let vo = v_to_bio(vm) - self.voff;
        let dt_max = 1.0 / self.tau_max;
        let a = dt_max * self.vslope * efun(-vo / self.vslope);
        let b = dt_max * self.vslope * efun(vo / self.vslope);
        let tau = 1.0 / (a + b);
        (a * tau, tau / self.tadj)
    }

    pub fn dn_from_v(&self, vm: f32, n: f32) -> f32 {
        let (ninf, tau) = self.ninf_tau_from_v(vm);
        (ninf - n) / tau
    }

    pub fn gmahp(&self, n: f32) -> f32 {
        self.gbar * n
    }
}

impl SahpParams {
    pub fn ca_dt(&self) -> f32 {
        1.0 / self.ca_tau
    }

    pub fn ca_int(&self, ca_int: f32, ca_d: f32) -> f32 {
        ca_int + self.ca_dt() * (ca_d - ca_int)
    }

    pub fn ninf_tau_from_ca(&self, ca: f32) -> (f32, f32) {
        let co = ca - self.off;
        let dt_max = 1.0 / self.tau_max;
        let a = dt_max * self.slope * efun(-co / self.slope);
        let b = dt_max * self.slope * efun(co / self.slope);
        let tau = 1.0 / (a + b);
        (a * tau, tau)
    }

    pub fn dn_from_ca(&self, ca: f32, n: f32) -> f32 {
        let (ninf, tau) = self.ninf_tau_from_ca(ca);
        (ninf - n) / tau
    }

    pub fn gsahp(&self, n: f32) -> f32 {
        self.gbar * n
    }
}

impl KnaChanParams {
    pub fn dt(&self) -> f32 {
        1.0 / self.tau
    }

    pub fn gc_from_spike(&self, gkna: &mut f32, spike: bool) {
        if !self.on {
            *gkna = 0.0;
        } else if spike {
            *gkna += self.rise * (self.max - *gkna);
        } else {
            *gkna -= self.dt() * *gkna;
        }
    }
}

impl KnaParams {
    pub fn gc_from_spike(&self, gkna_med: &mut f32, gkna_slow: &mut f32, spike: bool) {
        if !self.on {
            *gkna_med = 0.0;
            *gkna_slow = 0.0;
            return;
        }

        self.med.gc_from_spike(gkna_med, spike);
        self.slow.gc_from_spike(gkna_slow, spike);
    }
}

impl SkcaParams {
    /// Hill equation with coefficient 4.
    pub fn m_asymp_hill(&self, ca: f32) -> f32 {
        let ca = ca * self.ca_scale;
        let c4 = ca * ca * ca * ca;
        let c50 = self.c50 * self.c50 * self.c50 * self.c50;
        c4 / (c4 + c50)
    }

    pub fn m_from_ca(&self, ca: f32, m: f32) -> f32 {
        let mas = self.m_asymp_hill(ca);
        if mas > m {
            m + (mas - m) / self.act_tau
        } else {
            m + (mas - m) / self.de_tau
        }
    }

    pub fn gsk(&self, m: f32) -> f32 {
        self.gbar * m
    }
}
