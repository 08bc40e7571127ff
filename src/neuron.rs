use serde::{Deserialize, Serialize};

use crate::params::{
    ActParams, AttnParams, BurstParams, CaLrnParams, CaSpkParams, ClampParams, DaModKind,
    DtParams, LearnNeuronParams, NeuroModParams, NoiseParams, RlRateParams, SpikeParams,
};

/// Per-neuron state record. All neurons of the network live in one flat array, grouped
/// by layer and, for 4-D layers, by sub-pool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Neuron {
    pub layer_idx: u32,
    pub sub_pool: u32,

    pub spike: f32,
    pub spiked: f32,
    pub act: f32,
    pub act_int: f32,
    pub act_m: f32,
    pub act_p: f32,
    pub ext: f32,
    pub target: f32,
    pub has_ext: bool,
    /// Fires on every cycle regardless of membrane state, for driving test scenarios.
    pub forced: bool,

    pub ge: f32,
    pub gi: f32,
    pub gk: f32,
    pub inet: f32,
    pub vm: f32,
    pub vm_dend: f32,
    pub isi: f32,
    pub isi_avg: f32,

    pub ca_syn: f32,
    pub ca_spk_m: f32,
    pub ca_spk_p: f32,
    pub ca_spk_d: f32,
    pub ca_spk_pm: f32,
    pub ca_lrn: f32,
    pub nrn_ca_m: f32,
    pub nrn_ca_p: f32,
    pub nrn_ca_d: f32,
    pub ca_diff: f32,
    pub spk_max_ca: f32,
    pub spk_max: f32,
    pub spk_prv: f32,
    pub rl_rate: f32,

    pub burst: f32,
    pub burst_prv: f32,
    pub ctxt_ge: f32,
    pub ctxt_ge_raw: f32,

    pub ge_noise_p: f32,
    pub ge_noise: f32,
    pub gi_noise_p: f32,
    pub gi_noise: f32,

    pub ge_base: f32,
    pub gi_base: f32,
    pub ge_raw: f32,
    pub ge_syn: f32,
    pub gi_raw: f32,
    pub gi_syn: f32,
    pub ge_ext: f32,
    pub ge_m: f32,
    pub gi_m: f32,
    pub ss_gi: f32,
    pub ss_gi_dend: f32,

    pub mahp_n: f32,
    pub sahp_ca: f32,
    pub sahp_n: f32,
    pub gkna_med: f32,
    pub gkna_slow: f32,

    pub gnmda_syn: f32,
    pub gnmda: f32,
    pub gnmda_lrn: f32,
    pub nmda_ca: f32,

    pub ggaba_b: f32,
    pub gaba_b: f32,
    pub gaba_bx: f32,

    pub gvgcc: f32,
    pub vgcc_m: f32,
    pub vgcc_h: f32,
    pub vgcc_ca: f32,
    pub vgcc_ca_int: f32,
    pub gak: f32,

    pub skca_ca_i: f32,
    pub skca_m: f32,
    pub gsk: f32,

    pub act_avg: f32,
    pub avg_pct: f32,
    pub trg_avg: f32,
    pub dtrg_avg: f32,
    pub avg_dif: f32,
    pub attn: f32,
}

/// Named neuron variables for readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronVar {
    Spike,
    Act,
    ActInt,
    ActM,
    ActP,
    Ext,
    Target,
    Ge,
    Gi,
    Gk,
    Vm,
    VmDend,
    Isi,
    IsiAvg,
    CaSyn,
    CaSpkM,
    CaSpkP,
    CaSpkD,
    CaLrn,
    NrnCaM,
    NrnCaP,
    NrnCaD,
    RlRate,
    Burst,
    CtxtGe,
    GeRaw,
    GeSyn,
    GiRaw,
    GiSyn,
    Gnmda,
    GgabaB,
    Gvgcc,
    ActAvg,
    AvgPct,
    TrgAvg,
    AvgDif,
}

impl Neuron {
    pub fn get(&self, var: NeuronVar) -> f32 {
        match var {
            NeuronVar::Spike => self.spike,
            NeuronVar::Act => self.act,
            NeuronVar::ActInt => self.act_int,
            NeuronVar::ActM => self.act_m,
            NeuronVar::ActP => self.act_p,
            NeuronVar::Ext => self.ext,
            NeuronVar::Target => self.target,
            NeuronVar::Ge => self.ge,
            NeuronVar::Gi => self.gi,
            NeuronVar::Gk => self.gk,
            NeuronVar::Vm => self.vm,
            NeuronVar::VmDend => self.vm_dend,
            NeuronVar::Isi => self.isi,
            NeuronVar::IsiAvg => self.isi_avg,
            NeuronVar::CaSyn => self.ca_syn,
            NeuronVar::CaSpkM => self.ca_spk_m,
            NeuronVar::CaSpkP => self.ca_spk_p,
            NeuronVar::CaSpkD => self.ca_spk_d,
            NeuronVar::CaLrn => self.ca_lrn,
            NeuronVar::NrnCaM => self.nrn_ca_m,
            NeuronVar::NrnCaP => self.nrn_ca_p,
            NeuronVar::NrnCaD => self.nrn_ca_d,
            NeuronVar::RlRate => self.rl_rate,
            NeuronVar::Burst => self.burst,
            NeuronVar::CtxtGe => self.ctxt_ge,
            NeuronVar::GeRaw => self.ge_raw,
            NeuronVar::GeSyn => self.ge_syn,
            NeuronVar::GiRaw => self.gi_raw,
            NeuronVar::GiSyn => self.gi_syn,
            NeuronVar::Gnmda => self.gnmda,
            NeuronVar::GgabaB => self.ggaba_b,
            NeuronVar::Gvgcc => self.gvgcc,
            NeuronVar::ActAvg => self.act_avg,
            NeuronVar::AvgPct => self.avg_pct,
            NeuronVar::TrgAvg => self.trg_avg,
            NeuronVar::AvgDif => self.avg_dif,
        }
    }

    pub fn is_spiking(&self) -> bool {
        self.spike > 0.5
    }
}

impl DtParams {
    pub fn vm_dt(&self) -> f32 {
        self.integ / self.vm_tau
    }

    pub fn vm_dend_dt(&self) -> f32 {
        self.integ / self.vm_dend_tau
    }

    pub fn dt_step(&self) -> f32 {
        1.0 / self.vm_steps as f32
    }

    pub fn ge_dt(&self) -> f32 {
        self.integ / self.ge_tau
    }

    pub fn gi_dt(&self) -> f32 {
        self.integ / self.gi_tau
    }

    pub fn int_dt(&self) -> f32 {
        self.integ / self.int_tau
    }

    pub fn long_avg_dt(&self) -> f32 {
        1.0 / self.long_avg_tau
    }

    pub fn ge_syn_from_raw(&self, ge_syn: f32, ge_raw: f32) -> f32 {
        ge_syn + ge_raw - self.ge_dt() * ge_syn
    }

    /// Steady-state conductance for a constant raw input.
    pub fn ge_syn_from_raw_steady(&self, ge_raw: f32) -> f32 {
        ge_raw * self.ge_tau
    }

    pub fn gi_syn_from_raw(&self, gi_syn: f32, gi_raw: f32) -> f32 {
        gi_syn + gi_raw - self.gi_dt() * gi_syn
    }
}

impl SpikeParams {
    pub fn r_dt(&self) -> f32 {
        1.0 / self.r_tau
    }

    pub fn isi_dt(&self) -> f32 {
        1.0 / self.isi_tau
    }

    pub fn avg_from_isi(&self, avg: f32, isi: f32) -> f32 {
        if avg <= 0.0 || isi < 0.8 * avg {
            isi
        } else {
            avg + self.isi_dt() * (isi - avg)
        }
    }

    /// Rate code normalized to the maximum firing rate.
    pub fn act_from_isi(&self, isi: f32, time_inc: f32, integ: f32) -> f32 {
        if isi <= 0.0 {
            return 0.0;
        }
        let max_int = 1.0 / (time_inc * integ * self.max_hz);
        max_int / isi
    }

    pub fn spike_threshold(&self) -> f32 {
        if self.exp {
            self.exp_thr
        } else {
            self.thr
        }
    }
}

impl NoiseParams {
    pub fn ge_exp_int(&self) -> f32 {
        (-1000.0 / self.ge_hz).exp()
    }

    pub fn gi_exp_int(&self) -> f32 {
        (-1000.0 / self.gi_hz).exp()
    }

    /// Poisson event generator: multiplies the running product by a uniform draw and
    /// fires when it falls below `exp_int`.
    pub fn poisson_event(p: &mut f32, rand: f32, exp_int: f32) -> f32 {
        *p *= rand;
        if *p <= exp_int {
            *p = 1.0;
            1.0
        } else {
            0.0
        }
    }
}

impl AttnParams {
    pub fn mod_val(&self, val: f32, attn: f32) -> f32 {
        if !self.on {
            return val;
        }
        let val = val.max(0.0);
        val * (self.min + (1.0 - self.min) * attn)
    }
}

impl ClampParams {
    pub fn is_err(&self, act: f32, target: f32) -> bool {
        (act > self.err_thr) != (target > self.err_thr)
    }
}

impl BurstParams {
    pub fn thr_from_avg_max(&self, avg: f32, max: f32) -> f32 {
        let thr = avg + self.thr_rel * (max - avg);
        thr.max(self.thr_abs)
    }
}

impl NeuroModParams {
    pub fn lr_mod_fact(pct: f32, val: f32) -> f32 {
        let val = val.abs().clamp(0.0, 1.0);
        1.0 - pct * (1.0 - val)
    }

    pub fn da_gain(&self, da: f32) -> f32 {
        if da > 0.0 {
            da * self.burst_gain
        } else {
            da * self.dip_gain
        }
    }

    pub fn lr_mod(&self, da: f32, ach: f32) -> f32 {
        let mut modulation = Self::lr_mod_fact(self.ach_lrate_mod, ach);
        if self.da_lrate_sign {
            let da = self.da_gain(da);
            match self.da_mod {
                DaModKind::D1Mod => modulation *= da,
                DaModKind::D2Mod => modulation *= -da,
                DaModKind::NoDaMod | DaModKind::D1AbsMod => {}
            }
        } else {
            modulation *= Self::lr_mod_fact(self.da_lrate_mod, da);
        }
        modulation
    }

    pub fn g_gain(&self, da: f32) -> f32 {
        let da = self.da_gain(da);
        let gain = match self.da_mod {
            DaModKind::NoDaMod => 1.0,
            DaModKind::D1Mod => 1.0 + self.da_mod_gain * da,
            DaModKind::D2Mod => 1.0 - self.da_mod_gain * da,
            DaModKind::D1AbsMod => 1.0 + self.da_mod_gain * da.abs(),
        };
        gain.max(0.0)
    }

    pub fn gi_from_ach(&self, ach: f32) -> f32 {
        self.ach_disinhib * (1.0 - ach).max(0.0)
    }
}

impl RlRateParams {
    pub fn sig_deriv(&self, act: f32, lay_max: f32) -> f32 {
        if !self.on || lay_max == 0.0 {
            return 1.0;
        }
        let ca = act / lay_max;
        (4.0 * ca * (1.0 - ca)).max(self.sigmoid_min)
    }

    pub fn diff(&self, ca_p: f32, ca_d: f32) -> f32 {
        if !self.on || !self.diff {
            return 1.0;
        }
        let max = ca_p.max(ca_d);
        if max > self.spk_thr {
            let dif = (ca_p - ca_d).abs();
            if dif < self.diff_thr {
                self.min
            } else {
                dif / max
            }
        } else {
            self.min
        }
    }
}

impl CaSpkParams {
    pub fn syn_dt(&self) -> f32 {
        1.0 / self.syn_tau
    }

    pub fn ca_from_spike(&self, nrn: &mut Neuron) {
        let nsp = self.spike_g * nrn.spike;
        nrn.ca_syn += self.syn_dt() * (nsp - nrn.ca_syn);
        self.dt
            .from_ca(nsp, &mut nrn.ca_spk_m, &mut nrn.ca_spk_p, &mut nrn.ca_spk_d);
    }
}

impl CaLrnParams {
    pub fn vgcc_dt(&self) -> f32 {
        1.0 / self.vgcc_tau
    }

    pub fn ca_lrn(&self, nrn: &mut Neuron) {
        if self.spk_vgcc {
            nrn.vgcc_ca = self.spk_vgcc_ca * nrn.spike;
        }
        nrn.vgcc_ca_int += nrn.vgcc_ca - self.vgcc_dt() * nrn.vgcc_ca_int;
        nrn.ca_lrn = (nrn.nmda_ca + nrn.vgcc_ca_int) / self.norm;
        self.dt
            .from_ca(nrn.ca_lrn, &mut nrn.nrn_ca_m, &mut nrn.nrn_ca_p, &mut nrn.nrn_ca_d);
        nrn.ca_diff = nrn.nrn_ca_p - nrn.nrn_ca_d;
    }
}

impl LearnNeuronParams {
    pub fn init_neuron_ca(&self, nrn: &mut Neuron) {
        nrn.gnmda_lrn = 0.0;
        nrn.nmda_ca = 0.0;
        nrn.vgcc_ca = 0.0;
        nrn.vgcc_ca_int = 0.0;
        nrn.ca_lrn = 0.0;
        nrn.ca_syn = 0.0;
        nrn.ca_spk_m = 0.0;
        nrn.ca_spk_p = 0.0;
        nrn.ca_spk_d = 0.0;
        nrn.ca_spk_pm = 0.0;
        nrn.nrn_ca_m = 0.0;
        nrn.nrn_ca_p = 0.0;
        nrn.nrn_ca_d = 0.0;
        nrn.ca_diff = 0.0;
    }

    pub fn decay_ca_lrn_spk(&self, nrn: &mut Neuron, decay: f32) {
        nrn.gnmda_lrn -= decay * nrn.gnmda_lrn;
        nrn.nmda_ca -= decay * nrn.nmda_ca;
        nrn.vgcc_ca -= decay * nrn.vgcc_ca;
        nrn.vgcc_ca_int -= decay * nrn.vgcc_ca_int;
        nrn.ca_lrn -= decay * nrn.ca_lrn;
        nrn.ca_syn -= decay * nrn.ca_syn;
        nrn.ca_spk_m -= decay * nrn.ca_spk_m;
        nrn.ca_spk_p -= decay * nrn.ca_spk_p;
        nrn.ca_spk_d -= decay * nrn.ca_spk_d;
        nrn.nrn_ca_m -= decay * nrn.nrn_ca_m;
        nrn.nrn_ca_p -= decay * nrn.nrn_ca_p;
        nrn.nrn_ca_d -= decay * nrn.nrn_ca_d;
    }

    pub fn lrn_nmda_from_raw(&self, nrn: &mut Neuron, ge_tot: f32) {
        let ge_tot = ge_tot.max(0.0);
        nrn.gnmda_lrn = self.lrn_nmda.nmda_syn(nrn.gnmda_lrn, ge_tot);
        let gnmda = self.lrn_nmda.gnmda(nrn.gnmda_lrn, nrn.vm_dend);
        nrn.nmda_ca = gnmda * self.lrn_nmda.ca_from_v(nrn.vm_dend);
    }

    pub fn ca_from_spike(&self, nrn: &mut Neuron) {
        self.ca_spk.ca_from_spike(nrn);
        self.ca_lrn.ca_lrn(nrn);
    }
}

impl ActParams {
    /// Full reset to initial values.
    pub fn init_acts(&self, nrn: &mut Neuron) {
        nrn.spike = 0.0;
        nrn.spiked = 0.0;
        nrn.isi = -1.0;
        nrn.isi_avg = -1.0;
        nrn.act = self.init.act;
        nrn.act_int = self.init.act;
        nrn.act_m = 0.0;
        nrn.act_p = 0.0;
        nrn.ge = nrn.ge_base;
        nrn.gi = nrn.gi_base;
        nrn.gk = 0.0;
        nrn.inet = 0.0;
        nrn.vm = self.init.vm;
        nrn.vm_dend = self.init.vm;
        nrn.spk_max_ca = 0.0;
        nrn.spk_max = 0.0;
        nrn.spk_prv = 0.0;
        nrn.rl_rate = 1.0;
        nrn.burst = 0.0;
        nrn.burst_prv = 0.0;
        nrn.ctxt_ge = 0.0;
        nrn.ctxt_ge_raw = 0.0;

        nrn.ge_noise_p = 1.0;
        nrn.ge_noise = 0.0;
        nrn.gi_noise_p = 1.0;
        nrn.gi_noise = 0.0;

        nrn.ge_raw = 0.0;
        nrn.ge_syn = nrn.ge_base;
        nrn.gi_raw = 0.0;
        nrn.gi_syn = nrn.gi_base;
        nrn.ge_ext = 0.0;
        nrn.ge_m = 0.0;
        nrn.gi_m = 0.0;
        nrn.ss_gi = 0.0;
        nrn.ss_gi_dend = 0.0;

        nrn.mahp_n = 0.0;
        nrn.sahp_ca = 0.0;
        nrn.sahp_n = 0.0;
        nrn.gkna_med = 0.0;
        nrn.gkna_slow = 0.0;

        nrn.gnmda_syn = 0.0;
        nrn.gnmda = 0.0;

        nrn.ggaba_b = 0.0;
        nrn.gaba_b = 0.0;
        nrn.gaba_bx = 0.0;

        nrn.gvgcc = 0.0;
        nrn.vgcc_m = 0.0;
        nrn.vgcc_h = 0.0;
        nrn.gak = 0.0;

        nrn.skca_ca_i = 0.0;
        nrn.skca_m = 0.0;
        nrn.gsk = 0.0;

        nrn.attn = 1.0;
    }

    /// Partial decay toward initial values at the start of a trial.
    pub fn decay_state(&self, nrn: &mut Neuron, decay: f32, glong: f32) {
        nrn.isi_avg = -1.0;
        nrn.act_int = self.init.act;

        if decay > 0.0 {
            nrn.spike = 0.0;
            nrn.spiked = 0.0;
            nrn.act -= decay * (nrn.act - self.init.act);
            nrn.act_int -= decay * (nrn.act_int - self.init.act);
            nrn.ge_syn -= decay * (nrn.ge_syn - nrn.ge_base);
            nrn.ge -= decay * (nrn.ge - nrn.ge_base);
            nrn.gi -= decay * (nrn.gi - nrn.gi_base);
            nrn.gk -= decay * nrn.gk;
            nrn.vm -= decay * (nrn.vm - self.init.vm);
            nrn.ge_noise -= decay * nrn.ge_noise;
            nrn.gi_noise -= decay * nrn.gi_noise;
            nrn.gi_syn -= decay * nrn.gi_syn;
        }

        nrn.vm_dend -= glong * (nrn.vm_dend - self.init.vm);

        let ahp = self.decay.ahp;
        nrn.mahp_n -= ahp * nrn.mahp_n;
        nrn.sahp_ca -= ahp * nrn.sahp_ca;
        nrn.sahp_n -= ahp * nrn.sahp_n;
        nrn.gkna_med -= ahp * nrn.gkna_med;
        nrn.gkna_slow -= ahp * nrn.gkna_slow;

        nrn.ggaba_b -= glong * nrn.ggaba_b;
        nrn.gaba_b -= glong * nrn.gaba_b;
        nrn.gaba_bx -= glong * nrn.gaba_bx;

        nrn.gnmda_syn -= glong * nrn.gnmda_syn;
        nrn.gnmda -= glong * nrn.gnmda;

        nrn.gvgcc -= glong * nrn.gvgcc;
        nrn.vgcc_m -= glong * nrn.vgcc_m;
        nrn.vgcc_h -= glong * nrn.vgcc_h;
        nrn.gak -= glong * nrn.gak;

        nrn.skca_ca_i -= glong * nrn.skca_ca_i;
        nrn.skca_m -= glong * nrn.skca_m;
        nrn.gsk -= glong * nrn.gsk;

        nrn.inet = 0.0;
        nrn.ge_raw = 0.0;
        nrn.gi_raw = 0.0;
        nrn.ss_gi = 0.0;
        nrn.ss_gi_dend = 0.0;
        nrn.ge_ext = 0.0;
    }

    pub fn nmda_from_raw(&self, nrn: &mut Neuron, ge_tot: f32) {
        if self.nmda.gbar == 0.0 {
            return;
        }
        let ge_tot = ge_tot.max(0.0);
        nrn.gnmda_syn = self.nmda.nmda_syn(nrn.gnmda_syn, ge_tot);
        nrn.gnmda = self.nmda.gnmda(nrn.gnmda_syn, nrn.vm_dend);
    }

    pub fn gvgcc_from_vm(&self, nrn: &mut Neuron) {
        if self.vgcc.gbar == 0.0 {
            return;
        }
        self.vgcc
            .update_gates(nrn.vm_dend, &mut nrn.vgcc_m, &mut nrn.vgcc_h);
        nrn.gvgcc = self.vgcc.gvgcc(nrn.vm_dend, nrn.vgcc_m, nrn.vgcc_h);
        nrn.vgcc_ca = self.vgcc.ca_from_g(nrn.vm_dend, nrn.gvgcc);
    }

    /// Total excitatory conductance, with external clamping overriding synaptic input
    /// unless `clamp.add` is set.
    pub fn ge_from_syn(&self, nrn: &mut Neuron, ge_syn: f32, ge_ext: f32, ge_rand: f32) {
        let mut ge_syn = ge_syn;
        let mut ge_ext = ge_ext;
        nrn.ge_ext = 0.0;

        if self.clamp.add && nrn.has_ext {
            nrn.ge_ext = nrn.ext * self.clamp.ge;
            ge_syn += nrn.ge_ext;
        }

        ge_syn = self.attn.mod_val(ge_syn, nrn.attn);

        if !self.clamp.add && nrn.has_ext {
            ge_syn = nrn.ext * self.clamp.ge;
            nrn.ge_ext = ge_syn;
            ge_ext = 0.0;
        }

        nrn.ge = (ge_syn + ge_ext).max(0.0);
        self.ge_noise(nrn, ge_rand);
    }

    fn ge_noise(&self, nrn: &mut Neuron, rand: f32) {
        if !self.noise.on || self.noise.ge == 0.0 {
            return;
        }
        let ev = NoiseParams::poisson_event(&mut nrn.ge_noise_p, rand, self.noise.ge_exp_int());
        nrn.ge_noise = self.dt.ge_syn_from_raw(nrn.ge_noise, self.noise.ge * ev);
        nrn.ge += nrn.ge_noise;
    }

    pub fn gi_from_syn(&self, nrn: &mut Neuron, gi_syn: f32, gi_rand: f32) -> f32 {
        self.gi_noise(nrn, gi_rand);
        gi_syn.max(0.0)
    }

    fn gi_noise(&self, nrn: &mut Neuron, rand: f32) {
        if !self.noise.on || self.noise.gi == 0.0 {
            return;
        }
        let ev = NoiseParams::poisson_event(&mut nrn.gi_noise_p, rand, self.noise.gi_exp_int());
        nrn.gi_noise = self.dt.gi_syn_from_raw(nrn.gi_noise, self.noise.gi * ev);
    }

    /// Potassium-family conductances driven by voltage, spiking and calcium.
    pub fn gk_from_vm(&self, nrn: &mut Neuron) {
        nrn.mahp_n += self.mahp.dn_from_v(nrn.vm, nrn.mahp_n);
        nrn.gak = self.ak.gak(nrn.vm_dend);
        nrn.gk = nrn.gak + self.mahp.gmahp(nrn.mahp_n) + self.sahp.gsahp(nrn.sahp_n);

        if self.kna.on {
            let spike = nrn.is_spiking();
            self.kna
                .gc_from_spike(&mut nrn.gkna_med, &mut nrn.gkna_slow, spike);
            nrn.gk += nrn.gkna_med + nrn.gkna_slow;
        }

        if self.skca.gbar > 0.0 {
            nrn.skca_ca_i = nrn.ca_spk_d;
            nrn.skca_m = self.skca.m_from_ca(nrn.skca_ca_i, nrn.skca_m);
            nrn.gsk = self.skca.gsk(nrn.skca_m);
            nrn.gk += nrn.gsk;
        }
    }

    pub fn gaba_b_from_gi(&self, nrn: &mut Neuron) {
        self.gaba_b.update(&mut nrn.gaba_b, &mut nrn.gaba_bx, nrn.gi);
        nrn.ggaba_b = self.gaba_b.ggaba_b(nrn.gaba_b, nrn.vm_dend);
        nrn.gk += nrn.ggaba_b;
    }

    /// Slow AHP integrates calcium over trials, not cycles.
    pub fn sahp_from_ca(&self, nrn: &mut Neuron) {
        nrn.sahp_ca = self.sahp.ca_int(nrn.sahp_ca, nrn.ca_spk_d);
        nrn.sahp_n += self.sahp.dn_from_ca(nrn.sahp_ca, nrn.sahp_n);
    }

    pub fn inet_from_g(&self, vm: f32, ge: f32, gl: f32, gi: f32, gk: f32) -> f32 {
        let inet = ge * (self.erev.e - vm)
            + gl * self.gbar.l * (self.erev.l - vm)
            + gi * (self.erev.i - vm)
            + gk * (self.erev.k - vm);
        inet.clamp(-self.dt.vm_tau, self.dt.vm_tau)
    }

    pub fn vm_from_inet(&self, vm: f32, dt: f32, inet: f32) -> f32 {
        self.vm_range.clip(vm + dt * inet)
    }

    /// Integrates over `vm_steps` sub-steps, returning the new potential and the last
    /// net current.
    pub fn vm_integ(&self, vm: f32, dt: f32, ge: f32, gl: f32, gi: f32, gk: f32) -> (f32, f32) {
        let dt = dt * self.dt.dt_step();
        let mut nvm = vm;
        let mut inet = 0.0;
        for _ in 0..self.dt.vm_steps {
            inet = self.inet_from_g(nvm, ge, gl, gi, gk);
            nvm = self.vm_from_inet(nvm, dt, inet);
        }
        (nvm, inet)
    }

    pub fn is_refractory(&self, nrn: &Neuron) -> bool {
        self.spike.tr > 0 && nrn.isi >= 0.0 && nrn.isi < self.spike.tr as f32
    }

    pub fn vm_from_g(&self, nrn: &mut Neuron) {
        let refractory = self.is_refractory(nrn);

        let ge = nrn.ge * self.gbar.e;
        let gi = nrn.gi * self.gbar.i;
        let gk = nrn.gk * self.gbar.k;
        let mut expi = 0.0;

        if !refractory {
            let (mut nvm, mut inet) = self.vm_integ(nrn.vm, self.dt.vm_dt(), ge, 1.0, gi, gk);
            if self.spike.exp {
                let ex_vm = 0.5 * (nvm + nrn.vm);
                expi = self.gbar.l
                    * self.spike.exp_slope
                    * ((ex_vm - self.spike.thr) / self.spike.exp_slope).exp();
                expi = expi.min(self.dt.vm_tau);
                inet += expi;
                nvm = self.vm_from_inet(nvm, self.dt.vm_dt(), expi);
            }
            nrn.vm = nvm;
            nrn.inet = inet;
        } else {
            let dvm = if nrn.isi as i32 == self.spike.tr - 1 {
                self.spike.vm_r - nrn.vm
            } else {
                self.spike.r_dt() * (self.spike.vm_r - nrn.vm)
            };
            nrn.vm += dvm;
            nrn.inet = dvm * self.dt.vm_tau;
        }

        let gl_eff = if refractory {
            1.0 + self.dend.gbar_r
        } else {
            1.0
        };
        let gi_eff = gi + self.gbar.i * nrn.ss_gi_dend;
        let (mut nvm, _) = self.vm_integ(nrn.vm_dend, self.dt.vm_dend_dt(), ge, gl_eff, gi_eff, gk);
        if !refractory {
            nvm = self.vm_from_inet(nvm, self.dt.vm_dend_dt(), self.dend.gbar_exp * expi);
        }
        nrn.vm_dend = nvm;
    }

    pub fn spike_from_vm(&self, nrn: &mut Neuron) {
        if nrn.vm >= self.spike.spike_threshold() {
            nrn.spike = 1.0;
            if nrn.isi_avg == -1.0 {
                nrn.isi_avg = -2.0;
            } else if nrn.isi > 0.0 {
                nrn.isi_avg = self.spike.avg_from_isi(nrn.isi_avg, nrn.isi + 1.0);
            }
            nrn.isi = 0.0;
        } else {
            nrn.spike = 0.0;
            if nrn.isi >= 0.0 {
                nrn.isi += 1.0;
                nrn.spiked = if nrn.isi < 10.0 { 1.0 } else { 0.0 };
                if nrn.isi > 200.0 {
                    nrn.isi = -1.0;
                }
            } else {
                nrn.spiked = 0.0;
            }
            if nrn.isi_avg >= 0.0 && nrn.isi > 0.0 && nrn.isi > 1.2 * nrn.isi_avg {
                nrn.isi_avg = self.spike.avg_from_isi(nrn.isi_avg, nrn.isi);
            }
        }

        let new_act = self
            .spike
            .act_from_isi(nrn.isi_avg, 0.001, self.dt.integ)
            .min(1.0);
        nrn.act += self.dt.vm_dt() * (new_act - nrn.act);
    }
}
