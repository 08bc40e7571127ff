use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::types::HashSet;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    #[serde(default)]
    pub name: String,
    pub layers: Vec<LayerParams>,
    pub projections: Vec<ProjectionParams>,
    #[serde(default)]
    pub timing: TimingParams,
    #[serde(default)]
    pub technical_params: TechnicalParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Super,
    Input,
    Target,
    Compare,
    Ct,
    Pulvinar,
}

impl LayerKind {
    /// Layers that receive values through `Network::apply_ext`.
    pub fn takes_ext(self) -> bool {
        matches!(self, LayerKind::Input | LayerKind::Target | LayerKind::Compare)
    }

    pub fn is_input_or_target(self) -> bool {
        matches!(self, LayerKind::Input | LayerKind::Target)
    }

    pub fn is_target(self) -> bool {
        matches!(self, LayerKind::Target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerParams {
    pub name: String,
    pub shape: Vec<usize>,
    pub kind: LayerKind,
    #[serde(default)]
    pub act: ActParams,
    #[serde(default)]
    pub inhib: InhibParams,
    #[serde(default)]
    pub learn: LearnNeuronParams,
    #[serde(default)]
    pub burst: BurstParams,
    #[serde(default)]
    pub ct: CtParams,
    #[serde(default)]
    pub pulvinar: PulvinarParams,
}

impl LayerParams {
    pub fn defaults_for_layer(name: &str, shape: &[usize], kind: LayerKind) -> Self {
        Self {
            name: name.to_string(),
            shape: shape.to_vec(),
            kind,
            act: ActParams::default(),
            inhib: InhibParams::default(),
            learn: LearnNeuronParams::default(),
            burst: BurstParams::default(),
            ct: CtParams::default(),
            pulvinar: PulvinarParams::default(),
        }
    }

    pub fn num_neurons(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of sub-pools: the outer two dimensions of a 4-D shape, none otherwise.
    pub fn num_sub_pools(&self) -> usize {
        if self.shape.len() == 4 {
            self.shape[0] * self.shape[1]
        } else {
            0
        }
    }

    pub fn neurons_per_sub_pool(&self) -> usize {
        if self.shape.len() == 4 {
            self.shape[2] * self.shape[3]
        } else {
            self.num_neurons()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionKind {
    Forward,
    Back,
    Lateral,
    Inhib,
    CtContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConnectionPattern {
    Full,
    OneToOne,
    Random { probability: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub from: String,
    pub to: String,
    pub kind: ProjectionKind,
    #[serde(default)]
    pub pattern: ConnectionPattern,
    #[serde(default)]
    pub self_connections: bool,
    #[serde(default)]
    pub com: SynComParams,
    #[serde(default)]
    pub scale: ScaleParams,
    #[serde(default)]
    pub swt: SWtParams,
    #[serde(default)]
    pub learn: LearnSynParams,
}

impl ProjectionParams {
    pub fn defaults_for_layers(from: &str, to: &str, kind: ProjectionKind) -> Self {
        let mut result = Self {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            pattern: ConnectionPattern::Full,
            self_connections: false,
            com: SynComParams::default(),
            scale: ScaleParams::default(),
            swt: SWtParams::default(),
            learn: LearnSynParams::default(),
        };

        if kind == ProjectionKind::Inhib {
            result.learn.learn = false;
            result.swt.adapt.on = false;
        }

        result
    }

    pub fn name(&self) -> String {
        format!("{}To{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActParams {
    pub spike: SpikeParams,
    pub dend: DendParams,
    pub init: ActInitParams,
    pub decay: DecayParams,
    pub dt: DtParams,
    pub gbar: Chans,
    pub erev: Chans,
    pub clamp: ClampParams,
    pub noise: NoiseParams,
    pub vm_range: MinMax,
    pub mahp: MahpParams,
    pub sahp: SahpParams,
    pub kna: KnaParams,
    pub nmda: NmdaParams,
    pub gaba_b: GabaBParams,
    pub vgcc: VgccParams,
    pub ak: AkParams,
    pub skca: SkcaParams,
    pub attn: AttnParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeParams {
    pub thr: f32,
    pub vm_r: f32,
    pub tr: i32,
    pub r_tau: f32,
    pub exp: bool,
    pub exp_slope: f32,
    pub exp_thr: f32,
    pub max_hz: f32,
    pub isi_tau: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DendParams {
    pub gbar_exp: f32,
    pub gbar_r: f32,
    pub ss_gi: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActInitParams {
    pub vm: f32,
    pub act: f32,
    pub ge_base: f32,
    pub gi_base: f32,
    pub ge_var: f32,
    pub gi_var: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayParams {
    pub act: f32,
    pub glong: f32,
    pub ahp: f32,
    /// Trial-start decay of the learning calcium traces, off by default.
    pub learn_ca: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DtParams {
    pub integ: f32,
    pub vm_tau: f32,
    pub vm_dend_tau: f32,
    pub vm_steps: u32,
    pub ge_tau: f32,
    pub gi_tau: f32,
    pub int_tau: f32,
    pub long_avg_tau: f32,
    pub max_cyc_start: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Chans {
    pub e: f32,
    pub l: f32,
    pub i: f32,
    pub k: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampParams {
    pub ge: f32,
    pub add: bool,
    pub err_thr: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub on: bool,
    pub ge_hz: f32,
    pub ge: f32,
    pub gi_hz: f32,
    pub gi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f32,
    pub max: f32,
}

impl MinMax {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clip(&self, val: f32) -> f32 {
        val.clamp(self.min, self.max)
    }

    pub fn range(&self) -> f32 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MahpParams {
    pub gbar: f32,
    pub voff: f32,
    pub vslope: f32,
    pub tau_max: f32,
    pub tadj: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SahpParams {
    pub gbar: f32,
    pub ca_tau: f32,
    pub off: f32,
    pub slope: f32,
    pub tau_max: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KnaChanParams {
    pub on: bool,
    pub rise: f32,
    pub max: f32,
    pub tau: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KnaParams {
    pub on: bool,
    pub med: KnaChanParams,
    pub slow: KnaChanParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NmdaParams {
    pub gbar: f32,
    pub tau: f32,
    pub mg_c: f32,
    pub voff: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GabaBParams {
    pub gbar: f32,
    pub rise_tau: f32,
    pub decay_tau: f32,
    pub gbase: f32,
    pub gi_spike: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VgccParams {
    pub gbar: f32,
    pub ca: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AkParams {
    pub gbar: f32,
    pub hf: f32,
    pub mf: f32,
    pub voff: f32,
    pub vmax: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SkcaParams {
    pub gbar: f32,
    pub c50: f32,
    pub act_tau: f32,
    pub de_tau: f32,
    pub ca_scale: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AttnParams {
    pub on: bool,
    pub min: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct InhibParams {
    pub layer: GiParams,
    pub pool: GiParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GiParams {
    pub on: bool,
    pub gi: f32,
    pub fb: f32,
    pub fs_tau: f32,
    pub ss: f32,
    pub ssf_tau: f32,
    pub ssi_tau: f32,
    pub fs0: f32,
    pub clamp_ext_min: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CaDtParams {
    pub m_tau: f32,
    pub p_tau: f32,
    pub d_tau: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CaSpkParams {
    pub spike_g: f32,
    pub syn_tau: f32,
    pub dt: CaDtParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CaLrnParams {
    pub norm: f32,
    pub spk_vgcc: bool,
    pub spk_vgcc_ca: f32,
    pub vgcc_tau: f32,
    pub dt: CaDtParams,
    pub updt_thr: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrgAvgParams {
    pub on: bool,
    pub range: MinMax,
    pub permute: bool,
    pub err_lrate: f32,
    pub syn_scale_rate: f32,
    pub sub_mean: f32,
    pub nominal_act: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RlRateParams {
    pub on: bool,
    pub sigmoid_min: f32,
    pub diff: bool,
    pub spk_thr: f32,
    pub diff_thr: f32,
    pub min: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaModKind {
    NoDaMod,
    D1Mod,
    D2Mod,
    D1AbsMod,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuroModParams {
    pub da_mod: DaModKind,
    pub da_mod_gain: f32,
    pub da_lrate_sign: bool,
    pub da_lrate_mod: f32,
    pub ach_lrate_mod: f32,
    pub ach_disinhib: f32,
    pub burst_gain: f32,
    pub dip_gain: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnNeuronParams {
    pub ca_spk: CaSpkParams,
    pub ca_lrn: CaLrnParams,
    pub lrn_nmda: NmdaParams,
    pub trg_avg: TrgAvgParams,
    pub rl_rate: RlRateParams,
    pub neuromod: NeuroModParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstParams {
    pub thr_rel: f32,
    pub thr_abs: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CtParams {
    pub ge_gain: f32,
    pub decay_tau: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulvinarParams {
    pub drive_layer: Option<String>,
    pub drive_scale: f32,
    pub full_drive_act: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SynComParams {
    pub delay: u32,
    pub p_fail: f32,
    pub p_fail_swt: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleParams {
    pub abs: f32,
    pub rel: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtInitParams {
    pub spct: f32,
    pub mean: f32,
    pub var: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtAdaptParams {
    pub on: bool,
    pub lrate: f32,
    pub sub_mean: f32,
    pub sig_gain: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtParams {
    pub init: SWtInitParams,
    pub adapt: SWtAdaptParams,
    pub limit: MinMax,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LRateParams {
    pub base: f32,
    pub sched: f32,
    pub modulation: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParams {
    pub tau: f32,
    pub sub_mean: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KinaseCaParams {
    pub spike_g: f32,
    pub dt: CaDtParams,
    pub d_scale: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnSynParams {
    pub learn: bool,
    pub lrate: LRateParams,
    pub trace: TraceParams,
    pub kinase_ca: KinaseCaParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingParams {
    pub theta_cycles: u32,
    pub plus_cycles: u32,
    pub slow_interval: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Host,
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalParams {
    pub backend: BackendKind,
    pub num_threads: Option<usize>,
    pub pin_threads: bool,
    pub seed_override: Option<u64>,
}

impl Default for ConnectionPattern {
    fn default() -> Self {
        ConnectionPattern::Full
    }
}

impl Default for ActParams {
    fn default() -> Self {
        Self {
            spike: SpikeParams::default(),
            dend: DendParams::default(),
            init: ActInitParams::default(),
            decay: DecayParams::default(),
            dt: DtParams::default(),
            gbar: Chans {
                e: 1.0,
                l: 0.2,
                i: 1.0,
                k: 1.0,
            },
            erev: Chans {
                e: 1.0,
                l: 0.3,
                i: 0.1,
                k: 0.1,
            },
            clamp: ClampParams::default(),
            noise: NoiseParams::default(),
            vm_range: MinMax::new(0.1, 1.0),
            mahp: MahpParams::default(),
            sahp: SahpParams::default(),
            kna: KnaParams::default(),
            nmda: NmdaParams::default(),
            gaba_b: GabaBParams::default(),
            vgcc: VgccParams::default(),
            ak: AkParams::default(),
            skca: SkcaParams::default(),
            attn: AttnParams::default(),
        }
    }
}

impl Default for SpikeParams {
    fn default() -> Self {
        Self {
            thr: 0.5,
            vm_r: 0.3,
            tr: 3,
            r_tau: 1.6667,
            exp: true,
            exp_slope: 0.02,
            exp_thr: 0.9,
            max_hz: 180.0,
            isi_tau: 5.0,
        }
    }
}

impl Default for DendParams {
    fn default() -> Self {
        Self {
            gbar_exp: 0.2,
            gbar_r: 3.0,
            ss_gi: 2.0,
        }
    }
}

impl Default for ActInitParams {
    fn default() -> Self {
        Self {
            vm: 0.3,
            act: 0.0,
            ge_base: 0.0,
            gi_base: 0.0,
            ge_var: 0.0,
            gi_var: 0.0,
        }
    }
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            act: 0.2,
            glong: 0.6,
            ahp: 0.0,
            learn_ca: 0.0,
        }
    }
}

impl Default for DtParams {
    fn default() -> Self {
        Self {
            integ: 1.0,
            vm_tau: 2.81,
            vm_dend_tau: 5.0,
            vm_steps: 2,
            ge_tau: 5.0,
            gi_tau: 7.0,
            int_tau: 40.0,
            long_avg_tau: 20.0,
            max_cyc_start: 50,
        }
    }
}

impl Default for Chans {
    fn default() -> Self {
        Self {
            e: 0.0,
            l: 0.0,
            i: 0.0,
            k: 0.0,
        }
    }
}

impl Default for ClampParams {
    fn default() -> Self {
        Self {
            ge: 0.8,
            add: false,
            err_thr: 0.5,
        }
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            on: false,
            ge_hz: 100.0,
            ge: 0.001,
            gi_hz: 200.0,
            gi: 0.001,
        }
    }
}

impl Default for MinMax {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl Default for MahpParams {
    fn default() -> Self {
        Self {
            gbar: 0.02,
            voff: -30.0,
            vslope: 9.0,
            tau_max: 1000.0,
            tadj: 3.209_428,
        }
    }
}

impl Default for SahpParams {
    fn default() -> Self {
        Self {
            gbar: 0.05,
            ca_tau: 5.0,
            off: 0.8,
            slope: 0.02,
            tau_max: 1.0,
        }
    }
}

impl Default for KnaChanParams {
    fn default() -> Self {
        Self {
            on: true,
            rise: 0.02,
            max: 0.2,
            tau: 200.0,
        }
    }
}

impl Default for KnaParams {
    fn default() -> Self {
        Self {
            on: true,
            med: KnaChanParams::default(),
            slow: KnaChanParams {
                on: true,
                rise: 0.001,
                max: 0.2,
                tau: 1000.0,
            },
        }
    }
}

impl Default for NmdaParams {
    fn default() -> Self {
        Self {
            gbar: 0.15,
            tau: 100.0,
            mg_c: 1.2,
            voff: 0.0,
        }
    }
}

impl Default for GabaBParams {
    fn default() -> Self {
        Self {
            gbar: 0.2,
            rise_tau: 45.0,
            decay_tau: 50.0,
            gbase: 0.2,
            gi_spike: 10.0,
        }
    }
}

impl Default for VgccParams {
    fn default() -> Self {
        Self {
            gbar: 0.02,
            ca: 25.0,
        }
    }
}

impl Default for AkParams {
    fn default() -> Self {
        Self {
            gbar: 0.1,
            hf: 0.076,
            mf: 0.075,
            voff: 2.0,
            vmax: -37.0,
        }
    }
}

impl Default for SkcaParams {
    fn default() -> Self {
        Self {
            gbar: 0.0,
            c50: 0.5,
            act_tau: 15.0,
            de_tau: 30.0,
            ca_scale: 1.0,
        }
    }
}

impl Default for AttnParams {
    fn default() -> Self {
        Self { on: true, min: 0.8 }
    }
}

impl Default for InhibParams {
    fn default() -> Self {
        Self {
            layer: GiParams::default(),
            pool: GiParams {
                on: false,
                ..GiParams::default()
            },
        }
    }
}

impl Default for GiParams {
    fn default() -> Self {
        Self {
            on: true,
            gi: 1.0,
            fb: 1.0,
            fs_tau: 6.0,
            ss: 30.0,
            ssf_tau: 20.0,
            ssi_tau: 50.0,
            fs0: 0.1,
            clamp_ext_min: 0.05,
        }
    }
}

impl Default for CaDtParams {
    fn default() -> Self {
        Self {
            m_tau: 5.0,
            p_tau: 40.0,
            d_tau: 40.0,
        }
    }
}

impl Default for CaSpkParams {
    fn default() -> Self {
        Self {
            spike_g: 8.0,
            syn_tau: 30.0,
            dt: CaDtParams::default(),
        }
    }
}

impl Default for CaLrnParams {
    fn default() -> Self {
        Self {
            norm: 80.0,
            spk_vgcc: true,
            spk_vgcc_ca: 35.0,
            vgcc_tau: 10.0,
            dt: CaDtParams {
                m_tau: 2.0,
                p_tau: 40.0,
                d_tau: 40.0,
            },
            updt_thr: 0.01,
        }
    }
}

impl Default for TrgAvgParams {
    fn default() -> Self {
        Self {
            on: true,
            range: MinMax::new(0.5, 2.0),
            permute: true,
            err_lrate: 0.02,
            syn_scale_rate: 0.005,
            sub_mean: 0.0,
            nominal_act: 0.1,
        }
    }
}

impl Default for RlRateParams {
    fn default() -> Self {
        Self {
            on: true,
            sigmoid_min: 0.05,
            diff: true,
            spk_thr: 0.1,
            diff_thr: 0.02,
            min: 0.001,
        }
    }
}

impl Default for NeuroModParams {
    fn default() -> Self {
        Self {
            da_mod: DaModKind::NoDaMod,
            da_mod_gain: 0.5,
            da_lrate_sign: false,
            da_lrate_mod: 0.0,
            ach_lrate_mod: 0.0,
            ach_disinhib: 0.0,
            burst_gain: 1.0,
            dip_gain: 1.0,
        }
    }
}

impl Default for LearnNeuronParams {
    fn default() -> Self {
        Self {
            ca_spk: CaSpkParams::default(),
            ca_lrn: CaLrnParams::default(),
            lrn_nmda: NmdaParams {
                gbar: 0.15,
                tau: 100.0,
                mg_c: 1.4,
                voff: 0.0,
            },
            trg_avg: TrgAvgParams::default(),
            rl_rate: RlRateParams::default(),
            neuromod: NeuroModParams::default(),
        }
    }
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            thr_rel: 0.1,
            thr_abs: 0.1,
        }
    }
}

impl Default for CtParams {
    fn default() -> Self {
        Self {
            ge_gain: 1.0,
            decay_tau: 50.0,
        }
    }
}

impl Default for PulvinarParams {
    fn default() -> Self {
        Self {
            drive_layer: None,
            drive_scale: 0.1,
            full_drive_act: 0.6,
        }
    }
}

impl Default for SynComParams {
    fn default() -> Self {
        Self {
            delay: 2,
            p_fail: 0.0,
            p_fail_swt: false,
        }
    }
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self { abs: 1.0, rel: 1.0 }
    }
}

impl Default for SWtInitParams {
    fn default() -> Self {
        Self {
            spct: 0.5,
            mean: 0.5,
            var: 0.25,
        }
    }
}

impl Default for SWtAdaptParams {
    fn default() -> Self {
        Self {
            on: true,
            lrate: 0.1,
            sub_mean: 1.0,
            sig_gain: 6.0,
        }
    }
}

impl Default for SWtParams {
    fn default() -> Self {
        Self {
            init: SWtInitParams::default(),
            adapt: SWtAdaptParams::default(),
            limit: MinMax::new(0.2, 0.8),
        }
    }
}

impl Default for LRateParams {
    fn default() -> Self {
        Self {
            base: 0.04,
            sched: 1.0,
            modulation: 1.0,
        }
    }
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            tau: 1.0,
            sub_mean: 0.0,
        }
    }
}

impl Default for KinaseCaParams {
    fn default() -> Self {
        Self {
            spike_g: 12.0,
            dt: CaDtParams::default(),
            d_scale: 1.0,
        }
    }
}

impl Default for LearnSynParams {
    fn default() -> Self {
        Self {
            learn: true,
            lrate: LRateParams::default(),
            trace: TraceParams::default(),
            kinase_ca: KinaseCaParams::default(),
        }
    }
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            theta_cycles: 200,
            plus_cycles: 50,
            slow_interval: 100,
        }
    }
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            backend: BackendKind::Host,
            num_threads: None,
            pin_threads: false,
            seed_override: None,
        }
    }
}

impl LRateParams {
    pub fn eff(&self) -> f32 {
        self.base * self.sched * self.modulation
    }
}

pub fn validate_network_params(network_params: &NetworkParams) -> Result<(), SimpleError> {
    for layer_params in &network_params.layers {
        validate_layer_params(layer_params)?;
    }

    validate_timing_params(&network_params.timing)?;

    let mut seen_from_to_pairs = HashSet::default();

    for prj_params in &network_params.projections {
        if !seen_from_to_pairs.insert((prj_params.from.as_str(), prj_params.to.as_str())) {
            return Err(SimpleError::new(format!(
                "duplicate projection from layer {} to layer {}",
                prj_params.from, prj_params.to
            )));
        }

        validate_projection_params(prj_params, &network_params.timing)?;
    }

    validate_technical_params(&network_params.technical_params)?;

    Ok(())
}

fn validate_layer_params(layer_params: &LayerParams) -> Result<(), SimpleError> {
    validate_act_params(&layer_params.act)?;
    validate_gi_params(&layer_params.inhib.layer)?;
    validate_gi_params(&layer_params.inhib.pool)?;
    validate_learn_neuron_params(&layer_params.learn)?;

    if layer_params.ct.decay_tau < 0.0 {
        return Err(SimpleError::new("ct.decay_tau must not be negative"));
    }

    if layer_params.pulvinar.full_drive_act <= 0.0 {
        return Err(SimpleError::new(
            "pulvinar.full_drive_act must be strictly positive",
        ));
    }

    Ok(())
}

fn validate_act_params(act: &ActParams) -> Result<(), SimpleError> {
    let dt = &act.dt;

    for (name, tau) in [
        ("dt.integ", dt.integ),
        ("dt.vm_tau", dt.vm_tau),
        ("dt.vm_dend_tau", dt.vm_dend_tau),
        ("dt.ge_tau", dt.ge_tau),
        ("dt.gi_tau", dt.gi_tau),
        ("dt.int_tau", dt.int_tau),
        ("dt.long_avg_tau", dt.long_avg_tau),
        ("spike.r_tau", act.spike.r_tau),
        ("spike.isi_tau", act.spike.isi_tau),
        ("spike.max_hz", act.spike.max_hz),
        ("nmda.tau", act.nmda.tau),
        ("sahp.ca_tau", act.sahp.ca_tau),
        ("skca.act_tau", act.skca.act_tau),
        ("skca.de_tau", act.skca.de_tau),
        ("mahp.vslope", act.mahp.vslope),
        ("mahp.tau_max", act.mahp.tau_max),
        ("mahp.tadj", act.mahp.tadj),
        ("sahp.slope", act.sahp.slope),
        ("sahp.tau_max", act.sahp.tau_max),
    ] {
        if tau <= 0.0 {
            return Err(SimpleError::new(format!(
                "{} must be strictly positive",
                name
            )));
        }
    }

    if dt.vm_steps == 0 {
        return Err(SimpleError::new("dt.vm_steps must be strictly positive"));
    }

    let decay = &act.decay;
    for (name, rate) in [
        ("decay.act", decay.act),
        ("decay.glong", decay.glong),
        ("decay.ahp", decay.ahp),
        ("decay.learn_ca", decay.learn_ca),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(SimpleError::new(format!("{} must be in [0, 1]", name)));
        }
    }

    if act.spike.exp && act.spike.exp_slope <= 0.0 {
        return Err(SimpleError::new(
            "spike.exp_slope must be strictly positive",
        ));
    }

    if act.spike.tr < 0 {
        return Err(SimpleError::new("spike.tr must not be negative"));
    }

    if act.vm_range.min >= act.vm_range.max {
        return Err(SimpleError::new("vm_range.min must be less than vm_range.max"));
    }

    if act.gaba_b.rise_tau <= 0.0 || act.gaba_b.decay_tau <= act.gaba_b.rise_tau {
        return Err(SimpleError::new(
            "gaba_b.decay_tau must be greater than gaba_b.rise_tau, both strictly positive",
        ));
    }

    if act.kna.med.tau <= 0.0 || act.kna.slow.tau <= 0.0 {
        return Err(SimpleError::new("kna time constants must be strictly positive"));
    }

    if act.noise.on && (act.noise.ge_hz <= 0.0 || act.noise.gi_hz <= 0.0) {
        return Err(SimpleError::new("noise rates must be strictly positive"));
    }

    Ok(())
}

fn validate_gi_params(gi: &GiParams) -> Result<(), SimpleError> {
    if !gi.on {
        return Ok(());
    }

    for (name, tau) in [
        ("fs_tau", gi.fs_tau),
        ("ssf_tau", gi.ssf_tau),
        ("ssi_tau", gi.ssi_tau),
    ] {
        if tau <= 0.0 {
            return Err(SimpleError::new(format!(
                "inhibition {} must be strictly positive",
                name
            )));
        }
    }

    if gi.gi < 0.0 {
        return Err(SimpleError::new("inhibition gi must not be negative"));
    }

    Ok(())
}

fn validate_ca_dt_params(name: &str, dt: &CaDtParams) -> Result<(), SimpleError> {
    if dt.m_tau <= 0.0 || dt.p_tau <= 0.0 || dt.d_tau <= 0.0 {
        return Err(SimpleError::new(format!(
            "{} time constants must be strictly positive",
            name
        )));
    }

    Ok(())
}

fn validate_learn_neuron_params(learn: &LearnNeuronParams) -> Result<(), SimpleError> {
    validate_ca_dt_params("ca_spk", &learn.ca_spk.dt)?;
    validate_ca_dt_params("ca_lrn", &learn.ca_lrn.dt)?;

    if learn.ca_spk.syn_tau <= 0.0 {
        return Err(SimpleError::new("ca_spk.syn_tau must be strictly positive"));
    }

    if learn.ca_lrn.norm <= 0.0 || learn.ca_lrn.vgcc_tau <= 0.0 {
        return Err(SimpleError::new(
            "ca_lrn.norm and ca_lrn.vgcc_tau must be strictly positive",
        ));
    }

    if learn.lrn_nmda.tau <= 0.0 {
        return Err(SimpleError::new("lrn_nmda.tau must be strictly positive"));
    }

    if learn.trg_avg.range.min > learn.trg_avg.range.max {
        return Err(SimpleError::new(
            "trg_avg.range.min must not be greater than trg_avg.range.max",
        ));
    }

    Ok(())
}

fn validate_projection_params(
    prj_params: &ProjectionParams,
    timing: &TimingParams,
) -> Result<(), SimpleError> {
    if prj_params.com.delay == 0 {
        return Err(SimpleError::new(format!(
            "projection {}: delay must be strictly positive",
            prj_params.name()
        )));
    }

    // context is sent `delay` cycles before the end of the trial
    if prj_params.kind == ProjectionKind::CtContext
        && prj_params.com.delay >= timing.theta_cycles
    {
        return Err(SimpleError::new(format!(
            "projection {}: context delay must be less than theta_cycles",
            prj_params.name()
        )));
    }

    if !(0.0..=1.0).contains(&prj_params.com.p_fail) {
        return Err(SimpleError::new(format!(
            "projection {}: p_fail must be in [0, 1]",
            prj_params.name()
        )));
    }

    if prj_params.scale.abs < 0.0 || prj_params.scale.rel < 0.0 {
        return Err(SimpleError::new(format!(
            "projection {}: scale must not be negative",
            prj_params.name()
        )));
    }

    let swt = &prj_params.swt;
    if swt.limit.min < 0.0 || swt.limit.min > swt.limit.max {
        return Err(SimpleError::new(format!(
            "projection {}: swt.limit must satisfy 0 <= min <= max",
            prj_params.name()
        )));
    }

    if swt.init.mean < 0.0 || swt.init.var < 0.0 {
        return Err(SimpleError::new(format!(
            "projection {}: swt.init mean and var must not be negative",
            prj_params.name()
        )));
    }

    if swt.adapt.sig_gain <= 0.0 {
        return Err(SimpleError::new(format!(
            "projection {}: swt.adapt.sig_gain must be strictly positive",
            prj_params.name()
        )));
    }

    let learn = &prj_params.learn;
    validate_ca_dt_params("kinase_ca", &learn.kinase_ca.dt)?;

    if learn.trace.tau <= 0.0 {
        return Err(SimpleError::new(format!(
            "projection {}: trace.tau must be strictly positive",
            prj_params.name()
        )));
    }

    Ok(())
}

fn validate_timing_params(timing: &TimingParams) -> Result<(), SimpleError> {
    if timing.theta_cycles == 0 {
        return Err(SimpleError::new("theta_cycles must be strictly positive"));
    }

    if timing.plus_cycles >= timing.theta_cycles {
        return Err(SimpleError::new(
            "plus_cycles must be less than theta_cycles",
        ));
    }

    if timing.slow_interval == 0 {
        return Err(SimpleError::new("slow_interval must be strictly positive"));
    }

    Ok(())
}

fn validate_technical_params(technical_params: &TechnicalParams) -> Result<(), SimpleError> {
    if technical_params.num_threads == Some(0) {
        return Err(SimpleError::new("num_threads must be strictly positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NetworkParams {
        NetworkParams {
            name: "test".to_string(),
            layers: vec![
                LayerParams::defaults_for_layer("In", &[2, 3], LayerKind::Input),
                LayerParams::defaults_for_layer("Hid", &[2, 2, 3, 3], LayerKind::Super),
            ],
            projections: vec![ProjectionParams::defaults_for_layers(
                "In",
                "Hid",
                ProjectionKind::Forward,
            )],
            ..NetworkParams::default()
        }
    }

    #[test]
    fn defaults_are_valid() {
        validate_network_params(&params()).unwrap();
    }

    #[test]
    fn layer_shapes() {
        let params = params();
        assert_eq!(params.layers[0].num_neurons(), 6);
        assert_eq!(params.layers[0].num_sub_pools(), 0);
        assert_eq!(params.layers[1].num_neurons(), 36);
        assert_eq!(params.layers[1].num_sub_pools(), 4);
        assert_eq!(params.layers[1].neurons_per_sub_pool(), 9);
    }

    #[test]
    fn zero_delay_rejected() {
        let mut params = params();
        params.projections[0].com.delay = 0;
        let err = validate_network_params(&params).unwrap_err();
        assert!(err.as_str().contains("delay must be strictly positive"));
    }

    #[test]
    fn context_delay_must_fit_in_trial() {
        let mut params = params();
        params.layers.push(LayerParams::defaults_for_layer(
            "HidCt",
            &[2, 2, 3, 3],
            LayerKind::Ct,
        ));
        let mut ct =
            ProjectionParams::defaults_for_layers("Hid", "HidCt", ProjectionKind::CtContext);
        ct.com.delay = params.timing.theta_cycles - 1;
        params.projections.push(ct);
        validate_network_params(&params).unwrap();

        params.projections[1].com.delay = params.timing.theta_cycles;
        let err = validate_network_params(&params).unwrap_err();
        assert!(err.as_str().contains("context delay must be less than theta_cycles"));

        // ordinary projections are bounded by the index width instead
        params.projections[1].com.delay = 2;
        params.projections[0].com.delay = params.timing.theta_cycles * 10;
        validate_network_params(&params).unwrap();
    }

    #[test]
    fn channel_rate_constants_must_be_positive() {
        let mut mahp = params();
        mahp.layers[1].act.mahp.vslope = 0.0;
        let err = validate_network_params(&mahp).unwrap_err();
        assert!(err.as_str().contains("mahp.vslope must be strictly positive"));

        let mut sahp = params();
        sahp.layers[1].act.sahp.tau_max = -1.0;
        let err = validate_network_params(&sahp).unwrap_err();
        assert!(err.as_str().contains("sahp.tau_max must be strictly positive"));
    }

    #[test]
    fn decay_rates_are_fractions() {
        let mut params = params();
        params.layers[0].act.decay.learn_ca = 1.5;
        let err = validate_network_params(&params).unwrap_err();
        assert!(err.as_str().contains("decay.learn_ca must be in [0, 1]"));
    }

    #[test]
    fn duplicate_projection_rejected() {
        let mut params = params();
        params.projections.push(params.projections[0].clone());
        assert!(validate_network_params(&params).is_err());
    }

    #[test]
    fn invalid_timing_rejected() {
        let mut params = params();
        params.timing.plus_cycles = params.timing.theta_cycles;
        assert!(validate_network_params(&params).is_err());
    }

    #[test]
    fn inhib_projection_defaults_do_not_learn() {
        let prj = ProjectionParams::defaults_for_layers("A", "B", ProjectionKind::Inhib);
        assert!(!prj.learn.learn);
        assert!(!prj.swt.adapt.on);
        assert_eq!(prj.name(), "AToB");
    }

    #[test]
    fn yaml_with_omitted_blocks() {
        let yaml = r#"
layers:
- name: In
  shape: [5]
  kind: Input
- name: Out
  shape: [5]
  kind: Super
projections:
- from: In
  to: Out
  kind: Forward
  com:
    delay: 1
"#;
        let params: NetworkParams = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.projections[0].com.delay, 1);
        assert_eq!(params.projections[0].pattern, ConnectionPattern::Full);
        assert_eq!(params.timing.theta_cycles, 200);
        assert_eq!(params.layers[1].act.spike.tr, 3);
        validate_network_params(&params).unwrap();
    }
}
