//! Per-element algorithms shared by both backends. Each phase runs over one domain
//! (neurons, layers or receiving groups); a backend only decides how the elements of a
//! domain are distributed over threads.

use std::sync::atomic::AtomicI64;

use serde::{Deserialize, Serialize};

use crate::context::{rand_fun, Context};
use crate::learning::{self, DwtParams};
use crate::neuron::Neuron;
use crate::params::{LayerKind, ProjectionKind};
use crate::pool::{self, Pool};
use crate::synapse::Synapse;
use crate::topology::{RecvGroup, Topology};
use crate::transmission::{self, GVal};
use crate::types::ReadBuf;
use crate::util::counter_rand;

/// All mutable simulation buffers. Sizes are fixed by the topology.
pub struct NetworkState {
    pub neurons: Vec<Neuron>,
    pub synapses: Vec<Synapse>,
    pub pools: Vec<Pool>,
    pub gvals: Vec<GVal>,
    pub rings: Vec<AtomicI64>,
    /// Per-neuron plus-phase drive for relay layers, sampled from their drivers.
    pub drive: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Gather,
    PoolReduce,
    PoolInhibit,
    NeuronUpdate,
    SynCa,
    NewStatePools,
    NewStateNeurons,
    MinusPhaseEnd,
    PlusPhaseStart,
    PlusPhaseEnd,
    Dwt,
    WtFromDwt,
    DTrgAvgReduce,
    TrgAvgFromD,
    ActAvgReduce,
    AvgDifFromTrgAvg,
    SlowAdapt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Neurons,
    Layers,
    RecvGroups,
}

impl Phase {
    pub fn domain(self) -> Domain {
        match self {
            Phase::Gather
            | Phase::NeuronUpdate
            | Phase::NewStateNeurons
            | Phase::MinusPhaseEnd
            | Phase::PlusPhaseStart
            | Phase::PlusPhaseEnd
            | Phase::TrgAvgFromD
            | Phase::AvgDifFromTrgAvg => Domain::Neurons,
            Phase::PoolReduce
            | Phase::PoolInhibit
            | Phase::NewStatePools
            | Phase::DTrgAvgReduce
            | Phase::ActAvgReduce => Domain::Layers,
            Phase::SynCa | Phase::Dwt | Phase::WtFromDwt | Phase::SlowAdapt => Domain::RecvGroups,
        }
    }
}

pub const CYCLE_PHASES: [Phase; 5] = [
    Phase::Gather,
    Phase::PoolReduce,
    Phase::PoolInhibit,
    Phase::NeuronUpdate,
    Phase::SynCa,
];

pub const NEW_STATE_PHASES: [Phase; 2] = [Phase::NewStatePools, Phase::NewStateNeurons];

pub const WT_FROM_DWT_PHASES: [Phase; 3] =
    [Phase::WtFromDwt, Phase::DTrgAvgReduce, Phase::TrgAvgFromD];

pub const SLOW_ADAPT_PHASES: [Phase; 3] = [
    Phase::ActAvgReduce,
    Phase::AvgDifFromTrgAvg,
    Phase::SlowAdapt,
];

/// Read-only views a neuron-domain phase may consult.
pub struct NeuronEnv<'a, P: ?Sized, D: ?Sized, S: ?Sized> {
    pub topo: &'a Topology,
    pub ctx: &'a Context,
    pub pools: &'a P,
    pub drive: &'a D,
    pub synapses: &'a S,
    pub rings: &'a [AtomicI64],
}

/// Runs a neuron-domain phase on one neuron. Returns whether the neuron spiked, which is
/// only meaningful for `Phase::NeuronUpdate`.
pub fn neuron_phase<P, D, S>(
    phase: Phase,
    env: &NeuronEnv<P, D, S>,
    nrn_idx: usize,
    nrn: &mut Neuron,
    gvals: &mut [GVal],
) -> bool
where
    P: ReadBuf<Pool> + ?Sized,
    D: ReadBuf<f32> + ?Sized,
    S: ReadBuf<Synapse> + ?Sized,
{
    match phase {
        Phase::Gather => {
            gather(env.topo, env.ctx, nrn_idx, nrn, gvals, env.rings);
            false
        }
        Phase::NeuronUpdate => update_neuron(env, nrn_idx, nrn),
        Phase::NewStateNeurons => {
            new_state_neuron(env.topo, nrn);
            false
        }
        Phase::MinusPhaseEnd => {
            minus_phase_end(nrn);
            false
        }
        Phase::PlusPhaseStart => {
            plus_phase_start(env.topo, nrn);
            false
        }
        Phase::PlusPhaseEnd => {
            plus_phase_end(env.topo, env.ctx, nrn, env.pools);
            false
        }
        Phase::TrgAvgFromD => {
            let params = &env.topo.layers[nrn.layer_idx as usize].params;
            if params.learn.trg_avg.on && !params.kind.is_input_or_target() {
                let pool = env.pools.at(nrn.sub_pool as usize);
                learning::trg_avg_from_d(&params.learn.trg_avg, nrn, pool);
            }
            false
        }
        Phase::AvgDifFromTrgAvg => {
            learning::avg_dif_from_trg_avg(nrn, env.pools.at(nrn.sub_pool as usize));
            false
        }
        _ => unreachable!("{:?} is not a neuron phase", phase),
    }
}

/// Runs a layer-domain phase. `pools` and `drive` cover exactly the layer's pools and
/// neurons.
pub fn layer_phase<N>(
    phase: Phase,
    topo: &Topology,
    layer_idx: usize,
    pools: &mut [Pool],
    drive: &mut [f32],
    neurons: &N,
) where
    N: ReadBuf<Neuron> + ?Sized,
{
    let layer = &topo.layers[layer_idx];
    let params = &layer.params;

    match phase {
        Phase::PoolReduce => {
            for (k, pool) in pools.iter_mut().enumerate() {
                let gi = if k == 0 {
                    &params.inhib.layer
                } else {
                    &params.inhib.pool
                };
                let range = pool.nrn_start as usize..pool.nrn_end as usize;
                pool.reduce(range.map(|idx| neurons.at(idx)), gi);
            }

            if let Some(driver) = layer.drive_layer {
                let driver_range = topo.layers[driver].nrn_range.clone();
                let mut drive_max = 0.0f32;
                for (slot, driver_idx) in drive.iter_mut().zip(driver_range) {
                    *slot = neurons.at(driver_idx).ca_spk_p;
                    drive_max = drive_max.max(*slot);
                }
                pools[0].non_drive_pct =
                    1.0 - (drive_max / params.pulvinar.full_drive_act).min(1.0);
            }
        }
        Phase::PoolInhibit => pool::inhibit_layer(pools, &params.inhib),
        Phase::NewStatePools => {
            for pool in pools.iter_mut() {
                pool.inhib.decay(params.act.decay.act);
            }
        }
        Phase::DTrgAvgReduce => {
            for pool in pools.iter_mut() {
                let range = pool.nrn_start as usize..pool.nrn_end as usize;
                learning::reduce_dtrg_avg(pool, range.map(|idx| neurons.at(idx)));
            }
        }
        Phase::ActAvgReduce => {
            for pool in pools.iter_mut() {
                let range = pool.nrn_start as usize..pool.nrn_end as usize;
                learning::reduce_act_avg(pool, range.map(|idx| neurons.at(idx)));
            }
        }
        _ => unreachable!("{:?} is not a layer phase", phase),
    }
}

/// Runs a group-domain phase. `syns` covers exactly the group's synapses.
pub fn group_phase<N>(
    phase: Phase,
    topo: &Topology,
    ctx: &Context,
    group: &RecvGroup,
    syns: &mut [Synapse],
    neurons: &N,
) where
    N: ReadBuf<Neuron> + ?Sized,
{
    let prjn = &topo.projections[group.prjn_idx as usize];
    if !prjn.learns() && phase != Phase::WtFromDwt {
        return;
    }

    let recv = neurons.at(group.recv_idx as usize);
    let recv_layer = &topo.layers[prjn.recv_layer];
    let params = &prjn.params;

    match phase {
        Phase::SynCa => {
            let recv_params = &recv_layer.params.learn.ca_lrn;
            let send_params = &topo.layers[prjn.send_layer].params.learn.ca_lrn;
            let recv_active = recv.ca_spk_p >= recv_params.updt_thr
                || recv.ca_spk_d >= recv_params.updt_thr;

            for syn in syns.iter_mut() {
                let send = neurons.at(syn.send_idx as usize);
                if !recv.is_spiking() && !send.is_spiking() {
                    continue;
                }
                let send_active = send.ca_spk_p >= send_params.updt_thr
                    || send.ca_spk_d >= send_params.updt_thr;
                if !(recv_active && send_active) {
                    continue;
                }
                let ca = params.learn.kinase_ca.syn_ca(send.ca_syn, recv.ca_syn);
                params.learn.kinase_ca.advance_to(syn, ctx.cycles_total, ca);
            }
        }
        Phase::Dwt => {
            let dwt_params = DwtParams {
                learn: &params.learn,
                recv_is_target: recv_layer.kind().is_target(),
                is_ctxt: prjn.kind() == ProjectionKind::CtContext,
            };
            for syn in syns.iter_mut() {
                let send = neurons.at(syn.send_idx as usize);
                learning::dwt_syn(&dwt_params, recv, send, syn, ctx.cycles_total - 1);
            }
        }
        Phase::WtFromDwt => learning::wt_from_dwt(
            &params.learn,
            &params.swt,
            &params.com,
            syns,
            group.syn_start as usize,
            ctx,
        ),
        Phase::SlowAdapt => {
            // clamped receivers keep their structure
            if recv_layer.kind().is_target() {
                return;
            }
            if params.swt.adapt.on {
                learning::swt_from_wt(&params.swt, syns);
            }
            let trg_avg = &recv_layer.params.learn.trg_avg;
            if trg_avg.on && prjn.kind() != ProjectionKind::Inhib {
                learning::syn_scale(trg_avg, &params.swt, recv.avg_dif, syns);
            }
        }
        _ => unreachable!("{:?} is not a receiving group phase", phase),
    }
}


/// Drains the arrival slots of one neuron into its per-projection conductances.
fn gather(
    topo: &Topology,
    ctx: &Context,
    nrn_idx: usize,
    nrn: &mut Neuron,
    gvals: &mut [GVal],
    rings: &[AtomicI64],
) {
    let layer = &topo.layers[nrn.layer_idx as usize];
    let dt = &layer.params.act.dt;
    let gval_start = topo.neuron_gval_start[nrn_idx];

    nrn.ge_raw = 0.0;
    nrn.gi_raw = 0.0;
    nrn.ge_syn = nrn.ge_base;
    nrn.gi_syn = nrn.gi_base;

    for (k, (&prjn_idx, gval)) in layer.recv_prjns.iter().zip(gvals.iter_mut()).enumerate() {
        let raw = transmission::take_current(layer, gval_start + k, ctx, rings);
        gval.g_raw = raw;

        match topo.projections[prjn_idx].kind() {
            ProjectionKind::CtContext => nrn.ctxt_ge_raw += raw,
            ProjectionKind::Inhib => {
                gval.g_syn = dt.gi_syn_from_raw(gval.g_syn, raw);
                nrn.gi_raw += raw;
                nrn.gi_syn += gval.g_syn;
            }
            ProjectionKind::Forward | ProjectionKind::Back | ProjectionKind::Lateral => {
                gval.g_syn = dt.ge_syn_from_raw(gval.g_syn, raw);
                nrn.ge_raw += raw;
                nrn.ge_syn += gval.g_syn;
            }
        }
    }
}

/// One cycle of membrane dynamics followed by spike emission.
fn update_neuron<P, D, S>(env: &NeuronEnv<P, D, S>, nrn_idx: usize, nrn: &mut Neuron) -> bool
where
    P: ReadBuf<Pool> + ?Sized,
    D: ReadBuf<f32> + ?Sized,
    S: ReadBuf<Synapse> + ?Sized,
{
    let (topo, ctx) = (env.topo, env.ctx);
    let layer = &topo.layers[nrn.layer_idx as usize];
    let params = &layer.params;
    let act = &params.act;
    let learn = &params.learn;
    let kind = layer.kind();
    let layer_pool = env.pools.at(layer.layer_pool());

    let mut ge_raw = nrn.ge_raw;
    let mut ge_syn = nrn.ge_syn;
    let mut ctxt_ext = 0.0;

    match kind {
        LayerKind::Ct => {
            let ge_ctxt = params.ct.ge_gain * nrn.ctxt_ge;
            ge_raw += ge_ctxt;
            if params.ct.decay_tau > 0.0 {
                nrn.ctxt_ge -= nrn.ctxt_ge / params.ct.decay_tau;
            }
            ctxt_ext = act.dt.ge_syn_from_raw_steady(ge_ctxt);
            ge_syn += ctxt_ext;
        }
        LayerKind::Pulvinar if ctx.plus_phase => {
            let non_drive = layer_pool.non_drive_pct;
            let drive = params.pulvinar.drive_scale * *env.drive.at(nrn_idx);
            ge_raw = non_drive * ge_raw + drive;
            ge_syn = non_drive * ge_syn + act.dt.ge_syn_from_raw_steady(drive);
        }
        _ => {}
    }
    nrn.ge_raw = ge_raw;
    nrn.ge_syn = ge_syn;

    act.nmda_from_raw(nrn, ge_raw);
    learn.lrn_nmda_from_raw(nrn, ge_raw);
    act.gvgcc_from_vm(nrn);

    let noise_rand = |fun| {
        if act.noise.on {
            counter_rand(&ctx.rand_key(nrn_idx, fun))
        } else {
            1.0
        }
    };

    let ge_gain = learn.neuromod.g_gain(ctx.da);
    let ge_rand = noise_rand(rand_fun::GE_NOISE);
    act.ge_from_syn(nrn, ge_syn * ge_gain, nrn.gnmda + nrn.gvgcc, ge_rand);
    act.gk_from_vm(nrn);

    let gi_rand = noise_rand(rand_fun::GI_NOISE);
    nrn.gi_syn = act.gi_from_syn(nrn, nrn.gi_syn, gi_rand);

    if kind == LayerKind::Ct {
        nrn.ge_ext = ctxt_ext;
    }

    let pool = env.pools.at(nrn.sub_pool as usize);
    nrn.gi = pool.inhib.gi + nrn.gi_syn + nrn.gi_noise + learn.neuromod.gi_from_ach(ctx.ach);
    nrn.ss_gi = pool.inhib.ss_gi;
    nrn.ss_gi_dend = if kind.is_input_or_target() {
        0.0
    } else {
        act.dend.ss_gi * pool.inhib.ss_gi
    };

    act.gaba_b_from_gi(nrn);
    act.vm_from_g(nrn);
    act.spike_from_vm(nrn);
    if nrn.forced {
        nrn.spike = 1.0;
    }

    learn.ca_from_spike(nrn);

    if ctx.cycle >= act.dt.max_cyc_start {
        nrn.spk_max_ca += learn.ca_spk.dt.p_dt() * (nrn.ca_spk_m - nrn.spk_max_ca);
        nrn.spk_max = nrn.spk_max.max(nrn.spk_max_ca);
    }

    if ctx.plus_phase {
        nrn.act_int += 3.0 * act.dt.int_dt() * (nrn.act - nrn.act_int);
    } else {
        let int_dt = act.dt.int_dt();
        nrn.act_int += int_dt * (nrn.act - nrn.act_int);
        nrn.ge_m += int_dt * (nrn.ge - nrn.ge_m);
        nrn.gi_m += int_dt * (nrn.gi_syn - nrn.gi_m);
    }

    if kind == LayerKind::Super && ctx.plus_phase {
        let thr = params
            .burst
            .thr_from_avg_max(layer_pool.ca_spk_p.avg, layer_pool.ca_spk_p.max);
        nrn.burst = if nrn.ca_spk_p > thr { nrn.ca_spk_p } else { 0.0 };
    }

    send_spikes(env, nrn_idx, nrn);
    nrn.is_spiking()
}

fn send_spikes<P, D, S>(env: &NeuronEnv<P, D, S>, nrn_idx: usize, nrn: &Neuron)
where
    P: ReadBuf<Pool> + ?Sized,
    D: ReadBuf<f32> + ?Sized,
    S: ReadBuf<Synapse> + ?Sized,
{
    let (topo, ctx) = (env.topo, env.ctx);
    let layer = &topo.layers[nrn.layer_idx as usize];

    for &prjn_idx in &layer.send_prjns {
        let prjn = &topo.projections[prjn_idx];
        if prjn.kind() == ProjectionKind::CtContext {
            // context arrives exactly on the last cycle of the trial
            let send_cycle = ctx.theta_cycles as i64 - 1 - prjn.params.com.delay as i64;
            if ctx.cycle as i64 == send_cycle && nrn.burst > 0.0 {
                transmission::send(topo, prjn, nrn_idx, nrn.burst, ctx, env.synapses, env.rings);
            }
        } else if nrn.is_spiking() {
            transmission::send(topo, prjn, nrn_idx, nrn.spike, ctx, env.synapses, env.rings);
        }
    }
}

fn new_state_neuron(topo: &Topology, nrn: &mut Neuron) {
    let params = &topo.layers[nrn.layer_idx as usize].params;

    nrn.spk_prv = nrn.ca_spk_d;
    nrn.burst_prv = nrn.burst;
    nrn.spk_max = 0.0;
    nrn.spk_max_ca = 0.0;
    let decay = &params.act.decay;
    params.act.decay_state(nrn, decay.act, decay.glong);
    if decay.learn_ca > 0.0 {
        params.learn.decay_ca_lrn_spk(nrn, decay.learn_ca);
    }

    if params.kind == LayerKind::Target {
        nrn.has_ext = false;
    }
}

fn minus_phase_end(nrn: &mut Neuron) {
    nrn.act_m = nrn.act_int;
    nrn.ca_spk_pm = nrn.ca_spk_p;
}

fn plus_phase_start(topo: &Topology, nrn: &mut Neuron) {
    if topo.layers[nrn.layer_idx as usize].kind() == LayerKind::Target {
        nrn.ext = nrn.target;
        nrn.has_ext = true;
    }
}

fn plus_phase_end<P>(topo: &Topology, ctx: &Context, nrn: &mut Neuron, pools: &P)
where
    P: ReadBuf<Pool> + ?Sized,
{
    let layer = &topo.layers[nrn.layer_idx as usize];
    let params = &layer.params;
    let learn = &params.learn;
    let layer_pool = pools.at(layer.layer_pool());

    nrn.act_p = nrn.act_int;

    let rl = &learn.rl_rate;
    nrn.rl_rate = rl.sig_deriv(nrn.ca_spk_d, layer_pool.ca_spk_d.max)
        * rl.diff(nrn.ca_spk_p, nrn.ca_spk_d)
        * learn.neuromod.lr_mod(ctx.da, ctx.ach);

    nrn.act_avg += params.act.dt.long_avg_dt() * (nrn.act_m - nrn.act_avg);
    nrn.dtrg_avg += learn.trg_avg.err_lrate * (nrn.ca_spk_p - nrn.ca_spk_d);
    params.act.sahp_from_ca(nrn);

    nrn.ctxt_ge = nrn.ctxt_ge_raw;
    nrn.ctxt_ge_raw = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        ConnectionPattern, LayerParams, NetworkParams, ProjectionParams, TimingParams,
    };
    use crate::topology::{build_topology, BuiltNetwork};
    use float_cmp::assert_approx_eq;

    fn built(kind: ProjectionKind) -> BuiltNetwork {
        let mut prjn = ProjectionParams::defaults_for_layers("A", "B", kind);
        prjn.pattern = ConnectionPattern::OneToOne;
        prjn.com.delay = 1;
        let mut pulv = LayerParams::defaults_for_layer("P", &[2], LayerKind::Pulvinar);
        pulv.pulvinar.drive_layer = Some("A".to_string());

        let params = NetworkParams {
            name: "kernels".to_string(),
            layers: vec![
                LayerParams::defaults_for_layer("A", &[2], LayerKind::Input),
                LayerParams::defaults_for_layer("B", &[2], LayerKind::Super),
                LayerParams::defaults_for_layer("T", &[2], LayerKind::Target),
                pulv,
            ],
            projections: vec![prjn],
            ..NetworkParams::default()
        };
        build_topology(&params, 0).unwrap()
    }

    fn env<'a>(
        built: &'a BuiltNetwork,
        ctx: &'a Context,
        drive: &'a [f32],
        rings: &'a [AtomicI64],
    ) -> NeuronEnv<'a, [Pool], [f32], [Synapse]> {
        NeuronEnv {
            topo: &built.topology,
            ctx,
            pools: &built.pools,
            drive,
            synapses: &built.synapses,
            rings,
        }
    }

    #[test]
    fn phase_domains() {
        assert_eq!(Phase::Gather.domain(), Domain::Neurons);
        assert_eq!(Phase::PoolInhibit.domain(), Domain::Layers);
        assert_eq!(Phase::SynCa.domain(), Domain::RecvGroups);
        assert_eq!(Phase::AvgDifFromTrgAvg.domain(), Domain::Neurons);
        assert_eq!(Phase::ActAvgReduce.domain(), Domain::Layers);
    }

    #[test]
    fn gather_routes_by_projection_kind() {
        for kind in [ProjectionKind::Forward, ProjectionKind::Inhib, ProjectionKind::CtContext] {
            let built = built(kind);
            let topo = &built.topology;
            let rings = transmission::create_rings(topo.ring_size);
            let drive = vec![0.0; topo.num_neurons];
            let mut ctx = Context::new(0, &TimingParams::default());

            transmission::send(topo, &topo.projections[0], 0, 1.0, &ctx, &built.synapses, &rings);
            ctx.advance_cycle();

            let nrn_idx = topo.layers[1].nrn_range.start;
            let mut nrn = built.neurons[nrn_idx];
            let mut gvals = vec![GVal::default(); topo.gval_range(nrn_idx).len()];
            let env = env(&built, &ctx, &drive, &rings);
            neuron_phase(Phase::Gather, &env, nrn_idx, &mut nrn, &mut gvals);

            let raw = topo.projections[0].g_scale * built.synapses[0].wt;
            assert_approx_eq!(f32, gvals[0].g_raw, raw, epsilon = 1.0e-6);
            match kind {
                ProjectionKind::Inhib => {
                    assert_approx_eq!(f32, nrn.gi_raw, raw, epsilon = 1.0e-6);
                    assert!(nrn.gi_syn > nrn.gi_base);
                    assert_eq!(nrn.ge_raw, 0.0);
                }
                ProjectionKind::CtContext => {
                    assert_approx_eq!(f32, nrn.ctxt_ge_raw, raw, epsilon = 1.0e-6);
                    assert_eq!(nrn.ge_raw, 0.0);
                }
                _ => {
                    assert_approx_eq!(f32, nrn.ge_raw, raw, epsilon = 1.0e-6);
                    assert!(nrn.ge_syn > nrn.ge_base);
                }
            }

            // slot was drained
            let mut again = built.neurons[nrn_idx];
            neuron_phase(Phase::Gather, &env, nrn_idx, &mut again, &mut gvals);
            assert_eq!(gvals[0].g_raw, 0.0);
        }
    }

    #[test]
    fn forced_neuron_spikes_and_sends() {
        let built = built(ProjectionKind::Forward);
        let topo = &built.topology;
        let rings = transmission::create_rings(topo.ring_size);
        let drive = vec![0.0; topo.num_neurons];
        let ctx = Context::new(0, &TimingParams::default());
        let env = env(&built, &ctx, &drive, &rings);

        let mut nrn = built.neurons[1];
        nrn.forced = true;
        assert!(neuron_phase(Phase::NeuronUpdate, &env, 1, &mut nrn, &mut []));
        assert!(nrn.ca_spk_m > 0.0);

        let mut next = ctx;
        next.advance_cycle();
        let recv_layer = &topo.layers[1];
        let val = transmission::take_current(recv_layer, recv_layer.gval_start + 1, &next, &rings);
        assert_approx_eq!(
            f32,
            val,
            topo.projections[0].g_scale * built.synapses[1].wt,
            epsilon = 1.0e-6
        );
    }

    #[test]
    fn pulvinar_drive_sampled_from_driver() {
        let built = built(ProjectionKind::Forward);
        let topo = &built.topology;
        let mut neurons = built.neurons.clone();
        neurons[0].ca_spk_p = 0.3;
        neurons[1].ca_spk_p = 0.9;

        let pulv = &topo.layers[3];
        let mut pools = built.pools[pulv.pool_range.clone()].to_vec();
        let mut drive = vec![0.0; pulv.num_neurons()];
        layer_phase(Phase::PoolReduce, topo, 3, &mut pools, &mut drive, &neurons);

        assert_approx_eq!(f32, drive[0], 0.3);
        assert_approx_eq!(f32, drive[1], 0.9);
        assert_eq!(pools[0].non_drive_pct, 0.0);

        neurons[1].ca_spk_p = 0.3;
        layer_phase(Phase::PoolReduce, topo, 3, &mut pools, &mut drive, &neurons);
        assert_approx_eq!(f32, pools[0].non_drive_pct, 0.5);
    }

    #[test]
    fn target_clamped_only_in_plus_phase() {
        let built = built(ProjectionKind::Forward);
        let topo = &built.topology;
        let rings = transmission::create_rings(topo.ring_size);
        let drive = vec![0.0; topo.num_neurons];
        let ctx = Context::new(0, &TimingParams::default());
        let env = env(&built, &ctx, &drive, &rings);

        let nrn_idx = topo.layers[2].nrn_range.start;
        let mut nrn = built.neurons[nrn_idx];
        nrn.target = 0.7;
        nrn.has_ext = true;

        neuron_phase(Phase::NewStateNeurons, &env, nrn_idx, &mut nrn, &mut []);
        assert!(!nrn.has_ext);

        neuron_phase(Phase::PlusPhaseStart, &env, nrn_idx, &mut nrn, &mut []);
        assert!(nrn.has_ext);
        assert_approx_eq!(f32, nrn.ext, 0.7);
    }

    #[test]
    fn learning_calcium_decays_only_when_enabled() {
        let mut built = built(ProjectionKind::Forward);
        let rings = transmission::create_rings(built.topology.ring_size);
        let drive = vec![0.0; built.topology.num_neurons];
        let ctx = Context::new(0, &TimingParams::default());

        let nrn_idx = built.topology.layers[1].nrn_range.start;
        let mut nrn = built.neurons[nrn_idx];
        nrn.ca_spk_p = 0.8;
        nrn.nrn_ca_d = 0.4;

        let mut kept = nrn;
        neuron_phase(
            Phase::NewStateNeurons,
            &env(&built, &ctx, &drive, &rings),
            nrn_idx,
            &mut kept,
            &mut [],
        );
        assert_eq!(kept.ca_spk_p, 0.8);
        assert_eq!(kept.nrn_ca_d, 0.4);

        built.topology.layers[1].params.act.decay.learn_ca = 0.5;
        neuron_phase(
            Phase::NewStateNeurons,
            &env(&built, &ctx, &drive, &rings),
            nrn_idx,
            &mut nrn,
            &mut [],
        );
        assert_approx_eq!(f32, nrn.ca_spk_p, 0.4);
        assert_approx_eq!(f32, nrn.nrn_ca_d, 0.2);
    }

    #[test]
    fn phase_end_bookkeeping() {
        let built = built(ProjectionKind::Forward);
        let topo = &built.topology;
        let rings = transmission::create_rings(topo.ring_size);
        let drive = vec![0.0; topo.num_neurons];
        let ctx = Context::new(0, &TimingParams::default());
        let env = env(&built, &ctx, &drive, &rings);

        let mut nrn = built.neurons[2];
        nrn.act_int = 0.4;
        nrn.ca_spk_p = 0.5;
        nrn.ca_spk_d = 0.2;
        nrn.ctxt_ge_raw = 0.3;

        neuron_phase(Phase::MinusPhaseEnd, &env, 2, &mut nrn, &mut []);
        assert_approx_eq!(f32, nrn.act_m, 0.4);
        assert_approx_eq!(f32, nrn.ca_spk_pm, 0.5);

        nrn.act_int = 0.6;
        let dtrg_before = nrn.dtrg_avg;
        neuron_phase(Phase::PlusPhaseEnd, &env, 2, &mut nrn, &mut []);
        assert_approx_eq!(f32, nrn.act_p, 0.6);
        assert_approx_eq!(f32, nrn.ctxt_ge, 0.3);
        assert_eq!(nrn.ctxt_ge_raw, 0.0);
        assert!(nrn.dtrg_avg > dtrg_before);
        assert!(nrn.rl_rate > 0.0);
    }
}
