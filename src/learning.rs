//! Weight changes from synaptic calcium, their commit, and the slow structural and
//! homeostatic adaptation. Every function works on one receiving group: the synapses of a
//! single projection onto a single neuron.

use crate::context::{rand_fun, Context};
use crate::neuron::Neuron;
use crate::params::{LearnSynParams, SWtParams, SynComParams, TrgAvgParams};
use crate::pool::Pool;
use crate::synapse::Synapse;
use crate::util::counter_rand;

pub struct DwtParams<'a> {
    pub learn: &'a LearnSynParams,
    pub recv_is_target: bool,
    /// Context projections learn from the sender's previous-trial burst.
    pub is_ctxt: bool,
}

/// Accumulates `dwt` for one synapse. `cycle` is the last executed cycle; the calcium
/// cascade is brought up to it first.
pub fn dwt_syn(params: &DwtParams, recv: &Neuron, send: &Neuron, syn: &mut Synapse, cycle: i64) {
    let learn = params.learn;
    learn.kinase_ca.decay_to(syn, cycle);

    if syn.wt == 0.0 {
        return;
    }

    let ca_d = if params.is_ctxt {
        send.burst_prv
    } else {
        syn.ca_d
    };

    let tr_prev = syn.tr;
    syn.tr += (ca_d - syn.tr) / learn.trace.tau;

    let d_scale = learn.kinase_ca.d_scale;
    let mut err = if params.recv_is_target {
        syn.ca_p - d_scale * syn.ca_d
    } else {
        tr_prev * (recv.nrn_ca_p - d_scale * recv.nrn_ca_d)
    };

    if err > 0.0 {
        err *= 1.0 - syn.lwt;
    } else {
        err *= syn.lwt;
    }

    syn.dwt += recv.rl_rate * learn.lrate.eff() * err;
}

/// Commits accumulated changes. With `sub_mean > 0` the group's mean non-zero change is
/// subtracted first. Synapses may then fail stochastically until the next commit.
pub fn wt_from_dwt(
    learn: &LearnSynParams,
    swt: &SWtParams,
    com: &SynComParams,
    syns: &mut [Synapse],
    syn_start: usize,
    ctx: &Context,
) {
    let sub_mean = learn.trace.sub_mean;
    if sub_mean > 0.0 {
        let (sum, n) = syns
            .iter()
            .filter(|syn| syn.dwt != 0.0)
            .fold((0.0f32, 0usize), |(sum, n), syn| (sum + syn.dwt, n + 1));

        if n > 1 {
            let mean = sub_mean * sum / n as f32;
            for syn in syns.iter_mut().filter(|syn| syn.dwt != 0.0) {
                syn.dwt -= mean;
            }
        }
    }

    for (offset, syn) in syns.iter_mut().enumerate() {
        if syn.dwt == 0.0 {
            if syn.wt == 0.0 {
                syn.wt = swt.wt_val(syn.swt, syn.lwt);
            }
        } else {
            syn.dswt += syn.dwt;
            syn.lwt = (syn.lwt + syn.dwt).clamp(0.0, 1.0);
            syn.wt = swt.wt_val(syn.swt, syn.lwt);
            syn.dwt = 0.0;
        }

        if com.p_fail > 0.0 {
            let p_fail = if com.p_fail_swt {
                com.p_fail * (1.0 - syn.swt)
            } else {
                com.p_fail
            };
            let key = ctx.rand_key(syn_start + offset, rand_fun::SYN_FAIL);
            if counter_rand(&key) < p_fail {
                syn.wt = 0.0;
            }
        }
    }
}

/// Shifts structural weights so the group mean matches the initial mean, spreading the
/// correction over synapses not already at the limit being approached.
pub fn swt_rescale(swt: &SWtParams, syns: &mut [Synapse]) {
    let n = syns.len();
    if n == 0 {
        return;
    }

    let mut sum = 0.0;
    let mut n_min = 0;
    let mut n_max = 0;
    for syn in syns.iter() {
        sum += syn.swt;
        if syn.swt <= swt.limit.min {
            n_min += 1;
        } else if syn.swt >= swt.limit.max {
            n_max += 1;
        }
    }

    let mean_dif = swt.init.mean - sum / n as f32;

    if mean_dif < 0.0 && n_min < n {
        let mean_dif = mean_dif * n as f32 / (n - n_min) as f32;
        for syn in syns.iter_mut().filter(|syn| syn.swt > swt.limit.min) {
            syn.swt = swt.limit.clip(syn.swt + mean_dif);
        }
    } else if mean_dif > 0.0 && n_max < n {
        let mean_dif = mean_dif * n as f32 / (n - n_max) as f32;
        for syn in syns.iter_mut().filter(|syn| syn.swt < swt.limit.max) {
            syn.swt = swt.limit.clip(syn.swt + mean_dif);
        }
    }

    for syn in syns.iter_mut() {
        syn.wt = swt.wt_val(syn.swt, syn.lwt);
    }
}

/// Moves structural weights toward the soft-bounded, zero-mean accumulated change.
pub fn swt_from_wt(swt: &SWtParams, syns: &mut [Synapse]) {
    if syns.is_empty() {
        return;
    }

    let (min, max) = (swt.limit.min, swt.limit.max);
    let mut avg_dswt = 0.0;
    for syn in syns.iter_mut() {
        // a synapse failed this trial still carries its committed weight in swt and lwt
        if syn.wt == 0.0 {
            syn.wt = swt.wt_val(syn.swt, syn.lwt);
        }
        if syn.dswt >= 0.0 {
            syn.dswt *= max - syn.swt;
        } else {
            syn.dswt *= syn.swt - min;
        }
        avg_dswt += syn.dswt;
    }
    avg_dswt = swt.adapt.sub_mean * avg_dswt / syns.len() as f32;

    for syn in syns.iter_mut() {
        syn.swt = swt.limit.clip(syn.swt + swt.adapt.lrate * (syn.dswt - avg_dswt));
        syn.dswt = 0.0;
        syn.lwt = swt.lwt_from_wts(syn.wt, syn.swt);
        syn.wt = swt.wt_val(syn.swt, syn.lwt);
    }
}

/// Homeostatic scaling of linear weights against the receiver's activity deviation.
pub fn syn_scale(trg_avg: &TrgAvgParams, swt: &SWtParams, avg_dif: f32, syns: &mut [Synapse]) {
    let adif = -trg_avg.syn_scale_rate * avg_dif;
    for syn in syns.iter_mut() {
        if adif >= 0.0 {
            syn.lwt += (1.0 - syn.lwt) * adif * syn.swt;
        } else {
            syn.lwt += syn.lwt * adif * syn.swt;
        }
        syn.wt = swt.wt_val(syn.swt, syn.lwt);
    }
}

/// Mean long-run activity of a pool's members.
pub fn reduce_act_avg<'a, I>(pool: &mut Pool, neurons: I)
where
    I: IntoIterator<Item = &'a Neuron>,
{
    let (sum, n) = neurons
        .into_iter()
        .fold((0.0f32, 0usize), |(sum, n), nrn| (sum + nrn.act_avg, n + 1));
    pool.act_avg_mean = if n > 0 { sum / n as f32 } else { 0.0 };
}

pub fn avg_dif_from_trg_avg(nrn: &mut Neuron, pool: &Pool) {
    if pool.act_avg_mean < 0.0001 {
        return;
    }
    nrn.avg_pct = nrn.act_avg / pool.act_avg_mean;
    nrn.avg_dif = nrn.avg_pct - nrn.trg_avg;
}

pub fn reduce_dtrg_avg<'a, I>(pool: &mut Pool, neurons: I)
where
    I: IntoIterator<Item = &'a Neuron>,
{
    let (sum, n) = neurons
        .into_iter()
        .fold((0.0f32, 0usize), |(sum, n), nrn| (sum + nrn.dtrg_avg, n + 1));
    pool.dtrg_avg_mean = if n > 0 { sum / n as f32 } else { 0.0 };
}

pub fn trg_avg_from_d(trg_avg: &TrgAvgParams, nrn: &mut Neuron, pool: &Pool) {
    let ntrg = nrn.trg_avg + nrn.dtrg_avg - trg_avg.sub_mean * pool.dtrg_avg_mean;
    nrn.trg_avg = trg_avg.range.clip(ntrg);
    nrn.dtrg_avg = 0.0;
}
