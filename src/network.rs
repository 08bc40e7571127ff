use std::time::Instant;

use simple_error::{try_with, SimpleError, SimpleResult};

use crate::backend::{self, Backend, Step};
use crate::context::Context;
use crate::kernels::{
    NetworkState, Phase, CYCLE_PHASES, NEW_STATE_PHASES, SLOW_ADAPT_PHASES, WT_FROM_DWT_PHASES,
};
use crate::neuron::{Neuron, NeuronVar};
use crate::params::{self, BackendKind, LayerKind, NetworkParams};
use crate::pool::Pool;
use crate::state_snapshot::StateSnapshot;
use crate::synapse::Synapse;
use crate::topology::{self, LayerInfo, Topology};
use crate::transmission::{self, GVal};

pub fn create_network(params: NetworkParams) -> Result<Network, SimpleError> {
    try_with!(
        params::validate_network_params(&params),
        "invalid network parameters"
    );

    let seed = params.technical_params.seed_override.unwrap_or(0);
    let built = try_with!(
        topology::build_topology(&params, seed),
        "invalid network topology"
    );
    let topology = built.topology;
    let backend = backend::create_backend(&params.technical_params);

    log::info!(
        "created network {}: {} layers, {} neurons, {} synapses, {:?} backend with {} threads",
        topology.name,
        topology.layers.len(),
        topology.num_neurons,
        topology.num_synapses,
        backend.kind(),
        backend.num_threads()
    );

    let state = NetworkState {
        neurons: built.neurons,
        synapses: built.synapses,
        pools: built.pools,
        gvals: vec![GVal::default(); topology.num_gvals],
        rings: transmission::create_rings(topology.ring_size),
        drive: vec![0.0; topology.num_neurons],
    };

    let ctx = Context::new(seed, &params.timing);

    Ok(Network {
        params,
        topology,
        state,
        backend,
        ctx,
        last_spikes: Vec::new(),
    })
}

/// Summary of one `Network::run_trial` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub trial: u64,
    pub num_spikes: usize,
    pub slow_adapted: bool,
}

pub struct Network {
    params: NetworkParams,
    pub(crate) topology: Topology,
    pub(crate) state: NetworkState,
    backend: Box<dyn Backend>,
    ctx: Context,
    last_spikes: Vec<u32>,
}

impl Network {
    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn num_threads(&self) -> usize {
        self.backend.num_threads()
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.state.neurons
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.state.synapses
    }

    pub fn pools(&self) -> &[Pool] {
        &self.state.pools
    }

    pub fn gvals(&self) -> &[GVal] {
        &self.state.gvals
    }

    /// Neurons that spiked on the most recent cycle, ascending.
    pub fn last_spikes(&self) -> &[u32] {
        &self.last_spikes
    }

    pub(crate) fn layer(&self, name: &str) -> SimpleResult<&LayerInfo> {
        self.topology
            .layer_by_name(name)
            .ok_or_else(|| SimpleError::new(format!("unknown layer {}", name)))
    }

    fn projection_idx(&self, from: &str, to: &str) -> SimpleResult<usize> {
        self.topology.projection_idx(from, to).ok_or_else(|| {
            SimpleError::new(format!("no projection from layer {} to layer {}", from, to))
        })
    }

    fn check_ext(&self, layer: &str, values: &[f32]) -> SimpleResult<()> {
        let info = self.layer(layer)?;

        if !info.kind().takes_ext() {
            return Err(SimpleError::new(format!(
                "layer {} of kind {:?} does not take external input",
                layer,
                info.kind()
            )));
        }

        if values.len() != info.num_neurons() {
            return Err(SimpleError::new(format!(
                "layer {} has {} neurons, got {} values",
                layer,
                info.num_neurons(),
                values.len()
            )));
        }

        Ok(())
    }

    /// Sets external values for an Input, Target or Compare layer. Input layers are clamped
    /// in both phases, Target layers only in the plus phase, Compare layers never.
    pub fn apply_ext(&mut self, layer: &str, values: &[f32]) -> SimpleResult<()> {
        self.check_ext(layer, values)?;

        let info = self.layer(layer)?;
        let (kind, range) = (info.kind(), info.nrn_range.clone());
        let plus_phase = self.ctx.plus_phase;

        for (nrn, &val) in self.state.neurons[range].iter_mut().zip(values) {
            match kind {
                LayerKind::Input => {
                    nrn.ext = val;
                    nrn.has_ext = true;
                }
                LayerKind::Target => {
                    nrn.target = val;
                    if plus_phase {
                        nrn.ext = val;
                    }
                    nrn.has_ext = plus_phase;
                }
                LayerKind::Compare => nrn.target = val,
                LayerKind::Super | LayerKind::Ct | LayerKind::Pulvinar => {}
            }
        }

        Ok(())
    }

    /// Clears external values on every layer that takes them.
    pub fn init_ext(&mut self) {
        for layer in &self.topology.layers {
            if !layer.kind().takes_ext() {
                continue;
            }
            for nrn in &mut self.state.neurons[layer.nrn_range.clone()] {
                nrn.ext = 0.0;
                nrn.target = 0.0;
                nrn.has_ext = false;
            }
        }
    }

    /// Makes the given neurons (layer-local indices) fire on every cycle until cleared.
    pub fn set_forced_spikes(&mut self, layer: &str, local_idxs: &[usize]) -> SimpleResult<()> {
        let info = self.layer(layer)?;
        let range = info.nrn_range.clone();

        if let Some(&bad) = local_idxs.iter().find(|&&idx| idx >= range.len()) {
            return Err(SimpleError::new(format!(
                "invalid neuron index {} for layer {} with {} neurons",
                bad,
                layer,
                range.len()
            )));
        }

        for &idx in local_idxs {
            self.state.neurons[range.start + idx].forced = true;
        }

        Ok(())
    }

    pub fn clear_forced_spikes(&mut self) {
        for nrn in &mut self.state.neurons {
            nrn.forced = false;
        }
    }

    pub fn set_neuromod(&mut self, da: f32, ach: f32) {
        self.ctx.da = da;
        self.ctx.ach = ach;
    }

    /// Sets every weight of a projection to `wt`, carried by the structural weight with a
    /// neutral linear weight.
    pub fn set_projection_weights(&mut self, from: &str, to: &str, wt: f32) -> SimpleResult<()> {
        if !wt.is_finite() || wt < 0.0 {
            return Err(SimpleError::new(format!("invalid weight {}", wt)));
        }

        let prjn = &self.topology.projections[self.projection_idx(from, to)?];
        let swt = &prjn.params.swt;
        for syn in &mut self.state.synapses[prjn.syn_range.clone()] {
            syn.swt = wt;
            syn.lwt = 0.5;
            syn.wt = swt.wt_val(syn.swt, syn.lwt);
        }

        Ok(())
    }

    pub fn projection_g_scale(&self, from: &str, to: &str) -> SimpleResult<f32> {
        Ok(self.topology.projections[self.projection_idx(from, to)?].g_scale)
    }

    fn run_steps(&mut self, steps: &[Step]) -> Vec<Vec<u32>> {
        self.backend.run(&self.topology, &mut self.state, steps)
    }

    fn run_phases(&mut self, phases: &[Phase]) {
        let step = Step {
            ctx: self.ctx,
            phases,
        };
        self.run_steps(&[step]);
    }

    /// Partial decay of activation state at the start of a trial.
    pub fn new_state(&mut self) {
        self.ctx.new_trial();
        self.run_phases(&NEW_STATE_PHASES);
    }

    /// Full reset of activation state, calcium traces and pending transmissions.
    pub fn init_acts(&mut self) {
        for layer in &self.topology.layers {
            let params = &layer.params;
            for nrn in &mut self.state.neurons[layer.nrn_range.clone()] {
                params.act.init_acts(nrn);
                params.learn.init_neuron_ca(nrn);
            }
        }

        for pool in &mut self.state.pools {
            pool.init();
        }

        for syn in &mut self.state.synapses {
            syn.reset_ca();
        }

        self.state.gvals.fill(GVal::default());
        self.state.drive.fill(0.0);
        transmission::clear_rings(&self.state.rings);
        self.last_spikes.clear();
        self.ctx.reset();
    }

    /// Runs one cycle and returns the neurons that spiked.
    pub fn cycle(&mut self) -> &[u32] {
        self.run_cycles(1);
        &self.last_spikes
    }

    /// Runs `num_cycles` cycles in one backend dispatch. Returns the total spike count.
    pub fn run_cycles(&mut self, num_cycles: u32) -> usize {
        if num_cycles == 0 {
            return 0;
        }

        let mut ctx = self.ctx;
        let steps: Vec<Step> = (0..num_cycles)
            .map(|_| {
                let step = Step {
                    ctx,
                    phases: &CYCLE_PHASES,
                };
                ctx.advance_cycle();
                step
            })
            .collect();

        let mut spikes = self.run_steps(&steps);
        self.ctx = ctx;

        let num_spikes = spikes.iter().map(Vec::len).sum();
        self.last_spikes = spikes.pop().unwrap_or_default();
        num_spikes
    }

    pub fn run_minus_phase(&mut self) -> usize {
        let num_spikes = self.run_cycles(self.ctx.minus_cycles());
        self.run_phases(&[Phase::MinusPhaseEnd]);
        num_spikes
    }

    pub fn run_plus_phase(&mut self) -> usize {
        self.ctx.plus_phase = true;
        self.run_phases(&[Phase::PlusPhaseStart]);
        let num_spikes = self.run_cycles(self.ctx.plus_cycles);
        self.run_phases(&[Phase::PlusPhaseEnd]);
        num_spikes
    }

    /// Accumulates weight changes from the calcium state of the trial just run.
    pub fn dwt(&mut self) {
        self.run_phases(&[Phase::Dwt]);
    }

    /// Commits accumulated weight changes and target-activity changes.
    pub fn wt_from_dwt(&mut self) {
        self.run_phases(&WT_FROM_DWT_PHASES);
    }

    /// Structural weight adaptation and homeostatic synaptic scaling.
    pub fn slow_adapt(&mut self) {
        self.run_phases(&SLOW_ADAPT_PHASES);
    }

    /// One full trial: decay, external input, minus and plus phase, then learning if
    /// requested. Inputs are validated before any state changes.
    pub fn run_trial(&mut self, inputs: &[(&str, &[f32])], learn: bool) -> SimpleResult<TrialResult> {
        for (layer, values) in inputs {
            self.check_ext(layer, values)?;
        }

        let start = Instant::now();

        self.init_ext();
        for (layer, values) in inputs {
            self.apply_ext(layer, values)?;
        }

        self.new_state();
        let mut num_spikes = self.run_minus_phase();
        num_spikes += self.run_plus_phase();

        let mut slow_adapted = false;
        if learn {
            self.dwt();
            self.wt_from_dwt();

            let slow_interval = self.params.timing.slow_interval as u64;
            if self.ctx.trial % slow_interval == 0 {
                self.slow_adapt();
                slow_adapted = true;
            }
        }

        log::debug!(
            "trial {}: {} spikes in {:?}",
            self.ctx.trial,
            num_spikes,
            start.elapsed()
        );

        Ok(TrialResult {
            trial: self.ctx.trial,
            num_spikes,
            slow_adapted,
        })
    }

    pub fn layer_values(&self, layer: &str, var: NeuronVar) -> SimpleResult<Vec<f32>> {
        let info = self.layer(layer)?;
        Ok(self.state.neurons[info.nrn_range.clone()]
            .iter()
            .map(|nrn| nrn.get(var))
            .collect())
    }

    /// Fraction of neurons whose minus-phase activity falls on the wrong side of the error
    /// threshold relative to their target. Only defined for Target and Compare layers.
    pub fn pct_unit_err(&self, layer: &str) -> SimpleResult<f32> {
        let info = self.layer(layer)?;
        if !matches!(info.kind(), LayerKind::Target | LayerKind::Compare) {
            return Err(SimpleError::new(format!(
                "layer {} of kind {:?} has no target values",
                layer,
                info.kind()
            )));
        }

        let clamp = &info.params.act.clamp;
        let neurons = &self.state.neurons[info.nrn_range.clone()];
        let num_err = neurons
            .iter()
            .filter(|nrn| clamp.is_err(nrn.act_m, nrn.target))
            .count();

        Ok(if neurons.is_empty() {
            0.0
        } else {
            num_err as f32 / neurons.len() as f32
        })
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            cycles_total: self.ctx.cycles_total,
            trial: self.ctx.trial,
            neurons: self.state.neurons.clone(),
            synapses: self.state.synapses.clone(),
            pools: self.state.pools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LayerParams, ProjectionKind, ProjectionParams};
    use crate::util::test_util::assert_approx_eq_slice;
    use float_cmp::assert_approx_eq;
    use itertools::assert_equal;

    fn params() -> NetworkParams {
        let mut params = NetworkParams {
            name: "net".to_string(),
            layers: vec![
                LayerParams::defaults_for_layer("In", &[4], LayerKind::Input),
                LayerParams::defaults_for_layer("Hid", &[6], LayerKind::Super),
                LayerParams::defaults_for_layer("Out", &[4], LayerKind::Target),
                LayerParams::defaults_for_layer("Cmp", &[4], LayerKind::Compare),
            ],
            projections: vec![
                ProjectionParams::defaults_for_layers("In", "Hid", ProjectionKind::Forward),
                ProjectionParams::defaults_for_layers("Hid", "Out", ProjectionKind::Forward),
                ProjectionParams::defaults_for_layers("Out", "Hid", ProjectionKind::Back),
            ],
            ..NetworkParams::default()
        };
        params.technical_params.num_threads = Some(2);
        params
    }

    #[test]
    fn invalid_params_rejected() {
        let mut params = params();
        params.timing.theta_cycles = 0;
        let err = create_network(params).err().unwrap();
        assert!(err.as_str().starts_with("invalid network parameters"));
    }

    #[test]
    fn ext_validation() {
        let mut net = create_network(params()).unwrap();
        assert!(net.apply_ext("Hid", &[0.0; 6]).is_err());
        assert!(net.apply_ext("In", &[0.0; 3]).is_err());
        assert!(net.apply_ext("Nope", &[0.0; 4]).is_err());

        net.apply_ext("In", &[1.0, 0.0, 1.0, 0.0]).unwrap();
        net.apply_ext("Out", &[0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_equal(
            net.layer_values("In", NeuronVar::Ext).unwrap(),
            [1.0, 0.0, 1.0, 0.0],
        );
        assert!(net.neurons()[0].has_ext);
        let out_start = net.topology().layers[2].nrn_range.start;
        assert!(!net.neurons()[out_start].has_ext);

        let err = net
            .run_trial(&[("In", &[1.0; 4]), ("Hid", &[1.0; 6])], false)
            .err()
            .unwrap();
        assert!(err.as_str().contains("does not take external input"));
        assert_eq!(net.context().trial, 0);
        assert_eq!(net.layer_values("In", NeuronVar::Ext).unwrap()[1], 0.0);
    }

    #[test]
    fn trial_advances_context() {
        let mut net = create_network(params()).unwrap();
        let result = net
            .run_trial(&[("In", &[1.0, 1.0, 0.0, 0.0]), ("Out", &[1.0, 0.0, 0.0, 0.0])], false)
            .unwrap();

        assert_eq!(result.trial, 1);
        assert!(!result.slow_adapted);
        assert_eq!(net.context().cycle, 200);
        assert_eq!(net.context().cycles_total, 200);
        assert!(net.context().plus_phase);
        assert!(result.num_spikes > 0);

        // target is clamped once the plus phase starts
        let out_start = net.topology().layers[2].nrn_range.start;
        assert!(net.neurons()[out_start].has_ext);
    }

    #[test]
    fn init_acts_resets_state() {
        let mut net = create_network(params()).unwrap();
        net.apply_ext("In", &[1.0; 4]).unwrap();
        net.new_state();
        net.run_cycles(30);
        assert!(net.neurons().iter().any(|nrn| nrn.ca_spk_p > 0.0));

        net.init_acts();
        assert_eq!(net.context().cycles_total, 0);
        for nrn in net.neurons() {
            assert_eq!(nrn.ca_spk_p, 0.0);
            assert_eq!(nrn.spike, 0.0);
        }
        assert_approx_eq_slice(&net.layer_values("Hid", NeuronVar::Vm).unwrap(), &[0.3; 6]);
        assert!(net.synapses().iter().all(|syn| syn.ca_up_t == -1));
        assert!(net.gvals().iter().all(|gv| *gv == GVal::default()));
    }

    #[test]
    fn forced_spikes_validated() {
        let mut net = create_network(params()).unwrap();
        assert!(net.set_forced_spikes("Hid", &[6]).is_err());
        net.set_forced_spikes("Hid", &[0, 5]).unwrap();

        let hid_start = net.topology().layers[1].nrn_range.start as u32;
        let spikes = net.cycle().to_vec();
        assert!(spikes.contains(&hid_start));
        assert!(spikes.contains(&(hid_start + 5)));

        net.clear_forced_spikes();
        assert!(net.neurons().iter().all(|nrn| !nrn.forced));
    }

    #[test]
    fn unit_error_readout() {
        let mut net = create_network(params()).unwrap();
        assert!(net.pct_unit_err("Hid").is_err());

        net.apply_ext("Cmp", &[1.0, 1.0, 0.0, 0.0]).unwrap();
        let start = net.topology().layers[3].nrn_range.start;
        net.state.neurons[start].act_m = 0.9;
        net.state.neurons[start + 2].act_m = 0.9;
        assert_approx_eq!(f32, net.pct_unit_err("Cmp").unwrap(), 0.5);
    }

    #[test]
    fn slow_adapt_scales_toward_target() {
        let mut prjn = ProjectionParams::defaults_for_layers("In", "Hid", ProjectionKind::Forward);
        prjn.swt.adapt.on = false;
        let mut params = NetworkParams {
            name: "homeostasis".to_string(),
            layers: vec![
                LayerParams::defaults_for_layer("In", &[4], LayerKind::Input),
                LayerParams::defaults_for_layer("Hid", &[4], LayerKind::Super),
            ],
            projections: vec![prjn],
            ..NetworkParams::default()
        };
        params.technical_params.num_threads = Some(1);
        let mut net = create_network(params).unwrap();

        let hid = net.topology().layers[1].nrn_range.clone();
        for (nrn, trg_avg) in net.state.neurons[hid.clone()].iter_mut().zip([2.0, 0.5, 1.0, 1.0]) {
            nrn.act_avg = 0.1;
            nrn.trg_avg = trg_avg;
        }

        let wt_into = |net: &Network, local: usize| -> f32 {
            let (start, n) = net.topology().projections[0].recv_con[local];
            net.synapses()[start as usize..(start + n) as usize]
                .iter()
                .map(|syn| syn.wt)
                .sum()
        };
        let before = [wt_into(&net, 0), wt_into(&net, 1)];

        net.slow_adapt();

        assert_approx_eq!(f32, net.neurons()[hid.start].avg_dif, -1.0, epsilon = 1.0e-6);
        assert_approx_eq!(f32, net.neurons()[hid.start + 1].avg_dif, 0.5, epsilon = 1.0e-6);
        // under-active neuron gains input, over-active neuron loses it
        assert!(wt_into(&net, 0) > before[0]);
        assert!(wt_into(&net, 1) < before[1]);
    }

    #[test]
    fn neuromodulators_persist_across_trials() {
        let mut net = create_network(params()).unwrap();
        net.set_neuromod(0.5, 0.25);
        net.run_trial(&[("In", &[1.0; 4])], false).unwrap();
        assert_eq!(net.context().da, 0.5);
        assert_eq!(net.context().ach, 0.25);
    }

    #[test]
    fn projection_weights_set() {
        let mut net = create_network(params()).unwrap();
        assert!(net.set_projection_weights("Hid", "In", 1.0).is_err());
        net.set_projection_weights("In", "Hid", 1.0).unwrap();

        let range = net.topology().projections[0].syn_range.clone();
        for syn in &net.synapses()[range] {
            assert_approx_eq!(f32, syn.wt, 1.0);
        }
        assert!(net.projection_g_scale("In", "Hid").unwrap() > 0.0);
    }
}
