//! Compiles layer and projection declarations into flat, index-addressed buffers.
//!
//! Synapses are stored in receiver order: for each layer in declaration order, for each
//! of its incoming projections in declaration order, for each receiving neuron, senders
//! ascending. A second table lists the same synapses grouped by sender.

use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;
use simple_error::{SimpleError, SimpleResult};
use statrs::distribution::Normal;

use crate::neuron::Neuron;
use crate::params::{
    ConnectionPattern, LayerKind, LayerParams, NetworkParams, ProjectionKind, ProjectionParams,
};
use crate::pool::Pool;
use crate::synapse::Synapse;
use crate::types::HashMap;
use crate::util::{counter_rand, seeded_rng};

const INDEX_LIMIT: u64 = u32::MAX as u64;

#[derive(Debug, Clone)]
pub struct LayerInfo {
    pub idx: usize,
    pub params: LayerParams,
    pub nrn_range: Range<usize>,
    pub pool_range: Range<usize>,
    pub recv_prjns: Vec<usize>,
    pub send_prjns: Vec<usize>,
    pub gval_start: usize,
    pub ring_start: usize,
    pub ring_len: usize,
    pub drive_layer: Option<usize>,
}

impl LayerInfo {
    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn kind(&self) -> LayerKind {
        self.params.kind
    }

    pub fn num_neurons(&self) -> usize {
        self.nrn_range.len()
    }

    pub fn layer_pool(&self) -> usize {
        self.pool_range.start
    }

    pub fn has_sub_pools(&self) -> bool {
        self.pool_range.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionInfo {
    pub idx: usize,
    pub params: ProjectionParams,
    pub send_layer: usize,
    pub recv_layer: usize,
    pub syn_range: Range<usize>,
    /// Position of this projection among the receiving layer's incoming projections.
    pub recv_gval_offset: usize,
    /// Per receiving neuron: (first synapse, count), absolute synapse indices.
    pub recv_con: Vec<(u32, u32)>,
    /// Per sending neuron: (first entry, count) into `Topology::send_syn_idxs`.
    pub send_con: Vec<(u32, u32)>,
    pub g_scale: f32,
}

impl ProjectionInfo {
    pub fn kind(&self) -> ProjectionKind {
        self.params.kind
    }

    pub fn name(&self) -> String {
        self.params.name()
    }

    pub fn learns(&self) -> bool {
        self.params.learn.learn
    }
}

/// Synapses of one projection onto one receiving neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvGroup {
    pub prjn_idx: u32,
    pub recv_idx: u32,
    pub syn_start: u32,
    pub syn_end: u32,
}

impl RecvGroup {
    pub fn syn_range(&self) -> Range<usize> {
        self.syn_start as usize..self.syn_end as usize
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    pub name: String,
    pub layers: Vec<LayerInfo>,
    pub projections: Vec<ProjectionInfo>,
    pub num_neurons: usize,
    pub num_synapses: usize,
    pub num_pools: usize,
    pub num_gvals: usize,
    pub ring_size: usize,
    pub send_syn_idxs: Vec<u32>,
    pub recv_groups: Vec<RecvGroup>,
    /// Per neuron (plus one trailing entry): first incoming conductance slot.
    pub neuron_gval_start: Vec<usize>,
    layer_by_name: HashMap<String, usize>,
}

impl Topology {
    pub fn layer_idx(&self, name: &str) -> Option<usize> {
        self.layer_by_name.get(name).copied()
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&LayerInfo> {
        self.layer_idx(name).map(|idx| &self.layers[idx])
    }

    pub fn projection_idx(&self, from: &str, to: &str) -> Option<usize> {
        self.projections
            .iter()
            .position(|prjn| prjn.params.from == from && prjn.params.to == to)
    }

    pub fn gval_range(&self, nrn_idx: usize) -> Range<usize> {
        self.neuron_gval_start[nrn_idx]..self.neuron_gval_start[nrn_idx + 1]
    }

    /// Neuron range covered by a contiguous range of layers.
    pub fn layers_nrn_range(&self, layers: &Range<usize>) -> Range<usize> {
        let start = self
            .layers
            .get(layers.start)
            .map_or(self.num_neurons, |layer| layer.nrn_range.start);
        let end = if layers.end > layers.start {
            self.layers[layers.end - 1].nrn_range.end
        } else {
            start
        };
        start..end
    }

    pub fn layers_pool_range(&self, layers: &Range<usize>) -> Range<usize> {
        let start = self
            .layers
            .get(layers.start)
            .map_or(self.num_pools, |layer| layer.pool_range.start);
        let end = if layers.end > layers.start {
            self.layers[layers.end - 1].pool_range.end
        } else {
            start
        };
        start..end
    }

    pub fn groups_syn_range(&self, groups: &Range<usize>) -> Range<usize> {
        let start = self
            .recv_groups
            .get(groups.start)
            .map_or(self.num_synapses, |group| group.syn_start as usize);
        let end = if groups.end > groups.start {
            self.recv_groups[groups.end - 1].syn_end as usize
        } else {
            start
        };
        start..end
    }
}

pub struct BuiltNetwork {
    pub topology: Topology,
    pub neurons: Vec<Neuron>,
    pub synapses: Vec<Synapse>,
    pub pools: Vec<Pool>,
}

pub fn build_topology(params: &NetworkParams, seed: u64) -> SimpleResult<BuiltNetwork> {
    build_with_index_limit(params, seed, INDEX_LIMIT)
}

pub(crate) fn build_with_index_limit(
    params: &NetworkParams,
    seed: u64,
    index_limit: u64,
) -> SimpleResult<BuiltNetwork> {
    let layer_by_name = check_topology(params)?;

    let mut synapse_count: u64 = 0;
    for (prjn_idx, prjn_params) in params.projections.iter().enumerate() {
        let send = &params.layers[layer_by_name[&prjn_params.from]];
        let recv = &params.layers[layer_by_name[&prjn_params.to]];
        synapse_count += count_synapses(prjn_params, prjn_idx, send, recv, seed);
    }

    let neuron_count: u64 = params.layers.iter().map(|l| l.num_neurons() as u64).sum();

    let mut errors = Vec::new();
    if synapse_count > index_limit || neuron_count > index_limit {
        errors.push(format!(
            "network exceeds index capacity: {} neurons, {} synapses, limit {}",
            neuron_count, synapse_count, index_limit
        ));
    }
    match ring_capacity(params, &layer_by_name) {
        Some(slots) if slots <= index_limit => {}
        Some(slots) => errors.push(format!(
            "delay rings exceed index capacity: {} slots, limit {}",
            slots, index_limit
        )),
        None => errors.push(format!(
            "delay rings exceed index capacity: limit {}",
            index_limit
        )),
    }
    if !errors.is_empty() {
        return Err(SimpleError::new(errors.join("\n")));
    }

    let mut layers = create_layers(params, &layer_by_name);
    let mut projections = Vec::new();

    for (prjn_idx, prjn_params) in params.projections.iter().enumerate() {
        let send_layer = layer_by_name[&prjn_params.from];
        let recv_layer = layer_by_name[&prjn_params.to];
        layers[send_layer].send_prjns.push(prjn_idx);
        layers[recv_layer].recv_prjns.push(prjn_idx);

        projections.push(ProjectionInfo {
            idx: prjn_idx,
            params: prjn_params.clone(),
            send_layer,
            recv_layer,
            syn_range: 0..0,
            recv_gval_offset: layers[recv_layer].recv_prjns.len() - 1,
            recv_con: Vec::new(),
            send_con: Vec::new(),
            g_scale: 0.0,
        });
    }

    let (num_gvals, ring_size, neuron_gval_start) =
        assign_conductance_slots(&mut layers, &projections);
    let (synapses, recv_groups) = create_synapses(&layers, &mut projections, seed);
    let send_syn_idxs = create_send_table(&layers, &mut projections, &synapses);
    compute_g_scales(&layers, &mut projections);

    let topology = Topology {
        name: params.name.clone(),
        num_neurons: neuron_count as usize,
        num_synapses: synapses.len(),
        num_pools: layers.last().map_or(0, |layer| layer.pool_range.end),
        num_gvals,
        ring_size,
        send_syn_idxs,
        recv_groups,
        neuron_gval_start,
        layers,
        projections,
        layer_by_name,
    };

    let neurons = create_neurons(&topology, seed)?;
    let pools = create_pools(&topology);
    let mut synapses = synapses;
    init_weights(&topology, &mut synapses, seed);

    log::debug!(
        "compiled topology {}: {} layers, {} projections, {} gvals, ring size {}",
        topology.name,
        topology.layers.len(),
        topology.projections.len(),
        topology.num_gvals,
        topology.ring_size
    );

    Ok(BuiltNetwork {
        topology,
        neurons,
        synapses,
        pools,
    })
}

/// Collects every structural problem so they can be reported in one error.
fn check_topology(params: &NetworkParams) -> SimpleResult<HashMap<String, usize>> {
    let mut errors = Vec::new();
    let mut layer_by_name = HashMap::default();

    for (idx, layer) in params.layers.iter().enumerate() {
        if layer_by_name.insert(layer.name.clone(), idx).is_some() {
            errors.push(format!("duplicate layer name {}", layer.name));
        }

        let valid_rank = matches!(layer.shape.len(), 1 | 2 | 4);
        if !valid_rank || layer.shape.iter().any(|&dim| dim == 0) {
            errors.push(format!(
                "layer {}: invalid shape {:?}, expected 1, 2 or 4 non-zero dimensions",
                layer.name, layer.shape
            ));
        }
    }

    for layer in &params.layers {
        if layer.kind != LayerKind::Pulvinar {
            continue;
        }

        match &layer.pulvinar.drive_layer {
            None => errors.push(format!("pulvinar layer {}: missing driver layer", layer.name)),
            Some(driver) => match layer_by_name.get(driver) {
                None => errors.push(format!(
                    "pulvinar layer {}: unknown driver layer {}",
                    layer.name, driver
                )),
                Some(&driver_idx) => {
                    let driver_size = params.layers[driver_idx].num_neurons();
                    if driver_size != layer.num_neurons() {
                        errors.push(format!(
                            "pulvinar layer {}: driver layer {} has {} neurons, expected {}",
                            layer.name,
                            driver,
                            driver_size,
                            layer.num_neurons()
                        ));
                    }
                }
            },
        }
    }

    for prjn in &params.projections {
        let send = layer_by_name.get(&prjn.from).map(|&idx| &params.layers[idx]);
        let recv = layer_by_name.get(&prjn.to).map(|&idx| &params.layers[idx]);

        if send.is_none() {
            errors.push(format!(
                "projection {}: unknown sending layer {}",
                prjn.name(),
                prjn.from
            ));
        }

        if recv.is_none() {
            errors.push(format!(
                "projection {}: unknown receiving layer {}",
                prjn.name(),
                prjn.to
            ));
        }

        match prjn.pattern {
            ConnectionPattern::Full => {}
            ConnectionPattern::OneToOne => {
                if let (Some(send), Some(recv)) = (send, recv) {
                    if send.num_neurons() != recv.num_neurons() {
                        errors.push(format!(
                            "projection {}: one-to-one pattern needs equal layer sizes, got {} and {}",
                            prjn.name(),
                            send.num_neurons(),
                            recv.num_neurons()
                        ));
                    }
                }
            }
            ConnectionPattern::Random { probability } => {
                if !(0.0..=1.0).contains(&probability) {
                    errors.push(format!(
                        "projection {}: connection probability {} is outside [0, 1]",
                        prjn.name(),
                        probability
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(layer_by_name)
    } else {
        Err(SimpleError::new(errors.join("\n")))
    }
}

fn is_connected(
    prjn: &ProjectionParams,
    prjn_idx: usize,
    same_layer: bool,
    recv: usize,
    send: usize,
    seed: u64,
) -> bool {
    if same_layer && recv == send && !prjn.self_connections {
        return false;
    }

    match prjn.pattern {
        ConnectionPattern::Full => true,
        ConnectionPattern::OneToOne => recv == send,
        ConnectionPattern::Random { probability } => {
            (counter_rand(&(seed, prjn_idx, recv, send)) as f64) < probability
        }
    }
}

fn count_synapses(
    prjn: &ProjectionParams,
    prjn_idx: usize,
    send: &LayerParams,
    recv: &LayerParams,
    seed: u64,
) -> u64 {
    let same_layer = prjn.from == prjn.to;
    let num_send = send.num_neurons() as u64;
    let num_recv = recv.num_neurons() as u64;

    match prjn.pattern {
        ConnectionPattern::Full => {
            if same_layer && !prjn.self_connections {
                num_recv * num_send.saturating_sub(1)
            } else {
                num_recv * num_send
            }
        }
        ConnectionPattern::OneToOne => {
            if same_layer && !prjn.self_connections {
                0
            } else {
                num_recv
            }
        }
        ConnectionPattern::Random { .. } => {
            let mut count = 0;
            for recv_idx in 0..num_recv as usize {
                for send_idx in 0..num_send as usize {
                    if is_connected(prjn, prjn_idx, same_layer, recv_idx, send_idx, seed) {
                        count += 1;
                    }
                }
            }
            count
        }
    }
}

fn create_layers(params: &NetworkParams, layer_by_name: &HashMap<String, usize>) -> Vec<LayerInfo> {
    let mut nrn_start = 0;
    let mut pool_start = 0;

    params
        .layers
        .iter()
        .enumerate()
        .map(|(idx, layer_params)| {
            let num_neurons = layer_params.num_neurons();
            let num_pools = 1 + layer_params.num_sub_pools();
            let drive_layer = match layer_params.kind {
                LayerKind::Pulvinar => layer_params
                    .pulvinar
                    .drive_layer
                    .as_ref()
                    .and_then(|name| layer_by_name.get(name).copied()),
                _ => None,
            };

            let info = LayerInfo {
                idx,
                params: layer_params.clone(),
                nrn_range: nrn_start..(nrn_start + num_neurons),
                pool_range: pool_start..(pool_start + num_pools),
                recv_prjns: Vec::new(),
                send_prjns: Vec::new(),
                gval_start: 0,
                ring_start: 0,
                ring_len: 0,
                drive_layer,
            };

            nrn_start += num_neurons;
            pool_start += num_pools;
            info
        })
        .collect()
}

/// Ring slots needed by all receiving layers, `None` on overflow.
fn ring_capacity(params: &NetworkParams, layer_by_name: &HashMap<String, usize>) -> Option<u64> {
    // per layer: incoming projections, longest delay
    let mut recv = vec![(0u64, 0u64); params.layers.len()];
    for prjn_params in &params.projections {
        let entry = &mut recv[layer_by_name[&prjn_params.to]];
        entry.0 += 1;
        entry.1 = entry.1.max(prjn_params.com.delay as u64);
    }

    params
        .layers
        .iter()
        .zip(recv)
        .try_fold(0u64, |total, (layer, (num_recv, max_delay))| {
            let slots = (layer.num_neurons() as u64)
                .checked_mul(num_recv)?
                .checked_mul(max_delay + 1)?;
            total.checked_add(slots)
        })
}

fn assign_conductance_slots(
    layers: &mut [LayerInfo],
    projections: &[ProjectionInfo],
) -> (usize, usize, Vec<usize>) {
    let mut gval_start = 0;
    let mut ring_start = 0;
    let mut neuron_gval_start = Vec::new();

    for layer in layers.iter_mut() {
        let num_recv = layer.recv_prjns.len();
        let max_delay = layer
            .recv_prjns
            .iter()
            .map(|&prjn_idx| projections[prjn_idx].params.com.delay as usize)
            .max()
            .unwrap_or(0);

        layer.gval_start = gval_start;
        layer.ring_start = ring_start;
        layer.ring_len = max_delay + 1;

        for local in 0..layer.num_neurons() {
            neuron_gval_start.push(gval_start + local * num_recv);
        }

        let num_gvals = layer.num_neurons() * num_recv;
        gval_start += num_gvals;
        ring_start += num_gvals * layer.ring_len;
    }

    neuron_gval_start.push(gval_start);
    (gval_start, ring_start, neuron_gval_start)
}

fn create_synapses(
    layers: &[LayerInfo],
    projections: &mut [ProjectionInfo],
    seed: u64,
) -> (Vec<Synapse>, Vec<RecvGroup>) {
    let mut synapses = Vec::new();
    let mut recv_groups = Vec::new();

    for layer in layers {
        for &prjn_idx in &layer.recv_prjns {
            let prjn = &mut projections[prjn_idx];
            let send_range = layers[prjn.send_layer].nrn_range.clone();
            let same_layer = prjn.send_layer == prjn.recv_layer;
            let syn_start = synapses.len();

            for (recv_local, recv_idx) in layer.nrn_range.clone().enumerate() {
                let group_start = synapses.len();

                for (send_local, send_idx) in send_range.clone().enumerate() {
                    if is_connected(&prjn.params, prjn_idx, same_layer, recv_local, send_local, seed) {
                        synapses.push(Synapse::new(
                            recv_idx as u32,
                            send_idx as u32,
                            prjn_idx as u32,
                        ));
                    }
                }

                let group_end = synapses.len();
                prjn.recv_con
                    .push((group_start as u32, (group_end - group_start) as u32));

                if group_end > group_start {
                    recv_groups.push(RecvGroup {
                        prjn_idx: prjn_idx as u32,
                        recv_idx: recv_idx as u32,
                        syn_start: group_start as u32,
                        syn_end: group_end as u32,
                    });
                }
            }

            prjn.syn_range = syn_start..synapses.len();
        }
    }

    (synapses, recv_groups)
}

fn create_send_table(
    layers: &[LayerInfo],
    projections: &mut [ProjectionInfo],
    synapses: &[Synapse],
) -> Vec<u32> {
    let mut send_syn_idxs = vec![0; synapses.len()];
    let mut table_start = 0;

    for prjn in projections.iter_mut() {
        let send_range = layers[prjn.send_layer].nrn_range.clone();
        let mut counts = vec![0u32; send_range.len()];

        for syn in &synapses[prjn.syn_range.clone()] {
            counts[syn.send_idx as usize - send_range.start] += 1;
        }

        let mut offset = table_start as u32;
        prjn.send_con = counts
            .iter()
            .map(|&count| {
                let con = (offset, count);
                offset += count;
                con
            })
            .collect();

        let mut fill: Vec<u32> = prjn.send_con.iter().map(|&(start, _)| start).collect();
        for syn_idx in prjn.syn_range.clone() {
            let send_local = synapses[syn_idx].send_idx as usize - send_range.start;
            send_syn_idxs[fill[send_local] as usize] = syn_idx as u32;
            fill[send_local] += 1;
        }

        table_start += prjn.syn_range.len();
    }

    send_syn_idxs
}

/// Relative scales are normalized within the excitatory and the inhibitory projections of
/// each receiving layer, then divided by the expected number of concurrently active
/// senders.
fn compute_g_scales(layers: &[LayerInfo], projections: &mut [ProjectionInfo]) {
    for layer in layers {
        let is_inhib = |prjn: &ProjectionInfo| prjn.kind() == ProjectionKind::Inhib;

        let sum_rel = |inhib: bool| -> f32 {
            layer
                .recv_prjns
                .iter()
                .map(|&idx| &projections[idx])
                .filter(|prjn| is_inhib(prjn) == inhib)
                .map(|prjn| prjn.params.scale.rel)
                .sum()
        };
        let (sum_rel_exc, sum_rel_inh) = (sum_rel(false), sum_rel(true));

        for &prjn_idx in &layer.recv_prjns {
            let send_layer = &layers[projections[prjn_idx].send_layer];
            let prjn = &mut projections[prjn_idx];
            let sum_rel = if is_inhib(prjn) { sum_rel_inh } else { sum_rel_exc };
            let rel = if sum_rel > 0.0 {
                prjn.params.scale.rel / sum_rel
            } else {
                0.0
            };

            let avg_con = if layer.num_neurons() > 0 {
                prjn.syn_range.len() as f32 / layer.num_neurons() as f32
            } else {
                0.0
            };
            let send_act = send_layer.params.learn.trg_avg.nominal_act;
            let expected_active = (send_act * avg_con).round().max(1.0);

            prjn.g_scale = prjn.params.scale.abs * rel / expected_active;
        }
    }
}

fn create_neurons(topology: &Topology, seed: u64) -> SimpleResult<Vec<Neuron>> {
    let mut neurons = vec![Neuron::default(); topology.num_neurons];

    for layer in &topology.layers {
        let act = &layer.params.act;
        let trg = &layer.params.learn.trg_avg;
        let mut rng = seeded_rng(&(seed, "neurons", layer.idx));

        let ge_dist = base_distribution(act.init.ge_base, act.init.ge_var)?;
        let gi_dist = base_distribution(act.init.gi_base, act.init.gi_var)?;

        let sub_pool_size = layer.params.neurons_per_sub_pool();

        for (local, nrn) in neurons[layer.nrn_range.clone()].iter_mut().enumerate() {
            nrn.layer_idx = layer.idx as u32;
            nrn.sub_pool = if layer.has_sub_pools() {
                (layer.pool_range.start + 1 + local / sub_pool_size) as u32
            } else {
                layer.pool_range.start as u32
            };

            nrn.ge_base = sample_base(&ge_dist, act.init.ge_base, &mut rng);
            nrn.gi_base = sample_base(&gi_dist, act.init.gi_base, &mut rng);
            act.init_acts(nrn);
            layer.params.learn.init_neuron_ca(nrn);
        }

        let pool_ranges: Vec<Range<usize>> = if layer.has_sub_pools() {
            (0..layer.pool_range.len() - 1)
                .map(|k| (k * sub_pool_size)..((k + 1) * sub_pool_size))
                .collect()
        } else {
            vec![0..layer.num_neurons()]
        };

        for range in pool_ranges {
            let n = range.len();
            let mut order: Vec<usize> = (0..n).collect();
            if trg.permute {
                order.shuffle(&mut rng);
            }

            let inc = if n > 1 {
                trg.range.range() / (n - 1) as f32
            } else {
                0.0
            };

            for (rank, &offset) in order.iter().enumerate() {
                let nrn = &mut neurons[layer.nrn_range.start + range.start + offset];
                nrn.trg_avg = if !trg.on {
                    1.0
                } else if n > 1 {
                    trg.range.min + inc * rank as f32
                } else {
                    0.5 * (trg.range.min + trg.range.max)
                };
                nrn.avg_pct = nrn.trg_avg;
                nrn.act_avg = trg.nominal_act * nrn.trg_avg;
                nrn.avg_dif = 0.0;
            }
        }
    }

    Ok(neurons)
}

fn base_distribution(mean: f32, var: f32) -> SimpleResult<Option<Normal>> {
    if var <= 0.0 {
        return Ok(None);
    }

    Normal::new(mean as f64, var as f64)
        .map(Some)
        .map_err(|err| SimpleError::new(format!("invalid baseline conductance: {}", err)))
}

fn sample_base<R: Rng>(dist: &Option<Normal>, mean: f32, rng: &mut R) -> f32 {
    match dist {
        Some(dist) => (rng.sample(dist) as f32).max(0.0),
        None => mean,
    }
}

fn create_pools(topology: &Topology) -> Vec<Pool> {
    let mut pools = Vec::with_capacity(topology.num_pools);

    for layer in &topology.layers {
        let start = layer.nrn_range.start as u32;
        pools.push(Pool::new(
            layer.idx as u32,
            true,
            start,
            layer.nrn_range.end as u32,
        ));

        let sub_pool_size = layer.params.neurons_per_sub_pool() as u32;
        for k in 0..(layer.pool_range.len() as u32).saturating_sub(1) {
            pools.push(Pool::new(
                layer.idx as u32,
                false,
                start + k * sub_pool_size,
                start + (k + 1) * sub_pool_size,
            ));
        }
    }

    pools
}

fn init_weights(topology: &Topology, synapses: &mut [Synapse], seed: u64) {
    for prjn in &topology.projections {
        let recv_kind = topology.layers[prjn.recv_layer].kind();
        let swt = &prjn.params.swt;
        let spct = if recv_kind.is_target() {
            Some(0.0)
        } else {
            None
        };

        let mut rng = seeded_rng(&(seed, "weights", prjn.idx));
        for syn in &mut synapses[prjn.syn_range.clone()] {
            swt.init_syn(syn, spct, &mut rng);
        }

        if swt.adapt.on && !recv_kind.is_target() {
            for group in topology
                .recv_groups
                .iter()
                .filter(|group| group.prjn_idx as usize == prjn.idx)
            {
                crate::learning::swt_rescale(swt, &mut synapses[group.syn_range()]);
            }
        }
    }
}
