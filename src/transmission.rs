//! Delayed spike transmission. Every (receiving neuron, incoming projection) pair owns a
//! ring of `max_delay + 1` fixed-point slots. Senders add into the slot for `t + delay`;
//! receivers read and zero the slot for `t`.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::synapse::Synapse;
use crate::topology::{LayerInfo, ProjectionInfo, Topology};
use crate::types::ReadBuf;
use crate::util::{from_fixed, to_fixed};

/// Conductance received by one neuron through one projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GVal {
    pub g_raw: f32,
    pub g_syn: f32,
}

pub fn create_rings(size: usize) -> Vec<AtomicI64> {
    (0..size).map(|_| AtomicI64::new(0)).collect()
}

pub fn clear_rings(rings: &[AtomicI64]) {
    for slot in rings {
        slot.store(0, Ordering::Relaxed);
    }
}

fn slot_idx(layer: &LayerInfo, gval_idx: usize, cycle: usize) -> usize {
    layer.ring_start + (gval_idx - layer.gval_start) * layer.ring_len + cycle % layer.ring_len
}

/// Reads and zeroes the current slot of a receiving pair.
pub fn take_current(layer: &LayerInfo, gval_idx: usize, ctx: &Context, rings: &[AtomicI64]) -> f32 {
    let idx = slot_idx(layer, gval_idx, ctx.cycles_total as usize);
    from_fixed(rings[idx].swap(0, Ordering::Relaxed))
}

/// Adds `value * g_scale * wt` for every synapse of `send_idx` in `prjn`, arriving
/// `delay` cycles after the current one.
pub fn send<S>(
    topo: &Topology,
    prjn: &ProjectionInfo,
    send_idx: usize,
    value: f32,
    ctx: &Context,
    synapses: &S,
    rings: &[AtomicI64],
) where
    S: ReadBuf<Synapse> + ?Sized,
{
    let recv_layer = &topo.layers[prjn.recv_layer];
    let send_layer = &topo.layers[prjn.send_layer];
    let (start, n) = prjn.send_con[send_idx - send_layer.nrn_range.start];
    let arrival = ctx.cycles_total as usize + prjn.params.com.delay as usize;
    let scale = value * prjn.g_scale;

    for &syn_idx in &topo.send_syn_idxs[start as usize..(start + n) as usize] {
        let syn = synapses.at(syn_idx as usize);
        let recv_local = syn.recv_idx as usize - recv_layer.nrn_range.start;
        let gval_idx = recv_layer.gval_start + recv_local * recv_layer.recv_prjns.len()
            + prjn.recv_gval_offset;
        rings[slot_idx(recv_layer, gval_idx, arrival)]
            .fetch_add(to_fixed(scale * syn.wt), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{
        ConnectionPattern, LayerKind, LayerParams, NetworkParams, ProjectionKind,
        ProjectionParams, TimingParams,
    };
    use crate::topology::build_topology;
    use float_cmp::assert_approx_eq;

    fn params(delay: u32) -> NetworkParams {
        let mut prj = ProjectionParams::defaults_for_layers("A", "B", ProjectionKind::Forward);
        prj.com.delay = delay;
        prj.pattern = ConnectionPattern::OneToOne;
        NetworkParams {
            name: "ring".to_string(),
            layers: vec![
                LayerParams::defaults_for_layer("A", &[3], LayerKind::Input),
                LayerParams::defaults_for_layer("B", &[3], LayerKind::Super),
            ],
            projections: vec![prj],
            ..NetworkParams::default()
        }
    }

    #[test]
    fn arrives_after_delay() {
        for delay in [1, 2, 5] {
            let built = build_topology(&params(delay), 0).unwrap();
            let topo = &built.topology;
            let rings = create_rings(topo.ring_size);
            let layer_b = &topo.layers[1];
            assert_eq!(layer_b.ring_len, delay as usize + 1);

            let mut ctx = Context::new(0, &TimingParams::default());
            let prjn = &topo.projections[0];
            send(topo, prjn, 1, 1.0, &ctx, &built.synapses, &rings);

            let expected = prjn.g_scale * built.synapses[1].wt;
            let gval_idx = layer_b.gval_start + 1;

            for cycle in 0..(3 * delay + 3) {
                let val = take_current(layer_b, gval_idx, &ctx, &rings);
                if cycle == delay {
                    assert_approx_eq!(f32, val, expected, epsilon = 1.0e-6);
                } else {
                    assert_eq!(val, 0.0);
                }
                ctx.advance_cycle();
            }
        }
    }

    #[test]
    fn concurrent_contributions_accumulate() {
        let built = build_topology(&params(1), 0).unwrap();
        let topo = &built.topology;
        let rings = create_rings(topo.ring_size);
        let ctx = Context::new(0, &TimingParams::default());
        let prjn = &topo.projections[0];
        let layer_b = &topo.layers[1];

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| send(topo, prjn, 2, 0.25, &ctx, &built.synapses, &rings));
            }
        });

        let mut next = ctx;
        next.advance_cycle();
        let val = take_current(layer_b, layer_b.gval_start + 2, &next, &rings);
        assert_approx_eq!(
            f32,
            val,
            prjn.g_scale * built.synapses[2].wt,
            epsilon = 1.0e-6
        );
    }
}
