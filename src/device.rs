//! Data-parallel backend. Every phase is launched as one kernel over all elements of its
//! domain on a dedicated rayon pool, mirroring a one-thread-per-element accelerator launch.

use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::backend::{Backend, Step};
use crate::context::Context;
use crate::kernels::{self, Domain, NetworkState, NeuronEnv, Phase};
use crate::params::BackendKind;
use crate::topology::Topology;
use crate::util::split_by_ranges;

pub struct DeviceBackend {
    pool: ThreadPool,
    num_threads: usize,
}

impl DeviceBackend {
    pub fn new(num_threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|idx| format!("thetanet-device-{}", idx))
            .build()?;

        Ok(Self { pool, num_threads })
    }
}

/// Element-to-buffer ranges, fixed by the topology.
struct Launch {
    neuron_gvals: Vec<Range<usize>>,
    layer_pools: Vec<Range<usize>>,
    layer_neurons: Vec<Range<usize>>,
    group_synapses: Vec<Range<usize>>,
}

impl Launch {
    fn new(topo: &Topology) -> Self {
        Self {
            neuron_gvals: (0..topo.num_neurons).map(|idx| topo.gval_range(idx)).collect(),
            layer_pools: topo.layers.iter().map(|layer| layer.pool_range.clone()).collect(),
            layer_neurons: topo.layers.iter().map(|layer| layer.nrn_range.clone()).collect(),
            group_synapses: topo.recv_groups.iter().map(|group| group.syn_range()).collect(),
        }
    }
}

impl Backend for DeviceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Device
    }

    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn run(&mut self, topo: &Topology, state: &mut NetworkState, steps: &[Step]) -> Vec<Vec<u32>> {
        let launch = Launch::new(topo);
        let mut reports = Vec::new();

        self.pool.install(|| {
            for step in steps {
                let mut spikes = Vec::new();

                for &phase in step.phases {
                    match phase.domain() {
                        Domain::Neurons => {
                            let spiked = neuron_kernel(topo, &launch, state, &step.ctx, phase);
                            if phase == Phase::NeuronUpdate {
                                spikes = spiked;
                            }
                        }
                        Domain::Layers => layer_kernel(topo, &launch, state, phase),
                        Domain::RecvGroups => group_kernel(topo, &launch, state, &step.ctx, phase),
                    }
                }

                if step.phases.contains(&Phase::NeuronUpdate) {
                    reports.push(spikes);
                }
            }
        });

        reports
    }
}

fn neuron_kernel(
    topo: &Topology,
    launch: &Launch,
    state: &mut NetworkState,
    ctx: &Context,
    phase: Phase,
) -> Vec<u32> {
    let NetworkState {
        neurons,
        synapses,
        pools,
        gvals,
        rings,
        drive,
    } = state;

    let env = NeuronEnv {
        topo,
        ctx,
        pools: pools.as_slice(),
        drive: drive.as_slice(),
        synapses: synapses.as_slice(),
        rings: rings.as_slice(),
    };

    neurons
        .par_iter_mut()
        .zip(split_by_ranges(gvals, &launch.neuron_gvals).into_par_iter())
        .enumerate()
        .filter_map(|(nrn_idx, (nrn, nrn_gvals))| {
            let spiked = kernels::neuron_phase(phase, &env, nrn_idx, nrn, nrn_gvals);
            (spiked && phase == Phase::NeuronUpdate).then_some(nrn_idx as u32)
        })
        .collect()
}

fn layer_kernel(topo: &Topology, launch: &Launch, state: &mut NetworkState, phase: Phase) {
    let neurons = state.neurons.as_slice();
    let pools = split_by_ranges(&mut state.pools, &launch.layer_pools);
    let drive = split_by_ranges(&mut state.drive, &launch.layer_neurons);

    pools
        .into_par_iter()
        .zip(drive.into_par_iter())
        .enumerate()
        .for_each(|(layer_idx, (layer_pools, layer_drive))| {
            kernels::layer_phase(phase, topo, layer_idx, layer_pools, layer_drive, neurons);
        });
}

fn group_kernel(
    topo: &Topology,
    launch: &Launch,
    state: &mut NetworkState,
    ctx: &Context,
    phase: Phase,
) {
    let neurons = state.neurons.as_slice();
    let synapses = split_by_ranges(&mut state.synapses, &launch.group_synapses);

    topo.recv_groups
        .par_iter()
        .zip(synapses.into_par_iter())
        .for_each(|(group, syns)| {
            kernels::group_phase(phase, topo, ctx, group, syns, neurons);
        });
}
