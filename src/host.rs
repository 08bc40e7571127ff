//! Multi-threaded backend on plain OS threads. Each worker owns a fixed partition of the
//! neurons, the layers and the receiving groups; a barrier separates consecutive phases so
//! every phase sees the completed results of the previous one.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Barrier, PoisonError, RwLock, RwLockReadGuard};
use std::thread;

use core_affinity::CoreId;

use crate::backend::{Backend, Step};
use crate::context::Context;
use crate::kernels::{self, Domain, NetworkState, NeuronEnv, Phase};
use crate::neuron::Neuron;
use crate::params::BackendKind;
use crate::pool::Pool;
use crate::synapse::Synapse;
use crate::topology::Topology;
use crate::transmission::GVal;
use crate::types::ReadBuf;
use crate::util::{get_partition_range, split_by_ranges};

pub struct HostBackend {
    num_threads: usize,
    pin_threads: bool,
}

impl HostBackend {
    pub fn new(num_threads: usize, pin_threads: bool) -> Self {
        Self {
            num_threads,
            pin_threads,
        }
    }
}

/// Per-worker partitions of every buffer.
struct Partitions {
    neurons: Vec<Range<usize>>,
    gvals: Vec<Range<usize>>,
    layers: Vec<Range<usize>>,
    pools: Vec<Range<usize>>,
    layer_neurons: Vec<Range<usize>>,
    groups: Vec<Range<usize>>,
    synapses: Vec<Range<usize>>,
}

impl Partitions {
    fn new(topo: &Topology, num_threads: usize) -> Self {
        let split = |num_elements| -> Vec<Range<usize>> {
            (0..num_threads)
                .map(|thread_id| get_partition_range(num_threads, thread_id, num_elements))
                .collect()
        };

        let neurons = split(topo.num_neurons);
        let layers = split(topo.layers.len());
        let groups = split(topo.recv_groups.len());

        Self {
            gvals: neurons
                .iter()
                .map(|range| topo.neuron_gval_start[range.start]..topo.neuron_gval_start[range.end])
                .collect(),
            pools: layers.iter().map(|range| topo.layers_pool_range(range)).collect(),
            layer_neurons: layers.iter().map(|range| topo.layers_nrn_range(range)).collect(),
            synapses: groups.iter().map(|range| topo.groups_syn_range(range)).collect(),
            neurons,
            layers,
            groups,
        }
    }
}

fn starts(ranges: &[Range<usize>]) -> Vec<usize> {
    ranges.iter().map(|range| range.start).collect()
}

type Chunks<'a, T> = Vec<RwLock<&'a mut [T]>>;

fn lock_chunks<'a, T>(slice: &'a mut [T], ranges: &[Range<usize>]) -> Chunks<'a, T> {
    split_by_ranges(slice, ranges)
        .into_iter()
        .map(RwLock::new)
        .collect()
}

/// Read access across all chunks of a partitioned buffer, addressed by global index.
struct ChunkedView<'g, 'a, T> {
    guards: Vec<RwLockReadGuard<'g, &'a mut [T]>>,
    starts: &'g [usize],
}

impl<'g, 'a, T> ChunkedView<'g, 'a, T> {
    fn new(chunks: &'g Chunks<'a, T>, starts: &'g [usize]) -> Self {
        Self {
            guards: chunks
                .iter()
                .map(|chunk| chunk.read().unwrap_or_else(PoisonError::into_inner))
                .collect(),
            starts,
        }
    }
}

impl<'g, 'a, T> ReadBuf<T> for ChunkedView<'g, 'a, T> {
    fn at(&self, idx: usize) -> &T {
        // empty chunks share their start with the next chunk, so take the last match
        let chunk = self.starts.partition_point(|&start| start <= idx) - 1;
        let slice: &[T] = &self.guards[chunk];
        &slice[idx - self.starts[chunk]]
    }
}

/// Barrier between phases. Once a worker reports a failure, every worker leaves at the
/// same phase instead of waiting for a partner that will never arrive.
struct PhaseGate {
    barrier: Barrier,
    aborted: AtomicBool,
}

impl PhaseGate {
    fn new(num_threads: usize) -> Self {
        Self {
            barrier: Barrier::new(num_threads),
            aborted: AtomicBool::new(false),
        }
    }

    /// Returns false when the run must stop.
    fn pass(&self, failed: bool) -> bool {
        if failed {
            self.aborted.store(true, Ordering::Relaxed);
        }
        self.barrier.wait();
        !self.aborted.load(Ordering::Relaxed)
    }
}

struct Shared<'a> {
    topo: &'a Topology,
    parts: &'a Partitions,
    neurons: Chunks<'a, Neuron>,
    gvals: Chunks<'a, GVal>,
    pools: Chunks<'a, Pool>,
    drive: Chunks<'a, f32>,
    synapses: Chunks<'a, Synapse>,
    rings: &'a [AtomicI64],
    neuron_starts: Vec<usize>,
    pool_starts: Vec<usize>,
    drive_starts: Vec<usize>,
    synapse_starts: Vec<usize>,
    gate: PhaseGate,
}

impl Backend for HostBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Host
    }

    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn run(&mut self, topo: &Topology, state: &mut NetworkState, steps: &[Step]) -> Vec<Vec<u32>> {
        let num_threads = self.num_threads;
        let pin_threads = self.pin_threads;
        let parts = Partitions::new(topo, num_threads);

        let shared = Shared {
            topo,
            parts: &parts,
            neuron_starts: starts(&parts.neurons),
            pool_starts: starts(&parts.pools),
            drive_starts: starts(&parts.layer_neurons),
            synapse_starts: starts(&parts.synapses),
            neurons: lock_chunks(&mut state.neurons, &parts.neurons),
            gvals: lock_chunks(&mut state.gvals, &parts.gvals),
            pools: lock_chunks(&mut state.pools, &parts.pools),
            drive: lock_chunks(&mut state.drive, &parts.layer_neurons),
            synapses: lock_chunks(&mut state.synapses, &parts.synapses),
            rings: &state.rings,
            gate: PhaseGate::new(num_threads),
        };

        let worker_spikes: Vec<Option<Vec<Vec<u32>>>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..num_threads)
                .map(|thread_id| {
                    let shared = &shared;
                    scope.spawn(move || {
                        if pin_threads {
                            core_affinity::set_for_current(CoreId { id: thread_id });
                        }
                        run_worker(thread_id, shared, steps)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|err| panic::resume_unwind(err)))
                .collect()
        });

        // a worker only stops early when another one panicked, which was re-raised above
        let worker_spikes: Vec<_> = worker_spikes.into_iter().flatten().collect();

        // neuron partitions are ascending, so concatenating in worker order keeps spikes sorted
        let num_reports = worker_spikes.first().map_or(0, Vec::len);
        (0..num_reports)
            .map(|k| {
                worker_spikes
                    .iter()
                    .flat_map(|spikes| spikes[k].iter().copied())
                    .collect()
            })
            .collect()
    }
}

/// Spike reports of one worker, `None` if the run was stopped by a panic elsewhere. A panic
/// in this worker is re-raised after the others have been released.
fn run_worker(thread_id: usize, shared: &Shared, steps: &[Step]) -> Option<Vec<Vec<u32>>> {
    let mut reports = Vec::new();

    for step in steps {
        let mut spikes = Vec::new();
        let reports_spikes = step.phases.contains(&Phase::NeuronUpdate);

        for &phase in step.phases {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match phase.domain() {
                Domain::Neurons => run_neurons(thread_id, shared, &step.ctx, phase, &mut spikes),
                Domain::Layers => run_layers(thread_id, shared, phase),
                Domain::RecvGroups => run_groups(thread_id, shared, &step.ctx, phase),
            }));

            if !shared.gate.pass(outcome.is_err()) {
                if let Err(payload) = outcome {
                    panic::resume_unwind(payload);
                }
                return None;
            }
        }

        if reports_spikes {
            reports.push(spikes);
        }
    }

    Some(reports)
}

fn run_neurons(
    thread_id: usize,
    shared: &Shared,
    ctx: &Context,
    phase: Phase,
    spikes: &mut Vec<u32>,
) {
    let topo = shared.topo;
    let mut neurons = shared.neurons[thread_id]
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut gvals = shared.gvals[thread_id]
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    let pools = ChunkedView::new(&shared.pools, &shared.pool_starts);
    let drive = ChunkedView::new(&shared.drive, &shared.drive_starts);
    let synapses = ChunkedView::new(&shared.synapses, &shared.synapse_starts);
    let env = NeuronEnv {
        topo,
        ctx,
        pools: &pools,
        drive: &drive,
        synapses: &synapses,
        rings: shared.rings,
    };

    let nrn_start = shared.parts.neurons[thread_id].start;
    let gval_base = shared.parts.gvals[thread_id].start;

    for (offset, nrn) in neurons.iter_mut().enumerate() {
        let nrn_idx = nrn_start + offset;
        let range = topo.gval_range(nrn_idx);
        let nrn_gvals = &mut gvals[(range.start - gval_base)..(range.end - gval_base)];

        if kernels::neuron_phase(phase, &env, nrn_idx, nrn, nrn_gvals) && phase == Phase::NeuronUpdate
        {
            spikes.push(nrn_idx as u32);
        }
    }
}

fn run_layers(thread_id: usize, shared: &Shared, phase: Phase) {
    let topo = shared.topo;
    let mut pools = shared.pools[thread_id]
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut drive = shared.drive[thread_id]
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let neurons = ChunkedView::new(&shared.neurons, &shared.neuron_starts);

    let pool_base = shared.parts.pools[thread_id].start;
    let drive_base = shared.parts.layer_neurons[thread_id].start;

    for layer_idx in shared.parts.layers[thread_id].clone() {
        let layer = &topo.layers[layer_idx];
        let pool_range = (layer.pool_range.start - pool_base)..(layer.pool_range.end - pool_base);
        let drive_range = (layer.nrn_range.start - drive_base)..(layer.nrn_range.end - drive_base);

        kernels::layer_phase(
            phase,
            topo,
            layer_idx,
            &mut pools[pool_range],
            &mut drive[drive_range],
            &neurons,
        );
    }
}

fn run_groups(thread_id: usize, shared: &Shared, ctx: &Context, phase: Phase) {
    let topo = shared.topo;
    let mut synapses = shared.synapses[thread_id]
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let neurons = ChunkedView::new(&shared.neurons, &shared.neuron_starts);
    let syn_base = shared.parts.synapses[thread_id].start;

    for group in &topo.recv_groups[shared.parts.groups[thread_id].clone()] {
        let range = group.syn_range();
        kernels::group_phase(
            phase,
            topo,
            ctx,
            group,
            &mut synapses[(range.start - syn_base)..(range.end - syn_base)],
            &neurons,
        );
    }
}
