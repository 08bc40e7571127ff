use serde::{Deserialize, Serialize};

use crate::neuron::Neuron;
use crate::pool::Pool;
use crate::synapse::Synapse;

/// Full copy of the mutable simulation state, in the network's own ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub cycles_total: i64,
    pub trial: u64,
    pub neurons: Vec<Neuron>,
    pub synapses: Vec<Synapse>,
    pub pools: Vec<Pool>,
}

impl StateSnapshot {
    /// Order-sensitive sum over membrane potentials and weights, for quick comparisons
    /// between runs.
    pub fn checksum(&self) -> f64 {
        let vm_sum: f64 = self
            .neurons
            .iter()
            .enumerate()
            .map(|(idx, nrn)| (idx + 1) as f64 * nrn.vm as f64)
            .sum();

        let wt_sum: f64 = self
            .synapses
            .iter()
            .enumerate()
            .map(|(idx, syn)| (idx + 1) as f64 * syn.wt as f64)
            .sum();

        vm_sum + wt_sum
    }
}
