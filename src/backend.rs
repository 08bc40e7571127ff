//! Execution backends. Both run the same per-element kernels from `kernels`; they differ
//! only in how the elements of a phase are spread over threads.

use crate::context::Context;
use crate::device::DeviceBackend;
use crate::host::HostBackend;
use crate::kernels::{NetworkState, Phase};
use crate::params::{BackendKind, TechnicalParams};
use crate::topology::Topology;

/// One cycle's worth of work: the phases to run, in order, under a fixed context.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub ctx: Context,
    pub phases: &'a [Phase],
}

pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    fn num_threads(&self) -> usize;

    /// Runs `steps` in order. Returns, for each step that contains
    /// `Phase::NeuronUpdate`, the ascending indices of the neurons that spiked.
    fn run(&mut self, topo: &Topology, state: &mut NetworkState, steps: &[Step]) -> Vec<Vec<u32>>;
}

pub fn create_backend(params: &TechnicalParams) -> Box<dyn Backend> {
    let num_threads = params.num_threads.unwrap_or_else(num_cpus::get).max(1);

    match params.backend {
        BackendKind::Host => Box::new(HostBackend::new(num_threads, params.pin_threads)),
        BackendKind::Device => match DeviceBackend::new(num_threads) {
            Ok(backend) => Box::new(backend),
            Err(err) => {
                log::warn!(
                    "device backend unavailable ({}), falling back to host backend",
                    err
                );
                Box::new(HostBackend::new(num_threads, params.pin_threads))
            }
        },
    }
}

/// Whether two results agree within the tolerance allowed between backends.
pub fn within_tolerance(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1.0e-5 + 1.0e-4 * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance() {
        assert!(within_tolerance(1.0, 1.00005));
        assert!(!within_tolerance(1.0, 1.001));
        assert!(within_tolerance(0.0, 5.0e-6));
        assert!(!within_tolerance(0.0, 5.0e-5));
    }

    #[test]
    fn backend_selection() {
        let host = create_backend(&TechnicalParams {
            num_threads: Some(3),
            ..TechnicalParams::default()
        });
        assert_eq!(host.kind(), BackendKind::Host);
        assert_eq!(host.num_threads(), 3);

        let device = create_backend(&TechnicalParams {
            backend: BackendKind::Device,
            num_threads: Some(2),
            ..TechnicalParams::default()
        });
        assert_eq!(device.kind(), BackendKind::Device);
        assert_eq!(device.num_threads(), 2);
    }
}
