pub mod context;
pub mod network;
pub mod neuron;
pub mod params;
pub mod pool;
pub mod state_snapshot;
pub mod synapse;
pub mod topology;
pub mod transmission;
pub mod weights;

mod backend;
mod channels;
mod device;
mod host;
mod kernels;
mod kinase;
mod learning;
mod types;
mod util;

pub use backend::within_tolerance;
