use rand::{rngs::StdRng, Rng, SeedableRng};
use thetanet::network;
use thetanet::params::BackendKind;

#[path = "../scenario_params.rs"]
mod scenario_params;

use scenario_params::{INPUT_SIZE, OUTPUT_SIZE};

fn main() {
    env_logger::init();

    for backend in [BackendKind::Host, BackendKind::Device] {
        let mut params = scenario_params::get_scenario_params();
        params.technical_params.backend = backend;
        let mut net = network::create_network(params).unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let mut neuron_checksum = 0u64;
        let mut spike_count = 0usize;

        for _ in 0..10 {
            let input: Vec<f32> = (0..INPUT_SIZE)
                .map(|_| if rng.gen_bool(0.1) { 1.0 } else { 0.0 })
                .collect();
            let target: Vec<f32> = (0..OUTPUT_SIZE)
                .map(|_| if rng.gen_bool(0.2) { 1.0 } else { 0.0 })
                .collect();

            net.init_ext();
            net.apply_ext("Input", &input).unwrap();
            net.apply_ext("Output", &target).unwrap();
            net.new_state();

            for _ in 0..net.context().minus_cycles() {
                let t = net.context().cycles_total as u64;
                let spikes = net.cycle();
                spike_count += spikes.len();
                neuron_checksum += spikes.iter().map(|&idx| t * idx as u64).sum::<u64>();
            }

            spike_count += net.run_plus_phase();
            net.dwt();
            net.wt_from_dwt();
        }

        let snapshot = net.snapshot();

        println!("{:?} backend:", backend);
        println!("...minus phase neuron checksum: {}", neuron_checksum);
        println!("...spike count: {}", spike_count);
        println!("...state checksum: {}", snapshot.checksum());
    }
}
