use std::time::Instant;

use rand::{prelude::Distribution, rngs::StdRng, seq::SliceRandom, SeedableRng};
use statrs::distribution::Poisson;
use thetanet::network;

#[path = "../scenario_params.rs"]
mod scenario_params;

use scenario_params::{INPUT_SIZE, OUTPUT_SIZE};

fn main() {
    env_logger::init();

    let mut net = network::create_network(scenario_params::get_scenario_params()).unwrap();

    let all_inputs: Vec<usize> = (0..INPUT_SIZE).collect();
    let mut rng = StdRng::seed_from_u64(0);
    let num_active_dist = Poisson::new(10.0).unwrap();

    let num_trials = 200;
    let mut spike_count = 0usize;
    let mut input = vec![0.0f32; INPUT_SIZE];
    let mut target = vec![0.0f32; OUTPUT_SIZE];

    let wall_start = Instant::now();

    for trial in 0..num_trials {
        let num_active = (num_active_dist.sample(&mut rng) as usize).min(INPUT_SIZE);

        input.fill(0.0);
        for &idx in all_inputs.choose_multiple(&mut rng, num_active) {
            input[idx] = 1.0;
        }

        target.fill(0.0);
        target[trial % OUTPUT_SIZE] = 1.0;

        let result = net
            .run_trial(&[("Input", &input), ("Output", &target)], true)
            .unwrap();
        spike_count += result.num_spikes;
    }

    let wall_time = wall_start.elapsed();
    let num_cycles = net.context().cycles_total as f64;
    let neuron_updates = num_cycles * net.topology().num_neurons as f64;

    eprintln!("Cycles per second: {:.1}", num_cycles / wall_time.as_secs_f64());
    eprintln!("Spikes per cycle: {}", spike_count as f64 / num_cycles);
    eprintln!(
        "Neuron update throughput: {:.3e} ({:.3} ns per neuron cycle)",
        neuron_updates / wall_time.as_secs_f64(),
        1e9 * wall_time.as_secs_f64() / neuron_updates
    );
    eprintln!("Output error: {}", net.pct_unit_err("Output").unwrap());
    eprintln!("Checksum: {}", net.snapshot().checksum());
}
