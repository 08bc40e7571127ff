use float_cmp::assert_approx_eq;
use itertools::{assert_equal, Itertools};
use rand::{rngs::StdRng, Rng, SeedableRng};
use thetanet::{
    network::{create_network, Network},
    neuron::NeuronVar,
    params::{
        BackendKind, ConnectionPattern, LayerKind, LayerParams, NetworkParams, ProjectionKind,
        ProjectionParams,
    },
    within_tolerance,
};

fn layer(name: &str, size: usize, kind: LayerKind) -> LayerParams {
    LayerParams::defaults_for_layer(name, &[size], kind)
}

fn prjn(from: &str, to: &str, kind: ProjectionKind) -> ProjectionParams {
    ProjectionParams::defaults_for_layers(from, to, kind)
}

fn params_with(layers: Vec<LayerParams>, projections: Vec<ProjectionParams>) -> NetworkParams {
    let mut params = NetworkParams {
        name: "test".to_string(),
        layers,
        projections,
        ..NetworkParams::default()
    };
    params.technical_params.num_threads = Some(2);
    params.technical_params.seed_override = Some(11);
    params
}

fn get_scenario_template_params() -> NetworkParams {
    let mut hidden = LayerParams::defaults_for_layer("Hidden", &[2, 2, 3, 3], LayerKind::Super);
    hidden.inhib.pool.on = true;

    let mut in_to_hidden = prjn("Input", "Hidden", ProjectionKind::Forward);
    in_to_hidden.pattern = ConnectionPattern::Random { probability: 0.6 };
    let mut out_to_hidden = prjn("Output", "Hidden", ProjectionKind::Back);
    out_to_hidden.scale.rel = 0.2;
    let mut ct = prjn("Hidden", "HiddenCt", ProjectionKind::CtContext);
    ct.pattern = ConnectionPattern::OneToOne;
    let mut inhib = prjn("Hidden", "Hidden", ProjectionKind::Inhib);
    inhib.pattern = ConnectionPattern::Random { probability: 0.3 };
    inhib.scale.abs = 0.2;

    let mut params = params_with(
        vec![
            LayerParams::defaults_for_layer("Input", &[4, 4], LayerKind::Input),
            hidden,
            LayerParams::defaults_for_layer("HiddenCt", &[2, 2, 3, 3], LayerKind::Ct),
            layer("Output", 5, LayerKind::Target),
        ],
        vec![
            in_to_hidden,
            prjn("Hidden", "Output", ProjectionKind::Forward),
            out_to_hidden,
            ct,
            prjn("HiddenCt", "Hidden", ProjectionKind::Back),
            inhib,
        ],
    );
    params.timing.slow_interval = 2;
    params
}

fn random_patterns(seed: u64, num_trials: usize) -> Vec<(Vec<f32>, Vec<f32>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_trials)
        .map(|_| {
            let input = (0..16).map(|_| if rng.gen_bool(0.3) { 1.0 } else { 0.0 }).collect();
            let target = (0..5).map(|_| if rng.gen_bool(0.4) { 1.0 } else { 0.0 }).collect();
            (input, target)
        })
        .collect()
}

fn run_patterns(net: &mut Network, patterns: &[(Vec<f32>, Vec<f32>)], learn: bool) -> Vec<usize> {
    patterns
        .iter()
        .map(|(input, target)| {
            net.run_trial(&[("Input", input), ("Output", target)], learn)
                .unwrap()
                .num_spikes
        })
        .collect()
}

fn assert_equivalence(nets: &mut [Network], num_trials: usize) {
    let patterns = random_patterns(5, num_trials);
    let spike_counts = nets
        .iter_mut()
        .map(|net| run_patterns(net, &patterns, true))
        .collect_vec();

    for counts in &spike_counts[1..] {
        assert_equal(counts, &spike_counts[0]);
    }

    let snapshots = nets
        .iter()
        .map(|net| serde_json::to_string(&net.snapshot()).unwrap())
        .collect_vec();

    for snapshot in &snapshots[1..] {
        assert_eq!(snapshot, &snapshots[0]);
    }
}

#[test]
fn empty_network() {
    let mut net = create_network(params_with(vec![], vec![])).unwrap();
    assert!(net.cycle().is_empty());
    let result = net.run_trial(&[], true).unwrap();
    assert_eq!(result.num_spikes, 0);
    assert_eq!(net.context().cycles_total, 200);
}

#[test]
fn all_to_all_conductance_matches_hand_integration() {
    let mut a_to_b = prjn("A", "B", ProjectionKind::Forward);
    a_to_b.com.delay = 1;

    let mut net = create_network(params_with(
        vec![layer("A", 5, LayerKind::Input), layer("B", 5, LayerKind::Super)],
        vec![a_to_b],
    ))
    .unwrap();

    net.set_projection_weights("A", "B", 1.0).unwrap();
    net.set_forced_spikes("A", &[0, 1, 2, 3, 4]).unwrap();
    let g_scale = net.projection_g_scale("A", "B").unwrap();
    assert_approx_eq!(f32, g_scale, 1.0);

    let dt = net.topology().layers[1].params.act.dt;
    let ge_dt = dt.integ / dt.ge_tau;
    let b_start = net.topology().layers[1].nrn_range.start;
    let mut expected = 0.0f32;

    for t in 0..50 {
        let spikes = net.cycle().to_vec();
        assert_equal(spikes.iter().copied().take(5), 0u32..5);

        // spikes sent on cycle t arrive on cycle t + 1
        let raw = if t == 0 { 0.0 } else { 5.0 * g_scale };
        expected = expected + raw - ge_dt * expected;

        for nrn_idx in b_start..b_start + 5 {
            let gval = net.gvals()[net.topology().gval_range(nrn_idx).start];
            assert_approx_eq!(f32, gval.g_raw, raw, epsilon = 1.0e-6);
            assert!(
                within_tolerance(gval.g_syn, expected),
                "cycle {}: {} vs {}",
                t,
                gval.g_syn,
                expected
            );
            assert_approx_eq!(f32, net.neurons()[nrn_idx].ge_raw, raw, epsilon = 1.0e-6);
        }
    }

    // approaching the steady state raw * tau
    assert!((expected - 5.0 * g_scale * dt.ge_tau).abs() < 0.01 * expected);
}

#[test]
fn passive_neurons_settle_without_spiking() {
    let mut net = create_network(params_with(vec![layer("A", 8, LayerKind::Super)], vec![])).unwrap();
    net.new_state();

    assert_eq!(net.run_cycles(150), 0);
    let vm_150 = net.layer_values("A", NeuronVar::Vm).unwrap();
    assert_eq!(net.run_cycles(50), 0);
    let vm_200 = net.layer_values("A", NeuronVar::Vm).unwrap();

    for (a, b) in vm_150.iter().zip(&vm_200) {
        assert!(*b > 0.1 && *b < 0.5);
        assert_approx_eq!(f32, *a, *b, epsilon = 1.0e-3);
    }
}

#[test]
fn determinism() {
    let mut nets = vec![
        create_network(get_scenario_template_params()).unwrap(),
        create_network(get_scenario_template_params()).unwrap(),
    ];
    assert_equivalence(&mut nets, 4);
}

#[test]
fn invariance_partitioning() {
    let mut nets = [1, 3, 7]
        .into_iter()
        .map(|num_threads| {
            let mut params = get_scenario_template_params();
            params.technical_params.num_threads = Some(num_threads);
            create_network(params).unwrap()
        })
        .collect_vec();

    assert_eq!(nets[2].num_threads(), 7);
    assert_equivalence(&mut nets, 4);
}

#[test]
fn host_device_parity() {
    let mut host_params = get_scenario_template_params();
    host_params.technical_params.num_threads = Some(3);
    let mut device_params = get_scenario_template_params();
    device_params.technical_params.backend = BackendKind::Device;

    let mut host = create_network(host_params).unwrap();
    let mut device = create_network(device_params).unwrap();
    assert_eq!(host.backend_kind(), BackendKind::Host);
    assert_eq!(device.backend_kind(), BackendKind::Device);

    let patterns = random_patterns(9, 4);
    run_patterns(&mut host, &patterns, true);
    run_patterns(&mut device, &patterns, true);

    for var in [
        NeuronVar::Vm,
        NeuronVar::CaSpkP,
        NeuronVar::CaSpkD,
        NeuronVar::ActM,
        NeuronVar::ActAvg,
        NeuronVar::TrgAvg,
    ] {
        for name in ["Input", "Hidden", "HiddenCt", "Output"] {
            let a = host.layer_values(name, var).unwrap();
            let b = device.layer_values(name, var).unwrap();
            for (x, y) in a.iter().zip(&b) {
                assert!(within_tolerance(*x, *y), "{:?} of {}: {} vs {}", var, name, x, y);
            }
        }
    }

    for (a, b) in host.synapses().iter().zip(device.synapses()) {
        assert!(within_tolerance(a.wt, b.wt));
        assert!(within_tolerance(a.swt, b.swt));
    }
}

#[test]
fn learning_changes_weights_only_when_enabled() {
    let patterns = random_patterns(3, 2);

    let mut frozen = create_network(get_scenario_template_params()).unwrap();
    let initial = frozen.synapses().to_vec();
    run_patterns(&mut frozen, &patterns, false);
    assert_equal(frozen.synapses().iter().map(|syn| syn.wt), initial.iter().map(|syn| syn.wt));

    let mut learner = create_network(get_scenario_template_params()).unwrap();
    run_patterns(&mut learner, &patterns, true);
    let num_changed = learner
        .synapses()
        .iter()
        .zip(&initial)
        .filter(|(a, b)| a.wt != b.wt)
        .count();
    assert!(num_changed > 0);

    // inhibitory projection never learns
    let inhib = &learner.topology().projections[5];
    assert!(!inhib.learns());
    for syn_idx in inhib.syn_range.clone() {
        assert_eq!(learner.synapses()[syn_idx].wt, initial[syn_idx].wt);
    }
}

#[test]
fn slow_adaptation_follows_interval() {
    let patterns = random_patterns(4, 4);
    let mut net = create_network(get_scenario_template_params()).unwrap();

    let adapted = patterns
        .iter()
        .map(|(input, target)| {
            net.run_trial(&[("Input", input), ("Output", target)], true)
                .unwrap()
                .slow_adapted
        })
        .collect_vec();

    assert_equal(adapted, [false, true, false, true]);
}

#[test]
fn failed_synapses_recover_through_slow_adaptation() {
    let mut params = get_scenario_template_params();
    params.projections[0].com.p_fail = 1.0;
    params.timing.slow_interval = 1;
    let mut net = create_network(params).unwrap();
    let in_to_hidden = net.topology().projections[0].syn_range.clone();

    for (input, target) in &random_patterns(9, 3) {
        let result = net
            .run_trial(&[("Input", input), ("Output", target)], true)
            .unwrap();
        assert!(result.slow_adapted);
        for syn in &net.synapses()[in_to_hidden.clone()] {
            assert!(syn.wt > 0.0);
            assert!(syn.lwt > 0.0);
        }
    }
}

#[test]
fn failures_hold_until_next_commit() {
    let mut params = get_scenario_template_params();
    params.projections[0].com.p_fail = 1.0;
    params.timing.slow_interval = 1000;
    let mut net = create_network(params).unwrap();
    let in_to_hidden = net.topology().projections[0].syn_range.clone();
    let patterns = random_patterns(12, 2);

    run_patterns(&mut net, &patterns[..1], true);
    let committed_lwt = net.synapses()[in_to_hidden.clone()]
        .iter()
        .map(|syn| syn.lwt)
        .collect_vec();
    assert!(net.synapses()[in_to_hidden.clone()].iter().all(|syn| syn.wt == 0.0));

    // failed synapses do not learn, so the linear weight is untouched
    run_patterns(&mut net, &patterns[1..], true);
    let syns = &net.synapses()[in_to_hidden];
    assert!(syns.iter().all(|syn| syn.wt == 0.0));
    assert_equal(syns.iter().map(|syn| syn.lwt), committed_lwt);
}

#[test]
fn target_structure_fixed_during_slow_adaptation() {
    let mut adapting_params = get_scenario_template_params();
    adapting_params.timing.slow_interval = 1;
    let mut still_params = get_scenario_template_params();
    still_params.timing.slow_interval = 1000;

    let mut adapting = create_network(adapting_params).unwrap();
    let mut still = create_network(still_params).unwrap();
    let to_output = adapting.topology().projections[1].syn_range.clone();
    let initial_swt = adapting.synapses()[to_output.clone()]
        .iter()
        .map(|syn| syn.swt)
        .collect_vec();

    let (input, target) = &random_patterns(10, 1)[0];
    let ext = [("Input", input.as_slice()), ("Output", target.as_slice())];
    assert!(adapting.run_trial(&ext, true).unwrap().slow_adapted);
    assert!(!still.run_trial(&ext, true).unwrap().slow_adapted);

    let adapted = &adapting.synapses()[to_output.clone()];
    let learned_only = &still.synapses()[to_output];
    assert_equal(adapted.iter().map(|syn| syn.swt), initial_swt);
    for (a, b) in adapted.iter().zip(learned_only) {
        assert_eq!(a.lwt, b.lwt);
        assert_eq!(a.wt, b.wt);
    }
}

#[test]
fn ct_layer_receives_context_from_bursting_neurons() {
    let mut params = get_scenario_template_params();
    params.layers[1].burst.thr_rel = 0.0;
    params.layers[1].burst.thr_abs = 0.0;
    let mut net = create_network(params).unwrap();

    net.set_forced_spikes("Hidden", &[0, 1, 2]).unwrap();
    net.run_trial(&[("Input", &[0.0; 16]), ("Output", &[0.0; 5])], false)
        .unwrap();

    let bursts = net.layer_values("Hidden", NeuronVar::Burst).unwrap();
    let ctxt = net.layer_values("HiddenCt", NeuronVar::CtxtGe).unwrap();

    for idx in 0..3 {
        assert!(bursts[idx] > 0.0);
        assert!(ctxt[idx] > 0.0);
    }
    assert!(ctxt.iter().all(|&ge| ge >= 0.0));
}

#[test]
fn weights_survive_file_round_trip() {
    let mut source = create_network(get_scenario_template_params()).unwrap();
    run_patterns(&mut source, &random_patterns(8, 2), true);

    let mut buf = Vec::new();
    source.save_weights_json(&mut buf).unwrap();

    let mut target = create_network(get_scenario_template_params()).unwrap();
    target.load_weights_json(buf.as_slice()).unwrap();

    for (a, b) in source.synapses().iter().zip(target.synapses()) {
        assert_eq!(a.wt, b.wt);
        assert_eq!(a.swt, b.swt);
    }
    assert_equal(
        source.layer_values("Hidden", NeuronVar::TrgAvg).unwrap(),
        target.layer_values("Hidden", NeuronVar::TrgAvg).unwrap(),
    );
}

#[test]
fn topology_errors_are_collected() {
    let params = params_with(
        vec![
            LayerParams::defaults_for_layer("A", &[3, 0], LayerKind::Input),
            layer("B", 3, LayerKind::Super),
        ],
        vec![prjn("X", "B", ProjectionKind::Forward)],
    );

    let err = create_network(params).err().unwrap();
    let msg = err.as_str();
    assert!(msg.starts_with("invalid network topology"));
    assert!(msg.contains("layer A: invalid shape"));
    assert!(msg.contains("unknown sending layer X"));
}

#[test]
fn unknown_layer_rejected() {
    let mut net = create_network(get_scenario_template_params()).unwrap();
    assert!(net.apply_ext("Nowhere", &[1.0]).is_err());
    assert!(net.layer_values("Nowhere", NeuronVar::Act).is_err());
    assert!(net.run_trial(&[("Nowhere", &[1.0])], false).is_err());
    assert_eq!(net.context().trial, 0);
}
