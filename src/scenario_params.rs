use thetanet::params::NetworkParams;

pub const INPUT_SIZE: usize = 100;
pub const OUTPUT_SIZE: usize = 25;

pub fn get_scenario_params() -> NetworkParams {
    let params_yaml_str = r#"
name: scenario
layers:
- name: Input
  shape: [10, 10]
  kind: Input
- name: Hidden
  shape: [4, 4, 5, 5]
  kind: Super
  inhib:
    pool:
      on: true
- name: HiddenCt
  shape: [4, 4, 5, 5]
  kind: Ct
- name: Output
  shape: [5, 5]
  kind: Target
projections:
- from: Input
  to: Hidden
  kind: Forward
  pattern: !Random
    probability: 0.5
- from: Hidden
  to: Output
  kind: Forward
- from: Output
  to: Hidden
  kind: Back
  scale:
    rel: 0.2
- from: Hidden
  to: HiddenCt
  kind: CtContext
  pattern: OneToOne
- from: HiddenCt
  to: Hidden
  kind: Back
  scale:
    rel: 0.1
- from: Hidden
  to: Hidden
  kind: Inhib
  pattern: !Random
    probability: 0.1
  scale:
    abs: 0.2
timing:
  theta_cycles: 200
  plus_cycles: 50
  slow_interval: 100
technical_params:
  backend: Host
  num_threads: 4
  pin_threads: false
  seed_override: 1
"#;

    serde_yaml::from_str(params_yaml_str).unwrap()
}
