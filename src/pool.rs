use serde::{Deserialize, Serialize};

use crate::neuron::Neuron;
use crate::params::{GiParams, InhibParams};

/// Running average and maximum over the members of a pool, reduced in index order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AvgMax {
    pub avg: f32,
    pub max: f32,
    sum: f32,
    n: u32,
}

impl AvgMax {
    pub fn init(&mut self) {
        *self = Self::default();
    }

    pub fn update_val(&mut self, val: f32) {
        self.sum += val;
        self.n += 1;
        if self.n == 1 || val > self.max {
            self.max = val;
        }
    }

    pub fn calc_avg(&mut self) {
        self.avg = if self.n > 0 {
            self.sum / self.n as f32
        } else {
            0.0
        };
    }
}

/// Fast-spiking / slow-spiking feedforward-feedback inhibition state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Inhib {
    pub ffs_raw: f32,
    pub fbs_raw: f32,
    pub ge_ext_raw: f32,
    pub ffs: f32,
    pub fbs: f32,
    pub ge_exts: f32,
    pub clamped: bool,
    pub fsi: f32,
    pub ssf: f32,
    pub ssi: f32,
    pub fs_gi: f32,
    pub ss_gi: f32,
    pub gi: f32,
}

impl Inhib {
    pub fn init(&mut self) {
        *self = Self::default();
    }

    pub fn init_raw(&mut self) {
        self.ffs_raw = 0.0;
        self.fbs_raw = 0.0;
        self.ge_ext_raw = 0.0;
    }

    pub fn raw_incr(&mut self, spike: f32, ge_raw: f32, ge_ext: f32) {
        self.ffs_raw += ge_raw;
        self.fbs_raw += spike;
        self.ge_ext_raw += ge_ext;
    }

    pub fn spike_from_raw(&mut self, num_neurons: usize, gi: &GiParams) {
        let norm = if num_neurons > 0 {
            1.0 / num_neurons as f32
        } else {
            0.0
        };
        self.ffs = self.ffs_raw;
        self.fbs = self.fbs_raw * norm;
        self.ge_exts = self.ge_ext_raw * norm;
        self.clamped = self.ge_exts > gi.clamp_ext_min;
    }

    /// Integrates the fast and slow pathways into one conductance.
    pub fn gi_from_spikes(&mut self, gi: &GiParams) {
        self.fsi += (self.ffs + gi.fb * self.fbs) - self.fsi / gi.fs_tau;
        self.fs_gi = gi.gi * self.fs(gi);

        self.ssf += self.fbs * (1.0 - self.ssf) - self.ssf / gi.ssf_tau;
        self.ssi += (self.ssf - self.ssi) / gi.ssi_tau;
        self.ss_gi = gi.gi * gi.ss * self.ssi;

        self.gi = self.fs_gi + self.ss_gi;
    }

    /// Fast-spiking drive. A pool clamped by external input follows that input alone.
    fn fs(&self, gi: &GiParams) -> f32 {
        if self.clamped {
            return self.ge_exts;
        }
        (self.fsi - gi.fs0).max(0.0) + self.ge_exts
    }

    pub fn decay(&mut self, decay: f32) {
        self.fsi -= decay * self.fsi;
        self.ssf -= decay * self.ssf;
        self.ssi -= decay * self.ssi;
        self.fs_gi -= decay * self.fs_gi;
        self.ss_gi -= decay * self.ss_gi;
        self.gi -= decay * self.gi;
    }
}

/// A group of neurons sharing one inhibitory conductance. Every layer owns one layer-level
/// pool; 4-D layers additionally own one sub-pool per outer cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub layer_idx: u32,
    pub is_layer_pool: bool,
    pub nrn_start: u32,
    pub nrn_end: u32,
    pub inhib: Inhib,
    pub ca_spk_p: AvgMax,
    pub ca_spk_d: AvgMax,
    pub act: AvgMax,
    pub act_avg_mean: f32,
    pub dtrg_avg_mean: f32,
    /// Fraction of ordinary input retained by a relay layer during the plus phase.
    pub non_drive_pct: f32,
}

impl Pool {
    pub fn new(layer_idx: u32, is_layer_pool: bool, nrn_start: u32, nrn_end: u32) -> Self {
        Self {
            layer_idx,
            is_layer_pool,
            nrn_start,
            nrn_end,
            non_drive_pct: 1.0,
            ..Self::default()
        }
    }

    pub fn num_neurons(&self) -> usize {
        (self.nrn_end - self.nrn_start) as usize
    }

    pub fn init(&mut self) {
        self.inhib.init();
        self.ca_spk_p.init();
        self.ca_spk_d.init();
        self.act.init();
        self.non_drive_pct = 1.0;
    }

    /// Reduces per-cycle member statistics. `neurons` must be the pool's member range.
    pub fn reduce<'a, I>(&mut self, neurons: I, gi: &GiParams)
    where
        I: IntoIterator<Item = &'a Neuron>,
    {
        self.inhib.init_raw();
        self.ca_spk_p.init();
        self.ca_spk_d.init();
        self.act.init();

        for nrn in neurons {
            self.inhib.raw_incr(nrn.spike, nrn.ge_raw, nrn.ge_ext);
            self.ca_spk_p.update_val(nrn.ca_spk_p);
            self.ca_spk_d.update_val(nrn.ca_spk_d);
            self.act.update_val(nrn.act);
        }

        self.inhib.spike_from_raw(self.num_neurons(), gi);
        self.ca_spk_p.calc_avg();
        self.ca_spk_d.calc_avg();
        self.act.calc_avg();
    }
}

/// Runs inhibition for a layer's pools. `pools[0]` is the layer pool; the rest are its
/// sub-pools. With layer inhibition on, sub-pools receive at least the layer value;
/// otherwise the layer pool reports the strongest sub-pool.
pub fn inhibit_layer(pools: &mut [Pool], inhib: &InhibParams) {
    let (layer_pool, sub_pools) = match pools.split_first_mut() {
        Some(split) => split,
        None => return,
    };

    if inhib.layer.on {
        layer_pool.inhib.gi_from_spikes(&inhib.layer);
    } else {
        layer_pool.inhib.gi = 0.0;
        layer_pool.inhib.ss_gi = 0.0;
    }

    if sub_pools.is_empty() {
        return;
    }

    let mut max_sub_gi = 0.0f32;
    let mut max_sub_ss_gi = 0.0f32;

    for sub_pool in sub_pools.iter_mut() {
        if inhib.pool.on {
            sub_pool.inhib.gi_from_spikes(&inhib.pool);
        } else {
            sub_pool.inhib.gi = 0.0;
            sub_pool.inhib.ss_gi = 0.0;
        }

        if inhib.layer.on {
            sub_pool.inhib.gi = sub_pool.inhib.gi.max(layer_pool.inhib.gi);
            sub_pool.inhib.ss_gi = sub_pool.inhib.ss_gi.max(layer_pool.inhib.ss_gi);
        }

        max_sub_gi = max_sub_gi.max(sub_pool.inhib.gi);
        max_sub_ss_gi = max_sub_ss_gi.max(sub_pool.inhib.ss_gi);
    }

    if !inhib.layer.on {
        layer_pool.inhib.gi = max_sub_gi;
        layer_pool.inhib.ss_gi = max_sub_ss_gi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn avg_max() {
        let mut sut = AvgMax::default();
        for val in [0.2, -0.1, 0.5, 0.0] {
            sut.update_val(val);
        }
        sut.calc_avg();
        assert_approx_eq!(f32, sut.avg, 0.15);
        assert_approx_eq!(f32, sut.max, 0.5);

        let mut negative = AvgMax::default();
        negative.update_val(-1.0);
        negative.calc_avg();
        assert_approx_eq!(f32, negative.max, -1.0);
    }

    #[test]
    fn reduce_normalizes_feedback() {
        let gi = GiParams::default();
        let mut neurons = vec![Neuron::default(); 4];
        neurons[1].spike = 1.0;
        neurons[3].spike = 1.0;
        neurons[0].ge_raw = 0.3;
        neurons[2].ge_raw = 0.1;

        let mut sut = Pool::new(0, true, 0, 4);
        sut.reduce(&neurons, &gi);
        assert_approx_eq!(f32, sut.inhib.fbs, 0.5);
        assert_approx_eq!(f32, sut.inhib.ffs, 0.4);
        assert!(!sut.inhib.clamped);
    }

    #[test]
    fn clamped_pool_follows_external_input() {
        let gi = GiParams::default();
        let mut neurons = vec![Neuron::default(); 4];
        for nrn in neurons.iter_mut() {
            nrn.ge_ext = 0.5;
            nrn.ge_raw = 2.0;
        }

        let mut sut = Pool::new(0, true, 0, 4);
        sut.reduce(&neurons, &gi);
        assert!(sut.inhib.clamped);
        sut.inhib.gi_from_spikes(&gi);
        assert_approx_eq!(f32, sut.inhib.fs_gi, gi.gi * 0.5);

        for nrn in neurons.iter_mut() {
            nrn.ge_ext = 0.02;
        }
        let mut weak = Pool::new(0, true, 0, 4);
        weak.reduce(&neurons, &gi);
        assert!(!weak.inhib.clamped);
        weak.inhib.gi_from_spikes(&gi);
        let fs = (weak.inhib.fsi - gi.fs0).max(0.0) + 0.02;
        assert_approx_eq!(f32, weak.inhib.fs_gi, gi.gi * fs, epsilon = 1.0e-6);
    }

    #[test]
    fn fast_pathway_needs_threshold() {
        let gi = GiParams::default();
        let mut sut = Inhib::default();
        sut.ffs = 0.05;
        sut.gi_from_spikes(&gi);
        assert_eq!(sut.fs_gi, 0.0);
        assert_approx_eq!(f32, sut.fsi, 0.05);

        sut.ffs = 0.5;
        sut.fbs = 0.25;
        sut.gi_from_spikes(&gi);
        let fsi = 0.05 + 0.75 - 0.05 / gi.fs_tau;
        assert_approx_eq!(f32, sut.fsi, fsi);
        assert_approx_eq!(f32, sut.fs_gi, gi.gi * (fsi - gi.fs0));
        assert!(sut.ss_gi > 0.0);
        assert_approx_eq!(f32, sut.gi, sut.fs_gi + sut.ss_gi);
    }

    #[test]
    fn sub_pools_bounded_by_layer() {
        let mut inhib = InhibParams::default();
        inhib.pool.on = true;

        let mut pools = vec![
            Pool::new(0, true, 0, 8),
            Pool::new(0, false, 0, 4),
            Pool::new(0, false, 4, 8),
        ];
        pools[0].inhib.ffs = 1.0;
        pools[1].inhib.ffs = 2.0;
        pools[2].inhib.ffs = 0.2;

        inhibit_layer(&mut pools, &inhib);
        let layer_gi = pools[0].inhib.gi;
        assert!(layer_gi > 0.0);
        assert!(pools[1].inhib.gi > layer_gi);
        assert_approx_eq!(f32, pools[2].inhib.gi, layer_gi);
    }

    #[test]
    fn layer_pool_carries_max_of_free_sub_pools() {
        let mut inhib = InhibParams::default();
        inhib.layer.on = false;
        inhib.pool.on = true;

        let mut pools = vec![
            Pool::new(0, true, 0, 8),
            Pool::new(0, false, 0, 4),
            Pool::new(0, false, 4, 8),
        ];
        pools[0].inhib.ffs = 5.0;
        pools[1].inhib.ffs = 0.3;
        pools[2].inhib.ffs = 0.9;

        inhibit_layer(&mut pools, &inhib);
        assert!(pools[2].inhib.gi > pools[1].inhib.gi);
        assert_approx_eq!(f32, pools[0].inhib.gi, pools[2].inhib.gi);
    }
}
