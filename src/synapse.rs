use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::SWtParams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub recv_idx: u32,
    pub send_idx: u32,
    pub prjn_idx: u32,
    /// Cycle through which the calcium cascade has been advanced.
    pub ca_up_t: i64,
    pub wt: f32,
    pub lwt: f32,
    pub swt: f32,
    pub dwt: f32,
    pub dswt: f32,
    pub ca_m: f32,
    pub ca_p: f32,
    pub ca_d: f32,
    pub tr: f32,
}

impl Synapse {
    pub fn new(recv_idx: u32, send_idx: u32, prjn_idx: u32) -> Self {
        Self {
            recv_idx,
            send_idx,
            prjn_idx,
            ca_up_t: -1,
            ..Self::default()
        }
    }

    pub fn reset_ca(&mut self) {
        self.ca_up_t = -1;
        self.ca_m = 0.0;
        self.ca_p = 0.0;
        self.ca_d = 0.0;
        self.tr = 0.0;
        self.dwt = 0.0;
    }
}

/// Sigmoidal contrast function on [0, 1].
pub fn sig_fun(w: f32, gain: f32, off: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    1.0 / (1.0 + ((off * (1.0 - w)) / w).powf(gain))
}

pub fn sig_fun_inv(w: f32, gain: f32, off: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    1.0 / (1.0 + ((1.0 - w) / w).powf(1.0 / gain) / off)
}

impl SWtParams {
    /// Maps a linear weight in [0, 1] to the sigmoidal range [0, 2].
    pub fn sig_from_lin_wt(&self, lwt: f32) -> f32 {
        let gain = self.adapt.sig_gain;
        if gain == 1.0 {
            return 2.0 * lwt;
        }
        2.0 * sig_fun(lwt, gain, 1.0)
    }

    pub fn lin_from_sig_wt(&self, wt: f32) -> f32 {
        let wt = 0.5 * wt;
        let gain = self.adapt.sig_gain;
        if gain == 1.0 {
            return wt;
        }
        sig_fun_inv(wt, gain, 1.0)
    }

    pub fn wt_val(&self, swt: f32, lwt: f32) -> f32 {
        swt * self.sig_from_lin_wt(lwt)
    }

    pub fn lwt_from_wts(&self, wt: f32, swt: f32) -> f32 {
        if swt <= 0.0 {
            return 0.0;
        }
        self.lin_from_sig_wt(wt / swt).clamp(0.0, 1.0)
    }

    /// Initial weights: a uniform deviation around the mean, shared in part (`spct`) by
    /// the structural weight. `spct_override` forces a non-varying structural weight.
    pub fn init_syn<R: Rng>(&self, syn: &mut Synapse, spct_override: Option<f32>, rng: &mut R) {
        let spct = spct_override.unwrap_or(self.init.spct);
        let wtv = self.init.var * (2.0 * rng.gen::<f32>() - 1.0);
        let wt = self.init.mean + wtv;

        syn.swt = self.limit.clip(self.init.mean + spct * wtv);
        syn.lwt = self.lwt_from_wts(wt, syn.swt);
        syn.wt = self.wt_val(syn.swt, syn.lwt);
        syn.dwt = 0.0;
        syn.dswt = 0.0;
    }

    /// Replaces the effective weight, keeping the structural weight and recomputing
    /// the linear one.
    pub fn set_wt(&self, syn: &mut Synapse, wt: f32) {
        syn.lwt = self.lwt_from_wts(wt, syn.swt);
        syn.wt = wt.clamp(0.0, 2.0 * syn.swt);
    }

    pub fn set_wts(&self, syn: &mut Synapse, wt: f32, swt: f32) {
        syn.swt = swt;
        self.set_wt(syn, wt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn sigmoid_inverse() {
        let params = SWtParams::default();
        for lwt in [0.05, 0.3, 0.5, 0.77, 0.95] {
            let wt = params.sig_from_lin_wt(lwt);
            assert_approx_eq!(f32, params.lin_from_sig_wt(wt), lwt, epsilon = 1.0e-5);
        }
        assert_approx_eq!(f32, params.sig_from_lin_wt(0.5), 1.0);
        assert_eq!(params.sig_from_lin_wt(0.0), 0.0);
        assert_eq!(params.sig_from_lin_wt(1.0), 2.0);
    }

    #[test]
    fn linear_gain() {
        let mut params = SWtParams::default();
        params.adapt.sig_gain = 1.0;
        assert_approx_eq!(f32, params.sig_from_lin_wt(0.3), 0.6);
        assert_approx_eq!(f32, params.lin_from_sig_wt(0.6), 0.3);
    }

    #[test]
    fn init_within_bounds() {
        let params = SWtParams::default();
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..1000 {
            let mut sut = Synapse::new(0, 0, 0);
            params.init_syn(&mut sut, None, &mut rng);
            assert!(sut.swt >= params.limit.min && sut.swt <= params.limit.max);
            assert!(sut.lwt >= 0.0 && sut.lwt <= 1.0);
            assert!(sut.wt >= 0.0 && sut.wt <= 2.0 * params.limit.max);
            assert_approx_eq!(f32, sut.wt, params.wt_val(sut.swt, sut.lwt));
        }
    }

    #[test]
    fn init_without_structural_variance() {
        let params = SWtParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut sut = Synapse::new(0, 0, 0);
        params.init_syn(&mut sut, Some(0.0), &mut rng);
        assert_approx_eq!(f32, sut.swt, params.init.mean);
    }

    #[test]
    fn set_wt_keeps_structural_weight() {
        let params = SWtParams::default();
        let mut sut = Synapse::new(0, 0, 0);
        sut.swt = 0.5;
        params.set_wt(&mut sut, 1.0);
        assert_approx_eq!(f32, sut.wt, 1.0);
        assert_approx_eq!(f32, sut.lwt, 1.0);
        assert_approx_eq!(f32, params.wt_val(sut.swt, sut.lwt), 1.0);

        params.set_wt(&mut sut, 0.5);
        assert_approx_eq!(f32, sut.lwt, 0.5, epsilon = 1.0e-6);
    }
}
