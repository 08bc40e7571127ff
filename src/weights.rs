//! JSON weight files. Layers hold per-unit target activity and, for every incoming
//! projection, one record per receiving neuron listing its senders with the effective and
//! structural weights.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use simple_error::{try_with, SimpleError, SimpleResult};

use crate::network::Network;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkWeights {
    pub network: String,
    pub layers: Vec<LayerWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerWeights {
    pub layer: String,
    #[serde(default)]
    pub meta_data: BTreeMap<String, String>,
    #[serde(default)]
    pub units: UnitWeights,
    #[serde(default)]
    pub prjns: Vec<PrjnWeights>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitWeights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trg_avg: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrjnWeights {
    pub from: String,
    #[serde(default)]
    pub meta_data: BTreeMap<String, String>,
    pub rs: Vec<RecvWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecvWeights {
    #[serde(rename = "Ri")]
    pub ri: usize,
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "Si")]
    pub si: Vec<usize>,
    #[serde(rename = "Wt")]
    pub wt: Vec<f32>,
    #[serde(rename = "Wt1", default, skip_serializing_if = "Option::is_none")]
    pub wt1: Option<Vec<f32>>,
}

/// Validated changes, applied only after the whole file has been checked.
struct LoadPlan {
    trg_avgs: Vec<(usize, f32)>,
    wts: Vec<(usize, usize, f32, Option<f32>)>,
}

impl Network {
    pub fn weights(&self) -> NetworkWeights {
        let topo = &self.topology;
        let layers = topo
            .layers
            .iter()
            .map(|layer| {
                let neurons = &self.state.neurons[layer.nrn_range.clone()];

                let mut meta_data = BTreeMap::new();
                meta_data.insert(
                    "ActAvg".to_string(),
                    self.state.pools[layer.layer_pool()].act_avg_mean.to_string(),
                );

                let prjns = layer
                    .recv_prjns
                    .iter()
                    .map(|&prjn_idx| {
                        let prjn = &topo.projections[prjn_idx];
                        let send_start = topo.layers[prjn.send_layer].nrn_range.start;

                        let rs = prjn
                            .recv_con
                            .iter()
                            .enumerate()
                            .map(|(ri, &(start, n))| {
                                let syns = &self.state.synapses
                                    [start as usize..(start + n) as usize];
                                RecvWeights {
                                    ri,
                                    n: syns.len(),
                                    si: syns
                                        .iter()
                                        .map(|syn| syn.send_idx as usize - send_start)
                                        .collect(),
                                    wt: syns.iter().map(|syn| syn.wt).collect(),
                                    wt1: Some(syns.iter().map(|syn| syn.swt).collect()),
                                }
                            })
                            .collect();

                        let mut meta_data = BTreeMap::new();
                        meta_data.insert("GScale".to_string(), prjn.g_scale.to_string());

                        PrjnWeights {
                            from: topo.layers[prjn.send_layer].name().to_string(),
                            meta_data,
                            rs,
                        }
                    })
                    .collect();

                LayerWeights {
                    layer: layer.name().to_string(),
                    meta_data,
                    units: UnitWeights {
                        trg_avg: Some(neurons.iter().map(|nrn| nrn.trg_avg).collect()),
                    },
                    prjns,
                }
            })
            .collect();

        NetworkWeights {
            network: topo.name.clone(),
            layers,
        }
    }

    pub fn save_weights_json<W: Write>(&self, writer: W) -> SimpleResult<()> {
        try_with!(
            serde_json::to_writer_pretty(writer, &self.weights()),
            "failed to write weights"
        );
        Ok(())
    }

    pub fn load_weights_json<R: Read>(&mut self, reader: R) -> SimpleResult<()> {
        let weights: NetworkWeights =
            try_with!(serde_json::from_reader(reader), "failed to parse weights");
        self.set_weights(&weights)
    }

    /// Applies a weight file. Layers and projections absent from this network are skipped;
    /// any other inconsistency rejects the whole file without changing the network.
    pub fn set_weights(&mut self, weights: &NetworkWeights) -> SimpleResult<()> {
        let plan = self.plan_load(weights)?;

        for (nrn_idx, trg_avg) in plan.trg_avgs {
            self.state.neurons[nrn_idx].trg_avg = trg_avg;
        }

        for (prjn_idx, syn_idx, wt, swt) in plan.wts {
            let params = &self.topology.projections[prjn_idx].params.swt;
            let syn = &mut self.state.synapses[syn_idx];
            match swt {
                Some(swt) => params.set_wts(syn, wt, swt),
                None => params.set_wt(syn, wt),
            }
        }

        log::info!("loaded weights of network {}", weights.network);
        Ok(())
    }

    fn plan_load(&self, weights: &NetworkWeights) -> SimpleResult<LoadPlan> {
        let topo = &self.topology;
        let mut plan = LoadPlan {
            trg_avgs: Vec::new(),
            wts: Vec::new(),
        };

        for lw in &weights.layers {
            let layer = match topo.layer_by_name(&lw.layer) {
                Some(layer) => layer,
                None => {
                    log::warn!("skipping weights of unknown layer {}", lw.layer);
                    continue;
                }
            };

            if let Some(trg_avg) = &lw.units.trg_avg {
                if trg_avg.len() != layer.num_neurons() {
                    return Err(SimpleError::new(format!(
                        "layer {}: {} target averages for {} neurons",
                        lw.layer,
                        trg_avg.len(),
                        layer.num_neurons()
                    )));
                }
                plan.trg_avgs
                    .extend(layer.nrn_range.clone().zip(trg_avg.iter().copied()));
            }

            for pw in &lw.prjns {
                let prjn_idx = match topo.projection_idx(&pw.from, &lw.layer) {
                    Some(prjn_idx) => prjn_idx,
                    None => {
                        log::warn!(
                            "skipping weights of unknown projection from {} to {}",
                            pw.from,
                            lw.layer
                        );
                        continue;
                    }
                };
                let prjn = &topo.projections[prjn_idx];
                let send_range = topo.layers[prjn.send_layer].nrn_range.clone();

                for rw in &pw.rs {
                    let ctx = || format!("projection from {} to {}, unit {}", pw.from, lw.layer, rw.ri);

                    let &(start, n) = prjn.recv_con.get(rw.ri).ok_or_else(|| {
                        SimpleError::new(format!("{}: no such receiving unit", ctx()))
                    })?;

                    let wt1_len = rw.wt1.as_ref().map_or(rw.n, Vec::len);
                    if rw.si.len() != rw.n || rw.wt.len() != rw.n || wt1_len != rw.n {
                        return Err(SimpleError::new(format!(
                            "{}: inconsistent record lengths",
                            ctx()
                        )));
                    }

                    let syns = &self.state.synapses[start as usize..(start + n) as usize];

                    for (k, &si) in rw.si.iter().enumerate() {
                        let wt = rw.wt[k];
                        let swt = rw.wt1.as_ref().map(|wt1| wt1[k]);
                        if !wt.is_finite() || swt.map_or(false, |swt| !swt.is_finite()) {
                            return Err(SimpleError::new(format!(
                                "{}: non-finite weight",
                                ctx()
                            )));
                        }

                        if si >= send_range.len() {
                            return Err(SimpleError::new(format!(
                                "{}: sending unit {} out of range",
                                ctx(),
                                si
                            )));
                        }

                        let send_idx = (send_range.start + si) as u32;
                        let offset = syns
                            .binary_search_by_key(&send_idx, |syn| syn.send_idx)
                            .map_err(|_| {
                                SimpleError::new(format!(
                                    "{}: not connected to sending unit {}",
                                    ctx(),
                                    si
                                ))
                            })?;

                        plan.wts
                            .push((prjn_idx, start as usize + offset, wt, swt));
                    }
                }
            }
        }

        Ok(plan)
    }
}
