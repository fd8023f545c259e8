//! Merit-order economic dispatch used as a stand-in optimization engine.

use std::collections::{BTreeMap, BTreeSet};

use crate::grid::{Fuel, Network};
use crate::sim::collaborator::{DispatchEngine, DispatchOutcome, Formulation, IntervalForecast};

const FEASIBILITY_TOL: f64 = 1e-9;

/// Single-bus economic dispatch with linear costs.
///
/// Must-take units (wind, solar, storage) keep their forecast output,
/// curtailed proportionally when they alone would push the controllable
/// fleet below its minimum. Controllable units start at `pmin` and are
/// filled in ascending cost order. The AC formulation adds a fixed loss
/// fraction on top of demand.
#[derive(Debug, Clone)]
pub struct MeritOrderDispatch {
    network: Network,
    base_loads: Vec<(f64, f64)>,
    base_output: Vec<f64>,
    ac_loss_factor: f64,
}

impl MeritOrderDispatch {
    pub fn new(network: Network) -> Self {
        let base_loads = network.loads.iter().map(|l| (l.p0, l.q0)).collect();
        let base_output = network.generators.iter().map(|g| g.p0).collect();
        Self {
            network,
            base_loads,
            base_output,
            ac_loss_factor: 0.0,
        }
    }

    /// Sets the loss fraction added to demand under [`Formulation::Ac`].
    pub fn with_ac_loss_factor(mut self, factor: f64) -> Self {
        self.ac_loss_factor = factor.max(0.0);
        self
    }

    fn demand(&self, formulation: Formulation) -> f64 {
        let load = self.network.total_load();
        match formulation {
            Formulation::Dc => load,
            Formulation::Ac => load * (1.0 + self.ac_loss_factor),
        }
    }
}

impl DispatchEngine for MeritOrderDispatch {
    fn network(&self) -> &Network {
        &self.network
    }

    fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    fn update_forecast(&mut self, forecast: &IntervalForecast) {
        for (load, &(p, q)) in self.network.loads.iter_mut().zip(&self.base_loads) {
            load.p0 = p * forecast.load;
            load.q0 = q * forecast.load;
        }
        for (g, &p) in self.network.generators.iter_mut().zip(&self.base_output) {
            let factor = match g.fuel {
                Fuel::Wind => forecast.wind,
                Fuel::Solar => forecast.pv,
                _ => continue,
            };
            g.p0 = (p * factor).clamp(0.0, g.pmax);
        }
    }

    fn solve(&mut self, formulation: Formulation) -> DispatchOutcome {
        let demand = self.demand(formulation);
        let gens = &mut self.network.generators;

        for g in gens.iter_mut().filter(|g| !g.online) {
            g.p0 = 0.0;
        }

        let is_renewable = |fuel: Fuel| matches!(fuel, Fuel::Wind | Fuel::Solar);
        let mut fixed = 0.0;
        let mut renewables = 0.0;
        let mut pmin_sum = 0.0;
        let mut pmax_sum = 0.0;
        for g in gens.iter().filter(|g| g.online) {
            if g.controllable {
                pmin_sum += g.pmin;
                pmax_sum += g.pmax;
            } else if is_renewable(g.fuel) {
                renewables += g.p0;
            } else {
                fixed += g.p0;
            }
        }

        // curtail renewables that leave no room for controllable minimums
        let room = demand - fixed - pmin_sum;
        if renewables > 0.0 && renewables > room {
            let scale = (room / renewables).clamp(0.0, 1.0);
            for g in gens
                .iter_mut()
                .filter(|g| g.online && !g.controllable && is_renewable(g.fuel))
            {
                g.p0 *= scale;
            }
            renewables *= scale;
        }

        let residual = demand - fixed - renewables;
        if residual < pmin_sum - FEASIBILITY_TOL || residual > pmax_sum + FEASIBILITY_TOL {
            return DispatchOutcome {
                setpoints: BTreeMap::new(),
                objective: 0.0,
                converged: false,
            };
        }

        let mut order: Vec<usize> = (0..gens.len())
            .filter(|&i| gens[i].online && gens[i].controllable)
            .collect();
        order.sort_by(|&a, &b| {
            gens[a]
                .cost
                .total_cmp(&gens[b].cost)
                .then_with(|| gens[a].id.cmp(&gens[b].id))
        });

        let mut remaining = residual - pmin_sum;
        for &i in &order {
            gens[i].p0 = gens[i].pmin;
        }
        for &i in &order {
            let headroom = gens[i].pmax - gens[i].pmin;
            let extra = remaining.clamp(0.0, headroom);
            gens[i].p0 += extra;
            remaining -= extra;
        }

        let setpoints: BTreeMap<String, f64> = gens
            .iter()
            .filter(|g| g.online)
            .map(|g| (g.id.clone(), g.p0))
            .collect();
        let objective: f64 = gens.iter().filter(|g| g.online).map(|g| g.cost * g.p0).sum();

        DispatchOutcome {
            setpoints,
            objective,
            converged: true,
        }
    }

    fn online_generators(&self) -> BTreeSet<String> {
        self.network
            .generators
            .iter()
            .filter(|g| g.online)
            .map(|g| g.id.clone())
            .collect()
    }
}
