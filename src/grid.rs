//! Network model shared between the dispatch engine and the dynamic simulator.
//!
//! All power quantities are per-unit on the system base (`base_mva`).

use std::fmt;

use serde::Deserialize;

/// Primary energy source of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fuel {
    Thermal,
    Hydro,
    Wind,
    Solar,
    Storage,
}

impl Fuel {
    /// Wind, solar, and storage output is fixed by forecast rather than dispatched.
    pub fn is_must_take(self) -> bool {
        matches!(self, Fuel::Wind | Fuel::Solar | Fuel::Storage)
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Fuel::Thermal => "thermal",
            Fuel::Hydro => "hydro",
            Fuel::Wind => "wind",
            Fuel::Solar => "solar",
            Fuel::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// A static generator as seen by the dispatch engine.
#[derive(Debug, Clone)]
pub struct Generator {
    pub id: String,
    pub fuel: Fuel,
    /// Nameplate capacity (pu).
    pub capacity: f64,
    /// Minimum output when online (pu).
    pub pmin: f64,
    /// Maximum output (pu).
    pub pmax: f64,
    /// Linear cost ($/pu-h).
    pub cost: f64,
    /// Commitment status.
    pub online: bool,
    /// Whether the dispatch engine may move this unit.
    pub controllable: bool,
    /// Scheduled output (pu). For must-take units this is the forecast output.
    pub p0: f64,
    /// Whether this unit is the slack (reference) machine.
    pub slack: bool,
}

/// A constant-power load.
#[derive(Debug, Clone)]
pub struct Load {
    pub id: String,
    /// Active power (pu).
    pub p0: f64,
    /// Reactive power (pu).
    pub q0: f64,
}

/// Generator and load inventory on a common MVA base.
#[derive(Debug, Clone)]
pub struct Network {
    pub base_mva: f64,
    pub generators: Vec<Generator>,
    pub loads: Vec<Load>,
}

impl Network {
    pub fn new(base_mva: f64, generators: Vec<Generator>, loads: Vec<Load>) -> Self {
        Self {
            base_mva,
            generators,
            loads,
        }
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn generator_mut(&mut self, id: &str) -> Option<&mut Generator> {
        self.generators.iter_mut().find(|g| g.id == id)
    }

    /// Ids of generators whose fuel matches `fuel`.
    pub fn generators_by_fuel(&self, fuel: Fuel) -> Vec<String> {
        self.generators
            .iter()
            .filter(|g| g.fuel == fuel)
            .map(|g| g.id.clone())
            .collect()
    }

    /// The slack generator, falling back to the largest online unit.
    pub fn slack(&self) -> Option<&Generator> {
        self.generators.iter().find(|g| g.slack).or_else(|| {
            self.generators
                .iter()
                .filter(|g| g.online)
                .max_by(|a, b| a.capacity.total_cmp(&b.capacity))
        })
    }

    /// Total active load (pu).
    pub fn total_load(&self) -> f64 {
        self.loads.iter().map(|l| l.p0).sum()
    }

    /// Sets every generator's minimum output to zero to widen the feasible region.
    pub fn relax_min_output(&mut self) {
        for g in &mut self.generators {
            g.pmin = 0.0;
        }
    }

    /// Marks wind, solar, and storage units as non-dispatchable.
    pub fn fix_must_take_units(&mut self) {
        for g in &mut self.generators {
            if g.fuel.is_must_take() {
                g.controllable = false;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn generator(id: &str, fuel: Fuel, capacity: f64, cost: f64) -> Generator {
        Generator {
            id: id.to_string(),
            fuel,
            capacity,
            pmin: 0.1 * capacity,
            pmax: capacity,
            cost,
            online: true,
            controllable: !fuel.is_must_take(),
            p0: 0.0,
            slack: false,
        }
    }

    /// Two thermal units, one hydro, one wind farm, one load of 3.0 pu.
    pub fn small_network() -> Network {
        let mut g1 = generator("G1", Fuel::Thermal, 3.0, 20.0);
        g1.slack = true;
        let g2 = generator("G2", Fuel::Thermal, 2.0, 35.0);
        let g3 = generator("G3", Fuel::Hydro, 1.0, 5.0);
        let mut w1 = generator("W1", Fuel::Wind, 1.0, 0.0);
        w1.p0 = 0.5;
        Network::new(
            100.0,
            vec![g1, g2, g3, w1],
            vec![Load {
                id: "L1".to_string(),
                p0: 3.0,
                q0: 1.0,
            }],
        )
    }
}
