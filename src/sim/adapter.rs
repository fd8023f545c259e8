//! Plumbing between dispatch results, exogenous curves, and the simulator.

use crate::curve::CurveRow;
use crate::grid::{Fuel, Network};

use super::collaborator::{DispatchOutcome, DynamicSimulator, IntervalForecast};

#[derive(Debug, Clone, PartialEq)]
struct BaseLoad {
    id: String,
    p: f64,
    q: f64,
}

/// Base values captured at loop start, scaled by curve multipliers each second.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorInputs {
    loads: Vec<BaseLoad>,
    wind: Vec<(String, f64)>,
    solar: Vec<(String, f64)>,
}

impl SimulatorInputs {
    /// Captures load and renewable base values from `network`.
    pub fn capture(network: &Network) -> Self {
        let loads = network
            .loads
            .iter()
            .map(|l| BaseLoad {
                id: l.id.clone(),
                p: l.p0,
                q: l.q0,
            })
            .collect();
        let base_of = |fuel: Fuel| -> Vec<(String, f64)> {
            network
                .generators
                .iter()
                .filter(|g| g.fuel == fuel)
                .map(|g| (g.id.clone(), g.p0))
                .collect()
        };
        Self {
            loads,
            wind: base_of(Fuel::Wind),
            solar: base_of(Fuel::Solar),
        }
    }

    /// Writes the curve sample for the current second.
    ///
    /// Loads always follow `row.load`. Wind and solar references follow
    /// their multipliers only when `renewables` is set.
    pub fn push_second<S: DynamicSimulator + ?Sized>(&self, sim: &mut S, row: CurveRow, renewables: bool) {
        for l in &self.loads {
            sim.set_load(&l.id, row.load * l.p, row.load * l.q);
        }
        if renewables {
            for (id, p0) in &self.wind {
                sim.set_generator_reference(id, row.wind * p0);
            }
            for (id, p0) in &self.solar {
                sim.set_generator_reference(id, row.pv * p0);
            }
        }
    }
}

/// Writes every dispatch setpoint as a generator reference.
pub fn push_setpoints<S: DynamicSimulator + ?Sized>(sim: &mut S, outcome: &DispatchOutcome) {
    for (id, p) in &outcome.setpoints {
        sim.set_generator_reference(id, *p);
    }
}

/// Builds the forecast handed to the dispatch engine.
pub fn forecast(hour: usize, interval: usize, mean: CurveRow) -> IntervalForecast {
    IntervalForecast {
        hour,
        interval,
        load: mean.load,
        pv: mean.pv,
        wind: mean.wind,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::grid::fixtures::small_network;
    use crate::sim::collaborator::{ControlKind, ControlLink};

    #[derive(Default)]
    struct Recorder {
        loads: BTreeMap<String, (f64, f64)>,
        refs: BTreeMap<String, f64>,
    }

    impl DynamicSimulator for Recorder {
        fn initialize(&mut self) -> bool {
            true
        }
        fn step(&mut self, _until: f64) -> i32 {
            0
        }
        fn time(&self) -> f64 {
            0.0
        }
        fn frequency(&self) -> f64 {
            1.0
        }
        fn area_error(&self) -> f64 {
            0.0
        }
        fn device_current(&self, _id: &str) -> Option<f64> {
            None
        }
        fn control_links(&self) -> Vec<ControlLink> {
            Vec::new()
        }
        fn set_load(&mut self, id: &str, p: f64, q: f64) {
            self.loads.insert(id.to_string(), (p, q));
        }
        fn set_generator_reference(&mut self, id: &str, p: f64) {
            self.refs.insert(id.to_string(), p);
        }
        fn set_control_signal(&mut self, _kind: ControlKind, _id: &str, _value: f64) {}
    }

    #[test]
    fn loads_scale_with_factor() {
        let inputs = SimulatorInputs::capture(&small_network());
        let mut sim = Recorder::default();
        let row = CurveRow {
            load: 0.9,
            pv: 1.0,
            wind: 0.5,
        };
        inputs.push_second(&mut sim, row, false);
        let (p, q) = sim.loads["L1"];
        assert!((p - 2.7).abs() < 1e-12);
        assert!((q - 0.9).abs() < 1e-12);
        assert!(sim.refs.is_empty());

        inputs.push_second(&mut sim, row, true);
        assert_eq!(sim.refs.get("W1"), Some(&0.25));
    }

    #[test]
    fn setpoints_become_references() {
        let mut sim = Recorder::default();
        let outcome = DispatchOutcome {
            setpoints: BTreeMap::from([("G1".to_string(), 1.2), ("G2".to_string(), 0.4)]),
            objective: 0.0,
            converged: true,
        };
        push_setpoints(&mut sim, &outcome);
        assert_eq!(sim.refs.len(), 2);
        assert_eq!(sim.refs.get("G2"), Some(&0.4));
    }
}
