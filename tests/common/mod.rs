//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use agc_cosim::error::{CosimError, CosimResult};
use agc_cosim::grid::{Fuel, Generator, Load, Network};
use agc_cosim::sim::collaborator::{
    ControlKind, ControlLink, DispatchEngine, DispatchOutcome, DynamicSimulator, Formulation,
    IntervalForecast, SimulatorBuilder,
};
use agc_cosim::sim::types::LoopConfig;

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

/// Three synchronous units (6 pu), one 0.5 pu wind farm, a 3 pu load, and
/// an idle HVDC sending-end load `CONS`. Base 100 MVA.
pub fn small_network() -> Network {
    let mut g1 = generator("G1", Fuel::Thermal, 3.0, 20.0);
    g1.slack = true;
    let mut w1 = generator("W1", Fuel::Wind, 1.0, 0.0);
    w1.p0 = 0.5;
    Network::new(
        100.0,
        vec![
            g1,
            generator("G2", Fuel::Thermal, 2.0, 35.0),
            generator("G3", Fuel::Hydro, 1.0, 5.0),
            w1,
        ],
        vec![
            Load {
                id: "L1".to_string(),
                p0: 3.0,
                q0: 1.0,
            },
            Load {
                id: "CONS".to_string(),
                p0: 0.0,
                q0: 0.0,
            },
        ],
    )
}

/// One hour of `seconds`, dispatch every `dispatch_s`, AGC every 4 s.
pub fn short_loop(seconds: usize, dispatch_s: usize) -> LoopConfig {
    LoopConfig::new(1, seconds, dispatch_s, 4)
}

/// Dispatch engine returning the current schedule, optionally failing on one solve.
pub struct MockDispatch {
    pub network: Network,
    pub fail_on_solve: Option<usize>,
    pub solves: Rc<Cell<usize>>,
    pub forecasts: Rc<RefCell<Vec<IntervalForecast>>>,
}

impl MockDispatch {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            fail_on_solve: None,
            solves: Rc::new(Cell::new(0)),
            forecasts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Fails the `n`th solve (zero-based).
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_solve = Some(n);
        self
    }
}

impl DispatchEngine for MockDispatch {
    fn network(&self) -> &Network {
        &self.network
    }

    fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    fn update_forecast(&mut self, forecast: &IntervalForecast) {
        self.forecasts.borrow_mut().push(*forecast);
    }

    fn solve(&mut self, _formulation: Formulation) -> DispatchOutcome {
        let n = self.solves.get();
        self.solves.set(n + 1);
        DispatchOutcome {
            setpoints: self
                .network
                .generators
                .iter()
                .map(|g| (g.id.clone(), g.p0))
                .collect(),
            objective: 0.0,
            converged: self.fail_on_solve != Some(n),
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

/// Observations shared between a [`MockBuilder`] and the test.
#[derive(Default)]
pub struct Probe {
    pub builds: Cell<usize>,
    pub steps: Cell<usize>,
    pub time_reads: Cell<usize>,
    /// `(steps taken so far, kind, generator, value)` for every control write.
    pub signals: RefCell<Vec<(usize, ControlKind, String, f64)>>,
    pub loads: RefCell<BTreeMap<String, (f64, f64)>>,
}

/// Simulator with scripted behaviour.
pub struct MockSimulator {
    probe: Rc<Probe>,
    init_ok: bool,
    exit_on_step: Option<(usize, i32)>,
    area_error: f64,
    t: f64,
}

impl DynamicSimulator for MockSimulator {
    fn initialize(&mut self) -> bool {
        self.init_ok
    }

    fn step(&mut self, until: f64) -> i32 {
        let n = self.probe.steps.get() + 1;
        self.probe.steps.set(n);
        self.t = until;
        match self.exit_on_step {
            Some((at, code)) if at == n => code,
            _ => 0,
        }
    }

    fn time(&self) -> f64 {
        self.probe.time_reads.set(self.probe.time_reads.get() + 1);
        self.t
    }

    fn frequency(&self) -> f64 {
        1.0
    }

    fn area_error(&self) -> f64 {
        self.area_error
    }

    fn device_current(&self, _id: &str) -> Option<f64> {
        None
    }

    fn control_links(&self) -> Vec<ControlLink> {
        ["G1", "G2", "G3"]
            .into_iter()
            .map(|id| ControlLink {
                generator: id.to_string(),
                kinds: BTreeSet::from([ControlKind::Governor]),
            })
            .collect()
    }

    fn set_load(&mut self, id: &str, p: f64, q: f64) {
        self.probe.loads.borrow_mut().insert(id.to_string(), (p, q));
    }

    fn set_generator_reference(&mut self, _id: &str, _p: f64) {}

    fn set_control_signal(&mut self, kind: ControlKind, id: &str, value: f64) {
        self.probe
            .signals
            .borrow_mut()
            .push((self.probe.steps.get(), kind, id.to_string(), value));
    }
}

pub struct MockBuilder {
    pub probe: Rc<Probe>,
    pub init_ok: bool,
    pub exit_on_step: Option<(usize, i32)>,
    pub area_error: f64,
    pub fail_build: bool,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self {
            probe: Rc::new(Probe::default()),
            init_ok: true,
            exit_on_step: None,
            area_error: 0.0,
            fail_build: false,
        }
    }
}

impl SimulatorBuilder for MockBuilder {
    type Simulator = MockSimulator;

    fn build(&mut self, _network: &Network) -> CosimResult<MockSimulator> {
        if self.fail_build {
            return Err(CosimError::Build("scripted failure".to_string()));
        }
        self.probe.builds.set(self.probe.builds.get() + 1);
        Ok(MockSimulator {
            probe: self.probe.clone(),
            init_ok: self.init_ok,
            exit_on_step: self.exit_on_step,
            area_error: self.area_error,
            t: 0.0,
        })
    }
}
