//! Single-area aggregate swing-equation simulator.
//!
//! Every online unit feeds one common rotor:
//!
//! ```text
//! 2 * sum(H * cap) * dw/dt = sum(pm) + sum(pext) - sum(pload * v^alpha) - D * dw
//! ```
//!
//! Synchronous units follow their reference through a first-order governor
//! with droop; inverter-based units track their reference instantaneously.
//! The integrator is explicit Euler with a fixed step.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{CosimError, CosimResult};
use crate::grid::{Fuel, Network};
use crate::pert::{ExternalInputs, Field, Measurements, SharedPerturbation, apply_all};
use crate::sim::collaborator::{ControlKind, ControlLink, DynamicSimulator, SimulatorBuilder};

/// Exit code for a diverged or out-of-band integration.
pub const EXIT_DIVERGED: i32 = 1;
/// Exit code for stepping before a successful initialization.
pub const EXIT_NOT_INITIALIZED: i32 = 2;

/// Dynamic model of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineModel {
    /// Rotating machine with inertia and a droop governor.
    Synchronous,
    /// Distributed-generation inverter (storage and small DER).
    DistributedInverter,
    /// Renewable-generation inverter (wind and solar plants).
    RenewableInverter,
}

impl MachineModel {
    pub fn for_fuel(fuel: Fuel) -> Self {
        match fuel {
            Fuel::Thermal | Fuel::Hydro => MachineModel::Synchronous,
            Fuel::Wind | Fuel::Solar => MachineModel::RenewableInverter,
            Fuel::Storage => MachineModel::DistributedInverter,
        }
    }

    pub fn control_kind(self) -> ControlKind {
        match self {
            MachineModel::Synchronous => ControlKind::Governor,
            MachineModel::DistributedInverter => ControlKind::DistributedInverter,
            MachineModel::RenewableInverter => ControlKind::RenewableInverter,
        }
    }
}

/// Per-generator dynamic parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineData {
    pub model: MachineModel,
    /// Inertia constant (s).
    pub inertia_h: f64,
    /// Governor droop (pu).
    pub droop: f64,
    /// Governor time constant (s).
    pub governor_tc: f64,
}

impl MachineData {
    pub fn for_fuel(fuel: Fuel) -> Self {
        let model = MachineModel::for_fuel(fuel);
        Self {
            model,
            inertia_h: if model == MachineModel::Synchronous { 4.0 } else { 0.0 },
            droop: 0.05,
            governor_tc: 0.5,
        }
    }
}

/// System-wide parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SwingParams {
    /// Load damping (pu power per pu speed).
    pub damping: f64,
    /// Area error per pu speed deviation.
    pub frequency_bias: f64,
    /// Integration step (s).
    pub step_size: f64,
    /// Largest tolerated speed deviation (pu) before the run is declared diverged.
    pub freq_limit: f64,
    /// Exponent of load voltage dependence. Zero is constant power.
    pub load_voltage_exponent: f64,
    /// Nominal frequency (Hz) reported to perturbations.
    pub nominal_hz: f64,
}

impl Default for SwingParams {
    fn default() -> Self {
        Self {
            damping: 1.0,
            frequency_bias: 20.0,
            step_size: 0.05,
            freq_limit: 0.1,
            load_voltage_exponent: 0.0,
            nominal_hz: 60.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Unit {
    id: String,
    data: MachineData,
    capacity: f64,
    online: bool,
    signal: f64,
    pm: f64,
}

/// Builds an [`AggregateSwing`] from the dispatch network.
///
/// Perturbation hooks are shared with every simulator built, so hook state
/// survives the hourly rebuild.
#[derive(Clone, Default)]
pub struct AggregateSwingBuilder {
    params: SwingParams,
    machines: BTreeMap<String, MachineData>,
    hooks: Vec<SharedPerturbation>,
}

impl AggregateSwingBuilder {
    pub fn new(params: SwingParams) -> Self {
        Self {
            params,
            machines: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }

    /// Overrides the fuel-based defaults for one generator.
    pub fn with_machine(mut self, id: &str, data: MachineData) -> Self {
        self.machines.insert(id.to_string(), data);
        self
    }

    pub fn with_hook(mut self, hook: SharedPerturbation) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn params(&self) -> &SwingParams {
        &self.params
    }
}

impl SimulatorBuilder for AggregateSwingBuilder {
    type Simulator = AggregateSwing;

    fn build(&mut self, network: &Network) -> CosimResult<AggregateSwing> {
        let p = &self.params;
        if !(p.step_size > 0.0) {
            return Err(CosimError::Build(format!(
                "step size must be > 0, got {}",
                p.step_size
            )));
        }
        if !(p.freq_limit > 0.0) {
            return Err(CosimError::Build(format!(
                "frequency limit must be > 0, got {}",
                p.freq_limit
            )));
        }

        let mut inputs = ExternalInputs::new();
        for load in &network.loads {
            inputs.set_base(Field::LoadP, &load.id, load.p0);
            inputs.set_base(Field::LoadQ, &load.id, load.q0);
        }

        let mut units = Vec::with_capacity(network.generators.len());
        for g in &network.generators {
            let data = self
                .machines
                .get(&g.id)
                .copied()
                .unwrap_or_else(|| MachineData::for_fuel(g.fuel));
            if data.model == MachineModel::Synchronous
                && !(data.droop > 0.0 && data.governor_tc > 0.0 && data.inertia_h >= 0.0)
            {
                return Err(CosimError::Build(format!(
                    "generator {}: droop and governor time constant must be > 0",
                    g.id
                )));
            }

            let p0 = if g.online { g.p0 } else { 0.0 };
            inputs.set_base(Field::GenMechanical, &g.id, p0);
            inputs.set_base(Field::GenField, &g.id, 1.0);
            inputs.set_base(Field::GenStatus, &g.id, if g.online { 1.0 } else { 0.0 });
            if data.model == MachineModel::Synchronous {
                inputs.set_base(Field::ExciterVref, &g.id, 1.0);
            }
            if g.fuel == Fuel::Storage {
                inputs.set_base(Field::StoragePext, &g.id, 0.0);
            }

            units.push(Unit {
                id: g.id.clone(),
                data,
                capacity: g.capacity,
                online: g.online,
                signal: 0.0,
                pm: p0,
            });
        }

        Ok(AggregateSwing {
            params: self.params.clone(),
            slack: network.slack().map(|g| g.id.clone()),
            units,
            inputs,
            hooks: self.hooks.clone(),
            dw: 0.0,
            t: 0.0,
            initialized: false,
        })
    }
}

/// Aggregate single-area frequency model.
pub struct AggregateSwing {
    params: SwingParams,
    slack: Option<String>,
    units: Vec<Unit>,
    inputs: ExternalInputs,
    hooks: Vec<SharedPerturbation>,
    dw: f64,
    t: f64,
    initialized: bool,
}

impl AggregateSwing {
    /// Speed deviation (pu).
    pub fn speed_deviation(&self) -> f64 {
        self.dw
    }

    pub fn inputs(&self) -> &ExternalInputs {
        &self.inputs
    }

    /// Whether `id` is in service.
    pub fn is_online(&self, id: &str) -> bool {
        self.units.iter().any(|u| u.id == id && u.online)
    }

    fn inertia(&self) -> f64 {
        self.units
            .iter()
            .filter(|u| u.online && u.data.model == MachineModel::Synchronous)
            .map(|u| u.data.inertia_h * u.capacity)
            .sum()
    }

    /// System voltage seen by loads: one plus the mean exciter offset.
    fn voltage(&self) -> f64 {
        let offsets: Vec<f64> = self
            .units
            .iter()
            .filter(|u| u.online)
            .filter_map(|u| {
                let base = self.inputs.base(Field::ExciterVref, &u.id)?;
                let value = self.inputs.get(Field::ExciterVref, &u.id)?;
                Some(value - base)
            })
            .collect();
        if offsets.is_empty() {
            return 1.0;
        }
        1.0 + offsets.iter().sum::<f64>() / offsets.len() as f64
    }

    fn load_power(&self) -> f64 {
        let scale = self.voltage().powf(self.params.load_voltage_exponent);
        self.inputs.values_of(Field::LoadP).map(|(_, p)| p * scale).sum()
    }

    fn reference(&self, unit: &Unit) -> f64 {
        self.inputs.get(Field::GenMechanical, &unit.id).unwrap_or(0.0) + unit.signal
    }

    fn measurements(&self) -> Measurements {
        let v = self.voltage();
        Measurements {
            time: self.t,
            frequency: self.frequency(),
            nominal_hz: self.params.nominal_hz,
            voltage: v,
            area_error: self.area_error(),
            currents: self
                .units
                .iter()
                .map(|u| {
                    let i = if u.online { u.pm.abs() / v } else { 0.0 };
                    (u.id.clone(), i)
                })
                .collect(),
        }
    }

    /// Takes units whose status input dropped to zero out of service.
    fn refresh_topology(&mut self) {
        for u in &mut self.units {
            let status = self.inputs.get(Field::GenStatus, &u.id).unwrap_or(0.0);
            if u.online && status == 0.0 {
                u.online = false;
                u.pm = 0.0;
                u.signal = 0.0;
                tracing::info!("t={:.2}s: unit {} tripped", self.t, u.id);
            }
        }
    }

    fn substep(&mut self, h: f64) {
        let measurements = self.measurements();
        if apply_all(&self.hooks, self.t, &mut self.inputs, &measurements) {
            self.refresh_topology();
        }

        let dw = self.dw;
        let mut p_gen = 0.0;
        for k in 0..self.units.len() {
            if !self.units[k].online {
                continue;
            }
            let pref = self.reference(&self.units[k]);
            let u = &mut self.units[k];
            match u.data.model {
                MachineModel::Synchronous => {
                    let governor = pref - dw * u.capacity / u.data.droop;
                    u.pm += h * (governor - u.pm) / u.data.governor_tc;
                }
                MachineModel::DistributedInverter | MachineModel::RenewableInverter => {
                    u.pm = pref;
                }
            }
            p_gen += u.pm;
        }
        p_gen += self
            .inputs
            .values_of(Field::StoragePext)
            .map(|(_, p)| p)
            .sum::<f64>();

        let m = 2.0 * self.inertia();
        let imbalance = p_gen - self.load_power() - self.params.damping * dw;
        self.dw = if m > 0.0 { dw + h * imbalance / m } else { f64::NAN };
        self.t += h;
    }
}

impl DynamicSimulator for AggregateSwing {
    /// Balances the network with the slack unit and starts from rest.
    ///
    /// Fails if the slack would leave its capability range or if no
    /// synchronous inertia is online.
    fn initialize(&mut self) -> bool {
        let load = self.load_power();
        let generation: f64 = self
            .units
            .iter()
            .filter(|u| u.online)
            .map(|u| self.inputs.get(Field::GenMechanical, &u.id).unwrap_or(0.0))
            .sum();

        let Some(slack_id) = self.slack.clone() else {
            return false;
        };
        let Some(slack) = self.units.iter().find(|u| u.id == slack_id && u.online) else {
            return false;
        };
        let slack_p = self.inputs.get(Field::GenMechanical, &slack_id).unwrap_or(0.0)
            + (load - generation);
        if slack_p < -1e-9 || slack_p > slack.capacity + 1e-9 || self.inertia() <= 0.0 {
            return false;
        }
        self.inputs.set_base(Field::GenMechanical, &slack_id, slack_p);

        for k in 0..self.units.len() {
            let pm = if self.units[k].online {
                self.inputs.get(Field::GenMechanical, &self.units[k].id).unwrap_or(0.0)
            } else {
                0.0
            };
            self.units[k].pm = pm;
        }
        self.dw = 0.0;
        self.t = 0.0;
        self.initialized = true;
        true
    }

    fn step(&mut self, until: f64) -> i32 {
        if !self.initialized {
            return EXIT_NOT_INITIALIZED;
        }
        while self.t < until - 1e-9 {
            let h = self.params.step_size.min(until - self.t);
            self.substep(h);
            if !self.dw.is_finite() || self.dw.abs() > self.params.freq_limit {
                return EXIT_DIVERGED;
            }
        }
        0
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn frequency(&self) -> f64 {
        1.0 + self.dw
    }

    fn area_error(&self) -> f64 {
        self.params.frequency_bias * self.dw
    }

    fn device_current(&self, id: &str) -> Option<f64> {
        let u = self.units.iter().find(|u| u.id == id)?;
        Some(if u.online { u.pm.abs() / self.voltage() } else { 0.0 })
    }

    fn control_links(&self) -> Vec<ControlLink> {
        self.units
            .iter()
            .map(|u| ControlLink {
                generator: u.id.clone(),
                kinds: [u.data.model.control_kind()].into_iter().collect(),
            })
            .collect()
    }

    fn set_load(&mut self, id: &str, p: f64, q: f64) {
        if self.inputs.base(Field::LoadP, id).is_some() {
            self.inputs.set_base(Field::LoadP, id, p);
            self.inputs.set_base(Field::LoadQ, id, q);
        }
    }

    fn set_generator_reference(&mut self, id: &str, p: f64) {
        if self.inputs.base(Field::GenMechanical, id).is_some() {
            self.inputs.set_base(Field::GenMechanical, id, p);
        }
    }

    fn set_control_signal(&mut self, kind: ControlKind, id: &str, value: f64) {
        if let Some(u) = self
            .units
            .iter_mut()
            .find(|u| u.id == id && u.data.model.control_kind() == kind)
        {
            u.signal = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::grid::fixtures::small_network;
    use crate::pert::{CurrentRecorder, GeneratorTrip, InjectionStep, shared};

    fn built(builder: &mut AggregateSwingBuilder) -> AggregateSwing {
        match builder.build(&small_network()) {
            Ok(sim) => sim,
            Err(e) => panic!("build failed: {e}"),
        }
    }

    #[test]
    fn slack_balances_at_initialization() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        assert!(sim.initialize());
        // load 3.0, wind 0.5, slack G1 takes the rest
        assert_eq!(sim.inputs().get(Field::GenMechanical, "G1"), Some(2.5));
        assert_eq!(sim.step(10.0), 0);
        assert!(sim.speed_deviation().abs() < 1e-12);
        assert!((sim.time() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn step_before_initialize_fails() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        assert_eq!(sim.step(1.0), EXIT_NOT_INITIALIZED);
    }

    #[test]
    fn slack_out_of_range_fails_initialization() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        sim.set_load("L1", 10.0, 1.0);
        assert!(!sim.initialize());
    }

    #[test]
    fn load_increase_lowers_frequency_and_governors_arrest_it() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        assert!(sim.initialize());
        sim.set_load("L1", 3.1, 1.0);
        assert_eq!(sim.step(30.0), 0);
        // droop steady state: dw = -dP / (sum(cap / R) + D)
        let expected = -0.1 / (6.0 / 0.05 + 1.0);
        assert!(sim.frequency() < 1.0);
        assert!((sim.speed_deviation() - expected).abs() < 1e-6);
    }

    #[test]
    fn governor_signal_restores_frequency() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        assert!(sim.initialize());
        sim.set_load("L1", 3.1, 1.0);
        sim.set_control_signal(ControlKind::Governor, "G1", 0.1);
        // mismatched kind is ignored
        sim.set_control_signal(ControlKind::RenewableInverter, "G1", 5.0);
        assert_eq!(sim.step(60.0), 0);
        assert!(sim.speed_deviation().abs() < 1e-6);
    }

    #[test]
    fn large_imbalance_exits_nonzero() {
        let mut sim = built(&mut AggregateSwingBuilder::default());
        assert!(sim.initialize());
        sim.set_load("L1", 30.0, 1.0);
        assert_eq!(sim.step(30.0), EXIT_DIVERGED);
    }

    #[test]
    fn links_follow_machine_models() {
        let sim = built(&mut AggregateSwingBuilder::default());
        let links = sim.control_links();
        let kinds = |id: &str| {
            links
                .iter()
                .find(|l| l.generator == id)
                .map(|l| l.kinds.iter().copied().collect::<Vec<_>>())
        };
        assert_eq!(kinds("G1"), Some(vec![ControlKind::Governor]));
        assert_eq!(kinds("W1"), Some(vec![ControlKind::RenewableInverter]));
    }

    #[test]
    fn hooks_see_each_substep_and_change_loads() {
        let recorder = Rc::new(RefCell::new(CurrentRecorder::new(["G1"])));
        let mut builder = AggregateSwingBuilder::default()
            .with_hook(shared(InjectionStep::load_step(0.5, "L1", 3.1, 1.0)))
            .with_hook(recorder.clone());
        let mut sim = built(&mut builder);
        assert!(sim.initialize());
        assert_eq!(sim.step(1.0), 0);
        assert_eq!(recorder.borrow().history().len(), 20);
        assert_eq!(sim.inputs().get(Field::LoadP, "L1"), Some(3.1));
        assert!(sim.frequency() < 1.0);
    }

    #[test]
    fn trip_removes_inertia_and_output() {
        let mut builder =
            AggregateSwingBuilder::default().with_hook(shared(GeneratorTrip::new("G3", 0.0)));
        let mut sim = built(&mut builder);
        assert!(sim.initialize());
        assert_eq!(sim.step(1.0), 0);
        assert!(!sim.is_online("G3"));
        assert_eq!(sim.device_current("G3"), Some(0.0));
    }

    #[test]
    fn invalid_step_size_is_a_build_error() {
        let mut builder = AggregateSwingBuilder::new(SwingParams {
            step_size: 0.0,
            ..SwingParams::default()
        });
        assert!(builder.build(&small_network()).is_err());
    }
}
