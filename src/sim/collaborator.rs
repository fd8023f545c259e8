//! Contracts for the two collaborators driven by the loop controller.
//!
//! The controller only touches the state it needs through these traits: the
//! dispatch engine's forecasts and solution, and a small set of simulator
//! inputs and measurements.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::CosimResult;
use crate::grid::Network;

/// Optimal power flow formulation used at each dispatch boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// DC dispatch, converted to an AC operating point afterwards.
    #[default]
    Dc,
    /// Full AC optimal power flow.
    Ac,
}

/// Mean exogenous multipliers over one dispatch interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalForecast {
    pub hour: usize,
    pub interval: usize,
    pub load: f64,
    pub pv: f64,
    pub wind: f64,
}

/// Result of one dispatch solve.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Generator output setpoints (pu) keyed by generator id.
    pub setpoints: BTreeMap<String, f64>,
    pub objective: f64,
    pub converged: bool,
}

/// Transmission dispatch engine.
pub trait DispatchEngine {
    /// Network model the dynamic simulator is built from.
    fn network(&self) -> &Network;

    fn network_mut(&mut self) -> &mut Network;

    /// Scales loads and must-take generation to the interval forecast.
    fn update_forecast(&mut self, forecast: &IntervalForecast);

    /// Solves the dispatch problem. Never retried by the caller.
    fn solve(&mut self, formulation: Formulation) -> DispatchOutcome;

    /// Ids of generators online in the latest solution.
    fn online_generators(&self) -> BTreeSet<String>;
}

/// Kind of control device that can receive an AGC signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlKind {
    /// Turbine governor of a synchronous machine.
    Governor,
    /// Distributed-generator inverter.
    DistributedInverter,
    /// Renewable-generator inverter.
    RenewableInverter,
}

impl ControlKind {
    pub const ALL: [ControlKind; 3] = [
        ControlKind::Governor,
        ControlKind::DistributedInverter,
        ControlKind::RenewableInverter,
    ];
}

/// Control devices attached to one generator in the dynamic model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLink {
    pub generator: String,
    pub kinds: BTreeSet<ControlKind>,
}

/// Time-domain dynamic simulator.
pub trait DynamicSimulator {
    /// Solves the initial power flow and initializes dynamic states.
    ///
    /// Returns `false` if either step fails to converge.
    fn initialize(&mut self) -> bool;

    /// Integrates forward to `until` seconds. Returns `0` on success.
    fn step(&mut self, until: f64) -> i32;

    /// Current simulation time in seconds.
    fn time(&self) -> f64;

    /// Frequency at the slack machine (pu).
    fn frequency(&self) -> f64;

    /// Measured area error signal fed to the AGC loop (pu).
    fn area_error(&self) -> f64;

    /// Current magnitude at a device terminal (pu), if the device exists.
    fn device_current(&self, id: &str) -> Option<f64>;

    /// Control devices present in the dynamic model.
    fn control_links(&self) -> Vec<ControlLink>;

    fn set_load(&mut self, id: &str, p: f64, q: f64);

    fn set_generator_reference(&mut self, id: &str, p: f64);

    /// Writes an external-signal input on one control device.
    fn set_control_signal(&mut self, kind: ControlKind, id: &str, value: f64);
}

/// Builds a fresh dynamic simulator from the dispatch network.
pub trait SimulatorBuilder {
    type Simulator: DynamicSimulator;

    /// # Errors
    ///
    /// Returns `CosimError::Build` if the network cannot be converted.
    fn build(&mut self, network: &Network) -> CosimResult<Self::Simulator>;
}
