//! Perturbation hooks invoked by the dynamic simulator at every integration step.
//!
//! A hook receives the current simulation time and a [`HookContext`] that
//! grants read access to measurements and write access to a fixed set of
//! external inputs. Hooks that change network topology must call
//! [`HookContext::mark_topology_changed`] so the simulator rebuilds its
//! structure before integrating.
//!
//! Simulators may evaluate a hook more than once at the same timestamp, so
//! every hook here is written to give the same result when that happens.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

pub mod ffr;
pub mod noise;
pub mod oscillation;
pub mod recorder;
pub mod step;
pub mod trip;

pub use ffr::{FastFrequencyResponse, FfrSample, FfrSummary, FrequencyMeter};
pub use noise::LoadNoise;
pub use oscillation::ForcedOscillation;
pub use recorder::CurrentRecorder;
pub use step::InjectionStep;
pub use trip::GeneratorTrip;

/// External input fields a hook may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Load active power (pu).
    LoadP,
    /// Load reactive power (pu).
    LoadQ,
    /// Generator mechanical power reference (pu).
    GenMechanical,
    /// Generator field voltage (pu).
    GenField,
    /// Generator in-service status (1.0 or 0.0).
    GenStatus,
    /// Exciter voltage reference (pu).
    ExciterVref,
    /// Storage external power command (pu).
    StoragePext,
}

/// A parameter value and the override currently applied on top of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputValue {
    /// Value set by the simulator or loop controller.
    pub base: f64,
    /// Value in effect for integration.
    pub value: f64,
}

/// The writable surface of the simulator's state.
#[derive(Debug, Default, Clone)]
pub struct ExternalInputs {
    values: BTreeMap<(Field, String), InputValue>,
}

impl ExternalInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets both base and effective value, creating the entry if needed.
    pub fn set_base(&mut self, field: Field, id: &str, value: f64) {
        self.values
            .insert((field, id.to_string()), InputValue { base: value, value });
    }

    pub fn base(&self, field: Field, id: &str) -> Option<f64> {
        self.entry(field, id).map(|v| v.base)
    }

    pub fn get(&self, field: Field, id: &str) -> Option<f64> {
        self.entry(field, id).map(|v| v.value)
    }

    /// Overrides the effective value of an existing entry.
    ///
    /// Returns `false` if the entry does not exist.
    pub fn set(&mut self, field: Field, id: &str, value: f64) -> bool {
        match self.values.get_mut(&(field, id.to_string())) {
            Some(v) => {
                v.value = value;
                true
            }
            None => false,
        }
    }

    /// Effective values of every entry of `field`.
    pub fn values_of(&self, field: Field) -> impl Iterator<Item = (&str, f64)> {
        self.values
            .iter()
            .filter(move |((f, _), _)| *f == field)
            .map(|((_, id), v)| (id.as_str(), v.value))
    }

    fn entry(&self, field: Field, id: &str) -> Option<&InputValue> {
        self.values.get(&(field, id.to_string()))
    }
}

/// Read-only measurements available to hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    /// Simulation time (s).
    pub time: f64,
    /// System frequency (pu).
    pub frequency: f64,
    /// Nominal frequency (Hz).
    pub nominal_hz: f64,
    /// System voltage magnitude seen by the loads (pu).
    pub voltage: f64,
    /// Area error signal (pu).
    pub area_error: f64,
    /// Terminal current magnitude per device (pu).
    pub currents: BTreeMap<String, f64>,
}

impl Measurements {
    pub fn frequency_hz(&self) -> f64 {
        self.frequency * self.nominal_hz
    }

    pub fn current(&self, id: &str) -> Option<f64> {
        self.currents.get(id).copied()
    }
}

/// State handed to a hook for one evaluation.
pub struct HookContext<'a> {
    inputs: &'a mut ExternalInputs,
    measurements: &'a Measurements,
    topology_changed: bool,
}

impl<'a> HookContext<'a> {
    pub fn new(inputs: &'a mut ExternalInputs, measurements: &'a Measurements) -> Self {
        Self {
            inputs,
            measurements,
            topology_changed: false,
        }
    }

    pub fn measurements(&self) -> &Measurements {
        self.measurements
    }

    pub fn base(&self, field: Field, id: &str) -> Option<f64> {
        self.inputs.base(field, id)
    }

    pub fn get(&self, field: Field, id: &str) -> Option<f64> {
        self.inputs.get(field, id)
    }

    /// Writes an input. Unknown entries are ignored and reported as `false`.
    pub fn set(&mut self, field: Field, id: &str, value: f64) -> bool {
        self.inputs.set(field, id, value)
    }

    /// Requests a structural rebuild before the next integration step.
    pub fn mark_topology_changed(&mut self) {
        self.topology_changed = true;
    }

    pub fn topology_changed(&self) -> bool {
        self.topology_changed
    }
}

/// A disturbance or probe evaluated at every integration step.
pub trait Perturbation {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>);
}

/// A hook shared between the caller and every simulator instance it is
/// attached to, so its state survives simulator regeneration.
pub type SharedPerturbation = Rc<RefCell<dyn Perturbation>>;

/// Wraps a hook for attachment to a simulator builder.
pub fn shared<P: Perturbation + 'static>(p: P) -> SharedPerturbation {
    Rc::new(RefCell::new(p))
}

/// Evaluates every hook in order and reports whether any changed topology.
pub fn apply_all(
    hooks: &[SharedPerturbation],
    t: f64,
    inputs: &mut ExternalInputs,
    measurements: &Measurements,
) -> bool {
    let mut ctx = HookContext::new(inputs, measurements);
    for hook in hooks {
        hook.borrow_mut().apply(t, &mut ctx);
    }
    ctx.topology_changed()
}
