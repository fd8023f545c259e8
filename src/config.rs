//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::grid::Fuel;
use crate::reference::swing::MachineModel;
use crate::sim::agc::IntegralReset;
use crate::sim::collaborator::Formulation;

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default. Powers are given
/// in MW / Mvar and converted to per-unit on `system.base_mva`; perturbation
/// magnitudes are already per-unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run length, dispatch settings, and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// AGC gains and policies.
    #[serde(default)]
    pub agc: AgcConfig,
    /// System base and aggregate dynamic parameters.
    #[serde(default)]
    pub system: SystemConfig,
    /// Exogenous load / PV / wind multipliers.
    #[serde(default)]
    pub curve: CurveConfig,
    #[serde(default = "default_generators", rename = "generator")]
    pub generators: Vec<GeneratorConfig>,
    #[serde(default = "default_loads", rename = "load")]
    pub loads: Vec<LoadConfig>,
    #[serde(default, rename = "perturbation")]
    pub perturbations: Vec<PerturbationConfig>,
}

/// Run length, dispatch settings, and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of hours to simulate (must be > 0).
    pub hours: usize,
    /// Simulated seconds per hour; values below 3600 truncate each hour.
    pub seconds_per_hour: usize,
    /// Dispatch interval (s).
    pub dispatch_interval_s: usize,
    /// AGC interval (s).
    pub agc_interval_s: usize,
    /// Stop early after this many elapsed seconds (0 runs to the end).
    pub stop_after_s: usize,
    /// `"dc"` (RTED followed by AC conversion) or `"ac"` (ACOPF).
    pub formulation: Formulation,
    /// Fraction of demand added as losses under the AC formulation.
    pub ac_loss_factor: f64,
    /// Zero generator minimum outputs before the first dispatch.
    pub relax_min_output: bool,
    /// Push wind / PV multipliers into the simulator every second.
    pub push_renewables: bool,
    /// Progress log period (s, 0 disables).
    pub watchdog_every_s: usize,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            hours: 1,
            seconds_per_hour: 3600,
            dispatch_interval_s: 300,
            agc_interval_s: 4,
            stop_after_s: 0,
            formulation: Formulation::Dc,
            ac_loss_factor: 0.02,
            relax_min_output: true,
            push_renewables: false,
            watchdog_every_s: 100,
            seed: 42,
        }
    }
}

/// AGC gains and policies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgcConfig {
    pub kp: f64,
    pub ki: f64,
    /// `"never"` or `"each_dispatch"`.
    pub integral_reset: IntegralReset,
    /// Skip the AGC write at the first second of each hour.
    pub skip_at_start: bool,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            kp: 0.1,
            ki: 0.05,
            integral_reset: IntegralReset::Never,
            skip_at_start: true,
        }
    }
}

/// System base and aggregate dynamic parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub base_mva: f64,
    pub freq_hz: f64,
    /// Load damping (pu/pu).
    pub damping: f64,
    /// Area error per pu speed deviation.
    pub frequency_bias: f64,
    /// Integration step (s).
    pub step_size_s: f64,
    /// Speed deviation (pu) beyond which the simulator aborts.
    pub freq_limit_pu: f64,
    pub load_voltage_exponent: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            base_mva: 100.0,
            freq_hz: 60.0,
            damping: 1.0,
            frequency_bias: 20.0,
            step_size_s: 0.05,
            freq_limit_pu: 0.1,
            load_voltage_exponent: 0.0,
        }
    }
}

/// Exogenous multipliers: a CSV file, or constants when no path is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurveConfig {
    /// CSV with `Load,PV,Wind` columns, one row per minute.
    pub path: Option<String>,
    pub load: f64,
    pub pv: f64,
    pub wind: f64,
}

impl CurveConfig {
    /// Makes a relative `path` relative to `dir` instead of the working directory.
    pub fn rebase(&mut self, dir: &Path) {
        if let Some(p) = &self.path {
            if Path::new(p).is_relative() {
                self.path = Some(dir.join(p).to_string_lossy().into_owned());
            }
        }
    }
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            path: None,
            load: 1.0,
            pv: 1.0,
            wind: 1.0,
        }
    }
}

/// One generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub id: String,
    pub fuel: Fuel,
    pub capacity_mw: f64,
    pub pmin_mw: f64,
    /// Linear cost ($/MWh).
    pub cost: f64,
    /// Initial output; the forecast base for wind and solar (MW).
    pub p0_mw: f64,
    pub slack: bool,
    pub online: bool,
    /// Dynamic model; defaults by fuel.
    pub model: Option<MachineModel>,
    /// Inertia constant (s); defaults by model.
    pub h: Option<f64>,
    pub droop: Option<f64>,
    pub governor_tc: Option<f64>,
    /// AGC gain multiplier.
    pub agc_gain: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            fuel: Fuel::Thermal,
            capacity_mw: 100.0,
            pmin_mw: 0.0,
            cost: 0.0,
            p0_mw: 0.0,
            slack: false,
            online: true,
            model: None,
            h: None,
            droop: None,
            governor_tc: None,
            agc_gain: 1.0,
        }
    }
}

/// One constant-power load.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    pub id: String,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
}

fn default_one() -> f64 {
    1.0
}

/// A perturbation hook, tagged by `kind`. Magnitudes are per-unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PerturbationConfig {
    /// Gaussian noise on a load's active power.
    LoadNoise {
        load: String,
        #[serde(default)]
        loc: f64,
        scale: f64,
        /// Defaults to the scenario seed offset by the hook's position.
        seed: Option<u64>,
    },
    /// Sending-end load step with an optional receiving-end generator.
    InjectionStep {
        t_on: f64,
        sending_load: String,
        pin: f64,
        #[serde(default)]
        qin: f64,
        receiving_gen: Option<String>,
        #[serde(default)]
        pout: f64,
        #[serde(default = "default_one")]
        vf: f64,
    },
    /// Sinusoid on an exciter voltage reference.
    ForcedOscillation {
        exciter: String,
        t1: f64,
        t2: f64,
        amplitude: f64,
        freq_hz: f64,
        #[serde(default)]
        phase_rad: f64,
    },
    /// PI frequency response from a storage unit.
    FastFrequencyResponse {
        storage: String,
        deadband_hz: f64,
        kp: f64,
        ki: f64,
        /// Spacing of kept trace samples (s); 0 keeps every step.
        #[serde(default = "default_one")]
        sample_period_s: f64,
    },
    GeneratorTrip {
        generator: String,
        t_trip: f64,
    },
    /// Records terminal currents of the listed generators.
    CurrentRecorder {
        devices: Vec<String>,
        /// Spacing of kept history samples (s); 0 keeps every step.
        #[serde(default = "default_one")]
        sample_period_s: f64,
    },
}

fn generator(id: &str, fuel: Fuel, capacity_mw: f64, cost: f64) -> GeneratorConfig {
    GeneratorConfig {
        id: id.to_string(),
        fuel,
        capacity_mw,
        pmin_mw: 0.1 * capacity_mw,
        cost,
        ..GeneratorConfig::default()
    }
}

fn load(id: &str, p_mw: f64, q_mvar: f64) -> LoadConfig {
    LoadConfig {
        id: id.to_string(),
        p_mw,
        q_mvar,
    }
}

fn default_generators() -> Vec<GeneratorConfig> {
    vec![
        GeneratorConfig {
            slack: true,
            ..generator("G1", Fuel::Thermal, 300.0, 20.0)
        },
        generator("G2", Fuel::Thermal, 200.0, 35.0),
        generator("G3", Fuel::Hydro, 100.0, 5.0),
        GeneratorConfig {
            p0_mw: 50.0,
            pmin_mw: 0.0,
            ..generator("W1", Fuel::Wind, 100.0, 0.0)
        },
        GeneratorConfig {
            p0_mw: 20.0,
            pmin_mw: 0.0,
            ..generator("PV1", Fuel::Solar, 50.0, 0.0)
        },
        GeneratorConfig {
            pmin_mw: 0.0,
            ..generator("ESD1", Fuel::Storage, 20.0, 0.0)
        },
    ]
}

fn default_loads() -> Vec<LoadConfig> {
    vec![load("L1", 200.0, 60.0), load("L2", 100.0, 30.0)]
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.hours"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

fn err(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError {
        field: field.into(),
        message: message.into(),
    }
}

impl ScenarioConfig {
    /// One hour of steady operation with constant multipliers.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            agc: AgcConfig::default(),
            system: SystemConfig::default(),
            curve: CurveConfig::default(),
            generators: default_generators(),
            loads: default_loads(),
            perturbations: Vec::new(),
        }
    }

    /// A 10 MW / 5 Mvar withdrawal at the sending end of an HVDC link,
    /// switched on 10 s into a truncated 301-second hour.
    pub fn hvdc_step() -> Self {
        let mut loads = default_loads();
        loads.push(load("CONS", 0.0, 0.0));
        Self {
            simulation: SimulationConfig {
                seconds_per_hour: 301,
                ..SimulationConfig::default()
            },
            loads,
            perturbations: vec![
                PerturbationConfig::InjectionStep {
                    t_on: 10.0,
                    sending_load: "CONS".to_string(),
                    pin: 0.1,
                    qin: 0.05,
                    receiving_gen: None,
                    pout: 0.0,
                    vf: 1.0,
                },
                PerturbationConfig::CurrentRecorder {
                    devices: vec!["G1".to_string(), "G2".to_string(), "G3".to_string()],
                    sample_period_s: 1.0,
                },
            ],
            ..Self::baseline()
        }
    }

    /// Gaussian load noise with storage providing fast frequency response.
    pub fn stochastic_load() -> Self {
        Self {
            simulation: SimulationConfig {
                seconds_per_hour: 600,
                ..SimulationConfig::default()
            },
            perturbations: vec![
                PerturbationConfig::LoadNoise {
                    load: "L1".to_string(),
                    loc: 0.0,
                    scale: 0.02,
                    seed: None,
                },
                PerturbationConfig::LoadNoise {
                    load: "L2".to_string(),
                    loc: 0.0,
                    scale: 0.01,
                    seed: None,
                },
                PerturbationConfig::FastFrequencyResponse {
                    storage: "ESD1".to_string(),
                    deadband_hz: 0.036,
                    kp: 20.0,
                    ki: 5.0,
                    sample_period_s: 1.0,
                },
            ],
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "hvdc_step", "stochastic_load"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "hvdc_step" => Ok(Self::hvdc_step()),
            "stochastic_load" => Ok(Self::stochastic_load()),
            _ => Err(err(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    /// A relative `curve.path` is resolved against the file's directory.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| err("scenario", format!("cannot read \"{}\": {e}", path.display())))?;
        let mut cfg = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            cfg.curve.rebase(dir);
        }
        Ok(cfg)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| err("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        for (field, value) in [
            ("simulation.hours", s.hours),
            ("simulation.seconds_per_hour", s.seconds_per_hour),
            ("simulation.dispatch_interval_s", s.dispatch_interval_s),
            ("simulation.agc_interval_s", s.agc_interval_s),
        ] {
            if value == 0 {
                errors.push(err(field, "must be > 0"));
            }
        }
        if !(s.ac_loss_factor >= 0.0) {
            errors.push(err("simulation.ac_loss_factor", "must be >= 0"));
        }

        let sys = &self.system;
        for (field, value) in [
            ("system.base_mva", sys.base_mva),
            ("system.freq_hz", sys.freq_hz),
            ("system.step_size_s", sys.step_size_s),
            ("system.freq_limit_pu", sys.freq_limit_pu),
        ] {
            if !(value > 0.0) {
                errors.push(err(field, "must be > 0"));
            }
        }
        if !(sys.damping >= 0.0) {
            errors.push(err("system.damping", "must be >= 0"));
        }

        let c = &self.curve;
        if c.path.is_none() {
            for (field, value) in [("curve.load", c.load), ("curve.pv", c.pv), ("curve.wind", c.wind)] {
                if !(value.is_finite() && value >= 0.0) {
                    errors.push(err(field, "must be finite and >= 0"));
                }
            }
        }

        let mut gen_ids = BTreeSet::new();
        if self.generators.is_empty() {
            errors.push(err("generator", "at least one generator is required"));
        }
        for (i, g) in self.generators.iter().enumerate() {
            let at = |name: &str| format!("generator[{i}].{name}");
            if g.id.is_empty() {
                errors.push(err(at("id"), "must not be empty"));
            } else if !gen_ids.insert(g.id.as_str()) {
                errors.push(err(at("id"), format!("duplicate id \"{}\"", g.id)));
            }
            if !(g.capacity_mw > 0.0) {
                errors.push(err(at("capacity_mw"), "must be > 0"));
            }
            if !(0.0..=g.capacity_mw).contains(&g.pmin_mw) {
                errors.push(err(at("pmin_mw"), "must be in [0, capacity_mw]"));
            }
            if !(0.0..=g.capacity_mw).contains(&g.p0_mw) {
                errors.push(err(at("p0_mw"), "must be in [0, capacity_mw]"));
            }
            if g.droop.is_some_and(|r| !(r > 0.0)) {
                errors.push(err(at("droop"), "must be > 0"));
            }
            if g.governor_tc.is_some_and(|t| !(t > 0.0)) {
                errors.push(err(at("governor_tc"), "must be > 0"));
            }
            if g.h.is_some_and(|h| !(h >= 0.0)) {
                errors.push(err(at("h"), "must be >= 0"));
            }
        }
        if self.generators.iter().filter(|g| g.slack).count() > 1 {
            errors.push(err("generator.slack", "at most one generator may be the slack"));
        }

        let mut load_ids = BTreeSet::new();
        for (i, l) in self.loads.iter().enumerate() {
            if l.id.is_empty() {
                errors.push(err(format!("load[{i}].id"), "must not be empty"));
            } else if !load_ids.insert(l.id.as_str()) {
                errors.push(err(format!("load[{i}].id"), format!("duplicate id \"{}\"", l.id)));
            }
            if !(l.p_mw >= 0.0) {
                errors.push(err(format!("load[{i}].p_mw"), "must be >= 0"));
            }
        }

        let fuel_of = |id: &str| self.generators.iter().find(|g| g.id == id).map(|g| g.fuel);
        for (i, p) in self.perturbations.iter().enumerate() {
            let at = |name: &str| format!("perturbation[{i}].{name}");
            match p {
                PerturbationConfig::LoadNoise { load, scale, .. } => {
                    if !load_ids.contains(load.as_str()) {
                        errors.push(err(at("load"), format!("unknown load \"{load}\"")));
                    }
                    if !(*scale >= 0.0) {
                        errors.push(err(at("scale"), "must be >= 0"));
                    }
                }
                PerturbationConfig::InjectionStep {
                    sending_load,
                    receiving_gen,
                    ..
                } => {
                    if !load_ids.contains(sending_load.as_str()) {
                        errors.push(err(at("sending_load"), format!("unknown load \"{sending_load}\"")));
                    }
                    if let Some(g) = receiving_gen {
                        if !gen_ids.contains(g.as_str()) {
                            errors.push(err(at("receiving_gen"), format!("unknown generator \"{g}\"")));
                        }
                    }
                }
                PerturbationConfig::ForcedOscillation { exciter, t1, t2, .. } => {
                    if !gen_ids.contains(exciter.as_str()) {
                        errors.push(err(at("exciter"), format!("unknown generator \"{exciter}\"")));
                    }
                    if !(t1 < t2) {
                        errors.push(err(at("t1"), "must be < t2"));
                    }
                }
                PerturbationConfig::FastFrequencyResponse {
                    storage,
                    deadband_hz,
                    sample_period_s,
                    ..
                } => {
                    if !(*sample_period_s >= 0.0) {
                        errors.push(err(at("sample_period_s"), "must be >= 0"));
                    }
                    if fuel_of(storage) != Some(Fuel::Storage) {
                        errors.push(err(at("storage"), format!("\"{storage}\" is not a storage unit")));
                    }
                    if !(*deadband_hz >= 0.0) {
                        errors.push(err(at("deadband_hz"), "must be >= 0"));
                    }
                }
                PerturbationConfig::GeneratorTrip { generator, .. } => {
                    if !gen_ids.contains(generator.as_str()) {
                        errors.push(err(at("generator"), format!("unknown generator \"{generator}\"")));
                    }
                }
                PerturbationConfig::CurrentRecorder {
                    devices,
                    sample_period_s,
                } => {
                    if !(*sample_period_s >= 0.0) {
                        errors.push(err(at("sample_period_s"), "must be >= 0"));
                    }
                    for d in devices {
                        if !gen_ids.contains(d.as_str()) {
                            errors.push(err(at("devices"), format!("unknown generator \"{d}\"")));
                        }
                    }
                }
            }
        }

        errors
    }
}
