//! Builds a co-simulation from a [`ScenarioConfig`] and runs it.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::info;

use crate::config::{PerturbationConfig, ScenarioConfig};
use crate::curve::Curve;
use crate::error::CosimResult;
use crate::grid::{Generator, Load, Network};
use crate::pert::{
    CurrentRecorder, FastFrequencyResponse, ForcedOscillation, GeneratorTrip, InjectionStep,
    LoadNoise, SharedPerturbation, shared,
};
use crate::reference::dispatch::MeritOrderDispatch;
use crate::reference::swing::{AggregateSwingBuilder, MachineData, SwingParams};
use crate::sim::engine::CoSimulation;
use crate::sim::kpi::KpiReport;
use crate::sim::types::{LoopConfig, OutputRecord};

/// Everything a finished run produced.
pub struct RunOutput {
    pub records: Vec<OutputRecord>,
    pub kpi: KpiReport,
    /// Current recorders attached to the run, in configuration order.
    pub recorders: Vec<Rc<RefCell<CurrentRecorder>>>,
    /// Fast frequency response hooks attached to the run, in configuration order.
    pub responders: Vec<Rc<RefCell<FastFrequencyResponse>>>,
}

/// Converts the configured inventory to a per-unit network.
pub fn build_network(cfg: &ScenarioConfig) -> Network {
    let base = cfg.system.base_mva;
    let generators = cfg
        .generators
        .iter()
        .map(|g| Generator {
            id: g.id.clone(),
            fuel: g.fuel,
            capacity: g.capacity_mw / base,
            pmin: g.pmin_mw / base,
            pmax: g.capacity_mw / base,
            cost: g.cost,
            online: g.online,
            controllable: !g.fuel.is_must_take(),
            p0: g.p0_mw / base,
            slack: g.slack,
        })
        .collect();
    let loads = cfg
        .loads
        .iter()
        .map(|l| Load {
            id: l.id.clone(),
            p0: l.p_mw / base,
            q0: l.q_mvar / base,
        })
        .collect();
    Network::new(base, generators, loads)
}

/// Loop timing, gains, and policies from the scenario.
pub fn build_loop_config(cfg: &ScenarioConfig) -> LoopConfig {
    let s = &cfg.simulation;
    let mut lc = LoopConfig::new(
        s.hours,
        s.seconds_per_hour,
        s.dispatch_interval_s,
        s.agc_interval_s,
    );
    lc.stop_after_s = (s.stop_after_s > 0).then_some(s.stop_after_s);
    lc.formulation = s.formulation;
    lc.kp = cfg.agc.kp;
    lc.ki = cfg.agc.ki;
    lc.integral_reset = cfg.agc.integral_reset;
    lc.skip_agc_at_start = cfg.agc.skip_at_start;
    lc.agc_gains = cfg
        .generators
        .iter()
        .map(|g| (g.id.clone(), g.agc_gain))
        .collect();
    lc.relax_min_output = s.relax_min_output;
    lc.push_renewables_each_second = s.push_renewables;
    lc.nominal_freq_hz = cfg.system.freq_hz;
    lc.watchdog_every_s = (s.watchdog_every_s > 0).then_some(s.watchdog_every_s);
    lc
}

/// Loads the configured curve file, or builds a constant curve.
///
/// # Errors
///
/// Returns an error if the curve file cannot be read or is malformed.
pub fn build_curve(cfg: &ScenarioConfig) -> CosimResult<Curve> {
    match &cfg.curve.path {
        Some(path) => Curve::from_csv_path(Path::new(path)),
        None => Ok(Curve::constant(cfg.curve.load, cfg.curve.pv, cfg.curve.wind)),
    }
}

struct Hooks {
    all: Vec<SharedPerturbation>,
    recorders: Vec<Rc<RefCell<CurrentRecorder>>>,
    responders: Vec<Rc<RefCell<FastFrequencyResponse>>>,
}

fn build_hooks(cfg: &ScenarioConfig) -> Hooks {
    let mut hooks = Hooks {
        all: Vec::with_capacity(cfg.perturbations.len()),
        recorders: Vec::new(),
        responders: Vec::new(),
    };
    for (i, p) in cfg.perturbations.iter().enumerate() {
        let hook: SharedPerturbation = match p {
            PerturbationConfig::LoadNoise {
                load,
                loc,
                scale,
                seed,
            } => {
                let seed = seed.unwrap_or_else(|| cfg.simulation.seed.wrapping_add(i as u64));
                shared(LoadNoise::new(load, *loc, *scale, seed))
            }
            PerturbationConfig::InjectionStep {
                t_on,
                sending_load,
                pin,
                qin,
                receiving_gen,
                pout,
                vf,
            } => {
                let step = InjectionStep::load_step(*t_on, sending_load, *pin, *qin);
                match receiving_gen {
                    Some(g) => shared(step.with_receiving_end(g, *pout, *vf)),
                    None => shared(step),
                }
            }
            PerturbationConfig::ForcedOscillation {
                exciter,
                t1,
                t2,
                amplitude,
                freq_hz,
                phase_rad,
            } => shared(
                ForcedOscillation::new(exciter, *t1, *t2, *amplitude, *freq_hz)
                    .with_phase(*phase_rad),
            ),
            PerturbationConfig::FastFrequencyResponse {
                storage,
                deadband_hz,
                kp,
                ki,
                sample_period_s,
            } => {
                let ffr = Rc::new(RefCell::new(
                    FastFrequencyResponse::new(storage, *deadband_hz, *kp, *ki)
                        .with_sample_period(*sample_period_s),
                ));
                hooks.responders.push(ffr.clone());
                ffr
            }
            PerturbationConfig::GeneratorTrip { generator, t_trip } => {
                shared(GeneratorTrip::new(generator, *t_trip))
            }
            PerturbationConfig::CurrentRecorder {
                devices,
                sample_period_s,
            } => {
                let rec = Rc::new(RefCell::new(
                    CurrentRecorder::new(devices.iter().cloned()).with_sample_period(*sample_period_s),
                ));
                hooks.recorders.push(rec.clone());
                rec
            }
        };
        hooks.all.push(hook);
    }
    hooks
}

fn build_simulator(cfg: &ScenarioConfig, hooks: &[SharedPerturbation]) -> AggregateSwingBuilder {
    let sys = &cfg.system;
    let mut builder = AggregateSwingBuilder::new(SwingParams {
        damping: sys.damping,
        frequency_bias: sys.frequency_bias,
        step_size: sys.step_size_s,
        freq_limit: sys.freq_limit_pu,
        load_voltage_exponent: sys.load_voltage_exponent,
        nominal_hz: sys.freq_hz,
    });
    for g in &cfg.generators {
        let mut data = MachineData::for_fuel(g.fuel);
        if let Some(model) = g.model {
            data.model = model;
        }
        if let Some(h) = g.h {
            data.inertia_h = h;
        }
        if let Some(droop) = g.droop {
            data.droop = droop;
        }
        if let Some(tc) = g.governor_tc {
            data.governor_tc = tc;
        }
        builder = builder.with_machine(&g.id, data);
    }
    for hook in hooks {
        builder = builder.with_hook(hook.clone());
    }
    builder
}

/// Runs the scenario end to end with the reference collaborators.
///
/// Writes the output rows to `out` when given. The configuration is
/// expected to have passed [`ScenarioConfig::validate`].
///
/// # Errors
///
/// Returns the first fatal error of the run, or an I/O error while loading
/// the curve or writing the output.
pub fn run_scenario(cfg: &ScenarioConfig, out: Option<&Path>) -> CosimResult<RunOutput> {
    let curve = build_curve(cfg)?;
    let network = build_network(cfg);
    let dispatch = MeritOrderDispatch::new(network).with_ac_loss_factor(cfg.simulation.ac_loss_factor);
    let hooks = build_hooks(cfg);
    let builder = build_simulator(cfg, &hooks.all);
    let mut cosim = CoSimulation::new(build_loop_config(cfg), dispatch, builder, curve);

    let lc = cosim.config();
    info!(
        "running {} h x {} s, dispatch every {} s, AGC every {} s, {} perturbation(s)",
        lc.total_hours,
        lc.seconds_per_hour,
        lc.dispatch_interval_s,
        lc.agc_interval_s,
        hooks.all.len()
    );
    let records = match out {
        Some(path) => cosim.run_to_csv(path)?,
        None => cosim.run()?,
    };
    let kpi = KpiReport::from_records(&records, cfg.system.freq_hz);

    Ok(RunOutput {
        records,
        kpi,
        recorders: hooks.recorders,
        responders: hooks.responders,
    })
}
