//! Co-simulation loop controller coupling a dispatch engine with a dynamic simulator.

use std::path::Path;

use tracing::{debug, info};

use crate::curve::Curve;
use crate::error::{CosimError, CosimResult};
use crate::io::export::export_csv;

use super::adapter::{SimulatorInputs, forecast, push_setpoints};
use super::agc::{AceState, AgcController};
use super::clock::{SimulationClock, Tick};
use super::collaborator::{DispatchEngine, DynamicSimulator, SimulatorBuilder};
use super::link::{LinkTable, total_correction};
use super::participation::ParticipationFactors;
use super::types::{LoopConfig, OutputRecord};

/// Drives the hour / dispatch / AGC / second loop.
///
/// Generic over both collaborators for static dispatch. The dynamic
/// simulator is rebuilt from the dispatch network at every hour boundary.
/// Within one second the order is always dispatch, then AGC, then the
/// integration step.
pub struct CoSimulation<D: DispatchEngine, B: SimulatorBuilder> {
    config: LoopConfig,
    dispatch: D,
    builder: B,
    simulator: Option<B::Simulator>,
    curve: Curve,
    agc: AgcController,
    links: LinkTable,
    factors: ParticipationFactors,
    inputs: SimulatorInputs,
    controllable: Vec<String>,
    agc_total: f64,
    records: Vec<OutputRecord>,
}

impl<D: DispatchEngine, B: SimulatorBuilder> CoSimulation<D, B> {
    /// Prepares the dispatch network and zeroes the AGC state.
    ///
    /// Minimum outputs are relaxed when `config.relax_min_output` is set and
    /// wind, solar, and storage units are fixed at their forecast output.
    pub fn new(config: LoopConfig, mut dispatch: D, builder: B, curve: Curve) -> Self {
        let network = dispatch.network_mut();
        if config.relax_min_output {
            network.relax_min_output();
        }
        network.fix_must_take_units();

        let inputs = SimulatorInputs::capture(network);
        let controllable = network
            .generators
            .iter()
            .filter(|g| g.controllable)
            .map(|g| g.id.clone())
            .collect();
        let agc = AgcController::new(config.kp, config.ki, config.integral_reset);

        Self {
            config,
            dispatch,
            builder,
            simulator: None,
            curve,
            agc,
            links: LinkTable::default(),
            factors: ParticipationFactors::default(),
            inputs,
            controllable,
            agc_total: 0.0,
            records: Vec::new(),
        }
    }

    /// Runs every second of the configured horizon.
    ///
    /// Any collaborator failure aborts the run. Records produced before the
    /// failure stay available through [`CoSimulation::records`].
    ///
    /// # Errors
    ///
    /// * [`CosimError::InitFailed`] if the simulator does not initialize at an hour boundary
    /// * [`CosimError::DispatchDiverged`] if a dispatch solve does not converge
    /// * [`CosimError::SimulatorExit`] if an integration step returns a nonzero code
    pub fn run(&mut self) -> CosimResult<Vec<OutputRecord>> {
        let mut clock = SimulationClock::new(
            self.config.total_hours,
            self.config.seconds_per_hour,
            self.config.dispatch_interval_s,
            self.config.agc_interval_s,
        );
        let total = self.config.total_seconds();
        self.records = Vec::with_capacity(total);
        self.agc.reset();

        while let Some(tick) = clock.tick() {
            if tick.elapsed >= total {
                info!("stopping after {} s", total);
                break;
            }
            self.step(tick)?;
        }
        Ok(self.records.clone())
    }

    /// Runs the loop and writes the records to `path` as CSV.
    pub fn run_to_csv(&mut self, path: &Path) -> CosimResult<Vec<OutputRecord>> {
        let records = self.run()?;
        export_csv(&records, path)?;
        info!("wrote {} records to {}", records.len(), path.display());
        Ok(records)
    }

    fn step(&mut self, tick: Tick) -> CosimResult<()> {
        if tick.hour_boundary {
            self.start_hour(tick.hour)?;
        }
        if tick.dispatch_boundary {
            self.run_dispatch(tick)?;
        }
        if tick.agc_boundary && !(self.config.skip_agc_at_start && tick.second == 0) {
            self.apply_agc(tick)?;
        }
        self.advance(tick)
    }

    fn start_hour(&mut self, hour: usize) -> CosimResult<()> {
        let simulator = self.builder.build(self.dispatch.network())?;
        self.links = LinkTable::build(
            &self.controllable,
            &simulator.control_links(),
            &self.config.agc_gains,
        );
        let simulator = self.simulator.insert(simulator);
        if !simulator.initialize() {
            return Err(CosimError::InitFailed { hour });
        }
        // a fresh simulator carries no AGC signals
        self.agc_total = 0.0;
        info!("hour {}: simulator initialized with {} linked units", hour, self.links.len());
        Ok(())
    }

    fn run_dispatch(&mut self, tick: Tick) -> CosimResult<()> {
        let mean = self.curve.interval_mean(
            tick.hour,
            tick.dispatch_interval_id,
            self.config.dispatch_interval_s,
        );
        self.dispatch
            .update_forecast(&forecast(tick.hour, tick.dispatch_interval_id, mean));
        let outcome = self.dispatch.solve(self.config.formulation);
        if !outcome.converged {
            return Err(CosimError::DispatchDiverged {
                hour: tick.hour,
                interval: tick.dispatch_interval_id,
            });
        }

        let online = self.dispatch.online_generators();
        self.factors =
            ParticipationFactors::compute(&self.controllable, self.dispatch.network(), &online);
        push_setpoints(active(&mut self.simulator)?, &outcome);
        self.agc.on_dispatch_boundary();

        info!(
            "hour {} interval {}: dispatch solved, objective={:.3} load={:.3} online={}",
            tick.hour,
            tick.dispatch_interval_id,
            outcome.objective,
            mean.load,
            online.len()
        );
        Ok(())
    }

    fn apply_agc(&mut self, tick: Tick) -> CosimResult<()> {
        let ace = self.agc.state();
        let corrections = self.links.corrections(ace.raw, &self.factors);
        let simulator = active(&mut self.simulator)?;
        for c in &corrections {
            simulator.set_control_signal(c.kind, &c.generator, c.value);
        }
        self.agc_total = total_correction(&corrections);
        debug!(
            "hour {} second {} agc {}: raw={:.6} total={:.6}",
            tick.hour, tick.second, tick.agc_interval_id, ace.raw, self.agc_total
        );
        Ok(())
    }

    fn advance(&mut self, tick: Tick) -> CosimResult<()> {
        let row = self.curve.at_second(tick.hour, tick.second);
        let simulator = active(&mut self.simulator)?;
        self.inputs
            .push_second(simulator, row, self.config.push_renewables_each_second);

        let code = simulator.step((tick.second + 1) as f64);
        if code != 0 {
            return Err(CosimError::SimulatorExit {
                code,
                hour: tick.hour,
                second: tick.second,
            });
        }

        let base_mva = self.dispatch.network().base_mva;
        let record = OutputRecord {
            time: (tick.elapsed + 1) as f64,
            frequency_hz: simulator.frequency() * self.config.nominal_freq_hz,
            load_factor: row.load,
            ace_mw: self.agc.state().raw * base_mva,
            agc_mw: self.agc_total * base_mva,
            hour: tick.hour,
            second: tick.second,
        };
        let area_error = simulator.area_error();
        self.agc.update(area_error);

        if let Some(every) = self.config.watchdog_every_s {
            if every > 0 && (tick.elapsed + 1) % every == 0 {
                let sim_t = simulator.time();
                info!("watchdog: {} (simulator t={:.2}s)", record, sim_t);
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn factors(&self) -> &ParticipationFactors {
        &self.factors
    }

    pub fn ace(&self) -> AceState {
        self.agc.state()
    }
}

fn active<S>(simulator: &mut Option<S>) -> CosimResult<&mut S> {
    simulator
        .as_mut()
        .ok_or_else(|| CosimError::Build("no simulator for the current hour".to_string()))
}
