use std::collections::VecDeque;
use std::f64::consts::TAU;

use tracing::debug;

use super::{Field, HookContext, Perturbation};

/// Sliding window of frequency samples.
///
/// Samples are keyed by time. Feeding the same time again replaces the last
/// sample; feeding an earlier time restarts the window.
#[derive(Debug, Clone)]
pub struct FrequencyMeter {
    window: usize,
    samples: VecDeque<(f64, f64)>,
}

/// One meter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyReading {
    /// Measured frequency (Hz).
    pub frequency_hz: f64,
    /// Deviation from nominal (Hz).
    pub deviation_hz: f64,
    /// Average rate of change over the window (Hz/s).
    pub rocof_hz_s: f64,
}

impl FrequencyMeter {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn record(&mut self, t: f64, frequency_hz: f64, nominal_hz: f64) -> FrequencyReading {
        match self.samples.back() {
            Some(&(t_last, _)) if t_last == t => {
                self.samples.pop_back();
            }
            Some(&(t_last, _)) if t < t_last => self.samples.clear(),
            _ => {}
        }
        self.samples.push_back((t, frequency_hz));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }

        let rocof_hz_s = match (self.samples.front(), self.samples.back()) {
            (Some(&(t0, f0)), Some(&(t1, f1))) if t1 > t0 => (f1 - f0) / (t1 - t0),
            _ => 0.0,
        };
        FrequencyReading {
            frequency_hz,
            deviation_hz: frequency_hz - nominal_hz,
            rocof_hz_s,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One evaluation of the response law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FfrSample {
    pub time: f64,
    pub reading: FrequencyReading,
    /// Point-on-wave voltage `v * sin(2π f t)` at the measured frequency (pu).
    pub point_on_wave: f64,
    pub engaged: bool,
    /// Power command written to the storage unit (pu).
    pub command: f64,
}

/// Running totals over every evaluation, independent of trace decimation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FfrSummary {
    /// First time the deviation left the deadband.
    pub engaged_at: Option<f64>,
    /// Largest positive command (pu).
    pub peak_injection: f64,
    /// Largest negative command, as a magnitude (pu).
    pub peak_absorption: f64,
    /// Command integrated over time (pu·s).
    pub energy_pu_s: f64,
    pub evaluations: usize,
}

/// State before the latest evaluation, restored when that time is evaluated again.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    time: f64,
    integral: f64,
    t0: Option<f64>,
    engaged: bool,
    command: f64,
    summary: FfrSummary,
}

/// Fast frequency response from a storage unit.
///
/// The unit stays idle until the deviation first leaves the deadband. From
/// then on it is engaged for the rest of the run and writes a PI law on the
/// per-unit deviation to its external power command:
///
/// ```text
/// df        = (f - fn)/fn outside the deadband, 0 inside
/// integral += df * dt
/// pext      = -(kp * df + ki * integral)
/// ```
///
/// so an under-frequency event gives a positive injection. Back inside the
/// deadband the integral is held and the unit keeps delivering
/// `-ki * integral`.
#[derive(Debug, Clone)]
pub struct FastFrequencyResponse {
    pub storage: String,
    pub deadband_hz: f64,
    pub kp: f64,
    pub ki: f64,
    integral: f64,
    t0: Option<f64>,
    engaged: bool,
    command: f64,
    checkpoint: Option<Checkpoint>,
    meter: FrequencyMeter,
    sample_period: f64,
    summary: FfrSummary,
    trace: Vec<FfrSample>,
}

impl FastFrequencyResponse {
    pub fn new(storage: &str, deadband_hz: f64, kp: f64, ki: f64) -> Self {
        Self {
            storage: storage.to_string(),
            deadband_hz,
            kp,
            ki,
            integral: 0.0,
            t0: None,
            engaged: false,
            command: 0.0,
            checkpoint: None,
            meter: FrequencyMeter::new(10),
            sample_period: 0.0,
            summary: FfrSummary::default(),
            trace: Vec::new(),
        }
    }

    /// Keeps at most one trace sample per `period` seconds. Zero keeps every evaluation.
    pub fn with_sample_period(mut self, period: f64) -> Self {
        self.sample_period = period.max(0.0);
        self
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn engaged(&self) -> bool {
        self.engaged
    }

    pub fn summary(&self) -> FfrSummary {
        self.summary
    }

    /// Decimated samples, one per distinct evaluation time at most.
    pub fn trace(&self) -> &[FfrSample] {
        &self.trace
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.integral = cp.integral;
        self.t0 = cp.t0;
        self.engaged = cp.engaged;
        self.command = cp.command;
        self.summary = cp.summary;
        if self.trace.last().is_some_and(|s| s.time == cp.time) {
            self.trace.pop();
        }
    }

    fn keep_sample(&self, t: f64) -> bool {
        match self.trace.last() {
            Some(last) => t < last.time || t - last.time >= self.sample_period - 1e-9,
            None => true,
        }
    }
}

impl Perturbation for FastFrequencyResponse {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        let m = ctx.measurements();
        let nominal_hz = m.nominal_hz;
        let voltage = m.voltage;
        let reading = self.meter.record(t, m.frequency_hz(), nominal_hz);

        if let Some(cp) = self.checkpoint.filter(|cp| cp.time == t) {
            self.restore(cp);
        }
        self.checkpoint = Some(Checkpoint {
            time: t,
            integral: self.integral,
            t0: self.t0,
            engaged: self.engaged,
            command: self.command,
            summary: self.summary,
        });

        // hour rebuilds restart simulator time at zero
        let t0 = match self.t0 {
            Some(t0) if t0 <= t => t0,
            _ => t,
        };
        let dt = t - t0;

        let outside = reading.deviation_hz.abs() > self.deadband_hz;
        if outside && !self.engaged {
            self.engaged = true;
            self.summary.engaged_at = Some(t);
            debug!(
                "t={:.2}s: {} engaged at {:.4} Hz",
                t, self.storage, reading.frequency_hz
            );
        }
        let df = if outside {
            reading.deviation_hz / nominal_hz
        } else {
            0.0
        };
        self.integral += df * dt;
        let command = if self.engaged {
            -(self.kp * df + self.ki * self.integral)
        } else {
            0.0
        };

        self.summary.energy_pu_s += self.command * dt;
        self.summary.peak_injection = self.summary.peak_injection.max(command);
        self.summary.peak_absorption = self.summary.peak_absorption.max(-command);
        self.summary.evaluations += 1;
        self.command = command;
        self.t0 = Some(t);

        ctx.set(Field::StoragePext, &self.storage, command);
        if self.keep_sample(t) {
            self.trace.push(FfrSample {
                time: t,
                reading,
                point_on_wave: voltage * (TAU * reading.frequency_hz * t).sin(),
                engaged: self.engaged,
                command,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pert::ExternalInputs;
    use crate::pert::fixtures::{inputs, measurements};

    #[test]
    fn meter_replaces_same_time_and_restarts_on_rewind() {
        let mut meter = FrequencyMeter::new(3);
        meter.record(0.0, 60.0, 60.0);
        meter.record(1.0, 59.9, 60.0);
        meter.record(1.0, 59.8, 60.0);
        assert_eq!(meter.len(), 2);

        let r = meter.record(2.0, 59.7, 60.0);
        assert!((r.rocof_hz_s - (-0.15)).abs() < 1e-9);
        assert!((r.deviation_hz - (-0.3)).abs() < 1e-9);

        meter.record(3.0, 59.7, 60.0);
        assert_eq!(meter.len(), 3);

        meter.record(0.5, 60.0, 60.0);
        assert_eq!(meter.len(), 1);
    }

    #[test]
    fn inside_deadband_is_silent() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.036, 20.0, 5.0);
        let mut inputs = inputs();
        let m = measurements(1.0 - 0.0001);
        ffr.apply(0.0, &mut HookContext::new(&mut inputs, &m));
        ffr.apply(0.1, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(inputs.get(Field::StoragePext, "ESD1_1"), Some(0.0));
        assert_eq!(ffr.integral(), 0.0);
        assert!(!ffr.engaged());
        assert_eq!(ffr.summary().engaged_at, None);
    }

    #[test]
    fn under_frequency_injects() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.036, 20.0, 5.0);
        let mut inputs = inputs();
        let m = measurements(0.99);
        ffr.apply(0.0, &mut HookContext::new(&mut inputs, &m));
        let first = inputs.get(Field::StoragePext, "ESD1_1").unwrap_or(f64::NAN);
        assert!((first - 0.2).abs() < 1e-9);

        ffr.apply(0.5, &mut HookContext::new(&mut inputs, &m));
        // integral = -0.01 * 0.5
        assert!((ffr.integral() + 0.005).abs() < 1e-12);
        let second = inputs.get(Field::StoragePext, "ESD1_1").unwrap_or(f64::NAN);
        assert!((second - (0.2 + 5.0 * 0.005)).abs() < 1e-9);
    }

    #[test]
    fn repeated_evaluation_does_not_double_integrate() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.0, 1.0, 1.0);
        let mut inputs = inputs();
        let m = measurements(0.99);
        ffr.apply(0.0, &mut HookContext::new(&mut inputs, &m));
        ffr.apply(1.0, &mut HookContext::new(&mut inputs, &m));
        let once = ffr.integral();
        ffr.apply(1.0, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(ffr.integral(), once);
        assert_eq!(ffr.trace().len(), 2);
        assert_eq!(ffr.summary().evaluations, 2);
    }

    #[test]
    fn leaving_deadband_latches_and_holds_integral() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.036, 20.0, 5.0);
        let mut inputs = inputs();
        let low = measurements(0.99);
        let nominal = measurements(1.0);
        let command = |inputs: &ExternalInputs| {
            inputs.get(Field::StoragePext, "ESD1_1").unwrap_or(f64::NAN)
        };

        ffr.apply(0.0, &mut HookContext::new(&mut inputs, &low));
        ffr.apply(0.5, &mut HookContext::new(&mut inputs, &low));
        assert!((command(&inputs) - 0.225).abs() < 1e-9);

        // back inside the band: proportional term drops, integral term stays
        ffr.apply(1.0, &mut HookContext::new(&mut inputs, &nominal));
        assert!(ffr.engaged());
        assert!((ffr.integral() + 0.005).abs() < 1e-12);
        assert!((command(&inputs) - 0.025).abs() < 1e-9);

        ffr.apply(2.0, &mut HookContext::new(&mut inputs, &nominal));
        assert!((ffr.integral() + 0.005).abs() < 1e-12);
        assert!((command(&inputs) - 0.025).abs() < 1e-9);

        let summary = ffr.summary();
        assert_eq!(summary.engaged_at, Some(0.0));
        assert!((summary.peak_injection - 0.225).abs() < 1e-9);
        assert_eq!(summary.peak_absorption, 0.0);
        assert_eq!(summary.evaluations, 4);
        // 0.2 * 0.5 + 0.225 * 0.5 + 0.025 * 1.0
        assert!((summary.energy_pu_s - 0.2375).abs() < 1e-9);
        assert!(ffr.trace().iter().all(|s| s.engaged));
    }

    #[test]
    fn trace_keeps_one_sample_per_period() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.036, 20.0, 5.0).with_sample_period(1.0);
        let mut inputs = inputs();
        let mut m = measurements(0.99);
        m.voltage = 0.95;
        for i in 0..=40 {
            let t = i as f64 * 0.05;
            ffr.apply(t, &mut HookContext::new(&mut inputs, &m));
            ffr.apply(t, &mut HookContext::new(&mut inputs, &m));
        }

        let times: Vec<f64> = ffr.trace().iter().map(|s| s.time).collect();
        assert_eq!(times.len(), 3, "{times:?}");
        assert!((times[1] - 1.0).abs() < 1e-9 && (times[2] - 2.0).abs() < 1e-9);
        assert_eq!(ffr.summary().evaluations, 41);
        for s in ffr.trace() {
            assert!(s.point_on_wave.abs() <= 0.95 + 1e-12);
            assert!((s.reading.deviation_hz + 0.6).abs() < 1e-9);
        }
        assert_eq!(ffr.trace()[0].point_on_wave, 0.0);
    }

    #[test]
    fn time_rewind_restarts_interval() {
        let mut ffr = FastFrequencyResponse::new("ESD1_1", 0.0, 1.0, 1.0);
        let mut inputs = inputs();
        let m = measurements(0.99);
        ffr.apply(5.0, &mut HookContext::new(&mut inputs, &m));
        ffr.apply(6.0, &mut HookContext::new(&mut inputs, &m));
        let before = ffr.integral();
        ffr.apply(0.0, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(ffr.integral(), before);
    }
}
