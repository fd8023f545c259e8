use std::collections::BTreeMap;

use super::{HookContext, Perturbation};

/// Current magnitudes of the watched devices at one time.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSample {
    pub time: f64,
    pub currents: BTreeMap<String, f64>,
}

/// Records terminal currents of a set of devices.
///
/// Peaks are tracked over every evaluation. The history keeps at most one
/// sample per sample period, so long runs stay small. Devices the simulator
/// does not report are skipped. Keep a typed handle to read the results
/// after the run:
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use agc_cosim::pert::{CurrentRecorder, SharedPerturbation};
///
/// let recorder = Rc::new(RefCell::new(
///     CurrentRecorder::new(["G1", "G2"]).with_sample_period(1.0),
/// ));
/// let hook: SharedPerturbation = recorder.clone();
/// # let _ = hook;
/// assert!(recorder.borrow().history().is_empty());
/// assert!(recorder.borrow().peaks().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CurrentRecorder {
    devices: Vec<String>,
    sample_period: f64,
    history: Vec<CurrentSample>,
    peaks: BTreeMap<String, f64>,
    /// Peaks before the latest evaluation time.
    before_last: Option<(f64, BTreeMap<String, f64>)>,
}

impl CurrentRecorder {
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Keeps at most one history sample per `period` seconds. Zero keeps every evaluation.
    pub fn with_sample_period(mut self, period: f64) -> Self {
        self.sample_period = period.max(0.0);
        self
    }

    pub fn history(&self) -> &[CurrentSample] {
        &self.history
    }

    /// Largest current per device over every evaluation.
    pub fn peaks(&self) -> &BTreeMap<String, f64> {
        &self.peaks
    }
}

impl Perturbation for CurrentRecorder {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        let m = ctx.measurements();
        let currents: BTreeMap<String, f64> = self
            .devices
            .iter()
            .filter_map(|id| m.current(id).map(|i| (id.clone(), i)))
            .collect();

        // a repeated time replaces its earlier evaluation
        match self.before_last.take() {
            Some((t_last, peaks)) if t_last == t => {
                self.peaks = peaks.clone();
                self.before_last = Some((t_last, peaks));
            }
            _ => self.before_last = Some((t, self.peaks.clone())),
        }
        for (id, &i) in &currents {
            let peak = self.peaks.entry(id.clone()).or_insert(i);
            if i > *peak {
                *peak = i;
            }
        }

        match self.history.last().map(|s| s.time) {
            Some(t_last) if t_last == t => {
                if let Some(last) = self.history.last_mut() {
                    last.currents = currents;
                }
            }
            Some(t_last) if t > t_last && t - t_last < self.sample_period - 1e-9 => {}
            _ => self.history.push(CurrentSample { time: t, currents }),
        }
    }
}
