//! Core co-simulation types: loop configuration and per-second output rows.

use std::collections::BTreeMap;
use std::fmt;

use super::agc::IntegralReset;
use super::collaborator::Formulation;

/// Timing and control settings for one co-simulation run.
///
/// # Examples
///
/// ```
/// use agc_cosim::sim::types::LoopConfig;
///
/// let cfg = LoopConfig::new(2, 3600, 300, 4);
/// assert_eq!(cfg.total_seconds(), 7200);
/// assert_eq!(cfg.kp, 0.1);
/// ```
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Number of hours to simulate.
    pub total_hours: usize,
    /// Simulated seconds per hour. Values below 3600 truncate every hour.
    pub seconds_per_hour: usize,
    /// Length of a dispatch interval (s).
    pub dispatch_interval_s: usize,
    /// Length of an AGC interval (s).
    pub agc_interval_s: usize,
    /// Stop after this many elapsed seconds, if set.
    pub stop_after_s: Option<usize>,
    /// Dispatch formulation used at every dispatch boundary.
    pub formulation: Formulation,
    /// AGC proportional gain.
    pub kp: f64,
    /// AGC integral gain.
    pub ki: f64,
    pub integral_reset: IntegralReset,
    /// Skip the AGC write at the first second of each hour.
    pub skip_agc_at_start: bool,
    /// Per-generator AGC gain multipliers. Missing entries use `1.0`.
    pub agc_gains: BTreeMap<String, f64>,
    /// Zero every generator's minimum output before the first dispatch.
    pub relax_min_output: bool,
    /// Also push wind and solar multipliers into the simulator every second.
    pub push_renewables_each_second: bool,
    /// Nominal system frequency (Hz).
    pub nominal_freq_hz: f64,
    /// Emit a progress line every this many elapsed seconds.
    pub watchdog_every_s: Option<usize>,
}

impl LoopConfig {
    /// Creates a configuration with default gains and policies.
    ///
    /// # Panics
    ///
    /// Panics if `seconds_per_hour`, `dispatch_interval_s`, or
    /// `agc_interval_s` is zero.
    pub fn new(
        total_hours: usize,
        seconds_per_hour: usize,
        dispatch_interval_s: usize,
        agc_interval_s: usize,
    ) -> Self {
        assert!(seconds_per_hour > 0, "seconds_per_hour must be > 0");
        assert!(dispatch_interval_s > 0, "dispatch_interval_s must be > 0");
        assert!(agc_interval_s > 0, "agc_interval_s must be > 0");
        Self {
            total_hours,
            seconds_per_hour,
            dispatch_interval_s,
            agc_interval_s,
            stop_after_s: None,
            formulation: Formulation::Dc,
            kp: 0.1,
            ki: 0.05,
            integral_reset: IntegralReset::Never,
            skip_agc_at_start: true,
            agc_gains: BTreeMap::new(),
            relax_min_output: true,
            push_renewables_each_second: false,
            nominal_freq_hz: 60.0,
            watchdog_every_s: None,
        }
    }

    /// Seconds the run will cover, honoring `stop_after_s`.
    pub fn total_seconds(&self) -> usize {
        let full = self.total_hours * self.seconds_per_hour;
        match self.stop_after_s {
            Some(limit) => full.min(limit),
            None => full,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new(1, 3600, 300, 4)
    }
}

/// One simulated second, in engineering units.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// Elapsed time at the end of the step (s).
    pub time: f64,
    /// Measured system frequency (Hz).
    pub frequency_hz: f64,
    /// Load multiplier applied during the step.
    pub load_factor: f64,
    /// Raw AGC signal (MW).
    pub ace_mw: f64,
    /// Total AGC correction in effect (MW).
    pub agc_mw: f64,
    pub hour: usize,
    pub second: usize,
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>6.0}s (h{} s{:>4}) | f={:>8.4} Hz  load={:.3} | ace={:>8.3} MW  agc={:>8.3} MW",
            self.time,
            self.hour,
            self.second,
            self.frequency_hz,
            self.load_factor,
            self.ace_mw,
            self.agc_mw,
        )
    }
}
