//! Area control error PI loop.

use serde::Deserialize;

/// Running state of the AGC PI controller.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AceState {
    /// Latest controller output (pu on system base).
    pub raw: f64,
    /// Sum of measured area errors since the last reset.
    pub integral: f64,
}

/// When the ACE integral is cleared during a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegralReset {
    /// Only at controller start.
    #[default]
    Never,
    /// At the start of every dispatch interval.
    EachDispatch,
}

/// One PI update.
///
/// Returns `(raw, new_integral)` where `raw = -(kp*error + ki*integral)` is
/// computed from the integral *before* this second's error is accumulated.
pub fn pi_step(error: f64, kp: f64, ki: f64, integral: f64) -> (f64, f64) {
    let raw = -(kp * error + ki * integral);
    (raw, integral + error)
}

/// PI controller owning the ACE state.
#[derive(Debug, Clone)]
pub struct AgcController {
    kp: f64,
    ki: f64,
    reset: IntegralReset,
    state: AceState,
}

impl AgcController {
    pub fn new(kp: f64, ki: f64, reset: IntegralReset) -> Self {
        Self {
            kp,
            ki,
            reset,
            state: AceState::default(),
        }
    }

    pub fn state(&self) -> AceState {
        self.state
    }

    /// Feeds one second of measured area error.
    pub fn update(&mut self, error: f64) -> AceState {
        let (raw, integral) = pi_step(error, self.kp, self.ki, self.state.integral);
        self.state = AceState { raw, integral };
        self.state
    }

    /// Zeroes the controller state.
    pub fn reset(&mut self) {
        self.state = AceState::default();
    }

    /// Applies the configured reset policy at a dispatch boundary.
    pub fn on_dispatch_boundary(&mut self) {
        if self.reset == IntegralReset::EachDispatch {
            self.reset();
        }
    }
}
