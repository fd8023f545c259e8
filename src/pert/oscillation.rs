use std::f64::consts::PI;

use super::{Field, HookContext, Perturbation};

/// Sinusoidal disturbance on an exciter voltage reference.
///
/// While `t1 < t < t2` the reference is `base + amplitude*sin(2π f t + phase)`;
/// from `t2` on it is held at its base value.
#[derive(Debug, Clone)]
pub struct ForcedOscillation {
    pub exciter: String,
    pub t1: f64,
    pub t2: f64,
    pub amplitude: f64,
    pub freq_hz: f64,
    pub phase_rad: f64,
}

impl ForcedOscillation {
    pub fn new(exciter: &str, t1: f64, t2: f64, amplitude: f64, freq_hz: f64) -> Self {
        Self {
            exciter: exciter.to_string(),
            t1,
            t2,
            amplitude,
            freq_hz,
            phase_rad: 0.0,
        }
    }

    pub fn with_phase(mut self, phase_rad: f64) -> Self {
        self.phase_rad = phase_rad;
        self
    }
}

impl Perturbation for ForcedOscillation {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        let Some(vref0) = ctx.base(Field::ExciterVref, &self.exciter) else {
            return;
        };
        if t > self.t1 && t < self.t2 {
            let vd = self.amplitude * (2.0 * PI * self.freq_hz * t + self.phase_rad).sin();
            ctx.set(Field::ExciterVref, &self.exciter, vref0 + vd);
        } else if t >= self.t2 {
            ctx.set(Field::ExciterVref, &self.exciter, vref0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pert::fixtures::{inputs, measurements};

    #[test]
    fn oscillates_inside_window_only() {
        let mut osc = ForcedOscillation::new("G1", 1.0, 10.0, 0.1, 0.6).with_phase(0.5 * PI);
        let mut inputs = inputs();
        let m = measurements(1.0);

        osc.apply(0.5, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(inputs.get(Field::ExciterVref, "G1"), Some(1.02));

        osc.apply(2.0, &mut HookContext::new(&mut inputs, &m));
        let expected = 1.02 + 0.1 * (2.0 * PI * 0.6 * 2.0 + 0.5 * PI).sin();
        let got = inputs.get(Field::ExciterVref, "G1").unwrap_or(f64::NAN);
        assert!((got - expected).abs() < 1e-12);

        osc.apply(10.0, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(inputs.get(Field::ExciterVref, "G1"), Some(1.02));
    }
}
