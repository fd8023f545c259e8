use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Field, HookContext, Perturbation};

/// Random active-power noise on a single load.
///
/// At each new timestamp the load's effective active power becomes
/// `base + N(loc, scale)`. Re-evaluating the same timestamp reuses the
/// previous draw.
///
/// # Examples
///
/// ```
/// use agc_cosim::pert::LoadNoise;
///
/// // 0.02 pu standard deviation on load PQ_1, reproducible with seed 7
/// let noise = LoadNoise::new("PQ_1", 0.0, 0.02, 7);
/// assert_eq!(noise.load(), "PQ_1");
/// ```
#[derive(Debug, Clone)]
pub struct LoadNoise {
    load: String,
    loc: f64,
    scale: f64,
    rng: StdRng,
    last: Option<(f64, f64)>,
}

impl LoadNoise {
    pub fn new(load: &str, loc: f64, scale: f64, seed: u64) -> Self {
        Self {
            load: load.to_string(),
            loc,
            scale,
            rng: StdRng::seed_from_u64(seed),
            last: None,
        }
    }

    pub fn load(&self) -> &str {
        &self.load
    }

    /// Most recent `(time, delta)` draw.
    pub fn last_draw(&self) -> Option<(f64, f64)> {
        self.last
    }
}

impl Perturbation for LoadNoise {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        let Some(p0) = ctx.base(Field::LoadP, &self.load) else {
            return;
        };
        let dp = match self.last {
            Some((t_last, dp)) if t_last == t => dp,
            _ => {
                let dp = self.loc + gaussian_noise(&mut self.rng, self.scale);
                self.last = Some((t, dp));
                dp
            }
        };
        ctx.set(Field::LoadP, &self.load, p0 + dp);
    }
}

/// Gaussian sample with mean 0 via the Box-Muller transform.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pert::fixtures::{inputs, measurements};

    #[test]
    fn same_timestamp_reuses_draw() {
        let mut noise = LoadNoise::new("PQ_1", 0.0, 0.02, 42);
        let mut inputs = inputs();
        let m = measurements(1.0);

        noise.apply(0.5, &mut HookContext::new(&mut inputs, &m));
        let first = inputs.get(Field::LoadP, "PQ_1");
        noise.apply(0.5, &mut HookContext::new(&mut inputs, &m));
        assert_eq!(inputs.get(Field::LoadP, "PQ_1"), first);
    }

    #[test]
    fn noise_is_applied_to_base_not_accumulated() {
        let mut noise = LoadNoise::new("PQ_1", 0.0, 0.02, 42);
        let mut inputs = inputs();
        let m = measurements(1.0);
        for i in 0..50 {
            noise.apply(i as f64 * 0.1, &mut HookContext::new(&mut inputs, &m));
            let (_, dp) = noise.last_draw().unwrap_or((0.0, f64::NAN));
            let p = inputs.get(Field::LoadP, "PQ_1").unwrap_or(f64::NAN);
            assert!((p - (1.0 + dp)).abs() < 1e-12);
        }
    }

    #[test]
    fn seeded_runs_match() {
        let mut a = LoadNoise::new("PQ_1", 0.01, 0.02, 9);
        let mut b = LoadNoise::new("PQ_1", 0.01, 0.02, 9);
        let mut ia = inputs();
        let mut ib = inputs();
        let m = measurements(1.0);
        for i in 0..10 {
            let t = i as f64;
            a.apply(t, &mut HookContext::new(&mut ia, &m));
            b.apply(t, &mut HookContext::new(&mut ib, &m));
            assert_eq!(a.last_draw(), b.last_draw());
        }
    }

    #[test]
    fn unknown_load_is_ignored() {
        let mut noise = LoadNoise::new("nope", 0.0, 0.02, 1);
        let mut inputs = inputs();
        let m = measurements(1.0);
        noise.apply(0.0, &mut HookContext::new(&mut inputs, &m));
        assert!(noise.last_draw().is_none());
    }

    #[test]
    fn zero_std_dev_is_silent() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
    }
}
