use super::{Field, HookContext, Perturbation};

/// Takes a generator out of service at `t_trip`.
///
/// The topology flag is raised only on the evaluation that actually changes
/// the status, so repeated evaluations after the trip are free.
#[derive(Debug, Clone)]
pub struct GeneratorTrip {
    pub generator: String,
    pub t_trip: f64,
}

impl GeneratorTrip {
    pub fn new(generator: &str, t_trip: f64) -> Self {
        Self {
            generator: generator.to_string(),
            t_trip,
        }
    }
}

impl Perturbation for GeneratorTrip {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        if t < self.t_trip {
            return;
        }
        match ctx.get(Field::GenStatus, &self.generator) {
            Some(status) if status != 0.0 => {
                ctx.set(Field::GenStatus, &self.generator, 0.0);
                ctx.mark_topology_changed();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pert::fixtures::{inputs, measurements};

    #[test]
    fn flags_topology_once() {
        let mut trip = GeneratorTrip::new("G2", 5.0);
        let mut inputs = inputs();
        let m = measurements(1.0);

        let mut ctx = HookContext::new(&mut inputs, &m);
        trip.apply(4.0, &mut ctx);
        assert!(!ctx.topology_changed());

        let mut ctx = HookContext::new(&mut inputs, &m);
        trip.apply(5.0, &mut ctx);
        assert!(ctx.topology_changed());

        let mut ctx = HookContext::new(&mut inputs, &m);
        trip.apply(5.0, &mut ctx);
        assert!(!ctx.topology_changed());
        assert_eq!(inputs.get(Field::GenStatus, "G2"), Some(0.0));
    }
}
