use super::{Field, HookContext, Perturbation};

/// Point-to-point injection switched on at a fixed time.
///
/// Emulates an HVDC link starting to act: after `t_on` the sending-end
/// converter, modelled as a load, withdraws `pin` / `qin`, and the
/// receiving-end converter, modelled as a generator, is driven to `pout` with
/// field voltage `vf`. Without a receiving end this is a plain load step.
#[derive(Debug, Clone)]
pub struct InjectionStep {
    pub t_on: f64,
    pub sending_load: String,
    pub pin: f64,
    pub qin: f64,
    pub receiving_gen: Option<String>,
    pub pout: f64,
    pub vf: f64,
}

impl InjectionStep {
    /// A load-only step on `sending_load` at `t_on`.
    pub fn load_step(t_on: f64, sending_load: &str, pin: f64, qin: f64) -> Self {
        Self {
            t_on,
            sending_load: sending_load.to_string(),
            pin,
            qin,
            receiving_gen: None,
            pout: 0.0,
            vf: 1.0,
        }
    }

    pub fn with_receiving_end(mut self, gen_id: &str, pout: f64, vf: f64) -> Self {
        self.receiving_gen = Some(gen_id.to_string());
        self.pout = pout;
        self.vf = vf;
        self
    }
}

impl Perturbation for InjectionStep {
    fn apply(&mut self, t: f64, ctx: &mut HookContext<'_>) {
        if t <= self.t_on {
            return;
        }
        ctx.set(Field::LoadP, &self.sending_load, self.pin);
        ctx.set(Field::LoadQ, &self.sending_load, self.qin);
        if let Some(gen_id) = &self.receiving_gen {
            ctx.set(Field::GenMechanical, gen_id, self.pout);
            ctx.set(Field::GenField, gen_id, self.vf);
        }
    }
}
