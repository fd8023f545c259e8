//! Generator-to-control-device link table and AGC signal distribution.

use std::collections::BTreeMap;

use super::collaborator::{ControlKind, ControlLink};
use super::participation::ParticipationFactors;

/// One row of the link table.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEntry {
    pub generator: String,
    pub governor: bool,
    pub distributed_inverter: bool,
    pub renewable_inverter: bool,
    /// Multiplier applied on top of the participation factor.
    pub gain: f64,
}

impl LinkEntry {
    pub fn has(&self, kind: ControlKind) -> bool {
        match kind {
            ControlKind::Governor => self.governor,
            ControlKind::DistributedInverter => self.distributed_inverter,
            ControlKind::RenewableInverter => self.renewable_inverter,
        }
    }
}

/// A signal to write to one control device.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub kind: ControlKind,
    pub generator: String,
    /// Signal value (pu).
    pub value: f64,
}

/// Maps each controllable generator to its control devices.
///
/// Rebuilt every time the dynamic simulator is regenerated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkTable {
    entries: Vec<LinkEntry>,
}

impl LinkTable {
    /// Builds the table for `generators` from the simulator's control links.
    ///
    /// Generators with no link get an all-false row so they still take part
    /// in participation accounting. Gains default to `1.0`.
    pub fn build(
        generators: &[String],
        links: &[ControlLink],
        gains: &BTreeMap<String, f64>,
    ) -> Self {
        let entries = generators
            .iter()
            .map(|id| {
                let link = links.iter().find(|l| &l.generator == id);
                let has = |kind: ControlKind| link.is_some_and(|l| l.kinds.contains(&kind));
                LinkEntry {
                    generator: id.clone(),
                    governor: has(ControlKind::Governor),
                    distributed_inverter: has(ControlKind::DistributedInverter),
                    renewable_inverter: has(ControlKind::RenewableInverter),
                    gain: gains.get(id).copied().unwrap_or(1.0),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[LinkEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-device AGC corrections: `ace_raw * pf * gain` on linked devices.
    ///
    /// Emits one correction for every (generator, kind) pair. Devices a
    /// generator does not have get exactly `0.0`, whatever `ace_raw` is, so
    /// that a device losing its share is actively cleared.
    pub fn corrections(&self, ace_raw: f64, factors: &ParticipationFactors) -> Vec<Correction> {
        let mut out = Vec::with_capacity(self.entries.len() * ControlKind::ALL.len());
        for entry in &self.entries {
            let pf = factors.get(&entry.generator);
            for kind in ControlKind::ALL {
                let value = if entry.has(kind) {
                    ace_raw * pf * entry.gain
                } else {
                    0.0
                };
                out.push(Correction {
                    kind,
                    generator: entry.generator.clone(),
                    value,
                });
            }
        }
        out
    }
}

/// Sum of all correction values (pu).
pub fn total_correction(corrections: &[Correction]) -> f64 {
    corrections.iter().map(|c| c.value).sum()
}
