//! AGC participation factors.

use std::collections::BTreeSet;

use crate::grid::Network;

/// Share of the AGC correction assigned to each controllable generator.
///
/// Factors are proportional to nameplate capacity among online units and
/// are held fixed for a whole dispatch interval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParticipationFactors {
    ids: Vec<String>,
    factors: Vec<f64>,
}

impl ParticipationFactors {
    /// Computes `(online ? capacity : 0) / sum(online capacity)` over `ids`.
    ///
    /// Generators missing from `network` count as offline. If nothing is
    /// online every factor is zero.
    pub fn compute(ids: &[String], network: &Network, online: &BTreeSet<String>) -> Self {
        let capacities: Vec<f64> = ids
            .iter()
            .map(|id| match network.generator(id) {
                Some(g) if online.contains(id) => g.capacity.max(0.0),
                _ => 0.0,
            })
            .collect();

        let total: f64 = capacities.iter().sum();
        let factors = if total > 0.0 {
            capacities.iter().map(|c| c / total).collect()
        } else {
            vec![0.0; ids.len()]
        };

        Self {
            ids: ids.to_vec(),
            factors,
        }
    }

    pub fn get(&self, id: &str) -> f64 {
        self.ids
            .iter()
            .position(|i| i == id)
            .map_or(0.0, |k| self.factors[k])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ids.iter().map(String::as_str).zip(self.factors.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.factors.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
