//! Runs every family's calculator over one status document.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::calculator::Calculator;
use super::clock::PollTime;
use super::family::Family;
use super::history::DEFAULT_HISTORY_SIZE;
use super::registry::EndpointPath;
use super::view::FamilyView;
use crate::source::StatusSnapshot;

/// Views computed in one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct Cycle {
    /// Views of the families present in the document or just retracted,
    /// keyed by endpoint.
    pub views: BTreeMap<EndpointPath, FamilyView>,
    /// Endpoints whose data changed this cycle: present families plus
    /// families that were just retracted.
    pub updated: BTreeSet<EndpointPath>,
}

/// One calculator per metric family.
#[derive(Debug, Clone)]
pub struct Engine {
    calculators: BTreeMap<Family, Calculator>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE, &BTreeMap::new())
    }
}

impl Engine {
    /// Create an engine with a default history limit and per-family
    /// overrides.
    pub fn new(history_limit: usize, overrides: &BTreeMap<Family, usize>) -> Self {
        let calculators = Family::ALL
            .into_iter()
            .map(|family| {
                let limit = overrides.get(&family).copied().unwrap_or(history_limit);
                (family, Calculator::new(family, limit))
            })
            .collect();
        Self { calculators }
    }

    pub fn calculator(&self, family: Family) -> Option<&Calculator> {
        self.calculators.get(&family)
    }

    /// Run every calculator for which `wanted` returns true, in sequence.
    ///
    /// Calculators that are not wanted are reset so that stale history is
    /// not mixed with fresh data once a consumer asks for them again.
    pub fn compute(
        &mut self,
        snapshot: &StatusSnapshot,
        now: PollTime,
        wanted: impl Fn(Family) -> bool,
    ) -> Cycle {
        let mut cycle = Cycle::default();

        for (family, calculator) in self.calculators.iter_mut() {
            if !wanted(*family) {
                calculator.reset();
                continue;
            }

            let spec = family.spec();
            let resource = spec.resource(snapshot);
            let was_tracking = calculator.is_tracking();
            let view = calculator.calculate(resource, now);
            let path = family.endpoint();

            // Families the server has never exposed stay "not yet available"
            if calculator.is_tracking() || was_tracking {
                cycle.updated.insert(path.clone());
                cycle.views.insert(path, view);
            }
        }

        debug!(
            updated = cycle.updated.len(),
            computed = cycle.views.len(),
            "computed poll cycle"
        );
        cycle
    }

    /// Drop every calculator's state and history.
    pub fn reset(&mut self) {
        for calculator in self.calculators.values_mut() {
            calculator.reset();
        }
    }
}
