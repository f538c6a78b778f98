//! Derived view-models handed to consumers.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::family::Family;
use super::history::HistoryPoint;

/// Suffix of rate fields.
pub const RATE_SUFFIX: &str = "_per_second";
/// Suffix of change flags.
pub const CHANGED_SUFFIX: &str = "_changed";

/// Derived data for one entity (zone, peer, resolver, worker, cache).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub name: String,
    /// Current raw counter totals.
    pub counters: BTreeMap<&'static str, u64>,
    /// Live gauges, verbatim from the document.
    pub gauges: BTreeMap<&'static str, Value>,
    /// `<counter>_per_second`. A missing key means the rate is unknown.
    pub rates: BTreeMap<String, f64>,
    /// `<counter>_changed`, true only on the poll that saw an increase.
    pub changed: BTreeMap<String, bool>,
    pub history: Vec<HistoryPoint>,
}

impl EntityView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            rates: BTreeMap::new(),
            changed: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Per-second rate of a counter, if known.
    pub fn rate(&self, counter: &str) -> Option<f64> {
        self.rates.get(&format!("{}{}", counter, RATE_SUFFIX)).copied()
    }

    /// Whether a flashable counter increased on this poll.
    pub fn is_changed(&self, counter: &str) -> bool {
        self.changed.get(&format!("{}{}", counter, CHANGED_SUFFIX)).copied().unwrap_or(false)
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn gauge(&self, name: &str) -> Option<&Value> {
        self.gauges.get(name)
    }
}

/// Derived data for a whole family at one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyView {
    pub family: Family,
    pub updated_at_ms: u64,
    pub entities: BTreeMap<String, EntityView>,
}

impl FamilyView {
    /// A view with no entities, used when the family is absent.
    pub fn empty(family: Family, updated_at_ms: u64) -> Self {
        Self {
            family,
            updated_at_ms,
            entities: BTreeMap::new(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityView> {
        self.entities.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Entities with at least one raised change flag.
    pub fn flashing(&self) -> impl Iterator<Item = &EntityView> {
        self.entities.values().filter(|e| e.changed.values().any(|&c| c))
    }
}
