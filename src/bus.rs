//! Fan-out of "new data" notifications and reads of the latest views.
//!
//! The session publishes a whole poll cycle at once: every family's view is
//! installed before any callback runs, so a callback that reads several
//! endpoints always sees them from the same cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use tracing::info;

use crate::data::{EndpointPath, Family, FamilyView};
use crate::source::StatusSnapshot;

/// Callback run after a poll cycle that touched a watched endpoint.
pub type Callback = Box<dyn FnMut(&Latest) + Send>;

/// Result of reading one endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Availability<'a> {
    Available(&'a FamilyView),
    /// A resource without a metric family (e.g. `angie` or `http` itself),
    /// passed through from the latest document.
    Raw(&'a Value),
    /// No poll cycle has produced data for this endpoint yet.
    NotYetAvailable,
}

impl<'a> Availability<'a> {
    pub fn view(&self) -> Option<&'a FamilyView> {
        match self {
            Availability::Available(view) => Some(view),
            _ => None,
        }
    }

    pub fn raw(&self) -> Option<&'a Value> {
        match self {
            Availability::Raw(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Availability::NotYetAvailable)
    }
}

/// The views of the most recent completed poll cycle.
#[derive(Debug, Clone, Default)]
pub struct Latest {
    cycle: u64,
    views: BTreeMap<EndpointPath, FamilyView>,
    resources: StatusSnapshot,
}

impl Latest {
    /// Number of cycles published so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Read one view per path, in the order given.
    pub fn get(&self, paths: &[EndpointPath]) -> Vec<Availability<'_>> {
        paths.iter().map(|p| self.get_one(p)).collect()
    }

    /// Family paths resolve to computed views only. Any other path resolves
    /// to its raw value in the latest document, if present.
    pub fn get_one(&self, path: &EndpointPath) -> Availability<'_> {
        if let Some(view) = self.views.get(path) {
            return Availability::Available(view);
        }
        if Family::for_endpoint(path).is_some() {
            return Availability::NotYetAvailable;
        }
        let raw = match path {
            EndpointPath::Top(name) => self.resources.get(name),
            EndpointPath::Nested(ns, name) => {
                self.resources.resource(&[ns.as_str(), name.as_str()])
            }
        };
        match raw {
            Some(value) => Availability::Raw(value),
            None => Availability::NotYetAvailable,
        }
    }

    pub fn views(&self) -> &BTreeMap<EndpointPath, FamilyView> {
        &self.views
    }
}

struct Subscription {
    paths: BTreeSet<EndpointPath>,
    callback: Callback,
}

impl Subscription {
    fn wants(&self, updated: &BTreeSet<EndpointPath>) -> bool {
        self.paths.is_empty() || updated.iter().any(|u| self.watches(u))
    }

    fn watches(&self, path: &EndpointPath) -> bool {
        self.paths.iter().any(|p| p.covers(path))
    }
}

/// Subscription registry plus the latest published views.
#[derive(Default)]
pub struct Bus {
    latest: Latest,
    subscriptions: Vec<Subscription>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after every cycle that updated one of `paths`, or
    /// after every cycle when `paths` is empty.
    pub fn subscribe<I>(&mut self, paths: I, callback: Callback)
    where
        I: IntoIterator<Item = EndpointPath>,
    {
        let paths: BTreeSet<_> = paths.into_iter().collect();
        info!(paths = ?paths, "subscribed");
        self.subscriptions.push(Subscription { paths, callback });
    }

    /// Remove the registrations made for exactly this set of paths.
    ///
    /// Returns how many were removed.
    pub fn unsubscribe<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = EndpointPath>,
    {
        let paths: BTreeSet<_> = paths.into_iter().collect();
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.paths != paths);
        let removed = before - self.subscriptions.len();
        if removed > 0 {
            info!(paths = ?paths, "unsubscribed");
        }
        removed
    }

    pub fn get(&self, paths: &[EndpointPath]) -> Vec<Availability<'_>> {
        self.latest.get(paths)
    }

    pub fn latest(&self) -> &Latest {
        &self.latest
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether any subscriber cares about `path`, directly or through its
    /// namespace.
    pub fn is_watched(&self, path: &EndpointPath) -> bool {
        self.subscriptions.iter().any(|s| s.paths.is_empty() || s.watches(path))
    }

    /// Install a completed cycle, then notify interested subscribers.
    pub fn publish(
        &mut self,
        views: BTreeMap<EndpointPath, FamilyView>,
        resources: StatusSnapshot,
        updated: &BTreeSet<EndpointPath>,
    ) {
        self.latest.views = views;
        self.latest.resources = resources;
        self.latest.cycle += 1;

        let latest = &self.latest;
        for subscription in &mut self.subscriptions {
            if subscription.wants(updated) {
                (subscription.callback)(latest);
            }
        }
    }

    /// Forget all published views. Subscriptions stay registered.
    pub fn clear(&mut self) {
        self.latest = Latest::default();
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("cycle", &self.latest.cycle)
            .field("views", &self.latest.views.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
