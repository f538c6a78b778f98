//! The generic per-family calculator.
//!
//! Each poll a calculator compares the counters of the current document
//! with those it saw on the previous poll:
//!
//! ```text
//! counters(prev) ─┐
//!                 ├─▶ delta / elapsed ─▶ max(0, ·) ─▶ <field>_per_second
//! counters(now) ──┤
//!                 ├─▶ now > prev ─▶ <field>_changed   (flashable fields)
//!                 └─▶ sampled rates + gauges ─▶ bounded history
//! ```
//!
//! and then replaces its state with the current values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::clock::PollTime;
use super::family::{Family, FamilySpec};
use super::field::lookup;
use super::history::{HistoryPoint, Series};
use super::view::{EntityView, FamilyView, CHANGED_SUFFIX, RATE_SUFFIX};

/// Counter readings of one entity.
type Counters = BTreeMap<&'static str, u64>;

#[derive(Debug, Clone)]
struct State {
    previous: BTreeMap<String, Counters>,
    previous_at: PollTime,
    history: BTreeMap<String, Series>,
}

/// Stateful calculator for one metric family.
#[derive(Debug, Clone)]
pub struct Calculator {
    spec: &'static FamilySpec,
    history_limit: usize,
    state: Option<State>,
}

impl Calculator {
    pub fn new(family: Family, history_limit: usize) -> Self {
        Self {
            spec: family.spec(),
            history_limit,
            state: None,
        }
    }

    pub fn family(&self) -> Family {
        self.spec.family
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// True once the calculator has seen its family at least once since
    /// the last reset or retraction.
    pub fn is_tracking(&self) -> bool {
        self.state.is_some()
    }

    /// Drop all state, including history.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Compute the view for one poll.
    ///
    /// `resource` is the family's object in the status document, or `None`
    /// when the document doesn't carry it. An absent or non-object resource
    /// yields an empty view and discards all history.
    pub fn calculate(&mut self, resource: Option<&Value>, now: PollTime) -> FamilyView {
        let family = self.spec.family;
        let Some(resource) = resource.and_then(Value::as_object) else {
            if self.state.take().is_some() {
                debug!(%family, "family retracted, dropping history");
            }
            return FamilyView::empty(family, now.wall_ms);
        };

        let mut previous_state = self.state.take();
        let elapsed_secs = previous_state.as_ref().and_then(|s| now.secs_since(&s.previous_at));

        let mut view = FamilyView::empty(family, now.wall_ms);
        let mut next = State {
            previous: BTreeMap::new(),
            previous_at: now,
            history: BTreeMap::new(),
        };

        for entry in self.spec.layout.entities(resource) {
            let (name, entity) = match entry {
                Ok(pair) => pair,
                Err(name) => {
                    warn!(%family, entity = %name, "skipping malformed entity");
                    continue;
                }
            };

            let mut history = previous_state
                .as_mut()
                .and_then(|s| s.history.remove(&name))
                .unwrap_or_else(|| Series::new(self.history_limit));
            let previous = previous_state.as_ref().and_then(|s| s.previous.get(&name));

            let current = self.extract_counters(entity);
            let mut entity_view = EntityView::new(name.clone());

            if let (Some(previous), Some(elapsed)) = (previous, elapsed_secs) {
                for (field, value) in &current {
                    if let Some(prev) = previous.get(field) {
                        let rate = ((*value as f64 - *prev as f64) / elapsed).max(0.0);
                        entity_view.rates.insert(format!("{}{}", field, RATE_SUFFIX), rate);
                    }
                }
            }

            for &field in self.spec.flashable {
                let increased = match (current.get(field), previous.and_then(|p| p.get(field))) {
                    (Some(now), Some(before)) => now > before,
                    _ => false,
                };
                entity_view.changed.insert(format!("{}{}", field, CHANGED_SUFFIX), increased);
            }

            for gauge in self.spec.gauges {
                if let Some(value) = lookup(entity, gauge.path) {
                    entity_view.gauges.insert(gauge.name, value.clone());
                }
            }

            history.push(self.sample(&entity_view, now.wall_ms));
            entity_view.history = history.to_vec();
            entity_view.counters = current.clone();

            next.previous.insert(name.clone(), current);
            next.history.insert(name.clone(), history);
            view.entities.insert(name, entity_view);
        }

        self.state = Some(next);
        view
    }

    fn extract_counters(&self, entity: &Map<String, Value>) -> Counters {
        self.spec
            .counters
            .iter()
            .filter_map(|field| field.extract(entity).map(|v| (field.name, v)))
            .collect()
    }

    fn sample(&self, entity: &EntityView, now_ms: u64) -> HistoryPoint {
        let values = self
            .spec
            .sampled
            .iter()
            .filter_map(|&name| {
                let value = entity
                    .rate(name)
                    .or_else(|| entity.gauge(name).and_then(Value::as_f64))?;
                Some((name, value))
            })
            .collect();

        HistoryPoint {
            timestamp_ms: now_ms,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zones(requests: u64, errors: u64) -> Value {
        json!({
            "example.com": {
                "requests": { "total": requests, "processing": 1 },
                "responses": { "200": requests - errors, "503": errors },
                "data": { "received": requests * 100, "sent": requests * 1000 }
            }
        })
    }

    fn entity(view: &FamilyView) -> &EntityView {
        view.entity("example.com").unwrap()
    }

    #[test]
    fn first_call_seeds_state_with_unknown_rates() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        let view = calc.calculate(Some(&zones(100, 0)), PollTime::at(0));

        let e = entity(&view);
        assert!(e.rates.is_empty());
        assert!(e.changed.values().all(|c| !c));
        assert_eq!(e.history.len(), 1);
        assert_eq!(e.counter("requests"), Some(100));
        assert_eq!(e.gauge("processing"), Some(&json!(1)));
        assert!(calc.is_tracking());
    }

    #[test]
    fn rate_is_delta_over_elapsed_seconds() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        calc.calculate(Some(&zones(100, 0)), PollTime::at(0));
        let view = calc.calculate(Some(&zones(150, 0)), PollTime::at(10_000));

        assert_eq!(entity(&view).rate("requests"), Some(5.0));
        assert_eq!(entity(&view).rate("sent"), Some(5000.0));
    }

    #[test]
    fn counter_regression_clamps_to_zero() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        calc.calculate(Some(&zones(100, 0)), PollTime::at(0));
        let view = calc.calculate(Some(&zones(50, 0)), PollTime::at(10_000));

        assert_eq!(entity(&view).rate("requests"), Some(0.0));
    }

    #[test]
    fn zero_elapsed_leaves_rates_unknown() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        calc.calculate(Some(&zones(100, 0)), PollTime::at(5_000));
        let view = calc.calculate(Some(&zones(150, 0)), PollTime::at(5_000));

        assert_eq!(entity(&view).rate("requests"), None);
    }

    #[test]
    fn change_flags_are_transient() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        calc.calculate(Some(&zones(100, 0)), PollTime::at(0));

        let view = calc.calculate(Some(&zones(110, 3)), PollTime::at(1_000));
        assert!(entity(&view).is_changed("5xx"));
        assert!(!entity(&view).is_changed("4xx"));

        let view = calc.calculate(Some(&zones(120, 3)), PollTime::at(2_000));
        assert!(!entity(&view).is_changed("5xx"));
    }

    #[test]
    fn history_is_bounded_and_keeps_newest() {
        let mut calc = Calculator::new(Family::ServerZones, 5);
        let mut view = None;
        for i in 0..12u64 {
            view = Some(calc.calculate(Some(&zones(100 + i, 0)), PollTime::at(i * 1_000)));
        }

        let view = view.unwrap();
        let stamps: Vec<u64> = entity(&view).history.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![7_000, 8_000, 9_000, 10_000, 11_000]);
        assert_eq!(entity(&view).history[4].values["requests"], 1.0);
    }

    #[test]
    fn vanished_entities_drop_history_and_new_ones_start_fresh() {
        let mut calc = Calculator::new(Family::LimitReqs, 10);
        calc.calculate(Some(&json!({ "one": { "passed": 1 } })), PollTime::at(0));
        calc.calculate(Some(&json!({ "one": { "passed": 2 } })), PollTime::at(1_000));

        let view = calc.calculate(
            Some(&json!({ "two": { "passed": 50 } })),
            PollTime::at(2_000),
        );
        assert!(view.entity("one").is_none());
        let two = view.entity("two").unwrap();
        assert_eq!(two.history.len(), 1);
        assert_eq!(two.rate("passed"), None);

        // "one" comes back without its old history
        let view = calc.calculate(Some(&json!({ "one": { "passed": 9 } })), PollTime::at(3_000));
        assert_eq!(view.entity("one").unwrap().history.len(), 1);
    }

    #[test]
    fn absent_family_yields_empty_view_and_drops_state() {
        let mut calc = Calculator::new(Family::Caches, 10);
        let cache = json!({ "cache": { "size": 10, "hit": { "responses": 1 } } });
        calc.calculate(Some(&cache), PollTime::at(0));

        let view = calc.calculate(None, PollTime::at(1_000));
        assert!(view.is_empty());
        assert!(!calc.is_tracking());

        let view = calc.calculate(Some(&json!("disabled")), PollTime::at(2_000));
        assert!(view.is_empty());
    }

    #[test]
    fn malformed_entities_do_not_block_siblings() {
        let mut calc = Calculator::new(Family::LimitConns, 10);
        let resource = json!({
            "good": { "passed": 10, "rejected": "lots" },
            "bad": 42
        });

        let view = calc.calculate(Some(&resource), PollTime::at(0));
        assert_eq!(view.len(), 1);
        let good = view.entity("good").unwrap();
        assert_eq!(good.counter("passed"), Some(10));
        assert_eq!(good.counter("rejected"), None);
        assert!(!good.is_changed("rejected"));
    }

    #[test]
    fn upstream_peers_flash_on_failures() {
        let peers = |fails: u64| {
            json!({
                "backend": {
                    "peers": {
                        "10.0.0.1:80": {
                            "server": "10.0.0.1:80",
                            "state": "up",
                            "selected": { "current": 2, "total": 40 },
                            "health": { "fails": fails, "unavailable": 0 }
                        }
                    }
                }
            })
        };

        let mut calc = Calculator::new(Family::Upstreams, 10);
        calc.calculate(Some(&peers(0)), PollTime::at(0));
        let view = calc.calculate(Some(&peers(1)), PollTime::at(1_000));

        let peer = view.entity("backend/10.0.0.1:80").unwrap();
        assert!(peer.is_changed("fails"));
        assert_eq!(peer.gauge("state"), Some(&json!("up")));
        assert_eq!(peer.history[1].values["active"], 2.0);
    }

    #[test]
    fn upstream_group_without_peers_is_empty_not_malformed() {
        let mut calc = Calculator::new(Family::Upstreams, 10);
        let resource = json!({
            "backend": { "peers": { "10.0.0.1:80": { "selected": { "total": 1 } } } },
            "resolving": { "keepalive": 0 }
        });

        let view = calc.calculate(Some(&resource), PollTime::at(0));
        assert_eq!(view.len(), 1);
        assert!(view.entity("backend/10.0.0.1:80").is_some());
        assert!(calc.is_tracking());
    }

    #[test]
    fn rates_follow_monotonic_clock_across_wall_clock_steps() {
        let mut calc = Calculator::new(Family::ServerZones, 10);
        calc.calculate(
            Some(&zones(100, 0)),
            PollTime {
                wall_ms: 60_000,
                monotonic_ms: 0,
            },
        );

        // Wall clock stepped back by a minute while 10s really passed
        let view = calc.calculate(
            Some(&zones(150, 0)),
            PollTime {
                wall_ms: 10_000,
                monotonic_ms: 10_000,
            },
        );

        assert_eq!(entity(&view).rate("requests"), Some(5.0));
        assert_eq!(view.updated_at_ms, 10_000);
        assert_eq!(entity(&view).history[1].timestamp_ms, 10_000);
    }

    #[test]
    fn reset_forgets_previous_counters() {
        let mut calc = Calculator::new(Family::Connections, 10);
        calc.calculate(Some(&json!({ "accepted": 10, "active": 1 })), PollTime::at(0));
        calc.reset();

        let view = calc.calculate(
            Some(&json!({ "accepted": 20, "active": 1 })),
            PollTime::at(1_000),
        );
        assert_eq!(view.entity("connections").unwrap().rate("accepted"), None);
    }
}
