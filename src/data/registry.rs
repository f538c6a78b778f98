//! Endpoint availability tracking.
//!
//! Which optional status sections a server exposes depends on its build and
//! configuration. The registry mirrors the resource tree of the most recent
//! status document in three levels:
//!
//! ```text
//! level 1   angie  connections  slabs  resolvers  http  stream
//! level 2                                         │     │
//!                                          ┌──────┘     └──────┐
//! level 3                        server_zones, caches,   server_zones,
//!                                upstreams, ...          limit_conns, ...
//! ```
//!
//! Level 2 is fixed to the two server modules; only level 1 and level 3
//! change over a session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::source::StatusSnapshot;

/// One of the two server modules that group sub-resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Http,
    Stream,
}

impl Namespace {
    /// Both namespaces, in display order.
    pub const ALL: [Namespace; 2] = [Namespace::Http, Namespace::Stream];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Http => "http",
            Namespace::Stream => "stream",
        }
    }

    fn index(self) -> usize {
        match self {
            Namespace::Http => 0,
            Namespace::Stream => 1,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Namespace::Http),
            "stream" => Ok(Namespace::Stream),
            other => Err(ConsoleError::UnknownNamespace(other.to_string())),
        }
    }
}

/// Address of an optional status sub-resource.
///
/// Written as `level1` or `namespace/level3`, e.g. `resolvers` or
/// `http/server_zones`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndpointPath {
    /// A top-level resource such as `slabs` or `http` itself.
    Top(String),
    /// A sub-resource under one of the server modules.
    Nested(Namespace, String),
}

impl EndpointPath {
    pub fn top(name: impl Into<String>) -> Self {
        EndpointPath::Top(name.into())
    }

    pub fn nested(namespace: Namespace, name: impl Into<String>) -> Self {
        EndpointPath::Nested(namespace, name.into())
    }

    /// The level-1 component.
    pub fn level1(&self) -> &str {
        match self {
            EndpointPath::Top(name) => name,
            EndpointPath::Nested(ns, _) => ns.as_str(),
        }
    }

    /// The level-3 component, if any.
    pub fn level3(&self) -> Option<&str> {
        match self {
            EndpointPath::Top(_) => None,
            EndpointPath::Nested(_, name) => Some(name),
        }
    }

    /// Whether `other` is this path or lies beneath it.
    ///
    /// `http` covers `http/server_zones`; nothing else covers across levels.
    pub fn covers(&self, other: &EndpointPath) -> bool {
        match (self, other) {
            (EndpointPath::Top(name), EndpointPath::Nested(ns, _)) => name == ns.as_str(),
            _ => self == other,
        }
    }
}

impl fmt::Display for EndpointPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointPath::Top(name) => f.write_str(name),
            EndpointPath::Nested(ns, name) => write!(f, "{}/{}", ns, name),
        }
    }
}

impl FromStr for EndpointPath {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            None => Ok(EndpointPath::top(s)),
            Some((ns, name)) => Ok(EndpointPath::nested(ns.parse()?, name)),
        }
    }
}

impl Serialize for EndpointPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Tracks which optional status sections currently exist.
///
/// Fills are set unions: feeding the same keys twice leaves the registry
/// unchanged. No operation fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointRegistry {
    first_level: Vec<String>,
    /// Indexed by `Namespace::index`.
    third_level: [Vec<String>; 2],
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add top-level resource names.
    pub fn fill_first_level<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        union_into(&mut self.first_level, keys);
    }

    /// Add sub-resource names under a namespace.
    pub fn fill_third_level<I, S>(&mut self, namespace: Namespace, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        union_into(&mut self.third_level[namespace.index()], keys);
    }

    pub fn first_level_includes(&self, name: &str) -> bool {
        self.first_level.iter().any(|n| n == name)
    }

    /// True while the namespace has at least one sub-resource.
    pub fn second_level_includes(&self, namespace: Namespace) -> bool {
        !self.third_level[namespace.index()].is_empty()
    }

    pub fn third_level_includes(&self, namespace: Namespace, name: &str) -> bool {
        self.third_level[namespace.index()].iter().any(|n| n == name)
    }

    pub fn first_level(&self) -> &[String] {
        &self.first_level
    }

    /// Always both namespaces; level 2 never changes.
    pub fn second_level(&self) -> [Namespace; 2] {
        Namespace::ALL
    }

    pub fn third_level(&self, namespace: Namespace) -> &[String] {
        &self.third_level[namespace.index()]
    }

    /// Every present endpoint: level-1 names, then each namespace's
    /// sub-resources.
    pub fn paths(&self) -> Vec<EndpointPath> {
        let top = self.first_level.iter().cloned().map(EndpointPath::Top);
        let nested = Namespace::ALL.into_iter().flat_map(|ns| {
            self.third_level(ns)
                .iter()
                .map(move |name| EndpointPath::Nested(ns, name.clone()))
        });
        top.chain(nested).collect()
    }

    /// Whether the endpoint at `path` is currently present.
    pub fn includes(&self, path: &EndpointPath) -> bool {
        match path {
            EndpointPath::Top(name) => self.first_level_includes(name),
            EndpointPath::Nested(ns, name) => self.third_level_includes(*ns, name),
        }
    }

    /// Retract an endpoint.
    ///
    /// Removing the last sub-resource of a namespace also retracts the
    /// namespace's level-1 entry. Removing a namespace at level 1 clears its
    /// sub-resources. Absent paths are ignored.
    pub fn remove_endpoint(&mut self, path: &EndpointPath) {
        match path {
            EndpointPath::Nested(ns, name) => {
                let bucket = &mut self.third_level[ns.index()];
                let Some(pos) = bucket.iter().position(|n| n == name) else {
                    return;
                };
                bucket.remove(pos);
                if bucket.is_empty() {
                    self.first_level.retain(|n| n != ns.as_str());
                }
            }
            EndpointPath::Top(name) => {
                self.first_level.retain(|n| n != name);
                if let Ok(ns) = name.parse::<Namespace>() {
                    self.third_level[ns.index()].clear();
                }
            }
        }
    }

    /// Clear both levels.
    pub fn reset(&mut self) {
        self.first_level.clear();
        for bucket in &mut self.third_level {
            bucket.clear();
        }
    }

    /// Bring the registry in line with one status document.
    ///
    /// Endpoints missing from the document are retracted first, then the
    /// present keys are filled in.
    pub fn sync(&mut self, snapshot: &StatusSnapshot) {
        for ns in Namespace::ALL {
            let present = snapshot.get(ns.as_str()).and_then(|v| v.as_object());
            let gone: Vec<String> = self
                .third_level(ns)
                .iter()
                .filter(|name| !present.is_some_and(|obj| obj.contains_key(name.as_str())))
                .cloned()
                .collect();
            if snapshot.get(ns.as_str()).is_some() {
                // The namespace stays at level 1, only its sub-resources churn
                self.third_level[ns.index()].retain(|n| !gone.contains(n));
            } else {
                for name in gone {
                    self.remove_endpoint(&EndpointPath::Nested(ns, name));
                }
            }
        }

        let gone: Vec<String> = self
            .first_level
            .iter()
            .filter(|name| snapshot.get(name).is_none())
            .cloned()
            .collect();
        for name in gone {
            self.remove_endpoint(&EndpointPath::Top(name));
        }

        self.fill_first_level(snapshot.keys());
        for ns in Namespace::ALL {
            if let Some(obj) = snapshot.get(ns.as_str()).and_then(|v| v.as_object()) {
                self.fill_third_level(ns, obj.keys().map(String::as_str));
            }
        }
    }
}

fn union_into<I, S>(target: &mut Vec<String>, keys: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for key in keys {
        let key = key.into();
        if !target.contains(&key) {
            target.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(name: &str) -> EndpointPath {
        EndpointPath::nested(Namespace::Http, name)
    }

    #[test]
    fn fill_first_level_makes_names_present() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["angie", "connections", "http"]);

        assert!(r.first_level_includes("angie"));
        assert!(r.first_level_includes("http"));
        assert!(!r.first_level_includes("stream"));
    }

    #[test]
    fn fills_are_idempotent() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["http", "stream"]);
        r.fill_first_level(["stream", "slabs"]);
        r.fill_third_level(Namespace::Http, ["caches"]);
        r.fill_third_level(Namespace::Http, ["caches", "upstreams"]);

        assert_eq!(r.first_level(), ["http", "stream", "slabs"]);
        assert_eq!(r.third_level(Namespace::Http), ["caches", "upstreams"]);
    }

    #[test]
    fn second_level_is_fixed() {
        let r = EndpointRegistry::new();
        assert_eq!(r.second_level(), [Namespace::Http, Namespace::Stream]);
        assert!(!r.second_level_includes(Namespace::Http));
    }

    #[test]
    fn removing_last_sub_resource_retracts_namespace() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["http", "stream"]);
        r.fill_third_level(Namespace::Http, ["server_zones", "location_zones"]);

        r.remove_endpoint(&http("server_zones"));
        assert_eq!(r.third_level(Namespace::Http), ["location_zones"]);
        assert!(!r.third_level_includes(Namespace::Http, "server_zones"));
        assert!(r.first_level_includes("http"));

        r.remove_endpoint(&http("location_zones"));
        assert!(r.third_level(Namespace::Http).is_empty());
        assert!(!r.first_level_includes("http"));
        assert!(r.first_level_includes("stream"));
    }

    #[test]
    fn removing_absent_paths_is_a_no_op() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["http"]);
        r.fill_third_level(Namespace::Http, ["caches"]);
        let before = r.clone();

        r.remove_endpoint(&http("upstreams"));
        r.remove_endpoint(&EndpointPath::nested(Namespace::Stream, "server_zones"));
        r.remove_endpoint(&EndpointPath::top("resolvers"));

        assert_eq!(r, before);
    }

    #[test]
    fn removing_top_level_namespace_clears_its_bucket() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["stream"]);
        r.fill_third_level(Namespace::Stream, ["server_zones"]);

        r.remove_endpoint(&EndpointPath::top("stream"));

        assert!(!r.first_level_includes("stream"));
        assert!(!r.second_level_includes(Namespace::Stream));
    }

    #[test]
    fn reset_leaves_no_residue() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["http", "slabs"]);
        r.fill_third_level(Namespace::Http, ["caches"]);

        r.reset();
        r.fill_first_level(["resolvers", "connections"]);

        assert_eq!(r.first_level(), ["resolvers", "connections"]);
        assert!(r.third_level(Namespace::Http).is_empty());
    }

    #[test]
    fn sync_tracks_document_changes() {
        let mut r = EndpointRegistry::new();
        let mut snapshot = StatusSnapshot::new();
        snapshot.insert("angie", json!({}));
        snapshot.insert("http", json!({ "server_zones": {}, "caches": {} }));
        snapshot.insert("stream", json!({ "server_zones": {} }));
        r.sync(&snapshot);

        assert!(r.includes(&http("caches")));
        assert!(r.includes(&EndpointPath::nested(Namespace::Stream, "server_zones")));

        let mut next = StatusSnapshot::new();
        next.insert("angie", json!({}));
        next.insert("http", json!({ "server_zones": {} }));
        r.sync(&next);

        assert!(!r.includes(&http("caches")));
        assert!(r.includes(&http("server_zones")));
        assert!(!r.first_level_includes("stream"));
        assert!(!r.second_level_includes(Namespace::Stream));
    }

    #[test]
    fn sync_keeps_level_one_order_when_sub_resources_swap() {
        let mut r = EndpointRegistry::new();
        let mut snapshot = StatusSnapshot::new();
        snapshot.insert("angie", json!({}));
        snapshot.insert("http", json!({ "server_zones": {} }));
        snapshot.insert("slabs", json!({}));
        r.sync(&snapshot);
        assert_eq!(r.first_level(), ["angie", "http", "slabs"]);

        snapshot.insert("http", json!({ "caches": {} }));
        r.sync(&snapshot);

        assert_eq!(r.first_level(), ["angie", "http", "slabs"]);
        assert_eq!(r.third_level(Namespace::Http), ["caches"]);
    }

    #[test]
    fn paths_list_both_levels() {
        let mut r = EndpointRegistry::new();
        r.fill_first_level(["angie", "stream"]);
        r.fill_third_level(Namespace::Stream, ["limit_conns"]);

        assert_eq!(
            r.paths(),
            vec![
                EndpointPath::top("angie"),
                EndpointPath::top("stream"),
                EndpointPath::nested(Namespace::Stream, "limit_conns"),
            ]
        );
    }

    #[test]
    fn namespace_covers_its_sub_resources() {
        let http_top = EndpointPath::top("http");
        assert!(http_top.covers(&http("caches")));
        assert!(http_top.covers(&http_top));
        assert!(!http_top.covers(&EndpointPath::nested(Namespace::Stream, "server_zones")));
        assert!(!http("caches").covers(&http_top));
        assert!(!EndpointPath::top("angie").covers(&http("caches")));
    }

    #[test]
    fn path_round_trips_through_strings() {
        let path: EndpointPath = "http/server_zones".parse().unwrap();
        assert_eq!(path, http("server_zones"));
        assert_eq!(path.level1(), "http");
        assert_eq!(path.level3(), Some("server_zones"));
        assert_eq!(path.to_string(), "http/server_zones");

        assert_eq!("slabs".parse::<EndpointPath>().unwrap(), EndpointPath::top("slabs"));
        assert!(matches!(
            "resolvers/main".parse::<EndpointPath>(),
            Err(ConsoleError::UnknownNamespace(_))
        ));
    }
}
