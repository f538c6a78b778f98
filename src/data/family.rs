//! Metric families and their field tables.
//!
//! A family is one status sub-resource whose entities share a shape: all
//! HTTP server zones, all resolvers, all shared-memory zones, and so on.
//! The calculator is generic; everything family-specific lives in the
//! static [`FamilySpec`] tables below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::{Field, Path};
use super::registry::{EndpointPath, Namespace};
use crate::error::ConsoleError;
use crate::source::StatusSnapshot;

/// Every metric family the engine computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    ServerZones,
    LocationZones,
    Upstreams,
    Caches,
    LimitConns,
    LimitReqs,
    StreamServerZones,
    StreamLimitConns,
    SharedZones,
    Resolvers,
    Workers,
    Connections,
}

impl Family {
    pub const ALL: [Family; 12] = [
        Family::ServerZones,
        Family::LocationZones,
        Family::Upstreams,
        Family::Caches,
        Family::LimitConns,
        Family::LimitReqs,
        Family::StreamServerZones,
        Family::StreamLimitConns,
        Family::SharedZones,
        Family::Resolvers,
        Family::Workers,
        Family::Connections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::ServerZones => "server_zones",
            Family::LocationZones => "location_zones",
            Family::Upstreams => "upstreams",
            Family::Caches => "caches",
            Family::LimitConns => "limit_conns",
            Family::LimitReqs => "limit_reqs",
            Family::StreamServerZones => "stream_server_zones",
            Family::StreamLimitConns => "stream_limit_conns",
            Family::SharedZones => "shared_zones",
            Family::Resolvers => "resolvers",
            Family::Workers => "workers",
            Family::Connections => "connections",
        }
    }

    /// The field table driving this family's calculator.
    pub fn spec(&self) -> &'static FamilySpec {
        match self {
            Family::ServerZones => &SERVER_ZONES,
            Family::LocationZones => &LOCATION_ZONES,
            Family::Upstreams => &UPSTREAMS,
            Family::Caches => &CACHES,
            Family::LimitConns => &LIMIT_CONNS,
            Family::LimitReqs => &LIMIT_REQS,
            Family::StreamServerZones => &STREAM_SERVER_ZONES,
            Family::StreamLimitConns => &STREAM_LIMIT_CONNS,
            Family::SharedZones => &SHARED_ZONES,
            Family::Resolvers => &RESOLVERS,
            Family::Workers => &WORKERS,
            Family::Connections => &CONNECTIONS,
        }
    }

    /// Where the family lives in the status document.
    pub fn endpoint(&self) -> EndpointPath {
        let spec = self.spec();
        match spec.namespace {
            Some(ns) => EndpointPath::nested(ns, spec.key),
            None => EndpointPath::top(spec.key),
        }
    }

    /// The family served at an endpoint path, if any.
    pub fn for_endpoint(path: &EndpointPath) -> Option<Family> {
        Family::ALL.into_iter().find(|f| f.endpoint() == *path)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ConsoleError::Parse(format!("unknown metric family: {}", s)))
    }
}

/// How entities are laid out inside a family's resource object.
#[derive(Debug, Clone, Copy)]
pub enum Layout {
    /// Each key is an entity.
    Flat,
    /// Each key is a group whose `child` object holds the entities; the
    /// entity is named `group/entity` (upstream peers). A group lacking the
    /// `child` object contributes no entities.
    Nested(&'static str),
    /// The resource object itself is the single entity.
    Single(&'static str),
}

impl Layout {
    /// Collect `(name, entity)` pairs.
    ///
    /// Entries that are not JSON objects are returned as `Err(name)` so the
    /// caller can report and skip them.
    pub fn entities<'a>(
        &self,
        resource: &'a Map<String, Value>,
    ) -> Vec<Result<(String, &'a Map<String, Value>), String>> {
        let as_entity = |name: String, value: &'a Value| match value.as_object() {
            Some(obj) => Ok((name, obj)),
            None => Err(name),
        };

        match self {
            Layout::Flat => resource
                .iter()
                .map(|(name, value)| as_entity(name.clone(), value))
                .collect(),
            Layout::Nested(child) => resource
                .iter()
                .flat_map(|(group, value)| {
                    let Some(group_obj) = value.as_object() else {
                        return vec![Err(group.clone())];
                    };
                    // A group without members (e.g. all peers resolved away) has no entities
                    group_obj
                        .get(*child)
                        .and_then(Value::as_object)
                        .into_iter()
                        .flatten()
                        .map(|(name, v)| as_entity(format!("{}/{}", group, name), v))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Layout::Single(name) => vec![Ok((name.to_string(), resource))],
        }
    }
}

/// A gauge passed through to the view verbatim.
#[derive(Debug, Clone, Copy)]
pub struct Gauge {
    pub name: &'static str,
    pub path: Path,
}

impl Gauge {
    pub const fn new(name: &'static str, path: Path) -> Self {
        Self { name, path }
    }
}

/// Static description of one metric family.
#[derive(Debug)]
pub struct FamilySpec {
    pub family: Family,
    /// `None` for top-level resources.
    pub namespace: Option<Namespace>,
    pub key: &'static str,
    pub layout: Layout,
    /// Monotonic counters turned into `<name>_per_second`.
    pub counters: &'static [Field],
    /// Counters that also get a transient `<name>_changed` flag.
    pub flashable: &'static [&'static str],
    pub gauges: &'static [Gauge],
    /// Rates and numeric gauges recorded in each history point.
    pub sampled: &'static [&'static str],
}

impl FamilySpec {
    /// Locate this family's resource in a status document.
    pub fn resource<'a>(&self, snapshot: &'a StatusSnapshot) -> Option<&'a Value> {
        match self.namespace {
            Some(ns) => snapshot.resource(&[ns.as_str(), self.key]),
            None => snapshot.get(self.key),
        }
    }
}

const fn responses(class: char) -> Field {
    let name = match class {
        '1' => "1xx",
        '2' => "2xx",
        '3' => "3xx",
        '4' => "4xx",
        _ => "5xx",
    };
    Field::status_class(name, &["responses"], class)
}

const RESPONSE_CLASSES: [Field; 5] =
    [responses('1'), responses('2'), responses('3'), responses('4'), responses('5')];

static SERVER_ZONES: FamilySpec = FamilySpec {
    family: Family::ServerZones,
    namespace: Some(Namespace::Http),
    key: "server_zones",
    layout: Layout::Flat,
    counters: &[
        Field::path("requests", &["requests", "total"]),
        Field::path("discarded", &["requests", "discarded"]),
        Field::path("received", &["data", "received"]),
        Field::path("sent", &["data", "sent"]),
        RESPONSE_CLASSES[0],
        RESPONSE_CLASSES[1],
        RESPONSE_CLASSES[2],
        RESPONSE_CLASSES[3],
        RESPONSE_CLASSES[4],
        Field::path("ssl_handshaked", &["ssl", "handshaked"]),
        Field::path("ssl_failed", &["ssl", "failed"]),
    ],
    flashable: &["4xx", "5xx"],
    gauges: &[Gauge::new("processing", &["requests", "processing"])],
    sampled: &["requests", "received", "sent"],
};

static LOCATION_ZONES: FamilySpec = FamilySpec {
    family: Family::LocationZones,
    namespace: Some(Namespace::Http),
    key: "location_zones",
    layout: Layout::Flat,
    counters: &[
        Field::path("requests", &["requests", "total"]),
        Field::path("discarded", &["requests", "discarded"]),
        Field::path("received", &["data", "received"]),
        Field::path("sent", &["data", "sent"]),
        RESPONSE_CLASSES[0],
        RESPONSE_CLASSES[1],
        RESPONSE_CLASSES[2],
        RESPONSE_CLASSES[3],
        RESPONSE_CLASSES[4],
    ],
    flashable: &["4xx", "5xx"],
    gauges: &[],
    sampled: &["requests", "received", "sent"],
};

static UPSTREAMS: FamilySpec = FamilySpec {
    family: Family::Upstreams,
    namespace: Some(Namespace::Http),
    key: "upstreams",
    layout: Layout::Nested("peers"),
    counters: &[
        Field::path("requests", &["selected", "total"]),
        Field::path("received", &["data", "received"]),
        Field::path("sent", &["data", "sent"]),
        RESPONSE_CLASSES[0],
        RESPONSE_CLASSES[1],
        RESPONSE_CLASSES[2],
        RESPONSE_CLASSES[3],
        RESPONSE_CLASSES[4],
        Field::path("fails", &["health", "fails"]),
        Field::path("unavailable", &["health", "unavailable"]),
    ],
    flashable: &["4xx", "5xx", "fails"],
    gauges: &[
        Gauge::new("server", &["server"]),
        Gauge::new("state", &["state"]),
        Gauge::new("active", &["selected", "current"]),
        Gauge::new("weight", &["weight"]),
        Gauge::new("backup", &["backup"]),
        Gauge::new("max_conns", &["max_conns"]),
    ],
    sampled: &["requests", "received", "sent", "active"],
};

static CACHES: FamilySpec = FamilySpec {
    family: Family::Caches,
    namespace: Some(Namespace::Http),
    key: "caches",
    layout: Layout::Flat,
    counters: &[
        Field::path("hit", &["hit", "responses"]),
        Field::path("hit_bytes", &["hit", "bytes"]),
        Field::path("miss", &["miss", "responses"]),
        Field::path("miss_bytes", &["miss", "bytes"]),
        Field::path("expired", &["expired", "responses"]),
        Field::path("bypass", &["bypass", "responses"]),
        Field::path("stale", &["stale", "responses"]),
        Field::path("updating", &["updating", "responses"]),
        Field::path("revalidated", &["revalidated", "responses"]),
    ],
    flashable: &[],
    gauges: &[
        Gauge::new("size", &["size"]),
        Gauge::new("max_size", &["max_size"]),
        Gauge::new("cold", &["cold"]),
    ],
    sampled: &["hit", "miss", "size"],
};

const LIMIT_CONN_COUNTERS: [Field; 4] = [
    Field::path("passed", &["passed"]),
    Field::path("skipped", &["skipped"]),
    Field::path("rejected", &["rejected"]),
    Field::path("exhausted", &["exhausted"]),
];

static LIMIT_CONNS: FamilySpec = FamilySpec {
    family: Family::LimitConns,
    namespace: Some(Namespace::Http),
    key: "limit_conns",
    layout: Layout::Flat,
    counters: &LIMIT_CONN_COUNTERS,
    flashable: &["rejected", "exhausted"],
    gauges: &[],
    sampled: &["passed", "rejected"],
};

static LIMIT_REQS: FamilySpec = FamilySpec {
    family: Family::LimitReqs,
    namespace: Some(Namespace::Http),
    key: "limit_reqs",
    layout: Layout::Flat,
    counters: &[
        Field::path("passed", &["passed"]),
        Field::path("skipped", &["skipped"]),
        Field::path("delayed", &["delayed"]),
        Field::path("rejected", &["rejected"]),
        Field::path("exhausted", &["exhausted"]),
    ],
    flashable: &["rejected", "exhausted"],
    gauges: &[],
    sampled: &["passed", "delayed", "rejected"],
};

static STREAM_SERVER_ZONES: FamilySpec = FamilySpec {
    family: Family::StreamServerZones,
    namespace: Some(Namespace::Stream),
    key: "server_zones",
    layout: Layout::Flat,
    counters: &[
        Field::path("connections", &["connections", "total"]),
        Field::path("discarded", &["connections", "discarded"]),
        Field::path("passed", &["connections", "passed"]),
        Field::path("received", &["data", "received"]),
        Field::path("sent", &["data", "sent"]),
        Field::path("2xx", &["sessions", "success"]),
        Field::sum("4xx", &[&["sessions", "invalid"], &["sessions", "forbidden"]]),
        Field::sum(
            "5xx",
            &[
                &["sessions", "internal_error"],
                &["sessions", "bad_gateway"],
                &["sessions", "service_unavailable"],
            ],
        ),
        Field::path("ssl_handshaked", &["ssl", "handshaked"]),
        Field::path("ssl_failed", &["ssl", "failed"]),
    ],
    flashable: &["4xx", "5xx"],
    gauges: &[Gauge::new("processing", &["connections", "processing"])],
    sampled: &["connections", "received", "sent"],
};

static STREAM_LIMIT_CONNS: FamilySpec = FamilySpec {
    family: Family::StreamLimitConns,
    namespace: Some(Namespace::Stream),
    key: "limit_conns",
    layout: Layout::Flat,
    counters: &LIMIT_CONN_COUNTERS,
    flashable: &["rejected", "exhausted"],
    gauges: &[],
    sampled: &["passed", "rejected"],
};

static SHARED_ZONES: FamilySpec = FamilySpec {
    family: Family::SharedZones,
    namespace: None,
    key: "slabs",
    layout: Layout::Flat,
    counters: &[
        Field::each_child("reqs", &["slots"], &["reqs"]),
        Field::each_child("fails", &["slots"], &["fails"]),
    ],
    flashable: &["fails"],
    gauges: &[
        Gauge::new("pages_used", &["pages", "used"]),
        Gauge::new("pages_free", &["pages", "free"]),
    ],
    sampled: &["pages_used"],
};

static RESOLVERS: FamilySpec = FamilySpec {
    family: Family::Resolvers,
    namespace: None,
    key: "resolvers",
    layout: Layout::Flat,
    counters: &[
        Field::path("queries_name", &["queries", "name"]),
        Field::path("queries_srv", &["queries", "srv"]),
        Field::path("queries_addr", &["queries", "addr"]),
        Field::sum(
            "sent",
            &[&["sent", "a"], &["sent", "aaaa"], &["sent", "ptr"], &["sent", "srv"]],
        ),
        Field::path("success", &["responses", "success"]),
        Field::path("timedout", &["responses", "timedout"]),
        Field::sum(
            "errors",
            &[
                &["responses", "format_error"],
                &["responses", "server_failure"],
                &["responses", "not_found"],
                &["responses", "unimplemented"],
                &["responses", "refused"],
                &["responses", "other"],
            ],
        ),
    ],
    flashable: &["timedout", "errors"],
    gauges: &[],
    sampled: &["sent", "success"],
};

static WORKERS: FamilySpec = FamilySpec {
    family: Family::Workers,
    namespace: None,
    key: "workers",
    layout: Layout::Flat,
    counters: &[
        Field::path("accepted", &["connections", "accepted"]),
        Field::path("dropped", &["connections", "dropped"]),
        Field::path("requests", &["requests", "total"]),
    ],
    flashable: &["dropped"],
    gauges: &[
        Gauge::new("pid", &["pid"]),
        Gauge::new("active", &["connections", "active"]),
        Gauge::new("idle", &["connections", "idle"]),
    ],
    sampled: &["requests", "active"],
};

static CONNECTIONS: FamilySpec = FamilySpec {
    family: Family::Connections,
    namespace: None,
    key: "connections",
    layout: Layout::Single("connections"),
    counters: &[
        Field::path("accepted", &["accepted"]),
        Field::path("dropped", &["dropped"]),
    ],
    flashable: &["dropped"],
    gauges: &[Gauge::new("active", &["active"]), Gauge::new("idle", &["idle"])],
    sampled: &["accepted", "active", "idle"],
};
