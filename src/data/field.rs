//! Field extraction from entity objects.
//!
//! Every counter a calculator rates is described by a [`Field`]: a short
//! name used in the view-model and a [`Source`] saying where in the
//! entity's JSON the value lives. Values that are missing or not
//! non-negative integers extract as `None` ("unknown") rather than failing.

use serde_json::{Map, Value};

/// A JSON path relative to an entity object.
pub type Path = &'static [&'static str];

/// Where a counter's value comes from.
#[derive(Debug, Clone, Copy)]
pub enum Source {
    /// The integer at a path.
    Path(Path),
    /// The sum of whichever paths are present. Unknown if none are.
    Sum(&'static [Path]),
    /// Sum of the entries of an object keyed by 3-digit status codes whose
    /// first digit matches, e.g. all `4xx` keys of `responses`.
    StatusClass(Path, char),
    /// Sum of `leaf` over every child object found at a path.
    EachChild(Path, Path),
}

/// A named counter.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub source: Source,
}

impl Field {
    pub const fn path(name: &'static str, path: Path) -> Self {
        Self { name, source: Source::Path(path) }
    }

    pub const fn sum(name: &'static str, paths: &'static [Path]) -> Self {
        Self { name, source: Source::Sum(paths) }
    }

    pub const fn status_class(name: &'static str, at: Path, class: char) -> Self {
        Self { name, source: Source::StatusClass(at, class) }
    }

    pub const fn each_child(name: &'static str, at: Path, leaf: Path) -> Self {
        Self { name, source: Source::EachChild(at, leaf) }
    }

    /// Read this counter from an entity object.
    pub fn extract(&self, entity: &Map<String, Value>) -> Option<u64> {
        match self.source {
            Source::Path(path) => lookup(entity, path).and_then(Value::as_u64),
            Source::Sum(paths) => paths
                .iter()
                .filter_map(|p| lookup(entity, p).and_then(Value::as_u64))
                .fold(None, |acc, v| Some(acc.unwrap_or(0).saturating_add(v))),
            Source::StatusClass(at, class) => {
                let codes = lookup(entity, at)?.as_object()?;
                Some(
                    codes
                        .iter()
                        .filter(|(code, _)| is_status_in_class(code, class))
                        .filter_map(|(_, v)| v.as_u64())
                        .fold(0u64, u64::saturating_add),
                )
            }
            Source::EachChild(at, leaf) => {
                let children = lookup(entity, at)?.as_object()?;
                Some(
                    children
                        .values()
                        .filter_map(|child| child.as_object())
                        .filter_map(|child| lookup(child, leaf).and_then(Value::as_u64))
                        .fold(0u64, u64::saturating_add),
                )
            }
        }
    }
}

/// Walk a path inside an object.
pub fn lookup<'a>(entity: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = entity.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    Some(current)
}

fn is_status_in_class(code: &str, class: char) -> bool {
    code.len() == 3 && code.starts_with(class) && code.chars().all(|c| c.is_ascii_digit())
}
