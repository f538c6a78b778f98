//! Bounded per-entity history for charts.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

/// Default number of points kept per entity.
pub const DEFAULT_HISTORY_SIZE: usize = 60;

/// One sampled point of an entity's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// Unix timestamp in milliseconds of the poll that produced the point.
    pub timestamp_ms: u64,
    /// Sampled rates and gauges. Unknown values are left out.
    pub values: BTreeMap<&'static str, f64>,
}

/// A time-ordered FIFO of history points with a fixed capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl Series {
    /// Create an empty series. A zero capacity is raised to one so the
    /// latest point is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest first when full.
    pub fn push(&mut self, point: HistoryPoint) {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    /// Copy the points out, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }

    /// Values of one sampled field, normalized to 0-7 for 8-level sparklines.
    ///
    /// Points where the field is unknown are skipped. Returns an empty Vec
    /// if there's nothing to draw.
    pub fn sparkline(&self, field: &str) -> Vec<u8> {
        let values: Vec<f64> =
            self.points.iter().filter_map(|p| p.values.get(field)).copied().collect();

        if values.is_empty() {
            return Vec::new();
        }

        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min).min(0.0);
        let range = (max - min).max(f64::EPSILON);

        values
            .iter()
            .map(|&v| {
                let normalized = ((v - min) / range * 7.0) as u8;
                normalized.min(7)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ts: u64, requests: f64) -> HistoryPoint {
        HistoryPoint {
            timestamp_ms: ts,
            values: BTreeMap::from([("requests", requests)]),
        }
    }

    #[test]
    fn new_series_is_empty() {
        let s = Series::new(10);
        assert!(s.is_empty());
        assert_eq!(s.capacity(), 10);
        assert!(s.latest().is_none());
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut s = Series::new(0);
        s.push(point(1, 1.0));
        s.push(point(2, 2.0));
        assert_eq!(s.len(), 1);
        assert_eq!(s.latest().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn series_caps_at_capacity_and_keeps_newest() {
        let mut s = Series::new(60);

        for i in 0..70 {
            s.push(point(i, i as f64));
        }

        assert_eq!(s.len(), 60);
        let stamps: Vec<u64> = s.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, (10..70).collect::<Vec<_>>());
    }

    #[test]
    fn sparkline_empty_for_unknown_field() {
        let mut s = Series::new(5);
        s.push(point(1, 10.0));
        assert!(s.sparkline("sent").is_empty());
    }

    #[test]
    fn sparkline_scales_to_eight_levels() {
        let mut s = Series::new(5);
        for (i, v) in [0.0, 35.0, 70.0].into_iter().enumerate() {
            s.push(point(i as u64, v));
        }

        assert_eq!(s.sparkline("requests"), vec![0, 3, 7]);
    }
}
