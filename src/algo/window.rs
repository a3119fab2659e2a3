use crate::error::TelemetryError;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Bounded FIFO of the most recent values of one series.
#[derive(Debug, Clone, Serialize)]
pub struct WindowedSeries {
    name: String,
    values: VecDeque<f64>,
}

impl WindowedSeries {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &VecDeque<f64> {
        &self.values
    }
}

/// Named sliding windows sharing one capacity. Series must be registered
/// before they are pushed to.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    series: Vec<WindowedSeries>,
    index: HashMap<String, usize>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_series<I, S>(capacity: usize, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut window = Self::new(capacity);
        for name in names {
            window.register(name);
        }
        window
    }

    /// Returns false if the name was already registered.
    pub fn register(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }
        self.index.insert(name.clone(), self.series.len());
        self.series.push(WindowedSeries {
            name,
            values: VecDeque::with_capacity(self.capacity + 1),
        });
        true
    }

    /// Append `value`; returns whether the oldest value was evicted.
    pub fn push(&mut self, name: &str, value: f64) -> Result<bool, TelemetryError> {
        let capacity = self.capacity;
        let series = self.series_mut(name)?;
        series.values.push_back(value);
        if series.values.len() > capacity {
            series.values.pop_front();
            return Ok(true);
        }
        Ok(false)
    }

    /// Oldest first, most recent last.
    pub fn snapshot(&self, name: &str) -> Result<Vec<f64>, TelemetryError> {
        self.get(name).map(|s| s.values.iter().copied().collect())
    }

    pub fn get(&self, name: &str) -> Result<&WindowedSeries, TelemetryError> {
        self.index
            .get(name)
            .map(|&i| &self.series[i])
            .ok_or_else(|| TelemetryError::UnknownSeries(name.to_string()))
    }

    fn series_mut(&mut self, name: &str) -> Result<&mut WindowedSeries, TelemetryError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.series[i]),
            None => Err(TelemetryError::UnknownSeries(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered series in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &WindowedSeries> {
        self.series.iter()
    }

    pub fn clear(&mut self) {
        for s in &mut self.series {
            s.values.clear();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_last_ten_in_order() {
        for n in 1..=35usize {
            let mut window = SlidingWindow::with_series(DEFAULT_WINDOW_CAPACITY, ["red.z"]);
            let pushed: Vec<f64> = (0..n).map(|_| rand::random::<f64>() * 10.0 - 5.0).collect();
            for &v in &pushed {
                window.push("red.z", v).unwrap();
            }

            let snap = window.snapshot("red.z").unwrap();
            assert_eq!(snap.len(), n.min(10));
            assert_eq!(snap.as_slice(), &pushed[n.saturating_sub(10)..]);
        }
    }

    #[test]
    fn test_eviction_starts_at_eleventh_push() {
        let mut window = SlidingWindow::with_series(10, ["a"]);
        for i in 0..10 {
            assert!(!window.push("a", i as f64).unwrap());
        }
        assert!(window.push("a", 10.0).unwrap());
        assert_eq!(window.snapshot("a").unwrap()[0], 1.0);
    }

    #[test]
    fn test_unknown_series() {
        let mut window = SlidingWindow::with_series(10, ["red.z"]);
        assert_eq!(
            window.push("purple.z", 1.0),
            Err(TelemetryError::UnknownSeries("purple.z".to_string()))
        );
        assert!(window.snapshot("purple.z").is_err());
    }

    #[test]
    fn test_series_are_independent() {
        let mut window = SlidingWindow::with_series(3, ["a", "b"]);
        for i in 0..5 {
            window.push("a", i as f64).unwrap();
        }
        window.push("b", 42.0).unwrap();
        assert_eq!(window.snapshot("a").unwrap(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.snapshot("b").unwrap(), vec![42.0]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut window = SlidingWindow::new(10);
        assert!(window.register("x"));
        assert!(!window.register("x"));
        assert_eq!(window.iter().count(), 1);
    }
}
