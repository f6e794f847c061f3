use std::collections::BTreeMap;

/// Sensor key → value for one evaluation cycle.
///
/// A key that is absent is *unknown*; it is never read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    values: BTreeMap<String, f64>,
}

impl SensorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sensor: impl Into<String>, value: f64) {
        self.values.insert(sensor.into(), value);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, sensor: impl Into<String>, value: f64) -> Self {
        self.insert(sensor, value);
        self
    }

    pub fn get(&self, sensor: &str) -> Option<f64> {
        self.values.get(sensor).copied()
    }

    /// Overwrite keys present in `other`; keep the rest.
    pub fn merge(&mut self, other: &SensorSnapshot) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), *v);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SensorSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut snap = Self::new();
        for (k, v) in iter {
            snap.insert(k, v);
        }
        snap
    }
}
