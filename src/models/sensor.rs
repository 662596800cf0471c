use std::collections::BTreeMap;
use chrono::{DateTime, Utc};

// ─── Parameter names ─────────────────────────────────────────────────────────

pub const AIR_TEMPERATURE: &str = "Air temperature";
pub const GLOBAL_RADIATION: &str = "Global radiation";
pub const DIRECT_SOLAR_RADIATION: &str = "Direct solar radiation";
pub const REFLECTED_RADIATION: &str = "Reflected radiation";
pub const DIFFUSE_RADIATION: &str = "Diffuse radiation";

/// Radiation parameters kept from the radiation stream, in output column order.
pub const RADIATION_PARAMETERS: [&str; 4] = [
    GLOBAL_RADIATION,
    DIRECT_SOLAR_RADIATION,
    REFLECTED_RADIATION,
    DIFFUSE_RADIATION,
];

/// Which observation stream a line or query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    Weather,
    Radiation,
}

impl SensorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            SensorCategory::Weather => "weather",
            SensorCategory::Radiation => "radiation",
        }
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One observation line. Unknown values are absent from `values`, never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub timestamp: DateTime<Utc>,
    pub station: String,
    pub values: BTreeMap<String, f64>,
}

impl SensorRecord {
    pub fn empty(timestamp: DateTime<Utc>, station: &str) -> Self {
        Self { timestamp, station: station.to_string(), values: BTreeMap::new() }
    }

    pub fn temperature(&self) -> Option<f64> {
        self.values.get(AIR_TEMPERATURE).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl MergedRecord {
    pub fn get(&self, parameter: &str) -> Option<f64> {
        self.values.get(parameter).copied()
    }

    #[cfg(test)]
    pub fn temperature(&self) -> Option<f64> {
        self.get(AIR_TEMPERATURE)
    }
}

/// Merged records, strictly ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSeries {
    records: Vec<MergedRecord>,
}

impl MergedSeries {
    /// Caller guarantees strictly ascending timestamps.
    pub(crate) fn from_sorted(records: Vec<MergedRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { records }
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.records.iter().map(|r| r.timestamp).collect()
    }
}
