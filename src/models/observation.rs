use serde::Deserialize;

// ─── Open-Meteo wire types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoricalResponse {
    pub minutely_15: Option<MinutelyData>,
}

/// Column-oriented 15 minute series. `time` is GMT without offset,
/// e.g. "2024-05-20T21:00"; every value column is aligned with it.
#[derive(Debug, Deserialize)]
pub struct MinutelyData {
    pub time: Vec<String>,
    pub temperature_2m: Option<Vec<Option<f64>>>,
    pub shortwave_radiation: Option<Vec<Option<f64>>>,
    pub direct_radiation: Option<Vec<Option<f64>>>,
    pub diffuse_radiation: Option<Vec<Option<f64>>>,
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Area of interest in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// (latitude, longitude) of the box centre
    pub fn centre(&self) -> (f64, f64) {
        ((self.min_lat + self.max_lat) / 2.0, (self.min_lon + self.max_lon) / 2.0)
    }
}
