use chrono::{DateTime, Utc};

use crate::errors::ValidationError;

// ─── Observer & panel ────────────────────────────────────────────────────────

/// Geographic location of the observer (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverConfig {
    latitude: f64,
    longitude: f64,
}

impl ObserverConfig {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || latitude.abs() > 90.0 {
            return Err(ValidationError(format!("latitude {} outside -90..90", latitude)));
        }
        if !longitude.is_finite() || longitude.abs() > 180.0 {
            return Err(ValidationError(format!("longitude {} outside -180..180", longitude)));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 { self.latitude }
    pub fn longitude(&self) -> f64 { self.longitude }
}

/// Fixed panel orientation.
///
/// * `tilt`    – 0 = horizontal, 90 = vertical
/// * `azimuth` – direction the panel faces, from north clockwise (180 = south)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelConfig {
    tilt: f64,
    azimuth: f64,
}

impl PanelConfig {
    pub fn new(tilt: f64, azimuth: f64) -> Result<Self, ValidationError> {
        if !tilt.is_finite() || !(0.0..=90.0).contains(&tilt) {
            return Err(ValidationError(format!("panel tilt {} outside 0..90", tilt)));
        }
        if !azimuth.is_finite() || !(0.0..=360.0).contains(&azimuth) {
            return Err(ValidationError(format!("panel azimuth {} outside 0..360", azimuth)));
        }
        Ok(Self { tilt, azimuth })
    }

    pub fn tilt(&self) -> f64 { self.tilt }
    pub fn azimuth(&self) -> f64 { self.azimuth }
}

// ─── Glazing optics ──────────────────────────────────────────────────────────

pub const DEFAULT_REFRACTIVE_INDEX: f64 = 1.526;
pub const DEFAULT_EXTINCTION_COEFFICIENT: f64 = 4.0; // 1/m
pub const DEFAULT_GLAZING_THICKNESS: f64 = 0.002; // m

/// Cover glass parameters used by the incidence angle modifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalParams {
    refractive_index: f64,
    extinction_coefficient: f64,
    glazing_thickness: f64,
}

impl OpticalParams {
    pub fn new(
        refractive_index: f64,
        extinction_coefficient: f64,
        glazing_thickness: f64,
    ) -> Result<Self, ValidationError> {
        if !refractive_index.is_finite() || refractive_index <= 1.0 {
            return Err(ValidationError(format!("refractive index {} must be > 1", refractive_index)));
        }
        if !extinction_coefficient.is_finite() || extinction_coefficient < 0.0 {
            return Err(ValidationError(format!(
                "extinction coefficient {} must be >= 0",
                extinction_coefficient
            )));
        }
        if !glazing_thickness.is_finite() || glazing_thickness < 0.0 {
            return Err(ValidationError(format!("glazing thickness {} must be >= 0", glazing_thickness)));
        }
        Ok(Self { refractive_index, extinction_coefficient, glazing_thickness })
    }

    pub fn refractive_index(&self) -> f64 { self.refractive_index }
    pub fn extinction_coefficient(&self) -> f64 { self.extinction_coefficient }
    pub fn glazing_thickness(&self) -> f64 { self.glazing_thickness }
}

impl Default for OpticalParams {
    fn default() -> Self {
        Self {
            refractive_index: DEFAULT_REFRACTIVE_INDEX,
            extinction_coefficient: DEFAULT_EXTINCTION_COEFFICIENT,
            glazing_thickness: DEFAULT_GLAZING_THICKNESS,
        }
    }
}

// ─── Output sample ───────────────────────────────────────────────────────────

/// Sun position and optical quantities for one instant.
/// All angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidenceSample {
    pub timestamp: DateTime<Utc>,
    /// Apparent (refracted) altitude; negative below the horizon
    pub solar_altitude: f64,
    /// From north, clockwise, in [0, 360)
    pub solar_azimuth: f64,
    /// Angle between sun direction and panel normal, in [0, 180]
    pub angle_of_incidence: f64,
    /// cos(angle_of_incidence)
    pub cosine_factor: f64,
    /// Incidence angle modifier in [0, 1]
    pub iam: f64,
}
