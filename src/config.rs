use chrono_tz::Tz;
use serde::Deserialize;

use crate::errors::{ConfigError, ValidationError};
use crate::models::geometry::{
    DEFAULT_EXTINCTION_COEFFICIENT, DEFAULT_GLAZING_THICKNESS, DEFAULT_REFRACTIVE_INDEX,
    ObserverConfig, OpticalParams, PanelConfig,
};
use crate::models::observation::BoundingBox;
use crate::services::fmi_source::DEFAULT_FMI_URL;
use crate::services::observation_service::DEFAULT_OPEN_METEO_URL;

fn default_timezone() -> String { "Europe/Helsinki".to_string() }
fn default_step_minutes() -> u32 { 15 }
fn default_fmi_url() -> String { DEFAULT_FMI_URL.to_string() }
fn default_open_meteo_url() -> String { DEFAULT_OPEN_METEO_URL.to_string() }
fn default_refractive_index() -> f64 { DEFAULT_REFRACTIVE_INDEX }
fn default_extinction_coefficient() -> f64 { DEFAULT_EXTINCTION_COEFFICIENT }
fn default_glazing_thickness() -> f64 { DEFAULT_GLAZING_THICKNESS }

/// Run configuration, read once from `config.json` and passed down
/// explicitly; validated types are built from it on demand.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub observer: ObserverSettings,
    pub panel: PanelSettings,
    #[serde(default)]
    pub optics: OpticsSettings,
    /// IANA zone used for output timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
    pub observations: ObservationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObserverSettings {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelSettings {
    pub tilt: f64,
    pub azimuth: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpticsSettings {
    #[serde(default = "default_refractive_index")]
    pub refractive_index: f64,
    #[serde(default = "default_extinction_coefficient")]
    pub extinction_coefficient: f64,
    #[serde(default = "default_glazing_thickness")]
    pub glazing_thickness: f64,
}

impl Default for OpticsSettings {
    fn default() -> Self {
        Self {
            refractive_index: DEFAULT_REFRACTIVE_INDEX,
            extinction_coefficient: DEFAULT_EXTINCTION_COEFFICIENT,
            glazing_thickness: DEFAULT_GLAZING_THICKNESS,
        }
    }
}

/// Where observations are downloaded from.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// FMI open data station observations
    #[default]
    Fmi,
    /// Open-Meteo historical model data at the bbox centre
    OpenMeteo,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservationsConfig {
    /// FMI station id (`fmisid`)
    pub station_id: String,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_fmi_url")]
    pub fmi_url: String,
    #[serde(default = "default_open_meteo_url")]
    pub open_meteo_url: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn observer(&self) -> Result<ObserverConfig, ValidationError> {
        ObserverConfig::new(self.observer.latitude, self.observer.longitude)
    }

    pub fn panel(&self) -> Result<PanelConfig, ValidationError> {
        PanelConfig::new(self.panel.tilt, self.panel.azimuth)
    }

    pub fn optics(&self) -> Result<OpticalParams, ValidationError> {
        OpticalParams::new(
            self.optics.refractive_index,
            self.optics.extinction_coefficient,
            self.optics.glazing_thickness,
        )
    }

    pub fn timezone(&self) -> Result<Tz, ValidationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ValidationError(format!("unknown time zone '{}'", self.timezone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "observer": { "latitude": 60.192059, "longitude": 24.945831 },
        "panel": { "tilt": 40, "azimuth": 177 },
        "observations": {
            "station_id": "101104",
            "bbox": { "min_lat": 60, "min_lon": 23, "max_lat": 61, "max_lon": 24 }
        }
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.timezone, "Europe/Helsinki");
        assert_eq!(config.step_minutes, 15);
        assert_eq!(config.observations.provider, Provider::Fmi);
        assert_eq!(config.observations.fmi_url, DEFAULT_FMI_URL);
        assert_eq!(config.observations.open_meteo_url, DEFAULT_OPEN_METEO_URL);
        assert_eq!(config.optics().unwrap(), OpticalParams::default());
        assert_eq!(config.panel().unwrap().azimuth(), 177.0);
        assert!(config.timezone().is_ok());
    }

    #[test]
    fn test_partial_optics() {
        let json = SAMPLE.replace(
            "\"panel\"",
            "\"optics\": { \"refractive_index\": 1.5 }, \"panel\"",
        );
        let config = Config::from_json(&json).unwrap();
        let optics = config.optics().unwrap();
        assert_eq!(optics.refractive_index(), 1.5);
        assert_eq!(optics.glazing_thickness(), DEFAULT_GLAZING_THICKNESS);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        config.observer.latitude = 95.0;
        assert!(config.observer().is_err());
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.timezone().is_err());
    }

    #[test]
    fn test_open_meteo_provider() {
        let json = SAMPLE.replace("\"station_id\"", "\"provider\": \"open-meteo\", \"station_id\"");
        let config = Config::from_json(&json).unwrap();
        assert_eq!(config.observations.provider, Provider::OpenMeteo);
        assert!(Config::from_json(&SAMPLE.replace("\"station_id\"", "\"provider\": \"ftp\", \"station_id\"")).is_err());
    }

    #[test]
    fn test_broken_json() {
        assert!(Config::from_json("{ \"observer\": ").is_err());
    }
}
