/// ============================================================
///  Solar Geometry & Incidence Angle Modifier Engine
///
///  Algorithm pipeline:
///   1. Solar position – NOAA solar calculator equations (Meeus,
///                       low precision): declination, equation of
///                       time, hour angle, zenith, azimuth
///   2. Refraction     – NOAA piecewise correction, added to the
///                       geometric altitude (apparent altitude)
///   3. Incidence      – angle between sun vector and panel normal
///   4. IAM            – Fresnel reflection + glass absorption,
///                       normalised to normal incidence
///
///  Accuracy of (1)+(2) is about 0.01° between 1800 and 2100,
///  well below what the 4-decimal angle of incidence resolves
///  in practice for a fixed-tilt panel.
/// ============================================================

use chrono::{DateTime, TimeDelta, Utc};

use crate::errors::ValidationError;
use crate::models::geometry::{IncidenceSample, ObserverConfig, OpticalParams, PanelConfig};

// ─── Constants ───────────────────────────────────────────────
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// Below this incidence angle (rad) the Fresnel terms are 0/0.
const NORMAL_INCIDENCE_EPS: f64 = 1e-12;

/// Topocentric apparent position of the sun, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub altitude: f64,
    pub azimuth: f64,
}

/// Main entry point – one sample for one instant.
pub fn compute_incidence_sample(
    timestamp: DateTime<Utc>,
    observer: &ObserverConfig,
    panel: &PanelConfig,
    optics: &OpticalParams,
) -> IncidenceSample {
    let sun = sun_position(timestamp, observer);
    let angle_of_incidence = angle_of_incidence(sun.altitude, sun.azimuth, panel);

    IncidenceSample {
        timestamp,
        solar_altitude: sun.altitude,
        solar_azimuth: sun.azimuth,
        angle_of_incidence,
        cosine_factor: angle_of_incidence.to_radians().cos(),
        iam: incidence_angle_modifier(angle_of_incidence, optics),
    }
}

// ─── 1. Solar position ───────────────────────────────────────

/// Julian centuries since J2000.0 for a UTC instant.
/// TT−UT (~70 s) is ignored; it moves the sun by less than 0.001°.
fn julian_century(timestamp: DateTime<Utc>) -> f64 {
    let unix = timestamp.timestamp() as f64 + timestamp.timestamp_subsec_nanos() as f64 * 1e-9;
    let jd = unix / SECONDS_PER_DAY + UNIX_EPOCH_JD;
    (jd - J2000_JD) / DAYS_PER_CENTURY
}

/// Sun altitude (refracted) and azimuth (north = 0°, clockwise).
pub fn sun_position(timestamp: DateTime<Utc>, observer: &ObserverConfig) -> SunPosition {
    let t = julian_century(timestamp);

    // a) Orbital elements (degrees)
    let mean_lon = (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let mean_anomaly = 357.52911 + t * (35999.05029 - 0.0001537 * t);
    let eccentricity = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let m = mean_anomaly.to_radians();
    let centre = m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289;
    let true_lon = mean_lon + centre;

    // b) Apparent longitude and obliquity (nutation, aberration)
    let omega = (125.04 - 1934.136 * t).to_radians();
    let apparent_lon = (true_lon - 0.00569 - 0.00478 * omega.sin()).to_radians();
    let mean_obliquity = 23.0
        + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let obliquity = (mean_obliquity + 0.00256 * omega.cos()).to_radians();

    // c) Declination
    let decl = (obliquity.sin() * apparent_lon.sin()).asin();

    // d) Equation of time (minutes)
    let y = (obliquity / 2.0).tan().powi(2);
    let l0 = mean_lon.to_radians();
    let eot_min = 4.0
        * (y * (2.0 * l0).sin() - 2.0 * eccentricity * m.sin()
            + 4.0 * eccentricity * y * m.sin() * (2.0 * l0).cos()
            - 0.5 * y * y * (4.0 * l0).sin()
            - 1.25 * eccentricity * eccentricity * (2.0 * m).sin())
        .to_degrees();

    // e) True solar time and hour angle (degrees; negative in the morning)
    let day_start = timestamp
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(timestamp);
    let utc_min = (timestamp - day_start).num_milliseconds() as f64 / 60_000.0;
    let true_solar_min = (utc_min + eot_min + 4.0 * observer.longitude()).rem_euclid(1440.0);
    let hour_angle_deg = true_solar_min / 4.0 - 180.0;
    let hour_angle = hour_angle_deg.to_radians();

    // f) Zenith and geometric altitude
    let lat = observer.latitude().to_radians();
    let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos();
    let geometric_altitude = 90.0 - zenith.to_degrees();

    // g) Azimuth from north, clockwise
    let denom = lat.cos() * zenith.sin();
    let azimuth = if denom.abs() > 1e-12 {
        let cos_az = ((lat.sin() * cos_zenith - decl.sin()) / denom).clamp(-1.0, 1.0);
        let az = cos_az.acos().to_degrees();
        if hour_angle_deg > 0.0 {
            (az + 180.0) % 360.0
        } else {
            (540.0 - az) % 360.0
        }
    } else if lat > 0.0 {
        // sun at zenith or observer at a pole
        180.0
    } else {
        0.0
    };

    SunPosition {
        altitude: geometric_altitude + atmospheric_refraction(geometric_altitude),
        azimuth,
    }
}

// ─── 2. Refraction ───────────────────────────────────────────
/// NOAA approximation of atmospheric refraction, degrees.
fn atmospheric_refraction(elevation_deg: f64) -> f64 {
    if elevation_deg > 85.0 {
        return 0.0;
    }
    let te = elevation_deg.to_radians().tan();
    let arcsec = if elevation_deg > 5.0 {
        58.1 / te - 0.07 / te.powi(3) + 0.000086 / te.powi(5)
    } else if elevation_deg > -0.575 {
        let e = elevation_deg;
        1735.0 + e * (-518.2 + e * (103.4 + e * (-12.79 + e * 0.711)))
    } else {
        -20.772 / te
    };
    arcsec / 3600.0
}

// ─── 3. Angle of incidence ───────────────────────────────────
/// Angle between the sun direction and the panel normal, degrees in [0, 180].
pub fn angle_of_incidence(altitude_deg: f64, azimuth_deg: f64, panel: &PanelConfig) -> f64 {
    let alt = altitude_deg.to_radians();
    let tilt = panel.tilt().to_radians();
    let az_diff = (azimuth_deg - panel.azimuth()).to_radians();

    let cos_theta = alt.sin() * tilt.cos() + alt.cos() * tilt.sin() * az_diff.cos();
    cos_theta.clamp(-1.0, 1.0).acos().to_degrees()
}

// ─── 4. Incidence angle modifier ─────────────────────────────
/// Transmittance of the cover glass at `aoi_deg` relative to normal
/// incidence, clamped to [0, 1].
///
/// At exactly normal incidence the Fresnel ratios are 0/0; they are taken
/// as 0 and the result is 1. From 90° on the sun is behind the panel plane
/// and the modifier is 0 (the formula reaches 0 at 90°).
pub fn incidence_angle_modifier(aoi_deg: f64, optics: &OpticalParams) -> f64 {
    let theta = aoi_deg.to_radians();
    if theta.abs() < NORMAL_INCIDENCE_EPS {
        return 1.0;
    }
    if aoi_deg >= 90.0 {
        return 0.0;
    }

    let n = optics.refractive_index();
    let kl = optics.extinction_coefficient() * optics.glazing_thickness();

    // Snell's law
    let theta_r = (theta.sin() / n).asin();

    let s_pol = (theta_r - theta).sin().powi(2) / (theta_r + theta).sin().powi(2);
    let p_pol = (theta_r - theta).tan().powi(2) / (theta_r + theta).tan().powi(2);
    let tau = (-kl / theta_r.cos()).exp() * (1.0 - 0.5 * (s_pol + p_pol));

    let normal_reflectance = ((1.0 - n) / (1.0 + n)).powi(2);
    let iam = tau / (-kl).exp() * (1.0 + normal_reflectance);

    if iam.is_finite() { iam.clamp(0.0, 1.0) } else { 0.0 }
}

// ─── Sequence generation ─────────────────────────────────────

/// Fixed-step sampling plan. Iterating it (any number of times) yields one
/// sample per `start + k·step <= end`, ascending.
#[derive(Debug, Clone)]
pub struct IncidenceSeries {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
    observer: ObserverConfig,
    panel: PanelConfig,
    optics: OpticalParams,
}

pub fn generate_series(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_minutes: u32,
    observer: ObserverConfig,
    panel: PanelConfig,
    optics: OpticalParams,
) -> Result<IncidenceSeries, ValidationError> {
    if step_minutes == 0 {
        return Err("step must be at least one minute".into());
    }
    let step = TimeDelta::try_minutes(i64::from(step_minutes))
        .ok_or_else(|| ValidationError(format!("step {} min out of range", step_minutes)))?;

    Ok(IncidenceSeries { start, end, step, observer, panel, optics })
}

impl IncidenceSeries {
    pub fn iter(&self) -> SeriesIter<'_> {
        SeriesIter { series: self, index: 0 }
    }

    fn timestamp_at(&self, index: i32) -> Option<DateTime<Utc>> {
        let offset = self.step.checked_mul(index)?;
        let ts = self.start.checked_add_signed(offset)?;
        (ts <= self.end).then_some(ts)
    }
}

impl<'a> IntoIterator for &'a IncidenceSeries {
    type Item = IncidenceSample;
    type IntoIter = SeriesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct SeriesIter<'a> {
    series: &'a IncidenceSeries,
    index: i32,
}

impl Iterator for SeriesIter<'_> {
    type Item = IncidenceSample;

    fn next(&mut self) -> Option<Self::Item> {
        let ts = self.series.timestamp_at(self.index)?;
        self.index = self.index.checked_add(1)?;
        let s = self.series;
        Some(compute_incidence_sample(ts, &s.observer, &s.panel, &s.optics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn helsinki() -> ObserverConfig {
        ObserverConfig::new(60.192059, 24.945831).unwrap()
    }

    fn panel() -> PanelConfig {
        PanelConfig::new(40.0, 177.0).unwrap()
    }

    #[test]
    fn test_midnight_sample_helsinki() {
        // 00:00 local summer time: sun about 8° below the northern horizon
        let t = Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap();
        let s = compute_incidence_sample(t, &helsinki(), &panel(), &OpticalParams::default());

        let pinned = [
            ("solarAltitude", s.solar_altitude, -8.0442),
            ("solarAzimuth", s.solar_azimuth, 341.8332),
            ("angleOfIncidence", s.angle_of_incidence, 136.1778),
            ("cosineFactor", s.cosine_factor, -0.7215),
        ];
        for (name, got, expected) in pinned {
            assert!((got - expected).abs() < 5e-5, "{} expected {}, got {:.6}", name, expected, got);
        }
        assert_eq!(s.iam, 0.0);
        assert!((s.cosine_factor - s.angle_of_incidence.to_radians().cos()).abs() < 1e-15);
    }

    #[test]
    fn test_nrel_spa_reference_position() {
        // Reda & Andreas (2003), Golden CO, 2003-10-17 12:30:30 MST
        let obs = ObserverConfig::new(39.742476, -105.1786).unwrap();
        let t = Utc.with_ymd_and_hms(2003, 10, 17, 19, 30, 30).unwrap();
        let sun = sun_position(t, &obs);

        let zenith = 90.0 - sun.altitude;
        assert!((zenith - 50.11162).abs() < 0.02, "zenith {:.5}", zenith);
        assert!((sun.azimuth - 194.34024).abs() < 0.02, "azimuth {:.5}", sun.azimuth);
    }

    #[test]
    fn test_summer_noon_altitude() {
        // Solar noon in Helsinki near the solstice is ~10:20 UTC;
        // altitude ~ 90 - 60.19 + 23.44
        let t = Utc.with_ymd_and_hms(2024, 6, 20, 10, 20, 0).unwrap();
        let sun = sun_position(t, &helsinki());
        assert!((sun.altitude - 53.25).abs() < 0.3, "got {:.4}", sun.altitude);
        assert!((sun.azimuth - 180.0).abs() < 3.0, "got {:.4}", sun.azimuth);
    }

    #[test]
    fn test_equinox_equator() {
        // Equator on the March equinox: sun close to the zenith around 12:07 UTC
        let obs = ObserverConfig::new(0.0, 0.0).unwrap();
        let t = Utc.with_ymd_and_hms(2024, 3, 20, 12, 7, 0).unwrap();
        let sun = sun_position(t, &obs);
        assert!(sun.altitude > 89.0, "got {:.4}", sun.altitude);
    }

    #[test]
    fn test_morning_sun_in_east() {
        let t = Utc.with_ymd_and_hms(2024, 6, 20, 4, 0, 0).unwrap();
        let sun = sun_position(t, &helsinki());
        assert!(sun.altitude > 0.0);
        assert!(sun.azimuth > 45.0 && sun.azimuth < 135.0, "got {:.4}", sun.azimuth);
    }

    #[test]
    fn test_deterministic() {
        let t = Utc.with_ymd_and_hms(2024, 5, 24, 9, 45, 0).unwrap();
        let a = compute_incidence_sample(t, &helsinki(), &panel(), &OpticalParams::default());
        let b = compute_incidence_sample(t, &helsinki(), &panel(), &OpticalParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_iam_normal_incidence_is_one() {
        let iam = incidence_angle_modifier(0.0, &OpticalParams::default());
        assert_eq!(iam, 1.0);
        assert!(!iam.is_nan());
    }

    #[test]
    fn test_iam_decreases_with_angle() {
        let optics = OpticalParams::default();
        let a10 = incidence_angle_modifier(10.0, &optics);
        let a30 = incidence_angle_modifier(30.0, &optics);
        let a60 = incidence_angle_modifier(60.0, &optics);
        let a80 = incidence_angle_modifier(80.0, &optics);
        assert!(a10 >= a30 && a30 > a60 && a60 > a80, "{} {} {} {}", a10, a30, a60, a80);
        assert!((a60 - 0.944).abs() < 0.01, "IAM(60°) should be ~0.944, got {:.4}", a60);
    }

    #[test]
    fn test_iam_behind_panel_is_zero() {
        let optics = OpticalParams::default();
        for aoi in [90.0, 120.0, 179.9, 180.0] {
            assert_eq!(incidence_angle_modifier(aoi, &optics), 0.0);
        }
    }

    #[test]
    fn test_iam_bounded_over_full_range() {
        let optics = OpticalParams::default();
        for i in 0..=1800 {
            let aoi = i as f64 / 10.0;
            let iam = incidence_angle_modifier(aoi, &optics);
            assert!((0.0..=1.0).contains(&iam), "IAM({}) = {}", aoi, iam);
        }
    }

    #[test]
    fn test_angle_of_incidence_sun_on_normal() {
        // sun at altitude 50° straight along the panel azimuth, panel tilted 40°
        let aoi = angle_of_incidence(50.0, 177.0, &panel());
        assert!(aoi.abs() < 1e-5, "got {}", aoi);
        let flat = PanelConfig::new(0.0, 180.0).unwrap();
        assert!((angle_of_incidence(30.0, 90.0, &flat) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_four_decimal_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 5, 25, 11, 15, 0).unwrap();
        let s = compute_incidence_sample(t, &helsinki(), &panel(), &OpticalParams::default());
        for v in [s.solar_altitude, s.solar_azimuth, s.angle_of_incidence, s.cosine_factor, s.iam] {
            let back: f64 = format!("{:.4}", v).parse().unwrap();
            assert!((back - v).abs() < 5e-5);
        }
    }

    #[test]
    fn test_invariants_over_a_week() {
        let start = Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 28, 23, 59, 59).unwrap();
        let series = generate_series(start, end, 15, helsinki(), panel(), OpticalParams::default()).unwrap();
        for s in &series {
            assert!((0.0..=180.0).contains(&s.angle_of_incidence));
            assert!((0.0..=1.0).contains(&s.iam));
            assert!((0.0..360.0).contains(&s.solar_azimuth));
            assert_eq!(s.cosine_factor, s.angle_of_incidence.to_radians().cos());
        }
    }

    #[test]
    fn test_series_bounds_and_restart() {
        let start = Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 20, 22, 0, 0).unwrap();
        let series = generate_series(start, end, 15, helsinki(), panel(), OpticalParams::default()).unwrap();

        let first: Vec<_> = series.iter().map(|s| s.timestamp).collect();
        assert_eq!(first.len(), 5, "end on a step boundary is included");
        assert_eq!(first[0], start);
        assert_eq!(*first.last().unwrap(), end);
        assert!(first.windows(2).all(|w| w[0] < w[1]));

        let second: Vec<_> = series.iter().map(|s| s.timestamp).collect();
        assert_eq!(first, second);

        let off_boundary = Utc.with_ymd_and_hms(2024, 5, 20, 21, 59, 0).unwrap();
        let series = generate_series(start, off_boundary, 15, helsinki(), panel(), OpticalParams::default()).unwrap();
        assert_eq!(series.iter().count(), 4);
    }

    #[test]
    fn test_series_empty_when_start_after_end() {
        let start = Utc.with_ymd_and_hms(2024, 5, 21, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();
        let series = generate_series(start, end, 15, helsinki(), panel(), OpticalParams::default()).unwrap();
        assert_eq!(series.iter().count(), 0);
    }

    #[test]
    fn test_zero_step_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 5, 21, 0, 0, 0).unwrap();
        assert!(generate_series(t, t, 0, helsinki(), panel(), OpticalParams::default()).is_err());
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        assert!(ObserverConfig::new(91.0, 0.0).is_err());
        assert!(ObserverConfig::new(0.0, -180.5).is_err());
        assert!(ObserverConfig::new(f64::NAN, 0.0).is_err());
        assert!(PanelConfig::new(-1.0, 180.0).is_err());
        assert!(PanelConfig::new(30.0, 361.0).is_err());
        assert!(OpticalParams::new(1.0, 4.0, 0.002).is_err());
        assert!(OpticalParams::new(1.5, -1.0, 0.002).is_err());
    }
}
