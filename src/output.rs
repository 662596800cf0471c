//! CSV writers for the geometry series and the merged observation series.
//!
//! Timestamps are written in the civil time of the configured zone,
//! `DD.MM.YYYY HH:MM`, with daylight saving applied by chrono-tz.

use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::geometry::IncidenceSample;
use crate::models::sensor::{AIR_TEMPERATURE, MergedSeries, RADIATION_PARAMETERS};

pub const GEOMETRY_HEADER: [&str; 6] = [
    "date",
    "solarAltitude",
    "solarAzimuth",
    "angleOfIncidence",
    "cosineFactor",
    "IAM",
];

pub fn format_local(timestamp: DateTime<Utc>, tz: &Tz) -> String {
    timestamp.with_timezone(tz).format("%d.%m.%Y %H:%M").to_string()
}

fn fixed4(v: f64) -> String {
    format!("{:.4}", v)
}

/// Comma separated, one row per sample, numbers with four decimals.
pub fn write_geometry_csv<W: Write>(
    writer: W,
    samples: &[IncidenceSample],
    tz: &Tz,
) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(GEOMETRY_HEADER)?;
    for s in samples {
        wtr.write_record([
            format_local(s.timestamp, tz),
            fixed4(s.solar_altitude),
            fixed4(s.solar_azimuth),
            fixed4(s.angle_of_incidence),
            fixed4(s.cosine_factor),
            fixed4(s.iam),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Semicolon separated: `Timestamp`, the radiation parameters, `Air temperature`.
/// Unset values are left empty.
pub fn write_merged_csv<W: Write>(
    writer: W,
    series: &MergedSeries,
    tz: &Tz,
) -> Result<(), AppError> {
    let columns: Vec<&str> = RADIATION_PARAMETERS
        .iter()
        .copied()
        .chain(std::iter::once(AIR_TEMPERATURE))
        .collect();

    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

    let mut header = vec!["Timestamp"];
    header.extend(&columns);
    wtr.write_record(&header)?;

    for record in series.records() {
        let mut row = vec![format_local(record.timestamp, tz)];
        row.extend(
            columns
                .iter()
                .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::sensor::{GLOBAL_RADIATION, SensorRecord};
    use crate::services::aligner::align;

    #[test]
    fn test_local_time_with_dst() {
        let tz: Tz = "Europe/Helsinki".parse().unwrap();
        // EEST, UTC+3
        let summer = Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap();
        assert_eq!(format_local(summer, &tz), "21.05.2024 00:00");
        // EET, UTC+2
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_local(winter, &tz), "15.01.2024 12:30");
    }

    #[test]
    fn test_geometry_csv() {
        let tz: Tz = "Europe/Helsinki".parse().unwrap();
        let sample = IncidenceSample {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap(),
            solar_altitude: -8.04420,
            solar_azimuth: 341.8,
            angle_of_incidence: 136.17777,
            cosine_factor: -0.72149,
            iam: 0.0,
        };
        let mut buf = Vec::new();
        write_geometry_csv(&mut buf, &[sample], &tz).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,solarAltitude,solarAzimuth,angleOfIncidence,cosineFactor,IAM");
        assert_eq!(lines[1], "21.05.2024 00:00,-8.0442,341.8000,136.1778,-0.7215,0.0000");
    }

    #[test]
    fn test_merged_csv() {
        let tz: Tz = "Europe/Helsinki".parse().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap();
        let mut temp = SensorRecord::empty(t, "101104");
        temp.values.insert(AIR_TEMPERATURE.to_string(), 11.4);
        let mut rad = SensorRecord::empty(t + chrono::TimeDelta::minutes(15), "101104");
        rad.values.insert(GLOBAL_RADIATION.to_string(), 2.5);

        let series = align(&[temp], &[rad]);
        let mut buf = Vec::new();
        write_merged_csv(&mut buf, &series, &tz).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Timestamp;Global radiation;Direct solar radiation;Reflected radiation;Diffuse radiation;Air temperature");
        assert_eq!(lines[1], "21.05.2024 00:00;;;;;11.4");
        assert_eq!(lines[2], "21.05.2024 00:15;2.5;;;;");
    }
}
