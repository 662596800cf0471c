//! Command-Line Interface Module
//!
//! Argument parsing for the three pipeline steps.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::Provider;
use crate::services::record_parser::parse_timestamp;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json", env = "PV_INCIDENCE_CONFIG")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute sun position, angle of incidence and IAM for a time range
    Geometry {
        /// First sample (UTC unless an offset is given)
        #[arg(long, value_parser = parse_utc)]
        start: DateTime<Utc>,
        /// Last possible sample
        #[arg(long, value_parser = parse_utc)]
        end: DateTime<Utc>,
        /// Sampling step in minutes; defaults to the configured step
        #[arg(long)]
        step: Option<u32>,
        #[arg(long, default_value = "solarPositionData.csv")]
        output: PathBuf,
    },
    /// Download weather and radiation observations in weekly windows
    Fetch {
        #[arg(long, value_parser = parse_utc)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_utc)]
        end: DateTime<Utc>,
        /// Observation provider; defaults to the configured one (FMI)
        #[arg(long, value_enum)]
        provider: Option<Provider>,
        #[arg(long, default_value = "weatherdata.txt")]
        weather_out: PathBuf,
        #[arg(long, default_value = "radiationdata.txt")]
        radiation_out: PathBuf,
    },
    /// Merge the raw temperature and radiation files into one CSV
    Combine {
        #[arg(long, default_value = "weatherdata.txt")]
        weather: PathBuf,
        #[arg(long, default_value = "radiationdata.txt")]
        radiation: PathBuf,
        #[arg(long, default_value = "combinedweatherdata.csv")]
        output: PathBuf,
    },
}

/// Accepts the timestamp forms of the raw data files, or a bare date (midnight UTC).
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>, String> {
    if let Some(ts) = parse_timestamp(s) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}', expected e.g. 2024-05-20T21:00:00Z", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_geometry_args() {
        let args = Args::try_parse_from([
            "pv-incidence", "geometry",
            "--start", "2024-05-20T21:00:00Z",
            "--end", "2024-05-28T23:59:59Z",
        ]).unwrap();
        assert_eq!(args.config, "config.json");
        match args.command {
            Command::Geometry { start, step, output, .. } => {
                assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 20, 21, 0, 0).unwrap());
                assert_eq!(step, None);
                assert_eq!(output, PathBuf::from("solarPositionData.csv"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bare_date() {
        assert_eq!(parse_utc("2024-06-11"), Ok(Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap()));
        assert!(parse_utc("11.06.2024").is_err());
    }

    #[test]
    fn test_fetch_provider() {
        let args = Args::try_parse_from([
            "pv-incidence", "fetch",
            "--start", "2024-05-11T21:00:00Z", "--end", "2024-06-11",
            "--provider", "open-meteo",
        ]).unwrap();
        match args.command {
            Command::Fetch { provider, weather_out, .. } => {
                assert_eq!(provider, Some(Provider::OpenMeteo));
                assert_eq!(weather_out, PathBuf::from("weatherdata.txt"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::try_parse_from([
            "pv-incidence", "fetch", "--start", "2024-05-11", "--end", "2024-06-11",
        ]).unwrap();
        assert!(matches!(args.command, Command::Fetch { provider: None, .. }));
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Args::try_parse_from(["pv-incidence"]).is_err());
    }
}
