mod cli;
mod config;
mod errors;
mod models;
mod output;
mod services;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};

use crate::cli::{Args, Command};
use crate::config::{Config, Provider};
use crate::errors::AppError;
use crate::models::sensor::SensorCategory;
use crate::services::aligner::align;
use crate::services::fmi_source::FmiSource;
use crate::services::observation_service::{
    ObservationQuery, ObservationSource, OpenMeteoSource, fetch_in_weekly_windows, records_to_text,
};
use crate::services::record_parser::parse_lines;
use crate::services::solar_algorithm::generate_series;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    // 1. Load configuration
    let config = Config::load(&args.config)?;
    info!("Configuration loaded from {}", args.config);

    // 2. Dispatch
    match args.command {
        Command::Geometry { start, end, step, output } => {
            run_geometry(&config, start, end, step.unwrap_or(config.step_minutes), &output)
        }
        Command::Fetch { start, end, provider, weather_out, radiation_out } => {
            let provider = provider.unwrap_or(config.observations.provider);
            run_fetch(&config, provider, start, end, &weather_out, &radiation_out).await
        }
        Command::Combine { weather, radiation, output } => {
            run_combine(&config, &weather, &radiation, &output).await
        }
    }
}

fn run_geometry(
    config: &Config,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_minutes: u32,
    out_path: &Path,
) -> Result<(), AppError> {
    // all validation happens before the first sample
    let observer = config.observer()?;
    let panel = config.panel()?;
    let optics = config.optics()?;
    let tz = config.timezone()?;
    let series = generate_series(start, end, step_minutes, observer, panel, optics)?;

    let samples: Vec<_> = series.iter().collect();
    info!(
        "[GEOMETRY] {} samples every {} min, lat={} lon={} tilt={} az={}",
        samples.len(), step_minutes, observer.latitude(), observer.longitude(), panel.tilt(), panel.azimuth()
    );

    let file = File::create(out_path)?;
    output::write_geometry_csv(BufWriter::new(file), &samples, &tz)?;
    info!("CSV file created: {}", out_path.display());
    Ok(())
}

async fn run_fetch(
    config: &Config,
    provider: Provider,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    weather_out: &Path,
    radiation_out: &Path,
) -> Result<(), AppError> {
    let obs = &config.observations;
    info!("[FETCH] provider {:?}, station {}", provider, obs.station_id);
    match provider {
        Provider::Fmi => {
            let source = FmiSource::new(&obs.fmi_url)?;
            fetch_to_files(&source, config, start, end, weather_out, radiation_out).await
        }
        Provider::OpenMeteo => {
            let source = OpenMeteoSource::new(&obs.open_meteo_url)?;
            fetch_to_files(&source, config, start, end, weather_out, radiation_out).await
        }
    }
}

async fn fetch_to_files<S: ObservationSource>(
    source: &S,
    config: &Config,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    weather_out: &Path,
    radiation_out: &Path,
) -> Result<(), AppError> {
    let obs = &config.observations;
    for (category, path) in [
        (SensorCategory::Weather, weather_out),
        (SensorCategory::Radiation, radiation_out),
    ] {
        let query = ObservationQuery {
            category,
            station_id: obs.station_id.clone(),
            bbox: obs.bbox,
            start,
            end,
            step_minutes: config.step_minutes,
        };
        let records = fetch_in_weekly_windows(source, &query).await;
        tokio::fs::write(path, records_to_text(&records, category)).await?;
        info!("{} {} records written to {}", records.len(), category.label(), path.display());
    }
    Ok(())
}

async fn run_combine(
    config: &Config,
    weather: &Path,
    radiation: &Path,
    out_path: &Path,
) -> Result<(), AppError> {
    let tz = config.timezone()?;

    let weather_text = tokio::fs::read_to_string(weather).await?;
    let radiation_text = tokio::fs::read_to_string(radiation).await?;

    let temperature = parse_lines(&weather_text, SensorCategory::Weather);
    let radiation_records = parse_lines(&radiation_text, SensorCategory::Radiation);
    let series = align(&temperature, &radiation_records);
    info!(
        "[COMBINE] {} temperature + {} radiation records -> {} rows",
        temperature.len(), radiation_records.len(), series.len()
    );
    if series.is_empty() {
        warn!("[COMBINE] no parseable records in {} or {}", weather.display(), radiation.display());
    }

    let file = File::create(out_path)?;
    output::write_merged_csv(BufWriter::new(file), &series, &tz)?;
    info!("Combined data has been saved to {}", out_path.display());
    Ok(())
}
