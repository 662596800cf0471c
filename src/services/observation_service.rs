/// Observation retrieval
///
/// Historical weather and radiation observations are requested in 7-day
/// windows. Windows are independent: they are fetched concurrently, a failed
/// window contributes nothing, and the concatenated result is re-sorted so
/// the aligner always sees chronological input.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use futures_util::future::join_all;
use log::{error, info};
use reqwest::Client;

use crate::errors::FetchError;
use crate::models::observation::{BoundingBox, HistoricalResponse, MinutelyData};
use crate::models::sensor::{
    AIR_TEMPERATURE, DIFFUSE_RADIATION, DIRECT_SOLAR_RADIATION, GLOBAL_RADIATION,
    RADIATION_PARAMETERS, SensorCategory, SensorRecord,
};

const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationQuery {
    pub category: SensorCategory,
    pub station_id: String,
    pub bbox: BoundingBox,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_minutes: u32,
}

impl ObservationQuery {
    fn with_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, ..self.clone() }
    }
}

/// Anything that can return the observations of one query window.
pub trait ObservationSource {
    fn fetch(&self, query: &ObservationQuery) -> impl Future<Output = Result<Vec<SensorRecord>, FetchError>>;
}

// ─── Windowing ───────────────────────────────────────────────────────────────

/// Split `[start, end]` into consecutive windows of at most seven days.
/// Each window starts one second after the previous one ended.
pub fn weekly_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut current = start;
    while current < end {
        let window_end = (current + TimeDelta::days(WINDOW_DAYS)).min(end);
        windows.push((current, window_end));
        current = window_end + TimeDelta::seconds(1);
    }
    windows
}

/// Fetch every weekly window of `query` concurrently and return all records
/// in chronological order.
pub async fn fetch_in_weekly_windows<S: ObservationSource>(
    source: &S,
    query: &ObservationQuery,
) -> Vec<SensorRecord> {
    let windows = weekly_windows(query.start, query.end);
    info!(
        "[FETCH] {} station {}: {} window(s) from {} to {}",
        query.category.label(), query.station_id, windows.len(), query.start, query.end
    );

    let tasks = windows.into_iter().map(|(start, end)| {
        let window = query.with_window(start, end);
        async move {
            let result = source.fetch(&window).await;
            (window, result)
        }
    });

    let mut records = Vec::new();
    for (window, result) in join_all(tasks).await {
        match result {
            Ok(mut batch) => {
                info!("[FETCH] {} {} .. {}: {} records", window.category.label(), window.start, window.end, batch.len());
                records.append(&mut batch);
            }
            Err(e) => {
                error!("[FETCH] {} {} .. {} failed, window skipped: {}", window.category.label(), window.start, window.end, e);
            }
        }
    }

    records.sort_by_key(|r| r.timestamp);
    records
}

// ─── Open-Meteo source ───────────────────────────────────────────────────────

pub const DEFAULT_OPEN_METEO_URL: &str = "https://historical-forecast-api.open-meteo.com/v1/forecast";

/// Historical 15-minute model data from Open-Meteo, queried at the centre
/// of the bounding box and labelled with the configured station id.
/// Has no reflected radiation.
pub struct OpenMeteoSource {
    client: Client,
    base_url: String,
}

impl OpenMeteoSource {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, base_url: base_url.to_string() })
    }

    fn variables(category: SensorCategory) -> &'static str {
        match category {
            SensorCategory::Weather => "temperature_2m",
            SensorCategory::Radiation => "shortwave_radiation,direct_radiation,diffuse_radiation",
        }
    }
}

impl ObservationSource for OpenMeteoSource {
    async fn fetch(&self, query: &ObservationQuery) -> Result<Vec<SensorRecord>, FetchError> {
        let (lat, lon) = query.bbox.centre();
        let req = self.client.get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("start_date", query.start.format("%Y-%m-%d").to_string()),
                ("end_date", query.end.format("%Y-%m-%d").to_string()),
                ("minutely_15", Self::variables(query.category).to_string()),
                ("timezone", "GMT".to_string()),
            ])
            .send().await?;

        let status = req.status();
        if !status.is_success() {
            return Err(FetchError(format!("{:?}", status)));
        }

        let response = req.json::<HistoricalResponse>().await?;
        let data = response.minutely_15.ok_or("response has no minutely_15 block")?;

        records_from_minutely(&data, query)
    }
}

fn column_value(column: &Option<Vec<Option<f64>>>, idx: usize) -> Option<f64> {
    column
        .as_ref()
        .and_then(|c| c.get(idx).copied().flatten())
        .filter(|v| v.is_finite())
}

/// Turn the column-oriented response into records inside the query window
/// and on the query step.
fn records_from_minutely(data: &MinutelyData, query: &ObservationQuery) -> Result<Vec<SensorRecord>, FetchError> {
    let step = i64::from(query.step_minutes.max(1));
    let columns: Vec<(&str, &Option<Vec<Option<f64>>>)> = match query.category {
        SensorCategory::Weather => vec![(AIR_TEMPERATURE, &data.temperature_2m)],
        SensorCategory::Radiation => vec![
            (GLOBAL_RADIATION, &data.shortwave_radiation),
            (DIRECT_SOLAR_RADIATION, &data.direct_radiation),
            (DIFFUSE_RADIATION, &data.diffuse_radiation),
        ],
    };
    let mut records = Vec::new();

    for (idx, time) in data.time.iter().enumerate() {
        let timestamp = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
            .map_err(|e| FetchError(format!("bad time '{}': {}", time, e)))?
            .and_utc();
        if timestamp < query.start || timestamp > query.end || (timestamp.timestamp() / 60) % step != 0 {
            continue;
        }

        let mut record = SensorRecord::empty(timestamp, &query.station_id);
        for (name, column) in &columns {
            if let Some(v) = column_value(column, idx) {
                record.values.insert(name.to_string(), v);
            }
        }
        records.push(record);
    }
    Ok(records)
}

// ─── Raw text output ─────────────────────────────────────────────────────────

/// One line of the raw sensor text format. Every parameter of the category
/// is written; unknown values as `nan`.
pub fn format_raw_line(record: &SensorRecord, category: SensorCategory) -> String {
    let names: &[&str] = match category {
        SensorCategory::Weather => &[AIR_TEMPERATURE],
        SensorCategory::Radiation => &RADIATION_PARAMETERS,
    };
    let entries: Vec<String> = names
        .iter()
        .map(|name| match record.values.get(*name) {
            Some(v) => format!("'{}': {}", name, v),
            None => format!("'{}': nan", name),
        })
        .collect();

    format!(
        "Time: {}, Station: {}, Data: {{{}}}",
        record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        record.station,
        entries.join(", ")
    )
}

pub fn records_to_text(records: &[SensorRecord], category: SensorCategory) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format_raw_line(record, category));
        out.push('\n');
    }
    out
}
