//! FMI open data station observations.
//!
//! Uses the `fmi::observations::{weather,radiation}::multipointcoverage`
//! stored queries of the WFS 2.0 service, filtered by station (`fmisid`),
//! bounding box and time step. The answer is a GML multi-point coverage:
//! `positions` holds one `lat lon unixtime` triple per row, the tuple list
//! holds one value per requested field in the same row order, and the
//! station points map coordinates back to station ids.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;

use crate::errors::FetchError;
use crate::models::observation::BoundingBox;
use crate::models::sensor::{
    AIR_TEMPERATURE, DIFFUSE_RADIATION, DIRECT_SOLAR_RADIATION, GLOBAL_RADIATION,
    REFLECTED_RADIATION, SensorCategory, SensorRecord,
};
use crate::services::observation_service::{ObservationQuery, ObservationSource};

pub const DEFAULT_FMI_URL: &str = "https://opendata.fmi.fi/wfs";

/// Coverage field code and the parameter name it is stored under.
const WEATHER_FIELDS: [(&str, &str); 1] = [("t2m", AIR_TEMPERATURE)];
const RADIATION_FIELDS: [(&str, &str); 4] = [
    ("GLOB_1MIN", GLOBAL_RADIATION),
    ("DIR_1MIN", DIRECT_SOLAR_RADIATION),
    ("REFL_1MIN", REFLECTED_RADIATION),
    ("DIFF_1MIN", DIFFUSE_RADIATION),
];

fn fields(category: SensorCategory) -> &'static [(&'static str, &'static str)] {
    match category {
        SensorCategory::Weather => &WEATHER_FIELDS,
        SensorCategory::Radiation => &RADIATION_FIELDS,
    }
}

fn stored_query(category: SensorCategory) -> &'static str {
    match category {
        SensorCategory::Weather => "fmi::observations::weather::multipointcoverage",
        SensorCategory::Radiation => "fmi::observations::radiation::multipointcoverage",
    }
}

/// WFS order: `min_lon,min_lat,max_lon,max_lat`
fn bbox_param(bbox: &BoundingBox) -> String {
    format!("{},{},{},{}", bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat)
}

pub struct FmiSource {
    client: Client,
    base_url: String,
}

impl FmiSource {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, base_url: base_url.to_string() })
    }

    fn query_params(query: &ObservationQuery) -> Vec<(&'static str, String)> {
        let parameters: Vec<&str> = fields(query.category).iter().map(|(code, _)| *code).collect();
        vec![
            ("service", "WFS".to_string()),
            ("version", "2.0.0".to_string()),
            ("request", "getFeature".to_string()),
            ("storedquery_id", stored_query(query.category).to_string()),
            ("fmisid", query.station_id.clone()),
            ("bbox", bbox_param(&query.bbox)),
            ("starttime", query.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("endtime", query.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timestep", query.step_minutes.to_string()),
            ("parameters", parameters.join(",")),
        ]
    }
}

impl ObservationSource for FmiSource {
    async fn fetch(&self, query: &ObservationQuery) -> Result<Vec<SensorRecord>, FetchError> {
        let req = self.client.get(&self.base_url)
            .query(&Self::query_params(query))
            .send().await?;

        let status = req.status();
        if !status.is_success() {
            return Err(FetchError(format!("{:?}", status)));
        }

        let body = req.text().await?;
        let coverage = parse_multipoint_coverage(&body)?;
        coverage.into_records(query)
    }
}

// ─── Coverage parsing ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CoverageBlock {
    fields: Vec<String>,
    positions: String,
    tuples: String,
}

/// Raw content of a multipointcoverage response.
#[derive(Debug, Default)]
pub struct MultiPointCoverage {
    /// `(lat, lon)` text as written in `gml:pos` → fmisid
    stations: HashMap<(String, String), String>,
    blocks: Vec<CoverageBlock>,
}

#[derive(Clone, Copy)]
enum TextTarget {
    None,
    StationPos,
    Positions,
    Tuples,
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, FetchError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FetchError(err.to_string()))?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub fn parse_multipoint_coverage(xml: &str) -> Result<MultiPointCoverage, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut coverage = MultiPointCoverage::default();
    let mut current = CoverageBlock::default();
    let mut target = TextTarget::None;
    let mut station: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Point" => {
                    station = attribute(&e, b"id")?
                        .and_then(|id| id.strip_prefix("point-").map(str::to_string));
                }
                b"pos" if station.is_some() => target = TextTarget::StationPos,
                b"positions" => target = TextTarget::Positions,
                b"doubleOrNilReasonTupleList" => target = TextTarget::Tuples,
                b"field" => current.fields.extend(attribute(&e, b"name")?),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"field" => {
                current.fields.extend(attribute(&e, b"name")?);
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                match target {
                    TextTarget::StationPos => {
                        let mut parts = text.split_whitespace();
                        if let (Some(lat), Some(lon), Some(id)) = (parts.next(), parts.next(), station.as_ref()) {
                            coverage.stations.insert((lat.to_string(), lon.to_string()), id.clone());
                        }
                    }
                    TextTarget::Positions => {
                        current.positions.push_str(&text);
                        current.positions.push(' ');
                    }
                    TextTarget::Tuples => {
                        current.tuples.push_str(&text);
                        current.tuples.push(' ');
                    }
                    TextTarget::None => {}
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"Point" => station = None,
                b"pos" | b"positions" | b"doubleOrNilReasonTupleList" => target = TextTarget::None,
                b"MultiPointCoverage" => coverage.blocks.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(coverage)
}

impl MultiPointCoverage {
    /// One record per coverage row. `NaN` cells are unknown; fields without a
    /// parameter mapping for the query category are ignored.
    pub fn into_records(self, query: &ObservationQuery) -> Result<Vec<SensorRecord>, FetchError> {
        let mapping = fields(query.category);
        let mut records = Vec::new();

        for block in &self.blocks {
            if block.fields.is_empty() {
                return Err("coverage without fields".into());
            }
            let names: Vec<Option<&str>> = block
                .fields
                .iter()
                .map(|f| mapping.iter().find(|(code, _)| code.eq_ignore_ascii_case(f)).map(|(_, name)| *name))
                .collect();

            let positions: Vec<&str> = block.positions.split_whitespace().collect();
            let tuples: Vec<&str> = block.tuples.split_whitespace().collect();
            if positions.len() % 3 != 0 || positions.len() / 3 * names.len() != tuples.len() {
                return Err(FetchError(format!(
                    "coverage shape mismatch: {} position tokens, {} values for {} fields",
                    positions.len(), tuples.len(), names.len()
                )));
            }

            for (position, row) in positions.chunks(3).zip(tuples.chunks(names.len())) {
                let unix: i64 = position[2]
                    .parse()
                    .map_err(|_| FetchError(format!("bad unix time '{}'", position[2])))?;
                let timestamp = DateTime::<Utc>::from_timestamp(unix, 0)
                    .ok_or_else(|| FetchError(format!("unix time {} out of range", unix)))?;
                let station = self
                    .stations
                    .get(&(position[0].to_string(), position[1].to_string()))
                    .unwrap_or(&query.station_id);

                let mut record = SensorRecord::empty(timestamp, station);
                for (name, cell) in names.iter().zip(row) {
                    if let (Some(name), Ok(v)) = (name, cell.parse::<f64>()) {
                        if v.is_finite() {
                            record.values.insert(name.to_string(), v);
                        }
                    }
                }
                records.push(record);
            }
        }
        Ok(records)
    }
}
