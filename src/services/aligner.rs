use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::models::sensor::{
    AIR_TEMPERATURE, MergedRecord, MergedSeries, RADIATION_PARAMETERS, SensorRecord,
};

/// Forward-fill: every `None` takes the last preceding `Some`.
/// Leading `None`s stay `None`.
pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Ensure chronological order and one record per timestamp.
///
/// Out-of-order input is stable-sorted (with a warning); for duplicate
/// timestamps the later record in input order wins.
fn normalize_stream(name: &str, records: &[SensorRecord]) -> Vec<SensorRecord> {
    let mut sorted = records.to_vec();
    if !records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        warn!("{} stream is not in chronological order, sorting before gap-fill", name);
        sorted.sort_by_key(|r| r.timestamp);
    }

    let mut out: Vec<SensorRecord> = Vec::with_capacity(sorted.len());
    for record in sorted {
        match out.last_mut() {
            Some(prev) if prev.timestamp == record.timestamp => {
                debug!("{} stream: duplicate timestamp {}, keeping the later record", name, record.timestamp);
                *prev = record;
            }
            _ => out.push(record),
        }
    }
    out
}

fn clamp_radiation(parameter: &str, value: f64) -> f64 {
    if RADIATION_PARAMETERS.iter().any(|p| *p == parameter) {
        value.max(0.0)
    } else {
        value
    }
}

/// Outer-join the temperature and radiation streams on exact timestamp.
///
/// The temperature stream is forward-filled before the join, so a
/// timestamp present only in the radiation stream gets no temperature.
/// Radiation values are clamped at zero whatever source produced them.
pub fn align(temperature: &[SensorRecord], radiation: &[SensorRecord]) -> MergedSeries {
    let temperature = normalize_stream("temperature", temperature);
    let radiation = normalize_stream("radiation", radiation);

    let raw: Vec<Option<f64>> = temperature.iter().map(|r| r.temperature()).collect();
    let filled = forward_fill(&raw);

    let mut merged: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();

    for record in &radiation {
        merged
            .entry(record.timestamp)
            .or_default()
            .extend(record.values.iter().map(|(k, v)| (k.clone(), clamp_radiation(k, *v))));
    }

    for (record, temp) in temperature.iter().zip(filled) {
        let values = merged.entry(record.timestamp).or_default();
        if let Some(t) = temp {
            values.insert(AIR_TEMPERATURE.to_string(), t);
        }
    }

    let records: Vec<MergedRecord> = merged
        .into_iter()
        .map(|(timestamp, values)| MergedRecord { timestamp, values })
        .collect();

    debug!(
        "aligned {} temperature and {} radiation records into {} rows",
        temperature.len(),
        radiation.len(),
        records.len()
    );
    MergedSeries::from_sorted(records)
}
