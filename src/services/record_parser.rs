/// Raw sensor line reader
///
/// Line format, one observation per line:
///
///   Time: 2024-05-20T21:00:00Z, Station: 101104, Data: {'Air temperature': 11.2, 'Wind speed': nan}
///
/// The `Data` mapping is read with a small tokenizer (quoted keys, bare
/// numbers / `nan` / `None`, quoted strings). Malformed lines are reported
/// as `ParseError` and recovered by `parse_lines`.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};

use crate::errors::{ParseError, ParseErrorKind};
use crate::models::sensor::{AIR_TEMPERATURE, RADIATION_PARAMETERS, SensorCategory, SensorRecord};

const TIME_TAG: &str = "Time:";
const STATION_TAG: &str = ", Station:";
const DATA_TAG: &str = ", Data:";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse one line into a record of the given category.
pub fn parse_line(line: &str, category: SensorCategory) -> Result<SensorRecord, ParseError> {
    let line = line.trim();
    let rest = line
        .strip_prefix(TIME_TAG)
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingField("Time")))?;

    let (ts_str, rest) = rest
        .split_once(STATION_TAG)
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingField("Station")))?;
    let timestamp = parse_timestamp(ts_str.trim())
        .ok_or_else(|| ParseError::new(ParseErrorKind::BadTimestamp(ts_str.trim().to_string())))?;

    let (station, payload) = match rest.split_once(DATA_TAG) {
        Some((station, payload)) => (station.trim(), payload),
        None => {
            return Err(ParseError {
                kind: ParseErrorKind::MissingField("Data"),
                timestamp: Some(timestamp),
                station: None,
            });
        }
    };

    let entries = parse_mapping(payload).map_err(|msg| ParseError {
        kind: ParseErrorKind::BadPayload(msg),
        timestamp: Some(timestamp),
        station: Some(station.to_string()),
    })?;

    let mut record = SensorRecord::empty(timestamp, station);
    match category {
        SensorCategory::Weather => {
            if let Some(RawValue::Number(v)) = entries.get(AIR_TEMPERATURE) {
                record.values.insert(AIR_TEMPERATURE.to_string(), *v);
            }
        }
        SensorCategory::Radiation => {
            for name in RADIATION_PARAMETERS {
                if let Some(RawValue::Number(v)) = entries.get(name) {
                    // negative readings are sensor noise
                    record.values.insert(name.to_string(), v.max(0.0));
                }
            }
        }
    }
    Ok(record)
}

/// Parse a whole text dump. Lines without a `Time:` tag are ignored; lines
/// with a readable timestamp but a broken payload become empty records.
pub fn parse_lines(text: &str, category: SensorCategory) -> Vec<SensorRecord> {
    let mut records = Vec::new();
    let mut recovered = 0usize;
    let mut skipped = 0usize;

    for (idx, line) in text.lines().enumerate() {
        if !line.contains(TIME_TAG) {
            continue;
        }
        match parse_line(line, category) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("{} line {}: {}", category.label(), idx + 1, e);
                #[cfg(feature = "verbose_log")]
                log::trace!("rejected line {}: {}", idx + 1, line);

                if let Some(ts) = e.timestamp {
                    let station = e.station.as_deref().unwrap_or_default();
                    records.push(SensorRecord::empty(ts, station));
                    recovered += 1;
                } else {
                    skipped += 1;
                }
            }
        }
    }

    debug!(
        "{}: {} records ({} recovered as empty, {} skipped)",
        category.label(),
        records.len(),
        recovered,
        skipped
    );
    records
}

/// RFC 3339, or a naive ISO-like timestamp taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.strip_suffix('Z').unwrap_or(s);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

// ─── Mapping tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Colon,
    Comma,
    Str(String),
    Atom(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RawValue {
    Number(f64),
    Unknown,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().peekable() }
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        while let Some((_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
        let Some((start, c)) = self.chars.next() else {
            return Ok(None);
        };
        let token = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '\'' | '"' => Token::Str(self.quoted(c)?),
            _ => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, c)) = self.chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | ':' | ',' | '\'' | '"') {
                        break;
                    }
                    end = i + c.len_utf8();
                    self.chars.next();
                }
                Token::Atom(self.src[start..end].to_string())
            }
        };
        Ok(Some(token))
    }

    fn quoted(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
        Err("unterminated string".to_string())
    }
}

fn atom_value(atom: &str) -> RawValue {
    match atom.parse::<f64>() {
        Ok(v) if v.is_finite() => RawValue::Number(v),
        // nan, inf, None, null, True, ...
        _ => RawValue::Unknown,
    }
}

fn parse_mapping(src: &str) -> Result<BTreeMap<String, RawValue>, String> {
    let mut lexer = Lexer::new(src);
    let mut entries = BTreeMap::new();

    if lexer.next_token()? != Some(Token::LBrace) {
        return Err("expected '{'".to_string());
    }

    let mut first = true;
    loop {
        let key = match lexer.next_token()? {
            Some(Token::RBrace) if first => break,
            Some(Token::Str(key)) => key,
            Some(other) => return Err(format!("expected quoted key, found {:?}", other)),
            None => return Err("unexpected end of mapping".to_string()),
        };
        first = false;

        if lexer.next_token()? != Some(Token::Colon) {
            return Err(format!("expected ':' after '{}'", key));
        }
        let value = match lexer.next_token()? {
            Some(Token::Atom(atom)) => atom_value(&atom),
            Some(Token::Str(_)) => RawValue::Unknown,
            Some(other) => return Err(format!("expected value for '{}', found {:?}", key, other)),
            None => return Err("unexpected end of mapping".to_string()),
        };
        entries.insert(key, value);

        match lexer.next_token()? {
            Some(Token::Comma) => continue,
            Some(Token::RBrace) => break,
            Some(other) => return Err(format!("expected ',' or '}}', found {:?}", other)),
            None => return Err("unexpected end of mapping".to_string()),
        }
    }

    if let Some(trailing) = lexer.next_token()? {
        return Err(format!("trailing input after mapping: {:?}", trailing));
    }
    Ok(entries)
}
