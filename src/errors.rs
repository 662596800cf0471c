use std::fmt;
use std::fmt::Formatter;
use chrono::{DateTime, Utc};

/// Invalid observer, panel, optics or sampling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);
impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationError: {}", self.0)
    }
}
impl From<&str> for ValidationError {
    fn from(e: &str) -> Self { ValidationError(e.to_string()) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    MissingField(&'static str),
    BadTimestamp(String),
    BadPayload(String),
}

/// A sensor line that could not be fully read.
///
/// `timestamp` and `station` are filled in when the line got that far, which
/// lets the caller keep the line as an empty record instead of dropping it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub station: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self { kind, timestamp: None, station: None }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::MissingField(name) => write!(f, "ParseError: missing field '{}'", name),
            ParseErrorKind::BadTimestamp(ts) => write!(f, "ParseError: bad timestamp '{}'", ts),
            ParseErrorKind::BadPayload(msg) => write!(f, "ParseError: bad payload: {}", msg),
        }
    }
}

/// Retrieval failure for one observation window.
#[derive(Debug)]
pub struct FetchError(pub String);
impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "FetchError: {}", self.0)
    }
}
impl From<&str> for FetchError {
    fn from(e: &str) -> Self { FetchError(e.to_string()) }
}
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self { FetchError(e.to_string()) }
}
impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self { FetchError(e.to_string()) }
}
impl From<quick_xml::Error> for FetchError {
    fn from(e: quick_xml::Error) -> Self { FetchError(e.to_string()) }
}

#[derive(Debug)]
pub struct ConfigError(pub String);
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}
impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self { ConfigError(e.to_string()) }
}
impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self { ConfigError(e.to_string()) }
}

/// Error that aborts the run
#[derive(Debug)]
pub struct AppError(pub String);
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AppError: {}", self.0)
    }
}
impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self { AppError(e.to_string()) }
}
impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self { AppError(e.to_string()) }
}
impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self { AppError(e.to_string()) }
}
impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self { AppError(e.to_string()) }
}
impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self { AppError(e.to_string()) }
}
