pub mod aligner;
pub mod fmi_source;
pub mod observation_service;
pub mod record_parser;
pub mod solar_algorithm;
