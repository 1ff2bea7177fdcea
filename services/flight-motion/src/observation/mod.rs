//! Observation schema, parsing and validation

pub mod parser;
mod types;

pub use parser::{parse_line, validate, ObservationError};
pub use types::{AircraftId, Observation, SourceTag};
