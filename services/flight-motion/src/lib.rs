//! Flight Motion - aircraft state interpolation and flight-phase classification
//!
//! Turns sparse, jittery position reports from several traffic sources into a
//! continuous per-aircraft state at an arbitrary render time, decides ground
//! contact, and classifies the current flight phase against runway geometry.

pub mod config;
pub mod context;
pub mod engine;
pub mod geo;
pub mod ground;
pub mod ingest;
pub mod interpolator;
pub mod observation;
pub mod phase;
pub mod scheduler;
pub mod timeline;

pub use config::EngineConfig;
pub use context::{AirportDatabase, NoGeoContext, RunwayContext, RunwayProvider, TerrainProvider};
pub use engine::{AircraftFrame, EngineStats, MotionEngine, RenderedAircraft};
pub use ground::GroundContact;
pub use ingest::{ingest_channel, ObservationReceiver, ObservationSender};
pub use interpolator::KinematicState;
pub use observation::{parse_line, AircraftId, Observation, ObservationError, SourceTag};
pub use phase::{ClassifiedPhase, FlightPhase};
pub use timeline::IngestOutcome;
