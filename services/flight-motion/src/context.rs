//! Geospatial collaborators: terrain height and runway geometry
//!
//! The engine only asks two synchronous questions about the world, so they sit
//! behind two small traits. [`AirportDatabase`] answers both from a JSON list
//! of airports; [`NoGeoContext`] answers neither.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_m, METERS_PER_NM};

/// Airports farther than this from an aircraft are not considered its context
const AIRPORT_SEARCH_RADIUS_M: f64 = 15.0 * METERS_PER_NM;

/// Terrain elevation lookup
pub trait TerrainProvider {
    /// Terrain elevation above MSL in meters at a position, if known
    fn terrain_height_m(&self, lat: f64, lon: f64) -> Option<f64>;
}

/// Runway geometry lookup
pub trait RunwayProvider {
    /// Airport and runways relevant to an aircraft at a position
    fn runway_context(&self, lat: f64, lon: f64) -> Option<&RunwayContext>;
}

/// One end of a runway (its landing threshold)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayEnd {
    /// Runway designator, e.g. "27L"
    pub ident: String,
    pub lat: f64,
    pub lon: f64,
    /// Landing direction from this threshold
    pub true_heading_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runway {
    pub width_m: f64,
    pub ends: [RunwayEnd; 2],
}

impl Runway {
    /// Threshold-to-threshold length
    pub fn length_m(&self) -> f64 {
        let [a, b] = &self.ends;
        haversine_m(a.lat, a.lon, b.lat, b.lon)
    }

    /// "09/27" style name
    pub fn name(&self) -> String {
        format!("{}/{}", self.ends[0].ident, self.ends[1].ident)
    }
}

/// Airport reference point, elevation and runways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayContext {
    /// ICAO code
    pub airport: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    #[serde(default)]
    pub runways: Vec<Runway>,
}

impl RunwayContext {
    /// Distance from the airport reference point
    pub fn distance_m(&self, lat: f64, lon: f64) -> f64 {
        haversine_m(self.lat, self.lon, lat, lon)
    }
}

/// Error type for airport database loading
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse airport database: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Airport {airport} has a runway with coincident ends")]
    DegenerateRunway { airport: String },
}

/// Airports indexed by ICAO code
#[derive(Debug, Default)]
pub struct AirportDatabase {
    airports: HashMap<String, RunwayContext>,
}

impl AirportDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of [`RunwayContext`] records from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ContextError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loading airport database");
        Self::from_reader(BufReader::new(file))
    }

    /// Load a JSON array of [`RunwayContext`] records from a reader
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ContextError> {
        let contexts: Vec<RunwayContext> = serde_json::from_reader(reader)?;
        let mut database = Self::new();
        for context in contexts {
            database.insert(context)?;
        }

        let runways: usize = database.airports.values().map(|a| a.runways.len()).sum();
        tracing::info!(airports = database.len(), runways, "Built airport database");

        Ok(database)
    }

    pub fn insert(&mut self, mut context: RunwayContext) -> Result<(), ContextError> {
        if context.runways.iter().any(|r| r.length_m() < 1.0) {
            return Err(ContextError::DegenerateRunway {
                airport: context.airport,
            });
        }
        context.airport = context.airport.to_uppercase();
        self.airports.insert(context.airport.clone(), context);
        Ok(())
    }

    /// Get an airport by ICAO code, case-insensitive
    pub fn get(&self, icao: &str) -> Option<&RunwayContext> {
        self.airports.get(&icao.to_uppercase())
    }

    /// Nearest airport within the search radius
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<&RunwayContext> {
        self.airports
            .values()
            .map(|a| (a.distance_m(lat, lon), a))
            .filter(|(d, _)| *d <= AIRPORT_SEARCH_RADIUS_M)
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, airport)| airport)
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

impl TerrainProvider for AirportDatabase {
    fn terrain_height_m(&self, lat: f64, lon: f64) -> Option<f64> {
        self.nearest(lat, lon).map(|a| a.elevation_m)
    }
}

impl RunwayProvider for AirportDatabase {
    fn runway_context(&self, lat: f64, lon: f64) -> Option<&RunwayContext> {
        self.nearest(lat, lon)
    }
}

/// Provider that knows nothing about the world
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeoContext;

impl TerrainProvider for NoGeoContext {
    fn terrain_height_m(&self, _lat: f64, _lon: f64) -> Option<f64> {
        None
    }
}

impl RunwayProvider for NoGeoContext {
    fn runway_context(&self, _lat: f64, _lon: f64) -> Option<&RunwayContext> {
        None
    }
}
