//! Flight phase classification.
//!
//! Turns the rendered kinematic state, its ground contact and the nearby
//! runway geometry into an operational phase such as taxi, takeoff roll or
//! final approach.
//!
//! # Rule Order
//!
//! ```text
//! GoAround     airborne, climbing hard, recently on approach
//! ShortFinal   airborne, track aligned with a runway, inside 2 NM
//! Final        airborne, track aligned with a runway, inside 10 NM
//! runway       on the runway surface: Rolling, RollOut, LinedUp
//! HoldShort    stopped next to a runway
//! Pushback     slow, moving against the heading
//! Taxi         other ground movement
//! Climbing / Pattern / Inbound   other airborne states
//! Stopped      no movement
//! ```

mod classifier;
mod history;
mod runway;

use serde::Serialize;

pub use classifier::PhaseClassifier;
pub use history::{PhaseHistory, PhaseSample};
pub use runway::{ApproachGeometry, RunwayGeometry};

/// Operational phase of an aircraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FlightPhase {
    Pushback,
    Taxi,
    HoldShort,
    LinedUp,
    Rolling,
    Climbing,
    Inbound,
    Pattern,
    Final,
    ShortFinal,
    RollOut,
    GoAround,
    Stopped,
}

impl FlightPhase {
    pub const ALL: [FlightPhase; 13] = [
        FlightPhase::Pushback,
        FlightPhase::Taxi,
        FlightPhase::HoldShort,
        FlightPhase::LinedUp,
        FlightPhase::Rolling,
        FlightPhase::Climbing,
        FlightPhase::Inbound,
        FlightPhase::Pattern,
        FlightPhase::Final,
        FlightPhase::ShortFinal,
        FlightPhase::RollOut,
        FlightPhase::GoAround,
        FlightPhase::Stopped,
    ];

    /// Get a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            FlightPhase::Pushback => "pushing back from the gate",
            FlightPhase::Taxi => "taxiing",
            FlightPhase::HoldShort => "holding short of a runway",
            FlightPhase::LinedUp => "lined up on a runway",
            FlightPhase::Rolling => "takeoff roll",
            FlightPhase::Climbing => "climbing out",
            FlightPhase::Inbound => "inbound",
            FlightPhase::Pattern => "in the traffic pattern",
            FlightPhase::Final => "on final approach",
            FlightPhase::ShortFinal => "on short final",
            FlightPhase::RollOut => "landing roll-out",
            FlightPhase::GoAround => "going around",
            FlightPhase::Stopped => "stopped",
        }
    }

    pub fn is_airborne(&self) -> bool {
        matches!(
            self,
            FlightPhase::Climbing
                | FlightPhase::Inbound
                | FlightPhase::Pattern
                | FlightPhase::Final
                | FlightPhase::ShortFinal
                | FlightPhase::GoAround
        )
    }

    pub fn is_approach(&self) -> bool {
        matches!(self, FlightPhase::Final | FlightPhase::ShortFinal)
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlightPhase::Pushback => "pushback",
            FlightPhase::Taxi => "taxi",
            FlightPhase::HoldShort => "hold-short",
            FlightPhase::LinedUp => "lined-up",
            FlightPhase::Rolling => "rolling",
            FlightPhase::Climbing => "climbing",
            FlightPhase::Inbound => "inbound",
            FlightPhase::Pattern => "pattern",
            FlightPhase::Final => "final",
            FlightPhase::ShortFinal => "short-final",
            FlightPhase::RollOut => "roll-out",
            FlightPhase::GoAround => "go-around",
            FlightPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A phase, with the runway it refers to when it is runway-specific
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedPhase {
    pub phase: FlightPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runway: Option<String>,
}

impl ClassifiedPhase {
    pub fn new(phase: FlightPhase) -> Self {
        Self {
            phase,
            runway: None,
        }
    }

    pub fn on_runway(phase: FlightPhase, runway: impl Into<String>) -> Self {
        Self {
            phase,
            runway: Some(runway.into()),
        }
    }
}

impl std::fmt::Display for ClassifiedPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.runway {
            Some(runway) => write!(f, "{} {}", self.phase, runway),
            None => write!(f, "{}", self.phase),
        }
    }
}
