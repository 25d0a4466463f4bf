//! Core data models for the tower admission-control system.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of runway operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Takeoff,
    Landing,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Takeoff => write!(f, "takeoff"),
            OperationKind::Landing => write!(f, "landing"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "takeoff" => Ok(OperationKind::Takeoff),
            "landing" => Ok(OperationKind::Landing),
            other => Err(format!("unknown operation kind: {other}")),
        }
    }
}

/// Priority class used for the global queue ranking.
///
/// An emergency outranks every routine operation; routine landings
/// outrank routine takeoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Emergency,
    Landing,
    Takeoff,
}

impl PriorityClass {
    /// Ordinal rank, ascending = served first.
    pub fn rank(self) -> u8 {
        match self {
            PriorityClass::Emergency => 0,
            PriorityClass::Landing => 1,
            PriorityClass::Takeoff => 2,
        }
    }

    /// Routine class matching an operation kind.
    pub fn routine_for(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Landing => PriorityClass::Landing,
            OperationKind::Takeoff => PriorityClass::Takeoff,
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityClass::Emergency => write!(f, "emergency"),
            PriorityClass::Landing => write!(f, "landing"),
            PriorityClass::Takeoff => write!(f, "takeoff"),
        }
    }
}

/// Identity of a queued operation: flight reference + operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId {
    pub flight: String,
    pub kind: OperationKind,
}

impl RequestId {
    pub fn new(flight: impl Into<String>, kind: OperationKind) -> Self {
        Self { flight: flight.into(), kind }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flight, self.kind)
    }
}

/// A pending takeoff or landing request. Immutable once enqueued.
///
/// Aircraft and pilot references are captured from the flight plan at
/// enqueue time; resolving them against the reference snapshot can still
/// fail at decision time (see `DenialReason::DataInconsistency`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(flatten)]
    pub id: RequestId,
    pub priority: PriorityClass,
    pub submitted_at: DateTime<Utc>,
    /// Preferred runway, honored only if open and compatible.
    #[serde(default)]
    pub runway_hint: Option<String>,
    pub aircraft_type: String,
    pub pilot_id: String,
}

/// Open/closed state of a runway. Mutated only by reference-data input,
/// never by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunwayStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runway {
    pub id: String,
    pub length_m: u32,
    pub status: RunwayStatus,
}

impl Runway {
    pub fn is_open(&self) -> bool {
        self.status == RunwayStatus::Open
    }
}

/// Aircraft type requirements used by the compatibility and certification
/// checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftProfile {
    pub type_code: String,
    pub min_runway_length_m: u32,
    pub required_rating: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotRecord {
    pub id: String,
    pub name: String,
    pub license_expires: NaiveDate,
    pub ratings: HashSet<String>,
}

/// One weather report. Only the most recent reading at or before the
/// decision time is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetarReading {
    pub valid_at: DateTime<Utc>,
    /// Parsed visibility; a reading without one imposes no restriction.
    #[serde(default)]
    pub visibility_km: Option<f64>,
    #[serde(default)]
    pub raw: String,
}

/// Time-windowed restriction on a runway. The runway is restricted at T
/// iff start <= T <= end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notam {
    pub runway: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub remark: String,
}

impl Notam {
    pub fn blocks_at(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Filed flight plan; the source of enqueue defaults (priority class,
/// aircraft, pilot, preferred runway).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPlan {
    pub flight: String,
    pub origin: String,
    pub destination: String,
    pub etd: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub aircraft_type: String,
    pub pilot_id: String,
    pub priority: PriorityClass,
    #[serde(default)]
    pub preferred_runway: Option<String>,
}

/// Validated reference-data snapshot, read-only for the duration of one
/// decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub runways: Vec<Runway>,
    #[serde(default)]
    pub fleet: Vec<AircraftProfile>,
    #[serde(default)]
    pub pilots: Vec<PilotRecord>,
    #[serde(default)]
    pub metars: Vec<MetarReading>,
    #[serde(default)]
    pub notams: Vec<Notam>,
    #[serde(default)]
    pub flight_plans: Vec<FlightPlan>,
}

impl ReferenceData {
    pub fn runway(&self, id: &str) -> Option<&Runway> {
        self.runways.iter().find(|r| r.id == id)
    }

    pub fn aircraft(&self, type_code: &str) -> Option<&AircraftProfile> {
        self.fleet.iter().find(|a| a.type_code == type_code)
    }

    pub fn pilot(&self, id: &str) -> Option<&PilotRecord> {
        self.pilots.iter().find(|p| p.id == id)
    }

    pub fn flight_plan(&self, flight: &str) -> Option<&FlightPlan> {
        self.flight_plans.iter().find(|p| p.flight == flight)
    }

    /// Latest reading with `valid_at <= at`. With `wraparound`, a decision
    /// before the first reading falls back to the earliest one on file;
    /// without it, no earlier reading means no authoritative METAR.
    pub fn metar_at(&self, at: DateTime<Utc>, wraparound: bool) -> Option<&MetarReading> {
        let latest = self
            .metars
            .iter()
            .filter(|m| m.valid_at <= at)
            .max_by_key(|m| m.valid_at);
        match latest {
            Some(reading) => Some(reading),
            None if wraparound => self.metars.iter().min_by_key(|m| m.valid_at),
            None => None,
        }
    }

    pub fn notams_for<'a>(&'a self, runway: &str) -> impl Iterator<Item = &'a Notam> + 'a {
        let runway = runway.to_string();
        self.notams.iter().filter(move |n| n.runway == runway)
    }

    /// NOTAM whose window contains `at` for the given runway, if any.
    pub fn blocking_notam(&self, runway: &str, at: DateTime<Utc>) -> Option<&Notam> {
        self.notams_for(runway).find(|n| n.blocks_at(at))
    }
}

/// Terminal decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Authorized,
    Denied,
}

/// Reason recorded with a denied result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenialReason {
    RunwayClosed,
    RunwayIncompatible,
    /// Blocking window carried for the audit record.
    NotamBlocked {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    WeatherMinimaExceeded,
    LicenseExpired,
    RatingMismatch,
    /// Reference data missing for an already-queued request.
    DataInconsistency {
        detail: String,
    },
}

impl DenialReason {
    /// Stable code used for counters and audit rows.
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::RunwayClosed => "runway_closed",
            DenialReason::RunwayIncompatible => "runway_incompatible",
            DenialReason::NotamBlocked { .. } => "notam_blocked",
            DenialReason::WeatherMinimaExceeded => "weather_minima_exceeded",
            DenialReason::LicenseExpired => "license_expired",
            DenialReason::RatingMismatch => "rating_mismatch",
            DenialReason::DataInconsistency { .. } => "data_inconsistency",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NotamBlocked { start, end } => {
                write!(f, "notam_blocked {}..{}", start, end)
            }
            DenialReason::DataInconsistency { detail } => {
                write!(f, "data_inconsistency: {}", detail)
            }
            other => write!(f, "{}", other.code()),
        }
    }
}

/// Outcome of one decision, handed to the audit sink exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub request: RequestId,
    pub priority: PriorityClass,
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<DenialReason>,
    /// Assigned runway when authorized.
    #[serde(default)]
    pub runway: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Counts and occupancy exposed for external reporting. Reading it has no
/// side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub takeoff_queue_depth: usize,
    pub landing_queue_depth: usize,
    /// Holder of the low-visibility slot, if occupied.
    pub weather_slot: Option<RequestId>,
    pub authorized: u64,
    pub denied: u64,
    /// Denial counts keyed by reason code, deterministically ordered.
    pub denied_by_reason: BTreeMap<String, u64>,
}
