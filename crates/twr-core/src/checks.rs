//! Eligibility checks for the admission chain.
//!
//! Each check is an independent pass/fail predicate over one decision
//! context. The engine evaluates them in a fixed order and stops at the
//! first failure, so denial reasons are deterministic and auditable.

use chrono::{DateTime, Utc};

use crate::models::{
    AircraftProfile, DenialReason, MetarReading, Notam, OperationRequest, PilotRecord, RequestId,
    Runway,
};
use crate::rules::OperationRules;

/// Everything one check may look at. Checks never mutate state.
pub struct CheckContext<'a> {
    pub request: &'a OperationRequest,
    pub runway: &'a Runway,
    pub aircraft: &'a AircraftProfile,
    pub pilot: &'a PilotRecord,
    /// Authoritative METAR at the decision time, if any.
    pub metar: Option<&'a MetarReading>,
    /// NOTAMs filed against the candidate runway.
    pub notams: &'a [&'a Notam],
    /// Current holder of the low-visibility slot.
    pub weather_slot: Option<&'a RequestId>,
    pub rules: &'a OperationRules,
    pub decision_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Pass,
    Fail(DenialReason),
}

pub trait EligibilityCheck {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckOutcome;
}

/// Runway must be open and long enough for the aircraft type.
pub struct RunwayCompatibility;

impl EligibilityCheck for RunwayCompatibility {
    fn name(&self) -> &'static str {
        "runway_compatibility"
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        if !ctx.runway.is_open() {
            return CheckOutcome::Fail(DenialReason::RunwayClosed);
        }
        if ctx.runway.length_m < ctx.aircraft.min_runway_length_m {
            return CheckOutcome::Fail(DenialReason::RunwayIncompatible);
        }
        CheckOutcome::Pass
    }
}

/// No NOTAM window on the candidate runway may contain the decision time.
pub struct NotamRestriction;

impl EligibilityCheck for NotamRestriction {
    fn name(&self) -> &'static str {
        "notam_restriction"
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        match ctx.notams.iter().find(|n| n.blocks_at(ctx.decision_time)) {
            Some(notam) => CheckOutcome::Fail(DenialReason::NotamBlocked {
                start: notam.start,
                end: notam.end,
            }),
            None => CheckOutcome::Pass,
        }
    }
}

/// Under low visibility only one operation may hold an authorization at a
/// time. Normal visibility (or no reading) passes unconditionally.
pub struct WeatherGate;

impl EligibilityCheck for WeatherGate {
    fn name(&self) -> &'static str {
        "weather_gate"
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        let visibility = ctx.metar.and_then(|m| m.visibility_km);
        if !ctx.rules.is_low_visibility(visibility) {
            return CheckOutcome::Pass;
        }
        match ctx.weather_slot {
            None => CheckOutcome::Pass,
            Some(holder) if holder == &ctx.request.id => CheckOutcome::Pass,
            Some(_) => CheckOutcome::Fail(DenialReason::WeatherMinimaExceeded),
        }
    }
}

/// Pilot license must be current and the aircraft's required rating held.
/// License expiry is reported first when both fail.
pub struct Certification;

impl EligibilityCheck for Certification {
    fn name(&self) -> &'static str {
        "certification"
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckOutcome {
        if ctx.pilot.license_expires < ctx.decision_time.date_naive() {
            return CheckOutcome::Fail(DenialReason::LicenseExpired);
        }
        if !ctx.pilot.ratings.contains(&ctx.aircraft.required_rating) {
            return CheckOutcome::Fail(DenialReason::RatingMismatch);
        }
        CheckOutcome::Pass
    }
}

/// The fixed admission chain, in evaluation order.
pub fn admission_chain() -> Vec<Box<dyn EligibilityCheck + Send>> {
    vec![
        Box::new(RunwayCompatibility),
        Box::new(NotamRestriction),
        Box::new(WeatherGate),
        Box::new(Certification),
    ]
}
