//! Reference-data snapshot loading.
//!
//! The tower consumes one validated JSON snapshot (runways, fleet, pilots,
//! METAR history, NOTAMs, flight plans). Validation happens here, at the
//! boundary; the engine only ever sees a well-formed snapshot.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

use twr_core::models::ReferenceData;

/// Load and validate a snapshot file.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<ReferenceData> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading reference data {}", path.display()))?;
    let data: ReferenceData = serde_json::from_str(&raw)
        .with_context(|| format!("parsing reference data {}", path.display()))?;
    validate(&data)?;
    Ok(data)
}

/// Reject snapshots the engine must never see: duplicate identifiers,
/// inverted NOTAM windows, dangling flight-plan references.
pub fn validate(data: &ReferenceData) -> Result<()> {
    let mut runway_ids = HashSet::new();
    for runway in &data.runways {
        if !runway_ids.insert(runway.id.as_str()) {
            bail!("duplicate runway {}", runway.id);
        }
    }
    let mut type_codes = HashSet::new();
    for aircraft in &data.fleet {
        if !type_codes.insert(aircraft.type_code.as_str()) {
            bail!("duplicate aircraft type {}", aircraft.type_code);
        }
    }
    let mut pilot_ids = HashSet::new();
    for pilot in &data.pilots {
        if !pilot_ids.insert(pilot.id.as_str()) {
            bail!("duplicate pilot {}", pilot.id);
        }
    }
    for notam in &data.notams {
        if notam.end < notam.start {
            bail!(
                "NOTAM for {} has inverted window {}..{}",
                notam.runway,
                notam.start,
                notam.end
            );
        }
        if !runway_ids.contains(notam.runway.as_str()) {
            bail!("NOTAM references unknown runway {}", notam.runway);
        }
    }
    let mut flights = HashSet::new();
    for plan in &data.flight_plans {
        if !flights.insert(plan.flight.as_str()) {
            bail!("duplicate flight plan {}", plan.flight);
        }
        if !type_codes.contains(plan.aircraft_type.as_str()) {
            bail!(
                "flight {} files unknown aircraft type {}",
                plan.flight,
                plan.aircraft_type
            );
        }
        if !pilot_ids.contains(plan.pilot_id.as_str()) {
            bail!("flight {} files unknown pilot {}", plan.flight, plan.pilot_id);
        }
        if let Some(runway) = &plan.preferred_runway {
            if !runway_ids.contains(runway.as_str()) {
                bail!("flight {} prefers unknown runway {}", plan.flight, runway);
            }
        }
    }
    Ok(())
}
