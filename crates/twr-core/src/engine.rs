//! Authorization engine.
//!
//! Selects the next eligible request from the queues, runs the admission
//! chain against a reference-data snapshot, and produces a terminal
//! result. Every decision removes the request from its queue exactly once
//! and hands the result to the audit sink before returning.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::checks::{admission_chain, CheckContext, CheckOutcome, EligibilityCheck};
use crate::models::{
    AuthorizationResult, Decision, DenialReason, EngineStatus, Notam, OperationKind,
    OperationRequest, ReferenceData, RequestId, Runway,
};
use crate::queue::{QueueError, QueueManager};
use crate::rules::OperationRules;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Outcome of one `authorize_next` call.
#[derive(Debug, Clone)]
pub enum Authorization {
    Decided(AuthorizationResult),
    NoOperationPending,
}

/// Durable record of every decision. The engine calls `record` exactly
/// once per result, synchronously, before the decision call returns.
pub trait AuditSink {
    fn record(&mut self, result: &AuthorizationResult);
}

/// In-memory sink for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    pub records: Vec<AuthorizationResult>,
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, result: &AuthorizationResult) {
        self.records.push(result.clone());
    }
}

pub struct AuthorizationEngine<S: AuditSink> {
    queue: QueueManager,
    rules: OperationRules,
    /// Holder of the single low-visibility authorization, if any.
    weather_slot: Option<RequestId>,
    authorized: u64,
    denied: u64,
    denied_by_reason: BTreeMap<String, u64>,
    checks: Vec<Box<dyn EligibilityCheck + Send>>,
    sink: S,
}

impl<S: AuditSink> AuthorizationEngine<S> {
    pub fn new(rules: OperationRules, sink: S) -> Self {
        Self {
            queue: QueueManager::new(),
            rules,
            weather_slot: None,
            authorized: 0,
            denied: 0,
            denied_by_reason: BTreeMap::new(),
            checks: admission_chain(),
            sink,
        }
    }

    /// Add a request to the queue matching its operation kind.
    pub fn enqueue(&mut self, request: OperationRequest) -> Result<(), EngineError> {
        tracing::info!(request = %request.id, priority = ?request.priority, "request enqueued");
        self.queue.enqueue(request)?;
        Ok(())
    }

    /// Decide the highest-priority pending request against the given
    /// snapshot. The request leaves its queue with a terminal result
    /// either way; denied requests are not retried.
    pub fn authorize_next(
        &mut self,
        refdata: &ReferenceData,
        decision_time: DateTime<Utc>,
    ) -> Authorization {
        let Some(candidate) = self.queue.next_eligible().cloned() else {
            return Authorization::NoOperationPending;
        };

        let metar = refdata.metar_at(decision_time, self.rules.metar_wraparound);
        let visibility = metar.and_then(|m| m.visibility_km);
        let low_visibility = self.rules.is_low_visibility(visibility);
        // The slot only exists while visibility is below minima; a normal
        // sample vacates it.
        if !low_visibility {
            self.weather_slot = None;
        }

        let reason = self.evaluate(&candidate, refdata, decision_time);
        match reason {
            Ok(runway) => {
                if low_visibility {
                    self.weather_slot = Some(candidate.id.clone());
                }
                self.finish(&candidate, Decision::Authorized, None, Some(runway), decision_time)
            }
            Err(reason) => self.finish(&candidate, Decision::Denied, Some(reason), None, decision_time),
        }
    }

    /// External completion signal. Releases the weather slot iff the
    /// finished operation holds it.
    pub fn complete_operation(&mut self, id: &RequestId) -> bool {
        if self.weather_slot.as_ref() == Some(id) {
            tracing::info!(request = %id, "operation complete, weather slot released");
            self.weather_slot = None;
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.queue.contains(id)
    }

    /// Pending entries in serving order.
    pub fn pending(&self) -> Vec<OperationRequest> {
        self.queue.snapshot().into_iter().cloned().collect()
    }

    /// Idempotent view of queue depths, slot occupancy and counters.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            takeoff_queue_depth: self.queue.depth(OperationKind::Takeoff),
            landing_queue_depth: self.queue.depth(OperationKind::Landing),
            weather_slot: self.weather_slot.clone(),
            authorized: self.authorized,
            denied: self.denied,
            denied_by_reason: self.denied_by_reason.clone(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run reference resolution plus the admission chain. `Ok` carries the
    /// assigned runway id.
    fn evaluate(
        &self,
        request: &OperationRequest,
        refdata: &ReferenceData,
        decision_time: DateTime<Utc>,
    ) -> Result<String, DenialReason> {
        let aircraft = refdata.aircraft(&request.aircraft_type).ok_or_else(|| {
            DenialReason::DataInconsistency {
                detail: format!("aircraft type {} not in fleet", request.aircraft_type),
            }
        })?;
        let pilot =
            refdata
                .pilot(&request.pilot_id)
                .ok_or_else(|| DenialReason::DataInconsistency {
                    detail: format!("pilot {} not on file", request.pilot_id),
                })?;
        let runway = resolve_runway(refdata, request, aircraft.min_runway_length_m, decision_time)
            .ok_or_else(|| DenialReason::DataInconsistency {
                detail: "no runways in reference data".to_string(),
            })?;

        let notams: Vec<&Notam> = refdata.notams_for(&runway.id).collect();
        let ctx = CheckContext {
            request,
            runway,
            aircraft,
            pilot,
            metar: refdata.metar_at(decision_time, self.rules.metar_wraparound),
            notams: &notams,
            weather_slot: self.weather_slot.as_ref(),
            rules: &self.rules,
            decision_time,
        };

        for check in &self.checks {
            if let CheckOutcome::Fail(reason) = check.evaluate(&ctx) {
                tracing::debug!(
                    request = %request.id,
                    check = check.name(),
                    %reason,
                    "admission check failed"
                );
                return Err(reason);
            }
        }
        Ok(runway.id.clone())
    }

    /// Remove the request from its queue, update counters, and hand the
    /// result to the audit sink.
    fn finish(
        &mut self,
        request: &OperationRequest,
        decision: Decision,
        reason: Option<DenialReason>,
        runway: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Authorization {
        self.queue
            .remove(&request.id)
            .expect("candidate taken from next_eligible under the same borrow");

        match decision {
            Decision::Authorized => {
                self.authorized += 1;
                tracing::info!(request = %request.id, runway = runway.as_deref(), "AUTHORIZED");
            }
            Decision::Denied => {
                self.denied += 1;
                if let Some(reason) = &reason {
                    *self
                        .denied_by_reason
                        .entry(reason.code().to_string())
                        .or_insert(0) += 1;
                    tracing::info!(request = %request.id, %reason, "DENIED");
                }
            }
        }

        let result = AuthorizationResult {
            request: request.id.clone(),
            priority: request.priority,
            decision,
            reason,
            runway,
            decided_at,
        };
        self.sink.record(&result);
        Authorization::Decided(result)
    }
}

/// Candidate runway selection.
///
/// The explicit hint wins iff that runway is open and long enough.
/// Otherwise: best length match (smallest surplus over the requirement,
/// ties on id) among open, long-enough runways that are not under an
/// active NOTAM. When no runway qualifies the fallback is still
/// deterministic so the subsequent denial reason reflects the real
/// obstacle: all blocked -> best open/long match (fails NOTAM check);
/// all too short -> longest open runway (fails length); all closed ->
/// first runway by id (fails status). `None` only when the snapshot has
/// no runways at all.
fn resolve_runway<'a>(
    refdata: &'a ReferenceData,
    request: &OperationRequest,
    min_length_m: u32,
    at: DateTime<Utc>,
) -> Option<&'a Runway> {
    if let Some(hint) = &request.runway_hint {
        if let Some(runway) = refdata.runway(hint) {
            if runway.is_open() && runway.length_m >= min_length_m {
                return Some(runway);
            }
        }
    }

    let open: Vec<&Runway> = refdata.runways.iter().filter(|r| r.is_open()).collect();
    let long_enough: Vec<&Runway> = open
        .iter()
        .copied()
        .filter(|r| r.length_m >= min_length_m)
        .collect();

    let best_fit = |candidates: &[&'a Runway]| -> Option<&'a Runway> {
        candidates
            .iter()
            .copied()
            .min_by_key(|r| (r.length_m - min_length_m, r.id.clone()))
    };

    let unblocked: Vec<&Runway> = long_enough
        .iter()
        .copied()
        .filter(|r| refdata.blocking_notam(&r.id, at).is_none())
        .collect();

    if let Some(runway) = best_fit(&unblocked) {
        return Some(runway);
    }
    if let Some(runway) = best_fit(&long_enough) {
        return Some(runway);
    }
    if let Some(runway) = open
        .iter()
        .copied()
        .max_by_key(|r| (r.length_m, std::cmp::Reverse(r.id.clone())))
    {
        return Some(runway);
    }
    refdata
        .runways
        .iter()
        .min_by_key(|r| r.id.clone())
}
