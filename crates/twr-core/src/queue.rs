//! Pending-operation queues.
//!
//! An arena keyed by request identity owns the records; the takeoff and
//! landing queues hold ordering keys only, so removal is a pair of cheap
//! map operations and the record is dropped exactly once.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::models::{OperationKind, OperationRequest, RequestId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("request {0} is already queued")]
    DuplicateRequest(RequestId),
    #[error("request {0} is not queued")]
    NotFound(RequestId),
}

/// Ordering key for the global ranking. Ascending = served first:
/// priority class rank, then submission time, then flight reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: u8,
    submitted_at: DateTime<Utc>,
    id: RequestId,
}

impl QueueKey {
    fn for_request(request: &OperationRequest) -> Self {
        Self {
            rank: request.priority.rank(),
            submitted_at: request.submitted_at,
            id: request.id.clone(),
        }
    }
}

/// Two independent queues sharing one global ranking.
#[derive(Debug, Default)]
pub struct QueueManager {
    arena: HashMap<RequestId, OperationRequest>,
    takeoffs: BTreeSet<QueueKey>,
    landings: BTreeSet<QueueKey>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self, kind: OperationKind) -> &BTreeSet<QueueKey> {
        match kind {
            OperationKind::Takeoff => &self.takeoffs,
            OperationKind::Landing => &self.landings,
        }
    }

    fn keys_mut(&mut self, kind: OperationKind) -> &mut BTreeSet<QueueKey> {
        match kind {
            OperationKind::Takeoff => &mut self.takeoffs,
            OperationKind::Landing => &mut self.landings,
        }
    }

    /// Insert into the queue matching the request's operation kind.
    pub fn enqueue(&mut self, request: OperationRequest) -> Result<(), QueueError> {
        if self.arena.contains_key(&request.id) {
            return Err(QueueError::DuplicateRequest(request.id));
        }
        let key = QueueKey::for_request(&request);
        self.keys_mut(request.id.kind).insert(key);
        self.arena.insert(request.id.clone(), request);
        Ok(())
    }

    /// Highest-priority pending request across both queues, without
    /// removing it.
    pub fn next_eligible(&self) -> Option<&OperationRequest> {
        let best = match (self.takeoffs.first(), self.landings.first()) {
            (Some(t), Some(l)) => Some(t.min(l)),
            (Some(t), None) => Some(t),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }?;
        self.arena.get(&best.id)
    }

    /// Remove a specific entry, returning the owned record.
    pub fn remove(&mut self, id: &RequestId) -> Result<OperationRequest, QueueError> {
        let request = self
            .arena
            .remove(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        let key = QueueKey::for_request(&request);
        self.keys_mut(id.kind).remove(&key);
        Ok(request)
    }

    pub fn depth(&self, kind: OperationKind) -> usize {
        self.keys(kind).len()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.arena.contains_key(id)
    }

    /// Pending entries in global serving order.
    pub fn snapshot(&self) -> Vec<&OperationRequest> {
        let mut keys: Vec<&QueueKey> = self.takeoffs.iter().chain(self.landings.iter()).collect();
        keys.sort();
        keys.iter().filter_map(|k| self.arena.get(&k.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriorityClass;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, min, 0).unwrap()
    }

    fn request(
        flight: &str,
        kind: OperationKind,
        priority: PriorityClass,
        submitted_at: DateTime<Utc>,
    ) -> OperationRequest {
        OperationRequest {
            id: RequestId::new(flight, kind),
            priority,
            submitted_at,
            runway_hint: None,
            aircraft_type: "B727".into(),
            pilot_id: "P100".into(),
        }
    }

    #[test]
    fn emergency_landing_beats_earlier_routine_takeoff() {
        let mut queue = QueueManager::new();
        queue
            .enqueue(request(
                "ALT123",
                OperationKind::Takeoff,
                PriorityClass::Takeoff,
                at(9, 0),
            ))
            .unwrap();
        queue
            .enqueue(request(
                "ALT900",
                OperationKind::Landing,
                PriorityClass::Emergency,
                at(10, 0),
            ))
            .unwrap();

        assert_eq!(queue.next_eligible().unwrap().id.flight, "ALT900");
    }

    #[test]
    fn routine_landing_outranks_routine_takeoff() {
        let mut queue = QueueManager::new();
        queue
            .enqueue(request(
                "TKO1",
                OperationKind::Takeoff,
                PriorityClass::Takeoff,
                at(8, 0),
            ))
            .unwrap();
        queue
            .enqueue(request(
                "LND1",
                OperationKind::Landing,
                PriorityClass::Landing,
                at(9, 0),
            ))
            .unwrap();

        assert_eq!(queue.next_eligible().unwrap().id.flight, "LND1");
    }

    #[test]
    fn earlier_submission_wins_within_class() {
        let mut queue = QueueManager::new();
        queue
            .enqueue(request(
                "LATE",
                OperationKind::Takeoff,
                PriorityClass::Takeoff,
                at(10, 0),
            ))
            .unwrap();
        queue
            .enqueue(request(
                "EARLY",
                OperationKind::Takeoff,
                PriorityClass::Takeoff,
                at(9, 30),
            ))
            .unwrap();

        assert_eq!(queue.next_eligible().unwrap().id.flight, "EARLY");
    }

    #[test]
    fn flight_reference_breaks_exact_ties() {
        let mut queue = QueueManager::new();
        for flight in ["BBB2", "AAA1"] {
            queue
                .enqueue(request(
                    flight,
                    OperationKind::Landing,
                    PriorityClass::Landing,
                    at(9, 0),
                ))
                .unwrap();
        }
        assert_eq!(queue.next_eligible().unwrap().id.flight, "AAA1");
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let mut queue = QueueManager::new();
        let req = request(
            "ALT123",
            OperationKind::Takeoff,
            PriorityClass::Takeoff,
            at(9, 0),
        );
        queue.enqueue(req.clone()).unwrap();
        assert_eq!(
            queue.enqueue(req.clone()),
            Err(QueueError::DuplicateRequest(req.id))
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn remove_is_exactly_once() {
        let mut queue = QueueManager::new();
        let req = request(
            "ALT123",
            OperationKind::Landing,
            PriorityClass::Landing,
            at(9, 0),
        );
        let id = req.id.clone();
        queue.enqueue(req).unwrap();

        queue.remove(&id).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.remove(&id), Err(QueueError::NotFound(id)));
    }

    #[test]
    fn same_flight_may_queue_takeoff_and_landing() {
        // Identity is flight + kind, so a turnaround can hold both.
        let mut queue = QueueManager::new();
        queue
            .enqueue(request(
                "ALT321",
                OperationKind::Landing,
                PriorityClass::Landing,
                at(9, 0),
            ))
            .unwrap();
        queue
            .enqueue(request(
                "ALT321",
                OperationKind::Takeoff,
                PriorityClass::Takeoff,
                at(9, 5),
            ))
            .unwrap();
        assert_eq!(queue.depth(OperationKind::Landing), 1);
        assert_eq!(queue.depth(OperationKind::Takeoff), 1);
    }

    fn arb_priority() -> impl Strategy<Value = PriorityClass> {
        prop_oneof![
            Just(PriorityClass::Emergency),
            Just(PriorityClass::Landing),
            Just(PriorityClass::Takeoff),
        ]
    }

    fn arb_kind() -> impl Strategy<Value = OperationKind> {
        prop_oneof![Just(OperationKind::Takeoff), Just(OperationKind::Landing)]
    }

    proptest! {
        /// Draining the queue always yields the total order: higher class
        /// first, then submission time, then flight reference.
        #[test]
        fn drain_respects_total_order(
            entries in prop::collection::vec(
                ("[A-Z]{3}[0-9]{3}", arb_kind(), arb_priority(), 0u32..24, 0u32..60),
                1..40,
            )
        ) {
            let mut queue = QueueManager::new();
            for (flight, kind, priority, hour, min) in entries {
                // Duplicate identities are legitimately rejected.
                let _ = queue.enqueue(request(&flight, kind, priority, at(hour, min)));
            }

            let mut served = Vec::new();
            while let Some(next) = queue.next_eligible().cloned() {
                queue.remove(&next.id).unwrap();
                served.push(next);
            }

            for pair in served.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let ka = (a.priority.rank(), a.submitted_at, a.id.flight.clone(), a.id.kind);
                let kb = (b.priority.rank(), b.submitted_at, b.id.flight.clone(), b.id.kind);
                prop_assert!(ka <= kb, "serving order violated: {:?} before {:?}", ka, kb);
            }
            prop_assert!(queue.is_empty());
        }
    }
}
