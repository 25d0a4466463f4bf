pub mod checks;
pub mod engine;
pub mod models;
pub mod queue;
pub mod rules;

pub use checks::{admission_chain, CheckContext, CheckOutcome, EligibilityCheck};
pub use engine::{Authorization, AuditSink, AuthorizationEngine, EngineError, MemoryAuditSink};
pub use models::{
    AircraftProfile, AuthorizationResult, Decision, DenialReason, EngineStatus, FlightPlan,
    MetarReading, Notam, OperationKind, OperationRequest, PilotRecord, PriorityClass,
    ReferenceData, RequestId, Runway, RunwayStatus,
};
pub use queue::{QueueError, QueueManager};
pub use rules::OperationRules;
