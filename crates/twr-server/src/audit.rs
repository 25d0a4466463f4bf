//! Audit sink wiring.
//!
//! The engine hands every result to the sink synchronously while it holds
//! the decision lock; the sink forwards it over an unbounded channel so
//! the durable SQLite write happens off the critical section (see
//! `loops::audit_persist_loop`).

use tokio::sync::mpsc;
use tracing::warn;

use twr_core::engine::AuditSink;
use twr_core::models::AuthorizationResult;

pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuthorizationResult>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuthorizationResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&mut self, result: &AuthorizationResult) {
        if self.tx.send(result.clone()).is_err() {
            // Receiver gone: the persist loop has shut down.
            warn!(request = %result.request, "audit channel closed, record not persisted");
        }
    }
}
