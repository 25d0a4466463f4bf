//! Audit persistence loop.
//!
//! Drains decision results from the engine's sink channel into SQLite.
//! The stream is append-only; a failed write is retried once on the next
//! message and otherwise logged, never dropped silently.

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use twr_core::models::AuthorizationResult;

use crate::persistence::{audit as audit_db, Database};

pub async fn run_audit_persist_loop(
    db: Database,
    mut rx: mpsc::UnboundedReceiver<AuthorizationResult>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut retry: Option<AuthorizationResult> = None;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Audit persistence loop shutting down");
                break;
            }
            maybe_result = rx.recv() => {
                match maybe_result {
                    Some(result) => {
                        if let Some(pending) = retry.take() {
                            if let Err(err) = persist(&db, &pending).await {
                                tracing::warn!("Audit record retry failed: {}", err);
                            }
                        }
                        if let Err(err) = persist(&db, &result).await {
                            tracing::warn!("Audit record write failed: {} (will retry once)", err);
                            retry = Some(result);
                        }
                    }
                    None => {
                        tracing::info!("Audit channel closed");
                        break;
                    }
                }
            }
        }
    }

    // Final drain so shutdown loses nothing that was already decided.
    if let Some(pending) = retry.take() {
        if let Err(err) = persist(&db, &pending).await {
            tracing::warn!("Audit final retry failed: {}", err);
        }
    }
    while let Ok(result) = rx.try_recv() {
        if let Err(err) = persist(&db, &result).await {
            tracing::warn!("Audit final flush failed: {}", err);
        }
    }
}

async fn persist(db: &Database, result: &AuthorizationResult) -> anyhow::Result<()> {
    let id = Uuid::new_v4().to_string();
    audit_db::insert_record(db.pool(), &id, result).await
}
