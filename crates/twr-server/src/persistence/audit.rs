//! Audit record persistence operations.
//!
//! Append-only: rows are inserted once per decision and never updated.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use twr_core::models::{
    AuthorizationResult, Decision, DenialReason, OperationKind, PriorityClass, RequestId,
};

fn kind_str(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Takeoff => "takeoff",
        OperationKind::Landing => "landing",
    }
}

fn parse_kind(s: &str) -> Result<OperationKind> {
    match s {
        "takeoff" => Ok(OperationKind::Takeoff),
        "landing" => Ok(OperationKind::Landing),
        other => Err(anyhow!("unknown operation kind {other:?}")),
    }
}

fn priority_str(priority: PriorityClass) -> &'static str {
    match priority {
        PriorityClass::Emergency => "emergency",
        PriorityClass::Landing => "landing",
        PriorityClass::Takeoff => "takeoff",
    }
}

fn parse_priority(s: &str) -> Result<PriorityClass> {
    match s {
        "emergency" => Ok(PriorityClass::Emergency),
        "landing" => Ok(PriorityClass::Landing),
        "takeoff" => Ok(PriorityClass::Takeoff),
        other => Err(anyhow!("unknown priority class {other:?}")),
    }
}

fn decision_str(decision: Decision) -> &'static str {
    match decision {
        Decision::Authorized => "authorized",
        Decision::Denied => "denied",
    }
}

fn parse_decision(s: &str) -> Result<Decision> {
    match s {
        "authorized" => Ok(Decision::Authorized),
        "denied" => Ok(Decision::Denied),
        other => Err(anyhow!("unknown decision {other:?}")),
    }
}

/// Insert one decision record.
pub async fn insert_record(pool: &SqlitePool, id: &str, result: &AuthorizationResult) -> Result<()> {
    let reason_json = match &result.reason {
        Some(reason) => Some(serde_json::to_string(reason)?),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO audit_records (id, flight, kind, priority, decision, reason, runway, decided_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(id)
    .bind(&result.request.flight)
    .bind(kind_str(result.request.kind))
    .bind(priority_str(result.priority))
    .bind(decision_str(result.decision))
    .bind(&reason_json)
    .bind(&result.runway)
    .bind(result.decided_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the most recent decisions, newest first.
pub async fn load_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<AuthorizationResult>> {
    let rows = sqlx::query_as::<_, AuditRow>(
        r#"
        SELECT id, flight, kind, priority, decision, reason, runway, decided_at
        FROM audit_records
        ORDER BY decided_at DESC, id DESC
        LIMIT ?1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    #[allow(dead_code)]
    id: String,
    flight: String,
    kind: String,
    priority: String,
    decision: String,
    reason: Option<String>,
    runway: Option<String>,
    decided_at: String,
}

impl TryFrom<AuditRow> for AuthorizationResult {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        let reason: Option<DenialReason> = match row.reason {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        let decided_at = DateTime::parse_from_rfc3339(&row.decided_at)?.with_timezone(&Utc);

        Ok(AuthorizationResult {
            request: RequestId::new(row.flight, parse_kind(&row.kind)?),
            priority: parse_priority(&row.priority)?,
            decision: parse_decision(&row.decision)?,
            reason,
            runway: row.runway,
            decided_at,
        })
    }
}
