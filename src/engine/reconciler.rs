//! The reconciler: applies a rule-table result to a tooth-diagnosis row.
//!
//! `reconcile` is a pure state transition; persistence goes through an
//! optimistic-concurrency guard on `updated_at` with a single retry.
//! Units of work for different records are independent; same-record
//! writers serialize through the guard, never through a lock.

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{get_tooth_diagnosis, guarded_status_update};
use crate::db::DatabaseError;
use crate::models::ToothDiagnosis;
use crate::rules::RuleMatch;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Updated(ToothDiagnosis),
    /// Row already carries the rule's status/color with no pending
    /// follow-up; nothing written, replay stays idempotent.
    Unchanged,
    /// Guard failed after one retry; reported, never escalated.
    Conflict,
    /// Row disappeared between resolution and write.
    Missing,
}

/// Pure transition. Sets status and color from the rule, clears the
/// follow-up flag (a completed event settles this episode; a later event
/// may set it again), stamps `updated_at`. Never touches tooth number,
/// diagnosis text, or ownership.
pub fn reconcile(current: &ToothDiagnosis, rule: &RuleMatch, now: NaiveDateTime) -> ToothDiagnosis {
    ToothDiagnosis {
        status: rule.status,
        color_code: rule.color.to_string(),
        follow_up_required: false,
        updated_at: next_stamp(current.updated_at, now),
        ..current.clone()
    }
}

/// Next `updated_at` value. Strictly after the previous stamp even when
/// the clock reads equal or behind, so per-record notification ordering
/// can sequence on it.
fn next_stamp(previous: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Current time truncated to the microsecond resolution the store keeps.
pub fn now_micros() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(now.nanosecond() / 1000 * 1000)
        .unwrap_or(now)
}

/// Read, reconcile, and write one record with the optimistic guard.
pub fn apply_rule(
    conn: &Connection,
    id: &Uuid,
    rule: &RuleMatch,
) -> Result<WriteOutcome, DatabaseError> {
    let Some(current) = get_tooth_diagnosis(conn, id)? else {
        return Ok(WriteOutcome::Missing);
    };
    apply_rule_from(conn, &current, rule)
}

/// Reconcile from an already-read snapshot. One guarded attempt; if the
/// row moved underneath, re-read and retry exactly once, then report a
/// conflict for this record without affecting the rest of the batch.
pub fn apply_rule_from(
    conn: &Connection,
    current: &ToothDiagnosis,
    rule: &RuleMatch,
) -> Result<WriteOutcome, DatabaseError> {
    if is_settled(current, rule) {
        return Ok(WriteOutcome::Unchanged);
    }

    let next = reconcile(current, rule, now_micros());
    if guarded_status_update(conn, &next, current.updated_at)? == 1 {
        return Ok(WriteOutcome::Updated(next));
    }

    // Single retry from a fresh read.
    let Some(fresh) = get_tooth_diagnosis(conn, &current.id)? else {
        return Ok(WriteOutcome::Missing);
    };
    if is_settled(&fresh, rule) {
        return Ok(WriteOutcome::Unchanged);
    }
    let next = reconcile(&fresh, rule, now_micros());
    if guarded_status_update(conn, &next, fresh.updated_at)? == 1 {
        return Ok(WriteOutcome::Updated(next));
    }

    tracing::warn!(tooth_diagnosis_id = %current.id, "Write conflict after retry");
    Ok(WriteOutcome::Conflict)
}

fn is_settled(current: &ToothDiagnosis, rule: &RuleMatch) -> bool {
    current.status == rule.status
        && current.color_code == rule.color
        && !current.follow_up_required
}
