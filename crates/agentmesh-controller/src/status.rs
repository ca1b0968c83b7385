//! Status Reporter (§4.5): sets one Accepted condition per resource,
//! writing only when something actually changed.

use agentmesh_core::{AcceptedStatus, Condition, ConditionStatus};

use crate::error::ControllerError;

/// Compute the Accepted condition for a successful reconcile.
pub fn accepted(generation: i64) -> (i64, Condition) {
    (
        generation,
        Condition {
            condition_type: "Accepted".into(),
            status: ConditionStatus::True,
            reason: "ReconcileSucceeded".into(),
            message: "resource accepted".into(),
            last_transition_time: chrono::Utc::now(),
        },
    )
}

/// Compute the Accepted condition for a failed reconcile, with the error's
/// stable reason and a human message naming what went wrong.
pub fn rejected(generation: i64, err: &ControllerError) -> (i64, Condition) {
    (
        generation,
        Condition {
            condition_type: "Accepted".into(),
            status: ConditionStatus::False,
            reason: err.reason().into(),
            message: err.to_string(),
            last_transition_time: chrono::Utc::now(),
        },
    )
}

/// Whether writing `new` over `current` is actually necessary (§4.5: "a
/// condition change is written only when status or message changes, or
/// when observedGeneration lags the spec generation").
pub fn needs_write(current: &AcceptedStatus, new_generation: i64, new_condition: &Condition) -> bool {
    if current.observed_generation != new_generation {
        return true;
    }
    match current.conditions.as_deref().unwrap_or_default().first() {
        Some(existing) => {
            existing.status != new_condition.status || existing.message != new_condition.message
        }
        None => true,
    }
}

/// Apply a computed condition onto a status block, returning whether a
/// write actually happened.
pub fn apply(status: &mut AcceptedStatus, generation: i64, condition: Condition) -> bool {
    if !needs_write(status, generation, &condition) {
        return false;
    }
    status.observed_generation = generation;
    status.conditions = Some(vec![condition]);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_write_when_nothing_changed() {
        let mut status = AcceptedStatus::default();
        let (gen, cond) = accepted(1);
        assert!(apply(&mut status, gen, cond.clone()));
        assert!(!apply(&mut status, gen, cond));
    }

    #[test]
    fn write_when_generation_advances() {
        let mut status = AcceptedStatus::default();
        let (gen, cond) = accepted(1);
        apply(&mut status, gen, cond);

        let (gen2, cond2) = accepted(2);
        assert!(apply(&mut status, gen2, cond2));
        assert_eq!(status.observed_generation, 2);
    }

    #[test]
    fn accepted_equals_generation_when_true() {
        let mut status = AcceptedStatus::default();
        let (gen, cond) = accepted(5);
        apply(&mut status, gen, cond);
        assert!(status.accepted());
        assert_eq!(status.observed_generation, 5);
    }
}
