//! Task status transition table.
//!
//! The legal transitions are fixed; every mutation path validates here so
//! neither the user surface nor the tool surface can corrupt task state.

use chrono::{DateTime, Utc};

use crate::error::{CoordError, Result};
use crate::models::{Claim, TaskStatus};

/// Why a transition is being attempted; carries the per-edge guard inputs.
#[derive(Debug, Clone)]
pub enum TransitionContext<'a> {
    /// A claim is being created or exercised.
    WithClaim { claim: &'a Claim, now: DateTime<Utc> },
    /// A claim expired and the task is being released.
    ClaimExpired { claim: &'a Claim, now: DateTime<Utc> },
    /// Review verdict was recorded.
    Review,
    /// Rework was requested on a rejected submission.
    Rework,
}

/// Validate one edge of the task state machine.
pub fn validate(
    from: TaskStatus,
    to: TaskStatus,
    ctx: &TransitionContext<'_>,
) -> Result<()> {
    use TaskStatus::*;

    let legal = match (from, to) {
        (Available, Claimed) => matches!(
            ctx,
            TransitionContext::WithClaim { claim, now } if claim.is_active(*now)
        ),
        (Claimed, Submitted) => matches!(
            ctx,
            TransitionContext::WithClaim { claim, now } if claim.is_active(*now)
        ),
        (Claimed, Available) => matches!(
            ctx,
            TransitionContext::ClaimExpired { claim, now } if claim.is_expired(*now)
        ),
        (Submitted, Approved) => matches!(ctx, TransitionContext::Review),
        (Submitted, Rejected) => matches!(ctx, TransitionContext::Review),
        // Rework sends the submission back to review; the task re-enters
        // the submitted state from rejected.
        (Rejected, Submitted) => matches!(ctx, TransitionContext::Rework),
        _ => false,
    };

    if legal {
        Ok(())
    } else {
        Err(CoordError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClaimStatus;
    use chrono::Duration;

    fn claim(active: bool, now: DateTime<Utc>) -> Claim {
        Claim {
            claim_id: "claim-1".to_string(),
            task_id: "task-1".to_string(),
            ai_identifier: "agent-a".to_string(),
            status: ClaimStatus::Active,
            estimated_completion: None,
            expires_at: if active {
                now + Duration::hours(1)
            } else {
                now - Duration::hours(1)
            },
            created_at: now - Duration::hours(2),
        }
    }

    #[test]
    fn test_available_to_claimed_requires_active_claim() {
        let now = Utc::now();
        let live = claim(true, now);
        assert!(validate(
            TaskStatus::Available,
            TaskStatus::Claimed,
            &TransitionContext::WithClaim { claim: &live, now }
        )
        .is_ok());

        let dead = claim(false, now);
        assert!(validate(
            TaskStatus::Available,
            TaskStatus::Claimed,
            &TransitionContext::WithClaim { claim: &dead, now }
        )
        .is_err());
    }

    #[test]
    fn test_claimed_to_submitted_within_deadline() {
        let now = Utc::now();
        let live = claim(true, now);
        assert!(validate(
            TaskStatus::Claimed,
            TaskStatus::Submitted,
            &TransitionContext::WithClaim { claim: &live, now }
        )
        .is_ok());

        let expired = claim(false, now);
        assert!(validate(
            TaskStatus::Claimed,
            TaskStatus::Submitted,
            &TransitionContext::WithClaim { claim: &expired, now }
        )
        .is_err());
    }

    #[test]
    fn test_claimed_releases_only_when_expired() {
        let now = Utc::now();
        let expired = claim(false, now);
        assert!(validate(
            TaskStatus::Claimed,
            TaskStatus::Available,
            &TransitionContext::ClaimExpired { claim: &expired, now }
        )
        .is_ok());

        let live = claim(true, now);
        assert!(validate(
            TaskStatus::Claimed,
            TaskStatus::Available,
            &TransitionContext::ClaimExpired { claim: &live, now }
        )
        .is_err());
    }

    #[test]
    fn test_review_edges() {
        assert!(validate(
            TaskStatus::Submitted,
            TaskStatus::Approved,
            &TransitionContext::Review
        )
        .is_ok());
        assert!(validate(
            TaskStatus::Submitted,
            TaskStatus::Rejected,
            &TransitionContext::Review
        )
        .is_ok());
        assert!(validate(
            TaskStatus::Rejected,
            TaskStatus::Submitted,
            &TransitionContext::Rework
        )
        .is_ok());
    }

    #[test]
    fn test_edges_outside_table_fail() {
        let now = Utc::now();
        let live = claim(true, now);
        let cases = [
            (TaskStatus::Available, TaskStatus::Submitted),
            (TaskStatus::Available, TaskStatus::Approved),
            (TaskStatus::Approved, TaskStatus::Available),
            (TaskStatus::Approved, TaskStatus::Claimed),
            (TaskStatus::Submitted, TaskStatus::Claimed),
        ];
        for (from, to) in cases {
            let err = validate(from, to, &TransitionContext::WithClaim { claim: &live, now })
                .unwrap_err();
            assert!(
                matches!(err, CoordError::InvalidTransition { .. }),
                "{:?} -> {:?} should be invalid",
                from,
                to
            );
        }
    }

    #[test]
    fn test_guard_context_must_match_edge() {
        // A review context cannot drive a claim edge.
        let err = validate(
            TaskStatus::Available,
            TaskStatus::Claimed,
            &TransitionContext::Review,
        )
        .unwrap_err();
        assert!(matches!(err, CoordError::InvalidTransition { .. }));
    }
}
