//! Derived status policy for cases and stages.
//!
//! Statuses are never stored decisions: they are pure functions of the facts
//! on the aggregate, recomputed after every applied event. Replaying the same
//! stream therefore always yields the same statuses.

use crate::case::{CaseStatus, MemorandumStatus, Stage, StageStatus};

/// Derive the status of a single stage from its artifacts.
pub fn stage_status(stage: &Stage) -> StageStatus {
    if stage.closed {
        return StageStatus::Completed;
    }
    if stage.submission_proof.is_some() {
        return StageStatus::Submitted;
    }
    if stage.memorandum_status() == Some(MemorandumStatus::Approved) {
        return StageStatus::Approved;
    }
    StageStatus::InProgress
}

/// Derive the case status from the current stage and case-level facts.
///
/// Precedence, highest first: archival, court submission, the approved
/// memorandum's signature progress, then the review loop, then assignment.
pub fn case_status(
    archived: bool,
    current: &Stage,
    accepted: bool,
    signature_requested: bool,
    signature_recorded: bool,
    lawyer_assigned: bool,
) -> CaseStatus {
    if archived {
        return CaseStatus::Archived;
    }
    if current.submission_proof.is_some() {
        return CaseStatus::Submitted;
    }
    match current.memorandum_status() {
        Some(MemorandumStatus::Approved) => {
            if signature_recorded {
                CaseStatus::ReadyForSubmission
            } else if signature_requested {
                CaseStatus::PendingSignature
            } else {
                CaseStatus::Approved
            }
        }
        Some(MemorandumStatus::Pending) => CaseStatus::PendingApproval,
        Some(MemorandumStatus::Rejected) => CaseStatus::UnderReview,
        None if accepted => CaseStatus::UnderReview,
        None if lawyer_assigned => CaseStatus::Assigned,
        None => CaseStatus::Draft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Memorandum, StageKind, SubmissionProof};
    use chancery_core::{FileRef, UserId};
    use chrono::Utc;
    use proptest::prelude::*;

    fn stage_with(memo: Option<MemorandumStatus>, proof: bool, closed: bool) -> Stage {
        let mut stage = Stage::new(0, StageKind::Main);
        stage.memorandum = memo.map(|status| Memorandum {
            content: "memo".to_string(),
            file: FileRef::new("memo.pdf").unwrap(),
            prepared_by: UserId::new(),
            prepared_at: Utc::now(),
            status,
            approved_by: None,
            approved_at: None,
            feedback: None,
        });
        if proof {
            stage.submission_proof = Some(SubmissionProof {
                file: FileRef::new("receipt.pdf").unwrap(),
                submitted_by: UserId::new(),
                submitted_at: Utc::now(),
            });
        }
        stage.closed = closed;
        stage
    }

    #[test]
    fn fresh_case_is_draft() {
        let stage = stage_with(None, false, false);
        assert_eq!(
            case_status(false, &stage, false, false, false, false),
            CaseStatus::Draft
        );
    }

    #[test]
    fn assignment_without_acceptance_is_assigned() {
        let stage = stage_with(None, false, false);
        assert_eq!(
            case_status(false, &stage, false, false, false, true),
            CaseStatus::Assigned
        );
    }

    #[test]
    fn acceptance_moves_to_under_review() {
        let stage = stage_with(None, false, false);
        assert_eq!(
            case_status(false, &stage, true, false, false, true),
            CaseStatus::UnderReview
        );
    }

    #[test]
    fn pending_memo_is_pending_approval() {
        let stage = stage_with(Some(MemorandumStatus::Pending), false, false);
        assert_eq!(
            case_status(false, &stage, true, false, false, true),
            CaseStatus::PendingApproval
        );
    }

    #[test]
    fn rejected_memo_returns_to_under_review() {
        let stage = stage_with(Some(MemorandumStatus::Rejected), false, false);
        assert_eq!(
            case_status(false, &stage, true, false, false, true),
            CaseStatus::UnderReview
        );
    }

    #[test]
    fn approved_memo_walks_the_signature_ladder() {
        let stage = stage_with(Some(MemorandumStatus::Approved), false, false);
        assert_eq!(
            case_status(false, &stage, true, false, false, true),
            CaseStatus::Approved
        );
        assert_eq!(
            case_status(false, &stage, true, true, false, true),
            CaseStatus::PendingSignature
        );
        assert_eq!(
            case_status(false, &stage, true, true, true, true),
            CaseStatus::ReadyForSubmission
        );
        // A recorded signature outranks a stale request flag.
        assert_eq!(
            case_status(false, &stage, true, false, true, true),
            CaseStatus::ReadyForSubmission
        );
    }

    #[test]
    fn filing_proof_yields_submitted() {
        let stage = stage_with(Some(MemorandumStatus::Approved), true, false);
        assert_eq!(
            case_status(false, &stage, true, false, true, true),
            CaseStatus::Submitted
        );
    }

    #[test]
    fn archival_outranks_everything() {
        let stage = stage_with(Some(MemorandumStatus::Approved), true, false);
        assert_eq!(
            case_status(true, &stage, true, true, true, true),
            CaseStatus::Archived
        );
    }

    #[test]
    fn stage_status_ladder() {
        assert_eq!(
            stage_status(&stage_with(None, false, false)),
            StageStatus::InProgress
        );
        assert_eq!(
            stage_status(&stage_with(Some(MemorandumStatus::Pending), false, false)),
            StageStatus::InProgress
        );
        assert_eq!(
            stage_status(&stage_with(Some(MemorandumStatus::Approved), false, false)),
            StageStatus::Approved
        );
        assert_eq!(
            stage_status(&stage_with(Some(MemorandumStatus::Approved), true, false)),
            StageStatus::Submitted
        );
        assert_eq!(
            stage_status(&stage_with(Some(MemorandumStatus::Approved), true, true)),
            StageStatus::Completed
        );
    }

    fn memo_strategy() -> impl Strategy<Value = Option<MemorandumStatus>> {
        prop_oneof![
            Just(None),
            Just(Some(MemorandumStatus::Pending)),
            Just(Some(MemorandumStatus::Approved)),
            Just(Some(MemorandumStatus::Rejected)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: an archived case reads Archived no matter what other
        /// facts say.
        #[test]
        fn archived_always_wins(
            memo in memo_strategy(),
            proof in any::<bool>(),
            accepted in any::<bool>(),
            requested in any::<bool>(),
            recorded in any::<bool>(),
            assigned in any::<bool>(),
        ) {
            let stage = stage_with(memo, proof, false);
            prop_assert_eq!(
                case_status(true, &stage, accepted, requested, recorded, assigned),
                CaseStatus::Archived
            );
        }

        /// Property: status derivation is a pure function; the same facts
        /// always produce the same status.
        #[test]
        fn derivation_is_deterministic(
            archived in any::<bool>(),
            memo in memo_strategy(),
            proof in any::<bool>(),
            accepted in any::<bool>(),
            requested in any::<bool>(),
            recorded in any::<bool>(),
            assigned in any::<bool>(),
        ) {
            let stage = stage_with(memo, proof, false);
            let first = case_status(archived, &stage, accepted, requested, recorded, assigned);
            let second = case_status(archived, &stage, accepted, requested, recorded, assigned);
            prop_assert_eq!(first, second);
        }

        /// Property: a live case only reads Submitted when the current stage
        /// holds a filing proof.
        #[test]
        fn submitted_requires_a_filing_proof(
            memo in memo_strategy(),
            proof in any::<bool>(),
            accepted in any::<bool>(),
            requested in any::<bool>(),
            recorded in any::<bool>(),
            assigned in any::<bool>(),
        ) {
            let stage = stage_with(memo, proof, false);
            let status = case_status(false, &stage, accepted, requested, recorded, assigned);
            if status == CaseStatus::Submitted {
                prop_assert!(stage.submission_proof.is_some());
            }
        }
    }
}
