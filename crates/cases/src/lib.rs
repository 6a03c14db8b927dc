//! Case lifecycle domain module (event-sourced).
//!
//! This crate contains the business rules for litigation cases, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod case;
pub mod policy;

pub use case::{
    AcceptCase, AddStageDocument, ApproveMemorandum, ArchiveCase, AssignLawyer, Case, CaseAccepted,
    CaseArchived, CaseCommand, CaseDeleted, CaseEvent, CaseId, CaseOpened, CaseStatus, CloseStage,
    DeleteCase, DirectorSignatureRecorded, DirectorSignatureRequested, Hearing, HearingScheduled,
    LawyerAssigned, Memorandum, MemorandumApproved, MemorandumRejected, MemorandumStatus,
    MemorandumSubmitted, OpenCase, OpenStage, RecordDirectorSignature, RejectMemorandum,
    RequestDirectorSignature, ScheduleHearing, Signature, Stage, StageClosed, StageDocument,
    StageDocumentAdded, StageKind, StageOpened, StageStatus, SubmissionProof, SubmitMemorandum,
    SubmitToCourt, SubmittedToCourt,
};
