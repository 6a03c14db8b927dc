use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use chancery_core::{
    Actor, Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, Entity, FileRef,
    StaffRole, UserId,
};
use chancery_events::Event;

use crate::policy;

/// Case identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub AggregateId);

impl CaseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Case status lifecycle.
///
/// Never assigned directly by command handlers: every value is derived by
/// [`policy::case_status`] from the facts on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    Assigned,
    UnderReview,
    PendingApproval,
    Approved,
    PendingSignature,
    ReadyForSubmission,
    Submitted,
    Archived,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Draft => "draft",
            CaseStatus::Assigned => "assigned",
            CaseStatus::UnderReview => "under_review",
            CaseStatus::PendingApproval => "pending_approval",
            CaseStatus::Approved => "approved",
            CaseStatus::PendingSignature => "pending_signature",
            CaseStatus::ReadyForSubmission => "ready_for_submission",
            CaseStatus::Submitted => "submitted",
            CaseStatus::Archived => "archived",
        }
    }
}

impl core::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Litigation stage kind. A case starts at `Main`; appeal and cassation
/// stages are opened on top after a court submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Main,
    Appeal,
    Cassation,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Main => "main",
            StageKind::Appeal => "appeal",
            StageKind::Cassation => "cassation",
        }
    }
}

/// Stage status, derived from the stage's artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    InProgress,
    Submitted,
    Approved,
    Completed,
}

/// Memorandum review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorandumStatus {
    Pending,
    Approved,
    Rejected,
}

/// Legal memorandum attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memorandum {
    pub content: String,
    pub file: FileRef,
    pub prepared_by: UserId,
    pub prepared_at: DateTime<Utc>,
    pub status: MemorandumStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Reviewer feedback from the most recent rejection.
    pub feedback: Option<String>,
}

/// Scheduled court hearing for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hearing {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
    pub scheduled_by: UserId,
    pub scheduled_at: DateTime<Utc>,
    /// Reminder trigger, three days before the hearing.
    pub remind_at: DateTime<Utc>,
}

/// Proof of filing with the court.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionProof {
    pub file: FileRef,
    pub submitted_by: UserId,
    pub submitted_at: DateTime<Utc>,
}

/// Supporting document uploaded to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDocument {
    pub file: FileRef,
    pub title: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// Director signature on the case file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signed_by: UserId,
    pub file: Option<FileRef>,
    pub signed_at: DateTime<Utc>,
}

/// One litigation stage. Stages are contiguous ordinals from 0; only the
/// stage at `current_stage_index` accepts mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub number: u32,
    pub kind: StageKind,
    pub status: StageStatus,
    pub memorandum: Option<Memorandum>,
    pub hearing: Option<Hearing>,
    pub submission_proof: Option<SubmissionProof>,
    pub documents: Vec<StageDocument>,
    pub closed: bool,
}

impl Stage {
    pub fn new(number: u32, kind: StageKind) -> Self {
        Self {
            number,
            kind,
            status: StageStatus::InProgress,
            memorandum: None,
            hearing: None,
            submission_proof: None,
            documents: Vec::new(),
            closed: false,
        }
    }

    pub fn memorandum_status(&self) -> Option<MemorandumStatus> {
        self.memorandum.as_ref().map(|m| m.status)
    }
}

impl Entity for Stage {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.number
    }
}

/// Aggregate root: Case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    id: CaseId,
    case_number: String,
    client: Option<ClientId>,
    case_type: String,
    title: String,
    court: Option<String>,
    opened_by: Option<UserId>,
    opened_at: Option<DateTime<Utc>>,
    status: CaseStatus,
    assigned_lawyer: Option<UserId>,
    /// The assigned lawyer has accepted the brief for the current stage.
    accepted: bool,
    /// Write-once reviewer designation, made at assignment.
    approving_lawyer: Option<UserId>,
    director_signature: Option<Signature>,
    signature_requested: bool,
    stages: Vec<Stage>,
    current_stage_index: usize,
    archived: bool,
    archived_at: Option<DateTime<Utc>>,
    archived_by: Option<UserId>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Case {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CaseId) -> Self {
        Self {
            id,
            case_number: String::new(),
            client: None,
            case_type: String::new(),
            title: String::new(),
            court: None,
            opened_by: None,
            opened_at: None,
            status: CaseStatus::Draft,
            assigned_lawyer: None,
            accepted: false,
            approving_lawyer: None,
            director_signature: None,
            signature_requested: false,
            stages: Vec::new(),
            current_stage_index: 0,
            archived: false,
            archived_at: None,
            archived_by: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CaseId {
        self.id
    }

    pub fn case_number(&self) -> &str {
        &self.case_number
    }

    pub fn client(&self) -> Option<ClientId> {
        self.client
    }

    pub fn case_type(&self) -> &str {
        &self.case_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn court(&self) -> Option<&str> {
        self.court.as_deref()
    }

    pub fn opened_by(&self) -> Option<UserId> {
        self.opened_by
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn assigned_lawyer(&self) -> Option<UserId> {
        self.assigned_lawyer
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn approving_lawyer(&self) -> Option<UserId> {
        self.approving_lawyer
    }

    pub fn director_signature(&self) -> Option<&Signature> {
        self.director_signature.as_ref()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn current_stage_index(&self) -> usize {
        self.current_stage_index
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages.get(self.current_stage_index)
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Case {
    type Id = CaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCase {
    pub case_id: CaseId,
    pub case_number: String,
    pub client: ClientId,
    pub case_type: String,
    pub title: String,
    pub court: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignLawyer.
///
/// `approving_lawyer` is a write-once designation: omitted, the existing
/// value stays; present and different from an already-set value, the command
/// is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignLawyer {
    pub case_id: CaseId,
    pub lawyer: UserId,
    pub approving_lawyer: Option<UserId>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptCase {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitMemorandum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMemorandum {
    pub case_id: CaseId,
    pub stage: u32,
    pub content: String,
    pub file: FileRef,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveMemorandum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveMemorandum {
    pub case_id: CaseId,
    pub stage: u32,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectMemorandum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectMemorandum {
    pub case_id: CaseId,
    pub stage: u32,
    pub feedback: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestDirectorSignature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDirectorSignature {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDirectorSignature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDirectorSignature {
    pub case_id: CaseId,
    pub file: Option<FileRef>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitToCourt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitToCourt {
    pub case_id: CaseId,
    pub stage: u32,
    pub proof: FileRef,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ScheduleHearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleHearing {
    pub case_id: CaseId,
    pub stage: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OpenStage (appeal or cassation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStage {
    pub case_id: CaseId,
    pub kind: StageKind,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseStage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseStage {
    pub case_id: CaseId,
    pub stage: u32,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddStageDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStageDocument {
    pub case_id: CaseId,
    pub stage: u32,
    pub file: FileRef,
    pub title: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveCase {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCase {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseCommand {
    OpenCase(OpenCase),
    AssignLawyer(AssignLawyer),
    AcceptCase(AcceptCase),
    SubmitMemorandum(SubmitMemorandum),
    ApproveMemorandum(ApproveMemorandum),
    RejectMemorandum(RejectMemorandum),
    RequestDirectorSignature(RequestDirectorSignature),
    RecordDirectorSignature(RecordDirectorSignature),
    SubmitToCourt(SubmitToCourt),
    ScheduleHearing(ScheduleHearing),
    OpenStage(OpenStage),
    CloseStage(CloseStage),
    AddStageDocument(AddStageDocument),
    ArchiveCase(ArchiveCase),
    DeleteCase(DeleteCase),
}

/// Event: CaseOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOpened {
    pub case_id: CaseId,
    pub case_number: String,
    pub client: ClientId,
    pub case_type: String,
    pub title: String,
    pub court: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LawyerAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawyerAssigned {
    pub case_id: CaseId,
    pub lawyer: UserId,
    pub approving_lawyer: Option<UserId>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CaseAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseAccepted {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemorandumSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorandumSubmitted {
    pub case_id: CaseId,
    pub stage: u32,
    pub content: String,
    pub file: FileRef,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemorandumApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorandumApproved {
    pub case_id: CaseId,
    pub stage: u32,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemorandumRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorandumRejected {
    pub case_id: CaseId,
    pub stage: u32,
    pub feedback: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DirectorSignatureRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorSignatureRequested {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DirectorSignatureRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorSignatureRecorded {
    pub case_id: CaseId,
    pub file: Option<FileRef>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmittedToCourt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedToCourt {
    pub case_id: CaseId,
    pub stage: u32,
    pub proof: FileRef,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HearingScheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingScheduled {
    pub case_id: CaseId,
    pub stage: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
    pub remind_at: DateTime<Utc>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StageOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOpened {
    pub case_id: CaseId,
    pub stage: u32,
    pub kind: StageKind,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StageClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageClosed {
    pub case_id: CaseId,
    pub stage: u32,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StageDocumentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDocumentAdded {
    pub case_id: CaseId,
    pub stage: u32,
    pub file: FileRef,
    pub title: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CaseArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseArchived {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CaseDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDeleted {
    pub case_id: CaseId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseEvent {
    CaseOpened(CaseOpened),
    LawyerAssigned(LawyerAssigned),
    CaseAccepted(CaseAccepted),
    MemorandumSubmitted(MemorandumSubmitted),
    MemorandumApproved(MemorandumApproved),
    MemorandumRejected(MemorandumRejected),
    DirectorSignatureRequested(DirectorSignatureRequested),
    DirectorSignatureRecorded(DirectorSignatureRecorded),
    SubmittedToCourt(SubmittedToCourt),
    HearingScheduled(HearingScheduled),
    StageOpened(StageOpened),
    StageClosed(StageClosed),
    StageDocumentAdded(StageDocumentAdded),
    CaseArchived(CaseArchived),
    CaseDeleted(CaseDeleted),
}

impl Event for CaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CaseEvent::CaseOpened(_) => "case.opened",
            CaseEvent::LawyerAssigned(_) => "case.lawyer_assigned",
            CaseEvent::CaseAccepted(_) => "case.accepted",
            CaseEvent::MemorandumSubmitted(_) => "case.memorandum.submitted",
            CaseEvent::MemorandumApproved(_) => "case.memorandum.approved",
            CaseEvent::MemorandumRejected(_) => "case.memorandum.rejected",
            CaseEvent::DirectorSignatureRequested(_) => "case.signature.requested",
            CaseEvent::DirectorSignatureRecorded(_) => "case.signature.recorded",
            CaseEvent::SubmittedToCourt(_) => "case.submitted_to_court",
            CaseEvent::HearingScheduled(_) => "case.hearing.scheduled",
            CaseEvent::StageOpened(_) => "case.stage.opened",
            CaseEvent::StageClosed(_) => "case.stage.closed",
            CaseEvent::StageDocumentAdded(_) => "case.stage.document_added",
            CaseEvent::CaseArchived(_) => "case.archived",
            CaseEvent::CaseDeleted(_) => "case.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CaseEvent::CaseOpened(e) => e.occurred_at,
            CaseEvent::LawyerAssigned(e) => e.occurred_at,
            CaseEvent::CaseAccepted(e) => e.occurred_at,
            CaseEvent::MemorandumSubmitted(e) => e.occurred_at,
            CaseEvent::MemorandumApproved(e) => e.occurred_at,
            CaseEvent::MemorandumRejected(e) => e.occurred_at,
            CaseEvent::DirectorSignatureRequested(e) => e.occurred_at,
            CaseEvent::DirectorSignatureRecorded(e) => e.occurred_at,
            CaseEvent::SubmittedToCourt(e) => e.occurred_at,
            CaseEvent::HearingScheduled(e) => e.occurred_at,
            CaseEvent::StageOpened(e) => e.occurred_at,
            CaseEvent::StageClosed(e) => e.occurred_at,
            CaseEvent::StageDocumentAdded(e) => e.occurred_at,
            CaseEvent::CaseArchived(e) => e.occurred_at,
            CaseEvent::CaseDeleted(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> Actor {
        match self {
            CaseEvent::CaseOpened(e) => e.actor,
            CaseEvent::LawyerAssigned(e) => e.actor,
            CaseEvent::CaseAccepted(e) => e.actor,
            CaseEvent::MemorandumSubmitted(e) => e.actor,
            CaseEvent::MemorandumApproved(e) => e.actor,
            CaseEvent::MemorandumRejected(e) => e.actor,
            CaseEvent::DirectorSignatureRequested(e) => e.actor,
            CaseEvent::DirectorSignatureRecorded(e) => e.actor,
            CaseEvent::SubmittedToCourt(e) => e.actor,
            CaseEvent::HearingScheduled(e) => e.actor,
            CaseEvent::StageOpened(e) => e.actor,
            CaseEvent::StageClosed(e) => e.actor,
            CaseEvent::StageDocumentAdded(e) => e.actor,
            CaseEvent::CaseArchived(e) => e.actor,
            CaseEvent::CaseDeleted(e) => e.actor,
        }
    }
}

impl CaseEvent {
    pub fn case_id(&self) -> CaseId {
        match self {
            CaseEvent::CaseOpened(e) => e.case_id,
            CaseEvent::LawyerAssigned(e) => e.case_id,
            CaseEvent::CaseAccepted(e) => e.case_id,
            CaseEvent::MemorandumSubmitted(e) => e.case_id,
            CaseEvent::MemorandumApproved(e) => e.case_id,
            CaseEvent::MemorandumRejected(e) => e.case_id,
            CaseEvent::DirectorSignatureRequested(e) => e.case_id,
            CaseEvent::DirectorSignatureRecorded(e) => e.case_id,
            CaseEvent::SubmittedToCourt(e) => e.case_id,
            CaseEvent::HearingScheduled(e) => e.case_id,
            CaseEvent::StageOpened(e) => e.case_id,
            CaseEvent::StageClosed(e) => e.case_id,
            CaseEvent::StageDocumentAdded(e) => e.case_id,
            CaseEvent::CaseArchived(e) => e.case_id,
            CaseEvent::CaseDeleted(e) => e.case_id,
        }
    }
}

impl Aggregate for Case {
    type Command = CaseCommand;
    type Event = CaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CaseEvent::CaseOpened(e) => {
                self.id = e.case_id;
                self.case_number = e.case_number.clone();
                self.client = Some(e.client);
                self.case_type = e.case_type.clone();
                self.title = e.title.clone();
                self.court = e.court.clone();
                self.opened_by = Some(e.actor.user_id);
                self.opened_at = Some(e.occurred_at);
                self.stages = vec![Stage::new(0, StageKind::Main)];
                self.current_stage_index = 0;
                self.created = true;
            }
            CaseEvent::LawyerAssigned(e) => {
                self.assigned_lawyer = Some(e.lawyer);
                if self.approving_lawyer.is_none() {
                    self.approving_lawyer = e.approving_lawyer;
                }
            }
            CaseEvent::CaseAccepted(_) => {
                self.accepted = true;
            }
            CaseEvent::MemorandumSubmitted(e) => {
                if let Some(stage) = self.stages.get_mut(e.stage as usize) {
                    stage.memorandum = Some(Memorandum {
                        content: e.content.clone(),
                        file: e.file.clone(),
                        prepared_by: e.actor.user_id,
                        prepared_at: e.occurred_at,
                        status: MemorandumStatus::Pending,
                        approved_by: None,
                        approved_at: None,
                        feedback: None,
                    });
                }
            }
            CaseEvent::MemorandumApproved(e) => {
                if let Some(memo) = self
                    .stages
                    .get_mut(e.stage as usize)
                    .and_then(|s| s.memorandum.as_mut())
                {
                    memo.status = MemorandumStatus::Approved;
                    memo.approved_by = Some(e.actor.user_id);
                    memo.approved_at = Some(e.occurred_at);
                    memo.feedback = None;
                }
            }
            CaseEvent::MemorandumRejected(e) => {
                if let Some(memo) = self
                    .stages
                    .get_mut(e.stage as usize)
                    .and_then(|s| s.memorandum.as_mut())
                {
                    memo.status = MemorandumStatus::Rejected;
                    memo.feedback = Some(e.feedback.clone());
                }
            }
            CaseEvent::DirectorSignatureRequested(_) => {
                self.signature_requested = true;
            }
            CaseEvent::DirectorSignatureRecorded(e) => {
                self.director_signature = Some(Signature {
                    signed_by: e.actor.user_id,
                    file: e.file.clone(),
                    signed_at: e.occurred_at,
                });
                self.signature_requested = false;
            }
            CaseEvent::SubmittedToCourt(e) => {
                if let Some(stage) = self.stages.get_mut(e.stage as usize) {
                    stage.submission_proof = Some(SubmissionProof {
                        file: e.proof.clone(),
                        submitted_by: e.actor.user_id,
                        submitted_at: e.occurred_at,
                    });
                }
            }
            CaseEvent::HearingScheduled(e) => {
                if let Some(stage) = self.stages.get_mut(e.stage as usize) {
                    stage.hearing = Some(Hearing {
                        date: e.date,
                        time: e.time,
                        location: e.location.clone(),
                        scheduled_by: e.actor.user_id,
                        scheduled_at: e.occurred_at,
                        remind_at: e.remind_at,
                    });
                }
            }
            CaseEvent::StageOpened(e) => {
                if let Some(prior) = self.stages.get_mut(self.current_stage_index) {
                    prior.closed = true;
                }
                self.stages.push(Stage::new(e.stage, e.kind));
                self.current_stage_index = e.stage as usize;
                self.accepted = false;
                self.signature_requested = false;
            }
            CaseEvent::StageClosed(e) => {
                if let Some(stage) = self.stages.get_mut(e.stage as usize) {
                    stage.closed = true;
                }
            }
            CaseEvent::StageDocumentAdded(e) => {
                if let Some(stage) = self.stages.get_mut(e.stage as usize) {
                    stage.documents.push(StageDocument {
                        file: e.file.clone(),
                        title: e.title.clone(),
                        uploaded_by: e.actor.user_id,
                        uploaded_at: e.occurred_at,
                    });
                }
            }
            CaseEvent::CaseArchived(e) => {
                self.archived = true;
                self.archived_at = Some(e.occurred_at);
                self.archived_by = Some(e.actor.user_id);
            }
            CaseEvent::CaseDeleted(_) => {
                self.deleted = true;
            }
        }

        self.recompute_status();

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CaseCommand::OpenCase(cmd) => self.handle_open(cmd),
            CaseCommand::AssignLawyer(cmd) => self.handle_assign_lawyer(cmd),
            CaseCommand::AcceptCase(cmd) => self.handle_accept(cmd),
            CaseCommand::SubmitMemorandum(cmd) => self.handle_submit_memorandum(cmd),
            CaseCommand::ApproveMemorandum(cmd) => self.handle_approve_memorandum(cmd),
            CaseCommand::RejectMemorandum(cmd) => self.handle_reject_memorandum(cmd),
            CaseCommand::RequestDirectorSignature(cmd) => self.handle_request_signature(cmd),
            CaseCommand::RecordDirectorSignature(cmd) => self.handle_record_signature(cmd),
            CaseCommand::SubmitToCourt(cmd) => self.handle_submit_to_court(cmd),
            CaseCommand::ScheduleHearing(cmd) => self.handle_schedule_hearing(cmd),
            CaseCommand::OpenStage(cmd) => self.handle_open_stage(cmd),
            CaseCommand::CloseStage(cmd) => self.handle_close_stage(cmd),
            CaseCommand::AddStageDocument(cmd) => self.handle_add_document(cmd),
            CaseCommand::ArchiveCase(cmd) => self.handle_archive(cmd),
            CaseCommand::DeleteCase(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Case {
    /// Re-derive stage and case statuses from current facts.
    ///
    /// Runs at the end of every `apply`, so stored status can never drift
    /// from the artifacts that determine it.
    fn recompute_status(&mut self) {
        for stage in &mut self.stages {
            stage.status = policy::stage_status(stage);
        }
        let Some(current) = self.stages.get(self.current_stage_index) else {
            return;
        };
        self.status = policy::case_status(
            self.archived,
            current,
            self.accepted,
            self.signature_requested,
            self.director_signature.is_some(),
            self.assigned_lawyer.is_some(),
        );
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found("case"));
        }
        Ok(())
    }

    fn ensure_case_id(&self, case_id: CaseId) -> Result<(), DomainError> {
        if self.id != case_id {
            return Err(DomainError::validation("case_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.archived {
            return Err(DomainError::CaseArchived);
        }
        Ok(())
    }

    fn ensure_assigned_lawyer(&self, actor: &Actor) -> Result<(), DomainError> {
        if self.assigned_lawyer != Some(actor.user_id) {
            return Err(DomainError::forbidden(
                "only the assigned lawyer may act on this case",
            ));
        }
        Ok(())
    }

    fn ensure_approving_lawyer(&self, actor: &Actor) -> Result<(), DomainError> {
        match self.approving_lawyer {
            Some(designee) if designee == actor.user_id => Ok(()),
            Some(_) => Err(DomainError::forbidden(
                "only the designated approving lawyer may review memoranda",
            )),
            None => Err(DomainError::forbidden(
                "no approving lawyer designated for this case",
            )),
        }
    }

    /// Resolve a stage ordinal for mutation: it must exist, be the current
    /// stage, and not be closed.
    fn ensure_open_stage(&self, stage: u32, attempted: &'static str) -> Result<&Stage, DomainError> {
        let Some(found) = self.stages.get(stage as usize) else {
            return Err(DomainError::not_found("stage"));
        };
        if stage as usize != self.current_stage_index || found.closed {
            return Err(DomainError::invalid_transition(self.status, attempted));
        }
        Ok(found)
    }

    fn handle_open(&self, cmd: &OpenCase) -> Result<Vec<CaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("case already exists"));
        }
        if cmd.case_number.trim().is_empty() {
            return Err(DomainError::validation("case_number must not be empty"));
        }
        if cmd.case_type.trim().is_empty() {
            return Err(DomainError::validation("case_type must not be empty"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }

        Ok(vec![CaseEvent::CaseOpened(CaseOpened {
            case_id: cmd.case_id,
            case_number: cmd.case_number.clone(),
            client: cmd.client,
            case_type: cmd.case_type.clone(),
            title: cmd.title.clone(),
            court: cmd.court.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_lawyer(&self, cmd: &AssignLawyer) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if !matches!(self.status, CaseStatus::Draft | CaseStatus::Assigned) {
            return Err(DomainError::invalid_transition(self.status, "assign_lawyer"));
        }
        if let (Some(existing), Some(requested)) = (self.approving_lawyer, cmd.approving_lawyer) {
            if existing != requested {
                return Err(DomainError::immutable_field("approving_lawyer"));
            }
        }

        let designates = self.approving_lawyer.is_none() && cmd.approving_lawyer.is_some();
        if self.assigned_lawyer == Some(cmd.lawyer) && !designates {
            return Ok(vec![]);
        }

        Ok(vec![CaseEvent::LawyerAssigned(LawyerAssigned {
            case_id: cmd.case_id,
            lawyer: cmd.lawyer,
            approving_lawyer: cmd.approving_lawyer,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptCase) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if self.status != CaseStatus::Assigned {
            return Err(DomainError::invalid_transition(self.status, "accept_case"));
        }
        self.ensure_assigned_lawyer(&cmd.actor)?;

        Ok(vec![CaseEvent::CaseAccepted(CaseAccepted {
            case_id: cmd.case_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit_memorandum(
        &self,
        cmd: &SubmitMemorandum,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        let stage = self.ensure_open_stage(cmd.stage, "submit_memorandum")?;

        if stage.memorandum_status() == Some(MemorandumStatus::Approved) {
            return Err(DomainError::immutable_artifact("memorandum"));
        }
        // First submission after acceptance, update while Pending, or
        // resubmission after rejection.
        if !matches!(
            self.status,
            CaseStatus::UnderReview | CaseStatus::PendingApproval
        ) {
            return Err(DomainError::invalid_transition(
                self.status,
                "submit_memorandum",
            ));
        }
        self.ensure_assigned_lawyer(&cmd.actor)?;
        if cmd.content.trim().is_empty() {
            return Err(DomainError::validation(
                "memorandum content must not be empty",
            ));
        }

        Ok(vec![CaseEvent::MemorandumSubmitted(MemorandumSubmitted {
            case_id: cmd.case_id,
            stage: cmd.stage,
            content: cmd.content.clone(),
            file: cmd.file.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve_memorandum(
        &self,
        cmd: &ApproveMemorandum,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        let stage = self.ensure_open_stage(cmd.stage, "approve_memorandum")?;

        let Some(memo) = stage.memorandum.as_ref() else {
            return Err(DomainError::invalid_transition(
                self.status,
                "approve_memorandum",
            ));
        };
        if memo.status == MemorandumStatus::Approved {
            return Err(DomainError::invalid_transition(
                self.status,
                "approve_memorandum",
            ));
        }
        self.ensure_approving_lawyer(&cmd.actor)?;

        Ok(vec![CaseEvent::MemorandumApproved(MemorandumApproved {
            case_id: cmd.case_id,
            stage: cmd.stage,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject_memorandum(
        &self,
        cmd: &RejectMemorandum,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        let stage = self.ensure_open_stage(cmd.stage, "reject_memorandum")?;

        let Some(memo) = stage.memorandum.as_ref() else {
            return Err(DomainError::invalid_transition(
                self.status,
                "reject_memorandum",
            ));
        };
        if memo.status == MemorandumStatus::Approved {
            return Err(DomainError::immutable_artifact("memorandum"));
        }
        if memo.status != MemorandumStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.status,
                "reject_memorandum",
            ));
        }
        self.ensure_approving_lawyer(&cmd.actor)?;
        if cmd.feedback.trim().is_empty() {
            return Err(DomainError::validation(
                "rejection feedback must not be empty",
            ));
        }

        Ok(vec![CaseEvent::MemorandumRejected(MemorandumRejected {
            case_id: cmd.case_id,
            stage: cmd.stage,
            feedback: cmd.feedback.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_signature(
        &self,
        cmd: &RequestDirectorSignature,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if self.status != CaseStatus::Approved {
            return Err(DomainError::invalid_transition(
                self.status,
                "request_director_signature",
            ));
        }

        Ok(vec![CaseEvent::DirectorSignatureRequested(
            DirectorSignatureRequested {
                case_id: cmd.case_id,
                actor: cmd.actor,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_signature(
        &self,
        cmd: &RecordDirectorSignature,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if cmd.actor.role != StaffRole::Director {
            return Err(DomainError::forbidden(
                "only the director may sign a case file",
            ));
        }
        // Signing is allowed straight from Approved; the explicit request
        // step is optional.
        if !matches!(
            self.status,
            CaseStatus::Approved | CaseStatus::PendingSignature
        ) {
            return Err(DomainError::invalid_transition(
                self.status,
                "record_director_signature",
            ));
        }

        Ok(vec![CaseEvent::DirectorSignatureRecorded(
            DirectorSignatureRecorded {
                case_id: cmd.case_id,
                file: cmd.file.clone(),
                actor: cmd.actor,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit_to_court(&self, cmd: &SubmitToCourt) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        self.ensure_open_stage(cmd.stage, "submit_to_court")?;

        // Signature gate comes first: submitting an unsigned file is reported
        // as a missing signature even when the status is also wrong.
        if self.director_signature.is_none() {
            return Err(DomainError::SignatureRequired);
        }
        if self.status != CaseStatus::ReadyForSubmission {
            return Err(DomainError::invalid_transition(
                self.status,
                "submit_to_court",
            ));
        }

        Ok(vec![CaseEvent::SubmittedToCourt(SubmittedToCourt {
            case_id: cmd.case_id,
            stage: cmd.stage,
            proof: cmd.proof.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_schedule_hearing(
        &self,
        cmd: &ScheduleHearing,
    ) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        self.ensure_open_stage(cmd.stage, "schedule_hearing")?;

        let remind_date = cmd
            .date
            .checked_sub_days(Days::new(3))
            .ok_or_else(|| DomainError::validation("hearing date out of range"))?;
        let remind_at = remind_date.and_time(cmd.time).and_utc();

        Ok(vec![CaseEvent::HearingScheduled(HearingScheduled {
            case_id: cmd.case_id,
            stage: cmd.stage,
            date: cmd.date,
            time: cmd.time,
            location: cmd.location.clone(),
            remind_at,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_open_stage(&self, cmd: &OpenStage) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if self.status != CaseStatus::Submitted {
            return Err(DomainError::invalid_transition(self.status, "open_stage"));
        }
        let current_kind = self
            .current_stage()
            .map(|s| s.kind)
            .unwrap_or(StageKind::Main);
        match (current_kind, cmd.kind) {
            (StageKind::Main, StageKind::Appeal) => {}
            (StageKind::Appeal, StageKind::Cassation) => {}
            (_, StageKind::Main) => {
                return Err(DomainError::validation("a case has exactly one main stage"));
            }
            (from, to) => {
                return Err(DomainError::validation(format!(
                    "cannot open {} stage after {} stage",
                    to.as_str(),
                    from.as_str()
                )));
            }
        }

        Ok(vec![CaseEvent::StageOpened(StageOpened {
            case_id: cmd.case_id,
            stage: self.stages.len() as u32,
            kind: cmd.kind,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close_stage(&self, cmd: &CloseStage) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        self.ensure_open_stage(cmd.stage, "close_stage")?;

        if self.status != CaseStatus::Submitted {
            return Err(DomainError::invalid_transition(self.status, "close_stage"));
        }

        Ok(vec![CaseEvent::StageClosed(StageClosed {
            case_id: cmd.case_id,
            stage: cmd.stage,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_document(&self, cmd: &AddStageDocument) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;
        self.ensure_open_stage(cmd.stage, "add_stage_document")?;

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("document title must not be empty"));
        }

        Ok(vec![CaseEvent::StageDocumentAdded(StageDocumentAdded {
            case_id: cmd.case_id,
            stage: cmd.stage,
            file: cmd.file.clone(),
            title: cmd.title.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveCase) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        self.ensure_active()?;

        if self.status != CaseStatus::Submitted {
            return Err(DomainError::invalid_transition(self.status, "archive_case"));
        }

        Ok(vec![CaseEvent::CaseArchived(CaseArchived {
            case_id: cmd.case_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteCase) -> Result<Vec<CaseEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_case_id(cmd.case_id)?;
        // Archived cases are a safety gate: they cannot be deleted without an
        // unarchive step, which is deliberately not implemented.
        self.ensure_active()?;

        Ok(vec![CaseEvent::CaseDeleted(CaseDeleted {
            case_id: cmd.case_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chancery_core::AggregateId;

    fn test_case_id() -> CaseId {
        CaseId::new(AggregateId::new())
    }

    fn test_client_id() -> ClientId {
        ClientId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn secretary() -> Actor {
        Actor::new(UserId::new(), StaffRole::Secretary)
    }

    fn lawyer() -> Actor {
        Actor::new(UserId::new(), StaffRole::Lawyer)
    }

    fn approver() -> Actor {
        Actor::new(UserId::new(), StaffRole::ApprovingLawyer)
    }

    fn director() -> Actor {
        Actor::new(UserId::new(), StaffRole::Director)
    }

    fn file_ref(name: &str) -> FileRef {
        FileRef::new(name).unwrap()
    }

    fn apply_all(case: &mut Case, events: &[CaseEvent]) {
        for event in events {
            case.apply(event);
        }
    }

    fn drive(case: &mut Case, cmd: CaseCommand) -> Vec<CaseEvent> {
        let events = case.handle(&cmd).unwrap();
        apply_all(case, &events);
        events
    }

    fn submit_memo_cmd(case_id: CaseId, stage: u32, file: &str, counsel: Actor) -> CaseCommand {
        CaseCommand::SubmitMemorandum(SubmitMemorandum {
            case_id,
            stage,
            content: "Statement of claim and supporting precedent.".to_string(),
            file: file_ref(file),
            actor: counsel,
            occurred_at: test_time(),
        })
    }

    /// Open a case and return it together with its id.
    fn opened_case() -> (Case, CaseId) {
        let case_id = test_case_id();
        let mut case = Case::empty(case_id);
        drive(
            &mut case,
            CaseCommand::OpenCase(OpenCase {
                case_id,
                case_number: "C-2025-00001".to_string(),
                client: test_client_id(),
                case_type: "commercial".to_string(),
                title: "Haddad v. Coastal Holdings".to_string(),
                court: Some("Commercial Court".to_string()),
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        (case, case_id)
    }

    /// Case with an assigned lawyer and a designated approving lawyer.
    fn assigned_case() -> (Case, CaseId, Actor, Actor) {
        let (mut case, case_id) = opened_case();
        let counsel = lawyer();
        let reviewer = approver();
        drive(
            &mut case,
            CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: counsel.user_id,
                approving_lawyer: Some(reviewer.user_id),
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        (case, case_id, counsel, reviewer)
    }

    /// Case accepted by its assigned lawyer (UnderReview).
    fn accepted_case() -> (Case, CaseId, Actor, Actor) {
        let (mut case, case_id, counsel, reviewer) = assigned_case();
        drive(
            &mut case,
            CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );
        (case, case_id, counsel, reviewer)
    }

    /// Case with an approved memorandum on the main stage.
    fn approved_case() -> (Case, CaseId, Actor, Actor) {
        let (mut case, case_id, counsel, reviewer) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo-v1.pdf", counsel));
        drive(
            &mut case,
            CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 0,
                actor: reviewer,
                occurred_at: test_time(),
            }),
        );
        (case, case_id, counsel, reviewer)
    }

    /// Case submitted to court on the main stage.
    fn submitted_case() -> (Case, CaseId, Actor, Actor) {
        let (mut case, case_id, counsel, reviewer) = approved_case();
        drive(
            &mut case,
            CaseCommand::RecordDirectorSignature(RecordDirectorSignature {
                case_id,
                file: Some(file_ref("signed.pdf")),
                actor: director(),
                occurred_at: test_time(),
            }),
        );
        drive(
            &mut case,
            CaseCommand::SubmitToCourt(SubmitToCourt {
                case_id,
                stage: 0,
                proof: file_ref("filing-receipt.pdf"),
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        (case, case_id, counsel, reviewer)
    }

    #[test]
    fn open_case_creates_main_stage_in_draft() {
        let (case, _) = opened_case();

        assert_eq!(case.status(), CaseStatus::Draft);
        assert_eq!(case.stages().len(), 1);
        assert_eq!(case.stages()[0].kind, StageKind::Main);
        assert_eq!(case.stages()[0].status, StageStatus::InProgress);
        assert_eq!(case.current_stage_index(), 0);
        assert_eq!(case.case_number(), "C-2025-00001");
        assert_eq!(case.case_type(), "commercial");
    }

    #[test]
    fn open_case_rejects_blank_title() {
        let case_id = test_case_id();
        let case = Case::empty(case_id);
        let err = case
            .handle(&CaseCommand::OpenCase(OpenCase {
                case_id,
                case_number: "C-2025-00002".to_string(),
                client: test_client_id(),
                case_type: "civil".to_string(),
                title: "   ".to_string(),
                court: None,
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn assign_lawyer_moves_case_to_assigned() {
        let (case, _, counsel, reviewer) = assigned_case();
        assert_eq!(case.status(), CaseStatus::Assigned);
        assert_eq!(case.assigned_lawyer(), Some(counsel.user_id));
        assert_eq!(case.approving_lawyer(), Some(reviewer.user_id));
    }

    #[test]
    fn reassigning_same_lawyer_is_a_no_op() {
        let (case, case_id, counsel, _) = assigned_case();
        let events = case
            .handle(&CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: counsel.user_id,
                approving_lawyer: None,
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn approving_lawyer_designation_is_write_once() {
        let (mut case, case_id, counsel, reviewer) = assigned_case();

        // Omitting the designation leaves it untouched.
        drive(
            &mut case,
            CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: UserId::new(),
                approving_lawyer: None,
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.approving_lawyer(), Some(reviewer.user_id));

        // Repeating the same value is accepted.
        let events = case
            .handle(&CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: counsel.user_id,
                approving_lawyer: Some(reviewer.user_id),
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut case, &events);
        assert_eq!(case.approving_lawyer(), Some(reviewer.user_id));

        // A different value is rejected.
        let err = case
            .handle(&CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: counsel.user_id,
                approving_lawyer: Some(UserId::new()),
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::ImmutableField("approving_lawyer")));
        assert_eq!(case.approving_lawyer(), Some(reviewer.user_id));
    }

    #[test]
    fn accept_requires_the_assigned_lawyer() {
        let (case, case_id, _, _) = assigned_case();
        let err = case
            .handle(&CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: lawyer(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn accept_moves_case_to_under_review() {
        let (case, _, _, _) = accepted_case();
        assert_eq!(case.status(), CaseStatus::UnderReview);
        assert!(case.is_accepted());
    }

    #[test]
    fn cannot_accept_before_assignment() {
        let (case, case_id) = opened_case();
        let err = case
            .handle(&CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: lawyer(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, attempted } => {
                assert_eq!(from, "draft");
                assert_eq!(attempted, "accept_case");
            }
            _ => panic!("Expected InvalidTransition, got {err:?}"),
        }
    }

    #[test]
    fn cannot_reassign_lawyer_once_accepted() {
        let (case, case_id, _, _) = accepted_case();
        let err = case
            .handle(&CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: UserId::new(),
                approving_lawyer: None,
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, attempted } => {
                assert_eq!(from, "under_review");
                assert_eq!(attempted, "assign_lawyer");
            }
            _ => panic!("Expected InvalidTransition, got {err:?}"),
        }
    }

    #[test]
    fn memorandum_requires_acceptance_first() {
        let (case, case_id, counsel, _) = assigned_case();
        let err = case
            .handle(&submit_memo_cmd(case_id, 0, "memo.pdf", counsel))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, .. } => assert_eq!(from, "assigned"),
            _ => panic!("Expected InvalidTransition, got {err:?}"),
        }
    }

    #[test]
    fn memorandum_submission_moves_to_pending_approval() {
        let (mut case, case_id, counsel, _) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo.pdf", counsel));
        assert_eq!(case.status(), CaseStatus::PendingApproval);

        let memo = case.stages()[0].memorandum.as_ref().unwrap();
        assert_eq!(memo.status, MemorandumStatus::Pending);
        assert_eq!(memo.prepared_by, counsel.user_id);
    }

    #[test]
    fn only_the_assigned_lawyer_may_submit_a_memorandum() {
        let (case, case_id, _, _) = accepted_case();
        let err = case
            .handle(&submit_memo_cmd(case_id, 0, "memo.pdf", lawyer()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn pending_memorandum_can_be_updated_in_place() {
        let (mut case, case_id, counsel, _) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo-v1.pdf", counsel));
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo-v2.pdf", counsel));

        assert_eq!(case.status(), CaseStatus::PendingApproval);
        let memo = case.stages()[0].memorandum.as_ref().unwrap();
        assert_eq!(memo.file.as_str(), "memo-v2.pdf");
    }

    #[test]
    fn approval_requires_the_designated_reviewer() {
        let (mut case, case_id, counsel, _) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo.pdf", counsel));

        // The assigned lawyer cannot approve their own memorandum.
        let err = case
            .handle(&CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 0,
                actor: counsel,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        // Neither can a different approving lawyer.
        let err = case
            .handle(&CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 0,
                actor: approver(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn approval_moves_case_to_approved() {
        let (case, _, _, reviewer) = approved_case();
        assert_eq!(case.status(), CaseStatus::Approved);
        assert_eq!(case.stages()[0].status, StageStatus::Approved);

        let memo = case.stages()[0].memorandum.as_ref().unwrap();
        assert_eq!(memo.status, MemorandumStatus::Approved);
        assert_eq!(memo.approved_by, Some(reviewer.user_id));
    }

    #[test]
    fn approving_an_already_approved_memo_is_rejected() {
        let (case, case_id, _, reviewer) = approved_case();
        let err = case
            .handle(&CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 0,
                actor: reviewer,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, attempted } => {
                assert_eq!(from, "approved");
                assert_eq!(attempted, "approve_memorandum");
            }
            _ => panic!("Expected InvalidTransition, got {err:?}"),
        }
    }

    #[test]
    fn approved_memorandum_is_immutable() {
        let (case, case_id, counsel, reviewer) = approved_case();

        let err = case
            .handle(&submit_memo_cmd(case_id, 0, "memo-v2.pdf", counsel))
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::ImmutableApprovedArtifact("memorandum")
        ));

        let err = case
            .handle(&CaseCommand::RejectMemorandum(RejectMemorandum {
                case_id,
                stage: 0,
                feedback: "changed my mind".to_string(),
                actor: reviewer,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::ImmutableApprovedArtifact("memorandum")
        ));
    }

    #[test]
    fn rejection_loops_back_to_under_review() {
        let (mut case, case_id, counsel, reviewer) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo-v1.pdf", counsel));

        drive(
            &mut case,
            CaseCommand::RejectMemorandum(RejectMemorandum {
                case_id,
                stage: 0,
                feedback: "missing precedent analysis".to_string(),
                actor: reviewer,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.status(), CaseStatus::UnderReview);

        let memo = case.stages()[0].memorandum.as_ref().unwrap();
        assert_eq!(memo.status, MemorandumStatus::Rejected);
        assert_eq!(memo.feedback.as_deref(), Some("missing precedent analysis"));

        // Revision loop: the assigned lawyer resubmits.
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo-v2.pdf", counsel));
        assert_eq!(case.status(), CaseStatus::PendingApproval);
    }

    #[test]
    fn rejection_requires_feedback_and_the_designated_reviewer() {
        let (mut case, case_id, counsel, reviewer) = accepted_case();
        drive(&mut case, submit_memo_cmd(case_id, 0, "memo.pdf", counsel));

        let err = case
            .handle(&CaseCommand::RejectMemorandum(RejectMemorandum {
                case_id,
                stage: 0,
                feedback: "  ".to_string(),
                actor: reviewer,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = case
            .handle(&CaseCommand::RejectMemorandum(RejectMemorandum {
                case_id,
                stage: 0,
                feedback: "wrong template".to_string(),
                actor: approver(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn submitting_to_court_without_signature_reports_signature_required() {
        let (case, case_id, _, _) = approved_case();
        // Status is Approved, no signature recorded yet.
        let err = case
            .handle(&CaseCommand::SubmitToCourt(SubmitToCourt {
                case_id,
                stage: 0,
                proof: file_ref("filing.pdf"),
                actor: secretary(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::SignatureRequired));
    }

    #[test]
    fn signature_can_be_recorded_straight_from_approved() {
        let (mut case, case_id, _, _) = approved_case();
        drive(
            &mut case,
            CaseCommand::RecordDirectorSignature(RecordDirectorSignature {
                case_id,
                file: None,
                actor: director(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.status(), CaseStatus::ReadyForSubmission);
        assert!(case.director_signature().is_some());
    }

    #[test]
    fn explicit_signature_request_moves_to_pending_signature() {
        let (mut case, case_id, _, _) = approved_case();
        drive(
            &mut case,
            CaseCommand::RequestDirectorSignature(RequestDirectorSignature {
                case_id,
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.status(), CaseStatus::PendingSignature);

        drive(
            &mut case,
            CaseCommand::RecordDirectorSignature(RecordDirectorSignature {
                case_id,
                file: Some(file_ref("signed.pdf")),
                actor: director(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.status(), CaseStatus::ReadyForSubmission);
    }

    #[test]
    fn only_the_director_may_sign() {
        let (case, case_id, counsel, _) = approved_case();
        let err = case
            .handle(&CaseCommand::RecordDirectorSignature(
                RecordDirectorSignature {
                    case_id,
                    file: None,
                    actor: counsel,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn full_lifecycle_to_submitted_and_archived() {
        let (mut case, case_id, _, _) = submitted_case();
        assert_eq!(case.status(), CaseStatus::Submitted);
        assert_eq!(case.stages()[0].status, StageStatus::Submitted);
        assert!(case.stages()[0].submission_proof.is_some());

        drive(
            &mut case,
            CaseCommand::ArchiveCase(ArchiveCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.status(), CaseStatus::Archived);
        assert!(case.is_archived());
    }

    #[test]
    fn archival_requires_a_court_submission() {
        let (case, case_id, _, _) = approved_case();
        let err = case
            .handle(&CaseCommand::ArchiveCase(ArchiveCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, attempted } => {
                assert_eq!(from, "approved");
                assert_eq!(attempted, "archive_case");
            }
            _ => panic!("Expected InvalidTransition, got {err:?}"),
        }
    }

    #[test]
    fn archived_case_rejects_every_mutation() {
        let (mut case, case_id, counsel, _) = submitted_case();
        drive(
            &mut case,
            CaseCommand::ArchiveCase(ArchiveCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }),
        );

        let attempts: Vec<CaseCommand> = vec![
            CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: UserId::new(),
                approving_lawyer: None,
                actor: secretary(),
                occurred_at: test_time(),
            }),
            submit_memo_cmd(case_id, 0, "late.pdf", counsel),
            CaseCommand::ScheduleHearing(ScheduleHearing {
                case_id,
                stage: 0,
                date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                location: None,
                actor: secretary(),
                occurred_at: test_time(),
            }),
            CaseCommand::DeleteCase(DeleteCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }),
            CaseCommand::ArchiveCase(ArchiveCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }),
        ];

        for cmd in attempts {
            let err = case.handle(&cmd).unwrap_err();
            assert!(
                matches!(err, DomainError::CaseArchived),
                "expected CaseArchived for {cmd:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn deleted_case_answers_not_found() {
        let (mut case, case_id, _, _) = assigned_case();
        drive(
            &mut case,
            CaseCommand::DeleteCase(DeleteCase {
                case_id,
                actor: director(),
                occurred_at: test_time(),
            }),
        );
        assert!(case.is_deleted());

        let err = case
            .handle(&CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: lawyer(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("case")));
    }

    #[test]
    fn schedule_hearing_sets_reminder_three_days_before() {
        let (mut case, case_id, _, _) = assigned_case();
        drive(
            &mut case,
            CaseCommand::ScheduleHearing(ScheduleHearing {
                case_id,
                stage: 0,
                date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
                time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                location: Some("Courtroom 4".to_string()),
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );

        let hearing = case.stages()[0].hearing.as_ref().unwrap();
        assert_eq!(
            hearing.remind_at,
            NaiveDate::from_ymd_opt(2025, 9, 17)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
                .and_utc()
        );

        // Re-scheduling overwrites the hearing and re-arms the reminder.
        drive(
            &mut case,
            CaseCommand::ScheduleHearing(ScheduleHearing {
                case_id,
                stage: 0,
                date: NaiveDate::from_ymd_opt(2025, 10, 5).unwrap(),
                time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                location: None,
                actor: secretary(),
                occurred_at: test_time(),
            }),
        );
        let hearing = case.stages()[0].hearing.as_ref().unwrap();
        assert_eq!(hearing.date, NaiveDate::from_ymd_opt(2025, 10, 5).unwrap());
    }

    #[test]
    fn appeal_stage_restarts_the_memorandum_workflow() {
        let (mut case, case_id, counsel, reviewer) = submitted_case();
        drive(
            &mut case,
            CaseCommand::OpenStage(OpenStage {
                case_id,
                kind: StageKind::Appeal,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );

        // The lawyer must re-accept the brief for the new stage.
        assert_eq!(case.status(), CaseStatus::Assigned);
        assert_eq!(case.current_stage_index(), 1);
        assert_eq!(case.stages()[0].status, StageStatus::Completed);
        assert_eq!(case.stages()[1].kind, StageKind::Appeal);
        // Case-level facts persist across stages.
        assert_eq!(case.approving_lawyer(), Some(reviewer.user_id));
        assert!(case.director_signature().is_some());

        drive(
            &mut case,
            CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );
        drive(&mut case, submit_memo_cmd(case_id, 1, "appeal-memo.pdf", counsel));
        drive(
            &mut case,
            CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 1,
                actor: reviewer,
                occurred_at: test_time(),
            }),
        );
        // The director signature carries over, so the appeal is immediately
        // ready for filing.
        assert_eq!(case.status(), CaseStatus::ReadyForSubmission);
    }

    #[test]
    fn cassation_requires_an_appeal_first() {
        let (case, case_id, counsel, _) = submitted_case();
        let err = case
            .handle(&CaseCommand::OpenStage(OpenStage {
                case_id,
                kind: StageKind::Cassation,
                actor: counsel,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn stage_mutations_must_target_the_current_stage() {
        let (mut case, case_id, counsel, _) = submitted_case();
        drive(
            &mut case,
            CaseCommand::OpenStage(OpenStage {
                case_id,
                kind: StageKind::Appeal,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );
        drive(
            &mut case,
            CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );

        // Stage 0 exists but is history.
        let err = case
            .handle(&submit_memo_cmd(case_id, 0, "memo.pdf", counsel))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        // Stage 9 does not exist.
        let err = case
            .handle(&submit_memo_cmd(case_id, 9, "memo.pdf", counsel))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("stage")));
    }

    #[test]
    fn close_stage_completes_without_archiving() {
        let (mut case, case_id, counsel, _) = submitted_case();
        drive(
            &mut case,
            CaseCommand::CloseStage(CloseStage {
                case_id,
                stage: 0,
                actor: counsel,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(case.stages()[0].status, StageStatus::Completed);
        assert!(!case.is_archived());
    }

    #[test]
    fn documents_attach_to_the_current_stage() {
        let (mut case, case_id, counsel, _) = assigned_case();
        drive(
            &mut case,
            CaseCommand::AddStageDocument(AddStageDocument {
                case_id,
                stage: 0,
                file: file_ref("power-of-attorney.pdf"),
                title: "Power of attorney".to_string(),
                actor: counsel,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(case.stages()[0].documents.len(), 1);

        let err = case
            .handle(&CaseCommand::AddStageDocument(AddStageDocument {
                case_id,
                stage: 0,
                file: file_ref("x.pdf"),
                title: "  ".to_string(),
                actor: counsel,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn version_increments_on_apply() {
        let (case, _) = opened_case();
        assert_eq!(case.version(), 1);

        let (case, _, _, _) = accepted_case();
        assert_eq!(case.version(), 3);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (case, case_id, counsel, _) = accepted_case();
        let before = case.clone();

        let cmd = submit_memo_cmd(case_id, 0, "memo.pdf", counsel);
        let events1 = case.handle(&cmd).unwrap();
        let events2 = case.handle(&cmd).unwrap();

        assert_eq!(case, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn replaying_the_stream_rebuilds_identical_state() {
        let case_id = test_case_id();
        let counsel = lawyer();
        let reviewer = approver();
        let mut driven = Case::empty(case_id);
        let mut stream: Vec<CaseEvent> = Vec::new();

        let commands = vec![
            CaseCommand::OpenCase(OpenCase {
                case_id,
                case_number: "C-2025-00007".to_string(),
                client: test_client_id(),
                case_type: "civil".to_string(),
                title: "Replay check".to_string(),
                court: None,
                actor: secretary(),
                occurred_at: test_time(),
            }),
            CaseCommand::AssignLawyer(AssignLawyer {
                case_id,
                lawyer: counsel.user_id,
                approving_lawyer: Some(reviewer.user_id),
                actor: secretary(),
                occurred_at: test_time(),
            }),
            CaseCommand::AcceptCase(AcceptCase {
                case_id,
                actor: counsel,
                occurred_at: test_time(),
            }),
            submit_memo_cmd(case_id, 0, "memo-v1.pdf", counsel),
            CaseCommand::ApproveMemorandum(ApproveMemorandum {
                case_id,
                stage: 0,
                actor: reviewer,
                occurred_at: test_time(),
            }),
            CaseCommand::RecordDirectorSignature(RecordDirectorSignature {
                case_id,
                file: None,
                actor: director(),
                occurred_at: test_time(),
            }),
        ];
        for cmd in commands {
            let events = driven.handle(&cmd).unwrap();
            for event in &events {
                driven.apply(event);
            }
            stream.extend(events);
        }

        let mut replayed = Case::empty(case_id);
        for event in &stream {
            replayed.apply(event);
        }

        assert_eq!(replayed, driven);
    }
}
