//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// transition rules, reconciliation invariants). Infrastructure concerns
/// belong elsewhere. Each variant carries a stable `code()` the gateway
/// returns to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or missing input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation is not legal from the aggregate's current status.
    #[error("invalid transition: {attempted} not allowed from {from}")]
    InvalidTransition { from: String, attempted: &'static str },

    /// The actor's role or ownership does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Attempt to reassign a write-once field.
    #[error("immutable field: {0}")]
    ImmutableField(&'static str),

    /// Attempt to modify an artifact that reached approved state.
    #[error("approved artifact is immutable: {0}")]
    ImmutableApprovedArtifact(&'static str),

    /// Court submission attempted without a recorded director signature.
    #[error("director signature required")]
    SignatureRequired,

    /// Mutation attempted on an archived case.
    #[error("case is archived")]
    CaseArchived,

    /// A payment would push the paid amount past the owed amount.
    #[error("overpayment rejected: attempted {attempted}, remaining balance {remaining}")]
    OverpaymentRejected { attempted: Decimal, remaining: Decimal },

    /// An installment plan does not sum to the invoice total.
    #[error("installment plan must sum to invoice total (expected {expected}, got {actual})")]
    InstallmentSumMismatch { expected: Decimal, actual: Decimal },

    /// A referenced aggregate or sub-entity does not exist.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Current state precludes the operation (e.g. deleting a paid invoice).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, attempted: &'static str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            attempted,
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn immutable_field(field: &'static str) -> Self {
        Self::ImmutableField(field)
    }

    pub fn immutable_artifact(artifact: &'static str) -> Self {
        Self::ImmutableApprovedArtifact(artifact)
    }

    pub fn overpayment(attempted: Decimal, remaining: Decimal) -> Self {
        Self::OverpaymentRejected {
            attempted,
            remaining,
        }
    }

    pub fn installment_sum(expected: Decimal, actual: Decimal) -> Self {
        Self::InstallmentSumMismatch { expected, actual }
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Forbidden(_) => "forbidden",
            Self::ImmutableField(_) => "immutable_field",
            Self::ImmutableApprovedArtifact(_) => "immutable_approved_artifact",
            Self::SignatureRequired => "signature_required",
            Self::CaseArchived => "case_archived",
            Self::OverpaymentRejected { .. } => "overpayment_rejected",
            Self::InstallmentSumMismatch { .. } => "installment_sum_mismatch",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidId(_) => "invalid_id",
        }
    }
}
