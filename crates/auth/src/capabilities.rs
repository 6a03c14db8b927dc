//! Role-to-capability mapping and the pure authorization check.
//!
//! Capabilities gate *routes*; aggregates still enforce their own actor
//! rules (assigned lawyer, designated reviewer, director signature), so a
//! capability grant is necessary but not sufficient for a command to land.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chancery_core::StaffRole;

/// Named capability such as `cases.open` or `billing.payments.write`.
///
/// `*` is the wildcard held by directors and grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability names used by the HTTP gateway.
pub mod caps {
    use super::Capability;

    pub const WILDCARD: Capability = Capability::from_static("*");

    pub const CASES_READ: Capability = Capability::from_static("cases.read");
    pub const CASES_OPEN: Capability = Capability::from_static("cases.open");
    pub const CASES_ASSIGN: Capability = Capability::from_static("cases.assign");
    pub const CASES_ACCEPT: Capability = Capability::from_static("cases.accept");
    pub const CASES_MEMORANDA: Capability = Capability::from_static("cases.memoranda");
    pub const CASES_REVIEW: Capability = Capability::from_static("cases.review");
    pub const CASES_REQUEST_SIGNATURE: Capability =
        Capability::from_static("cases.request_signature");
    pub const CASES_SIGN: Capability = Capability::from_static("cases.sign");
    pub const CASES_SUBMIT: Capability = Capability::from_static("cases.submit");
    pub const CASES_HEARINGS: Capability = Capability::from_static("cases.hearings");
    pub const CASES_STAGES: Capability = Capability::from_static("cases.stages");
    pub const CASES_DOCUMENTS: Capability = Capability::from_static("cases.documents");
    pub const CASES_ARCHIVE: Capability = Capability::from_static("cases.archive");
    pub const CASES_DELETE: Capability = Capability::from_static("cases.delete");

    pub const BILLING_READ: Capability = Capability::from_static("billing.read");
    pub const INVOICES_CREATE: Capability = Capability::from_static("billing.invoices.create");
    pub const INVOICES_UPDATE: Capability = Capability::from_static("billing.invoices.update");
    pub const INVOICES_DELETE: Capability = Capability::from_static("billing.invoices.delete");
    pub const PAYMENTS_WRITE: Capability = Capability::from_static("billing.payments.write");
    pub const PAYMENTS_DELETE: Capability = Capability::from_static("billing.payments.delete");
    pub const EXPENSES_WRITE: Capability = Capability::from_static("billing.expenses.write");
    pub const EXPENSES_VOID: Capability = Capability::from_static("billing.expenses.void");
    pub const BILLING_SWEEP: Capability = Capability::from_static("billing.sweep");

    pub const STAFF_READ: Capability = Capability::from_static("staff.read");
    pub const STAFF_MANAGE: Capability = Capability::from_static("staff.manage");
}

/// Capabilities granted by a role.
///
/// Directors hold the wildcard; everyone else gets an explicit list.
/// Sign/archive/delete and staff management have no explicit grants, which
/// leaves them director-only. The approving-lawyer grant is a strict
/// superset of the lawyer grant since senior counsel still run their own
/// caseload.
pub fn capabilities_for(role: StaffRole) -> Vec<Capability> {
    use caps::*;

    match role {
        StaffRole::Director => vec![WILDCARD],
        StaffRole::Secretary => vec![
            CASES_READ,
            CASES_OPEN,
            CASES_ASSIGN,
            CASES_SUBMIT,
            CASES_REQUEST_SIGNATURE,
            CASES_HEARINGS,
            CASES_DOCUMENTS,
            BILLING_READ,
            INVOICES_CREATE,
            PAYMENTS_WRITE,
            STAFF_READ,
        ],
        StaffRole::Lawyer => lawyer_caps(),
        StaffRole::ApprovingLawyer => {
            let mut granted = lawyer_caps();
            granted.push(CASES_REVIEW);
            granted
        }
        StaffRole::Accountant => vec![
            BILLING_READ,
            INVOICES_CREATE,
            INVOICES_UPDATE,
            INVOICES_DELETE,
            PAYMENTS_WRITE,
            PAYMENTS_DELETE,
            EXPENSES_WRITE,
            EXPENSES_VOID,
            BILLING_SWEEP,
            CASES_READ,
            CASES_DOCUMENTS,
            STAFF_READ,
        ],
    }
}

fn lawyer_caps() -> Vec<Capability> {
    use caps::*;

    vec![
        CASES_READ,
        CASES_ACCEPT,
        CASES_MEMORANDA,
        CASES_SUBMIT,
        CASES_REQUEST_SIGNATURE,
        CASES_STAGES,
        CASES_DOCUMENTS,
        STAFF_READ,
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Check that `role` grants every capability in `required`.
///
/// Pure; the gateway calls this per request after token validation.
pub fn authorize(role: StaffRole, required: &[Capability]) -> Result<(), AuthzError> {
    let granted: HashSet<Capability> = capabilities_for(role).into_iter().collect();
    if granted.contains(&caps::WILDCARD) {
        return Ok(());
    }
    for capability in required {
        if !granted.contains(capability) {
            tracing::debug!(role = %role, capability = %capability, "capability denied");
            return Err(AuthzError::Forbidden(format!(
                "role '{role}' lacks capability '{capability}'"
            )));
        }
    }
    Ok(())
}

/// Implemented by command DTOs that declare the capabilities they need.
pub trait CommandAuthorization {
    fn required_capabilities(&self) -> &[Capability];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn director_wildcard_grants_everything() {
        assert_eq!(authorize(StaffRole::Director, &[caps::CASES_DELETE]), Ok(()));
        assert_eq!(authorize(StaffRole::Director, &[caps::STAFF_MANAGE]), Ok(()));
        assert_eq!(
            authorize(StaffRole::Director, &[Capability::new("anything.at.all")]),
            Ok(())
        );
    }

    #[test]
    fn secretary_runs_the_front_office_but_never_reviews() {
        assert_eq!(
            authorize(
                StaffRole::Secretary,
                &[caps::CASES_OPEN, caps::CASES_ASSIGN, caps::CASES_HEARINGS]
            ),
            Ok(())
        );
        assert_eq!(
            authorize(StaffRole::Secretary, &[caps::INVOICES_CREATE, caps::PAYMENTS_WRITE]),
            Ok(())
        );
        let err = authorize(StaffRole::Secretary, &[caps::CASES_REVIEW]).unwrap_err();
        let AuthzError::Forbidden(msg) = err;
        assert!(msg.contains("cases.review"), "got: {msg}");
    }

    #[test]
    fn lawyers_run_their_caseload_but_do_not_schedule_hearings() {
        assert_eq!(
            authorize(
                StaffRole::Lawyer,
                &[caps::CASES_ACCEPT, caps::CASES_MEMORANDA, caps::CASES_STAGES]
            ),
            Ok(())
        );
        assert!(authorize(StaffRole::Lawyer, &[caps::CASES_HEARINGS]).is_err());
        assert!(authorize(StaffRole::Lawyer, &[caps::CASES_OPEN]).is_err());
    }

    #[test]
    fn approving_lawyer_is_a_superset_of_lawyer() {
        for capability in capabilities_for(StaffRole::Lawyer) {
            assert_eq!(
                authorize(StaffRole::ApprovingLawyer, core::slice::from_ref(&capability)),
                Ok(()),
                "approving lawyer missing {capability}"
            );
        }
        assert_eq!(authorize(StaffRole::ApprovingLawyer, &[caps::CASES_REVIEW]), Ok(()));
        assert!(authorize(StaffRole::Lawyer, &[caps::CASES_REVIEW]).is_err());
    }

    #[test]
    fn accountant_owns_billing_but_not_case_mutations() {
        assert_eq!(
            authorize(
                StaffRole::Accountant,
                &[
                    caps::INVOICES_UPDATE,
                    caps::PAYMENTS_DELETE,
                    caps::BILLING_SWEEP,
                    caps::EXPENSES_VOID,
                    caps::CASES_READ,
                ]
            ),
            Ok(())
        );
        assert!(authorize(StaffRole::Accountant, &[caps::CASES_OPEN]).is_err());
        assert!(authorize(StaffRole::Accountant, &[caps::CASES_SUBMIT]).is_err());
    }

    #[test]
    fn signing_and_archiving_stay_director_only() {
        for role in [
            StaffRole::Secretary,
            StaffRole::Lawyer,
            StaffRole::ApprovingLawyer,
            StaffRole::Accountant,
        ] {
            assert!(authorize(role, &[caps::CASES_SIGN]).is_err(), "{role} can sign");
            assert!(authorize(role, &[caps::CASES_ARCHIVE]).is_err(), "{role} can archive");
            assert!(authorize(role, &[caps::STAFF_MANAGE]).is_err(), "{role} manages staff");
        }
        assert_eq!(authorize(StaffRole::Director, &[caps::CASES_SIGN]), Ok(()));
    }

    #[test]
    fn one_missing_capability_fails_the_whole_set() {
        let err =
            authorize(StaffRole::Lawyer, &[caps::CASES_ACCEPT, caps::CASES_SIGN]).unwrap_err();
        let AuthzError::Forbidden(msg) = err;
        assert!(msg.contains("cases.sign"), "got: {msg}");
    }
}
