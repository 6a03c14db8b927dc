//! Acting staff identity attached to every command and event.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::UserId;

/// Role held by a staff member. Exactly one per user.
///
/// `ApprovingLawyer` marks senior counsel eligible to review memoranda; the
/// concrete reviewer for a case is pinned by the case's write-once
/// `approving_lawyer` field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Director,
    Secretary,
    Lawyer,
    ApprovingLawyer,
    Accountant,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Director => "director",
            StaffRole::Secretary => "secretary",
            StaffRole::Lawyer => "lawyer",
            StaffRole::ApprovingLawyer => "approving_lawyer",
            StaffRole::Accountant => "accountant",
        }
    }
}

impl core::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "director" => Ok(StaffRole::Director),
            "secretary" => Ok(StaffRole::Secretary),
            "lawyer" => Ok(StaffRole::Lawyer),
            "approving_lawyer" => Ok(StaffRole::ApprovingLawyer),
            "accountant" => Ok(StaffRole::Accountant),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Who performed a command. Recorded verbatim on the resulting events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: StaffRole,
}

impl Actor {
    pub fn new(user_id: UserId, role: StaffRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_director(&self) -> bool {
        self.role == StaffRole::Director
    }

    pub fn is_lawyer(&self) -> bool {
        self.role == StaffRole::Lawyer
    }
}
