//! Staff registry aggregate.
//!
//! One record per firm employee. The registry is the source of truth for
//! which accounts may authenticate and which role a token is minted with;
//! case and billing aggregates reference staff only by [`UserId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chancery_core::{Actor, Aggregate, AggregateRoot, DomainError, StaffRole, UserId};
use chancery_events::Event;

/// Whether the account may authenticate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffStatus {
    Active,
    Inactive,
}

impl StaffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffStatus::Active => "active",
            StaffStatus::Inactive => "inactive",
        }
    }
}

impl core::fmt::Display for StaffStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: StaffMember.
///
/// Deactivation is soft: the record stays readable for audit but the
/// gateway refuses tokens and requests for inactive accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffMember {
    id: UserId,
    email: String,
    display_name: String,
    role: StaffRole,
    status: StaffStatus,
    deactivation_reason: Option<String>,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl StaffMember {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            email: String::new(),
            display_name: String::new(),
            role: StaffRole::Secretary,
            status: StaffStatus::Active,
            deactivation_reason: None,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> StaffRole {
        self.role
    }

    pub fn status(&self) -> StaffStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == StaffStatus::Active
    }

    pub fn deactivation_reason(&self) -> Option<&str> {
        self.deactivation_reason.as_deref()
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }
}

impl AggregateRoot for StaffMember {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterStaff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterStaff {
    pub staff_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: StaffRole,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStaffContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStaffContact {
    pub staff_id: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStaffRole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStaffRole {
    pub staff_id: UserId,
    pub role: StaffRole,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateStaff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateStaff {
    pub staff_id: UserId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateStaff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateStaff {
    pub staff_id: UserId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffCommand {
    RegisterStaff(RegisterStaff),
    UpdateStaffContact(UpdateStaffContact),
    ChangeStaffRole(ChangeStaffRole),
    DeactivateStaff(DeactivateStaff),
    ReactivateStaff(ReactivateStaff),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRegistered {
    pub staff_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: StaffRole,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffContactUpdated {
    pub staff_id: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRoleChanged {
    pub staff_id: UserId,
    pub role: StaffRole,
    pub previous_role: StaffRole,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffDeactivated {
    pub staff_id: UserId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffReactivated {
    pub staff_id: UserId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffEvent {
    StaffRegistered(StaffRegistered),
    StaffContactUpdated(StaffContactUpdated),
    StaffRoleChanged(StaffRoleChanged),
    StaffDeactivated(StaffDeactivated),
    StaffReactivated(StaffReactivated),
}

impl Event for StaffEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StaffEvent::StaffRegistered(_) => "staff.registered",
            StaffEvent::StaffContactUpdated(_) => "staff.contact_updated",
            StaffEvent::StaffRoleChanged(_) => "staff.role_changed",
            StaffEvent::StaffDeactivated(_) => "staff.deactivated",
            StaffEvent::StaffReactivated(_) => "staff.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StaffEvent::StaffRegistered(e) => e.occurred_at,
            StaffEvent::StaffContactUpdated(e) => e.occurred_at,
            StaffEvent::StaffRoleChanged(e) => e.occurred_at,
            StaffEvent::StaffDeactivated(e) => e.occurred_at,
            StaffEvent::StaffReactivated(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> Actor {
        match self {
            StaffEvent::StaffRegistered(e) => e.actor,
            StaffEvent::StaffContactUpdated(e) => e.actor,
            StaffEvent::StaffRoleChanged(e) => e.actor,
            StaffEvent::StaffDeactivated(e) => e.actor,
            StaffEvent::StaffReactivated(e) => e.actor,
        }
    }
}

impl StaffEvent {
    pub fn staff_id(&self) -> UserId {
        match self {
            StaffEvent::StaffRegistered(e) => e.staff_id,
            StaffEvent::StaffContactUpdated(e) => e.staff_id,
            StaffEvent::StaffRoleChanged(e) => e.staff_id,
            StaffEvent::StaffDeactivated(e) => e.staff_id,
            StaffEvent::StaffReactivated(e) => e.staff_id,
        }
    }
}

impl StaffMember {
    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("staff member"));
        }
        Ok(())
    }

    fn ensure_staff_id(&self, staff_id: UserId) -> Result<(), DomainError> {
        if staff_id != self.id {
            return Err(DomainError::validation("staff_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.status == StaffStatus::Inactive {
            return Err(DomainError::conflict("staff member is inactive"));
        }
        Ok(())
    }

    fn ensure_director(actor: Actor) -> Result<(), DomainError> {
        if !actor.is_director() {
            return Err(DomainError::forbidden(
                "only a director may manage staff records",
            ));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterStaff) -> Result<Vec<StaffEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("staff member already exists"));
        }
        self.ensure_staff_id(cmd.staff_id)?;
        Self::ensure_director(cmd.actor)?;
        let email = normalize_email(&cmd.email)?;
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name must not be empty"));
        }
        Ok(vec![StaffEvent::StaffRegistered(StaffRegistered {
            staff_id: cmd.staff_id,
            email,
            display_name: cmd.display_name.trim().to_string(),
            role: cmd.role,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_contact(
        &self,
        cmd: &UpdateStaffContact,
    ) -> Result<Vec<StaffEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_staff_id(cmd.staff_id)?;
        self.ensure_active()?;
        if !cmd.actor.is_director() && cmd.actor.user_id != self.id {
            return Err(DomainError::forbidden(
                "contact details may be changed by the member or a director",
            ));
        }
        if cmd.email.is_none() && cmd.display_name.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        let email = cmd.email.as_deref().map(normalize_email).transpose()?;
        let display_name = match cmd.display_name.as_deref() {
            Some(name) if name.trim().is_empty() => {
                return Err(DomainError::validation("display name must not be empty"));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let email_unchanged = email.as_deref().is_none_or(|e| e == self.email);
        let name_unchanged = display_name.as_deref().is_none_or(|n| n == self.display_name);
        if email_unchanged && name_unchanged {
            return Ok(vec![]);
        }

        Ok(vec![StaffEvent::StaffContactUpdated(StaffContactUpdated {
            staff_id: cmd.staff_id,
            email,
            display_name,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_role(&self, cmd: &ChangeStaffRole) -> Result<Vec<StaffEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_staff_id(cmd.staff_id)?;
        self.ensure_active()?;
        Self::ensure_director(cmd.actor)?;
        if cmd.role == self.role {
            return Ok(vec![]);
        }
        Ok(vec![StaffEvent::StaffRoleChanged(StaffRoleChanged {
            staff_id: cmd.staff_id,
            role: cmd.role,
            previous_role: self.role,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateStaff) -> Result<Vec<StaffEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_staff_id(cmd.staff_id)?;
        Self::ensure_director(cmd.actor)?;
        if self.status == StaffStatus::Inactive {
            return Err(DomainError::conflict("staff member is already inactive"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "deactivation reason must not be empty",
            ));
        }
        Ok(vec![StaffEvent::StaffDeactivated(StaffDeactivated {
            staff_id: cmd.staff_id,
            reason: cmd.reason.trim().to_string(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateStaff) -> Result<Vec<StaffEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_staff_id(cmd.staff_id)?;
        Self::ensure_director(cmd.actor)?;
        if self.status == StaffStatus::Active {
            return Err(DomainError::conflict("staff member is already active"));
        }
        Ok(vec![StaffEvent::StaffReactivated(StaffReactivated {
            staff_id: cmd.staff_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(DomainError::validation("invalid email address"));
    }
    Ok(trimmed.to_lowercase())
}

impl Aggregate for StaffMember {
    type Command = StaffCommand;
    type Event = StaffEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StaffEvent::StaffRegistered(e) => {
                self.id = e.staff_id;
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.role = e.role;
                self.status = StaffStatus::Active;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            StaffEvent::StaffContactUpdated(e) => {
                if let Some(email) = &e.email {
                    self.email = email.clone();
                }
                if let Some(name) = &e.display_name {
                    self.display_name = name.clone();
                }
            }
            StaffEvent::StaffRoleChanged(e) => {
                self.role = e.role;
            }
            StaffEvent::StaffDeactivated(e) => {
                self.status = StaffStatus::Inactive;
                self.deactivation_reason = Some(e.reason.clone());
            }
            StaffEvent::StaffReactivated(_) => {
                self.status = StaffStatus::Active;
                self.deactivation_reason = None;
            }
        }
        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StaffCommand::RegisterStaff(cmd) => self.handle_register(cmd),
            StaffCommand::UpdateStaffContact(cmd) => self.handle_update_contact(cmd),
            StaffCommand::ChangeStaffRole(cmd) => self.handle_change_role(cmd),
            StaffCommand::DeactivateStaff(cmd) => self.handle_deactivate(cmd),
            StaffCommand::ReactivateStaff(cmd) => self.handle_reactivate(cmd),
        }
    }
}
