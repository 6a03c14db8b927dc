use chancery_core::{Actor, StaffRole, UserId};

/// Authenticated staff context for a request.
///
/// Inserted by the auth middleware; present on every route behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: Actor,
    name: String,
}

impl RequestContext {
    pub fn new(actor: Actor, name: impl Into<String>) -> Self {
        Self {
            actor,
            name: name.into(),
        }
    }

    /// The acting staff member, as recorded on commands and events.
    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn role(&self) -> StaffRole {
        self.actor.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
