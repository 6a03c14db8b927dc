//! Capability check at the command boundary.
//!
//! Routes declare the capabilities a command needs; the check runs before
//! dispatch. Aggregates still enforce their own actor rules (assigned
//! lawyer, designated reviewer, director signature), so passing here is
//! necessary but not sufficient.

use chancery_auth::{AuthzError, Capability, CommandAuthorization, authorize};

use crate::context::RequestContext;

/// Pairs a command with the capabilities its route requires.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Capability>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_capabilities(&self) -> &[Capability] {
        &self.required
    }
}

/// Check the request context's role against a command's capabilities.
pub fn authorize_command<C: CommandAuthorization>(
    ctx: &RequestContext,
    command: &C,
) -> Result<(), AuthzError> {
    authorize(ctx.role(), command.required_capabilities())
}

/// Capability check for read routes, where there is no command to carry
/// the requirement.
pub fn require(ctx: &RequestContext, required: &[Capability]) -> Result<(), AuthzError> {
    authorize(ctx.role(), required)
}
