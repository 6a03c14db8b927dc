//! `chancery-auth` — staff identity, tokens and capability checks.
//!
//! Three concerns live here:
//! - the staff registry aggregate (who works at the firm, in which role),
//! - HS256 token minting/validation with pure claim-window checks,
//! - the role-to-capability map the HTTP gateway authorizes against.
//!
//! Everything is deterministic and clock-injected so the gateway and tests
//! share the exact same code paths.

pub mod capabilities;
pub mod claims;
pub mod jwt;
pub mod staff;

pub use capabilities::{
    AuthzError, Capability, CommandAuthorization, authorize, capabilities_for, caps,
};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator, mint_token};
pub use staff::{
    ChangeStaffRole, DeactivateStaff, ReactivateStaff, RegisterStaff, StaffCommand,
    StaffContactUpdated, StaffDeactivated, StaffEvent, StaffMember, StaffReactivated,
    StaffRegistered, StaffRoleChanged, StaffStatus, UpdateStaffContact,
};
