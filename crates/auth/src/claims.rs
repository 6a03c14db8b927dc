//! Token claims carried by every authenticated request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chancery_core::{StaffRole, UserId};

/// Claims embedded in an access token.
///
/// The firm runs a single-role model: each staff member holds exactly one
/// [`StaffRole`], and the gateway derives capabilities from it on every
/// request. Validity is expressed as a chrono time window rather than the
/// raw numeric `exp`/`iat` pair so the same struct serves tokens, tests and
/// audit logs without conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Staff member the token was issued to.
    pub sub: UserId,
    /// Display name, carried for activity/audit rendering.
    pub name: String,
    /// Role held at issue time.
    pub role: StaffRole,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn new(
        sub: UserId,
        name: impl Into<String>,
        role: StaffRole,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub,
            name: name.into(),
            role,
            issued_at,
            expires_at,
        }
    }

    /// True if the token is inside its validity window at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        validate_claims(self, now).is_ok()
    }
}

/// Reasons a structurally sound token can still be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenValidationError {
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token validity window is invalid")]
    InvalidTimeWindow,
}

/// Validate the claim time window against `now`.
///
/// Pure so callers (and tests) control the clock.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).single().unwrap()
    }

    fn claims() -> Claims {
        Claims::new(UserId::new(), "Nadia Haddad", StaffRole::Lawyer, at(9), at(17))
    }

    #[test]
    fn accepts_a_token_inside_its_window() {
        assert_eq!(validate_claims(&claims(), at(12)), Ok(()));
        assert!(claims().is_valid_at(at(12)));
    }

    #[test]
    fn window_start_is_inclusive_and_end_exclusive() {
        assert_eq!(validate_claims(&claims(), at(9)), Ok(()));
        assert_eq!(
            validate_claims(&claims(), at(17)),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_a_token_used_before_issue() {
        assert_eq!(
            validate_claims(&claims(), at(8)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_an_inverted_window() {
        let inverted =
            Claims::new(UserId::new(), "Omar Director", StaffRole::Director, at(17), at(9));
        assert_eq!(
            validate_claims(&inverted, at(12)),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
