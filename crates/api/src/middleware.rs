use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use chancery_auth::JwtValidator;
use chancery_core::Actor;
use chancery_infra::StaffDirectoryProjection;

use crate::context::RequestContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub staff: Arc<StaffDirectoryProjection>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = state
        .jwt
        .validate(token, Utc::now())
        .map_err(|_e| StatusCode::UNAUTHORIZED)?;

    // The staff directory acts as a veto: a valid token for a member the
    // directory knows to be deactivated is refused. Unknown subjects pass,
    // otherwise the first staff member could never be registered.
    if let Some(member) = state.staff.get(&claims.sub) {
        if !member.is_active() {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    req.extensions_mut().insert(RequestContext::new(
        Actor::new(claims.sub, claims.role),
        claims.name.clone(),
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
