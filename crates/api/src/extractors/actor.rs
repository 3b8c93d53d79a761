//! Bearer-token actor extractor.
//!
//! Tokens are minted by the authentication service; their claims carry the
//! account id, role and approval flag, which is all the gate needs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::{Actor, UserRole};
use shared::jwt::{extract_user_id, JwtConfig, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

/// The signed-in caller. Rejects the request with 401 when absent or invalid.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get("Authorization") else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header format".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

/// Validates `token` and reads the actor descriptor from its claims.
pub fn actor_from_token(jwt: &JwtConfig, token: &str) -> Result<Actor, ApiError> {
    let claims = jwt.validate_access_token(token).map_err(|e| match e {
        JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
        _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
    })?;
    let id = extract_user_id(&claims)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
    let role: UserRole = claims
        .role
        .parse()
        .map_err(|_| ApiError::Unauthorized("Unknown role in token".to_string()))?;
    Ok(Actor::new(id, role, claims.approved))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
        let actor = actor_from_token(&state.jwt, token)?;
        tracing::debug!(actor_id = %actor.id, role = %actor.role, "Actor authenticated");
        Ok(CurrentActor(actor))
    }
}
