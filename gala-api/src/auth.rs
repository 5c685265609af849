use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gala_shared::Actor;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Resolve the bearer token into the acting party. Roles carry only the
/// admin override; all other authorization is relational and decided by
/// the workflow itself.
pub fn authenticate(state: &AppState, token: &str) -> Result<Actor, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Authentication(e.to_string()))?;

    let user_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| AppError::Authentication("malformed token subject".into()))?;
    Ok(if data.claims.role == "ADMIN" {
        Actor::admin(user_id)
    } else {
        Actor::user(user_id)
    })
}

/// Mint a token for the given party; used by local tooling and tests.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    role: &str,
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        exp: (Utc::now().timestamp() as usize) + ttl_seconds as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
