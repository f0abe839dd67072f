use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::admin::AdminUser;

/// Privilege levels, ordered: `Admin < SuperAdmin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sqlx(rename = "admin")]
    Admin,

    #[sqlx(rename = "super_admin")]
    SuperAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

/// The authenticated principal attached to request extensions.
///
/// Built from JWT claims by `jwt_middleware`; core operations receive it
/// as their acting user.
#[derive(Clone, Debug)]
pub struct Actor {
    /// User's UUID (JWT `sub`)
    pub id: Uuid,

    /// Resolved role
    pub role: Role,

    /// Display name, frozen onto invoices as `billed_by_name`
    pub display_name: String,
}

/// Claims expected inside the JWT for authenticated users.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's UUID as a string.
    pub sub: String,
    pub role: Role,
    pub name: String,
    pub exp: usize,
}

/// The uniform authorization gate.
///
/// Every mutating operation calls this first, before any data access:
/// `Unauthorized` when no session is present, `Forbidden` when the session's
/// role is below the operation's declared minimum.
pub fn require(actor: Option<&Actor>, min_role: Role) -> Result<&Actor, AppError> {
    let actor = actor.ok_or(AppError::Unauthorized)?;
    if actor.role < min_role {
        return Err(AppError::Forbidden);
    }
    Ok(actor)
}

fn jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string())
}

/// Issues a signed HS256 token for a verified admin login, valid for 24 hours.
pub fn issue_token(admin: &AdminUser) -> Result<String, AppError> {
    let claims = Claims {
        sub: admin.id.to_string(),
        role: admin.role,
        name: admin.display_name.clone(),
        exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success an `Actor` is attached to request extensions and the request
/// is forwarded; on failure a `401` is returned.
pub async fn jwt_middleware(mut req: Request, next: Next) -> Result<Response, AppError> {
    // Extract token from Authorization header
    let auth_header = req.headers().get("authorization");
    let token = match auth_header.and_then(|v| v.to_str().ok()) {
        Some(s) if s.starts_with("Bearer ") => &s[7..],
        _ => return Err(AppError::Unauthorized),
    };

    let decoding_key = DecodingKey::from_secret(jwt_secret().as_bytes());

    let claims = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|_| AppError::Unauthorized)?
        .claims;

    // Parse subject as UUID and attach to request extensions for downstream handlers.
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    req.extensions_mut().insert(Actor {
        id: user_id,
        role: claims.role,
        display_name: claims.name,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
            display_name: "Test Admin".to_string(),
        }
    }

    #[test]
    fn test_missing_session_is_unauthorized() {
        let result = require(None, Role::Admin);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_admin_below_super_admin_is_forbidden() {
        let a = actor(Role::Admin);
        let result = require(Some(&a), Role::SuperAdmin);
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn test_super_admin_passes_admin_gate() {
        let a = actor(Role::SuperAdmin);
        assert!(require(Some(&a), Role::Admin).is_ok());
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin < Role::SuperAdmin);
    }
}
