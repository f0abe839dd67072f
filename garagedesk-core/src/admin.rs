//! Role-gated admin account management and login.
//!
//! Creation, role changes and deletion require `SuperAdmin`, and an account
//! may never act on itself for role changes or deletion. These self-checks
//! are business rules of the specific operations, not of the gate.

use tracing::info;
use uuid::Uuid;

use crate::auth::{self, Actor, Role};
use crate::error::AppError;
use crate::models::admin::{AdminResponse, AdminUser, CreateAdmin, LoginRequest, LoginResponse};
use crate::AppState;

/// Creates an admin account with a bcrypt-hashed password.
pub async fn create_admin(
    state: &AppState,
    request: CreateAdmin,
    actor: &Actor,
) -> Result<AdminResponse, AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if request.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if request.display_name.trim().is_empty() {
        return Err(AppError::Validation("display name is required".to_string()));
    }

    let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let admin = sqlx::query_as::<_, AdminUser>(
        r#"
        INSERT INTO admin_users (email, password_hash, display_name, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(request.email.trim().to_lowercase())
    .bind(&password_hash)
    .bind(request.display_name.trim())
    .bind(request.role)
    .fetch_one(&state.db)
    .await
    .map_err(|e| AppError::or_conflict(e, "email already registered"))?;

    info!("Created {} account {}", admin.role, admin.email);
    Ok(admin.into())
}

/// Changes an account's role. Self-demotion (any self role change) is blocked.
pub async fn update_role(
    state: &AppState,
    admin_id: Uuid,
    new_role: Role,
    actor: &Actor,
) -> Result<AdminResponse, AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    if admin_id == actor.id {
        return Err(AppError::Forbidden);
    }

    let admin = sqlx::query_as::<_, AdminUser>(
        "UPDATE admin_users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(admin_id)
    .bind(new_role)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("admin account".to_string()))?;

    info!("Changed role of {} to {}", admin.email, admin.role);
    Ok(admin.into())
}

/// Deletes an account. Self-deletion is blocked.
pub async fn delete_admin(
    state: &AppState,
    admin_id: Uuid,
    actor: &Actor,
) -> Result<(), AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    if admin_id == actor.id {
        return Err(AppError::Forbidden);
    }

    let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
        .bind(admin_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("admin account".to_string()));
    }

    info!("Deleted admin account {}", admin_id);
    Ok(())
}

/// Lists all accounts (public representation).
pub async fn list_admins(state: &AppState, actor: &Actor) -> Result<Vec<AdminResponse>, AppError> {
    auth::require(Some(actor), Role::SuperAdmin)?;

    let admins = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users ORDER BY created_at")
        .fetch_all(&state.db)
        .await?;

    Ok(admins.into_iter().map(AdminResponse::from).collect())
}

/// Verifies credentials and issues a session token, stamping `last_login_at`.
///
/// Wrong email and wrong password are indistinguishable to the caller.
pub async fn verify_login(
    state: &AppState,
    request: LoginRequest,
) -> Result<LoginResponse, AppError> {
    let admin = sqlx::query_as::<_, AdminUser>(
        "SELECT * FROM admin_users WHERE email = $1 AND is_active = TRUE",
    )
    .bind(request.email.trim().to_lowercase())
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let verified = bcrypt::verify(&request.password, &admin.password_hash)
        .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))?;
    if !verified {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
        .bind(admin.id)
        .execute(&state.db)
        .await?;

    let token = auth::issue_token(&admin)?;

    info!("Login for {}", admin.email);
    Ok(LoginResponse {
        token,
        admin: admin.into(),
    })
}
