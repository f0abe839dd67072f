use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::Role;

/// Back-office account, mapping to the `admin_users` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminUser {
    /// Unique identifier for the account
    pub id: Uuid,

    /// Login email (unique)
    pub email: String,

    /// Bcrypt hashed password
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Name shown in the UI and frozen onto invoices
    pub display_name: String,

    /// Privilege level
    pub role: Role,

    /// Whether the account may log in
    pub is_active: bool,

    /// Timestamp of the account's last login
    pub last_login_at: Option<DateTime<Utc>>,

    /// Timestamp when the account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Admin creation request (plaintext password, hashed before storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdmin {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

/// Role change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRole {
    pub role: Role,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response carrying the signed session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminResponse,
}

/// Admin response (public representation, excludes the password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminResponse {
    fn from(admin: AdminUser) -> Self {
        AdminResponse {
            id: admin.id,
            email: admin.email,
            display_name: admin.display_name,
            role: admin.role,
            is_active: admin.is_active,
            last_login_at: admin.last_login_at,
            created_at: admin.created_at,
        }
    }
}
