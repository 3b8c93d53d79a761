//! User account entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{UserAccount, UserRole};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRoleDb {
    Resident,
    Security,
    Admin,
}

impl From<UserRoleDb> for UserRole {
    fn from(role: UserRoleDb) -> Self {
        match role {
            UserRoleDb::Resident => UserRole::Resident,
            UserRoleDb::Security => UserRole::Security,
            UserRoleDb::Admin => UserRole::Admin,
        }
    }
}

impl From<UserRole> for UserRoleDb {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Resident => UserRoleDb::Resident,
            UserRole::Security => UserRoleDb::Security,
            UserRole::Admin => UserRoleDb::Admin,
        }
    }
}

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRoleDb,
    pub unit_number: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserEntity> for UserAccount {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            full_name: entity.full_name,
            email: entity.email,
            phone_number: entity.phone_number,
            role: entity.role.into(),
            unit_number: entity.unit_number,
            is_active: entity.is_active,
            is_approved: entity.is_approved,
            approved_at: entity.approved_at,
            approved_by: entity.approved_by,
            rejected_at: entity.rejected_at,
            created_at: entity.created_at,
        }
    }
}
