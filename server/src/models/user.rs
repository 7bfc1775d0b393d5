use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

string_enum!(
    /// Account role; decides which dashboards and endpoints a user may reach
    Role {
        Admin => "admin",
        Doctor => "doctor",
        Patient => "patient",
    }
);

string_enum!(
    /// Account lifecycle. Doctors start `pending` until an admin approves them.
    UserStatus {
        Active => "active",
        Pending => "pending",
        Suspended => "suspended",
        Rejected => "rejected",
    }
);

impl UserStatus {
    /// Suspended and rejected accounts are locked out
    pub fn can_sign_in(&self) -> bool {
        matches!(self, UserStatus::Active | UserStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    /// Doctors may supply their specialization up front
    #[serde(default)]
    pub specialization: Option<String>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl RegisterRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if self.role == Role::Admin {
            return Err(AppError::validation(
                "admin accounts cannot be self-registered",
            ));
        }
        Ok(())
    }
}

pub fn validate_email(email: &str) -> AppResult<()> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(AppError::validation("email must be a valid address"))
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
    /// name | email | created (prefix with '-' for descending)
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
