//! # Auth Domain
//!
//! Roles, application profiles, and translation of identity-provider error
//! codes into user-facing messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EdifError;

// =============================================================================
// ROLES
// =============================================================================

/// Admin panel role. Higher ranks include the permissions of lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    #[default]
    Viewer,
}

impl UserRole {
    pub fn rank(self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::Editor => 2,
            UserRole::Viewer => 1,
        }
    }

    /// `self` is at least as privileged as `required`.
    pub fn includes(self, required: UserRole) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = EdifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(EdifError::UnknownRole(other.to_string())),
        }
    }
}

/// Permission check with no signed-in user counting as denied.
pub fn has_permission(user: Option<&UserProfile>, required: UserRole) -> bool {
    user.is_some_and(|u| u.role.includes(required))
}

// =============================================================================
// PROFILES
// =============================================================================

/// The user as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Application-level profile, stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile synthesised when the stored one cannot be read.
    pub fn fallback(user: &ProviderUser, now: DateTime<Utc>) -> Self {
        Self {
            id: user.uid.clone(),
            email: user.email.clone().unwrap_or_default(),
            name: user
                .display_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "User".to_string()),
            role: UserRole::Viewer,
            avatar: Some(user.photo_url.clone().unwrap_or_default()),
            created_at: now,
            last_login: Some(now),
        }
    }

    pub fn has_permission(&self, required: UserRole) -> bool {
        self.role.includes(required)
    }
}

// =============================================================================
// PROVIDER ERROR CODES
// =============================================================================

/// Identity-provider failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    UserNotFound,
    WrongPassword,
    InvalidEmail,
    UserDisabled,
    TooManyRequests,
    EmailAlreadyInUse,
    WeakPassword,
    InvalidActionCode,
    /// Anything the table does not name.
    Other,
}

impl AuthErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            AuthErrorCode::UserNotFound => "user-not-found",
            AuthErrorCode::WrongPassword => "wrong-password",
            AuthErrorCode::InvalidEmail => "invalid-email",
            AuthErrorCode::UserDisabled => "user-disabled",
            AuthErrorCode::TooManyRequests => "too-many-requests",
            AuthErrorCode::EmailAlreadyInUse => "email-already-in-use",
            AuthErrorCode::WeakPassword => "weak-password",
            AuthErrorCode::InvalidActionCode => "invalid-action-code",
            AuthErrorCode::Other => "internal-error",
        }
    }

    /// Message shown to the person signing in.
    pub fn message(self) -> &'static str {
        match self {
            AuthErrorCode::UserNotFound => "No account found with this email",
            AuthErrorCode::WrongPassword => "Incorrect password",
            AuthErrorCode::InvalidEmail => "Invalid email address",
            AuthErrorCode::UserDisabled => "This account has been disabled",
            AuthErrorCode::TooManyRequests => "Too many failed attempts. Try again later",
            AuthErrorCode::EmailAlreadyInUse => "An account with this email already exists",
            AuthErrorCode::WeakPassword => "Password should be at least 6 characters",
            AuthErrorCode::InvalidActionCode => "The reset link is invalid or has expired",
            AuthErrorCode::Other => "Invalid email or password",
        }
    }

    /// Parse a provider code, with or without the `auth/` prefix.
    pub fn from_code(code: &str) -> Self {
        match code.strip_prefix("auth/").unwrap_or(code) {
            "user-not-found" => AuthErrorCode::UserNotFound,
            "wrong-password" => AuthErrorCode::WrongPassword,
            "invalid-email" => AuthErrorCode::InvalidEmail,
            "user-disabled" => AuthErrorCode::UserDisabled,
            "too-many-requests" => AuthErrorCode::TooManyRequests,
            "email-already-in-use" => AuthErrorCode::EmailAlreadyInUse,
            "weak-password" => AuthErrorCode::WeakPassword,
            "invalid-action-code" | "expired-action-code" => AuthErrorCode::InvalidActionCode,
            _ => AuthErrorCode::Other,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
