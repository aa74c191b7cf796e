/// Sign-in, registration, password reset and the caller's profile.
pub mod auth;
/// Collection CRUD, role changes and the dashboard.
pub mod admin;
/// Serving uploaded objects.
pub mod files;
/// Liveness check.
pub mod health;
/// Long-polls over the site's live subscriptions.
pub mod live;
/// Upload and delete objects in the bucket.
pub mod uploads;

use serde::Serialize;

/// `{ data, success: true, message }` envelope of admin write responses.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub success: bool,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            success: true,
            message: message.into(),
        }
    }
}
