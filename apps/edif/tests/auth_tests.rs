//! Auth-state reconciliation against the provider's notifications.
//!
//! Runs on a paused clock so the settle timeout elapses instantly.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edif::auth::{AuthSession, AuthState, load_profile, save_profile};
use edif::error::AppError;
use edif::identity::{AuthClient, IdentityProvider, LocalIdentity};
use edif_core::{AuthErrorCode, DocumentStore, MemoryStore, ProviderUser, UserProfile, UserRole};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const TIMEOUT: Duration = Duration::from_secs(10);

struct Fixture {
    store: Arc<MemoryStore>,
    provider: Arc<dyn IdentityProvider>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let provider: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new(store.clone(), 10));
    Fixture { store, provider }
}

impl Fixture {
    /// A session whose client has not resolved its persisted state yet.
    fn pending_session(&self) -> (Arc<AuthClient>, AuthSession) {
        let client = Arc::new(AuthClient::new(self.provider.clone()));
        let store: Arc<dyn DocumentStore> = self.store.clone();
        let session = AuthSession::start(client.clone(), store, TIMEOUT);
        (client, session)
    }

    fn profile(&self, uid: &str, role: UserRole) -> UserProfile {
        let profile = UserProfile {
            id: uid.to_string(),
            email: format!("{uid}@edif.test"),
            name: "Stored Name".to_string(),
            role,
            avatar: None,
            created_at: Utc::now(),
            last_login: None,
        };
        save_profile(self.store.as_ref(), &profile).unwrap();
        profile
    }
}

fn provider_user(uid: &str) -> ProviderUser {
    ProviderUser {
        uid: uid.to_string(),
        email: Some(format!("{uid}@edif.test")),
        display_name: Some("Provider Name".to_string()),
        photo_url: None,
    }
}

fn settled(state: &AuthState) -> bool {
    !state.is_loading
}

// =============================================================================
// TIMEOUT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_starts_loading_until_timeout() {
    let f = fixture();
    let (_client, session) = f.pending_session();
    assert_eq!(
        session.state(),
        AuthState {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    );

    tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
    assert!(session.state().is_loading);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = session.state();
    assert!(!state.is_loading);
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_first_notification_disarms_timer() {
    let f = fixture();
    f.profile("u1", UserRole::Editor);
    let (client, session) = f.pending_session();

    tokio::time::sleep(Duration::from_secs(3)).await;
    client.resolve(Some(provider_user("u1")));
    let state = session.wait_until(Duration::from_secs(1), |s| s.is_authenticated).await;
    assert!(state.is_authenticated);

    // Well past the original deadline the user is still signed in.
    tokio::time::sleep(TIMEOUT * 2).await;
    let state = session.state();
    assert!(state.is_authenticated);
    assert_eq!(state.user.unwrap().role, UserRole::Editor);
}

#[tokio::test(start_paused = true)]
async fn test_notification_after_timeout_still_applies() {
    let f = fixture();
    f.profile("late", UserRole::Admin);
    let (client, session) = f.pending_session();

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    assert!(!session.state().is_authenticated);
    assert!(!session.state().is_loading);

    client.resolve(Some(provider_user("late")));
    let state = session.wait_until(Duration::from_secs(1), |s| s.is_authenticated).await;
    assert_eq!(state.user.unwrap().id, "late");
}

#[tokio::test(start_paused = true)]
async fn test_signed_out_notification_settles() {
    let f = fixture();
    let (client, session) = f.pending_session();

    client.resolve(None);
    let state = session.wait_until(Duration::from_secs(1), settled).await;
    assert!(!state.is_loading);
    assert!(!state.is_authenticated);
}

// =============================================================================
// PROFILES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stored_profile_wins_over_provider_fields() {
    let f = fixture();
    f.profile("u2", UserRole::Admin);
    let (client, session) = f.pending_session();

    client.resolve(Some(provider_user("u2")));
    let state = session.wait_until(Duration::from_secs(1), |s| s.is_authenticated).await;
    let user = state.user.unwrap();
    assert_eq!(user.name, "Stored Name");
    assert_eq!(user.role, UserRole::Admin);
}

#[tokio::test(start_paused = true)]
async fn test_missing_profile_uses_fallback() {
    let f = fixture();
    let (client, session) = f.pending_session();

    client.resolve(Some(provider_user("ghost")));
    let state = session.wait_until(Duration::from_secs(1), |s| s.is_authenticated).await;
    let user = state.user.unwrap();
    assert_eq!(user.id, "ghost");
    assert_eq!(user.name, "Provider Name");
    assert_eq!(user.email, "ghost@edif.test");
    assert_eq!(user.role, UserRole::Viewer);
    assert_eq!(user.avatar.as_deref(), Some(""));
    assert!(user.last_login.is_some());

    // The fallback is not written back.
    assert!(load_profile(f.store.as_ref(), "ghost").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_already_signed_in_client_loads_profile_immediately() {
    let f = fixture();
    f.profile("u3", UserRole::Viewer);
    let client = Arc::new(AuthClient::restored(
        f.provider.clone(),
        Some(provider_user("u3")),
    ));
    let store: Arc<dyn DocumentStore> = f.store.clone();
    let session = AuthSession::start(client, store, TIMEOUT);

    let state = session.state();
    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.user.unwrap().id, "u3");
}

// =============================================================================
// SIGN-IN / SIGN-OUT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_login_and_logout() {
    let f = fixture();
    let account = f
        .provider
        .sign_up("editor@edif.test", "s3cret-pass", Some("Ed"))
        .unwrap();
    f.profile(&account.uid, UserRole::Editor);
    let (_client, session) = f.pending_session();

    let state = session.login("editor@edif.test", "s3cret-pass").await.unwrap();
    assert!(state.is_authenticated);
    assert_eq!(state.user.unwrap().id, account.uid);

    session.logout();
    let state = session.state();
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_password_keeps_session_signed_out() {
    let f = fixture();
    f.provider
        .sign_up("viewer@edif.test", "s3cret-pass", None)
        .unwrap();
    let (client, session) = f.pending_session();
    client.resolve(None);
    session.wait_until(Duration::from_secs(1), settled).await;

    let err = session
        .login("viewer@edif.test", "wrong-pass")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthErrorCode::WrongPassword)));
    assert_eq!(AuthErrorCode::WrongPassword.message(), "Incorrect password");

    let state = session.state();
    assert!(!state.is_loading);
    assert!(!state.is_authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_email_message() {
    let f = fixture();
    let (_client, session) = f.pending_session();
    let err = session
        .login("nobody@edif.test", "whatever1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthErrorCode::UserNotFound)));
    assert_eq!(
        AuthErrorCode::UserNotFound.message(),
        "No account found with this email"
    );
}
