//! # Identity Provider
//!
//! Email/password accounts behind the [`IdentityProvider`] trait, plus the
//! per-session [`AuthClient`] that tracks who is signed in and notifies
//! listeners.
//!
//! The local provider stores accounts through the core `AccountStore`.
//! Passwords are salted and stretched with SHA-256 and compared in constant
//! time. Sign-in attempts are rate limited per e-mail.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use edif_core::validate::looks_like_email;
use edif_core::{Account, AccountStore, AuthErrorCode, EdifError, ProviderUser, Timestamp};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const HASH_ROUNDS: u32 = 10_000;
const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

pub type ProviderResult<T> = Result<T, AuthErrorCode>;

/// Account operations of an identity provider.
pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> ProviderResult<ProviderUser>;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ProviderResult<ProviderUser>;

    /// `None` leaves a field unchanged.
    fn update_profile(
        &self,
        uid: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ProviderResult<ProviderUser>;

    /// Issue a password-reset token for an existing account.
    fn send_password_reset(&self, email: &str) -> ProviderResult<String>;

    fn confirm_password_reset(&self, token: &str, new_password: &str) -> ProviderResult<()>;

    fn user(&self, uid: &str) -> ProviderResult<Option<ProviderUser>>;

    /// Drop expired bookkeeping (rate-limit buckets, reset tokens).
    fn prune(&self) {}
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

fn new_salt() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

/// Opaque random token (256 bits).
pub fn random_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    URL_SAFE_NO_PAD.encode(digest)
}

fn verify_password(password: &str, account: &Account) -> bool {
    let candidate = hash_password(password, &account.salt);
    candidate
        .as_bytes()
        .ct_eq(account.password_hash.as_bytes())
        .into()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn provider_user(account: &Account) -> ProviderUser {
    ProviderUser {
        uid: account.uid.clone(),
        email: Some(account.email.clone()),
        display_name: account.display_name.clone(),
        photo_url: account.photo_url.clone(),
    }
}

// =============================================================================
// LOCAL PROVIDER
// =============================================================================

#[derive(Debug, Clone)]
struct PendingReset {
    uid: String,
    expires: Instant,
}

/// Provider backed by the local account store.
pub struct LocalIdentity {
    accounts: Arc<dyn AccountStore>,
    limiter: DefaultKeyedRateLimiter<String>,
    resets: Mutex<HashMap<String, PendingReset>>,
}

impl LocalIdentity {
    pub fn new(accounts: Arc<dyn AccountStore>, attempts_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            accounts,
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            resets: Mutex::new(HashMap::new()),
        }
    }

    /// Enable or disable sign-in for an account.
    pub fn set_disabled(&self, uid: &str, disabled: bool) -> ProviderResult<()> {
        let mut account = self.account(uid)?.ok_or(AuthErrorCode::UserNotFound)?;
        account.disabled = disabled;
        self.save(&account)
    }

    fn account(&self, uid: &str) -> ProviderResult<Option<Account>> {
        self.accounts.account(uid).map_err(|e| {
            error!(error = %e, "account lookup failed");
            AuthErrorCode::Other
        })
    }

    fn account_by_email(&self, email: &str) -> ProviderResult<Option<Account>> {
        self.accounts.account_by_email(email).map_err(|e| {
            error!(error = %e, "account lookup failed");
            AuthErrorCode::Other
        })
    }

    fn save(&self, account: &Account) -> ProviderResult<()> {
        self.accounts.put_account(account).map_err(|e| {
            error!(error = %e, "account write failed");
            AuthErrorCode::Other
        })
    }

    fn check_email(email: &str) -> ProviderResult<()> {
        if looks_like_email(email) {
            Ok(())
        } else {
            Err(AuthErrorCode::InvalidEmail)
        }
    }
}

impl IdentityProvider for LocalIdentity {
    fn sign_in(&self, email: &str, password: &str) -> ProviderResult<ProviderUser> {
        let email = normalize_email(email);
        Self::check_email(&email)?;

        if self.limiter.check_key(&email).is_err() {
            warn!(email = %email, "sign-in rate limited");
            return Err(AuthErrorCode::TooManyRequests);
        }

        let account = self
            .account_by_email(&email)?
            .ok_or(AuthErrorCode::UserNotFound)?;
        if account.disabled {
            return Err(AuthErrorCode::UserDisabled);
        }
        if !verify_password(password, &account) {
            return Err(AuthErrorCode::WrongPassword);
        }
        info!(uid = %account.uid, "signed in");
        Ok(provider_user(&account))
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ProviderResult<ProviderUser> {
        let email = normalize_email(email);
        Self::check_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthErrorCode::WeakPassword);
        }
        if self.account_by_email(&email)?.is_some() {
            return Err(AuthErrorCode::EmailAlreadyInUse);
        }

        let salt = new_salt();
        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            password_hash: hash_password(password, &salt),
            salt,
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            photo_url: None,
            disabled: false,
            created_at: Timestamp::now(),
        };
        // The store re-checks the e-mail index in the same write.
        self.accounts.insert_account(&account).map_err(|e| match e {
            EdifError::AlreadyExists { .. } => AuthErrorCode::EmailAlreadyInUse,
            e => {
                error!(error = %e, "account write failed");
                AuthErrorCode::Other
            }
        })?;
        info!(uid = %account.uid, "account created");
        Ok(provider_user(&account))
    }

    fn update_profile(
        &self,
        uid: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ProviderResult<ProviderUser> {
        let mut account = self.account(uid)?.ok_or(AuthErrorCode::UserNotFound)?;
        if let Some(name) = display_name {
            account.display_name = Some(name.to_string());
        }
        if let Some(url) = photo_url {
            account.photo_url = Some(url.to_string());
        }
        self.save(&account)?;
        Ok(provider_user(&account))
    }

    fn send_password_reset(&self, email: &str) -> ProviderResult<String> {
        let email = normalize_email(email);
        Self::check_email(&email)?;
        let account = self
            .account_by_email(&email)?
            .ok_or(AuthErrorCode::UserNotFound)?;

        let token = random_token();
        let mut resets = self.resets.lock().map_err(|_| AuthErrorCode::Other)?;
        let now = Instant::now();
        resets.retain(|_, r| r.expires > now);
        resets.insert(
            token.clone(),
            PendingReset {
                uid: account.uid.clone(),
                expires: now + RESET_TOKEN_TTL,
            },
        );
        debug!(uid = %account.uid, "password reset issued");
        Ok(token)
    }

    fn confirm_password_reset(&self, token: &str, new_password: &str) -> ProviderResult<()> {
        let pending = {
            let mut resets = self.resets.lock().map_err(|_| AuthErrorCode::Other)?;
            resets.remove(token)
        };
        let pending = pending
            .filter(|r| r.expires > Instant::now())
            .ok_or(AuthErrorCode::InvalidActionCode)?;
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthErrorCode::WeakPassword);
        }

        let mut account = self
            .account(&pending.uid)?
            .ok_or(AuthErrorCode::UserNotFound)?;
        account.salt = new_salt();
        account.password_hash = hash_password(new_password, &account.salt);
        self.save(&account)?;
        info!(uid = %account.uid, "password reset");
        Ok(())
    }

    fn user(&self, uid: &str) -> ProviderResult<Option<ProviderUser>> {
        Ok(self.account(uid)?.as_ref().map(provider_user))
    }

    fn prune(&self) {
        self.limiter.retain_recent();
        if let Ok(mut resets) = self.resets.lock() {
            let now = Instant::now();
            resets.retain(|_, r| r.expires > now);
        }
        debug!(limited_keys = self.limiter.len(), "identity state pruned");
    }
}

// =============================================================================
// AUTH CLIENT
// =============================================================================

/// What the provider client knows about the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    /// Persisted state not resolved yet.
    Pending,
    SignedOut,
    SignedIn(ProviderUser),
}

/// Client-side view of one provider session. Every state change is a
/// notification to its listeners.
pub struct AuthClient {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<ProviderState>,
}

impl AuthClient {
    /// A client whose persisted state is not resolved yet.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(ProviderState::Pending);
        Self { provider, state }
    }

    /// A client that starts with its persisted state already resolved.
    pub fn restored(provider: Arc<dyn IdentityProvider>, user: Option<ProviderUser>) -> Self {
        let client = Self::new(provider);
        client.resolve(user);
        client
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn state(&self) -> ProviderState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<ProviderUser> {
        match &*self.state.borrow() {
            ProviderState::SignedIn(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProviderState> {
        self.state.subscribe()
    }

    /// Announce the signed-in user (or none).
    pub fn resolve(&self, user: Option<ProviderUser>) {
        self.state.send_replace(match user {
            Some(user) => ProviderState::SignedIn(user),
            None => ProviderState::SignedOut,
        });
    }

    pub fn sign_in(&self, email: &str, password: &str) -> ProviderResult<ProviderUser> {
        let user = self.provider.sign_in(email, password)?;
        self.resolve(Some(user.clone()));
        Ok(user)
    }

    pub fn sign_out(&self) -> ProviderResult<()> {
        self.resolve(None);
        Ok(())
    }

    /// Update display name / photo of the signed-in user.
    pub fn update_profile(
        &self,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ProviderResult<ProviderUser> {
        let uid = self
            .current_user()
            .map(|u| u.uid)
            .ok_or(AuthErrorCode::UserNotFound)?;
        let user = self.provider.update_profile(&uid, display_name, photo_url)?;
        self.resolve(Some(user.clone()));
        Ok(user)
    }
}

// =============================================================================
// TESTS
// =============================================================================
