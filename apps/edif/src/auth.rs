//! # Auth-State Reconciliation
//!
//! An [`AuthSession`] turns provider notifications into application auth
//! state `{ user, isAuthenticated, isLoading }`:
//!
//! 1. start in `{ None, false, true }`;
//! 2. a user already known to the client is loaded straight away;
//! 3. a listener task waits for the provider's notifications while a
//!    timeout timer runs. The first notification disarms the timer; if the
//!    timer fires first the state is forced to signed-out, and later
//!    notifications still apply;
//! 4. on sign-in the profile is read from `users/{uid}`; when that fails a
//!    fallback profile is built from the provider user.
//!
//! Dropping the session stops the listener and its timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edif_core::document::to_fields;
use edif_core::{
    Collection, Document, DocumentStore, EdifError, Fields, ProviderUser, Timestamp,
    UserProfile, UserRole,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{AuthClient, IdentityProvider, ProviderState, random_token};

/// Application auth state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl AuthState {
    fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
        }
    }

    fn signed_in(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
        }
    }

    pub fn has_permission(&self, required: UserRole) -> bool {
        edif_core::user::has_permission(self.user.as_ref(), required)
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Read `users/{uid}`.
pub fn load_profile(store: &dyn DocumentStore, uid: &str) -> edif_core::Result<UserProfile> {
    store
        .get(Collection::Users, uid)?
        .ok_or_else(|| EdifError::not_found(Collection::Users.as_str(), uid))?
        .decode()
}

/// Write `users/{uid}`.
pub fn save_profile(store: &dyn DocumentStore, profile: &UserProfile) -> edif_core::Result<()> {
    let fields = to_fields(profile)?;
    let now = Timestamp::now();
    let doc = match store.get(Collection::Users, &profile.id)? {
        Some(mut existing) => {
            existing.merge(fields, &profile.id, now);
            existing
        }
        None => {
            let mut doc = Document::new(profile.id.clone(), fields, &profile.id, now);
            doc.audit.created_at = Timestamp::from(profile.created_at);
            doc
        }
    };
    store.put(Collection::Users, doc)
}

/// Stored profile, or the fallback built from the provider user.
fn profile_or_fallback(store: &dyn DocumentStore, user: &ProviderUser) -> UserProfile {
    match load_profile(store, &user.uid) {
        Ok(profile) => profile,
        Err(e) => {
            if e.is_not_found() {
                info!(uid = %user.uid, "no profile document; using fallback profile");
            } else {
                error!(uid = %user.uid, error = %e, "profile fetch failed; using fallback profile");
            }
            UserProfile::fallback(user, Utc::now())
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One reconciled auth session.
pub struct AuthSession {
    client: Arc<AuthClient>,
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<AuthState>>,
    listener: JoinHandle<()>,
    settle_timeout: Duration,
}

impl AuthSession {
    /// Start reconciling `client` against the profile store.
    pub fn start(
        client: Arc<AuthClient>,
        store: Arc<dyn DocumentStore>,
        timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        let state = Arc::new(state);

        if let Some(user) = client.current_user() {
            match load_profile(store.as_ref(), &user.uid) {
                Ok(profile) => {
                    state.send_replace(AuthState::signed_in(profile));
                }
                Err(e) => warn!(uid = %user.uid, error = %e, "initial profile load failed"),
            }
        }

        let listener = tokio::spawn(listen(
            client.subscribe(),
            store.clone(),
            state.clone(),
            timeout,
        ));

        Self {
            client,
            store,
            state,
            listener,
            settle_timeout: timeout,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    /// Wait until `pred` holds or `timeout` elapses; returns the state
    /// either way.
    pub async fn wait_until(
        &self,
        timeout: Duration,
        pred: impl Fn(&AuthState) -> bool,
    ) -> AuthState {
        let mut rx = self.state.subscribe();
        let wait = async {
            loop {
                if pred(&rx.borrow_and_update()) {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        rx.borrow().clone()
    }

    async fn settle_on(&self, uid: &str) -> AuthState {
        self.wait_until(self.settle_timeout, |s| {
            !s.is_loading && s.user.as_ref().is_some_and(|u| u.id == uid)
        })
        .await
    }

    /// Sign in with e-mail and password.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthState> {
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }

        self.state.send_modify(|s| s.is_loading = true);
        match self.client.sign_in(email, password) {
            Ok(user) => Ok(self.settle_on(&user.uid).await),
            Err(code) => {
                self.state.send_modify(|s| s.is_loading = false);
                Err(AppError::Auth(code))
            }
        }
    }

    /// Create an account and its profile, then sign in as it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> AppResult<AuthState> {
        self.state.send_modify(|s| s.is_loading = true);
        let created = self.client.provider().sign_up(email, password, Some(name));
        let user = match created {
            Ok(user) => user,
            Err(code) => {
                self.state.send_modify(|s| s.is_loading = false);
                return Err(AppError::Auth(code));
            }
        };

        let now = Utc::now();
        let profile = UserProfile {
            id: user.uid.clone(),
            email: user.email.clone().unwrap_or_default(),
            name: name.trim().to_string(),
            role,
            avatar: None,
            created_at: now,
            last_login: Some(now),
        };
        if let Err(e) = save_profile(self.store.as_ref(), &profile) {
            self.state.send_modify(|s| s.is_loading = false);
            return Err(e.into());
        }

        self.client.resolve(Some(user));
        self.state.send_replace(AuthState::signed_in(profile.clone()));
        Ok(self.settle_on(&profile.id).await)
    }

    /// Issue a reset token for `email`.
    pub fn reset_password(&self, email: &str) -> AppResult<String> {
        self.client
            .provider()
            .send_password_reset(email)
            .map_err(AppError::Auth)
    }

    /// Change the signed-in user's display name and/or avatar.
    pub async fn update_profile(
        &self,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> AppResult<UserProfile> {
        let mut profile = self
            .state()
            .user
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;

        // The profile document is written before the client notifies, so
        // the listener reads the new values.
        if let Some(name) = name {
            profile.name = name.trim().to_string();
        }
        if let Some(avatar) = avatar {
            profile.avatar = Some(avatar.to_string());
        }
        let mut patch = Fields::new();
        patch.insert("name".into(), Value::String(profile.name.clone()));
        if let Some(avatar) = &profile.avatar {
            patch.insert("avatar".into(), Value::String(avatar.clone()));
        }
        match self.store.get(Collection::Users, &profile.id)? {
            Some(_) => {
                self.store
                    .update(Collection::Users, &profile.id, patch, &profile.id, Timestamp::now())?;
            }
            None => save_profile(self.store.as_ref(), &profile)?,
        }

        self.client
            .update_profile(name, avatar)
            .map_err(AppError::Auth)?;
        self.state.send_replace(AuthState::signed_in(profile.clone()));
        Ok(profile)
    }

    /// Sign out. Provider errors are logged; the state always ends signed-out.
    pub fn logout(&self) {
        if let Err(code) = self.client.sign_out() {
            error!(code = %code, "sign-out failed");
        }
        self.state.send_replace(AuthState::signed_out());
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Next provider notification. A state already resolved when listening
/// starts counts as the first notification.
async fn next_notification(
    rx: &mut watch::Receiver<ProviderState>,
    first: &mut bool,
) -> Option<ProviderState> {
    if std::mem::take(first) {
        let current = rx.borrow_and_update().clone();
        if current != ProviderState::Pending {
            return Some(current);
        }
    }
    rx.changed().await.ok()?;
    let next = rx.borrow_and_update().clone();
    Some(next)
}

async fn listen(
    mut rx: watch::Receiver<ProviderState>,
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<AuthState>>,
    timeout: Duration,
) {
    let timer = tokio::time::sleep(timeout);
    tokio::pin!(timer);
    let mut timer_armed = true;
    let mut first = true;

    loop {
        tokio::select! {
            () = &mut timer, if timer_armed => {
                timer_armed = false;
                warn!(timeout_secs = timeout.as_secs(), "auth state unresolved; treating as signed out");
                state.send_replace(AuthState::signed_out());
            }
            notification = next_notification(&mut rx, &mut first) => {
                timer_armed = false;
                match notification {
                    None => return,
                    Some(ProviderState::Pending) => {}
                    Some(ProviderState::SignedIn(user)) => {
                        let profile = profile_or_fallback(store.as_ref(), &user);
                        info!(uid = %profile.id, role = %profile.role, "auth state: signed in");
                        state.send_replace(AuthState::signed_in(profile));
                    }
                    Some(ProviderState::SignedOut) => {
                        info!("auth state: signed out");
                        state.send_replace(AuthState::signed_out());
                    }
                }
            }
        }
    }
}

// =============================================================================
// SESSION REGISTRY
// =============================================================================

/// Sessions unused for this long are dropped by default.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(12 * 60 * 60);

/// How often [`SessionRegistry::spawn_sweeper`] prunes by default.
pub const SWEEP_EVERY: Duration = Duration::from_secs(60);

struct SessionEntry {
    session: Arc<AuthSession>,
    last_used: Instant,
}

/// Bearer-token sessions of the admin API. Memory only.
///
/// A session that has not been used for `idle` is treated as gone.
pub struct SessionRegistry {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
    idle: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            timeout,
            idle: DEFAULT_SESSION_IDLE,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// A fresh signed-out session, not yet registered.
    pub fn open(&self) -> Arc<AuthSession> {
        let client = Arc::new(AuthClient::restored(self.provider.clone(), None));
        Arc::new(AuthSession::start(client, self.store.clone(), self.timeout))
    }

    /// Register a session and return its bearer token.
    pub async fn insert(&self, session: Arc<AuthSession>) -> String {
        let token = random_token();
        let entry = SessionEntry {
            session,
            last_used: Instant::now(),
        };
        self.sessions.write().await.insert(token.clone(), entry);
        token
    }

    /// Look up a live session and mark it used.
    pub async fn get(&self, token: &str) -> Option<Arc<AuthSession>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(token)?;
        if now.duration_since(entry.last_used) > self.idle {
            sessions.remove(token);
            return None;
        }
        entry.last_used = now;
        Some(entry.session.clone())
    }

    pub async fn remove(&self, token: &str) -> Option<Arc<AuthSession>> {
        self.sessions
            .write()
            .await
            .remove(token)
            .map(|entry| entry.session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop idle sessions and expired provider state. Returns how many
    /// sessions were removed.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, entry| now.duration_since(entry.last_used) <= self.idle);
            before - sessions.len()
        };
        self.provider.prune();
        if removed > 0 {
            info!(removed, "idle sessions pruned");
        }
        removed
    }

    /// Prune every `every` until the registry is dropped.
    pub fn spawn_sweeper(registry: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(registry) = registry.upgrade() else {
                    debug!("session registry dropped, sweeper exiting");
                    return;
                };
                registry.prune().await;
            }
        })
    }
}
