//! # CLI Commands
//!
//! `edif serve | init | seed | create-user | disable-user | status`. Every
//! command except `serve` works directly on a redb database file.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use edif_core::{
    AccountStore, AuthErrorCode, Collection, DocumentStore, MemoryStore, RedbStore, UserProfile,
    UserRole,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{AppState, build_router};
use crate::auth::save_profile;
use crate::config::{Backend, ServerConfig};
use crate::content::ContentService;
use crate::error::AppError;
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::live::ChangeBus;
use crate::seed::seed;

pub type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "edif")]
#[command(about = "EDIF marketing site and content admin server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the web server
    Serve(ServeArgs),
    /// Create an empty database with every table
    Init {
        #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
        database: PathBuf,
        /// Replace an existing database file
        #[arg(long)]
        force: bool,
    },
    /// Load sample content into empty collections
    Seed {
        #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
        database: PathBuf,
    },
    /// Create an account and its profile
    CreateUser {
        #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
        database: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        /// admin, editor or viewer
        #[arg(long, default_value = "admin")]
        role: UserRole,
    },
    /// Block or restore sign-in for an account
    DisableUser {
        #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
        database: PathBuf,
        #[arg(long)]
        email: String,
        /// Re-enable instead of disabling
        #[arg(long)]
        enable: bool,
    },
    /// Show document counts per collection
    Status {
        #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
        database: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Server flags, each with an `EDIF_*` environment fallback.
#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "EDIF_HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "EDIF_PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(long, env = "EDIF_DATABASE", default_value = "edif.redb")]
    pub database: PathBuf,
    #[arg(long, env = "EDIF_BACKEND", value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,
    /// Root directory of uploaded files
    #[arg(long, env = "EDIF_UPLOADS", default_value = "uploads")]
    pub uploads: PathBuf,
    /// Base URL used in download links
    #[arg(long, env = "EDIF_PUBLIC_URL")]
    pub public_url: Option<String>,
    #[arg(long, env = "EDIF_AUTH_TIMEOUT_SECS", default_value_t = 10)]
    pub auth_timeout_secs: u64,
    /// Drop admin sessions unused for this many seconds
    #[arg(long, env = "EDIF_SESSION_IDLE_SECS", default_value_t = 12 * 60 * 60)]
    pub session_idle_secs: u64,
    #[arg(long, env = "EDIF_LOGIN_ATTEMPTS_PER_MINUTE", default_value_t = 5)]
    pub login_attempts_per_minute: u32,
    #[arg(long, env = "EDIF_MAX_UPLOAD_MB", default_value_t = edif_core::files::DEFAULT_MAX_MB)]
    pub max_upload_mb: u64,
    /// Allowed CORS origin for the admin API
    #[arg(long, env = "EDIF_CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            database: self.database,
            backend: self.backend,
            uploads: self.uploads,
            public_url: self.public_url,
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            session_idle: Duration::from_secs(self.session_idle_secs),
            login_attempts_per_minute: self.login_attempts_per_minute,
            max_upload_mb: self.max_upload_mb,
            cors_origin: self.cors_origin,
            ..ServerConfig::default()
        }
    }
}

// =============================================================================
// STORES
// =============================================================================

type Stores = (Arc<dyn DocumentStore>, Arc<dyn AccountStore>);

/// Open the configured backend.
pub fn open_stores(backend: Backend, database: &Path) -> CliResult<Stores> {
    match backend {
        Backend::Memory => {
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
        Backend::Redb => {
            let store = Arc::new(RedbStore::open(database)?);
            store.init_tables()?;
            Ok((store.clone(), store))
        }
    }
}

/// Open an existing redb database; missing files are an error.
fn open_existing(database: &Path) -> CliResult<Arc<RedbStore>> {
    if !database.exists() {
        return Err(format!(
            "database {} does not exist; run `edif init` first",
            database.display()
        )
        .into());
    }
    Ok(Arc::new(RedbStore::open(database)?))
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create a database file with every table.
pub fn cmd_init(database: &Path, force: bool) -> CliResult<()> {
    if database.exists() {
        if !force {
            return Err(format!(
                "database {} already exists (use --force to replace it)",
                database.display()
            )
            .into());
        }
        std::fs::remove_file(database)?;
    }
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = RedbStore::open(database)?;
    store.init_tables()?;
    info!(path = %database.display(), "database initialised");
    println!("Initialised {}", database.display());
    Ok(())
}

/// Seed sample content; returns the number of documents created.
pub fn cmd_seed(database: &Path) -> CliResult<usize> {
    let store = open_existing(database)?;
    store.init_tables()?;
    let content = ContentService::new(store, ChangeBus::default());
    let created = seed(&content)?;
    println!("Created {created} documents");
    Ok(created)
}

/// Create an account plus its `users` profile.
pub fn cmd_create_user(
    database: &Path,
    email: &str,
    password: &str,
    name: &str,
    role: UserRole,
) -> CliResult<UserProfile> {
    let store = open_existing(database)?;
    store.init_tables()?;
    let provider = LocalIdentity::new(store.clone(), 5);
    let user = provider
        .sign_up(email, password, Some(name))
        .map_err(AppError::Auth)?;

    let profile = UserProfile {
        id: user.uid,
        email: user.email.unwrap_or_default(),
        name: name.trim().to_string(),
        role,
        avatar: None,
        created_at: Utc::now(),
        last_login: None,
    };
    save_profile(store.as_ref(), &profile)?;
    info!(uid = %profile.id, role = %role, "user created");
    println!("Created {} ({}) as {}", profile.email, profile.id, role);
    Ok(profile)
}

/// Set the disabled flag of the account registered under `email`.
/// Returns its uid.
pub fn cmd_disable_user(database: &Path, email: &str, disabled: bool) -> CliResult<String> {
    let store = open_existing(database)?;
    let email = email.trim().to_lowercase();
    let account = store
        .account_by_email(&email)?
        .ok_or(AppError::Auth(AuthErrorCode::UserNotFound))?;
    LocalIdentity::new(store.clone(), 5)
        .set_disabled(&account.uid, disabled)
        .map_err(AppError::Auth)?;

    let verb = if disabled { "disabled" } else { "enabled" };
    info!(uid = %account.uid, disabled, "account flag updated");
    println!("{verb} {email} ({})", account.uid);
    Ok(account.uid)
}

/// Print per-collection document counts.
pub fn cmd_status(database: &Path, json_output: bool) -> CliResult<()> {
    let store = open_existing(database)?;
    let mut counts = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        counts.push((collection, store.count(collection)?));
    }
    let accounts = store.accounts()?.len();

    if json_output {
        let collections: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(c, n)| (c.to_string(), json!(n)))
            .collect();
        let report = json!({
            "database": database.display().to_string(),
            "accounts": accounts,
            "collections": collections,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Database: {}", database.display());
        println!("Accounts: {accounts}");
        for (collection, count) in counts {
            println!("  {:<24} {}", collection.as_str(), count);
        }
    }
    Ok(())
}

/// Run the HTTP server until SIGINT/SIGTERM.
pub async fn cmd_serve(config: ServerConfig) -> CliResult<()> {
    let (store, accounts) = open_stores(config.backend, &config.database)?;
    tokio::fs::create_dir_all(&config.uploads).await?;

    let addr = config.bind_addr();
    let state = AppState::new(config, store, accounts);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("edif shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
