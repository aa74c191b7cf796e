//! # EDIF Core
//!
//! The content engine behind the EDIF marketing site and admin panel.
//!
//! This crate is synchronous and network-free. It owns:
//! - the collection catalogue and the document representation,
//! - query evaluation (filters plus one sort key) and subscription presets,
//! - typed content records and form-boundary validation,
//! - the auth domain (roles, profiles, provider error translation),
//! - file validation and naming rules for uploads,
//! - persistence backends (`MemoryStore`, `RedbStore`).
//!
//! Everything asynchronous (change fan-out, live subscriptions, auth sessions,
//! HTTP) lives in the `edif` application crate.

pub mod collection;
pub mod content;
pub mod document;
pub mod error;
pub mod files;
pub mod presets;
pub mod query;
pub mod storage;
pub mod timestamp;
pub mod user;
pub mod validate;

pub use collection::Collection;
pub use content::Record;
pub use document::{Audit, Document, Fields};
pub use error::{EdifError, Result, ValidationErrors};
pub use presets::{Preset, QueryOptions};
pub use query::{Filter, FilterOp, OrderBy, Query, SortDirection};
pub use storage::{Account, AccountStore, DocumentStore, MemoryStore, RedbStore};
pub use timestamp::Timestamp;
pub use user::{AuthErrorCode, ProviderUser, UserProfile, UserRole};
