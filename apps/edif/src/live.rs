//! # Live Collection Subscriptions
//!
//! Every write goes through the [`ChangeBus`]. A [`LiveQuery`] owns one
//! background task that re-runs its query whenever its collection changes
//! and mirrors the result into a `watch` channel of [`LiveState`].
//!
//! Lifecycle:
//! - `enabled = false`: no query runs, `loading = false`, empty data.
//! - start / `set_query`: `loading = true`, `error = None`, then the initial
//!   result.
//! - a change to the collection, or `refetch()`: the query runs again.
//! - failures (store errors, undecodable documents) land in `error` with
//!   `loading = false`; the next change tries again.
//! - dropping the handle stops the task.

use std::sync::Arc;
use std::time::Duration;

use edif_core::content::{
    CompanyStat, ContactInfo, GalleryItem, HeroSection, Product, TeamMember, Testimonial,
};
use edif_core::{Collection, DocumentStore, Preset, Query, QueryOptions, Record};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use edif_core::content::ActivityKind;

// =============================================================================
// CHANGE BUS
// =============================================================================

/// A committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub id: String,
    pub kind: ActivityKind,
}

/// Fan-out of committed writes to live subscriptions.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<Change>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: Change) {
        debug!(collection = %change.collection, id = %change.id, kind = ?change.kind, "change");
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// =============================================================================
// LIVE STATE
// =============================================================================

/// View state mirrored from a live query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState<T> {
    pub data: Vec<Record<T>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Bumped on every settled result, success or failure.
    pub version: u64,
}

impl<T> LiveState<T> {
    fn initial(loading: bool) -> Self {
        Self {
            data: Vec::new(),
            loading,
            error: None,
            version: 0,
        }
    }
}

/// Handle to a running subscription.
pub struct LiveQuery<T> {
    state: watch::Receiver<LiveState<T>>,
    query: watch::Sender<Option<Query>>,
    refetch: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Start a subscription; `None` starts it disabled.
    pub fn spawn(store: Arc<dyn DocumentStore>, bus: &ChangeBus, query: Option<Query>) -> Self {
        let (state_tx, state_rx) = watch::channel(LiveState::initial(query.is_some()));
        let (query_tx, query_rx) = watch::channel(query);
        let refetch = Arc::new(Notify::new());
        // Subscribe before the first fetch so no write can fall in between.
        let changes = bus.subscribe();

        let task = tokio::spawn(run(store, changes, query_rx, refetch.clone(), state_tx));

        Self {
            state: state_rx,
            query: query_tx,
            refetch,
            task,
        }
    }

    /// Start a preset subscription with caller overrides.
    pub fn preset(
        store: Arc<dyn DocumentStore>,
        bus: &ChangeBus,
        preset: Preset,
        options: &QueryOptions,
    ) -> Self {
        let query = options.enabled.then(|| preset.query_with(options));
        Self::spawn(store, bus, query)
    }

    /// Current view state.
    pub fn state(&self) -> LiveState<T> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<LiveState<T>> {
        self.state.clone()
    }

    /// Replace the query; the previous one is torn down. `None` disables.
    pub fn set_query(&self, query: Option<Query>) {
        self.query.send_replace(query);
    }

    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    /// Wait until the state is settled with a version newer than `after`,
    /// or until `timeout` elapses; returns the state either way.
    pub async fn newer_than(&self, after: u64, timeout: Duration) -> LiveState<T> {
        let mut rx = self.state.clone();
        let wait = async {
            loop {
                if is_newer(&rx.borrow_and_update(), after) {
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
}

fn is_newer<T>(state: &LiveState<T>, after: u64) -> bool {
    !state.loading && state.version > after
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<T>(
    store: Arc<dyn DocumentStore>,
    mut changes: broadcast::Receiver<Change>,
    mut query_rx: watch::Receiver<Option<Query>>,
    refetch: Arc<Notify>,
    state_tx: watch::Sender<LiveState<T>>,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    loop {
        let current = query_rx.borrow_and_update().clone();

        let Some(query) = current else {
            state_tx.send_modify(|s| {
                s.data.clear();
                s.loading = false;
                s.error = None;
            });
            if query_rx.changed().await.is_err() {
                return;
            }
            continue;
        };

        state_tx.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        fetch(store.as_ref(), &query, &state_tx);

        loop {
            tokio::select! {
                changed = query_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                () = refetch.notified() => fetch(store.as_ref(), &query, &state_tx),
                msg = changes.recv() => match msg {
                    Ok(change) if change.collection == query.collection => {
                        fetch(store.as_ref(), &query, &state_tx);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(collection = %query.collection, skipped, "live query lagged; re-querying");
                        fetch(store.as_ref(), &query, &state_tx);
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        }
    }
}

fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
    state_tx: &watch::Sender<LiveState<T>>,
) {
    let result = store.query(query).and_then(|docs| {
        docs.iter()
            .map(|d| d.decode::<Record<T>>())
            .collect::<edif_core::Result<Vec<_>>>()
    });

    match result {
        Ok(data) => state_tx.send_modify(|s| {
            s.data = data;
            s.loading = false;
            s.error = None;
            s.version += 1;
        }),
        Err(e) => {
            warn!(collection = %query.collection, error = %e, "live query failed");
            state_tx.send_modify(|s| {
                s.loading = false;
                s.error = Some(e.to_string());
                s.version += 1;
            });
        }
    }
}

// =============================================================================
// SITE VIEWS
// =============================================================================

/// The public site's standing subscriptions, one per preset.
pub struct SiteViews {
    pub products: LiveQuery<Product>,
    pub testimonials: LiveQuery<Testimonial>,
    pub team_members: LiveQuery<TeamMember>,
    pub gallery: LiveQuery<GalleryItem>,
    pub company_stats: LiveQuery<CompanyStat>,
    pub contact_info: LiveQuery<ContactInfo>,
    pub homepage_sections: LiveQuery<HeroSection>,
}

impl SiteViews {
    pub fn spawn(store: Arc<dyn DocumentStore>, bus: &ChangeBus) -> Self {
        let defaults = QueryOptions::default();
        Self {
            products: LiveQuery::preset(store.clone(), bus, Preset::Products, &defaults),
            testimonials: LiveQuery::preset(store.clone(), bus, Preset::Testimonials, &defaults),
            team_members: LiveQuery::preset(store.clone(), bus, Preset::TeamMembers, &defaults),
            gallery: LiveQuery::preset(store.clone(), bus, Preset::Gallery, &defaults),
            company_stats: LiveQuery::preset(store.clone(), bus, Preset::CompanyStats, &defaults),
            contact_info: LiveQuery::preset(store.clone(), bus, Preset::ContactInfo, &defaults),
            homepage_sections: LiveQuery::preset(store, bus, Preset::HomepageSections, &defaults),
        }
    }

    /// Long-poll a preset and render its state as JSON.
    pub async fn poll_json(
        &self,
        preset: Preset,
        after: u64,
        timeout: Duration,
    ) -> serde_json::Result<serde_json::Value> {
        match preset {
            Preset::Products => serde_json::to_value(self.products.newer_than(after, timeout).await),
            Preset::Testimonials => {
                serde_json::to_value(self.testimonials.newer_than(after, timeout).await)
            }
            Preset::TeamMembers => {
                serde_json::to_value(self.team_members.newer_than(after, timeout).await)
            }
            Preset::Gallery => serde_json::to_value(self.gallery.newer_than(after, timeout).await),
            Preset::CompanyStats => {
                serde_json::to_value(self.company_stats.newer_than(after, timeout).await)
            }
            Preset::ContactInfo => {
                serde_json::to_value(self.contact_info.newer_than(after, timeout).await)
            }
            Preset::HomepageSections => {
                serde_json::to_value(self.homepage_sections.newer_than(after, timeout).await)
            }
        }
    }
}
