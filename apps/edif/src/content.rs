//! # Content Service
//!
//! Admin CRUD over the document store: validation at the boundary, audit
//! fields, lifecycle defaults, the activity feed and change publication.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use edif_core::content::{ActivityItem, ActivityKind};
use edif_core::document::{to_fields, strip_reserved};
use edif_core::validate::{apply_create_defaults, validate_fields, validate_record};
use edif_core::{
    Collection, Document, DocumentStore, Fields, OrderBy, Query, Record, Timestamp, UserProfile,
    UserRole,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::live::{Change, ChangeBus};

/// Actor recorded for public form submissions.
pub const PUBLIC_ACTOR: &str = "public";

/// Pagination and filtering for admin list screens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub page: usize,
    pub limit: usize,
    /// Case-insensitive search over the text fields.
    pub q: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            q: None,
            category: None,
            active: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<Value>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_content_items: usize,
    pub active_content_items: usize,
    pub total_users: usize,
    pub sample_requests: usize,
    pub adverse_event_reports: usize,
    pub collections: BTreeMap<String, usize>,
}

/// Fields searched by `ListParams::q`.
const SEARCH_FIELDS: [&str; 9] = [
    "name",
    "title",
    "clientName",
    "company",
    "category",
    "label",
    "value",
    "position",
    "indication",
];

/// Human label of a document for the activity feed.
fn display_name(doc: &Document) -> String {
    ["name", "title", "clientName", "label"]
        .iter()
        .find_map(|f| doc.str_field(f))
        .map(str::to_string)
        .unwrap_or_else(|| doc.id.clone())
}

fn matches_search(doc: &Document, needle: &str) -> bool {
    SEARCH_FIELDS.iter().any(|f| {
        doc.str_field(f)
            .is_some_and(|v| v.to_lowercase().contains(needle))
    })
}

/// Admin-facing content operations.
#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn DocumentStore>,
    bus: ChangeBus,
}

impl ContentService {
    pub fn new(store: Arc<dyn DocumentStore>, bus: ChangeBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn get(&self, collection: Collection, id: &str) -> AppResult<Document> {
        self.store
            .get(collection, id)?
            .ok_or_else(|| AppError::not_found(collection.as_str(), id))
    }

    /// Filtered, searched and paginated listing. Ordered collections sort by
    /// `order`, everything else newest first.
    pub fn list_page(&self, collection: Collection, params: &ListParams) -> AppResult<Page> {
        let mut query = Query::new(collection);
        if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
            query = query.where_eq("category", category);
        }
        if let Some(active) = params.active {
            query = query.where_eq("isActive", active);
        }
        query = if collection.is_ordered() {
            query.order_by(OrderBy::asc("order"))
        } else {
            query.order_by(OrderBy::desc("createdAt"))
        };

        let mut docs = self.store.query(&query)?;
        if let Some(needle) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = needle.to_lowercase();
            docs.retain(|d| matches_search(d, &needle));
        }

        let limit = params.limit.clamp(1, 100);
        let page = params.page.max(1);
        let total = docs.len();
        let data = docs
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(Document::to_json)
            .collect();

        Ok(Page {
            data,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Create a document from an admin submission.
    pub fn create(
        &self,
        collection: Collection,
        fields: Fields,
        actor: &UserProfile,
    ) -> AppResult<Document> {
        self.ensure_editable(collection)?;
        let mut fields = strip_reserved(fields);
        let existing = if collection.is_ordered() {
            self.store.list(collection)?
        } else {
            Vec::new()
        };
        apply_create_defaults(collection, &mut fields, &existing);
        validate_fields(collection, &fields)?;

        let doc = Document::new(
            Uuid::new_v4().to_string(),
            fields,
            &actor.id,
            Timestamp::now(),
        );
        self.store.insert(collection, doc.clone())?;
        info!(collection = %collection, id = %doc.id, actor = %actor.id, "document created");

        self.publish(collection, &doc.id, ActivityKind::Create);
        self.record_activity(ActivityKind::Create, collection, &doc, actor);
        Ok(doc)
    }

    /// Merge `patch` into an existing document; the merged result must
    /// validate.
    pub fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Fields,
        actor: &UserProfile,
    ) -> AppResult<Document> {
        self.ensure_editable(collection)?;
        let now = Timestamp::now();
        let doc = self.store.modify(collection, id, &mut |doc| {
            doc.merge(patch.clone(), &actor.id, now);
            validate_fields(collection, &doc.fields)
        })?;
        info!(collection = %collection, id = %doc.id, actor = %actor.id, "document updated");

        self.publish(collection, id, ActivityKind::Update);
        self.record_activity(ActivityKind::Update, collection, &doc, actor);
        Ok(doc)
    }

    pub fn delete(
        &self,
        collection: Collection,
        id: &str,
        actor: &UserProfile,
    ) -> AppResult<Document> {
        if matches!(collection, Collection::Activity) {
            return Err(AppError::Forbidden(
                "The activity feed is read-only".to_string(),
            ));
        }
        let doc = self.store.delete(collection, id)?;
        info!(collection = %collection, id = %id, actor = %actor.id, "document deleted");

        self.publish(collection, id, ActivityKind::Delete);
        self.record_activity(ActivityKind::Delete, collection, &doc, actor);
        Ok(doc)
    }

    /// Store a public form submission.
    pub fn submit<T: Serialize>(&self, collection: Collection, record: &T) -> AppResult<Document> {
        validate_record(collection, record)?;
        let doc = Document::new(
            Uuid::new_v4().to_string(),
            to_fields(record)?,
            PUBLIC_ACTOR,
            Timestamp::now(),
        );
        self.store.insert(collection, doc.clone())?;
        info!(collection = %collection, id = %doc.id, "form submitted");
        self.publish(collection, &doc.id, ActivityKind::Create);
        Ok(doc)
    }

    /// Change a user's role (admin screen).
    pub fn set_role(&self, uid: &str, role: UserRole, actor: &UserProfile) -> AppResult<Document> {
        let mut patch = Fields::new();
        patch.insert("role".into(), Value::String(role.as_str().to_string()));
        let doc = self
            .store
            .update(Collection::Users, uid, patch, &actor.id, Timestamp::now())?;
        info!(uid = %uid, role = %role, actor = %actor.id, "role changed");

        self.publish(Collection::Users, uid, ActivityKind::Update);
        self.record_activity(ActivityKind::Update, Collection::Users, &doc, actor);
        Ok(doc)
    }

    /// Most recent activity first.
    pub fn recent_activity(&self, limit: usize) -> AppResult<Vec<Record<ActivityItem>>> {
        let query = Query::new(Collection::Activity)
            .order_by(OrderBy::desc("createdAt"))
            .limit(limit.clamp(1, 100));
        self.store
            .query(&query)?
            .iter()
            .map(|d| d.decode().map_err(AppError::from))
            .collect()
    }

    pub fn dashboard_metrics(&self) -> AppResult<DashboardMetrics> {
        let mut collections = BTreeMap::new();
        let mut total_content_items = 0;
        let mut active_content_items = 0;
        for collection in Collection::CONTENT {
            let docs = self.store.list(collection)?;
            total_content_items += docs.len();
            active_content_items += docs
                .iter()
                .filter(|d| d.bool_field("isActive").unwrap_or(true))
                .count();
            collections.insert(collection.to_string(), docs.len());
        }
        Ok(DashboardMetrics {
            total_content_items,
            active_content_items,
            total_users: self.store.count(Collection::Users)?,
            sample_requests: self.store.count(Collection::SampleRequests)?,
            adverse_event_reports: self.store.count(Collection::AdverseEventReports)?,
            collections,
        })
    }

    fn ensure_editable(&self, collection: Collection) -> AppResult<()> {
        if collection.is_content() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} cannot be edited from the admin panel",
                collection
            )))
        }
    }

    /// Append to the activity feed. A failure here never fails the write.
    fn record_activity(
        &self,
        kind: ActivityKind,
        collection: Collection,
        doc: &Document,
        actor: &UserProfile,
    ) {
        let item = ActivityItem {
            kind,
            entity: collection.to_string(),
            entity_id: doc.id.clone(),
            description: format!(
                "{} \"{}\" {}",
                collection.entity_label(),
                display_name(doc),
                kind.verb()
            ),
            user: actor.name.clone(),
            timestamp: Utc::now(),
        };
        let result = to_fields(&item).and_then(|fields| {
            let entry = Document::new(Uuid::new_v4().to_string(), fields, &actor.id, Timestamp::now());
            let id = entry.id.clone();
            self.store.insert(Collection::Activity, entry).map(|()| id)
        });
        match result {
            Ok(id) => self.publish(Collection::Activity, &id, ActivityKind::Create),
            Err(e) => warn!(error = %e, "failed to record activity"),
        }
    }

    fn publish(&self, collection: Collection, id: &str, kind: ActivityKind) {
        self.bus.publish(Change {
            collection,
            id: id.to_string(),
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edif_core::{EdifError, MemoryStore};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn admin() -> UserProfile {
        UserProfile {
            id: "admin-1".into(),
            email: "admin@edif.example".into(),
            name: "Admin".into(),
            role: UserRole::Admin,
            avatar: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn service() -> ContentService {
        ContentService::new(Arc::new(MemoryStore::new()), ChangeBus::default())
    }

    fn product(name: &str) -> Fields {
        fields(json!({
            "name": name,
            "description": "Tablets",
            "category": "Antibiotics",
            "images": ["/files/p.png"],
        }))
    }

    #[test]
    fn create_fills_defaults_and_audit() {
        let svc = service();
        let first = svc.create(Collection::Products, product("A"), &admin()).unwrap();
        let second = svc.create(Collection::Products, product("B"), &admin()).unwrap();

        assert_eq!(first.i64_field("order"), Some(1));
        assert_eq!(second.i64_field("order"), Some(2));
        assert_eq!(first.bool_field("isActive"), Some(true));
        assert_eq!(first.audit.created_by, "admin-1");
        assert_eq!(svc.get(Collection::Products, &first.id).unwrap(), first);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let svc = service();
        let err = svc
            .create(Collection::Products, fields(json!({ "name": "" })), &admin())
            .unwrap_err();
        assert!(matches!(err, AppError::Core(EdifError::Validation(_))));
        assert_eq!(svc.store().count(Collection::Products).unwrap(), 0);
    }

    #[test]
    fn update_merges_and_revalidates() {
        let svc = service();
        let doc = svc.create(Collection::Products, product("A"), &admin()).unwrap();

        let updated = svc
            .update(Collection::Products, &doc.id, fields(json!({ "price": 9.5 })), &admin())
            .unwrap();
        assert_eq!(updated.str_field("name"), Some("A"));

        let err = svc
            .update(Collection::Products, &doc.id, fields(json!({ "images": [] })), &admin())
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        let stored = svc.get(Collection::Products, &doc.id).unwrap();
        assert_eq!(stored.fields["images"], json!(["/files/p.png"]));
    }

    #[test]
    fn concurrent_updates_keep_both_fields() {
        let svc = service();
        let doc = svc.create(Collection::Products, product("A"), &admin()).unwrap();
        let barrier = std::sync::Barrier::new(2);

        std::thread::scope(|scope| {
            for patch in [json!({ "dosage": "500mg" }), json!({ "indication": "Infection" })] {
                let (svc, barrier, id) = (&svc, &barrier, &doc.id);
                scope.spawn(move || {
                    barrier.wait();
                    svc.update(Collection::Products, id, fields(patch), &admin()).unwrap();
                });
            }
        });

        let stored = svc.get(Collection::Products, &doc.id).unwrap();
        assert_eq!(stored.str_field("dosage"), Some("500mg"));
        assert_eq!(stored.str_field("indication"), Some("Infection"));
    }

    #[test]
    fn writes_are_logged_and_published() {
        let svc = service();
        let mut changes = svc.bus().subscribe();
        let doc = svc.create(Collection::Products, product("Amoxicillin"), &admin()).unwrap();
        svc.delete(Collection::Products, &doc.id, &admin()).unwrap();

        let feed = svc.recent_activity(10).unwrap();
        assert_eq!(feed.len(), 2);
        let descriptions: Vec<&str> = feed.iter().map(|a| a.description.as_str()).collect();
        assert!(descriptions.contains(&"Product \"Amoxicillin\" created"));
        assert!(descriptions.contains(&"Product \"Amoxicillin\" deleted"));

        let first = changes.try_recv().unwrap();
        assert_eq!(first.collection, Collection::Products);
        assert_eq!(first.kind, ActivityKind::Create);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let err = service()
            .delete(Collection::Products, "missing", &admin())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn list_page_paginates_and_searches() {
        let svc = service();
        for name in ["Amoxicillin", "Metformin", "Omeprazole", "Amlodipine"] {
            svc.create(Collection::Products, product(name), &admin()).unwrap();
        }

        let page = svc
            .list_page(
                Collection::Products,
                &ListParams {
                    page: 2,
                    limit: 3,
                    ..ListParams::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0]["name"], "Amlodipine");

        let found = svc
            .list_page(
                Collection::Products,
                &ListParams {
                    q: Some("am".into()),
                    ..ListParams::default()
                },
            )
            .unwrap();
        assert_eq!(found.total, 2);
    }

    #[test]
    fn users_and_activity_are_not_editable() {
        let svc = service();
        let err = svc
            .create(Collection::Users, Fields::new(), &admin())
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = svc.delete(Collection::Activity, "x", &admin()).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
