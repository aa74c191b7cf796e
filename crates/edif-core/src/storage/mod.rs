//! # Storage Module
//!
//! Persistence backends for documents and identity accounts.
//!
//! - [`MemoryStore`]: `RwLock`-guarded maps, for tests and ephemeral runs.
//! - [`RedbStore`]: redb embedded database (ACID transactions, crash safety,
//!   concurrent readers with a single writer). One table per collection holds
//!   JSON-encoded documents; accounts are postcard-encoded.
//!
//! Both iterate documents in id order, which the query engine relies on for
//! deterministic tie-breaking.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::document::{Document, Fields};
use crate::error::{EdifError, Result};
use crate::query::Query;
use crate::timestamp::Timestamp;

/// Document persistence, keyed by collection and id.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Every document of a collection, in id order.
    fn list(&self, collection: Collection) -> Result<Vec<Document>>;

    /// Store a new document; `AlreadyExists` when the id is taken.
    fn insert(&self, collection: Collection, doc: Document) -> Result<()>;

    /// Create or overwrite.
    fn put(&self, collection: Collection, doc: Document) -> Result<()>;

    /// Remove and return a document; `NotFound` when absent.
    fn delete(&self, collection: Collection, id: &str) -> Result<Document>;

    /// Read, change and write back one document as a single step.
    ///
    /// Concurrent modifications of the same document are serialised. When
    /// `change` fails nothing is written. `NotFound` when absent.
    fn modify(
        &self,
        collection: Collection,
        id: &str,
        change: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document>;

    /// Field-level merge into an existing document.
    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Fields,
        actor: &str,
        now: Timestamp,
    ) -> Result<Document> {
        self.modify(collection, id, &mut |doc| {
            doc.merge(patch.clone(), actor, now);
            Ok(())
        })
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>> {
        query.validate()?;
        Ok(query.execute(self.list(query.collection)?))
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.list(collection)?.len())
    }
}

/// Identity-provider account.
///
/// Stored with postcard, so every field is always serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    /// Lower-cased.
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub created_at: Timestamp,
}

/// Account persistence with an e-mail index.
pub trait AccountStore: Send + Sync {
    fn account(&self, uid: &str) -> Result<Option<Account>>;

    fn account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Store a new account; `AlreadyExists` when the uid or e-mail is taken.
    fn insert_account(&self, account: &Account) -> Result<()>;

    /// Create or overwrite; keeps the e-mail index in step.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// `true` when an account was removed.
    fn delete_account(&self, uid: &str) -> Result<bool>;

    fn accounts(&self) -> Result<Vec<Account>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, FilterOp, OrderBy};
    use serde_json::{Value, json};
    use std::sync::Barrier;
    use std::thread;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn account(uid: &str, email: &str) -> Account {
        Account {
            uid: uid.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            salt: "salt".to_string(),
            display_name: None,
            photo_url: None,
            disabled: false,
            created_at: Timestamp::from_millis(10),
        }
    }

    /// Behaviour shared by every backend.
    fn exercise_documents(store: &dyn DocumentStore) {
        let c = Collection::Products;
        for (id, order) in [("b", 2), ("a", 1), ("c", 3)] {
            let doc = Document::new(
                id,
                fields(json!({ "name": id, "order": order, "isActive": order != 2 })),
                "admin",
                Timestamp::from_millis(order),
            );
            store.insert(c, doc).unwrap();
        }

        let dup = Document::new("a", Fields::new(), "admin", Timestamp::EPOCH);
        assert!(matches!(
            store.insert(c, dup),
            Err(EdifError::AlreadyExists { .. })
        ));

        let ids: Vec<String> = store.list(c).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(store.count(c).unwrap(), 3);
        assert_eq!(store.count(Collection::Gallery).unwrap(), 0);

        let query = Query::new(c)
            .where_eq("isActive", true)
            .order_by(OrderBy::desc("order"));
        let ids: Vec<String> = store.query(&query).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["c", "a"]);

        let updated = store
            .update(c, "b", fields(json!({ "order": 9 })), "editor", Timestamp::from_millis(99))
            .unwrap();
        assert_eq!(updated.i64_field("order"), Some(9));
        assert_eq!(updated.str_field("name"), Some("b"));
        let reread = store.get(c, "b").unwrap().unwrap();
        assert_eq!(reread.audit.updated_by, "editor");
        assert_eq!(reread.audit.created_by, "admin");

        assert!(
            store
                .update(c, "zz", Fields::new(), "editor", Timestamp::EPOCH)
                .unwrap_err()
                .is_not_found()
        );

        let err = store
            .modify(c, "b", &mut |doc| {
                doc.fields.insert("order".to_string(), json!(0));
                Err(EdifError::Storage("rejected".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, EdifError::Storage(_)));
        assert_eq!(store.get(c, "b").unwrap().unwrap().i64_field("order"), Some(9));
        assert!(
            store
                .modify(c, "zz", &mut |_| Ok(()))
                .unwrap_err()
                .is_not_found()
        );

        let removed = store.delete(c, "a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(store.get(c, "a").unwrap().is_none());
        assert!(store.delete(c, "a").unwrap_err().is_not_found());

        let bad = Query::new(c).filter(Filter::new("", FilterOp::Eq, 1));
        assert!(matches!(store.query(&bad), Err(EdifError::InvalidQuery(_))));
    }

    fn exercise_accounts(store: &dyn AccountStore) {
        store.insert_account(&account("u1", "qa@edif.example")).unwrap();
        store.put_account(&account("u2", "ops@edif.example")).unwrap();

        assert!(matches!(
            store.insert_account(&account("u3", "qa@edif.example")),
            Err(EdifError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.insert_account(&account("u2", "new@edif.example")),
            Err(EdifError::AlreadyExists { .. })
        ));
        assert!(store.account("u3").unwrap().is_none());
        assert!(store.account_by_email("new@edif.example").unwrap().is_none());

        assert_eq!(
            store.account_by_email("qa@edif.example").unwrap().map(|a| a.uid),
            Some("u1".to_string())
        );

        let mut moved = account("u1", "lead@edif.example");
        moved.display_name = Some("Lead".to_string());
        store.put_account(&moved).unwrap();
        assert!(store.account_by_email("qa@edif.example").unwrap().is_none());
        assert_eq!(store.account("u1").unwrap(), Some(moved));

        assert_eq!(store.accounts().unwrap().len(), 2);
        assert!(store.delete_account("u2").unwrap());
        assert!(!store.delete_account("u2").unwrap());
        assert!(store.account_by_email("ops@edif.example").unwrap().is_none());
    }

    /// Two writers patching different fields of one document at once.
    fn exercise_concurrent_updates(store: &dyn DocumentStore) {
        let c = Collection::Testimonials;
        for round in 0..20 {
            let id = format!("t{round}");
            let doc = Document::new(&id, fields(json!({ "rating": 5 })), "admin", Timestamp::EPOCH);
            store.insert(c, doc).unwrap();

            let barrier = Barrier::new(2);
            thread::scope(|scope| {
                for (key, value) in [("clientName", "Ada"), ("company", "Clinic")] {
                    let (barrier, id) = (&barrier, &id);
                    scope.spawn(move || {
                        barrier.wait();
                        store
                            .update(c, id, fields(json!({ key: value })), key, Timestamp::from_millis(5))
                            .unwrap();
                    });
                }
            });

            let doc = store.get(c, &id).unwrap().unwrap();
            assert_eq!(doc.str_field("clientName"), Some("Ada"), "round {round}");
            assert_eq!(doc.str_field("company"), Some("Clinic"), "round {round}");
            assert_eq!(doc.i64_field("rating"), Some(5));
        }
    }

    /// Two sign-ups racing for the same e-mail.
    fn exercise_concurrent_account_inserts(store: &dyn AccountStore) {
        for round in 0..20 {
            let email = format!("race{round}@edif.example");
            let barrier = Barrier::new(2);
            let created: Vec<bool> = thread::scope(|scope| {
                let handles: Vec<_> = ["left", "right"]
                    .into_iter()
                    .map(|side| {
                        let (barrier, email) = (&barrier, &email);
                        scope.spawn(move || {
                            barrier.wait();
                            store
                                .insert_account(&account(&format!("{side}{round}"), email))
                                .is_ok()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert_eq!(created.iter().filter(|ok| **ok).count(), 1, "round {round}");
        }
    }

    #[test]
    fn memory_store_contract() {
        let store = MemoryStore::new();
        exercise_documents(&store);
        exercise_accounts(&store);
    }

    #[test]
    fn memory_store_serialises_writers() {
        let store = MemoryStore::new();
        exercise_concurrent_updates(&store);
        exercise_concurrent_account_inserts(&store);
    }

    #[test]
    fn redb_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("edif.redb")).unwrap();
        exercise_documents(&store);
        exercise_accounts(&store);
    }

    #[test]
    fn redb_store_serialises_writers() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("edif.redb")).unwrap();
        exercise_concurrent_updates(&store);
        exercise_concurrent_account_inserts(&store);
    }

    #[test]
    fn redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edif.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            let doc = Document::new(
                "s1",
                fields(json!({ "title": "Countries", "value": "40+" })),
                "admin",
                Timestamp::from_millis(1_234),
            );
            store.insert(Collection::CompanyStats, doc).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        let doc = store.get(Collection::CompanyStats, "s1").unwrap().unwrap();
        assert_eq!(doc.str_field("value"), Some("40+"));
        assert_eq!(doc.audit.created_at, Timestamp::from_millis(1_234));
    }
}
