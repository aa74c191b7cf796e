//! In-memory backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Account, AccountStore, DocumentStore};
use crate::collection::Collection;
use crate::document::Document;
use crate::error::{EdifError, Result};

type Collections = HashMap<Collection, BTreeMap<String, Document>>;

#[derive(Debug, Default)]
struct Accounts {
    by_uid: BTreeMap<String, Account>,
    by_email: HashMap<String, String>,
}

/// Volatile store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Collections>,
    accounts: RwLock<Accounts>,
}

fn poisoned() -> EdifError {
    EdifError::Storage("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_docs(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.docs.read().map_err(|_| poisoned())
    }

    fn write_docs(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.docs.write().map_err(|_| poisoned())
    }

    fn read_accounts(&self) -> Result<RwLockReadGuard<'_, Accounts>> {
        self.accounts.read().map_err(|_| poisoned())
    }

    fn write_accounts(&self) -> Result<RwLockWriteGuard<'_, Accounts>> {
        self.accounts.write().map_err(|_| poisoned())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read_docs()?
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        Ok(self
            .read_docs()?
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn insert(&self, collection: Collection, doc: Document) -> Result<()> {
        let mut guard = self.write_docs()?;
        let docs = guard.entry(collection).or_default();
        if docs.contains_key(&doc.id) {
            return Err(EdifError::AlreadyExists {
                collection: collection.to_string(),
                id: doc.id,
            });
        }
        docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    fn put(&self, collection: Collection, doc: Document) -> Result<()> {
        self.write_docs()?
            .entry(collection)
            .or_default()
            .insert(doc.id.clone(), doc);
        Ok(())
    }

    fn modify(
        &self,
        collection: Collection,
        id: &str,
        change: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document> {
        let mut guard = self.write_docs()?;
        let stored = guard
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| EdifError::not_found(collection.as_str(), id))?;
        let mut doc = stored.clone();
        change(&mut doc)?;
        *stored = doc.clone();
        Ok(doc)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<Document> {
        self.write_docs()?
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .ok_or_else(|| EdifError::not_found(collection.as_str(), id))
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self
            .read_docs()?
            .get(&collection)
            .map_or(0, BTreeMap::len))
    }
}

impl AccountStore for MemoryStore {
    fn account(&self, uid: &str) -> Result<Option<Account>> {
        Ok(self.read_accounts()?.by_uid.get(uid).cloned())
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let guard = self.read_accounts()?;
        Ok(guard
            .by_email
            .get(email)
            .and_then(|uid| guard.by_uid.get(uid))
            .cloned())
    }

    fn insert_account(&self, account: &Account) -> Result<()> {
        let mut guard = self.write_accounts()?;
        if guard.by_uid.contains_key(&account.uid) || guard.by_email.contains_key(&account.email) {
            return Err(EdifError::AlreadyExists {
                collection: "accounts".to_string(),
                id: account.email.clone(),
            });
        }
        guard
            .by_email
            .insert(account.email.clone(), account.uid.clone());
        guard.by_uid.insert(account.uid.clone(), account.clone());
        Ok(())
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        let mut guard = self.write_accounts()?;
        if let Some(previous) = guard.by_uid.get(&account.uid).map(|a| a.email.clone())
            && previous != account.email
        {
            guard.by_email.remove(&previous);
        }
        guard
            .by_email
            .insert(account.email.clone(), account.uid.clone());
        guard.by_uid.insert(account.uid.clone(), account.clone());
        Ok(())
    }

    fn delete_account(&self, uid: &str) -> Result<bool> {
        let mut guard = self.write_accounts()?;
        match guard.by_uid.remove(uid) {
            Some(account) => {
                guard.by_email.remove(&account.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.read_accounts()?.by_uid.values().cloned().collect())
    }
}
