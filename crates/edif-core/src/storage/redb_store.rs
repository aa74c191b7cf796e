//! redb backend.
//!
//! Layout:
//! - one table per collection, `id -> JSON document`,
//! - `accounts`: `uid -> postcard Account`,
//! - `account_emails`: `email -> uid`.
//!
//! Tables are created lazily on first write; reading a table that does not
//! exist yet yields an empty result.

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
};

use super::{Account, AccountStore, DocumentStore};
use crate::collection::Collection;
use crate::document::Document;
use crate::error::{EdifError, Result};

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
const ACCOUNT_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("account_emails");

fn documents(collection: Collection) -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(collection.as_str())
}

fn encode_doc(doc: &Document) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(doc)?)
}

fn decode_doc(bytes: &[u8]) -> Result<Document> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Disk-backed store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        Ok(Self { db })
    }

    /// Create every table up front so the file is complete after `init`.
    pub fn init_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        for collection in Collection::ALL {
            txn.open_table(documents(collection))?;
        }
        txn.open_table(ACCOUNTS)?;
        txn.open_table(ACCOUNT_EMAILS)?;
        txn.commit()?;
        Ok(())
    }
}

impl DocumentStore for RedbStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(documents(collection)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match table.get(id)? {
            Some(guard) => Ok(Some(decode_doc(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(documents(collection)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut docs = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            docs.push(decode_doc(value.value())?);
        }
        Ok(docs)
    }

    fn insert(&self, collection: Collection, doc: Document) -> Result<()> {
        let bytes = encode_doc(&doc)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(documents(collection))?;
            if table.get(doc.id.as_str())?.is_some() {
                return Err(EdifError::AlreadyExists {
                    collection: collection.to_string(),
                    id: doc.id,
                });
            }
            table.insert(doc.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn put(&self, collection: Collection, doc: Document) -> Result<()> {
        let bytes = encode_doc(&doc)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(documents(collection))?;
            table.insert(doc.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn modify(
        &self,
        collection: Collection,
        id: &str,
        change: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document> {
        // Write transactions are exclusive, so the read below cannot go stale.
        let txn = self.db.begin_write()?;
        let doc = {
            let mut table = txn.open_table(documents(collection))?;
            let mut doc = match table.get(id)? {
                Some(guard) => decode_doc(guard.value())?,
                None => return Err(EdifError::not_found(collection.as_str(), id)),
            };
            change(&mut doc)?;
            let bytes = encode_doc(&doc)?;
            table.insert(id, bytes.as_slice())?;
            doc
        };
        txn.commit()?;
        Ok(doc)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<Document> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(documents(collection))?;
            let removed = table.remove(id)?;
            match removed {
                Some(guard) => decode_doc(guard.value())?,
                None => return Err(EdifError::not_found(collection.as_str(), id)),
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    fn count(&self, collection: Collection) -> Result<usize> {
        let txn = self.db.begin_read()?;
        match txn.open_table(documents(collection)) {
            Ok(table) => Ok(table.len()? as usize),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl AccountStore for RedbStore {
    fn account(&self, uid: &str) -> Result<Option<Account>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ACCOUNTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match table.get(uid)? {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let uid = {
            let txn = self.db.begin_read()?;
            let index = match txn.open_table(ACCOUNT_EMAILS) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            match index.get(email)? {
                Some(guard) => guard.value().to_string(),
                None => return Ok(None),
            }
        };
        self.account(&uid)
    }

    fn insert_account(&self, account: &Account) -> Result<()> {
        let bytes = postcard::to_stdvec(account)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ACCOUNTS)?;
            let mut index = txn.open_table(ACCOUNT_EMAILS)?;
            if table.get(account.uid.as_str())?.is_some()
                || index.get(account.email.as_str())?.is_some()
            {
                return Err(EdifError::AlreadyExists {
                    collection: "accounts".to_string(),
                    id: account.email.clone(),
                });
            }
            table.insert(account.uid.as_str(), bytes.as_slice())?;
            index.insert(account.email.as_str(), account.uid.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        let bytes = postcard::to_stdvec(account)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ACCOUNTS)?;
            let mut index = txn.open_table(ACCOUNT_EMAILS)?;
            let previous = table
                .get(account.uid.as_str())?
                .map(|guard| postcard::from_bytes::<Account>(guard.value()))
                .transpose()?;
            if let Some(previous) = previous
                && previous.email != account.email
            {
                index.remove(previous.email.as_str())?;
            }
            table.insert(account.uid.as_str(), bytes.as_slice())?;
            index.insert(account.email.as_str(), account.uid.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete_account(&self, uid: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(ACCOUNTS)?;
            let mut index = txn.open_table(ACCOUNT_EMAILS)?;
            let removed = table
                .remove(uid)?
                .map(|guard| postcard::from_bytes::<Account>(guard.value()))
                .transpose()?;
            if let Some(account) = &removed {
                index.remove(account.email.as_str())?;
            }
            removed.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ACCOUNTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            out.push(postcard::from_bytes(value.value())?);
        }
        Ok(out)
    }
}
