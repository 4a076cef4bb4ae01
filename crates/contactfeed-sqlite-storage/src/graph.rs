//! Implementation of the GraphStorage trait for SQLite storage.

use std::collections::BTreeSet;

use contactfeed_storage_traits::{
    Backend, ContactDelta, GraphStorage, GraphStorageError, UserRecord,
};
use nostr::PublicKey;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::ContactfeedSqliteStorage;
use crate::db::{self, PublicKeyBlob};

#[inline]
fn into_storage_err<T>(e: T) -> GraphStorageError
where
    T: std::error::Error,
{
    GraphStorageError::Database(e.to_string())
}

fn load_contacts(conn: &Connection, owner_id: i64) -> Result<BTreeSet<PublicKey>, GraphStorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT u.public_key FROM contacts c
             JOIN users u ON u.id = c.contact_id
             WHERE c.owner_id = ?",
        )
        .map_err(into_storage_err)?;

    let rows = stmt
        .query_map(params![owner_id], |row| row.get::<_, PublicKeyBlob>(0))
        .map_err(into_storage_err)?;

    let mut contacts = BTreeSet::new();
    for row in rows {
        match row {
            Ok(blob) => {
                contacts.insert(blob.into());
            }
            Err(e) => {
                tracing::warn!(error = %e, owner_id, "Failed to decode contact row, skipping");
            }
        }
    }
    Ok(contacts)
}

impl GraphStorage for ContactfeedSqliteStorage {
    fn backend(&self) -> Backend {
        Backend::SQLite
    }

    fn find_user(&self, public_key: &PublicKey) -> Result<Option<UserRecord>, GraphStorageError> {
        self.with_connection(|conn| {
            let row: Option<(i64, Option<i64>)> = conn
                .query_row(
                    "SELECT id, contacts_updated_at FROM users WHERE public_key = ?",
                    params![PublicKeyBlob(*public_key)],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(into_storage_err)?;

            let Some((id, contacts_updated_at)) = row else {
                return Ok(None);
            };

            Ok(Some(UserRecord {
                public_key: *public_key,
                contacts: load_contacts(conn, id)?,
                contacts_updated_at: db::timestamp_from_column(contacts_updated_at),
            }))
        })
    }

    fn add_user(&self, public_key: &PublicKey) -> Result<bool, GraphStorageError> {
        self.with_connection(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO users (public_key) VALUES (?)",
                    params![PublicKeyBlob(*public_key)],
                )
                .map_err(into_storage_err)?;
            Ok(inserted == 1)
        })
    }

    fn contacts_of(
        &self,
        public_key: &PublicKey,
    ) -> Result<BTreeSet<PublicKey>, GraphStorageError> {
        self.with_connection(|conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE public_key = ?",
                    params![PublicKeyBlob(*public_key)],
                    |row| row.get(0),
                )
                .optional()
                .map_err(into_storage_err)?;

            match id {
                Some(id) => load_contacts(conn, id),
                None => Ok(BTreeSet::new()),
            }
        })
    }

    fn apply_contact_delta(&self, delta: &ContactDelta) -> Result<(), GraphStorageError> {
        delta.validate()?;

        self.with_connection(|conn| {
            // Dropping the transaction without commit rolls every statement back
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(into_storage_err)?;

            let owner_id = db::ensure_user(&tx, &delta.owner).map_err(into_storage_err)?;

            for contact in &delta.to_add {
                let contact_id = db::ensure_user(&tx, contact).map_err(into_storage_err)?;
                tx.execute(
                    "INSERT OR IGNORE INTO contacts (owner_id, contact_id) VALUES (?, ?)",
                    params![owner_id, contact_id],
                )
                .map_err(into_storage_err)?;
            }

            for contact in &delta.to_remove {
                let Some(contact_id) = db::user_id(&tx, contact).map_err(into_storage_err)? else {
                    continue;
                };
                tx.execute(
                    "DELETE FROM contacts WHERE owner_id = ? AND contact_id = ?",
                    params![owner_id, contact_id],
                )
                .map_err(into_storage_err)?;
            }

            // Counted inside the transaction so an oversized delta rolls back
            let count: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM contacts WHERE owner_id = ?",
                    params![owner_id],
                    |row| row.get(0),
                )
                .map_err(into_storage_err)?;
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            if count > self.max_contacts_per_user {
                return Err(GraphStorageError::InvalidParameters(format!(
                    "Contact count exceeds maximum of {} (got {})",
                    self.max_contacts_per_user, count
                )));
            }

            if let Some(updated_at) = db::timestamp_to_column(delta.updated_at) {
                tx.execute(
                    "UPDATE users SET contacts_updated_at = ? WHERE id = ?",
                    params![updated_at, owner_id],
                )
                .map_err(into_storage_err)?;
            }

            tx.commit().map_err(into_storage_err)
        })
    }

    fn user_count(&self) -> Result<usize, GraphStorageError> {
        self.with_connection(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                .map_err(into_storage_err)?;
            Ok(count as usize)
        })
    }
}
