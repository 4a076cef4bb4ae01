//! Database utilities for SQLite storage.

use nostr::{PublicKey, Timestamp};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{OptionalExtension, Result as SqliteResult, Transaction, params};

/// Wrapper for [`PublicKey`] to implement rusqlite traits
///
/// Stored as the 32-byte x-only key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyBlob(pub PublicKey);

impl From<PublicKey> for PublicKeyBlob {
    fn from(key: PublicKey) -> Self {
        PublicKeyBlob(key)
    }
}

impl From<PublicKeyBlob> for PublicKey {
    fn from(blob: PublicKeyBlob) -> Self {
        blob.0
    }
}

impl ToSql for PublicKeyBlob {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_bytes().to_vec()))
    }
}

impl FromSql for PublicKeyBlob {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Blob(blob) => {
                if blob.len() != 32 {
                    return Err(FromSqlError::InvalidBlobSize {
                        expected_size: 32,
                        blob_size: blob.len(),
                    });
                }
                PublicKey::from_slice(blob)
                    .map(PublicKeyBlob)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Convert a stored unix timestamp column into a [`Timestamp`]
pub fn timestamp_from_column(value: Option<i64>) -> Option<Timestamp> {
    value.map(|secs| Timestamp::from(secs.max(0) as u64))
}

/// Convert a [`Timestamp`] into its stored column value
pub fn timestamp_to_column(value: Option<Timestamp>) -> Option<i64> {
    value.map(|ts| ts.as_secs() as i64)
}

/// Insert a user if absent and return its row id
pub fn ensure_user(tx: &Transaction<'_>, public_key: &PublicKey) -> SqliteResult<i64> {
    tx.execute(
        "INSERT OR IGNORE INTO users (public_key) VALUES (?)",
        params![PublicKeyBlob(*public_key)],
    )?;
    tx.query_row(
        "SELECT id FROM users WHERE public_key = ?",
        params![PublicKeyBlob(*public_key)],
        |row| row.get(0),
    )
}

/// Row id of an existing user
pub fn user_id(tx: &Transaction<'_>, public_key: &PublicKey) -> SqliteResult<Option<i64>> {
    tx.query_row(
        "SELECT id FROM users WHERE public_key = ?",
        params![PublicKeyBlob(*public_key)],
        |row| row.get(0),
    )
    .optional()
}
