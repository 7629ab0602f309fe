#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use safetrip_kernel_contracts::alert::{
    AlertId, AlertQuery, AlertRecord, NewAlert, ALERT_CONTRACT_VERSION,
};
use safetrip_kernel_contracts::issuance::{
    IssuanceId, IssuanceKey, IssuanceRecord, NewIssuance, ISSUANCE_CONTRACT_VERSION,
};
use safetrip_kernel_contracts::location::GpsPing;
use safetrip_kernel_contracts::user::{EmailAddress, UserId, UserRecord, USER_CONTRACT_VERSION};
use safetrip_kernel_contracts::SchemaVersion;

use crate::repo::{AlertRepo, CredentialRepo, IssuanceRepo, LocationLogRepo};
use crate::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    schema_version INTEGER NOT NULL,
    doc TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS alerts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    schema_version INTEGER NOT NULL,
    doc TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS alerts_by_user_created
    ON alerts (user_id, created_at_us DESC, seq DESC);
CREATE TABLE IF NOT EXISTS issuances (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    issuance_key TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    token_id INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL,
    schema_version INTEGER NOT NULL,
    doc TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS issuances_by_user ON issuances (user_id, created_at_us DESC);
CREATE TABLE IF NOT EXISTS gps_pings (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    doc TEXT NOT NULL
);
";

/// Document store on SQLite: each record is kept as a JSON document next to
/// the handful of columns that queries filter and sort on. A single
/// connection behind a mutex serialises every reader and writer.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn version(v: SchemaVersion) -> i64 {
    i64::from(v.0)
}

fn decode<T: serde::de::DeserializeOwned>(docs: Vec<String>) -> Result<Vec<T>, StorageError> {
    docs.iter()
        .map(|d| serde_json::from_str(d).map_err(StorageError::from))
        .collect()
}

impl DocumentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened document store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned { table: "document_store" })
    }
}

impl CredentialRepo for DocumentStore {
    fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError> {
        let doc = serde_json::to_string(&record)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, email, schema_version, doc) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.as_str(),
                record.email.as_str(),
                version(USER_CONTRACT_VERSION),
                doc
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateKey {
                    table: "users.email",
                    key: record.email.as_str().to_string(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn user_row_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, StorageError> {
        let conn = self.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM users WHERE email = ?1",
                params![email.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(StorageError::from))
            .transpose()
    }
}

impl AlertRepo for DocumentStore {
    fn insert_alert_row(&self, new: NewAlert) -> Result<AlertRecord, StorageError> {
        let record = AlertRecord::from_new(AlertId::generate(), new)?;
        let doc = serde_json::to_string(&record)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO alerts (id, user_id, severity, created_at_us, schema_version, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.as_str(),
                record.user_id.as_str(),
                record.severity.as_str(),
                micros(record.created_at),
                version(ALERT_CONTRACT_VERSION),
                doc
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateKey {
                    table: "alerts",
                    key: record.id.to_string(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(record)
    }

    fn alert_row(&self, alert_id: &AlertId) -> Result<Option<AlertRecord>, StorageError> {
        let conn = self.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM alerts WHERE id = ?1",
                params![alert_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(StorageError::from))
            .transpose()
    }

    fn acknowledge_alert_row(
        &self,
        alert_id: &AlertId,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError> {
        let conn = self.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM alerts WHERE id = ?1 AND user_id = ?2",
                params![alert_id.as_str(), owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(doc) = doc else {
            return Err(StorageError::NotFound {
                table: "alerts",
                key: alert_id.to_string(),
            });
        };
        let mut record: AlertRecord = serde_json::from_str(&doc)?;
        record.acknowledge(now)?;
        conn.execute(
            "UPDATE alerts SET doc = ?1 WHERE id = ?2",
            params![serde_json::to_string(&record)?, alert_id.as_str()],
        )?;
        Ok(record)
    }

    fn query_alert_rows_by_user(
        &self,
        user_id: &UserId,
        query: &AlertQuery,
    ) -> Result<(Vec<AlertRecord>, u64), StorageError> {
        let severity = query.severity.map(|s| s.as_str());
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE user_id = ?1 AND (?2 IS NULL OR severity = ?2)",
            params![user_id.as_str(), severity],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT doc FROM alerts
             WHERE user_id = ?1 AND (?2 IS NULL OR severity = ?2)
             ORDER BY created_at_us DESC, seq DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let docs = stmt
            .query_map(
                params![
                    user_id.as_str(),
                    severity,
                    i64::from(query.page_size),
                    i64::try_from(query.offset()).unwrap_or(i64::MAX)
                ],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((decode(docs)?, u64::try_from(total).unwrap_or(0)))
    }

    fn alert_rows_for_user_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT doc FROM alerts
             WHERE user_id = ?1 AND (?2 IS NULL OR created_at_us >= ?2)
             ORDER BY created_at_us DESC, seq DESC",
        )?;
        let docs = stmt
            .query_map(params![user_id.as_str(), since.map(micros)], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        decode(docs)
    }
}

impl IssuanceRepo for DocumentStore {
    fn insert_issuance_row(&self, new: NewIssuance) -> Result<IssuanceRecord, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let taken: Option<i64> = tx
            .query_row(
                "SELECT seq FROM issuances WHERE issuance_key = ?1",
                params![new.draft.key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(StorageError::DuplicateKey {
                table: "issuances.blockchain_id",
                key: new.draft.key.to_string(),
            });
        }
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM issuances", [], |row| row.get(0))?;
        let token_sequence = u64::try_from(count).unwrap_or(0) + 1;
        let record = IssuanceRecord::from_new(IssuanceId::generate(), token_sequence, new)?;
        tx.execute(
            "INSERT INTO issuances
                (id, issuance_key, user_id, token_id, created_at_us, schema_version, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.as_str(),
                record.key.as_str(),
                record.user_id.as_str(),
                i64::try_from(record.token_sequence).unwrap_or(i64::MAX),
                micros(record.created_at),
                version(ISSUANCE_CONTRACT_VERSION),
                serde_json::to_string(&record)?
            ],
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn issuance_row_by_key(
        &self,
        key: &IssuanceKey,
    ) -> Result<Option<IssuanceRecord>, StorageError> {
        let conn = self.lock()?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM issuances WHERE issuance_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(StorageError::from))
            .transpose()
    }

    fn issuance_rows_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<IssuanceRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT doc FROM issuances WHERE user_id = ?1 ORDER BY created_at_us DESC, seq DESC",
        )?;
        let docs = stmt
            .query_map(params![user_id.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode(docs)
    }
}

impl LocationLogRepo for DocumentStore {
    fn append_gps_ping_row(&self, ping: GpsPing) -> Result<(), StorageError> {
        let doc = serde_json::to_string(&ping)?;
        let conn = self.lock()?;
        conn.execute("INSERT INTO gps_pings (doc) VALUES (?1)", params![doc])?;
        Ok(())
    }

    fn gps_ping_rows(&self) -> Result<Vec<GpsPing>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT doc FROM gps_pings ORDER BY seq ASC")?;
        let docs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode(docs)
    }
}
