#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use safetrip_kernel_contracts::alert::{AlertId, AlertQuery, AlertRecord, NewAlert};
use safetrip_kernel_contracts::issuance::{IssuanceId, IssuanceKey, IssuanceRecord, NewIssuance};
use safetrip_kernel_contracts::location::GpsPing;
use safetrip_kernel_contracts::user::{EmailAddress, UserId, UserRecord};

use crate::repo::{AlertRepo, CredentialRepo, IssuanceRepo, LocationLogRepo};
use crate::StorageError;

#[derive(Debug, Default)]
struct UserTables {
    rows: BTreeMap<UserId, UserRecord>,
    by_email: BTreeMap<EmailAddress, UserId>,
}

#[derive(Debug, Clone)]
struct AlertRow {
    seq: u64,
    record: AlertRecord,
}

#[derive(Debug, Default)]
struct AlertTables {
    rows: BTreeMap<AlertId, AlertRow>,
    next_seq: u64,
}

impl AlertTables {
    fn rows_for_user<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> impl Iterator<Item = &'a AlertRow> + 'a {
        self.rows.values().filter(move |r| &r.record.user_id == user_id)
    }
}

/// Creation time descending; insertion sequence breaks ties.
fn newest_first(rows: &mut [&AlertRow]) {
    rows.sort_by(|a, b| {
        b.record
            .created_at
            .cmp(&a.record.created_at)
            .then(b.seq.cmp(&a.seq))
    });
}

#[derive(Debug, Default)]
struct IssuanceTables {
    rows: Vec<IssuanceRecord>,
    by_key: BTreeMap<IssuanceKey, usize>,
}

/// Process-memory store. Each table has its own lock: one writer at a time,
/// readers share.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<UserTables>,
    alerts: RwLock<AlertTables>,
    issuances: RwLock<IssuanceTables>,
    gps_pings: RwLock<Vec<GpsPing>>,
}

fn read_table<'a, T>(
    lock: &'a RwLock<T>,
    table: &'static str,
) -> Result<RwLockReadGuard<'a, T>, StorageError> {
    lock.read().map_err(|_| StorageError::LockPoisoned { table })
}

fn write_table<'a, T>(
    lock: &'a RwLock<T>,
    table: &'static str,
) -> Result<RwLockWriteGuard<'a, T>, StorageError> {
    lock.write().map_err(|_| StorageError::LockPoisoned { table })
}

impl MemoryStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }
}

impl CredentialRepo for MemoryStore {
    fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError> {
        let mut t = write_table(&self.users, "users")?;
        if t.by_email.contains_key(&record.email) {
            return Err(StorageError::DuplicateKey {
                table: "users.email",
                key: record.email.as_str().to_string(),
            });
        }
        if t.rows.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "users",
                key: record.id.to_string(),
            });
        }
        t.by_email.insert(record.email.clone(), record.id.clone());
        t.rows.insert(record.id.clone(), record);
        Ok(())
    }

    fn user_row_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, StorageError> {
        let t = read_table(&self.users, "users")?;
        Ok(t.by_email.get(email).and_then(|id| t.rows.get(id)).cloned())
    }
}

impl AlertRepo for MemoryStore {
    fn insert_alert_row(&self, new: NewAlert) -> Result<AlertRecord, StorageError> {
        let record = AlertRecord::from_new(AlertId::generate(), new)?;
        let mut t = write_table(&self.alerts, "alerts")?;
        if t.rows.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "alerts",
                key: record.id.to_string(),
            });
        }
        t.next_seq += 1;
        let seq = t.next_seq;
        t.rows.insert(
            record.id.clone(),
            AlertRow {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    fn alert_row(&self, alert_id: &AlertId) -> Result<Option<AlertRecord>, StorageError> {
        let t = read_table(&self.alerts, "alerts")?;
        Ok(t.rows.get(alert_id).map(|r| r.record.clone()))
    }

    fn acknowledge_alert_row(
        &self,
        alert_id: &AlertId,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError> {
        let mut t = write_table(&self.alerts, "alerts")?;
        let row = t
            .rows
            .get_mut(alert_id)
            .filter(|r| &r.record.user_id == owner)
            .ok_or_else(|| StorageError::NotFound {
                table: "alerts",
                key: alert_id.to_string(),
            })?;
        let mut next = row.record.clone();
        next.acknowledge(now)?;
        row.record = next.clone();
        Ok(next)
    }

    fn query_alert_rows_by_user(
        &self,
        user_id: &UserId,
        query: &AlertQuery,
    ) -> Result<(Vec<AlertRecord>, u64), StorageError> {
        let t = read_table(&self.alerts, "alerts")?;
        let mut matching: Vec<&AlertRow> = t
            .rows_for_user(user_id)
            .filter(|r| query.severity.map_or(true, |s| r.record.severity == s))
            .collect();
        newest_first(&mut matching);
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .map(|r| r.record.clone())
            .collect();
        Ok((page, total))
    }

    fn alert_rows_for_user_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let t = read_table(&self.alerts, "alerts")?;
        let mut matching: Vec<&AlertRow> = t
            .rows_for_user(user_id)
            .filter(|r| since.map_or(true, |s| r.record.created_at >= s))
            .collect();
        newest_first(&mut matching);
        Ok(matching.into_iter().map(|r| r.record.clone()).collect())
    }
}

impl IssuanceRepo for MemoryStore {
    fn insert_issuance_row(&self, new: NewIssuance) -> Result<IssuanceRecord, StorageError> {
        let mut t = write_table(&self.issuances, "issuances")?;
        if t.by_key.contains_key(&new.draft.key) {
            return Err(StorageError::DuplicateKey {
                table: "issuances.blockchain_id",
                key: new.draft.key.to_string(),
            });
        }
        let token_sequence = t.rows.len() as u64 + 1;
        let record = IssuanceRecord::from_new(IssuanceId::generate(), token_sequence, new)?;
        let idx = t.rows.len();
        t.by_key.insert(record.key.clone(), idx);
        t.rows.push(record.clone());
        Ok(record)
    }

    fn issuance_row_by_key(
        &self,
        key: &IssuanceKey,
    ) -> Result<Option<IssuanceRecord>, StorageError> {
        let t = read_table(&self.issuances, "issuances")?;
        Ok(t.by_key.get(key).and_then(|idx| t.rows.get(*idx)).cloned())
    }

    fn issuance_rows_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<IssuanceRecord>, StorageError> {
        let t = read_table(&self.issuances, "issuances")?;
        // Reverse first so the stable sort keeps later inserts ahead on ties.
        let mut out: Vec<IssuanceRecord> = t
            .rows
            .iter()
            .rev()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

impl LocationLogRepo for MemoryStore {
    fn append_gps_ping_row(&self, ping: GpsPing) -> Result<(), StorageError> {
        let mut t = write_table(&self.gps_pings, "gps_pings")?;
        t.push(ping);
        Ok(())
    }

    fn gps_ping_rows(&self) -> Result<Vec<GpsPing>, StorageError> {
        let t = read_table(&self.gps_pings, "gps_pings")?;
        Ok(t.clone())
    }
}
