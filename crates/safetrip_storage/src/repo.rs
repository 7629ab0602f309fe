#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use safetrip_kernel_contracts::alert::{AlertId, AlertQuery, AlertRecord, NewAlert};
use safetrip_kernel_contracts::issuance::{IssuanceKey, IssuanceRecord, NewIssuance};
use safetrip_kernel_contracts::location::GpsPing;
use safetrip_kernel_contracts::user::{EmailAddress, UserId, UserRecord};

use crate::StorageError;

/// Typed repository interface for user credentials.
pub trait CredentialRepo: Send + Sync {
    /// Fails with `DuplicateKey` when the email (or id) is already taken.
    fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError>;
    fn user_row_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, StorageError>;
}

/// Typed repository interface for alert persistence.
pub trait AlertRepo: Send + Sync {
    /// Assigns a fresh id and stores the alert as ACTIVE.
    fn insert_alert_row(&self, new: NewAlert) -> Result<AlertRecord, StorageError>;

    fn alert_row(&self, alert_id: &AlertId) -> Result<Option<AlertRecord>, StorageError>;

    /// Applies the acknowledge transition under the store's write lock.
    /// Rows owned by another user are reported as `NotFound`.
    fn acknowledge_alert_row(
        &self,
        alert_id: &AlertId,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<AlertRecord, StorageError>;

    /// Newest first. Returns the requested page and the total match count.
    fn query_alert_rows_by_user(
        &self,
        user_id: &UserId,
        query: &AlertQuery,
    ) -> Result<(Vec<AlertRecord>, u64), StorageError>;

    /// Every alert of the user created at or after `since`, newest first.
    fn alert_rows_for_user_since(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AlertRecord>, StorageError>;
}

/// Typed repository interface for identity issuance records.
pub trait IssuanceRepo: Send + Sync {
    /// Uniqueness check and token sequence assignment happen atomically.
    fn insert_issuance_row(&self, new: NewIssuance) -> Result<IssuanceRecord, StorageError>;
    fn issuance_row_by_key(&self, key: &IssuanceKey)
        -> Result<Option<IssuanceRecord>, StorageError>;
    fn issuance_rows_for_user(&self, user_id: &UserId)
        -> Result<Vec<IssuanceRecord>, StorageError>;
}

/// Append-only log of raw tracker pings.
pub trait LocationLogRepo: Send + Sync {
    fn append_gps_ping_row(&self, ping: GpsPing) -> Result<(), StorageError>;
    fn gps_ping_rows(&self) -> Result<Vec<GpsPing>, StorageError>;
}
