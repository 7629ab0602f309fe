#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use safetrip_kernel_contracts::alert::{
    AlertCreateRequest, AlertId, AlertPage, AlertQuery, AlertRecord, AlertSeverity, NewAlert,
    Pagination,
};
use safetrip_kernel_contracts::user::UserId;
use safetrip_kernel_contracts::Validate;
use safetrip_storage::repo::AlertRepo;
use safetrip_storage::StorageError;

use crate::error::ServiceError;

pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_millis(1_000);

const ALERT_NOT_FOUND: &str = "Alert not found";

/// Downstream hand-off for HIGH severity alerts. Must not block and must not
/// fail the request that triggered it.
pub trait AlertDispatch: Send + Sync {
    fn dispatch(&self, alert: &AlertRecord);
}

/// Logs the simulated emergency dispatch, then logs the confirmation from a
/// detached task after `delay`.
#[derive(Debug, Clone)]
pub struct TracingAlertDispatch {
    delay: Duration,
    confirmed: Arc<AtomicU64>,
}

impl TracingAlertDispatch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            confirmed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Confirmations delivered so far, shared across clones.
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }
}

impl Default for TracingAlertDispatch {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_DELAY)
    }
}

impl AlertDispatch for TracingAlertDispatch {
    fn dispatch(&self, alert: &AlertRecord) {
        tracing::info!(
            alert_id = %alert.id,
            "high severity alert - dispatching emergency response team"
        );
        let alert_id = alert.id.clone();
        let delay = self.delay;
        let confirmed = Arc::clone(&self.confirmed);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    tracing::info!(
                        alert_id = %alert_id,
                        "emergency response team notified and dispatched"
                    );
                    confirmed.fetch_add(1, Ordering::Relaxed);
                });
            }
            Err(_) => {
                tracing::debug!(alert_id = %alert_id, "no async runtime, dispatch confirmation skipped");
            }
        }
    }
}

pub struct AlertRuntime {
    alerts: Arc<dyn AlertRepo>,
    dispatch: Arc<dyn AlertDispatch>,
}

impl AlertRuntime {
    pub fn new(alerts: Arc<dyn AlertRepo>, dispatch: Arc<dyn AlertDispatch>) -> Self {
        Self { alerts, dispatch }
    }

    pub fn create(
        &self,
        user_id: &UserId,
        req: AlertCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<AlertRecord, ServiceError> {
        let draft = req.into_draft()?;
        let alert = self.alerts.insert_alert_row(NewAlert {
            user_id: user_id.clone(),
            draft,
            created_at: now,
        })?;

        tracing::info!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            alert_type = alert.alert_type.as_str(),
            severity = alert.severity.as_str(),
            location = ?alert.location,
            "new alert"
        );
        if alert.severity == AlertSeverity::High {
            self.dispatch.dispatch(&alert);
        }
        Ok(alert)
    }

    pub fn list(&self, user_id: &UserId, query: &AlertQuery) -> Result<AlertPage, ServiceError> {
        query.validate()?;
        let (alerts, total) = self.alerts.query_alert_rows_by_user(user_id, query)?;
        Ok(AlertPage {
            alerts,
            pagination: Pagination::new(query.page, query.page_size, total),
        })
    }

    /// Idempotent. Alerts of other users are reported exactly like missing ones.
    pub fn acknowledge(
        &self,
        alert_id: &str,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<AlertRecord, ServiceError> {
        let alert_id = AlertId::new(alert_id).map_err(|_| ServiceError::NotFound(ALERT_NOT_FOUND))?;
        match self.alerts.acknowledge_alert_row(&alert_id, user_id, now) {
            Ok(alert) => {
                tracing::info!(alert_id = %alert.id, "alert acknowledged");
                Ok(alert)
            }
            Err(StorageError::NotFound { .. }) => Err(ServiceError::NotFound(ALERT_NOT_FOUND)),
            Err(e) => Err(e.into()),
        }
    }
}
