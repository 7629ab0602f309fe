#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::common::{validate_coordinate, validate_trimmed_len};
use crate::lenient;
use crate::user::UserId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const ALERT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const ALERT_TYPE_REASON: &str = "Invalid alert type";
pub const ALERT_SEVERITY_REASON: &str = "Invalid severity level";
pub const ALERT_MESSAGE_REASON: &str = "Message must be between 1 and 500 characters";
pub const LATITUDE_REASON: &str = "Invalid latitude";
pub const LONGITUDE_REASON: &str = "Invalid longitude";

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub type AlertMetadata = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AlertId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() || self.0.len() > 64 || !self.0.chars().all(|c| c.is_ascii_graphic())
        {
            return Err(ContractViolation::InvalidValue {
                field: "alert_id",
                reason: "alert id must be 1..=64 printable ascii bytes",
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PanicButton,
    GeofenceViolation,
    AiMonitoring,
}

impl AlertType {
    pub const ALL: [AlertType; 3] = [
        AlertType::PanicButton,
        AlertType::GeofenceViolation,
        AlertType::AiMonitoring,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PANIC_BUTTON" => Some(AlertType::PanicButton),
            "GEOFENCE_VIOLATION" => Some(AlertType::GeofenceViolation),
            "AI_MONITORING" => Some(AlertType::AiMonitoring),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::PanicButton => "PANIC_BUTTON",
            AlertType::GeofenceViolation => "GEOFENCE_VIOLATION",
            AlertType::AiMonitoring => "AI_MONITORING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 3] = [
        AlertSeverity::Low,
        AlertSeverity::Medium,
        AlertSeverity::High,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LOW" => Some(AlertSeverity::Low),
            "MEDIUM" => Some(AlertSeverity::Medium),
            "HIGH" => Some(AlertSeverity::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(AlertStatus::Active),
            "ACKNOWLEDGED" => Some(AlertStatus::Acknowledged),
            "RESOLVED" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "ACTIVE",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Resolved => "RESOLVED",
        }
    }
}

/// Forward-only lifecycle. Re-acknowledging is the one allowed self-transition.
pub fn is_allowed_alert_transition(from: AlertStatus, to: AlertStatus) -> bool {
    matches!(
        (from, to),
        (AlertStatus::Active, AlertStatus::Acknowledged)
            | (AlertStatus::Acknowledged, AlertStatus::Acknowledged)
            | (AlertStatus::Acknowledged, AlertStatus::Resolved)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ContractViolation> {
        let v = Self {
            latitude,
            longitude,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for GeoLocation {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_coordinate("location.latitude", self.latitude, -90.0, 90.0, LATITUDE_REASON)?;
        validate_coordinate(
            "location.longitude",
            self.longitude,
            -180.0,
            180.0,
            LONGITUDE_REASON,
        )
    }
}

/// Coordinates accept JSON numbers and numeric strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationInput {
    #[serde(deserialize_with = "lenient::opt_number")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub longitude: Option<f64>,
}

/// Raw alert submission. Fields decode leniently so that an unknown value or
/// a wrong JSON type surfaces as a validation message instead of a decode
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertCreateRequest {
    #[serde(rename = "type", deserialize_with = "lenient::text")]
    pub alert_type: String,
    #[serde(deserialize_with = "lenient::text")]
    pub severity: String,
    #[serde(deserialize_with = "lenient::text")]
    pub message: String,
    #[serde(deserialize_with = "lenient::opt_nested")]
    pub location: Option<LocationInput>,
    #[serde(deserialize_with = "lenient::opt_object")]
    pub metadata: Option<AlertMetadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub location: Option<GeoLocation>,
    pub metadata: AlertMetadata,
}

impl AlertCreateRequest {
    pub fn into_draft(self) -> Result<AlertDraft, ContractViolation> {
        let alert_type =
            AlertType::parse(&self.alert_type).ok_or(ContractViolation::InvalidValue {
                field: "alert.type",
                reason: ALERT_TYPE_REASON,
            })?;
        let severity =
            AlertSeverity::parse(&self.severity).ok_or(ContractViolation::InvalidValue {
                field: "alert.severity",
                reason: ALERT_SEVERITY_REASON,
            })?;
        validate_trimmed_len("alert.message", &self.message, 1, 500, ALERT_MESSAGE_REASON)?;
        let location = match self.location {
            None => None,
            Some(input) => {
                let latitude = input.latitude.ok_or(ContractViolation::InvalidValue {
                    field: "location.latitude",
                    reason: LATITUDE_REASON,
                })?;
                validate_coordinate("location.latitude", latitude, -90.0, 90.0, LATITUDE_REASON)?;
                let longitude = input.longitude.ok_or(ContractViolation::InvalidValue {
                    field: "location.longitude",
                    reason: LONGITUDE_REASON,
                })?;
                Some(GeoLocation::new(latitude, longitude)?)
            }
        };
        Ok(AlertDraft {
            alert_type,
            severity,
            message: self.message.trim().to_string(),
            location,
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

/// Alert handed to the store; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub user_id: UserId,
    pub draft: AlertDraft,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: AlertId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub location: Option<GeoLocation>,
    pub metadata: AlertMetadata,
    pub status: AlertStatus,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    pub fn from_new(id: AlertId, new: NewAlert) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            user_id: new.user_id,
            alert_type: new.draft.alert_type,
            severity: new.draft.severity,
            message: new.draft.message,
            location: new.draft.location,
            metadata: new.draft.metadata,
            status: AlertStatus::Active,
            created_at: new.created_at,
            acknowledged_at: None,
        };
        r.validate()?;
        Ok(r)
    }

    /// ACTIVE or ACKNOWLEDGED -> ACKNOWLEDGED. The stamp never moves backward.
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> Result<(), ContractViolation> {
        if !is_allowed_alert_transition(self.status, AlertStatus::Acknowledged) {
            return Err(ContractViolation::InvalidValue {
                field: "alert.status",
                reason: "Alert can no longer be acknowledged",
            });
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_at = Some(match self.acknowledged_at {
            Some(prev) if prev > now => prev,
            _ => now,
        });
        Ok(())
    }
}

impl Validate for AlertRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.user_id.validate()?;
        validate_trimmed_len("alert.message", &self.message, 1, 500, ALERT_MESSAGE_REASON)?;
        if let Some(location) = &self.location {
            location.validate()?;
        }
        match (self.status, self.acknowledged_at) {
            (AlertStatus::Active, Some(_)) => Err(ContractViolation::InvalidValue {
                field: "alert.acknowledged_at",
                reason: "active alerts carry no acknowledgement stamp",
            }),
            (_, Some(at)) if at < self.created_at => Err(ContractViolation::InvalidValue {
                field: "alert.acknowledged_at",
                reason: "must be >= created_at",
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertQuery {
    pub severity: Option<AlertSeverity>,
    pub page: u32,
    pub page_size: u32,
}

impl AlertQuery {
    pub fn v1(
        severity: Option<AlertSeverity>,
        page: u32,
        page_size: u32,
    ) -> Result<Self, ContractViolation> {
        let q = Self {
            severity,
            page,
            page_size,
        };
        q.validate()?;
        Ok(q)
    }

    /// Page 0 is treated as page 1.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            severity: None,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Validate for AlertQuery {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.page == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "alert_query.page",
                reason: "page must be positive",
            });
        }
        if self.page_size == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "alert_query.page_size",
                reason: "page size must be positive",
            });
        }
        Ok(())
    }
}

/// Query-string form of a listing request. Lenient: bad numbers fall back to
/// defaults and an unknown severity is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlertListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub severity: Option<String>,
}

impl AlertListParams {
    pub fn to_query(&self) -> AlertQuery {
        fn positive(raw: Option<&String>, default: u32) -> u32 {
            raw.and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        }
        AlertQuery {
            severity: self.severity.as_deref().and_then(AlertSeverity::parse),
            page: positive(self.page.as_ref(), DEFAULT_PAGE),
            page_size: positive(self.limit.as_ref(), DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit.max(1))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<AlertRecord>,
    pub pagination: Pagination,
}
