#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::alert::{AlertRecord, AlertSeverity, AlertType};

pub const DEFAULT_ANALYTICS_PERIOD: &str = "7d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a AlertRecord>) -> Self {
        let mut out = Self::default();
        for alert in alerts {
            match alert.severity {
                AlertSeverity::High => out.high += 1,
                AlertSeverity::Medium => out.medium += 1,
                AlertSeverity::Low => out.low += 1,
            }
        }
        out
    }

    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AlertTypeCounts {
    pub panic_button: u64,
    pub geofence_violation: u64,
    pub ai_monitoring: u64,
}

impl AlertTypeCounts {
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a AlertRecord>) -> Self {
        let mut out = Self::default();
        for alert in alerts {
            match alert.alert_type {
                AlertType::PanicButton => out.panic_button += 1,
                AlertType::GeofenceViolation => out.geofence_violation += 1,
                AlertType::AiMonitoring => out.ai_monitoring += 1,
            }
        }
        out
    }
}

/// Filler figures with no backing data. Supplied by a metrics provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMetrics {
    pub baseline_alerts_today: u64,
    pub baseline_severity: SeverityCounts,
    pub active_tourists: u64,
    pub pending_incidents: u64,
    pub resolved_incidents: u64,
    pub safety_score: u64,
    pub avg_safety_score: u64,
    pub avg_response_time: u64,
    pub most_visited_region: String,
    pub active_tourists_chart: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub active_tourists: u64,
    pub alerts_today: u64,
    pub high_alerts: u64,
    pub medium_alerts: u64,
    pub low_alerts: u64,
    pub pending_incidents: u64,
    pub resolved_incidents: u64,
    pub safety_score: u64,
    pub avg_safety_score: u64,
    pub avg_response_time: u64,
    pub most_visited_region: String,
    pub active_tourists_chart: Vec<u64>,
}

impl DashboardSummary {
    pub fn compose(today: SeverityCounts, metrics: SyntheticMetrics) -> Self {
        Self {
            active_tourists: metrics.active_tourists,
            alerts_today: today.total() + metrics.baseline_alerts_today,
            high_alerts: today.high + metrics.baseline_severity.high,
            medium_alerts: today.medium + metrics.baseline_severity.medium,
            low_alerts: today.low + metrics.baseline_severity.low,
            pending_incidents: metrics.pending_incidents,
            resolved_incidents: metrics.resolved_incidents,
            safety_score: metrics.safety_score,
            avg_safety_score: metrics.avg_safety_score,
            avg_response_time: metrics.avg_response_time,
            most_visited_region: metrics.most_visited_region,
            active_tourists_chart: metrics.active_tourists_chart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    pub average: f64,
    pub median: f64,
    pub fastest: f64,
    pub slowest: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentArea {
    pub name: String,
    pub incidents: u64,
    pub risk_level: AlertSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub period: String,
    pub total_alerts: u64,
    pub alerts_by_type: AlertTypeCounts,
    pub alerts_by_severity: SeverityCounts,
    pub response_time_stats: ResponseTimeStats,
    pub top_incident_areas: Vec<IncidentArea>,
}
