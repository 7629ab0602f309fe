#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike, Utc};
use rand::Rng;
use safetrip_kernel_contracts::alert::AlertSeverity;
use safetrip_kernel_contracts::dashboard::{
    AlertTypeCounts, AnalyticsReport, DashboardSummary, IncidentArea, ResponseTimeStats,
    SeverityCounts, SyntheticMetrics, DEFAULT_ANALYTICS_PERIOD,
};
use safetrip_kernel_contracts::user::UserId;
use safetrip_storage::repo::AlertRepo;

use crate::error::ServiceError;

/// Supplies dashboard figures that have no backing data.
pub trait MetricsProvider: Send + Sync {
    fn synthetic_metrics(&self) -> SyntheticMetrics;
}

/// Draws every filler figure from a fixed range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMetricsProvider;

impl MetricsProvider for RandomMetricsProvider {
    fn synthetic_metrics(&self) -> SyntheticMetrics {
        let mut rng = rand::thread_rng();
        let chart_floors = [120u64, 140, 160, 200, 250, 280];
        SyntheticMetrics {
            baseline_alerts_today: 30,
            baseline_severity: SeverityCounts {
                high: 39,
                medium: 45,
                low: 12,
            },
            active_tourists: rng.gen_range(200..700),
            pending_incidents: rng.gen_range(5..25),
            resolved_incidents: rng.gen_range(150..250),
            safety_score: rng.gen_range(80..100),
            avg_safety_score: rng.gen_range(75..90),
            avg_response_time: rng.gen_range(8..18),
            most_visited_region: "City Center".to_string(),
            active_tourists_chart: chart_floors
                .iter()
                .map(|floor| floor + rng.gen_range(0..50))
                .collect(),
        }
    }
}

/// Returns the same figures every time.
#[derive(Debug, Clone)]
pub struct FixedMetricsProvider(pub SyntheticMetrics);

impl MetricsProvider for FixedMetricsProvider {
    fn synthetic_metrics(&self) -> SyntheticMetrics {
        self.0.clone()
    }
}

fn response_time_stats() -> ResponseTimeStats {
    ResponseTimeStats {
        average: 12.5,
        median: 10.2,
        fastest: 4.1,
        slowest: 28.7,
    }
}

fn top_incident_areas() -> Vec<IncidentArea> {
    [
        ("Downtown Market", 15, AlertSeverity::Medium),
        ("Old Town Square", 8, AlertSeverity::Low),
        ("Train Station Area", 22, AlertSeverity::High),
        ("Tourist District", 5, AlertSeverity::Low),
        ("Port Area", 12, AlertSeverity::Medium),
    ]
    .into_iter()
    .map(|(name, incidents, risk_level)| IncidentArea {
        name: name.to_string(),
        incidents,
        risk_level,
    })
    .collect()
}

/// Midnight of `now`'s calendar day in `tz`, as UTC.
pub fn start_of_day_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let midnight = local.date_naive().and_hms_opt(0, 0, 0);
    match midnight.and_then(|m| tz.from_local_datetime(&m).earliest()) {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a zone transition: step back by the wall-clock offset.
        None => {
            now - Duration::seconds(i64::from(local.num_seconds_from_midnight()))
                - Duration::nanoseconds(i64::from(local.nanosecond()))
        }
    }
}

pub struct DashboardRuntime {
    alerts: Arc<dyn AlertRepo>,
    metrics: Arc<dyn MetricsProvider>,
}

impl DashboardRuntime {
    pub fn new(alerts: Arc<dyn AlertRepo>, metrics: Arc<dyn MetricsProvider>) -> Self {
        Self { alerts, metrics }
    }

    pub fn summary(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, ServiceError> {
        let since = start_of_day_in(now, &Local);
        let today = self.alerts.alert_rows_for_user_since(user_id, Some(since))?;
        Ok(DashboardSummary::compose(
            SeverityCounts::tally(&today),
            self.metrics.synthetic_metrics(),
        ))
    }

    pub fn analytics(
        &self,
        user_id: &UserId,
        period: Option<&str>,
    ) -> Result<AnalyticsReport, ServiceError> {
        let all = self.alerts.alert_rows_for_user_since(user_id, None)?;
        Ok(AnalyticsReport {
            period: period
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(DEFAULT_ANALYTICS_PERIOD)
                .to_string(),
            total_alerts: all.len() as u64,
            alerts_by_type: AlertTypeCounts::tally(&all),
            alerts_by_severity: SeverityCounts::tally(&all),
            response_time_stats: response_time_stats(),
            top_incident_areas: top_incident_areas(),
        })
    }
}
