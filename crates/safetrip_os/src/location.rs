#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use safetrip_kernel_contracts::location::{GpsPing, GpsPingInput, GpsTag};
use safetrip_storage::repo::LocationLogRepo;

use crate::error::ServiceError;

pub struct LocationRuntime {
    log: Arc<dyn LocationLogRepo>,
}

impl LocationRuntime {
    pub fn new(log: Arc<dyn LocationLogRepo>) -> Self {
        Self { log }
    }

    /// Appends one ping and returns the whole log.
    pub fn record(
        &self,
        input: GpsPingInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<GpsPing>, ServiceError> {
        let ping = input.into_ping(now)?;
        if ping.tag == GpsTag::Sos {
            tracing::warn!(lat = ping.lat, lon = ping.lon, "sos ping received");
        } else {
            tracing::debug!(lat = ping.lat, lon = ping.lon, "gps ping received");
        }
        self.log.append_gps_ping_row(ping)?;
        self.all()
    }

    pub fn all(&self) -> Result<Vec<GpsPing>, ServiceError> {
        Ok(self.log.gps_ping_rows()?)
    }
}
