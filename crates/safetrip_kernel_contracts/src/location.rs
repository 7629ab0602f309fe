#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{LATITUDE_REASON, LONGITUDE_REASON};
use crate::common::validate_coordinate;
use crate::lenient;
use crate::{ContractViolation, Validate};

pub const GPS_TAG_REASON: &str = "Invalid tag";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpsTag {
    #[default]
    Normal,
    Sos,
}

impl GpsTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(GpsTag::Normal),
            "sos" => Some(GpsTag::Sos),
            _ => None,
        }
    }
}

/// Body posted by tracker hardware.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GpsPingInput {
    #[serde(deserialize_with = "lenient::opt_number")]
    pub lat: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub lon: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub tag: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsPing {
    pub lat: f64,
    pub lon: f64,
    pub tag: GpsTag,
    /// Device clock reading, kept verbatim.
    pub timestamp: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl GpsPingInput {
    pub fn into_ping(self, received_at: DateTime<Utc>) -> Result<GpsPing, ContractViolation> {
        let lat = self.lat.ok_or(ContractViolation::InvalidValue {
            field: "gps.lat",
            reason: LATITUDE_REASON,
        })?;
        let lon = self.lon.ok_or(ContractViolation::InvalidValue {
            field: "gps.lon",
            reason: LONGITUDE_REASON,
        })?;
        let tag = match self.tag.as_deref() {
            None => GpsTag::Normal,
            Some(raw) => GpsTag::parse(raw).ok_or(ContractViolation::InvalidValue {
                field: "gps.tag",
                reason: GPS_TAG_REASON,
            })?,
        };
        let ping = GpsPing {
            lat,
            lon,
            tag,
            timestamp: self.timestamp,
            received_at,
        };
        ping.validate()?;
        Ok(ping)
    }
}

impl Validate for GpsPing {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_coordinate("gps.lat", self.lat, -90.0, 90.0, LATITUDE_REASON)?;
        validate_coordinate("gps.lon", self.lon, -180.0, 180.0, LONGITUDE_REASON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_gps_01_tag_defaults_and_parses() {
        let ping = GpsPingInput {
            lat: Some(28.7041),
            lon: Some(77.1025),
            tag: None,
            timestamp: Some("2025-09-08 21:00".to_string()),
        }
        .into_ping(Utc::now())
        .unwrap();
        assert_eq!(ping.tag, GpsTag::Normal);
        assert_eq!(GpsTag::parse("SOS"), Some(GpsTag::Sos));
    }

    #[test]
    fn at_gps_02_rejects_bad_coordinates_and_tag() {
        let err = GpsPingInput {
            lat: Some(128.0),
            lon: Some(77.0),
            ..Default::default()
        }
        .into_ping(Utc::now())
        .unwrap_err();
        assert_eq!(err.reason(), LATITUDE_REASON);

        let err = GpsPingInput {
            lat: Some(28.0),
            lon: None,
            ..Default::default()
        }
        .into_ping(Utc::now())
        .unwrap_err();
        assert_eq!(err.reason(), LONGITUDE_REASON);

        let err = GpsPingInput {
            lat: Some(28.0),
            lon: Some(77.0),
            tag: Some("panic".to_string()),
            timestamp: None,
        }
        .into_ping(Utc::now())
        .unwrap_err();
        assert_eq!(err.reason(), GPS_TAG_REASON);
    }

    #[test]
    fn at_gps_03_decodes_numeric_strings_and_rejects_other_types() {
        let input: GpsPingInput =
            serde_json::from_value(serde_json::json!({"lat": "28.7", "lon": 77.1, "tag": "sos"}))
                .unwrap();
        let ping = input.into_ping(Utc::now()).unwrap();
        assert_eq!(ping.lat, 28.7);
        assert_eq!(ping.tag, GpsTag::Sos);

        let input: GpsPingInput =
            serde_json::from_value(serde_json::json!({"lat": true, "lon": 77.1})).unwrap();
        assert_eq!(input.into_ping(Utc::now()).unwrap_err().reason(), LATITUDE_REASON);

        let input: GpsPingInput =
            serde_json::from_value(serde_json::json!({"lat": 1.0, "lon": 2.0, "tag": 7})).unwrap();
        assert_eq!(input.into_ping(Utc::now()).unwrap_err().reason(), GPS_TAG_REASON);
    }
}
