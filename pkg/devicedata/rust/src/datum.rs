// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Normalized record types.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::datetime::{self, iso8601};

/// Records are shared between the timeline, the groups and every derived view.
pub type SharedDatum = Arc<Datum>;

/// Record type. Unknown types are kept under [`DatumKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatumKind {
    Basal,
    Bolus,
    Cbg,
    Smbg,
    Wizard,
    Food,
    DeviceEvent,
    Upload,
    Message,
    PumpSettings,
    PhysicalActivity,
    Fill,
    Other(String),
}

impl DatumKind {
    pub fn as_str(&self) -> &str {
        match self {
            DatumKind::Basal => "basal",
            DatumKind::Bolus => "bolus",
            DatumKind::Cbg => "cbg",
            DatumKind::Smbg => "smbg",
            DatumKind::Wizard => "wizard",
            DatumKind::Food => "food",
            DatumKind::DeviceEvent => "deviceEvent",
            DatumKind::Upload => "upload",
            DatumKind::Message => "message",
            DatumKind::PumpSettings => "pumpSettings",
            DatumKind::PhysicalActivity => "physicalActivity",
            DatumKind::Fill => "fill",
            DatumKind::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "basal" => DatumKind::Basal,
            "bolus" => DatumKind::Bolus,
            "cbg" => DatumKind::Cbg,
            "smbg" => DatumKind::Smbg,
            "wizard" => DatumKind::Wizard,
            "food" => DatumKind::Food,
            "deviceEvent" => DatumKind::DeviceEvent,
            "upload" => DatumKind::Upload,
            "message" => DatumKind::Message,
            "pumpSettings" => DatumKind::PumpSettings,
            "physicalActivity" => DatumKind::PhysicalActivity,
            "fill" => DatumKind::Fill,
            other => DatumKind::Other(other.to_string()),
        }
    }

    /// Glucose readings, continuous or self-monitored.
    pub fn is_glucose(&self) -> bool {
        matches!(self, DatumKind::Cbg | DatumKind::Smbg)
    }
}

impl std::fmt::Display for DatumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for DatumKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(DatumKind::parse(&s))
    }
}

impl Serialize for DatumKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Well-known `deviceEvent` sub types.
pub mod sub_type {
    pub const TIME_CHANGE: &str = "timeChange";
    pub const DEVICE_PARAMETER: &str = "deviceParameter";
    pub const RESERVOIR_CHANGE: &str = "reservoirChange";
    pub const PRIME: &str = "prime";
    pub const CALIBRATION: &str = "calibration";
}

/// Local calendar fields of glucose readings, used by the trends views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalDay {
    #[serde(rename = "localDayOfWeek")]
    pub day_of_week: String,
    #[serde(rename = "localDate")]
    pub date: NaiveDate,
    #[serde(rename = "msPer24")]
    pub ms_per_24: i64,
}

/// Presentational fields of a background fill record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInfo {
    pub fill_color: String,
    pub fill_date: NaiveDate,
    pub starts_at_midnight: bool,
    pub two_week_x: i64,
}

/// One side of a timezone transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStamp {
    /// Wall clock time, `YYYY-MM-DDTHH:mm:ss`.
    pub time: String,
    pub time_zone_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeChange {
    pub from: ZoneStamp,
    pub to: ZoneStamp,
    pub method: String,
}

/// A normalized record.
///
/// Fields the pipeline reads or rewrites are typed; everything else the
/// device sent is carried in `extra` and flattened back on serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datum {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DatumKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    /// Caller supplied time, as received.
    pub time: String,
    #[serde(serialize_with = "iso8601::serialize")]
    pub normal_time: DateTime<Utc>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::option::serialize"
    )]
    pub normal_end: Option<DateTime<Utc>>,
    pub timezone: String,
    /// Negated UTC offset of `time` in `timezone`, in minutes.
    pub display_offset: i32,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(flatten)]
    pub local: Option<LocalDay>,
    #[serde(flatten)]
    pub fill: Option<FillInfo>,
    #[serde(flatten)]
    pub time_change: Option<TimeChange>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Datum {
    /// Numeric type-specific field.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    /// String type-specific field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn has_sub_type(&self, expected: &str) -> bool {
        self.sub_type.as_deref() == Some(expected)
    }

    /// Explicit `deviceEvent`/`timeChange` record.
    pub fn is_time_change(&self) -> bool {
        self.kind == DatumKind::DeviceEvent && self.has_sub_type(sub_type::TIME_CHANGE)
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.normal_time.timestamp_millis()
    }

    /// Resolved zone of the record. Normalization guarantees it parses.
    pub fn zone(&self) -> Tz {
        datetime::zone_or_utc(&self.timezone)
    }

    /// Calendar date of the record in its own zone.
    pub fn local_date(&self) -> NaiveDate {
        datetime::local_date(&self.normal_time, self.zone())
    }

    pub fn normal_time_iso(&self) -> String {
        datetime::iso(&self.normal_time)
    }
}
