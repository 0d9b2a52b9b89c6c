// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::datetime::{self, iso8601};
use crate::datum::{Datum, SharedDatum};

/// Fields removed from the copy of a bolus kept in the basics window.
const STRIPPED_BOLUS_FIELDS: &[&str] = &[
    "timezoneOffset",
    "clockDriftOffset",
    "conversionOffset",
    "deviceSerialNumber",
    "deviceId",
    "uploadId",
    "manual",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKind {
    ReservoirChange,
    CannulaPrime,
    TubingPrime,
    Calibration,
    Upload,
    Basal,
    Bolus,
    Cbg,
    Smbg,
    Wizard,
    /// Any other allowlisted record type, keyed by its type name.
    Other(String),
}

impl BucketKind {
    pub fn as_str(&self) -> &str {
        match self {
            BucketKind::ReservoirChange => "reservoirChange",
            BucketKind::CannulaPrime => "cannulaPrime",
            BucketKind::TubingPrime => "tubingPrime",
            BucketKind::Calibration => "calibration",
            BucketKind::Upload => "upload",
            BucketKind::Basal => "basal",
            BucketKind::Bolus => "bolus",
            BucketKind::Cbg => "cbg",
            BucketKind::Smbg => "smbg",
            BucketKind::Wizard => "wizard",
            BucketKind::Other(name) => name,
        }
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for BucketKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Anything a bucket can hold.
pub trait BucketItem: Clone {
    fn local_date(&self) -> NaiveDate;
}

impl BucketItem for SharedDatum {
    fn local_date(&self) -> NaiveDate {
        Datum::local_date(self)
    }
}

/// Copy of a bolus with transport fields removed and the summary flags the
/// basics view reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicsBolus {
    pub id: String,
    #[serde(serialize_with = "iso8601::serialize")]
    pub normal_time: DateTime<Utc>,
    pub timezone: String,
    /// Delivered amount differs from the programmed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    /// Set when a wizard references this bolus.
    pub manual: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BasicsBolus {
    pub fn from_datum(datum: &Datum) -> Self {
        let mut fields = datum.extra.clone();
        let manual = fields.get("manual").and_then(Value::as_bool).unwrap_or(false);
        for key in STRIPPED_BOLUS_FIELDS {
            fields.remove(*key);
        }
        let interrupted = match (datum.number("normal"), datum.number("expectedNormal")) {
            (Some(normal), Some(expected)) => Some((normal - expected).abs() > f64::EPSILON),
            _ => None,
        };
        Self {
            id: datum.id.clone(),
            normal_time: datum.normal_time,
            timezone: datum.timezone.clone(),
            interrupted,
            manual,
            fields,
        }
    }
}

impl BucketItem for BasicsBolus {
    fn local_date(&self) -> NaiveDate {
        datetime::local_date(&self.normal_time, datetime::zone_or_utc(&self.timezone))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BolusStats {
    pub n_manual: usize,
    pub n_automated: usize,
    pub n_interrupted: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasalStats {
    pub n_automated: usize,
    pub n_scheduled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BucketStats {
    Bolus(BolusStats),
    Basal(BasalStats),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicsBucket<T> {
    pub data: Vec<T>,
    /// Per local date, in time order. `None` for passthrough buckets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_date: Option<BTreeMap<NaiveDate, Vec<T>>>,
    pub avg_per_day: u64,
    #[serde(flatten)]
    pub stats: Option<BucketStats>,
}

impl<T> Default for BasicsBucket<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            by_date: None,
            avg_per_day: 0,
            stats: None,
        }
    }
}

impl<T: BucketItem> BasicsBucket<T> {
    /// Bucket holding `data` as is, without a by-date map.
    pub fn passthrough(data: Vec<T>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn push(&mut self, item: T) {
        self.data.push(item);
    }

    /// Build the by-date map and the average count per active day.
    pub(crate) fn index_by_date(&mut self) {
        let mut by_date: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
        for item in &self.data {
            by_date.entry(item.local_date()).or_default().push(item.clone());
        }
        self.avg_per_day = average_per_day(self.data.len(), by_date.len());
        self.by_date = Some(by_date);
    }
}

impl BasicsBucket<BasicsBolus> {
    pub(crate) fn compute_bolus_stats(&mut self) {
        let mut stats = BolusStats::default();
        for bolus in &self.data {
            if bolus.manual {
                stats.n_manual += 1;
            } else {
                stats.n_automated += 1;
            }
            if bolus.interrupted == Some(true) {
                stats.n_interrupted += 1;
            }
        }
        self.stats = Some(BucketStats::Bolus(stats));
    }
}

impl BasicsBucket<SharedDatum> {
    pub(crate) fn compute_basal_stats(&mut self) {
        let mut stats = BasalStats::default();
        for basal in &self.data {
            match basal.text("deliveryType") {
                Some("automated") => stats.n_automated += 1,
                Some("scheduled") => stats.n_scheduled += 1,
                _ => {}
            }
        }
        self.stats = Some(BucketStats::Basal(stats));
    }
}

fn average_per_day(total: usize, days: usize) -> u64 {
    if days == 0 {
        return 0;
    }
    (total as f64 / days as f64).round() as u64
}
