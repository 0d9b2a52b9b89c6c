// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Deduplication and filtering of the cumulative buffer into the merged
//! timeline.

use chrono::{DateTime, Utc};
use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Options;
use crate::datetime::iso8601;
use crate::datum::{DatumKind, SharedDatum};
use crate::normalize::Quarantined;
use crate::tzchange::TimezoneTracker;

/// One entry of the cumulative raw buffer, normalized on append.
#[derive(Debug, Clone)]
pub enum Ingested {
    Normalized(SharedDatum),
    Quarantined(Quarantined),
}

impl Ingested {
    /// Sort key of the buffer: quarantined entries first, then by time.
    pub fn sort_key(&self) -> Option<DateTime<Utc>> {
        match self {
            Ingested::Normalized(d) => Some(d.normal_time),
            Ingested::Quarantined(_) => None,
        }
    }
}

/// Per-pass counters. Nothing here is ever surfaced as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub duplicates: usize,
    pub duplicate_ids: Vec<String>,
    pub invalid: usize,
    pub temp_basals: usize,
    pub timezone_changes: usize,
    pub missing_bolus_refs: usize,
}

/// Records grouped by type, each group ordered by time.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: BTreeMap<DatumKind, Vec<SharedDatum>>,
}

impl GroupIndex {
    /// Groups the charts always expect, even when empty.
    pub fn new() -> Self {
        let groups = [
            DatumKind::Fill,
            DatumKind::Upload,
            DatumKind::DeviceEvent,
            DatumKind::Cbg,
            DatumKind::Smbg,
        ]
        .into_iter()
        .map(|kind| (kind, Vec::new()))
        .collect();
        Self { groups }
    }

    pub fn get(&self, kind: &DatumKind) -> &[SharedDatum] {
        self.groups.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = &DatumKind> {
        self.groups.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatumKind, &[SharedDatum])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub(crate) fn push(&mut self, datum: SharedDatum) {
        self.groups.entry(datum.kind.clone()).or_default().push(datum);
    }

    pub(crate) fn replace(&mut self, kind: DatumKind, data: Vec<SharedDatum>) {
        self.groups.insert(kind, data);
    }

    fn sort(&mut self) {
        for group in self.groups.values_mut() {
            group.sort_by_key(|d| d.normal_time);
        }
    }
}

/// Observed time span of the treatment-relevant records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoints {
    #[serde(serialize_with = "iso8601::serialize")]
    pub start: DateTime<Utc>,
    /// Latest end of a treatment: `normalEnd` when the record has one.
    #[serde(serialize_with = "iso8601::serialize")]
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct TreatmentSpan {
    first_time: DateTime<Utc>,
    last_time: DateTime<Utc>,
    last_end: DateTime<Utc>,
    count: usize,
}

impl TreatmentSpan {
    fn start(time: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            first_time: time,
            last_time: time,
            last_end: end.max(time),
            count: 1,
        }
    }

    fn extend(&mut self, time: DateTime<Utc>, end: DateTime<Utc>) {
        self.first_time = self.first_time.min(time);
        self.last_time = self.last_time.max(time);
        self.last_end = self.last_end.max(end).max(time);
        self.count += 1;
    }
}

/// Output of one pass over the cumulative buffer.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    /// Time ordered timeline, uploads excluded.
    pub data: Vec<SharedDatum>,
    pub grouped: GroupIndex,
    pub diabetes_data: Vec<SharedDatum>,
    pub endpoints: Option<Endpoints>,
    /// Number of treatment-relevant records behind `endpoints`.
    pub treatment_count: usize,
    /// Zone of the latest record, after transitions.
    pub timezone: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Deduplicate, group and filter `buffer`, which must already be sorted by
/// [`Ingested::sort_key`]. Timezone markers are synthesized on the way.
pub fn merge(buffer: &[Ingested], opts: &Options) -> Merged {
    let mut merged = Merged {
        grouped: GroupIndex::new(),
        ..Merged::default()
    };
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut tracker = TimezoneTracker::new();
    let mut span: Option<TreatmentSpan> = None;

    for entry in buffer {
        let datum = match entry {
            Ingested::Normalized(datum) => datum,
            Ingested::Quarantined(q) => {
                merged.diagnostics.invalid += 1;
                debug!("invalid datum {:?}: {}", q.id, q.reason);
                continue;
            }
        };

        if datum.kind == DatumKind::Basal && datum.text("deliveryType") == Some("temp") {
            merged.diagnostics.temp_basals += 1;
            continue;
        }

        if !seen.insert(datum.id.as_str()) {
            merged.diagnostics.duplicates += 1;
            merged.diagnostics.duplicate_ids.push(datum.id.clone());
            continue;
        }

        merged.grouped.push(Arc::clone(datum));

        if opts.is_diabetes_type(&datum.kind) {
            merged.diabetes_data.push(Arc::clone(datum));
        }
        if opts.is_basics_type(&datum.kind) {
            let end = datum.normal_end.unwrap_or(datum.normal_time);
            span = Some(match span {
                Some(mut s) => {
                    s.extend(datum.normal_time, end);
                    s
                }
                None => TreatmentSpan::start(datum.normal_time, end),
            });
        }

        if let Some(marker) = tracker.observe(datum) {
            let marker = Arc::new(marker);
            merged.data.push(Arc::clone(&marker));
            merged.grouped.push(marker);
        }

        if datum.kind != DatumKind::Upload {
            merged.data.push(Arc::clone(datum));
        }
    }

    merged.data.sort_by_key(|d| d.normal_time);
    merged.diabetes_data.sort_by_key(|d| d.normal_time);
    merged.grouped.sort();

    if let Some(span) = span {
        merged.data.retain(|d| match d.kind {
            DatumKind::Message => d.normal_time >= span.first_time,
            DatumKind::PumpSettings => {
                d.normal_time >= span.first_time && d.normal_time <= span.last_time
            }
            _ => true,
        });
        merged.endpoints = Some(Endpoints {
            start: span.first_time,
            end: span.last_end,
        });
        merged.treatment_count = span.count;
    }

    merged.timezone = tracker.current().map(str::to_string);
    merged.diagnostics.timezone_changes = tracker.markers();

    info!("Number of data: {}", merged.data.len());
    info!("Number of diabetes data: {}", merged.diabetes_data.len());
    info!("Number of duplicate entries: {}", merged.diagnostics.duplicates);
    info!("Number of invalid entries: {}", merged.diagnostics.invalid);
    if !merged.diagnostics.duplicate_ids.is_empty() {
        debug!("duplicates: {:?}", merged.diagnostics.duplicate_ids);
    }

    merged
}
