// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Timezone change detection.
//!
//! Runs inline with deduplication, over records in time order. When the zone
//! of the stream changes without the device having reported it, a
//! `deviceEvent`/`timeChange` marker is synthesized so the charts can show
//! the transition.

use chrono::{DateTime, Utc};
use log::info;
use serde_json::Map;

use crate::datetime::{self, UTC_ZONE};
use crate::datum::{Datum, DatumKind, TimeChange, ZoneStamp, sub_type};

pub const AUTOMATIC_METHOD: &str = "automatic";

#[derive(Debug, Default)]
pub struct TimezoneTracker {
    current: Option<String>,
    markers: usize,
    /// Instant of the previous marker and how many markers share it.
    last_marker: Option<(DateTime<Utc>, usize)>,
}

impl TimezoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone of the most recent record seen, after any transition.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Number of markers synthesized so far.
    pub fn markers(&self) -> usize {
        self.markers
    }

    /// Feed the next record. Returns the marker to insert just before it when
    /// it starts a new zone.
    ///
    /// Marker ids derive from the transition instant, so the same transition
    /// keeps its id when the data is rebuilt.
    ///
    /// Records in `UTC` never trigger a transition: UTC is what normalization
    /// assigns when the device did not report a zone.
    pub fn observe(&mut self, datum: &Datum) -> Option<Datum> {
        let Some(current) = self.current.as_deref() else {
            self.current = Some(datum.timezone.clone());
            return None;
        };
        if current == datum.timezone || datum.timezone == UTC_ZONE {
            return None;
        }

        if datum.is_time_change() {
            self.current = Some(datum.timezone.clone());
            return None;
        }

        let ordinal = match self.last_marker {
            Some((at, n)) if at == datum.normal_time => n + 1,
            _ => 0,
        };
        let marker = build_marker(current, datum, marker_id(datum, ordinal));
        info!(
            "Timezone change detected {} -> {} at {}",
            current,
            datum.timezone,
            datum.normal_time_iso()
        );
        self.current = Some(datum.timezone.clone());
        self.markers += 1;
        self.last_marker = Some((datum.normal_time, ordinal));
        Some(marker)
    }
}

/// `tz-<instant>`, suffixed when several transitions share the instant.
fn marker_id(datum: &Datum, ordinal: usize) -> String {
    let instant = datetime::compact_iso(&datum.normal_time);
    match ordinal {
        0 => format!("tz-{instant}"),
        n => format!("tz-{instant}-{n}"),
    }
}

fn build_marker(from_zone: &str, datum: &Datum, id: String) -> Datum {
    let from_tz = datetime::zone_or_utc(from_zone);
    let to_tz = datum.zone();

    let mut extra = Map::new();
    if let Some(offset) = datum.extra.get("timezoneOffset") {
        extra.insert("timezoneOffset".to_string(), offset.clone());
    }

    Datum {
        id,
        kind: DatumKind::DeviceEvent,
        sub_type: Some(sub_type::TIME_CHANGE.to_string()),
        time: datum.normal_time_iso(),
        normal_time: datum.normal_time,
        normal_end: None,
        timezone: datum.timezone.clone(),
        display_offset: datum.display_offset,
        source: datum.source.clone(),
        units: None,
        value: None,
        local: None,
        fill: None,
        time_change: Some(TimeChange {
            from: ZoneStamp {
                time: datetime::wall_time(&datum.normal_time, from_tz),
                time_zone_name: from_zone.to_string(),
            },
            to: ZoneStamp {
                time: datetime::wall_time(&datum.normal_time, to_tz),
                time_zone_name: datum.timezone.clone(),
            },
            method: AUTOMATIC_METHOD.to_string(),
        }),
        extra,
    }
}
