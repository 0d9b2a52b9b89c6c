// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Background shading records for the daily chart.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::Map;

use crate::config::FillOpts;
use crate::datetime::{self, MS_PER_HOUR};
use crate::datum::{Datum, DatumKind, FillInfo};
use crate::ingest::Endpoints;

/// Cover `endpoints`, widened to whole local days in `tz`, with fill records
/// of `opts.duration` hours each.
pub fn synthesize(endpoints: &Endpoints, tz: Tz, opts: &FillOpts, source: &str) -> Vec<Datum> {
    let first = datetime::start_of_day(datetime::local_date(&endpoints.start, tz), tz);
    let last = datetime::end_of_day(datetime::local_date(&endpoints.end, tz), tz);
    let step = Duration::hours(i64::from(opts.duration.max(1)));

    let mut fills = Vec::new();
    let mut start = first;
    while start <= last {
        let hour = datetime::local_hour(&start, tz);
        if let Some(class) = opts.classes.get(&hour) {
            fills.push(fill_record(start, start + step, hour, class, tz, source));
        }
        start += step;
    }
    fills
}

fn fill_record(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hour: u32,
    class: &str,
    tz: Tz,
    source: &str,
) -> Datum {
    Datum {
        id: format!("fill-{}", datetime::compact_iso(&start)),
        kind: DatumKind::Fill,
        sub_type: None,
        time: datetime::iso(&start),
        normal_time: start,
        normal_end: Some(end),
        timezone: tz.name().to_string(),
        display_offset: 0,
        source: source.to_string(),
        units: None,
        value: None,
        local: None,
        fill: Some(FillInfo {
            fill_color: class.to_string(),
            fill_date: datetime::local_date(&start, tz),
            starts_at_midnight: hour == 0,
            two_week_x: i64::from(hour) * MS_PER_HOUR,
        }),
        time_change: None,
        extra: Map::new(),
    }
}
