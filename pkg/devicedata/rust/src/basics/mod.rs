// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Calendar window aggregation for the basics view.
//!
//! The window ends at the last relevant record and starts at the local
//! midnight opening the ISO week two weeks before the week of that record.
//! Records in the window are routed into per-type buckets, each with a
//! by-date map and an average count per active day.

mod bucket;

pub use bucket::{
    BasalStats, BasicsBolus, BasicsBucket, BolusStats, BucketItem, BucketKind, BucketStats,
};

use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Options;
use crate::datetime::{self, UTC_ZONE};
use crate::datum::{Datum, DatumKind, SharedDatum, sub_type};
use crate::index::{CrossIndex, Dimension, Filter, Key};
use crate::ingest::Diagnostics;

/// History shown before the ISO week of the last record, in days.
const HISTORY_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DayTag {
    Past,
    MostRecent,
    Future,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicsDay {
    #[serde(rename = "type")]
    pub tag: DayTag,
    pub date: NaiveDate,
}

/// Serialized as `{timezone, dateRange, days, buckets}`, the bolus bucket
/// appearing under `buckets.bolus`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicsWindow {
    /// Zone of the last relevant record.
    pub timezone: String,
    /// Window start and end as UTC ISO strings. Empty when there is no
    /// relevant record.
    pub date_range: Vec<String>,
    pub days: Vec<BasicsDay>,
    pub buckets: BTreeMap<BucketKind, BasicsBucket<SharedDatum>>,
    /// Stripped bolus copies, kept apart from `buckets` for their own type.
    pub bolus: BasicsBucket<BasicsBolus>,
}

impl Serialize for BasicsWindow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut window = serializer.serialize_struct("BasicsWindow", 4)?;
        window.serialize_field("timezone", &self.timezone)?;
        window.serialize_field("dateRange", &self.date_range)?;
        window.serialize_field("days", &self.days)?;
        window.serialize_field("buckets", &AllBuckets(self))?;
        window.end()
    }
}

struct AllBuckets<'a>(&'a BasicsWindow);

impl Serialize for AllBuckets<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let window = self.0;
        let mut map = serializer.serialize_map(Some(window.buckets.len() + 1))?;
        for (kind, bucket) in &window.buckets {
            map.serialize_entry(kind, bucket)?;
        }
        map.serialize_entry(&BucketKind::Bolus, &window.bolus)?;
        map.end()
    }
}

impl Default for BasicsWindow {
    fn default() -> Self {
        let buckets = [
            BucketKind::ReservoirChange,
            BucketKind::CannulaPrime,
            BucketKind::TubingPrime,
            BucketKind::Calibration,
            BucketKind::Upload,
            BucketKind::Basal,
            BucketKind::Cbg,
            BucketKind::Smbg,
            BucketKind::Wizard,
        ]
        .into_iter()
        .map(|kind| (kind, BasicsBucket::default()))
        .collect();
        Self {
            timezone: UTC_ZONE.to_string(),
            date_range: Vec::new(),
            days: Vec::new(),
            buckets,
            bolus: BasicsBucket::default(),
        }
    }
}

impl BasicsWindow {
    pub fn bucket(&self, kind: &BucketKind) -> Option<&BasicsBucket<SharedDatum>> {
        self.buckets.get(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Records that can end the basics window.
fn is_relevant(datum: &Datum) -> bool {
    match datum.kind {
        DatumKind::Basal
        | DatumKind::Wizard
        | DatumKind::Bolus
        | DatumKind::Cbg
        | DatumKind::Smbg
        | DatumKind::PhysicalActivity => true,
        DatumKind::DeviceEvent => [
            sub_type::RESERVOIR_CHANGE,
            sub_type::PRIME,
            sub_type::CALIBRATION,
            sub_type::DEVICE_PARAMETER,
        ]
        .iter()
        .any(|s| datum.has_sub_type(s)),
        _ => false,
    }
}

/// Bucket of a non-bolus record. `None` for records no bucket collects.
fn route(datum: &Datum) -> Option<BucketKind> {
    match &datum.kind {
        DatumKind::DeviceEvent => match datum.sub_type.as_deref()? {
            sub_type::RESERVOIR_CHANGE => Some(BucketKind::ReservoirChange),
            sub_type::PRIME => match datum.text("primeTarget") {
                Some("cannula") => Some(BucketKind::CannulaPrime),
                Some("tubing") => Some(BucketKind::TubingPrime),
                _ => None,
            },
            sub_type::CALIBRATION => Some(BucketKind::Calibration),
            _ => None,
        },
        DatumKind::Upload | DatumKind::Bolus => None,
        DatumKind::Basal => Some(BucketKind::Basal),
        DatumKind::Cbg => Some(BucketKind::Cbg),
        DatumKind::Smbg => Some(BucketKind::Smbg),
        DatumKind::Wizard => Some(BucketKind::Wizard),
        other => Some(BucketKind::Other(other.as_str().to_string())),
    }
}

fn days(last: NaiveDate) -> Vec<BasicsDay> {
    let first = datetime::iso_week_start(last) - Duration::days(HISTORY_DAYS);
    let end = datetime::iso_week_end(last);
    first
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| BasicsDay {
            tag: match date.cmp(&last) {
                Ordering::Less => DayTag::Past,
                Ordering::Equal => DayTag::MostRecent,
                Ordering::Greater => DayTag::Future,
            },
            date,
        })
        .collect()
}

/// Build the basics window over `data`, the merged timeline indexed by
/// `index` on datetime and id.
pub fn build(
    data: &[SharedDatum],
    index: &CrossIndex,
    uploads: &[SharedDatum],
    opts: &Options,
    diagnostics: &mut Diagnostics,
) -> BasicsWindow {
    let mut window = BasicsWindow::default();
    let Some(last) = data.iter().rev().find(|d| is_relevant(d)) else {
        debug!("no relevant data for the basics window");
        return window;
    };

    let tz = last.zone();
    let last_date = last.local_date();
    let start = datetime::start_of_day(
        datetime::iso_week_start(last_date) - Duration::days(HISTORY_DAYS),
        tz,
    );
    let end = last.normal_time;
    window.timezone = last.timezone.clone();
    window.date_range = vec![datetime::iso(&start), datetime::iso(&end)];
    window.days = days(last_date);
    window.buckets.insert(
        BucketKind::Upload,
        BasicsBucket::passthrough(uploads.to_vec()),
    );

    let in_window = index.select(&[Filter::range(
        Dimension::DateTime,
        Key::Time(start),
        Key::Time(end),
    )]);
    for datum in in_window.iter().filter(|d| opts.is_basics_type(&d.kind)) {
        if datum.kind == DatumKind::Bolus {
            window.bolus.push(BasicsBolus::from_datum(datum));
        } else if let Some(kind) = route(datum) {
            window.buckets.entry(kind).or_default().push(Arc::clone(datum));
        }
    }

    link_wizards(&mut window, index, diagnostics);

    for (kind, bucket) in window.buckets.iter_mut() {
        match kind {
            BucketKind::Upload => continue,
            BucketKind::Basal => bucket.compute_basal_stats(),
            _ => {}
        }
        bucket.index_by_date();
    }
    window.bolus.index_by_date();
    window.bolus.compute_bolus_stats();

    debug!(
        "basics window {:?}: {} days, {} boluses",
        window.date_range,
        window.days.len(),
        window.bolus.len()
    );
    window
}

/// A wizard referencing a bolus marks it manual.
fn link_wizards(window: &mut BasicsWindow, index: &CrossIndex, diagnostics: &mut Diagnostics) {
    let Some(wizards) = window.buckets.get(&BucketKind::Wizard) else {
        return;
    };
    for wizard in &wizards.data {
        let Some(bolus_id) = wizard.text("bolus") else {
            debug!("No bolus id on wizard {}", wizard.id);
            continue;
        };
        let known = index.select(&[Filter::exact(Dimension::Id, Key::Id(bolus_id.to_string()))]);
        if known.is_empty() {
            warn!("Missing global bolus {} for wizard {}", bolus_id, wizard.id);
            diagnostics.missing_bolus_refs += 1;
        }
        if let Some(bolus) = window.bolus.data.iter_mut().find(|b| b.id == bolus_id) {
            bolus.manual = true;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::datum::tests::datum;
    use serde_json::json;

    fn shared(d: Datum) -> SharedDatum {
        Arc::new(d)
    }

    fn run(data: &[SharedDatum]) -> (BasicsWindow, Diagnostics) {
        let index = CrossIndex::new(data, &[Dimension::DateTime, Dimension::Id]);
        let mut diagnostics = Diagnostics::default();
        let window = build(data, &index, &[], &Options::default(), &mut diagnostics);
        (window, diagnostics)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_window_and_days() {
        let data = vec![
            shared(datum("old", DatumKind::Cbg, "2023-02-20T10:00:00Z", "UTC")),
            shared(datum("c", DatumKind::Cbg, "2023-03-15T10:00:00Z", "UTC")),
            shared(datum("note", DatumKind::Food, "2023-03-15T11:00:00Z", "UTC")),
        ];
        let (window, _) = run(&data);
        assert_eq!(
            window.date_range,
            vec!["2023-02-27T00:00:00.000Z", "2023-03-15T10:00:00.000Z"]
        );
        assert_eq!(window.days.len(), 21);
        assert_eq!(window.days[0].date, date("2023-02-27"));
        let most_recent: Vec<_> = window
            .days
            .iter()
            .filter(|d| d.tag == DayTag::MostRecent)
            .collect();
        assert_eq!(most_recent.len(), 1);
        assert_eq!(most_recent[0].date, date("2023-03-15"));
        assert_eq!(window.days.iter().filter(|d| d.tag == DayTag::Future).count(), 4);
        assert_eq!(window.days.last().unwrap().date, date("2023-03-19"));

        let cbg = window.bucket(&BucketKind::Cbg).unwrap();
        assert_eq!(cbg.len(), 1);
        assert_eq!(cbg.data[0].id, "c");
    }

    #[test]
    fn test_window_in_local_zone() {
        let data = vec![shared(datum(
            "c",
            DatumKind::Smbg,
            "2023-03-15T10:00:00Z",
            "Europe/Paris",
        ))];
        let (window, _) = run(&data);
        assert_eq!(window.timezone, "Europe/Paris");
        assert_eq!(window.date_range[0], "2023-02-26T23:00:00.000Z");
    }

    #[test]
    fn test_empty_without_relevant_record() {
        let data = vec![shared(datum("f", DatumKind::Food, "2023-03-15T10:00:00Z", "UTC"))];
        let (window, _) = run(&data);
        assert!(window.is_empty());
        assert!(window.date_range.is_empty());
        assert_eq!(window.timezone, "UTC");
    }

    #[test]
    fn test_device_event_routing() {
        let event = |id: &str, sub: &str, target: Option<&str>| {
            let mut d = datum(id, DatumKind::DeviceEvent, "2023-03-15T09:00:00Z", "UTC");
            d.sub_type = Some(sub.to_string());
            if let Some(t) = target {
                d.extra.insert("primeTarget".into(), json!(t));
            }
            shared(d)
        };
        let data = vec![
            event("r", sub_type::RESERVOIR_CHANGE, None),
            event("pc", sub_type::PRIME, Some("cannula")),
            event("pt", sub_type::PRIME, Some("tubing")),
            event("cal", sub_type::CALIBRATION, None),
            event("tc", sub_type::TIME_CHANGE, None),
        ];
        let (window, _) = run(&data);
        for kind in [
            BucketKind::ReservoirChange,
            BucketKind::CannulaPrime,
            BucketKind::TubingPrime,
            BucketKind::Calibration,
        ] {
            assert_eq!(window.bucket(&kind).unwrap().len(), 1, "{kind}");
        }
        let reservoir = window.bucket(&BucketKind::ReservoirChange).unwrap();
        assert_eq!(reservoir.by_date.as_ref().unwrap().len(), 1);
        assert_eq!(reservoir.avg_per_day, 1);
    }

    #[test]
    fn test_wizard_marks_bolus_manual() {
        let mut bolus = datum("b1", DatumKind::Bolus, "2023-03-15T10:00:00Z", "UTC");
        bolus.extra.insert("normal".into(), json!(2.0));
        bolus.extra.insert("expectedNormal".into(), json!(2.5));
        let auto = datum("b2", DatumKind::Bolus, "2023-03-15T11:00:00Z", "UTC");
        let mut wizard = datum("w1", DatumKind::Wizard, "2023-03-15T10:00:00Z", "UTC");
        wizard.extra.insert("bolus".into(), json!("b1"));
        let mut orphan = datum("w2", DatumKind::Wizard, "2023-03-15T12:00:00Z", "UTC");
        orphan.extra.insert("bolus".into(), json!("gone"));

        let data = vec![shared(bolus), shared(wizard), shared(auto), shared(orphan)];
        let (window, diagnostics) = run(&data);

        assert_eq!(window.bolus.len(), 2);
        assert!(window.bolus.data[0].manual);
        assert!(!window.bolus.data[1].manual);
        assert_eq!(
            window.bolus.stats,
            Some(BucketStats::Bolus(BolusStats {
                n_manual: 1,
                n_automated: 1,
                n_interrupted: 1,
            }))
        );
        let by_date = window.bolus.by_date.as_ref().unwrap();
        assert!(by_date[&date("2023-03-15")][0].manual);
        assert_eq!(diagnostics.missing_bolus_refs, 1);
        // Shared records are never modified.
        assert!(data[0].extra.get("manual").is_none());
    }

    #[test]
    fn test_serialized_buckets_include_bolus() {
        let mut bolus = datum("b1", DatumKind::Bolus, "2023-03-15T10:00:00Z", "UTC");
        bolus.extra.insert("normal".into(), json!(2.0));
        let data = vec![
            shared(bolus),
            shared(datum("c", DatumKind::Cbg, "2023-03-15T11:00:00Z", "UTC")),
        ];
        let (window, _) = run(&data);
        let value = serde_json::to_value(&window).unwrap();

        assert_eq!(value["timezone"], "UTC");
        assert_eq!(value["dateRange"][1], "2023-03-15T11:00:00.000Z");
        assert_eq!(value["days"][0]["type"], "past");
        let buckets = value["buckets"].as_object().unwrap();
        assert_eq!(buckets["bolus"]["data"][0]["id"], "b1");
        assert_eq!(buckets["bolus"]["nAutomated"], 1);
        assert_eq!(buckets["cbg"]["avgPerDay"], 1);
        assert!(buckets.contains_key("reservoirChange"));
        assert!(value.get("bolus").is_none());
    }

    #[test]
    fn test_other_allowlisted_types() {
        let data = vec![
            shared(datum("f", DatumKind::Food, "2023-03-15T09:00:00Z", "UTC")),
            shared(datum("c", DatumKind::Cbg, "2023-03-15T10:00:00Z", "UTC")),
        ];
        let index = CrossIndex::new(&data, &[Dimension::DateTime, Dimension::Id]);
        let mut opts = Options::default();
        opts.basics_types.push(DatumKind::Food);
        let window = build(&data, &index, &[], &opts, &mut Diagnostics::default());
        let food = window.bucket(&BucketKind::Other("food".into())).unwrap();
        assert_eq!(food.len(), 1);
    }

    #[test]
    fn test_upload_passthrough() {
        let data = vec![shared(datum("c", DatumKind::Cbg, "2023-03-15T10:00:00Z", "UTC"))];
        let uploads = vec![shared(datum("u", DatumKind::Upload, "2022-01-01T00:00:00Z", "UTC"))];
        let index = CrossIndex::new(&data, &[Dimension::DateTime, Dimension::Id]);
        let window = build(&data, &index, &uploads, &Options::default(), &mut Diagnostics::default());
        let upload = window.bucket(&BucketKind::Upload).unwrap();
        assert_eq!(upload.len(), 1);
        assert!(upload.by_date.is_none());
        assert_eq!(upload.avg_per_day, 0);
    }
}
