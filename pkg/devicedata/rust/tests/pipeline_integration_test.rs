// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use device_data::basics::{BucketKind, DayTag};
use device_data::datetime::parse_time;
use device_data::{DatumKind, DeviceData, Dimension, IdGenerator, Key, Options};
use serde_json::{Value, json};

fn load(records: Vec<Value>) -> DeviceData {
    DeviceData::with_id_source(records, Options::default(), IdGenerator::seeded(7))
}

fn cbg(id: &str, time: &str, tz: &str) -> Value {
    json!({
        "id": id, "type": "cbg", "time": time, "timezone": tz,
        "value": 140, "units": "mg/dL",
    })
}

fn bolus(id: &str, time: &str, normal: f64, expected: f64) -> Value {
    json!({
        "id": id, "type": "bolus", "subType": "normal", "time": time, "timezone": "UTC",
        "normal": normal, "expectedNormal": expected, "deviceId": "pump-1",
    })
}

fn ids(dd: &DeviceData) -> Vec<String> {
    dd.data()
        .iter()
        .filter(|d| d.kind != DatumKind::Fill)
        .map(|d| d.id.clone())
        .collect()
}

#[test]
fn test_timeline_is_ordered_and_unique() {
    let dd = load(vec![
        cbg("c3", "2023-03-15T12:00:00Z", "UTC"),
        cbg("c1", "2023-03-15T10:00:00Z", "UTC"),
        cbg("c2", "2023-03-15T11:00:00Z", "UTC"),
        json!({"type": "smbg", "time": "2023-03-15T10:30:00Z", "value": 7.2, "units": "mmol/L"}),
    ]);

    let data = dd.data();
    assert!(data.windows(2).all(|w| w[0].normal_time <= w[1].normal_time));
    let mut seen = std::collections::HashSet::new();
    assert!(data.iter().all(|d| seen.insert(d.id.clone())));

    let smbg = dd.grouped().get(&DatumKind::Smbg);
    assert_eq!(smbg.len(), 1);
    assert_eq!(smbg[0].id.len(), 32);
    assert!((smbg[0].value.unwrap() - 129.712_248).abs() < 1e-6);
}

#[test]
fn test_duplicates_keep_first() {
    let dd = load(vec![
        cbg("same", "2023-03-15T11:00:00Z", "UTC"),
        cbg("same", "2023-03-15T10:00:00Z", "UTC"),
        cbg("other", "2023-03-15T12:00:00Z", "UTC"),
    ]);
    let same: Vec<_> = dd.data().iter().filter(|d| d.id == "same").collect();
    assert_eq!(same.len(), 1);
    assert_eq!(same[0].normal_time_iso(), "2023-03-15T10:00:00.000Z");
    assert_eq!(dd.diagnostics().duplicates, 1);
}

#[test]
fn test_duplicates_across_batches_dropped() {
    let mut dd = load(vec![cbg("a", "2023-03-15T10:00:00Z", "UTC")]);
    dd.add_data(vec![cbg("a", "2023-03-15T10:00:00Z", "UTC")]);
    assert_eq!(ids(&dd), vec!["a"]);
    assert_eq!(dd.diagnostics().duplicates, 1);
}

#[test]
fn test_add_data_is_cumulative() {
    let mut dd = load(vec![cbg("b", "2023-03-15T11:00:00Z", "UTC")]);
    dd.add_data(vec![cbg("a", "2023-03-15T10:00:00Z", "UTC")]);
    assert_eq!(ids(&dd), vec!["a", "b"]);
    dd.add_data(Vec::new());
    assert_eq!(ids(&dd), vec!["a", "b"]);
}

#[test]
fn test_invalid_records_are_quarantined() {
    let dd = load(vec![
        cbg("ok", "2023-03-15T10:00:00Z", "UTC"),
        json!({"id": "no-time", "type": "cbg", "value": 100, "units": "mg/dL"}),
        json!({"id": "bad-time", "type": "cbg", "time": "yesterday", "value": 100, "units": "mg/dL"}),
        json!("not a record"),
    ]);
    assert_eq!(ids(&dd), vec!["ok"]);
    assert_eq!(dd.diagnostics().invalid, 3);
}

#[test]
fn test_timezone_change_marker() {
    let dd = load(vec![
        cbg("a", "2023-03-15T08:00:00Z", "UTC"),
        cbg("b", "2023-03-15T09:00:00Z", "UTC"),
        cbg("c", "2023-03-15T10:00:00Z", "Europe/Paris"),
        cbg("d", "2023-03-15T11:00:00Z", "Europe/Paris"),
    ]);
    let timeline: Vec<_> = dd
        .data()
        .iter()
        .filter(|d| d.kind != DatumKind::Fill)
        .collect();
    let markers: Vec<usize> = timeline
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_time_change())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(markers.len(), 1);
    assert_eq!(timeline[markers[0] + 1].id, "c");

    let change = timeline[markers[0]].time_change.as_ref().unwrap();
    assert_eq!(change.from.time_zone_name, "UTC");
    assert_eq!(change.from.time, "2023-03-15T10:00:00");
    assert_eq!(change.to.time, "2023-03-15T11:00:00");
    assert_eq!(dd.diagnostics().timezone_changes, 1);
    assert_eq!(dd.time_prefs().timezone_name, "Europe/Paris");
}

#[test]
fn test_fill_covers_endpoints() {
    let dd = load(vec![
        cbg("a", "2023-03-14T22:00:00Z", "UTC"),
        cbg("b", "2023-03-15T02:00:00Z", "UTC"),
    ]);
    let fills = dd.grouped().get(&DatumKind::Fill);
    assert_eq!(fills.len(), 16);
    let endpoints = dd.endpoints().unwrap();
    let first = fills.first().unwrap();
    let last = fills.last().unwrap();
    assert!(first.normal_time <= endpoints.start);
    assert!(last.normal_end.unwrap() >= endpoints.end);
    for pair in fills.windows(2) {
        assert_eq!(pair[0].normal_end, Some(pair[1].normal_time));
    }
}

#[test]
fn test_device_parameter_clusters() {
    let param = |id: &str, time: &str| {
        json!({
            "id": id, "type": "deviceEvent", "subType": "deviceParameter",
            "time": time, "timezone": "UTC", "name": "MEAL_RATIO", "value": "100",
        })
    };
    let dd = DeviceData::with_id_source(
        vec![
            param("p1", "2023-03-15T10:00:00Z"),
            param("p2", "2023-03-15T10:00:10Z"),
            param("p3", "2023-03-15T10:02:00Z"),
        ],
        Options {
            device_params_offset: 60_000,
            ..Options::default()
        },
        IdGenerator::seeded(1),
    );
    let clusters = dd.device_parameters();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].params.len(), 2);
    assert_eq!(clusters[1].id, "p3");
}

#[test]
fn test_basics_window() {
    let mut records = vec![
        cbg("c-old", "2023-03-01T10:00:00Z", "UTC"),
        cbg("c-last", "2023-03-15T10:00:00Z", "UTC"),
        bolus("b-int", "2023-03-14T08:00:00Z", 2.0, 2.5),
        bolus("b-full", "2023-03-14T12:00:00Z", 2.0, 2.0),
        json!({
            "id": "w1", "type": "wizard", "time": "2023-03-14T08:00:00Z", "timezone": "UTC",
            "carbInput": 40, "bolus": "b-full", "units": "mg/dL",
        }),
        json!({
            "id": "w2", "type": "wizard", "time": "2023-03-14T09:00:00Z", "timezone": "UTC",
            "carbInput": 20, "bolus": "missing", "units": "mg/dL",
        }),
    ];
    records.push(json!({
        "id": "late-food", "type": "food", "time": "2023-03-16T10:00:00Z",
        "timezone": "UTC", "meal": "rescuecarbs",
        "nutrition": { "carbohydrate": { "net": 12 } },
    }));
    let dd = load(records);
    let basics = dd.basics_data();

    assert_eq!(
        basics.date_range,
        vec!["2023-02-27T00:00:00.000Z", "2023-03-15T10:00:00.000Z"]
    );
    let most_recent: Vec<_> = basics
        .days
        .iter()
        .filter(|d| d.tag == DayTag::MostRecent)
        .collect();
    assert_eq!(most_recent.len(), 1);
    assert_eq!(most_recent[0].date.to_string(), "2023-03-15");
    assert_eq!(basics.days.iter().filter(|d| d.tag == DayTag::Future).count(), 4);

    assert_eq!(basics.bucket(&BucketKind::Cbg).unwrap().len(), 2);
    let boluses = &basics.bolus.data;
    assert_eq!(boluses.len(), 2);
    assert_eq!(boluses[0].interrupted, Some(true));
    assert!(!boluses[0].manual);
    assert_eq!(boluses[1].interrupted, Some(false));
    assert!(boluses[1].manual);
    assert!(boluses[1].fields.get("deviceId").is_none());
    assert_eq!(dd.diagnostics().missing_bolus_refs, 1);

    assert_eq!(dd.daily_data().food.len(), 1);
    assert_eq!(dd.daily_data().bolus_max, 2.5);
}

#[test]
fn test_get_timezone() {
    let dd = load(vec![
        cbg("a", "2023-03-10T10:00:00Z", "America/New_York"),
        cbg("b", "2023-03-12T10:00:00Z", "America/New_York"),
        cbg("c", "2023-03-15T10:00:00Z", "Europe/Paris"),
    ]);
    assert!(!dd.grouped().get(&DatumKind::Fill).is_empty());
    let at = |s: &str| parse_time(s).unwrap();
    assert_eq!(dd.get_timezone(at("2020-01-01T00:00:00Z")), "America/New_York");
    assert_eq!(dd.get_timezone(at("2023-03-11T00:00:00Z")), "America/New_York");
    assert_eq!(dd.get_timezone(at("2023-03-12T11:00:00Z")), "America/New_York");
    assert_eq!(dd.get_timezone(at("2023-03-12T11:30:00Z")), "America/New_York");
    assert_eq!(dd.get_timezone(at("2023-03-15T07:00:00Z")), "Europe/Paris");
    assert_eq!(dd.get_timezone(at("2030-01-01T00:00:00Z")), "Europe/Paris");
}

#[test]
fn test_stateful_index_discipline() {
    let mut dd = load(vec![
        cbg("sun", "2023-03-12T10:00:00Z", "UTC"),
        cbg("mon", "2023-03-13T10:00:00Z", "UTC"),
        cbg("tue", "2023-03-14T10:00:00Z", "UTC"),
    ]);
    let index = dd.cbg_index_mut();
    let dim = index.dimension("datetime").unwrap();
    let found = index.filter_range(
        dim,
        Key::Time(parse_time("2023-03-13T00:00:00Z").unwrap()),
        Key::Time(parse_time("2023-03-14T23:59:59Z").unwrap()),
    );
    assert_eq!(found.len(), 2);

    let found = index.filter_exact(Dimension::DayOfWeek, Key::Weekday(0));
    assert!(found.is_empty());

    index.clear_all();
    let found = index.filter_exact(Dimension::DayOfWeek, Key::Weekday(0));
    assert_eq!(found[0].id, "sun");
    index.clear(Dimension::DayOfWeek);
    assert_eq!(index.records().len(), 3);

    assert!(index.dimension("id").is_none());
}

#[test]
fn test_mmol_options() {
    let dd = DeviceData::from_json(
        &json!([{"id": "c", "type": "cbg", "time": "2023-03-15T10:00:00Z",
                 "timezone": "UTC", "value": 180.156, "units": "mg/dL"}]),
        Some(&json!({"bgUnits": "mmol/L"})),
    )
    .unwrap();
    assert_eq!(dd.bg_classes().target.boundary, 10.0);
    let value = dd.grouped().get(&DatumKind::Cbg)[0].value.unwrap();
    assert!((value - 10.0).abs() < 1e-3);
}

#[test]
fn test_serialized_timeline() {
    let dd = load(vec![cbg("a", "2023-03-15T10:00:00Z", "Europe/Paris")]);
    let value = serde_json::to_value(dd.data()).unwrap();
    let first = &value[0];
    assert_eq!(first["type"], "cbg");
    assert_eq!(first["normalTime"], "2023-03-15T10:00:00.000Z");
    assert_eq!(first["displayOffset"], -60);
    assert_eq!(first["localDate"], "2023-03-15");
    assert_eq!(first["localDayOfWeek"], "wednesday");
    assert_eq!(first["source"], "Diabeloop");
}

#[test]
fn test_out_of_range_durations_do_not_abort_the_batch() {
    let dd = load(vec![
        cbg("a", "2023-03-15T10:00:00Z", "UTC"),
        json!({"id": "b1", "type": "basal", "time": "2023-03-15T10:00:00Z",
               "timezone": "UTC", "duration": -1e300, "deliveryType": "scheduled"}),
        json!({"id": "b2", "type": "basal", "time": "2023-03-15T11:00:00Z",
               "timezone": "UTC", "duration": 1e12, "deliveryType": "scheduled"}),
        json!({"id": "p1", "type": "physicalActivity", "time": "2023-03-15T12:00:00Z",
               "timezone": "UTC", "duration": {"value": -1e300, "units": "hours"}}),
        cbg("c", "2023-03-15T13:00:00Z", "UTC"),
    ]);
    assert_eq!(ids(&dd), vec!["a", "c"]);
    assert_eq!(dd.diagnostics().invalid, 3);
    // One local day of default fills.
    assert_eq!(dd.grouped().get(&DatumKind::Fill).len(), 8);
}

#[test]
fn test_partial_bg_classes() {
    let dd = DeviceData::from_json(
        &json!([]),
        Some(&json!({"bgClasses": {"low": {"boundary": 80}}})),
    )
    .unwrap();
    let classes = dd.bg_classes();
    assert_eq!(classes.low.boundary, 80.0);
    assert_eq!(classes.target.boundary, 180.0);
    assert_eq!(classes.very_low.boundary, 54.0);
}

#[test]
fn test_marker_id_stable_across_batches() {
    let marker_ids = |dd: &DeviceData| -> Vec<String> {
        dd.data()
            .iter()
            .filter(|d| d.is_time_change())
            .map(|d| d.id.clone())
            .collect()
    };
    let mut dd = load(vec![
        cbg("a", "2023-03-15T08:00:00Z", "UTC"),
        cbg("b", "2023-03-15T10:00:00Z", "Europe/Paris"),
    ]);
    let before = marker_ids(&dd);
    assert_eq!(before, vec!["tz-20230315T100000000Z".to_string()]);

    dd.add_data(vec![cbg("c", "2023-03-15T12:00:00Z", "Europe/Paris")]);
    assert_eq!(marker_ids(&dd), before);
}

#[test]
fn test_basics_serialization_shape() {
    let dd = load(vec![
        cbg("c", "2023-03-15T10:00:00Z", "UTC"),
        bolus("b", "2023-03-15T11:00:00Z", 2.0, 2.0),
    ]);
    let value = serde_json::to_value(dd.basics_data()).unwrap();
    assert_eq!(value["buckets"]["bolus"]["data"][0]["id"], "b");
    assert_eq!(value["buckets"]["cbg"]["data"][0]["id"], "c");
}
