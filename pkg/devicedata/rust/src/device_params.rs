// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Grouping of device parameter changes that happened close together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::datetime::iso8601;
use crate::datum::{DatumKind, SharedDatum, sub_type};

/// Parameter changes anchored at the first change of the group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceParameterCluster {
    #[serde(serialize_with = "iso8601::serialize")]
    pub normal_time: DateTime<Utc>,
    /// Id of the anchoring change.
    pub id: String,
    pub params: Vec<SharedDatum>,
}

/// Cluster the `deviceParameter` events of `data`, which must be time
/// ordered. A record joins the current cluster when it is less than
/// `offset_ms` after the anchor.
pub fn cluster_parameters(data: &[SharedDatum], offset_ms: i64) -> Vec<DeviceParameterCluster> {
    let mut clusters: Vec<DeviceParameterCluster> = Vec::new();
    let params = data
        .iter()
        .filter(|d| d.kind == DatumKind::DeviceEvent && d.has_sub_type(sub_type::DEVICE_PARAMETER));

    for datum in params {
        match clusters.last_mut() {
            Some(cluster)
                if (datum.normal_time - cluster.normal_time).num_milliseconds() < offset_ms =>
            {
                cluster.params.push(Arc::clone(datum));
            }
            _ => clusters.push(DeviceParameterCluster {
                normal_time: datum.normal_time,
                id: datum.id.clone(),
                params: vec![Arc::clone(datum)],
            }),
        }
    }
    clusters
}
