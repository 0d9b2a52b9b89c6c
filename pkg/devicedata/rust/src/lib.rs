// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Ingestion of medical device event records.
//!
//! Raw records (glucose readings, insulin deliveries, carbohydrate entries,
//! device events) are normalized, deduplicated and ordered in time, then
//! turned into the views the charts read: per-type groups, background fills,
//! device parameter clusters, daily projections, filterable indices and the
//! basics calendar window. See [`DeviceData`].

// Correctness
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod basics;
pub mod config;
pub mod daily;
mod data;
pub mod datetime;
pub mod datum;
pub mod device_params;
mod error;
pub mod fill;
pub mod index;
pub mod ingest;
pub mod normalize;
pub mod tzchange;
pub mod units;
pub mod validate;

pub use config::{BgClassOverrides, BgClasses, FillOpts, Options, TimePrefs, load_options};
pub use data::DeviceData;
pub use datum::{Datum, DatumKind, SharedDatum};
pub use error::{Error, QuarantineReason};
pub use index::{CrossIndex, Dimension, Filter, Key};
pub use ingest::Diagnostics;
pub use normalize::IdGenerator;
pub use units::BgUnits;
