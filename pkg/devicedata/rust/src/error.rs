// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

/// Errors surfaced to the caller. Anything that concerns a single record is
/// absorbed by the pipeline and reported through
/// [`Diagnostics`](crate::ingest::Diagnostics) instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter data: expected an array of records, got {found}")]
    InvalidData { found: &'static str },
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
    #[error("unknown index dimension: {0}")]
    UnknownDimension(String),
}

/// Why a record was quarantined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing time")]
    MissingTime,
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("schema validation failed: {0}")]
    Schema(String),
}

/// Name of a JSON value kind, used in error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
