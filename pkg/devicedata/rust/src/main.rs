// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use device_data::{DatumKind, DeviceData, Options, datetime, load_options};
use log::info;
use serde_json::{Value, json};

/// Ingest a device data export and print a summary of the derived views
#[derive(Parser, Debug)]
#[command(name = "device-data")]
struct Args {
    /// JSON file holding an array of raw records
    #[arg(short, long)]
    input: PathBuf,

    /// JSON options file, merged over the defaults
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Also report the timezone in effect at this instant (RFC 3339)
    #[arg(long)]
    timezone_at: Option<String>,

    /// Print the full merged timeline instead of a summary
    #[arg(long, default_value = "false")]
    dump: bool,
}

fn read_records(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn summary(data: &DeviceData, timezone_at: Option<&str>) -> Result<Value> {
    let groups: serde_json::Map<String, Value> = data
        .grouped()
        .iter()
        .map(|(kind, records)| (kind.to_string(), json!(records.len())))
        .collect();
    let basics = data.basics_data();

    let mut out = json!({
        "records": data.data().len(),
        "diabetesData": data.diabetes_data().len(),
        "groups": groups,
        "fills": data.grouped().get(&DatumKind::Fill).len(),
        "endpoints": data.endpoints(),
        "timezone": data.time_prefs().timezone_name,
        "bgUnits": data.bg_units(),
        "deviceParameters": data.device_parameters().len(),
        "cbgMax": data.daily_data().cbg_max,
        "bolusMax": data.daily_data().bolus_max,
        "basics": {
            "timezone": basics.timezone,
            "dateRange": basics.date_range,
            "days": basics.days.len(),
            "boluses": basics.bolus.len(),
        },
        "diagnostics": data.diagnostics(),
    });

    if let Some(raw) = timezone_at {
        let instant = datetime::parse_time(raw)
            .with_context(|| format!("invalid --timezone-at instant {raw:?}"))?;
        out["timezoneAt"] = json!(data.get_timezone(instant));
    }
    Ok(out)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let records = read_records(&args.input)?;
    let options = match &args.options {
        Some(path) => load_options(path)?,
        None => Options::default(),
    };
    let data = DeviceData::from_records(&records, options)
        .with_context(|| format!("loading {}", args.input.display()))?;
    info!(
        "Loaded {} records from {}",
        data.data().len(),
        args.input.display()
    );

    let out = if args.dump {
        serde_json::to_value(data.data()).context("encoding timeline")?
    } else {
        summary(&data, args.timezone_at.as_deref())?
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &out).context("writing output")?;
    writeln!(stdout).context("writing output")?;
    Ok(())
}
