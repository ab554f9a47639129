// src/main.rs
//! CTW telemetry inspection tool
//!
//! Reads recorded match artifacts and the session catalog.
//!
//! ```text
//! ctw-telemetry inspect <artifact>
//! ctw-telemetry export <artifact> [json|csv] [output]
//! ctw-telemetry catalog [map_slug]
//! ```
//!
//! Configuration comes from `CTW_TELEMETRY_CONFIG` (optional file) and
//! `CTW_TELEMETRY__*` environment variables.

use anyhow::{bail, Context, Result};
use ctw_telemetry::observability::init_tracing;
use ctw_telemetry::recording::{read_artifact, ExportFormat, Exporter, SessionCatalog};
use ctw_telemetry::{EventKind, TelemetryConfig};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const USAGE: &str = "usage:
  ctw-telemetry inspect <artifact>
  ctw-telemetry export <artifact> [json|csv] [output]
  ctw-telemetry catalog [map_slug]";

fn main() -> Result<()> {
    let config_path = env::var_os("CTW_TELEMETRY_CONFIG").map(PathBuf::from);
    let config = TelemetryConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("inspect") => {
            let path = args.get(1).context(USAGE)?;
            inspect(Path::new(path))
        }
        Some("export") => {
            let path = args.get(1).context(USAGE)?;
            let format: ExportFormat = args.get(2).map(|f| f.parse()).transpose()?.unwrap_or(ExportFormat::Json);
            export(Path::new(path), format, args.get(3).map(PathBuf::from))
        }
        Some("catalog") => catalog(&config, args.get(1).map(String::as_str)),
        _ => bail!(USAGE),
    }
}

fn inspect(path: &Path) -> Result<()> {
    let contents = read_artifact(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in &contents.events {
        *by_kind.entry(event.kind().as_str()).or_default() += 1;
    }

    let duration = contents.events.last().map(|e| e.timestamp()).unwrap_or(0);
    let map_name = contents.events.iter().find_map(|e| match e.kind() {
        EventKind::MatchStart => e.fields().map_name,
        _ => None,
    });

    println!("{}", path.display());
    println!("  map:      {}", map_name.as_deref().unwrap_or("unknown"));
    println!("  duration: {}s", duration);
    println!("  rows:     {}", contents.rows.len());
    for (kind, count) in by_kind {
        println!("    {:<13} {}", kind, count);
    }
    if contents.unknown_kind_rows > 0 {
        println!("  skipped {} rows with unknown event kinds", contents.unknown_kind_rows);
    }
    Ok(())
}

fn export(path: &Path, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let contents = read_artifact(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let rendered = Exporter::new(format).export(&contents.events)?;

    match output {
        Some(output) => {
            fs::write(&output, rendered).with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Exported {} events to {}", contents.events.len(), output.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn catalog(config: &TelemetryConfig, map_slug: Option<&str>) -> Result<()> {
    let Some(db_path) = config.catalog_path() else {
        bail!("Session catalog is disabled (catalog.enabled = false)");
    };
    let catalog = SessionCatalog::open(&db_path)?;

    let entries = match map_slug {
        Some(slug) => catalog.list_for_map(slug)?,
        None => catalog.list()?,
    };
    for entry in &entries {
        println!(
            "{}  {:<24} {:>7} events {:>5} dropped  {}",
            entry.started_at.format("%Y-%m-%d %H:%M:%S"),
            entry.map_slug,
            entry.event_count,
            entry.dropped_count,
            entry.path.display()
        );
    }

    let stats = catalog.stats()?;
    println!(
        "{} recordings, {} events, {} bytes",
        stats.recordings, stats.total_events, stats.total_size_bytes
    );
    Ok(())
}
