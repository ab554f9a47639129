// src/recording/exporter.rs
//! Export decoded recordings
//!
//! Supports:
//! - JSON (one object per event, absent fields omitted)
//! - CSV (fixed column order, absent fields left empty)

use crate::recording::event::{EventFields, MatchEvent};
use crate::recording::schema::{self, INT_COLUMNS};
use crate::utils::errors::{Result, TelemetryError};
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::debug;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(TelemetryError::ExportFailed(format!(
                "Unknown export format '{}'",
                other
            ))),
        }
    }
}

/// Exporter for decoded recordings
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// Export events to string
    pub fn export(&self, events: &[MatchEvent]) -> Result<String> {
        debug!("Exporting {} events to {:?} format", events.len(), self.format);

        match self.format {
            ExportFormat::Json => self.export_json(events),
            ExportFormat::Csv => self.export_csv(events),
        }
    }

    fn export_json(&self, events: &[MatchEvent]) -> Result<String> {
        let rows: Vec<ExportedEvent> = events
            .iter()
            .map(|event| {
                let row = schema::encode(event);
                ExportedEvent {
                    timestamp: row.timestamp,
                    event_type: row.event_type,
                    kind: event.kind().as_str(),
                    fields: row.fields,
                }
            })
            .collect();

        serde_json::to_string_pretty(&rows).map_err(|e| {
            TelemetryError::ExportFailed(format!("JSON serialization error: {}", e))
        })
    }

    fn export_csv(&self, events: &[MatchEvent]) -> Result<String> {
        let mut out = String::new();

        out.push_str("timestamp,event_type,kind,");
        out.push_str(&INT_COLUMNS.join(","));
        out.push_str(",map_name\n");

        for event in events {
            let row = schema::encode(event);
            let f = &row.fields;
            let ints = [
                f.subject_id,
                f.x,
                f.y,
                f.z,
                f.held_item,
                f.inventory_count,
                f.killer_id,
                f.objective_id,
            ];

            write!(out, "{},{},{}", row.timestamp, row.event_type, event.kind()).map_err(csv_error)?;
            for value in ints {
                out.push(',');
                if let Some(value) = value {
                    write!(out, "{}", value).map_err(csv_error)?;
                }
            }
            out.push(',');
            if let Some(map_name) = &f.map_name {
                out.push_str(&csv_field(map_name));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

#[derive(Serialize)]
struct ExportedEvent {
    timestamp: i32,
    event_type: i32,
    kind: &'static str,
    #[serde(flatten)]
    fields: EventFields,
}

fn csv_error(e: std::fmt::Error) -> TelemetryError {
    TelemetryError::ExportFailed(format!("CSV formatting error: {}", e))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::event::BlockPos;

    fn events() -> Vec<MatchEvent> {
        vec![
            MatchEvent::match_start(Some("Airship, \"Battle\"".to_string())),
            MatchEvent::death(12, 7, BlockPos::new(1, 2, 3), Some(0)),
            MatchEvent::position(15, 0, BlockPos::new(4, 64, -2), None, 9),
            MatchEvent::match_end(600),
        ]
    }

    #[test]
    fn test_json_export() {
        let json = Exporter::new(ExportFormat::Json).export(&events()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        let death = &parsed[1];
        assert_eq!(death["kind"], "death");
        assert_eq!(death["event_type"], 3);
        assert_eq!(death["player_id"], 7);
        assert_eq!(death["killer_id"], 0);
        assert!(death.get("held_item").is_none());
        assert!(death.get("map_name").is_none());

        assert!(parsed[3].get("player_id").is_none());
    }

    #[test]
    fn test_csv_export() {
        let csv = Exporter::new(ExportFormat::Csv).export(&events()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "timestamp,event_type,kind,player_id,x,y,z,held_item,inventory_count,killer_id,wool_id,map_name"
        );
        assert_eq!(lines[1], "0,0,match_start,,,,,,,,,\"Airship, \"\"Battle\"\"\"");
        assert_eq!(lines[2], "12,3,death,7,1,2,3,,,0,,");
        assert_eq!(lines[3], "15,4,position,0,4,64,-2,,9,,,");
        assert_eq!(lines[4], "600,1,match_end,,,,,,,,,");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("har".parse::<ExportFormat>().is_err());
    }
}
