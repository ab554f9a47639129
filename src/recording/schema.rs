// src/recording/schema.rs
//! Row schema and encoding
//!
//! Column order and types are a persisted contract:
//!
//! ```text
//! timestamp        int32   required   seconds since match start
//! event_type       int32   required   EventKind ordinal
//! player_id        int32   optional
//! x, y, z          int32   optional
//! held_item        int32   optional
//! inventory_count  int32   optional
//! killer_id        int32   optional
//! wool_id          int32   optional
//! map_name         utf8    optional
//! ```
//!
//! New columns are appended and nullable. Decoding looks columns up by name,
//! so a file written before a column existed reads that column as absent.

use crate::recording::event::{EventFields, EventKind, MatchEvent};
use crate::utils::errors::{Result, TelemetryError};
use arrow::array::{Array, ArrayRef, AsArray, Int32Builder, StringBuilder};
use arrow::datatypes::{DataType, Field as ArrowField, Int32Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

pub const SCHEMA_NAME: &str = "match_event";

/// Optional int32 columns, in file order after the two required columns
pub const INT_COLUMNS: [&str; 8] = [
    "player_id",
    "x",
    "y",
    "z",
    "held_item",
    "inventory_count",
    "killer_id",
    "wool_id",
];

/// The artifact schema
pub fn match_event_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let mut fields = vec![
                ArrowField::new("timestamp", DataType::Int32, false),
                ArrowField::new("event_type", DataType::Int32, false),
            ];
            fields.extend(
                INT_COLUMNS
                    .iter()
                    .map(|name| ArrowField::new(*name, DataType::Int32, true)),
            );
            fields.push(ArrowField::new("map_name", DataType::Utf8, true));
            Arc::new(Schema::new(fields))
        })
        .clone()
}

/// One encoded row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    pub timestamp: i32,
    pub event_type: i32,
    #[serde(flatten)]
    pub fields: EventFields,
}

impl EventRow {
    /// Kind for this row's ordinal, if known
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_ordinal(self.event_type)
    }
}

/// Encode an event into its sparse row
pub fn encode(event: &MatchEvent) -> EventRow {
    EventRow {
        timestamp: event.timestamp(),
        event_type: event.kind().ordinal(),
        fields: event.fields(),
    }
}

/// Decode a row, validating its fields against its kind
pub fn decode(row: EventRow) -> Result<MatchEvent> {
    let kind = EventKind::from_ordinal(row.event_type)
        .ok_or(TelemetryError::UnknownEventKind(row.event_type))?;
    MatchEvent::from_fields(row.timestamp, kind, row.fields)
}

/// Build a record batch from encoded rows
pub fn rows_to_batch(rows: &[EventRow]) -> Result<RecordBatch> {
    let n = rows.len();
    let mut timestamp = Int32Builder::with_capacity(n);
    let mut event_type = Int32Builder::with_capacity(n);
    let mut ints: Vec<Int32Builder> = INT_COLUMNS
        .iter()
        .map(|_| Int32Builder::with_capacity(n))
        .collect();
    let mut map_name = StringBuilder::new();

    for row in rows {
        timestamp.append_value(row.timestamp);
        event_type.append_value(row.event_type);

        let f = &row.fields;
        let values = [
            f.subject_id,
            f.x,
            f.y,
            f.z,
            f.held_item,
            f.inventory_count,
            f.killer_id,
            f.objective_id,
        ];
        for (builder, value) in ints.iter_mut().zip(values) {
            builder.append_option(value);
        }
        map_name.append_option(f.map_name.as_deref());
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(timestamp.finish()),
        Arc::new(event_type.finish()),
    ];
    columns.extend(ints.iter_mut().map(|b| Arc::new(b.finish()) as ArrayRef));
    columns.push(Arc::new(map_name.finish()));

    Ok(RecordBatch::try_new(match_event_schema(), columns)?)
}

/// Extract rows from a record batch read back from an artifact.
///
/// Columns are matched by name. Missing optional columns decode as absent;
/// missing required columns or unexpected column types are errors.
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<EventRow>> {
    let timestamp = required_column(batch, "timestamp")?;
    let event_type = required_column(batch, "event_type")?;

    let mut optional = Vec::with_capacity(INT_COLUMNS.len());
    for name in INT_COLUMNS {
        let column = match batch.column_by_name(name) {
            Some(column) => Some(int_column(name, column)?),
            None => None,
        };
        optional.push(column);
    }

    let map_name = match batch.column_by_name("map_name") {
        Some(column) => Some(column.as_string_opt::<i32>().ok_or_else(|| {
            TelemetryError::ArtifactIo(format!(
                "Column map_name has type {}, expected Utf8",
                column.data_type()
            ))
        })?),
        None => None,
    };

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let value = |idx: usize| {
            optional[idx]
                .as_ref()
                .and_then(|col| (!col.is_null(i)).then(|| col.value(i)))
        };
        rows.push(EventRow {
            timestamp: timestamp.value(i),
            event_type: event_type.value(i),
            fields: EventFields {
                subject_id: value(0),
                x: value(1),
                y: value(2),
                z: value(3),
                held_item: value(4),
                inventory_count: value(5),
                killer_id: value(6),
                objective_id: value(7),
                map_name: map_name
                    .and_then(|col| (!col.is_null(i)).then(|| col.value(i).to_string())),
            },
        });
    }

    Ok(rows)
}

fn required_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a arrow::array::PrimitiveArray<Int32Type>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| TelemetryError::ArtifactIo(format!("Missing required column {}", name)))?;
    int_column(name, column)
}

fn int_column<'a>(
    name: &str,
    column: &'a ArrayRef,
) -> Result<&'a arrow::array::PrimitiveArray<Int32Type>> {
    column.as_primitive_opt::<Int32Type>().ok_or_else(|| {
        TelemetryError::ArtifactIo(format!(
            "Column {} has type {}, expected Int32",
            name,
            column.data_type()
        ))
    })
}
