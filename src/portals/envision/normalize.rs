//! Reshaping of Envision accumulative-reading payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::data_mgmt::models::{EntityLookup, MeterReading};
use crate::data_mgmt::status::is_lost_comms;
use crate::sync::SyncError;

/// Reshape the `result` map (keyed by mdm id) into one reading per
/// meter, freshness-flagged against `now`.
///
/// Known vendor quirk: a single-record response sometimes collapses to
/// the bare record object where a one-element list is expected; both
/// shapes are accepted here.
pub fn accumulative_readings(
    result: &Value,
    metric_prefix: &str,
    lookup: &EntityLookup,
    now: DateTime<Utc>,
) -> Result<Vec<MeterReading>, SyncError> {
    let map = result.as_object().ok_or_else(|| {
        SyncError::ShapeMismatch("expected result keyed by mdm id".to_string())
    })?;

    let mut readings = Vec::with_capacity(map.len());
    for (mdm_id, node) in map {
        let rows: Vec<&Value> = match node {
            Value::Array(rows) => rows.iter().collect(),
            Value::Object(_) => vec![node],
            _ => {
                return Err(SyncError::ShapeMismatch(format!(
                    "unexpected record shape for mdm id '{mdm_id}'"
                )))
            }
        };
        for row in rows {
            let production = point(row, metric_prefix, "APProductionKWH", mdm_id)?;
            let consumption = point(row, metric_prefix, "APConsumedKWH", mdm_id)?;
            let timestamp_ms = production
                .get("timestamp")
                .and_then(as_number)
                .ok_or_else(|| {
                    SyncError::ShapeMismatch(format!(
                        "mdm id '{mdm_id}' production point has no timestamp"
                    ))
                })? as i64;
            let timestamp = DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
                SyncError::ShapeMismatch(format!("timestamp {timestamp_ms} out of range"))
            })?;
            let exported = value_of(production, mdm_id)?;
            let imported = value_of(consumption, mdm_id)?;

            let Some(entity) = lookup.get(mdm_id) else {
                log::warn!("No entity for mdm id '{mdm_id}'; dropping reading");
                continue;
            };
            readings.push(MeterReading {
                entity_id: entity.id,
                name: entity.name.clone(),
                mdm_id: mdm_id.clone(),
                timestamp,
                exported,
                imported,
                lost_comms: is_lost_comms(timestamp, now),
            });
        }
    }
    readings.sort_by_key(|r| r.entity_id);
    Ok(readings)
}

fn point<'a>(
    row: &'a Value,
    prefix: &str,
    name: &str,
    mdm_id: &str,
) -> Result<&'a Value, SyncError> {
    row.get("points")
        .and_then(|p| p.get(prefix))
        .and_then(|d| d.get(name))
        .ok_or_else(|| {
            SyncError::ShapeMismatch(format!(
                "mdm id '{mdm_id}' payload missing points.{prefix}.{name}"
            ))
        })
}

fn value_of(point: &Value, mdm_id: &str) -> Result<f64, SyncError> {
    point.get("value").and_then(as_number).ok_or_else(|| {
        SyncError::ShapeMismatch(format!("mdm id '{mdm_id}' point has no numeric value"))
    })
}

/// The vendor serializes numbers inconsistently, sometimes as strings.
fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
