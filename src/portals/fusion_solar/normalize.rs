//! Reshaping of FusionSolar payloads into canonical records.
//!
//! One routine per metric. Expected fields that are absent fail the
//! cycle with a shape mismatch; silently defaulting them would corrupt
//! the time series.

use chrono::DateTime;
use serde_json::Value;

use crate::data_mgmt::models::{EntityLookup, TimeSeriesRecord};
use crate::sync::SyncError;

/// Station/day generated energy (`dataItemMap.inverter_power`).
pub fn station_day_energy(
    data: &Value,
    lookup: &EntityLookup,
) -> Result<Vec<TimeSeriesRecord>, SyncError> {
    day_series(data, "stationCode", "inverter_power", lookup)
}

/// Inverter/day generated energy (`dataItemMap.product_power`).
pub fn device_day_energy(
    data: &Value,
    lookup: &EntityLookup,
) -> Result<Vec<TimeSeriesRecord>, SyncError> {
    day_series(data, "devId", "product_power", lookup)
}

/// Station/day irradiance (`dataItemMap.radiation_intensity`).
pub fn station_day_irradiance(
    data: &Value,
    lookup: &EntityLookup,
) -> Result<Vec<TimeSeriesRecord>, SyncError> {
    day_series(data, "stationCode", "radiation_intensity", lookup)
}

/// Live station health codes as `(entity_id, code)` pairs.
pub fn station_health_codes(
    data: &Value,
    lookup: &EntityLookup,
) -> Result<Vec<(i64, String)>, SyncError> {
    real_kpi_codes(data, "stationCode", "real_health_state", lookup)
}

/// Live inverter run states as `(entity_id, run_state)` pairs.
pub fn device_run_states(
    data: &Value,
    lookup: &EntityLookup,
) -> Result<Vec<(i64, String)>, SyncError> {
    real_kpi_codes(data, "devId", "run_state", lookup)
}

fn day_series(
    data: &Value,
    ref_key: &str,
    item_field: &str,
    lookup: &EntityLookup,
) -> Result<Vec<TimeSeriesRecord>, SyncError> {
    let rows = as_rows(data)?;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let collect_time = row
            .get("collectTime")
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::ShapeMismatch("row missing collectTime".to_string()))?;
        let date = DateTime::from_timestamp_millis(collect_time)
            .ok_or_else(|| {
                SyncError::ShapeMismatch(format!("collectTime {collect_time} out of range"))
            })?
            .date_naive();
        let vendor_ref = ref_string(row, ref_key)?;
        let item = row
            .get("dataItemMap")
            .and_then(|m| m.get(item_field))
            .ok_or_else(|| {
                SyncError::ShapeMismatch(format!("row missing dataItemMap.{item_field}"))
            })?;
        let value = match item {
            // The vendor reports null for days without data.
            Value::Null => {
                log::warn!("{item_field} is null for '{vendor_ref}' on {date}; dropping row");
                continue;
            }
            other => other.as_f64().ok_or_else(|| {
                SyncError::ShapeMismatch(format!("dataItemMap.{item_field} is not numeric"))
            })?,
        };
        match lookup.get(&vendor_ref) {
            Some(entity) => records.push(TimeSeriesRecord::new(date, entity.id, value)),
            None => log::warn!("No entity for vendor reference '{vendor_ref}'; dropping row"),
        }
    }
    Ok(records)
}

fn real_kpi_codes(
    data: &Value,
    ref_key: &str,
    item_field: &str,
    lookup: &EntityLookup,
) -> Result<Vec<(i64, String)>, SyncError> {
    let rows = as_rows(data)?;
    let mut codes = Vec::with_capacity(rows.len());
    for row in rows {
        let vendor_ref = ref_string(row, ref_key)?;
        let code = row
            .get("dataItemMap")
            .and_then(|m| m.get(item_field))
            .ok_or_else(|| {
                SyncError::ShapeMismatch(format!("row missing dataItemMap.{item_field}"))
            })?;
        let code = match code {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(SyncError::ShapeMismatch(format!(
                    "dataItemMap.{item_field} has unexpected type: {other}"
                )))
            }
        };
        match lookup.get(&vendor_ref) {
            Some(entity) => codes.push((entity.id, code)),
            None => log::warn!("No entity for vendor reference '{vendor_ref}'; dropping row"),
        }
    }
    codes.sort_by_key(|(id, _)| *id);
    Ok(codes)
}

fn as_rows(data: &Value) -> Result<&Vec<Value>, SyncError> {
    data.as_array()
        .ok_or_else(|| SyncError::ShapeMismatch("expected a list payload".to_string()))
}

/// Vendor references arrive as strings for stations and numbers for
/// device ids; both join against the entity table as strings.
fn ref_string(row: &Value, ref_key: &str) -> Result<String, SyncError> {
    match row.get(ref_key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(SyncError::ShapeMismatch(format!("row missing {ref_key}"))),
    }
}
