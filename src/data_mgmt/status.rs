//! Health status classification.
//!
//! Two independent signals feed this: the vendor's own status codes and
//! a freshness heuristic on the latest telemetry timestamp. Vendors are
//! not always honest about connectivity, so neither signal overrides
//! the other; both are surfaced.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Deserialize;

use super::models::{CanonicalStatus, EntityLookup, StatusRecord};

/// FusionSolar `real_health_state` codes.
pub fn classify_station_code(code: &str) -> CanonicalStatus {
    match code {
        "1" => CanonicalStatus::Disconnected,
        "2" => CanonicalStatus::Faulty,
        "3" => CanonicalStatus::Healthy,
        _ => CanonicalStatus::Unknown,
    }
}

pub fn classify_station_codes(codes: &[(i64, String)], today: NaiveDate) -> Vec<StatusRecord> {
    codes
        .iter()
        .map(|(entity_id, code)| StatusRecord {
            date: today,
            entity_id: *entity_id,
            status: classify_station_code(code),
            detail: None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RunStateRow {
    run_state: String,
    #[serde(default)]
    description: String,
}

/// Externally supplied reference table mapping FusionSolar inverter
/// run-state codes to descriptions. Any entry with a non-empty
/// description is an anomalous state worth surfacing.
#[derive(Clone, Debug, Default)]
pub struct RunStateTable {
    descriptions: HashMap<String, String>,
}

impl RunStateTable {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening run-state table {}", path.display()))?;
        let mut descriptions = HashMap::new();
        for row in reader.deserialize() {
            let row: RunStateRow =
                row.with_context(|| format!("parsing run-state table {}", path.display()))?;
            descriptions.insert(row.run_state, row.description);
        }
        Ok(RunStateTable { descriptions })
    }

    pub fn classify(&self, run_state: &str) -> (CanonicalStatus, Option<String>) {
        match self.descriptions.get(run_state) {
            Some(desc) if !desc.is_empty() => (CanonicalStatus::Faulty, Some(desc.clone())),
            Some(_) => (CanonicalStatus::Healthy, None),
            None => (CanonicalStatus::Unknown, None),
        }
    }
}

pub fn classify_run_states(
    states: &[(i64, String)],
    table: &RunStateTable,
    today: NaiveDate,
) -> Vec<StatusRecord> {
    states
        .iter()
        .map(|(entity_id, run_state)| {
            let (status, detail) = table.classify(run_state);
            StatusRecord {
                date: today,
                entity_id: *entity_id,
                status,
                detail,
            }
        })
        .collect()
}

/// Freshness-derived lost comms, independent of vendor status codes.
/// An entity whose latest reading is from before today, or more than
/// one hour adrift from the current hour, is not reporting.
pub fn is_lost_comms(latest: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    latest.date_naive() < now.date_naive()
        || (now.hour() as i64 - latest.hour() as i64).abs() > 1
}

/// Render status records as an aligned text table, one row per entity.
pub fn render_status_table(records: &[StatusRecord], lookup: &EntityLookup) -> String {
    let header = ["date", "name", "entity_id", "status", "detail"];
    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|r| {
            let name = lookup
                .by_id(r.entity_id)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            [
                r.date.to_string(),
                name,
                r.entity_id.to_string(),
                r.status.to_string(),
                r.detail.clone().unwrap_or_else(|| "--".to_string()),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let fmt_row = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<w$}", c, w = widths[i]))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut out = fmt_row(&header.map(String::from));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push('\n');
    out.push_str(&format!("|-{}-|", rule.join("-|-")));
    for row in &rows {
        out.push('\n');
        out.push_str(&fmt_row(row));
    }
    out
}
