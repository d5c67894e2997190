use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Vendor monitoring portals we ingest from. An entity belongs to
/// exactly one portal.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Portal {
    FusionSolar,
    Envision,
}

impl Portal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::FusionSolar => "FusionSolar",
            Portal::Envision => "Envision",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Meter,
    Inverter,
    Pyranometer,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Meter => "meter",
            EntityKind::Inverter => "inverter",
            EntityKind::Pyranometer => "pyranometer",
        }
    }
}

/// Reference data correlating internal identity with a vendor's row.
/// `portal_ref` (station code, device id, mdm id) is the sole join key
/// against vendor payloads.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: i64,
    pub portal_ref: String,
    pub name: String,
    pub portal: Portal,
    /// Envision per-meter metric name; unused for FusionSolar entities.
    pub api_metric: Option<String>,
}

/// Canonical shape all vendor day-series payloads are reduced to.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesRecord {
    pub date: NaiveDate,
    pub entity_id: i64,
    pub value: f64,
}

impl TimeSeriesRecord {
    /// Values are rounded to 5 decimal places here, once, so that
    /// re-read rows compare equal to what was submitted.
    pub fn new(date: NaiveDate, entity_id: i64, value: f64) -> Self {
        TimeSeriesRecord {
            date,
            entity_id,
            value: (value * 1e5).round() / 1e5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanonicalStatus {
    Healthy,
    Faulty,
    Disconnected,
    LostComms,
    Unknown,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Healthy => "Healthy",
            CanonicalStatus::Faulty => "Faulty",
            CanonicalStatus::Disconnected => "Disconnected",
            CanonicalStatus::LostComms => "Lost Comms",
            CanonicalStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One health snapshot row for today. Ephemeral: printed, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusRecord {
    pub date: NaiveDate,
    pub entity_id: i64,
    pub status: CanonicalStatus,
    /// Vendor run-state description for surfaced anomalies.
    pub detail: Option<String>,
}

/// Envision accumulative production/consumption reading for one meter.
#[derive(Clone, Debug)]
pub struct MeterReading {
    pub entity_id: i64,
    pub name: String,
    pub mdm_id: String,
    pub timestamp: DateTime<Utc>,
    pub exported: f64,
    pub imported: f64,
    pub lost_comms: bool,
}

/// Entity table keyed by vendor reference, as needed for the left-join
/// performed by the payload normalizers.
#[derive(Clone, Debug, Default)]
pub struct EntityLookup {
    by_ref: HashMap<String, Entity>,
}

impl EntityLookup {
    pub fn new(entities: Vec<Entity>) -> Self {
        EntityLookup {
            by_ref: entities
                .into_iter()
                .map(|e| (e.portal_ref.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, portal_ref: &str) -> Option<&Entity> {
        self.by_ref.get(portal_ref)
    }

    pub fn by_id(&self, entity_id: i64) -> Option<&Entity> {
        self.by_ref.values().find(|e| e.id == entity_id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn entity_ids(&self) -> Vec<i64> {
        self.by_ref.values().map(|e| e.id).sorted().collect()
    }

    /// Comma-joined vendor references, as the vendor id-list endpoints
    /// expect. Sorted for deterministic request bodies.
    pub fn comma_refs(&self) -> String {
        self.by_ref.keys().sorted().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: i64, portal_ref: &str) -> Entity {
        Entity {
            id,
            portal_ref: portal_ref.to_string(),
            name: format!("meter-{id}"),
            portal: Portal::FusionSolar,
            api_metric: None,
        }
    }

    #[test]
    fn record_value_is_rounded_to_five_decimals() {
        let r = TimeSeriesRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            1,
            12.3456789,
        );
        assert_eq!(r.value, 12.34568);
    }

    #[test]
    fn lookup_joins_on_vendor_reference() {
        let lookup = EntityLookup::new(vec![entity(7, "NE-123"), entity(3, "NE-456")]);
        assert_eq!(lookup.get("NE-123").unwrap().id, 7);
        assert!(lookup.get("NE-999").is_none());
        assert_eq!(lookup.entity_ids(), vec![3, 7]);
        assert_eq!(lookup.comma_refs(), "NE-123,NE-456");
    }
}
