use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::constants::defaults;
use crate::data_mgmt::models::{
    CanonicalStatus, Entity, EntityKind, EntityLookup, MeterReading, Portal, StatusRecord,
};
use crate::data_mgmt::status::render_status_table;
use crate::portals::client::RequestClient;
use crate::portals::envision::{normalize, EnvisionApi};
use crate::settings::Settings;
use crate::store::Store;
use crate::sync::CycleOutcome;

/// Pull current accumulative production/consumption readings for every
/// Envision meter, export them to a timestamped CSV and flag meters
/// whose latest reading is stale.
pub fn meter_readings(
    settings: &Settings,
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    let entities: Vec<Entity> = store
        .entities(EntityKind::Meter, Portal::Envision)?
        .into_iter()
        // Inverters share the Envision meter table under a placeholder
        // reference; only rows with a metric name are real meters.
        .filter(|e| e.portal_ref != "Inverter" && e.api_metric.is_some())
        .collect();
    if entities.is_empty() {
        log::warn!("No Envision meters configured; nothing to read");
        return Ok(CycleOutcome::NoOp);
    }
    let lookup = EntityLookup::new(entities.clone());

    let mut by_metric: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
    for entity in entities {
        let metric = entity.api_metric.clone().unwrap_or_default();
        by_metric.entry(metric).or_default().push(entity);
    }

    let client = RequestClient::new(settings.request_timeout);
    let mut api = EnvisionApi::new(client, settings.envision.clone(), settings.token_ttl);

    log::info!("Envision - getting meter readings ...");
    let mut readings: Vec<MeterReading> = Vec::new();
    for (metric, group) in &by_metric {
        let Some(prefix) = metric.split('.').next().filter(|p| !p.is_empty()) else {
            log::warn!("Skipping {} meter(s) with malformed metric '{metric}'", group.len());
            continue;
        };
        let group_lookup = EntityLookup::new(group.clone());
        // The endpoint caps id lists per request.
        for chunk in &group.iter().chunks(defaults::ENVISION_PAGE_SIZE) {
            let mdm_ids = chunk.map(|e| e.portal_ref.as_str()).join(",");
            let result = api.accumulative_readings(&mdm_ids, prefix)?;
            readings.extend(normalize::accumulative_readings(
                &result,
                prefix,
                &group_lookup,
                now,
            )?);
        }
    }
    readings.sort_by_key(|r| r.entity_id);

    let filename = format!(
        "Envision_meter_readings_{}.csv",
        now.format("%Y%m%d_%H%M%S")
    );
    export_csv(&filename, &readings)?;
    log::info!("{} meter readings written to {filename}", readings.len());

    let lost: Vec<StatusRecord> = readings
        .iter()
        .filter(|r| r.lost_comms)
        .map(|r| StatusRecord {
            date: now.date_naive(),
            entity_id: r.entity_id,
            status: CanonicalStatus::LostComms,
            detail: None,
        })
        .collect();
    if !lost.is_empty() {
        println!("Envision meters with stale readings:");
        println!("{}", render_status_table(&lost, &lookup));
    }

    Ok(CycleOutcome::Synced {
        appended: readings.len(),
    })
}

fn export_csv(path: &str, readings: &[MeterReading]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record([
        "entity_id",
        "name",
        "mdm_id",
        "timestamp",
        "exported_kwh",
        "imported_kwh",
        "lost_comms",
    ])?;
    for r in readings {
        writer.write_record([
            r.entity_id.to_string(),
            r.name.clone(),
            r.mdm_id.clone(),
            r.timestamp.to_rfc3339(),
            r.exported.to_string(),
            r.imported.to_string(),
            r.lost_comms.to_string(),
        ])?;
    }
    writer.flush().with_context(|| format!("writing {path}"))?;
    Ok(())
}
