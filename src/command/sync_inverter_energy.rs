use anyhow::Result;
use chrono::{Months, NaiveDate};

use crate::constants::defaults;
use crate::data_mgmt::models::{EntityKind, EntityLookup, Portal};
use crate::data_mgmt::status::{classify_run_states, render_status_table, RunStateTable};
use crate::portals::client::RequestClient;
use crate::portals::fusion_solar::{normalize, FusionSolarApi};
use crate::settings::Settings;
use crate::store::Store;
use crate::sync::patch::{write_patch, WriteOutcome};
use crate::sync::{watermark, window, CycleOutcome};

const TABLE: &str = "inv_energy_patched";

/// Backfill inverter-level daily generated energy from FusionSolar and
/// surface anomalous inverter run states.
pub fn sync_inverter_energy(
    settings: &Settings,
    store: &dyn Store,
    today: NaiveDate,
) -> Result<CycleOutcome> {
    let entities = store.entities(EntityKind::Inverter, Portal::FusionSolar)?;
    if entities.is_empty() {
        log::warn!("No FusionSolar inverters configured; nothing to sync");
        return Ok(CycleOutcome::NoOp);
    }
    let lookup = EntityLookup::new(entities);

    let horizon = today
        .checked_sub_months(Months::new(defaults::BACKFILL_HORIZON_MONTHS))
        .unwrap_or(today);
    let existing = store.dates_since(TABLE, &lookup.entity_ids(), horizon)?;
    if existing.is_empty() {
        log::warn!(
            "No inverter energy data found in {TABLE} since {horizon}; seed an initial backfill first"
        );
        return Ok(CycleOutcome::NoOp);
    }
    let Some(window) = watermark::resolve(&existing, today) else {
        log::info!(
            "FusionSolar inverter energy data for yesterday already exists, not updating {TABLE}"
        );
        return Ok(CycleOutcome::NoOp);
    };
    log::info!(
        "Updating {TABLE} from {} to {} ({} days)",
        window.start,
        window.end,
        window.days()
    );

    let client = RequestClient::new(settings.request_timeout);
    let mut api = FusionSolarApi::new(client, settings.fusion.clone(), settings.token_ttl);
    let dev_ids = lookup.comma_refs();

    log::info!("FusionSolar - getting inverter energy data ...");
    let mut candidates = Vec::new();
    for query_time in window::query_times(&window) {
        let data = api.device_day_kpis(&dev_ids, query_time)?;
        candidates.extend(normalize::device_day_energy(&data, &lookup)?);
    }
    let appended = match write_patch(store, TABLE, candidates, &window)? {
        WriteOutcome::NoOp => {
            log::info!("Vendor returned no rows inside the backfill window");
            0
        }
        WriteOutcome::Appended { affected, .. } => affected,
    };

    match &settings.run_state_csv {
        Some(path) => {
            log::info!("FusionSolar - getting inverter status ...");
            let table = RunStateTable::from_csv_path(path)?;
            let data = api.device_real_kpis(&dev_ids)?;
            let states = normalize::device_run_states(&data, &lookup)?;
            let statuses = classify_run_states(&states, &table, today);
            let anomalous: Vec<_> = statuses
                .iter()
                .filter(|r| r.detail.is_some())
                .cloned()
                .collect();
            if !anomalous.is_empty() {
                println!("Anomalous FusionSolar inverters:");
                println!("{}", render_status_table(&anomalous, &lookup));
            }
        }
        None => log::warn!("No run-state table configured; skipping inverter status"),
    }

    Ok(CycleOutcome::Synced { appended })
}
