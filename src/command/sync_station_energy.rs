use anyhow::Result;
use chrono::{Months, NaiveDate};

use crate::constants::defaults;
use crate::data_mgmt::models::{CanonicalStatus, EntityKind, EntityLookup, Portal};
use crate::data_mgmt::status::classify_station_codes;
use crate::portals::client::RequestClient;
use crate::portals::fusion_solar::{normalize, FusionSolarApi};
use crate::settings::Settings;
use crate::store::Store;
use crate::sync::patch::{write_patch, WriteOutcome};
use crate::sync::{watermark, window, CycleOutcome};

const TABLE: &str = "energy_patched";

/// Backfill station-level daily generated energy from FusionSolar and
/// print a live health snapshot for the stations.
pub fn sync_station_energy(
    settings: &Settings,
    store: &dyn Store,
    today: NaiveDate,
) -> Result<CycleOutcome> {
    let entities = store.entities(EntityKind::Meter, Portal::FusionSolar)?;
    if entities.is_empty() {
        log::warn!("No FusionSolar stations configured; nothing to sync");
        return Ok(CycleOutcome::NoOp);
    }
    let lookup = EntityLookup::new(entities);

    let horizon = today
        .checked_sub_months(Months::new(defaults::BACKFILL_HORIZON_MONTHS))
        .unwrap_or(today);
    let existing = store.dates_since(TABLE, &lookup.entity_ids(), horizon)?;
    if existing.is_empty() {
        log::warn!(
            "No energy data found in {TABLE} since {horizon}; seed an initial backfill first"
        );
        return Ok(CycleOutcome::NoOp);
    }
    let Some(window) = watermark::resolve(&existing, today) else {
        log::info!("FusionSolar energy data for yesterday already exists, not updating {TABLE}");
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
    let station_codes = lookup.comma_refs();

    log::info!("FusionSolar - getting energy data ...");
    let mut candidates = Vec::new();
    for query_time in window::query_times(&window) {
        let data = api.station_day_kpis(&station_codes, query_time)?;
        candidates.extend(normalize::station_day_energy(&data, &lookup)?);
    }
    let appended = match write_patch(store, TABLE, candidates, &window)? {
        WriteOutcome::NoOp => {
            log::info!("Vendor returned no rows inside the backfill window");
            0
        }
        WriteOutcome::Appended { affected, .. } => affected,
    };

    log::info!("FusionSolar - getting plant status ...");
    let data = api.station_real_kpis(&station_codes)?;
    let codes = normalize::station_health_codes(&data, &lookup)?;
    let statuses = classify_station_codes(&codes, today);
    super::print_status_group(
        &statuses,
        CanonicalStatus::Disconnected,
        "Disconnected FusionSolar stations:",
        &lookup,
    );
    super::print_status_group(
        &statuses,
        CanonicalStatus::Faulty,
        "Faulty FusionSolar stations:",
        &lookup,
    );

    Ok(CycleOutcome::Synced { appended })
}
