use anyhow::Result;
use chrono::{Months, NaiveDate};

use crate::constants::defaults;
use crate::data_mgmt::models::{
    CanonicalStatus, EntityKind, EntityLookup, Portal, StatusRecord, TimeSeriesRecord,
};
use crate::data_mgmt::status::render_status_table;
use crate::portals::client::RequestClient;
use crate::portals::fusion_solar::{normalize, FusionSolarApi};
use crate::settings::Settings;
use crate::store::Store;
use crate::sync::patch::{write_patch, WriteOutcome};
use crate::sync::{watermark, window, CycleOutcome};

const TABLE: &str = "pyr_sh";

/// Backfill daily irradiance (sun hours) from FusionSolar.
///
/// Pyranometers carry no vendor status endpoint; a group whose freshest
/// backfilled day aggregates to zero irradiance is treated as lost
/// comms, a zero-sun day not being physically plausible.
pub fn sync_irradiance(
    settings: &Settings,
    store: &dyn Store,
    today: NaiveDate,
) -> Result<CycleOutcome> {
    let entities = store.entities(EntityKind::Pyranometer, Portal::FusionSolar)?;
    if entities.is_empty() {
        log::warn!("No FusionSolar pyranometers configured; nothing to sync");
        return Ok(CycleOutcome::NoOp);
    }
    let lookup = EntityLookup::new(entities);

    let horizon = today
        .checked_sub_months(Months::new(defaults::BACKFILL_HORIZON_MONTHS))
        .unwrap_or(today);
    let existing = store.dates_since(TABLE, &lookup.entity_ids(), horizon)?;
    if existing.is_empty() {
        log::warn!(
            "No irradiance data found in {TABLE} since {horizon}; seed an initial backfill first"
        );
        return Ok(CycleOutcome::NoOp);
    }
    let Some(window) = watermark::resolve(&existing, today) else {
        log::info!("FusionSolar irradiance data for yesterday already exists, not updating {TABLE}");
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

    log::info!("FusionSolar - getting irradiance data ...");
    let mut candidates = Vec::new();
    for query_time in window::query_times(&window) {
        let data = api.station_day_kpis(&station_codes, query_time)?;
        candidates.extend(normalize::station_day_irradiance(&data, &lookup)?);
    }
    let in_window: Vec<TimeSeriesRecord> = candidates
        .into_iter()
        .filter(|r| window.contains(r.date))
        .collect();

    if group_is_dark(&in_window) {
        let lost: Vec<StatusRecord> = lookup
            .entity_ids()
            .into_iter()
            .map(|entity_id| StatusRecord {
                date: today,
                entity_id,
                status: CanonicalStatus::LostComms,
                detail: None,
            })
            .collect();
        println!("Pyranometers with no irradiance signal:");
        println!("{}", render_status_table(&lost, &lookup));
    }

    let appended = match write_patch(store, TABLE, in_window, &window)? {
        WriteOutcome::NoOp => {
            log::info!("Vendor returned no rows inside the backfill window");
            0
        }
        WriteOutcome::Appended { affected, .. } => affected,
    };

    Ok(CycleOutcome::Synced { appended })
}

/// True when the freshest backfilled day carries no irradiance at all,
/// or nothing came back for the window.
fn group_is_dark(in_window: &[TimeSeriesRecord]) -> bool {
    let Some(last_day) = in_window.iter().map(|r| r.date).max() else {
        return true;
    };
    let aggregate: f64 = in_window
        .iter()
        .filter(|r| r.date == last_day)
        .map(|r| r.value)
        .sum();
    aggregate == 0.0
}
