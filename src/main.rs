mod command;
mod constants;
mod data_mgmt;
mod helpers;
mod portals;
mod settings;
mod store;
mod sync;

use anyhow::{anyhow, Result};
use chrono::Utc;
use env_logger::Env;

use crate::settings::Settings;
use crate::store::SqliteStore;
use crate::sync::CycleOutcome;

const CMD_SYNC_ENERGY: &str = "sync-energy";
const CMD_SYNC_INVERTER_ENERGY: &str = "sync-inverter-energy";
const CMD_SYNC_IRRADIANCE: &str = "sync-irradiance";
const CMD_METER_READINGS: &str = "meter-readings";

fn main() -> Result<()> {
    helpers::load_dotenv();
    env_logger::Builder::from_env(
        Env::default().filter_or(constants::envvars::LOG_LEVEL, constants::defaults::LOG_LEVEL),
    )
    .init();

    let settings = Settings::from_env();
    let now = Utc::now();
    let today = now.date_naive();

    let mut args = pico_args::Arguments::from_env();
    // The store handle lives only for the duration of one cycle.
    let outcome = match args.subcommand()?.as_deref() {
        Some(CMD_SYNC_ENERGY) => {
            let store = SqliteStore::open(&settings.db_path)?;
            command::sync_station_energy(&settings, &store, today)?
        }
        Some(CMD_SYNC_INVERTER_ENERGY) => {
            let store = SqliteStore::open(&settings.db_path)?;
            command::sync_inverter_energy(&settings, &store, today)?
        }
        Some(CMD_SYNC_IRRADIANCE) => {
            let store = SqliteStore::open(&settings.db_path)?;
            command::sync_irradiance(&settings, &store, today)?
        }
        Some(CMD_METER_READINGS) => {
            let store = SqliteStore::open(&settings.db_path)?;
            command::meter_readings(&settings, &store, now)?
        }
        _ => {
            return Err(anyhow!(
                "Subcommand must be one of '{CMD_SYNC_ENERGY}', '{CMD_SYNC_INVERTER_ENERGY}', \
                 '{CMD_SYNC_IRRADIANCE}', '{CMD_METER_READINGS}'"
            ))
        }
    };

    match outcome {
        CycleOutcome::NoOp => log::info!("Cycle complete; nothing to do"),
        CycleOutcome::Synced { appended } => {
            log::info!("Cycle complete; {appended} rows appended")
        }
    }
    Ok(())
}
