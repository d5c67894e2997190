mod meter_readings;
mod sync_inverter_energy;
mod sync_irradiance;
mod sync_station_energy;

pub use meter_readings::meter_readings;
pub use sync_inverter_energy::sync_inverter_energy;
pub use sync_irradiance::sync_irradiance;
pub use sync_station_energy::sync_station_energy;

use crate::data_mgmt::models::{CanonicalStatus, EntityLookup, StatusRecord};
use crate::data_mgmt::status::render_status_table;

/// Print the subset of a status snapshot matching one canonical status,
/// as a titled table. Nothing is printed for an empty subset.
pub(crate) fn print_status_group(
    statuses: &[StatusRecord],
    status: CanonicalStatus,
    title: &str,
    lookup: &EntityLookup,
) {
    let group: Vec<StatusRecord> = statuses
        .iter()
        .filter(|r| r.status == status)
        .cloned()
        .collect();
    if group.is_empty() {
        return;
    }
    println!("{title}");
    println!("{}", render_status_table(&group, lookup));
}
