use crate::data_mgmt::models::TimeSeriesRecord;
use crate::store::Store;

use super::window::QueryWindow;
use super::SyncError;

/// Result of one patch write. An empty batch after window filtering is
/// a no-op, logged distinctly from a write failure.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    NoOp,
    Appended { submitted: usize, affected: usize },
}

/// Filter candidate records to the backfill window and append them.
///
/// Month-aligned vendor responses include days outside the window; the
/// filter here is what keeps repeated runs from re-submitting a
/// `(date, entity_id)` pair already present.
pub fn write_patch(
    store: &dyn Store,
    table: &str,
    candidates: Vec<TimeSeriesRecord>,
    window: &QueryWindow,
) -> Result<WriteOutcome, SyncError> {
    let to_patch: Vec<TimeSeriesRecord> = candidates
        .into_iter()
        .filter(|r| window.contains(r.date))
        .collect();

    if to_patch.is_empty() {
        return Ok(WriteOutcome::NoOp);
    }

    let submitted = to_patch.len();
    let affected = store.append(table, &to_patch)?;
    if affected == 0 {
        log::warn!("No data appended to {table} ({submitted} rows submitted)");
    } else {
        log::info!("{affected} data rows appended to {table}");
    }
    Ok(WriteOutcome::Appended {
        submitted,
        affected,
    })
}
