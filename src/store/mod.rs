//! Boundary to the relational store. The sync engine only ever needs
//! the four operations on the `Store` trait; everything else about the
//! database is out of scope.

mod sqlite;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data_mgmt::models::{Entity, EntityKind, Portal, TimeSeriesRecord};
use crate::sync::window::QueryWindow;

pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown fact table '{0}'")]
    UnknownTable(String),
}

pub trait Store {
    /// Reference data: entities of one kind on one portal, with a
    /// vendor reference set.
    fn entities(&self, kind: EntityKind, portal: Portal) -> Result<Vec<Entity>, StoreError>;

    /// Distinct dates already present for the given entities since a
    /// horizon date; the watermark is derived from these.
    fn dates_since(
        &self,
        table: &str,
        entity_ids: &[i64],
        since: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, StoreError>;

    fn records_between(
        &self,
        table: &str,
        entity_ids: &[i64],
        window: &QueryWindow,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError>;

    /// Append-only insert; returns the number of rows the store reports
    /// as affected.
    fn append(&self, table: &str, records: &[TimeSeriesRecord]) -> Result<usize, StoreError>;
}
