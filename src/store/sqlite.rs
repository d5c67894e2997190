use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use itertools::Itertools;
use rusqlite::{params, Connection};

use crate::data_mgmt::models::{Entity, EntityKind, Portal, TimeSeriesRecord};
use crate::sync::window::QueryWindow;

use super::{Store, StoreError};

const ENTITY_TABLE: &str = "entity";
const FACT_TABLES: [&str; 3] = ["energy_patched", "inv_energy_patched", "pyr_sh"];

/// SQLite-backed store. The connection is owned here and released on
/// drop, on every exit path of the cycle that holds it.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS '{ENTITY_TABLE}' (
                entity_id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,
                portal TEXT NOT NULL,
                portal_ref TEXT,
                name TEXT NOT NULL,
                api_metric TEXT
                )"
            ),
            [],
        )?;
        for table in FACT_TABLES {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS '{table}' (
                    date TEXT NOT NULL,
                    entity_id INTEGER NOT NULL,
                    value REAL NOT NULL
                    )"
                ),
                [],
            )?;
        }
        Ok(SqliteStore { conn })
    }

    /// Reference data is provisioned out of band; this exists for that
    /// provisioning and for tests.
    pub fn insert_entity(&self, kind: EntityKind, entity: &Entity) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO '{ENTITY_TABLE}'
                (entity_id, kind, portal, portal_ref, name, api_metric)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                entity.id,
                kind.as_str(),
                entity.portal.as_str(),
                entity.portal_ref,
                entity.name,
                entity.api_metric,
            ],
        )?;
        Ok(())
    }

    fn check_table(table: &str) -> Result<(), StoreError> {
        if FACT_TABLES.contains(&table) {
            Ok(())
        } else {
            Err(StoreError::UnknownTable(table.to_string()))
        }
    }

    fn id_list(entity_ids: &[i64]) -> String {
        entity_ids.iter().join(",")
    }
}

impl Store for SqliteStore {
    fn entities(&self, kind: EntityKind, portal: Portal) -> Result<Vec<Entity>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT entity_id, portal_ref, name, api_metric FROM '{ENTITY_TABLE}'
            WHERE kind = ?1 AND portal = ?2 AND portal_ref IS NOT NULL
            ORDER BY entity_id"
        ))?;
        let rows = stmt.query_map(params![kind.as_str(), portal.as_str()], |row| {
            Ok(Entity {
                id: row.get(0)?,
                portal_ref: row.get(1)?,
                name: row.get(2)?,
                portal,
                api_metric: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn dates_since(
        &self,
        table: &str,
        entity_ids: &[i64],
        since: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>, StoreError> {
        Self::check_table(table)?;
        if entity_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT date FROM '{table}'
            WHERE date >= ?1 AND entity_id IN ({})",
            Self::id_list(entity_ids)
        ))?;
        let rows = stmt.query_map(params![since], |row| row.get::<_, NaiveDate>(0))?;
        Ok(rows.collect::<Result<BTreeSet<_>, _>>()?)
    }

    fn records_between(
        &self,
        table: &str,
        entity_ids: &[i64],
        window: &QueryWindow,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        Self::check_table(table)?;
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT date, entity_id, value FROM '{table}'
            WHERE date >= ?1 AND date <= ?2 AND entity_id IN ({})
            ORDER BY date, entity_id",
            Self::id_list(entity_ids)
        ))?;
        let rows = stmt.query_map(params![window.start, window.end], |row| {
            Ok(TimeSeriesRecord {
                date: row.get(0)?,
                entity_id: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn append(&self, table: &str, records: &[TimeSeriesRecord]) -> Result<usize, StoreError> {
        Self::check_table(table)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut affected = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO '{table}' (date, entity_id, value) VALUES (?1, ?2, ?3)"
            ))?;
            for record in records {
                affected += stmt.execute(params![record.date, record.entity_id, record.value])?;
            }
        }
        tx.commit()?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_entity(id: i64, portal_ref: &str) -> Entity {
        Entity {
            id,
            portal_ref: portal_ref.to_string(),
            name: format!("station-{id}"),
            portal: Portal::FusionSolar,
            api_metric: None,
        }
    }

    #[test]
    fn entities_filter_by_kind_and_portal() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_entity(EntityKind::Meter, &sample_entity(1, "NE-1"))
            .unwrap();
        store
            .insert_entity(EntityKind::Pyranometer, &sample_entity(2, "NE-2"))
            .unwrap();

        let meters = store
            .entities(EntityKind::Meter, Portal::FusionSolar)
            .unwrap();
        assert_eq!(meters.len(), 1);
        assert_eq!(meters[0].portal_ref, "NE-1");
        assert!(store
            .entities(EntityKind::Meter, Portal::Envision)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn appended_rows_read_back_identically() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = vec![
            TimeSeriesRecord::new(d(2024, 1, 10), 1, 12.3456789),
            TimeSeriesRecord::new(d(2024, 1, 11), 1, 8.0),
        ];
        let affected = store.append("energy_patched", &records).unwrap();
        assert_eq!(affected, 2);

        let window = QueryWindow {
            start: d(2024, 1, 10),
            end: d(2024, 1, 11),
        };
        let read_back = store
            .records_between("energy_patched", &[1], &window)
            .unwrap();
        assert_eq!(read_back, records);
    }

    #[test]
    fn dates_since_respects_horizon_and_entity_set() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .append(
                "energy_patched",
                &[
                    TimeSeriesRecord::new(d(2023, 6, 1), 1, 1.0),
                    TimeSeriesRecord::new(d(2024, 1, 10), 1, 2.0),
                    TimeSeriesRecord::new(d(2024, 1, 11), 2, 3.0),
                ],
            )
            .unwrap();

        let dates = store
            .dates_since("energy_patched", &[1], d(2024, 1, 1))
            .unwrap();
        assert_eq!(dates.into_iter().collect::<Vec<_>>(), vec![d(2024, 1, 10)]);
    }

    #[test]
    fn unknown_fact_table_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.append("entity", &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(_)));
    }
}
