//! End-to-end energy sync against a mocked vendor: a first run backfills
//! the missing day, a second run is a no-op and makes no HTTP calls.

use assert_cmd::Command;
use chrono::{Days, NaiveTime, Utc};
use rusqlite::{params, Connection};

fn seed_db(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute(
        "CREATE TABLE entity (
            entity_id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            portal TEXT NOT NULL,
            portal_ref TEXT,
            name TEXT NOT NULL,
            api_metric TEXT
        )",
        [],
    )
    .unwrap();
    conn.execute(
        "CREATE TABLE energy_patched (
            date TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            value REAL NOT NULL
        )",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO entity (entity_id, kind, portal, portal_ref, name, api_metric)
        VALUES (1, 'meter', 'FusionSolar', 'NE-1', 'Station One', NULL)",
        [],
    )
    .unwrap();

    // Stored through the day before yesterday; yesterday is the gap.
    let today = Utc::now().date_naive();
    for days_back in [3u64, 2] {
        let date = today.checked_sub_days(Days::new(days_back)).unwrap();
        conn.execute(
            "INSERT INTO energy_patched (date, entity_id, value) VALUES (?1, 1, 10.0)",
            params![date],
        )
        .unwrap();
    }
}

fn row_count(path: &std::path::Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM energy_patched", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn second_run_is_a_noop_with_no_vendor_calls() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pvsync.db");
    seed_db(&db_path);

    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();
    let collect_time = yesterday
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis();
    let stale_day = today.checked_sub_days(Days::new(3)).unwrap();
    let stale_time = stale_day
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis();

    let mut server = mockito::Server::new();
    let login = server
        .mock("POST", "/thirdData/login")
        .with_header("xsrf-token", "tok-1")
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create();
    // One row inside the window, one already-stored day the window
    // filter must discard.
    let day = server
        .mock("POST", "/thirdData/getKpiStationDay")
        .match_header("XSRF-TOKEN", "tok-1")
        .with_body(format!(
            r#"{{"success":true,"data":[
                {{"collectTime":{collect_time},"stationCode":"NE-1",
                  "dataItemMap":{{"inverter_power":42.5}}}},
                {{"collectTime":{stale_time},"stationCode":"NE-1",
                  "dataItemMap":{{"inverter_power":10.0}}}}
            ]}}"#
        ))
        .expect(1)
        .create();
    let real = server
        .mock("POST", "/thirdData/getStationRealKpi")
        .with_body(
            r#"{"success":true,"data":[
                {"stationCode":"NE-1","dataItemMap":{"real_health_state":"3"}}
            ]}"#,
        )
        .expect(1)
        .create();

    let run = |db: &std::path::Path, base: &str| {
        Command::cargo_bin("pvsync")
            .unwrap()
            .current_dir(dir.path())
            .env("PVSYNC_DB_PATH", db)
            .env("PVSYNC_FS_BASE_URL", base)
            .env("PVSYNC_FS_USERNAME", "apiuser")
            .env("PVSYNC_FS_SYSTEM_CODE", "syscode")
            .arg("sync-energy")
            .assert()
            .success();
    };

    run(&db_path, &server.url());
    assert_eq!(row_count(&db_path), 3);

    let conn = Connection::open(&db_path).unwrap();
    let patched: f64 = conn
        .query_row(
            "SELECT value FROM energy_patched WHERE date = ?1",
            params![yesterday],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(patched, 42.5);
    drop(conn);

    // Already current through yesterday; must not touch the vendor.
    run(&db_path, &server.url());
    assert_eq!(row_count(&db_path), 3);

    login.assert();
    day.assert();
    real.assert();
}
