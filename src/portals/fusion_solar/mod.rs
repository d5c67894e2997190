//! FusionSolar third-party API: token exchange plus the day-KPI and
//! real-KPI endpoints used for backfill and health snapshots.

pub mod normalize;

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::settings::FusionSettings;
use crate::sync::SyncError;

use super::client::RequestClient;
use super::ApiToken;

const STATION_DAY_PATH: &str = "/thirdData/getKpiStationDay";
const DEVICE_DAY_PATH: &str = "/thirdData/getDevKpiDay";
const STATION_REAL_PATH: &str = "/thirdData/getStationRealKpi";
const DEVICE_REAL_PATH: &str = "/thirdData/getDevRealKpi";

/// Inverters; the only device type we query day KPIs for.
const DEV_TYPE_INVERTER: i64 = 1;

/// Every FusionSolar response wraps its payload in this envelope; a
/// false success flag is fatal for the whole cycle, partial vendor data
/// without a success signal cannot be trusted.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(rename = "failCode")]
    fail_code: Option<i64>,
    message: Option<String>,
    data: Option<Value>,
}

pub struct FusionSolarApi {
    client: RequestClient,
    settings: FusionSettings,
    token_ttl: Duration,
    token: Option<ApiToken>,
}

impl FusionSolarApi {
    pub fn new(client: RequestClient, settings: FusionSettings, token_ttl: Duration) -> Self {
        FusionSolarApi {
            client,
            settings,
            token_ttl,
            token: None,
        }
    }

    /// Station-level daily KPIs for one month-aligned query timestamp.
    pub fn station_day_kpis(
        &mut self,
        station_codes: &str,
        collect_time: i64,
    ) -> Result<Value, SyncError> {
        self.call(
            STATION_DAY_PATH,
            json!({ "stationCodes": station_codes, "collectTime": collect_time }),
        )
    }

    /// Inverter-level daily KPIs for one month-aligned query timestamp.
    pub fn device_day_kpis(&mut self, dev_ids: &str, collect_time: i64) -> Result<Value, SyncError> {
        self.call(
            DEVICE_DAY_PATH,
            json!({
                "devIds": dev_ids,
                "collectTime": collect_time,
                "devTypeId": DEV_TYPE_INVERTER,
            }),
        )
    }

    /// Live station health codes; not windowed.
    pub fn station_real_kpis(&mut self, station_codes: &str) -> Result<Value, SyncError> {
        self.call(STATION_REAL_PATH, json!({ "stationCodes": station_codes }))
    }

    /// Live inverter run states; not windowed.
    pub fn device_real_kpis(&mut self, dev_ids: &str) -> Result<Value, SyncError> {
        self.call(
            DEVICE_REAL_PATH,
            json!({ "devIds": dev_ids, "devTypeId": DEV_TYPE_INVERTER }),
        )
    }

    fn call(&mut self, path: &str, body: Value) -> Result<Value, SyncError> {
        let token = self.ensure_token()?;
        let url = format!("{}{}", self.settings.base_url, path);
        let resp = self
            .client
            .post_json(&url, &[("XSRF-TOKEN", &token)], &body.to_string())?;
        let envelope: Envelope = parse_body(&url, resp)?;
        if !envelope.success {
            return Err(SyncError::Vendor {
                endpoint: url,
                code: envelope.fail_code.unwrap_or(0),
                message: envelope.message.unwrap_or_else(|| "--".to_string()),
            });
        }
        envelope
            .data
            .ok_or_else(|| SyncError::ShapeMismatch(format!("{url} response carries no data")))
    }

    /// The token is fetched once and reused for every call in the
    /// cycle, re-fetched only once it goes stale.
    fn ensure_token(&mut self) -> Result<String, SyncError> {
        if let Some(token) = &self.token {
            if !token.is_stale(self.token_ttl) {
                return Ok(token.value.clone());
            }
            log::info!("FusionSolar API token is stale, re-fetching");
        }
        let token = self.fetch_token()?;
        let value = token.value.clone();
        self.token = Some(token);
        Ok(value)
    }

    fn fetch_token(&self) -> Result<ApiToken, SyncError> {
        log::info!("FusionSolar - getting API token ...");
        let body = json!({
            "userName": self.settings.username,
            "systemCode": self.settings.system_code,
        });
        let resp = self
            .client
            .post_json(&self.settings.login_url, &[], &body.to_string())?;
        match resp.header("xsrf-token") {
            Some(token) => Ok(ApiToken::new(token.to_string())),
            None => Err(SyncError::ShapeMismatch(format!(
                "{} response carries no xsrf-token header",
                self.settings.login_url
            ))),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(
    url: &str,
    resp: ureq::Response,
) -> Result<T, SyncError> {
    resp.into_json()
        .map_err(|e| SyncError::ShapeMismatch(format!("{url} returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_for(server: &mockito::Server) -> FusionSolarApi {
        let settings = FusionSettings {
            base_url: server.url(),
            login_url: format!("{}/thirdData/login", server.url()),
            username: "apiuser".to_string(),
            system_code: "syscode".to_string(),
        };
        let client =
            RequestClient::new(Duration::from_secs(5)).with_retry_delay_cap(Duration::ZERO);
        FusionSolarApi::new(client, settings, Duration::from_secs(1800))
    }

    #[test]
    fn token_is_read_from_the_login_response_header() {
        let mut server = mockito::Server::new();
        let login = server
            .mock("POST", "/thirdData/login")
            .match_header("Content-Type", "application/json")
            .with_header("xsrf-token", "tok-123")
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create();
        let day = server
            .mock("POST", "/thirdData/getKpiStationDay")
            .match_header("XSRF-TOKEN", "tok-123")
            .with_body(r#"{"success":true,"data":[]}"#)
            .expect(2)
            .create();

        let mut api = api_for(&server);
        // Two calls, one token fetch.
        api.station_day_kpis("NE-1", 1705363200000).unwrap();
        api.station_day_kpis("NE-1", 1705363200000).unwrap();
        login.assert();
        day.assert();
    }

    #[test]
    fn missing_token_header_is_a_shape_mismatch() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/thirdData/login")
            .with_body(r#"{"success":true}"#)
            .create();

        let mut api = api_for(&server);
        let err = api.station_real_kpis("NE-1").unwrap_err();
        assert!(matches!(err, SyncError::ShapeMismatch(_)));
    }

    #[test]
    fn vendor_failure_flag_is_fatal_with_code_and_message() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/thirdData/login")
            .with_header("xsrf-token", "tok")
            .with_body("{}")
            .create();
        server
            .mock("POST", "/thirdData/getKpiStationDay")
            .with_body(r#"{"success":false,"failCode":407,"message":"access frequency too high"}"#)
            .create();

        let mut api = api_for(&server);
        let err = api.station_day_kpis("NE-1", 1705363200000).unwrap_err();
        match err {
            SyncError::Vendor { code, message, .. } => {
                assert_eq!(code, 407);
                assert_eq!(message, "access frequency too high");
            }
            other => panic!("expected vendor failure, got {other:?}"),
        }
    }
}
