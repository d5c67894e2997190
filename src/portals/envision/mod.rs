//! Envision solar API: two-step keyed-hash authentication and the
//! accumulative meter-reading endpoint.

pub mod normalize;

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::settings::EnvisionSettings;
use crate::sync::SyncError;

use super::client::RequestClient;
use super::ApiToken;

const LOGIN_PATH: &str = "/solar-api/v1.0/loginService/login";
const POINTS_PATH: &str = "/solar-api/v1.0/domainService/getmdmidspoints";

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Step-1 signature: access key, millisecond timestamp and the shared
/// secret, concatenated and hashed.
fn access_signature(access_key: &str, timestamp_ms: i64, secret: &str) -> String {
    sha256_hex(&format!("{access_key}{timestamp_ms}{secret}"))
}

/// Step-2 signature additionally covers the serialized login payload.
fn login_signature(access_token: &str, params: &str, timestamp_ms: i64, secret: &str) -> String {
    sha256_hex(&format!("{access_token}{params}{timestamp_ms}{secret}"))
}

pub struct EnvisionApi {
    client: RequestClient,
    settings: EnvisionSettings,
    token_ttl: Duration,
    session: Option<ApiToken>,
}

impl EnvisionApi {
    pub fn new(client: RequestClient, settings: EnvisionSettings, token_ttl: Duration) -> Self {
        EnvisionApi {
            client,
            settings,
            token_ttl,
            session: None,
        }
    }

    /// Accumulative production/consumption readings for a comma-joined
    /// mdm id list. `metric_prefix` selects the vendor point family,
    /// e.g. `APP` asks for `APP.APProductionKWH,APP.APConsumedKWH`.
    pub fn accumulative_readings(
        &mut self,
        mdm_ids: &str,
        metric_prefix: &str,
    ) -> Result<Value, SyncError> {
        let token = self.ensure_session()?;
        let url = format!("{}{}", self.settings.base_url, POINTS_PATH);
        let points = format!(
            "{metric_prefix}.APProductionKWH,{metric_prefix}.APConsumedKWH"
        );
        let resp = self.client.get(
            &url,
            &[
                ("mdmids", mdm_ids),
                ("points", &points),
                ("token", &token),
                ("orgId", &self.settings.org_id),
                ("field", "value"),
            ],
        )?;
        let rs: Value = parse_body(&url, resp)?;
        match rs.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(SyncError::Vendor {
                endpoint: url,
                code: rs.get("status").and_then(Value::as_i64).unwrap_or(1),
                message: message_of(&rs),
            }),
        }
    }

    fn ensure_session(&mut self) -> Result<String, SyncError> {
        if let Some(session) = &self.session {
            if !session.is_stale(self.token_ttl) {
                return Ok(session.value.clone());
            }
            log::info!("Envision session token is stale, re-fetching");
        }
        let session = ApiToken::new(self.fetch_session_token()?);
        let value = session.value.clone();
        self.session = Some(session);
        Ok(value)
    }

    fn fetch_access_token(&self) -> Result<String, SyncError> {
        let timestamp = Utc::now().timestamp_millis();
        let body = json!({
            "appKey": self.settings.access_key,
            "encryption": access_signature(
                &self.settings.access_key,
                timestamp,
                &self.settings.secret_key,
            ),
            "timestamp": timestamp,
        });
        let url = &self.settings.token_url;
        let resp = self.client.post_json(url, &[], &body.to_string())?;
        let rs: Value = parse_body(url, resp)?;
        check_status(url, &rs)?;
        rs.pointer("/data/accessToken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::ShapeMismatch(format!("{url} response carries no data.accessToken"))
            })
    }

    fn fetch_session_token(&self) -> Result<String, SyncError> {
        log::info!("Envision - getting API token ...");
        let access_token = self.fetch_access_token()?;
        // The signature covers this exact serialization, key order included.
        let params = format!(
            "{{\"password\": \"{}\", \"username\": \"{}\"}}",
            self.settings.password, self.settings.username
        );
        let timestamp = Utc::now().timestamp_millis();
        let signature = login_signature(
            &access_token,
            &params,
            timestamp,
            &self.settings.secret_key,
        );
        let body = json!({
            "username": self.settings.username,
            "password": self.settings.password,
        });
        let url = format!("{}{}", self.settings.base_url, LOGIN_PATH);
        let resp = self.client.post_json(
            &url,
            &[
                ("apim-accesstoken", &access_token),
                ("apim-signature", &signature),
                ("apim-timestamp", &timestamp.to_string()),
            ],
            &body.to_string(),
        )?;
        let rs: Value = parse_body(&url, resp)?;
        check_status(&url, &rs)?;
        rs.get("body")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::ShapeMismatch(format!("{url} response carries no body token")))
    }
}

/// Envision signals failure with a non-zero `status` field.
fn check_status(url: &str, rs: &Value) -> Result<(), SyncError> {
    let status = rs.get("status").and_then(Value::as_i64).unwrap_or(1);
    if status != 0 {
        return Err(SyncError::Vendor {
            endpoint: url.to_string(),
            code: status,
            message: message_of(rs),
        });
    }
    Ok(())
}

fn message_of(rs: &Value) -> String {
    rs.get("msg")
        .and_then(Value::as_str)
        .unwrap_or("--")
        .to_string()
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
    use mockito::Matcher;

    #[test]
    fn access_signature_matches_known_vector() {
        assert_eq!(
            access_signature("ak-123", 1710000000000, "sk-456"),
            "0ec1fe105b64d7ad9c866496e5db437a2f5ad95c478276ed30b8c883eff3fec5"
        );
    }

    #[test]
    fn login_signature_covers_the_serialized_params() {
        let params = "{\"password\": \"pw\", \"username\": \"user\"}";
        assert_eq!(
            login_signature("token-abc", params, 1710000000000, "sk-456"),
            "6ca4b92ea686659d926a09a61775f10fe73937e852f91cfc554f46e54cdf828c"
        );
    }

    fn api_for(server: &mockito::Server) -> EnvisionApi {
        let settings = EnvisionSettings {
            token_url: format!("{}/apim-token-service/v2.0/token/get", server.url()),
            base_url: server.url(),
            access_key: "ak-123".to_string(),
            secret_key: "sk-456".to_string(),
            username: "user".to_string(),
            password: "pw".to_string(),
            org_id: "o123".to_string(),
        };
        let client = RequestClient::new(Duration::from_secs(5))
            .with_retry_delay_cap(Duration::ZERO);
        EnvisionApi::new(client, settings, Duration::from_secs(1800))
    }

    #[test]
    fn two_step_auth_then_readings() {
        let mut server = mockito::Server::new();
        let token = server
            .mock("POST", "/apim-token-service/v2.0/token/get")
            .with_body(r#"{"status":0,"data":{"accessToken":"acc-1"}}"#)
            .expect(1)
            .create();
        let login = server
            .mock("POST", "/solar-api/v1.0/loginService/login")
            .match_header("apim-accesstoken", "acc-1")
            .match_header("apim-signature", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
            .with_body(r#"{"status":0,"body":"sess-1"}"#)
            .expect(1)
            .create();
        let points = server
            .mock("GET", "/solar-api/v1.0/domainService/getmdmidspoints")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mdmids".to_string(), "M1,M2".to_string()),
                Matcher::UrlEncoded(
                    "points".to_string(),
                    "APP.APProductionKWH,APP.APConsumedKWH".to_string(),
                ),
                Matcher::UrlEncoded("token".to_string(), "sess-1".to_string()),
                Matcher::UrlEncoded("field".to_string(), "value".to_string()),
            ]))
            .with_body(r#"{"result":{"M1":{"points":{}}}}"#)
            .expect(1)
            .create();

        let mut api = api_for(&server);
        let result = api.accumulative_readings("M1,M2", "APP").unwrap();
        assert!(result.get("M1").is_some());
        token.assert();
        login.assert();
        points.assert();
    }

    #[test]
    fn nonzero_status_is_a_vendor_failure() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/apim-token-service/v2.0/token/get")
            .with_body(r#"{"status":403,"msg":"bad app key"}"#)
            .create();

        let mut api = api_for(&server);
        let err = api.accumulative_readings("M1", "APP").unwrap_err();
        match err {
            SyncError::Vendor { code, message, .. } => {
                assert_eq!(code, 403);
                assert_eq!(message, "bad app key");
            }
            other => panic!("expected vendor failure, got {other:?}"),
        }
    }
}
