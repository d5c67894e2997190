use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{defaults, envvars};

/// Runtime configuration, assembled from environment variables with
/// hardcoded fallbacks for the public vendor endpoints.
#[derive(Clone, Debug)]
pub struct Settings {
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    pub token_ttl: Duration,
    pub fusion: FusionSettings,
    pub envision: EnvisionSettings,
    pub run_state_csv: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct FusionSettings {
    pub base_url: String,
    pub login_url: String,
    pub username: String,
    pub system_code: String,
}

#[derive(Clone, Debug)]
pub struct EnvisionSettings {
    pub token_url: String,
    pub base_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub username: String,
    pub password: String,
    pub org_id: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> Self {
        let fs_base_url = var_or(envvars::FS_BASE_URL, defaults::FS_BASE_URL);
        let fs_login_url = env::var(envvars::FS_LOGIN_URL)
            .unwrap_or_else(|_| format!("{fs_base_url}{}", defaults::FS_LOGIN_PATH));

        let request_timeout = env::var(envvars::REQUEST_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults::API_REQUEST_TIMEOUT);
        let token_ttl = env::var(envvars::TOKEN_TTL_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults::TOKEN_TTL);

        Settings {
            db_path: PathBuf::from(var_or(envvars::DB_PATH, "pvsync.db")),
            request_timeout,
            token_ttl,
            fusion: FusionSettings {
                base_url: fs_base_url,
                login_url: fs_login_url,
                username: var_or(envvars::FS_USERNAME, ""),
                system_code: var_or(envvars::FS_SYSTEM_CODE, ""),
            },
            envision: EnvisionSettings {
                token_url: var_or(envvars::ENVISION_TOKEN_URL, defaults::ENVISION_TOKEN_URL),
                base_url: var_or(envvars::ENVISION_BASE_URL, defaults::ENVISION_BASE_URL),
                access_key: var_or(envvars::ENVISION_ACCESS_KEY, ""),
                secret_key: var_or(envvars::ENVISION_SECRET_KEY, ""),
                username: var_or(envvars::ENVISION_USERNAME, ""),
                password: var_or(envvars::ENVISION_PASSWORD, ""),
                org_id: var_or(envvars::ENVISION_ORG_ID, defaults::ENVISION_ORG_ID),
            },
            run_state_csv: env::var(envvars::RUN_STATE_CSV).ok().map(PathBuf::from),
        }
    }
}
