pub const DB_PATH: &str = "PVSYNC_DB_PATH";

pub const LOG_LEVEL: &str = "LOG_LEVEL";

pub const FS_BASE_URL: &str = "PVSYNC_FS_BASE_URL";
pub const FS_LOGIN_URL: &str = "PVSYNC_FS_LOGIN_URL";
pub const FS_USERNAME: &str = "PVSYNC_FS_USERNAME";
pub const FS_SYSTEM_CODE: &str = "PVSYNC_FS_SYSTEM_CODE";

pub const ENVISION_TOKEN_URL: &str = "PVSYNC_ENV_TOKEN_URL";
pub const ENVISION_BASE_URL: &str = "PVSYNC_ENV_BASE_URL";
pub const ENVISION_ACCESS_KEY: &str = "PVSYNC_ENV_ACCESS_KEY";
pub const ENVISION_SECRET_KEY: &str = "PVSYNC_ENV_SECRET_KEY";
pub const ENVISION_USERNAME: &str = "PVSYNC_ENV_USERNAME";
pub const ENVISION_PASSWORD: &str = "PVSYNC_ENV_PASSWORD";
pub const ENVISION_ORG_ID: &str = "PVSYNC_ENV_ORG_ID";

pub const RUN_STATE_CSV: &str = "PVSYNC_RUN_STATE_CSV";
pub const REQUEST_TIMEOUT_SECS: &str = "PVSYNC_REQUEST_TIMEOUT_SECS";
pub const TOKEN_TTL_SECS: &str = "PVSYNC_TOKEN_TTL_SECS";
