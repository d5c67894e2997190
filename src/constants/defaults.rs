use std::time::Duration;

pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const LOG_LEVEL: &str = "info";

/// Bounded retry for vendor calls; exhaustion is fatal to the cycle.
pub const RETRY_MAX_ATTEMPTS: usize = 20;
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];
pub const RETRY_DELAY_CAP: Duration = Duration::from_secs(2);

/// Vendor tokens are re-fetched once older than this.
pub const TOKEN_TTL: Duration = Duration::from_secs(1800);

/// How far back the store is queried to establish the watermark.
pub const BACKFILL_HORIZON_MONTHS: u32 = 5;

/// Envision caps id-list endpoints at 50 entities per call.
pub const ENVISION_PAGE_SIZE: usize = 50;

pub const FS_BASE_URL: &str = "https://sg5.fusionsolar.huawei.com";
pub const FS_LOGIN_PATH: &str = "/thirdData/login";
pub const ENVISION_TOKEN_URL: &str =
    "https://ag-eu2.envisioniot.com/apim-token-service/v2.0/token/get";
pub const ENVISION_BASE_URL: &str = "https://app-portal-eu2.envisioniot.com";
pub const ENVISION_ORG_ID: &str = "o16221928963871049";
