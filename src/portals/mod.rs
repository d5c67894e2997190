//! Vendor portal access: the resilient request client, authentication
//! and per-vendor payload normalization.

pub mod client;
pub mod envision;
pub mod fusion_solar;

use std::time::Duration;

use chrono::{DateTime, Utc};

/// A vendor auth token with its fetch time, so staleness is an explicit
/// condition rather than a guess about vendor token lifetimes.
#[derive(Clone, Debug)]
pub struct ApiToken {
    pub value: String,
    pub fetched_at: DateTime<Utc>,
}

impl ApiToken {
    pub fn new(value: String) -> Self {
        ApiToken {
            value,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.is_stale_at(ttl, Utc::now())
    }

    fn is_stale_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        now - self.fetched_at > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn token_goes_stale_after_ttl() {
        let fetched = Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap();
        let token = ApiToken {
            value: "tok".to_string(),
            fetched_at: fetched,
        };
        let ttl = Duration::from_secs(1800);

        let fresh = fetched + chrono::Duration::minutes(29);
        let stale = fetched + chrono::Duration::minutes(31);
        assert!(!token.is_stale_at(ttl, fresh));
        assert!(token.is_stale_at(ttl, stale));
    }
}
