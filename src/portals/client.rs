use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::constants::defaults;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("can not connect to {url} after {attempts} attempts")]
    ConnectionFailure { url: String, attempts: usize },
}

/// Outbound HTTP with bounded retry on transient failure.
///
/// Retries while the status code is in the retryable set or the
/// transport itself fails. Any other response, including a 4xx, is
/// handed back with its body intact: HTTP success never implies
/// application-level success, the vendors embed their own flags in the
/// JSON body.
pub struct RequestClient {
    agent: ureq::Agent,
    max_attempts: usize,
    retryable: Vec<u16>,
    delay_cap: Duration,
}

impl RequestClient {
    pub fn new(timeout: Duration) -> Self {
        RequestClient {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            retryable: defaults::RETRYABLE_STATUS.to_vec(),
            delay_cap: defaults::RETRY_DELAY_CAP,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay_cap(mut self, cap: Duration) -> Self {
        self.delay_cap = cap;
        self
    }

    pub fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<ureq::Response, ClientError> {
        self.run(url, || {
            let mut req = self.agent.post(url).set("Content-Type", "application/json");
            for (name, value) in headers {
                req = req.set(name, value);
            }
            req.send_string(body)
        })
    }

    pub fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<ureq::Response, ClientError> {
        self.run(url, || {
            let mut req = self.agent.get(url);
            for (name, value) in query {
                req = req.query(name, value);
            }
            req.call()
        })
    }

    fn run(
        &self,
        url: &str,
        send: impl Fn() -> Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, ClientError> {
        for attempt in 1..=self.max_attempts {
            match send() {
                Ok(resp) => return Ok(resp),
                Err(ureq::Error::Status(code, resp)) => {
                    if !self.retryable.contains(&code) {
                        return Ok(resp);
                    }
                    log::warn!(
                        "{url} returned status {code}; attempt {attempt}/{}",
                        self.max_attempts
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Request to {url} failed: {e}; attempt {attempt}/{}",
                        self.max_attempts
                    );
                }
            }
            if attempt < self.max_attempts {
                self.pause(attempt);
            }
        }
        Err(ClientError::ConnectionFailure {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Jittered linear backoff, capped. Zero cap disables the delay.
    fn pause(&self, attempt: usize) {
        let cap = self.delay_cap.as_millis() as u64;
        if cap == 0 {
            return;
        }
        let ceiling = (attempt as u64 * 100).min(cap);
        let delay = rand::thread_rng().gen_range(0..=ceiling);
        std::thread::sleep(Duration::from_millis(delay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> RequestClient {
        RequestClient::new(Duration::from_secs(5)).with_retry_delay_cap(Duration::ZERO)
    }

    #[test]
    fn successful_response_is_returned_on_first_attempt() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/data")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create();

        let resp = test_client()
            .post_json(&format!("{}/data", server.url()), &[], "{}")
            .unwrap();
        assert_eq!(resp.status(), 200);
        m.assert();
    }

    #[test]
    fn retryable_status_exhausts_exactly_the_attempt_bound() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/data")
            .with_status(503)
            .expect(20)
            .create();

        let err = test_client()
            .post_json(&format!("{}/data", server.url()), &[], "{}")
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ConnectionFailure { attempts: 20, .. }
        ));
        m.assert();
    }

    #[test]
    fn non_retryable_4xx_is_returned_with_body() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/data")
            .with_status(401)
            .with_body(r#"{"success":false,"failCode":305}"#)
            .expect(1)
            .create();

        let resp = test_client()
            .post_json(&format!("{}/data", server.url()), &[], "{}")
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(
            resp.into_string().unwrap(),
            r#"{"success":false,"failCode":305}"#
        );
        m.assert();
    }

    #[test]
    fn transport_failure_also_exhausts_the_bound() {
        // Nothing listens on this port; every attempt is a transport error.
        let err = test_client()
            .with_max_attempts(3)
            .post_json("http://127.0.0.1:9/data", &[], "{}")
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ConnectionFailure { attempts: 3, .. }
        ));
    }
}
