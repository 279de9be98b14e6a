//! HTTP round-trip probe, used against the server's ping endpoint

use super::{Expect, HealthError, Probe};
use async_trait::async_trait;
use hyper::{Body, Client, Method, Request, Uri};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Issues a GET and checks the response status
///
/// ```rust
/// use ignition_core::health::{Expect, HttpProbe, Probe};
/// use std::time::Duration;
///
/// # async fn example() {
/// let probe = HttpProbe::new(
///     "http://127.0.0.1:8080/api/v1/ping",
///     Expect::Any2xx,
///     Duration::from_secs(5),
/// );
/// let up = probe.check().await.is_ok();
/// # let _ = up;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    expect: Expect,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, expect: Expect, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            expect,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> Result<(), HealthError> {
        let uri: Uri = self.url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            HealthError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| HealthError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        debug!("GET {}", self.url);
        let response = match timeout(self.timeout, Client::new().request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!("GET {} failed: {}", self.url, e);
                return Err(HealthError::Http(e));
            }
            Err(_) => return Err(HealthError::Timeout(self.timeout)),
        };

        let status = response.status().as_u16();
        debug!("GET {} returned {}", self.url, status);
        if self.expect.matches_status(status) {
            Ok(())
        } else {
            Err(HealthError::UnexpectedStatus(status))
        }
    }
}
