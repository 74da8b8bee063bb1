use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Url};
use tracing::{debug, trace};

use crate::error::{Error, TransportError};

use super::super::{PreparedRequest, Transport};
use super::connection::{parse_endpoint, resolve_credentials, Credentials};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error-status body kept in [`TransportError::Status`].
const STATUS_BODY_PREVIEW: usize = 512;

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// File holding `username:password`, used when no explicit
    /// credentials are given.
    pub cookie_file: Option<PathBuf>,
    /// Outbound HTTP requests per second. A batch counts as one request.
    pub requests_per_second: Option<u32>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            pass: None,
            cookie_file: None,
            requests_per_second: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Posts JSON-RPC payloads to one HTTP(S) endpoint.
pub struct HttpTransport {
    client: Client,
    url: Url,
    auth: Option<Credentials>,
    limiter: Option<DirectRateLimiter>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, Error> {
        let mut url = parse_endpoint(&config.url)?;
        let auth = resolve_credentials(
            &mut url,
            config.user.as_deref(),
            config.pass.as_deref(),
            config.cookie_file.as_deref(),
        )?;

        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    Error::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("build HTTP client: {e}")))?;

        debug!(
            rpc.url = %url,
            rpc.auth = auth.is_some(),
            rpc.rate_limited = limiter.is_some(),
            "http transport ready"
        );

        Ok(Self {
            client,
            url,
            auth,
            limiter,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: PreparedRequest) -> Result<Vec<u8>, TransportError> {
        self.wait_for_rate_limit().await;

        let body_len = request.body.len();
        let mut builder = self.client.post(self.url.clone()).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.pass));
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(%status, request_len = body_len, body_len = bytes.len(), "http response");

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            trace!(%status, body = %body, "http error body");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(STATUS_BODY_PREVIEW).collect(),
            });
        }

        Ok(bytes.to_vec())
    }
}
