//! HTTP client configuration and bounded retries
//!
//! Every remote call goes through [`NetworkManager::fetch`], which applies a
//! [`RetryPolicy`] and reads the whole response (status, relocation header,
//! cookies and body) inside the attempt, so a stalled body counts as a failed
//! attempt like any other timeout.

use crate::{Error, Result, config::Settings, types::CookieJar};
use reqwest::{Client, Proxy, RequestBuilder, StatusCode, header, redirect};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how long a single call may be tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub attempts: u32,
    /// Timeout applied to each attempt, body included
    pub per_attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            per_attempt_timeout,
        }
    }

    /// One attempt, no retry
    pub fn single(timeout: Duration) -> Self {
        Self::new(1, timeout)
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    /// `Location` header, if any
    pub location: Option<String>,
    /// Cookies set by this response only
    pub cookies: CookieJar,
    pub body: String,
}

impl Fetched {
    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Which client a request should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    Manual,
}

/// Network manager for HTTP requests
#[derive(Debug, Clone)]
pub struct NetworkManager {
    /// Client that follows redirects
    client: Client,
    /// Client that hands 3xx responses back to the caller
    manual_client: Client,
    /// Timeout for calls that carry no policy of their own
    default_timeout: Duration,
}

impl NetworkManager {
    /// Create new network manager from the network settings
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: Self::build_client(settings, redirect::Policy::default())?,
            manual_client: Self::build_client(settings, redirect::Policy::none())?,
            default_timeout: Duration::from_secs(settings.network.request_timeout),
        })
    }

    fn build_client(settings: &Settings, policy: redirect::Policy) -> Result<Client> {
        let mut client_builder = Client::builder()
            .user_agent(settings.network.user_agent.as_str())
            .connect_timeout(Duration::from_secs(settings.network.connect_timeout))
            .redirect(policy);

        if let Some(proxy_url) = settings.get_proxy_url() {
            let proxy = Proxy::all(&proxy_url).map_err(|e| {
                crate::Error::config("proxy", &format!("Invalid proxy URL {}: {}", proxy_url, e))
            })?;
            client_builder = client_builder.proxy(proxy);
        }

        if settings.network.disable_tls_verification {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        client_builder.build().map_err(|e| {
            crate::Error::config(
                "client_builder",
                &format!("Failed to create HTTP client: {}", e),
            )
        })
    }

    /// Policy for calls without a dedicated retry budget
    pub fn default_policy(&self) -> RetryPolicy {
        RetryPolicy::single(self.default_timeout)
    }

    /// Perform a request with retry logic
    ///
    /// `build` is called once per attempt. Every failure is retried the same
    /// way; after the last attempt the final error is returned as
    /// [`Error::Transport`] with its message intact.
    pub async fn fetch<F>(
        &self,
        operation: &str,
        redirects: Redirects,
        policy: RetryPolicy,
        build: F,
    ) -> Result<Fetched>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let client = match redirects {
            Redirects::Follow => &self.client,
            Redirects::Manual => &self.manual_client,
        };

        let mut last_error = None;

        for attempt in 1..=policy.attempts {
            let request = build(client).timeout(policy.per_attempt_timeout);

            match Self::perform_request(request).await {
                Ok(fetched) => {
                    debug!(
                        operation,
                        attempt,
                        status = %fetched.status,
                        cookies = fetched.cookies.len(),
                        "request completed"
                    );
                    return Ok(fetched);
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(
                            "{} timed out, retrying ({}/{})",
                            operation, attempt, policy.attempts
                        );
                    } else {
                        warn!(
                            "{} failed: {}, retrying ({}/{})",
                            operation, e, attempt, policy.attempts
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error =
            last_error.unwrap_or_else(|| Error::internal("No error recorded during retries"));
        Err(Error::transport(operation, policy.attempts, &last_error))
    }

    /// Perform single HTTP request and read it completely
    async fn perform_request(request: RequestBuilder) -> Result<Fetched> {
        let response = request.send().await?;

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect::<CookieJar>();
        let body = response.text().await?;

        Ok(Fetched {
            status,
            location,
            cookies,
            body,
        })
    }
}
