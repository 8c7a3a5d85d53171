//! Single-document retrieval.
//!
//! A [`Fetcher`] performs one logical GET: it follows same-scheme HTTP
//! redirects itself, up to a caller-supplied budget, and hands back a parsed
//! [`AdDocument`]. The wire work sits behind the [`Transport`] trait so the
//! resolution logic can be driven without a network.

use crate::config::ResolveOptions;
use crate::error::{AdTagError, FetchError};
use crate::models::AdDocument;
use log::debug;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use std::future::Future;
use std::time::Instant;
use thiserror::Error;
use url::Url;

/// What a single GET produced, before any redirect is followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// 2xx with the response body
    Success(String),
    /// 3xx with the `Location` header, if the server sent one
    Redirect(Option<String>),
    /// Any other status code
    Status(u16),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Issues one HTTP GET without following redirects
pub trait Transport: Send + Sync {
    fn get(&self, url: &Url) -> impl Future<Output = Result<HttpOutcome, TransportError>> + Send;
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(options: &ResolveOptions) -> Result<Self, AdTagError> {
        // Redirects are counted by the Fetcher, never by the client
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| AdTagError::ClientSetup {
                reason: e.to_string(),
            })?;

        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<HttpOutcome, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(HttpOutcome::Success(response.text().await?))
        } else if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            Ok(HttpOutcome::Redirect(location))
        } else {
            Ok(HttpOutcome::Status(status.as_u16()))
        }
    }
}

/// Fetches and parses ad documents through a [`Transport`]
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    transport: T,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Fetcher { transport }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url` and parse the body, following at most `redirect_budget` redirects.
    ///
    /// A redirect received once the budget is spent fails with
    /// [`FetchError::TooManyRedirects`]; there are no retries.
    pub async fn fetch(&self, url: &str, redirect_budget: u32) -> Result<AdDocument, FetchError> {
        let mut current = Url::parse(url.trim()).map_err(|e| FetchError::open(url, e))?;
        let mut remaining = redirect_budget;
        let start_time = Instant::now();

        loop {
            debug!("GET {} (redirects left: {})", current, remaining);

            let outcome = self.transport.get(&current).await.map_err(|e| match e {
                TransportError::Timeout => FetchError::Timeout {
                    url: current.to_string(),
                },
                TransportError::Other(reason) => FetchError::open(current.as_str(), reason),
            })?;

            match outcome {
                HttpOutcome::Success(body) => {
                    debug!(
                        "Received {} bytes from {} in {:?}",
                        body.len(),
                        current,
                        start_time.elapsed()
                    );
                    return AdDocument::parse(&body).map_err(|e| FetchError::open(current.as_str(), e));
                }
                HttpOutcome::Redirect(None) => {
                    return Err(FetchError::open(
                        current.as_str(),
                        "redirect response without a Location header",
                    ));
                }
                HttpOutcome::Redirect(Some(location)) => {
                    if remaining == 0 {
                        return Err(FetchError::TooManyRedirects {
                            url: url.to_string(),
                            budget: redirect_budget,
                        });
                    }
                    let next = current
                        .join(location.trim())
                        .map_err(|e| FetchError::open(current.as_str(), e))?;
                    if next.scheme() != current.scheme() {
                        return Err(FetchError::open(
                            current.as_str(),
                            format!(
                                "redirection forbidden: {} -> {}",
                                current.scheme(),
                                next.scheme()
                            ),
                        ));
                    }
                    debug!("Redirected from {} to {}", current, next);
                    remaining -= 1;
                    current = next;
                }
                HttpOutcome::Status(code) => {
                    return Err(FetchError::open(
                        current.as_str(),
                        format!("HTTP status {}", code),
                    ));
                }
            }
        }
    }
}
