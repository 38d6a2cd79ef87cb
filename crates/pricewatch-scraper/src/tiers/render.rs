//! Headless-render service client, used both for JavaScript-dependent pages
//! and for the proxy-backed anti-bot endpoint.

use std::time::Duration;

use serde::Serialize;

use crate::client::{looks_like_bot_challenge, HttpFetcher};
use crate::error::ScrapeError;

/// One render endpoint. The plain and proxy-backed services share a contract.
#[derive(Clone)]
pub struct RenderService {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for RenderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderService")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
}

/// Asks `service` to render `target_url` and returns the resulting HTML.
///
/// # Errors
///
/// - [`ScrapeError::Status`] / [`ScrapeError::Http`] when the service fails.
/// - [`ScrapeError::BotChallenge`] when the rendered page is a challenge.
pub async fn fetch_rendered(
    fetcher: &HttpFetcher,
    service: &RenderService,
    target_url: &str,
) -> Result<String, ScrapeError> {
    let html = fetcher
        .post_json(
            &service.url,
            &RenderRequest { url: target_url },
            service.api_key.as_deref(),
            service.timeout,
        )
        .await?;

    if looks_like_bot_challenge(&html) {
        return Err(ScrapeError::BotChallenge {
            url: target_url.to_owned(),
        });
    }
    Ok(html)
}
