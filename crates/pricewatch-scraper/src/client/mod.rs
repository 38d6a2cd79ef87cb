//! Shared HTTP client for every network-backed tier.

mod origin;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ScrapeError;

pub use origin::{breaker_scope, parse_product_url};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Markers that only appear on interstitial challenge pages, never on a
/// real product page.
const CHALLENGE_MARKERS: [&str; 5] = [
    "attention required! | cloudflare",
    "/cdn-cgi/challenge-platform/",
    "captcha-delivery.com",
    "px-captcha",
    "_incapsula_resource",
];

/// Thin wrapper over `reqwest::Client` that speaks like a desktop browser
/// and maps HTTP failures onto [`ScrapeError`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher that identifies as `user_agent` and sends browser-like
    /// `Accept`, `Accept-Language` and cache headers on every request.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(user_agent: &str, request_timeout: Duration) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// GETs a page and returns its body.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Status`] for any non-2xx response.
    /// - [`ScrapeError::BotChallenge`] when a 2xx body is a challenge page.
    /// - [`ScrapeError::Http`] on transport failure.
    pub async fn get_html(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let body = ensure_success(response, url)?.text().await?;

        if looks_like_bot_challenge(&body) {
            return Err(ScrapeError::BotChallenge {
                url: url.to_owned(),
            });
        }
        Ok(body)
    }

    /// GETs a JSON document and deserializes it into `T`.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Status`] for any non-2xx response.
    /// - [`ScrapeError::Deserialize`] if the body does not match `T`.
    /// - [`ScrapeError::Http`] on transport failure.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ScrapeError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await?;
        let body = ensure_success(response, url)?.text().await?;

        serde_json::from_str(&body).map_err(|source| ScrapeError::Deserialize {
            context: url.to_owned(),
            source,
        })
    }

    /// POSTs `payload` as JSON and returns the raw response body.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Status`] for any non-2xx response.
    /// - [`ScrapeError::Http`] on transport failure.
    pub async fn post_json<P: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &P,
        bearer_token: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ScrapeError> {
        let mut request = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json, text/html")
            .json(payload)
            .timeout(timeout);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let body = ensure_success(response, endpoint)?.text().await?;
        Ok(body)
    }
}

fn ensure_success(response: Response, url: &str) -> Result<Response, ScrapeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    tracing::debug!(url, status = status.as_u16(), "non-success response");
    Err(ScrapeError::Status {
        status: status.as_u16(),
        url: url.to_owned(),
    })
}

/// Returns `true` when `body` is an anti-bot interstitial rather than content.
#[must_use]
pub fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    if CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return true;
    }

    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");
    (has_just_a_moment && has_cookie_gate) || (has_just_a_moment && has_cf_chl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cloudflare_interstitial() {
        let body = "<html><title>Attention Required! | Cloudflare</title></html>";
        assert!(looks_like_bot_challenge(body));
    }

    #[test]
    fn detects_just_a_moment_with_cookie_gate() {
        let body = "<title>Just a moment...</title><p>Please enable cookies.</p>";
        assert!(looks_like_bot_challenge(body));
    }

    #[test]
    fn detects_datadome_and_perimeterx() {
        assert!(looks_like_bot_challenge(
            r#"<script src="https://ct.captcha-delivery.com/c.js"></script>"#
        ));
        assert!(looks_like_bot_challenge(r#"<div id="px-captcha"></div>"#));
    }

    #[test]
    fn just_a_moment_alone_is_not_a_challenge() {
        assert!(!looks_like_bot_challenge(
            "<p>Just a moment... your cart is updating</p>"
        ));
    }

    #[test]
    fn product_page_is_not_a_challenge() {
        let body = r#"<html><meta property="og:price:amount" content="129.99"></html>"#;
        assert!(!looks_like_bot_challenge(body));
    }
}
