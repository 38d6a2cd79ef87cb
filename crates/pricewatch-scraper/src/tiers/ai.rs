//! Language-model price extraction over a page no selector could read.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};

use crate::client::HttpFetcher;
use crate::error::ScrapeError;
use crate::payload::RawExtractionPayload;

const SYSTEM_PROMPT: &str = "You extract product pricing from e-commerce pages. \
Return JSON with keys: price (current selling price as a number or string, or null), \
original_price (pre-sale price if the page shows a discount, else null), \
in_stock (boolean, or null if unknown). Do not guess.";

static NON_CONTENT_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|iframe)\b[^>]*>.*?</(script|style|noscript|svg|iframe)\s*>")
        .expect("valid block regex")
});
static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tags regex"));

/// OpenAI-compatible chat completions endpoint settings.
#[derive(Clone)]
pub struct AiService {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_html_chars: usize,
}

impl std::fmt::Debug for AiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiService")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_html_chars", &self.max_html_chars)
            .finish()
    }
}

/// Strips scripts, styles, comments and tags, collapses whitespace, and
/// truncates to at most `max_chars` characters.
#[must_use]
pub fn clean_html(html: &str, max_chars: usize) -> String {
    let without_blocks = NON_CONTENT_BLOCKS.replace_all(html, " ");
    let without_comments = COMMENTS.replace_all(&without_blocks, " ");
    let text = TAGS.replace_all(&without_comments, " ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => collapsed[..cut].to_owned(),
        None => collapsed,
    }
}

/// Sends the cleaned page to the model and reads back price fields.
///
/// # Errors
///
/// - [`ScrapeError::Status`] / [`ScrapeError::Http`] when the call fails.
/// - [`ScrapeError::AiResponse`] when the reply is not the expected JSON.
/// - [`ScrapeError::NoPriceFound`] when the model reports no price.
pub async fn extract_with_model(
    fetcher: &HttpFetcher,
    service: &AiService,
    url: &str,
    html: &str,
) -> Result<RawExtractionPayload, ScrapeError> {
    let page_text = clean_html(html, service.max_html_chars);
    let request = json!({
        "model": service.model,
        "response_format": { "type": "json_object" },
        "temperature": 0,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": format!("Product page URL: {url}\n\nPage text:\n{page_text}")
            }
        ]
    });

    let endpoint = format!("{}/chat/completions", service.base_url.trim_end_matches('/'));
    let body = fetcher
        .post_json(&endpoint, &request, service.api_key.as_deref(), service.timeout)
        .await?;

    parse_model_reply(url, &body)
}

/// Reads `choices[0].message.content` and parses it as price JSON.
///
/// # Errors
///
/// See [`extract_with_model`].
pub fn parse_model_reply(url: &str, body: &str) -> Result<RawExtractionPayload, ScrapeError> {
    let envelope: Value = serde_json::from_str(body).map_err(|source| ScrapeError::Deserialize {
        context: "chat completion response".to_owned(),
        source,
    })?;

    let content = envelope
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| ScrapeError::AiResponse("missing choices[0].message.content".to_owned()))?;

    let fields: Value = serde_json::from_str(content)
        .map_err(|e| ScrapeError::AiResponse(format!("content is not JSON: {e}")))?;

    let price_text = fields
        .get("price")
        .and_then(value_text)
        .ok_or_else(|| ScrapeError::NoPriceFound {
            url: url.to_owned(),
        })?;

    Ok(RawExtractionPayload::AiFallback {
        price_text,
        original_price_text: fields.get("original_price").and_then(value_text),
        in_stock: fields.get("in_stock").and_then(Value::as_bool),
    })
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(content: &str) -> String {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
            .to_string()
    }

    #[test]
    fn clean_html_strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style>.p{color:red}</style><script>var price = 1;</script></head>
            <body><!-- promo --><h1>Wool   Runner</h1><p>Now <b>$98</b></p></body></html>"#;
        assert_eq!(clean_html(html, 1000), "Wool Runner Now $98");
    }

    #[test]
    fn clean_html_truncates_on_char_boundary() {
        let cleaned = clean_html("<p>€€€€€</p>", 3);
        assert_eq!(cleaned, "€€€");
    }

    #[test]
    fn clean_html_shorter_than_limit_is_untouched() {
        assert_eq!(clean_html("<p>abc</p>", 10), "abc");
    }

    #[test]
    fn parses_numeric_fields() {
        let body = reply(r#"{"price": 79.5, "original_price": 120, "in_stock": false}"#);
        let payload = parse_model_reply("https://shop.example/p", &body).unwrap();
        assert_eq!(
            payload,
            RawExtractionPayload::AiFallback {
                price_text: "79.5".to_owned(),
                original_price_text: Some("120".to_owned()),
                in_stock: Some(false),
            }
        );
    }

    #[test]
    fn parses_string_price_with_currency() {
        let body = reply(r#"{"price": "€89,00", "original_price": null}"#);
        let payload = parse_model_reply("https://shop.example/p", &body).unwrap();
        assert_eq!(payload.price_text(), "€89,00");
    }

    #[test]
    fn null_price_is_no_price_found() {
        let body = reply(r#"{"price": null}"#);
        let err = parse_model_reply("https://shop.example/p", &body).unwrap_err();
        assert!(matches!(err, ScrapeError::NoPriceFound { .. }));
    }

    #[test]
    fn non_json_content_is_ai_response_error() {
        let body = reply("The price is $20");
        let err = parse_model_reply("https://shop.example/p", &body).unwrap_err();
        assert!(matches!(err, ScrapeError::AiResponse(_)), "got: {err:?}");
    }

    #[test]
    fn missing_choices_is_ai_response_error() {
        let err = parse_model_reply("https://shop.example/p", "{}").unwrap_err();
        assert!(matches!(err, ScrapeError::AiResponse(_)));
    }
}
