//! Turns a fetched page into a payload, shared by every HTML-fetching tier.

use crate::error::ScrapeError;
use crate::extract::{extract_fields, SelectorSet};
use crate::jsonld::extract_jsonld_offer;
use crate::payload::RawExtractionPayload;

use super::FetchedHtml;

/// Extracts price fields from `html` with `selectors`, falling back to the
/// page's JSON-LD offer when no price selector matches.
///
/// When neither yields a price, the page is stored in `fetched` so the
/// language-model tier can try it.
///
/// # Errors
///
/// Returns [`ScrapeError::NoPriceFound`] when the page carries no price.
pub fn payload_from_html(
    url: &str,
    html: String,
    selectors: &SelectorSet,
    fetched: &FetchedHtml,
) -> Result<RawExtractionPayload, ScrapeError> {
    let mut fields = extract_fields(&html, selectors);

    if fields.price_text.is_empty() && fields.sale_price_text.is_empty() {
        if let Some(offer) = extract_jsonld_offer(&html) {
            tracing::debug!(url, "price selectors missed; using JSON-LD offer");
            fields.price_text = offer.price_text;
            if fields.availability_text.is_empty() {
                fields.availability_text = offer.availability.unwrap_or_default();
            }
        }
    }

    if fields.price_text.is_empty() && fields.sale_price_text.is_empty() {
        tracing::debug!(url, bytes = html.len(), "no price selector matched");
        fetched.store(html);
        return Err(ScrapeError::NoPriceFound {
            url: url.to_owned(),
        });
    }

    Ok(RawExtractionPayload::Html {
        price_text: fields.price_text,
        sale_price_text: fields.sale_price_text,
        availability_text: fields.availability_text,
    })
}
