//! Shopify product JSON: `/products/<handle>` → `/products/<handle>.json`.

use reqwest::Url;

use crate::client::HttpFetcher;
use crate::error::ScrapeError;
use crate::payload::RawExtractionPayload;
use crate::types::ShopifyProductResponse;

/// The product's structured endpoint: query and fragment dropped, trailing
/// `/` trimmed, `.json` appended.
///
/// Given `"https://www.everlane.com/products/mens-tee/?variant=42#reviews"`,
/// returns `"https://www.everlane.com/products/mens-tee.json"`.
#[must_use]
pub fn product_json_url(product_url: &Url) -> Url {
    let mut endpoint = product_url.clone();
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    let path = endpoint.path().trim_end_matches('/').to_owned();
    if !path.ends_with(".json") {
        endpoint.set_path(&format!("{path}.json"));
    }
    endpoint
}

/// The `?variant=<id>` query value, when present and numeric.
#[must_use]
pub fn requested_variant_id(product_url: &Url) -> Option<i64> {
    product_url
        .query_pairs()
        .find(|(key, _)| key == "variant")
        .and_then(|(_, value)| value.parse().ok())
}

/// Fetches the product JSON and returns the selected variant's price data.
///
/// # Errors
///
/// - [`ScrapeError::Status`] / [`ScrapeError::Http`] when the endpoint fails.
/// - [`ScrapeError::Deserialize`] when the body is not a product envelope.
/// - [`ScrapeError::NoPriceFound`] when the product has no variants.
pub async fn fetch(
    fetcher: &HttpFetcher,
    product_url: &Url,
) -> Result<RawExtractionPayload, ScrapeError> {
    let endpoint = product_json_url(product_url);
    let response: ShopifyProductResponse = fetcher.get_json(endpoint.as_str()).await?;

    let variant = response
        .product
        .select_variant(requested_variant_id(product_url))
        .ok_or_else(|| ScrapeError::NoPriceFound {
            url: product_url.to_string(),
        })?;

    tracing::debug!(
        url = %product_url,
        product_id = response.product.id,
        variant_id = variant.id,
        "selected product variant"
    );

    Ok(RawExtractionPayload::JsonBackdoor {
        price: variant.price.clone(),
        compare_at_price: variant.compare_at_price.clone(),
        available: variant.available,
    })
}
