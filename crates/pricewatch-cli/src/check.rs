//! `check` and `batch` command handlers.
//!
//! Extraction never returns an error; a failed result is printed like any
//! other. Only I/O around the run (reading the URL file, printing JSON) can
//! fail the command.

use std::path::Path;

use futures::stream::{self, StreamExt};
use pricewatch_core::PriceExtractionResult;
use pricewatch_scraper::{CircuitState, ExtractOptions, PriceEngine};
use tokio_util::sync::CancellationToken;

pub(crate) async fn run_check(
    engine: &PriceEngine,
    url: &str,
    retail_price: Option<f64>,
    json: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let options = ExtractOptions {
        retail_price_hint: retail_price,
        cancel: Some(cancel),
    };
    let result = engine.extract_price_with(url, options).await;
    print_result(&result, json)?;

    if !result.success {
        anyhow::bail!("no price extracted for {url}");
    }
    Ok(())
}

/// Runs up to `concurrency` extractions at once. Fails only when every URL
/// failed.
pub(crate) async fn run_batch(
    engine: &PriceEngine,
    file: &Path,
    concurrency: usize,
    json: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
    let urls = parse_url_list(&contents);
    if urls.is_empty() {
        println!("no URLs found in {}", file.display());
        return Ok(());
    }

    let options = ExtractOptions {
        retail_price_hint: None,
        cancel: Some(cancel),
    };
    let mut results = stream::iter(urls.iter().copied())
        .map(|url| engine.extract_price_with(url, options.clone()))
        .buffer_unordered(concurrency.max(1));

    let mut failed: usize = 0;
    while let Some(result) = results.next().await {
        if !result.success {
            failed += 1;
        }
        print_result(&result, json)?;
    }

    for breaker in engine.breakers().snapshot() {
        if breaker.state != CircuitState::Closed {
            tracing::warn!(
                breaker = %breaker.name,
                state = %breaker.state,
                consecutive_failures = breaker.consecutive_failures,
                "circuit not closed after batch"
            );
        }
    }

    let total = urls.len();
    if failed > 0 {
        tracing::warn!(failed, total, "some URLs failed price extraction");
    }
    if failed == total {
        anyhow::bail!("all {total} URLs failed price extraction");
    }
    Ok(())
}

/// Non-empty lines that are not `#` comments, trimmed.
pub(crate) fn parse_url_list(contents: &str) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

fn print_result(result: &PriceExtractionResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!("{}", format_result(result));
    }
    Ok(())
}

pub(crate) fn format_result(result: &PriceExtractionResult) -> String {
    let store = result.store_name.as_deref().unwrap_or("unknown retailer");
    match (result.price, result.source_tier) {
        (Some(price), Some(tier)) => {
            let was = result
                .original_price
                .map(|o| format!(" (was {o:.2})"))
                .unwrap_or_default();
            let stock = if result.in_stock { "in stock" } else { "out of stock" };
            format!("ok    {price:.2}{was} {stock} via {tier} [{store}] {}", result.url)
        }
        _ => {
            let category = result
                .error_category
                .map_or_else(|| "breaker_open".to_owned(), |c| c.to_string());
            let error = result.error.as_deref().unwrap_or("unknown error");
            format!("fail  {category}: {error} [{store}] {}", result.url)
        }
    }
}
