use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Extraction configuration for one retailer.
///
/// Selector lists are ordered by priority: the first selector that yields
/// non-empty text wins. An empty list means "use the generic selectors" for
/// that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerConfig {
    /// Matched case-insensitively as a substring of the request hostname
    /// (after stripping a leading `www.`).
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub price_selectors: Vec<String>,
    #[serde(default)]
    pub sale_price_selectors: Vec<String>,
    #[serde(default)]
    pub availability_selectors: Vec<String>,
    #[serde(default)]
    pub requires_js_rendering: bool,
    #[serde(default)]
    pub requires_anti_bot_bypass: bool,
    /// Only for platforms exposing a product-JSON endpoint (Shopify `.json`).
    #[serde(default)]
    pub is_json_backdoor_eligible: bool,
}

impl RetailerConfig {
    /// Minimal config with generic selectors and every tier flag off.
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            price_selectors: Vec::new(),
            sale_price_selectors: Vec::new(),
            availability_selectors: Vec::new(),
            requires_js_rendering: false,
            requires_anti_bot_bypass: false,
            is_json_backdoor_eligible: false,
        }
    }

    /// Lowercased domain, the form used for matching and breaker keys.
    #[must_use]
    pub fn domain_key(&self) -> String {
        self.domain.trim().to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
pub struct RetailersFile {
    pub retailers: Vec<RetailerConfig>,
}

/// Load and validate the retailer registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_retailers(path: &Path) -> Result<RetailersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RetailersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_retailers(&content)
}

/// Parse and validate retailer configuration already held in memory
/// (e.g. fetched from a remote config source).
///
/// # Errors
///
/// Returns `ConfigError` if the YAML does not parse or fails validation.
pub fn parse_retailers(yaml: &str) -> Result<RetailersFile, ConfigError> {
    let retailers_file: RetailersFile = serde_yaml::from_str(yaml)?;
    validate_retailers(&retailers_file)?;
    Ok(retailers_file)
}

fn validate_retailers(retailers_file: &RetailersFile) -> Result<(), ConfigError> {
    let mut seen_domains = HashSet::new();

    for retailer in &retailers_file.retailers {
        if retailer.domain.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' has an empty domain",
                retailer.name
            )));
        }

        // Hosts are matched with `www.` already stripped.
        if retailer.domain_key().starts_with("www.") {
            return Err(ConfigError::Validation(format!(
                "retailer '{}' domain '{}' must not start with 'www.'",
                retailer.name, retailer.domain
            )));
        }

        if retailer.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "retailer with domain '{}' has an empty name",
                retailer.domain
            )));
        }

        if !seen_domains.insert(retailer.domain_key()) {
            return Err(ConfigError::Validation(format!(
                "duplicate retailer domain: '{}'",
                retailer.domain
            )));
        }

        let selectors = retailer
            .price_selectors
            .iter()
            .chain(&retailer.sale_price_selectors)
            .chain(&retailer.availability_selectors);
        for selector in selectors {
            if selector.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "retailer '{}' has a blank selector",
                    retailer.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "retailers_test.rs"]
mod tests;
