//! Retailer lookup by product URL, with wholesale hot reload.

use std::path::Path;
use std::sync::{Arc, RwLock};

use pricewatch_core::{load_retailers, ConfigError, RetailerConfig};

/// Ordered set of known retailers.
///
/// Lookup is a substring match of each configured domain against the URL's
/// host, in registration order, so more specific domains must be listed
/// before broader ones.
#[derive(Debug, Clone, Default)]
pub struct RetailerRegistry {
    retailers: Vec<RetailerConfig>,
}

impl RetailerRegistry {
    #[must_use]
    pub fn new(retailers: Vec<RetailerConfig>) -> Self {
        Self { retailers }
    }

    /// Loads and validates a retailers YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = load_retailers(path)?;
        tracing::debug!(
            path = %path.display(),
            retailers = file.retailers.len(),
            "loaded retailer registry"
        );
        Ok(Self::new(file.retailers))
    }

    /// Returns the first retailer whose domain is contained in the URL host.
    ///
    /// The host is lowercased and a leading `www.` is removed before
    /// matching. Unparseable URLs and URLs without a host match nothing.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&RetailerConfig> {
        let host = normalized_host(url)?;
        self.retailers
            .iter()
            .find(|r| host.contains(&r.domain_key()))
    }

    #[must_use]
    pub fn retailers(&self) -> &[RetailerConfig] {
        &self.retailers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.retailers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retailers.is_empty()
    }
}

/// Lowercased host of `url` without a leading `www.`.
#[must_use]
pub fn normalized_host(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map_or_else(|| host.clone(), str::to_owned))
}

/// A registry that can be swapped at runtime.
///
/// Readers take an `Arc` snapshot once per extraction, so a reload never
/// changes the configuration seen by an in-flight scrape.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    inner: RwLock<Arc<RetailerRegistry>>,
}

impl SharedRegistry {
    #[must_use]
    pub fn new(registry: RetailerRegistry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<RetailerRegistry> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the whole registry.
    pub fn replace(&self, registry: RetailerRegistry) {
        let next = Arc::new(registry);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Reloads from `path`. On failure the current registry stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the new file is unreadable or invalid.
    pub fn reload_from(&self, path: &Path) -> Result<usize, ConfigError> {
        let registry = RetailerRegistry::from_file(path)?;
        let count = registry.len();
        self.replace(registry);
        tracing::info!(path = %path.display(), retailers = count, "retailer registry reloaded");
        Ok(count)
    }
}

impl From<RetailerRegistry> for SharedRegistry {
    fn from(registry: RetailerRegistry) -> Self {
        Self::new(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RetailerRegistry {
        RetailerRegistry::new(vec![
            RetailerConfig::new("shop.lululemon.com", "lululemon"),
            RetailerConfig::new("lululemon.com", "lululemon (fallback)"),
            RetailerConfig::new("Zara.com", "Zara"),
        ])
    }

    #[test]
    fn lookup_strips_www_and_is_case_insensitive() {
        let reg = registry();
        let found = reg.lookup("https://WWW.zara.com/us/en/shirt-p123.html").unwrap();
        assert_eq!(found.name, "Zara");
    }

    #[test]
    fn lookup_uses_registration_order() {
        let reg = registry();
        let found = reg
            .lookup("https://shop.lululemon.com/p/womens-leggings/Align/_/prod2020012")
            .unwrap();
        assert_eq!(found.name, "lululemon");
    }

    #[test]
    fn lookup_matches_substring_of_host() {
        let reg = registry();
        let found = reg.lookup("https://eu.lululemon.com/en-gb/p/x").unwrap();
        assert_eq!(found.name, "lululemon (fallback)");
    }

    #[test]
    fn lookup_unknown_host_is_none() {
        assert!(registry().lookup("https://example.org/p/1").is_none());
    }

    #[test]
    fn lookup_unparseable_url_is_none() {
        assert!(registry().lookup("not a url").is_none());
        assert!(registry().lookup("/relative/path").is_none());
    }

    #[test]
    fn lookup_does_not_match_path() {
        assert!(registry().lookup("https://example.org/zara.com").is_none());
    }

    #[test]
    fn shared_registry_replace_keeps_old_snapshots() {
        let shared = SharedRegistry::new(registry());
        let before = shared.current();
        shared.replace(RetailerRegistry::default());

        assert_eq!(before.len(), 3);
        assert!(shared.current().is_empty());
    }

    #[test]
    fn reload_from_missing_file_keeps_current() {
        let shared = SharedRegistry::new(registry());
        let result = shared.reload_from(Path::new("/nonexistent/retailers.yaml"));
        assert!(result.is_err());
        assert_eq!(shared.current().len(), 3);
    }

    #[test]
    fn reload_from_bundled_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/retailers.yaml");
        let shared = SharedRegistry::default();
        let count = shared.reload_from(&path).unwrap();
        assert!(count > 0);
        assert!(shared
            .current()
            .lookup("https://www.everlane.com/products/mens-tee")
            .is_some());
    }
}
