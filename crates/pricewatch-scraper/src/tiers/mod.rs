//! Extraction strategies, one module per source of price data.

pub mod ai;
pub mod html;
pub mod json_backdoor;
pub mod render;

use std::sync::Mutex;

pub use ai::AiService;
pub use render::RenderService;

/// Holds the most recent page that was fetched but yielded no price, for the
/// language-model tier. Lives for one extraction call.
#[derive(Debug, Default)]
pub struct FetchedHtml {
    slot: Mutex<Option<String>>,
}

impl FetchedHtml {
    pub fn store(&self, html: String) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(html);
    }

    #[must_use]
    pub fn has_page(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Clone of the stored page, leaving it in place for retries.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }
}
