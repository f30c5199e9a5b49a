//! In-process collaborators: a fixed library, log-only navigation and
//! atmosphere, and an oracle that draws from the library.

use super::{
    Atmosphere, ContentItem, ContentLibrary, Navigator, Oracle, OracleReading, OracleReply,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;

const OMENS: &[&str] = &[
    "The ink remembers what the hand forgets.",
    "A quiet page is still a page.",
    "Something you set down is waiting to be picked up.",
    "Read slowly tonight.",
];

/// A fixed list of content items.
#[derive(Debug, Clone)]
pub struct StaticLibrary {
    items: Vec<ContentItem>,
}

impl StaticLibrary {
    pub fn new(items: Vec<ContentItem>) -> Result<Self> {
        anyhow::ensure!(!items.is_empty(), "Content library is empty");
        Ok(Self { items })
    }

    /// Loads a YAML list of items.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library: {}", path.display()))?;
        let items: Vec<ContentItem> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse library: {}", path.display()))?;
        Self::new(items)
    }

    /// A small built-in library.
    pub fn sample() -> Self {
        let item = |id: &str, title: &str, excerpt: &str| ContentItem {
            id: id.to_string(),
            title: title.to_string(),
            path: format!("/writing/{}", id),
            excerpt: Some(excerpt.to_string()),
        };
        Self {
            items: vec![
                item("lantern", "The Lantern Keeper", "Every light is a promise kept."),
                item("tidewater", "Tidewater", "The sea returns what it borrows."),
                item("orchard", "Winter Orchard", "Bare branches still know the shape of fruit."),
                item("cartographer", "The Cartographer's Daughter", "She mapped the rooms her father never entered."),
            ],
        }
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    fn pick(&self) -> Option<&ContentItem> {
        self.items.choose(&mut rand::thread_rng())
    }
}

#[async_trait]
impl ContentLibrary for StaticLibrary {
    async fn random_item(&self) -> Result<ContentItem> {
        self.pick().cloned().context("Content library is empty")
    }

    async fn item_at(&self, path: &str) -> Result<Option<ContentItem>> {
        Ok(self.items.iter().find(|item| item.path == path).cloned())
    }
}

#[derive(Debug, Default)]
pub struct TracingNavigator;

#[async_trait]
impl Navigator for TracingNavigator {
    async fn navigate(&self, path: &str) -> Result<()> {
        tracing::info!(path, "Navigate");
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        tracing::info!("Navigate back");
        Ok(())
    }

    async fn scroll_by(&self, delta: f64) -> Result<()> {
        tracing::debug!(delta, "Scroll");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TracingAtmosphere;

#[async_trait]
impl Atmosphere for TracingAtmosphere {
    async fn set_dimmed(&self, dimmed: bool) -> Result<()> {
        tracing::info!(dimmed, "Atmosphere dim");
        Ok(())
    }

    async fn set_sound_level(&self, level: f64) -> Result<()> {
        tracing::info!(level, "Atmosphere sound");
        Ok(())
    }

    async fn set_parallax(&self, x: f64, y: f64) -> Result<()> {
        tracing::trace!(x, y, "Parallax");
        Ok(())
    }
}

/// Answers with a random omen and a random item from the library.
pub struct LibraryOracle {
    library: Arc<StaticLibrary>,
}

impl LibraryOracle {
    pub fn new(library: Arc<StaticLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl Oracle for LibraryOracle {
    async fn divine(&self, location: Option<&str>) -> Result<OracleReading> {
        let omen = OMENS.choose(&mut rand::thread_rng()).copied().unwrap_or_default();
        let message = match location {
            Some(place) => format!("{} ({})", omen, place),
            None => omen.to_string(),
        };
        Ok(OracleReading {
            item: self.library.pick().cloned(),
            message,
        })
    }

    async fn whisper(&self, message: &str) -> Result<OracleReply> {
        let quote = self.library.pick().and_then(|item| item.excerpt.clone());
        Ok(OracleReply {
            message: format!("The altar heard: {}", message.trim()),
            quote,
        })
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
