//! Narrow interfaces to the systems the altar drives but does not own.
//!
//! Content storage, page navigation, the oracle and the atmosphere (dimming,
//! sound, parallax) live outside this crate. Handlers reach them only through
//! these traits; [`local`] has in-process implementations for the CLI and
//! tests.

pub mod local;

pub use local::{LibraryOracle, StaticLibrary, TracingAtmosphere, TracingNavigator};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A piece of writing the altar can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleReading {
    pub item: Option<ContentItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply {
    pub message: String,
    pub quote: Option<String>,
}

#[async_trait]
pub trait ContentLibrary: Send + Sync {
    async fn random_item(&self) -> Result<ContentItem>;

    async fn item_at(&self, path: &str) -> Result<Option<ContentItem>>;
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, path: &str) -> Result<()>;

    async fn back(&self) -> Result<()>;

    /// Scrolls the page by `delta` percent of its length.
    async fn scroll_by(&self, delta: f64) -> Result<()>;
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn divine(&self, location: Option<&str>) -> Result<OracleReading>;

    async fn whisper(&self, message: &str) -> Result<OracleReply>;
}

#[async_trait]
pub trait Atmosphere: Send + Sync {
    async fn set_dimmed(&self, dimmed: bool) -> Result<()>;

    /// `level` is already clamped to 0..=1.
    async fn set_sound_level(&self, level: f64) -> Result<()>;

    async fn set_parallax(&self, x: f64, y: f64) -> Result<()>;
}

/// Everything a handler may call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub library: Arc<dyn ContentLibrary>,
    pub navigator: Arc<dyn Navigator>,
    pub oracle: Arc<dyn Oracle>,
    pub atmosphere: Arc<dyn Atmosphere>,
}

impl Collaborators {
    /// In-process collaborators around a fixed library.
    pub fn local(library: StaticLibrary) -> Self {
        let library = Arc::new(library);
        Self {
            oracle: Arc::new(LibraryOracle::new(library.clone())),
            library,
            navigator: Arc::new(TracingNavigator),
            atmosphere: Arc::new(TracingAtmosphere),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
