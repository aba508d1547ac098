//! cardshot
//!
//! Renders HTML/CSS "card" and "slide" templates into PNG images and PDFs
//! using headless Chrome as the layout engine.
//!
//! The pipeline has two stages:
//!
//! - **Template resolution** ([`template`]): a named template (looked up in a
//!   manifest and cached per file) or literal HTML has its `{{ KEY }}`
//!   placeholders filled from a data record.
//! - **Rendering** ([`engine`]): the fragment is wrapped in a document shell
//!   whose CSS is scaled by a [`ResolutionPreset`], loaded into a browser page,
//!   allowed to settle, and the root element is captured as a PNG (or the whole
//!   document is printed to PDF).
//!
//! # Example
//!
//! ```no_run
//! use cardshot::{OutputTarget, RenderConfig, ResolutionPreset, SizeSpec};
//! use cardshot::template::{DataRecord, TemplateResolver, TemplateSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TemplateResolver::open("./ppt-templates")?;
//! let mut data = DataRecord::new();
//! data.insert("TITLE".into(), "Architecture".into());
//! let fragment = resolver.resolve(&TemplateSource::Named("title".into()), &data)?;
//!
//! let engine = cardshot::new_engine(RenderConfig::default())?;
//! let size = SizeSpec::from_preset(ResolutionPreset::High);
//! engine.render(&fragment, &OutputTarget::File("slide.png".into()), &size)?;
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! Substituted values are inserted without HTML escaping. Template data is
//! expected to come from the caller, not from untrusted end users.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod assets;
pub mod batch;
pub mod document;
pub mod engine;
pub mod pdf;
pub mod settle;
pub mod template;

// Async facade (worker thread owning an engine)
pub mod async_api;

// Chrome DevTools Protocol backend
#[cfg(feature = "cdp")]
pub mod cdp;

// HTTP service wrapper
#[cfg(feature = "server")]
pub mod server;

pub use async_api::AsyncRenderer;
pub use document::{ResolutionPreset, Shell, SizeSpec};
pub use engine::{OutputTarget, RenderEngine, RenderOutput};
pub use pdf::{PaperFormat, PdfOptions, PrintSettings};
pub use settle::SettleProbe;

/// How long a browser process lives relative to renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    /// Launch a fresh browser for every render and close it afterwards
    PerCall,
    /// Launch one browser lazily and keep it until `shutdown`; each render
    /// only opens and closes a page
    Shared,
}

/// Configuration for the render engine
///
/// The defaults follow what the pipeline needs for one-off asset generation:
/// a shared browser, a 30 second bound on the settle wait, and a 500 ms
/// network-idle window.
///
/// # Examples
///
/// ```
/// let cfg = cardshot::RenderConfig::default();
/// assert_eq!(cfg.settle_timeout_ms, 30000);
/// assert!(cfg.transparent_background);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Browser process lifecycle
    pub lifecycle: Lifecycle,
    /// Explicit Chrome/Chromium executable; autodetected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep Chrome's sandbox enabled
    pub sandbox: bool,
    /// Window size used when launching a shared browser
    pub viewport: Viewport,
    /// Maximum time to wait for content to settle, in milliseconds
    pub settle_timeout_ms: u64,
    /// Quiet period without new resource loads before content counts as settled
    pub network_idle_ms: u64,
    /// Interval between settle probes
    pub poll_interval_ms: u64,
    /// Maximum number of pages open at once against a shared browser
    pub max_pages: usize,
    /// How long the CDP connection may stay silent before the browser is dropped
    pub idle_browser_timeout_ms: u64,
    /// Capture screenshots with a transparent page background
    pub transparent_background: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Shared,
            chrome_path: None,
            sandbox: true,
            viewport: Viewport::default(),
            settle_timeout_ms: 30000,
            network_idle_ms: 500,
            poll_interval_ms: 50,
            max_pages: 8,
            idle_browser_timeout_ms: 24 * 60 * 60 * 1000,
            transparent_background: true,
        }
    }
}

impl RenderConfig {
    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RenderConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every render fail or hang.
    pub fn validate(&self) -> Result<()> {
        if self.settle_timeout_ms == 0 {
            return Err(Error::ConfigError("settle_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::ConfigError("poll_interval_ms must be positive".into()));
        }
        if self.max_pages == 0 {
            return Err(Error::ConfigError("max_pages must be at least 1".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport dimensions must be positive".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Bounding box of an element in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    /// A box with no area cannot be captured.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A browser process the engine can open pages against
///
/// The CDP implementation lives in [`cdp::CdpBackend`]; the trait exists so
/// the engine's lifecycle and cleanup rules do not depend on a particular
/// browser driver.
pub trait BrowserBackend: Send + Sync {
    /// Page handle type produced by this backend
    type Page: PageSession;

    /// Launch a browser process with the given window size
    fn launch(config: &RenderConfig, viewport: Viewport) -> Result<Self>
    where
        Self: Sized;

    /// Open a new page scoped to a single render
    fn new_page(&self) -> Result<Self::Page>;

    /// Terminate the browser process
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A single page/tab, exclusively owned by one render
pub trait PageSession {
    /// Size the layout viewport
    fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    /// Replace the page's document with `html`
    fn set_content(&self, html: &str) -> Result<()>;

    /// Sample the page's loading state
    fn probe(&self) -> Result<SettleProbe>;

    /// Bounding box of the element with the given id, if it exists
    fn element_rect(&self, id: &str) -> Result<Option<ClipRect>>;

    /// Capture the clipped region as PNG bytes
    fn screenshot(&self, clip: ClipRect, scale: f64, transparent: bool) -> Result<Vec<u8>>;

    /// Paginate the whole document to PDF bytes
    fn print_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>>;

    /// Close the page
    fn close(&self) -> Result<()>;
}

/// Create a render engine backed by headless Chrome
#[cfg(feature = "cdp")]
pub fn new_engine(config: RenderConfig) -> Result<RenderEngine<cdp::CdpBackend>> {
    RenderEngine::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.lifecycle, Lifecycle::Shared);
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.network_idle_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"lifecycle": "per-call", "settle_timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.lifecycle, Lifecycle::PerCall);
        assert_eq!(config.settle_timeout_ms, 5000);
        assert_eq!(config.max_pages, 8);
        assert!(config.sandbox);
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = RenderConfig {
            settle_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let config = RenderConfig {
            max_pages: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardshot.json");
        std::fs::write(&path, r#"{"sandbox": false, "viewport": {"width": 800, "height": 600}}"#).unwrap();
        let config = RenderConfig::from_json_file(&path).unwrap();
        assert!(!config.sandbox);
        assert_eq!(config.viewport, Viewport { width: 800, height: 600 });
    }

    #[test]
    fn empty_clip_rect() {
        let r = ClipRect { x: 0.0, y: 0.0, width: 0.0, height: 10.0 };
        assert!(r.is_empty());
        let r = ClipRect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        assert!(!r.is_empty());
    }
}
