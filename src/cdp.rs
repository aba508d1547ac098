//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::settle::PROBE_SCRIPT;
use crate::{BrowserBackend, ClipRect, Error, PageSession, PrintSettings, RenderConfig, Result, SettleProbe, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page, DOM};
use headless_chrome::types::{Bounds, PrintToPdfOptions};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A headless Chrome process
///
/// Dropping the backend terminates the child process.
pub struct CdpBackend {
    browser: Browser,
    step_timeout: Duration,
}

impl BrowserBackend for CdpBackend {
    type Page = CdpPage;

    fn launch(config: &RenderConfig, viewport: Viewport) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(Duration::from_millis(config.idle_browser_timeout_ms))
            .path(config.chrome_path.clone())
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        Ok(Self {
            browser,
            step_timeout: Duration::from_millis(config.settle_timeout_ms),
        })
    }

    fn new_page(&self) -> Result<CdpPage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::RenderFailure(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.step_timeout);
        Ok(CdpPage { tab })
    }

    fn close(self) -> Result<()> {
        // Dropping the Browser kills the child process.
        drop(self.browser);
        Ok(())
    }
}

/// One tab of a [`CdpBackend`]
pub struct CdpPage {
    tab: Arc<Tab>,
}

impl CdpPage {
    /// Evaluate a non-awaiting expression that returns a JSON-encoded string.
    fn eval_json(&self, script: &str) -> Result<Option<String>> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::RenderFailure(format!("Evaluation failed: {}", e)))?;
        match result.value {
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(Error::RenderFailure(format!("Unexpected evaluation result: {}", other))),
        }
    }

    fn set_transparent_background(&self) -> Result<()> {
        self.tab
            .call_method(Emulation::SetDefaultBackgroundColorOverride {
                color: Some(DOM::RGBA {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: Some(0.0),
                }),
            })
            .map_err(|e| Error::RenderFailure(format!("Failed to clear page background: {}", e)))?;
        Ok(())
    }
}

impl PageSession for CdpPage {
    fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(viewport.width as f64),
                height: Some(viewport.height as f64),
            })
            .map_err(|e| Error::RenderFailure(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    fn set_content(&self, html: &str) -> Result<()> {
        // Same approach as page.setContent in browser automation libraries:
        // rewrite the blank document in place instead of navigating.
        let literal = serde_json::to_string(html).map_err(|e| Error::LoadError(e.to_string()))?;
        let script = format!(
            "(function(html) {{ document.open(); document.write(html); document.close(); return true; }})({})",
            literal
        );
        self.tab
            .evaluate(&script, false)
            .map_err(|e| Error::LoadError(format!("Failed to set document content: {}", e)))?;
        debug!("Loaded document ({} bytes)", html.len());
        Ok(())
    }

    fn probe(&self) -> Result<SettleProbe> {
        let json = self
            .eval_json(PROBE_SCRIPT)?
            .ok_or_else(|| Error::RenderFailure("Settle probe returned no value".into()))?;
        serde_json::from_str(&json).map_err(|e| Error::RenderFailure(format!("Malformed settle probe: {}", e)))
    }

    fn element_rect(&self, id: &str) -> Result<Option<ClipRect>> {
        let literal = serde_json::to_string(id).map_err(|e| Error::RenderFailure(e.to_string()))?;
        let script = format!(
            r#"(function(id) {{
                var el = document.getElementById(id);
                if (!el) return null;
                var r = el.getBoundingClientRect();
                return JSON.stringify({{ x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height }});
            }})({})"#,
            literal
        );
        match self.eval_json(&script)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::RenderFailure(format!("Malformed element box: {}", e))),
            None => Ok(None),
        }
    }

    fn screenshot(&self, clip: ClipRect, scale: f64, transparent: bool) -> Result<Vec<u8>> {
        if transparent {
            self.set_transparent_background()?;
        }
        let viewport = Page::Viewport {
            x: clip.x,
            y: clip.y,
            width: clip.width,
            height: clip.height,
            scale,
        };
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(viewport), true)
            .map_err(|e| Error::RenderFailure(format!("Screenshot failed: {}", e)))
    }

    fn print_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            landscape: Some(settings.landscape),
            display_header_footer: Some(settings.display_header_footer),
            print_background: Some(settings.print_background),
            scale: Some(settings.scale),
            paper_width: Some(settings.paper_width),
            paper_height: Some(settings.paper_height),
            margin_top: Some(settings.margin_top),
            margin_bottom: Some(settings.margin_bottom),
            margin_left: Some(settings.margin_left),
            margin_right: Some(settings.margin_right),
            page_ranges: settings.page_ranges.clone(),
            header_template: settings.header_template.clone(),
            footer_template: settings.footer_template.clone(),
            prefer_css_page_size: Some(settings.prefer_css_page_size),
            ..Default::default()
        };
        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::RenderFailure(format!("PDF generation failed: {}", e)))
    }

    fn close(&self) -> Result<()> {
        self.tab
            .close(false)
            .map_err(|e| Error::RenderFailure(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}
