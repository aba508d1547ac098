//! Render engine: browser lifecycle, per-render page steps, output writing

use crate::document::{self, SizeSpec};
use crate::pdf::PdfOptions;
use crate::settle::SettleTracker;
use crate::{BrowserBackend, Error, Lifecycle, PageSession, RenderConfig, Result, Viewport};
use log::{debug, error, info, warn};
use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Where render output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to a file (atomically, after a successful capture)
    File(PathBuf),
    /// Return the bytes only
    Memory,
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::File(p) => write!(f, "{}", p.display()),
            OutputTarget::Memory => f.write_str("<memory>"),
        }
    }
}

/// Bytes produced by a render
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    /// Path written, for file targets
    pub path: Option<PathBuf>,
    /// `image/png` or `application/pdf`
    pub mime: &'static str,
}

/// Counting gate on concurrently open pages
struct PagePool {
    max: usize,
    in_use: Mutex<usize>,
    available: Condvar,
}

struct PagePermit<'a> {
    pool: &'a PagePool,
}

impl PagePool {
    fn new(max: usize) -> Self {
        Self {
            max,
            in_use: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    fn acquire(&self) -> PagePermit<'_> {
        let mut in_use = lock(&self.in_use);
        while *in_use >= self.max {
            in_use = self.available.wait(in_use).unwrap_or_else(|e| e.into_inner());
        }
        *in_use += 1;
        PagePermit { pool: self }
    }
}

impl Drop for PagePermit<'_> {
    fn drop(&mut self) {
        let mut in_use = lock(&self.pool.in_use);
        *in_use -= 1;
        self.pool.available.notify_one();
    }
}

/// Closes its page when dropped, whether the render succeeded or not
struct PageGuard<P: PageSession> {
    page: P,
}

impl<P: PageSession> Deref for PageGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.page
    }
}

impl<P: PageSession> Drop for PageGuard<P> {
    fn drop(&mut self) {
        if let Err(e) = self.page.close() {
            warn!("Failed to close page: {}", e);
        }
    }
}

/// Drives a browser backend to turn HTML into PNG or PDF bytes
///
/// With [`Lifecycle::Shared`] the engine owns one lazily launched browser;
/// [`init`](Self::init) launches it eagerly, [`relaunch`](Self::relaunch)
/// replaces it after a crash, and [`shutdown`](Self::shutdown) closes it.
/// A shared browser that fails to open a page is marked unhealthy but kept:
/// renders keep failing until it is relaunched.
/// Renders against the shared browser may run concurrently from several
/// threads, each on its own page, up to `max_pages` at a time.
pub struct RenderEngine<B: BrowserBackend> {
    config: RenderConfig,
    shared: Mutex<Option<Arc<B>>>,
    shared_failed: AtomicBool,
    pool: PagePool,
}

impl<B: BrowserBackend> RenderEngine<B> {
    /// Create an engine. No browser is launched until first use.
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let pool = PagePool::new(config.max_pages);
        Ok(Self {
            config,
            shared: Mutex::new(None),
            shared_failed: AtomicBool::new(false),
            pool,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Launch the shared browser now rather than on the first render.
    pub fn init(&self) -> Result<()> {
        match self.config.lifecycle {
            Lifecycle::Shared => self.shared_browser().map(|_| ()),
            Lifecycle::PerCall => Ok(()),
        }
    }

    /// Whether a shared browser is held and has not failed since its launch
    pub fn is_running(&self) -> bool {
        lock(&self.shared).is_some() && !self.shared_failed.load(Ordering::SeqCst)
    }

    /// Drop the current shared browser (if any) and launch a new one.
    pub fn relaunch(&self) -> Result<()> {
        if self.config.lifecycle == Lifecycle::PerCall {
            return Ok(());
        }
        let old = lock(&self.shared).take();
        if let Some(old) = old {
            info!("Relaunching shared browser");
            if let Err(e) = Self::close_browser(old) {
                warn!("Failed to close previous browser: {}", e);
            }
        }
        self.shared_browser().map(|_| ())
    }

    /// Close the shared browser. Later renders launch a new one.
    pub fn shutdown(&self) -> Result<()> {
        let old = lock(&self.shared).take();
        match old {
            Some(browser) => {
                info!("Shutting down shared browser");
                Self::close_browser(browser)
            }
            None => Ok(()),
        }
    }

    fn close_browser(browser: Arc<B>) -> Result<()> {
        match Arc::try_unwrap(browser) {
            Ok(browser) => browser.close(),
            Err(_) => {
                // In-flight renders still hold it; the process goes away with the last handle.
                warn!("Shared browser still in use; it will close when pending renders finish");
                Ok(())
            }
        }
    }

    fn shared_browser(&self) -> Result<Arc<B>> {
        let mut slot = lock(&self.shared);
        if let Some(browser) = slot.as_ref() {
            return Ok(browser.clone());
        }
        let viewport = self.config.viewport;
        info!("Launching shared browser ({}x{})", viewport.width, viewport.height);
        let browser = Arc::new(B::launch(&self.config, viewport)?);
        *slot = Some(browser.clone());
        self.shared_failed.store(false, Ordering::SeqCst);
        Ok(browser)
    }

    fn with_page<T, F>(&self, viewport: Viewport, f: F) -> Result<T>
    where
        F: FnOnce(&B::Page) -> Result<T>,
    {
        match self.config.lifecycle {
            Lifecycle::PerCall => {
                debug!("Launching per-call browser ({}x{})", viewport.width, viewport.height);
                let browser = B::launch(&self.config, viewport)?;
                let result = Self::on_new_page(&browser, f);
                if let Err(e) = browser.close() {
                    warn!("Failed to close browser: {}", e);
                }
                result
            }
            Lifecycle::Shared => {
                let _permit = self.pool.acquire();
                let browser = self.shared_browser()?;
                let page = match browser.new_page() {
                    Ok(page) => PageGuard { page },
                    Err(e) => {
                        if !self.shared_failed.swap(true, Ordering::SeqCst) {
                            error!("Shared browser failed to open a page; relaunch required: {}", e);
                        }
                        return Err(e);
                    }
                };
                f(&*page)
            }
        }
    }

    fn on_new_page<T, F>(browser: &B, f: F) -> Result<T>
    where
        F: FnOnce(&B::Page) -> Result<T>,
    {
        let page = PageGuard {
            page: browser.new_page()?,
        };
        f(&*page)
    }

    /// Poll the page until it settles or `settle_timeout_ms` elapses.
    fn wait_for_settle<P: PageSession>(&self, page: &P) -> Result<()> {
        let timeout = Duration::from_millis(self.config.settle_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut tracker = SettleTracker::new(Duration::from_millis(self.config.network_idle_ms));
        let start = Instant::now();
        loop {
            let probe = page.probe()?;
            let now = Instant::now();
            if tracker.observe(now, &probe) {
                debug!("Content settled after {}ms", now.duration_since(start).as_millis());
                return Ok(());
            }
            if now.duration_since(start) >= timeout {
                warn!(
                    "Content did not settle within {}ms (last probe: {:?})",
                    self.config.settle_timeout_ms, probe
                );
                return Err(Error::Timeout(self.config.settle_timeout_ms));
            }
            std::thread::sleep(poll);
        }
    }

    /// Render a fragment to PNG.
    ///
    /// The fragment is wrapped in `size.shell`, laid out at `size.width` by
    /// `size.height`, and the shell's root element is captured. If the root
    /// element is missing after the content settles the render fails with
    /// [`Error::TargetElementMissing`] and nothing is written.
    pub fn render(&self, fragment: &str, target: &OutputTarget, size: &SizeSpec) -> Result<RenderOutput> {
        size.validate()?;
        let html = document::wrap(fragment, size);
        let root_id = size.shell.root_id();
        let viewport = size.viewport();
        let transparent = self.config.transparent_background;

        let result = self.with_page(viewport, |page| {
            page.set_viewport(viewport)?;
            page.set_content(&html)?;
            self.wait_for_settle(page)?;
            let rect = page
                .element_rect(root_id)?
                .filter(|r| !r.is_empty())
                .ok_or_else(|| Error::TargetElementMissing(root_id.to_string()))?;
            page.screenshot(rect, size.device_scale_factor, transparent)
        });

        match result {
            Ok(bytes) => self.finish(bytes, target, "image/png"),
            Err(e) => {
                error!("Image render to {} failed: {}", target, e);
                Err(e)
            }
        }
    }

    /// Paginate a complete HTML document to PDF.
    pub fn render_document(&self, html: &str, target: &OutputTarget, options: &PdfOptions) -> Result<RenderOutput> {
        let settings = options.resolve()?;

        let result = self.with_page(self.config.viewport, |page| {
            page.set_content(html)?;
            self.wait_for_settle(page)?;
            page.print_pdf(&settings)
        });

        match result {
            Ok(bytes) => self.finish(bytes, target, "application/pdf"),
            Err(e) => {
                error!("PDF render to {} failed: {}", target, e);
                Err(e)
            }
        }
    }

    fn finish(&self, bytes: Vec<u8>, target: &OutputTarget, mime: &'static str) -> Result<RenderOutput> {
        if bytes.is_empty() {
            return Err(Error::RenderFailure("browser returned an empty capture".into()));
        }
        let path = match target {
            OutputTarget::File(path) => {
                write_atomic(path, &bytes)?;
                info!("Wrote {} ({} bytes)", path.display(), bytes.len());
                Some(path.clone())
            }
            OutputTarget::Memory => None,
        };
        Ok(RenderOutput { bytes, path, mime })
    }
}

/// Write via a temporary file in the same directory, so readers never see a
/// partially written artifact.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
