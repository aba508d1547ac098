//! In-process stand-in for a browser, for tests that must not need Chrome
//!
//! Each test creates a [`Scenario`] and points `RenderConfig::chrome_path` at
//! it; [`FakeBackend::launch`] looks the scenario up by that path, so the
//! engine's lifecycle can be observed without sharing state between tests.

#![allow(dead_code)]

use cardshot::{
    BrowserBackend, ClipRect, Error, Lifecycle, PageSession, PrintSettings, RenderConfig, RenderEngine, Result,
    SettleProbe, Viewport,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

static SCENARIOS: Lazy<Mutex<HashMap<PathBuf, Arc<Scenario>>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Knobs for how the fake browser misbehaves
#[derive(Debug, Default, Clone)]
pub struct Behavior {
    pub fail_launch: bool,
    /// Every probe reports a newly started resource load
    pub never_settle: bool,
    pub fail_screenshot: bool,
    pub empty_capture: bool,
    /// Time spent inside each screenshot, to make renders overlap
    pub capture_delay: Duration,
    /// Each launched browser opens this many pages, then acts as if it crashed
    pub crash_after: Option<usize>,
}

/// Everything the fake observed
#[derive(Debug, Default)]
pub struct Scenario {
    pub behavior: Behavior,
    pub launches: AtomicUsize,
    pub browsers_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    open_pages: AtomicUsize,
    pub max_open_pages: AtomicUsize,
    pub launch_viewports: Mutex<Vec<Viewport>>,
    pub page_viewports: Mutex<Vec<Viewport>>,
    pub contents: Mutex<Vec<String>>,
    pub screenshot_scales: Mutex<Vec<f64>>,
    pub screenshot_transparent: Mutex<Vec<bool>>,
    pub print_settings: Mutex<Vec<PrintSettings>>,
}

impl Scenario {
    /// Register a new scenario and return it with its lookup key.
    pub fn register(behavior: Behavior) -> (Arc<Scenario>, PathBuf) {
        let key = PathBuf::from(format!("fake-browser-{}", NEXT_ID.fetch_add(1, Ordering::SeqCst)));
        let scenario = Arc::new(Scenario {
            behavior,
            ..Default::default()
        });
        SCENARIOS.lock().unwrap().insert(key.clone(), scenario.clone());
        (scenario, key)
    }

    fn lookup(key: Option<&Path>) -> Result<Arc<Scenario>> {
        let key = key.ok_or_else(|| Error::InitializationError("no fake scenario configured".into()))?;
        SCENARIOS
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::InitializationError(format!("unknown fake scenario {}", key.display())))
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn browsers_closed(&self) -> usize {
        self.browsers_closed.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn max_open_pages(&self) -> usize {
        self.max_open_pages.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> Vec<String> {
        self.contents.lock().unwrap().clone()
    }
}

pub struct FakeBackend {
    scenario: Arc<Scenario>,
    pages: AtomicUsize,
}

impl BrowserBackend for FakeBackend {
    type Page = FakePage;

    fn launch(config: &RenderConfig, viewport: Viewport) -> Result<Self> {
        let scenario = Scenario::lookup(config.chrome_path.as_deref())?;
        if scenario.behavior.fail_launch {
            return Err(Error::InitializationError("fake browser refused to start".into()));
        }
        scenario.launches.fetch_add(1, Ordering::SeqCst);
        scenario.launch_viewports.lock().unwrap().push(viewport);
        Ok(FakeBackend {
            scenario,
            pages: AtomicUsize::new(0),
        })
    }

    fn new_page(&self) -> Result<FakePage> {
        let s = &self.scenario;
        if let Some(limit) = s.behavior.crash_after {
            if self.pages.load(Ordering::SeqCst) >= limit {
                return Err(Error::RenderFailure("fake browser connection closed".into()));
            }
        }
        self.pages.fetch_add(1, Ordering::SeqCst);
        s.pages_opened.fetch_add(1, Ordering::SeqCst);
        let open = s.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        s.max_open_pages.fetch_max(open, Ordering::SeqCst);
        Ok(FakePage {
            scenario: s.clone(),
            html: Mutex::new(String::new()),
            probes: AtomicU32::new(0),
        })
    }

    fn close(self) -> Result<()> {
        self.scenario.browsers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    scenario: Arc<Scenario>,
    html: Mutex<String>,
    probes: AtomicU32,
}

impl PageSession for FakePage {
    fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.scenario.page_viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    fn set_content(&self, html: &str) -> Result<()> {
        *self.html.lock().unwrap() = html.to_string();
        self.scenario.contents.lock().unwrap().push(html.to_string());
        Ok(())
    }

    fn probe(&self) -> Result<SettleProbe> {
        let n = self.probes.fetch_add(1, Ordering::SeqCst);
        if self.scenario.behavior.never_settle {
            Ok(SettleProbe::complete(n + 1))
        } else {
            Ok(SettleProbe::complete(0))
        }
    }

    fn element_rect(&self, id: &str) -> Result<Option<ClipRect>> {
        let html = self.html.lock().unwrap();
        if html.contains(&format!("id=\"{}\"", id)) {
            Ok(Some(ClipRect {
                x: 0.0,
                y: 0.0,
                width: 640.0,
                height: 360.0,
            }))
        } else {
            Ok(None)
        }
    }

    fn screenshot(&self, _clip: ClipRect, scale: f64, transparent: bool) -> Result<Vec<u8>> {
        let b = &self.scenario.behavior;
        if !b.capture_delay.is_zero() {
            std::thread::sleep(b.capture_delay);
        }
        if b.fail_screenshot {
            return Err(Error::RenderFailure("fake screenshot failed".into()));
        }
        self.scenario.screenshot_scales.lock().unwrap().push(scale);
        self.scenario.screenshot_transparent.lock().unwrap().push(transparent);
        if b.empty_capture {
            return Ok(Vec::new());
        }
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(self.html.lock().unwrap().as_bytes());
        Ok(bytes)
    }

    fn print_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>> {
        self.scenario.print_settings.lock().unwrap().push(settings.clone());
        Ok(b"%PDF-1.7\n% fake\n".to_vec())
    }

    fn close(&self) -> Result<()> {
        self.scenario.open_pages.fetch_sub(1, Ordering::SeqCst);
        self.scenario.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine settings that keep fake renders fast.
pub fn fast_config(key: &Path, lifecycle: Lifecycle) -> RenderConfig {
    RenderConfig {
        lifecycle,
        chrome_path: Some(key.to_path_buf()),
        settle_timeout_ms: 200,
        network_idle_ms: 10,
        poll_interval_ms: 5,
        ..Default::default()
    }
}

/// A fresh scenario and an engine wired to it
pub fn fake_engine(behavior: Behavior, lifecycle: Lifecycle) -> (Arc<Scenario>, RenderEngine<FakeBackend>) {
    let (scenario, key) = Scenario::register(behavior);
    let engine = RenderEngine::new(fast_config(&key, lifecycle)).expect("valid config");
    (scenario, engine)
}

/// Write a template root (`manifest.json` + `templates/`) into `dir`.
pub fn write_template_root(dir: &Path, templates: &[(&str, &str)]) {
    let tpl_dir = dir.join("templates");
    std::fs::create_dir_all(&tpl_dir).unwrap();
    let mut manifest = serde_json::Map::new();
    for (name, body) in templates {
        let file = format!("{}.html", name);
        std::fs::write(tpl_dir.join(&file), body).unwrap();
        manifest.insert(name.to_string(), serde_json::json!({ "file": file }));
    }
    let manifest = serde_json::json!({ "templates": manifest });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}
