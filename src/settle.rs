//! Content-settle detection
//!
//! A page counts as settled when the document has finished loading, no
//! `<img>` is still pending, web fonts are loaded, no `fetch`/XHR request is
//! in flight, and no new resource load has finished for a full network-idle
//! window. [`SettleTracker`] holds that state machine so it can be driven by
//! any page backend.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Expression evaluated in the page to produce a [`SettleProbe`] as JSON
///
/// The first evaluation wraps `fetch` and `XMLHttpRequest.prototype.send` so
/// later probes can report requests still in flight. Requests issued before
/// that first probe are only visible once they finish.
pub const PROBE_SCRIPT: &str = r#"(function() {
    if (!window.__cardshotInflight) {
        var inflight = window.__cardshotInflight = { count: 0 };
        var done = function() { inflight.count = Math.max(0, inflight.count - 1); };
        if (window.fetch) {
            var origFetch = window.fetch;
            window.fetch = function() {
                inflight.count++;
                var p = origFetch.apply(this, arguments);
                p.then(done, done);
                return p;
            };
        }
        if (window.XMLHttpRequest) {
            var origSend = XMLHttpRequest.prototype.send;
            XMLHttpRequest.prototype.send = function() {
                inflight.count++;
                this.addEventListener('loadend', done);
                return origSend.apply(this, arguments);
            };
        }
    }
    var images = Array.prototype.slice.call(document.images || []);
    var pending = images.filter(function(img) { return !img.complete; }).length;
    var resources = (window.performance && performance.getEntriesByType)
        ? performance.getEntriesByType('resource').length : 0;
    var fonts = document.fonts ? document.fonts.status : 'loaded';
    return JSON.stringify({
        ready_state: document.readyState,
        pending_images: pending,
        resource_count: resources,
        fonts_loaded: fonts === 'loaded',
        pending_requests: window.__cardshotInflight.count
    });
})()"#;

/// One sample of a page's loading state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettleProbe {
    pub ready_state: String,
    pub pending_images: u32,
    pub resource_count: u32,
    pub fonts_loaded: bool,
    /// `fetch`/XHR requests started but not yet finished
    #[serde(default)]
    pub pending_requests: u32,
}

impl SettleProbe {
    /// A probe describing a fully loaded page with `resources` fetched
    pub fn complete(resources: u32) -> Self {
        Self {
            ready_state: "complete".into(),
            pending_images: 0,
            resource_count: resources,
            fonts_loaded: true,
            pending_requests: 0,
        }
    }

    /// Loading has finished apart from the network-idle requirement.
    pub fn is_loaded(&self) -> bool {
        self.ready_state == "complete" && self.pending_images == 0 && self.fonts_loaded && self.pending_requests == 0
    }
}

/// Tracks probes over time and decides when the network has gone idle
///
/// Idleness is judged from two signals: the count of finished resource
/// entries must stay flat for the idle window, and the in-flight request
/// count must be zero. Resource entries only appear once a load finishes, so
/// the in-flight count is what keeps a long-running `fetch` from looking idle.
#[derive(Debug)]
pub struct SettleTracker {
    idle: Duration,
    last_count: Option<u32>,
    quiet_since: Option<Instant>,
}

impl SettleTracker {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            last_count: None,
            quiet_since: None,
        }
    }

    /// Feed a probe taken at `now`; returns true once the page has settled.
    pub fn observe(&mut self, now: Instant, probe: &SettleProbe) -> bool {
        if self.last_count != Some(probe.resource_count) {
            self.last_count = Some(probe.resource_count);
            self.quiet_since = Some(now);
        }
        if !probe.is_loaded() {
            return false;
        }
        match self.quiet_since {
            Some(since) => now.duration_since(since) >= self.idle,
            None => false,
        }
    }
}
