//! HTTP service exposing the render engine
//!
//! Routes:
//!
//! - `POST /generate/image` with `{"contentHtml", "width", "height", "preset"?,
//!   "deviceScaleFactor"?}` answers with `image/png` bytes
//! - `POST /generate/pdf` with `{"contentHtml", "pdfOptions"?}` answers with
//!   `application/pdf` bytes
//! - `GET /health` reports whether the shared browser is up
//!
//! Client errors are `400` with a JSON `{"error": …}` body. Render failures
//! are logged here and reported to the client as a generic `500`.

use crate::document::{ResolutionPreset, Shell, SizeSpec};
use crate::engine::{OutputTarget, RenderEngine};
use crate::pdf::PdfOptions;
use crate::{BrowserBackend, Error, Result};
use log::{error, info, warn};
use serde::Deserialize;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Response, Server};

/// Largest accepted request body
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Device scale factor applied to service image renders unless overridden
const SERVICE_DEVICE_SCALE: f64 = 2.0;

/// Listener settings for the service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Number of threads accepting requests
    pub workers: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            workers: num_cpus::get().max(1),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// A response ready to be sent, independent of the HTTP library
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ServiceResponse {
    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn bytes(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    fn into_response(self) -> Response<std::io::Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(self.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], self.content_type.as_bytes()) {
            response = response.with_header(header);
        }
        response
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    content_html: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    preset: Option<ResolutionPreset>,
    device_scale_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PdfRequest {
    content_html: Option<String>,
    #[serde(default)]
    pdf_options: PdfOptions,
}

/// Route one request. Never panics on client input.
pub fn handle<B: BrowserBackend>(engine: &RenderEngine<B>, method: &str, url: &str, body: &[u8]) -> ServiceResponse {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        ("POST", "/generate/image") => generate_image(engine, body),
        ("POST", "/generate/pdf") => generate_pdf(engine, body),
        ("GET", "/health") => {
            let status = serde_json::json!({ "status": "ok", "browser": engine.is_running() });
            ServiceResponse::bytes("application/json", status.to_string().into_bytes())
        }
        _ => ServiceResponse::error(404, "Not found"),
    }
}

fn generate_image<B: BrowserBackend>(engine: &RenderEngine<B>, body: &[u8]) -> ServiceResponse {
    let req: ImageRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(_) => return ServiceResponse::error(400, "Invalid request body"),
    };
    let (content, width, height) = match (req.content_html, req.width, req.height) {
        (Some(c), Some(w), Some(h)) if !c.is_empty() && w > 0 && h > 0 => (c, w, h),
        _ => return ServiceResponse::error(400, "Missing required fields: contentHtml, width, height"),
    };

    let size = SizeSpec::new(width, height, req.preset.unwrap_or(ResolutionPreset::Low))
        .with_shell(Shell::Slide)
        .with_device_scale_factor(req.device_scale_factor.unwrap_or(SERVICE_DEVICE_SCALE));
    if let Err(e) = size.validate() {
        return ServiceResponse::error(400, &e.to_string());
    }

    match engine.render(&content, &OutputTarget::Memory, &size) {
        Ok(out) => ServiceResponse::bytes("image/png", out.bytes),
        Err(e) => {
            error!("Image generation failed: {}", e);
            ServiceResponse::error(500, "Failed to generate image.")
        }
    }
}

fn generate_pdf<B: BrowserBackend>(engine: &RenderEngine<B>, body: &[u8]) -> ServiceResponse {
    let req: PdfRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(_) => return ServiceResponse::error(400, "Invalid request body"),
    };
    let content = match req.content_html {
        Some(c) if !c.is_empty() => c,
        _ => return ServiceResponse::error(400, "Missing required field: contentHtml"),
    };
    if let Err(e) = req.pdf_options.resolve() {
        return ServiceResponse::error(400, &e.to_string());
    }

    match engine.render_document(&content, &OutputTarget::Memory, &req.pdf_options) {
        Ok(out) => ServiceResponse::bytes("application/pdf", out.bytes),
        Err(e) => {
            error!("PDF generation failed: {}", e);
            ServiceResponse::error(500, "Failed to generate PDF.")
        }
    }
}

/// A bound listener sharing one engine across worker threads
pub struct Service<B: BrowserBackend> {
    engine: Arc<RenderEngine<B>>,
    server: Arc<Server>,
    config: ServerConfig,
}

impl<B: BrowserBackend + 'static> Service<B> {
    /// Launch the shared browser, then bind the listener.
    pub fn bind(engine: Arc<RenderEngine<B>>, config: ServerConfig) -> Result<Self> {
        engine.init()?;
        let server = Server::http(config.addr.as_str())
            .map_err(|e| Error::InitializationError(format!("Failed to bind {}: {}", config.addr, e)))?;
        Ok(Self {
            engine,
            server: Arc::new(server),
            config,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> String {
        self.server.server_addr().to_string()
    }

    /// Serve requests until the process exits.
    pub fn run(self) -> Result<()> {
        info!(
            "Render service listening on http://{} ({} workers)",
            self.local_addr(),
            self.config.workers
        );
        let mut handles = Vec::new();
        for _ in 0..self.config.workers.max(1) {
            let server = self.server.clone();
            let engine = self.engine.clone();
            let max_body = self.config.max_body_bytes;
            handles.push(thread::spawn(move || serve_requests(&server, &engine, max_body)));
        }
        for h in handles {
            if h.join().is_err() {
                warn!("Service worker thread panicked");
            }
        }
        self.engine.shutdown()
    }
}

fn serve_requests<B: BrowserBackend>(server: &Server, engine: &RenderEngine<B>, max_body: usize) {
    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();

        let mut body = Vec::new();
        let read = request
            .as_reader()
            .take(max_body as u64 + 1)
            .read_to_end(&mut body);
        let response = match read {
            Err(e) => {
                warn!("Failed to read body of {} {}: {}", method, url, e);
                ServiceResponse::error(400, "Failed to read request body")
            }
            Ok(_) if body.len() > max_body => ServiceResponse::error(413, "Request body too large"),
            Ok(_) => handle(engine, &method, &url, &body),
        };

        let status = response.status;
        if let Err(e) = request.respond(response.into_response()) {
            warn!("Failed to send response for {} {}: {}", method, url, e);
        } else {
            info!("{} {} -> {}", method, url, status);
        }
    }
}
