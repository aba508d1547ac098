use crate::batch::{self, BatchItem};
use crate::document::{ResolutionPreset, SizeSpec};
use crate::engine::{OutputTarget, RenderEngine, RenderOutput};
use crate::pdf::PdfOptions;
use crate::template::TemplateResolver;
use crate::{BrowserBackend, Error, Result};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Render(String, OutputTarget, SizeSpec, oneshot::Sender<Result<RenderOutput>>),
    RenderDocument(String, OutputTarget, PdfOptions, oneshot::Sender<Result<RenderOutput>>),
    Batch(Vec<BatchItem>, PathBuf, ResolutionPreset, oneshot::Sender<Result<Vec<PathBuf>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly renderer backed by a dedicated worker thread.
///
/// The worker thread owns the [`RenderEngine`] and executes commands in the
/// order they were sent, so async callers get the same strict ordering as a
/// sequential batch without blocking their runtime.
#[derive(Clone)]
pub struct AsyncRenderer {
    cmd_tx: Sender<Command>,
}

impl AsyncRenderer {
    /// Spawn the worker thread and initialize the engine on it.
    pub async fn new<B>(engine: RenderEngine<B>, resolver: Option<TemplateResolver>) -> Result<Self>
    where
        B: BrowserBackend + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            if let Err(err) = engine.init() {
                let _ = init_tx.send(Err(err));
                return;
            }
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Render(fragment, target, size, resp) => {
                        let _ = resp.send(engine.render(&fragment, &target, &size));
                    }
                    Command::RenderDocument(html, target, options, resp) => {
                        let _ = resp.send(engine.render_document(&html, &target, &options));
                    }
                    Command::Batch(items, out_dir, preset, resp) => {
                        let res = match &resolver {
                            Some(resolver) => batch::render_batch(&engine, resolver, &items, &out_dir, preset),
                            None => Err(Error::ConfigError("no template resolver configured for batch rendering".into())),
                        };
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(engine.shutdown());
                        break;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Render a fragment to PNG
    pub async fn render(&self, fragment: &str, target: OutputTarget, size: SizeSpec) -> Result<RenderOutput> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Render(fragment.to_string(), target, size, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Render canceled: {}", e)))?
    }

    /// Paginate a full document to PDF
    pub async fn render_document(&self, html: &str, target: OutputTarget, options: PdfOptions) -> Result<RenderOutput> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Command::RenderDocument(html.to_string(), target, options, tx));
        rx.await
            .map_err(|e| Error::Other(format!("RenderDocument canceled: {}", e)))?
    }

    /// Render a batch of template items into `out_dir`
    pub async fn render_batch(
        &self,
        items: Vec<BatchItem>,
        out_dir: impl Into<PathBuf>,
        preset: ResolutionPreset,
    ) -> Result<Vec<PathBuf>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Batch(items, out_dir.into(), preset, tx));
        rx.await
            .map_err(|e| Error::Other(format!("Batch canceled: {}", e)))?
    }

    /// Shut down the engine and stop the worker thread.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
