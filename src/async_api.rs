use crate::export::{ExportOutcome, ExportRequest, Exporter, ProgressFn, ReportPagesRequest};
use crate::session::{self, MemoryTokenStore};
use crate::Engine;
use crate::{cdp, EngineConfig, Error, ExportConfig, Result, ScriptResult};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};

/// Progress lines streamed from an in-flight export.
pub type ProgressSender = tokio_mpsc::UnboundedSender<String>;

enum Command {
    Goto(String, oneshot::Sender<Result<()>>),
    LoadHtml(String, oneshot::Sender<Result<()>>),
    Eval(String, oneshot::Sender<Result<ScriptResult>>),
    SeedSession(MemoryTokenStore, oneshot::Sender<Result<usize>>),
    ExportDashboard(
        Box<ExportRequest>,
        Option<ProgressSender>,
        oneshot::Sender<Result<ExportOutcome>>,
    ),
    ExportPages(
        Box<ReportPagesRequest>,
        Option<ProgressSender>,
        oneshot::Sender<Result<ExportOutcome>>,
    ),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly browser abstraction backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `CdpEngine` and runs commands sent
/// from async tasks one at a time, so the engine never has to be `Send`.
/// Exports run to completion once started; dropping the returned future does
/// not cancel them.
#[derive(Clone)]
pub struct Browser {
    cmd_tx: Sender<Command>,
}

/// A handle to the browser's single tab.
#[derive(Clone)]
pub struct Page {
    cmd_tx: Sender<Command>,
}

fn progress_callback(sender: Option<ProgressSender>) -> Option<ProgressFn> {
    sender.map(|tx| -> ProgressFn {
        Arc::new(move |message: &str| {
            let _ = tx.send(message.to_string());
        })
    })
}

fn exporter<'a, E: Engine>(
    engine: &'a mut E,
    config: &'a ExportConfig,
    progress: Option<ProgressSender>,
) -> Exporter<'a, E> {
    let exporter = Exporter::new(engine, config);
    match progress_callback(progress) {
        Some(callback) => exporter.with_progress(callback),
        None => exporter,
    }
}

impl Browser {
    /// Launch a browser on a background thread.
    pub async fn new(config: Option<EngineConfig>, export_config: ExportConfig) -> Result<Self> {
        let config = config.unwrap_or_default();
        export_config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            // Initialize engine on the worker thread
            let mut engine = match cdp::CdpEngine::new(config) {
                Ok(e) => e,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Goto(url, resp) => {
                        let _ = resp.send(engine.load_url(&url));
                    }
                    Command::LoadHtml(html, resp) => {
                        let _ = resp.send(engine.load_html(&html));
                    }
                    Command::Eval(script, resp) => {
                        let _ = resp.send(engine.evaluate(&script, true));
                    }
                    Command::SeedSession(store, resp) => {
                        let _ = resp.send(session::seed(&mut engine, &store));
                    }
                    Command::ExportDashboard(request, progress, resp) => {
                        let res = exporter(&mut engine, &export_config, progress)
                            .export_dashboard(&request);
                        let _ = resp.send(res);
                    }
                    Command::ExportPages(request, progress, resp) => {
                        let res = exporter(&mut engine, &export_config, progress)
                            .export_report_pages(&request);
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(engine.close());
                        break;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Handle to the page owned by the worker.
    pub async fn new_page(&self) -> Result<Page> {
        Ok(Page {
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Shutdown the background worker and close the browser.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

impl Page {
    async fn request<T>(
        &self,
        what: &str,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Other(format!("{} failed: browser worker has stopped", what)))?;
        rx.await
            .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
    }

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.request("Goto", |tx| Command::Goto(url, tx)).await
    }

    /// Replace the document with `html`
    pub async fn load_html(&self, html: &str) -> Result<()> {
        let html = html.to_string();
        self.request("LoadHtml", |tx| Command::LoadHtml(html, tx))
            .await
    }

    /// Evaluate JavaScript, awaiting a returned promise, and return the
    /// serialized result
    pub async fn eval(&self, script: &str) -> Result<String> {
        let script = script.to_string();
        let result = self.request("Eval", |tx| Command::Eval(script, tx)).await?;
        if result.is_error {
            return Err(Error::ScriptError(result.value));
        }
        Ok(result.value)
    }

    /// Write session tokens into the current origin's storage
    pub async fn seed_session(&self, store: MemoryTokenStore) -> Result<usize> {
        self.request("SeedSession", |tx| Command::SeedSession(store, tx))
            .await
    }

    /// Export the loaded dashboard; progress lines go to `progress` if given
    pub async fn export_dashboard(
        &self,
        request: ExportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<ExportOutcome> {
        self.request("ExportDashboard", |tx| {
            Command::ExportDashboard(Box::new(request), progress, tx)
        })
        .await
    }

    /// Export the loaded report preview one page per child element
    pub async fn export_report_pages(
        &self,
        request: ReportPagesRequest,
        progress: Option<ProgressSender>,
    ) -> Result<ExportOutcome> {
        self.request("ExportPages", |tx| {
            Command::ExportPages(Box::new(request), progress, tx)
        })
        .await
    }
}
