use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use datapilot_core::dispatch::{ActionTable, Command};
use datapilot_core::domain::{AskResponse, UploadFile, UploadReceipt};
use datapilot_core::gateway::{AnalyticsGateway, Timed};
use datapilot_core::render::Renderer;
use datapilot_core::session::{AskTicket, DeleteTicket, Session, UploadTicket};
use datapilot_core::PilotError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Events from the embedding page, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Submit { question: String },
    Draft { text: String },
    Upload { file_name: String, content_base64: String },
    Action { id: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Render { markup: String },
    Clipboard { text: String },
}

/// A finished gateway call, sent back to the task that owns the session.
enum Completed {
    Ask(AskTicket, Timed<AskResponse>),
    Upload(UploadTicket, Timed<UploadReceipt>),
    Delete(DeleteTicket, Timed<()>),
}

/// Owns the session and joins user events with network completions. Gateway
/// calls run on spawned tasks and never see the session.
pub struct Bridge<W> {
    session: Session,
    renderer: Renderer,
    gateway: Arc<dyn AnalyticsGateway>,
    actions: ActionTable,
    completions_tx: mpsc::UnboundedSender<Completed>,
    completions_rx: mpsc::UnboundedReceiver<Completed>,
    in_flight: usize,
    out: W,
}

impl<W: AsyncWrite + Unpin> Bridge<W> {
    pub fn new(
        session: Session,
        renderer: Renderer,
        gateway: Arc<dyn AnalyticsGateway>,
        out: W,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            session,
            renderer,
            gateway,
            actions: ActionTable::new(),
            completions_tx,
            completions_rx,
            in_flight: 0,
            out,
        }
    }

    /// Loads the dataset list and draws the first frame.
    pub async fn start(&mut self) -> Result<()> {
        self.session.start(self.gateway.as_ref()).await;
        self.render().await
    }

    /// Runs until the input closes and every in-flight call has settled.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut lines = LinesStream::new(input.lines());
        let mut input_open = true;

        while input_open || self.in_flight > 0 {
            tokio::select! {
                line = lines.next(), if input_open => match line {
                    Some(line) => {
                        let line = line.context("Failed to read bridge input")?;
                        self.handle_line(&line).await?;
                    }
                    None => {
                        info!("Bridge input closed with {} calls in flight", self.in_flight);
                        input_open = false;
                    }
                },
                Some(completed) = self.completions_rx.recv() => {
                    self.in_flight -= 1;
                    self.handle_completion(completed).await?;
                }
            }
        }

        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let message: InboundMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed bridge message: {}", e);
                return Ok(());
            }
        };

        match message {
            InboundMessage::Submit { question } => match self.session.begin_ask(&question) {
                Ok(ticket) => self.spawn_ask(ticket),
                Err(e) => debug!("Submit rejected: {}", e),
            },
            InboundMessage::Draft { text } => {
                self.session.set_draft(text);
                return Ok(());
            }
            InboundMessage::Upload {
                file_name,
                content_base64,
            } => self.upload(file_name, &content_base64),
            InboundMessage::Action { id } => {
                if let Some(command) = self.dispatch(&id) {
                    match command {
                        Command::DeleteRemote(ticket) => self.spawn_delete(ticket),
                        Command::CopyToClipboard(text) => {
                            self.emit(&OutboundMessage::Clipboard { text }).await?;
                        }
                    }
                }
            }
            InboundMessage::Reset => self.session.reset_session(),
        }

        self.render().await
    }

    fn dispatch(&mut self, id: &str) -> Option<Command> {
        let Some(action) = self.actions.resolve(id).cloned() else {
            if self.actions.is_superseded(id) {
                warn!("Ignoring action {} from a superseded frame", id);
            } else {
                warn!("Unknown action id: {}", id);
            }
            return None;
        };
        match self.session.dispatch(action) {
            Ok(command) => command,
            Err(e) => {
                warn!("Action {} failed: {}", id, e);
                None
            }
        }
    }

    fn upload(&mut self, file_name: String, content_base64: &str) {
        let ticket = self.session.begin_upload(&file_name);
        match STANDARD.decode(content_base64.trim()) {
            Ok(content) => self.spawn_upload(ticket, UploadFile::new(file_name, content)),
            Err(e) => {
                warn!("Upload of {} carried undecodable content: {}", file_name, e);
                let rejected = Timed::new(
                    Err(PilotError::validation("File content could not be read")),
                    Duration::ZERO,
                );
                self.session.complete_upload(ticket, rejected);
            }
        }
    }

    fn spawn_ask(&mut self, ticket: AskTicket) {
        let gateway = self.gateway.clone();
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let timed = gateway.ask(&ticket.dataset_id, &ticket.question).await;
            let _ = tx.send(Completed::Ask(ticket, timed));
        });
    }

    fn spawn_upload(&mut self, ticket: UploadTicket, file: UploadFile) {
        let gateway = self.gateway.clone();
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let timed = gateway.upload(file).await;
            let _ = tx.send(Completed::Upload(ticket, timed));
        });
    }

    fn spawn_delete(&mut self, ticket: DeleteTicket) {
        let gateway = self.gateway.clone();
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let timed = gateway.delete_dataset(&ticket.dataset_id).await;
            let _ = tx.send(Completed::Delete(ticket, timed));
        });
    }

    async fn handle_completion(&mut self, completed: Completed) -> Result<()> {
        let completion = match completed {
            Completed::Ask(ticket, timed) => self.session.complete_ask(ticket, timed),
            Completed::Upload(ticket, timed) => self.session.complete_upload(ticket, timed),
            Completed::Delete(ticket, timed) => self.session.complete_delete(ticket, timed),
        };
        debug!("Completion applied: {:?}", completion);
        self.render().await
    }

    async fn render(&mut self) -> Result<()> {
        let view = self.renderer.render(&self.session);
        self.actions = view.actions;
        self.emit(&OutboundMessage::Render {
            markup: view.markup,
        })
        .await
    }

    async fn emit(&mut self, message: &OutboundMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.out
            .write_all(line.as_bytes())
            .await
            .context("Failed to write bridge output")?;
        self.out.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }
}
