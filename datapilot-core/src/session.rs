use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatch::{Action, Command};
use crate::domain::{AskResponse, Dataset, UploadFile, UploadReceipt};
use crate::error::PilotError;
use crate::gateway::{AnalyticsGateway, Timed};
use crate::history::RecentQueries;
use crate::persistence::SessionStore;
use crate::registry::DatasetRegistry;
use crate::timeline::{Message, PendingId, Severity, Timeline};

const NO_DATASET: &str = "Please select or upload a dataset first!";
const EMPTY_QUESTION: &str = "Please enter a question first.";
const ASK_IN_FLIGHT: &str = "Please wait for the current answer before asking again.";

/// Everything needed to apply the result of an in-flight ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskTicket {
    pub pending_id: PendingId,
    pub epoch: u64,
    pub dataset_id: String,
    pub dataset_name: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub epoch: u64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTicket {
    pub epoch: u64,
    pub dataset_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskPhase {
    Idle,
    Pending,
}

/// How a completion was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Resolved,
    Failed,
    /// The timeline it targeted was replaced or cleared in the meantime.
    Discarded,
}

fn upload_suggestions(dataset: &Dataset) -> Vec<String> {
    let first_column = dataset.column_names().next().unwrap_or("column");
    vec![
        "Show me the first 5 rows".to_string(),
        format!("Count rows by {}", first_column),
        "What is the average of [column]?".to_string(),
    ]
}

/// The single owner of conversation state: datasets, the timeline, recent
/// questions and composer state. Handlers mutate it synchronously; remote
/// calls happen between a `begin_*` and its `complete_*`.
pub struct Session {
    registry: DatasetRegistry,
    timeline: Timeline,
    history: RecentQueries,
    store: SessionStore,
    draft: String,
    inline_notice: Option<String>,
    last_round_trip: Option<Duration>,
}

impl Session {
    /// Reads persisted state once.
    pub fn new(store: SessionStore) -> Self {
        let history = store.load_history();
        let mut registry = DatasetRegistry::new();
        let stored = store.load_datasets();
        if !stored.is_empty() {
            registry.hydrate(stored);
        }

        info!(
            "Session created with {} recent queries and {} stored datasets",
            history.len(),
            registry.len()
        );

        Self {
            registry,
            timeline: Timeline::new(),
            history,
            store,
            draft: String::new(),
            inline_notice: None,
            last_round_trip: None,
        }
    }

    pub async fn start(&mut self, gateway: &dyn AnalyticsGateway) {
        let listing = gateway.list_datasets().await;
        self.apply_listing(listing);
    }

    /// Hydrates the registry from the service's dataset list. A failed
    /// listing keeps whatever was loaded from storage.
    pub fn apply_listing(&mut self, listing: Timed<Vec<Dataset>>) {
        match listing.result {
            Ok(datasets) => {
                self.registry.hydrate(datasets);
                self.store.save_datasets(self.registry.datasets());
            }
            Err(e) => {
                warn!("Failed to fetch datasets: {}", e);
                if !self.registry.is_empty() {
                    info!("Using {} stored datasets", self.registry.len());
                }
            }
        }
    }

    fn reject(&mut self, message: &str) -> PilotError {
        debug!("Rejected submission: {}", message);
        self.inline_notice = Some(message.to_string());
        PilotError::precondition(message)
    }

    pub fn begin_ask(&mut self, question: &str) -> Result<AskTicket, PilotError> {
        let question = question.trim();

        if self.timeline.pending().is_some() {
            return Err(self.reject(ASK_IN_FLIGHT));
        }
        if question.is_empty() {
            return Err(self.reject(EMPTY_QUESTION));
        }
        let Some(dataset) = self.registry.active() else {
            return Err(self.reject(NO_DATASET));
        };
        let dataset_id = dataset.id.clone();
        let dataset_name = dataset.display_name.clone();

        self.inline_notice = None;
        self.draft.clear();
        self.timeline.push(Message::User {
            text: question.to_string(),
        });
        let pending_id = self.timeline.push_pending();

        debug!("Ask {} issued against {}", pending_id, dataset_id);

        Ok(AskTicket {
            pending_id,
            epoch: self.timeline.epoch(),
            dataset_id,
            dataset_name,
            question: question.to_string(),
        })
    }

    pub fn complete_ask(&mut self, ticket: AskTicket, timed: Timed<AskResponse>) -> Completion {
        self.last_round_trip = Some(timed.round_trip);

        if ticket.epoch != self.timeline.epoch() {
            debug!("Discarding stale answer for {}", ticket.pending_id);
            return Completion::Discarded;
        }

        let (terminal, completion) = match timed.result {
            Ok(response) => (
                Message::Assistant {
                    dataset_name: ticket.dataset_name,
                    answer_text: response.answer,
                    query_text: response.sql_query,
                    result_rows: response.data,
                },
                Completion::Resolved,
            ),
            Err(e) => (
                Message::Error {
                    text: format!("Query failed: {}", e),
                },
                Completion::Failed,
            ),
        };

        if !self.timeline.settle(ticket.pending_id, terminal) {
            debug!("Placeholder {} is gone, dropping answer", ticket.pending_id);
            return Completion::Discarded;
        }

        if completion == Completion::Resolved {
            self.history.record(&ticket.question);
            self.store.save_history(&self.history);
        }
        completion
    }

    pub async fn ask(
        &mut self,
        gateway: &dyn AnalyticsGateway,
        question: &str,
    ) -> Result<Completion, PilotError> {
        let ticket = self.begin_ask(question)?;
        let timed = gateway.ask(&ticket.dataset_id, &ticket.question).await;
        Ok(self.complete_ask(ticket, timed))
    }

    /// Replaces the timeline with a loading notice for the upload.
    pub fn begin_upload(&mut self, file_name: &str) -> UploadTicket {
        self.inline_notice = None;
        self.timeline.replace_all(Message::SystemNotice {
            text: format!("Uploading {}...", file_name),
            severity: Severity::Progress,
        });

        UploadTicket {
            epoch: self.timeline.epoch(),
            display_name: file_name.to_string(),
        }
    }

    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        timed: Timed<UploadReceipt>,
    ) -> Completion {
        self.last_round_trip = Some(timed.round_trip);
        let current = ticket.epoch == self.timeline.epoch();

        match timed.result {
            Ok(receipt) => {
                let dataset = receipt.into_dataset(ticket.display_name);
                if !current {
                    debug!("Upload of {} finished after its view was replaced", dataset.id);
                    self.registry.insert(dataset);
                    self.store.save_datasets(self.registry.datasets());
                    return Completion::Discarded;
                }

                let summary = Message::UploadSummary {
                    display_name: dataset.display_name.clone(),
                    storage_name: dataset.storage_name.clone(),
                    schema: dataset.schema.clone(),
                    row_count: dataset.row_count,
                    suggestions: upload_suggestions(&dataset),
                };
                self.registry.register(dataset);
                self.store.save_datasets(self.registry.datasets());

                self.timeline.clear();
                self.timeline.push(summary);
                Completion::Resolved
            }
            Err(e) => {
                if !current {
                    warn!(
                        "Upload of {} failed after its view was replaced: {}",
                        ticket.display_name, e
                    );
                    return Completion::Discarded;
                }
                self.timeline.remove_progress_notices();
                self.timeline.push(Message::Error {
                    text: format!("Upload failed: {}", e),
                });
                Completion::Failed
            }
        }
    }

    pub async fn upload(&mut self, gateway: &dyn AnalyticsGateway, file: UploadFile) -> Completion {
        let ticket = self.begin_upload(&file.file_name);
        let timed = gateway.upload(file).await;
        self.complete_upload(ticket, timed)
    }

    pub fn select_dataset(&mut self, index: usize) -> Result<&Dataset, PilotError> {
        self.inline_notice = None;
        self.registry.select(index)
    }

    /// Removes the dataset locally right away; the remote delete follows.
    pub fn begin_delete(&mut self, index: usize) -> Result<DeleteTicket, PilotError> {
        let removed = self.registry.remove(index)?;
        self.store.save_datasets(self.registry.datasets());

        Ok(DeleteTicket {
            epoch: self.timeline.epoch(),
            dataset_id: removed.id,
            display_name: removed.display_name,
        })
    }

    pub fn complete_delete(&mut self, ticket: DeleteTicket, timed: Timed<()>) -> Completion {
        let e = match timed.result {
            Ok(()) => return Completion::Resolved,
            Err(e) => e,
        };

        warn!(
            "Remote delete of {} failed, keeping local removal: {}",
            ticket.dataset_id, e
        );
        if ticket.epoch != self.timeline.epoch() {
            return Completion::Discarded;
        }
        self.timeline.push(Message::SystemNotice {
            text: format!(
                "Removed {} locally, but the server could not delete it: {}",
                ticket.display_name, e
            ),
            severity: Severity::Warning,
        });
        Completion::Failed
    }

    pub async fn delete_dataset(
        &mut self,
        gateway: &dyn AnalyticsGateway,
        index: usize,
    ) -> Result<Completion, PilotError> {
        let ticket = self.begin_delete(index)?;
        let timed = gateway.delete_dataset(&ticket.dataset_id).await;
        Ok(self.complete_delete(ticket, timed))
    }

    /// Starts a new analysis: empty timeline, no active dataset. Datasets and
    /// recent queries stay. In-flight requests keep running; their results
    /// are discarded.
    pub fn reset_session(&mut self) {
        info!("Starting a new analysis");
        self.registry.clear_active();
        self.timeline.clear();
        self.inline_notice = None;
    }

    pub fn delete_recent_query(&mut self, index: usize) -> Result<String, PilotError> {
        let removed = self.history.remove(index)?;
        self.store.save_history(&self.history);
        Ok(removed)
    }

    pub fn use_suggestion(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.inline_notice = None;
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn dispatch(&mut self, action: Action) -> Result<Option<Command>, PilotError> {
        debug!("Dispatching {}", action.name());
        match action {
            Action::SelectDataset { index } => {
                self.select_dataset(index)?;
                Ok(None)
            }
            Action::DeleteDataset { index } => {
                let ticket = self.begin_delete(index)?;
                Ok(Some(Command::DeleteRemote(ticket)))
            }
            Action::DeleteRecentQuery { index } => {
                self.delete_recent_query(index)?;
                Ok(None)
            }
            Action::UseSuggestion { text } => {
                self.use_suggestion(text);
                Ok(None)
            }
            Action::CopyQuery { text } => Ok(Some(Command::CopyToClipboard(text))),
            Action::NewAnalysis => {
                self.reset_session();
                Ok(None)
            }
        }
    }

    pub fn ask_phase(&self) -> AskPhase {
        if self.timeline.pending().is_some() {
            AskPhase::Pending
        } else {
            AskPhase::Idle
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.registry.active()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn recent_queries(&self) -> &RecentQueries {
        &self.history
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn inline_notice(&self) -> Option<&str> {
        self.inline_notice.as_deref()
    }

    pub fn last_round_trip(&self) -> Option<Duration> {
        self.last_round_trip
    }
}
