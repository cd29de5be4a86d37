use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ColumnSchema, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingId(Uuid);

impl PendingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PendingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pending-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    /// A transient "work in progress" notice.
    Progress,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    User {
        text: String,
    },
    Pending {
        id: PendingId,
    },
    Assistant {
        dataset_name: String,
        answer_text: String,
        query_text: String,
        result_rows: Vec<Row>,
    },
    UploadSummary {
        display_name: String,
        storage_name: String,
        schema: Vec<ColumnSchema>,
        row_count: u64,
        suggestions: Vec<String>,
    },
    SystemNotice {
        text: String,
        severity: Severity,
    },
    Error {
        text: String,
    },
}

impl Message {
    pub fn is_pending(&self) -> bool {
        matches!(self, Message::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub message: Message,
    pub created_at: DateTime<Utc>,
}

/// Ordered conversation log. Entries are only appended, except that a
/// pending placeholder is swapped for its terminal message and the whole
/// log can be replaced or cleared.
///
/// `epoch` advances on every replace/clear; completions carrying an older
/// epoch belong to a timeline that no longer exists.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    epoch: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(TimelineEntry {
            message,
            created_at: Utc::now(),
        });
    }

    pub fn push_pending(&mut self) -> PendingId {
        let id = PendingId::new();
        self.push(Message::Pending { id });
        id
    }

    pub fn pending(&self) -> Option<PendingId> {
        self.entries.iter().find_map(|entry| match entry.message {
            Message::Pending { id } => Some(id),
            _ => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.message.is_pending())
            .count()
    }

    /// Removes the placeholder and appends `terminal`. Returns false (and
    /// changes nothing) if the placeholder is gone.
    pub fn settle(&mut self, id: PendingId, terminal: Message) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.message == Message::Pending { id })
        else {
            return false;
        };
        self.entries.remove(index);
        self.push(terminal);
        true
    }

    /// Drops every progress notice, e.g. once the work they announced ends.
    pub fn remove_progress_notices(&mut self) {
        self.entries.retain(|entry| {
            !matches!(
                entry.message,
                Message::SystemNotice {
                    severity: Severity::Progress,
                    ..
                }
            )
        });
    }

    pub fn replace_all(&mut self, message: Message) {
        self.clear();
        self.push(message);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last().map(|entry| &entry.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
