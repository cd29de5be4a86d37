use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::session::DeleteTicket;

/// A user action bound to concrete arguments at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SelectDataset { index: usize },
    DeleteDataset { index: usize },
    DeleteRecentQuery { index: usize },
    UseSuggestion { text: String },
    CopyQuery { text: String },
    NewAnalysis,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SelectDataset { .. } => "select_dataset",
            Action::DeleteDataset { .. } => "delete_dataset",
            Action::DeleteRecentQuery { .. } => "delete_recent_query",
            Action::UseSuggestion { .. } => "use_suggestion",
            Action::CopyQuery { .. } => "copy_query",
            Action::NewAnalysis => "new_analysis",
        }
    }
}

/// Work a handler leaves for the host: remote calls and clipboard writes
/// happen outside the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DeleteRemote(DeleteTicket),
    CopyToClipboard(String),
}

/// Action ids emitted into markup, mapped back to the actions they stand for.
///
/// Ids carry the frame generation, so an id from an earlier frame never
/// resolves against a later table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionTable {
    generation: u64,
    bindings: BTreeMap<String, Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_frame(generation: u64) -> Self {
        Self {
            generation,
            bindings: BTreeMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bind(&mut self, action: Action) -> String {
        let id = format!(
            "f{}-{}-{}",
            self.generation,
            action.name(),
            self.bindings.len()
        );
        self.bindings.insert(id.clone(), action);
        id
    }

    /// The generation encoded in `id`, if it is shaped like a bound id.
    pub fn generation_of(id: &str) -> Option<u64> {
        id.strip_prefix('f')?.split('-').next()?.parse().ok()
    }

    pub fn is_superseded(&self, id: &str) -> bool {
        Self::generation_of(id).is_some_and(|generation| generation < self.generation)
    }

    pub fn resolve(&self, id: &str) -> Option<&Action> {
        self.bindings.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.bindings.iter().map(|(id, action)| (id.as_str(), action))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
