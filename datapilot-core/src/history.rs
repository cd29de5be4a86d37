use crate::error::PilotError;

pub const MAX_RECENT_QUERIES: usize = 5;
pub const MAX_QUERY_CHARS: usize = 30;

/// Shortens a question for display in the history list.
pub fn truncate_question(question: &str) -> String {
    if question.chars().count() > MAX_QUERY_CHARS {
        let head: String = question.chars().take(MAX_QUERY_CHARS).collect();
        format!("{}...", head)
    } else {
        question.to_string()
    }
}

/// Previously asked questions, most recent first. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentQueries {
    entries: Vec<String>,
}

impl RecentQueries {
    /// Entries are taken verbatim; anything past the cap is dropped.
    pub fn from_entries(mut entries: Vec<String>) -> Self {
        entries.truncate(MAX_RECENT_QUERIES);
        Self { entries }
    }

    pub fn record(&mut self, question: &str) {
        self.entries.insert(0, truncate_question(question));
        self.entries.truncate(MAX_RECENT_QUERIES);
    }

    pub fn remove(&mut self, index: usize) -> Result<String, PilotError> {
        if index >= self.entries.len() {
            return Err(PilotError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_questions_are_truncated_with_ellipsis() {
        let question = "What were the top ten regions by revenue last year?";

        let truncated = truncate_question(question);

        assert_eq!(truncated, "What were the top ten regions ...");
        assert_eq!(truncated.chars().count(), MAX_QUERY_CHARS + 3);
    }

    #[test]
    fn thirty_characters_fit_without_ellipsis() {
        let question = "a".repeat(MAX_QUERY_CHARS);
        assert_eq!(truncate_question(&question), question);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let question = "é".repeat(31);
        assert_eq!(truncate_question(&question), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn record_keeps_five_most_recent_first() {
        let mut history = RecentQueries::default();
        for i in 0..7 {
            history.record(&format!("q{}", i));
        }

        assert_eq!(history.entries(), &["q6", "q5", "q4", "q3", "q2"]);
    }

    #[test]
    fn duplicates_are_allowed() {
        let mut history = RecentQueries::default();
        history.record("same");
        history.record("same");

        assert_eq!(history.len(), 2);
    }

    #[test]
    fn remove_rejects_bad_index() {
        let mut history = RecentQueries::from_entries(vec!["a".into()]);

        assert_eq!(
            history.remove(3),
            Err(PilotError::OutOfRange { index: 3, len: 1 })
        );
        assert_eq!(history.remove(0), Ok("a".to_string()));
        assert!(history.is_empty());
    }
}
