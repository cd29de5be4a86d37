//! Markup for the whole client view, rebuilt from session state after every
//! change.
//!
//! The renderer holds no state of its own. Interactive elements carry a
//! `data-action` id bound in the returned [`ActionTable`]; the host resolves
//! ids from the last render back into [`Action`]s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::DecorationStyle;
use crate::dispatch::{Action, ActionTable};
use crate::domain::{ColumnSchema, Row};
use crate::formatting::{escape_markup, format_table, group_integer, highlight_query};
use crate::session::{AskPhase, Session};
use crate::timeline::{Message, PendingId, Severity, TimelineEntry};

const NO_DATASET_LABEL: &str = "No dataset selected";
const COMPOSER_PLACEHOLDER: &str = "Ask DataPilot about your dataset...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    User,
    Bot,
    Alert,
    Dataset,
    Query,
    Delete,
    Dismiss,
    Copy,
    Upload,
    Chart,
    Clock,
    NewAnalysis,
    Send,
}

/// How glyphs are drawn. Layout never depends on the decoration.
pub trait Decoration: Send + Sync {
    fn glyph(&self, glyph: Glyph) -> String;
}

/// Icon placeholders for the embedding page's icon set.
#[derive(Debug, Clone, Copy, Default)]
pub struct IconDecoration;

impl Decoration for IconDecoration {
    fn glyph(&self, glyph: Glyph) -> String {
        let name = match glyph {
            Glyph::User => "user",
            Glyph::Bot => "bot",
            Glyph::Alert => "triangle-alert",
            Glyph::Dataset => "file-spreadsheet",
            Glyph::Query => "message-square",
            Glyph::Delete => "trash-2",
            Glyph::Dismiss => "x",
            Glyph::Copy => "copy",
            Glyph::Upload => "upload-cloud",
            Glyph::Chart => "bar-chart-2",
            Glyph::Clock => "clock",
            Glyph::NewAnalysis => "plus",
            Glyph::Send => "send",
        };
        format!("<i data-lucide=\"{}\"></i>", name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphDecoration;

impl Decoration for GlyphDecoration {
    fn glyph(&self, glyph: Glyph) -> String {
        let text = match glyph {
            Glyph::User => "\u{1F464}",
            Glyph::Bot => "\u{1F916}",
            Glyph::Alert => "\u{26A0}",
            Glyph::Dataset => "\u{1F4C4}",
            Glyph::Query => "\u{1F4AC}",
            Glyph::Delete => "\u{1F5D1}",
            Glyph::Dismiss => "\u{2715}",
            Glyph::Copy => "\u{1F4CB}",
            Glyph::Upload => "\u{2B06}",
            Glyph::Chart => "\u{1F4CA}",
            Glyph::Clock => "\u{1F552}",
            Glyph::NewAnalysis => "+",
            Glyph::Send => "\u{27A4}",
        };
        format!("<span class=\"glyph\">{}</span>", text)
    }
}

pub fn decoration_for(style: DecorationStyle) -> Box<dyn Decoration> {
    match style {
        DecorationStyle::Icons => Box::new(IconDecoration),
        DecorationStyle::Glyphs => Box::new(GlyphDecoration),
    }
}

pub fn format_latency(round_trip: Option<Duration>) -> String {
    match round_trip {
        Some(round_trip) => format!("{}ms", round_trip.as_millis()),
        None => "--".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub markup: String,
    pub actions: ActionTable,
}

pub struct Renderer {
    decoration: Box<dyn Decoration>,
    frames: AtomicU64,
}

impl Renderer {
    pub fn new(style: DecorationStyle) -> Self {
        Self::with_decoration(decoration_for(style))
    }

    pub fn with_decoration(decoration: Box<dyn Decoration>) -> Self {
        Self {
            decoration,
            frames: AtomicU64::new(0),
        }
    }

    pub fn render(&self, session: &Session) -> RenderedView {
        let mut frame = Frame {
            decoration: self.decoration.as_ref(),
            out: String::new(),
            actions: ActionTable::for_frame(self.frames.fetch_add(1, Ordering::Relaxed)),
        };

        frame.out.push_str("<div class=\"datapilot\">");
        frame.sidebar(session);
        frame.out.push_str("<main class=\"main-panel\">");
        frame.header(session);
        frame.chat_area(session);
        frame.composer(session);
        frame.out.push_str("</main></div>");

        RenderedView {
            markup: frame.out,
            actions: frame.actions,
        }
    }
}

struct Frame<'a> {
    decoration: &'a dyn Decoration,
    out: String,
    actions: ActionTable,
}

impl Frame<'_> {
    fn glyph(&self, glyph: Glyph) -> String {
        self.decoration.glyph(glyph)
    }

    fn bind(&mut self, action: Action) -> String {
        escape_markup(&self.actions.bind(action))
    }

    fn header(&mut self, session: &Session) {
        let dataset = session
            .active_dataset()
            .map(|dataset| dataset.display_name.as_str())
            .unwrap_or(NO_DATASET_LABEL);

        self.out.push_str(&format!(
            "<header class=\"top-bar\"><span class=\"current-dataset\">{}</span>\
             <span class=\"latency\">{}</span></header>",
            escape_markup(dataset),
            format_latency(session.last_round_trip())
        ));
    }

    fn sidebar(&mut self, session: &Session) {
        let new_analysis = self.bind(Action::NewAnalysis);
        self.out.push_str(&format!(
            "<aside class=\"sidebar\"><button class=\"new-analysis-btn\" data-action=\"{}\">{} New Analysis</button>",
            new_analysis,
            self.glyph(Glyph::NewAnalysis)
        ));

        self.out
            .push_str("<h3 class=\"sidebar-title\">Datasets</h3><ul class=\"dataset-list\">");
        let registry = session.registry();
        if registry.is_empty() {
            self.out.push_str(&format!(
                "<li class=\"dataset-item placeholder\">{} Upload a CSV to start</li>",
                self.glyph(Glyph::Dataset)
            ));
        }
        let active = registry.active_index();
        for (index, dataset) in registry.datasets().iter().enumerate() {
            let select = self.bind(Action::SelectDataset { index });
            let delete = self.bind(Action::DeleteDataset { index });
            let class = if active == Some(index) {
                "dataset-item active"
            } else {
                "dataset-item"
            };
            self.out.push_str(&format!(
                "<li class=\"{}\"><span class=\"item-content\" data-action=\"{}\">{}\
                 <span class=\"item-name\">{}</span></span>\
                 <button class=\"delete-btn\" data-action=\"{}\" title=\"Delete dataset\">{}</button></li>",
                class,
                select,
                self.glyph(Glyph::Dataset),
                escape_markup(&dataset.display_name),
                delete,
                self.glyph(Glyph::Delete)
            ));
        }
        self.out.push_str("</ul>");

        self.out
            .push_str("<h3 class=\"sidebar-title\">Recent Queries</h3><ul class=\"query-list\">");
        let history = session.recent_queries();
        if history.is_empty() {
            self.out.push_str(&format!(
                "<li class=\"query-item placeholder\">{} No queries yet</li>",
                self.glyph(Glyph::Clock)
            ));
        }
        for (index, query) in history.entries().iter().enumerate() {
            let reuse = self.bind(Action::UseSuggestion {
                text: query.clone(),
            });
            let delete = self.bind(Action::DeleteRecentQuery { index });
            self.out.push_str(&format!(
                "<li class=\"query-item\"><span class=\"item-content\" data-action=\"{}\">{}\
                 <span class=\"item-name\">{}</span></span>\
                 <button class=\"delete-btn\" data-action=\"{}\" title=\"Delete query\">{}</button></li>",
                reuse,
                self.glyph(Glyph::Query),
                escape_markup(query),
                delete,
                self.glyph(Glyph::Dismiss)
            ));
        }
        self.out.push_str("</ul></aside>");
    }

    fn chat_area(&mut self, session: &Session) {
        self.out.push_str("<section class=\"chat-area\">");
        let timeline = session.timeline();
        if timeline.is_empty() && session.active_dataset().is_none() {
            self.welcome();
        }
        for entry in timeline.entries() {
            self.message(entry);
        }
        self.out.push_str("</section>");
    }

    fn welcome(&mut self) {
        self.out.push_str(&format!(
            "<div class=\"welcome-state\"><div class=\"welcome-icon-container\">{}</div>\
             <h2>Welcome to DataPilot</h2>\
             <p>Upload a CSV file to start analyzing your data with natural language queries</p>\
             <label class=\"upload-zone\" data-upload=\"csv\"><div class=\"upload-content\">{}\
             <span>Drop CSV here or click to upload</span></div></label></div>",
            self.glyph(Glyph::Chart),
            self.glyph(Glyph::Upload)
        ));
    }

    fn open_message(&mut self, class: &str, avatar: Glyph, entry: &TimelineEntry) {
        self.out.push_str(&format!(
            "<div class=\"message {}\" data-at=\"{}\"><div class=\"message-avatar\">{}</div>\
             <div class=\"message-content\">",
            class,
            entry.created_at.to_rfc3339(),
            self.glyph(avatar)
        ));
    }

    fn close_message(&mut self) {
        self.out.push_str("</div></div>");
    }

    fn message(&mut self, entry: &TimelineEntry) {
        match &entry.message {
            Message::User { text } => {
                self.open_message("message-user", Glyph::User, entry);
                self.out.push_str(&format!("<p>{}</p>", escape_markup(text)));
                self.close_message();
            }
            Message::Pending { id } => self.pending(*id, entry),
            Message::Assistant {
                dataset_name,
                answer_text,
                query_text,
                result_rows,
            } => self.answer(entry, dataset_name, answer_text, query_text, result_rows),
            Message::UploadSummary {
                display_name,
                storage_name,
                schema,
                row_count,
                suggestions,
            } => self.upload_summary(
                entry,
                display_name,
                storage_name,
                schema,
                *row_count,
                suggestions,
            ),
            Message::SystemNotice {
                text,
                severity: Severity::Progress,
            } => {
                self.open_message("message-assistant", Glyph::Bot, entry);
                self.out.push_str(&format!(
                    "<div class=\"loading-dots\"><span></span><span></span><span></span></div>\
                     <p class=\"progress-text\">{}</p>",
                    escape_markup(text)
                ));
                self.close_message();
            }
            Message::SystemNotice { text, severity } => {
                let (class, avatar) = match severity {
                    Severity::Warning => ("message-notice notice-warning", Glyph::Alert),
                    _ => ("message-notice notice-info", Glyph::Bot),
                };
                self.open_message(class, avatar, entry);
                self.out.push_str(&format!("<p>{}</p>", escape_markup(text)));
                self.close_message();
            }
            Message::Error { text } => {
                self.open_message("message-error", Glyph::Alert, entry);
                self.out.push_str(&format!("<p>{}</p>", escape_markup(text)));
                self.close_message();
            }
        }
    }

    fn pending(&mut self, id: PendingId, entry: &TimelineEntry) {
        self.out.push_str(&format!(
            "<div class=\"message message-assistant\" id=\"{}\" data-at=\"{}\">\
             <div class=\"message-avatar\">{}</div><div class=\"message-content\">\
             <div class=\"loading-dots\"><span></span><span></span><span></span></div>",
            id,
            entry.created_at.to_rfc3339(),
            self.glyph(Glyph::Bot)
        ));
        self.close_message();
    }

    fn answer(
        &mut self,
        entry: &TimelineEntry,
        dataset_name: &str,
        answer_text: &str,
        query_text: &str,
        result_rows: &[Row],
    ) {
        let copy = self.bind(Action::CopyQuery {
            text: query_text.to_string(),
        });

        self.open_message("message-assistant", Glyph::Bot, entry);
        self.out.push_str(&format!(
            "<p class=\"assistant-intro\">I've analyzed the <span class=\"dataset-link\">{}</span> dataset. {}</p>\
             <div class=\"sql-block\"><div class=\"sql-header\"><span class=\"sql-label\">DUCKDB SQL</span>\
             <button class=\"copy-btn\" data-action=\"{}\">{} Copy</button></div>\
             <pre class=\"sql-code\">{}</pre></div>",
            escape_markup(dataset_name),
            escape_markup(answer_text),
            copy,
            self.glyph(Glyph::Copy),
            highlight_query(query_text)
        ));
        self.out.push_str(&format_table(result_rows).to_markup());
        self.close_message();
    }

    fn upload_summary(
        &mut self,
        entry: &TimelineEntry,
        display_name: &str,
        storage_name: &str,
        schema: &[ColumnSchema],
        row_count: u64,
        suggestions: &[String],
    ) {
        self.open_message("message-assistant", Glyph::Bot, entry);
        self.out.push_str(&format!(
            "<p class=\"assistant-intro\">Successfully uploaded <span class=\"dataset-link\">{}</span>!</p>\
             <div class=\"sql-block\"><div class=\"sql-header\"><span class=\"sql-label\">DATASET INFO</span></div>\
             <div class=\"sql-code\">Table: {}\nRows: {}\n\nColumns:",
            escape_markup(display_name),
            escape_markup(storage_name),
            group_integer(row_count)
        ));
        for column in schema {
            self.out.push_str(&format!(
                "\n  \u{2022} {} ({})",
                escape_markup(&column.column),
                escape_markup(&column.data_type)
            ));
        }
        self.out.push_str(
            "</div></div><p class=\"suggestion-intro\">Now you can ask questions about your data! \
             Try these examples:</p><div class=\"suggestion-chip-container\">",
        );
        for suggestion in suggestions {
            let id = self.bind(Action::UseSuggestion {
                text: suggestion.clone(),
            });
            self.out.push_str(&format!(
                "<button class=\"suggestion-chip\" data-action=\"{}\">{}</button>",
                id,
                escape_markup(suggestion)
            ));
        }
        self.out.push_str("</div>");
        self.close_message();
    }

    fn composer(&mut self, session: &Session) {
        let disabled = if session.ask_phase() == AskPhase::Pending {
            " disabled"
        } else {
            ""
        };

        self.out.push_str("<form class=\"composer\">");
        if let Some(notice) = session.inline_notice() {
            self.out.push_str(&format!(
                "<p class=\"inline-notice\">{}</p>",
                escape_markup(notice)
            ));
        }
        self.out.push_str(&format!(
            "<textarea class=\"question-input\" placeholder=\"{}\"{}>{}</textarea>\
             <button class=\"send-btn\" type=\"submit\"{}>{}</button></form>",
            COMPOSER_PLACEHOLDER,
            disabled,
            escape_markup(session.draft()),
            disabled,
            self.glyph(Glyph::Send)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnSchema, Dataset, UploadReceipt};
    use crate::gateway::Timed;
    use crate::persistence::{MemoryStore, SessionStore};

    fn dataset(id: &str, name: &str) -> Dataset {
        Dataset {
            id: id.into(),
            display_name: name.into(),
            storage_name: format!("t_{}", id),
            schema: vec![ColumnSchema {
                column: "region".into(),
                data_type: "VARCHAR".into(),
            }],
            row_count: 1500,
        }
    }

    fn session() -> Session {
        Session::new(SessionStore::new(MemoryStore::new(), false))
    }

    #[test]
    fn empty_session_shows_welcome_and_placeholders() {
        let view = Renderer::new(DecorationStyle::Icons).render(&session());

        assert!(view.markup.contains("Welcome to DataPilot"));
        assert!(view.markup.contains("Upload a CSV to start"));
        assert!(view.markup.contains("No queries yet"));
        assert!(view.markup.contains(NO_DATASET_LABEL));
        assert_eq!(
            view.actions.iter().map(|(_, a)| a).collect::<Vec<_>>(),
            vec![&Action::NewAnalysis]
        );
    }

    #[test]
    fn dataset_entries_bind_select_and_delete() {
        let mut session = session();
        session.apply_listing(Timed::new(
            Ok(vec![dataset("a", "sales.csv"), dataset("b", "<trips>.csv")]),
            Duration::ZERO,
        ));

        let view = Renderer::new(DecorationStyle::Glyphs).render(&session);

        assert!(view.markup.contains("&lt;trips&gt;.csv"));
        assert!(!view.markup.contains("<trips>"));
        assert!(!view.markup.contains("Welcome to DataPilot"));
        assert!(!view.markup.contains("data-lucide"));
        let bound: Vec<&Action> = view.actions.iter().map(|(_, a)| a).collect();
        assert!(bound.contains(&&Action::SelectDataset { index: 1 }));
        assert!(bound.contains(&&Action::DeleteDataset { index: 0 }));
    }

    #[test]
    fn each_render_binds_a_fresh_generation() {
        let renderer = Renderer::new(DecorationStyle::Glyphs);
        let session = session();

        let first = renderer.render(&session);
        let second = renderer.render(&session);

        assert!(second.actions.generation() > first.actions.generation());
        for (id, _) in first.actions.iter() {
            assert_eq!(second.actions.resolve(id), None);
            assert!(second.actions.is_superseded(id));
        }
    }

    #[test]
    fn every_bound_id_appears_in_markup() {
        let mut session = session();
        let ticket = session.begin_upload("sales.csv");
        session.complete_upload(
            ticket,
            Timed::new(
                Ok(UploadReceipt {
                    dataset_id: "a".into(),
                    table_name: "t_a".into(),
                    schema: dataset("a", "x").schema,
                    row_count: 1500,
                }),
                Duration::from_millis(42),
            ),
        );

        let view = Renderer::new(DecorationStyle::Icons).render(&session);

        for (id, _) in view.actions.iter() {
            assert!(view.markup.contains(&format!("data-action=\"{}\"", id)));
        }
        assert!(view.markup.contains("Rows: 1,500"));
        assert!(view.markup.contains("Count rows by region"));
        assert!(view.markup.contains("42ms"));
    }

    #[test]
    fn composer_is_disabled_while_pending() {
        let mut session = session();
        session.apply_listing(Timed::new(Ok(vec![dataset("a", "sales.csv")]), Duration::ZERO));
        session.begin_ask("How many rows?").unwrap();

        let view = Renderer::new(DecorationStyle::Icons).render(&session);

        assert!(view.markup.contains("loading-dots"));
        assert!(view.markup.contains(
            "<textarea class=\"question-input\" placeholder=\"Ask DataPilot about your dataset...\" disabled>"
        ));
    }

    #[test]
    fn latency_formats_in_milliseconds() {
        assert_eq!(format_latency(None), "--");
        assert_eq!(format_latency(Some(Duration::from_micros(12_900))), "12ms");
    }
}
