//! Presentation transforms for answers: query highlighting and result tables.
//!
//! Everything here is pure and total. Untrusted text (query text, column
//! names, cell values) is escaped before it is wrapped in markup.

use serde_json::Value;

use crate::domain::Row;

pub const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP BY", "ORDER BY", "LIMIT", "AS", "AND", "OR", "JOIN", "ON",
    "LEFT", "RIGHT", "INNER", "OUTER", "DESC", "ASC",
];

pub const FUNCTIONS: &[&str] = &["SUM", "COUNT", "AVG", "MIN", "MAX", "date_trunc"];

pub const MAX_RENDERED_ROWS: usize = 10;

pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Plain(String),
    Keyword(String),
    Function(String),
    StringLiteral(String),
}

impl QueryToken {
    fn write_markup(&self, out: &mut String) {
        let (class, text) = match self {
            QueryToken::Plain(text) => {
                out.push_str(&escape_markup(text));
                return;
            }
            QueryToken::Keyword(text) => ("sql-keyword", text),
            QueryToken::Function(text) => ("sql-function", text),
            QueryToken::StringLiteral(text) => ("sql-string", text),
        };
        out.push_str("<span class=\"");
        out.push_str(class);
        out.push_str("\">");
        out.push_str(&escape_markup(text));
        out.push_str("</span>");
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn word_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }
    end
}

/// Finds `BY` after the whitespace following a `GROUP`/`ORDER` word and
/// returns its byte range.
fn trailing_by(sql: &str, after_word: usize) -> Option<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut cursor = after_word;
    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
        cursor += 1;
    }
    if cursor == after_word {
        return None;
    }
    let end = word_end(bytes, cursor);
    sql[cursor..end]
        .eq_ignore_ascii_case("BY")
        .then_some((cursor, end))
}

fn classify_word(word: &str) -> QueryToken {
    if let Some(keyword) = KEYWORDS
        .iter()
        .find(|kw| !kw.contains(' ') && kw.eq_ignore_ascii_case(word))
    {
        return QueryToken::Keyword((*keyword).to_string());
    }
    if let Some(function) = FUNCTIONS.iter().find(|f| f.eq_ignore_ascii_case(word)) {
        return QueryToken::Function((*function).to_string());
    }
    QueryToken::Plain(word.to_string())
}

fn push_plain(tokens: &mut Vec<QueryToken>, text: &str) {
    if let Some(QueryToken::Plain(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(QueryToken::Plain(text.to_string()));
    }
}

/// Splits a query into highlight tokens in one left-to-right pass.
///
/// Quoted literals are recognized before words, so a keyword inside a
/// literal stays part of the literal. Tagged words are emitted in their
/// canonical spelling; whitespace inside `GROUP BY`/`ORDER BY` is kept.
pub fn tokenize_query(sql: &str) -> Vec<QueryToken> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'\'' {
            match sql[i + 1..].find('\'') {
                Some(0) => {
                    push_plain(&mut tokens, "''");
                    i += 2;
                }
                Some(close) => {
                    let end = i + 1 + close + 1;
                    tokens.push(QueryToken::StringLiteral(sql[i..end].to_string()));
                    i = end;
                }
                None => {
                    push_plain(&mut tokens, "'");
                    i += 1;
                }
            }
            continue;
        }

        if is_word_byte(b) {
            let end = word_end(bytes, i);
            let word = &sql[i..end];

            let leads_pair =
                word.eq_ignore_ascii_case("GROUP") || word.eq_ignore_ascii_case("ORDER");
            if leads_pair {
                if let Some((by_start, by_end)) = trailing_by(sql, end) {
                    let gap = &sql[end..by_start];
                    let canonical = format!("{}{}BY", word.to_ascii_uppercase(), gap);
                    tokens.push(QueryToken::Keyword(canonical));
                    i = by_end;
                    continue;
                }
            }

            match classify_word(word) {
                QueryToken::Plain(text) => push_plain(&mut tokens, &text),
                token => tokens.push(token),
            }
            i = end;
            continue;
        }

        // Non-word characters are copied through whole, including multi-byte ones.
        let ch_len = sql[i..].chars().next().map_or(1, char::len_utf8);
        push_plain(&mut tokens, &sql[i..i + ch_len]);
        i += ch_len;
    }

    tokens
}

pub fn highlight_query(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() * 2);
    for token in tokenize_query(sql) {
        token.write_markup(&mut out);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
}

impl Tone {
    pub fn css_class(self) -> &'static str {
        match self {
            Tone::Positive => "growth-positive",
            Tone::Negative => "growth-negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub tone: Option<Tone>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub total_rows: usize,
}

impl TableView {
    pub fn footer(&self) -> Option<String> {
        (self.total_rows > self.rows.len())
            .then(|| format!("Showing {} of {} rows", self.rows.len(), self.total_rows))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultTable {
    NoResults,
    Table(TableView),
}

impl ResultTable {
    pub fn to_markup(&self) -> String {
        let view = match self {
            ResultTable::NoResults => {
                return "<p class=\"no-results\">No results found.</p>".to_string();
            }
            ResultTable::Table(view) => view,
        };

        let mut out = String::from(
            "<div class=\"results-table-container\"><table class=\"results-table\"><thead><tr>",
        );
        for header in &view.headers {
            out.push_str(&format!("<th>{}</th>", escape_markup(header)));
        }
        out.push_str("</tr></thead><tbody>");
        for row in &view.rows {
            out.push_str("<tr>");
            for cell in row {
                match cell.tone {
                    Some(tone) => out.push_str(&format!("<td class=\"{}\">", tone.css_class())),
                    None => out.push_str("<td>"),
                }
                out.push_str(&escape_markup(&cell.text));
                out.push_str("</td>");
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table></div>");
        if let Some(footer) = view.footer() {
            out.push_str(&format!(
                "<p class=\"table-footer\">{}</p>",
                escape_markup(&footer)
            ));
        }
        out
    }
}

pub fn format_table(rows: &[Row]) -> ResultTable {
    let Some(first) = rows.first() else {
        return ResultTable::NoResults;
    };

    let columns: Vec<&String> = first.keys().collect();
    let headers = columns.iter().map(|c| c.to_uppercase()).collect();

    let rendered = rows
        .iter()
        .take(MAX_RENDERED_ROWS)
        .map(|row| {
            columns
                .iter()
                .map(|column| match row.get(column.as_str()) {
                    Some(value) => format_cell(column, value),
                    None => Cell::plain(""),
                })
                .collect()
        })
        .collect();

    ResultTable::Table(TableView {
        headers,
        rows: rendered,
        total_rows: rows.len(),
    })
}

enum NumberStyle {
    Percent,
    Currency,
    Raw,
}

fn number_style(column: &str) -> NumberStyle {
    let column = column.to_lowercase();
    if column.contains("growth") || column.contains("change") {
        NumberStyle::Percent
    } else if ["revenue", "price", "amount"]
        .iter()
        .any(|needle| column.contains(needle))
    {
        NumberStyle::Currency
    } else {
        NumberStyle::Raw
    }
}

pub fn format_cell(column: &str, value: &Value) -> Cell {
    let number = match value {
        Value::Number(number) => number,
        Value::String(text) => return Cell::plain(text.as_str()),
        Value::Null => return Cell::plain("null"),
        other => return Cell::plain(other.to_string()),
    };

    let Some(float) = number.as_f64() else {
        return Cell::plain(number.to_string());
    };

    match number_style(column) {
        NumberStyle::Percent => {
            // Negative zero reads as zero.
            let float = if float == 0.0 { 0.0 } else { float };
            let tone = if float >= 0.0 {
                Tone::Positive
            } else {
                Tone::Negative
            };
            let sign = if float >= 0.0 { "+" } else { "" };
            Cell {
                text: format!("{}{:.1}%", sign, float),
                tone: Some(tone),
            }
        }
        NumberStyle::Currency => Cell::plain(format!("${}", group_number(float))),
        NumberStyle::Raw => {
            if number.is_f64() {
                Cell::plain(plain_float(float))
            } else {
                Cell::plain(number.to_string())
            }
        }
    }
}

fn plain_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

pub fn group_integer(value: u64) -> String {
    group_digits(&value.to_string())
}

/// en-US style grouping with at most three fraction digits.
pub fn group_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.3}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::new();
    let is_zero = integer.bytes().all(|b| b == b'0') && fraction.is_empty();
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&group_digits(integer));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}
