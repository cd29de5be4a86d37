use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One result row, keyed by column name in the order the service sent them.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "table_name")]
    pub storage_name: String,
    #[serde(default)]
    pub schema: Vec<ColumnSchema>,
    #[serde(default)]
    pub row_count: u64,
}

impl Dataset {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.schema.iter().map(|c| c.column.as_str())
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub dataset_id: String,
    pub table_name: String,
    #[serde(default)]
    pub schema: Vec<ColumnSchema>,
    #[serde(default)]
    pub row_count: u64,
}

impl UploadReceipt {
    /// The upload endpoint does not echo a display name, so the uploaded
    /// file's name is used.
    pub fn into_dataset(self, display_name: impl Into<String>) -> Dataset {
        Dataset {
            id: self.dataset_id,
            display_name: display_name.into(),
            storage_name: self.table_name,
            schema: self.schema,
            row_count: self.row_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub dataset_id: &'a str,
    pub question: &'a str,
}

/// Body of a successful `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    pub answer: String,
    pub sql_query: String,
    #[serde(default)]
    pub data: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}
