#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use datapilot_core::domain::{AskResponse, ColumnSchema, Dataset, UploadFile, UploadReceipt};
use datapilot_core::gateway::{AnalyticsGateway, Timed};
use datapilot_core::PilotError;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub const ROUND_TRIP: Duration = Duration::from_millis(25);

/// Gateway that replays queued outcomes in order and records every call.
#[derive(Default)]
pub struct ScriptedGateway {
    uploads: Mutex<VecDeque<Result<UploadReceipt, PilotError>>>,
    answers: Mutex<VecDeque<Result<AskResponse, PilotError>>>,
    listings: Mutex<VecDeque<Result<Vec<Dataset>, PilotError>>>,
    deletes: Mutex<VecDeque<Result<(), PilotError>>>,
    calls: Mutex<Vec<String>>,
}

fn next<T>(queue: &Mutex<VecDeque<Result<T, PilotError>>>) -> Timed<T> {
    let result = queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(PilotError::network("no scripted response")));
    Timed::new(result, ROUND_TRIP)
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_returns(self, result: Result<UploadReceipt, PilotError>) -> Self {
        self.uploads.lock().unwrap().push_back(result);
        self
    }

    pub fn ask_returns(self, result: Result<AskResponse, PilotError>) -> Self {
        self.answers.lock().unwrap().push_back(result);
        self
    }

    pub fn list_returns(self, result: Result<Vec<Dataset>, PilotError>) -> Self {
        self.listings.lock().unwrap().push_back(result);
        self
    }

    pub fn delete_returns(self, result: Result<(), PilotError>) -> Self {
        self.deletes.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AnalyticsGateway for ScriptedGateway {
    async fn upload(&self, file: UploadFile) -> Timed<UploadReceipt> {
        self.record(format!("upload {}", file.file_name));
        next(&self.uploads)
    }

    async fn ask(&self, dataset_id: &str, question: &str) -> Timed<AskResponse> {
        self.record(format!("ask {} {}", dataset_id, question));
        next(&self.answers)
    }

    async fn list_datasets(&self) -> Timed<Vec<Dataset>> {
        self.record("list".to_string());
        next(&self.listings)
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Timed<()> {
        self.record(format!("delete {}", dataset_id));
        next(&self.deletes)
    }
}

pub fn dataset(id: &str, name: &str) -> Dataset {
    Dataset {
        id: id.to_string(),
        display_name: name.to_string(),
        storage_name: format!("table_{}", id),
        schema: vec![
            ColumnSchema {
                column: "region".to_string(),
                data_type: "VARCHAR".to_string(),
            },
            ColumnSchema {
                column: "total_revenue".to_string(),
                data_type: "DOUBLE".to_string(),
            },
        ],
        row_count: 1200,
    }
}

pub fn receipt(id: &str) -> UploadReceipt {
    let dataset = dataset(id, "unused");
    UploadReceipt {
        dataset_id: dataset.id,
        table_name: dataset.storage_name,
        schema: dataset.schema,
        row_count: dataset.row_count,
    }
}

pub fn answer(text: &str) -> AskResponse {
    let data = serde_json::json!([
        {"region": "EU", "total_revenue": 1234567},
        {"region": "US", "total_revenue": 987.5}
    ]);
    AskResponse {
        answer: text.to_string(),
        sql_query: "SELECT region, SUM(revenue) AS total_revenue FROM sales GROUP BY region"
            .to_string(),
        data: serde_json::from_value(data).unwrap(),
    }
}

pub fn csv(name: &str) -> UploadFile {
    UploadFile::new(name, "region,total_revenue\nEU,10\n".as_bytes().to_vec())
}
