pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod formatting;
pub mod gateway;
pub mod history;
pub mod persistence;
pub mod registry;
pub mod render;
pub mod session;
pub mod timeline;

pub use config::{ClientConfig, DecorationStyle};
pub use dispatch::{Action, ActionTable, Command};
pub use domain::{ColumnSchema, Dataset, Row, UploadFile};
pub use error::PilotError;
pub use gateway::{AnalyticsGateway, HttpGateway, Timed};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore, SessionStore};
pub use render::{RenderedView, Renderer};
pub use session::{AskTicket, Completion, DeleteTicket, Session, UploadTicket};
