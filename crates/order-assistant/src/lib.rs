// order-assistant/crates/order-assistant/src/lib.rs

pub mod config;
pub mod context_engine;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod records;
pub mod runner;
pub mod session;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use config::{Config, PromptConfiguration};
pub use error::{BackendError, ConfigError, DataError, IngestError};
pub use ingest::{IngestPipeline, IngestReport};
pub use memory::{ConversationHistory, ConversationTurn, Role};
pub use records::{DescriptorBuilder, OrderRecord, RecordStore};
pub use runner::{run_chat, run_ingest};
pub use session::{ConversationSession, SessionContext, SessionRegistry, SessionState, TurnOutcome};
