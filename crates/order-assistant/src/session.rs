//! Conversation sessions - one history per user, one backend call per turn
//!
//! A turn runs strictly in order: the user message is stored, the referenced
//! order (if any) is rendered as grounding, the context is assembled, the
//! backend is called, and the reply (or an error text) is stored. Grounding
//! only exists for the call it was built for.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PromptConfiguration;
use crate::context_engine::{ContextAssembler, ReferenceExtractor};
use crate::error::BackendError;
use crate::llm::ChatBackend;
use crate::memory::{ConversationHistory, ConversationTurn};
use crate::records::{DescriptorBuilder, RecordStore};
use crate::utils::TextUtils;

/// Stored as the assistant turn when the backend answers with nothing.
pub const EMPTY_ANSWER: &str = "[sin respuesta]";

const ERROR_PREFIX: &str = "Ocurrió un error al procesar la solicitud";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// What one `send` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text stored as the assistant turn.
    pub reply: String,
    /// Tracking number of the order used as grounding for this call.
    pub grounded_on: Option<String>,
    pub failed: bool,
}

/// Everything sessions share. Cheap to clone.
#[derive(Clone)]
pub struct SessionContext {
    pub assembler: ContextAssembler,
    pub extractor: ReferenceExtractor,
    pub backend: Arc<dyn ChatBackend>,
    pub timeout: Duration,
    /// Most recent turns sent to the backend; `None` sends the full history.
    pub history_window: Option<usize>,
}

impl SessionContext {
    pub fn new(
        prompts: Arc<PromptConfiguration>,
        store: Arc<RecordStore>,
        backend: Arc<dyn ChatBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(prompts),
            extractor: ReferenceExtractor::new(store),
            backend,
            timeout,
            history_window: None,
        }
    }

    pub fn with_history_window(mut self, turns: Option<usize>) -> Self {
        self.history_window = turns;
        self
    }
}

pub struct ConversationSession {
    id: String,
    history: ConversationHistory,
    state: SessionState,
    context: SessionContext,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, context: SessionContext) -> Self {
        Self {
            id: id.into(),
            history: ConversationHistory::new(),
            state: SessionState::Idle,
            context,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Run one turn. Always leaves exactly two new turns in the history and
    /// the session back in `Idle`, whether or not the backend succeeded.
    pub async fn send(&mut self, text: &str) -> TurnOutcome {
        self.state = SessionState::AwaitingResponse;
        debug!("Session {} <- {}", self.id, TextUtils::truncate_with_ellipsis(text, 80));
        self.history.push_user(text);

        let (grounded_on, grounding) = match self.context.extractor.resolve(text) {
            Some(record) => (
                Some(record.tracking_number.clone()),
                Some(DescriptorBuilder::grounding(record)),
            ),
            None => (None, None),
        };
        if let Some(tracking_number) = &grounded_on {
            debug!("Session {} grounded on order {}", self.id, tracking_number);
        }

        // The window always covers at least the message just pushed.
        let window: &[ConversationTurn] = match self.context.history_window {
            Some(turns) => self.history.recent(turns.max(1)),
            None => self.history.turns(),
        };
        let request = self.context.assembler.request(window, grounding.as_deref());

        let timeout = self.context.timeout;
        let result = match tokio::time::timeout(timeout, self.context.backend.chat(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout.as_secs())),
        };

        let (reply, failed) = match result {
            Ok(answer) if answer.trim().is_empty() => (EMPTY_ANSWER.to_string(), false),
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!("Session {}: backend call failed: {}", self.id, e);
                (format!("{}: {}", ERROR_PREFIX, e), true)
            }
        };

        self.history.push_assistant(reply.as_str());
        self.state = SessionState::Idle;

        TurnOutcome { reply, grounded_on, failed }
    }
}

/// Live sessions by id. Each session sits behind its own async mutex, so two
/// messages for the same session are processed one after the other while
/// different sessions proceed independently.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<ConversationSession>>>,
    context: SessionContext,
}

impl SessionRegistry {
    pub fn new(context: SessionContext) -> Self {
        Self {
            sessions: DashMap::new(),
            context,
        }
    }

    pub fn get_or_create(&self, session_id: &str) -> Arc<Mutex<ConversationSession>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("Starting session {}", session_id);
                Arc::new(Mutex::new(ConversationSession::new(session_id, self.context.clone())))
            })
            .clone()
    }

    pub async fn send(&self, session_id: &str, text: &str) -> TurnOutcome {
        let session = self.get_or_create(session_id);
        let mut session = session.lock().await;
        session.send(text).await
    }

    /// Drops the session and its history. Returns false for unknown ids.
    pub fn end_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("Ended session {}", session_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
