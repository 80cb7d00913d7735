//! Builds the ordered message list for one chat-model call

use std::sync::Arc;
use tracing::debug;

use crate::config::PromptConfiguration;
use crate::llm::ChatRequest;
use crate::memory::ConversationTurn;

/// Prepends the fixed directives (and, for one call, the grounding text) to
/// the conversation history. It keeps no state between calls.
#[derive(Clone)]
pub struct ContextAssembler {
    prompts: Arc<PromptConfiguration>,
}

impl ContextAssembler {
    pub fn new(prompts: Arc<PromptConfiguration>) -> Self {
        Self { prompts }
    }

    pub fn prompts(&self) -> &PromptConfiguration {
        &self.prompts
    }

    /// `[role directive, instruction directive, grounding?, ..history]`.
    /// History is copied as-is: no reordering, dedup or truncation here.
    pub fn assemble(&self, history: &[ConversationTurn], grounding: Option<&str>) -> Vec<ConversationTurn> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ConversationTurn::system(self.prompts.role_prompt.as_str()));
        messages.push(ConversationTurn::system(self.prompts.instruction_prompt.as_str()));
        if let Some(text) = grounding {
            messages.push(ConversationTurn::system(text));
        }
        messages.extend_from_slice(history);

        debug!(
            "Assembled {} messages ({} history, grounded: {})",
            messages.len(),
            history.len(),
            grounding.is_some()
        );
        messages
    }

    /// Full request for the configured model and temperature.
    pub fn request(&self, history: &[ConversationTurn], grounding: Option<&str>) -> ChatRequest {
        ChatRequest {
            model: self.prompts.model.clone(),
            messages: self.assemble(history, grounding),
            temperature: self.prompts.temperature,
        }
    }
}
