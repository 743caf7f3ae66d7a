use std::sync::Arc;

use crate::auth::{AuthError, SessionCheck};
use crate::completion::service::{CompletionService, ServiceError};
use crate::editing::rich_text::byte_index;

/// Marks the caret position in the text sent to the model
pub const CURSOR_SENTINEL: &str = "<cursor/>";
/// What the model answers when it has nothing to suggest
pub const IGNORE_SENTINEL: &str = "<ignore/>";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that completes the text based on the given context. \
The <cursor/> tag represents the user's current typing cursor. \
The <ignore/> tag should be your output if you do not have any completions to provide. \
You should complete the next few words up to the next sentence, and the completion will go where the <cursor/> tag is. \
Your output should only be the completion of the text, not the text itself completed.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Turns document text plus a caret offset into a suggestion string.
///
/// The session is checked before every request. An empty string means "no
/// suggestion" and is never an error.
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    auth: Arc<dyn SessionCheck>,
    system_prompt: String,
}

impl CompletionClient {
    pub fn new(service: Arc<dyn CompletionService>, auth: Arc<dyn SessionCheck>) -> Self {
        Self {
            service,
            auth,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn request_completion(
        &self,
        text: &str,
        cursor_offset: usize,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        self.auth.check_session().await.owner()?;

        let payload = with_cursor(text, cursor_offset);
        let user_text = format!("Text to complete: {payload}");
        log::debug!("Requesting completion for {} chars", text.chars().count());

        let response = self
            .service
            .complete(&self.system_prompt, &user_text, max_tokens)
            .await?;
        Ok(clean_response(&response))
    }
}

/// Insert the cursor sentinel at a char offset (clamped to the end)
pub fn with_cursor(text: &str, cursor_offset: usize) -> String {
    let at = byte_index(text, cursor_offset);
    let mut payload = String::with_capacity(text.len() + CURSOR_SENTINEL.len());
    payload.push_str(&text[..at]);
    payload.push_str(CURSOR_SENTINEL);
    payload.push_str(&text[at..]);
    payload
}

/// Strip sentinels from a model answer. Leading whitespace is kept: it is
/// usually the space between the typed word and the suggestion.
pub fn clean_response(response: &str) -> String {
    let trimmed = response.trim();
    if trimmed.is_empty() || trimmed == IGNORE_SENTINEL {
        return String::new();
    }
    let cleaned = response
        .replace(CURSOR_SENTINEL, "")
        .replace(IGNORE_SENTINEL, "");
    if cleaned.trim().is_empty() {
        return String::new();
    }
    cleaned.trim_end_matches(['\n', '\r']).to_string()
}
