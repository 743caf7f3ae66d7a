//! Inline completion: the service seam, the client that frames requests
//! around the caret, and the debounce scheduler that decides when to ask.

pub mod client;
pub mod scheduler;
pub mod service;

pub use client::{
    CURSOR_SENTINEL, CompletionClient, CompletionError, DEFAULT_SYSTEM_PROMPT, IGNORE_SENTINEL,
};
pub use scheduler::{DebounceScheduler, DebounceState};
pub use service::{CompletionService, DisabledService, OpenAiService, OpenAiSettings, ServiceError};
