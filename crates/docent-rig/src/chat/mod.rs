//! Chat turns over the knowledge base.
//!
//! This module provides:
//! - [`ChatService`] - Sequences embedding, retrieval, filtering and answering
//! - [`AnswerComposer`] - Prompt construction and model invocation
//! - [`ChatOutcome`] / [`ChatResponse`] - Whole-answer results
//! - [`ChatEvent`] - Events of a streamed turn
//! - [`sanitize_query`] / [`ReasoningFilter`] - Input and output cleanup

mod composer;
mod event;
mod prompt;
mod reasoning;
mod response;
mod sanitize;
mod service;

pub use composer::{AnswerComposer, ComposedAnswer, ComposedStream};
pub use event::{ChatEvent, ChatEventStream};
pub use prompt::{Prompt, PromptBuilder};
pub use reasoning::{ReasoningFilter, strip_reasoning};
pub use response::{ChatOutcome, ChatResponse, REFUSAL_MESSAGE};
pub use sanitize::{MAX_QUERY_CHARACTERS, sanitize_query};
pub use service::{ChatService, TurnState};
