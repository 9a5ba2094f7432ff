//! Incremental turn events.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Events of a streamed chat turn.
///
/// An answered turn yields `Sources`, then any number of `Fragment`s, then
/// `End`. A refused turn yields `Refused` then `End`. A failure mid-stream
/// yields an `Err` item in place of `End`; fragments already yielded stand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Distinct sources given to the model, most similar first.
    Sources(Vec<String>),
    /// A piece of answer text, in arrival order.
    Fragment(String),
    /// The refusal message. The model was not called.
    Refused(String),
    /// The turn finished normally.
    End,
}

/// Stream of events for one chat turn.
///
/// Dropping it cancels the turn and releases the model stream.
pub type ChatEventStream = BoxStream<'static, Result<ChatEvent>>;
