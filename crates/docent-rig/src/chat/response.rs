//! Whole-answer turn results.

use serde::{Deserialize, Serialize};

/// Reply given when no retrieved chunk clears the similarity threshold.
pub const REFUSAL_MESSAGE: &str = "❌ No related information found in the knowledge base. \
The query doesn't match any content in the uploaded documents. \
Please try rephrasing your question or ensure you've uploaded relevant documents.";

/// Successful result of a chat turn.
///
/// A refusal is a successful decision, not a failure: failures are reported
/// through [`Error`](crate::Error) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChatOutcome {
    /// The model answered from retrieved context.
    Answered {
        /// Answer text with reasoning spans removed.
        text: String,
        /// Distinct sources given to the model, most similar first.
        sources: Vec<String>,
    },
    /// Nothing relevant was retrieved; the model was not called.
    Refused {
        /// The refusal message.
        message: String,
    },
}

impl ChatOutcome {
    /// Creates a refusal with the standard message.
    pub fn refused() -> Self {
        Self::Refused {
            message: REFUSAL_MESSAGE.to_string(),
        }
    }

    /// Returns the text shown to the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Answered { text, .. } => text,
            Self::Refused { message } => message,
        }
    }

    /// Returns true if the answer came from retrieved context.
    pub fn was_answerable(&self) -> bool {
        matches!(self, Self::Answered { .. })
    }

    /// Returns the sources the answer was composed from.
    pub fn sources(&self) -> &[String] {
        match self {
            Self::Answered { sources, .. } => sources,
            Self::Refused { .. } => &[],
        }
    }
}

/// Flat response shape for callers that only need text and a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Answer or refusal text.
    pub text: String,
    /// False iff the turn was refused.
    pub was_answerable: bool,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        let was_answerable = outcome.was_answerable();
        let text = match outcome {
            ChatOutcome::Answered { text, .. } => text,
            ChatOutcome::Refused { message } => message,
        };
        Self {
            text,
            was_answerable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_is_not_answerable() {
        let outcome = ChatOutcome::refused();
        assert!(!outcome.was_answerable());
        assert_eq!(outcome.text(), REFUSAL_MESSAGE);
        assert!(outcome.sources().is_empty());

        let response = ChatResponse::from(outcome);
        assert!(!response.was_answerable);
        assert_eq!(response.text, REFUSAL_MESSAGE);
    }

    #[test]
    fn answered_response() {
        let outcome = ChatOutcome::Answered {
            text: "42".into(),
            sources: vec!["PDF: a.pdf".into()],
        };
        assert!(outcome.was_answerable());
        assert_eq!(outcome.sources(), ["PDF: a.pdf"]);

        let response = ChatResponse::from(outcome);
        assert_eq!(
            response,
            ChatResponse {
                text: "42".into(),
                was_answerable: true,
            }
        );
    }

    #[test]
    fn outcome_serialization_is_tagged() {
        let json = serde_json::to_value(ChatOutcome::refused()).unwrap();
        assert_eq!(json["outcome"], "refused");
    }
}
