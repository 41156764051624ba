//! Answer generation boundary.

use async_trait::async_trait;

use crate::error::Result;

/// Instructions sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are a document assistant.\n\
Explain clearly in paragraph format.\n\
If answer not present reply exactly:\n\
This topic is not available in the document.";

/// Everything a generator needs to answer one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// System instructions.
    pub system: String,
    /// The assembled document context.
    pub context: String,
    /// The user's question.
    pub question: String,
}

impl GenerationRequest {
    /// A request carrying the standard [`SYSTEM_PROMPT`].
    pub fn new(context: impl Into<String>, question: impl Into<String>) -> Self {
        Self { system: SYSTEM_PROMPT.to_string(), context: context.into(), question: question.into() }
    }

    /// The user turn: context first, then the question.
    pub fn user_message(&self) -> String {
        format!("Context:\n{}\n\nQuestion: {}", self.context, self.question)
    }
}

/// Produces a natural-language answer from retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// A short name for log and error messages.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_puts_context_before_question() {
        let request = GenerationRequest::new("General\nStep one.", "What is step one?");
        assert_eq!(request.user_message(), "Context:\nGeneral\nStep one.\n\nQuestion: What is step one?");
        assert!(request.system.ends_with("This topic is not available in the document."));
    }
}
