use crate::config::ConfigError;

use super::Message;

const QUESTION: &str = "{question}";
const CONTEXT: &str = "{context}";

/// Instructions for grounded question answering. The model is told to answer from
/// the retrieved context only and to say it doesn't know otherwise.
pub const DEFAULT_RAG_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {question} \n\
Context: {context} \n\
Answer:";

/// A fixed prompt with `{question}` and `{context}` placeholders, optionally
/// preceded by a system preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    preamble: Option<String>,
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            preamble: None,
            template: DEFAULT_RAG_PROMPT.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Fails if either placeholder is missing from `template`.
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        for placeholder in [QUESTION, CONTEXT] {
            if !template.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "prompt template is missing the `{placeholder}` placeholder"
                )));
            }
        }
        Ok(Self {
            preamble: None,
            template,
        })
    }

    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    /// Substitutes the placeholders in one pass, so placeholder-like text inside
    /// the question or the context is left alone.
    #[must_use]
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        loop {
            let next = [(QUESTION, question), (CONTEXT, context)]
                .into_iter()
                .filter_map(|(p, value)| rest.find(p).map(|at| (at, p, value)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, placeholder, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }

    /// The messages to send for one question.
    #[must_use]
    pub fn messages(&self, question: &str, context: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(preamble) = &self.preamble {
            messages.push(Message::Preamble(preamble.clone()));
        }
        messages.push(Message::User(self.render(question, context)));
        messages
    }
}
