// Session module
// Stateful retrieval-augmented conversation over one processed document set

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError, RetrievalConfig};
use crate::embeddings::{Chunker, Embedder, InputType, embed_texts};
use crate::vectorstore::Vectorstore;
use crate::{RagError, Result};

/// Answer given to questions asked before any documents were processed
pub const NOT_READY_ANSWER: &str = "No documents processed.";

/// Speaker of a dialogue turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "CHATBOT")]
    Chatbot,
}

impl Role {
    /// Tag sent to the generation model
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Chatbot => "CHATBOT",
        }
    }

    /// Name used when showing the conversation to a person
    #[inline]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Chatbot => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: Role,
    pub message: String,
}

impl DialogueTurn {
    #[inline]
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    #[inline]
    pub fn chatbot(message: impl Into<String>) -> Self {
        Self {
            role: Role::Chatbot,
            message: message.into(),
        }
    }
}

/// Everything the generation model is given for one question
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub documents: &'a [String],
    pub history: &'a [DialogueTurn],
}

/// A remote capability that answers a question from context documents and prior turns
pub trait ChatModel {
    fn chat(&self, request: &ChatRequest<'_>) -> anyhow::Result<String>;
}

impl<C: ChatModel + ?Sized> ChatModel for &C {
    #[inline]
    fn chat(&self, request: &ChatRequest<'_>) -> anyhow::Result<String> {
        (**self).chat(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// Summary of one successful `process` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub documents: usize,
    pub segments: usize,
    pub embedded: usize,
    pub dimension: usize,
}

impl ProcessReport {
    /// Segments left out of the vector store because their embedding failed
    #[inline]
    pub const fn skipped(&self) -> usize {
        self.segments - self.embedded
    }
}

/// A conversation grounded in a set of processed documents
///
/// The session starts without a vector store and answers every question with
/// [`NOT_READY_ANSWER`]. A successful [`Session::process`] installs a vector
/// store, replacing any earlier one; a failed one leaves the session as it was.
/// Dialogue history accumulates for the lifetime of the session.
#[derive(Debug)]
pub struct Session<E, C> {
    embedder: E,
    chat_model: C,
    chunker: Chunker,
    retrieval: RetrievalConfig,
    vectorstore: Option<Vectorstore>,
    history: Vec<DialogueTurn>,
}

impl<E: Embedder, C: ChatModel> Session<E, C> {
    #[inline]
    pub const fn new(
        embedder: E,
        chat_model: C,
        chunker: Chunker,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            chat_model,
            chunker,
            retrieval,
            vectorstore: None,
            history: Vec::new(),
        }
    }

    /// Build a session using the chunking and retrieval settings of `config`
    #[inline]
    pub fn from_config(
        embedder: E,
        chat_model: C,
        config: &Config,
    ) -> std::result::Result<Self, ConfigError> {
        let chunker = Chunker::new(config.chunking)?;
        config.retrieval.validate()?;
        Ok(Self::new(
            embedder,
            chat_model,
            chunker,
            config.retrieval.clone(),
        ))
    }

    #[inline]
    pub const fn state(&self) -> SessionState {
        if self.vectorstore.is_some() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        }
    }

    #[inline]
    pub const fn is_ready(&self) -> bool {
        self.vectorstore.is_some()
    }

    #[inline]
    pub const fn vectorstore(&self) -> Option<&Vectorstore> {
        self.vectorstore.as_ref()
    }

    /// Every turn of the conversation so far, oldest first
    #[inline]
    pub fn history(&self) -> &[DialogueTurn] {
        &self.history
    }

    /// The conversation as `(user|assistant, message)` pairs
    #[inline]
    pub fn transcript(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.history
            .iter()
            .map(|turn| (turn.role.display_name(), turn.message.as_str()))
    }

    /// The part of the history replayed to the generation model
    ///
    /// The window counts single turns. It never starts on a chatbot turn, so
    /// an odd window replays one turn fewer rather than an orphaned answer.
    #[inline]
    pub fn replayed_history(&self) -> &[DialogueTurn] {
        let replayed = match self.retrieval.history_window {
            Some(window) if window < self.history.len() => {
                &self.history[self.history.len() - window..]
            }
            _ => &self.history,
        };

        match replayed.split_first() {
            Some((first, rest)) if first.role == Role::Chatbot => rest,
            _ => replayed,
        }
    }

    /// Chunk, embed and index `documents`, replacing the current vector store
    #[inline]
    pub fn process<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<ProcessReport> {
        let segments = self.chunker.chunk_all(documents);
        info!(
            "Split {} documents into {} segments",
            documents.len(),
            segments.len()
        );

        if segments.is_empty() {
            return Err(RagError::Embedding(
                "No text found in the provided documents".to_string(),
            ));
        }

        let embedded = embed_texts(&self.embedder, &segments, InputType::SearchDocument);
        if embedded.is_empty() {
            return Err(RagError::Embedding(
                "No embeddings were produced for any segment".to_string(),
            ));
        }
        if embedded.len() < segments.len() {
            warn!(
                "{} of {} segments could not be embedded and will not be searchable",
                segments.len() - embedded.len(),
                segments.len()
            );
        }

        let vectorstore = Vectorstore::build(&segments, embedded)?;
        let report = ProcessReport {
            documents: documents.len(),
            segments: segments.len(),
            embedded: vectorstore.len(),
            dimension: vectorstore.dimension().unwrap_or_default(),
        };

        self.vectorstore = Some(vectorstore);
        info!("Session ready with {} indexed segments", report.embedded);

        Ok(report)
    }

    /// Answer `question` from the processed documents and the conversation so far
    ///
    /// Both the question and the answer are appended to the history once the
    /// answer has been generated. If no documents have been processed yet the
    /// fixed [`NOT_READY_ANSWER`] is returned and the history is left alone.
    #[inline]
    pub fn ask(&mut self, question: &str) -> Result<String> {
        let Some(vectorstore) = &self.vectorstore else {
            debug!("Question asked before any documents were processed");
            return Ok(NOT_READY_ANSWER.to_string());
        };

        let query = self
            .embedder
            .embed_batch(&[question.to_string()], InputType::SearchQuery)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned for question".to_string()))?;

        let documents = vectorstore.retrieve(&query, self.retrieval.top_k)?;
        debug!("Retrieved {} context documents", documents.len());

        let request = ChatRequest {
            message: question,
            documents: &documents,
            history: self.replayed_history(),
        };

        let answer = self
            .chat_model
            .chat(&request)
            .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

        self.history.push(DialogueTurn::user(question));
        self.history.push(DialogueTurn::chatbot(answer.clone()));

        Ok(answer)
    }
}
