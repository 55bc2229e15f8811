//! Stream assembly.
//!
//! Folds the ordered stream messages of one query into a final
//! [`AnswerResult`]. Every block overwrites its field wholesale; the
//! assembler never merges values across messages.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::{
    extract_answer_text, AnswerResult, BlockKind, MessageStatus, Reference, ResearchProgress,
    StreamMessage,
};

/// Latest value of one field.
#[derive(Debug, Clone, PartialEq)]
struct FieldState {
    kind: BlockKind,
    content: Value,
    /// Position of the write among all block writes, for "most recent" lookups
    updated_seq: u64,
}

/// Per-query state owned by a [`StreamAssembler`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyState {
    fields: BTreeMap<String, FieldState>,
    terminal: bool,
    status: MessageStatus,
    thread_slug: Option<String>,
    writes: u64,
    messages: u64,
}

impl AssemblyState {
    /// Whether a terminal message has been applied.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Number of messages applied.
    pub fn message_count(&self) -> u64 {
        self.messages
    }

    /// Status of the last applied message.
    pub fn status(&self) -> &MessageStatus {
        &self.status
    }

    /// Current content of `field`, if it was ever written.
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).map(|state| &state.content)
    }

    /// The most recently written field of `kind`.
    fn latest(&self, kind: &BlockKind) -> Option<&FieldState> {
        self.fields
            .values()
            .filter(|state| &state.kind == kind)
            .max_by_key(|state| state.updated_seq)
    }
}

/// Builds one answer out of the messages of one stream.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    state: AssemblyState,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one message. Blocks are written in order, each replacing
    /// whatever its field held before.
    pub fn apply(&mut self, message: &StreamMessage) {
        let state = &mut self.state;
        state.messages += 1;

        for block in &message.blocks {
            state.writes += 1;
            state.fields.insert(
                block.field.clone(),
                FieldState {
                    kind: block.kind.clone(),
                    content: block.update.clone().into_content(),
                    updated_seq: state.writes,
                },
            );
        }

        state.terminal |= message.terminal;
        state.status = message.status.clone();
        if let Some(slug) = &message.thread_url_slug {
            state.thread_slug = Some(slug.clone());
        }
    }

    /// Read-only view of the running state.
    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// Whether a terminal message has been applied.
    pub fn is_terminal(&self) -> bool {
        self.state.terminal
    }

    /// Latest research progress, if any progress block carried a plan.
    pub fn progress(&self) -> Option<ResearchProgress> {
        self.state
            .latest(&BlockKind::Progress)
            .and_then(|field| ResearchProgress::from_content(&field.content))
    }

    /// Produce the final answer.
    ///
    /// Fails with [`ProtocolError::IncompleteStream`] if no terminal message
    /// was applied, and with [`ProtocolError::NoAnswer`] if no answer-text
    /// field holds any text.
    pub fn finalize(&self) -> Result<AnswerResult, ProtocolError> {
        if !self.state.terminal {
            return Err(ProtocolError::IncompleteStream);
        }

        let answer = self.answer_text().ok_or(ProtocolError::NoAnswer)?;

        let references = self
            .state
            .latest(&BlockKind::WebResults)
            .and_then(|field| Reference::list_from_content(&field.content))
            .unwrap_or_default();

        Ok(
            AnswerResult::new(answer, references, &self.state.status)
                .with_thread_slug(self.state.thread_slug.clone()),
        )
    }

    /// Text of the most recently written answer-text field that has any.
    ///
    /// A newer answer-text field with no text does not hide an older one
    /// that has text; only when no field has text is the answer missing.
    fn answer_text(&self) -> Option<String> {
        let mut fields: Vec<&FieldState> = self
            .state
            .fields
            .values()
            .filter(|state| state.kind == BlockKind::AnswerText)
            .collect();
        fields.sort_by_key(|state| std::cmp::Reverse(state.updated_seq));

        fields
            .into_iter()
            .filter_map(|state| extract_answer_text(&state.content))
            .find(|text| !text.is_empty())
    }
}
