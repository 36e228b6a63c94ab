//! Event-sequence tokenization built on top of the vocabulary index.

use rayon::prelude::*;

use crate::error::{EhrTokError, Result};
use crate::event::Event;
use crate::vocab::{EventMatch, Vocabulary};

/// Default sentinel emitted for events the vocabulary cannot place.
pub const DEFAULT_UNK_TOKEN: &str = "<|unk|>";

/// How the tokenizer handles events whose code has entries but whose
/// value/unit matches no partition.
///
/// Codes absent from the vocabulary entirely always map to the UNK sentinel
/// regardless of policy; absence is an expected condition, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    /// Map partition mismatches to the UNK sentinel as well.
    #[default]
    MapToUnk,
    /// Surface partition mismatches as [`EhrTokError::NoMatchingPartition`];
    /// a mismatch means the event disagrees with the vocabulary build and
    /// would silently corrupt training data if guessed around.
    Strict,
}

/// Maps patient event sequences to textual token sequences.
///
/// Pure and read-only after construction; safe to share across any number of
/// data-loading workers.
#[must_use]
#[derive(Debug, Clone)]
pub struct ClinicalTokenizer {
    vocab: Vocabulary,
    unk_token: String,
    policy: UnknownPolicy,
}

impl ClinicalTokenizer {
    /// Creates a tokenizer with the default UNK sentinel and lenient policy.
    pub fn new(vocab: Vocabulary) -> Self {
        Self {
            vocab,
            unk_token: DEFAULT_UNK_TOKEN.to_string(),
            policy: UnknownPolicy::MapToUnk,
        }
    }

    /// Overrides the UNK sentinel token.
    pub fn with_unk_token<S: Into<String>>(mut self, token: S) -> Self {
        self.unk_token = token.into();
        self
    }

    /// Overrides the partition-mismatch policy.
    pub fn with_policy(mut self, policy: UnknownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Provides access to the underlying vocabulary index.
    #[must_use]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Returns the configured UNK sentinel.
    #[must_use]
    pub fn unk_token(&self) -> &str {
        &self.unk_token
    }

    /// Maps one event to its token string, applying the unknown policy.
    pub fn token_for_event(&self, event: &Event) -> Result<String> {
        match self.vocab.match_event(event) {
            EventMatch::Token(token) => Ok(token),
            EventMatch::UnknownCode => Ok(self.unk_token.clone()),
            EventMatch::NoMatchingPartition => match self.policy {
                UnknownPolicy::MapToUnk => Ok(self.unk_token.clone()),
                UnknownPolicy::Strict => Err(EhrTokError::NoMatchingPartition {
                    code: event.code.clone(),
                    detail: format!(
                        "value {:?} with unit {:?} matches no configured partition",
                        event.value, event.unit
                    ),
                }),
            },
        }
    }

    /// Maps a patient's chronological event sequence to token strings.
    pub fn encode_events(&self, events: &[Event]) -> Result<Vec<String>> {
        events
            .iter()
            .map(|event| self.token_for_event(event))
            .collect()
    }

    /// Projected token count for one patient, used for batch-budget accounting.
    pub fn projected_length(&self, events: &[Event]) -> Result<usize> {
        // Every event yields exactly one token under both policies, so the
        // length equals the event count unless a strict mismatch aborts.
        if self.policy == UnknownPolicy::Strict {
            for event in events {
                self.token_for_event(event)?;
            }
        }
        Ok(events.len())
    }

    /// Projected token counts for a full dataset split, computed in parallel.
    pub fn lengths_for_patients(&self, timelines: &[Vec<Event>]) -> Result<Vec<usize>> {
        timelines
            .par_iter()
            .map(|events| self.projected_length(events))
            .collect()
    }
}
