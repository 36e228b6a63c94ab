//! Persistence for the tokenizer vocabulary document.
//!
//! The on-disk format is a JSON object with two top-level keys: `metadata`
//! (opaque build parameters carried through untouched) and `tokens` (ordered
//! entry list). Order is preserved on round-trip for deterministic diffing.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EhrTokError, Result};
use crate::tokens::TokenEntry;

/// Top-level persisted vocabulary: opaque metadata plus the ordered entry list.
#[must_use]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Opaque vocabulary build context (parameters, version).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Ordered vocabulary entries.
    pub tokens: Vec<TokenEntry>,
}

impl TokenizerConfig {
    /// Creates a config from an entry list and metadata object.
    pub fn new(tokens: Vec<TokenEntry>, metadata: Map<String, Value>) -> Self {
        Self { metadata, tokens }
    }

    /// Writes the config to `path` as pretty-printed JSON.
    ///
    /// Every entry and nested stat is serialized with its `type`
    /// discriminator so the document can be reconstructed unambiguously.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)
            .map_err(|err| EhrTokError::io(err, Some(path.as_ref().to_path_buf())))
    }

    /// Reads a config back from `path`.
    ///
    /// An unrecognised `type` discriminator on an entry or stat is a fatal
    /// [`EhrTokError::Serialization`]; the vocabulary is load-bearing for
    /// model correctness, so malformed entries are never silently dropped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|err| EhrTokError::io(err, Some(path.as_ref().to_path_buf())))?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            EhrTokError::Serialization(format!(
                "failed to parse tokenizer config {:?}: {err}",
                path.as_ref()
            ))
        })?;
        info!(
            "loaded tokenizer config with {} entries from {:?}",
            config.tokens.len(),
            path.as_ref()
        );
        Ok(config)
    }
}
