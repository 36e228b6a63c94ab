//! Tokenizer vocabulary and length-aware batch sampling for EHR foundation
//! models trained as causal language models.
//!
//! Patients are chronological sequences of clinical [`Event`]s which must be
//! mapped onto a fixed token vocabulary ([`TokenizerConfig`] entries covering
//! plain codes, numeric range bins, and categorical bins) and then packed
//! into training batches that bound both padding waste and the absolute token
//! budget per batch ([`SortishSampler`] + [`ApproxBatchSampler`]).
//!
//! ```
//! use ehrtok::{
//!     ApproxBatchSampler, ClinicalTokenizer, Event, SamplerConfig, SortishSampler, TokenEntry,
//!     Vocabulary,
//! };
//!
//! # fn main() -> ehrtok::Result<()> {
//! let entries = vec![TokenEntry::Code {
//!     code: "SNOMED/3950001".into(),
//!     description: None,
//!     stats: Vec::new(),
//! }];
//! let tokenizer = ClinicalTokenizer::new(Vocabulary::from_entries(&entries)?);
//!
//! let timelines = vec![vec![Event::new("SNOMED/3950001")]; 4];
//! let lengths = tokenizer.lengths_for_patients(&timelines)?;
//!
//! let cfg = SamplerConfig::builder().max_tokens(2).max_length(16).build()?;
//! let sortish = SortishSampler::new(lengths, &cfg)?;
//! let batches = ApproxBatchSampler::new(sortish, &cfg)?.batches(0);
//! assert_eq!(batches.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature. Users targeting
//! the library portion only can disable default features:
//! `ehrtok = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod event;
pub mod sampler;
pub mod store;
pub mod timelines;
pub mod tokenizer;
pub mod tokens;
pub mod vocab;

pub use config::{SamplerBuilder, SamplerConfig, TimelineBuilder, TimelineConfig};
pub use error::{EhrTokError, Result};
pub use event::{Event, EventValue};
pub use sampler::{ApproxBatchSampler, BatchIter, SortishSampler};
pub use store::TokenizerConfig;
pub use tokenizer::{ClinicalTokenizer, UnknownPolicy, DEFAULT_UNK_TOKEN};
pub use tokens::{CategorySet, NumericRange, StatKind, StatQuery, TokenEntry, TokenStat};
pub use vocab::{EventMatch, Vocabulary};
