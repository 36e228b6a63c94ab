//! Configuration builders controlling batch sampling and timeline ingestion.

use serde::{Deserialize, Serialize};

use crate::error::{EhrTokError, Result};

/// Configuration for length-aware batch sampling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Number of length-sorted patient indices per shuffle bucket.
    pub bucket_size: usize,
    /// Soft aggregate token budget per batch.
    pub max_tokens: usize,
    /// Hard per-sequence truncation length applied before budget accounting.
    pub max_length: usize,
    /// Randomly permutes the emission order of buckets each epoch.
    pub shuffle_across_buckets: bool,
    /// Randomly permutes indices inside each bucket each epoch.
    pub shuffle_within_buckets: bool,
    /// Number of distributed replicas the batch list will be sharded across.
    pub n_replicas: usize,
    /// Base RNG seed; combined with the epoch for deterministic shuffling.
    pub seed: u64,
}

impl SamplerConfig {
    /// Returns a builder initialised with [`SamplerConfig::default`].
    #[must_use]
    pub fn builder() -> SamplerBuilder {
        SamplerBuilder::default()
    }

    /// Returns a deterministic variant of this config (both shuffles off,
    /// single-index buckets), the configuration used for validation and test
    /// splits so their batch order is reproducible.
    #[must_use]
    pub fn deterministic(mut self) -> Self {
        self.bucket_size = 1;
        self.shuffle_across_buckets = false;
        self.shuffle_within_buckets = false;
        self
    }

    /// Validates the invariants required for sampling.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_size == 0 {
            return Err(EhrTokError::InvalidConfig(
                "bucket_size must be greater than zero".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(EhrTokError::InvalidConfig(
                "max_tokens must be greater than zero".into(),
            ));
        }
        if self.max_length == 0 {
            return Err(EhrTokError::InvalidConfig(
                "max_length must be greater than zero".into(),
            ));
        }
        if self.n_replicas == 0 {
            return Err(EhrTokError::InvalidConfig(
                "n_replicas must be at least one".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            bucket_size: 100,
            max_tokens: 16_384,
            max_length: 1024,
            shuffle_across_buckets: true,
            shuffle_within_buckets: true,
            n_replicas: 1,
            seed: 1,
        }
    }
}

/// Builder for [`SamplerConfig`].
#[derive(Debug, Default, Clone)]
pub struct SamplerBuilder {
    cfg: SamplerConfig,
}

impl SamplerBuilder {
    /// Creates a builder with [`SamplerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shuffle bucket size.
    #[must_use]
    pub fn bucket_size(mut self, value: usize) -> Self {
        self.cfg.bucket_size = value;
        self
    }

    /// Sets the per-batch token budget.
    #[must_use]
    pub fn max_tokens(mut self, value: usize) -> Self {
        self.cfg.max_tokens = value;
        self
    }

    /// Sets the per-sequence truncation ceiling.
    #[must_use]
    pub fn max_length(mut self, value: usize) -> Self {
        self.cfg.max_length = value;
        self
    }

    /// Enables or disables across-bucket shuffling.
    #[must_use]
    pub fn shuffle_across_buckets(mut self, enabled: bool) -> Self {
        self.cfg.shuffle_across_buckets = enabled;
        self
    }

    /// Enables or disables within-bucket shuffling.
    #[must_use]
    pub fn shuffle_within_buckets(mut self, enabled: bool) -> Self {
        self.cfg.shuffle_within_buckets = enabled;
        self
    }

    /// Sets the distributed replica count.
    #[must_use]
    pub fn n_replicas(mut self, value: usize) -> Self {
        self.cfg.n_replicas = value;
        self
    }

    /// Sets the base RNG seed.
    #[must_use]
    pub fn seed(mut self, value: u64) -> Self {
        self.cfg.seed = value;
        self
    }

    /// Finalises the builder, returning a validated [`SamplerConfig`].
    pub fn build(self) -> Result<SamplerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how timeline files are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}

impl TimelineConfig {
    /// Returns a builder initialised with [`TimelineConfig::default`].
    #[must_use]
    pub fn builder() -> TimelineBuilder {
        TimelineBuilder::default()
    }
}

/// Builder for [`TimelineConfig`].
#[derive(Debug, Default, Clone)]
pub struct TimelineBuilder {
    cfg: TimelineConfig,
}

impl TimelineBuilder {
    /// Creates a new builder with [`TimelineConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Finalises the builder, returning the [`TimelineConfig`].
    pub fn build(self) -> TimelineConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_validated_config() {
        let cfg = SamplerConfig::builder()
            .bucket_size(64)
            .max_tokens(2048)
            .max_length(512)
            .seed(7)
            .build()
            .expect("config should be valid");
        assert_eq!(cfg.bucket_size, 64);
        assert_eq!(cfg.max_tokens, 2048);
        assert_eq!(cfg.max_length, 512);
        assert_eq!(cfg.seed, 7);
    }

    #[test]
    fn validate_rejects_zero_bucket_size() {
        let err = SamplerConfig::builder()
            .bucket_size(0)
            .build()
            .expect_err("validation should fail");
        assert!(matches!(
            err,
            EhrTokError::InvalidConfig(message) if message.contains("bucket_size")
        ));
    }

    #[test]
    fn validate_rejects_zero_budgets_and_replicas() {
        assert!(SamplerConfig::builder().max_tokens(0).build().is_err());
        assert!(SamplerConfig::builder().max_length(0).build().is_err());
        assert!(SamplerConfig::builder().n_replicas(0).build().is_err());
    }

    #[test]
    fn deterministic_turns_off_all_shuffling() {
        let cfg = SamplerConfig::default().deterministic();
        assert_eq!(cfg.bucket_size, 1);
        assert!(!cfg.shuffle_across_buckets);
        assert!(!cfg.shuffle_within_buckets);
    }

    #[test]
    fn timeline_builder_overrides_defaults() {
        let cfg = TimelineConfig::builder()
            .recursive(false)
            .follow_symlinks(true)
            .build();
        assert!(!cfg.recursive);
        assert!(cfg.follow_symlinks);
    }
}
