//! Length-aware patient ordering and token-budgeted batch construction.
//!
//! [`SortishSampler`] produces a deterministic-given-seed, epoch-varying
//! permutation of patient indices that clusters similar-length patients to
//! minimise padding. [`ApproxBatchSampler`] consumes that ordering and
//! greedily groups indices into batches bounded by a per-batch token budget,
//! with per-sequence lengths clipped to the truncation ceiling first.
//!
//! Both samplers are constructed once per epoch per split on a coordinating
//! process; every replica seeds the same RNG from `(seed, epoch)` and derives
//! the identical global batch list without coordination, then takes its own
//! round-robin shard.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::SamplerConfig;
use crate::error::{EhrTokError, Result};

/// Length-aware, partially randomised permutation generator over patient
/// indices `0..N`.
#[must_use]
#[derive(Debug, Clone)]
pub struct SortishSampler {
    lengths: Vec<usize>,
    bucket_size: usize,
    shuffle_across_buckets: bool,
    shuffle_within_buckets: bool,
    n_replicas: usize,
    seed: u64,
}

impl SortishSampler {
    /// Creates a sampler over per-patient projected token lengths, indexed by
    /// patient position within the split.
    pub fn new(lengths: Vec<usize>, cfg: &SamplerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            lengths,
            bucket_size: cfg.bucket_size,
            shuffle_across_buckets: cfg.shuffle_across_buckets,
            shuffle_within_buckets: cfg.shuffle_within_buckets,
            n_replicas: cfg.n_replicas,
            seed: cfg.seed,
        })
    }

    /// Number of patients covered by the sampler.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Returns whether the sampler covers no patients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Projected token length for one patient index.
    #[must_use]
    pub fn length_of(&self, index: usize) -> usize {
        self.lengths[index]
    }

    /// Replica count recorded for downstream batch sharding; the sampler
    /// itself always emits the full pre-split ordering.
    #[must_use]
    pub fn n_replicas(&self) -> usize {
        self.n_replicas
    }

    /// Produces one full permutation of all patient indices for `epoch`.
    ///
    /// Indices are stably sorted by length ascending (ties keep original
    /// index order), partitioned into contiguous buckets of `bucket_size`,
    /// then optionally shuffled within each bucket and across buckets. With
    /// both shuffles off the result is exactly the global length-sorted
    /// order, the deterministic configuration used for validation and test.
    #[must_use]
    pub fn ordering(&self, epoch: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.lengths.len()).collect();
        indices.sort_by_key(|&i| self.lengths[i]);

        if !self.shuffle_within_buckets && !self.shuffle_across_buckets {
            return indices;
        }

        let mut rng = self.epoch_rng(epoch);
        if self.shuffle_within_buckets {
            for bucket in indices.chunks_mut(self.bucket_size) {
                bucket.shuffle(&mut rng);
            }
        }
        if self.shuffle_across_buckets {
            let mut buckets: Vec<Vec<usize>> = indices
                .chunks(self.bucket_size)
                .map(<[usize]>::to_vec)
                .collect();
            buckets.shuffle(&mut rng);
            indices = buckets.concat();
        }
        indices
    }

    /// Lazy view over the epoch's permutation.
    pub fn iter(&self, epoch: u64) -> impl Iterator<Item = usize> {
        self.ordering(epoch).into_iter()
    }

    fn epoch_rng(&self, epoch: u64) -> StdRng {
        // Golden-ratio multiplier spreads consecutive epochs across the seed
        // space so epoch N and N+1 orderings are uncorrelated.
        StdRng::seed_from_u64(self.seed ^ epoch.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }
}

/// Greedy streaming batcher over the sortish ordering.
///
/// Each incoming index contributes `min(length, max_length)` tokens; a batch
/// closes when the next index would push the running total past `max_tokens`.
/// A single patient whose clipped length alone exceeds the budget is emitted
/// as a singleton overflow batch rather than dropped.
#[must_use]
#[derive(Debug, Clone)]
pub struct ApproxBatchSampler {
    sortish: SortishSampler,
    max_length: usize,
    max_tokens: usize,
}

impl ApproxBatchSampler {
    /// Creates a batch sampler over the given ordering source.
    pub fn new(sortish: SortishSampler, cfg: &SamplerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            sortish,
            max_length: cfg.max_length,
            max_tokens: cfg.max_tokens,
        })
    }

    /// Provides access to the underlying ordering sampler.
    #[must_use]
    pub fn sortish(&self) -> &SortishSampler {
        &self.sortish
    }

    /// Clipped length used for budget accounting of one patient index.
    #[must_use]
    pub fn clipped_length(&self, index: usize) -> usize {
        self.sortish.length_of(index).min(self.max_length)
    }

    /// Lazily yields the epoch's batches in consumption order.
    pub fn iter(&self, epoch: u64) -> BatchIter<'_> {
        BatchIter {
            sampler: self,
            ordering: self.sortish.ordering(epoch).into_iter(),
            current: Vec::new(),
            current_tokens: 0,
        }
    }

    /// Collects the epoch's full batch list.
    #[must_use]
    pub fn batches(&self, epoch: u64) -> Vec<Vec<usize>> {
        self.iter(epoch).collect()
    }

    /// Returns this replica's round-robin shard of the epoch's batch list.
    ///
    /// Every replica computes the identical global list from the shared seed,
    /// so sharding needs no inter-process coordination.
    pub fn replica_batches(&self, epoch: u64, replica: usize) -> Result<Vec<Vec<usize>>> {
        let n_replicas = self.sortish.n_replicas();
        if replica >= n_replicas {
            return Err(EhrTokError::InvalidConfig(format!(
                "replica id {replica} out of range for {n_replicas} replicas"
            )));
        }
        Ok(self
            .batches(epoch)
            .into_iter()
            .skip(replica)
            .step_by(n_replicas)
            .collect())
    }
}

/// Streaming iterator over an epoch's batches.
#[derive(Debug)]
pub struct BatchIter<'a> {
    sampler: &'a ApproxBatchSampler,
    ordering: std::vec::IntoIter<usize>,
    current: Vec<usize>,
    current_tokens: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        for index in self.ordering.by_ref() {
            let clipped = self.sampler.clipped_length(index);
            if self.current.is_empty() && clipped > self.sampler.max_tokens {
                // Unavoidable overflow: never drop a patient.
                return Some(vec![index]);
            }
            if self.current_tokens + clipped <= self.sampler.max_tokens {
                self.current.push(index);
                self.current_tokens += clipped;
            } else {
                let full = std::mem::replace(&mut self.current, vec![index]);
                self.current_tokens = clipped;
                return Some(full);
            }
        }
        if self.current.is_empty() {
            None
        } else {
            self.current_tokens = 0;
            Some(std::mem::take(&mut self.current))
        }
    }
}
