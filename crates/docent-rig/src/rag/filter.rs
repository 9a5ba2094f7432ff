//! Relevance filtering.
//!
//! Converts raw store distances into similarities with the store's
//! [`DistanceMetric`], keeps the hits at or above the threshold and decides
//! whether the query can be answered from context at all.

use docent_vector::{DistanceMetric, QueryMatch};
use serde::{Deserialize, Serialize};

use super::chunk::Chunk;
use crate::{Error, RagConfig, Result, TRACING_TARGET_FILTER as TRACING_TARGET};

/// Minimum similarity in `[0.0, 1.0]` for a hit to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// Creates a threshold, rejecting values outside `[0.0, 1.0]` and NaN.
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::config(format!(
                "similarity threshold must be within [0.0, 1.0], got {value}"
            )))
        }
    }

    /// Returns the threshold value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Returns true if the similarity clears the threshold.
    pub fn accepts(self, similarity: f64) -> bool {
        similarity >= self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        threshold.0
    }
}

/// A retrieved chunk with its raw distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Raw distance under the store metric (lower is closer).
    pub distance: f64,
}

impl From<QueryMatch> for RetrievalHit {
    fn from(record: QueryMatch) -> Self {
        let distance = record.distance;
        Self {
            chunk: record.into(),
            distance,
        }
    }
}

/// A retrieval hit with its similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    /// The retrieval hit.
    pub hit: RetrievalHit,
    /// Similarity in `[0.0, 1.0]`, 1.0 meaning identical.
    pub similarity: f64,
}

impl ScoredHit {
    /// Returns the chunk.
    pub fn chunk(&self) -> &Chunk {
        &self.hit.chunk
    }

    /// Returns the raw distance.
    pub fn distance(&self) -> f64 {
        self.hit.distance
    }
}

/// Outcome of filtering one query's hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDecision {
    /// Hits at or above the threshold, in retrieval order.
    pub accepted_hits: Vec<ScoredHit>,
    /// Hits below the threshold, in retrieval order.
    pub rejected_hits: Vec<ScoredHit>,
    /// True iff at least one hit was accepted.
    pub is_answerable: bool,
}

/// Decides which retrieved chunks are relevant enough to answer from.
///
/// The filter is a pure function of its inputs: the same hits always give
/// the same decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    metric: DistanceMetric,
    threshold: Threshold,
    debug_similarity: bool,
}

impl RelevanceFilter {
    /// Creates a filter for a store using `metric`.
    pub fn new(metric: DistanceMetric, threshold: Threshold) -> Self {
        Self {
            metric,
            threshold,
            debug_similarity: false,
        }
    }

    /// Creates a filter from the retrieval configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Ok(Self::new(
            config.distance_metric,
            Threshold::new(config.similarity_threshold)?,
        )
        .with_debug_similarity(config.debug_similarity))
    }

    /// Enables the per-hit similarity report.
    pub fn with_debug_similarity(mut self, enabled: bool) -> Self {
        self.debug_similarity = enabled;
        self
    }

    /// Returns the threshold.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Returns the metric used for the similarity mapping.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Converts a raw distance into a similarity.
    pub fn similarity(&self, distance: f64) -> f64 {
        self.metric.similarity(distance)
    }

    /// Scores hits without filtering them. Order is preserved.
    pub fn score(&self, hits: Vec<RetrievalHit>) -> Vec<ScoredHit> {
        hits.into_iter()
            .map(|hit| ScoredHit {
                similarity: self.similarity(hit.distance),
                hit,
            })
            .collect()
    }

    /// Filters hits ordered nearest first.
    ///
    /// Accepted hits keep their retrieval order; nothing is re-sorted, so
    /// ties stay in distance order.
    pub fn filter(&self, hits: Vec<RetrievalHit>) -> RetrievalDecision {
        self.filter_with(hits, self.debug_similarity)
    }

    /// Filters hits and always emits the per-hit report.
    pub fn explain(&self, hits: Vec<RetrievalHit>) -> RetrievalDecision {
        self.filter_with(hits, true)
    }

    fn filter_with(&self, hits: Vec<RetrievalHit>, report: bool) -> RetrievalDecision {
        let total = hits.len();
        let (accepted_hits, rejected_hits): (Vec<_>, Vec<_>) = self
            .score(hits)
            .into_iter()
            .partition(|scored| self.threshold.accepts(scored.similarity));

        let decision = RetrievalDecision {
            is_answerable: !accepted_hits.is_empty(),
            accepted_hits,
            rejected_hits,
        };

        if report {
            self.report(&decision);
        }

        tracing::debug!(
            target: TRACING_TARGET,
            total = %total,
            accepted = %decision.accepted_hits.len(),
            threshold = %self.threshold.value(),
            answerable = %decision.is_answerable,
            "Relevance filter applied"
        );

        decision
    }

    /// Emits one event per hit. Reads the decision, never changes it.
    fn report(&self, decision: &RetrievalDecision) {
        let verdicts = decision
            .accepted_hits
            .iter()
            .map(|hit| (hit, true))
            .chain(decision.rejected_hits.iter().map(|hit| (hit, false)));

        for (scored, accepted) in verdicts {
            tracing::debug!(
                target: TRACING_TARGET,
                source = %scored.chunk().source,
                chunk_index = %scored.chunk().chunk_index,
                distance = %scored.distance(),
                similarity = %scored.similarity,
                accepted = %accepted,
                "Similarity"
            );
        }
    }
}
