//! In-process brute-force vector store.
//!
//! Scores every stored vector against the query. Suitable for local use and
//! knowledge bases of a few tens of thousands of chunks.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{VectorError, VectorResult};
use crate::metric::DistanceMetric;
use crate::store::{MetadataFilter, QueryMatch, StoredRecord, VectorRecord, VectorStoreBackend};

/// In-memory backend.
///
/// Records keep their first-insertion position across upserts, so ties in
/// distance resolve in insertion order.
pub struct MemoryBackend {
    metric: DistanceMetric,
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    dimensions: Option<usize>,
    records: Vec<VectorRecord>,
}

impl MemoryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn check_dimensions(&self, actual: usize) -> VectorResult<()> {
        check_dimensions(self.dimensions, actual)
    }

    fn retain(&mut self, keep: impl Fn(&VectorRecord) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(keep);
        if self.records.is_empty() {
            self.dimensions = None;
        }
        before - self.records.len()
    }
}

impl MemoryBackend {
    /// Creates an empty store with the given metric.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn check_dimensions(expected: Option<usize>, actual: usize) -> VectorResult<()> {
    match expected {
        Some(expected) if expected != actual => {
            Err(VectorError::dimension_mismatch(expected, actual))
        }
        _ => Ok(()),
    }
}

fn stored(record: &VectorRecord) -> StoredRecord {
    StoredRecord {
        id: record.id.clone(),
        document: record.document.clone(),
        metadata: record.metadata.clone(),
    }
}

#[async_trait]
impl VectorStoreBackend for MemoryBackend {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;

        // The whole batch is validated before the store is touched.
        let mut dimensions = state.dimensions;
        for record in &records {
            check_dimensions(dimensions, record.vector.len())?;
            if record.vector.iter().any(|v| !v.is_finite()) {
                return Err(VectorError::backend(format!(
                    "vector for '{}' contains non-finite values",
                    record.id
                )));
            }
            dimensions.get_or_insert(record.vector.len());
        }

        state.dimensions = dimensions;
        for record in records {
            match state.position(&record.id) {
                Some(idx) => state.records[idx] = record,
                None => state.records.push(record),
            }
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> VectorResult<Vec<QueryMatch>> {
        let state = self.state.read().await;
        if state.records.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        state.check_dimensions(vector.len())?;

        let mut scored: Vec<(f64, &VectorRecord)> = state
            .records
            .iter()
            .map(|record| (self.metric.distance(vector, &record.vector), record))
            .collect();

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(distance, record)| QueryMatch {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn get(&self, ids: &[String]) -> VectorResult<Vec<StoredRecord>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.position(id).map(|idx| stored(&state.records[idx])))
            .collect())
    }

    async fn scan(&self, limit: Option<usize>) -> VectorResult<Vec<StoredRecord>> {
        let state = self.state.read().await;
        let limit = limit.unwrap_or(state.records.len());
        Ok(state.records.iter().take(limit).map(stored).collect())
    }

    async fn delete(&self, ids: &[String]) -> VectorResult<usize> {
        let mut state = self.state.write().await;
        Ok(state.retain(|record| !ids.contains(&record.id)))
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> VectorResult<usize> {
        let mut state = self.state.write().await;
        Ok(state.retain(|record| !filter.matches(&record.metadata)))
    }

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.state.read().await.records.len())
    }
}
