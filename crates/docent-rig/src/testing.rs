//! Scripted collaborators for unit tests.
//!
//! Every fake counts its calls so tests can assert that an upstream service
//! was never reached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docent_vector::{
    DistanceMetric, MetadataFilter, QueryMatch, StoredRecord, VectorError, VectorRecord,
    VectorResult, VectorStoreBackend,
};
use serde_json::Value;

use crate::provider::{Embedder, FragmentStream, LanguageModel};
use crate::rag::{CHUNK_INDEX_KEY, ChunkKind, KIND_KEY, SOURCE_KEY};
use crate::{Error, Result};

/// Embedder returning a deterministic non-zero vector per text.
#[derive(Clone)]
pub struct ScriptedEmbedder {
    dims: usize,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every call fail as if the service were down.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::upstream("embedder", "connection refused"));
        }

        let seed = text.bytes().map(usize::from).sum::<usize>();
        Ok((0..self.dims)
            .map(|i| ((seed + i) % 10 + 1) as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Store backend that answers every query with the same scripted matches.
#[derive(Clone)]
pub struct ScriptedStore {
    metric: DistanceMetric,
    matches: Vec<QueryMatch>,
    fail: bool,
    queries: Arc<AtomicUsize>,
    last_limit: Arc<AtomicUsize>,
}

impl ScriptedStore {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            matches: Vec::new(),
            fail: false,
            queries: Arc::new(AtomicUsize::new(0)),
            last_limit: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds a PDF chunk match at `distance`. Matches are returned in the
    /// order they were added.
    pub fn with_match(mut self, source: &str, index: usize, content: &str, distance: f64) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::from(source));
        metadata.insert(KIND_KEY.to_string(), Value::from(ChunkKind::Pdf.as_ref()));
        metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(index));

        self.matches.push(QueryMatch {
            id: format!("{source}_{index}"),
            document: content.to_string(),
            metadata,
            distance,
        });
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> usize {
        self.last_limit.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStoreBackend for ScriptedStore {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, _records: Vec<VectorRecord>) -> VectorResult<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], limit: usize) -> VectorResult<Vec<QueryMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        if self.fail {
            return Err(VectorError::connection("store is down"));
        }
        Ok(self.matches.iter().take(limit).cloned().collect())
    }

    async fn get(&self, _ids: &[String]) -> VectorResult<Vec<StoredRecord>> {
        Ok(Vec::new())
    }

    async fn scan(&self, _limit: Option<usize>) -> VectorResult<Vec<StoredRecord>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _ids: &[String]) -> VectorResult<usize> {
        Ok(0)
    }

    async fn delete_where(&self, _filter: &MetadataFilter) -> VectorResult<usize> {
        Ok(0)
    }

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.matches.len())
    }
}

/// Language model replaying scripted fragments.
#[derive(Clone)]
pub struct ScriptedModel {
    fragments: Vec<String>,
    fail_on_start: bool,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
    released: Arc<AtomicBool>,
}

impl ScriptedModel {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_on_start: false,
            fail_after: None,
            stall_after: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fails before producing anything.
    pub fn failing(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    /// Streams `n` fragments, then yields an error.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Streams `n` fragments, then never produces anything again.
    pub fn stalling_after(mut self, n: usize) -> Self {
        self.stall_after = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    /// True once a stream handed out by this model has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn record(&self, prompt: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        if self.fail_on_start {
            return Err(Error::generation("model refused the request"));
        }
        Ok(())
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.record(prompt)?;
        if self.fail_after.is_some() {
            return Err(Error::generation("model crashed"));
        }
        if self.stall_after.is_some() {
            futures::future::pending::<()>().await;
        }
        Ok(self.fragments.concat())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.record(prompt)?;

        let fragments = self.fragments.clone();
        let fail_after = self.fail_after;
        let stall_after = self.stall_after;
        let guard = ReleaseGuard(self.released.clone());

        let stream = async_stream::stream! {
            let _guard = guard;
            for (i, fragment) in fragments.into_iter().enumerate() {
                if fail_after == Some(i) {
                    yield Err(Error::generation("model crashed"));
                    return;
                }
                if stall_after == Some(i) {
                    futures::future::pending::<()>().await;
                }
                yield Ok(fragment);
            }
            if fail_after.is_some() {
                yield Err(Error::generation("model crashed"));
            }
            if stall_after.is_some() {
                futures::future::pending::<()>().await;
            }
        };

        Ok(Box::pin(stream))
    }
}
