//! Session store: the flat index and its metadata as one lock-guarded unit.
//!
//! Vector `i` and metadata record `i` describe the same chunk. That positional
//! link is only ever extended through [`SessionStore::add_batch`], which
//! appends both sides under one write lock, so readers never observe the two
//! sequences at different lengths.

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SessionError};
use crate::flat_index::FlatIndex;
use crate::metadata::{MetadataRecord, MetadataStore};
use crate::persistence::SessionFiles;
use crate::vector::{Vector, NORM_TOLERANCE};
use serde::Serialize;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Origin of one text in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSource {
    pub document_name: String,
    /// 1-based page number.
    pub page_number: u32,
}

impl ChunkSource {
    pub fn new(document_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            document_name: document_name.into(),
            page_number,
        }
    }
}

/// Result of [`SessionStore::add_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub added: usize,
    pub total: usize,
}

/// A ranked search result. The record is a copy; stored metadata cannot be
/// reached through it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: MetadataRecord,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No vectors; dimension unset.
    Empty,
    /// At least one vector; dimension fixed until the next clear.
    Populated,
}

#[derive(Debug, Default)]
struct SessionState {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl SessionState {
    // index.add validates the whole batch before touching the buffer, and the
    // metadata append cannot fail, so either both sides grow or neither does.
    fn append(&mut self, vectors: &[Vector], records: Vec<MetadataRecord>) -> Result<()> {
        self.index.add(vectors)?;
        self.metadata.append(records);
        Ok(())
    }

    fn reset(&mut self) {
        self.index.clear();
        self.metadata.clear();
    }
}

/// The process-wide document session.
#[derive(Debug)]
pub struct SessionStore {
    files: SessionFiles,
    state: RwLock<SessionState>,
}

impl SessionStore {
    /// Create an empty session persisting to `dir`. Nothing is read from disk.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            files: SessionFiles::new(dir),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Reload the session persisted in `dir`, or start empty if there is none.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let files = SessionFiles::new(dir);
        let state = match files.load()? {
            Some(loaded) => SessionState {
                index: FlatIndex::from_buffer(loaded.vectors),
                metadata: MetadataStore::from_records(loaded.records),
            },
            None => SessionState::default(),
        };
        info!(
            dir = %files.dir().display(),
            total = state.index.len(),
            "session opened"
        );
        Ok(Self {
            files,
            state: RwLock::new(state),
        })
    }

    /// Reset to the empty state in memory. Persisted files are left alone.
    pub fn init(&self) {
        self.write_recovering().reset();
        debug!("session initialized");
    }

    /// Embed `texts` and append them with their sources, then persist.
    ///
    /// An empty `texts` is a no-op. Validation and dimension errors reject the
    /// whole batch before anything is stored. If only the final persistence
    /// step fails, the batch stays in memory and the error is returned.
    pub fn add_batch(
        &self,
        texts: &[String],
        sources: &[ChunkSource],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<BatchOutcome> {
        if texts.is_empty() {
            let total = self.len()?;
            debug!(total, "empty batch ignored");
            return Ok(BatchOutcome { added: 0, total });
        }
        if texts.len() != sources.len() {
            return Err(SessionError::BatchLengthMismatch {
                texts: texts.len(),
                sources: sources.len(),
            });
        }
        if let Some(bad) = sources.iter().find(|s| s.page_number == 0) {
            return Err(SessionError::InvalidRecord {
                reason: format!("page numbers start at 1 (document {})", bad.document_name),
            });
        }

        // Encoding does not touch session state; keep it outside the lock.
        let vectors = embedder.encode(texts)?;
        check_embeddings(&vectors, texts.len())?;

        let records: Vec<MetadataRecord> = texts
            .iter()
            .zip(sources)
            .map(|(text, source)| {
                MetadataRecord::new(source.document_name.clone(), source.page_number, text.clone())
            })
            .collect();

        let mut state = self.write()?;
        state.append(&vectors, records)?;
        let outcome = BatchOutcome {
            added: texts.len(),
            total: state.index.len(),
        };
        info!(added = outcome.added, total = outcome.total, "batch added to session");

        if let Err(e) = self
            .files
            .save(state.index.buffer(), state.metadata.records())
        {
            error!(error = %e, total = outcome.total, "failed to persist session; in-memory state kept");
            return Err(e);
        }
        Ok(outcome)
    }

    /// Rank stored chunks by cosine similarity to `query_text`.
    pub fn search(
        &self,
        query_text: &str,
        top_k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit>> {
        if self.is_empty()? {
            return Ok(vec![]);
        }
        if top_k == 0 {
            return Err(SessionError::InvalidTopK);
        }

        let mut encoded = embedder.encode(&[query_text.to_string()])?;
        check_embeddings(&encoded, 1)?;
        let query = encoded.swap_remove(0);

        self.search_by_vector(&query, top_k)
    }

    /// Rank stored chunks against an already-normalized query vector.
    pub fn search_by_vector(&self, query: &Vector, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(SessionError::InvalidTopK);
        }

        let state = self.read()?;
        let ranked = state.index.search(query, top_k)?;

        let hits = ranked
            .into_iter()
            .map(|(index, score)| {
                let record = state.metadata.get(index).map_err(|e| {
                    error!(index, error = %e, "ranked vector has no metadata record");
                    e
                })?;
                Ok(SearchHit {
                    record: record.clone(),
                    score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(top_k, returned = hits.len(), "session searched");
        Ok(hits)
    }

    /// Discard everything in memory and delete the persisted files.
    ///
    /// The in-memory reset always happens. A failed delete is returned as a
    /// persistence error after the reset.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.write_recovering();
        state.reset();

        match self.files.delete() {
            Ok(()) => {
                info!(dir = %self.files.dir().display(), "session cleared");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session cleared in memory but persisted files remain");
                Err(e)
            }
        }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Dimension fixed by the first batch, or `None` while empty.
    pub fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.read()?.index.dimension())
    }

    pub fn phase(&self) -> Result<SessionPhase> {
        Ok(if self.is_empty()? {
            SessionPhase::Empty
        } else {
            SessionPhase::Populated
        })
    }

    /// `(vector count, metadata count)` read under one lock.
    pub fn sizes(&self) -> Result<(usize, usize)> {
        let state = self.read()?;
        Ok((state.index.len(), state.metadata.size()))
    }

    pub fn dir(&self) -> &Path {
        self.files.dir()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SessionState>> {
        self.state.read().map_err(|_| SessionError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SessionState>> {
        self.state.write().map_err(|_| SessionError::LockPoisoned)
    }

    // init and clear replace the whole state, so a poisoned lock is safe to reuse.
    fn write_recovering(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_embeddings(vectors: &[Vector], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(SessionError::Embedding(format!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    if let Some((position, v)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_unit(NORM_TOLERANCE))
    {
        return Err(SessionError::NotNormalized {
            position,
            norm: v.norm(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Embedder returning fixed vectors for known texts.
    struct TableEmbedder {
        dim: usize,
        table: HashMap<String, Vec<f32>>,
    }

    impl TableEmbedder {
        fn new(dim: usize, entries: &[(&str, &[f32])]) -> Self {
            Self {
                dim,
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
            }
        }
    }

    impl EmbeddingProvider for TableEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vector>> {
            texts
                .iter()
                .map(|t| {
                    let raw = self
                        .table
                        .get(t)
                        .ok_or_else(|| SessionError::Embedding(format!("unknown text {}", t)))?;
                    Vector::new(raw.clone()).normalized()
                })
                .collect()
        }
    }

    struct RawEmbedder(Vec<f32>);

    impl EmbeddingProvider for RawEmbedder {
        fn dimension(&self) -> usize {
            self.0.len()
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vector>> {
            Ok(texts.iter().map(|_| Vector::new(self.0.clone())).collect())
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sources(n: usize) -> Vec<ChunkSource> {
        (0..n).map(|i| ChunkSource::new("doc.pdf", i as u32 + 1)).collect()
    }

    #[test]
    fn test_add_batch_counts() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(32).unwrap();

        let first = store.add_batch(&texts(&["a", "b"]), &sources(2), &e).unwrap();
        assert_eq!(first, BatchOutcome { added: 2, total: 2 });
        let second = store.add_batch(&texts(&["c"]), &sources(1), &e).unwrap();
        assert_eq!(second, BatchOutcome { added: 1, total: 3 });
        assert_eq!(store.phase().unwrap(), SessionPhase::Populated);
        assert_eq!(store.dimension().unwrap(), Some(32));
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();

        let outcome = store.add_batch(&[], &[], &e).unwrap();
        assert_eq!(outcome, BatchOutcome { added: 0, total: 0 });
        assert_eq!(store.phase().unwrap(), SessionPhase::Empty);
        assert!(!store.files.exists());
    }

    #[test]
    fn test_ranking_with_known_vectors() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = TableEmbedder::new(
            2,
            &[
                ("x", &[1.0, 0.0]),
                ("y", &[0.0, 1.0]),
                ("xy", &[1.0, 1.0]),
                ("query", &[1.0, 0.2]),
            ],
        );
        store
            .add_batch(&texts(&["x", "y", "xy"]), &sources(3), &e)
            .unwrap();

        let hits = store.search("query", 2, &e).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.text, "x");
        assert_eq!(hits[1].record.text, "xy");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_tied_scores_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = TableEmbedder::new(2, &[("p", &[1.0, 0.0]), ("q", &[1.0, 0.0]), ("r", &[0.0, 1.0])]);
        store
            .add_batch(&texts(&["r", "p", "q"]), &sources(3), &e)
            .unwrap();

        let hits = store.search("q", 2, &e).unwrap();
        assert_eq!(hits[0].record.text, "p");
        assert_eq!(hits[1].record.text, "q");
        assert_relative_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_self_similarity() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(256).unwrap();
        let items = texts(&[
            "The lease term is twelve months.",
            "Rent is payable on the first of each month.",
            "The security deposit equals one month of rent.",
        ]);
        store.add_batch(&items, &sources(3), &e).unwrap();

        for text in &items {
            let hits = store.search(text, 1, &e).unwrap();
            assert_eq!(&hits[0].record.text, text);
            assert_relative_eq!(hits[0].score, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store
            .add_batch(&texts(&["a", "b"]), &sources(2), &HashingEmbedder::new(16).unwrap())
            .unwrap();

        let result = store.add_batch(&texts(&["c"]), &sources(1), &HashingEmbedder::new(8).unwrap());
        assert!(matches!(
            result,
            Err(SessionError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));
        assert_eq!(store.sizes().unwrap(), (2, 2));
    }

    #[test]
    fn test_unnormalized_embeddings_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let result = store.add_batch(&texts(&["a"]), &sources(1), &RawEmbedder(vec![3.0, 4.0]));
        assert!(matches!(result, Err(SessionError::NotNormalized { position: 0, .. })));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        assert!(matches!(
            store.add_batch(&texts(&["a", "b"]), &sources(1), &e),
            Err(SessionError::BatchLengthMismatch { texts: 2, sources: 1 })
        ));
    }

    #[test]
    fn test_page_zero_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        let result = store.add_batch(&texts(&["a"]), &[ChunkSource::new("d", 0)], &e);
        assert!(matches!(result, Err(SessionError::InvalidRecord { .. })));
    }

    #[test]
    fn test_search_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        assert!(store.search("anything", 5, &e).unwrap().is_empty());
        assert!(store.search("anything", 0, &e).unwrap().is_empty());
    }

    #[test]
    fn test_zero_top_k_on_populated_store() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        store.add_batch(&texts(&["a"]), &sources(1), &e).unwrap();
        assert!(matches!(
            store.search("a", 0, &e),
            Err(SessionError::InvalidTopK)
        ));
    }

    #[test]
    fn test_hits_are_copies() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        store.add_batch(&texts(&["original"]), &sources(1), &e).unwrap();

        let mut hits = store.search("original", 1, &e).unwrap();
        hits[0].record.text.push_str(" (edited)");

        let again = store.search("original", 1, &e).unwrap();
        assert_eq!(again[0].record.text, "original");
    }

    #[test]
    fn test_clear_unsets_dimension_and_deletes_files() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store
            .add_batch(&texts(&["a"]), &sources(1), &HashingEmbedder::new(16).unwrap())
            .unwrap();
        assert!(store.files.exists());

        store.clear().unwrap();
        assert_eq!(store.phase().unwrap(), SessionPhase::Empty);
        assert_eq!(store.dimension().unwrap(), None);
        assert!(!store.files.exists());

        let outcome = store
            .add_batch(&texts(&["b"]), &sources(1), &HashingEmbedder::new(4).unwrap())
            .unwrap();
        assert_eq!(outcome, BatchOutcome { added: 1, total: 1 });
        assert_eq!(store.dimension().unwrap(), Some(4));
    }

    #[test]
    fn test_init_is_idempotent_and_keeps_files() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(8).unwrap();
        store.add_batch(&texts(&["a"]), &sources(1), &e).unwrap();

        store.init();
        store.init();
        assert_eq!(store.sizes().unwrap(), (0, 0));
        assert!(store.files.exists());
    }

    #[test]
    fn test_persistence_failure_keeps_memory() {
        let dir = TempDir::new().unwrap();
        // a regular file where the session directory should be
        let blocker = dir.path().join("session_index");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = SessionStore::new(&blocker);
        let e = HashingEmbedder::new(8).unwrap();
        let err = store.add_batch(&texts(&["kept"]), &sources(1), &e).unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(store.sizes().unwrap(), (1, 1));
        assert_eq!(store.search("kept", 1, &e).unwrap()[0].record.text, "kept");
    }

    #[test]
    fn test_failed_save_leaves_previous_snapshot_loadable() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let e = HashingEmbedder::new(16).unwrap();
        store.add_batch(&texts(&["first"]), &sources(1), &e).unwrap();

        std::fs::create_dir(dir.path().join("metadata.bin.tmp")).unwrap();
        let err = store.add_batch(&texts(&["second"]), &sources(1), &e).unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.sizes().unwrap(), (2, 2));

        let reopened = SessionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.sizes().unwrap(), (1, 1));
        assert_eq!(reopened.search("first", 1, &e).unwrap()[0].record.text, "first");
    }

    #[test]
    fn test_clear_resets_memory_when_delete_fails() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store
            .add_batch(&texts(&["a", "b"]), &sources(2), &HashingEmbedder::new(16).unwrap())
            .unwrap();

        // a non-empty directory where the vectors file should be cannot be removed as a file
        let vectors = dir.path().join("vectors.idx");
        std::fs::remove_file(&vectors).unwrap();
        std::fs::create_dir(&vectors).unwrap();
        std::fs::write(vectors.join("keep"), b"x").unwrap();

        let err = store.clear().unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.sizes().unwrap(), (0, 0));
        assert_eq!(store.dimension().unwrap(), None);
        assert_eq!(store.phase().unwrap(), SessionPhase::Empty);
    }

    #[test]
    fn test_open_restores_session() {
        let dir = TempDir::new().unwrap();
        let e = HashingEmbedder::new(64).unwrap();
        let items = texts(&["alpha clause", "beta clause", "gamma clause"]);
        let original = SessionStore::new(dir.path());
        original.add_batch(&items, &sources(3), &e).unwrap();
        let before = original.search("beta", 3, &e).unwrap();

        let reopened = SessionStore::open(dir.path()).unwrap();
        let after = reopened.search("beta", 3, &e).unwrap();

        assert_eq!(reopened.dimension().unwrap(), Some(64));
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.record, a.record);
            assert_relative_eq!(b.score, a.score, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_open_empty_dir() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path().join("fresh")).unwrap();
        assert_eq!(store.phase().unwrap(), SessionPhase::Empty);
    }
}
