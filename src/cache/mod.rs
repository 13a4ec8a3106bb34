//! Evidence Cache - deduplicated, queryable store of embedded evidence.
//!
//! The store is an aligned pair: a vector index and a metadata list, where
//! position i in both always refers to the same record. One `RwLock` guards
//! the pair, so every mutation extends both sequences inside a single
//! critical section and a partial write cannot exist. Reads (queries) run
//! concurrently with each other and are excluded only by writes.
//!
//! Persistence is two co-located artifacts written and read together: the
//! vector blob (`evidence_index.bin`, bincode inside a zstd stream) and the
//! metadata array (`evidence_meta.json`). A missing or corrupt pair resets
//! the store to empty with a warning; it never fails the caller.

mod record;

pub use record::{content_hash, EvidenceRecord};

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::embedding::{dot_product, Embedder};
use crate::error::VerityError;

const INDEX_FILE: &str = "evidence_index.bin";
const META_FILE: &str = "evidence_meta.json";

#[derive(Default)]
struct CacheState {
    vectors: Vec<Vec<f32>>,
    records: Vec<EvidenceRecord>,
}

impl CacheState {
    fn contains(&self, hash: &str) -> bool {
        self.records.iter().any(|r| r.content_hash == hash)
    }
}

/// Persistent, deduplicated evidence store with nearest-neighbor lookup.
pub struct EvidenceCache {
    index_path: PathBuf,
    meta_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    auto_persist: bool,
    store: RwLock<CacheState>,
}

impl EvidenceCache {
    /// Open (or create) the cache rooted at `dir`. Artifact-load failures of
    /// any kind degrade to an empty store; only an unusable directory errors.
    pub fn open(dir: impl AsRef<Path>, embedder: Arc<dyn Embedder>, auto_persist: bool) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache directory {:?}", dir))?;

        let index_path = dir.join(INDEX_FILE);
        let meta_path = dir.join(META_FILE);

        let state = match load_state(&index_path, &meta_path) {
            Ok(state) => {
                if !state.records.is_empty() {
                    info!("Loaded {} evidence records from cache", state.records.len());
                }
                state
            }
            Err(e) => {
                warn!(
                    "{}; resetting to an empty store",
                    VerityError::CacheCorruption(e.to_string())
                );
                CacheState::default()
            }
        };

        Ok(Self {
            index_path,
            meta_path,
            embedder,
            auto_persist,
            store: RwLock::new(state),
        })
    }

    /// Add one evidence record. Returns `false` (a no-op) when a record with
    /// the same normalized text is already stored. The embedding is computed
    /// outside the lock; both sequences are extended under one write guard.
    pub async fn add(
        &self,
        text: &str,
        url: &str,
        source: &str,
        labels: Vec<String>,
    ) -> Result<bool> {
        let hash = content_hash(text);
        {
            let store = self.store.read().await;
            if store.contains(&hash) {
                debug!("Duplicate evidence skipped: {}", preview(text));
                return Ok(false);
            }
        }

        let vector = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("embedder returned no vector")?;
        let record = EvidenceRecord::new(text, url, source, labels);

        {
            let mut store = self.store.write().await;
            // Re-check: a concurrent add of the same text may have won.
            if store.contains(&hash) {
                return Ok(false);
            }
            store.vectors.push(vector);
            store.records.push(record);
        }
        debug!("Added evidence to cache: {}", preview(text));

        if self.auto_persist {
            self.persist().await?;
        }
        Ok(true)
    }

    /// Add many records in one embedding batch and one critical section.
    /// Duplicates against the store and within the batch are dropped; returns
    /// the number actually stored.
    pub async fn add_bulk(&self, docs: Vec<EvidenceRecord>) -> Result<usize> {
        let mut fresh: Vec<EvidenceRecord> = Vec::new();
        {
            let store = self.store.read().await;
            let mut seen: HashSet<String> = HashSet::new();
            for doc in docs {
                if store.contains(&doc.content_hash) || !seen.insert(doc.content_hash.clone()) {
                    continue;
                }
                fresh.push(doc);
            }
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = fresh.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != fresh.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                fresh.len()
            );
        }

        let mut added = 0;
        {
            let mut store = self.store.write().await;
            for (record, vector) in fresh.into_iter().zip(vectors) {
                if store.contains(&record.content_hash) {
                    continue;
                }
                store.vectors.push(vector);
                store.records.push(record);
                added += 1;
            }
        }

        if added > 0 {
            info!("Bulk added {} evidence records", added);
            if self.auto_persist {
                self.persist().await?;
            }
        }
        Ok(added)
    }

    /// Top-k nearest neighbors by cosine similarity, most similar first.
    /// An empty store returns an empty Vec without touching the embedder.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<EvidenceRecord>> {
        {
            let store = self.store.read().await;
            if store.records.is_empty() {
                return Ok(Vec::new());
            }
        }

        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("embedder returned no vector")?;

        let store = self.store.read().await;
        let mut scored: Vec<(f32, EvidenceRecord)> = store
            .vectors
            .par_iter()
            .zip(store.records.par_iter())
            .map(|(vector, record)| (dot_product(&query_vec, vector), record.clone()))
            .collect();
        drop(store);

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, mut record)| {
                record.similarity = Some(score);
                record
            })
            .collect())
    }

    /// Write both artifacts from one consistent snapshot of the store.
    pub async fn persist(&self) -> Result<()> {
        let (vectors, records) = {
            let store = self.store.read().await;
            (store.vectors.clone(), store.records.clone())
        };
        let count = records.len();
        let index_path = self.index_path.clone();
        let meta_path = self.meta_path.clone();

        tokio::task::spawn_blocking(move || {
            let file = File::create(&index_path)
                .with_context(|| format!("failed to create {:?}", index_path))?;
            let writer = BufWriter::new(file);
            let mut encoder = zstd::stream::write::Encoder::new(writer, 3)?;
            bincode::serialize_into(&mut encoder, &vectors)?;
            encoder.finish()?;

            let meta_file = File::create(&meta_path)
                .with_context(|| format!("failed to create {:?}", meta_path))?;
            serde_json::to_writer_pretty(BufWriter::new(meta_file), &records)?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;

        debug!("Persisted evidence cache ({} records)", count);
        Ok(())
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.store.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}

/// Read the artifact pair. Neither file existing is a fresh store; exactly
/// one existing, unreadable content or mismatched lengths are corruption.
fn load_state(index_path: &Path, meta_path: &Path) -> Result<CacheState> {
    let have_index = index_path.exists();
    let have_meta = meta_path.exists();

    if !have_index && !have_meta {
        return Ok(CacheState::default());
    }
    if have_index != have_meta {
        bail!("artifact pair incomplete: index={}, metadata={}", have_index, have_meta);
    }

    let index_file =
        File::open(index_path).with_context(|| format!("failed to open {:?}", index_path))?;
    let decoder = zstd::stream::read::Decoder::new(index_file)?;
    let vectors: Vec<Vec<f32>> =
        bincode::deserialize_from(decoder).context("vector index unreadable")?;

    let meta_file =
        File::open(meta_path).with_context(|| format!("failed to open {:?}", meta_path))?;
    let records: Vec<EvidenceRecord> =
        serde_json::from_reader(BufReader::new(meta_file)).context("metadata list unreadable")?;

    if vectors.len() != records.len() {
        bail!(
            "index/metadata misaligned: {} vectors, {} records",
            vectors.len(),
            records.len()
        );
    }

    Ok(CacheState { vectors, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sha2::{Digest, Sha256};
    use tempfile::tempdir;

    use crate::embedding::normalize;

    /// Deterministic embedder: identical text always maps to the same unit
    /// vector, so exact re-queries score 1.0 without any model download.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let digest = Sha256::digest(t.trim().to_lowercase().as_bytes());
                    let mut v: Vec<f32> = digest[..8].iter().map(|b| *b as f32 + 1.0).collect();
                    normalize(&mut v);
                    v
                })
                .collect())
        }
    }

    fn open_cache(dir: &Path, auto_persist: bool) -> EvidenceCache {
        EvidenceCache::open(dir, Arc::new(StubEmbedder), auto_persist).unwrap()
    }

    #[tokio::test]
    async fn add_is_idempotent_for_normalized_text() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), false);

        assert!(cache.add("The Earth is round", "https://a", "Wikipedia", vec![]).await.unwrap());
        assert!(!cache.add("  the earth is ROUND ", "https://b", "NewsAPI", vec![]).await.unwrap());
        assert_eq!(cache.len().await, 1);

        // The first writer's metadata wins.
        let hits = cache.query("The Earth is round", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a");
    }

    #[tokio::test]
    async fn index_and_metadata_stay_aligned_across_writes() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), false);

        for i in 0..8 {
            cache
                .add(&format!("fact number {}", i), "", "test", vec![])
                .await
                .unwrap();
        }

        let store = cache.store.read().await;
        assert_eq!(store.vectors.len(), store.records.len());
        drop(store);

        // Position coupling: an exact re-query surfaces its own record first
        // with similarity 1.0.
        for i in 0..8 {
            let text = format!("fact number {}", i);
            let hits = cache.query(&text, 1).await.unwrap();
            assert_eq!(hits[0].text, text);
            assert!((hits[0].similarity.unwrap() - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn query_on_empty_store_returns_nothing() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), false);
        assert!(cache.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_truncates_to_top_k() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), false);
        for text in ["one", "two", "three", "four"] {
            cache.add(text, "", "test", vec![]).await.unwrap();
        }

        let hits = cache.query("one", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].similarity.unwrap() >= hits[1].similarity.unwrap());
    }

    #[tokio::test]
    async fn add_bulk_dedups_within_the_batch_and_against_the_store() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), false);
        cache.add("already stored", "", "test", vec![]).await.unwrap();

        let batch = vec![
            EvidenceRecord::new("already stored", "", "test", vec![]),
            EvidenceRecord::new("new claim", "https://x", "NewsAPI", vec![]),
            EvidenceRecord::new("NEW CLAIM", "https://y", "Reddit", vec![]),
        ];
        let added = cache.add_bulk(batch).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(cache.len().await, 2);
        let store = cache.store.read().await;
        assert_eq!(store.vectors.len(), store.records.len());
    }

    #[tokio::test]
    async fn persist_and_reopen_round_trips_both_artifacts() {
        let dir = tempdir().unwrap();
        {
            let cache = open_cache(dir.path(), false);
            cache.add("persisted fact", "https://a", "Wikipedia", vec![]).await.unwrap();
            cache.add("another fact", "https://b", "NewsAPI", vec![]).await.unwrap();
            cache.persist().await.unwrap();
        }

        assert!(dir.path().join(INDEX_FILE).exists());
        assert!(dir.path().join(META_FILE).exists());

        let reopened = open_cache(dir.path(), false);
        assert_eq!(reopened.len().await, 2);
        let hits = reopened.query("persisted fact", 1).await.unwrap();
        assert_eq!(hits[0].url, "https://a");
    }

    #[tokio::test]
    async fn auto_persist_writes_after_each_add() {
        let dir = tempdir().unwrap();
        let cache = open_cache(dir.path(), true);
        cache.add("synchronously saved", "", "test", vec![]).await.unwrap();
        assert!(dir.path().join(INDEX_FILE).exists());
        assert!(dir.path().join(META_FILE).exists());
    }

    #[tokio::test]
    async fn missing_half_of_the_pair_resets_to_empty() {
        let dir = tempdir().unwrap();
        {
            let cache = open_cache(dir.path(), false);
            cache.add("soon orphaned", "", "test", vec![]).await.unwrap();
            cache.persist().await.unwrap();
        }
        std::fs::remove_file(dir.path().join(META_FILE)).unwrap();

        let reopened = open_cache(dir.path(), false);
        assert_eq!(reopened.len().await, 0);
    }

    #[tokio::test]
    async fn misaligned_artifacts_reset_to_empty() {
        let dir = tempdir().unwrap();
        {
            let cache = open_cache(dir.path(), false);
            cache.add("first", "", "test", vec![]).await.unwrap();
            cache.add("second", "", "test", vec![]).await.unwrap();
            cache.persist().await.unwrap();
        }

        // Rewrite the metadata artifact with one record fewer.
        let truncated = vec![EvidenceRecord::new("first", "", "test", vec![])];
        let meta_file = File::create(dir.path().join(META_FILE)).unwrap();
        serde_json::to_writer_pretty(BufWriter::new(meta_file), &truncated).unwrap();

        let reopened = open_cache(dir.path(), false);
        assert_eq!(reopened.len().await, 0);
    }
}
