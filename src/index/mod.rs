//! Approximate nearest-neighbor vector index with track metadata.
//!
//! An HNSW graph over an arena of descriptor vectors, each tagged with
//! the track it came from and the anchor time it refers to. The index is
//! closed under its own API: every search hit resolves to a live track
//! in the metadata table, and deleting a track evicts its vectors in the
//! same operation.

mod hnsw;
mod snapshot;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::fingerprint::DescriptorVector;
use hnsw::HnswGraph;

/// HNSW construction and query parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Edges per node per layer.
    pub m: usize,
    /// Dynamic candidate list size during insertion.
    pub ef_construction: usize,
    /// Dynamic candidate list size during search.
    pub ef_search: usize,
    /// Descriptor dimensionality the index accepts.
    pub dim: usize,
    /// Vector capacity; inserts past this fail with `IndexFull`.
    pub max_elements: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            dim: 30,
            max_elements: 1_000_000,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(Error::InvalidInput(format!(
                "m must be at least 2, got {}",
                self.m
            )));
        }
        if self.dim == 0 {
            return Err(Error::InvalidInput("dim must be positive".to_string()));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(Error::InvalidInput(
                "ef parameters must be positive".to_string(),
            ));
        }
        if self.max_elements == 0 {
            return Err(Error::InvalidInput(
                "max_elements must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Catalog entry for an ingested track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub duration_s: f64,
    /// Unix timestamp of ingestion.
    pub added_epoch: i64,
}

/// A single ANN hit, tying a query vector to a stored vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub track_id: String,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub score: f32,
    /// Anchor time of the stored vector in its reference track.
    pub ref_time_s: f64,
    /// Anchor time of the query vector in the query audio.
    pub query_time_s: f64,
    /// Arena id of the matched stored vector.
    pub matched_vector_id: u64,
}

/// Stored descriptor payload.
#[derive(Debug, Clone)]
pub(crate) struct VectorRecord {
    pub(crate) track_idx: u32,
    pub(crate) ref_time_s: f64,
    pub(crate) values: Vec<f32>,
}

/// Arena of vector payloads addressed by dense u32 ids.
pub(crate) struct VectorStore {
    dim: usize,
    pub(crate) records: Vec<VectorRecord>,
}

impl VectorStore {
    pub(crate) fn new(dim: usize) -> Self {
        Self {
            dim,
            records: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn push(&mut self, record: VectorRecord) {
        debug_assert_eq!(record.values.len(), self.dim);
        self.records.push(record);
    }

    pub(crate) fn values(&self, id: u32) -> &[f32] {
        &self.records[id as usize].values
    }

    /// Euclidean distance between a stored vector and a query slice.
    pub(crate) fn distance(&self, id: u32, query: &[f32]) -> f32 {
        let stored = self.values(id);
        stored
            .iter()
            .zip(query.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

#[derive(Debug, Clone)]
struct TrackEntry {
    meta: TrackMetadata,
    vector_ids: Vec<u32>,
    deleted: bool,
}

/// The shared vector index: HNSW graph, vector arena and track table in
/// one lock domain. Thread safety is the caller's concern; the corpus
/// manager wraps this in an `RwLock`.
pub struct VectorIndex {
    config: IndexConfig,
    graph: HnswGraph,
    store: VectorStore,
    tracks: Vec<TrackEntry>,
    track_lookup: HashMap<String, u32>,
}

impl VectorIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let graph = HnswGraph::new(config.m, config.ef_construction);
        let store = VectorStore::new(config.dim);
        Ok(Self {
            config,
            graph,
            store,
            tracks: Vec::new(),
            track_lookup: HashMap::new(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of live tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.iter().filter(|t| !t.deleted).count()
    }

    /// Number of live vectors.
    pub fn vector_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| !t.deleted)
            .map(|t| t.vector_ids.len())
            .sum()
    }

    /// Register a track and insert its descriptors in one step. The
    /// whole insert is visible only once this returns; the corpus
    /// manager's write lock makes that atomic for readers.
    pub fn add(&mut self, meta: TrackMetadata, vectors: &[DescriptorVector]) -> Result<()> {
        if self.track_lookup.contains_key(&meta.track_id) {
            return Err(Error::DuplicateTrack(meta.track_id));
        }
        if self.store.len() + vectors.len() > self.config.max_elements {
            return Err(Error::IndexFull {
                capacity: self.config.max_elements,
            });
        }
        for v in vectors {
            if v.values.len() != self.config.dim {
                return Err(Error::InvalidInput(format!(
                    "descriptor dimension {} does not match index dimension {}",
                    v.values.len(),
                    self.config.dim
                )));
            }
            if v.ref_time_s < 0.0 || v.ref_time_s > meta.duration_s {
                return Err(Error::Internal(format!(
                    "vector anchor time {} outside track duration {}",
                    v.ref_time_s, meta.duration_s
                )));
            }
        }

        let track_idx = self.tracks.len() as u32;
        let mut vector_ids = Vec::with_capacity(vectors.len());
        for v in vectors {
            let id = self.store.len() as u32;
            self.store.push(VectorRecord {
                track_idx,
                ref_time_s: v.ref_time_s,
                values: v.values.clone(),
            });
            self.graph.insert(id, &self.store);
            vector_ids.push(id);
        }

        self.track_lookup.insert(meta.track_id.clone(), track_idx);
        self.tracks.push(TrackEntry {
            meta,
            vector_ids,
            deleted: false,
        });
        Ok(())
    }

    /// Top-`k` neighbors for each query vector. An empty index yields an
    /// empty result, not an error.
    pub fn search(
        &self,
        queries: &[DescriptorVector],
        k: usize,
        token: &CancelToken,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::new();
        for q in queries {
            token.checkpoint()?;
            if q.values.len() != self.config.dim {
                return Err(Error::InvalidInput(format!(
                    "query dimension {} does not match index dimension {}",
                    q.values.len(),
                    self.config.dim
                )));
            }
            for hit in self
                .graph
                .search(&q.values, k, self.config.ef_search, &self.store)
            {
                let record = &self.store.records[hit.id as usize];
                let track = &self.tracks[record.track_idx as usize];
                if track.deleted {
                    continue;
                }
                results.push(SearchResult {
                    track_id: track.meta.track_id.clone(),
                    score: 1.0 / (1.0 + hit.dist),
                    ref_time_s: record.ref_time_s,
                    query_time_s: q.ref_time_s,
                    matched_vector_id: hit.id as u64,
                });
            }
        }
        Ok(results)
    }

    /// Tombstone a track and all of its vectors.
    pub fn delete(&mut self, track_id: &str) -> Result<()> {
        let idx = *self
            .track_lookup
            .get(track_id)
            .ok_or_else(|| Error::UnknownTrack(track_id.to_string()))?;
        let entry = &mut self.tracks[idx as usize];
        entry.deleted = true;
        let ids = entry.vector_ids.clone();
        for id in ids {
            self.graph.mark_deleted(id);
        }
        self.track_lookup.remove(track_id);
        Ok(())
    }

    /// Metadata for a live track.
    pub fn get(&self, track_id: &str) -> Option<&TrackMetadata> {
        self.track_lookup
            .get(track_id)
            .map(|&idx| &self.tracks[idx as usize].meta)
    }

    /// Metadata for all live tracks, in insertion order.
    pub fn list(&self) -> Vec<&TrackMetadata> {
        self.tracks
            .iter()
            .filter(|t| !t.deleted)
            .map(|t| &t.meta)
            .collect()
    }

    /// Write a self-contained snapshot directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        snapshot::save(self, path)
    }

    /// Restore an index from a snapshot directory, rejecting version or
    /// dimension mismatches.
    pub fn load(path: &Path) -> Result<Self> {
        snapshot::load(path)
    }

    // Snapshot plumbing.
    pub(crate) fn parts(
        &self,
    ) -> (
        &IndexConfig,
        &HnswGraph,
        &VectorStore,
        Vec<(TrackMetadata, bool)>,
    ) {
        let tracks = self
            .tracks
            .iter()
            .map(|t| (t.meta.clone(), t.deleted))
            .collect();
        (&self.config, &self.graph, &self.store, tracks)
    }

    pub(crate) fn from_parts(
        config: IndexConfig,
        graph: HnswGraph,
        store: VectorStore,
        tracks: Vec<(TrackMetadata, bool)>,
    ) -> Result<Self> {
        config.validate()?;

        // Rebuild per-track vector lists from the arena records.
        let mut vector_ids: Vec<Vec<u32>> = vec![Vec::new(); tracks.len()];
        for (id, record) in store.records.iter().enumerate() {
            let idx = record.track_idx as usize;
            if idx >= tracks.len() {
                return Err(Error::Internal(format!(
                    "vector {id} references missing track {idx}"
                )));
            }
            vector_ids[idx].push(id as u32);
        }

        let mut entries = Vec::with_capacity(tracks.len());
        let mut track_lookup = HashMap::new();
        for (idx, ((meta, deleted), ids)) in
            tracks.into_iter().zip(vector_ids.into_iter()).enumerate()
        {
            if !deleted {
                track_lookup.insert(meta.track_id.clone(), idx as u32);
            }
            entries.push(TrackEntry {
                meta,
                vector_ids: ids,
                deleted,
            });
        }

        Ok(Self {
            config,
            graph,
            store,
            tracks: entries,
            track_lookup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str) -> TrackMetadata {
        TrackMetadata {
            track_id: id.to_string(),
            title: format!("title-{id}"),
            artist: "artist".to_string(),
            duration_s: 60.0,
            added_epoch: 1_700_000_000,
        }
    }

    fn descriptor(seed: u32, t: f64) -> DescriptorVector {
        // Deterministic pseudo-random unit vector.
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(12345);
        let mut values: Vec<f32> = (0..30)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 8) as f32 / (1u32 << 24) as f32
            })
            .collect();
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        for v in &mut values {
            *v /= norm;
        }
        DescriptorVector {
            values,
            ref_time_s: t,
        }
    }

    #[test]
    fn test_add_and_self_search() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        let vectors: Vec<DescriptorVector> =
            (0..50).map(|i| descriptor(i, i as f64 * 0.5)).collect();
        index.add(meta("t1"), &vectors).unwrap();

        assert_eq!(index.track_count(), 1);
        assert_eq!(index.vector_count(), 50);

        let hits = index.search(&vectors[..5], 1, &CancelToken::new()).unwrap();
        assert_eq!(hits.len(), 5);
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.track_id, "t1");
            assert!(hit.score > 0.999, "score {}", hit.score);
            assert!((hit.ref_time_s - i as f64 * 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_duplicate_track_rejected() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        index.add(meta("t1"), &[descriptor(1, 0.0)]).unwrap();
        let err = index.add(meta("t1"), &[descriptor(2, 0.0)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateTrack(_)));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        let bad = DescriptorVector {
            values: vec![1.0; 7],
            ref_time_s: 0.0,
        };
        assert!(matches!(
            index.add(meta("t1"), &[bad]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_capacity_exhaustion() {
        let config = IndexConfig {
            max_elements: 3,
            ..IndexConfig::default()
        };
        let mut index = VectorIndex::new(config).unwrap();
        let vectors: Vec<DescriptorVector> = (0..4).map(|i| descriptor(i, 0.0)).collect();
        assert!(matches!(
            index.add(meta("t1"), &vectors),
            Err(Error::IndexFull { capacity: 3 })
        ));
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(IndexConfig::default()).unwrap();
        let hits = index
            .search(&[descriptor(1, 0.0)], 5, &CancelToken::new())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_delete_hides_track_everywhere() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        let v1: Vec<DescriptorVector> = (0..20).map(|i| descriptor(i, 0.0)).collect();
        let v2: Vec<DescriptorVector> = (100..120).map(|i| descriptor(i, 0.0)).collect();
        index.add(meta("t1"), &v1).unwrap();
        index.add(meta("t2"), &v2).unwrap();

        index.delete("t1").unwrap();

        assert!(index.get("t1").is_none());
        assert_eq!(index.list().len(), 1);
        assert_eq!(index.track_count(), 1);

        let hits = index.search(&v1, 3, &CancelToken::new()).unwrap();
        assert!(hits.iter().all(|h| h.track_id == "t2"));

        assert!(matches!(index.delete("t1"), Err(Error::UnknownTrack(_))));
    }

    #[test]
    fn test_unknown_delete() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        assert!(matches!(index.delete("nope"), Err(Error::UnknownTrack(_))));
    }

    #[test]
    fn test_search_cancellation() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        index.add(meta("t1"), &[descriptor(1, 0.0)]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            index.search(&[descriptor(1, 0.0)], 1, &token),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_anchor_time_outside_duration_is_internal_error() {
        let mut index = VectorIndex::new(IndexConfig::default()).unwrap();
        let v = descriptor(1, 120.0); // track duration is 60 s
        assert!(matches!(
            index.add(meta("t1"), &[v]),
            Err(Error::Internal(_))
        ));
    }
}
