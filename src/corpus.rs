// src/corpus.rs
//
// Corpus manager: the single entry point that sequences the pipeline
// for ingest (preprocess → spectrogram → peaks → descriptors → index)
// and identification (the same, then search and temporal alignment).
// Owns the index behind one RwLock; logging happens here at the
// boundary and nowhere deeper.

use std::path::Path;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audio::{compute_spectrogram, preprocess, AudioBuffer, PreprocessConfig, SpectralConfig};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::fingerprint::{
    extract_peaks, generate_descriptors, DescriptorConfig, DescriptorVector, PeakConfig,
};
use crate::index::{IndexConfig, TrackMetadata, VectorIndex};
use crate::matcher::{rank_matches, Match, MatcherConfig};

/// Every stage's parameters in one immutable value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub spectral: SpectralConfig,
    pub peaks: PeakConfig,
    pub descriptor: DescriptorConfig,
    pub matcher: MatcherConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.spectral.validate()?;
        self.descriptor.validate()?;
        if self.preprocess.target_sample_rate == 0 {
            return Err(Error::InvalidInput(
                "target sample rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The track corpus: fingerprint pipeline plus the shared vector index.
///
/// `identify`, `get_track`, `list_tracks` and `save` take the read lock;
/// `add_track`, `delete_track` and `load` take the write lock, so a
/// track's vectors become queryable atomically and readers never observe
/// a partial insert.
pub struct Corpus {
    pipeline: PipelineConfig,
    index: RwLock<VectorIndex>,
}

impl Corpus {
    pub fn new(pipeline: PipelineConfig, index_config: IndexConfig) -> Result<Self> {
        pipeline.validate()?;
        if pipeline.descriptor.dim() != index_config.dim {
            return Err(Error::InvalidInput(format!(
                "descriptor dimension {} does not match index dimension {}",
                pipeline.descriptor.dim(),
                index_config.dim
            )));
        }
        let index = VectorIndex::new(index_config)?;
        Ok(Self {
            pipeline,
            index: RwLock::new(index),
        })
    }

    /// Open a corpus over an existing snapshot directory.
    pub fn open(pipeline: PipelineConfig, path: &Path) -> Result<Self> {
        pipeline.validate()?;
        let index = VectorIndex::load(path)?;
        if pipeline.descriptor.dim() != index.config().dim {
            return Err(Error::InvalidInput(format!(
                "descriptor dimension {} does not match snapshot dimension {}",
                pipeline.descriptor.dim(),
                index.config().dim
            )));
        }
        Ok(Self {
            pipeline,
            index: RwLock::new(index),
        })
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Ingest a reference track and return its id. A generated UUID is
    /// used when `track_id` is not supplied.
    pub fn add_track(
        &self,
        audio: &AudioBuffer,
        title: &str,
        artist: &str,
        track_id: Option<String>,
        token: &CancelToken,
    ) -> Result<String> {
        let (vectors, duration_s) = self.fingerprint(audio, token)?;
        token.checkpoint()?;

        let track_id = track_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let meta = TrackMetadata {
            track_id: track_id.clone(),
            title: title.to_string(),
            artist: artist.to_string(),
            duration_s,
            added_epoch: unix_now(),
        };

        let vector_count = vectors.len();
        {
            let mut index = self.write_index()?;
            index.add(meta, &vectors)?;
        }
        info!(track_id = %track_id, vectors = vector_count, "track added");
        Ok(track_id)
    }

    /// Identify query audio against the corpus. No match is an empty
    /// list, not an error.
    pub fn identify(&self, audio: &AudioBuffer, token: &CancelToken) -> Result<Vec<Match>> {
        let (vectors, _) = self.fingerprint(audio, token)?;
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let hits = {
            let index = self.read_index()?;
            index.search(&vectors, self.pipeline.matcher.search_neighbors, token)?
        };
        let matches = rank_matches(&hits, &self.pipeline.matcher, token)?;
        info!(
            query_vectors = vectors.len(),
            hits = hits.len(),
            matches = matches.len(),
            "identify complete"
        );
        Ok(matches)
    }

    /// Remove a track and all of its vectors.
    pub fn delete_track(&self, track_id: &str) -> Result<()> {
        self.write_index()?.delete(track_id)?;
        info!(track_id = %track_id, "track deleted");
        Ok(())
    }

    pub fn get_track(&self, track_id: &str) -> Result<Option<TrackMetadata>> {
        Ok(self.read_index()?.get(track_id).cloned())
    }

    pub fn list_tracks(&self) -> Result<Vec<TrackMetadata>> {
        Ok(self.read_index()?.list().into_iter().cloned().collect())
    }

    pub fn track_count(&self) -> Result<usize> {
        Ok(self.read_index()?.track_count())
    }

    /// Persist the index snapshot. Streams under the read lock, so
    /// identification stays available while saving.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.read_index()?.save(path)
    }

    /// Replace the in-memory index with a snapshot.
    pub fn load(&self, path: &Path) -> Result<()> {
        let loaded = VectorIndex::load(path)?;
        if loaded.config().dim != self.pipeline.descriptor.dim() {
            return Err(Error::InvalidInput(format!(
                "snapshot dimension {} does not match descriptor dimension {}",
                loaded.config().dim,
                self.pipeline.descriptor.dim()
            )));
        }
        *self.write_index()? = loaded;
        Ok(())
    }

    /// Run the signal half of the pipeline: preprocess, spectrogram,
    /// peaks, descriptors. Audio that produces no landmarks yields an
    /// empty vector set.
    fn fingerprint(
        &self,
        audio: &AudioBuffer,
        token: &CancelToken,
    ) -> Result<(Vec<DescriptorVector>, f64)> {
        let prepared = preprocess(audio, &self.pipeline.preprocess)?;
        token.checkpoint()?;
        let spectrogram = compute_spectrogram(&prepared, &self.pipeline.spectral, token)?;
        let landmarks = extract_peaks(&spectrogram, &self.pipeline.peaks);
        let vectors = generate_descriptors(&landmarks, &self.pipeline.descriptor, token)?;
        Ok((vectors, prepared.duration_secs()))
    }

    fn read_index(&self) -> Result<std::sync::RwLockReadGuard<'_, VectorIndex>> {
        self.index
            .read()
            .map_err(|_| Error::Internal("index lock poisoned".to_string()))
    }

    fn write_index(&self) -> Result<std::sync::RwLockWriteGuard<'_, VectorIndex>> {
        self.index
            .write()
            .map_err(|_| Error::Internal("index lock poisoned".to_string()))
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
