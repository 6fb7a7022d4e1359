//! Audioprint - landmark-based audio fingerprinting and identification
//!
//! Given a corpus of reference tracks and an unknown clip, audioprint
//! answers "which track is this, and where in it" with a confidence
//! score. The pipeline is the classic landmark approach: a windowed-FFT
//! spectrogram is reduced to spectral peaks, peaks are paired into
//! anchor/target constellations encoded as unit vectors, the vectors go
//! into an HNSW index, and query hits are verified by voting on a
//! consistent time offset between clip and reference.
//!
//! ## Module Structure
//!
//! - `audio` - decoding, PCM preprocessing, spectral analysis
//! - `fingerprint` - peak extraction and constellation descriptors
//! - `index` - HNSW vector index with track metadata and snapshots
//! - `matcher` - temporal alignment and match scoring
//! - `corpus` - the orchestrating corpus manager
//! - `api` - JSON request/response shapes for service bindings
//! - `render` - spectrogram and peak visualization
//! - `testgen` - deterministic signal synthesis for tests
//! - `cli` - the audioprint binary's command surface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audioprint::{CancelToken, Corpus, IndexConfig, PipelineConfig};
//!
//! let corpus = Corpus::new(PipelineConfig::default(), IndexConfig::default())?;
//! let token = CancelToken::new();
//!
//! let reference = audioprint::audio::decode_file("track.flac".as_ref())?;
//! let id = corpus.add_track(&reference, "Title", "Artist", None, &token)?;
//!
//! let clip = audioprint::audio::decode_file("clip.wav".as_ref())?;
//! for m in corpus.identify(&clip, &token)? {
//!     println!("{} at {:+.2}s ({:.0}%)", m.track_id, m.time_offset_s, m.confidence * 100.0);
//! }
//! # Ok::<(), audioprint::Error>(())
//! ```

pub mod api;
pub mod audio;
pub mod cancel;
pub mod cli;
pub mod corpus;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod matcher;
pub mod render;
pub mod testgen;

// Commonly used types at the crate root.
pub use cancel::CancelToken;
pub use corpus::{Corpus, PipelineConfig};
pub use error::{Error, Result};
pub use index::{IndexConfig, SearchResult, TrackMetadata, VectorIndex};
pub use matcher::{Match, MatcherConfig};
