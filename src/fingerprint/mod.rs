//! Landmark extraction and descriptor generation.
//!
//! A spectrogram is reduced to a sparse set of spectral peaks
//! (landmarks), and each landmark anchors a constellation of nearby
//! peaks that is encoded as a fixed-dimension unit vector suitable for
//! approximate nearest-neighbor search.

pub mod generator;
pub mod peaks;

pub use generator::{generate_descriptors, DescriptorConfig, DescriptorVector};
pub use peaks::{extract_peaks, Landmark, PeakConfig};
