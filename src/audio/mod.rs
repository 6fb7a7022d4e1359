//! Audio decoding, preprocessing and spectral analysis.
//!
//! The types here feed the fingerprinting pipeline: a decoder turns bytes
//! into an [`AudioBuffer`], the PCM preprocessor conditions it (mono,
//! resample, normalize), and the spectral analyzer turns it into a
//! [`Spectrogram`].

pub mod decoder;
pub mod pcm;
pub mod spectral;

pub use decoder::{decode_bytes, decode_file};
pub use pcm::{preprocess, PreprocessConfig};
pub use spectral::{compute_spectrogram, SpectralConfig, Spectrogram, WindowKind};

use crate::error::{Error, Result};

/// Audio container formats the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
}

impl AudioFormat {
    /// Map a file extension (without the dot, any case) to a format tag.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            other => Err(Error::InvalidInput(format!(
                "unsupported audio format: {other}"
            ))),
        }
    }

    /// Extension string used for decoder hints.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Decoded PCM audio. Samples are interleaved floats in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved samples, `channels` values per frame.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count. The preprocessor reduces this to 1.
    pub channels: usize,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Root mean square level of a sample slice.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Total energy (sum of squared samples).
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| s as f64 * s as f64).sum()
}

/// Fraction of adjacent sample pairs that cross zero.
pub fn zero_crossing_rate(samples: &[f32]) -> f64 {
    if samples.len() <= 1 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("wav").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_extension("MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_extension("flac").unwrap(), AudioFormat::Flac);
        assert!(AudioFormat::from_extension("ogg").is_err());
    }

    #[test]
    fn test_buffer_duration() {
        let buf = AudioBuffer::new(vec![0.0; 88200], 44100, 2);
        assert_eq!(buf.frames(), 44100);
        assert!((buf.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rms_and_energy() {
        let samples = vec![0.5, -0.5, 0.5, -0.5];
        assert!((rms(&samples) - 0.5).abs() < 1e-9);
        assert!((energy(&samples) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_crossing_rate() {
        let samples = vec![1.0, -1.0, 1.0, -1.0];
        assert!((zero_crossing_rate(&samples) - 1.0).abs() < 1e-9);
        assert_eq!(zero_crossing_rate(&[1.0, 1.0, 1.0]), 0.0);
        assert_eq!(zero_crossing_rate(&[]), 0.0);
    }
}
