// src/audio/spectral.rs
//
// Windowed-FFT spectral analysis. Frames are transformed in parallel on
// the rayon pool; cancellation is checked between frame batches so DSP
// inner loops never poll the token themselves.

use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use super::{pcm, AudioBuffer};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Guard against log(0) when log scaling is enabled.
const LOG_EPSILON: f64 = 1e-10;

/// Frames per cancellation checkpoint.
const FRAME_BATCH: usize = 64;

/// Window function applied to each frame before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    Hamming,
    Hann,
    Blackman,
    Rectangular,
}

impl WindowKind {
    /// Window coefficients for a frame of `size` samples.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        if size <= 1 {
            return vec![1.0; size];
        }
        let n = (size - 1) as f64;
        let two_pi = 2.0 * std::f64::consts::PI;
        (0..size)
            .map(|i| {
                let x = i as f64;
                let w = match self {
                    WindowKind::Hamming => 0.54 - 0.46 * (two_pi * x / n).cos(),
                    WindowKind::Hann => 0.5 * (1.0 - (two_pi * x / n).cos()),
                    WindowKind::Blackman => {
                        0.42 - 0.5 * (two_pi * x / n).cos() + 0.08 * (2.0 * two_pi * x / n).cos()
                    }
                    WindowKind::Rectangular => 1.0,
                };
                w as f32
            })
            .collect()
    }
}

impl FromStr for WindowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hamming" => Ok(WindowKind::Hamming),
            "hann" => Ok(WindowKind::Hann),
            "blackman" => Ok(WindowKind::Blackman),
            "rectangular" => Ok(WindowKind::Rectangular),
            other => Err(Error::InvalidInput(format!(
                "unknown window type: {other}"
            ))),
        }
    }
}

/// Spectral analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// FFT window size in samples.
    pub window_size: usize,
    /// Stride between consecutive windows in samples.
    pub hop_size: usize,
    pub window: WindowKind,
    /// Base for logarithmic scaling of power values; `0.0` disables it.
    /// Log output is floored at zero so spectrogram values stay
    /// non-negative.
    pub log_scale_base: f64,
    /// Rescale each frame so its peak value is 1.0.
    pub normalize_frames: bool,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            hop_size: 512,
            window: WindowKind::Hamming,
            log_scale_base: 0.0,
            normalize_frames: false,
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.hop_size == 0 {
            return Err(Error::InvalidInput(
                "window and hop sizes must be positive".to_string(),
            ));
        }
        if self.hop_size > self.window_size {
            return Err(Error::InvalidInput(format!(
                "hop size {} exceeds window size {}",
                self.hop_size, self.window_size
            )));
        }
        if self.log_scale_base != 0.0 && self.log_scale_base <= 1.0 {
            return Err(Error::InvalidInput(format!(
                "log scale base must be greater than 1, got {}",
                self.log_scale_base
            )));
        }
        Ok(())
    }
}

/// Power spectrogram: `window_size/2 + 1` frequency bins per time frame,
/// with parallel arrays of frame center times and bin center frequencies.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    data: Vec<Vec<f32>>,
    time_points: Vec<f64>,
    freq_points: Vec<f64>,
}

impl Spectrogram {
    /// Assemble a spectrogram from raw parts, enforcing the shape and
    /// non-negativity invariants. Mostly useful for synthetic inputs in
    /// tests; the pipeline goes through [`compute_spectrogram`].
    pub fn from_parts(
        data: Vec<Vec<f32>>,
        time_points: Vec<f64>,
        freq_points: Vec<f64>,
    ) -> Result<Self> {
        if data.len() != time_points.len() {
            return Err(Error::InvalidInput(format!(
                "time axis mismatch: {} frames, {} time points",
                data.len(),
                time_points.len()
            )));
        }
        for frame in &data {
            if frame.len() != freq_points.len() {
                return Err(Error::InvalidInput(format!(
                    "frequency axis mismatch: {} bins, {} frequency points",
                    frame.len(),
                    freq_points.len()
                )));
            }
            if frame.iter().any(|&v| v < 0.0 || !v.is_finite()) {
                return Err(Error::InvalidInput(
                    "spectrogram values must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(Self {
            data,
            time_points,
            freq_points,
        })
    }

    /// Number of time frames.
    pub fn time_bins(&self) -> usize {
        self.data.len()
    }

    /// Number of frequency bins.
    pub fn freq_bins(&self) -> usize {
        self.freq_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Power value at frame `t`, bin `f`.
    pub fn value(&self, t: usize, f: usize) -> f32 {
        self.data[t][f]
    }

    /// All bin values of frame `t`.
    pub fn frame(&self, t: usize) -> &[f32] {
        &self.data[t]
    }

    /// Frame center times in seconds, one per time bin.
    pub fn time_points(&self) -> &[f64] {
        &self.time_points
    }

    /// Bin center frequencies in Hz, one per frequency bin.
    pub fn freq_points(&self) -> &[f64] {
        &self.freq_points
    }

    /// Maximum power value over the whole spectrogram.
    pub fn max_value(&self) -> f32 {
        self.data
            .iter()
            .flat_map(|frame| frame.iter())
            .fold(0.0f32, |acc, &v| acc.max(v))
    }
}

/// Compute a power spectrogram from mono audio.
///
/// Fails with `RequiresMono` for multi-channel input and `TooShort` when
/// the buffer holds fewer samples than one window.
pub fn compute_spectrogram(
    buffer: &AudioBuffer,
    config: &SpectralConfig,
    token: &CancelToken,
) -> Result<Spectrogram> {
    config.validate()?;
    if buffer.channels != 1 {
        return Err(Error::RequiresMono(buffer.channels));
    }

    let frames = pcm::segment_frames(&buffer.samples, config.window_size, config.hop_size)?;
    let window = config.window.coefficients(config.window_size);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(config.window_size);

    let mut data = Vec::with_capacity(frames.len());
    for batch in frames.chunks(FRAME_BATCH) {
        token.checkpoint()?;
        let mut rows: Vec<Vec<f32>> = batch
            .par_iter()
            .map(|frame| frame_power(frame, &window, &fft, config))
            .collect();
        data.append(&mut rows);
    }

    let num_bins = config.window_size / 2 + 1;
    let time_points = (0..data.len())
        .map(|t| (t * config.hop_size) as f64 / buffer.sample_rate as f64)
        .collect();
    let freq_points = (0..num_bins)
        .map(|k| k as f64 * buffer.sample_rate as f64 / config.window_size as f64)
        .collect();

    Ok(Spectrogram {
        data,
        time_points,
        freq_points,
    })
}

fn frame_power(
    frame: &[f32],
    window: &[f32],
    fft: &Arc<dyn Fft<f32>>,
    config: &SpectralConfig,
) -> Vec<f32> {
    let mut buffer: Vec<Complex<f32>> = frame
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();
    fft.process(&mut buffer);

    let num_bins = frame.len() / 2 + 1;
    let mut power: Vec<f32> = buffer[..num_bins]
        .iter()
        .map(|c| c.re * c.re + c.im * c.im)
        .collect();

    if config.log_scale_base > 1.0 {
        let log_base = config.log_scale_base.ln();
        for v in &mut power {
            // Floored at zero: power below unity reads as silence on the
            // log scale, keeping the non-negativity invariant.
            *v = ((*v as f64 + LOG_EPSILON).ln() / log_base).max(0.0) as f32;
        }
    }

    if config.normalize_frames {
        let max = power.iter().fold(0.0f32, |acc, &v| acc.max(v));
        if max > LOG_EPSILON as f32 {
            for v in &mut power {
                *v /= max;
            }
        }
    }

    power
}
