// src/audio/pcm.rs
//
// PCM preprocessing: mono downmix, linear-interpolation resampling,
// peak normalization and frame segmentation. Each pass returns a fresh
// buffer; nothing mutates its input.

use serde::{Deserialize, Serialize};

use super::AudioBuffer;
use crate::error::{Error, Result};

/// Below this peak level the signal is treated as silence and left alone
/// by normalization.
const SILENCE_PEAK: f32 = 1e-3;

/// Preprocessing parameters applied ahead of spectral analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Sample rate the pipeline operates at.
    pub target_sample_rate: u32,
    /// Downmix stereo input to mono.
    pub to_mono: bool,
    /// Rescale so the peak sample magnitude is 1.0.
    pub normalize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 44100,
            to_mono: true,
            normalize: true,
        }
    }
}

/// Run the standard preprocessing chain: mono downmix, resample to the
/// target rate, then peak normalization. Idempotent: running it twice
/// yields the same buffer as running it once.
pub fn preprocess(buffer: &AudioBuffer, config: &PreprocessConfig) -> Result<AudioBuffer> {
    if config.target_sample_rate == 0 {
        return Err(Error::InvalidInput(
            "target sample rate must be positive".to_string(),
        ));
    }

    let mut out = if config.to_mono && buffer.channels > 1 {
        to_mono(buffer)?
    } else if buffer.channels != 1 && buffer.channels != 2 {
        return Err(Error::UnsupportedChannels(buffer.channels));
    } else {
        buffer.clone()
    };

    if out.sample_rate != config.target_sample_rate {
        out = resample(&out, config.target_sample_rate);
    }

    if config.normalize {
        out = normalize(&out);
    }

    Ok(out)
}

/// Downmix to mono by averaging the left and right channels.
pub fn to_mono(buffer: &AudioBuffer) -> Result<AudioBuffer> {
    match buffer.channels {
        1 => Ok(buffer.clone()),
        2 => {
            let frames = buffer.frames();
            let mut mono = Vec::with_capacity(frames);
            for i in 0..frames {
                mono.push((buffer.samples[i * 2] + buffer.samples[i * 2 + 1]) / 2.0);
            }
            Ok(AudioBuffer::new(mono, buffer.sample_rate, 1))
        }
        n => Err(Error::UnsupportedChannels(n)),
    }
}

/// Resample to `target_rate` with per-channel linear interpolation.
///
/// Output frame count is `floor(frames * target / orig)`; source indices
/// are clamped to the final frame at the boundary.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> AudioBuffer {
    if buffer.sample_rate == target_rate || buffer.samples.is_empty() {
        let mut out = buffer.clone();
        out.sample_rate = target_rate;
        return out;
    }

    let channels = buffer.channels.max(1);
    let orig_frames = buffer.frames();
    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let new_frames = (orig_frames as f64 * ratio) as usize;

    let mut resampled = vec![0.0f32; new_frames * channels];
    for ch in 0..channels {
        for i in 0..new_frames {
            let pos = i as f64 / ratio;
            let idx = (pos.floor() as usize).min(orig_frames - 1);
            let next = (idx + 1).min(orig_frames - 1);
            let frac = (pos - pos.floor()) as f32;

            let a = buffer.samples[idx * channels + ch];
            let b = buffer.samples[next * channels + ch];
            resampled[i * channels + ch] = a * (1.0 - frac) + b * frac;
        }
    }

    AudioBuffer::new(resampled, target_rate, channels)
}

/// Scale samples so the peak magnitude is 1.0. Near-silent buffers and
/// buffers already at peak are returned unchanged, which makes the pass
/// a fixed point.
pub fn normalize(buffer: &AudioBuffer) -> AudioBuffer {
    let max_abs = buffer
        .samples
        .iter()
        .fold(0.0f32, |acc, &s| acc.max(s.abs()));

    if max_abs < SILENCE_PEAK || (max_abs - 1.0).abs() < SILENCE_PEAK {
        return buffer.clone();
    }

    let samples = buffer.samples.iter().map(|&s| s / max_abs).collect();
    AudioBuffer::new(samples, buffer.sample_rate, buffer.channels)
}

/// Segment a mono sample slice into overlapping frames of `window`
/// samples stepping by `hop`, zero-padding the final frame if the tail
/// falls short.
pub fn segment_frames(samples: &[f32], window: usize, hop: usize) -> Result<Vec<Vec<f32>>> {
    if window == 0 || hop == 0 {
        return Err(Error::InvalidInput(
            "window and hop sizes must be positive".to_string(),
        ));
    }
    if hop > window {
        return Err(Error::InvalidInput(format!(
            "hop size {hop} exceeds window size {window}"
        )));
    }
    if samples.len() < window {
        return Err(Error::TooShort {
            samples: samples.len(),
            window,
        });
    }

    let num_frames = 1 + (samples.len() - window) / hop;
    let mut frames = Vec::with_capacity(num_frames);
    for i in 0..num_frames {
        let start = i * hop;
        let end = (start + window).min(samples.len());
        let mut frame = vec![0.0f32; window];
        frame[..end - start].copy_from_slice(&samples[start..end]);
        frames.push(frame);
    }

    Ok(frames)
}
