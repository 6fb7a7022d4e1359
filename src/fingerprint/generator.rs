// src/fingerprint/generator.rs
//
// Constellation descriptors. One landmark alone is not discriminative;
// the spatial relationship between an anchor and the strongest landmarks
// in its target zone is. Each anchor yields one fixed-dimension vector,
// L2-normalized so Euclidean ANN distance tracks cosine distance.

use serde::{Deserialize, Serialize};

use super::peaks::Landmark;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Anchors per cancellation checkpoint.
const ANCHOR_BATCH: usize = 64;

/// Descriptor generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorConfig {
    /// Maximum targets paired with each anchor. Descriptor dimension is
    /// `3 * fan_out`.
    pub fan_out: usize,
    /// Exclusive lower edge of the target zone, seconds after the anchor.
    pub min_dt_s: f64,
    /// Inclusive upper edge of the target zone, seconds after the anchor.
    pub max_dt_s: f64,
    /// Maximum frequency distance between anchor and target, in Hz.
    pub max_df_hz: f64,
    /// Scale dividing frequency features so all coordinates land in
    /// comparable ranges before normalization.
    pub freq_scale_hz: f64,
    /// Average anchors retained per second of audio; `0` disables the
    /// cap. The strongest anchors in each one-second bucket win.
    pub vectors_per_second: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            fan_out: 10,
            min_dt_s: 0.0,
            max_dt_s: 3.0,
            max_df_hz: 1000.0,
            freq_scale_hz: 4000.0,
            vectors_per_second: 25,
        }
    }
}

impl DescriptorConfig {
    /// Dimensionality of generated vectors.
    pub fn dim(&self) -> usize {
        3 * self.fan_out
    }

    pub fn validate(&self) -> Result<()> {
        if self.fan_out == 0 {
            return Err(Error::InvalidInput("fan_out must be positive".to_string()));
        }
        if self.max_dt_s <= self.min_dt_s {
            return Err(Error::InvalidInput(format!(
                "target zone is empty: ({}, {}]",
                self.min_dt_s, self.max_dt_s
            )));
        }
        if self.max_df_hz <= 0.0 || self.freq_scale_hz <= 0.0 {
            return Err(Error::InvalidInput(
                "frequency bounds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A unit-length descriptor with the anchor time it refers back to. The
/// anchor time, not the target times, is what temporal alignment keys on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorVector {
    pub values: Vec<f32>,
    /// Time of the anchor landmark, in seconds from the start of the
    /// source audio.
    pub ref_time_s: f64,
}

/// Generate constellation descriptors from landmarks.
///
/// `landmarks` must be in the frame order produced by
/// [`super::extract_peaks`]. Anchors with an empty target zone produce
/// no vector; empty input yields an empty list.
pub fn generate_descriptors(
    landmarks: &[Landmark],
    config: &DescriptorConfig,
    token: &CancelToken,
) -> Result<Vec<DescriptorVector>> {
    config.validate()?;
    if landmarks.is_empty() {
        return Ok(Vec::new());
    }

    let anchors = subsample_anchors(landmarks, config.vectors_per_second);
    let dim = config.dim();

    let mut vectors = Vec::with_capacity(anchors.len());
    for (n, &anchor_idx) in anchors.iter().enumerate() {
        if n % ANCHOR_BATCH == 0 {
            token.checkpoint()?;
        }
        let anchor = &landmarks[anchor_idx];
        let targets = select_targets(landmarks, anchor, config);
        if targets.is_empty() {
            continue;
        }

        let mut values = vec![0.0f32; dim];
        for (i, target) in targets.iter().enumerate() {
            let dt = target.time_s - anchor.time_s;
            values[i * 3] = (anchor.freq_hz / config.freq_scale_hz) as f32;
            values[i * 3 + 1] = (target.freq_hz / config.freq_scale_hz) as f32;
            values[i * 3 + 2] = (dt / config.max_dt_s) as f32;
        }

        if !normalize_l2(&mut values) {
            continue;
        }
        vectors.push(DescriptorVector {
            values,
            ref_time_s: anchor.time_s,
        });
    }

    Ok(vectors)
}

/// Indices of the anchors to keep, in time order. With a per-second cap,
/// only the strongest `cap` landmarks of each one-second bucket anchor a
/// descriptor; all landmarks remain available as targets.
fn subsample_anchors(landmarks: &[Landmark], cap: usize) -> Vec<usize> {
    if cap == 0 {
        return (0..landmarks.len()).collect();
    }

    let mut buckets: Vec<(i64, usize)> = landmarks
        .iter()
        .enumerate()
        .map(|(i, l)| (l.time_s.floor() as i64, i))
        .collect();
    // Bucket ascending, amplitude descending inside a bucket.
    buckets.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| landmarks[b.1].amplitude.total_cmp(&landmarks[a.1].amplitude))
    });

    let mut kept = Vec::new();
    let mut current_bucket = i64::MIN;
    let mut taken = 0;
    for (bucket, idx) in buckets {
        if bucket != current_bucket {
            current_bucket = bucket;
            taken = 0;
        }
        if taken < cap {
            kept.push(idx);
            taken += 1;
        }
    }
    kept.sort_unstable();
    kept
}

/// Targets inside the anchor's zone, strongest first; ties prefer the
/// smaller frequency distance, then the smaller time distance.
fn select_targets<'a>(
    landmarks: &'a [Landmark],
    anchor: &Landmark,
    config: &DescriptorConfig,
) -> Vec<&'a Landmark> {
    let lower = anchor.time_s + config.min_dt_s;
    let upper = anchor.time_s + config.max_dt_s;

    // Landmarks are frame-ordered, so the zone is a contiguous span.
    let start = landmarks.partition_point(|l| l.time_s <= lower);
    let mut candidates: Vec<&Landmark> = landmarks[start..]
        .iter()
        .take_while(|l| l.time_s <= upper)
        .filter(|l| (l.freq_hz - anchor.freq_hz).abs() <= config.max_df_hz)
        .collect();

    candidates.sort_by(|a, b| {
        b.amplitude.total_cmp(&a.amplitude).then_with(|| {
            let df_a = (a.freq_hz - anchor.freq_hz).abs();
            let df_b = (b.freq_hz - anchor.freq_hz).abs();
            df_a.total_cmp(&df_b)
                .then_with(|| a.time_s.total_cmp(&b.time_s))
        })
    });
    candidates.truncate(config.fan_out);
    candidates
}

/// Normalize to unit L2 length in place; returns false for zero or
/// non-finite input.
fn normalize_l2(values: &mut [f32]) -> bool {
    let sum: f32 = values.iter().map(|v| v * v).sum();
    if !sum.is_finite() || sum <= 0.0 {
        return false;
    }
    let norm = sum.sqrt();
    for v in values.iter_mut() {
        *v /= norm;
    }
    true
}
