// src/fingerprint/peaks.rs
//
// Spectral peak (landmark) extraction. A landmark is a local maximum of
// the power spectrogram inside a rectangular time-frequency
// neighborhood, gated by absolute and relative thresholds and limited to
// the configured frequency band, with a per-frame cap.

use serde::{Deserialize, Serialize};

use crate::audio::Spectrogram;

/// A spectral peak in the time-frequency plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    /// Index of the time frame.
    pub time_index: usize,
    /// Index of the frequency bin.
    pub freq_index: usize,
    /// Frame center time in seconds.
    pub time_s: f64,
    /// Bin center frequency in Hz.
    pub freq_hz: f64,
    /// Power value at the peak.
    pub amplitude: f32,
}

/// Peak extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Rectangular neighborhood radius, in bins, along both axes.
    pub neighborhood: usize,
    /// Minimum power a peak must reach.
    pub absolute_threshold: f32,
    /// Minimum power as a fraction of the global spectrogram maximum.
    pub relative_threshold: f32,
    /// Maximum surviving peaks per time frame.
    pub max_per_frame: usize,
    /// Lower edge of the analyzed frequency band, in Hz.
    pub min_freq_hz: f64,
    /// Upper edge of the analyzed frequency band, in Hz.
    pub max_freq_hz: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            neighborhood: 3,
            absolute_threshold: 0.01,
            relative_threshold: 0.1,
            max_per_frame: 5,
            min_freq_hz: 100.0,
            max_freq_hz: 4000.0,
        }
    }
}

/// Extract landmarks from a spectrogram.
///
/// Returns landmarks ordered by frame, strongest first within each
/// frame. An empty spectrogram yields an empty list.
pub fn extract_peaks(spec: &Spectrogram, config: &PeakConfig) -> Vec<Landmark> {
    if spec.is_empty() || config.max_per_frame == 0 {
        return Vec::new();
    }

    let global_max = spec.max_value();
    let threshold = config
        .absolute_threshold
        .max(config.relative_threshold * global_max);

    let Some((f_lo, f_hi)) = band_bins(spec.freq_points(), config.min_freq_hz, config.max_freq_hz)
    else {
        return Vec::new();
    };

    let time_bins = spec.time_bins();
    let freq_bins = spec.freq_bins();
    let radius = config.neighborhood as isize;

    let mut landmarks = Vec::new();
    for t in 0..time_bins {
        let mut frame_peaks: Vec<Landmark> = Vec::new();
        for f in f_lo..=f_hi {
            let value = spec.value(t, f);
            if value < threshold {
                continue;
            }
            if is_local_maximum(spec, t, f, value, radius, time_bins, freq_bins) {
                frame_peaks.push(Landmark {
                    time_index: t,
                    freq_index: f,
                    time_s: spec.time_points()[t],
                    freq_hz: spec.freq_points()[f],
                    amplitude: value,
                });
            }
        }

        frame_peaks.sort_by(|a, b| {
            b.amplitude
                .total_cmp(&a.amplitude)
                .then(a.freq_index.cmp(&b.freq_index))
        });
        frame_peaks.truncate(config.max_per_frame);
        landmarks.extend(frame_peaks);
    }

    landmarks
}

/// Map the frequency band to inclusive bin indices: the first bin at or
/// above `min_hz` through the last bin at or below `max_hz`.
fn band_bins(freq_points: &[f64], min_hz: f64, max_hz: f64) -> Option<(usize, usize)> {
    let f_lo = freq_points.iter().position(|&f| f >= min_hz)?;
    let f_hi = freq_points.iter().rposition(|&f| f <= max_hz)?;
    if f_lo > f_hi {
        None
    } else {
        Some((f_lo, f_hi))
    }
}

/// Local-maximum test over the clipped `radius`-neighborhood. A strictly
/// greater neighbor disqualifies the cell; on an equal-valued plateau the
/// cell earliest in scan order wins.
fn is_local_maximum(
    spec: &Spectrogram,
    t: usize,
    f: usize,
    value: f32,
    radius: isize,
    time_bins: usize,
    freq_bins: usize,
) -> bool {
    for dt in -radius..=radius {
        for df in -radius..=radius {
            if dt == 0 && df == 0 {
                continue;
            }
            let nt = t as isize + dt;
            let nf = f as isize + df;
            if nt < 0 || nt >= time_bins as isize || nf < 0 || nf >= freq_bins as isize {
                continue;
            }
            let (nt, nf) = (nt as usize, nf as usize);
            let neighbor = spec.value(nt, nf);
            if neighbor > value {
                return false;
            }
            if neighbor == value && (nt, nf) < (t, f) {
                return false;
            }
        }
    }
    true
}
