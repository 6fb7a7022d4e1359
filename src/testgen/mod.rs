// src/testgen/mod.rs
//
// Deterministic signal synthesis for tests, benchmarks and demos.
// Everything here is seeded; two calls with the same arguments produce
// identical buffers, which keeps identification tests reproducible
// without audio fixtures on disk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::AudioBuffer;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// A pure sine tone.
pub fn sine(freq_hz: f64, duration_s: f64, sample_rate: u32, amplitude: f32) -> AudioBuffer {
    let n = (duration_s * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            ((TWO_PI * freq_hz * t).sin() * amplitude as f64) as f32
        })
        .collect();
    AudioBuffer::new(samples, sample_rate, 1)
}

/// A sine tone with non-periodic amplitude modulation from two
/// incommensurate LFOs. Unlike a bare sine, the envelope never repeats,
/// so a slice of the signal aligns at a single offset.
pub fn modulated_sine(freq_hz: f64, duration_s: f64, sample_rate: u32) -> AudioBuffer {
    let n = (duration_s * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let env = 0.5 + 0.2 * (TWO_PI * 2.618 * t).sin() + 0.25 * (TWO_PI * 4.236 * t).sin();
            ((TWO_PI * freq_hz * t).sin() * env) as f32
        })
        .collect();
    AudioBuffer::new(samples, sample_rate, 1)
}

/// A stereo sine with slightly different levels per channel.
pub fn stereo_sine(freq_hz: f64, duration_s: f64, sample_rate: u32) -> AudioBuffer {
    let n = (duration_s * sample_rate as f64) as usize;
    let mut samples = Vec::with_capacity(n * 2);
    for i in 0..n {
        let t = i as f64 / sample_rate as f64;
        let v = (TWO_PI * freq_hz * t).sin();
        samples.push((v * 0.8) as f32);
        samples.push((v * 0.6) as f32);
    }
    AudioBuffer::new(samples, sample_rate, 2)
}

/// A tone with `harmonics` partials at 1/k amplitude and a gentle decay
/// envelope, which spreads landmarks across the frequency band.
pub fn harmonic_tone(
    fundamental_hz: f64,
    harmonics: usize,
    duration_s: f64,
    sample_rate: u32,
) -> AudioBuffer {
    let n = (duration_s * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let envelope = (-(t / duration_s) * 2.0).exp();
            let mut v = 0.0;
            for k in 1..=harmonics {
                v += (TWO_PI * fundamental_hz * k as f64 * t).sin() / k as f64;
            }
            (v * envelope * 0.5) as f32
        })
        .collect();
    AudioBuffer::new(samples, sample_rate, 1)
}

/// A seeded pseudo-random melody: `notes` consecutive harmonic notes
/// with fundamentals drawn from 220–1100 Hz. Non-repeating in practice,
/// so a slice of it aligns at exactly one offset.
pub fn melody(seed: u64, notes: usize, note_duration_s: f64, sample_rate: u32) -> AudioBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let note_samples = (note_duration_s * sample_rate as f64) as usize;
    let mut samples = Vec::with_capacity(notes * note_samples);

    for _ in 0..notes {
        let freq = rng.gen_range(220.0..1100.0);
        let detune: f64 = rng.gen_range(0.99..1.01);
        for i in 0..note_samples {
            let t = i as f64 / sample_rate as f64;
            let envelope = (-(t / note_duration_s) * 3.0).exp();
            let v = (TWO_PI * freq * t).sin()
                + 0.5 * (TWO_PI * freq * 2.0 * detune * t).sin()
                + 0.25 * (TWO_PI * freq * 3.0 * t).sin();
            samples.push((v * envelope * 0.45) as f32);
        }
    }
    AudioBuffer::new(samples, sample_rate, 1)
}

/// Seeded white noise.
pub fn white_noise(duration_s: f64, sample_rate: u32, seed: u64, amplitude: f32) -> AudioBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (duration_s * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|_| rng.gen_range(-1.0f32..1.0) * amplitude)
        .collect();
    AudioBuffer::new(samples, sample_rate, 1)
}

/// A slice of `buffer` between two second marks.
pub fn slice_seconds(buffer: &AudioBuffer, start_s: f64, end_s: f64) -> AudioBuffer {
    let start = ((start_s * buffer.sample_rate as f64) as usize * buffer.channels)
        .min(buffer.samples.len());
    let end = ((end_s * buffer.sample_rate as f64) as usize * buffer.channels)
        .min(buffer.samples.len());
    AudioBuffer::new(
        buffer.samples[start..end].to_vec(),
        buffer.sample_rate,
        buffer.channels,
    )
}

/// Mix seeded white noise into a signal at the given signal-to-noise
/// ratio in dB.
pub fn with_noise(signal: &AudioBuffer, snr_db: f64, seed: u64) -> AudioBuffer {
    let signal_power: f64 = signal
        .samples
        .iter()
        .map(|&s| s as f64 * s as f64)
        .sum::<f64>()
        / signal.samples.len().max(1) as f64;
    // Uniform noise in [-1, 1) has power 1/3.
    let target_noise_power = signal_power / 10f64.powf(snr_db / 10.0);
    let scale = (target_noise_power * 3.0).sqrt() as f32;

    let mut rng = StdRng::seed_from_u64(seed);
    let samples = signal
        .samples
        .iter()
        .map(|&s| (s + rng.gen_range(-1.0f32..1.0) * scale).clamp(-1.0, 1.0))
        .collect();
    AudioBuffer::new(samples, signal.sample_rate, signal.channels)
}
