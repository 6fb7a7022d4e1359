// src/cli/mod.rs
//
// Command handlers for the audioprint binary. Thin wrappers over the
// library: decode, run the requested pipeline slice, print.

mod args;
mod output;

pub use args::{Args, Command, WindowTypeArg};

use std::path::Path;

use anyhow::{Context, Result};

use crate::api::{AddTrackResponse, IdentifyResponse, ListTracksResponse};
use crate::audio::{self, PreprocessConfig, SpectralConfig};
use crate::cancel::CancelToken;
use crate::corpus::{Corpus, PipelineConfig};
use crate::fingerprint;
use crate::index::IndexConfig;
use crate::render;

pub fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Audioinfo {
            samplerate,
            mono,
            input,
        } => audioinfo(&input, samplerate, mono),
        Command::Spectrogram {
            window,
            hop,
            window_type,
            log,
            normalize,
            peaks,
            output,
            input,
        } => spectrogram(&input, window, hop, window_type, log, normalize, peaks, &output),
        Command::Add {
            index,
            title,
            artist,
            id,
            json,
            input,
        } => add(&index, &input, &title, &artist, id, json),
        Command::Identify { index, json, input } => identify(&index, &input, json),
        Command::Tracks { index, json } => tracks(&index, json),
        Command::Remove { index, track_id } => remove(&index, &track_id),
    }
}

fn audioinfo(input: &Path, samplerate: u32, mono: bool) -> Result<()> {
    let buffer = audio::decode_file(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let config = PreprocessConfig {
        target_sample_rate: samplerate,
        to_mono: mono,
        ..PreprocessConfig::default()
    };
    let prepared = audio::preprocess(&buffer, &config)?;

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let format = input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    output::print_audio_info(&name, &format, &prepared);

    // Spectral analysis needs mono; only report it when available.
    if prepared.channels == 1 {
        let spec =
            audio::compute_spectrogram(&prepared, &SpectralConfig::default(), &CancelToken::new())?;
        output::print_spectrogram_info(&spec);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spectrogram(
    input: &Path,
    window: usize,
    hop: usize,
    window_type: WindowTypeArg,
    log: bool,
    normalize: bool,
    peaks: bool,
    output_dir: &Path,
) -> Result<()> {
    let buffer = audio::decode_file(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let prepared = audio::preprocess(&buffer, &PreprocessConfig::default())?;

    let config = SpectralConfig {
        window_size: window,
        hop_size: hop,
        window: window_type.into(),
        log_scale_base: if log { 10.0 } else { 0.0 },
        normalize_frames: normalize,
    };
    let spec = audio::compute_spectrogram(&prepared, &config, &CancelToken::new())?;

    let img = if peaks {
        let landmarks = fingerprint::extract_peaks(&spec, &Default::default());
        println!("Extracted {} landmarks", landmarks.len());
        render::render_peaks(&spec, &landmarks)?
    } else {
        render::render_spectrogram(&spec)?
    };

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let out_path = output_dir.join(format!("{stem}_spectrogram.png"));
    render::save_png(&img, &out_path)?;

    println!(
        "Wrote {} ({}x{} px)",
        out_path.display(),
        spec.time_bins(),
        spec.freq_bins()
    );
    Ok(())
}

fn add(
    index_path: &Path,
    input: &Path,
    title: &str,
    artist: &str,
    id: Option<String>,
    json: bool,
) -> Result<()> {
    let buffer = audio::decode_file(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let corpus = open_or_create_corpus(index_path)?;
    let title = if title.is_empty() {
        default_title(input)
    } else {
        title.to_string()
    };
    let track_id = corpus.add_track(&buffer, &title, artist, id, &CancelToken::new())?;
    corpus
        .save(index_path)
        .with_context(|| format!("failed to persist index at {}", index_path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&AddTrackResponse::ok(track_id))?
        );
    } else {
        println!("Added track {track_id}");
    }
    Ok(())
}

fn identify(index_path: &Path, input: &Path, json: bool) -> Result<()> {
    let buffer = audio::decode_file(input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let corpus = open_corpus(index_path)?;
    let matches = corpus.identify(&buffer, &CancelToken::new())?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&IdentifyResponse::ok(matches))?
        );
    } else {
        output::print_matches(&matches);
    }
    Ok(())
}

fn tracks(index_path: &Path, json: bool) -> Result<()> {
    let corpus = open_corpus(index_path)?;
    let tracks = corpus.list_tracks()?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&ListTracksResponse::ok(tracks))?
        );
    } else {
        output::print_tracks(&tracks);
    }
    Ok(())
}

fn remove(index_path: &Path, track_id: &str) -> Result<()> {
    let corpus = open_corpus(index_path)?;
    corpus.delete_track(track_id)?;
    corpus
        .save(index_path)
        .with_context(|| format!("failed to persist index at {}", index_path.display()))?;
    println!("Removed track {track_id}");
    Ok(())
}

fn open_corpus(index_path: &Path) -> Result<Corpus> {
    Corpus::open(PipelineConfig::default(), index_path)
        .with_context(|| format!("failed to open index at {}", index_path.display()))
}

fn open_or_create_corpus(index_path: &Path) -> Result<Corpus> {
    if index_path.join("index.json").exists() {
        open_corpus(index_path)
    } else {
        Ok(Corpus::new(
            PipelineConfig::default(),
            IndexConfig::default(),
        )?)
    }
}

fn default_title(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string())
}
