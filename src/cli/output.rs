//! Terminal output for CLI results

use colorful::Colorful;

use crate::audio::{self, AudioBuffer, Spectrogram};
use crate::index::TrackMetadata;
use crate::matcher::Match;

pub fn print_audio_info(name: &str, format: &str, buffer: &AudioBuffer) {
    println!("\nAudio Information:");
    println!("File:        {name}");
    println!("Format:      {format}");
    println!("Channels:    {}", buffer.channels);
    println!("Sample Rate: {} Hz", buffer.sample_rate);
    println!("Duration:    {:.2} seconds", buffer.duration_secs());
    println!("Samples:     {}", buffer.samples.len());

    println!("\nAudio Statistics:");
    println!("RMS:                {:.6}", audio::rms(&buffer.samples));
    println!("Energy:             {:.6}", audio::energy(&buffer.samples));
    println!(
        "Zero Crossing Rate: {:.6}",
        audio::zero_crossing_rate(&buffer.samples)
    );
}

pub fn print_spectrogram_info(spec: &Spectrogram) {
    println!("\nSpectrogram Information:");
    println!("Time Bins: {}", spec.time_bins());
    println!("Freq Bins: {}", spec.freq_bins());
    if let (Some(t0), Some(t1)) = (spec.time_points().first(), spec.time_points().last()) {
        println!("Time Range: {t0:.2} - {t1:.2} seconds");
    }
    if let (Some(f0), Some(f1)) = (spec.freq_points().first(), spec.freq_points().last()) {
        println!("Freq Range: {f0:.2} - {f1:.2} Hz");
    }
}

pub fn print_matches(matches: &[Match]) {
    if matches.is_empty() {
        println!("{}", "No match found.".color(colorful::Color::Yellow));
        return;
    }

    println!("Matches:");
    for (rank, m) in matches.iter().enumerate() {
        let confidence = format!("{:.0}%", m.confidence * 100.0);
        println!(
            "{}. {} {} (offset {:+.2}s, {} aligned vectors)",
            rank + 1,
            m.track_id.as_str().green(),
            confidence,
            m.time_offset_s,
            m.matched_vectors
        );
    }
}

pub fn print_tracks(tracks: &[TrackMetadata]) {
    if tracks.is_empty() {
        println!("No tracks in the index.");
        return;
    }

    println!("{} track(s):", tracks.len());
    for t in tracks {
        let label = match (t.title.is_empty(), t.artist.is_empty()) {
            (false, false) => format!("{} - {}", t.artist, t.title),
            (false, true) => t.title.clone(),
            _ => "(untitled)".to_string(),
        };
        println!(
            "  {}  {}  {:.1}s",
            t.track_id.as_str().color(colorful::Color::Cyan),
            label,
            t.duration_s
        );
    }
}
