//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::audio::WindowKind;

/// Landmark-based audio fingerprinting and track identification
#[derive(Parser, Debug, Clone)]
#[command(name = "audioprint")]
#[command(version = "0.1.0")]
#[command(about = "Fingerprint audio tracks and identify clips", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print stream information and signal statistics for an audio file
    Audioinfo {
        /// Target sample rate for resampling
        #[arg(long, default_value = "44100")]
        samplerate: u32,

        /// Convert audio to mono
        #[arg(long)]
        mono: bool,

        /// Audio file (wav, mp3 or flac)
        input: PathBuf,
    },

    /// Render a spectrogram image of an audio file
    Spectrogram {
        /// Window size for the FFT
        #[arg(long, default_value = "1024")]
        window: usize,

        /// Hop size between frames
        #[arg(long, default_value = "512")]
        hop: usize,

        /// Window function type
        #[arg(long = "window-type", value_enum, default_value = "hamming")]
        window_type: WindowTypeArg,

        /// Apply logarithmic scaling
        #[arg(long)]
        log: bool,

        /// Normalize each frame to peak 1.0
        #[arg(long)]
        normalize: bool,

        /// Overlay extracted landmarks on the image
        #[arg(long)]
        peaks: bool,

        /// Output directory for the image
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Audio file (wav, mp3 or flac)
        input: PathBuf,
    },

    /// Ingest a reference track into an index snapshot
    Add {
        /// Index snapshot directory (created if missing)
        #[arg(long)]
        index: PathBuf,

        /// Track title
        #[arg(long, default_value = "")]
        title: String,

        /// Track artist
        #[arg(long, default_value = "")]
        artist: String,

        /// Explicit track id (a UUID is generated otherwise)
        #[arg(long)]
        id: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Audio file (wav, mp3 or flac)
        input: PathBuf,
    },

    /// Identify a query clip against an index snapshot
    Identify {
        /// Index snapshot directory
        #[arg(long)]
        index: PathBuf,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,

        /// Audio file (wav, mp3 or flac)
        input: PathBuf,
    },

    /// List the tracks in an index snapshot
    Tracks {
        /// Index snapshot directory
        #[arg(long)]
        index: PathBuf,

        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a track from an index snapshot
    Remove {
        /// Index snapshot directory
        #[arg(long)]
        index: PathBuf,

        /// Track id to remove
        track_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WindowTypeArg {
    Hamming,
    Hann,
    Blackman,
    Rectangular,
}

impl From<WindowTypeArg> for WindowKind {
    fn from(arg: WindowTypeArg) -> Self {
        match arg {
            WindowTypeArg::Hamming => WindowKind::Hamming,
            WindowTypeArg::Hann => WindowKind::Hann,
            WindowTypeArg::Blackman => WindowKind::Blackman,
            WindowTypeArg::Rectangular => WindowKind::Rectangular,
        }
    }
}
