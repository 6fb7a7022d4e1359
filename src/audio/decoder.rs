// src/audio/decoder.rs
//
// Symphonia-based decoding of wav/mp3/flac byte streams into PCM
// buffers. Format dispatch happens here at the boundary via the
// AudioFormat tag; the rest of the pipeline only ever sees AudioBuffer.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioBuffer, AudioFormat};
use crate::error::{Error, Result};

/// Decode an in-memory byte stream of the given format.
pub fn decode_bytes(bytes: &[u8], format: AudioFormat) -> Result<AudioBuffer> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());
    decode_source(Box::new(cursor), hint)
}

/// Decode an audio file, inferring the format from its extension.
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "cannot determine audio format of {}",
                path.display()
            ))
        })?;
    let format = AudioFormat::from_extension(ext)?;

    let file = File::open(path)?;
    let mut hint = Hint::new();
    hint.with_extension(format.extension());
    decode_source(Box::new(file), hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::InvalidInput(format!("failed to probe audio stream: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::InvalidInput("no decodable audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::InvalidInput("stream does not declare a sample rate".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);
    if channels == 0 {
        return Err(Error::InvalidInput("stream reports zero channels".to_string()));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::InvalidInput(format!("no decoder for audio codec: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(symphonia::core::errors::Error::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(Error::InvalidInput(format!(
                    "error reading audio stream at sample {}: {e}",
                    samples.len()
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(buf) => buf,
            // Recoverable corruption inside one packet; skip it.
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => {
                return Err(Error::InvalidInput(format!(
                    "decode failure at sample {}: {e}",
                    samples.len()
                )))
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(capacity, spec));
        }
        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(Error::InvalidInput(
            "no audio samples decoded from stream".to_string(),
        ));
    }

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}
