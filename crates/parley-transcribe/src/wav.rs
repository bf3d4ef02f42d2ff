//! WAV decoding for uploaded audio.
//!
//! Clients are expected to send mono 16-bit PCM. Other layouts are accepted:
//! multi-channel audio is averaged down to mono and other sample formats are
//! scaled into [-1.0, 1.0], each with a warning.

use std::io::Cursor;

use tracing::warn;

use crate::TranscribeError;

/// Mono samples ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a complete WAV file held in memory.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, TranscribeError> {
    if bytes.is_empty() {
        return Err(TranscribeError::EmptyAudio);
    }

    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| TranscribeError::InvalidAudio(format!("Failed to read WAV header: {}", e)))?;
    let spec = reader.spec();

    if spec.channels != 1 || spec.bits_per_sample != 16 {
        warn!(
            channels = spec.channels,
            bits = spec.bits_per_sample,
            "Expected mono 16-bit WAV; converting"
        );
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1) as u32)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>(),
    }
    .map_err(|e| TranscribeError::InvalidAudio(format!("Failed to read samples: {}", e)))?;

    let channels = spec.channels.max(1) as usize;
    let samples = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        interleaved
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
