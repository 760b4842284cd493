use std::io::Cursor;
use anyhow::{Context, Result};
use base64::Engine as _;
use rubato::{SincFixedIn, SincInterpolationType, SincInterpolationParameters, WindowFunction, Resampler};

use super::AudioBuffer;

/// Narration arrives as base64 little-endian i16 PCM, mono, 24kHz.
pub const NARRATION_SAMPLE_RATE: u32 = 24000;

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("Invalid base64 payload")
}

pub fn pcm16_to_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        anyhow::bail!("PCM16 payload has odd length ({} bytes)", bytes.len());
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

pub fn decode_narration(encoded: &str) -> Result<AudioBuffer> {
    let bytes = decode_base64(encoded)?;
    let samples = pcm16_to_f32(&bytes)?;
    Ok(AudioBuffer {
        samples,
        sample_rate: NARRATION_SAMPLE_RATE,
    })
}

/// Decodes a 16-bit WAV blob, mixing down to mono.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).context("Invalid WAV header")?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        anyhow::bail!(
            "Unsupported WAV format: {:?} {} bits",
            spec.sample_format,
            spec.bits_per_sample
        );
    }

    let interleaved = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .context("Truncated WAV data")?;

    let channels = spec.channels.max(1) as usize;
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().map(|&s| s as f32 / 32768.0).sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate: spec.sample_rate,
    })
}

pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0,
        params,
        samples.len(),
        1, // mono
    )?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None)?;

    Ok(output.into_iter().next().unwrap_or_default())
}
