//! WAV loading for the embedding pipeline
//!
//! Every input goes through the same path: decode the WAV with `hound`,
//! average all channels down to mono, then convert to the 16 kHz rate the
//! embedding model expects using rubato's FFT resampler.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{FftFixedInOut, Resampler};

use crate::error::{AdbandaError, Result};

/// Sample rate expected by the YAMNet embedding model
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Frames per rubato processing block
const RESAMPLE_CHUNK: usize = 1024;

/// Decoded mono audio at its native rate
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load a WAV file, downmix to mono and resample to 16 kHz.
pub fn load_16k_mono_wav(path: &Path) -> Result<Vec<f32>> {
    let audio = decode_wav_mono(path)?;
    log::debug!(
        "Decoded {:?}: {:.2}s at {}Hz",
        path,
        audio.duration_secs(),
        audio.sample_rate
    );
    resample(&audio.samples, audio.sample_rate, TARGET_SAMPLE_RATE)
}

/// Decode a WAV file to mono f32 samples in [-1.0, 1.0].
pub fn decode_wav_mono(path: &Path) -> Result<MonoAudio> {
    let read_err = |source| AdbandaError::AudioRead {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(read_err)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(AdbandaError::UnsupportedFormat(format!(
            "{:?} declares zero channels",
            path
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AdbandaError::UnsupportedFormat(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(read_err)?
        }
    };

    Ok(MonoAudio {
        samples: downmix(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

/// Average interleaved channels into a single mono channel
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio between two rates.
///
/// The resampler's group delay is trimmed and the output is cut to
/// `len * to_rate / from_rate` samples, so the result lines up with the input.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AdbandaError::Resample(format!(
            "invalid rates {} -> {}",
            from_rate, to_rate
        )));
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)
            .map_err(|e| AdbandaError::Resample(e.to_string()))?;

    let chunk_size = resampler.input_frames_max();
    let delay = resampler.output_delay();
    let expected_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;

    let mut output = Vec::with_capacity(expected_len + delay + chunk_size);
    let mut padded = vec![0.0f32; chunk_size];

    // Extra zero chunks flush the samples still held back by the delay line
    let flush_chunks = delay.div_ceil(resampler.output_frames_max()) + 1;
    let chunks = samples
        .chunks(chunk_size)
        .map(Some)
        .chain(std::iter::repeat(None).take(flush_chunks));

    for chunk in chunks {
        padded.iter_mut().for_each(|s| *s = 0.0);
        if let Some(chunk) = chunk {
            padded[..chunk.len()].copy_from_slice(chunk);
        }
        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| AdbandaError::Resample(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    let start = delay.min(output.len());
    let mut output = output.split_off(start);
    output.truncate(expected_len);
    Ok(output)
}
