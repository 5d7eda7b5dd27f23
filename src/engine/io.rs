//! WAV file I/O for Deckflow
//!
//! Decodes WAV clips into [`MemorySource`]s matched to the engine format
//! (channel count and sample rate) and writes rendered mixes back out.
//! Sample rate conversion uses linear interpolation.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::source::MemorySource;
use crate::error::{DeckflowError, Result};

/// Bit depth used when writing rendered output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    Int16,
    Int24,
    #[default]
    Float32,
}

/// Decode a WAV file into an in-memory source in the engine's format
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file or has no samples
/// * `UnsupportedFormat` - If the audio has more than 2 channels
pub fn load_wav(path: &Path, target_sample_rate: u32, target_channels: usize) -> Result<MemorySource> {
    if !path.exists() {
        return Err(DeckflowError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| DeckflowError::InvalidAudio {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > 2 {
        return Err(DeckflowError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.len() < channels {
        return Err(DeckflowError::InvalidAudio {
            reason: format!("{} contains no samples", path.display()),
        });
    }

    let mut planar = deinterleave(&interleaved, channels);
    planar = remix(planar, target_channels);
    if spec.sample_rate != target_sample_rate {
        let ratio = target_sample_rate as f64 / spec.sample_rate as f64;
        planar = planar.iter().map(|ch| resample_linear(ch, ratio)).collect();
    }

    log::debug!(
        "Decoded {}: {}ch {}Hz -> {}ch {}Hz, {} frames",
        path.display(),
        channels,
        spec.sample_rate,
        target_channels,
        target_sample_rate,
        planar.first().map_or(0, Vec::len)
    );

    Ok(MemorySource::new(
        interleave(&planar),
        target_channels,
        target_sample_rate,
    ))
}

/// Write interleaved samples to a WAV file
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    bit_depth: BitDepth,
) -> Result<()> {
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: match bit_depth {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        },
        sample_format: match bit_depth {
            BitDepth::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        },
    };

    let mut writer = WavWriter::create(path, spec)?;
    match bit_depth {
        BitDepth::Int16 => {
            for &sample in samples {
                writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?;
            }
        }
        BitDepth::Int24 => {
            for &sample in samples {
                // 24-bit stored as i32 in hound
                writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)?;
            }
        }
        BitDepth::Float32 => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decoded: std::result::Result<Vec<f32>, hound::Error> = match sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect(),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect(),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect(),
            // 24-bit stored as i32 in hound
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect(),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect(),
            _ => {
                return Err(DeckflowError::UnsupportedFormat {
                    format: format!("{}-bit integer audio", bits_per_sample),
                })
            }
        },
    };

    decoded.map_err(|e| DeckflowError::InvalidAudio {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
    })
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = channels.first() else {
        return Vec::new();
    };

    let frames = first.len();
    let mut result = Vec::with_capacity(frames * channels.len());
    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}

/// Match the channel count: mono is duplicated, stereo is averaged down
fn remix(planar: Vec<Vec<f32>>, target_channels: usize) -> Vec<Vec<f32>> {
    let target_channels = target_channels.max(1);
    if planar.len() == target_channels {
        return planar;
    }

    let frames = planar.first().map_or(0, Vec::len);
    let mono: Vec<f32> = (0..frames)
        .map(|i| planar.iter().map(|ch| ch[i]).sum::<f32>() / planar.len() as f32)
        .collect();
    vec![mono; target_channels]
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::source::AudioSource;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    #[test]
    fn test_interleave_deinterleave() {
        let interleaved = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let planar = deinterleave(&interleaved, 2);
        assert_eq!(planar, vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]);
        assert_eq!(interleave(&planar), interleaved);
    }

    #[test]
    fn test_remix_mono_to_stereo_and_back() {
        let stereo = remix(vec![vec![0.5, 0.25]], 2);
        assert_eq!(stereo, vec![vec![0.5, 0.25], vec![0.5, 0.25]]);

        let mono = remix(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 1);
        assert_eq!(mono, vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_resample_linear_upsample() {
        let output = resample_linear(&[0.0, 1.0], 2.0);
        assert_eq!(output.len(), 4);
        assert_abs_diff_eq!(output[1], 0.5);
        assert_abs_diff_eq!(output[3], 1.0);
    }

    #[test]
    fn test_write_then_load_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let samples: Vec<f32> = (0..2000).map(|i| (i as f32 / 2000.0) - 0.5).collect();

        write_wav(&path, &samples, 2, 44100, BitDepth::Float32).unwrap();
        let source = load_wav(&path, 44100, 2).unwrap();

        assert_eq!(source.len_frames(), 1000);
        assert_eq!(source.channels(), 2);
        assert_eq!(source.samples(), samples.as_slice());
    }

    #[test]
    fn test_load_mono_16bit_upmixes_and_resamples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let samples = vec![0.25_f32; 22050];

        write_wav(&path, &samples, 1, 22050, BitDepth::Int16).unwrap();
        let source = load_wav(&path, 44100, 2).unwrap();

        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.len_frames(), 44100);
        for sample in source.samples() {
            assert_abs_diff_eq!(*sample, 0.25, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_wav(Path::new("/nonexistent/clip.wav"), 44100, 2).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_load_garbage_is_invalid_audio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let err = load_wav(&path, 44100, 2).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }
}
