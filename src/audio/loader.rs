use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::types::{AudioFormat, LoadedAudio, SampleBuffer};
use crate::error::{AudioError, Result, TrackerError};

/// Decodes audio files into mono sample buffers
///
/// This is the only ingestion path into the analysis core. It either yields a
/// validated [`SampleBuffer`] or fails; it never retries with another decoder.
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file without blocking the async runtime
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<LoadedAudio> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::load_blocking(&path))
            .await
            .map_err(|e| TrackerError::generic(format!("decoder task failed: {}", e)))?
    }

    /// Load an audio file on the current thread
    pub fn load_blocking<P: AsRef<Path>>(path: P) -> Result<LoadedAudio> {
        let path = path.as_ref();
        let extension = Self::detect_format(path).unwrap_or_default();

        match extension.as_str() {
            "wav" => Self::load_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::load_with_symphonia(path),
            _ => Err(AudioError::UnsupportedFormat { format: extension }.into()),
        }
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<LoadedAudio> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string(),
        };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| Self::int_to_float(s, bit_depth)))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| load_failed())?
            }
        };

        tracing::debug!(
            "Decoded WAV {:?}: {} Hz, {} channels, {} bits",
            path,
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );

        Ok(LoadedAudio {
            buffer: SampleBuffer::from_interleaved(&interleaved, spec.channels, spec.sample_rate)?,
            source_channels: spec.channels,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
        })
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<LoadedAudio> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string(),
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a probe hint using the file extension
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;

        let mut format = probed.format;

        // Find the first audio track with a known (decodable) codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.ok_or_else(|| AudioError::InvalidParameters {
            details: "No sample rate found".to_string(),
        })?;

        let channels = codec_params
            .channels
            .ok_or_else(|| AudioError::InvalidParameters {
                details: "No channel information found".to_string(),
            })?
            .count() as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut interleaved = Vec::new();
        let mut decode_buffer: Option<DecodeBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => {
                    tracing::warn!("Stopping decode of {:?} early: {}", path, e);
                    break;
                }
            };

            // Consume any new metadata
            while !format.metadata().is_latest() {
                format.metadata().pop();
            }

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = decoded.capacity() as u64;
                    let spec = *decoded.spec();
                    let needed = frames as usize * spec.channels.count();

                    let buffer = decode_buffer.get_or_insert_with(|| DecodeBuffer::new(frames, spec));
                    if buffer.capacity() < needed {
                        *buffer = DecodeBuffer::new(frames, spec);
                    }
                    buffer.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("Skipping undecodable packet in {:?}: {}", path, e);
                    continue;
                }
                Err(_) => break,
            }
        }

        tracing::debug!(
            "Decoded {:?}: {} Hz, {} channels, {} interleaved samples",
            path,
            sample_rate,
            channels,
            interleaved.len()
        );

        Ok(LoadedAudio {
            buffer: SampleBuffer::from_interleaved(&interleaved, channels, sample_rate)?,
            source_channels: channels,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: Self::detect_format(path).unwrap_or_else(|| "unknown".to_string()),
                bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", codec_params.codec)),
            },
        })
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            // hound already re-centres unsigned 8-bit data
            8 => sample as f32 / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0, // Default to 16-bit
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_stereo_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(16384i16).unwrap(); // L = 0.5
            writer.write_sample(0i16).unwrap(); // R = 0.0
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("test.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("test.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("test"), None);
    }

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(0, 8), 0.0);
        assert_eq!(AudioLoader::int_to_float(-128, 8), -1.0);
    }

    #[test]
    fn test_wav_is_mixed_down_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_wav(&path, 2205);

        let loaded = AudioLoader::load_blocking(&path).unwrap();
        assert_eq!(loaded.source_channels, 2);
        assert_eq!(loaded.buffer.sample_rate(), 22050);
        assert_eq!(loaded.buffer.len(), 2205);
        assert!(loaded.buffer.samples().iter().all(|&s| (s - 0.25).abs() < 1e-6));
        assert_eq!(loaded.format.bit_depth, Some(16));
    }

    #[tokio::test]
    async fn test_async_load_matches_blocking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_stereo_wav(&path, 512);

        let loaded = AudioLoader::load(&path).await.unwrap();
        assert_eq!(loaded.buffer.len(), 512);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.xyz");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"dummy content").unwrap();

        let result = AudioLoader::load(&file_path).await;
        match result {
            Err(TrackerError::Audio(AudioError::UnsupportedFormat { format })) => {
                assert_eq!(format, "xyz")
            }
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_wav_fails_to_load() {
        let dir = tempdir().unwrap();
        let result = AudioLoader::load_blocking(dir.path().join("missing.wav"));
        assert!(matches!(
            result,
            Err(TrackerError::Audio(AudioError::LoadFailed { .. }))
        ));
    }
}
