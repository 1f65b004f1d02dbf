//! Audio file I/O for fxvariants
//!
//! Decodes WAV, MP3 and OGG/Vorbis files into a mono [`AudioBuffer`] and
//! encodes buffers back to 16-bit mono WAV.
//!
//! WAV goes through `hound`; compressed formats go through `symphonia`.
//! Multi-channel audio is downmixed by averaging the channels of each frame.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{FxError, Result};

/// Full-scale magnitude of signed 16-bit PCM
pub const I16_FULL_SCALE: f32 = 32768.0;

// ============================================================================
// Formats
// ============================================================================

/// Audio container formats known to the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Ogg,
}

impl AudioFormat {
    /// Parse a format from a file extension (case-insensitive, leading dot allowed)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    /// Detect the format of a path from its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Whether buffers can be encoded into this container
    pub fn can_encode(&self) -> bool {
        matches!(self, AudioFormat::Wav)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| FxError::UnsupportedFormat {
            format: s.to_string(),
        })
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode an audio file into a mono buffer
///
/// The container is chosen from the file extension; files without a known
/// extension are sniffed from their contents.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `Decode` - If the file is not a parseable audio container
/// * `EmptyAudio` - If the container holds no samples
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    decode_file_limited(path, None)
}

/// Decode an audio file, rejecting sources longer than `max_duration_secs`
pub fn decode_file_limited(path: &Path, max_duration_secs: Option<f64>) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(FxError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    let label = path.display().to_string();
    decode_bytes(&bytes, AudioFormat::from_path(path), &label, max_duration_secs)
}

/// Decode in-memory audio bytes
///
/// `label` names the source in error messages.
pub fn decode_bytes(
    bytes: &[u8],
    format: Option<AudioFormat>,
    label: &str,
    max_duration_secs: Option<f64>,
) -> Result<AudioBuffer> {
    let is_riff = bytes.len() >= 4 && &bytes[..4] == b"RIFF";
    match format {
        Some(AudioFormat::Wav) => decode_wav(bytes, label, max_duration_secs),
        None if is_riff => decode_wav(bytes, label, max_duration_secs),
        other => decode_compressed(bytes, other, label, max_duration_secs),
    }
}

fn check_duration(label: &str, frames: u64, sample_rate: u32, limit: Option<f64>) -> Result<()> {
    if let Some(max) = limit {
        let duration = frames as f64 / sample_rate.max(1) as f64;
        if duration > max {
            return Err(FxError::Decode {
                path: label.to_string(),
                reason: format!("duration {:.1}s exceeds limit of {:.1}s", duration, max),
                source: None,
            });
        }
    }
    Ok(())
}

fn decode_wav(bytes: &[u8], label: &str, max_duration_secs: Option<f64>) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| FxError::decode(label, format!("Failed to open WAV data: {}", e), e))?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(FxError::UnsupportedFormat {
            format: "WAV with zero channels".to_string(),
        });
    }
    check_duration(label, reader.duration() as u64, spec.sample_rate, max_duration_secs)?;

    let interleaved = read_samples_as_f32(reader, spec, label)?;
    let mono = downmix(&interleaved, spec.channels as usize);
    AudioBuffer::new(mono, spec.sample_rate)
}

/// Read samples from a WAV reader and convert to f32
///
/// Integer PCM is divided by its full-scale magnitude (32768 for 16-bit);
/// float data is passed through unscaled.
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    spec: WavSpec,
    label: &str,
) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| FxError::decode(label, format!("Failed to read samples: {}", e), e);
    match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => 128.0,
                16 => I16_FULL_SCALE,
                24 => 8_388_608.0,
                32 => 2_147_483_648.0,
                bits => {
                    return Err(FxError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(read_err)
        }
    }
}

fn decode_compressed(
    bytes: &[u8],
    format: Option<AudioFormat>,
    label: &str,
    max_duration_secs: Option<f64>,
) -> Result<AudioBuffer> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(fmt) = format {
        hint.with_extension(fmt.extension());
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FxError::decode(label, "Unrecognized audio container", e))?;
    let mut reader = detected.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| FxError::Decode {
            path: label.to_string(),
            reason: "No decodable audio track".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    if let (Some(frames), Some(rate)) = (track.codec_params.n_frames, sample_rate) {
        check_duration(label, frames, rate, max_duration_secs)?;
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| FxError::decode(label, "Unsupported codec", e))?;

    let mut mono = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(FxError::decode(label, "Failed to read packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let rate = *sample_rate.get_or_insert(spec.rate);
                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                mono.extend(downmix(samples.samples(), spec.channels.count()));
                check_duration(label, mono.len() as u64, rate, max_duration_secs)?;
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!("{}: skipping undecodable packet: {}", label, msg);
            }
            Err(e) => return Err(FxError::decode(label, "Failed to decode packet", e)),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| FxError::Decode {
        path: label.to_string(),
        reason: "Stream has no sample rate".to_string(),
        source: None,
    })?;
    AudioBuffer::new(mono, sample_rate)
}

/// Average interleaved frames down to one channel
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// ============================================================================
// Encoding
// ============================================================================

/// Convert a float sample to signed 16-bit PCM
///
/// Values outside [-1.0, 1.0] are clamped rather than wrapped.
#[inline]
pub fn quantize_i16(sample: f32) -> i16 {
    (sample * I16_FULL_SCALE).clamp(-32768.0, 32767.0) as i16
}

/// Encode a buffer as 16-bit mono WAV bytes at the buffer's sample rate
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in buffer.samples() {
            writer.write_sample(quantize_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encode a buffer into the requested container
pub fn encode(buffer: &AudioBuffer, format: AudioFormat) -> Result<Vec<u8>> {
    match format {
        AudioFormat::Wav => encode_wav(buffer),
        other => Err(FxError::UnsupportedFormat {
            format: format!("{} encoding", other),
        }),
    }
}

/// Encode a buffer and write it to `path`
pub fn write_audio(buffer: &AudioBuffer, path: &Path, format: AudioFormat) -> Result<()> {
    let bytes = encode(buffer, format)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Re-encode `path` into `format` next to the original and remove the original
///
/// Returns the path of the converted file. Files already in `format` are left
/// untouched. An existing file at the converted path is never overwritten;
/// that case fails with an `AlreadyExists` I/O error before anything is decoded.
pub fn transcode_in_place(
    path: &Path,
    format: AudioFormat,
    max_duration_secs: Option<f64>,
) -> Result<PathBuf> {
    if AudioFormat::from_path(path) == Some(format) {
        return Ok(path.to_path_buf());
    }
    let target = path.with_extension(format.extension());
    if target.exists() {
        return Err(FxError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )));
    }
    let buffer = decode_file_limited(path, max_duration_secs)?;
    write_audio(&buffer, &target, format)?;
    fs::remove_file(path)?;
    Ok(target)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav_fixture(path: &Path, spec: WavSpec, frames: &[Vec<i16>]) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("WAV"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension(".mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("ogg"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_extension("zip"), None);
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_decode_normalizes_i16() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav_fixture(&path, spec, &[vec![16384], vec![-32768], vec![0]]);

        let buffer = decode_file(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.samples(), &[0.5, -1.0, 0.0]);
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav_fixture(&path, spec, &[vec![16384, 0], vec![-16384, -16384]]);

        let buffer = decode_file(&path).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.samples(), &[0.25, -0.5]);
    }

    #[test]
    fn test_decode_float_passthrough() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.75_f32).unwrap();
        writer.write_sample(-1.5_f32).unwrap();
        writer.finalize().unwrap();

        let buffer = decode_file(&path).unwrap();
        assert_eq!(buffer.samples(), &[0.75, -1.5]);
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        fs::write(&path, b"definitely not a riff header").unwrap();

        let err = decode_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_unknown_bytes_is_decode_error() {
        let err = decode_bytes(&[0u8; 64], Some(AudioFormat::Mp3), "noise.mp3", None).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/file.wav")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_duration_limit() {
        let buffer = AudioBuffer::sine_wave(440.0, 1.0, 8000).unwrap();
        let bytes = encode_wav(&buffer).unwrap();
        let err = decode_bytes(&bytes, Some(AudioFormat::Wav), "long.wav", Some(0.5)).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
        assert!(decode_bytes(&bytes, Some(AudioFormat::Wav), "long.wav", Some(2.0)).is_ok());
    }

    #[test]
    fn test_roundtrip_within_quantization() {
        let buffer = AudioBuffer::sine_wave(440.0, 0.25, 44100).unwrap();
        let bytes = encode_wav(&buffer).unwrap();
        let decoded = decode_bytes(&bytes, Some(AudioFormat::Wav), "mem", None).unwrap();

        assert_eq!(decoded.sample_rate(), 44100);
        assert_eq!(decoded.len(), buffer.len());
        for (a, b) in buffer.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() <= 1.0 / I16_FULL_SCALE);
        }
    }

    #[test]
    fn test_quantize_clamps() {
        assert_eq!(quantize_i16(1.0), 32767);
        assert_eq!(quantize_i16(4.0), 32767);
        assert_eq!(quantize_i16(-1.0), -32768);
        assert_eq!(quantize_i16(-3.0), -32768);
        assert_eq!(quantize_i16(0.5), 16384);
    }

    #[test]
    fn test_encode_rejects_mp3() {
        let buffer = AudioBuffer::new(vec![0.0; 8], 8000).unwrap();
        let err = encode(&buffer, AudioFormat::Mp3).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_transcode_keeps_matching_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.wav");
        let buffer = AudioBuffer::new(vec![0.1; 16], 8000).unwrap();
        write_audio(&buffer, &path, AudioFormat::Wav).unwrap();

        let out = transcode_in_place(&path, AudioFormat::Wav, None).unwrap();
        assert_eq!(out, path);
        assert!(path.exists());
    }

    #[test]
    fn test_transcode_failure_leaves_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"ID3 but nothing else").unwrap();

        assert!(transcode_in_place(&path, AudioFormat::Wav, None).is_err());
        assert!(path.exists());
        assert!(!dir.path().join("song.wav").exists());
    }

    #[test]
    fn test_transcode_refuses_existing_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("take.mp3");
        let existing = dir.path().join("take.wav");
        fs::write(&source, b"not really an mp3").unwrap();
        fs::write(&existing, b"keep me").unwrap();

        let err = transcode_in_place(&source, AudioFormat::Wav, None).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert_eq!(fs::read(&existing).unwrap(), b"keep me");
        assert!(source.exists());
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_decode_mp3_fixture() {
        let buffer = decode_file(&fixture("clip.mp3")).unwrap();
        assert_eq!(buffer.sample_rate(), 22050);
        assert!(buffer.len() > 20_000);
        assert!(buffer.samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_decode_ogg_fixture() {
        let buffer = decode_file(&fixture("silence.ogg")).unwrap();
        assert_eq!(buffer.sample_rate(), 8000);
        assert!(!buffer.is_empty());
        assert!(buffer.samples().iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_transcode_ogg_to_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silence.ogg");
        fs::copy(fixture("silence.ogg"), &path).unwrap();

        let out = transcode_in_place(&path, AudioFormat::Wav, None).unwrap();
        assert_eq!(out, dir.path().join("silence.wav"));
        assert!(!path.exists());

        let converted = decode_file(&out).unwrap();
        assert_eq!(converted.sample_rate(), 8000);
        assert!(!converted.is_empty());
    }
}
