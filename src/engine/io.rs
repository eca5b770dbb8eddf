//! Audio loading and export for Songscope
//!
//! The loader decodes WAV or MP3 input with symphonia, mixes it down to
//! mono, resamples to the configured analysis rate and peak-normalizes the
//! result. Sample rate conversion uses linear interpolation.
//!
//! Exporting a normalized copy or separated stems is optional caller policy;
//! [`export_wav`] writes 32-bit float WAV files with hound.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::engine::buffer::AudioBuffer;
use crate::error::{Result, SongscopeError};

// ============================================================================
// Format allow-list
// ============================================================================

/// Container formats accepted by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Map a file extension (case-insensitive) onto the allow-list
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    /// Identify the format from the leading bytes of a file
    ///
    /// Recognizes the RIFF/WAVE header, an ID3v2 tag, or a bare MPEG audio
    /// frame sync.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if header.starts_with(b"ID3") {
            return Some(AudioFormat::Mp3);
        }
        if header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0 {
            return Some(AudioFormat::Mp3);
        }
        None
    }

    /// Resolve the format of an input, preferring the sniffed header
    pub fn resolve(header: &[u8], declared_extension: Option<&str>) -> Result<Self> {
        let declared = declared_extension.and_then(AudioFormat::from_extension);

        match (AudioFormat::sniff(header), declared) {
            (Some(sniffed), Some(declared)) if sniffed != declared => {
                warn!(
                    sniffed = sniffed.extension(),
                    declared = declared.extension(),
                    "Declared audio format disagrees with file header, using header"
                );
                Ok(sniffed)
            }
            (Some(sniffed), _) => Ok(sniffed),
            (None, Some(declared)) => Ok(declared),
            (None, None) => Err(SongscopeError::decode(format!(
                "unsupported format{} (allowed: wav, mp3)",
                declared_extension
                    .map(|ext| format!(" '.{}'", ext))
                    .unwrap_or_default()
            ))),
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Audio Loader/Normalizer stage
///
/// Stateless apart from its settings; one instance serves every request.
#[derive(Debug, Clone)]
pub struct Loader {
    target_sample_rate: u32,
    max_input_bytes: u64,
}

impl Loader {
    /// Create a loader from the analysis configuration
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            target_sample_rate: config.sample_rate,
            max_input_bytes: config.max_input_bytes,
        }
    }

    /// Sample rate of every buffer this loader returns
    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode an audio file into a normalized mono buffer
    ///
    /// The file is read once with [`Loader::read_source`] and decoded from
    /// memory.
    ///
    /// # Errors
    /// * `Decode` - if the file is missing, unreadable, larger than the
    ///   configured limit, outside the format allow-list, corrupt, or
    ///   empty after decoding
    pub fn load(&self, path: &Path) -> Result<AudioBuffer> {
        let bytes = self.read_source(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read audio file");
        self.load_bytes(&bytes, path.extension().and_then(|e| e.to_str()))
    }

    /// Read a whole file into memory, enforcing the input size limit
    ///
    /// The size is checked before reading and again on the bytes actually
    /// read, so a file that grows in between is still rejected.
    ///
    /// # Errors
    /// * `Decode` - if the path is missing, not a regular file, unreadable
    ///   or larger than the configured limit
    pub fn read_source(&self, path: &Path) -> Result<Vec<u8>> {
        let cannot_open = |e: std::io::Error| {
            SongscopeError::decode_with(format!("cannot open '{}'", path.display()), e)
        };

        let metadata = std::fs::metadata(path).map_err(cannot_open)?;
        if !metadata.is_file() {
            return Err(SongscopeError::decode(format!(
                "'{}' is not a file",
                path.display()
            )));
        }
        self.check_size(metadata.len())?;

        let file = File::open(path).map_err(cannot_open)?;
        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        file.take(self.max_input_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| {
                SongscopeError::decode_with(format!("cannot read '{}'", path.display()), e)
            })?;
        self.check_size(bytes.len() as u64)?;

        Ok(bytes)
    }

    /// Decode an in-memory upload into a normalized mono buffer
    ///
    /// `declared_extension` is the extension the caller received with the
    /// upload, if any; the header wins when both are available.
    pub fn load_bytes(&self, bytes: &[u8], declared_extension: Option<&str>) -> Result<AudioBuffer> {
        self.check_size(bytes.len() as u64)?;
        if bytes.is_empty() {
            return Err(SongscopeError::decode("input is empty"));
        }

        let format = AudioFormat::resolve(bytes, declared_extension)?;
        debug!(bytes = bytes.len(), format = format.extension(), "Decoding audio upload");

        let (samples, source_rate) = decode_mono(Box::new(Cursor::new(bytes.to_vec())), format)?;
        self.normalize(samples, source_rate)
    }

    /// Resample and peak-normalize already-decoded mono samples
    ///
    /// Feeding a normalized buffer back in is idempotent: the peak stays at
    /// 1.0 and nothing is rescaled twice.
    pub fn normalize(&self, samples: Vec<f32>, source_rate: u32) -> Result<AudioBuffer> {
        if source_rate == 0 {
            return Err(SongscopeError::decode("source sample rate is zero"));
        }
        if samples.is_empty() {
            return Err(SongscopeError::decode("audio contains no samples"));
        }

        let resampled = if source_rate != self.target_sample_rate {
            let ratio = self.target_sample_rate as f64 / source_rate as f64;
            resample_linear(&samples, ratio)
        } else {
            samples
        };

        let buffer = AudioBuffer::new(resampled, self.target_sample_rate)?.peak_normalized();

        debug!(
            samples = buffer.len(),
            sample_rate = buffer.sample_rate(),
            duration_secs = format!("{:.2}", buffer.duration_secs()),
            "Audio normalized"
        );

        Ok(buffer)
    }

    fn check_size(&self, len: u64) -> Result<()> {
        if len > self.max_input_bytes {
            return Err(SongscopeError::decode(format!(
                "input is {} bytes, limit is {} bytes",
                len, self.max_input_bytes
            )));
        }
        Ok(())
    }
}

/// Export a buffer to a 32-bit float mono WAV file
pub fn export_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    for &sample in buffer.samples() {
        writer.write_sample(sample).map_err(hound_to_io)?;
    }
    writer.finalize().map_err(hound_to_io)?;

    debug!(path = %path.display(), samples = buffer.len(), "Exported WAV");
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> SongscopeError {
    match e {
        hound::Error::IoError(io) => SongscopeError::Io(io),
        other => SongscopeError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Decode a media source to mono f32 samples at its native sample rate
fn decode_mono(source: Box<dyn MediaSource>, format: AudioFormat) -> Result<(Vec<f32>, u32)> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SongscopeError::decode_with("failed to probe audio container", e))?;

    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SongscopeError::decode("no audio track found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SongscopeError::decode("audio track has no sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SongscopeError::decode_with("failed to create audio decoder", e))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SongscopeError::decode_with("error reading packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!(reason, "Skipping undecodable packet");
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(SongscopeError::decode_with("failed to decode packet", e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();
        if channels > 1 {
            mono.extend(
                samples
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        } else {
            mono.extend_from_slice(samples);
        }
    }

    if mono.is_empty() {
        return Err(SongscopeError::decode("no audio samples after decoding"));
    }

    debug!(
        samples = mono.len(),
        sample_rate,
        skipped_packets,
        "Decoding complete"
    );

    Ok((mono, sample_rate))
}

/// Linear interpolation resampling
///
/// Linear interpolation aliases when downsampling; acceptable for the
/// coarse descriptors computed downstream.
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil().max(1.0) as usize;
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
    use tempfile::tempdir;
    use test_case::test_case;

    fn write_wav_i16(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn sine(frequency: f32, amplitude: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
        let n = (duration_secs * sample_rate as f32) as usize;
        (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Format resolution
    // ------------------------------------------------------------------------

    #[test_case(b"RIFF\x24\x00\x00\x00WAVEfmt ", Some(AudioFormat::Wav) ; "riff wave header")]
    #[test_case(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00", Some(AudioFormat::Mp3) ; "id3 tag")]
    #[test_case(b"\xFF\xFB\x90\x64\x00\x00\x00\x00\x00\x00\x00\x00", Some(AudioFormat::Mp3) ; "mpeg frame sync")]
    #[test_case(b"fLaC\x00\x00\x00\x22\x00\x00\x00\x00", None ; "flac is not allowed")]
    fn test_sniff(header: &[u8], expected: Option<AudioFormat>) {
        assert_eq!(AudioFormat::sniff(header), expected);
    }

    #[test]
    fn test_resolve_prefers_header() {
        let format = AudioFormat::resolve(b"RIFF\x00\x00\x00\x00WAVE", Some("mp3")).unwrap();
        assert_eq!(format, AudioFormat::Wav);
    }

    #[test]
    fn test_resolve_falls_back_to_extension() {
        let format = AudioFormat::resolve(b"garbage", Some("MP3")).unwrap();
        assert_eq!(format, AudioFormat::Mp3);
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        let result = AudioFormat::resolve(b"garbage", Some("ogg"));
        assert!(matches!(result, Err(SongscopeError::Decode { .. })));
    }

    // ------------------------------------------------------------------------
    // Resampling
    // ------------------------------------------------------------------------

    #[test]
    fn test_resample_linear_upsample() {
        let samples = vec![0.0, 1.0, 0.0];
        let resampled = resample_linear(&samples, 2.0);

        assert!(resampled.len() >= 5);
        assert!((resampled[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_resample_linear_downsample() {
        let samples = vec![0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -0.5];
        let resampled = resample_linear(&samples, 0.5);
        assert_eq!(resampled.len(), 4);
    }

    // ------------------------------------------------------------------------
    // Normalization
    // ------------------------------------------------------------------------

    #[test]
    fn test_normalize_resamples_to_target() {
        let loader = Loader::new(&AnalysisConfig::default());
        let buffer = loader.normalize(sine(440.0, 0.5, 1.0, 44100), 44100).unwrap();

        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.len(), 22050);
        assert!((buffer.peak() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        let loader = Loader::new(&AnalysisConfig::default());
        assert!(matches!(
            loader.normalize(Vec::new(), 22050),
            Err(SongscopeError::Decode { .. })
        ));
    }

    #[test]
    fn test_normalize_keeps_silence() {
        let loader = Loader::new(&AnalysisConfig::default());
        let buffer = loader.normalize(vec![0.0; 4096], 22050).unwrap();
        assert!(buffer.is_silent());
    }

    // ------------------------------------------------------------------------
    // File loading
    // ------------------------------------------------------------------------

    #[test]
    fn test_load_wav_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav_i16(&path, &sine(440.0, 0.25, 0.5, 22050), 22050, 1);

        let loader = Loader::new(&AnalysisConfig::default());
        let buffer = loader.load(&path).unwrap();

        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.len(), 11025);
        assert!(buffer.peak() <= 1.0 + 1e-6);
        assert!((buffer.peak() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_load_wav_stereo_mixes_down() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // Left carries the tone, right is silent
        let tone = sine(440.0, 0.5, 0.25, 22050);
        let interleaved: Vec<f32> = tone.iter().flat_map(|&s| [s, 0.0]).collect();
        write_wav_i16(&path, &interleaved, 22050, 2);

        let loader = Loader::new(&AnalysisConfig::default());
        let buffer = loader.load(&path).unwrap();
        assert_eq!(buffer.len(), tone.len());
    }

    #[test]
    fn test_load_bytes_matches_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav_i16(&path, &sine(220.0, 0.8, 0.3, 22050), 22050, 1);

        let loader = Loader::new(&AnalysisConfig::default());
        let from_file = loader.load(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let from_bytes = loader.load_bytes(&bytes, None).unwrap();

        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let loader = Loader::new(&AnalysisConfig::default());
        let result = loader.load(Path::new("/nonexistent/path/audio.wav"));

        match result.unwrap_err() {
            SongscopeError::Decode { reason, .. } => assert!(reason.contains("nonexistent")),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();

        let loader = Loader::new(&AnalysisConfig::default());
        assert!(matches!(loader.load(&path), Err(SongscopeError::Decode { .. })));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.wav");
        std::fs::write(&path, b"RIFF\x10\x00\x00\x00WAVEjunkjunkjunk").unwrap();

        let loader = Loader::new(&AnalysisConfig::default());
        assert!(matches!(loader.load(&path), Err(SongscopeError::Decode { .. })));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just some text").unwrap();

        let loader = Loader::new(&AnalysisConfig::default());
        assert!(matches!(loader.load(&path), Err(SongscopeError::Decode { .. })));
    }

    #[test]
    fn test_load_rejects_oversized_input() {
        let config = AnalysisConfig {
            max_input_bytes: 16,
            ..AnalysisConfig::default()
        };
        let loader = Loader::new(&config);
        let result = loader.load_bytes(&[0u8; 64], Some("wav"));
        assert!(matches!(result, Err(SongscopeError::Decode { .. })));
    }

    #[test]
    fn test_read_source_rejects_oversized_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.wav");
        std::fs::write(&path, [0u8; 64]).unwrap();

        let config = AnalysisConfig {
            max_input_bytes: 16,
            ..AnalysisConfig::default()
        };
        match Loader::new(&config).read_source(&path) {
            Err(SongscopeError::Decode { reason, .. }) => assert!(reason.contains("limit")),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_read_source_returns_file_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav_i16(&path, &sine(440.0, 0.5, 0.1, 22050), 22050, 1);

        let loader = Loader::new(&AnalysisConfig::default());
        let bytes = loader.read_source(&path).unwrap();
        assert_eq!(bytes, std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_read_source_rejects_directory() {
        let dir = tempdir().unwrap();
        let loader = Loader::new(&AnalysisConfig::default());
        assert!(matches!(
            loader.read_source(dir.path()),
            Err(SongscopeError::Decode { .. })
        ));
    }

    #[test]
    fn test_export_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("normalized.wav");

        let loader = Loader::new(&AnalysisConfig::default());
        let original = loader.normalize(sine(330.0, 0.4, 0.5, 22050), 22050).unwrap();
        export_wav(&original, &path).unwrap();

        let reloaded = loader.load(&path).unwrap();
        assert_eq!(original.len(), reloaded.len());
        for (a, b) in original.samples().iter().zip(reloaded.samples()) {
            assert!((a - b).abs() < 1e-6, "Sample mismatch: {} vs {}", a, b);
        }
    }
}
