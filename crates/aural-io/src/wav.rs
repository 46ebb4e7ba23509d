//! WAV files: a file backend and a clip loader for sensor input.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::backend::{Backend, BackendConfig, StateRequest};
use crate::pcm::{self, PcmFormat};
use crate::{Error, Result};

/// A decoded WAV file with interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    /// Interleaved samples in `[-1, 1]`.
    pub samples: Vec<f32>,
    /// Channels per frame.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl WavClip {
    /// Frames in the clip.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Reads a whole WAV file, integer or float, keeping all channels.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<WavClip> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(WavClip {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

enum Stream {
    Closed,
    Writer(WavWriter<BufWriter<File>>),
    Reader(WavReader<BufReader<File>>),
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Closed => "Closed",
            Self::Writer(_) => "Writer",
            Self::Reader(_) => "Reader",
        })
    }
}

/// File backend: playback writes a WAV file, capture reads one.
///
/// The device name passed to [`connect`](Backend::connect) is the file
/// path. A writer negotiates nothing; a reader replaces the requested
/// sample rate, tracks and format with the file's.
#[derive(Debug)]
pub struct WavFileBackend {
    capture: bool,
    path: Option<PathBuf>,
    stream: Stream,
    config: Option<BackendConfig>,
    running: bool,
    frames: u64,
}

impl WavFileBackend {
    /// A backend that records playback into a file.
    pub fn writer() -> Self {
        Self::with_mode(false)
    }

    /// A backend that plays a file back as captured input.
    pub fn reader() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(capture: bool) -> Self {
        Self {
            capture,
            path: None,
            stream: Stream::Closed,
            config: None,
            running: false,
            frames: 0,
        }
    }

    /// Frames written or read so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Path set by [`connect`](Backend::connect).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn finalize(&mut self) -> Result<()> {
        if let Stream::Writer(writer) = std::mem::replace(&mut self.stream, Stream::Closed) {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Backend for WavFileBackend {
    fn name(&self) -> &str {
        "wav"
    }

    fn connect(&mut self, device: Option<&str>) -> Result<()> {
        let path = device.ok_or_else(|| Error::DeviceNotFound("wav backend needs a file path".into()))?;
        self.finalize()?;
        self.path = Some(PathBuf::from(path));
        Ok(())
    }

    fn setup(&mut self, config: &mut BackendConfig) -> Result<()> {
        let path = self.path.clone().ok_or(Error::NotConnected)?;
        self.finalize()?;

        if self.capture {
            let reader = WavReader::open(&path)?;
            let spec = reader.spec();
            if spec.sample_format != SampleFormat::Int {
                return Err(Error::UnsupportedFormat(format!(
                    "{}: float samples, expected 16 or 24 bit PCM",
                    path.display()
                )));
            }
            config.format = PcmFormat::from_bits(spec.bits_per_sample).ok_or_else(|| {
                Error::UnsupportedFormat(format!("{}-bit PCM", spec.bits_per_sample))
            })?;
            config.sample_rate = spec.sample_rate;
            config.tracks = spec.channels;
            self.stream = Stream::Reader(reader);
        } else {
            let spec = WavSpec {
                channels: config.tracks,
                sample_rate: config.sample_rate,
                bits_per_sample: config.format.bits(),
                sample_format: SampleFormat::Int,
            };
            self.stream = Stream::Writer(WavWriter::create(&path, spec)?);
        }

        tracing::info!(
            path = %path.display(),
            sample_rate = config.sample_rate,
            tracks = config.tracks,
            bits = config.format.bits(),
            "wav stream ready"
        );
        self.config = Some(*config);
        self.running = true;
        self.frames = 0;
        Ok(())
    }

    fn playback(&mut self, pcm: &[u8], gain: f32) -> Result<usize> {
        let config = self.config.ok_or(Error::NotConnected)?;
        let Stream::Writer(writer) = &mut self.stream else {
            return Err(Error::NotConnected);
        };
        if !self.running {
            return Ok(0);
        }

        let format = config.format;
        let width = format.bytes();
        let whole = pcm.len() - pcm.len() % config.frame_bytes().max(1);
        for chunk in pcm[..whole].chunks_exact(width) {
            let mut value = pcm::read_int(format, chunk);
            if gain != 1.0 {
                value = format.to_int(format.to_float(value) * gain);
            }
            writer.write_sample(value)?;
        }
        self.frames += (whole / config.frame_bytes().max(1)) as u64;
        Ok(whole)
    }

    fn capture(&mut self, pcm: &mut [u8]) -> Result<usize> {
        let config = self.config.ok_or(Error::NotConnected)?;
        let Stream::Reader(reader) = &mut self.stream else {
            return Err(Error::NotConnected);
        };
        if !self.running {
            return Ok(0);
        }

        let format = config.format;
        let width = format.bytes();
        let frame_bytes = config.frame_bytes().max(1);
        let whole = pcm.len() - pcm.len() % frame_bytes;
        let mut written = 0;
        let mut samples = reader.samples::<i32>();
        while written < whole {
            let Some(sample) = samples.next() else {
                break;
            };
            let bytes = sample?.to_le_bytes();
            pcm[written..written + width].copy_from_slice(&bytes[..width]);
            written += width;
        }
        self.frames += (written / frame_bytes) as u64;
        Ok(written)
    }

    fn state(&mut self, request: StateRequest) -> Result<bool> {
        match request {
            StateRequest::Pause => self.running = false,
            StateRequest::Resume => self.running = !matches!(self.stream, Stream::Closed),
            StateRequest::Query => {}
        }
        Ok(self.running)
    }

    fn close(&mut self) -> Result<()> {
        self.running = false;
        self.finalize()
    }
}

impl Drop for WavFileBackend {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!(error = %e, "failed to finalize wav file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn config(format: PcmFormat) -> BackendConfig {
        BackendConfig {
            sample_rate: 22050,
            tracks: 2,
            format,
            ..BackendConfig::default()
        }
    }

    #[test]
    fn writer_produces_readable_pcm24() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let mut backend = WavFileBackend::writer();
        backend.connect(Some(path)).unwrap();
        let mut cfg = config(PcmFormat::Pcm24);
        backend.setup(&mut cfg).unwrap();

        let mut bytes = Vec::new();
        pcm::encode_into(PcmFormat::Pcm24, &[0.5, -0.5, 0.25, -0.25, 0.1], &mut bytes);
        assert_eq!(backend.playback(&bytes, 1.0).unwrap(), 12, "partial frame dropped");
        backend.close().unwrap();

        let clip = read_wav(file.path()).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.sample_rate, 22050);
        assert_eq!(clip.frames(), 2);
        assert!((clip.samples[0] - 0.5).abs() < 1e-6);
        assert!((clip.samples[3] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn reader_negotiates_file_format() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        {
            let mut writer = WavFileBackend::writer();
            writer.connect(Some(path)).unwrap();
            writer.setup(&mut config(PcmFormat::Pcm16)).unwrap();
            let mut bytes = Vec::new();
            pcm::encode_into(PcmFormat::Pcm16, &[0.5; 8], &mut bytes);
            writer.playback(&bytes, 0.5).unwrap();
        }

        let mut reader = WavFileBackend::reader();
        reader.connect(Some(path)).unwrap();
        let mut cfg = BackendConfig {
            format: PcmFormat::Pcm24,
            sample_rate: 96000,
            tracks: 6,
            ..BackendConfig::default()
        };
        reader.setup(&mut cfg).unwrap();
        assert_eq!((cfg.sample_rate, cfg.tracks, cfg.format), (22050, 2, PcmFormat::Pcm16));

        let mut buf = [0u8; 64];
        assert_eq!(reader.capture(&mut buf).unwrap(), 16);
        let mut out = [0.0f32; 8];
        pcm::decode(PcmFormat::Pcm16, &buf[..16], &mut out, 1.0);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-3));
        assert_eq!(reader.capture(&mut buf).unwrap(), 0);
    }

    #[test]
    fn connect_requires_a_path() {
        let mut backend = WavFileBackend::writer();
        assert!(matches!(backend.connect(None), Err(Error::DeviceNotFound(_))));
        assert!(matches!(
            backend.setup(&mut BackendConfig::default()),
            Err(Error::NotConnected)
        ));
    }
}
