//! Signed 16- and 24-bit interleaved PCM.
//!
//! Backends exchange little-endian integer PCM with the mixer thread. The
//! mixer renders `f32`; these helpers convert in both directions, clipping
//! out-of-range and non-finite samples instead of wrapping.

/// Integer sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcmFormat {
    /// Signed 16-bit little-endian.
    #[default]
    Pcm16,
    /// Signed 24-bit little-endian, packed in 3 bytes.
    Pcm24,
}

impl PcmFormat {
    /// Bits per sample.
    pub const fn bits(self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
        }
    }

    /// Bytes per sample.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Pcm16 => 2,
            Self::Pcm24 => 3,
        }
    }

    /// Format with the given bit depth.
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            16 => Some(Self::Pcm16),
            24 => Some(Self::Pcm24),
            _ => None,
        }
    }

    /// Largest positive integer sample.
    pub const fn max_int(self) -> i32 {
        match self {
            Self::Pcm16 => i16::MAX as i32,
            Self::Pcm24 => (1 << 23) - 1,
        }
    }

    /// Converts one sample to an integer, clipping to full scale.
    #[inline]
    pub fn to_int(self, sample: f32) -> i32 {
        if sample.is_nan() {
            return 0;
        }
        let max = self.max_int();
        ((sample * max as f32).round() as i32).clamp(-max - 1, max)
    }

    /// Converts one integer sample back to `[-1, 1]`.
    #[inline]
    pub fn to_float(self, value: i32) -> f32 {
        value as f32 / self.max_int() as f32
    }
}

/// Encodes samples into `out`; returns the number of samples written.
///
/// ```rust
/// use aural_io::{PcmFormat, pcm};
///
/// let mut bytes = [0u8; 6];
/// assert_eq!(pcm::encode(PcmFormat::Pcm16, &[1.0, -1.0, 2.0], &mut bytes), 3);
/// assert_eq!(bytes, [0xff, 0x7f, 0x01, 0x80, 0xff, 0x7f]);
/// ```
pub fn encode(format: PcmFormat, samples: &[f32], out: &mut [u8]) -> usize {
    let width = format.bytes();
    let count = samples.len().min(out.len() / width);
    for (sample, dst) in samples.iter().zip(out.chunks_exact_mut(width)).take(count) {
        let bytes = format.to_int(*sample).to_le_bytes();
        dst.copy_from_slice(&bytes[..width]);
    }
    count
}

/// Encodes samples, replacing the contents of `out`.
pub fn encode_into(format: PcmFormat, samples: &[f32], out: &mut Vec<u8>) {
    out.resize(samples.len() * format.bytes(), 0);
    encode(format, samples, out);
}

/// Decodes whole samples from `bytes` into `out`, scaled by `gain`;
/// returns the number of samples written.
pub fn decode(format: PcmFormat, bytes: &[u8], out: &mut [f32], gain: f32) -> usize {
    let width = format.bytes();
    let count = out.len().min(bytes.len() / width);
    for (src, dst) in bytes.chunks_exact(width).zip(out.iter_mut()).take(count) {
        *dst = format.to_float(read_int(format, src)) * gain;
    }
    count
}

/// Reads one little-endian sample, sign-extending 24-bit values.
#[inline]
pub fn read_int(format: PcmFormat, bytes: &[u8]) -> i32 {
    match format {
        PcmFormat::Pcm16 => i32::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        PcmFormat::Pcm24 => i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8,
    }
}
