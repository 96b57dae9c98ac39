//! Canonical 44-byte WAV framing for raw PCM

use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Output sample rate in Hz
pub const SAMPLE_RATE: u32 = 16_000;
/// Bytes per sample
pub const SAMPLE_WIDTH: u16 = 2;
/// Number of interleaved channels
pub const NUM_CHANNELS: u16 = 1;
/// Length of the canonical header
pub const HEADER_LEN: usize = 44;

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Shape of a PCM payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub sample_width: u16,
    pub channels: u16,
}

impl Default for PcmSpec {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            sample_width: SAMPLE_WIDTH,
            channels: NUM_CHANNELS,
        }
    }
}

impl PcmSpec {
    pub fn block_align(&self) -> u16 {
        self.channels * self.sample_width
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Playback duration of `pcm_len` bytes
    pub fn duration_of(&self, pcm_len: usize) -> Duration {
        let byte_rate = self.byte_rate().max(1) as f64;
        Duration::from_secs_f64(pcm_len as f64 / byte_rate)
    }
}

/// Growable byte buffer with a cursor, used to lay out binary headers.
///
/// Writes past the end extend the buffer; seeking outside `[0, len]` fails.
#[derive(Debug, Default, Clone)]
pub struct HeaderBuffer {
    pos: usize,
    data: Vec<u8>,
}

impl HeaderBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pos: 0,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Write `bytes` at the cursor and advance it
    pub fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn put_u16_le(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    pub fn put_u32_le(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Write for HeaderBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for HeaderBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => self.pos as i128 + i128::from(offset),
            SeekFrom::End(offset) => self.data.len() as i128 + i128::from(offset),
        };
        if target < 0 || target > self.data.len() as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to an invalid position",
            ));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }
}

/// Build the header for `pcm_len` bytes of default-shaped PCM.
pub fn build_header(pcm_len: usize) -> [u8; HEADER_LEN] {
    build_header_with(PcmSpec::default(), pcm_len)
}

/// Build the header for `pcm_len` bytes of PCM shaped like `spec`.
///
/// The RIFF size field is `36 + pcm_len`, i.e. the file length minus the
/// 8-byte `RIFF` preamble. Sizes above `u32::MAX` saturate.
pub fn build_header_with(spec: PcmSpec, pcm_len: usize) -> [u8; HEADER_LEN] {
    let data_len = u32::try_from(pcm_len).unwrap_or(u32::MAX);
    let riff_len = data_len.saturating_add(HEADER_LEN as u32 - 8);

    let mut buf = HeaderBuffer::with_capacity(HEADER_LEN);
    buf.put(b"RIFF");
    buf.put_u32_le(riff_len);
    buf.put(b"WAVE");
    buf.put(b"fmt ");
    buf.put_u32_le(FMT_CHUNK_LEN);
    buf.put_u16_le(FORMAT_PCM);
    buf.put_u16_le(spec.channels);
    buf.put_u32_le(spec.sample_rate);
    buf.put_u32_le(spec.byte_rate());
    buf.put_u16_le(spec.block_align());
    buf.put_u16_le(spec.bits_per_sample());
    buf.put(b"data");
    buf.put_u32_le(data_len);

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(buf.as_slice());
    header
}

/// Prefix raw PCM with a canonical header.
pub fn wrap_pcm(pcm: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(&build_header(pcm.len()));
    out.extend_from_slice(pcm);
    out
}

/// Extract the PCM payload of a WAV buffer.
///
/// Input that does not start with `RIFF` is assumed to be raw PCM already and
/// is returned unchanged. Truncated or malformed headers never fail: the
/// result degrades to whatever payload can be located, possibly empty.
pub fn strip_header(data: &[u8]) -> &[u8] {
    if !data.starts_with(b"RIFF") {
        return data;
    }
    if data.len() < HEADER_LEN || &data[8..12] != b"WAVE" {
        return &[];
    }

    let mut rest = &data[12..];
    while rest.len() >= 8 {
        let declared = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let available = rest.len() - 8;
        if rest.starts_with(b"data") {
            // Streamed headers leave the size at zero or overstate it.
            if declared == 0 || declared > available {
                return &rest[8..];
            }
            return &rest[8..8 + declared];
        }
        rest = &rest[8 + declared.min(available)..];
    }
    &[]
}

/// Write `pcm` to `path` as a WAV file.
pub async fn write_wav_file(path: impl AsRef<Path>, pcm: &[u8]) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, wrap_pcm(pcm)).await?;
    debug!("Wrote {} PCM bytes to {}", pcm.len(), path.display());
    Ok(())
}
