//! Packaging of raw PCM into a playable WAV resource

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};

use crate::{GenerationError, Result};

pub const WAV_HEADER_LEN: usize = 44;

/// Raw PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    /// 24 kHz mono 16-bit, the speech synthesizer's output
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl PcmFormat {
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }
}

/// Synthesized speech before packaging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub data: Bytes,
    pub format: PcmFormat,
}

impl PcmAudio {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            format: PcmFormat::default(),
        }
    }

    pub fn to_wav(&self) -> Result<Bytes> {
        encode_wav(&self.data, self.format)
    }

    pub fn to_data_url(&self) -> Result<String> {
        wav_data_url(&self.data, self.format)
    }
}

/// RIFF sizes are 32-bit; the chunk must leave room for the header fields
fn data_chunk_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|data_len| data_len.checked_add(36).is_some())
        .ok_or(GenerationError::AudioTooLarge(len))
}

/// Wrap little-endian PCM in a canonical 44-byte RIFF/WAVE header
pub fn encode_wav(pcm: &[u8], format: PcmFormat) -> Result<Bytes> {
    let data_len = data_chunk_len(pcm.len())?;
    let mut buf = BytesMut::with_capacity(WAV_HEADER_LEN + pcm.len());

    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(format.channels);
    buf.put_u32_le(format.sample_rate);
    buf.put_u32_le(format.byte_rate());
    buf.put_u16_le(format.block_align());
    buf.put_u16_le(format.bits_per_sample);

    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    buf.put_slice(pcm);

    Ok(buf.freeze())
}

/// `data:audio/wav;base64,...` URL for the packaged audio
pub fn wav_data_url(pcm: &[u8], format: PcmFormat) -> Result<String> {
    Ok(format!(
        "data:audio/wav;base64,{}",
        STANDARD.encode(encode_wav(pcm, format)?)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_header_layout() {
        let pcm = [1u8, 0, 2, 0, 3, 0];
        let wav = encode_wav(&pcm, PcmFormat::default()).unwrap();

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 6);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 24_000);
        assert_eq!(u32_at(&wav, 28), 48_000);
        assert_eq!(u16_at(&wav, 32), 2);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 6);
        assert_eq!(&wav[44..], &pcm);
    }

    #[test]
    fn test_data_url() {
        let url = PcmAudio::new(vec![0u8; 4]).to_data_url().unwrap();
        assert!(url.starts_with("data:audio/wav;base64,UklGR"));

        let encoded = url.trim_start_matches("data:audio/wav;base64,");
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded.len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn test_oversized_pcm_is_rejected() {
        assert_eq!(data_chunk_len(6).unwrap(), 6);
        assert_eq!(data_chunk_len((u32::MAX - 36) as usize).unwrap(), u32::MAX - 36);

        for len in [(u32::MAX - 35) as usize, u32::MAX as usize, u32::MAX as usize + 1] {
            match data_chunk_len(len) {
                Err(GenerationError::AudioTooLarge(reported)) => assert_eq!(reported, len),
                other => panic!("unexpected result for {}: {:?}", len, other),
            }
        }
    }
}
