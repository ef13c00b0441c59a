//! PCM16 little-endian conversion and fixed-size framing of microphone audio.

use super::{CoachError, CoachResult};

pub fn f32_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Encodes normalized samples as PCM16 LE.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| f32_to_i16(s).to_le_bytes())
        .collect()
}

/// Decodes PCM16 LE into samples normalized to [-1, 1).
pub fn decode_pcm16(bytes: &[u8]) -> CoachResult<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(CoachError::Decode(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// Re-slices arbitrarily sized capture buffers into frames of exactly `frame_len`
/// samples, carrying the remainder into the next push.
#[derive(Debug)]
pub struct FrameSlicer {
    frame_len: usize,
    pending: Vec<f32>,
}

impl FrameSlicer {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len: frame_len.max(1),
            pending: Vec::with_capacity(frame_len),
        }
    }

    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let whole = self.pending.len() / self.frame_len * self.frame_len;
        let frames = self.pending[..whole]
            .chunks_exact(self.frame_len)
            .map(<[f32]>::to_vec)
            .collect();
        self.pending.drain(..whole);
        frames
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
