//! PCM16 audio payloads.
//!
//! Audio datagrams carry raw signed 16-bit little-endian mono samples.

use bytes::Bytes;

use crate::error::{CoreError, Result};

/// Serialize samples into a wire payload.
pub fn pack(samples: &[i16]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Bytes::from(out)
}

/// Deserialize a wire payload back into samples.
pub fn unpack(payload: &[u8]) -> Result<Vec<i16>> {
    if payload.len() % 2 != 0 {
        return Err(CoreError::malformed(format!(
            "pcm payload of {} bytes is not sample aligned",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Apply a scalar gain, saturating at the sample range.
pub fn apply_gain(samples: &mut [i16], gain: f64) {
    if (gain - 1.0).abs() < 1e-6 {
        return;
    }
    for sample in samples {
        *sample = (*sample as f64 * gain).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }
}
