//! Screenshot helpers
//!
//! Dimension sniffing for PNG buffers returned by drivers, and a tiny
//! placeholder image for simulated surfaces.

use chrono::Utc;

use clawpilot_core::{ImageFormat, PilotError, Screenshot};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Width and height from a PNG's IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}

/// Wrap driver PNG bytes as a `Screenshot`, stamped now.
pub fn from_png(bytes: Vec<u8>) -> Result<Screenshot, PilotError> {
    let (width, height) = png_dimensions(&bytes)
        .ok_or_else(|| PilotError::OperatorFault("driver returned a non-PNG screenshot".into()))?;
    Ok(Screenshot {
        width,
        height,
        timestamp: Utc::now(),
        format: ImageFormat::Png,
        image_data: bytes,
    })
}

/// PNG signature plus a valid IHDR chunk describing a `width`x`height` RGB image.
pub fn placeholder_png(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(17);
    ihdr.extend_from_slice(b"IHDR");
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth 8, color type 2 (RGB), deflate, adaptive filter, no interlace
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::with_capacity(8 + 4 + ihdr.len() + 4);
    out.extend_from_slice(&PNG_SIGNATURE);
    out.extend_from_slice(&13u32.to_be_bytes());
    out.extend_from_slice(&ihdr);
    out.extend_from_slice(&crc32(&ihdr).to_be_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for byte in data {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_round_trips_dimensions() {
        let png = placeholder_png(1280, 800);
        assert_eq!(png_dimensions(&png), Some((1280, 800)));
        let shot = from_png(png).unwrap();
        assert_eq!((shot.width, shot.height), (1280, 800));
        assert_eq!(shot.format, ImageFormat::Png);
    }

    #[test]
    fn ihdr_crc_is_correct() {
        // Known CRC of the IHDR chunk for a 1x1 8-bit RGB image.
        let png = placeholder_png(1, 1);
        assert_eq!(&png[29..33], &[0x90, 0x77, 0x53, 0xDE]);
    }

    #[test]
    fn rejects_non_png() {
        assert_eq!(png_dimensions(b"GIF89a......................"), None);
        assert!(from_png(vec![0xFF, 0xD8, 0xFF]).is_err());
    }
}
