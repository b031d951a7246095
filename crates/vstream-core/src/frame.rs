//! Decoded video frames.
//!
//! Frames are planar YUV 4:2:0 with tightly packed rows (stride == width).
//! The luma plane is `width * height` bytes; each chroma plane covers half
//! the resolution in both dimensions. Width and height are always even.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CoreError, Result};

/// An owned planar YUV420P picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub pts_ms: i64,
    pub width: u32,
    pub height: u32,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl VideoFrame {
    /// Allocate a black frame of the given dimensions.
    pub fn black(width: u32, height: u32, pts_ms: i64) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(CoreError::invalid_frame(format!(
                "dimensions {}x{} must be even and non-zero",
                width, height
            )));
        }
        let luma = (width * height) as usize;
        let chroma = luma / 4;
        Ok(Self {
            pts_ms,
            width,
            height,
            y: vec![16; luma],
            u: vec![128; chroma],
            v: vec![128; chroma],
        })
    }

    /// Verify plane sizes against the declared dimensions.
    pub fn validate(&self) -> Result<()> {
        let luma = (self.width * self.height) as usize;
        let chroma = luma / 4;
        if self.width == 0
            || self.height == 0
            || self.width % 2 != 0
            || self.height % 2 != 0
            || self.y.len() != luma
            || self.u.len() != chroma
            || self.v.len() != chroma
        {
            return Err(CoreError::invalid_frame(format!(
                "plane sizes do not match {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Raw-frame payload codec used at the codec seam by the demo profile.
///
/// A real deployment plugs an H.265 encoder/decoder pair into the same
/// seam; this codec simply carries the planes with a 4-byte dimension
/// prefix so the pipeline is exercisable end to end.
pub mod raw {
    use super::*;

    /// Pack a frame into a payload: `width u16 | height u16 | Y | U | V`.
    pub fn pack(frame: &VideoFrame) -> Result<Bytes> {
        frame.validate()?;
        let mut buf =
            BytesMut::with_capacity(4 + frame.y.len() + frame.u.len() + frame.v.len());
        buf.put_u16(frame.width as u16);
        buf.put_u16(frame.height as u16);
        buf.put_slice(&frame.y);
        buf.put_slice(&frame.u);
        buf.put_slice(&frame.v);
        Ok(buf.freeze())
    }

    /// Unpack a payload produced by [`pack`].
    pub fn unpack(mut payload: Bytes, pts_ms: i64) -> Result<VideoFrame> {
        if payload.len() < 4 {
            return Err(CoreError::invalid_frame("payload shorter than dimension prefix"));
        }
        let width = payload.get_u16() as u32;
        let height = payload.get_u16() as u32;
        let luma = (width * height) as usize;
        let chroma = luma / 4;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(CoreError::invalid_frame(format!(
                "bad dimensions {}x{}",
                width, height
            )));
        }
        if payload.len() != luma + 2 * chroma {
            return Err(CoreError::invalid_frame(format!(
                "payload of {} bytes does not fit {}x{}",
                payload.len(),
                width,
                height
            )));
        }
        let y = payload.split_to(luma).to_vec();
        let u = payload.split_to(chroma).to_vec();
        let v = payload.to_vec();
        Ok(VideoFrame {
            pts_ms,
            width,
            height,
            y,
            u,
            v,
        })
    }
}

fn scale_plane(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
    dst: &mut Vec<u8>,
) {
    dst.clear();
    dst.reserve(dst_w * dst_h);
    // Fixed-point bilinear sampling, 16 fractional bits.
    let x_ratio = if dst_w > 1 {
        ((src_w - 1) << 16) / (dst_w - 1)
    } else {
        0
    };
    let y_ratio = if dst_h > 1 {
        ((src_h - 1) << 16) / (dst_h - 1)
    } else {
        0
    };

    for dy in 0..dst_h {
        let sy = dy * y_ratio;
        let y0 = sy >> 16;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = sy & 0xFFFF;
        for dx in 0..dst_w {
            let sx = dx * x_ratio;
            let x0 = sx >> 16;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = sx & 0xFFFF;

            let p00 = src[y0 * src_w + x0] as usize;
            let p01 = src[y0 * src_w + x1] as usize;
            let p10 = src[y1 * src_w + x0] as usize;
            let p11 = src[y1 * src_w + x1] as usize;

            let top = p00 * (0x10000 - fx) + p01 * fx;
            let bottom = p10 * (0x10000 - fx) + p11 * fx;
            let value = (top * (0x10000 - fy) + bottom * fy) >> 32;
            dst.push(value as u8);
        }
    }
}

/// Bilinear rescale of a YUV420P frame. `pts_ms` is carried unchanged.
pub fn scale_bilinear(frame: &VideoFrame, dst_w: u32, dst_h: u32) -> Result<VideoFrame> {
    frame.validate()?;
    if dst_w == 0 || dst_h == 0 || dst_w % 2 != 0 || dst_h % 2 != 0 {
        return Err(CoreError::invalid_frame(format!(
            "target dimensions {}x{} must be even and non-zero",
            dst_w, dst_h
        )));
    }
    if dst_w == frame.width && dst_h == frame.height {
        return Ok(frame.clone());
    }

    let mut out = VideoFrame {
        pts_ms: frame.pts_ms,
        width: dst_w,
        height: dst_h,
        y: Vec::new(),
        u: Vec::new(),
        v: Vec::new(),
    };
    scale_plane(
        &frame.y,
        frame.width as usize,
        frame.height as usize,
        dst_w as usize,
        dst_h as usize,
        &mut out.y,
    );
    scale_plane(
        &frame.u,
        frame.width as usize / 2,
        frame.height as usize / 2,
        dst_w as usize / 2,
        dst_h as usize / 2,
        &mut out.u,
    );
    scale_plane(
        &frame.v,
        frame.width as usize / 2,
        frame.height as usize / 2,
        dst_w as usize / 2,
        dst_h as usize / 2,
        &mut out.v,
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_frame_plane_sizes() {
        let frame = VideoFrame::black(64, 48, 0).unwrap();
        assert_eq!(frame.y.len(), 64 * 48);
        assert_eq!(frame.u.len(), 64 * 48 / 4);
        assert_eq!(frame.v.len(), 64 * 48 / 4);
        frame.validate().unwrap();
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        assert!(VideoFrame::black(63, 48, 0).is_err());
        assert!(VideoFrame::black(64, 0, 0).is_err());
    }

    #[test]
    fn test_raw_codec_round_trip() {
        let mut frame = VideoFrame::black(32, 16, 77).unwrap();
        frame.y[5] = 200;
        frame.u[3] = 9;
        frame.v[0] = 250;
        let packed = raw::pack(&frame).unwrap();
        let unpacked = raw::unpack(packed, 77).unwrap();
        assert_eq!(unpacked, frame);
    }

    #[test]
    fn test_raw_unpack_rejects_bad_sizes() {
        let frame = VideoFrame::black(32, 16, 0).unwrap();
        let packed = raw::pack(&frame).unwrap();
        assert!(raw::unpack(packed.slice(..packed.len() - 1), 0).is_err());
        assert!(raw::unpack(Bytes::from_static(&[0, 2]), 0).is_err());
    }

    #[test]
    fn test_scale_preserves_uniform_plane() {
        let mut frame = VideoFrame::black(64, 64, 5).unwrap();
        frame.y.fill(100);
        let scaled = scale_bilinear(&frame, 32, 32).unwrap();
        assert_eq!(scaled.pts_ms, 5);
        assert_eq!(scaled.width, 32);
        assert_eq!(scaled.height, 32);
        assert!(scaled.y.iter().all(|&p| p == 100));
        assert_eq!(scaled.u.len(), 16 * 16);
    }

    #[test]
    fn test_scale_identity_is_clone() {
        let frame = VideoFrame::black(16, 16, 1).unwrap();
        let scaled = scale_bilinear(&frame, 16, 16).unwrap();
        assert_eq!(scaled, frame);
    }

    #[test]
    fn test_scale_interpolates_gradient() {
        // A horizontal step from 0 to 255 must land in between at the seam.
        let mut frame = VideoFrame::black(4, 4, 0).unwrap();
        for row in 0..4 {
            frame.y[row * 4] = 0;
            frame.y[row * 4 + 1] = 0;
            frame.y[row * 4 + 2] = 255;
            frame.y[row * 4 + 3] = 255;
        }
        let scaled = scale_bilinear(&frame, 8, 4).unwrap();
        let row = &scaled.y[0..8];
        assert_eq!(row[0], 0);
        assert_eq!(row[7], 255);
        assert!(row[3] > 0 && row[4] < 255);
    }
}
