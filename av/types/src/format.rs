/*!
    Pixel and sample format types.
*/

use serde::{Deserialize, Serialize};

/**
    Video pixel formats.

    A subset of the formats a native library reports. Streams in any other
    format are rejected with `UnsupportedFormat` when a frame layout is needed.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp
    Nv12,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Planar YUV 4:2:0, 10-bit little-endian in 16-bit words
    Yuv420p10,
    /// Semi-planar YUV 4:2:0, 10-bit little-endian in 16-bit words
    P010le,
    /// Single plane luma, 8bpp
    Gray8,
}

impl PixelFormat {
    /**
        Returns the number of bits per pixel for this format.

        For subsampled formats, this is the average bits per pixel.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Gray8 => 8,
            Self::Yuv420p | Self::Nv12 => 12,
            Self::Yuv420p10 | Self::P010le => 15,
            Self::Yuv422p => 16,
            Self::Rgb24 | Self::Bgr24 | Self::Yuv444p => 24,
            Self::Bgra | Self::Rgba => 32,
        }
    }

    /**
        Returns true if this is a planar (or semi-planar) format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => true,
            Self::Nv12 | Self::P010le => true,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 | Self::Gray8 => false,
        }
    }

    /**
        Number of data planes a frame of this format carries.
    */
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => 3,
            Self::Nv12 | Self::P010le => 2,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 | Self::Gray8 => 1,
        }
    }

    /**
        Bytes used by one component sample in the first plane.
    */
    pub const fn bytes_per_component(self) -> usize {
        match self {
            Self::Yuv420p10 | Self::P010le => 2,
            _ => 1,
        }
    }

    /**
        Bytes per row and row count of `plane` for a `width` x `height` image,
        without padding.
    */
    pub const fn plane_shape(self, plane: usize, width: usize, height: usize) -> (usize, usize) {
        let half_w = width.div_ceil(2);
        let half_h = height.div_ceil(2);
        let bpc = self.bytes_per_component();
        match (self, plane) {
            (Self::Bgra | Self::Rgba, _) => (width * 4, height),
            (Self::Rgb24 | Self::Bgr24, _) => (width * 3, height),
            (Self::Gray8, _) => (width, height),
            (_, 0) => (width * bpc, height),
            (Self::Yuv420p | Self::Yuv420p10, _) => (half_w * bpc, half_h),
            (Self::Yuv422p, _) => (half_w, height),
            (Self::Yuv444p, _) => (width, height),
            (Self::Nv12 | Self::P010le, _) => (half_w * 2 * bpc, half_h),
        }
    }
}

/**
    Audio sample formats.

    Packed formats interleave channels in one plane; planar formats (`*p`)
    carry one plane per channel.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SampleFormat {
    /// 32-bit floating point, range [-1.0, 1.0]
    F32,
    /// 64-bit floating point
    F64,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// Unsigned 8-bit integer
    U8,
    /// Planar 32-bit floating point
    F32p,
    /// Planar 64-bit floating point
    F64p,
    /// Planar signed 16-bit integer
    S16p,
    /// Planar signed 32-bit integer
    S32p,
    /// Planar unsigned 8-bit integer
    U8p,
}

impl SampleFormat {
    /**
        Returns the number of bytes per sample.
    */
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::F32 | Self::S32p | Self::F32p => 4,
            Self::F64 | Self::F64p => 8,
        }
    }

    /**
        Returns true if this is a floating-point format.
    */
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64 | Self::F32p | Self::F64p)
    }

    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            Self::F32p | Self::F64p | Self::S16p | Self::S32p | Self::U8p
        )
    }
}

/**
    Audio channel layout.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChannelLayout {
    /// Single channel
    Mono,
    /// Left and right channels
    Stereo,
    /// 5.1 surround (FL, FR, FC, LFE, BL, BR)
    Surround5_1,
    /// 7.1 surround (FL, FR, FC, LFE, BL, BR, SL, SR)
    Surround7_1,
}

impl ChannelLayout {
    /**
        Returns the number of channels.
    */
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround5_1 => 6,
            Self::Surround7_1 => 8,
        }
    }

    /**
        Create a channel layout from an exact channel count.
    */
    pub const fn from_count(count: u16) -> Option<Self> {
        match count {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            6 => Some(Self::Surround5_1),
            8 => Some(Self::Surround7_1),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_bits_per_pixel() {
        assert_eq!(PixelFormat::Yuv420p.bits_per_pixel(), 12);
        assert_eq!(PixelFormat::Bgra.bits_per_pixel(), 32);
        assert_eq!(PixelFormat::Rgb24.bits_per_pixel(), 24);
    }

    #[test]
    fn pixel_format_is_planar() {
        assert!(PixelFormat::Yuv420p.is_planar());
        assert!(PixelFormat::Nv12.is_planar());
        assert!(!PixelFormat::Bgra.is_planar());
        assert!(!PixelFormat::Rgb24.is_planar());
    }

    #[test]
    fn plane_shapes_round_up_odd_sizes() {
        assert_eq!(PixelFormat::Yuv420p.plane_shape(0, 5, 3), (5, 3));
        assert_eq!(PixelFormat::Yuv420p.plane_shape(1, 5, 3), (3, 2));
        assert_eq!(PixelFormat::Nv12.plane_shape(1, 4, 4), (4, 2));
        assert_eq!(PixelFormat::P010le.plane_shape(0, 4, 4), (8, 4));
        assert_eq!(PixelFormat::Bgra.plane_shape(0, 2, 2), (8, 2));
    }

    #[test]
    fn sample_format_bytes_per_sample() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::F32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::F64.bytes_per_sample(), 8);
    }

    #[test]
    fn sample_format_is_float() {
        assert!(SampleFormat::F32.is_float());
        assert!(SampleFormat::F32p.is_float());
        assert!(!SampleFormat::S16.is_float());
        assert!(SampleFormat::S16p.is_planar());
        assert!(!SampleFormat::S16.is_planar());
    }

    #[test]
    fn channel_layout_from_count() {
        assert_eq!(ChannelLayout::from_count(2), Some(ChannelLayout::Stereo));
        assert_eq!(ChannelLayout::from_count(3), None);
        assert_eq!(ChannelLayout::Surround5_1.channels(), 6);
    }
}
