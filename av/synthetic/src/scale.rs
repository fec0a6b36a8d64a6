/*!
    Nearest-neighbour scaling and the few pixel format conversions the
    synthetic library supports.

    Any format scales to itself. Formats with an 8-bit luma plane convert to
    `Gray8` by keeping luma, and `Gray8` converts to the planar 8-bit YUV
    formats with neutral chroma. Everything else is `ENOSYS`.
*/

use av_types::{FrameLayout, PixelFormat};

use crate::payload::FramePayload;

/**
    Raw scaling context.
*/
#[derive(Debug)]
pub struct SynthScaler {
    pub(crate) freed: bool,
    pub(crate) src: FrameLayout,
    pub(crate) dst: FrameLayout,
}

fn has_8bit_luma(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Yuv420p
            | PixelFormat::Yuv422p
            | PixelFormat::Yuv444p
            | PixelFormat::Nv12
            | PixelFormat::Gray8
    )
}

/**
    Returns true if frames of `from` can be converted to `to`.
*/
pub fn converts(from: PixelFormat, to: PixelFormat) -> bool {
    from == to
        || (to == PixelFormat::Gray8 && has_8bit_luma(from))
        || (from == PixelFormat::Gray8
            && matches!(
                to,
                PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p
            ))
}

/// Bytes per sample position in `plane`.
fn element_size(format: PixelFormat, plane: usize) -> usize {
    let bpc = format.bytes_per_component();
    match (format, plane) {
        (PixelFormat::Bgra | PixelFormat::Rgba, _) => 4,
        (PixelFormat::Rgb24 | PixelFormat::Bgr24, _) => 3,
        (PixelFormat::Nv12 | PixelFormat::P010le, 1) => 2 * bpc,
        _ => bpc,
    }
}

/**
    Convert `src` to the video layout `to`. `None` if either layout is not
    video or the conversion is not supported.
*/
pub fn scale(src: &FramePayload, to: FrameLayout) -> Option<FramePayload> {
    let FrameLayout::Video { format: from, .. } = src.layout else {
        return None;
    };
    let FrameLayout::Video { format, .. } = to else {
        return None;
    };
    if !converts(from, format) {
        return None;
    }
    let planes = (0..to.plane_count())
        .map(|plane| {
            let (stride, rows) = to.plane_shape(plane)?;
            if plane > 0 && from != format {
                return Some(vec![128; stride * rows]);
            }
            let (src_stride, src_rows) = src.layout.plane_shape(plane)?;
            let element = element_size(format, plane);
            Some(resize(
                src.planes.get(plane)?,
                (src_stride / element, src_rows),
                (stride / element, rows),
                element,
            ))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(FramePayload {
        layout: to,
        key: src.key,
        planes,
    })
}

/// Nearest-neighbour resize of one plane measured in elements.
fn resize(
    src: &[u8],
    (src_width, src_rows): (usize, usize),
    (width, rows): (usize, usize),
    element: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * rows * element);
    for y in 0..rows {
        let sy = y * src_rows / rows;
        for x in 0..width {
            let sx = x * src_width / width;
            let at = (sy * src_width + sx) * element;
            out.extend_from_slice(&src[at..at + element]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(width: u32, height: u32, format: PixelFormat) -> FrameLayout {
        FrameLayout::Video {
            width,
            height,
            format,
        }
    }

    #[test]
    fn upscale_repeats_pixels() {
        let src = FramePayload {
            layout: video(2, 1, PixelFormat::Gray8),
            key: true,
            planes: vec![vec![10, 20]],
        };
        let out = scale(&src, video(4, 2, PixelFormat::Gray8)).unwrap();
        assert_eq!(out.planes, vec![vec![10, 10, 20, 20, 10, 10, 20, 20]]);
        assert!(out.key);
    }

    #[test]
    fn packed_pixels_move_together() {
        let src = FramePayload {
            layout: video(2, 1, PixelFormat::Rgb24),
            key: false,
            planes: vec![vec![1, 2, 3, 4, 5, 6]],
        };
        let out = scale(&src, video(1, 1, PixelFormat::Rgb24)).unwrap();
        assert_eq!(out.planes, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn yuv_to_gray_keeps_luma() {
        let src = FramePayload::filled(video(4, 4, PixelFormat::Yuv420p), false, 5);
        let out = scale(&src, video(4, 4, PixelFormat::Gray8)).unwrap();
        assert_eq!(out.planes, vec![src.planes[0].clone()]);

        let back = scale(&out, video(4, 4, PixelFormat::Yuv420p)).unwrap();
        assert_eq!(back.planes[0], src.planes[0]);
        assert_eq!(back.planes[1], vec![128; 4]);
    }

    #[test]
    fn unsupported_conversions() {
        assert!(!converts(PixelFormat::Rgb24, PixelFormat::Yuv420p));
        assert!(!converts(PixelFormat::Yuv420p10, PixelFormat::Gray8));
        let src = FramePayload::filled(video(2, 2, PixelFormat::Bgra), false, 0);
        assert!(scale(&src, video(2, 2, PixelFormat::Nv12)).is_none());
    }
}
