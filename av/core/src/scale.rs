/*!
    Video scaling and pixel format conversion.
*/

use std::fmt;

use av_types::{Error, FrameLayout, Result, check};

use crate::frame::Frame;
use crate::native::NativeLibrary;

/**
    Converts video frames of one layout into another.

    Both layouts are fixed when the context is created. Frames of any other
    source layout are rejected; create a new context when the input changes.
*/
pub struct ScaleContext<L: NativeLibrary> {
    lib: L,
    raw: L::Scaler,
    src: FrameLayout,
    dst: FrameLayout,
}

impl<L: NativeLibrary> ScaleContext<L> {
    /**
        Fails with `InvalidArgument` unless both layouts are video and
        `UnsupportedFormat` if the library cannot convert between them.
    */
    pub fn new(lib: &L, src: FrameLayout, dst: FrameLayout) -> Result<Self> {
        let (FrameLayout::Video { .. }, FrameLayout::Video { .. }) = (&src, &dst) else {
            return Err(Error::invalid_argument("scaling needs video layouts"));
        };
        let raw = lib
            .scale_alloc(&src, &dst)
            .map_err(|code| Error::from_code(code, "scale_alloc"))?;
        tracing::debug!(src = ?src, dst = ?dst, "Created scale context");
        Ok(Self {
            lib: lib.clone(),
            raw,
            src,
            dst,
        })
    }

    pub fn source(&self) -> &FrameLayout {
        &self.src
    }

    pub fn target(&self) -> &FrameLayout {
        &self.dst
    }

    /**
        Convert one frame into a newly allocated frame of the target layout.
        Timestamps, key flag and time base are carried over.
    */
    pub fn scale(&mut self, frame: &Frame<L>) -> Result<Frame<L>> {
        if frame.layout().as_ref() != Some(&self.src) {
            return Err(Error::invalid_argument(format!(
                "scale: frame layout {:?} does not match {:?}",
                frame.layout(),
                self.src
            )));
        }
        let mut out = Frame::with_layout(&self.lib, self.dst)?;
        check(
            self.lib
                .scale_frame(&mut self.raw, frame.raw(), out.raw_mut()),
            "scale_frame",
        )?;
        out.set_pts(frame.pts());
        out.set_duration(frame.duration());
        out.set_key(frame.is_key());
        out.set_time_base(frame.time_base());
        Ok(out)
    }
}

impl<L: NativeLibrary> Drop for ScaleContext<L> {
    fn drop(&mut self) {
        self.lib.scale_free(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for ScaleContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleContext")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .finish_non_exhaustive()
    }
}
