/*!
    Decoded frame handle.
*/

use std::fmt;

use av_types::{Error, FrameLayout, Rational, Result, check, code::NOPTS_VALUE, rescale};

use crate::native::{FrameProps, NativeLibrary};

/**
    A reference-counted decoded frame: pixel planes or interleaved samples.

    Move-only, like [`Packet`](crate::Packet). [`Frame::try_clone`] shares
    the buffers; [`Frame::make_writable`] copies them if they are shared.
*/
pub struct Frame<L: NativeLibrary> {
    lib: L,
    raw: L::Frame,
    time_base: Rational,
}

impl<L: NativeLibrary> Frame<L> {
    /**
        Allocate a blank frame with no buffers.
    */
    pub fn new(lib: &L) -> Result<Self> {
        let raw = lib
            .frame_alloc()
            .ok_or_else(|| Error::allocation_failure("frame_alloc"))?;
        Ok(Self {
            lib: lib.clone(),
            raw,
            time_base: Rational::default(),
        })
    }

    /**
        Allocate a frame with zeroed, writable buffers for `layout`.
    */
    pub fn with_layout(lib: &L, layout: FrameLayout) -> Result<Self> {
        let mut frame = Self::new(lib)?;
        check(
            frame.lib.frame_get_buffer(&mut frame.raw, &layout),
            "frame_get_buffer",
        )?;
        Ok(frame)
    }

    /**
        Create a second handle sharing this frame's buffers.
    */
    pub fn try_clone(&self) -> Result<Self> {
        let mut other = Self::new(&self.lib)?;
        check(self.lib.frame_ref(&mut other.raw, &self.raw), "frame_ref")?;
        other.time_base = self.time_base;
        Ok(other)
    }

    /**
        Geometry or sample layout. `None` for a blank frame.
    */
    pub fn layout(&self) -> Option<FrameLayout> {
        self.lib.frame_layout(&self.raw)
    }

    pub fn plane_count(&self) -> usize {
        self.layout().map(|l| l.plane_count()).unwrap_or(0)
    }

    /**
        Bytes per row of `plane`, including any padding.
    */
    pub fn linesize(&self, plane: usize) -> usize {
        self.lib.frame_linesize(&self.raw, plane)
    }

    pub fn plane(&self, plane: usize) -> Option<&[u8]> {
        self.lib.frame_plane(&self.raw, plane)
    }

    /**
        Mutable access to a plane. Fails with `InvalidArgument` if the plane
        does not exist or the buffers are shared.
    */
    pub fn plane_mut(&mut self, plane: usize) -> Result<&mut [u8]> {
        if plane >= self.plane_count() {
            return Err(Error::invalid_argument(format!("no plane {plane}")));
        }
        self.lib
            .frame_plane_mut(&mut self.raw, plane)
            .ok_or_else(|| Error::invalid_argument("frame buffer is not writable"))
    }

    pub fn is_writable(&self) -> bool {
        self.lib.frame_is_writable(&self.raw)
    }

    pub fn make_writable(&mut self) -> Result<()> {
        check(
            self.lib.frame_make_writable(&mut self.raw),
            "frame_make_writable",
        )?;
        Ok(())
    }

    fn props(&self) -> FrameProps {
        self.lib.frame_props(&self.raw)
    }

    fn update(&mut self, f: impl FnOnce(&mut FrameProps)) {
        let mut props = self.props();
        f(&mut props);
        self.lib.frame_set_props(&mut self.raw, &props);
    }

    pub fn pts(&self) -> Option<i64> {
        let pts = self.props().pts;
        (pts != NOPTS_VALUE).then_some(pts)
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.update(|p| p.pts = pts.unwrap_or(NOPTS_VALUE));
    }

    pub fn duration(&self) -> i64 {
        self.props().duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.update(|p| p.duration = duration);
    }

    pub fn is_key(&self) -> bool {
        self.props().key
    }

    pub fn set_key(&mut self, key: bool) {
        self.update(|p| p.key = key);
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn set_time_base(&mut self, time_base: Rational) {
        self.time_base = time_base;
    }

    /**
        Convert pts and duration into `to` and record the new time base.
    */
    pub fn rescale_ts(&mut self, to: Rational) {
        let from = self.time_base;
        if from != to && from.is_valid() {
            self.update(|p| {
                p.pts = rescale(p.pts, from, to);
                p.duration = rescale(p.duration, from, to);
            });
        }
        self.time_base = to;
    }

    /**
        Drop every buffer reference and reset the frame to blank.
    */
    pub fn clear(&mut self) {
        self.lib.frame_unref(&mut self.raw);
        self.time_base = Rational::default();
    }

    pub(crate) fn raw(&self) -> &L::Frame {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut L::Frame {
        &mut self.raw
    }
}

impl<L: NativeLibrary> Drop for Frame<L> {
    fn drop(&mut self) {
        self.lib.frame_free(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for Frame<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("layout", &self.layout())
            .field("pts", &self.pts())
            .field("duration", &self.duration())
            .field("time_base", &self.time_base)
            .finish()
    }
}
