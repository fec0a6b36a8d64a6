/*!
    Frame transforms applied between decode and encode.
*/

use std::fmt;

use av_core::{FilterGraph, Frame, NativeLibrary, ScaleContext};
use av_types::{
    CodecParameters, Error, MediaParams, PixelFormat, Received, Result, ResultExt, VideoParams,
};

/**
    A step applied to the decoded frames of a transcoded stream before they
    are encoded.

    A transform may hold frames back and return several at once; whatever it
    still holds comes out of [`FrameTransform::finish`] when the stream ends.
    Output frames must match [`FrameTransform::output_parameters`], which the
    encoder is configured from. Closures taking and returning one frame
    implement this trait and keep the stream's parameters.
*/
pub trait FrameTransform<L: NativeLibrary> {
    fn transform(&mut self, frame: Frame<L>) -> Result<Vec<Frame<L>>>;

    /**
        Release frames held back at the end of the stream.
    */
    fn finish(&mut self) -> Result<Vec<Frame<L>>> {
        Ok(Vec::new())
    }

    /**
        Parameters of the frames this transform produces from a stream with
        `input` parameters.
    */
    fn output_parameters(&self, input: &CodecParameters) -> CodecParameters {
        input.clone()
    }
}

impl<L, F> FrameTransform<L> for F
where
    L: NativeLibrary,
    F: FnMut(Frame<L>) -> Result<Frame<L>>,
{
    fn transform(&mut self, frame: Frame<L>) -> Result<Vec<Frame<L>>> {
        Ok(vec![self(frame)?])
    }
}

/**
    Returns every frame unchanged.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl<L: NativeLibrary> FrameTransform<L> for Passthrough {
    fn transform(&mut self, frame: Frame<L>) -> Result<Vec<Frame<L>>> {
        Ok(vec![frame])
    }
}

/**
    Resizes and converts video frames to a fixed geometry and pixel format.

    The scale context is created from the first frame and recreated whenever
    the input geometry changes. Frames already in the target layout pass
    through untouched.
*/
pub struct Scaler<L: NativeLibrary> {
    lib: L,
    target: VideoParams,
    ctx: Option<ScaleContext<L>>,
}

impl<L: NativeLibrary> Scaler<L> {
    pub fn new(lib: &L, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            lib: lib.clone(),
            target: VideoParams {
                width,
                height,
                pixel_format,
            },
            ctx: None,
        }
    }

    pub fn target(&self) -> VideoParams {
        self.target
    }
}

impl<L: NativeLibrary> FrameTransform<L> for Scaler<L> {
    fn transform(&mut self, frame: Frame<L>) -> Result<Vec<Frame<L>>> {
        let target = self.target.layout();
        let layout = frame
            .layout()
            .ok_or_else(|| Error::invalid_argument("scaler got a blank frame"))?;
        if layout == target {
            return Ok(vec![frame]);
        }
        let ctx = match self.ctx.take() {
            Some(ctx) if *ctx.source() == layout => self.ctx.insert(ctx),
            old => {
                if old.is_some() {
                    tracing::debug!(from = ?layout, "Input geometry changed, new scale context");
                }
                drop(old);
                self.ctx.insert(ScaleContext::new(&self.lib, layout, target)?)
            }
        };
        Ok(vec![ctx.scale(&frame)?])
    }

    fn output_parameters(&self, input: &CodecParameters) -> CodecParameters {
        let mut params = input.clone();
        params.media = MediaParams::Video(self.target);
        params
    }
}

impl<L: NativeLibrary> fmt::Debug for Scaler<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scaler")
            .field("target", &self.target)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl<L: NativeLibrary> FrameTransform<L> for FilterGraph<L> {
    fn transform(&mut self, frame: Frame<L>) -> Result<Vec<Frame<L>>> {
        self.send_frame(Some(&frame))?;
        let mut frames = Vec::new();
        while let Received::Item(frame) = self.receive_frame().received()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn finish(&mut self) -> Result<Vec<Frame<L>>> {
        if !self.is_input_done() {
            self.send_frame(None)?;
        }
        let mut frames = Vec::new();
        while let Received::Item(frame) = self.receive_frame().received()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn output_parameters(&self, input: &CodecParameters) -> CodecParameters {
        let mut params = input.clone();
        params.media = self.output();
        params
    }
}
