/*!
    Filter graphs.

    A [`FilterGraph`] is built from a textual chain such as
    `"scale=320:240,format=gray8"` and runs frames through it. Frames go in
    with [`FilterGraph::send_frame`] and come out with
    [`FilterGraph::receive_frame`], the same send/receive protocol codecs
    use: `NeedMoreInput` while the graph waits for input, `EndOfStream` once
    the end of input has been sent and everything was received.
*/

use std::fmt;

use av_types::{Error, MediaParams, Rational, Result, check};

use crate::frame::Frame;
use crate::native::NativeLibrary;

/**
    A configured filter graph with one input and one output.
*/
pub struct FilterGraph<L: NativeLibrary> {
    lib: L,
    raw: L::Filter,
    description: String,
    input: MediaParams,
    time_base: Rational,
    input_done: bool,
}

impl<L: NativeLibrary> FilterGraph<L> {
    /**
        Parse and configure `description` for frames matching `input` in
        `time_base`.

        Fails with `UnsupportedFormat` for unknown filters and
        `InvalidArgument` for bad filter arguments or an input without media
        parameters.
    */
    pub fn new(lib: &L, description: &str, input: MediaParams, time_base: Rational) -> Result<Self> {
        if matches!(input, MediaParams::None) {
            return Err(Error::invalid_argument("filter graph input has no media parameters"));
        }
        if !time_base.is_valid() {
            return Err(Error::invalid_argument("filter graph input has no time base"));
        }
        let raw = lib
            .filter_alloc(description, &input, time_base)
            .map_err(|code| Error::from_code(code, "filter_alloc").within(description))?;
        let graph = Self {
            lib: lib.clone(),
            raw,
            description: description.to_owned(),
            input,
            time_base,
            input_done: false,
        };
        tracing::debug!(
            description,
            input = ?graph.input,
            output = ?graph.output(),
            "Configured filter graph"
        );
        Ok(graph)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input(&self) -> &MediaParams {
        &self.input
    }

    pub fn input_time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Parameters of the frames the graph produces.
    */
    pub fn output(&self) -> MediaParams {
        self.lib.filter_output(&self.raw)
    }

    pub fn output_time_base(&self) -> Rational {
        self.lib.filter_time_base(&self.raw)
    }

    /**
        Feed a frame; `None` marks the end of input.

        The frame must match the input parameters and is rescaled to the input
        time base if it carries another one. Sending after the end of input
        fails with `InvalidArgument`.
    */
    pub fn send_frame(&mut self, frame: Option<&Frame<L>>) -> Result<()> {
        if self.input_done {
            return Err(Error::invalid_argument("filter graph input already ended"));
        }
        let Some(frame) = frame else {
            check(self.lib.filter_send_frame(&mut self.raw, None), "filter_send_frame")?;
            self.input_done = true;
            tracing::debug!(description = %self.description, "Filter graph input ended");
            return Ok(());
        };
        let layout = frame.layout();
        if !layout.is_some_and(|l| self.input.accepts(&l)) {
            return Err(Error::invalid_argument(format!(
                "filter graph input {:?} does not accept {layout:?}",
                self.input
            )));
        }
        if frame.time_base() == self.time_base || !frame.time_base().is_valid() {
            check(
                self.lib.filter_send_frame(&mut self.raw, Some(frame.raw())),
                "filter_send_frame",
            )?;
        } else {
            let mut retimed = frame.try_clone()?;
            retimed.rescale_ts(self.time_base);
            check(
                self.lib
                    .filter_send_frame(&mut self.raw, Some(retimed.raw())),
                "filter_send_frame",
            )?;
        }
        Ok(())
    }

    /**
        Receive a filtered frame stamped with the output time base.
    */
    pub fn receive_frame(&mut self) -> Result<Frame<L>> {
        let mut frame = Frame::new(&self.lib)?;
        check(
            self.lib.filter_receive_frame(&mut self.raw, frame.raw_mut()),
            "filter_receive_frame",
        )?;
        frame.set_time_base(self.output_time_base());
        Ok(frame)
    }

    /**
        Returns true once the end of input has been sent.
    */
    pub fn is_input_done(&self) -> bool {
        self.input_done
    }
}

impl<L: NativeLibrary> Drop for FilterGraph<L> {
    fn drop(&mut self) {
        self.lib.filter_free(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for FilterGraph<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterGraph")
            .field("description", &self.description)
            .field("input", &self.input)
            .field("input_done", &self.input_done)
            .finish_non_exhaustive()
    }
}
