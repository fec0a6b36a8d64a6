/*!
    Encoder implementation.
*/

use std::collections::VecDeque;
use std::fmt;

use av_core::{CodecContext, Frame, NativeLibrary, Packet};
use av_types::{
    CodecParameters, Error, FrameLayout, Rational, Received, Result, ResultExt, StreamDescriptor,
};

use crate::config::EncoderConfig;

/**
    Where an encoder is in its send/receive cycle.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeState {
    /// Opened, nothing sent yet.
    Opened,
    /// Taking frames.
    Accepting,
    /// End of input signalled; buffered packets are still coming out.
    Draining,
    /// Fully drained; every receive returns `EndOfStream`.
    Flushed,
}

/**
    Encoder for one output stream.

    Frames go in, packets stamped with the encoder time base come out.
    Dropping an encoder that took frames but was never drained loses the
    packets it still holds, and logs a warning.
*/
pub struct Encoder<L: NativeLibrary> {
    ctx: CodecContext<L>,
    config: EncoderConfig,
    state: EncodeState,
    /// Packets received while making room for the end-of-input signal.
    pending: VecDeque<Packet<L>>,
    next_pts: i64,
    frames_sent: u64,
    packets_encoded: u64,
}

impl<L: NativeLibrary> Encoder<L> {
    /**
        Create a new encoder with the given configuration.

        Fails with `UnsupportedFormat` if no encoder exists for the codec and
        `InvalidArgument` if the codec rejects the configuration.
    */
    pub fn open(lib: &L, config: EncoderConfig) -> Result<Self> {
        let context = format!("{} encoder", config.codec);
        let ctx = CodecContext::encoder(lib, &config.codec_parameters(), config.time_base)
            .and_then(|ctx| ctx.open(&config.codec_options()))
            .map_err(|e| e.within(&context))?;
        tracing::info!(
            codec = %config.codec,
            time_base = %config.time_base,
            global_header = config.global_header,
            "Opened encoder"
        );
        Ok(Self {
            ctx,
            config,
            state: EncodeState::Opened,
            pending: VecDeque::new(),
            next_pts: 0,
            frames_sent: 0,
            packets_encoded: 0,
        })
    }

    /**
        Get the time base for encoded packets.
    */
    pub fn time_base(&self) -> Rational {
        self.ctx.time_base()
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /**
        Codec parameters for the muxer, including any global header.
    */
    pub fn output_parameters(&self) -> CodecParameters {
        self.ctx.parameters()
    }

    /**
        Describe the encoder's output as stream `index` of a container.
    */
    pub fn output_stream(&self, index: usize) -> StreamDescriptor {
        let stream = StreamDescriptor::new(index, self.output_parameters(), self.time_base());
        match self.config.frame_rate {
            Some(rate) => stream.with_frame_rate(rate),
            None => stream,
        }
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn packets_encoded(&self) -> u64 {
        self.packets_encoded
    }

    /**
        Send one frame.

        A frame in another time base is rescaled into the encoder's; a frame
        without pts continues from the previous one. `NeedMoreInput` means
        packets must be received first. Fails with `InvalidArgument` if the
        frame does not match the configured parameters, or after
        [`Encoder::flush`].
    */
    pub fn send_frame(&mut self, frame: &Frame<L>) -> Result<()> {
        if matches!(self.state, EncodeState::Draining | EncodeState::Flushed) {
            return Err(Error::invalid_argument("send_frame after flush"));
        }
        let layout = frame
            .layout()
            .ok_or_else(|| Error::invalid_argument("send_frame with a blank frame"))?;
        if !self.config.codec_parameters().accepts(&layout) {
            return Err(Error::invalid_argument(format!(
                "{layout:?} does not match the {} encoder",
                self.config.codec
            )));
        }

        let time_base = self.time_base();
        let retimed;
        let frame = if frame.pts().is_none() || frame.time_base() != time_base {
            let mut copy = frame.try_clone()?;
            copy.rescale_ts(time_base);
            if copy.pts().is_none() {
                copy.set_pts(Some(self.next_pts));
            }
            retimed = copy;
            &retimed
        } else {
            frame
        };

        match self.ctx.send_frame(Some(frame)) {
            Ok(()) => {
                let pts = frame.pts().unwrap_or(self.next_pts);
                self.next_pts = pts + frame_span(frame.duration(), &layout);
                self.frames_sent += 1;
                self.state = EncodeState::Accepting;
                Ok(())
            }
            Err(e) => {
                if e.is_need_more_input() {
                    tracing::trace!(codec = %self.config.codec, "Encoder full");
                }
                Err(e)
            }
        }
    }

    /**
        Receive one encoded packet.

        `NeedMoreInput` means no packet is ready yet; `EndOfStream` means a
        flush has fully drained, and repeats on every later call.
    */
    pub fn receive_packet(&mut self) -> Result<Packet<L>> {
        if let Some(packet) = self.pending.pop_front() {
            self.packets_encoded += 1;
            return Ok(packet);
        }
        if self.state == EncodeState::Flushed {
            return Err(Error::end_of_stream("receive_packet"));
        }
        match self.ctx.receive_packet() {
            Ok(packet) => {
                self.packets_encoded += 1;
                Ok(packet)
            }
            Err(e) if e.is_end_of_stream() => {
                tracing::debug!(
                    codec = %self.config.codec,
                    frames = self.frames_sent,
                    packets = self.packets_encoded,
                    "Encoder drained"
                );
                self.state = EncodeState::Flushed;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /**
        Signal end of input so the encoder emits the packets it holds.

        Calling it again has no effect and is not an error.
    */
    pub fn flush(&mut self) -> Result<()> {
        if matches!(self.state, EncodeState::Draining | EncodeState::Flushed) {
            return Ok(());
        }
        loop {
            match self.ctx.send_frame(None) {
                Ok(()) => break,
                Err(e) if e.is_need_more_input() => {
                    let packet = self.ctx.receive_packet()?;
                    self.pending.push_back(packet);
                }
                Err(e) if e.is_end_of_stream() => break,
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(codec = %self.config.codec, "Encoder flushing");
        self.state = EncodeState::Draining;
        Ok(())
    }

    /**
        Encode a frame, returning the packets that are ready.

        May return zero, one, or multiple packets depending on encoder
        buffering.
    */
    pub fn encode(&mut self, frame: &Frame<L>) -> Result<Vec<Packet<L>>> {
        match self.send_frame(frame) {
            Ok(()) => self.receive_packets(),
            Err(e) if e.is_need_more_input() => {
                let mut packets = self.receive_packets()?;
                if let Err(e) = self.send_frame(frame) {
                    // Keep the packets for receive_packet.
                    self.packets_encoded -= packets.len() as u64;
                    for packet in packets.into_iter().rev() {
                        self.pending.push_front(packet);
                    }
                    return Err(e);
                }
                packets.extend(self.receive_packets()?);
                Ok(packets)
            }
            Err(e) => Err(e),
        }
    }

    /**
        Flush and collect every remaining packet.
    */
    pub fn drain(&mut self) -> Result<Vec<Packet<L>>> {
        self.flush()?;
        self.receive_packets()
    }

    /**
        Receive until the encoder needs more input or is drained.
    */
    fn receive_packets(&mut self) -> Result<Vec<Packet<L>>> {
        let mut packets = Vec::new();
        while let Received::Item(packet) = self.receive_packet().received()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    /**
        Release the encoder. Equivalent to dropping it.
    */
    pub fn close(self) {
        tracing::debug!(
            codec = %self.config.codec,
            packets = self.packets_encoded,
            "Closing encoder"
        );
    }
}

/**
    Timestamp distance covered by a frame. Audio frames without a duration
    span their sample count.
*/
fn frame_span(duration: i64, layout: &FrameLayout) -> i64 {
    if duration > 0 {
        return duration;
    }
    match layout.samples() {
        Some(samples) => (samples as i64).max(1),
        None => 1,
    }
}

impl<L: NativeLibrary> Drop for Encoder<L> {
    fn drop(&mut self) {
        if self.frames_sent > 0 && self.state != EncodeState::Flushed {
            tracing::warn!(
                codec = %self.config.codec,
                frames = self.frames_sent,
                packets = self.packets_encoded,
                "Encoder dropped without draining, output is truncated"
            );
        }
    }
}

impl<L: NativeLibrary> fmt::Debug for Encoder<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("codec", &self.config.codec)
            .field("time_base", &self.time_base())
            .field("state", &self.state)
            .field("frames_sent", &self.frames_sent)
            .field("packets_encoded", &self.packets_encoded)
            .finish_non_exhaustive()
    }
}
