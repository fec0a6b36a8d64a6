/*!
    Decoder implementation.
*/

use std::collections::VecDeque;
use std::fmt;

use av_core::{CodecContext, Frame, NativeLibrary, Packet};
use av_types::{
    CodecParameters, Error, Rational, Received, Result, ResultExt, StreamDescriptor,
};

use crate::config::DecoderConfig;

/**
    Where a decoder is in its send/receive cycle.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeState {
    /// Opened or reset, nothing sent yet.
    Opened,
    /// Taking packets.
    Accepting,
    /// End of input signalled; buffered frames are still coming out.
    Draining,
    /// Fully drained; every receive returns `EndOfStream` until reset.
    Flushed,
}

/**
    Decoder for one stream.

    Decodes packets into frames stamped with the stream's time base. Codecs
    with reordering or several frames per packet may return zero, one, or
    several frames per packet.
*/
pub struct Decoder<L: NativeLibrary> {
    ctx: CodecContext<L>,
    stream_index: usize,
    state: DecodeState,
    /// Frames received while making room for the end-of-input signal.
    pending: VecDeque<Frame<L>>,
    frames_decoded: u64,
}

impl<L: NativeLibrary> Decoder<L> {
    /**
        Open a decoder for `stream`.

        Fails with `UnsupportedFormat` if no decoder handles the stream's codec.
    */
    pub fn open(lib: &L, stream: &StreamDescriptor) -> Result<Self> {
        Self::open_with_config(lib, stream, &DecoderConfig::default())
    }

    /**
        Open a decoder for `stream` with codec private options.
    */
    pub fn open_with_config(
        lib: &L,
        stream: &StreamDescriptor,
        config: &DecoderConfig,
    ) -> Result<Self> {
        let context = format!("decoder for stream {}", stream.index);
        let ctx = CodecContext::decoder(lib, stream)
            .and_then(|ctx| ctx.open(&config.codec_options()))
            .map_err(|e| e.within(&context))?;
        tracing::info!(
            stream = stream.index,
            codec = %stream.codec_id(),
            time_base = %stream.time_base,
            "Opened decoder"
        );
        Ok(Self {
            ctx,
            stream_index: stream.index,
            state: DecodeState::Opened,
            pending: VecDeque::new(),
            frames_decoded: 0,
        })
    }

    /**
        Index of the stream this decoder was opened for.
    */
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /**
        Get the time base of decoded frames.
    */
    pub fn time_base(&self) -> Rational {
        self.ctx.time_base()
    }

    pub fn parameters(&self) -> CodecParameters {
        self.ctx.parameters()
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /**
        Send one packet.

        `NeedMoreInput` means the decoder is full: receive frames, then send
        the same packet again. Fails with `InvalidArgument` after
        [`Decoder::flush`] until [`Decoder::reset`].
    */
    pub fn send_packet(&mut self, packet: &Packet<L>) -> Result<()> {
        if matches!(self.state, DecodeState::Draining | DecodeState::Flushed) {
            return Err(Error::invalid_argument("send_packet after flush"));
        }
        match self.ctx.send_packet(Some(packet)) {
            Ok(()) => {
                self.state = DecodeState::Accepting;
                Ok(())
            }
            Err(e) => {
                if e.is_need_more_input() {
                    tracing::trace!(stream = self.stream_index, "Decoder full");
                }
                Err(e)
            }
        }
    }

    /**
        Receive one decoded frame.

        `NeedMoreInput` means no frame is ready yet; `EndOfStream` means a
        flush has fully drained, and repeats on every later call.
    */
    pub fn receive_frame(&mut self) -> Result<Frame<L>> {
        if let Some(frame) = self.pending.pop_front() {
            self.frames_decoded += 1;
            return Ok(frame);
        }
        if self.state == DecodeState::Flushed {
            return Err(Error::end_of_stream("receive_frame"));
        }
        match self.ctx.receive_frame() {
            Ok(frame) => {
                self.frames_decoded += 1;
                Ok(frame)
            }
            Err(e) if e.is_end_of_stream() => {
                tracing::debug!(
                    stream = self.stream_index,
                    frames = self.frames_decoded,
                    "Decoder drained"
                );
                self.state = DecodeState::Flushed;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /**
        Signal end of input so the decoder releases the frames it holds.

        Calling it again has no effect and is not an error.
    */
    pub fn flush(&mut self) -> Result<()> {
        if matches!(self.state, DecodeState::Draining | DecodeState::Flushed) {
            return Ok(());
        }
        loop {
            match self.ctx.send_packet(None) {
                Ok(()) => break,
                Err(e) if e.is_need_more_input() => {
                    // Make room, keeping the frames for receive_frame.
                    let frame = self.ctx.receive_frame()?;
                    self.pending.push_back(frame);
                }
                Err(e) if e.is_end_of_stream() => break,
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(stream = self.stream_index, "Decoder flushing");
        self.state = DecodeState::Draining;
        Ok(())
    }

    /**
        Reset the decoder after a flush or a seek.

        Discards buffered packets and frames and accepts packets again.
    */
    pub fn reset(&mut self) {
        self.ctx.flush_buffers();
        self.pending.clear();
        self.state = DecodeState::Opened;
        tracing::debug!(stream = self.stream_index, "Decoder reset");
    }

    /**
        Decode a packet, returning the frames that are ready.

        If the decoder is full, the ready frames are received first and the
        packet is sent again.
    */
    pub fn decode(&mut self, packet: &Packet<L>) -> Result<Vec<Frame<L>>> {
        match self.send_packet(packet) {
            Ok(()) => self.receive_frames(),
            Err(e) if e.is_need_more_input() => {
                let mut frames = self.receive_frames()?;
                if let Err(e) = self.send_packet(packet) {
                    // Keep the frames for receive_frame.
                    self.frames_decoded -= frames.len() as u64;
                    for frame in frames.into_iter().rev() {
                        self.pending.push_front(frame);
                    }
                    return Err(e);
                }
                frames.extend(self.receive_frames()?);
                Ok(frames)
            }
            Err(e) => Err(e),
        }
    }

    /**
        Flush and collect every remaining frame.
    */
    pub fn drain(&mut self) -> Result<Vec<Frame<L>>> {
        self.flush()?;
        self.receive_frames()
    }

    /**
        Receive until the decoder needs more input or is drained.
    */
    fn receive_frames(&mut self) -> Result<Vec<Frame<L>>> {
        let mut frames = Vec::new();
        while let Received::Item(frame) = self.receive_frame().received()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /**
        Release the decoder. Equivalent to dropping it.
    */
    pub fn close(self) {
        tracing::debug!(
            stream = self.stream_index,
            frames = self.frames_decoded,
            "Closing decoder"
        );
    }
}

impl<L: NativeLibrary> fmt::Debug for Decoder<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("stream_index", &self.stream_index)
            .field("time_base", &self.time_base())
            .field("state", &self.state)
            .field("frames_decoded", &self.frames_decoded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_source::Demuxer;
    use av_synthetic::{Fixture, SyntheticLibrary};
    use av_types::{ChannelLayout, CodecId, ErrorKind};

    fn open(fixture: &Fixture) -> (SyntheticLibrary, Demuxer<SyntheticLibrary>) {
        let lib = SyntheticLibrary::new();
        let demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
        (lib, demuxer)
    }

    #[test]
    fn delayed_codec_holds_frames_until_flush() {
        let fixture = Fixture::new()
            .video(CodecId::Mpeg4, 4, 4, 25)
            .packets_per_stream(5);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        assert_eq!(decoder.state(), DecodeState::Opened);

        let mut frames = Vec::new();
        for packet in &mut demuxer {
            frames.extend(decoder.decode(&packet.unwrap()).unwrap());
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(decoder.state(), DecodeState::Accepting);

        let rest = decoder.drain().unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(decoder.state(), DecodeState::Flushed);
        let pts: Vec<_> = frames.iter().chain(&rest).map(|f| f.pts()).collect();
        assert_eq!(pts, (0..5).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn second_flush_is_a_no_op() {
        let fixture = Fixture::new()
            .video(CodecId::Mpeg4, 4, 4, 25)
            .packets_per_stream(3);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        for packet in &mut demuxer {
            decoder.send_packet(&packet.unwrap()).unwrap();
        }
        assert_eq!(decoder.drain().unwrap().len(), 3);
        decoder.flush().unwrap();
        assert!(decoder.drain().unwrap().is_empty());
        assert!(decoder.receive_frame().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn send_after_flush_needs_reset() {
        let fixture = Fixture::new()
            .audio(CodecId::Aac, 8000, ChannelLayout::Mono, 4)
            .packets_per_stream(2);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        let packet = demuxer.read_packet().unwrap();
        assert_eq!(decoder.decode(&packet).unwrap().len(), 2);

        decoder.flush().unwrap();
        let err = decoder.send_packet(&packet).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        decoder.reset();
        assert_eq!(decoder.decode(&packet).unwrap().len(), 2);
    }

    #[test]
    fn full_decoder_pushes_back() {
        let fixture = Fixture::new()
            .audio(CodecId::Aac, 8000, ChannelLayout::Mono, 4)
            .packets_per_stream(2);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        let first = demuxer.read_packet().unwrap();
        let second = demuxer.read_packet().unwrap();
        decoder.send_packet(&first).unwrap();
        let err = decoder.send_packet(&second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NeedMoreInput);

        // flush makes room by itself and keeps the frames it had to take.
        decoder.flush().unwrap();
        assert_eq!(decoder.drain().unwrap().len(), 2);
        assert_eq!(decoder.frames_decoded(), 2);
    }

    #[test]
    fn failed_resend_keeps_the_received_frames() {
        let fixture = Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .packets_per_stream(2);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        for packet in &mut demuxer {
            decoder.send_packet(&packet.unwrap()).unwrap();
        }

        let junk = Packet::from_bytes(&lib, b"junk").unwrap();
        let err = decoder.decode(&junk).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(decoder.frames_decoded(), 0);

        let pts: Vec<_> = (0..2)
            .map(|_| decoder.receive_frame().unwrap().pts())
            .collect();
        assert_eq!(pts, vec![Some(0), Some(1)]);
        assert!(decoder.receive_frame().unwrap_err().is_need_more_input());
    }

    #[test]
    fn unknown_codec_is_unsupported() {
        let fixture = Fixture::new().video(CodecId::H264, 4, 4, 25);
        let (lib, demuxer) = open(&fixture);
        let err = Decoder::open(&lib, &demuxer.streams()[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(err.context().starts_with("decoder for stream 0"));
    }

    #[test]
    fn frames_carry_the_stream_time_base() {
        let fixture = Fixture::new().audio(CodecId::PcmS16Le, 8000, ChannelLayout::Stereo, 80);
        let (lib, mut demuxer) = open(&fixture);
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
        let frames = decoder.decode(&demuxer.read_packet().unwrap()).unwrap();
        assert_eq!(frames[0].time_base(), Rational::new(1, 8000));
        assert_eq!(frames[0].duration(), 80);
        decoder.close();
    }
}
