/*!
    A deterministic, in-process native library for testing the av crate
    ecosystem.

    [`SyntheticLibrary`] implements [`NativeLibrary`] without any system
    dependency. Its containers are small self-describing files (see
    [`container`]) and its codecs pass raw frames through while reproducing
    the buffering behaviour of real codecs (see [`codec`]). Every object it
    allocates is recorded in a [`Ledger`], so tests can check that a scenario
    released everything exactly once.

    | Codec | Behaviour |
    |---|---|
    | `RawVideo` | one frame per packet, no delay |
    | `Mpeg4` | one frame per packet, two frames of delay, periodic keyframes |
    | `PcmS16Le` | one frame per packet, no delay |
    | `Aac` | two frames per packet |

    Every codec has a parser (see [`SynthParser`]). Scaling and filter graphs
    cover nearest-neighbour resizing and a few pixel format conversions (see
    [`scale`] and [`filter`]).

    | Format | Extension | Behaviour |
    |---|---|---|
    | `synth` | `.synth` | keeps stream time bases |
    | `synth-ms` | `.synthm` | millisecond time bases, wants global headers |
    | `synth-video` | `.synthv` | video streams only |

    ```
    use av_core::Packet;
    use av_synthetic::{Resource, SyntheticLibrary};

    let lib = SyntheticLibrary::new();
    let packet = Packet::from_bytes(&lib, b"abc").unwrap();
    let second = packet.try_clone().unwrap();
    drop(packet);
    assert_eq!(second.data(), b"abc");
    drop(second);

    let ledger = lib.ledger();
    assert_eq!(ledger.allocated(Resource::Buffer), 1);
    assert!(ledger.is_balanced());
    ```
*/

pub mod codec;
pub mod container;
pub mod filter;
pub mod payload;
pub mod scale;

mod buffer;
mod fixtures;
mod input;
mod ledger;
mod output;
mod parser;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use av_core::{
    CodecOptions, CodecRole, FrameProps, MediaSink, MediaSource, NativeLibrary, OutputFormat,
    PacketProps,
};
use av_types::{
    CodecId, CodecParameters, FrameLayout, MediaKind, MediaParams, Rational, StreamDescriptor,
    code,
};

pub use buffer::{LINE_ALIGN, SynthFrame, SynthPacket};
pub use codec::SynthCodec;
pub use filter::SynthFilter;
pub use fixtures::{Fixture, FixturePacket};
pub use input::SynthInput;
pub use ledger::{Ledger, LedgerSnapshot, Resource};
pub use output::SynthOutput;
pub use parser::SynthParser;
pub use scale::SynthScaler;

use buffer::{SynthBuffer, make_unique, unique_mut};
use container::Record;
use payload::FramePayload;

struct Inner {
    ledger: Arc<Ledger>,
    next_id: AtomicU64,
}

/**
    The synthetic native library. Clones share one ledger.
*/
#[derive(Clone)]
pub struct SyntheticLibrary(Arc<Inner>);

impl SyntheticLibrary {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            ledger: Arc::new(Ledger::new()),
            next_id: AtomicU64::new(1),
        }))
    }

    /**
        Current allocation counters.
    */
    pub fn ledger(&self) -> LedgerSnapshot {
        self.0.ledger.snapshot()
    }

    /**
        Let `count` more allocations succeed, then fail the rest.
    */
    pub fn fail_allocations_after(&self, count: u64) {
        self.0.ledger.fail_after(count);
    }

    pub fn clear_faults(&self) {
        self.0.ledger.clear_faults();
    }

    fn ledger_arc(&self) -> &Arc<Ledger> {
        &self.0.ledger
    }

    fn next_id(&self) -> u64 {
        self.0.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn try_allocate(&self, resource: Resource) -> bool {
        self.0.ledger.try_allocate(resource)
    }
}

impl Default for SyntheticLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyntheticLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticLibrary")
            .field("ledger", &self.ledger())
            .finish()
    }
}

impl NativeLibrary for SyntheticLibrary {
    type Packet = SynthPacket;
    type Frame = SynthFrame;
    type Input = SynthInput;
    type Output = SynthOutput;
    type Codec = SynthCodec;
    type Parser = SynthParser;
    type Scaler = SynthScaler;
    type Filter = SynthFilter;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn packet_alloc(&self) -> Option<SynthPacket> {
        self.try_allocate(Resource::Packet)
            .then(SynthPacket::new)
    }

    fn packet_free(&self, pkt: &mut SynthPacket) {
        if pkt.freed {
            self.0.ledger.double_free(Resource::Packet);
            return;
        }
        pkt.unref();
        pkt.freed = true;
        self.0.ledger.release(Resource::Packet);
    }

    fn packet_ref(&self, dst: &mut SynthPacket, src: &SynthPacket) -> i32 {
        if !dst.is_blank() {
            return code::EINVAL;
        }
        dst.buf = src.buf.clone();
        dst.props = src.props;
        0
    }

    fn packet_unref(&self, pkt: &mut SynthPacket) {
        pkt.unref();
    }

    fn packet_alloc_data(&self, pkt: &mut SynthPacket, size: usize) -> i32 {
        pkt.buf = Some(SynthBuffer::new(self.ledger_arc(), vec![0; size]));
        0
    }

    fn packet_data<'a>(&self, pkt: &'a SynthPacket) -> &'a [u8] {
        pkt.data()
    }

    fn packet_data_mut<'a>(&self, pkt: &'a mut SynthPacket) -> Option<&'a mut [u8]> {
        match pkt.buf.as_mut() {
            Some(buf) => unique_mut(buf),
            None => Some(&mut []),
        }
    }

    fn packet_is_writable(&self, pkt: &SynthPacket) -> bool {
        pkt.buf.as_ref().is_some_and(|b| Arc::strong_count(b) == 1)
    }

    fn packet_make_writable(&self, pkt: &mut SynthPacket) -> i32 {
        match pkt.buf.as_mut() {
            Some(buf) => make_unique(self.ledger_arc(), buf),
            None => pkt.buf = Some(SynthBuffer::new(self.ledger_arc(), Vec::new())),
        }
        0
    }

    fn packet_props(&self, pkt: &SynthPacket) -> PacketProps {
        pkt.props
    }

    fn packet_set_props(&self, pkt: &mut SynthPacket, props: &PacketProps) {
        pkt.props = *props;
    }

    fn frame_alloc(&self) -> Option<SynthFrame> {
        self.try_allocate(Resource::Frame)
            .then(SynthFrame::new)
    }

    fn frame_free(&self, frame: &mut SynthFrame) {
        if frame.freed {
            self.0.ledger.double_free(Resource::Frame);
            return;
        }
        frame.unref();
        frame.freed = true;
        self.0.ledger.release(Resource::Frame);
    }

    fn frame_ref(&self, dst: &mut SynthFrame, src: &SynthFrame) -> i32 {
        if !dst.is_blank() {
            return code::EINVAL;
        }
        dst.layout = src.layout;
        dst.linesizes = src.linesizes.clone();
        dst.planes = src.planes.clone();
        dst.props = src.props;
        0
    }

    fn frame_unref(&self, frame: &mut SynthFrame) {
        frame.unref();
    }

    fn frame_get_buffer(&self, frame: &mut SynthFrame, layout: &FrameLayout) -> i32 {
        if !frame.is_blank() {
            return code::EINVAL;
        }
        let empty = match *layout {
            FrameLayout::Video { width, height, .. } => width == 0 || height == 0,
            FrameLayout::Audio { samples, .. } => samples == 0,
        };
        if empty {
            return code::EINVAL;
        }
        frame.allocate(self.ledger_arc(), *layout);
        0
    }

    fn frame_layout(&self, frame: &SynthFrame) -> Option<FrameLayout> {
        frame.layout
    }

    fn frame_linesize(&self, frame: &SynthFrame, plane: usize) -> usize {
        frame.linesizes.get(plane).copied().unwrap_or(0)
    }

    fn frame_plane<'a>(&self, frame: &'a SynthFrame, plane: usize) -> Option<&'a [u8]> {
        frame.planes.get(plane).map(|b| b.data())
    }

    fn frame_plane_mut<'a>(
        &self,
        frame: &'a mut SynthFrame,
        plane: usize,
    ) -> Option<&'a mut [u8]> {
        if !frame.is_writable() {
            return None;
        }
        frame.planes.get_mut(plane).and_then(unique_mut)
    }

    fn frame_is_writable(&self, frame: &SynthFrame) -> bool {
        frame.is_writable()
    }

    fn frame_make_writable(&self, frame: &mut SynthFrame) -> i32 {
        if frame.is_blank() {
            return code::EINVAL;
        }
        for plane in &mut frame.planes {
            make_unique(self.ledger_arc(), plane);
        }
        0
    }

    fn frame_props(&self, frame: &SynthFrame) -> FrameProps {
        frame.props
    }

    fn frame_set_props(&self, frame: &mut SynthFrame, props: &FrameProps) {
        frame.props = *props;
    }

    fn open_input(&self, source: MediaSource) -> Result<SynthInput, i32> {
        let input = SynthInput::open(self.next_id(), source)?;
        if !self.try_allocate(Resource::Input) {
            return Err(code::ENOMEM);
        }
        Ok(input)
    }

    fn input_format_name(&self, input: &SynthInput) -> String {
        input.format_name().to_string()
    }

    fn input_streams(&self, input: &SynthInput) -> Vec<StreamDescriptor> {
        input.streams().to_vec()
    }

    fn input_duration(&self, input: &SynthInput) -> Option<i64> {
        input.duration_micros()
    }

    fn input_best_stream(&self, input: &SynthInput, kind: MediaKind) -> i32 {
        input.best_stream(kind)
    }

    fn read_packet(&self, input: &mut SynthInput, pkt: &mut SynthPacket) -> i32 {
        if !pkt.is_blank() {
            return code::EINVAL;
        }
        match input.read() {
            Ok(record) => {
                pkt.buf = Some(SynthBuffer::new(self.ledger_arc(), record.data));
                pkt.props = PacketProps {
                    pts: record.pts,
                    dts: record.dts,
                    duration: record.duration,
                    stream_index: record.stream as usize,
                    key: record.key,
                };
                0
            }
            Err(code) => code,
        }
    }

    fn seek_input(&self, input: &mut SynthInput, micros: i64) -> i32 {
        input.seek(micros)
    }

    fn close_input(&self, input: &mut SynthInput) {
        if input.closed {
            self.0.ledger.double_free(Resource::Input);
            return;
        }
        input.closed = true;
        self.0.ledger.release(Resource::Input);
        tracing::trace!(id = input.id, "Synthetic input closed");
    }

    fn output_format(&self, sink: &MediaSink) -> Result<OutputFormat, i32> {
        output::resolve_format(sink).map(output::output_format)
    }

    fn open_output(&self, sink: MediaSink) -> Result<SynthOutput, i32> {
        let output = SynthOutput::open(self.next_id(), sink)?;
        if !self.try_allocate(Resource::Output) {
            return Err(code::ENOMEM);
        }
        Ok(output)
    }

    fn output_query_codec(&self, output: &SynthOutput, codec: CodecId) -> i32 {
        output.query_codec(codec)
    }

    fn output_new_stream(&self, output: &mut SynthOutput, stream: &StreamDescriptor) -> i32 {
        output.new_stream(stream)
    }

    fn write_header(&self, output: &mut SynthOutput) -> i32 {
        output.write_header()
    }

    fn output_stream_time_base(&self, output: &SynthOutput, index: usize) -> Option<Rational> {
        output.stream_time_base(index)
    }

    fn write_packet(&self, output: &mut SynthOutput, pkt: &mut SynthPacket) -> i32 {
        let record = Record {
            stream: pkt.props.stream_index as u32,
            key: pkt.props.key,
            pts: pkt.props.pts,
            dts: pkt.props.dts,
            duration: pkt.props.duration,
            data: pkt.data().to_vec(),
        };
        let ret = output.write(&record);
        if ret >= 0 {
            pkt.unref();
        }
        ret
    }

    fn write_trailer(&self, output: &mut SynthOutput) -> i32 {
        let ret = output.write_trailer();
        if ret >= 0 {
            self.0.ledger.trailer_written();
        }
        ret
    }

    fn close_output(&self, output: &mut SynthOutput) {
        if output.closed {
            self.0.ledger.double_free(Resource::Output);
            return;
        }
        output.closed = true;
        self.0.ledger.release(Resource::Output);
        tracing::trace!(id = output.id, format = output.format.name(), "Synthetic output closed");
    }

    fn codec_alloc(
        &self,
        role: CodecRole,
        params: &CodecParameters,
        time_base: Rational,
    ) -> Result<SynthCodec, i32> {
        let codec = SynthCodec::new(self.next_id(), role, params, time_base)?;
        if !self.try_allocate(Resource::Codec) {
            return Err(code::ENOMEM);
        }
        Ok(codec)
    }

    fn codec_open(&self, codec: &mut SynthCodec, options: &CodecOptions) -> i32 {
        codec.open(options)
    }

    fn codec_parameters(&self, codec: &SynthCodec) -> CodecParameters {
        codec.parameters()
    }

    fn codec_time_base(&self, codec: &SynthCodec) -> Rational {
        codec.time_base()
    }

    fn send_packet(&self, codec: &mut SynthCodec, pkt: Option<&SynthPacket>) -> i32 {
        codec.send_packet(pkt.map(|p| (p.data(), p.props)))
    }

    fn receive_frame(&self, codec: &mut SynthCodec, frame: &mut SynthFrame) -> i32 {
        if !frame.is_blank() {
            return code::EINVAL;
        }
        match codec.receive_frame() {
            Ok(decoded) => {
                decoded.payload.fill_frame(self.ledger_arc(), frame);
                frame.props = decoded.props;
                0
            }
            Err(code) => code,
        }
    }

    fn send_frame(&self, codec: &mut SynthCodec, frame: Option<&SynthFrame>) -> i32 {
        match frame {
            None => codec.send_frame(None),
            Some(frame) => match FramePayload::from_frame(frame) {
                Some(payload) => codec.send_frame(Some((payload, frame.props))),
                None => code::EINVAL,
            },
        }
    }

    fn receive_packet(&self, codec: &mut SynthCodec, pkt: &mut SynthPacket) -> i32 {
        if !pkt.is_blank() {
            return code::EINVAL;
        }
        match codec.receive_packet() {
            Ok(encoded) => {
                pkt.buf = Some(SynthBuffer::new(self.ledger_arc(), encoded.data));
                pkt.props = encoded.props;
                0
            }
            Err(code) => code,
        }
    }

    fn codec_flush(&self, codec: &mut SynthCodec) {
        codec.flush();
    }

    fn codec_free(&self, codec: &mut SynthCodec) {
        if codec.freed {
            self.0.ledger.double_free(Resource::Codec);
            return;
        }
        codec.flush();
        codec.freed = true;
        self.0.ledger.release(Resource::Codec);
        tracing::trace!(id = codec.id, "Synthetic codec freed");
    }

    fn parser_init(&self, codec: CodecId) -> Result<SynthParser, i32> {
        let parser = SynthParser::new(self.next_id(), codec)?;
        if !self.try_allocate(Resource::Parser) {
            return Err(code::ENOMEM);
        }
        Ok(parser)
    }

    fn parser_parse(&self, parser: &mut SynthParser, input: &[u8], pkt: &mut SynthPacket) -> i32 {
        if !pkt.is_blank() {
            return code::EINVAL;
        }
        match parser.parse(input) {
            Ok((consumed, packet)) => {
                if let Some(packet) = packet {
                    pkt.buf = Some(SynthBuffer::new(self.ledger_arc(), packet.data));
                    pkt.props = packet.props;
                }
                consumed as i32
            }
            Err(code) => code,
        }
    }

    fn parser_close(&self, parser: &mut SynthParser) {
        if parser.freed {
            self.0.ledger.double_free(Resource::Parser);
            return;
        }
        parser.freed = true;
        self.0.ledger.release(Resource::Parser);
        tracing::trace!(id = parser.id, codec = %parser.codec(), "Synthetic parser closed");
    }

    fn scale_alloc(&self, src: &FrameLayout, dst: &FrameLayout) -> Result<SynthScaler, i32> {
        let (
            FrameLayout::Video { format: from, .. },
            FrameLayout::Video { format: to, .. },
        ) = (src, dst)
        else {
            return Err(code::EINVAL);
        };
        if !scale::converts(*from, *to) {
            return Err(code::ENOSYS);
        }
        if !self.try_allocate(Resource::Scaler) {
            return Err(code::ENOMEM);
        }
        Ok(SynthScaler {
            freed: false,
            src: *src,
            dst: *dst,
        })
    }

    fn scale_frame(&self, scaler: &mut SynthScaler, src: &SynthFrame, dst: &mut SynthFrame) -> i32 {
        if src.layout != Some(scaler.src) || dst.layout != Some(scaler.dst) {
            return code::EINVAL;
        }
        let Some(converted) =
            FramePayload::from_frame(src).and_then(|p| scale::scale(&p, scaler.dst))
        else {
            return code::EINVAL;
        };
        if converted.write_into(dst) { 0 } else { code::EINVAL }
    }

    fn scale_free(&self, scaler: &mut SynthScaler) {
        if scaler.freed {
            self.0.ledger.double_free(Resource::Scaler);
            return;
        }
        scaler.freed = true;
        self.0.ledger.release(Resource::Scaler);
    }

    fn filter_alloc(
        &self,
        description: &str,
        input: &MediaParams,
        time_base: Rational,
    ) -> Result<SynthFilter, i32> {
        let filter = SynthFilter::new(self.next_id(), description, input, time_base)?;
        if !self.try_allocate(Resource::Filter) {
            return Err(code::ENOMEM);
        }
        Ok(filter)
    }

    fn filter_send_frame(&self, filter: &mut SynthFilter, frame: Option<&SynthFrame>) -> i32 {
        match frame {
            None => filter.send(None),
            Some(frame) => match FramePayload::from_frame(frame) {
                Some(payload) => filter.send(Some((payload, frame.props))),
                None => code::EINVAL,
            },
        }
    }

    fn filter_receive_frame(&self, filter: &mut SynthFilter, frame: &mut SynthFrame) -> i32 {
        if !frame.is_blank() {
            return code::EINVAL;
        }
        match filter.receive() {
            Ok((payload, props)) => {
                payload.fill_frame(self.ledger_arc(), frame);
                frame.props = props;
                0
            }
            Err(code) => code,
        }
    }

    fn filter_output(&self, filter: &SynthFilter) -> MediaParams {
        filter.output()
    }

    fn filter_time_base(&self, filter: &SynthFilter) -> Rational {
        filter.time_base()
    }

    fn filter_free(&self, filter: &mut SynthFilter) {
        if filter.freed {
            self.0.ledger.double_free(Resource::Filter);
            return;
        }
        filter.freed = true;
        self.0.ledger.release(Resource::Filter);
        tracing::trace!(id = filter.id, "Synthetic filter graph freed");
    }
}
