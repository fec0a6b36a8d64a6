/*!
    The native library seam.

    [`NativeLibrary`] mirrors the C API of a codec/container toolkit: functions
    return numeric codes (negative on failure, see [`av_types::code`]) and
    operate on raw objects that have no destructors of their own. Nothing in
    this trait is memory-safe to misuse; the handles in this crate are the only
    callers and they uphold the contracts documented on each function.
*/

use av_types::{
    CodecId, CodecParameters, FrameLayout, MediaKind, MediaParams, Rational, StreamDescriptor,
};

use crate::io::{MediaSink, MediaSource};

/**
    Timing and routing fields of a packet, in the packet's time base.

    Missing timestamps are [`av_types::code::NOPTS_VALUE`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketProps {
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub stream_index: usize,
    pub key: bool,
}

impl Default for PacketProps {
    fn default() -> Self {
        Self {
            pts: av_types::code::NOPTS_VALUE,
            dts: av_types::code::NOPTS_VALUE,
            duration: 0,
            stream_index: 0,
            key: false,
        }
    }
}

/**
    Timing fields of a frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameProps {
    pub pts: i64,
    pub duration: i64,
    pub key: bool,
}

impl Default for FrameProps {
    fn default() -> Self {
        Self {
            pts: av_types::code::NOPTS_VALUE,
            duration: 0,
            key: false,
        }
    }
}

/**
    Whether a codec context decodes or encodes.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecRole {
    Decoder,
    Encoder,
}

/**
    Options applied when a codec context is opened.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Target bitrate in bits per second.
    pub bitrate: Option<u64>,
    /// Distance between keyframes, in frames.
    pub keyframe_interval: Option<u32>,
    /// Emit codec headers once in the parameters instead of in-band.
    pub global_header: bool,
    /// Codec private options, applied by name.
    pub extra: Vec<(String, String)>,
}

/**
    What a muxer for a given sink looks like.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    /// Short name of the container format.
    pub name: String,
    /// Encoders feeding this format must put codec headers in the parameters.
    pub global_header: bool,
}

/**
    A native multimedia library.

    Raw objects are released with the matching `*_free` / `close_*` function
    exactly once; after that the object is not passed to any other function.
    All `*_free` functions take the object by `&mut` so an implementation can
    mark it released, mirroring `av_packet_free(&pkt)` in C.
*/
pub trait NativeLibrary: Clone + Send + Sync + 'static {
    /// Compressed packet object.
    type Packet: Send + Sync;
    /// Decoded frame object.
    type Frame: Send + Sync;
    /// Demuxing container context.
    type Input: Send;
    /// Muxing container context.
    type Output: Send;
    /// Decoder or encoder context.
    type Codec: Send;
    /// Bitstream parser splitting raw bytes into packets.
    type Parser: Send;
    /// Video scaling and pixel format conversion context.
    type Scaler: Send;
    /// Configured filter graph with one input and one output.
    type Filter: Send;

    /**
        Short name of the implementation, for logging.
    */
    fn name(&self) -> &'static str;

    // Packets

    /// Returns `None` on allocation failure.
    fn packet_alloc(&self) -> Option<Self::Packet>;
    fn packet_free(&self, pkt: &mut Self::Packet);
    /// Make `dst` reference the buffer of `src`. `dst` must be blank.
    fn packet_ref(&self, dst: &mut Self::Packet, src: &Self::Packet) -> i32;
    /// Drop the buffer reference and reset all fields.
    fn packet_unref(&self, pkt: &mut Self::Packet);
    /// Attach a new zeroed, writable buffer of `size` bytes.
    fn packet_alloc_data(&self, pkt: &mut Self::Packet, size: usize) -> i32;
    fn packet_data<'a>(&self, pkt: &'a Self::Packet) -> &'a [u8];
    /// Returns `None` unless the packet is writable.
    fn packet_data_mut<'a>(&self, pkt: &'a mut Self::Packet) -> Option<&'a mut [u8]>;
    fn packet_is_writable(&self, pkt: &Self::Packet) -> bool;
    /// Copy the buffer if it is shared.
    fn packet_make_writable(&self, pkt: &mut Self::Packet) -> i32;
    fn packet_props(&self, pkt: &Self::Packet) -> PacketProps;
    fn packet_set_props(&self, pkt: &mut Self::Packet, props: &PacketProps);

    // Frames

    /// Returns `None` on allocation failure.
    fn frame_alloc(&self) -> Option<Self::Frame>;
    fn frame_free(&self, frame: &mut Self::Frame);
    /// Make `dst` reference the buffers of `src`. `dst` must be blank.
    fn frame_ref(&self, dst: &mut Self::Frame, src: &Self::Frame) -> i32;
    fn frame_unref(&self, frame: &mut Self::Frame);
    /// Allocate buffers for `layout`. The frame must be blank.
    fn frame_get_buffer(&self, frame: &mut Self::Frame, layout: &FrameLayout) -> i32;
    /// Returns `None` for blank frames and formats the layout cannot express.
    fn frame_layout(&self, frame: &Self::Frame) -> Option<FrameLayout>;
    /// Bytes per row of `plane`, including padding.
    fn frame_linesize(&self, frame: &Self::Frame, plane: usize) -> usize;
    fn frame_plane<'a>(&self, frame: &'a Self::Frame, plane: usize) -> Option<&'a [u8]>;
    /// Returns `None` unless the frame is writable.
    fn frame_plane_mut<'a>(&self, frame: &'a mut Self::Frame, plane: usize)
    -> Option<&'a mut [u8]>;
    fn frame_is_writable(&self, frame: &Self::Frame) -> bool;
    fn frame_make_writable(&self, frame: &mut Self::Frame) -> i32;
    fn frame_props(&self, frame: &Self::Frame) -> FrameProps;
    fn frame_set_props(&self, frame: &mut Self::Frame, props: &FrameProps);

    // Demuxing

    /// Open a source, detect its format and read stream information.
    fn open_input(&self, source: MediaSource) -> Result<Self::Input, i32>;
    fn input_format_name(&self, input: &Self::Input) -> String;
    fn input_streams(&self, input: &Self::Input) -> Vec<StreamDescriptor>;
    /// Container duration in microseconds.
    fn input_duration(&self, input: &Self::Input) -> Option<i64>;
    /// Index of the preferred stream of `kind`, or a negative code.
    fn input_best_stream(&self, input: &Self::Input, kind: MediaKind) -> i32;
    /// Read the next packet into a blank `pkt`.
    fn read_packet(&self, input: &mut Self::Input, pkt: &mut Self::Packet) -> i32;
    /// Seek to the keyframe at or before `micros`.
    fn seek_input(&self, input: &mut Self::Input, micros: i64) -> i32;
    fn close_input(&self, input: &mut Self::Input);

    // Muxing

    /// Resolve the muxer a sink would use, without opening it.
    fn output_format(&self, sink: &MediaSink) -> Result<OutputFormat, i32>;
    fn open_output(&self, sink: MediaSink) -> Result<Self::Output, i32>;
    /// 1 if the muxer can store `codec`, 0 if not, negative on failure.
    fn output_query_codec(&self, output: &Self::Output, codec: CodecId) -> i32;
    /// Add a stream; returns its index or a negative code.
    fn output_new_stream(&self, output: &mut Self::Output, stream: &StreamDescriptor) -> i32;
    fn write_header(&self, output: &mut Self::Output) -> i32;
    /// Time base the muxer chose for a stream. Valid after the header is written.
    fn output_stream_time_base(&self, output: &Self::Output, index: usize) -> Option<Rational>;
    /// Write a packet whose timestamps are in the output stream's time base.
    /// The packet is left blank.
    fn write_packet(&self, output: &mut Self::Output, pkt: &mut Self::Packet) -> i32;
    fn write_trailer(&self, output: &mut Self::Output) -> i32;
    fn close_output(&self, output: &mut Self::Output);

    // Codecs

    /// Find a codec for `params` and allocate a context for it.
    fn codec_alloc(
        &self,
        role: CodecRole,
        params: &CodecParameters,
        time_base: Rational,
    ) -> Result<Self::Codec, i32>;
    fn codec_open(&self, codec: &mut Self::Codec, options: &CodecOptions) -> i32;
    fn codec_parameters(&self, codec: &Self::Codec) -> CodecParameters;
    fn codec_time_base(&self, codec: &Self::Codec) -> Rational;
    /// `None` enters draining mode.
    fn send_packet(&self, codec: &mut Self::Codec, pkt: Option<&Self::Packet>) -> i32;
    /// Receive into a blank `frame`.
    fn receive_frame(&self, codec: &mut Self::Codec, frame: &mut Self::Frame) -> i32;
    /// `None` enters draining mode.
    fn send_frame(&self, codec: &mut Self::Codec, frame: Option<&Self::Frame>) -> i32;
    /// Receive into a blank `pkt`.
    fn receive_packet(&self, codec: &mut Self::Codec, pkt: &mut Self::Packet) -> i32;
    /// Discard buffered state and leave draining mode.
    fn codec_flush(&self, codec: &mut Self::Codec);
    fn codec_free(&self, codec: &mut Self::Codec);

    // Parsers

    /// `ENOSYS` if no parser exists for `codec`.
    fn parser_init(&self, codec: CodecId) -> Result<Self::Parser, i32>;
    /**
        Feed `input` to the parser. Returns the number of bytes consumed or a
        negative code. When a packet is complete it is stored in the blank
        `pkt`, which otherwise stays blank. An empty `input` flushes: call it
        until no packet comes out.
    */
    fn parser_parse(&self, parser: &mut Self::Parser, input: &[u8], pkt: &mut Self::Packet)
    -> i32;
    fn parser_close(&self, parser: &mut Self::Parser);

    // Scaling

    /// `ENOSYS` if the conversion between the two video layouts is not supported.
    fn scale_alloc(&self, src: &FrameLayout, dst: &FrameLayout) -> Result<Self::Scaler, i32>;
    /// Convert `src` into `dst`, whose buffers already have the target layout.
    fn scale_frame(&self, scaler: &mut Self::Scaler, src: &Self::Frame, dst: &mut Self::Frame)
    -> i32;
    fn scale_free(&self, scaler: &mut Self::Scaler);

    // Filtering

    /**
        Parse and configure `description`, a comma separated filter chain,
        fed by frames matching `input` in `time_base`. `FILTER_NOT_FOUND` for
        an unknown filter name.
    */
    fn filter_alloc(
        &self,
        description: &str,
        input: &MediaParams,
        time_base: Rational,
    ) -> Result<Self::Filter, i32>;
    /// `None` marks the end of input.
    fn filter_send_frame(&self, filter: &mut Self::Filter, frame: Option<&Self::Frame>) -> i32;
    /// Receive into a blank `frame`; `EAGAIN` until more input, `EOF` when done.
    fn filter_receive_frame(&self, filter: &mut Self::Filter, frame: &mut Self::Frame) -> i32;
    /// Parameters of the frames the graph produces.
    fn filter_output(&self, filter: &Self::Filter) -> MediaParams;
    fn filter_time_base(&self, filter: &Self::Filter) -> Rational;
    fn filter_free(&self, filter: &mut Self::Filter);
}
