/*!
    [`NativeLibrary`] backed by the FFmpeg libraries.

    Raw objects are thin pointer wrappers; every call goes straight to the C
    API through `ffmpeg_next::ffi`.
*/

mod avio;
mod convert;
mod graph;

use std::ffi::{CString, c_int};
use std::ptr;

use ffmpeg_next::ffi::*;

use av_types::{
    CodecId, CodecParameters, FrameLayout, MediaKind, MediaParams, Rational, StreamDescriptor,
    code,
};

use crate::io::{MediaSink, MediaSource};
use crate::native::{
    CodecOptions, CodecRole, FrameProps, NativeLibrary, OutputFormat, PacketProps,
};

use self::avio::{AvioReader, AvioWriter};
pub use self::graph::{FfFilter, FfParser, FfScaler};
use self::convert::{
    codec_id_to_ffmpeg, descriptor_from_stream, media_kind_to_ffmpeg, parameters_from_ffmpeg,
    parameters_to_ffmpeg, pixel_format_from_ffmpeg, pixel_format_to_ffmpeg, pixel_from_raw,
    rational_from_ffmpeg, rational_to_ffmpeg, sample_format_from_ffmpeg, sample_format_to_ffmpeg,
    sample_from_raw,
};

/**
    The FFmpeg libraries. Cheap to clone; holds no state.
*/
#[derive(Clone, Copy, Debug)]
pub struct FfmpegLibrary {
    _private: (),
}

impl FfmpegLibrary {
    /**
        Initialize FFmpeg and return a handle to it.
    */
    pub fn new() -> av_types::Result<Self> {
        ffmpeg_next::init().map_err(|e| {
            av_types::Error::new(
                av_types::ErrorKind::ResourceUnavailable,
                format!("ffmpeg init: {e}"),
            )
        })?;
        tracing::debug!("FFmpeg initialized");
        Ok(Self { _private: () })
    }
}

pub struct FfPacket(*mut AVPacket);
pub struct FfFrame(*mut AVFrame);

// SAFETY: packets and frames are only mutated through &mut; FFmpeg buffer
// references are atomically counted.
unsafe impl Send for FfPacket {}
unsafe impl Sync for FfPacket {}
unsafe impl Send for FfFrame {}
unsafe impl Sync for FfFrame {}

pub struct FfInput {
    ctx: *mut AVFormatContext,
    io: Option<AvioReader>,
}

pub struct FfOutput {
    ctx: *mut AVFormatContext,
    io: Option<AvioWriter>,
    owns_file: bool,
}

pub struct FfCodec {
    ctx: *mut AVCodecContext,
    codec: *const AVCodec,
    role: CodecRole,
}

// SAFETY: contexts are owned by one handle at a time and never shared.
unsafe impl Send for FfInput {}
unsafe impl Send for FfOutput {}
unsafe impl Send for FfCodec {}

fn cstring(s: &str) -> Result<CString, c_int> {
    CString::new(s).map_err(|_| code::EINVAL)
}

fn path_cstring(path: &std::path::Path) -> Result<CString, c_int> {
    path.to_str().ok_or(code::EINVAL).and_then(cstring)
}

/// Rows of `plane` for the frame's layout.
fn plane_rows(layout: &FrameLayout, plane: usize) -> usize {
    layout.plane_shape(plane).map(|(_, rows)| rows).unwrap_or(0)
}

fn linesize(f: &AVFrame, index: usize) -> usize {
    f.linesize.get(index).map_or(0, |&l| l.max(0) as usize)
}

/**
    Start of `plane`. Audio frames list their planes in `extended_data`, which
    is the only place planes past the eighth exist; only `linesize[0]` is set
    for them.

    # Safety

    `f` must be a valid frame and `plane` below its plane count.
*/
unsafe fn plane_ptr(f: &AVFrame, plane: usize) -> *mut u8 {
    let audio = f.width <= 0 && f.nb_samples > 0;
    if audio && !f.extended_data.is_null() {
        unsafe { *f.extended_data.add(plane) }
    } else {
        f.data.get(plane).copied().unwrap_or(ptr::null_mut())
    }
}

impl NativeLibrary for FfmpegLibrary {
    type Packet = FfPacket;
    type Frame = FfFrame;
    type Input = FfInput;
    type Output = FfOutput;
    type Codec = FfCodec;
    type Parser = FfParser;
    type Scaler = FfScaler;
    type Filter = FfFilter;

    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn packet_alloc(&self) -> Option<FfPacket> {
        let pkt = unsafe { av_packet_alloc() };
        (!pkt.is_null()).then_some(FfPacket(pkt))
    }

    fn packet_free(&self, pkt: &mut FfPacket) {
        unsafe { av_packet_free(&mut pkt.0) };
    }

    fn packet_ref(&self, dst: &mut FfPacket, src: &FfPacket) -> i32 {
        unsafe { av_packet_ref(dst.0, src.0) }
    }

    fn packet_unref(&self, pkt: &mut FfPacket) {
        unsafe { av_packet_unref(pkt.0) };
    }

    fn packet_alloc_data(&self, pkt: &mut FfPacket, size: usize) -> i32 {
        let Ok(size) = c_int::try_from(size) else {
            return code::ERANGE;
        };
        let ret = unsafe { av_new_packet(pkt.0, size) };
        if ret >= 0 {
            unsafe { ptr::write_bytes((*pkt.0).data, 0, size as usize) };
        }
        ret
    }

    fn packet_data<'a>(&self, pkt: &'a FfPacket) -> &'a [u8] {
        unsafe {
            let p = &*pkt.0;
            if p.data.is_null() || p.size <= 0 {
                &[]
            } else {
                std::slice::from_raw_parts(p.data, p.size as usize)
            }
        }
    }

    fn packet_data_mut<'a>(&self, pkt: &'a mut FfPacket) -> Option<&'a mut [u8]> {
        if !self.packet_is_writable(pkt) {
            return None;
        }
        unsafe {
            let p = &mut *pkt.0;
            if p.data.is_null() || p.size <= 0 {
                Some(&mut [])
            } else {
                Some(std::slice::from_raw_parts_mut(p.data, p.size as usize))
            }
        }
    }

    fn packet_is_writable(&self, pkt: &FfPacket) -> bool {
        unsafe {
            let buf = (*pkt.0).buf;
            !buf.is_null() && av_buffer_is_writable(buf) != 0
        }
    }

    fn packet_make_writable(&self, pkt: &mut FfPacket) -> i32 {
        unsafe { av_packet_make_writable(pkt.0) }
    }

    fn packet_props(&self, pkt: &FfPacket) -> PacketProps {
        let p = unsafe { &*pkt.0 };
        PacketProps {
            pts: p.pts,
            dts: p.dts,
            duration: p.duration,
            stream_index: p.stream_index.max(0) as usize,
            key: p.flags & AV_PKT_FLAG_KEY as c_int != 0,
        }
    }

    fn packet_set_props(&self, pkt: &mut FfPacket, props: &PacketProps) {
        let p = unsafe { &mut *pkt.0 };
        p.pts = props.pts;
        p.dts = props.dts;
        p.duration = props.duration;
        p.stream_index = props.stream_index as c_int;
        if props.key {
            p.flags |= AV_PKT_FLAG_KEY as c_int;
        } else {
            p.flags &= !(AV_PKT_FLAG_KEY as c_int);
        }
    }

    fn frame_alloc(&self) -> Option<FfFrame> {
        let frame = unsafe { av_frame_alloc() };
        (!frame.is_null()).then_some(FfFrame(frame))
    }

    fn frame_free(&self, frame: &mut FfFrame) {
        unsafe { av_frame_free(&mut frame.0) };
    }

    fn frame_ref(&self, dst: &mut FfFrame, src: &FfFrame) -> i32 {
        unsafe { av_frame_ref(dst.0, src.0) }
    }

    fn frame_unref(&self, frame: &mut FfFrame) {
        unsafe { av_frame_unref(frame.0) };
    }

    fn frame_get_buffer(&self, frame: &mut FfFrame, layout: &FrameLayout) -> i32 {
        let f = unsafe { &mut *frame.0 };
        match *layout {
            FrameLayout::Video {
                width,
                height,
                format,
            } => {
                let pixel = pixel_format_to_ffmpeg(format);
                if pixel == ffmpeg_next::format::Pixel::None {
                    return code::EINVAL;
                }
                f.width = width as c_int;
                f.height = height as c_int;
                f.format = AVPixelFormat::from(pixel) as c_int;
            }
            FrameLayout::Audio {
                samples,
                channels,
                format,
                sample_rate,
            } => {
                f.nb_samples = samples as c_int;
                f.sample_rate = sample_rate as c_int;
                f.format = AVSampleFormat::from(sample_format_to_ffmpeg(format)) as c_int;
                unsafe {
                    av_channel_layout_default(&mut f.ch_layout, channels.channels() as c_int)
                };
            }
        }
        let ret = unsafe { av_frame_get_buffer(frame.0, 0) };
        if ret < 0 {
            return ret;
        }
        for plane in 0..layout.plane_count() {
            let len = self.frame_linesize(frame, plane) * plane_rows(layout, plane);
            let data = unsafe { plane_ptr(&*frame.0, plane) };
            if !data.is_null() {
                unsafe { ptr::write_bytes(data, 0, len) };
            }
        }
        ret
    }

    fn frame_layout(&self, frame: &FfFrame) -> Option<FrameLayout> {
        let f = unsafe { &*frame.0 };
        if f.data[0].is_null() {
            return None;
        }
        if f.width > 0 && f.height > 0 {
            let format = pixel_format_from_ffmpeg(unsafe { pixel_from_raw(f.format) })?;
            Some(FrameLayout::Video {
                width: f.width as u32,
                height: f.height as u32,
                format,
            })
        } else if f.nb_samples > 0 {
            let format = sample_format_from_ffmpeg(unsafe { sample_from_raw(f.format) })?;
            let channels =
                av_types::ChannelLayout::from_count(f.ch_layout.nb_channels.max(0) as u16)?;
            Some(FrameLayout::Audio {
                samples: f.nb_samples as u32,
                channels,
                format,
                sample_rate: f.sample_rate.max(0) as u32,
            })
        } else {
            None
        }
    }

    fn frame_linesize(&self, frame: &FfFrame, plane: usize) -> usize {
        let f = unsafe { &*frame.0 };
        match self.frame_layout(frame) {
            Some(layout @ FrameLayout::Audio { .. }) if plane < layout.plane_count() => {
                linesize(f, 0)
            }
            Some(FrameLayout::Audio { .. }) => 0,
            _ => linesize(f, plane),
        }
    }

    fn frame_plane<'a>(&self, frame: &'a FfFrame, plane: usize) -> Option<&'a [u8]> {
        let layout = self.frame_layout(frame)?;
        if plane >= layout.plane_count() {
            return None;
        }
        let len = self.frame_linesize(frame, plane) * plane_rows(&layout, plane);
        let data = unsafe { plane_ptr(&*frame.0, plane) };
        (!data.is_null()).then(|| unsafe { std::slice::from_raw_parts(data, len) })
    }

    fn frame_plane_mut<'a>(
        &self,
        frame: &'a mut FfFrame,
        plane: usize,
    ) -> Option<&'a mut [u8]> {
        if !self.frame_is_writable(frame) {
            return None;
        }
        let layout = self.frame_layout(frame)?;
        if plane >= layout.plane_count() {
            return None;
        }
        let len = self.frame_linesize(frame, plane) * plane_rows(&layout, plane);
        let data = unsafe { plane_ptr(&*frame.0, plane) };
        (!data.is_null()).then(|| unsafe { std::slice::from_raw_parts_mut(data, len) })
    }

    fn frame_is_writable(&self, frame: &FfFrame) -> bool {
        unsafe { av_frame_is_writable(frame.0) != 0 }
    }

    fn frame_make_writable(&self, frame: &mut FfFrame) -> i32 {
        unsafe { av_frame_make_writable(frame.0) }
    }

    fn frame_props(&self, frame: &FfFrame) -> FrameProps {
        let f = unsafe { &*frame.0 };
        FrameProps {
            pts: f.pts,
            duration: f.duration,
            key: f.flags & AV_FRAME_FLAG_KEY as c_int != 0,
        }
    }

    fn frame_set_props(&self, frame: &mut FfFrame, props: &FrameProps) {
        let f = unsafe { &mut *frame.0 };
        f.pts = props.pts;
        f.duration = props.duration;
        if props.key {
            f.flags |= AV_FRAME_FLAG_KEY as c_int;
        } else {
            f.flags &= !(AV_FRAME_FLAG_KEY as c_int);
        }
    }

    fn open_input(&self, source: MediaSource) -> Result<FfInput, i32> {
        let mut ctx: *mut AVFormatContext = ptr::null_mut();
        let (url, io) = match source {
            MediaSource::Path(path) => (Some(path_cstring(&path)?), None),
            MediaSource::Stream(reader) => {
                let io = AvioReader::new(reader)?;
                ctx = unsafe { avformat_alloc_context() };
                if ctx.is_null() {
                    return Err(code::ENOMEM);
                }
                unsafe {
                    (*ctx).pb = io.ctx;
                    (*ctx).flags |= AVFMT_FLAG_CUSTOM_IO as c_int;
                }
                (None, Some(io))
            }
        };

        let url_ptr = url.as_ref().map_or(ptr::null(), |u| u.as_ptr());
        // On failure avformat_open_input frees ctx; io is dropped on return.
        let ret = unsafe { avformat_open_input(&mut ctx, url_ptr, ptr::null(), ptr::null_mut()) };
        if ret < 0 {
            return Err(ret);
        }

        let mut input = FfInput { ctx, io };
        let ret = unsafe { avformat_find_stream_info(input.ctx, ptr::null_mut()) };
        if ret < 0 {
            self.close_input(&mut input);
            return Err(ret);
        }

        tracing::debug!(
            format = %self.input_format_name(&input),
            streams = unsafe { (*input.ctx).nb_streams },
            "FFmpeg input opened"
        );
        Ok(input)
    }

    fn input_format_name(&self, input: &FfInput) -> String {
        unsafe {
            let iformat = (*input.ctx).iformat;
            if iformat.is_null() || (*iformat).name.is_null() {
                String::new()
            } else {
                std::ffi::CStr::from_ptr((*iformat).name)
                    .to_string_lossy()
                    .into_owned()
            }
        }
    }

    fn input_streams(&self, input: &FfInput) -> Vec<StreamDescriptor> {
        unsafe {
            let ctx = &*input.ctx;
            (0..ctx.nb_streams as usize)
                .map(|i| descriptor_from_stream(*ctx.streams.add(i)))
                .collect()
        }
    }

    fn input_duration(&self, input: &FfInput) -> Option<i64> {
        let duration = unsafe { (*input.ctx).duration };
        (duration != AV_NOPTS_VALUE && duration >= 0).then_some(duration)
    }

    fn input_best_stream(&self, input: &FfInput, kind: MediaKind) -> i32 {
        unsafe {
            av_find_best_stream(
                input.ctx,
                media_kind_to_ffmpeg(kind),
                -1,
                -1,
                ptr::null_mut(),
                0,
            )
        }
    }

    fn read_packet(&self, input: &mut FfInput, pkt: &mut FfPacket) -> i32 {
        unsafe { av_read_frame(input.ctx, pkt.0) }
    }

    fn seek_input(&self, input: &mut FfInput, micros: i64) -> i32 {
        unsafe { av_seek_frame(input.ctx, -1, micros, AVSEEK_FLAG_BACKWARD as c_int) }
    }

    fn close_input(&self, input: &mut FfInput) {
        unsafe { avformat_close_input(&mut input.ctx) };
        input.io = None;
    }

    fn output_format(&self, sink: &MediaSink) -> Result<OutputFormat, i32> {
        let short_name = sink.format().map(cstring).transpose()?;
        let file_name = match sink {
            MediaSink::Path { path, .. } => Some(path_cstring(path)?),
            MediaSink::Stream { .. } => None,
        };
        let oformat = unsafe {
            av_guess_format(
                short_name.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                file_name.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                ptr::null(),
            )
        };
        if oformat.is_null() {
            return Err(code::MUXER_NOT_FOUND);
        }
        unsafe {
            Ok(OutputFormat {
                name: std::ffi::CStr::from_ptr((*oformat).name)
                    .to_string_lossy()
                    .into_owned(),
                global_header: (*oformat).flags & AVFMT_GLOBALHEADER as c_int != 0,
            })
        }
    }

    fn open_output(&self, sink: MediaSink) -> Result<FfOutput, i32> {
        let mut ctx: *mut AVFormatContext = ptr::null_mut();
        match sink {
            MediaSink::Path { path, format } => {
                let url = path_cstring(&path)?;
                let format = format.as_deref().map(cstring).transpose()?;
                let ret = unsafe {
                    avformat_alloc_output_context2(
                        &mut ctx,
                        ptr::null(),
                        format.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
                        url.as_ptr(),
                    )
                };
                if ret < 0 || ctx.is_null() {
                    return Err(if ret < 0 { ret } else { code::MUXER_NOT_FOUND });
                }
                let mut output = FfOutput {
                    ctx,
                    io: None,
                    owns_file: false,
                };
                let needs_file = unsafe { (*(*ctx).oformat).flags & AVFMT_NOFILE as c_int == 0 };
                if needs_file {
                    let ret =
                        unsafe { avio_open(&mut (*ctx).pb, url.as_ptr(), AVIO_FLAG_WRITE as c_int) };
                    if ret < 0 {
                        self.close_output(&mut output);
                        return Err(ret);
                    }
                    output.owns_file = true;
                }
                Ok(output)
            }
            MediaSink::Stream { writer, format } => {
                let format = cstring(&format)?;
                let ret = unsafe {
                    avformat_alloc_output_context2(
                        &mut ctx,
                        ptr::null(),
                        format.as_ptr(),
                        ptr::null(),
                    )
                };
                if ret < 0 || ctx.is_null() {
                    return Err(if ret < 0 { ret } else { code::MUXER_NOT_FOUND });
                }
                let mut output = FfOutput {
                    ctx,
                    io: None,
                    owns_file: false,
                };
                match AvioWriter::new(writer) {
                    Ok(io) => {
                        unsafe {
                            (*ctx).pb = io.ctx;
                            (*ctx).flags |= AVFMT_FLAG_CUSTOM_IO as c_int;
                        }
                        output.io = Some(io);
                        Ok(output)
                    }
                    Err(code) => {
                        self.close_output(&mut output);
                        Err(code)
                    }
                }
            }
        }
    }

    fn output_query_codec(&self, output: &FfOutput, codec: CodecId) -> i32 {
        let Some(id) = codec_id_to_ffmpeg(codec) else {
            return 0;
        };
        unsafe {
            avformat_query_codec(
                (*output.ctx).oformat,
                AVCodecID::from(id),
                0, // FF_COMPLIANCE_NORMAL
            )
        }
    }

    fn output_new_stream(&self, output: &mut FfOutput, stream: &StreamDescriptor) -> i32 {
        let st = unsafe { avformat_new_stream(output.ctx, ptr::null()) };
        if st.is_null() {
            return code::ENOMEM;
        }
        unsafe {
            let ret = parameters_to_ffmpeg(&stream.codec, (*st).codecpar);
            if ret < 0 {
                return ret;
            }
            (*(*st).codecpar).codec_tag = 0;
            (*st).time_base = rational_to_ffmpeg(stream.time_base);
            if let Some(rate) = stream.frame_rate {
                (*st).avg_frame_rate = rational_to_ffmpeg(rate);
            }
            (*st).index
        }
    }

    fn write_header(&self, output: &mut FfOutput) -> i32 {
        unsafe { avformat_write_header(output.ctx, ptr::null_mut()) }
    }

    fn output_stream_time_base(&self, output: &FfOutput, index: usize) -> Option<Rational> {
        unsafe {
            let ctx = &*output.ctx;
            (index < ctx.nb_streams as usize)
                .then(|| rational_from_ffmpeg((**ctx.streams.add(index)).time_base))
        }
    }

    fn write_packet(&self, output: &mut FfOutput, pkt: &mut FfPacket) -> i32 {
        unsafe { av_interleaved_write_frame(output.ctx, pkt.0) }
    }

    fn write_trailer(&self, output: &mut FfOutput) -> i32 {
        let ret = unsafe { av_write_trailer(output.ctx) };
        if ret < 0 {
            return ret;
        }
        match output.io.as_mut() {
            Some(io) => io.flush(),
            None => ret,
        }
    }

    fn close_output(&self, output: &mut FfOutput) {
        if output.ctx.is_null() {
            return;
        }
        unsafe {
            if output.owns_file {
                avio_closep(&mut (*output.ctx).pb);
            }
            avformat_free_context(output.ctx);
        }
        output.ctx = ptr::null_mut();
        output.io = None;
    }

    fn codec_alloc(
        &self,
        role: CodecRole,
        params: &CodecParameters,
        time_base: Rational,
    ) -> Result<FfCodec, i32> {
        let not_found = match role {
            CodecRole::Decoder => code::DECODER_NOT_FOUND,
            CodecRole::Encoder => code::ENCODER_NOT_FOUND,
        };
        let id = AVCodecID::from(codec_id_to_ffmpeg(params.codec_id).ok_or(not_found)?);
        let codec = unsafe {
            match role {
                CodecRole::Decoder => avcodec_find_decoder(id),
                CodecRole::Encoder => avcodec_find_encoder(id),
            }
        };
        if codec.is_null() {
            return Err(not_found);
        }
        let ctx = unsafe { avcodec_alloc_context3(codec) };
        if ctx.is_null() {
            return Err(code::ENOMEM);
        }
        let mut raw = FfCodec { ctx, codec, role };

        let mut par = unsafe { avcodec_parameters_alloc() };
        if par.is_null() {
            self.codec_free(&mut raw);
            return Err(code::ENOMEM);
        }
        let ret = unsafe {
            let ret = parameters_to_ffmpeg(params, par);
            if ret < 0 {
                ret
            } else {
                avcodec_parameters_to_context(ctx, par)
            }
        };
        unsafe { avcodec_parameters_free(&mut par) };
        if ret < 0 {
            self.codec_free(&mut raw);
            return Err(ret);
        }

        unsafe {
            (*ctx).time_base = rational_to_ffmpeg(time_base);
            if role == CodecRole::Decoder {
                (*ctx).pkt_timebase = rational_to_ffmpeg(time_base);
            }
        }
        Ok(raw)
    }

    fn codec_open(&self, codec: &mut FfCodec, options: &CodecOptions) -> i32 {
        let mut dict: *mut AVDictionary = ptr::null_mut();
        unsafe {
            if let Some(bitrate) = options.bitrate {
                (*codec.ctx).bit_rate = bitrate as i64;
            }
            if let Some(gop) = options.keyframe_interval {
                (*codec.ctx).gop_size = gop as c_int;
            }
            if options.global_header {
                (*codec.ctx).flags |= AV_CODEC_FLAG_GLOBAL_HEADER as c_int;
            }
            for (key, value) in &options.extra {
                let (Ok(key), Ok(value)) = (cstring(key), cstring(value)) else {
                    av_dict_free(&mut dict);
                    return code::EINVAL;
                };
                let ret = av_dict_set(&mut dict, key.as_ptr(), value.as_ptr(), 0);
                if ret < 0 {
                    av_dict_free(&mut dict);
                    return ret;
                }
            }
            let ret = avcodec_open2(codec.ctx, codec.codec, &mut dict);
            // avcodec_open2 leaves the options it did not consume in the dictionary.
            let unused = av_dict_count(dict);
            av_dict_free(&mut dict);
            if ret >= 0 && unused > 0 {
                tracing::debug!(unused, "Codec ignored options");
                return code::OPTION_NOT_FOUND;
            }
            ret
        }
    }

    fn codec_parameters(&self, codec: &FfCodec) -> CodecParameters {
        unsafe {
            let mut par = avcodec_parameters_alloc();
            if par.is_null() {
                return CodecParameters::with_media(CodecId::Unknown, MediaParams::None);
            }
            avcodec_parameters_from_context(par, codec.ctx);
            let params = parameters_from_ffmpeg(par);
            avcodec_parameters_free(&mut par);
            params
        }
    }

    fn codec_time_base(&self, codec: &FfCodec) -> Rational {
        let ctx = unsafe { &*codec.ctx };
        match codec.role {
            CodecRole::Decoder if ctx.pkt_timebase.num > 0 => {
                rational_from_ffmpeg(ctx.pkt_timebase)
            }
            _ => rational_from_ffmpeg(ctx.time_base),
        }
    }

    fn send_packet(&self, codec: &mut FfCodec, pkt: Option<&FfPacket>) -> i32 {
        unsafe { avcodec_send_packet(codec.ctx, pkt.map_or(ptr::null(), |p| p.0)) }
    }

    fn receive_frame(&self, codec: &mut FfCodec, frame: &mut FfFrame) -> i32 {
        let ret = unsafe { avcodec_receive_frame(codec.ctx, frame.0) };
        if ret >= 0 {
            // Prefer the best-effort timestamp, as ffmpeg's own tools do.
            unsafe {
                let f = &mut *frame.0;
                if f.best_effort_timestamp != AV_NOPTS_VALUE {
                    f.pts = f.best_effort_timestamp;
                }
            }
        }
        ret
    }

    fn send_frame(&self, codec: &mut FfCodec, frame: Option<&FfFrame>) -> i32 {
        unsafe { avcodec_send_frame(codec.ctx, frame.map_or(ptr::null(), |f| f.0)) }
    }

    fn receive_packet(&self, codec: &mut FfCodec, pkt: &mut FfPacket) -> i32 {
        unsafe { avcodec_receive_packet(codec.ctx, pkt.0) }
    }

    fn codec_flush(&self, codec: &mut FfCodec) {
        unsafe { avcodec_flush_buffers(codec.ctx) };
    }

    fn codec_free(&self, codec: &mut FfCodec) {
        unsafe { avcodec_free_context(&mut codec.ctx) };
    }

    fn parser_init(&self, codec: CodecId) -> Result<FfParser, i32> {
        FfParser::new(codec)
    }

    fn parser_parse(&self, parser: &mut FfParser, input: &[u8], pkt: &mut FfPacket) -> i32 {
        unsafe { parser.parse(input, pkt.0) }
    }

    fn parser_close(&self, parser: &mut FfParser) {
        parser.close();
    }

    fn scale_alloc(&self, src: &FrameLayout, dst: &FrameLayout) -> Result<FfScaler, i32> {
        FfScaler::new(src, dst)
    }

    fn scale_frame(&self, scaler: &mut FfScaler, src: &FfFrame, dst: &mut FfFrame) -> i32 {
        unsafe { scaler.scale(src.0, dst.0) }
    }

    fn scale_free(&self, scaler: &mut FfScaler) {
        scaler.free();
    }

    fn filter_alloc(
        &self,
        description: &str,
        input: &MediaParams,
        time_base: Rational,
    ) -> Result<FfFilter, i32> {
        FfFilter::new(description, input, time_base)
    }

    fn filter_send_frame(&self, filter: &mut FfFilter, frame: Option<&FfFrame>) -> i32 {
        unsafe { filter.send(frame.map_or(ptr::null(), |f| f.0)) }
    }

    fn filter_receive_frame(&self, filter: &mut FfFilter, frame: &mut FfFrame) -> i32 {
        unsafe { filter.receive(frame.0) }
    }

    fn filter_output(&self, filter: &FfFilter) -> MediaParams {
        filter.output()
    }

    fn filter_time_base(&self, filter: &FfFilter) -> Rational {
        filter.time_base()
    }

    fn filter_free(&self, filter: &mut FfFilter) {
        filter.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_next::codec::Id;

    #[test]
    fn codec_ids_round_trip_through_ffmpeg() {
        for id in [CodecId::H264, CodecId::Aac, CodecId::RawVideo, CodecId::PcmS16Le] {
            let ff = codec_id_to_ffmpeg(id).unwrap();
            assert_eq!(convert::codec_id_from_ffmpeg(ff), id);
        }
        assert!(codec_id_to_ffmpeg(CodecId::Unknown).is_none());
        assert_eq!(convert::codec_id_from_ffmpeg(Id::PNG), CodecId::Unknown);
    }

    #[test]
    fn packet_lifecycle() {
        let lib = FfmpegLibrary::new().unwrap();
        let mut pkt = lib.packet_alloc().unwrap();
        assert_eq!(lib.packet_alloc_data(&mut pkt, 16), 0);
        assert!(lib.packet_is_writable(&pkt));

        let mut other = lib.packet_alloc().unwrap();
        assert_eq!(lib.packet_ref(&mut other, &pkt), 0);
        assert!(!lib.packet_is_writable(&pkt));

        lib.packet_free(&mut other);
        assert!(lib.packet_is_writable(&pkt));
        lib.packet_free(&mut pkt);
    }

    #[test]
    fn planar_audio_planes_share_the_first_linesize() {
        let lib = FfmpegLibrary::new().unwrap();
        let mut frame = lib.frame_alloc().unwrap();
        let layout = FrameLayout::Audio {
            samples: 100,
            channels: av_types::ChannelLayout::Stereo,
            format: av_types::SampleFormat::F32p,
            sample_rate: 48_000,
        };
        assert_eq!(lib.frame_get_buffer(&mut frame, &layout), 0);

        let linesize = lib.frame_linesize(&frame, 0);
        assert!(linesize >= 400);
        assert_eq!(lib.frame_linesize(&frame, 1), linesize);
        assert_eq!(lib.frame_linesize(&frame, 2), 0);
        for plane in 0..2 {
            let data = lib.frame_plane(&frame, plane).unwrap();
            assert_eq!(data.len(), linesize);
            assert!(data.iter().all(|&b| b == 0));
        }
        assert!(lib.frame_plane(&frame, 2).is_none());
        lib.frame_free(&mut frame);
    }

    #[test]
    fn unknown_codec_options_fail_the_open() {
        let lib = FfmpegLibrary::new().unwrap();
        let params = CodecParameters::video(
            CodecId::RawVideo,
            av_types::VideoParams {
                width: 8,
                height: 8,
                pixel_format: av_types::PixelFormat::Yuv420p,
            },
        );
        let options = CodecOptions {
            extra: vec![("no-such-option".into(), "1".into())],
            ..CodecOptions::default()
        };
        let mut codec = lib
            .codec_alloc(CodecRole::Encoder, &params, Rational::new(1, 25))
            .unwrap();
        assert_eq!(lib.codec_open(&mut codec, &options), code::OPTION_NOT_FOUND);
        lib.codec_free(&mut codec);
    }

    #[test]
    fn filter_graph_scales_video() {
        let lib = FfmpegLibrary::new().unwrap();
        let input = MediaParams::Video(av_types::VideoParams {
            width: 16,
            height: 16,
            pixel_format: av_types::PixelFormat::Yuv420p,
        });
        let mut filter = lib
            .filter_alloc("scale=8:4,format=gray", &input, Rational::new(1, 25))
            .unwrap();
        assert_eq!(
            lib.filter_output(&filter),
            MediaParams::Video(av_types::VideoParams {
                width: 8,
                height: 4,
                pixel_format: av_types::PixelFormat::Gray8,
            })
        );
        lib.filter_free(&mut filter);

        let err = lib
            .filter_alloc("no_such_filter", &input, Rational::new(1, 25))
            .err();
        assert!(err.is_some_and(|code| code < 0));
    }
}
