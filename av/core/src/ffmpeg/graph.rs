/*!
    Parsers, scaling contexts and filter graphs over `libavcodec`,
    `libswscale` and `libavfilter`.
*/

use std::ffi::{CString, c_int};
use std::ptr;

use ffmpeg_next::ffi::*;
use ffmpeg_next::format::Pixel;

use av_types::{
    AudioParams, ChannelLayout, CodecId, FrameLayout, MediaParams, Rational, VideoParams, code,
};

use super::convert::{
    codec_id_to_ffmpeg, pixel_format_from_ffmpeg, pixel_format_to_ffmpeg, pixel_from_raw,
    rational_from_ffmpeg, sample_format_from_ffmpeg, sample_format_to_ffmpeg, sample_from_raw,
};

/// `SWS_BILINEAR`.
const BILINEAR: c_int = 2;

pub struct FfParser {
    ctx: *mut AVCodecParserContext,
    codec: *mut AVCodecContext,
    /// Input copy with the zeroed tail the parsers may read past the end.
    scratch: Vec<u8>,
}

pub struct FfScaler {
    ctx: *mut SwsContext,
}

pub struct FfFilter {
    graph: *mut AVFilterGraph,
    src: *mut AVFilterContext,
    sink: *mut AVFilterContext,
    output: MediaParams,
    time_base: Rational,
}

// SAFETY: each context is owned by one handle and used from one thread at a time.
unsafe impl Send for FfParser {}
unsafe impl Send for FfScaler {}
unsafe impl Send for FfFilter {}

impl FfParser {
    pub fn new(codec: CodecId) -> Result<Self, c_int> {
        let id = AVCodecID::from(codec_id_to_ffmpeg(codec).ok_or(code::ENOSYS)?);
        let ctx = unsafe { av_parser_init(id as c_int) };
        if ctx.is_null() {
            return Err(code::ENOSYS);
        }
        let decoder = unsafe { avcodec_find_decoder(id) };
        let avctx = unsafe { avcodec_alloc_context3(decoder) };
        if avctx.is_null() {
            unsafe { av_parser_close(ctx) };
            return Err(code::ENOMEM);
        }
        Ok(Self {
            ctx,
            codec: avctx,
            scratch: Vec::new(),
        })
    }

    /**
        # Safety

        `pkt` must be a valid, blank packet.
    */
    pub unsafe fn parse(&mut self, input: &[u8], pkt: *mut AVPacket) -> c_int {
        let Ok(size) = c_int::try_from(input.len()) else {
            return code::ERANGE;
        };
        self.scratch.clear();
        self.scratch.extend_from_slice(input);
        self.scratch
            .resize(input.len() + AV_INPUT_BUFFER_PADDING_SIZE as usize, 0);

        let mut out: *mut u8 = ptr::null_mut();
        let mut out_size: c_int = 0;
        let used = unsafe {
            av_parser_parse2(
                self.ctx,
                self.codec,
                &mut out,
                &mut out_size,
                self.scratch.as_ptr(),
                size,
                AV_NOPTS_VALUE,
                AV_NOPTS_VALUE,
                0,
            )
        };
        if used < 0 || out.is_null() || out_size <= 0 {
            return used;
        }
        unsafe {
            let ret = av_new_packet(pkt, out_size);
            if ret < 0 {
                return ret;
            }
            ptr::copy_nonoverlapping(out, (*pkt).data, out_size as usize);
            let parsed = &*self.ctx;
            (*pkt).pts = parsed.pts;
            (*pkt).dts = parsed.dts;
            if parsed.key_frame == 1 {
                (*pkt).flags |= AV_PKT_FLAG_KEY as c_int;
            }
        }
        used
    }

    pub fn close(&mut self) {
        unsafe {
            if !self.ctx.is_null() {
                av_parser_close(self.ctx);
                self.ctx = ptr::null_mut();
            }
            avcodec_free_context(&mut self.codec);
        }
    }
}

fn video_format(layout: &FrameLayout) -> Option<(c_int, c_int, AVPixelFormat)> {
    let FrameLayout::Video {
        width,
        height,
        format,
    } = *layout
    else {
        return None;
    };
    let pixel = pixel_format_to_ffmpeg(format);
    (pixel != Pixel::None).then(|| (width as c_int, height as c_int, AVPixelFormat::from(pixel)))
}

impl FfScaler {
    pub fn new(src: &FrameLayout, dst: &FrameLayout) -> Result<Self, c_int> {
        let (Some((sw, sh, sf)), Some((dw, dh, df))) = (video_format(src), video_format(dst))
        else {
            return Err(code::EINVAL);
        };
        let ctx = unsafe {
            sws_getContext(
                sw,
                sh,
                sf,
                dw,
                dh,
                df,
                BILINEAR,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
            )
        };
        if ctx.is_null() {
            return Err(code::ENOSYS);
        }
        Ok(Self { ctx })
    }

    /**
        # Safety

        `src` must hold a frame of the source layout and `dst` buffers of the
        target layout.
    */
    pub unsafe fn scale(&mut self, src: *const AVFrame, dst: *mut AVFrame) -> c_int {
        let ret = unsafe { sws_scale_frame(self.ctx, dst, src) };
        ret.min(0)
    }

    pub fn free(&mut self) {
        unsafe { sws_freeContext(self.ctx) };
        self.ctx = ptr::null_mut();
    }
}

fn channel_layout_name(layout: ChannelLayout) -> Option<&'static str> {
    match layout {
        ChannelLayout::Mono => Some("mono"),
        ChannelLayout::Stereo => Some("stereo"),
        ChannelLayout::Surround5_1 => Some("5.1"),
        ChannelLayout::Surround7_1 => Some("7.1"),
        _ => None,
    }
}

/// Source filter name and its arguments for frames matching `input`.
fn source_args(input: &MediaParams, time_base: Rational) -> Result<(&'static str, String), c_int> {
    match input {
        MediaParams::Video(video) => {
            let pixel = pixel_format_to_ffmpeg(video.pixel_format);
            if pixel == Pixel::None {
                return Err(code::EINVAL);
            }
            Ok((
                "buffer",
                format!(
                    "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect=1/1",
                    video.width,
                    video.height,
                    AVPixelFormat::from(pixel) as c_int,
                    time_base.num,
                    time_base.den
                ),
            ))
        }
        MediaParams::Audio(audio) => Ok((
            "abuffer",
            format!(
                "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout={}",
                time_base.num,
                time_base.den,
                audio.sample_rate,
                AVSampleFormat::from(sample_format_to_ffmpeg(audio.sample_format)) as c_int,
                channel_layout_name(audio.channels).ok_or(code::EINVAL)?
            ),
        )),
        MediaParams::None => Err(code::EINVAL),
    }
}

unsafe fn create_filter(
    graph: *mut AVFilterGraph,
    filter: &str,
    name: &str,
    args: Option<&str>,
) -> Result<*mut AVFilterContext, c_int> {
    let filter_name = CString::new(filter).map_err(|_| code::EINVAL)?;
    let name = CString::new(name).map_err(|_| code::EINVAL)?;
    let args = args
        .map(CString::new)
        .transpose()
        .map_err(|_| code::EINVAL)?;
    let definition = unsafe { avfilter_get_by_name(filter_name.as_ptr()) };
    if definition.is_null() {
        return Err(code::FILTER_NOT_FOUND);
    }
    let mut ctx = ptr::null_mut();
    let ret = unsafe {
        avfilter_graph_create_filter(
            &mut ctx,
            definition,
            name.as_ptr(),
            args.as_ref().map_or(ptr::null(), |a| a.as_ptr()),
            ptr::null_mut(),
            graph,
        )
    };
    if ret < 0 { Err(ret) } else { Ok(ctx) }
}

/// One open end of the graph being parsed, labelled `in` or `out`.
unsafe fn inout(label: &str, ctx: *mut AVFilterContext) -> Result<*mut AVFilterInOut, c_int> {
    let label = CString::new(label).map_err(|_| code::EINVAL)?;
    let end = unsafe { avfilter_inout_alloc() };
    if end.is_null() {
        return Err(code::ENOMEM);
    }
    unsafe {
        (*end).name = av_strdup(label.as_ptr());
        (*end).filter_ctx = ctx;
        (*end).pad_idx = 0;
        (*end).next = ptr::null_mut();
    }
    Ok(end)
}

impl FfFilter {
    pub fn new(
        description: &str,
        input: &MediaParams,
        time_base: Rational,
    ) -> Result<Self, c_int> {
        let (source, args) = source_args(input, time_base)?;
        let sink = match input {
            MediaParams::Audio(_) => "abuffersink",
            _ => "buffersink",
        };
        let chain = CString::new(description).map_err(|_| code::EINVAL)?;

        let graph = unsafe { avfilter_graph_alloc() };
        if graph.is_null() {
            return Err(code::ENOMEM);
        }
        let mut filter = Self {
            graph,
            src: ptr::null_mut(),
            sink: ptr::null_mut(),
            output: MediaParams::None,
            time_base,
        };
        let configured = unsafe { filter.configure(source, &args, sink, &chain, input) };
        match configured {
            Ok(()) => Ok(filter),
            Err(e) => {
                filter.free();
                Err(e)
            }
        }
    }

    unsafe fn configure(
        &mut self,
        source: &str,
        args: &str,
        sink: &str,
        chain: &CString,
        input: &MediaParams,
    ) -> Result<(), c_int> {
        unsafe {
            self.src = create_filter(self.graph, source, "in", Some(args))?;
            self.sink = create_filter(self.graph, sink, "out", None)?;

            // The chain's open input is fed by the source and its open
            // output drains into the sink.
            let mut outputs = inout("in", self.src)?;
            let mut inputs = match inout("out", self.sink) {
                Ok(end) => end,
                Err(e) => {
                    avfilter_inout_free(&mut outputs);
                    return Err(e);
                }
            };
            let ret = avfilter_graph_parse_ptr(
                self.graph,
                chain.as_ptr(),
                &mut inputs,
                &mut outputs,
                ptr::null_mut(),
            );
            avfilter_inout_free(&mut inputs);
            avfilter_inout_free(&mut outputs);
            if ret < 0 {
                return Err(ret);
            }
            let ret = avfilter_graph_config(self.graph, ptr::null_mut());
            if ret < 0 {
                return Err(ret);
            }
            self.output = sink_params(self.sink, input);
            self.time_base = rational_from_ffmpeg(av_buffersink_get_time_base(self.sink));
        }
        Ok(())
    }

    pub fn output(&self) -> MediaParams {
        self.output
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        # Safety

        `frame` must be null or a valid frame matching the input.
    */
    pub unsafe fn send(&mut self, frame: *const AVFrame) -> c_int {
        if frame.is_null() {
            unsafe { av_buffersrc_add_frame(self.src, ptr::null_mut()) }
        } else {
            unsafe { av_buffersrc_write_frame(self.src, frame) }
        }
    }

    /**
        # Safety

        `frame` must be a valid, blank frame.
    */
    pub unsafe fn receive(&mut self, frame: *mut AVFrame) -> c_int {
        unsafe { av_buffersink_get_frame(self.sink, frame) }
    }

    pub fn free(&mut self) {
        unsafe { avfilter_graph_free(&mut self.graph) };
        self.src = ptr::null_mut();
        self.sink = ptr::null_mut();
    }
}

unsafe fn sink_params(sink: *const AVFilterContext, input: &MediaParams) -> MediaParams {
    unsafe {
        match input {
            MediaParams::Video(_) => {
                let raw = av_buffersink_get_format(sink);
                let format = pixel_format_from_ffmpeg(pixel_from_raw(raw));
                match format {
                    Some(pixel_format) => MediaParams::Video(VideoParams {
                        width: av_buffersink_get_w(sink).max(0) as u32,
                        height: av_buffersink_get_h(sink).max(0) as u32,
                        pixel_format,
                    }),
                    None => MediaParams::None,
                }
            }
            MediaParams::Audio(_) => {
                let raw = av_buffersink_get_format(sink);
                let format = sample_format_from_ffmpeg(sample_from_raw(raw));
                let channels =
                    ChannelLayout::from_count(av_buffersink_get_channels(sink).max(0) as u16);
                match (format, channels) {
                    (Some(sample_format), Some(channels)) => MediaParams::Audio(AudioParams {
                        sample_rate: av_buffersink_get_sample_rate(sink).max(0) as u32,
                        channels,
                        sample_format,
                        frame_size: 0,
                    }),
                    _ => MediaParams::None,
                }
            }
            MediaParams::None => MediaParams::None,
        }
    }
}
