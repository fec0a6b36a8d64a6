/*!
    Conversion utilities between FFmpeg types and av-types.
*/

use std::ffi::c_int;

use ffmpeg_next::codec::Id;
use ffmpeg_next::ffi::{
    AV_NOPTS_VALUE, AVCodecID, AVCodecParameters, AVMediaType, AVPixelFormat, AVRational,
    AVSampleFormat, AVStream, av_channel_layout_default, av_mallocz,
};
use ffmpeg_next::format::{Pixel, Sample, sample::Type as SampleType};

use av_types::{
    AudioParams, ChannelLayout, CodecId, CodecParameters, MediaKind, MediaParams, PixelFormat,
    Rational, SampleFormat, StreamDescriptor, VideoParams,
};

pub fn rational_from_ffmpeg(r: AVRational) -> Rational {
    Rational::new(r.num, r.den)
}

pub fn rational_to_ffmpeg(r: Rational) -> AVRational {
    AVRational {
        num: r.num,
        den: r.den,
    }
}

pub fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::YUV420P10LE => Some(PixelFormat::Yuv420p10),
        Pixel::P010LE => Some(PixelFormat::P010le),
        Pixel::GRAY8 => Some(PixelFormat::Gray8),
        _ => None,
    }
}

pub fn pixel_format_to_ffmpeg(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Yuv420p10 => Pixel::YUV420P10LE,
        PixelFormat::P010le => Pixel::P010LE,
        PixelFormat::Gray8 => Pixel::GRAY8,
        _ => Pixel::None,
    }
}

pub fn sample_format_from_ffmpeg(format: Sample) -> Option<SampleFormat> {
    match format {
        Sample::F32(SampleType::Packed) => Some(SampleFormat::F32),
        Sample::F64(SampleType::Packed) => Some(SampleFormat::F64),
        Sample::I16(SampleType::Packed) => Some(SampleFormat::S16),
        Sample::I32(SampleType::Packed) => Some(SampleFormat::S32),
        Sample::U8(SampleType::Packed) => Some(SampleFormat::U8),
        Sample::F32(SampleType::Planar) => Some(SampleFormat::F32p),
        Sample::F64(SampleType::Planar) => Some(SampleFormat::F64p),
        Sample::I16(SampleType::Planar) => Some(SampleFormat::S16p),
        Sample::I32(SampleType::Planar) => Some(SampleFormat::S32p),
        Sample::U8(SampleType::Planar) => Some(SampleFormat::U8p),
        _ => None,
    }
}

pub fn sample_format_to_ffmpeg(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::F32 => Sample::F32(SampleType::Packed),
        SampleFormat::F64 => Sample::F64(SampleType::Packed),
        SampleFormat::S16 => Sample::I16(SampleType::Packed),
        SampleFormat::S32 => Sample::I32(SampleType::Packed),
        SampleFormat::U8 => Sample::U8(SampleType::Packed),
        SampleFormat::F32p => Sample::F32(SampleType::Planar),
        SampleFormat::F64p => Sample::F64(SampleType::Planar),
        SampleFormat::S16p => Sample::I16(SampleType::Planar),
        SampleFormat::S32p => Sample::I32(SampleType::Planar),
        SampleFormat::U8p => Sample::U8(SampleType::Planar),
        _ => Sample::None,
    }
}

pub fn codec_id_from_ffmpeg(id: Id) -> CodecId {
    match id {
        // Video
        Id::H264 => CodecId::H264,
        Id::HEVC => CodecId::H265,
        Id::VP8 => CodecId::Vp8,
        Id::VP9 => CodecId::Vp9,
        Id::AV1 => CodecId::Av1,
        Id::MPEG4 => CodecId::Mpeg4,
        Id::MPEG2VIDEO => CodecId::Mpeg2Video,
        Id::RAWVIDEO => CodecId::RawVideo,
        // Audio
        Id::AAC => CodecId::Aac,
        Id::OPUS => CodecId::Opus,
        Id::MP3 => CodecId::Mp3,
        Id::VORBIS => CodecId::Vorbis,
        Id::FLAC => CodecId::Flac,
        Id::PCM_S16LE => CodecId::PcmS16Le,
        Id::PCM_S16BE => CodecId::PcmS16Be,
        Id::PCM_F32LE => CodecId::PcmF32Le,
        Id::AC3 => CodecId::Ac3,
        // Subtitle
        Id::SUBRIP => CodecId::Subrip,
        Id::WEBVTT => CodecId::WebVtt,
        _ => CodecId::Unknown,
    }
}

pub fn codec_id_to_ffmpeg(id: CodecId) -> Option<Id> {
    let id = match id {
        CodecId::H264 => Id::H264,
        CodecId::H265 => Id::HEVC,
        CodecId::Vp8 => Id::VP8,
        CodecId::Vp9 => Id::VP9,
        CodecId::Av1 => Id::AV1,
        CodecId::Mpeg4 => Id::MPEG4,
        CodecId::Mpeg2Video => Id::MPEG2VIDEO,
        CodecId::RawVideo => Id::RAWVIDEO,
        CodecId::Aac => Id::AAC,
        CodecId::Opus => Id::OPUS,
        CodecId::Mp3 => Id::MP3,
        CodecId::Vorbis => Id::VORBIS,
        CodecId::Flac => Id::FLAC,
        CodecId::PcmS16Le => Id::PCM_S16LE,
        CodecId::PcmS16Be => Id::PCM_S16BE,
        CodecId::PcmF32Le => Id::PCM_F32LE,
        CodecId::Ac3 => Id::AC3,
        CodecId::Subrip => Id::SUBRIP,
        CodecId::WebVtt => Id::WEBVTT,
        _ => return None,
    };
    Some(id)
}

pub fn media_kind_to_ffmpeg(kind: MediaKind) -> AVMediaType {
    match kind {
        MediaKind::Video => AVMediaType::AVMEDIA_TYPE_VIDEO,
        MediaKind::Audio => AVMediaType::AVMEDIA_TYPE_AUDIO,
        MediaKind::Subtitle => AVMediaType::AVMEDIA_TYPE_SUBTITLE,
        MediaKind::Other => AVMediaType::AVMEDIA_TYPE_DATA,
    }
}

pub fn media_kind_from_ffmpeg(kind: AVMediaType) -> MediaKind {
    match kind {
        AVMediaType::AVMEDIA_TYPE_VIDEO => MediaKind::Video,
        AVMediaType::AVMEDIA_TYPE_AUDIO => MediaKind::Audio,
        AVMediaType::AVMEDIA_TYPE_SUBTITLE => MediaKind::Subtitle,
        _ => MediaKind::Other,
    }
}

/**
    Interpret a raw `format` field as a pixel format.

    # Safety

    `format` must come from a video frame or video codec parameters.
*/
pub unsafe fn pixel_from_raw(format: c_int) -> Pixel {
    // SAFETY: FFmpeg stores AVPixelFormat values in the int field.
    Pixel::from(unsafe { std::mem::transmute::<c_int, AVPixelFormat>(format) })
}

/**
    Interpret a raw `format` field as a sample format.

    # Safety

    `format` must come from an audio frame or audio codec parameters.
*/
pub unsafe fn sample_from_raw(format: c_int) -> Sample {
    // SAFETY: FFmpeg stores AVSampleFormat values in the int field.
    Sample::from(unsafe { std::mem::transmute::<c_int, AVSampleFormat>(format) })
}

/**
    Build codec parameters from an `AVCodecParameters`.

    # Safety

    `par` must point to valid codec parameters.
*/
pub unsafe fn parameters_from_ffmpeg(par: *const AVCodecParameters) -> CodecParameters {
    let par = unsafe { &*par };
    let codec_id = codec_id_from_ffmpeg(Id::from(par.codec_id));
    let media = match par.codec_type {
        AVMediaType::AVMEDIA_TYPE_VIDEO => {
            match pixel_format_from_ffmpeg(unsafe { pixel_from_raw(par.format) }) {
                Some(pixel_format) => MediaParams::Video(VideoParams {
                    width: par.width.max(0) as u32,
                    height: par.height.max(0) as u32,
                    pixel_format,
                }),
                None => MediaParams::None,
            }
        }
        AVMediaType::AVMEDIA_TYPE_AUDIO => {
            let format = sample_format_from_ffmpeg(unsafe { sample_from_raw(par.format) });
            let channels = ChannelLayout::from_count(par.ch_layout.nb_channels.max(0) as u16);
            match (format, channels) {
                (Some(sample_format), Some(channels)) => MediaParams::Audio(AudioParams {
                    sample_rate: par.sample_rate.max(0) as u32,
                    channels,
                    sample_format,
                    frame_size: par.frame_size.max(0) as u32,
                }),
                _ => MediaParams::None,
            }
        }
        _ => MediaParams::None,
    };

    let extradata = (!par.extradata.is_null() && par.extradata_size > 0).then(|| {
        // SAFETY: extradata holds extradata_size bytes.
        unsafe { std::slice::from_raw_parts(par.extradata, par.extradata_size as usize) }.to_vec()
    });

    CodecParameters {
        codec_id,
        media,
        extradata,
        bitrate: (par.bit_rate > 0).then_some(par.bit_rate as u64),
        profile: (par.profile >= 0).then_some(par.profile),
        level: (par.level >= 0).then_some(par.level),
    }
}

/**
    Fill an `AVCodecParameters` from codec parameters. Returns a negative code
    if the extradata cannot be allocated.

    # Safety

    `par` must point to valid, writable codec parameters without extradata.
*/
pub unsafe fn parameters_to_ffmpeg(params: &CodecParameters, par: *mut AVCodecParameters) -> i32 {
    let par = unsafe { &mut *par };
    par.codec_type = media_kind_to_ffmpeg(params.kind());
    par.codec_id = codec_id_to_ffmpeg(params.codec_id)
        .map(AVCodecID::from)
        .unwrap_or(AVCodecID::AV_CODEC_ID_NONE);
    match &params.media {
        MediaParams::Video(v) => {
            par.width = v.width as c_int;
            par.height = v.height as c_int;
            par.format = AVPixelFormat::from(pixel_format_to_ffmpeg(v.pixel_format)) as c_int;
        }
        MediaParams::Audio(a) => {
            par.sample_rate = a.sample_rate as c_int;
            par.format = AVSampleFormat::from(sample_format_to_ffmpeg(a.sample_format)) as c_int;
            par.frame_size = a.frame_size as c_int;
            unsafe { av_channel_layout_default(&mut par.ch_layout, a.channel_count() as c_int) };
        }
        MediaParams::None => {}
    }
    par.bit_rate = params.bitrate.unwrap_or(0) as i64;
    if let Some(profile) = params.profile {
        par.profile = profile;
    }
    if let Some(level) = params.level {
        par.level = level;
    }
    if let Some(extradata) = &params.extradata {
        let padding = ffmpeg_next::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
        let buf = unsafe { av_mallocz(extradata.len() + padding) } as *mut u8;
        if buf.is_null() {
            return av_types::code::ENOMEM;
        }
        // SAFETY: buf holds at least extradata.len() bytes.
        unsafe { std::ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len()) };
        par.extradata = buf;
        par.extradata_size = extradata.len() as c_int;
    }
    0
}

/**
    Describe a demuxed stream.

    # Safety

    `stream` must point to a valid stream of an open input context.
*/
pub unsafe fn descriptor_from_stream(stream: *const AVStream) -> StreamDescriptor {
    let stream = unsafe { &*stream };
    let codec = unsafe { parameters_from_ffmpeg(stream.codecpar) };
    let time_base = rational_from_ffmpeg(stream.time_base);
    let kind = media_kind_from_ffmpeg(unsafe { (*stream.codecpar).codec_type });

    let frame_rate = rational_from_ffmpeg(stream.avg_frame_rate);
    let duration = (stream.duration != AV_NOPTS_VALUE)
        .then(|| time_base.to_duration(stream.duration))
        .flatten();

    StreamDescriptor {
        index: stream.index as usize,
        kind,
        codec,
        time_base,
        frame_rate: frame_rate.is_valid().then_some(frame_rate),
        duration,
    }
}
