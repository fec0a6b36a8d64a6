/*!
    Stream description types.
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ChannelLayout, CodecId, MediaKind, PixelFormat, Rational, SampleFormat};

/**
    Picture geometry of a video stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub pixel_format: PixelFormat,
}

impl VideoParams {
    /**
        Returns the aspect ratio as a float.
    */
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /**
        The layout of a frame with these parameters.
    */
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::Video {
            width: self.width,
            height: self.height,
            format: self.pixel_format,
        }
    }
}

/**
    Sample layout of an audio stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout.
    pub channels: ChannelLayout,
    /// Sample format.
    pub sample_format: SampleFormat,
    /// Samples per channel in one frame; 0 when the codec accepts any size.
    pub frame_size: u32,
}

impl AudioParams {
    /**
        Returns the number of channels.
    */
    pub fn channel_count(&self) -> u16 {
        self.channels.channels()
    }

    /**
        The layout of a frame holding `samples` samples per channel.
    */
    pub fn layout(&self, samples: u32) -> FrameLayout {
        FrameLayout::Audio {
            samples,
            channels: self.channels,
            format: self.sample_format,
            sample_rate: self.sample_rate,
        }
    }
}

/**
    Media specific codec parameters.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaParams {
    Video(VideoParams),
    Audio(AudioParams),
    None,
}

impl MediaParams {
    /**
        Returns true if a frame with `layout` matches these parameters. Audio
        frames may carry any number of samples unless `frame_size` is set.
    */
    pub fn accepts(&self, layout: &FrameLayout) -> bool {
        match (self, layout) {
            (
                Self::Video(v),
                FrameLayout::Video {
                    width,
                    height,
                    format,
                },
            ) => v.width == *width && v.height == *height && v.pixel_format == *format,
            (
                Self::Audio(a),
                FrameLayout::Audio {
                    samples,
                    channels,
                    format,
                    sample_rate,
                },
            ) => {
                a.channels == *channels
                    && a.sample_format == *format
                    && a.sample_rate == *sample_rate
                    && (a.frame_size == 0 || *samples <= a.frame_size)
            }
            _ => false,
        }
    }
}

/**
    Everything needed to create a decoder for a stream, or to describe an
    encoder's output to a muxer.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecParameters {
    /// Codec used.
    pub codec_id: CodecId,
    /// Geometry or sample layout.
    pub media: MediaParams,
    /// Codec extradata (SPS/PPS for H.264, AudioSpecificConfig for AAC, etc.).
    pub extradata: Option<Vec<u8>>,
    /// Bitrate in bits per second (if known).
    pub bitrate: Option<u64>,
    /// Codec profile (codec-specific value).
    pub profile: Option<i32>,
    /// Codec level (codec-specific value).
    pub level: Option<i32>,
}

impl CodecParameters {
    pub fn video(codec_id: CodecId, params: VideoParams) -> Self {
        Self::with_media(codec_id, MediaParams::Video(params))
    }

    pub fn audio(codec_id: CodecId, params: AudioParams) -> Self {
        Self::with_media(codec_id, MediaParams::Audio(params))
    }

    pub fn with_media(codec_id: CodecId, media: MediaParams) -> Self {
        Self {
            codec_id,
            media,
            extradata: None,
            bitrate: None,
            profile: None,
            level: None,
        }
    }

    /**
        The media kind these parameters describe.
    */
    pub fn kind(&self) -> MediaKind {
        match self.media {
            MediaParams::Video(_) => MediaKind::Video,
            MediaParams::Audio(_) => MediaKind::Audio,
            MediaParams::None => self.codec_id.kind(),
        }
    }

    pub fn video_params(&self) -> Option<&VideoParams> {
        match &self.media {
            MediaParams::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio_params(&self) -> Option<&AudioParams> {
        match &self.media {
            MediaParams::Audio(a) => Some(a),
            _ => None,
        }
    }

    /**
        Returns true if a frame with `layout` can be fed to a codec with these
        parameters. Audio frames may carry any number of samples unless the
        codec has a fixed frame size.
    */
    pub fn accepts(&self, layout: &FrameLayout) -> bool {
        self.media.accepts(layout)
    }
}

/**
    Immutable metadata of one stream in a container.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Position of the stream in its container.
    pub index: usize,
    /// Media kind.
    pub kind: MediaKind,
    /// Codec parameters.
    pub codec: CodecParameters,
    /// Time base for timestamps.
    pub time_base: Rational,
    /// Frame rate (may be approximate or unavailable).
    pub frame_rate: Option<Rational>,
    /// Total duration (may be unavailable for some streams).
    pub duration: Option<Duration>,
}

impl StreamDescriptor {
    /**
        Create a descriptor, taking the media kind from the codec parameters.
    */
    pub fn new(index: usize, codec: CodecParameters, time_base: Rational) -> Self {
        Self {
            index,
            kind: codec.kind(),
            codec,
            time_base,
            frame_rate: None,
            duration: None,
        }
    }

    pub fn with_frame_rate(mut self, rate: Rational) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn codec_id(&self) -> CodecId {
        self.codec.codec_id
    }

    /**
        Returns the frame rate as fps, if available.
    */
    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.map(|r| r.to_f64())
    }
}

/**
    Size and format of the data carried by a decoded frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    Video {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    Audio {
        /// Samples per channel.
        samples: u32,
        channels: ChannelLayout,
        format: SampleFormat,
        sample_rate: u32,
    },
}

impl FrameLayout {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
        }
    }

    pub fn plane_count(&self) -> usize {
        match self {
            Self::Video { format, .. } => format.plane_count(),
            Self::Audio {
                channels, format, ..
            } if format.is_planar() => channels.channels() as usize,
            Self::Audio { .. } => 1,
        }
    }

    /**
        Bytes per row and row count of `plane`, without padding.
    */
    pub fn plane_shape(&self, plane: usize) -> Option<(usize, usize)> {
        if plane >= self.plane_count() {
            return None;
        }
        let shape = match *self {
            Self::Video {
                width,
                height,
                format,
            } => format.plane_shape(plane, width as usize, height as usize),
            Self::Audio {
                samples, format, ..
            } if format.is_planar() => (samples as usize * format.bytes_per_sample(), 1),
            Self::Audio {
                samples,
                channels,
                format,
                ..
            } => (
                samples as usize * channels.channels() as usize * format.bytes_per_sample(),
                1,
            ),
        };
        Some(shape)
    }

    /**
        Unpadded byte size of every plane.
    */
    pub fn plane_sizes(&self) -> Vec<usize> {
        (0..self.plane_count())
            .filter_map(|p| self.plane_shape(p))
            .map(|(stride, rows)| stride * rows)
            .collect()
    }

    /**
        Nominal duration of an audio frame in `1/sample_rate` units.
    */
    pub fn samples(&self) -> Option<u32> {
        match self {
            Self::Audio { samples, .. } => Some(*samples),
            Self::Video { .. } => None,
        }
    }
}

/**
    Combined information about a media source.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Short name of the container format.
    pub format_name: String,
    /// Total duration of the media (may be unavailable).
    pub duration: Option<Duration>,
    /// Every stream in container order.
    pub streams: Vec<StreamDescriptor>,
}

impl MediaInfo {
    /**
        First video stream, if any.
    */
    pub fn video(&self) -> Option<&StreamDescriptor> {
        self.first_of(MediaKind::Video)
    }

    /**
        First audio stream, if any.
    */
    pub fn audio(&self) -> Option<&StreamDescriptor> {
        self.first_of(MediaKind::Audio)
    }

    pub fn first_of(&self, kind: MediaKind) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.kind == kind)
    }

    /**
        Returns true if this media has video.
    */
    pub fn has_video(&self) -> bool {
        self.video().is_some()
    }

    /**
        Returns true if this media has audio.
    */
    pub fn has_audio(&self) -> bool {
        self.audio().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd() -> VideoParams {
        VideoParams {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Yuv420p,
        }
    }

    fn stereo() -> AudioParams {
        AudioParams {
            sample_rate: 48000,
            channels: ChannelLayout::Stereo,
            sample_format: SampleFormat::F32,
            frame_size: 1024,
        }
    }

    #[test]
    fn video_params_aspect_ratio() {
        assert!((hd().aspect_ratio() - 16.0 / 9.0).abs() < 0.01);
    }

    #[test]
    fn descriptor_fps_and_kind() {
        let s = StreamDescriptor::new(
            0,
            CodecParameters::video(CodecId::H264, hd()),
            Rational::new(1, 90000),
        )
        .with_frame_rate(Rational::new(30, 1));
        assert_eq!(s.kind, MediaKind::Video);
        assert_eq!(s.fps(), Some(30.0));
    }

    #[test]
    fn audio_channel_count() {
        assert_eq!(stereo().channel_count(), 2);
    }

    #[test]
    fn accepts_matching_layouts_only() {
        let video = CodecParameters::video(CodecId::RawVideo, hd());
        assert!(video.accepts(&hd().layout()));
        let small = FrameLayout::Video {
            width: 640,
            height: 480,
            format: PixelFormat::Yuv420p,
        };
        assert!(!video.accepts(&small));

        let audio = CodecParameters::audio(CodecId::Aac, stereo());
        assert!(audio.accepts(&stereo().layout(1024)));
        assert!(audio.accepts(&stereo().layout(512)));
        assert!(!audio.accepts(&stereo().layout(2048)));
        assert!(!audio.accepts(&hd().layout()));
    }

    #[test]
    fn frame_layout_planes() {
        let layout = FrameLayout::Video {
            width: 4,
            height: 2,
            format: PixelFormat::Yuv420p,
        };
        assert_eq!(layout.plane_sizes(), vec![8, 2, 2]);
        assert_eq!(layout.plane_shape(3), None);

        let audio = stereo().layout(10);
        assert_eq!(audio.plane_sizes(), vec![10 * 2 * 4]);

        let planar = FrameLayout::Audio {
            samples: 10,
            channels: ChannelLayout::Stereo,
            format: SampleFormat::S16p,
            sample_rate: 48000,
        };
        assert_eq!(planar.plane_sizes(), vec![20, 20]);
    }

    #[test]
    fn media_info_has_video_audio() {
        let mut info = MediaInfo::default();
        assert!(!info.has_video());
        assert!(!info.has_audio());

        info.streams.push(StreamDescriptor::new(
            0,
            CodecParameters::video(CodecId::H264, hd()),
            Rational::new(1, 1000),
        ));

        assert!(info.has_video());
        assert!(!info.has_audio());
        assert_eq!(info.video().map(|s| s.index), Some(0));
    }
}
