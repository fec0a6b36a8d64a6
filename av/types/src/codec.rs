/*!
    Codec identifiers and media kinds.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/**
    The kind of media a stream carries.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Other => "other",
        })
    }
}

/**
    Codec identifiers.

    Codecs a native library reports but this enum does not name map to
    [`CodecId::Unknown`]; such streams can be remuxed but not transcoded.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CodecId {
    // Video
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Mpeg2Video,
    RawVideo,
    // Audio
    Aac,
    Opus,
    Mp3,
    Vorbis,
    Flac,
    PcmS16Le,
    PcmS16Be,
    PcmF32Le,
    Ac3,
    // Subtitle
    Subrip,
    WebVtt,
    Unknown,
}

impl CodecId {
    /**
        The media kind this codec produces.
    */
    pub const fn kind(self) -> MediaKind {
        match self {
            Self::H264
            | Self::H265
            | Self::Vp8
            | Self::Vp9
            | Self::Av1
            | Self::Mpeg4
            | Self::Mpeg2Video
            | Self::RawVideo => MediaKind::Video,
            Self::Aac
            | Self::Opus
            | Self::Mp3
            | Self::Vorbis
            | Self::Flac
            | Self::PcmS16Le
            | Self::PcmS16Be
            | Self::PcmF32Le
            | Self::Ac3 => MediaKind::Audio,
            Self::Subrip | Self::WebVtt => MediaKind::Subtitle,
            Self::Unknown => MediaKind::Other,
        }
    }

    /**
        Short lowercase name, matching the native library's codec names.
    */
    pub const fn name(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Mpeg4 => "mpeg4",
            Self::Mpeg2Video => "mpeg2video",
            Self::RawVideo => "rawvideo",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Mp3 => "mp3",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::PcmS16Le => "pcm_s16le",
            Self::PcmS16Be => "pcm_s16be",
            Self::PcmF32Le => "pcm_f32le",
            Self::Ac3 => "ac3",
            Self::Subrip => "subrip",
            Self::WebVtt => "webvtt",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
