/*!
    Encoder configuration types.
*/

use av_core::CodecOptions;
use av_types::{
    AudioParams, ChannelLayout, CodecId, CodecParameters, MediaParams, PixelFormat, Rational,
    SampleFormat, StreamDescriptor, VideoParams,
};
use serde::{Deserialize, Serialize};

/**
    Encoder speed preset.

    Slower presets produce better compression (smaller files at same quality)
    but take longer to encode.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreset {
    /// Fastest encoding, largest files.
    Ultrafast,
    /// Very fast encoding.
    Superfast,
    /// Fast encoding.
    Veryfast,
    /// Faster than default.
    Faster,
    /// Fast encoding, good for real-time.
    Fast,
    /// Default balance of speed and compression.
    #[default]
    Medium,
    /// Better compression, slower.
    Slow,
    /// Even better compression.
    Slower,
    /// Best compression, slowest.
    Veryslow,
}

impl EncoderPreset {
    /**
        Get the native preset string.
    */
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

/**
    Rate control mode.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateControl {
    /**
        Constant Rate Factor - target constant quality.
        Lower values = higher quality. Range 0-51, typical 18-28.
    */
    Crf(u8),
    /**
        Constant Bitrate in bits per second.
    */
    Cbr(u64),
    /**
        Variable Bitrate - target average bitrate in bits per second.
    */
    Vbr(u64),
}

impl Default for RateControl {
    fn default() -> Self {
        Self::Crf(23)
    }
}

/**
    Configuration for an encoder.

    The media parameters describe the frames the encoder accepts; the time
    base is the one its packets are stamped with.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    /// Codec to use.
    pub codec: CodecId,
    /// Accepted frame geometry or sample layout.
    pub media: MediaParams,
    /// Time base of frames sent and packets produced.
    pub time_base: Rational,
    /// Frame rate of video streams, if known.
    pub frame_rate: Option<Rational>,
    /// Rate control mode (None = codec default).
    pub rate_control: Option<RateControl>,
    /// Encoder speed preset (None = codec default).
    pub preset: Option<EncoderPreset>,
    /// Keyframe interval in frames (None = encoder default).
    pub keyframe_interval: Option<u32>,
    /// Put codec headers in the parameters instead of in-band.
    pub global_header: bool,
    /// Additional codec private options.
    pub options: Vec<(String, String)>,
}

impl EncoderConfig {
    fn with_media(codec: CodecId, media: MediaParams, time_base: Rational) -> Self {
        Self {
            codec,
            media,
            time_base,
            frame_rate: None,
            rate_control: None,
            preset: None,
            keyframe_interval: None,
            global_header: false,
            options: Vec::new(),
        }
    }

    /**
        Create a video encoder configuration with a `1/frame_rate` time base.
    */
    pub fn video(codec: CodecId, width: u32, height: u32, frame_rate: Rational) -> Self {
        let params = VideoParams {
            width,
            height,
            pixel_format: PixelFormat::Yuv420p,
        };
        let mut config = Self::with_media(codec, MediaParams::Video(params), frame_rate.invert());
        config.frame_rate = Some(frame_rate);
        config
    }

    /**
        Create an audio encoder configuration with a `1/sample_rate` time base.
    */
    pub fn audio(codec: CodecId, sample_rate: u32, channels: ChannelLayout) -> Self {
        let params = AudioParams {
            sample_rate,
            channels,
            sample_format: SampleFormat::F32,
            frame_size: 0,
        };
        Self::with_media(
            codec,
            MediaParams::Audio(params),
            Rational::new(1, sample_rate as i32),
        )
    }

    /**
        Create configuration for H.264 encoding.
    */
    pub fn h264(width: u32, height: u32, frame_rate: Rational) -> Self {
        Self::video(CodecId::H264, width, height, frame_rate)
    }

    /**
        Create configuration for AAC encoding.
    */
    pub fn aac(sample_rate: u32, channels: ChannelLayout) -> Self {
        Self::audio(CodecId::Aac, sample_rate, channels)
    }

    /**
        Identical parameters to an existing stream: same codec, geometry or
        sample layout, time base and bitrate. Frames decoded from `stream`
        can be fed to the encoder unchanged.
    */
    pub fn matching(stream: &StreamDescriptor) -> Self {
        let mut config = Self::with_media(stream.codec_id(), stream.codec.media, stream.time_base);
        config.frame_rate = stream.frame_rate;
        if let Some(bitrate) = stream.codec.bitrate {
            config.rate_control = Some(RateControl::Vbr(bitrate));
        }
        config
    }

    /**
        Set the rate control mode.
    */
    pub fn with_rate_control(mut self, rate_control: RateControl) -> Self {
        self.rate_control = Some(rate_control);
        self
    }

    /**
        Set constant bitrate in bits per second.
    */
    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.rate_control = Some(RateControl::Cbr(bitrate));
        self
    }

    /**
        Set CRF quality (0-51, lower is better, typical 18-28).
    */
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.rate_control = Some(RateControl::Crf(crf.min(51)));
        self
    }

    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = Some(preset);
        self
    }

    /**
        Set the keyframe interval in frames.
    */
    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = Some(frames);
        self
    }

    /**
        Set the input pixel format. No effect on audio configurations.
    */
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        if let MediaParams::Video(v) = &mut self.media {
            v.pixel_format = format;
        }
        self
    }

    /**
        Set the input sample format. No effect on video configurations.
    */
    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        if let MediaParams::Audio(a) = &mut self.media {
            a.sample_format = format;
        }
        self
    }

    /**
        Fix the number of samples per audio frame.
    */
    pub fn with_frame_size(mut self, samples: u32) -> Self {
        if let MediaParams::Audio(a) = &mut self.media {
            a.frame_size = samples;
        }
        self
    }

    pub fn with_time_base(mut self, time_base: Rational) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn with_global_header(mut self, global_header: bool) -> Self {
        self.global_header = global_header;
        self
    }

    /**
        Add a codec private option.
    */
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /**
        Parameters of the encoder's input and output.
    */
    pub fn codec_parameters(&self) -> CodecParameters {
        let mut params = CodecParameters::with_media(self.codec, self.media);
        params.bitrate = match self.rate_control {
            Some(RateControl::Cbr(bitrate) | RateControl::Vbr(bitrate)) => Some(bitrate),
            Some(RateControl::Crf(_)) | None => None,
        };
        params
    }

    pub(crate) fn codec_options(&self) -> CodecOptions {
        let mut extra = Vec::new();
        if let Some(preset) = self.preset {
            extra.push(("preset".to_string(), preset.as_str().to_string()));
        }
        let bitrate = match self.rate_control {
            Some(RateControl::Crf(crf)) => {
                extra.push(("crf".to_string(), crf.to_string()));
                None
            }
            Some(RateControl::Cbr(bitrate)) => {
                extra.push(("rc".to_string(), "cbr".to_string()));
                extra.push(("maxrate".to_string(), bitrate.to_string()));
                Some(bitrate)
            }
            Some(RateControl::Vbr(bitrate)) => Some(bitrate),
            None => None,
        };
        extra.extend(self.options.iter().cloned());
        CodecOptions {
            bitrate,
            keyframe_interval: self.keyframe_interval,
            global_header: self.global_header,
            extra,
        }
    }
}
