/*!
    Toy codecs.

    None of them compress anything: a packet payload is a list of raw frames
    (see [`crate::payload`]). What they reproduce is the buffering behaviour of
    real codecs: decoder and encoder delay, several frames per packet, a
    bounded output queue that pushes back with `EAGAIN`, and draining to
    `EOF`.
*/

use std::collections::VecDeque;

use av_core::{CodecOptions, CodecRole, FrameProps, PacketProps};
use av_types::{CodecId, CodecParameters, FrameLayout, MediaParams, Rational, code};

use crate::payload::{self, FramePayload};

/// Decoded frames or encoded packets held before the caller must receive.
pub const OUTPUT_CAPACITY: usize = 2;

/// Default distance between keyframes of the delayed video codec.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 12;

/// Option names the synthetic encoders accept.
const KNOWN_OPTIONS: &[&str] = &["preset", "crf", "rc", "maxrate", "bufsize", "tune"];

/**
    Behaviour of each supported codec id.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    /// One frame per packet, no delay.
    RawVideo,
    /// One frame per packet, two frames of delay, periodic keyframes.
    DelayedVideo,
    /// One frame per packet, no delay.
    Pcm,
    /// Two frames per packet.
    PackedAudio,
}

impl CodecKind {
    pub fn for_codec(id: CodecId) -> Option<Self> {
        match id {
            CodecId::RawVideo => Some(Self::RawVideo),
            CodecId::Mpeg4 => Some(Self::DelayedVideo),
            CodecId::PcmS16Le => Some(Self::Pcm),
            CodecId::Aac => Some(Self::PackedAudio),
            _ => None,
        }
    }

    pub fn delay(self) -> usize {
        match self {
            Self::DelayedVideo => 2,
            Self::RawVideo | Self::Pcm | Self::PackedAudio => 0,
        }
    }

    pub fn frames_per_packet(self) -> usize {
        match self {
            Self::PackedAudio => 2,
            Self::RawVideo | Self::DelayedVideo | Self::Pcm => 1,
        }
    }

    fn is_video(self) -> bool {
        matches!(self, Self::RawVideo | Self::DelayedVideo)
    }
}

/**
    A decoded frame waiting to be received.
*/
#[derive(Debug)]
pub struct DecodedFrame {
    pub payload: FramePayload,
    pub props: FrameProps,
}

/**
    An encoded packet waiting to be received.
*/
#[derive(Debug)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub props: PacketProps,
}

#[derive(Debug)]
enum Output {
    Frame(DecodedFrame),
    Packet(EncodedPacket),
}

/**
    Raw codec context.
*/
#[derive(Debug)]
pub struct SynthCodec {
    pub(crate) id: u64,
    pub(crate) freed: bool,
    role: CodecRole,
    kind: CodecKind,
    params: CodecParameters,
    time_base: Rational,
    options: Option<CodecOptions>,
    draining: bool,
    /// Frames held back by codec delay, or collected into the next packet.
    held: VecDeque<(FramePayload, FrameProps)>,
    output: VecDeque<Output>,
    frames_in: u64,
}

impl SynthCodec {
    pub(crate) fn new(
        id: u64,
        role: CodecRole,
        params: &CodecParameters,
        time_base: Rational,
    ) -> Result<Self, i32> {
        let not_found = match role {
            CodecRole::Decoder => code::DECODER_NOT_FOUND,
            CodecRole::Encoder => code::ENCODER_NOT_FOUND,
        };
        let kind = CodecKind::for_codec(params.codec_id).ok_or(not_found)?;
        Ok(Self {
            id,
            freed: false,
            role,
            kind,
            params: params.clone(),
            time_base,
            options: None,
            draining: false,
            held: VecDeque::new(),
            output: VecDeque::new(),
            frames_in: 0,
        })
    }

    pub(crate) fn open(&mut self, options: &CodecOptions) -> i32 {
        if self.options.is_some() {
            return code::EINVAL;
        }
        if self.role == CodecRole::Encoder {
            if !self.time_base.is_valid() || matches!(self.params.media, MediaParams::None) {
                return code::EINVAL;
            }
            if options
                .extra
                .iter()
                .any(|(key, _)| !KNOWN_OPTIONS.contains(&key.as_str()))
            {
                return code::OPTION_NOT_FOUND;
            }
        }
        if let Some(bitrate) = options.bitrate {
            self.params.bitrate = Some(bitrate);
        }
        if self.role == CodecRole::Encoder && options.global_header {
            let mut extradata = b"SYNTH:".to_vec();
            extradata.extend_from_slice(self.params.codec_id.name().as_bytes());
            self.params.extradata = Some(extradata);
        }
        self.options = Some(options.clone());
        0
    }

    pub(crate) fn parameters(&self) -> CodecParameters {
        self.params.clone()
    }

    pub(crate) fn time_base(&self) -> Rational {
        self.time_base
    }

    fn ready(&self, role: CodecRole) -> i32 {
        if self.options.is_none() || self.role != role {
            return code::EINVAL;
        }
        if self.draining {
            return code::EOF;
        }
        if self.output.len() >= OUTPUT_CAPACITY {
            return code::EAGAIN;
        }
        0
    }

    /**
        Decode one packet, or start draining on `None`.
    */
    pub(crate) fn send_packet(&mut self, packet: Option<(&[u8], PacketProps)>) -> i32 {
        let ret = self.ready(CodecRole::Decoder);
        if ret < 0 {
            return ret;
        }
        let Some((data, props)) = packet else {
            self.start_draining();
            return 0;
        };
        let Ok(frames) = payload::decode(data) else {
            return code::INVALIDDATA;
        };
        let count = frames.len().max(1) as i64;
        let duration = props.duration / count;
        for (i, frame) in frames.into_iter().enumerate() {
            let pts = if props.pts == code::NOPTS_VALUE {
                code::NOPTS_VALUE
            } else {
                props.pts + i as i64 * duration
            };
            let frame_props = FrameProps {
                pts,
                duration,
                key: frame.key,
            };
            self.held.push_back((frame, frame_props));
        }
        while self.held.len() > self.kind.delay() {
            if let Some((payload, props)) = self.held.pop_front() {
                self.output
                    .push_back(Output::Frame(DecodedFrame { payload, props }));
            }
        }
        0
    }

    pub(crate) fn receive_frame(&mut self) -> Result<DecodedFrame, i32> {
        if self.options.is_none() || self.role != CodecRole::Decoder {
            return Err(code::EINVAL);
        }
        match self.output.pop_front() {
            Some(Output::Frame(frame)) => Ok(frame),
            Some(Output::Packet(_)) => Err(code::BUG),
            None if self.draining => Err(code::EOF),
            None => Err(code::EAGAIN),
        }
    }

    /**
        Encode one frame, or start draining on `None`.
    */
    pub(crate) fn send_frame(&mut self, frame: Option<(FramePayload, FrameProps)>) -> i32 {
        let ret = self.ready(CodecRole::Encoder);
        if ret < 0 {
            return ret;
        }
        let Some((mut payload, props)) = frame else {
            self.start_draining();
            return 0;
        };
        if !self.params.accepts(&payload.layout) {
            return code::EINVAL;
        }
        payload.key = if self.kind.is_video() {
            let interval = self
                .options
                .as_ref()
                .and_then(|o| o.keyframe_interval)
                .unwrap_or(DEFAULT_KEYFRAME_INTERVAL)
                .max(1) as u64;
            self.frames_in % interval == 0
        } else {
            true
        };
        self.frames_in += 1;
        self.held.push_back((payload, props));

        let per_packet = self.kind.frames_per_packet();
        while self.held.len() >= self.kind.delay() + per_packet {
            self.emit_packet(per_packet);
        }
        0
    }

    pub(crate) fn receive_packet(&mut self) -> Result<EncodedPacket, i32> {
        if self.options.is_none() || self.role != CodecRole::Encoder {
            return Err(code::EINVAL);
        }
        match self.output.pop_front() {
            Some(Output::Packet(packet)) => Ok(packet),
            Some(Output::Frame(_)) => Err(code::BUG),
            None if self.draining => Err(code::EOF),
            None => Err(code::EAGAIN),
        }
    }

    fn emit_packet(&mut self, frames: usize) {
        let group: Vec<_> = self.held.drain(..frames.min(self.held.len())).collect();
        let Some((_, first)) = group.first() else {
            return;
        };
        let pts = first.pts;
        let key = group.iter().all(|(p, _)| p.key);
        let duration = group.iter().map(|(_, p)| p.duration).sum();
        let payloads: Vec<FramePayload> = group.into_iter().map(|(p, _)| p).collect();
        let Ok(data) = payload::encode(&payloads) else {
            return;
        };
        self.output.push_back(Output::Packet(EncodedPacket {
            data,
            props: PacketProps {
                pts,
                dts: pts,
                duration,
                stream_index: 0,
                key,
            },
        }));
    }

    fn start_draining(&mut self) {
        self.draining = true;
        match self.role {
            CodecRole::Decoder => {
                while let Some((payload, props)) = self.held.pop_front() {
                    self.output
                        .push_back(Output::Frame(DecodedFrame { payload, props }));
                }
            }
            CodecRole::Encoder => {
                let per_packet = self.kind.frames_per_packet();
                while !self.held.is_empty() {
                    self.emit_packet(per_packet);
                }
            }
        }
    }

    pub(crate) fn flush(&mut self) {
        self.held.clear();
        self.output.clear();
        self.draining = false;
        self.frames_in = 0;
    }
}

/**
    Frame layout a stream with these parameters decodes to, given the number
    of samples in an audio frame.
*/
pub fn layout_for(params: &CodecParameters, samples: u32) -> Option<FrameLayout> {
    match &params.media {
        MediaParams::Video(v) => Some(v.layout()),
        MediaParams::Audio(a) => Some(a.layout(samples)),
        MediaParams::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_types::{AudioParams, ChannelLayout, PixelFormat, SampleFormat, VideoParams};

    fn video(codec: CodecId) -> CodecParameters {
        CodecParameters::video(
            codec,
            VideoParams {
                width: 4,
                height: 2,
                pixel_format: PixelFormat::Gray8,
            },
        )
    }

    fn opened(role: CodecRole, params: &CodecParameters) -> SynthCodec {
        let mut codec = SynthCodec::new(1, role, params, Rational::new(1, 25)).unwrap();
        assert_eq!(codec.open(&CodecOptions::default()), 0);
        codec
    }

    fn packet(params: &CodecParameters, pts: i64) -> Vec<u8> {
        let layout = layout_for(params, 0).unwrap();
        payload::encode(&[FramePayload::filled(layout, true, pts as u32)]).unwrap()
    }

    fn props(pts: i64) -> PacketProps {
        PacketProps {
            pts,
            dts: pts,
            duration: 1,
            ..PacketProps::default()
        }
    }

    #[test]
    fn unknown_codec_is_not_found() {
        let err = SynthCodec::new(1, CodecRole::Decoder, &video(CodecId::H264), Rational::new(1, 25))
            .unwrap_err();
        assert_eq!(err, code::DECODER_NOT_FOUND);
    }

    #[test]
    fn delayed_decoder_holds_two_frames() {
        let params = video(CodecId::Mpeg4);
        let mut codec = opened(CodecRole::Decoder, &params);
        for pts in 0..2 {
            assert_eq!(codec.send_packet(Some((&packet(&params, pts), props(pts)))), 0);
            assert_eq!(codec.receive_frame().unwrap_err(), code::EAGAIN);
        }
        assert_eq!(codec.send_packet(Some((&packet(&params, 2), props(2)))), 0);
        assert_eq!(codec.receive_frame().unwrap().props.pts, 0);

        assert_eq!(codec.send_packet(None), 0);
        assert_eq!(codec.receive_frame().unwrap().props.pts, 1);
        assert_eq!(codec.receive_frame().unwrap().props.pts, 2);
        assert_eq!(codec.receive_frame().unwrap_err(), code::EOF);
        assert_eq!(codec.send_packet(None), code::EOF);
    }

    #[test]
    fn full_output_pushes_back() {
        let params = video(CodecId::RawVideo);
        let mut codec = opened(CodecRole::Decoder, &params);
        for pts in 0..OUTPUT_CAPACITY as i64 {
            assert_eq!(codec.send_packet(Some((&packet(&params, pts), props(pts)))), 0);
        }
        assert_eq!(
            codec.send_packet(Some((&packet(&params, 9), props(9)))),
            code::EAGAIN
        );
        codec.receive_frame().unwrap();
        assert_eq!(codec.send_packet(Some((&packet(&params, 9), props(9)))), 0);
    }

    #[test]
    fn flush_leaves_draining_mode() {
        let params = video(CodecId::RawVideo);
        let mut codec = opened(CodecRole::Decoder, &params);
        assert_eq!(codec.send_packet(None), 0);
        codec.flush();
        assert_eq!(codec.receive_frame().unwrap_err(), code::EAGAIN);
        assert_eq!(codec.send_packet(Some((&packet(&params, 0), props(0)))), 0);
    }

    #[test]
    fn packed_audio_encoder_groups_frames() {
        let params = CodecParameters::audio(
            CodecId::Aac,
            AudioParams {
                sample_rate: 8000,
                channels: ChannelLayout::Mono,
                sample_format: SampleFormat::S16,
                frame_size: 4,
            },
        );
        let mut codec = SynthCodec::new(1, CodecRole::Encoder, &params, Rational::new(1, 8000))
            .unwrap();
        assert_eq!(codec.open(&CodecOptions::default()), 0);
        let layout = layout_for(&params, 4).unwrap();
        let frame = |pts| {
            (
                FramePayload::filled(layout, true, 0),
                FrameProps {
                    pts,
                    duration: 4,
                    key: true,
                },
            )
        };
        assert_eq!(codec.send_frame(Some(frame(0))), 0);
        assert_eq!(codec.receive_packet().unwrap_err(), code::EAGAIN);
        assert_eq!(codec.send_frame(Some(frame(4))), 0);
        let packet = codec.receive_packet().unwrap();
        assert_eq!((packet.props.pts, packet.props.duration), (0, 8));
        assert_eq!(payload::decode(&packet.data).unwrap().len(), 2);

        assert_eq!(codec.send_frame(Some(frame(8))), 0);
        assert_eq!(codec.send_frame(None), 0);
        assert_eq!(codec.receive_packet().unwrap().props.duration, 4);
        assert_eq!(codec.receive_packet().unwrap_err(), code::EOF);
    }

    #[test]
    fn encoder_rejects_mismatched_frames_and_options() {
        let params = video(CodecId::RawVideo);
        let mut codec = opened(CodecRole::Encoder, &params);
        let wrong = FrameLayout::Video {
            width: 8,
            height: 2,
            format: PixelFormat::Gray8,
        };
        let frame = (FramePayload::filled(wrong, true, 0), FrameProps::default());
        assert_eq!(codec.send_frame(Some(frame)), code::EINVAL);

        let mut other =
            SynthCodec::new(2, CodecRole::Encoder, &params, Rational::new(1, 25)).unwrap();
        let options = CodecOptions {
            extra: vec![("bogus".into(), "1".into())],
            ..CodecOptions::default()
        };
        assert_eq!(other.open(&options), code::OPTION_NOT_FOUND);
    }

    #[test]
    fn global_header_sets_extradata() {
        let params = video(CodecId::Mpeg4);
        let mut codec =
            SynthCodec::new(1, CodecRole::Encoder, &params, Rational::new(1, 25)).unwrap();
        let options = CodecOptions {
            global_header: true,
            ..CodecOptions::default()
        };
        assert_eq!(codec.open(&options), 0);
        assert!(codec.parameters().extradata.is_some());
    }

    #[test]
    fn keyframes_follow_interval() {
        let params = video(CodecId::RawVideo);
        let mut codec =
            SynthCodec::new(1, CodecRole::Encoder, &params, Rational::new(1, 25)).unwrap();
        let options = CodecOptions {
            keyframe_interval: Some(2),
            ..CodecOptions::default()
        };
        assert_eq!(codec.open(&options), 0);
        let layout = layout_for(&params, 0).unwrap();
        let mut keys = Vec::new();
        for pts in 0..4 {
            let frame = FrameProps {
                pts,
                duration: 1,
                key: false,
            };
            assert_eq!(
                codec.send_frame(Some((FramePayload::filled(layout, false, 0), frame))),
                0
            );
            keys.push(codec.receive_packet().unwrap().props.key);
        }
        assert_eq!(keys, vec![true, false, true, false]);
    }
}
