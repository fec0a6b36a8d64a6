/*!
    Builder for small synthetic containers.
*/

use std::io::{self, Cursor};
use std::path::Path;

use av_core::MediaSource;
use av_types::{
    AudioParams, ChannelLayout, CodecId, CodecParameters, MediaKind, MediaParams, PixelFormat,
    Rational, SampleFormat, StreamDescriptor, VideoParams,
};

use crate::codec::{CodecKind, layout_for};
use crate::container::{self, ContainerHeader, Record};
use crate::payload::{self, FramePayload};

const DEFAULT_FRAME_SIZE: u32 = 1024;

/**
    One packet a fixture will contain.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixturePacket {
    pub stream: usize,
    pub pts: i64,
    pub duration: i64,
    pub key: bool,
    pub data: Vec<u8>,
}

/**
    Describes a synthetic container: its streams, how many packets each one
    gets and in which order they are interleaved.

    ```
    use av_synthetic::Fixture;
    use av_types::{ChannelLayout, CodecId};

    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 8, 4, 25)
        .audio(CodecId::PcmS16Le, 8000, ChannelLayout::Mono, 160)
        .packets_per_stream(3);
    assert_eq!(fixture.packets().unwrap().len(), 6);
    ```
*/
#[derive(Clone, Debug)]
pub struct Fixture {
    streams: Vec<StreamDescriptor>,
    packets_per_stream: usize,
    order: Option<Vec<usize>>,
    keyframe_interval: u32,
    trailer: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            packets_per_stream: 10,
            order: None,
            keyframe_interval: 12,
            trailer: true,
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Add a YUV 4:2:0 video stream with a `1/fps` time base.
    */
    pub fn video(self, codec: CodecId, width: u32, height: u32, fps: i32) -> Self {
        let params = CodecParameters::video(
            codec,
            VideoParams {
                width,
                height,
                pixel_format: PixelFormat::Yuv420p,
            },
        );
        let index = self.streams.len();
        let stream = StreamDescriptor::new(index, params, Rational::new(1, fps))
            .with_frame_rate(Rational::new(fps, 1));
        self.stream(stream)
    }

    /**
        Add a packed 16-bit audio stream with a `1/sample_rate` time base.
    */
    pub fn audio(
        self,
        codec: CodecId,
        sample_rate: u32,
        channels: ChannelLayout,
        frame_size: u32,
    ) -> Self {
        let params = CodecParameters::audio(
            codec,
            AudioParams {
                sample_rate,
                channels,
                sample_format: SampleFormat::S16,
                frame_size,
            },
        );
        let index = self.streams.len();
        self.stream(StreamDescriptor::new(
            index,
            params,
            Rational::new(1, sample_rate as i32),
        ))
    }

    /**
        Add a stream with no frame layout, such as subtitles.
    */
    pub fn data_stream(self, codec: CodecId, time_base: Rational) -> Self {
        let index = self.streams.len();
        self.stream(StreamDescriptor::new(
            index,
            CodecParameters::with_media(codec, MediaParams::None),
            time_base,
        ))
    }

    pub fn stream(mut self, mut stream: StreamDescriptor) -> Self {
        stream.index = self.streams.len();
        self.streams.push(stream);
        self
    }

    /**
        Packets per stream when interleaving round-robin.
    */
    pub fn packets_per_stream(mut self, count: usize) -> Self {
        self.packets_per_stream = count;
        self
    }

    /**
        Explicit interleaving: one packet per entry, for the stream it names.
    */
    pub fn order(mut self, order: Vec<usize>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn keyframe_interval(mut self, interval: u32) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /**
        Leave the trailer off, as if writing had been interrupted.
    */
    pub fn without_trailer(mut self) -> Self {
        self.trailer = false;
        self
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn stream_order(&self) -> Vec<usize> {
        match &self.order {
            Some(order) => order.clone(),
            None => (0..self.packets_per_stream)
                .flat_map(|_| 0..self.streams.len())
                .collect(),
        }
    }

    /**
        The packets, in container order.
    */
    pub fn packets(&self) -> io::Result<Vec<FixturePacket>> {
        let mut counters = vec![0i64; self.streams.len()];
        let mut packets = Vec::new();
        for stream_index in self.stream_order() {
            let Some(stream) = self.streams.get(stream_index) else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no stream {stream_index}"),
                ));
            };
            let n = counters[stream_index];
            counters[stream_index] += 1;
            packets.push(self.packet(stream, n)?);
        }
        Ok(packets)
    }

    fn packet(&self, stream: &StreamDescriptor, n: i64) -> io::Result<FixturePacket> {
        let frames_per_packet = CodecKind::for_codec(stream.codec_id())
            .map_or(1, CodecKind::frames_per_packet) as i64;
        let frame_duration = match &stream.codec.media {
            MediaParams::Audio(a) => {
                (if a.frame_size > 0 { a.frame_size } else { DEFAULT_FRAME_SIZE }) as i64
            }
            MediaParams::Video(_) | MediaParams::None => 1,
        };
        let key = match stream.kind {
            MediaKind::Video => n % self.keyframe_interval as i64 == 0,
            _ => true,
        };
        let seed = ((stream.index as u32) << 16) | n as u32;
        let data = match layout_for(&stream.codec, frame_duration as u32) {
            Some(layout) => {
                let frames: Vec<FramePayload> = (0..frames_per_packet)
                    .map(|i| FramePayload::filled(layout, key, seed + i as u32))
                    .collect();
                payload::encode(&frames)?
            }
            None => format!("{} {n}", stream.codec_id()).into_bytes(),
        };
        Ok(FixturePacket {
            stream: stream.index,
            pts: n * frames_per_packet * frame_duration,
            duration: frames_per_packet * frame_duration,
            key,
            data,
        })
    }

    /**
        Serialize the container.
    */
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let header = ContainerHeader {
            format: "synth".to_string(),
            streams: self.streams.clone(),
        };
        container::write_header(&mut out, &header)?;
        let packets = self.packets()?;
        for packet in &packets {
            container::write_record(
                &mut out,
                &Record {
                    stream: packet.stream as u32,
                    key: packet.key,
                    pts: packet.pts,
                    dts: packet.pts,
                    duration: packet.duration,
                    data: packet.data.clone(),
                },
            )?;
        }
        if self.trailer {
            container::write_trailer(&mut out, packets.len() as u64)?;
        }
        Ok(out)
    }

    /**
        An in-memory source over the serialized container.
    */
    pub fn source(&self) -> io::Result<MediaSource> {
        Ok(MediaSource::stream(Cursor::new(self.to_bytes()?)))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_interleaving() {
        let fixture = Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .audio(CodecId::Aac, 8000, ChannelLayout::Stereo, 4)
            .packets_per_stream(2);
        let packets = fixture.packets().unwrap();
        let streams: Vec<_> = packets.iter().map(|p| p.stream).collect();
        assert_eq!(streams, vec![0, 1, 0, 1]);
        // Two frames of four samples per audio packet.
        assert_eq!((packets[3].pts, packets[3].duration), (8, 8));
    }

    #[test]
    fn explicit_order_counts_per_stream() {
        let fixture = Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .video(CodecId::Mpeg4, 4, 4, 25)
            .order(vec![1, 1, 0, 1]);
        let pts: Vec<_> = fixture.packets().unwrap().iter().map(|p| p.pts).collect();
        assert_eq!(pts, vec![0, 1, 0, 2]);
        assert!(Fixture::new().order(vec![0]).packets().is_err());
    }

    #[test]
    fn keyframes_follow_interval() {
        let fixture = Fixture::new()
            .video(CodecId::Mpeg4, 4, 4, 25)
            .keyframe_interval(3)
            .packets_per_stream(4);
        let keys: Vec<_> = fixture.packets().unwrap().iter().map(|p| p.key).collect();
        assert_eq!(keys, vec![true, false, false, true]);
    }

    #[test]
    fn file_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.synth");
        let fixture = Fixture::new().video(CodecId::RawVideo, 2, 2, 10);
        fixture.write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), fixture.to_bytes().unwrap());
    }
}
