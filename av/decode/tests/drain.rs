use av_decode::{DecodeState, Decoder};
use av_source::Demuxer;
use av_synthetic::payload::{self, FramePayload};
use av_synthetic::{Fixture, SyntheticLibrary};
use av_types::{ChannelLayout, CodecId};
use proptest::prelude::*;

fn fixture(codec: CodecId, packets: usize) -> Fixture {
    let fixture = Fixture::new().packets_per_stream(packets);
    match codec {
        CodecId::Aac | CodecId::PcmS16Le => fixture.audio(codec, 8000, ChannelLayout::Stereo, 8),
        _ => fixture.video(codec, 6, 4, 30),
    }
}

proptest! {
    #[test]
    fn flush_releases_every_buffered_frame(
        codec in prop::sample::select(vec![
            CodecId::RawVideo,
            CodecId::Mpeg4,
            CodecId::PcmS16Le,
            CodecId::Aac,
        ]),
        packets in 0usize..24,
    ) {
        let lib = SyntheticLibrary::new();
        let fixture = fixture(codec, packets);
        let mut demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
        let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();

        let mut decoded = Vec::new();
        for packet in &mut demuxer {
            decoded.extend(decoder.decode(&packet.unwrap()).unwrap());
        }
        decoded.extend(decoder.drain().unwrap());
        prop_assert_eq!(decoder.state(), DecodeState::Flushed);

        // Frames come out bit for bit as the fixture put them in.
        let expected: Vec<FramePayload> = fixture
            .packets()
            .unwrap()
            .iter()
            .flat_map(|p| payload::decode(&p.data).unwrap())
            .collect();
        prop_assert_eq!(decoded.len(), expected.len());
        for (frame, want) in decoded.iter().zip(&expected) {
            prop_assert_eq!(frame.layout(), Some(want.layout));
            for (plane, bytes) in want.planes.iter().enumerate() {
                let (stride, rows) = want.layout.plane_shape(plane).unwrap();
                let data = frame.plane(plane).unwrap();
                let linesize = frame.linesize(plane);
                for row in 0..rows {
                    prop_assert_eq!(
                        &data[row * linesize..row * linesize + stride],
                        &bytes[row * stride..(row + 1) * stride]
                    );
                }
            }
        }

        prop_assert!(decoder.drain().unwrap().is_empty());
        drop((decoded, decoder, demuxer));
        prop_assert!(lib.ledger().is_balanced());
    }
}

#[test]
fn pts_are_spread_across_grouped_frames() {
    let lib = SyntheticLibrary::new();
    let fixture = fixture(CodecId::Aac, 3);
    let mut demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
    let mut decoder = Decoder::open(&lib, &demuxer.streams()[0]).unwrap();
    let mut pts = Vec::new();
    while let Ok(packet) = demuxer.read_packet() {
        for frame in decoder.decode(&packet).unwrap() {
            pts.push(frame.pts().unwrap());
        }
    }
    assert_eq!(pts, vec![0, 8, 16, 24, 32, 40]);
}
