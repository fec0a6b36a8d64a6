use av_decode::{Decoder, Parser};
use av_source::Demuxer;
use av_synthetic::payload::{self, FramePayload};
use av_synthetic::{Fixture, SyntheticLibrary};
use av_types::{ChannelLayout, CodecId, ErrorKind, Rational};
use proptest::prelude::*;

fn fixture(codec: CodecId, packets: usize) -> Fixture {
    let fixture = Fixture::new().packets_per_stream(packets);
    match codec {
        CodecId::Aac => fixture.audio(codec, 8000, ChannelLayout::Mono, 8),
        _ => fixture.video(codec, 4, 4, 25),
    }
}

proptest! {
    #[test]
    fn chunking_does_not_change_the_packets(
        codec in prop::sample::select(vec![CodecId::RawVideo, CodecId::Mpeg4, CodecId::Aac]),
        packets in 1usize..8,
        chunk in 1usize..64,
    ) {
        let lib = SyntheticLibrary::new();
        let fixture = fixture(codec, packets);
        let demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
        let stream = demuxer.streams()[0].clone();
        let originals = fixture.packets().unwrap();
        let bytes: Vec<u8> = originals.iter().flat_map(|p| p.data.clone()).collect();

        let mut parser = Parser::open(&lib, &stream).unwrap();
        let mut parsed = Vec::new();
        for piece in bytes.chunks(chunk) {
            parsed.extend(parser.parse(piece).unwrap());
        }
        parsed.extend(parser.flush().unwrap());
        prop_assert_eq!(parsed.len(), originals.len());
        prop_assert_eq!(parser.packets_parsed(), originals.len() as u64);
        for (packet, original) in parsed.iter().zip(&originals) {
            prop_assert_eq!(packet.data(), &original.data[..]);
            prop_assert_eq!(packet.stream_index(), stream.index);
            prop_assert_eq!(packet.time_base(), stream.time_base);
        }

        // The parsed packets decode to the frames the fixture encoded.
        let mut decoder = Decoder::open(&lib, &stream).unwrap();
        let mut frames = 0;
        for packet in &parsed {
            frames += decoder.decode(packet).unwrap().len();
        }
        frames += decoder.drain().unwrap().len();
        let expected: Vec<FramePayload> = originals
            .iter()
            .flat_map(|p| payload::decode(&p.data).unwrap())
            .collect();
        prop_assert_eq!(frames, expected.len());

        drop((parsed, parser, decoder, demuxer));
        prop_assert!(lib.ledger().is_balanced());
    }
}

#[test]
fn truncated_stream_fails_at_flush() {
    let lib = SyntheticLibrary::new();
    let fixture = fixture(CodecId::RawVideo, 2);
    let demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
    let bytes: Vec<u8> = fixture
        .packets()
        .unwrap()
        .iter()
        .flat_map(|p| p.data.clone())
        .collect();

    let mut parser = Parser::open(&lib, &demuxer.streams()[0]).unwrap();
    let first = parser.parse(&bytes[..bytes.len() - 3]).unwrap();
    assert_eq!(first.len(), 1);
    let err = parser.flush().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    assert!(parser.flush().unwrap().is_empty());
    let err = parser.parse(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn parser_needs_a_known_codec() {
    let lib = SyntheticLibrary::new();
    let fixture = Fixture::new().video(CodecId::H264, 4, 4, 25);
    let demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
    let err = Parser::open(&lib, &demuxer.streams()[0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert!(err.context().starts_with("parser for stream 0"));
}

#[test]
fn packets_carry_the_stream_time_base() {
    let lib = SyntheticLibrary::new();
    let fixture = fixture(CodecId::Mpeg4, 1);
    let demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
    let bytes = fixture.packets().unwrap().remove(0).data;
    let mut parser = Parser::open(&lib, &demuxer.streams()[0]).unwrap();
    assert!(parser.parse(&bytes).unwrap().is_empty());
    let packets = parser.flush().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].time_base(), Rational::new(1, 25));
    assert!(packets[0].is_key());
}
