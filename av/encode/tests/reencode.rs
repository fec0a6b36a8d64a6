use av_decode::Decoder;
use av_encode::{EncodeState, Encoder, EncoderConfig};
use av_source::Demuxer;
use av_synthetic::{Fixture, SyntheticLibrary};
use av_types::{ChannelLayout, CodecId};

fn reencode(fixture: &Fixture) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let lib = SyntheticLibrary::new();
    let mut demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
    let stream = demuxer.streams()[0].clone();
    let mut decoder = Decoder::open(&lib, &stream).unwrap();
    let mut encoder = Encoder::open(&lib, EncoderConfig::matching(&stream)).unwrap();

    let mut input = Vec::new();
    let mut output = Vec::new();
    for packet in &mut demuxer {
        let packet = packet.unwrap();
        input.push(packet.data().to_vec());
        for frame in decoder.decode(&packet).unwrap() {
            for encoded in encoder.encode(&frame).unwrap() {
                output.push(encoded.data().to_vec());
            }
        }
    }
    for frame in decoder.drain().unwrap() {
        for encoded in encoder.encode(&frame).unwrap() {
            output.push(encoded.data().to_vec());
        }
    }
    for encoded in encoder.drain().unwrap() {
        output.push(encoded.data().to_vec());
    }
    assert_eq!(encoder.state(), EncodeState::Flushed);
    drop((decoder, encoder, demuxer));
    assert!(lib.ledger().is_balanced());
    (input, output)
}

#[test]
fn identical_parameters_reproduce_raw_video() {
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 10, 6, 25)
        .packets_per_stream(7);
    let (input, output) = reencode(&fixture);
    assert_eq!(input, output);
}

#[test]
fn grouped_audio_survives_reencoding() {
    let fixture = Fixture::new()
        .audio(CodecId::Aac, 16000, ChannelLayout::Stereo, 32)
        .packets_per_stream(5);
    let (input, output) = reencode(&fixture);
    assert_eq!(input, output);
}

#[test]
fn delayed_video_keeps_packet_count() {
    // Keyframes are placed by the encoder, so only the count is compared.
    let fixture = Fixture::new()
        .video(CodecId::Mpeg4, 4, 4, 30)
        .keyframe_interval(4)
        .packets_per_stream(9);
    let (input, output) = reencode(&fixture);
    assert_eq!(input.len(), output.len());
}
