use std::io::Cursor;
use std::time::Duration;

use av_core::{
    CodecContext, CodecOptions, CodecRole, Frame, InputContext, MediaSink, MediaSource,
    OutputContext, Packet,
};
use av_synthetic::{Fixture, Resource, SyntheticLibrary};
use av_types::{
    ChannelLayout, CodecId, CodecParameters, ErrorKind, MediaKind, PixelFormat, Rational,
    VideoParams,
};

fn two_streams() -> Fixture {
    Fixture::new()
        .video(CodecId::RawVideo, 4, 4, 25)
        .audio(CodecId::PcmS16Le, 8000, ChannelLayout::Mono, 160)
        .packets_per_stream(3)
}

fn video_params(codec: CodecId) -> CodecParameters {
    CodecParameters::video(
        codec,
        VideoParams {
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Yuv420p,
        },
    )
}

#[test]
fn input_reads_every_packet_then_eof() {
    let lib = SyntheticLibrary::new();
    let mut input = InputContext::open(&lib, two_streams().source().unwrap()).unwrap();
    assert_eq!(input.format_name(), "synth");
    assert_eq!(input.streams().len(), 2);
    assert_eq!(input.best_stream(MediaKind::Audio), Some(1));
    assert_eq!(input.best_stream(MediaKind::Subtitle), None);

    let mut streams = Vec::new();
    loop {
        match input.read_packet() {
            Ok(packet) => {
                let expected = input.stream(packet.stream_index()).unwrap().time_base;
                assert_eq!(packet.time_base(), expected);
                streams.push(packet.stream_index());
            }
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::EndOfStream);
                break;
            }
        }
    }
    assert_eq!(streams, vec![0, 1, 0, 1, 0, 1]);
    assert!(input.read_packet().unwrap_err().is_end_of_stream());

    drop(input);
    assert!(lib.ledger().is_balanced());
}

#[test]
fn input_duration_and_seek() {
    let lib = SyntheticLibrary::new();
    let fixture = Fixture::new()
        .video(CodecId::Mpeg4, 4, 4, 10)
        .keyframe_interval(5)
        .packets_per_stream(20);
    let mut input = InputContext::open(&lib, fixture.source().unwrap()).unwrap();
    assert_eq!(input.duration(), Some(Duration::from_secs(2)));

    input.seek(Duration::from_millis(1200)).unwrap();
    let packet = input.read_packet().unwrap();
    assert_eq!(packet.pts(), Some(10));
    assert!(packet.is_key());

    while input.read_packet().is_ok() {}
    input.seek(Duration::ZERO).unwrap();
    assert_eq!(input.read_packet().unwrap().pts(), Some(0));
}

#[test]
fn input_errors_are_classified() {
    let lib = SyntheticLibrary::new();
    let missing = InputContext::open(&lib, MediaSource::path("/nonexistent/clip.synth"));
    assert_eq!(
        missing.unwrap_err().kind(),
        ErrorKind::ResourceUnavailable
    );

    let garbage = MediaSource::stream(Cursor::new(b"not a container".to_vec()));
    let err = InputContext::open(&lib, garbage).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert!(lib.ledger().is_balanced());
}

#[test]
fn truncated_input_ends_cleanly() {
    let lib = SyntheticLibrary::new();
    let fixture = two_streams().without_trailer();
    let mut input = InputContext::open(&lib, fixture.source().unwrap()).unwrap();
    let mut count = 0;
    while input.read_packet().is_ok() {
        count += 1;
    }
    assert_eq!(count, 6);
}

#[test]
fn codec_contexts_follow_their_type_state() {
    let lib = SyntheticLibrary::new();
    let input = InputContext::open(&lib, two_streams().source().unwrap()).unwrap();
    let closed = CodecContext::decoder(&lib, &input.streams()[0]).unwrap();
    assert_eq!(closed.role(), CodecRole::Decoder);
    assert_eq!(closed.time_base(), Rational::new(1, 25));

    let mut decoder = closed.open(&CodecOptions::default()).unwrap();
    let mut input = input;
    let packet = input.read_packet().unwrap();
    decoder.send_packet(Some(&packet)).unwrap();
    let frame = decoder.receive_frame().unwrap();
    assert_eq!(frame.pts(), Some(0));
    assert_eq!(frame.time_base(), Rational::new(1, 25));
    assert!(decoder.receive_frame().unwrap_err().is_need_more_input());

    decoder.send_packet(None).unwrap();
    assert!(decoder.receive_frame().unwrap_err().is_end_of_stream());
    assert!(decoder.send_packet(Some(&packet)).unwrap_err().is_end_of_stream());

    decoder.flush_buffers();
    decoder.send_packet(Some(&packet)).unwrap();
    assert!(decoder.receive_frame().is_ok());
}

#[test]
fn missing_codecs_are_unsupported() {
    let lib = SyntheticLibrary::new();
    let err = CodecContext::encoder(&lib, &video_params(CodecId::H264), Rational::new(1, 25))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(lib.ledger().allocated(Resource::Codec), 0);
}

#[test]
fn encoder_open_validates_options() {
    let lib = SyntheticLibrary::new();
    let params = video_params(CodecId::Mpeg4);
    let options = CodecOptions {
        extra: vec![("no-such-option".into(), "1".into())],
        ..CodecOptions::default()
    };
    let err = CodecContext::encoder(&lib, &params, Rational::new(1, 25))
        .unwrap()
        .open(&options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = CodecContext::encoder(&lib, &params, Rational::default())
        .unwrap()
        .open(&CodecOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // A failed open releases the context.
    assert!(lib.ledger().is_balanced());
}

#[test]
fn encoder_produces_packets_in_its_time_base() {
    let lib = SyntheticLibrary::new();
    let params = video_params(CodecId::RawVideo);
    let mut encoder = CodecContext::encoder(&lib, &params, Rational::new(1, 25))
        .unwrap()
        .open(&CodecOptions {
            global_header: true,
            ..CodecOptions::default()
        })
        .unwrap();
    assert_eq!(
        encoder.parameters().extradata.as_deref(),
        Some(&b"SYNTH:rawvideo"[..])
    );

    let layout = params.video_params().unwrap().layout();
    let mut frame = Frame::with_layout(&lib, layout).unwrap();
    frame.set_pts(Some(4));
    frame.set_duration(1);
    encoder.send_frame(Some(&frame)).unwrap();
    let packet = encoder.receive_packet().unwrap();
    assert_eq!(packet.pts(), Some(4));
    assert_eq!(packet.time_base(), Rational::new(1, 25));
    assert!(packet.is_key());
}

#[test]
fn output_enforces_header_packets_trailer_order() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.synthm");
    let fixture = two_streams();

    let mut output = OutputContext::open(&lib, MediaSink::path(&path)).unwrap();
    assert_eq!(output.format().name, "synth-ms");
    assert!(output.format().global_header);

    let mut packet = Packet::from_bytes(&lib, b"x").unwrap();
    assert_eq!(
        output.write_packet(&mut packet).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    for stream in fixture.streams() {
        output.add_stream(stream).unwrap();
    }
    output.write_header().unwrap();
    assert_eq!(output.stream_time_base(0), Some(Rational::new(1, 1000)));
    assert!(output.add_stream(&fixture.streams()[0]).is_err());
    assert!(output.write_header().is_err());

    packet.set_stream_index(5);
    assert!(output.write_packet(&mut packet).is_err());
    packet.set_stream_index(1);
    packet.set_pts(Some(0));
    output.write_packet(&mut packet).unwrap();
    assert!(packet.is_empty());

    output.write_trailer().unwrap();
    assert!(output.is_finished());
    assert!(output.write_trailer().is_err());
    drop(output);

    let ledger = lib.ledger();
    assert_eq!(ledger.trailers_written, 1);
    assert_eq!(ledger.live(Resource::Output), 0);

    let reopened = InputContext::open(&lib, MediaSource::path(&path)).unwrap();
    assert_eq!(reopened.format_name(), "synth-ms");
    assert_eq!(reopened.streams().len(), 2);
}

#[test]
fn output_rejects_codecs_the_format_cannot_hold() {
    let lib = SyntheticLibrary::new();
    let sink = MediaSink::stream(Vec::new(), "synth-video");
    let mut output = OutputContext::open(&lib, sink).unwrap();
    let audio = two_streams().streams()[1].clone();
    let err = output.add_stream(&audio).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    let unknown = OutputContext::open(&lib, MediaSink::path("clip.unknown")).unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::UnsupportedFormat);
}
