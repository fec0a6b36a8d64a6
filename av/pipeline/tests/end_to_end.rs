use std::path::Path;

use av_core::{FilterGraph, Frame};
use av_pipeline::{
    EncoderOverrides, MediaSink, MediaSource, Pipeline, PipelineConfig, Scaler, StreamAction, run,
};
use av_source::Demuxer;
use av_synthetic::{Fixture, SyntheticLibrary};
use av_types::{
    ChannelLayout, CodecId, Error, ErrorKind, MediaParams, PixelFormat, Rational, Result,
    VideoParams,
};
use proptest::prelude::*;

fn two_streams(packets: usize) -> Fixture {
    Fixture::new()
        .video(CodecId::Mpeg4, 8, 8, 25)
        .audio(CodecId::Aac, 8000, ChannelLayout::Stereo, 32)
        .packets_per_stream(packets)
}

/// Packets per output stream, with their payloads.
fn read_back(lib: &SyntheticLibrary, path: &Path) -> Vec<Vec<Vec<u8>>> {
    let mut demuxer = Demuxer::open(lib, MediaSource::path(path)).unwrap();
    let mut streams = vec![Vec::new(); demuxer.streams().len()];
    for packet in &mut demuxer {
        let packet = packet.unwrap();
        streams[packet.stream_index()].push(packet.data().to_vec());
    }
    streams
}

#[test]
fn transcode_two_streams() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let report = run(
        &lib,
        two_streams(10).source().unwrap(),
        MediaSink::path(&out),
        &PipelineConfig::default(),
    )
    .unwrap();

    assert_eq!(report.output_streams(), 2);
    for stream in &report.streams {
        assert_eq!(stream.action, StreamAction::Transcode);
        assert_eq!(stream.packets_in, 10);
        assert!(stream.packets_out.abs_diff(10) <= 2, "{stream:?}");
        assert_eq!(stream.frames_decoded, stream.frames_encoded);
    }
    assert_eq!(report.stream(0).unwrap().frames_decoded, 10);
    assert_eq!(report.stream(1).unwrap().frames_decoded, 20);

    let ledger = lib.ledger();
    assert_eq!(ledger.trailers_written, 1);
    assert!(ledger.is_balanced());

    let written = read_back(&lib, &out);
    assert_eq!(written.len(), 2);
    for (index, packets) in written.iter().enumerate() {
        assert_eq!(packets.len() as u64, report.output(index).unwrap().packets_out);
    }
}

#[test]
fn copy_streams_are_remuxed_unchanged() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synthm");
    let fixture = two_streams(6);
    let config = PipelineConfig::new()
        .with_action(0, StreamAction::Copy)
        .with_action(1, StreamAction::Copy);
    let report = run(&lib, fixture.source().unwrap(), MediaSink::path(&out), &config).unwrap();
    assert_eq!(report.packets_in(), 12);
    assert_eq!(report.packets_out(), 12);
    assert_eq!(report.stream(0).unwrap().frames_decoded, 0);

    let written = read_back(&lib, &out);
    let packets = fixture.packets().unwrap();
    for (index, output) in written.iter().enumerate() {
        let input: Vec<_> = packets
            .iter()
            .filter(|p| p.stream == index)
            .map(|p| p.data.clone())
            .collect();
        assert_eq!(output, &input);
    }
}

#[test]
fn raw_video_round_trips_through_the_pipeline() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 6, 4, 30)
        .packets_per_stream(5);
    Pipeline::new(&lib, PipelineConfig::new())
        .run(fixture.source().unwrap(), MediaSink::path(&out))
        .unwrap();

    let written = read_back(&lib, &out);
    let input: Vec<_> = fixture
        .packets()
        .unwrap()
        .into_iter()
        .map(|p| p.data)
        .collect();
    assert_eq!(written, vec![input]);
}

#[test]
fn subtitles_are_dropped_by_default() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 4, 4, 25)
        .data_stream(CodecId::Subrip, Rational::new(1, 1000))
        .packets_per_stream(4);
    let report = run(
        &lib,
        fixture.source().unwrap(),
        MediaSink::path(&out),
        &PipelineConfig::default(),
    )
    .unwrap();

    let subs = report.stream(1).unwrap();
    assert_eq!(subs.action, StreamAction::Drop);
    assert_eq!(subs.output_index, None);
    assert_eq!(subs.packets_in, 4);
    assert_eq!(subs.packets_out, 0);
    assert_eq!(read_back(&lib, &out).len(), 1);
}

#[test]
fn transforms_see_every_decoded_frame() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 4, 4, 25)
        .packets_per_stream(7);

    let report = Pipeline::new(&lib, PipelineConfig::new())
        .transform(
            0,
            |mut frame: Frame<SyntheticLibrary>| -> Result<Frame<SyntheticLibrary>> {
                frame.make_writable()?;
                frame.plane_mut(0)?.fill(0);
                Ok(frame)
            },
        )
        .run(fixture.source().unwrap(), MediaSink::path(&out))
        .unwrap();
    assert_eq!(report.stream(0).unwrap().frames_encoded, 7);

    let written = read_back(&lib, &out);
    let input: Vec<_> = fixture
        .packets()
        .unwrap()
        .into_iter()
        .map(|p| p.data)
        .collect();
    assert_eq!(written[0].len(), 7);
    assert_ne!(written[0], input);
}

#[test]
fn scaled_streams_are_encoded_at_the_new_size() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 4, 4, 25)
        .packets_per_stream(5);

    let report = Pipeline::new(&lib, PipelineConfig::new())
        .transform(0, Scaler::new(&lib, 2, 2, PixelFormat::Gray8))
        .run(fixture.source().unwrap(), MediaSink::path(&out))
        .unwrap();
    assert_eq!(report.stream(0).unwrap().frames_encoded, 5);

    let demuxer = Demuxer::open(&lib, MediaSource::path(&out)).unwrap();
    assert_eq!(
        demuxer.streams()[0].codec.video_params(),
        Some(&VideoParams {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Gray8,
        })
    );
    drop(demuxer);
    assert!(lib.ledger().is_balanced());
}

#[test]
fn filter_graphs_run_as_transforms() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synth");
    let fixture = Fixture::new()
        .video(CodecId::RawVideo, 4, 4, 25)
        .packets_per_stream(10);
    let input = MediaParams::Video(VideoParams {
        width: 4,
        height: 4,
        pixel_format: PixelFormat::Yuv420p,
    });
    let graph = FilterGraph::new(&lib, "framestep=2,scale=2:2", input, Rational::new(1, 25)).unwrap();

    let report = Pipeline::new(&lib, PipelineConfig::new())
        .transform(0, graph)
        .run(fixture.source().unwrap(), MediaSink::path(&out))
        .unwrap();
    let stream = report.stream(0).unwrap();
    assert_eq!(stream.frames_decoded, 10);
    assert_eq!(stream.frames_encoded, 5);
    assert_eq!(stream.packets_out, 5);

    let written = read_back(&lib, &out);
    assert_eq!(written[0].len(), 5);
    assert!(lib.ledger().is_balanced());
}

#[test]
fn transform_errors_abort_the_run() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let err = Pipeline::new(&lib, PipelineConfig::new())
        .transform(
            1,
            |_: Frame<SyntheticLibrary>| -> Result<Frame<SyntheticLibrary>> {
                Err(Error::invalid_argument("resampler rejected frame"))
            },
        )
        .run(
            two_streams(4).source().unwrap(),
            MediaSink::path(dir.path().join("out.synth")),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("resampler rejected frame"));
    let ledger = lib.ledger();
    assert_eq!(ledger.trailers_written, 0);
    assert!(ledger.is_balanced());
}

#[test]
fn encoder_overrides_reach_the_encoder() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new().with_encoder(
        0,
        EncoderOverrides::default().with_codec(CodecId::H264),
    );
    let err = run(
        &lib,
        two_streams(2).source().unwrap(),
        MediaSink::path(dir.path().join("out.synth")),
        &config,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    let config = PipelineConfig::new().with_encoder(
        0,
        EncoderOverrides::default().with_option("no-such-option", "1"),
    );
    let err = run(
        &lib,
        two_streams(2).source().unwrap(),
        MediaSink::path(dir.path().join("out.synth")),
        &config,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(lib.ledger().is_balanced());
}

#[test]
fn global_header_containers_get_extradata() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.synthm");
    let config = PipelineConfig::from_json(r#"{ "streams": { "1": { "action": "drop" } } }"#)
        .unwrap();
    run(&lib, two_streams(3).source().unwrap(), MediaSink::path(&out), &config).unwrap();

    let demuxer = Demuxer::open(&lib, MediaSource::path(&out)).unwrap();
    assert_eq!(demuxer.streams().len(), 1);
    assert_eq!(
        demuxer.streams()[0].codec.extradata.as_deref(),
        Some(&b"SYNTH:mpeg4"[..])
    );
}

#[test]
fn missing_source_is_resource_unavailable() {
    let lib = SyntheticLibrary::new();
    let dir = tempfile::tempdir().unwrap();
    let err = run(
        &lib,
        MediaSource::path(dir.path().join("missing.synth")),
        MediaSink::path(dir.path().join("out.synth")),
        &PipelineConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    assert!(!dir.path().join("out.synth").exists());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_run_finalizes_once(
        packets in 0usize..12,
        video in prop::sample::select(vec![CodecId::RawVideo, CodecId::Mpeg4]),
        audio in prop::sample::select(vec![CodecId::PcmS16Le, CodecId::Aac]),
        copy_audio in any::<bool>(),
    ) {
        let lib = SyntheticLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::new()
            .video(video, 4, 4, 25)
            .audio(audio, 8000, ChannelLayout::Mono, 16)
            .packets_per_stream(packets);
        let mut config = PipelineConfig::new();
        if copy_audio {
            config = config.with_action(1, StreamAction::Copy);
        }
        let report = run(
            &lib,
            fixture.source().unwrap(),
            MediaSink::path(dir.path().join("out.synth")),
            &config,
        )
        .unwrap();

        prop_assert_eq!(report.packets_in(), 2 * packets as u64);
        prop_assert_eq!(report.stream(0).unwrap().packets_out, packets as u64);
        prop_assert_eq!(report.stream(1).unwrap().packets_out, packets as u64);
        let ledger = lib.ledger();
        prop_assert_eq!(ledger.trailers_written, 1);
        prop_assert!(ledger.is_balanced());
    }
}
