/*!
    The demux, decode, encode and mux loop.
*/

use std::collections::BTreeMap;
use std::fmt;

use av_core::{Frame, MediaSink, MediaSource, NativeLibrary, Packet};
use av_decode::Decoder;
use av_encode::Encoder;
use av_sink::{Muxer, output_format};
use av_source::Demuxer;
use av_types::{Error, Result};

use crate::config::{PipelineConfig, StreamAction};
use crate::report::{PipelineReport, StreamReport};
use crate::transform::FrameTransform;

/**
    Decoder, encoder and optional transform for one transcoded stream.
*/
struct Transcoder<L: NativeLibrary> {
    output: usize,
    decoder: Decoder<L>,
    encoder: Encoder<L>,
    transform: Option<Box<dyn FrameTransform<L>>>,
}

impl<L: NativeLibrary> Transcoder<L> {
    fn encode_frames(
        &mut self,
        frames: Vec<Frame<L>>,
        muxer: &mut Muxer<L>,
        stats: &mut StreamReport,
    ) -> Result<()> {
        for frame in frames {
            stats.frames_decoded += 1;
            let frames = match &mut self.transform {
                Some(transform) => transform.transform(frame)?,
                None => vec![frame],
            };
            self.encode(frames, muxer, stats)?;
        }
        Ok(())
    }

    fn encode(
        &mut self,
        frames: Vec<Frame<L>>,
        muxer: &mut Muxer<L>,
        stats: &mut StreamReport,
    ) -> Result<()> {
        for mut frame in frames {
            frame.rescale_ts(self.encoder.time_base());
            let packets = self.encoder.encode(&frame)?;
            stats.frames_encoded += 1;
            write_packets(packets, self.output, muxer, stats)?;
        }
        Ok(())
    }

    /**
        Flush the decoder through the transform to the encoder, then flush
        the encoder.
    */
    fn finish(&mut self, muxer: &mut Muxer<L>, stats: &mut StreamReport) -> Result<()> {
        let frames = self.decoder.drain()?;
        self.encode_frames(frames, muxer, stats)?;
        if let Some(transform) = &mut self.transform {
            let held = transform.finish()?;
            self.encode(held, muxer, stats)?;
        }
        let packets = self.encoder.drain()?;
        write_packets(packets, self.output, muxer, stats)
    }
}

enum Route<L: NativeLibrary> {
    Drop,
    Copy { output: usize },
    Transcode(Box<Transcoder<L>>),
}

impl<L: NativeLibrary> Route<L> {
    fn output(&self) -> Option<usize> {
        match self {
            Self::Drop => None,
            Self::Copy { output } => Some(*output),
            Self::Transcode(transcoder) => Some(transcoder.output),
        }
    }
}

fn write_packets<L: NativeLibrary>(
    packets: Vec<Packet<L>>,
    output: usize,
    muxer: &mut Muxer<L>,
    stats: &mut StreamReport,
) -> Result<()> {
    for mut packet in packets {
        packet.set_stream_index(output);
        muxer.write_packet(packet)?;
        stats.packets_out += 1;
    }
    Ok(())
}

/**
    A configured demux to mux run.

    Output streams are numbered in input order, skipping dropped streams.
    Transcoded streams are re-encoded with the parameters of the frames their
    transform produces (the input stream's own without one) unless the
    configuration overrides them.
*/
pub struct Pipeline<L: NativeLibrary> {
    lib: L,
    config: PipelineConfig,
    transforms: BTreeMap<usize, Box<dyn FrameTransform<L>>>,
}

impl<L: NativeLibrary> Pipeline<L> {
    pub fn new(lib: &L, config: PipelineConfig) -> Self {
        Self {
            lib: lib.clone(),
            config,
            transforms: BTreeMap::new(),
        }
    }

    /**
        Apply `transform` to every decoded frame of input stream `index`.

        The stream must be transcoded. A later call for the same stream
        replaces the earlier transform.
    */
    pub fn transform(mut self, index: usize, transform: impl FrameTransform<L> + 'static) -> Self {
        self.transforms.insert(index, Box::new(transform));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /**
        Run the pipeline to completion.

        Fails with `InvalidArgument` before anything is written if the
        configuration names streams the source does not have, a transform is
        set on a stream that is not transcoded, or no stream would be written.
        Any other error is the one raised by the failing stage; the output is
        left without a trailer.
    */
    pub fn run(mut self, source: MediaSource, sink: MediaSink) -> Result<PipelineReport> {
        let source_name = source.describe();
        let sink_name = sink.describe();
        let mut demuxer = Demuxer::open(&self.lib, source)?;
        let format = output_format(&self.lib, &sink)?;
        let streams = demuxer.streams().to_vec();

        if let Some(index) = self.config.streams.keys().find(|&&i| i >= streams.len()) {
            return Err(Error::invalid_argument(format!(
                "configuration for stream {index}, source has {}",
                streams.len()
            )));
        }

        let mut routes = Vec::with_capacity(streams.len());
        let mut outputs = Vec::new();
        let mut report = PipelineReport::default();
        for stream in &streams {
            let action = self.config.action_for(stream);
            let route = match action {
                StreamAction::Drop => Route::Drop,
                StreamAction::Copy => {
                    outputs.push(stream.clone());
                    Route::Copy {
                        output: outputs.len() - 1,
                    }
                }
                StreamAction::Transcode => {
                    let decoder = Decoder::open(&self.lib, stream)?;
                    let transform = self.transforms.remove(&stream.index);
                    let mut encoded = stream.clone();
                    if let Some(transform) = &transform {
                        encoded.codec = transform.output_parameters(&stream.codec);
                    }
                    let config = self
                        .config
                        .encoder_for(&encoded)
                        .with_global_header(format.global_header);
                    let encoder = Encoder::open(&self.lib, config)?;
                    let output = outputs.len();
                    outputs.push(encoder.output_stream(output));
                    Route::Transcode(Box::new(Transcoder {
                        output,
                        decoder,
                        encoder,
                        transform,
                    }))
                }
            };
            tracing::debug!(
                stream = stream.index,
                codec = %stream.codec_id(),
                action = ?action,
                output = ?route.output(),
                "Routing stream"
            );
            report
                .streams
                .push(StreamReport::new(stream.index, route.output(), action));
            routes.push(route);
        }

        if let Some(index) = self.transforms.keys().next() {
            return Err(Error::invalid_argument(format!(
                "transform set on stream {index}, which is not transcoded"
            )));
        }
        if outputs.is_empty() {
            return Err(Error::invalid_argument("every stream is dropped"));
        }

        let mut muxer = Muxer::open(&self.lib, sink, &outputs)?;
        tracing::info!(
            source = %source_name,
            sink = %sink_name,
            inputs = streams.len(),
            outputs = outputs.len(),
            "Pipeline started"
        );

        for packet in &mut demuxer {
            let mut packet = packet?;
            let index = packet.stream_index();
            let (Some(route), Some(stats)) = (routes.get_mut(index), report.streams.get_mut(index))
            else {
                return Err(Error::invalid_argument(format!(
                    "packet for unknown stream {index}"
                )));
            };
            stats.packets_in += 1;
            match route {
                Route::Drop => {}
                Route::Copy { output } => {
                    packet.set_stream_index(*output);
                    muxer.write_packet(packet)?;
                    stats.packets_out += 1;
                }
                Route::Transcode(transcoder) => {
                    let frames = transcoder.decoder.decode(&packet)?;
                    transcoder.encode_frames(frames, &mut muxer, stats)?;
                }
            }
        }

        tracing::debug!(source = %source_name, "Input exhausted, draining");
        for (route, stats) in routes.iter_mut().zip(&mut report.streams) {
            if let Route::Transcode(transcoder) = route {
                transcoder.finish(&mut muxer, stats)?;
            }
        }
        muxer.finalize()?;

        tracing::info!(
            sink = %sink_name,
            packets_in = report.packets_in(),
            packets_out = report.packets_out(),
            "Pipeline finished"
        );
        Ok(report)
    }
}

impl<L: NativeLibrary> fmt::Debug for Pipeline<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/**
    Run a pipeline without frame transforms.
*/
pub fn run<L: NativeLibrary>(
    lib: &L,
    source: MediaSource,
    sink: MediaSink,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    Pipeline::new(lib, config.clone()).run(source, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_synthetic::{Fixture, SyntheticLibrary};
    use av_types::{CodecId, ErrorKind, Rational};

    fn fixture() -> Fixture {
        Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .data_stream(CodecId::Subrip, Rational::new(1, 1000))
            .packets_per_stream(3)
    }

    #[test]
    fn configuration_for_missing_stream() {
        let lib = SyntheticLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new().with_action(5, StreamAction::Copy);
        let err = run(
            &lib,
            fixture().source().unwrap(),
            MediaSink::path(dir.path().join("out.synth")),
            &config,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(lib.ledger().is_balanced());
    }

    #[test]
    fn transform_on_dropped_stream() {
        let lib = SyntheticLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::new(&lib, PipelineConfig::new())
            .transform(1, crate::Passthrough)
            .run(
                fixture().source().unwrap(),
                MediaSink::path(dir.path().join("out.synth")),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(lib.ledger().trailers_written, 0);
        assert!(lib.ledger().is_balanced());
    }

    #[test]
    fn nothing_to_write() {
        let lib = SyntheticLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new().with_action(0, StreamAction::Drop);
        let err = run(
            &lib,
            fixture().source().unwrap(),
            MediaSink::path(dir.path().join("out.synth")),
            &config,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn debug_lists_transforms() {
        let lib = SyntheticLibrary::new();
        let pipeline = Pipeline::new(&lib, PipelineConfig::new()).transform(0, crate::Passthrough);
        let debug = format!("{pipeline:?}");
        assert!(debug.contains("transforms: [0]"));
    }
}
