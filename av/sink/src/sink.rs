/*!
    Media sink implementation.
*/

use std::fmt;

use av_core::{MediaSink, NativeLibrary, OutputContext, OutputFormat, Packet};
use av_types::{Error, Result, StreamDescriptor};

/**
    Muxer writing packets into an output container.

    The header is written when the muxer opens; the trailer is written by
    [`Muxer::finalize`], which consumes the muxer so it can only happen once.
    The output may be unreadable if `finalize` is never called.
*/
pub struct Muxer<L: NativeLibrary> {
    output: OutputContext<L>,
    description: String,
    /// Last decode timestamp written per stream, in the stream's time base.
    last_ts: Vec<Option<i64>>,
    packets_written: Vec<u64>,
    finalized: bool,
}

impl<L: NativeLibrary> Muxer<L> {
    /**
        Open `sink` with one output stream per descriptor and write the header.

        Output stream `i` is described by `streams[i]`. Fails with
        `UnsupportedFormat` if no muxer matches the sink or the container
        cannot hold one of the codecs.
    */
    pub fn open(lib: &L, sink: MediaSink, streams: &[StreamDescriptor]) -> Result<Self> {
        let description = sink.describe();
        let mut output = OutputContext::open(lib, sink).map_err(|e| e.within(&description))?;
        for stream in streams {
            output
                .add_stream(stream)
                .map_err(|e| e.within(&description))?;
        }
        output
            .write_header()
            .map_err(|e| e.within(&description))?;

        tracing::info!(
            sink = %description,
            format = %output.format().name,
            streams = streams.len(),
            "Opened media sink"
        );
        Ok(Self {
            output,
            description,
            last_ts: vec![None; streams.len()],
            packets_written: vec![0; streams.len()],
            finalized: false,
        })
    }

    pub fn format(&self) -> &OutputFormat {
        self.output.format()
    }

    /**
        Output streams, with the time bases the container settled on.
    */
    pub fn streams(&self) -> &[StreamDescriptor] {
        self.output.streams()
    }

    /**
        Packets written to output stream `index` so far.
    */
    pub fn packets_written(&self, index: usize) -> u64 {
        self.packets_written.get(index).copied().unwrap_or(0)
    }

    /**
        Write a packet to the output stream named by its stream index.

        Timestamps are rescaled from the packet's time base into the output
        stream's. Fails with `InvalidArgument` for an unknown stream index, a
        packet without a time base, or a timestamp lower than the previous one
        on the same stream.
    */
    pub fn write_packet(&mut self, mut packet: Packet<L>) -> Result<()> {
        let index = packet.stream_index();
        let time_base = self.output.stream_time_base(index).ok_or_else(|| {
            Error::invalid_argument(format!("write_packet: no output stream {index}"))
        })?;
        if !packet.time_base().is_valid() {
            return Err(Error::invalid_argument("write_packet: packet has no time base"));
        }
        packet.rescale_ts(time_base);

        let ts = packet.dts().or(packet.pts());
        if let (Some(ts), Some(last)) = (ts, self.last_ts[index]) {
            if ts < last {
                return Err(Error::invalid_argument(format!(
                    "write_packet: timestamp {ts} after {last} on stream {index}"
                )));
            }
        }

        self.output.write_packet(&mut packet)?;
        if ts.is_some() {
            self.last_ts[index] = ts;
        }
        self.packets_written[index] += 1;
        tracing::trace!(stream = index, ts = ?ts, "Wrote packet");
        Ok(())
    }

    /**
        Write the trailer and close the container.

        This writes any trailing metadata (duration, seeking index) and
        finalizes the container.
    */
    pub fn finalize(mut self) -> Result<()> {
        self.finalized = true;
        self.output
            .write_trailer()
            .map_err(|e| e.within(&self.description))?;
        tracing::info!(
            sink = %self.description,
            packets = self.packets_written.iter().sum::<u64>(),
            "Finalized media sink"
        );
        Ok(())
    }
}

impl<L: NativeLibrary> Drop for Muxer<L> {
    fn drop(&mut self) {
        if !self.finalized {
            tracing::warn!(
                sink = %self.description,
                "Muxer dropped without finalize, output has no trailer"
            );
        }
    }
}

impl<L: NativeLibrary> fmt::Debug for Muxer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Muxer")
            .field("sink", &self.description)
            .field("format", &self.format().name)
            .field("packets_written", &self.packets_written)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

/**
    The container format `sink` would be written in, and whether encoders
    feeding it must emit global headers. Nothing is opened.
*/
pub fn output_format<L: NativeLibrary>(lib: &L, sink: &MediaSink) -> Result<OutputFormat> {
    lib.output_format(sink)
        .map_err(|code| Error::from_code(code, "output_format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_synthetic::{Fixture, Resource, SyntheticLibrary};
    use av_types::{ChannelLayout, CodecId, ErrorKind, Rational};

    fn fixture() -> Fixture {
        Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .audio(CodecId::PcmS16Le, 8000, ChannelLayout::Mono, 80)
    }

    fn packet(lib: &SyntheticLibrary, stream: usize, pts: i64, tb: Rational) -> Packet<SyntheticLibrary> {
        let mut packet = Packet::from_bytes(lib, b"data").unwrap();
        packet.set_stream_index(stream);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        packet.set_duration(1);
        packet.set_time_base(tb);
        packet
    }

    #[test]
    fn packets_are_rescaled_into_the_output_time_base() {
        let lib = SyntheticLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let sink = MediaSink::path(dir.path().join("out.synthm"));
        let mut muxer = Muxer::open(&lib, sink, fixture().streams()).unwrap();
        assert_eq!(muxer.streams()[0].time_base, Rational::new(1, 1000));

        muxer
            .write_packet(packet(&lib, 0, 3, Rational::new(1, 25)))
            .unwrap();
        // 120 ms is before 3/25 s, so it is rejected once rescaled.
        let err = muxer
            .write_packet(packet(&lib, 0, 119, Rational::new(1, 1000)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        muxer
            .write_packet(packet(&lib, 0, 120, Rational::new(1, 1000)))
            .unwrap();
        assert_eq!(muxer.packets_written(0), 2);
        muxer.finalize().unwrap();
        assert_eq!(lib.ledger().trailers_written, 1);
    }

    #[test]
    fn unknown_stream_index_is_rejected() {
        let lib = SyntheticLibrary::new();
        let sink = MediaSink::stream(Vec::new(), "synth");
        let mut muxer = Muxer::open(&lib, sink, fixture().streams()).unwrap();
        let err = muxer
            .write_packet(packet(&lib, 2, 0, Rational::new(1, 25)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(muxer.packets_written(2), 0);
        muxer.finalize().unwrap();
    }

    #[test]
    fn packets_without_time_base_are_rejected() {
        let lib = SyntheticLibrary::new();
        let sink = MediaSink::stream(Vec::new(), "synth");
        let mut muxer = Muxer::open(&lib, sink, fixture().streams()).unwrap();
        let mut bare = Packet::from_bytes(&lib, b"data").unwrap();
        bare.set_pts(Some(3));
        let err = muxer.write_packet(bare).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.context(), "write_packet: packet has no time base");
        assert_eq!(muxer.packets_written(0), 0);
        muxer.finalize().unwrap();
    }

    #[test]
    fn streams_are_independent() {
        let lib = SyntheticLibrary::new();
        let sink = MediaSink::stream(Vec::new(), "synth");
        let mut muxer = Muxer::open(&lib, sink, fixture().streams()).unwrap();
        muxer.write_packet(packet(&lib, 0, 10, Rational::new(1, 25))).unwrap();
        muxer.write_packet(packet(&lib, 1, 0, Rational::new(1, 8000))).unwrap();
        assert_eq!(muxer.packets_written(0), 1);
        assert_eq!(muxer.packets_written(1), 1);
        muxer.finalize().unwrap();
    }

    #[test]
    fn unfinalized_muxer_still_releases_the_output() {
        let lib = SyntheticLibrary::new();
        let sink = MediaSink::stream(Vec::new(), "synth");
        let muxer = Muxer::open(&lib, sink, fixture().streams()).unwrap();
        drop(muxer);
        let ledger = lib.ledger();
        assert_eq!(ledger.trailers_written, 0);
        assert_eq!(ledger.live(Resource::Output), 0);
    }

    #[test]
    fn unsupported_sinks() {
        let lib = SyntheticLibrary::new();
        let err = Muxer::open(&lib, MediaSink::path("out.mp4"), fixture().streams()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let sink = MediaSink::stream(Vec::new(), "synth-video");
        let err = Muxer::open(&lib, sink, fixture().streams()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(lib.ledger().is_balanced());
    }

    #[test]
    fn output_format_reports_global_header() {
        let lib = SyntheticLibrary::new();
        let format = output_format(&lib, &MediaSink::path("a.synthm")).unwrap();
        assert_eq!(format.name, "synth-ms");
        assert!(format.global_header);
        let format = output_format(&lib, &MediaSink::path_with_format("a.bin", "synth")).unwrap();
        assert!(!format.global_header);
    }
}
