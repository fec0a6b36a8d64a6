/*!
    Media source implementation.
*/

use std::fmt;
use std::time::Duration;

use av_core::{InputContext, MediaSource, NativeLibrary, Packet};
use av_types::{Error, MediaInfo, MediaKind, Result, StreamDescriptor};

/**
    Configuration for opening a media source.
*/
#[derive(Clone, Debug, Default)]
pub struct SourceConfig {
    /// Filter which streams to demux (None = all streams).
    pub stream_filter: Option<StreamFilter>,
}

impl SourceConfig {
    pub fn with_stream_filter(mut self, filter: StreamFilter) -> Self {
        self.stream_filter = Some(filter);
        self
    }
}

/**
    Filter for selecting which streams to demux.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamFilter {
    /// Only demux video streams.
    VideoOnly,
    /// Only demux audio streams.
    AudioOnly,
    /// Demux video and audio streams, skip everything else.
    #[default]
    Both,
}

impl StreamFilter {
    fn wants(self, kind: MediaKind) -> bool {
        match self {
            Self::VideoOnly => kind == MediaKind::Video,
            Self::AudioOnly => kind == MediaKind::Audio,
            Self::Both => matches!(kind, MediaKind::Video | MediaKind::Audio),
        }
    }
}

/**
    Where a demuxer is in its life.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemuxState {
    /// Opened, nothing read yet.
    Opened,
    /// At least one packet has been read.
    Reading,
    /// The container is exhausted; every read returns `EndOfStream`.
    Drained,
}

/**
    A media source that produces compressed packets.

    Created by [`open`] or [`Demuxer::open`]. Packets come out in container
    order, interleaved between streams, each stamped with its stream's time
    base. Dropping the demuxer closes the container.
*/
pub struct Demuxer<L: NativeLibrary> {
    input: InputContext<L>,
    config: SourceConfig,
    state: DemuxState,
    packets_read: u64,
}

impl<L: NativeLibrary> Demuxer<L> {
    /**
        Open a container, demuxing every stream.

        Fails with `UnsupportedFormat` if no container format matches and
        `ResourceUnavailable` if the source cannot be read.

        # Example

        ```ignore
        let demuxer = Demuxer::open(&lib, MediaSource::path("video.mp4"))?;
        println!("Duration: {:?}", demuxer.duration());
        ```
    */
    pub fn open(lib: &L, source: MediaSource) -> Result<Self> {
        Self::open_with_config(lib, source, SourceConfig::default())
    }

    /**
        Open a container with the given configuration.
    */
    pub fn open_with_config(lib: &L, source: MediaSource, config: SourceConfig) -> Result<Self> {
        let description = source.describe();
        let input = InputContext::open(lib, source).map_err(|e| e.within(&description))?;
        tracing::info!(
            source = %description,
            format = input.format_name(),
            streams = input.streams().len(),
            library = lib.name(),
            "Opened media source"
        );
        Ok(Self {
            input,
            config,
            state: DemuxState::Opened,
            packets_read: 0,
        })
    }

    pub fn format_name(&self) -> &str {
        self.input.format_name()
    }

    /**
        Every stream in the container, in container order.
    */
    pub fn streams(&self) -> &[StreamDescriptor] {
        self.input.streams()
    }

    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.input.stream(index)
    }

    /**
        The stream the native library picks for `kind`, if there is one.
    */
    pub fn best_stream(&self, kind: MediaKind) -> Option<usize> {
        self.input.best_stream(kind)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.input.duration()
    }

    /**
        Get the media info for this source.
    */
    pub fn media_info(&self) -> MediaInfo {
        MediaInfo {
            format_name: self.format_name().to_string(),
            duration: self.duration(),
            streams: self.streams().to_vec(),
        }
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    /**
        Number of packets handed out so far.
    */
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    fn wants(&self, packet: &Packet<L>) -> bool {
        let Some(filter) = self.config.stream_filter else {
            return true;
        };
        self.stream(packet.stream_index())
            .is_some_and(|s| filter.wants(s.kind))
    }

    /**
        Read the next packet.

        Returns an `EndOfStream` error once the container is exhausted, and
        on every call after that until [`Demuxer::seek`]. Packets of streams
        excluded by the [`StreamFilter`] are skipped.
    */
    pub fn read_packet(&mut self) -> Result<Packet<L>> {
        if self.state == DemuxState::Drained {
            return Err(Error::end_of_stream("read_packet"));
        }
        loop {
            match self.input.read_packet() {
                Ok(packet) => {
                    if !self.wants(&packet) {
                        continue;
                    }
                    self.state = DemuxState::Reading;
                    self.packets_read += 1;
                    tracing::trace!(
                        stream = packet.stream_index(),
                        pts = ?packet.pts(),
                        size = packet.len(),
                        "Read packet"
                    );
                    return Ok(packet);
                }
                Err(e) if e.is_end_of_stream() => {
                    tracing::debug!(packets = self.packets_read, "Media source drained");
                    self.state = DemuxState::Drained;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /**
        Seek to a position in the media.

        Seeks to the nearest keyframe at or before the target position, so the
        next packet may start earlier than requested. Decoders fed from this
        source should be reset afterwards.
    */
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        self.input.seek(position)?;
        tracing::debug!(?position, "Seeked media source");
        self.state = DemuxState::Reading;
        Ok(())
    }

    /**
        Close the container. Equivalent to dropping the demuxer.
    */
    pub fn close(self) {
        tracing::debug!(
            format = self.format_name(),
            packets = self.packets_read,
            "Closing media source"
        );
    }
}

/**
    Iterator adapter yielding packets until the end of the container.
*/
impl<L: NativeLibrary> Iterator for Demuxer<L> {
    type Item = Result<Packet<L>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_packet() {
            Ok(packet) => Some(Ok(packet)),
            Err(e) if e.is_end_of_stream() => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<L: NativeLibrary> fmt::Debug for Demuxer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demuxer")
            .field("format", &self.format_name())
            .field("streams", &self.streams().len())
            .field("state", &self.state)
            .field("packets_read", &self.packets_read)
            .finish_non_exhaustive()
    }
}

/**
    Open a container and return the demuxer with its stream list.
*/
pub fn open<L: NativeLibrary>(
    lib: &L,
    source: MediaSource,
) -> Result<(Demuxer<L>, Vec<StreamDescriptor>)> {
    let demuxer = Demuxer::open(lib, source)?;
    let streams = demuxer.streams().to_vec();
    Ok((demuxer, streams))
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_synthetic::{Fixture, SyntheticLibrary};
    use av_types::{ChannelLayout, CodecId, Rational};

    fn fixture() -> Fixture {
        Fixture::new()
            .video(CodecId::RawVideo, 4, 4, 25)
            .audio(CodecId::PcmS16Le, 8000, ChannelLayout::Mono, 80)
            .data_stream(CodecId::Subrip, Rational::new(1, 1000))
            .packets_per_stream(4)
    }

    #[test]
    fn states_follow_reads() {
        let lib = SyntheticLibrary::new();
        let mut demuxer = Demuxer::open(&lib, fixture().source().unwrap()).unwrap();
        assert_eq!(demuxer.state(), DemuxState::Opened);
        demuxer.read_packet().unwrap();
        assert_eq!(demuxer.state(), DemuxState::Reading);

        while demuxer.read_packet().is_ok() {}
        assert_eq!(demuxer.state(), DemuxState::Drained);
        assert_eq!(demuxer.packets_read(), 12);
        assert!(demuxer.read_packet().unwrap_err().is_end_of_stream());

        demuxer.seek(Duration::ZERO).unwrap();
        assert_eq!(demuxer.state(), DemuxState::Reading);
        assert!(demuxer.read_packet().is_ok());
    }

    #[test]
    fn stream_filter_skips_packets() {
        let lib = SyntheticLibrary::new();
        let config = SourceConfig::default().with_stream_filter(StreamFilter::Both);
        let demuxer =
            Demuxer::open_with_config(&lib, fixture().source().unwrap(), config).unwrap();
        let kinds: Vec<_> = demuxer
            .map(|p| p.unwrap().stream_index())
            .collect();
        assert_eq!(kinds.len(), 8);
        assert!(!kinds.contains(&2));

        let config = SourceConfig::default().with_stream_filter(StreamFilter::AudioOnly);
        let demuxer =
            Demuxer::open_with_config(&lib, fixture().source().unwrap(), config).unwrap();
        assert!(demuxer.map(|p| p.unwrap().stream_index()).all(|i| i == 1));
    }

    #[test]
    fn media_info_describes_every_stream() {
        let lib = SyntheticLibrary::new();
        let (demuxer, streams) = open(&lib, fixture().source().unwrap()).unwrap();
        let info = demuxer.media_info();
        assert_eq!(info.streams, streams);
        assert_eq!(info.format_name, "synth");
        assert!(info.has_video() && info.has_audio());
        assert_eq!(demuxer.best_stream(MediaKind::Subtitle), Some(2));
        assert_eq!(info.duration, Some(Duration::from_millis(160)));
        demuxer.close();
        assert!(lib.ledger().is_balanced());
    }
}
