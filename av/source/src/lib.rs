/*!
    Media source and demuxing for the av crate ecosystem.

    This crate handles the input side of the media pipeline. It opens a
    container from a file or any seekable stream, exposes its streams, and
    produces compressed packets in container order for downstream crates to
    decode or remux.

    ```ignore
    use av_source::Demuxer;

    let mut demuxer = Demuxer::open(&lib, MediaSource::path("clip.mp4"))?;
    for packet in &mut demuxer {
        let packet = packet?;
        println!("stream {} pts {:?}", packet.stream_index(), packet.pts());
    }
    ```
*/

mod probe;
mod source;

pub use av_core::{MediaSource, ReadSeek};
pub use probe::probe;
pub use source::{DemuxState, Demuxer, SourceConfig, StreamFilter, open};
