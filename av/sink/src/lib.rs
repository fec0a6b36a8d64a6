/*!
    Media output and muxing for the av crate ecosystem.

    This crate handles the output side of the media pipeline. It takes
    compressed packets, from an encoder or straight from a demuxer, and writes
    them into a container, either a file whose format is guessed from the
    extension or any writer with an explicit format name.

    ```ignore
    let mut muxer = Muxer::open(&lib, MediaSink::path("out.mkv"), &streams)?;
    while let Ok(packet) = demuxer.read_packet() {
        muxer.write_packet(packet)?;
    }
    muxer.finalize()?;
    ```
*/

mod sink;

pub use av_core::{MediaSink, OutputFormat};
pub use sink::{Muxer, output_format};
