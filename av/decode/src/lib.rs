/*!
    Media decoding for the av crate ecosystem.

    This crate transforms compressed packets into raw frames. A [`Decoder`]
    wraps one opened decoder context and runs the native send/receive
    protocol: packets go in, frames come out, `NeedMoreInput` means the other
    side has to move first, and after [`Decoder::flush`] the remaining frames
    drain out until `EndOfStream`.

    ```ignore
    let mut decoder = Decoder::open(&lib, &streams[0])?;
    for packet in &mut demuxer {
        let packet = packet?;
        if packet.stream_index() == 0 {
            for frame in decoder.decode(&packet)? {
                // ...
            }
        }
    }
    for frame in decoder.drain()? {
        // frames the codec was still holding
    }
    ```

    Elementary streams without a container go through a [`Parser`] first,
    which cuts the byte stream into packets for the decoder.
*/

mod config;
mod decoder;
mod parser;

pub use config::DecoderConfig;
pub use decoder::{DecodeState, Decoder};
pub use parser::Parser;
