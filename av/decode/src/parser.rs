/*!
    Splitting raw elementary streams into packets.
*/

use std::fmt;

use av_core::{NativeLibrary, Packet, ParserContext};
use av_types::{Error, Rational, Result, StreamDescriptor};

/**
    Packet parser for one stream.

    Feeds arbitrary chunks of an elementary stream (read from a file or a
    socket without a container) and returns the packets they complete,
    stamped with the stream's index and time base so they go straight into a
    [`crate::Decoder`].
*/
pub struct Parser<L: NativeLibrary> {
    ctx: ParserContext<L>,
    stream_index: usize,
    time_base: Rational,
    flushed: bool,
    packets: u64,
}

impl<L: NativeLibrary> Parser<L> {
    /**
        Open a parser for the codec of `stream`.

        Fails with `UnsupportedFormat` if the codec has no parser.
    */
    pub fn open(lib: &L, stream: &StreamDescriptor) -> Result<Self> {
        let ctx = ParserContext::open(lib, stream.codec_id())
            .map_err(|e| e.within(&format!("parser for stream {}", stream.index)))?;
        tracing::debug!(stream = stream.index, codec = %stream.codec_id(), "Opened parser");
        Ok(Self {
            ctx,
            stream_index: stream.index,
            time_base: stream.time_base,
            flushed: false,
            packets: 0,
        })
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn packets_parsed(&self) -> u64 {
        self.packets
    }

    /**
        Parse a chunk of the stream, returning the packets it completed.

        Bytes of an incomplete packet are kept until a later chunk or
        [`Parser::flush`]. Fails with `InvalidArgument` after a flush.
    */
    pub fn parse(&mut self, mut data: &[u8]) -> Result<Vec<Packet<L>>> {
        if self.flushed {
            return Err(Error::invalid_argument("parse after flush"));
        }
        let mut packets = Vec::new();
        while !data.is_empty() {
            let (used, packet) = self.ctx.parse(data)?;
            let Some(packet) = packet else {
                if used == 0 {
                    return Err(Error::invalid_argument("parser made no progress"));
                }
                data = &data[used..];
                continue;
            };
            data = &data[used..];
            packets.push(self.stamp(packet));
        }
        Ok(packets)
    }

    /**
        Signal the end of the stream and return the packets still buffered.

        A trailing incomplete packet fails with `UnsupportedFormat`. Calling it
        again returns nothing.
    */
    pub fn flush(&mut self) -> Result<Vec<Packet<L>>> {
        if self.flushed {
            return Ok(Vec::new());
        }
        self.flushed = true;
        let mut packets = Vec::new();
        while let (_, Some(packet)) = self.ctx.parse(&[])? {
            packets.push(self.stamp(packet));
        }
        tracing::debug!(
            stream = self.stream_index,
            packets = self.packets,
            "Parser flushed"
        );
        Ok(packets)
    }

    fn stamp(&mut self, mut packet: Packet<L>) -> Packet<L> {
        packet.set_stream_index(self.stream_index);
        packet.set_time_base(self.time_base);
        self.packets += 1;
        packet
    }
}

impl<L: NativeLibrary> fmt::Debug for Parser<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("codec", &self.ctx.codec())
            .field("stream_index", &self.stream_index)
            .field("flushed", &self.flushed)
            .field("packets", &self.packets)
            .finish()
    }
}
