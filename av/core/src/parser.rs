/*!
    Bitstream parser context.
*/

use std::fmt;

use av_types::{CodecId, Error, Result};

use crate::native::NativeLibrary;
use crate::packet::Packet;

/**
    Splits an unframed elementary stream into packets.

    Bytes go in as they arrive; the parser decides where packets end and may
    hold back the last one until it sees the start of the next. An empty
    input flushes whatever is buffered.
*/
pub struct ParserContext<L: NativeLibrary> {
    lib: L,
    raw: L::Parser,
    codec: CodecId,
}

impl<L: NativeLibrary> ParserContext<L> {
    /**
        Create a parser for `codec`.

        Fails with `UnsupportedFormat` if the library has no parser for it.
    */
    pub fn open(lib: &L, codec: CodecId) -> Result<Self> {
        let raw = lib
            .parser_init(codec)
            .map_err(|code| Error::from_code(code, "parser_init").within(codec.name()))?;
        Ok(Self {
            lib: lib.clone(),
            raw,
            codec,
        })
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /**
        Feed `input` and return the number of bytes consumed together with
        the packet completed by them, if any.

        The caller passes the unconsumed remainder on the next call. The
        packet has no time base; an empty `input` flushes.
    */
    pub fn parse(&mut self, input: &[u8]) -> Result<(usize, Option<Packet<L>>)> {
        let mut packet = Packet::new(&self.lib)?;
        let ret = self
            .lib
            .parser_parse(&mut self.raw, input, packet.raw_mut());
        if ret < 0 {
            return Err(Error::from_code(ret, "parser_parse"));
        }
        let consumed = (ret as usize).min(input.len());
        let packet = (!packet.is_empty()).then_some(packet);
        Ok((consumed, packet))
    }
}

impl<L: NativeLibrary> Drop for ParserContext<L> {
    fn drop(&mut self) {
        self.lib.parser_close(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for ParserContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserContext")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
