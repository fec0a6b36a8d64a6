/*!
    Bitstream parser for the synthetic codecs.

    Packet payloads are self-delimiting (see [`crate::payload`]), so the
    parser only has to find where one ends. Like real parsers it holds a
    complete packet back until the first byte of the next one arrives, and
    emits at most one packet per call.
*/

use av_core::PacketProps;
use av_types::{CodecId, code};

use crate::codec::CodecKind;
use crate::payload;

/**
    Raw parser object.
*/
#[derive(Debug)]
pub struct SynthParser {
    pub(crate) id: u64,
    pub(crate) freed: bool,
    codec: CodecId,
    buffer: Vec<u8>,
}

/**
    A packet cut out of the byte stream.
*/
#[derive(Debug)]
pub struct ParsedPacket {
    pub data: Vec<u8>,
    pub props: PacketProps,
}

impl SynthParser {
    pub(crate) fn new(id: u64, codec: CodecId) -> Result<Self, i32> {
        CodecKind::for_codec(codec).ok_or(code::ENOSYS)?;
        Ok(Self {
            id,
            freed: false,
            codec,
            buffer: Vec::new(),
        })
    }

    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /**
        Consume bytes from `input` and return how many were taken, with the
        packet they completed. Empty `input` flushes one buffered packet.
    */
    pub(crate) fn parse(&mut self, input: &[u8]) -> Result<(usize, Option<ParsedPacket>), i32> {
        if input.is_empty() {
            return self.flush();
        }
        let complete = self.complete_len()?;
        let wanted = match complete {
            // A complete packet is released by the first byte after it.
            Some(len) => len + 1 - self.buffer.len().min(len + 1),
            None => input.len(),
        };
        let taken = wanted.clamp(1, input.len());
        self.buffer.extend_from_slice(&input[..taken]);
        match self.complete_len()? {
            Some(len) if self.buffer.len() > len => Ok((taken, Some(self.split(len)))),
            _ => Ok((taken, None)),
        }
    }

    fn flush(&mut self) -> Result<(usize, Option<ParsedPacket>), i32> {
        if self.buffer.is_empty() {
            return Ok((0, None));
        }
        match self.complete_len()? {
            Some(len) => Ok((0, Some(self.split(len)))),
            None => {
                tracing::debug!(
                    id = self.id,
                    bytes = self.buffer.len(),
                    "Truncated packet at end of stream"
                );
                self.buffer.clear();
                Err(code::INVALIDDATA)
            }
        }
    }

    fn complete_len(&self) -> Result<Option<usize>, i32> {
        payload::packet_len(&self.buffer).map_err(|_| code::INVALIDDATA)
    }

    fn split(&mut self, len: usize) -> ParsedPacket {
        let rest = self.buffer.split_off(len);
        let data = std::mem::replace(&mut self.buffer, rest);
        let key = payload::decode(&data)
            .map(|frames| frames.first().is_some_and(|f| f.key))
            .unwrap_or(false);
        ParsedPacket {
            data,
            props: PacketProps {
                key,
                ..PacketProps::default()
            },
        }
    }
}
