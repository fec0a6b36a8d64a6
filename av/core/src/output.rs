/*!
    Muxing container context.
*/

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use av_types::{Error, Rational, Result, StreamDescriptor, check};

use crate::io::MediaSink;
use crate::native::{NativeLibrary, OutputFormat};
use crate::packet::Packet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Setup,
    Writing,
    Finished,
}

/**
    An output container being written.

    Streams are added while in setup, then the header is written once, then
    packets, then the trailer once. Calls out of that order fail with
    `InvalidArgument` without reaching the native library.
*/
pub struct OutputContext<L: NativeLibrary> {
    lib: L,
    raw: L::Output,
    format: OutputFormat,
    streams: Vec<StreamDescriptor>,
    phase: Phase,
    _not_sync: PhantomData<Cell<()>>,
}

impl<L: NativeLibrary> OutputContext<L> {
    pub fn open(lib: &L, sink: MediaSink) -> Result<Self> {
        let format = lib
            .output_format(&sink)
            .map_err(|code| Error::from_code(code, "output_format"))?;
        let raw = lib
            .open_output(sink)
            .map_err(|code| Error::from_code(code, "open_output"))?;
        Ok(Self {
            lib: lib.clone(),
            raw,
            format,
            streams: Vec::new(),
            phase: Phase::Setup,
            _not_sync: PhantomData,
        })
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /**
        Streams added so far, with the time bases the muxer chose once the
        header is written.
    */
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /**
        Add an output stream described by `stream`; returns its index.

        Fails with `UnsupportedFormat` if the container cannot hold the codec.
    */
    pub fn add_stream(&mut self, stream: &StreamDescriptor) -> Result<usize> {
        if self.phase != Phase::Setup {
            return Err(Error::invalid_argument("add_stream after write_header"));
        }
        let codec = stream.codec_id();
        if check(
            self.lib.output_query_codec(&self.raw, codec),
            "output_query_codec",
        )? == 0
        {
            return Err(Error::unsupported_format(format!(
                "{} cannot store {codec}",
                self.format.name
            )));
        }
        let index = check(
            self.lib.output_new_stream(&mut self.raw, stream),
            "output_new_stream",
        )? as usize;

        let mut added = stream.clone();
        added.index = index;
        self.streams.push(added);
        Ok(index)
    }

    pub fn write_header(&mut self) -> Result<()> {
        if self.phase != Phase::Setup {
            return Err(Error::invalid_argument("header already written"));
        }
        check(self.lib.write_header(&mut self.raw), "write_header")?;
        for stream in &mut self.streams {
            if let Some(tb) = self.lib.output_stream_time_base(&self.raw, stream.index) {
                stream.time_base = tb;
            }
        }
        self.phase = Phase::Writing;
        Ok(())
    }

    pub fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.streams.get(index).map(|s| s.time_base)
    }

    /**
        Write a packet whose timestamps are already in the output stream's
        time base. The packet is left blank.
    */
    pub fn write_packet(&mut self, packet: &mut Packet<L>) -> Result<()> {
        if self.phase != Phase::Writing {
            return Err(Error::invalid_argument("write_packet outside header/trailer"));
        }
        if packet.stream_index() >= self.streams.len() {
            return Err(Error::invalid_argument(format!(
                "no output stream {}",
                packet.stream_index()
            )));
        }
        check(
            self.lib.write_packet(&mut self.raw, packet.raw_mut()),
            "write_packet",
        )?;
        Ok(())
    }

    pub fn write_trailer(&mut self) -> Result<()> {
        if self.phase != Phase::Writing {
            return Err(Error::invalid_argument("write_trailer without header"));
        }
        self.phase = Phase::Finished;
        check(self.lib.write_trailer(&mut self.raw), "write_trailer")?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

impl<L: NativeLibrary> Drop for OutputContext<L> {
    fn drop(&mut self) {
        self.lib.close_output(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for OutputContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputContext")
            .field("format", &self.format)
            .field("streams", &self.streams)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
