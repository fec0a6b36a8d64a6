/*!
    Demuxing container context.
*/

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use av_types::{Error, MediaKind, Rational, Result, StreamDescriptor, check, code};

use crate::io::MediaSource;
use crate::native::NativeLibrary;
use crate::packet::Packet;

/**
    An opened input container and its streams.

    `Send` but not `Sync`: a context is moved between threads, never shared.
*/
pub struct InputContext<L: NativeLibrary> {
    lib: L,
    raw: L::Input,
    format_name: String,
    streams: Vec<StreamDescriptor>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<L: NativeLibrary> InputContext<L> {
    /**
        Open `source` and read its stream information.
    */
    pub fn open(lib: &L, source: MediaSource) -> Result<Self> {
        let raw = lib
            .open_input(source)
            .map_err(|code| Error::from_code(code, "open_input"))?;
        let format_name = lib.input_format_name(&raw);
        let streams = lib.input_streams(&raw);
        Ok(Self {
            lib: lib.clone(),
            raw,
            format_name,
            streams,
            _not_sync: PhantomData,
        })
    }

    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.streams.get(index)
    }

    /**
        Container duration, if known.
    */
    pub fn duration(&self) -> Option<Duration> {
        self.lib
            .input_duration(&self.raw)
            .and_then(|micros| Rational::MICROS.to_duration(micros))
    }

    /**
        The stream the native library prefers for `kind`.
    */
    pub fn best_stream(&self, kind: MediaKind) -> Option<usize> {
        let index = self.lib.input_best_stream(&self.raw, kind);
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.streams.len())
    }

    /**
        Read the next packet, stamped with its stream's time base.

        Returns an `EndOfStream` error once the container is exhausted.
    */
    pub fn read_packet(&mut self) -> Result<Packet<L>> {
        let mut packet = Packet::new(&self.lib)?;
        check(
            self.lib.read_packet(&mut self.raw, packet.raw_mut()),
            "read_packet",
        )?;

        let index = packet.stream_index();
        if index >= self.streams.len() {
            // Some formats only discover streams while reading.
            self.streams = self.lib.input_streams(&self.raw);
        }
        let time_base = self
            .streams
            .get(index)
            .map(|s| s.time_base)
            .ok_or_else(|| Error::from_code(code::STREAM_NOT_FOUND, "read_packet"))?;
        packet.set_time_base(time_base);
        Ok(packet)
    }

    /**
        Seek to the keyframe at or before `position`.
    */
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let micros = Rational::MICROS.from_duration(position);
        check(self.lib.seek_input(&mut self.raw, micros), "seek_input")?;
        Ok(())
    }
}

impl<L: NativeLibrary> Drop for InputContext<L> {
    fn drop(&mut self) {
        self.lib.close_input(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for InputContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputContext")
            .field("format_name", &self.format_name)
            .field("streams", &self.streams)
            .finish_non_exhaustive()
    }
}
