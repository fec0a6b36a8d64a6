/*!
    Decoder and encoder contexts.

    A context starts [`Closed`]: parameters can be inspected but nothing can be
    sent. [`CodecContext::open`] consumes it and returns the [`Opened`] state,
    which is the only one exposing the send/receive calls.
*/

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use av_types::{CodecParameters, Error, Rational, Result, StreamDescriptor, check};

use crate::frame::Frame;
use crate::native::{CodecOptions, CodecRole, NativeLibrary};
use crate::packet::Packet;

/// Type state of a context that has not been opened.
#[derive(Debug)]
pub struct Closed;

/// Type state of an opened context.
#[derive(Debug)]
pub struct Opened;

struct RawCodec<L: NativeLibrary> {
    lib: L,
    raw: L::Codec,
}

impl<L: NativeLibrary> Drop for RawCodec<L> {
    fn drop(&mut self) {
        self.lib.codec_free(&mut self.raw);
    }
}

/**
    Native decoder or encoder state bound to one set of codec parameters.
*/
pub struct CodecContext<L: NativeLibrary, S = Opened> {
    inner: RawCodec<L>,
    role: CodecRole,
    _state: PhantomData<S>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<L: NativeLibrary> CodecContext<L, Closed> {
    /**
        Allocate a decoder context for `stream`.

        Fails with `UnsupportedFormat` if no decoder handles the codec.
    */
    pub fn decoder(lib: &L, stream: &StreamDescriptor) -> Result<Self> {
        Self::alloc(lib, CodecRole::Decoder, &stream.codec, stream.time_base)
    }

    /**
        Allocate an encoder context producing `params` in `time_base`.

        Fails with `UnsupportedFormat` if no encoder handles the codec.
    */
    pub fn encoder(lib: &L, params: &CodecParameters, time_base: Rational) -> Result<Self> {
        Self::alloc(lib, CodecRole::Encoder, params, time_base)
    }

    fn alloc(
        lib: &L,
        role: CodecRole,
        params: &CodecParameters,
        time_base: Rational,
    ) -> Result<Self> {
        let raw = lib
            .codec_alloc(role, params, time_base)
            .map_err(|code| Error::from_code(code, "codec_alloc"))?;
        Ok(Self {
            inner: RawCodec {
                lib: lib.clone(),
                raw,
            },
            role,
            _state: PhantomData,
            _not_sync: PhantomData,
        })
    }

    /**
        Open the context. On failure the context is released.
    */
    pub fn open(mut self, options: &CodecOptions) -> Result<CodecContext<L, Opened>> {
        check(
            self.inner.lib.codec_open(&mut self.inner.raw, options),
            "codec_open",
        )?;
        Ok(CodecContext {
            inner: self.inner,
            role: self.role,
            _state: PhantomData,
            _not_sync: PhantomData,
        })
    }
}

impl<L: NativeLibrary, S> CodecContext<L, S> {
    pub fn role(&self) -> CodecRole {
        self.role
    }

    pub fn parameters(&self) -> CodecParameters {
        self.inner.lib.codec_parameters(&self.inner.raw)
    }

    pub fn time_base(&self) -> Rational {
        self.inner.lib.codec_time_base(&self.inner.raw)
    }
}

impl<L: NativeLibrary> CodecContext<L, Opened> {
    /**
        Feed a packet to a decoder; `None` starts draining.

        `NeedMoreInput` means frames must be received first.
    */
    pub fn send_packet(&mut self, packet: Option<&Packet<L>>) -> Result<()> {
        let lib = &self.inner.lib;
        check(
            lib.send_packet(&mut self.inner.raw, packet.map(|p| p.raw())),
            "send_packet",
        )?;
        Ok(())
    }

    /**
        Receive a decoded frame stamped with the decoder's time base.
    */
    pub fn receive_frame(&mut self) -> Result<Frame<L>> {
        let mut frame = Frame::new(&self.inner.lib)?;
        check(
            self.inner
                .lib
                .receive_frame(&mut self.inner.raw, frame.raw_mut()),
            "receive_frame",
        )?;
        frame.set_time_base(self.time_base());
        Ok(frame)
    }

    /**
        Feed a frame to an encoder; `None` starts draining.
    */
    pub fn send_frame(&mut self, frame: Option<&Frame<L>>) -> Result<()> {
        let lib = &self.inner.lib;
        check(
            lib.send_frame(&mut self.inner.raw, frame.map(|f| f.raw())),
            "send_frame",
        )?;
        Ok(())
    }

    /**
        Receive an encoded packet stamped with the encoder's time base.
    */
    pub fn receive_packet(&mut self) -> Result<Packet<L>> {
        let mut packet = Packet::new(&self.inner.lib)?;
        check(
            self.inner
                .lib
                .receive_packet(&mut self.inner.raw, packet.raw_mut()),
            "receive_packet",
        )?;
        packet.set_time_base(self.time_base());
        Ok(packet)
    }

    /**
        Discard buffered data and leave draining mode.
    */
    pub fn flush_buffers(&mut self) {
        self.inner.lib.codec_flush(&mut self.inner.raw);
    }
}

impl<L: NativeLibrary, S> fmt::Debug for CodecContext<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecContext")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
