/*!
    Compressed packet handle.
*/

use std::fmt;

use av_types::{Error, Rational, Result, check, code::NOPTS_VALUE, rescale};

use crate::native::{NativeLibrary, PacketProps};

/**
    A reference-counted compressed packet.

    Move-only: [`Packet::try_clone`] creates a second handle to the same
    buffer. The native packet is released when the handle drops; the buffer is
    released when its last reference goes.
*/
pub struct Packet<L: NativeLibrary> {
    lib: L,
    raw: L::Packet,
    time_base: Rational,
}

impl<L: NativeLibrary> Packet<L> {
    /**
        Allocate a blank packet.
    */
    pub fn new(lib: &L) -> Result<Self> {
        let raw = lib
            .packet_alloc()
            .ok_or_else(|| Error::allocation_failure("packet_alloc"))?;
        Ok(Self {
            lib: lib.clone(),
            raw,
            time_base: Rational::default(),
        })
    }

    /**
        Allocate a packet holding a copy of `data`.
    */
    pub fn from_bytes(lib: &L, data: &[u8]) -> Result<Self> {
        let mut packet = Self::new(lib)?;
        check(
            packet.lib.packet_alloc_data(&mut packet.raw, data.len()),
            "packet_alloc_data",
        )?;
        packet.data_mut()?.copy_from_slice(data);
        Ok(packet)
    }

    /**
        Create a second handle sharing this packet's buffer.
    */
    pub fn try_clone(&self) -> Result<Self> {
        let mut other = Self::new(&self.lib)?;
        check(self.lib.packet_ref(&mut other.raw, &self.raw), "packet_ref")?;
        other.time_base = self.time_base;
        Ok(other)
    }

    pub fn data(&self) -> &[u8] {
        self.lib.packet_data(&self.raw)
    }

    /**
        Mutable access to the payload. Fails with `InvalidArgument` while the
        buffer is shared; call [`Packet::make_writable`] first.
    */
    pub fn data_mut(&mut self) -> Result<&mut [u8]> {
        self.lib
            .packet_data_mut(&mut self.raw)
            .ok_or_else(|| Error::invalid_argument("packet buffer is not writable"))
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /**
        Returns true if this handle is the only reference to the buffer.
    */
    pub fn is_writable(&self) -> bool {
        self.lib.packet_is_writable(&self.raw)
    }

    /**
        Ensure the buffer is exclusively owned, copying it if shared.
    */
    pub fn make_writable(&mut self) -> Result<()> {
        check(
            self.lib.packet_make_writable(&mut self.raw),
            "packet_make_writable",
        )?;
        Ok(())
    }

    fn props(&self) -> PacketProps {
        self.lib.packet_props(&self.raw)
    }

    fn update(&mut self, f: impl FnOnce(&mut PacketProps)) {
        let mut props = self.props();
        f(&mut props);
        self.lib.packet_set_props(&mut self.raw, &props);
    }

    pub fn pts(&self) -> Option<i64> {
        ts(self.props().pts)
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.update(|p| p.pts = pts.unwrap_or(NOPTS_VALUE));
    }

    pub fn dts(&self) -> Option<i64> {
        ts(self.props().dts)
    }

    pub fn set_dts(&mut self, dts: Option<i64>) {
        self.update(|p| p.dts = dts.unwrap_or(NOPTS_VALUE));
    }

    pub fn duration(&self) -> i64 {
        self.props().duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.update(|p| p.duration = duration);
    }

    pub fn stream_index(&self) -> usize {
        self.props().stream_index
    }

    pub fn set_stream_index(&mut self, index: usize) {
        self.update(|p| p.stream_index = index);
    }

    pub fn is_key(&self) -> bool {
        self.props().key
    }

    pub fn set_key(&mut self, key: bool) {
        self.update(|p| p.key = key);
    }

    /**
        The time base pts, dts and duration are expressed in.
    */
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Relabel the time base without touching timestamps.
    */
    pub fn set_time_base(&mut self, time_base: Rational) {
        self.time_base = time_base;
    }

    /**
        Convert pts, dts and duration into `to` and record the new time base.
    */
    pub fn rescale_ts(&mut self, to: Rational) {
        let from = self.time_base;
        if from != to && from.is_valid() {
            self.update(|p| {
                p.pts = rescale(p.pts, from, to);
                p.dts = rescale(p.dts, from, to);
                p.duration = rescale(p.duration, from, to);
            });
        }
        self.time_base = to;
    }

    /**
        Drop the buffer reference and reset every field.
    */
    pub fn clear(&mut self) {
        self.lib.packet_unref(&mut self.raw);
        self.time_base = Rational::default();
    }

    pub(crate) fn raw(&self) -> &L::Packet {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut L::Packet {
        &mut self.raw
    }
}

fn ts(value: i64) -> Option<i64> {
    (value != NOPTS_VALUE).then_some(value)
}

impl<L: NativeLibrary> Drop for Packet<L> {
    fn drop(&mut self) {
        self.lib.packet_free(&mut self.raw);
    }
}

impl<L: NativeLibrary> fmt::Debug for Packet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props = self.props();
        f.debug_struct("Packet")
            .field("stream_index", &props.stream_index)
            .field("pts", &ts(props.pts))
            .field("dts", &ts(props.dts))
            .field("duration", &props.duration)
            .field("key", &props.key)
            .field("time_base", &self.time_base)
            .field("len", &self.len())
            .finish()
    }
}
