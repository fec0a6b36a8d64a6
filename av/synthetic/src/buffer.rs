/*!
    Reference-counted buffers and the raw packet and frame objects.
*/

use std::sync::Arc;

use av_core::{FrameProps, PacketProps};
use av_types::FrameLayout;

use crate::ledger::{Ledger, Resource};

/// Row alignment of video planes.
pub const LINE_ALIGN: usize = 16;

/**
    A data buffer. Shared through `Arc`; writable only while unique.
*/
#[derive(Debug)]
pub struct SynthBuffer {
    data: Vec<u8>,
    ledger: Arc<Ledger>,
}

impl SynthBuffer {
    pub fn new(ledger: &Arc<Ledger>, data: Vec<u8>) -> Arc<Self> {
        ledger.allocate(Resource::Buffer);
        Arc::new(Self {
            data,
            ledger: Arc::clone(ledger),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SynthBuffer {
    fn drop(&mut self) {
        self.ledger.release(Resource::Buffer);
    }
}

/**
    Mutable access to `buf` if no other reference exists.
*/
pub fn unique_mut(buf: &mut Arc<SynthBuffer>) -> Option<&mut [u8]> {
    Arc::get_mut(buf).map(|b| b.data.as_mut_slice())
}

/**
    Replace a shared buffer with a private copy.
*/
pub fn make_unique(ledger: &Arc<Ledger>, buf: &mut Arc<SynthBuffer>) {
    if Arc::strong_count(buf) > 1 {
        *buf = SynthBuffer::new(ledger, buf.data.clone());
    }
}

/**
    Raw packet object.
*/
#[derive(Debug)]
pub struct SynthPacket {
    pub(crate) freed: bool,
    pub(crate) buf: Option<Arc<SynthBuffer>>,
    pub(crate) props: PacketProps,
}

impl SynthPacket {
    pub(crate) fn new() -> Self {
        Self {
            freed: false,
            buf: None,
            props: PacketProps::default(),
        }
    }

    pub(crate) fn data(&self) -> &[u8] {
        self.buf.as_deref().map(SynthBuffer::data).unwrap_or(&[])
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.buf.is_none()
    }

    pub(crate) fn unref(&mut self) {
        self.buf = None;
        self.props = PacketProps::default();
    }
}

/**
    Raw frame object.
*/
#[derive(Debug)]
pub struct SynthFrame {
    pub(crate) freed: bool,
    pub(crate) layout: Option<FrameLayout>,
    pub(crate) linesizes: Vec<usize>,
    pub(crate) planes: Vec<Arc<SynthBuffer>>,
    pub(crate) props: FrameProps,
}

impl SynthFrame {
    pub(crate) fn new() -> Self {
        Self {
            freed: false,
            layout: None,
            linesizes: Vec::new(),
            planes: Vec::new(),
            props: FrameProps::default(),
        }
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.layout.is_none()
    }

    pub(crate) fn unref(&mut self) {
        self.layout = None;
        self.linesizes.clear();
        self.planes.clear();
        self.props = FrameProps::default();
    }

    /**
        Allocate zeroed planes for `layout`. Video rows are padded to
        [`LINE_ALIGN`].
    */
    pub(crate) fn allocate(&mut self, ledger: &Arc<Ledger>, layout: FrameLayout) {
        let padded = matches!(layout, FrameLayout::Video { .. });
        self.linesizes.clear();
        self.planes.clear();
        for plane in 0..layout.plane_count() {
            let (stride, rows) = layout.plane_shape(plane).unwrap_or((0, 0));
            let linesize = if padded {
                stride.next_multiple_of(LINE_ALIGN)
            } else {
                stride
            };
            self.linesizes.push(linesize);
            self.planes.push(SynthBuffer::new(ledger, vec![0; linesize * rows]));
        }
        self.layout = Some(layout);
    }

    pub(crate) fn is_writable(&self) -> bool {
        !self.planes.is_empty() && self.planes.iter().all(|p| Arc::strong_count(p) == 1)
    }
}
