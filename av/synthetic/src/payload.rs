/*!
    Packet payloads of the synthetic codecs.

    A payload is a list of raw frames: a little-endian `u16` frame count, then
    per frame a `u8` key flag, the frame layout as length-prefixed JSON, and
    each plane's unpadded bytes, length-prefixed. Decoding a payload restores
    the frames bit for bit, which is what lets tests compare pipeline output
    with its input.
*/

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use av_types::FrameLayout;

use crate::buffer::{SynthFrame, unique_mut};
use crate::ledger::Ledger;

/**
    One raw frame carried in a payload.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePayload {
    pub layout: FrameLayout,
    pub key: bool,
    /// Unpadded plane bytes, row after row.
    pub planes: Vec<Vec<u8>>,
}

impl FramePayload {
    /**
        A frame whose bytes are a deterministic function of `seed`.
    */
    pub fn filled(layout: FrameLayout, key: bool, seed: u32) -> Self {
        let planes = layout
            .plane_sizes()
            .into_iter()
            .enumerate()
            .map(|(plane, size)| {
                (0..size)
                    .map(|i| (seed as usize * 31 + plane * 7 + i) as u8)
                    .collect()
            })
            .collect();
        Self { layout, key, planes }
    }

    /**
        Copy the visible bytes out of a frame. `None` for a blank frame.
    */
    pub(crate) fn from_frame(frame: &SynthFrame) -> Option<Self> {
        let layout = frame.layout?;
        let mut planes = Vec::with_capacity(frame.planes.len());
        for (plane, buf) in frame.planes.iter().enumerate() {
            let (stride, rows) = layout.plane_shape(plane)?;
            let linesize = frame.linesizes[plane];
            let mut bytes = Vec::with_capacity(stride * rows);
            for row in 0..rows {
                let start = row * linesize;
                bytes.extend_from_slice(&buf.data()[start..start + stride]);
            }
            planes.push(bytes);
        }
        Some(Self {
            layout,
            key: frame.props.key,
            planes,
        })
    }

    /**
        Allocate buffers on a blank frame and copy this payload into them.
    */
    pub(crate) fn fill_frame(&self, ledger: &Arc<Ledger>, frame: &mut SynthFrame) {
        frame.allocate(ledger, self.layout);
        frame.props.key = self.key;
        self.write_into(frame);
    }

    /**
        Copy this payload into the existing buffers of a frame with the same
        layout. Returns false if the layouts differ or a buffer is shared.
    */
    pub(crate) fn write_into(&self, frame: &mut SynthFrame) -> bool {
        if frame.layout != Some(self.layout) {
            return false;
        }
        for (plane, src) in self.planes.iter().enumerate() {
            let Some((stride, rows)) = self.layout.plane_shape(plane) else {
                return false;
            };
            let linesize = frame.linesizes[plane];
            let Some(dst) = frame.planes.get_mut(plane).and_then(unique_mut) else {
                return false;
            };
            for row in 0..rows {
                let from = &src[row * stride..(row + 1) * stride];
                dst[row * linesize..row * linesize + stride].copy_from_slice(from);
            }
        }
        true
    }
}

pub fn encode(frames: &[FramePayload]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u16::<LittleEndian>(frames.len() as u16)?;
    for frame in frames {
        out.write_u8(frame.key as u8)?;
        let layout = serde_json::to_vec(&frame.layout)?;
        out.write_u32::<LittleEndian>(layout.len() as u32)?;
        out.extend_from_slice(&layout);
        for plane in &frame.planes {
            out.write_u32::<LittleEndian>(plane.len() as u32)?;
            out.extend_from_slice(plane);
        }
    }
    Ok(out)
}

pub fn decode(data: &[u8]) -> io::Result<Vec<FramePayload>> {
    read_frames(&mut Cursor::new(data))
}

/**
    Length of the complete payload at the start of `data`, or `None` if
    `data` ends before the payload does.
*/
pub fn packet_len(data: &[u8]) -> io::Result<Option<usize>> {
    let mut cursor = Cursor::new(data);
    match read_frames(&mut cursor) {
        Ok(_) => Ok(Some(cursor.position() as usize)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_frames(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<FramePayload>> {
    let count = cursor.read_u16::<LittleEndian>()?;
    let mut frames = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = cursor.read_u8()? != 0;
        let layout: FrameLayout = serde_json::from_slice(&read_chunk(cursor)?)?;
        let sizes = layout.plane_sizes();
        let mut planes = Vec::with_capacity(sizes.len());
        for expected in sizes {
            let plane = read_chunk(cursor)?;
            if plane.len() != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("plane of {} bytes, expected {expected}", plane.len()),
                ));
            }
            planes.push(plane);
        }
        frames.push(FramePayload { layout, key, planes });
    }
    Ok(frames)
}

fn read_chunk(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<u8>> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    let mut chunk = vec![0; len];
    cursor.read_exact(&mut chunk)?;
    Ok(chunk)
}
