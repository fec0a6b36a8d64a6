/*!
    The synthetic container format.

    ```text
    magic    "SYNTHAV\0"
    header   u32 length + JSON { format, streams }
    records  'P' u32 stream, u8 flags, i64 pts, i64 dts, i64 duration,
             u32 length, payload
    trailer  'T' u64 record count
    ```

    All integers are little-endian. A file that ends before the trailer reads
    as if the trailer were there; an unknown record tag is invalid data.
*/

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use av_types::{MediaKind, Rational, StreamDescriptor, code, rescale};

use crate::codec::CodecKind;

pub const MAGIC: &[u8; 8] = b"SYNTHAV\0";

const TAG_PACKET: u8 = b'P';
const TAG_TRAILER: u8 = b'T';
const FLAG_KEY: u8 = 1;

/**
    Muxers the synthetic library offers.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynthFormat {
    /// Keeps stream time bases, stores every codec.
    Synth,
    /// Forces a millisecond time base on every stream.
    SynthMs,
    /// Stores video codecs only.
    SynthVideo,
}

impl SynthFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "synth" => Some(Self::Synth),
            "synth-ms" => Some(Self::SynthMs),
            "synth-video" => Some(Self::SynthVideo),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "synth" => Some(Self::Synth),
            "synthm" => Some(Self::SynthMs),
            "synthv" => Some(Self::SynthVideo),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Synth => "synth",
            Self::SynthMs => "synth-ms",
            Self::SynthVideo => "synth-video",
        }
    }

    /// Encoders feeding this format must put codec headers in the parameters.
    pub fn global_header(self) -> bool {
        matches!(self, Self::SynthMs)
    }

    pub fn can_store(self, kind: Option<CodecKind>, media: MediaKind) -> bool {
        match self {
            Self::Synth | Self::SynthMs => kind.is_some(),
            Self::SynthVideo => kind.is_some() && media == MediaKind::Video,
        }
    }

    /// Time base a stream gets once the header is written.
    pub fn stream_time_base(self, requested: Rational) -> Rational {
        match self {
            Self::SynthMs => Rational::new(1, 1000),
            Self::Synth | Self::SynthVideo => requested,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub format: String,
    pub streams: Vec<StreamDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub stream: u32,
    pub key: bool,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub data: Vec<u8>,
}

pub fn write_header<W: Write>(w: &mut W, header: &ContainerHeader) -> io::Result<()> {
    let json = serde_json::to_vec(header)?;
    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(json.len() as u32)?;
    w.write_all(&json)
}

pub fn write_record<W: Write>(w: &mut W, record: &Record) -> io::Result<()> {
    w.write_u8(TAG_PACKET)?;
    w.write_u32::<LittleEndian>(record.stream)?;
    w.write_u8(if record.key { FLAG_KEY } else { 0 })?;
    w.write_i64::<LittleEndian>(record.pts)?;
    w.write_i64::<LittleEndian>(record.dts)?;
    w.write_i64::<LittleEndian>(record.duration)?;
    w.write_u32::<LittleEndian>(record.data.len() as u32)?;
    w.write_all(&record.data)
}

pub fn write_trailer<W: Write>(w: &mut W, records: u64) -> io::Result<()> {
    w.write_u8(TAG_TRAILER)?;
    w.write_u64::<LittleEndian>(records)
}

/**
    Native code for an I/O failure while parsing.
*/
pub fn io_code(e: &io::Error) -> i32 {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => code::INVALIDDATA,
        _ => e.raw_os_error().map(code::averror).unwrap_or(code::EIO),
    }
}

pub fn read_header<R: Read>(r: &mut R) -> io::Result<ContainerHeader> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut json = vec![0; len];
    r.read_exact(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/**
    Read the next record. `Ok(None)` at the trailer or at a clean or
    truncated end of file.
*/
pub fn read_record<R: Read>(r: &mut R) -> io::Result<Option<Record>> {
    let tag = match r.read_u8() {
        Ok(tag) => tag,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    match tag {
        TAG_TRAILER => Ok(None),
        TAG_PACKET => match read_record_body(r) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        },
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown record tag {other:#04x}"),
        )),
    }
}

fn read_record_body<R: Read>(r: &mut R) -> io::Result<Record> {
    let stream = r.read_u32::<LittleEndian>()?;
    let flags = r.read_u8()?;
    let pts = r.read_i64::<LittleEndian>()?;
    let dts = r.read_i64::<LittleEndian>()?;
    let duration = r.read_i64::<LittleEndian>()?;
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut data = vec![0; len];
    r.read_exact(&mut data)?;
    Ok(Record {
        stream,
        key: flags & FLAG_KEY != 0,
        pts,
        dts,
        duration,
        data,
    })
}

/**
    Position and timing of one record, gathered when the input is opened.
*/
#[derive(Clone, Copy, Debug)]
pub struct IndexEntry {
    pub offset: u64,
    pub stream: usize,
    pub pts: i64,
    pub duration: i64,
    pub key: bool,
}

/**
    Walk every record from the current position, then return to it.
*/
pub fn build_index<R: Read + Seek>(r: &mut R) -> io::Result<Vec<IndexEntry>> {
    let start = r.stream_position()?;
    let mut index = Vec::new();
    loop {
        let offset = r.stream_position()?;
        let Some(record) = read_record(r)? else {
            break;
        };
        index.push(IndexEntry {
            offset,
            stream: record.stream as usize,
            pts: record.pts,
            duration: record.duration,
            key: record.key,
        });
    }
    r.seek(SeekFrom::Start(start))?;
    Ok(index)
}

/**
    End time of a stream in microseconds, from its indexed records.
*/
pub fn stream_end_micros(index: &[IndexEntry], stream: &StreamDescriptor) -> Option<i64> {
    index
        .iter()
        .filter(|e| e.stream == stream.index && e.pts != code::NOPTS_VALUE)
        .map(|e| rescale(e.pts + e.duration, stream.time_base, Rational::MICROS))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(stream: u32, pts: i64) -> Record {
        Record {
            stream,
            key: pts == 0,
            pts,
            dts: pts,
            duration: 1,
            data: vec![stream as u8; 3],
        }
    }

    fn container(records: &[Record], trailer: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let header = ContainerHeader {
            format: "synth".into(),
            streams: Vec::new(),
        };
        write_header(&mut out, &header).unwrap();
        for r in records {
            write_record(&mut out, r).unwrap();
        }
        if trailer {
            write_trailer(&mut out, records.len() as u64).unwrap();
        }
        out
    }

    #[test]
    fn records_read_back_in_order() {
        let records = [record(0, 0), record(1, 0), record(0, 1)];
        let bytes = container(&records, true);
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor).unwrap();
        let mut read = Vec::new();
        while let Some(r) = read_record(&mut cursor).unwrap() {
            read.push(r);
        }
        assert_eq!(read, records);
    }

    #[test]
    fn truncation_reads_as_end() {
        let mut bytes = container(&[record(0, 0), record(0, 1)], false);
        bytes.truncate(bytes.len() - 2);
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor).unwrap();
        assert!(read_record(&mut cursor).unwrap().is_some());
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn bad_magic_and_tag_are_invalid_data() {
        let err = read_header(&mut Cursor::new(b"NOTSYNTH\0\0\0\0".to_vec())).unwrap_err();
        assert_eq!(io_code(&err), code::INVALIDDATA);

        let mut bytes = container(&[], false);
        bytes.push(b'X');
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor).unwrap();
        let err = read_record(&mut cursor).unwrap_err();
        assert_eq!(io_code(&err), code::INVALIDDATA);
    }

    #[test]
    fn index_covers_every_record() {
        let bytes = container(&[record(0, 0), record(1, 0), record(0, 1)], true);
        let mut cursor = Cursor::new(bytes);
        read_header(&mut cursor).unwrap();
        let start = cursor.position();
        let index = build_index(&mut cursor).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index[0].offset, start);
        assert_eq!(cursor.position(), start);
    }

    #[test]
    fn millisecond_format_overrides_time_base() {
        let tb = Rational::new(1, 25);
        assert_eq!(SynthFormat::SynthMs.stream_time_base(tb), Rational::new(1, 1000));
        assert_eq!(SynthFormat::Synth.stream_time_base(tb), tb);
        assert_eq!(SynthFormat::from_extension("synthv"), Some(SynthFormat::SynthVideo));
    }
}
