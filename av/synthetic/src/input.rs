/*!
    Raw demuxing context.
*/

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};

use av_core::{MediaSource, ReadSeek};
use av_types::{MediaKind, Rational, StreamDescriptor, code, rescale};

use crate::container::{self, ContainerHeader, IndexEntry, Record};

pub struct SynthInput {
    pub(crate) id: u64,
    pub(crate) closed: bool,
    reader: Box<dyn ReadSeek>,
    header: ContainerHeader,
    index: Vec<IndexEntry>,
    finished: bool,
}

impl SynthInput {
    pub(crate) fn open(id: u64, source: MediaSource) -> Result<Self, i32> {
        let mut reader: Box<dyn ReadSeek> = match source {
            MediaSource::Path(path) => {
                let file = File::open(&path).map_err(|e| container::io_code(&e))?;
                Box::new(BufReader::new(file))
            }
            MediaSource::Stream(reader) => reader,
        };
        let mut header =
            container::read_header(&mut reader).map_err(|e| container::io_code(&e))?;
        let index = container::build_index(&mut reader).map_err(|e| container::io_code(&e))?;

        for stream in &mut header.streams {
            if stream.duration.is_none() {
                stream.duration = container::stream_end_micros(&index, stream)
                    .and_then(|micros| Rational::MICROS.to_duration(micros));
            }
        }

        tracing::debug!(
            format = %header.format,
            streams = header.streams.len(),
            records = index.len(),
            "Synthetic input opened"
        );
        Ok(Self {
            id,
            closed: false,
            reader,
            header,
            index,
            finished: false,
        })
    }

    pub(crate) fn format_name(&self) -> &str {
        &self.header.format
    }

    pub(crate) fn streams(&self) -> &[StreamDescriptor] {
        &self.header.streams
    }

    pub(crate) fn duration_micros(&self) -> Option<i64> {
        self.header
            .streams
            .iter()
            .filter_map(|s| container::stream_end_micros(&self.index, s))
            .max()
    }

    pub(crate) fn best_stream(&self, kind: MediaKind) -> i32 {
        self.header
            .streams
            .iter()
            .position(|s| s.kind == kind)
            .map_or(code::STREAM_NOT_FOUND, |i| i as i32)
    }

    /**
        Next record, or a negative code. `EOF` repeats once reached.
    */
    pub(crate) fn read(&mut self) -> Result<Record, i32> {
        if self.finished {
            return Err(code::EOF);
        }
        match container::read_record(&mut self.reader) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                self.finished = true;
                Err(code::EOF)
            }
            Err(e) => Err(container::io_code(&e)),
        }
    }

    /**
        Reposition on the last keyframe of the reference stream at or before
        `micros`, or on the first record if there is none.
    */
    pub(crate) fn seek(&mut self, micros: i64) -> i32 {
        let reference = match self.best_stream(MediaKind::Video) {
            i if i >= 0 => i as usize,
            _ => 0,
        };
        let Some(time_base) = self.header.streams.get(reference).map(|s| s.time_base) else {
            return code::STREAM_NOT_FOUND;
        };
        let target = self
            .index
            .iter()
            .filter(|e| e.stream == reference && e.key && e.pts != code::NOPTS_VALUE)
            .take_while(|e| rescale(e.pts, time_base, Rational::MICROS) <= micros)
            .last()
            .or_else(|| self.index.first());
        let Some(entry) = target else {
            return 0;
        };
        match self.reader.seek(SeekFrom::Start(entry.offset)) {
            Ok(_) => {
                self.finished = false;
                0
            }
            Err(e) => container::io_code(&e),
        }
    }
}
