/*!
    Raw muxing context.
*/

use std::fs::File;
use std::io::{BufWriter, Write};

use av_core::{MediaSink, OutputFormat};
use av_types::{CodecId, Rational, StreamDescriptor, code};

use crate::codec::CodecKind;
use crate::container::{self, ContainerHeader, Record, SynthFormat};

/**
    Resolve the muxer for a sink: a forced format name wins over the file
    extension.
*/
pub(crate) fn resolve_format(sink: &MediaSink) -> Result<SynthFormat, i32> {
    if let Some(name) = sink.format() {
        return SynthFormat::from_name(name).ok_or(code::MUXER_NOT_FOUND);
    }
    match sink {
        MediaSink::Path { path, .. } => path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(SynthFormat::from_extension)
            .ok_or(code::MUXER_NOT_FOUND),
        MediaSink::Stream { .. } => Err(code::MUXER_NOT_FOUND),
    }
}

pub(crate) fn output_format(format: SynthFormat) -> OutputFormat {
    OutputFormat {
        name: format.name().to_string(),
        global_header: format.global_header(),
    }
}

pub struct SynthOutput {
    pub(crate) id: u64,
    pub(crate) closed: bool,
    pub(crate) format: SynthFormat,
    writer: Box<dyn Write + Send>,
    streams: Vec<StreamDescriptor>,
    header_written: bool,
    trailer_written: bool,
    records: u64,
}

impl SynthOutput {
    pub(crate) fn open(id: u64, sink: MediaSink) -> Result<Self, i32> {
        let format = resolve_format(&sink)?;
        let writer: Box<dyn Write + Send> = match sink {
            MediaSink::Path { path, .. } => {
                let file = File::create(&path).map_err(|e| container::io_code(&e))?;
                Box::new(BufWriter::new(file))
            }
            MediaSink::Stream { writer, .. } => writer,
        };
        Ok(Self {
            id,
            closed: false,
            format,
            writer,
            streams: Vec::new(),
            header_written: false,
            trailer_written: false,
            records: 0,
        })
    }

    pub(crate) fn query_codec(&self, codec: CodecId) -> i32 {
        self.format
            .can_store(CodecKind::for_codec(codec), codec.kind()) as i32
    }

    pub(crate) fn new_stream(&mut self, stream: &StreamDescriptor) -> i32 {
        if self.header_written {
            return code::EINVAL;
        }
        let mut added = stream.clone();
        added.index = self.streams.len();
        self.streams.push(added);
        (self.streams.len() - 1) as i32
    }

    pub(crate) fn write_header(&mut self) -> i32 {
        if self.header_written {
            return code::EINVAL;
        }
        for stream in &mut self.streams {
            stream.time_base = self.format.stream_time_base(stream.time_base);
        }
        let header = ContainerHeader {
            format: self.format.name().to_string(),
            streams: self.streams.clone(),
        };
        match container::write_header(&mut self.writer, &header) {
            Ok(()) => {
                self.header_written = true;
                0
            }
            Err(e) => container::io_code(&e),
        }
    }

    pub(crate) fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.header_written
            .then(|| self.streams.get(index).map(|s| s.time_base))
            .flatten()
    }

    pub(crate) fn write(&mut self, record: &Record) -> i32 {
        if !self.header_written || self.trailer_written {
            return code::EINVAL;
        }
        if record.stream as usize >= self.streams.len() {
            return code::EINVAL;
        }
        match container::write_record(&mut self.writer, record) {
            Ok(()) => {
                self.records += 1;
                0
            }
            Err(e) => container::io_code(&e),
        }
    }

    pub(crate) fn write_trailer(&mut self) -> i32 {
        if !self.header_written || self.trailer_written {
            return code::EINVAL;
        }
        let result = container::write_trailer(&mut self.writer, self.records)
            .and_then(|()| self.writer.flush());
        match result {
            Ok(()) => {
                self.trailer_written = true;
                tracing::debug!(
                    format = self.format.name(),
                    records = self.records,
                    "Synthetic output finished"
                );
                0
            }
            Err(e) => container::io_code(&e),
        }
    }
}
