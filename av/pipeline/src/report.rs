/*!
    Pipeline run statistics.
*/

use serde::Serialize;

use crate::config::StreamAction;

/**
    Counters for one input stream.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub input_index: usize,
    /// Index in the output container; `None` for dropped streams.
    pub output_index: Option<usize>,
    pub action: StreamAction,
    /// Packets read from the input.
    pub packets_in: u64,
    /// Packets written to the output.
    pub packets_out: u64,
    pub frames_decoded: u64,
    pub frames_encoded: u64,
}

impl StreamReport {
    pub(crate) fn new(input_index: usize, output_index: Option<usize>, action: StreamAction) -> Self {
        Self {
            input_index,
            output_index,
            action,
            packets_in: 0,
            packets_out: 0,
            frames_decoded: 0,
            frames_encoded: 0,
        }
    }
}

/**
    What a pipeline run did, one entry per input stream in input order.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub streams: Vec<StreamReport>,
}

impl PipelineReport {
    pub fn stream(&self, input_index: usize) -> Option<&StreamReport> {
        self.streams.get(input_index)
    }

    /**
        Report for output stream `index`.
    */
    pub fn output(&self, index: usize) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.output_index == Some(index))
    }

    pub fn packets_in(&self) -> u64 {
        self.streams.iter().map(|s| s.packets_in).sum()
    }

    pub fn packets_out(&self) -> u64 {
        self.streams.iter().map(|s| s.packets_out).sum()
    }

    pub fn output_streams(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.output_index.is_some())
            .count()
    }
}
