/*!
    Filter graphs for the synthetic library.

    A description is a comma separated chain. Supported filters:

    | Filter | Media | Effect |
    |---|---|---|
    | `null` | video | passes frames through |
    | `anull` | audio | passes frames through |
    | `scale=W:H` or `scale=w=W:h=H` | video | nearest-neighbour resize |
    | `format=NAME` or `format=pix_fmts=NAME` | video | pixel format conversion |
    | `framestep=N` | video | keeps the first of every `N` frames |

    Any other name is `FILTER_NOT_FOUND`; bad arguments are `EINVAL`.
*/

use std::collections::VecDeque;

use av_core::FrameProps;
use av_types::{FrameLayout, MediaParams, PixelFormat, Rational, code};

use crate::payload::FramePayload;
use crate::scale;

#[derive(Debug)]
enum Stage {
    Null,
    Convert(FrameLayout),
    FrameStep { step: u64, seen: u64 },
}

/**
    Raw filter graph object.
*/
#[derive(Debug)]
pub struct SynthFilter {
    pub(crate) id: u64,
    pub(crate) freed: bool,
    input: MediaParams,
    output: MediaParams,
    time_base: Rational,
    stages: Vec<Stage>,
    queue: VecDeque<(FramePayload, FrameProps)>,
    eof: bool,
}

impl SynthFilter {
    pub(crate) fn new(
        id: u64,
        description: &str,
        input: &MediaParams,
        time_base: Rational,
    ) -> Result<Self, i32> {
        if matches!(input, MediaParams::None) || !time_base.is_valid() {
            return Err(code::EINVAL);
        }
        let mut output = *input;
        let mut stages = Vec::new();
        for filter in description.split(',').map(str::trim) {
            let (name, args) = filter.split_once('=').unwrap_or((filter, ""));
            let stage = match (name, &mut output) {
                ("", _) => return Err(code::EINVAL),
                ("null", MediaParams::Video(_)) | ("anull", MediaParams::Audio(_)) => Stage::Null,
                ("scale", MediaParams::Video(video)) => {
                    let (width, height) = scale_args(args)?;
                    video.width = width;
                    video.height = height;
                    Stage::Convert(video.layout())
                }
                ("format", MediaParams::Video(video)) => {
                    let format = format_arg(args)?;
                    if !scale::converts(video.pixel_format, format) {
                        return Err(code::ENOSYS);
                    }
                    video.pixel_format = format;
                    Stage::Convert(video.layout())
                }
                ("framestep", MediaParams::Video(_)) => {
                    let step = args.parse::<u64>().map_err(|_| code::EINVAL)?;
                    if step == 0 {
                        return Err(code::EINVAL);
                    }
                    Stage::FrameStep { step, seen: 0 }
                }
                ("null" | "anull" | "scale" | "format" | "framestep", _) => {
                    return Err(code::EINVAL);
                }
                _ => return Err(code::FILTER_NOT_FOUND),
            };
            stages.push(stage);
        }
        Ok(Self {
            id,
            freed: false,
            input: *input,
            output,
            time_base,
            stages,
            queue: VecDeque::new(),
            eof: false,
        })
    }

    pub(crate) fn output(&self) -> MediaParams {
        self.output
    }

    pub(crate) fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Run one frame through the chain, or mark the end of input on `None`.
    */
    pub(crate) fn send(&mut self, frame: Option<(FramePayload, FrameProps)>) -> i32 {
        if self.eof {
            return code::EOF;
        }
        let Some((mut payload, props)) = frame else {
            self.eof = true;
            return 0;
        };
        if !self.input.accepts(&payload.layout) {
            return code::EINVAL;
        }
        for stage in &mut self.stages {
            match stage {
                Stage::Null => {}
                Stage::Convert(layout) => match scale::scale(&payload, *layout) {
                    Some(converted) => payload = converted,
                    None => return code::ENOSYS,
                },
                Stage::FrameStep { step, seen } => {
                    let keep = *seen % *step == 0;
                    *seen += 1;
                    if !keep {
                        return 0;
                    }
                }
            }
        }
        self.queue.push_back((payload, props));
        0
    }

    pub(crate) fn receive(&mut self) -> Result<(FramePayload, FrameProps), i32> {
        match self.queue.pop_front() {
            Some(frame) => Ok(frame),
            None if self.eof => Err(code::EOF),
            None => Err(code::EAGAIN),
        }
    }
}

fn scale_args(args: &str) -> Result<(u32, u32), i32> {
    let mut parts = args.split(':');
    let (Some(width), Some(height), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(code::EINVAL);
    };
    let dimension = |value: &str, key: &str| {
        value
            .strip_prefix(key)
            .unwrap_or(value)
            .parse::<u32>()
            .ok()
            .filter(|&v| v > 0)
            .ok_or(code::EINVAL)
    };
    Ok((dimension(width, "w=")?, dimension(height, "h=")?))
}

fn format_arg(args: &str) -> Result<PixelFormat, i32> {
    let name = args.strip_prefix("pix_fmts=").unwrap_or(args);
    serde_json::from_value(serde_json::Value::String(name.to_owned())).map_err(|_| code::EINVAL)
}
