/*!
    Native library seam and resource handles for the av crate ecosystem.

    Everything that touches the native multimedia library goes through the
    [`NativeLibrary`] trait. The handles defined here ([`Packet`], [`Frame`],
    [`InputContext`], [`OutputContext`], [`CodecContext`], [`ParserContext`],
    [`ScaleContext`] and [`FilterGraph`]) each own exactly one native object
    and release it on drop, so higher-level crates never see raw pointers or
    return codes.

    # Features

    - `ffmpeg`: the [`ffmpeg::FfmpegLibrary`] backend over the system FFmpeg
      libraries.
*/

mod codec;
mod filter;
mod frame;
mod input;
mod io;
mod native;
mod output;
mod packet;
mod parser;
mod scale;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use av_types;

pub use codec::{Closed, CodecContext, Opened};
pub use filter::FilterGraph;
pub use frame::Frame;
pub use input::InputContext;
pub use io::{MediaSink, MediaSource, ReadSeek};
pub use native::{
    CodecOptions, CodecRole, FrameProps, NativeLibrary, OutputFormat, PacketProps,
};
pub use output::OutputContext;
pub use packet::Packet;
pub use parser::ParserContext;
pub use scale::ScaleContext;
