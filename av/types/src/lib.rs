/*!
    Shared types for the av crate ecosystem.

    This crate defines the vocabulary of the ecosystem: the types that cross crate
    boundaries, the closed error taxonomy, and the table that maps native return
    codes onto it. It has no dependency on any native library, so consumers can
    depend on it without pulling in bindings.
*/

mod codec;
mod error;
mod format;
mod rational;
mod stream;

pub mod code;

pub use codec::{CodecId, MediaKind};
pub use error::{Error, ErrorKind, Received, Result, ResultExt, check};
pub use format::{ChannelLayout, PixelFormat, SampleFormat};
pub use rational::{Rational, rescale};
pub use stream::{
    AudioParams, CodecParameters, FrameLayout, MediaInfo, MediaParams, StreamDescriptor,
    VideoParams,
};
