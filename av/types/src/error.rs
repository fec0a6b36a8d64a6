/*!
    The error channel.

    Every native return code is classified into one closed set of kinds. Two of
    them, [`ErrorKind::NeedMoreInput`] and [`ErrorKind::EndOfStream`], are
    expected control states rather than failures: callers loop on them.
*/

use std::borrow::Cow;

use thiserror::Error;

use crate::code;

/**
    Classification of every error the ecosystem can report.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// The source, sink, or device cannot be read or written.
    #[error("resource unavailable")]
    ResourceUnavailable,
    /// An argument or call sequence is not valid in the current state.
    #[error("invalid argument")]
    InvalidArgument,
    /// No container format or codec matches.
    #[error("unsupported format")]
    UnsupportedFormat,
    /// Control state: output needs more input, or input must wait until output is drained.
    #[error("would block, more input needed")]
    NeedMoreInput,
    /// Control state: everything has been drained.
    #[error("end of stream")]
    EndOfStream,
    /// A native allocation failed.
    #[error("allocation failure")]
    AllocationFailure,
    /// Any other native failure, with its raw code.
    #[error("native library error {0}")]
    NativeLibraryError(i32),
}

impl ErrorKind {
    /**
        Classify a negative native return code.
    */
    pub fn from_code(code: i32) -> Self {
        match code {
            code::EAGAIN => Self::NeedMoreInput,
            code::EOF => Self::EndOfStream,
            code::ENOMEM => Self::AllocationFailure,
            code::EINVAL | code::ERANGE | code::OPTION_NOT_FOUND => Self::InvalidArgument,
            code::ENOENT
            | code::EIO
            | code::EACCES
            | code::EPERM
            | code::EPIPE
            | code::ENOSPC
            | code::EBUSY
            | code::EXIT
            | code::STREAM_NOT_FOUND => Self::ResourceUnavailable,
            code::INVALIDDATA
            | code::DECODER_NOT_FOUND
            | code::ENCODER_NOT_FOUND
            | code::DEMUXER_NOT_FOUND
            | code::MUXER_NOT_FOUND
            | code::FILTER_NOT_FOUND
            | code::PATCHWELCOME
            | code::ENOSYS => Self::UnsupportedFormat,
            other => Self::NativeLibraryError(other),
        }
    }

    /**
        Returns true for the expected control states.
    */
    pub const fn is_control(self) -> bool {
        matches!(self, Self::NeedMoreInput | Self::EndOfStream)
    }
}

/**
    A structured error: kind, the native code it came from (if any), and the
    operation that produced it.
*/
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{context}: {kind}{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct Error {
    kind: ErrorKind,
    code: Option<i32>,
    context: Cow<'static, str>,
}

/**
    Result type used across the ecosystem.
*/
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /**
        Create an error of the given kind.
    */
    pub fn new(kind: ErrorKind, context: impl Into<Cow<'static, str>>) -> Self {
        let code = match kind {
            ErrorKind::NativeLibraryError(code) => Some(code),
            _ => None,
        };
        Self {
            kind,
            code,
            context: context.into(),
        }
    }

    /**
        Classify a native return code.

        `context` should name the native operation, e.g. `"send_packet"`.
    */
    pub fn from_code(code: i32, context: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: ErrorKind::from_code(code),
            code: Some(code),
            context: context.into(),
        }
    }

    pub fn resource_unavailable(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::ResourceUnavailable, context)
    }

    pub fn invalid_argument(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, context)
    }

    pub fn unsupported_format(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::UnsupportedFormat, context)
    }

    pub fn allocation_failure(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AllocationFailure, context)
    }

    pub fn need_more_input(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NeedMoreInput, context)
    }

    pub fn end_of_stream(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::EndOfStream, context)
    }

    /**
        The classification of this error.
    */
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /**
        The native return code this error was built from, if any.
    */
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /**
        The operation that failed.
    */
    pub fn context(&self) -> &str {
        &self.context
    }

    /**
        Returns true for `NeedMoreInput` and `EndOfStream`.
    */
    pub fn is_control(&self) -> bool {
        self.kind.is_control()
    }

    /**
        Returns true for every kind that is a real failure.
    */
    pub fn is_hard(&self) -> bool {
        !self.is_control()
    }

    pub fn is_need_more_input(&self) -> bool {
        self.kind == ErrorKind::NeedMoreInput
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.kind == ErrorKind::EndOfStream
    }

    /**
        Prefix the context with the calling operation.
    */
    pub fn within(mut self, outer: &str) -> Self {
        self.context = Cow::Owned(format!("{outer}: {}", self.context));
        self
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::OutOfMemory => ErrorKind::AllocationFailure,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
            _ => ErrorKind::ResourceUnavailable,
        };
        Self {
            kind,
            code: e.raw_os_error().map(code::averror),
            context: Cow::Owned(e.to_string()),
        }
    }
}

/**
    Check a native return code, keeping non-negative values.
*/
pub fn check(code: i32, context: &'static str) -> Result<i32> {
    if code >= 0 {
        Ok(code)
    } else {
        Err(Error::from_code(code, context))
    }
}

/**
    Outcome of a receive-style call with the control states split out.
*/
#[derive(Debug)]
pub enum Received<T> {
    /// An item was produced.
    Item(T),
    /// Nothing is ready; send more input (or drain output) first.
    NeedMoreInput,
    /// Fully drained.
    EndOfStream,
}

impl<T> Received<T> {
    /**
        Returns the item, if one was produced.
    */
    pub fn item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::NeedMoreInput | Self::EndOfStream => None,
        }
    }
}

/**
    Extension methods for splitting control states out of a [`Result`].
*/
pub trait ResultExt<T> {
    /**
        Move `NeedMoreInput` / `EndOfStream` into [`Received`], leaving only
        hard errors in the error position.

        ```
        use av_types::{Error, Received, ResultExt};

        let r: av_types::Result<u8> = Err(Error::end_of_stream("read_packet"));
        assert!(matches!(r.received(), Ok(Received::EndOfStream)));
        ```
    */
    fn received(self) -> Result<Received<T>>;
}

impl<T> ResultExt<T> for Result<T> {
    fn received(self) -> Result<Received<T>> {
        match self {
            Ok(item) => Ok(Received::Item(item)),
            Err(e) => match e.kind() {
                ErrorKind::NeedMoreInput => Ok(Received::NeedMoreInput),
                ErrorKind::EndOfStream => Ok(Received::EndOfStream),
                _ => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_codes_are_not_hard() {
        let again = Error::from_code(code::EAGAIN, "receive_frame");
        let eof = Error::from_code(code::EOF, "receive_frame");
        assert!(again.is_need_more_input());
        assert!(eof.is_end_of_stream());
        assert!(again.is_control() && eof.is_control());
        assert!(!again.is_hard());
    }

    #[test]
    fn table_maps_kinds() {
        assert_eq!(
            ErrorKind::from_code(code::ENOMEM),
            ErrorKind::AllocationFailure
        );
        assert_eq!(
            ErrorKind::from_code(code::ENOENT),
            ErrorKind::ResourceUnavailable
        );
        assert_eq!(
            ErrorKind::from_code(code::INVALIDDATA),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            ErrorKind::from_code(code::DECODER_NOT_FOUND),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            ErrorKind::from_code(code::FILTER_NOT_FOUND),
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(ErrorKind::from_code(code::EINVAL), ErrorKind::InvalidArgument);
        assert_eq!(
            ErrorKind::from_code(-999),
            ErrorKind::NativeLibraryError(-999)
        );
    }

    #[test]
    fn native_error_keeps_code() {
        let e = Error::from_code(code::BUG, "write_trailer");
        assert_eq!(e.code(), Some(code::BUG));
        assert!(e.is_hard());
        assert_eq!(e.context(), "write_trailer");
    }

    #[test]
    fn display_includes_context_and_code() {
        let e = Error::from_code(code::EINVAL, "open_input");
        let text = e.to_string();
        assert!(text.starts_with("open_input: invalid argument"));
        assert!(text.contains("code"));

        let e = Error::invalid_argument("send_packet after flush");
        assert_eq!(e.to_string(), "send_packet after flush: invalid argument");
    }

    #[test]
    fn received_splits_control_states() {
        let ok: Result<u32> = Ok(3);
        assert_eq!(ok.received().unwrap().item(), Some(3));

        let again: Result<u32> = Err(Error::need_more_input("receive_frame"));
        assert!(matches!(again.received(), Ok(Received::NeedMoreInput)));

        let hard: Result<u32> = Err(Error::unsupported_format("open"));
        assert_eq!(
            hard.received().unwrap_err().kind(),
            ErrorKind::UnsupportedFormat
        );
    }

    #[test]
    fn io_errors_are_resource_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.synth");
        let e = Error::from(io);
        assert_eq!(e.kind(), ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn within_prefixes_context() {
        let e = Error::invalid_argument("stream 4").within("write_packet");
        assert_eq!(e.context(), "write_packet: stream 4");
    }
}
