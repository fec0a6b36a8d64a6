/*!
    Byte sources and sinks for containers.
*/

use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

/**
    A readable, seekable byte stream.
*/
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/**
    Where a container is read from.
*/
pub enum MediaSource {
    /// A file on disk.
    Path(PathBuf),
    /// Any seekable reader.
    Stream(Box<dyn ReadSeek>),
}

impl MediaSource {
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn stream(reader: impl ReadSeek + 'static) -> Self {
        Self::Stream(Box::new(reader))
    }

    /**
        Short description for logs.
    */
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Stream(_) => "<stream>".to_string(),
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish_non_exhaustive(),
        }
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        Self::path(path)
    }
}

impl From<&str> for MediaSource {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

/**
    Where a container is written to.
*/
pub enum MediaSink {
    /// A file on disk. The format is guessed from the extension unless forced.
    Path {
        path: PathBuf,
        format: Option<String>,
    },
    /// Any writer, with an explicit format name.
    Stream {
        writer: Box<dyn Write + Send>,
        format: String,
    },
}

impl MediaSink {
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path {
            path: path.as_ref().to_path_buf(),
            format: None,
        }
    }

    pub fn path_with_format(path: impl AsRef<Path>, format: impl Into<String>) -> Self {
        Self::Path {
            path: path.as_ref().to_path_buf(),
            format: Some(format.into()),
        }
    }

    pub fn stream(writer: impl Write + Send + 'static, format: impl Into<String>) -> Self {
        Self::Stream {
            writer: Box::new(writer),
            format: format.into(),
        }
    }

    /**
        The forced format name, if any.
    */
    pub fn format(&self) -> Option<&str> {
        match self {
            Self::Path { format, .. } => format.as_deref(),
            Self::Stream { format, .. } => Some(format),
        }
    }

    /**
        Short description for logs.
    */
    pub fn describe(&self) -> String {
        match self {
            Self::Path { path, .. } => path.display().to_string(),
            Self::Stream { format, .. } => format!("<stream:{format}>"),
        }
    }
}

impl fmt::Debug for MediaSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path { path, format } => f
                .debug_struct("Path")
                .field("path", path)
                .field("format", format)
                .finish(),
            Self::Stream { format, .. } => f
                .debug_struct("Stream")
                .field("format", format)
                .finish_non_exhaustive(),
        }
    }
}

impl From<PathBuf> for MediaSink {
    fn from(path: PathBuf) -> Self {
        Self::Path { path, format: None }
    }
}

impl From<&Path> for MediaSink {
    fn from(path: &Path) -> Self {
        Self::path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn sink_format() {
        assert_eq!(MediaSink::path("out.synth").format(), None);
        assert_eq!(
            MediaSink::path_with_format("out.bin", "synth").format(),
            Some("synth")
        );
        assert_eq!(MediaSink::stream(Vec::new(), "synth").format(), Some("synth"));
    }

    #[test]
    fn describe() {
        assert_eq!(MediaSource::path("a/b.synth").describe(), "a/b.synth");
        assert_eq!(
            MediaSource::stream(Cursor::new(Vec::<u8>::new())).describe(),
            "<stream>"
        );
    }
}
