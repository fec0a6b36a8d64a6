/*!
    Native return codes.

    Values follow `libavutil/error.h`: errno based codes are `AVERROR(e) = -e`
    and library specific codes are `FFERRTAG(a, b, c, d) = -MKTAG(a, b, c, d)`.
    Every native library implementation reports failures with these values so
    that [`Error::from_code`](crate::Error::from_code) can classify them.
*/

/// Success.
pub const OK: i32 = 0;

const fn mktag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    (a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24) as i32
}

const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -mktag(a, b, c, d)
}

/**
    Convert a positive POSIX errno into a native error code.
*/
pub const fn averror(errno: i32) -> i32 {
    -errno
}

/// Output is not available in this state, or input is not accepted right now.
pub const EAGAIN: i32 = averror(libc::EAGAIN);
/// Allocation failed.
pub const ENOMEM: i32 = averror(libc::ENOMEM);
/// Invalid argument.
pub const EINVAL: i32 = averror(libc::EINVAL);
/// Result out of range.
pub const ERANGE: i32 = averror(libc::ERANGE);
/// No such file or directory.
pub const ENOENT: i32 = averror(libc::ENOENT);
/// I/O error.
pub const EIO: i32 = averror(libc::EIO);
/// Permission denied.
pub const EACCES: i32 = averror(libc::EACCES);
/// Operation not permitted.
pub const EPERM: i32 = averror(libc::EPERM);
/// Broken pipe.
pub const EPIPE: i32 = averror(libc::EPIPE);
/// No space left on device.
pub const ENOSPC: i32 = averror(libc::ENOSPC);
/// Device or resource busy.
pub const EBUSY: i32 = averror(libc::EBUSY);
/// Function not implemented.
pub const ENOSYS: i32 = averror(libc::ENOSYS);

/// End of file / end of stream.
pub const EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
/// Invalid data found when processing input.
pub const INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');
/// Decoder not found.
pub const DECODER_NOT_FOUND: i32 = fferrtag(0xF8, b'D', b'E', b'C');
/// Encoder not found.
pub const ENCODER_NOT_FOUND: i32 = fferrtag(0xF8, b'E', b'N', b'C');
/// Demuxer not found.
pub const DEMUXER_NOT_FOUND: i32 = fferrtag(0xF8, b'D', b'E', b'M');
/// Muxer not found.
pub const MUXER_NOT_FOUND: i32 = fferrtag(0xF8, b'M', b'U', b'X');
/// Filter not found.
pub const FILTER_NOT_FOUND: i32 = fferrtag(0xF8, b'F', b'I', b'L');
/// Stream not found.
pub const STREAM_NOT_FOUND: i32 = fferrtag(0xF8, b'S', b'T', b'R');
/// Option not found.
pub const OPTION_NOT_FOUND: i32 = fferrtag(0xF8, b'O', b'P', b'T');
/// Not yet implemented in the native library.
pub const PATCHWELCOME: i32 = fferrtag(b'P', b'A', b'W', b'E');
/// Immediate exit was requested.
pub const EXIT: i32 = fferrtag(b'E', b'X', b'I', b'T');
/// Internal bug in the native library.
pub const BUG: i32 = fferrtag(b'B', b'U', b'G', b'!');

/**
    Timestamp value the native library uses for "no timestamp".
*/
pub const NOPTS_VALUE: i64 = i64::MIN;

/**
    Returns a short description of well known codes.
*/
pub fn describe(code: i32) -> Option<&'static str> {
    let text = match code {
        OK => "success",
        EAGAIN => "resource temporarily unavailable",
        ENOMEM => "cannot allocate memory",
        EINVAL => "invalid argument",
        ERANGE => "result too large",
        ENOENT => "no such file or directory",
        EIO => "i/o error",
        EACCES => "permission denied",
        EPERM => "operation not permitted",
        EPIPE => "broken pipe",
        ENOSPC => "no space left on device",
        EBUSY => "device or resource busy",
        ENOSYS => "function not implemented",
        EOF => "end of file",
        INVALIDDATA => "invalid data found when processing input",
        DECODER_NOT_FOUND => "decoder not found",
        ENCODER_NOT_FOUND => "encoder not found",
        DEMUXER_NOT_FOUND => "demuxer not found",
        MUXER_NOT_FOUND => "muxer not found",
        FILTER_NOT_FOUND => "filter not found",
        STREAM_NOT_FOUND => "stream not found",
        OPTION_NOT_FOUND => "option not found",
        PATCHWELCOME => "not yet implemented",
        EXIT => "immediate exit requested",
        BUG => "internal bug",
        _ => return None,
    };
    Some(text)
}
