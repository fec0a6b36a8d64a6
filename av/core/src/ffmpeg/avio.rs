/*!
    Custom I/O contexts bridging Rust readers and writers into libavformat.
*/

use std::ffi::{c_int, c_void};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ptr;

use ffmpeg_next::ffi::{
    AVIOContext, AVSEEK_SIZE, av_free, av_freep, av_malloc, avio_alloc_context,
    avio_context_free,
};

use av_types::code;

use crate::io::ReadSeek;

const BUFFER_SIZE: usize = 64 * 1024;

fn io_error_code(e: &std::io::Error) -> c_int {
    e.raw_os_error().map(code::averror).unwrap_or(code::EIO)
}

unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, size: c_int) -> c_int {
    // SAFETY: opaque is the Box<dyn ReadSeek> installed by AvioReader::new.
    let reader = unsafe { &mut *(opaque as *mut Box<dyn ReadSeek>) };
    // SAFETY: libavformat hands out a buffer of `size` bytes.
    let buf = unsafe { std::slice::from_raw_parts_mut(buf, size.max(0) as usize) };
    match reader.read(buf) {
        Ok(0) => code::EOF,
        Ok(n) => n as c_int,
        Err(e) => io_error_code(&e),
    }
}

unsafe extern "C" fn seek(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    // SAFETY: see read_packet.
    let reader = unsafe { &mut *(opaque as *mut Box<dyn ReadSeek>) };
    let result = if whence & AVSEEK_SIZE as c_int != 0 {
        (|| -> std::io::Result<u64> {
            let here = reader.stream_position()?;
            let end = reader.seek(SeekFrom::End(0))?;
            reader.seek(SeekFrom::Start(here))?;
            Ok(end)
        })()
    } else {
        match whence & 0xffff {
            0 => reader.seek(SeekFrom::Start(offset.max(0) as u64)),
            1 => reader.seek(SeekFrom::Current(offset)),
            2 => reader.seek(SeekFrom::End(offset)),
            _ => return code::EINVAL as i64,
        }
    };
    match result {
        Ok(pos) => pos as i64,
        Err(e) => io_error_code(&e) as i64,
    }
}

unsafe extern "C" fn write_packet(opaque: *mut c_void, buf: *const u8, size: c_int) -> c_int {
    // SAFETY: opaque is the Box<dyn Write + Send> installed by AvioWriter::new.
    let writer = unsafe { &mut *(opaque as *mut Box<dyn Write + Send>) };
    // SAFETY: libavformat hands out `size` valid bytes.
    let buf = unsafe { std::slice::from_raw_parts(buf, size.max(0) as usize) };
    match writer.write_all(buf) {
        Ok(()) => size,
        Err(e) => io_error_code(&e),
    }
}

fn alloc_context(
    write: bool,
    opaque: *mut c_void,
) -> Result<*mut AVIOContext, c_int> {
    let buffer = unsafe { av_malloc(BUFFER_SIZE) } as *mut u8;
    if buffer.is_null() {
        return Err(code::ENOMEM);
    }
    let ctx = unsafe {
        if write {
            avio_alloc_context(
                buffer,
                BUFFER_SIZE as c_int,
                1,
                opaque,
                None,
                Some(write_packet),
                None,
            )
        } else {
            avio_alloc_context(
                buffer,
                BUFFER_SIZE as c_int,
                0,
                opaque,
                Some(read_packet),
                None,
                Some(seek),
            )
        }
    };
    if ctx.is_null() {
        // The context does not take ownership of the buffer when it fails.
        unsafe { av_free(buffer as *mut c_void) };
        return Err(code::ENOMEM);
    }
    Ok(ctx)
}

unsafe fn free_context(ctx: &mut *mut AVIOContext) {
    if !ctx.is_null() {
        // The internal buffer may have been reallocated; free the current one.
        unsafe {
            av_freep(&mut (**ctx).buffer as *mut *mut u8 as *mut c_void);
            avio_context_free(ctx);
        }
    }
}

/**
    A read-only AVIOContext over a boxed reader.
*/
pub struct AvioReader {
    pub ctx: *mut AVIOContext,
    opaque: *mut Box<dyn ReadSeek>,
}

impl AvioReader {
    pub fn new(reader: Box<dyn ReadSeek>) -> Result<Self, c_int> {
        let opaque = Box::into_raw(Box::new(reader));
        match alloc_context(false, opaque as *mut c_void) {
            Ok(ctx) => Ok(Self { ctx, opaque }),
            Err(code) => {
                // SAFETY: opaque was just created by Box::into_raw.
                drop(unsafe { Box::from_raw(opaque) });
                Err(code)
            }
        }
    }
}

impl Drop for AvioReader {
    fn drop(&mut self) {
        unsafe {
            free_context(&mut self.ctx);
            drop(Box::from_raw(self.opaque));
        }
        self.opaque = ptr::null_mut();
    }
}

/**
    A write-only AVIOContext over a boxed writer.
*/
pub struct AvioWriter {
    pub ctx: *mut AVIOContext,
    opaque: *mut Box<dyn Write + Send>,
}

impl AvioWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Result<Self, c_int> {
        let opaque = Box::into_raw(Box::new(writer));
        match alloc_context(true, opaque as *mut c_void) {
            Ok(ctx) => Ok(Self { ctx, opaque }),
            Err(code) => {
                // SAFETY: opaque was just created by Box::into_raw.
                drop(unsafe { Box::from_raw(opaque) });
                Err(code)
            }
        }
    }

    /**
        Flush the writer after libavformat has flushed its buffer.
    */
    pub fn flush(&mut self) -> c_int {
        // SAFETY: opaque stays valid until drop.
        let writer = unsafe { &mut *self.opaque };
        match writer.flush() {
            Ok(()) => 0,
            Err(e) => io_error_code(&e),
        }
    }
}

impl Drop for AvioWriter {
    fn drop(&mut self) {
        unsafe {
            free_context(&mut self.ctx);
            drop(Box::from_raw(self.opaque));
        }
        self.opaque = ptr::null_mut();
    }
}
