//! Size-then-fill fetching of variable-length records, and bounds-checked reading of the result.
use crate::error::{Error, Status};
use crate::sys::RsError;
use bytemuck::AnyBitPattern;
use log::{debug, warn};
use std::ffi::CStr;
use std::mem::size_of;

/// Fill calls attempted before a persistent buffer overflow is reported
pub const MAX_FETCH_ATTEMPTS: usize = 3;

/// Growable byte storage, 8-byte aligned so the library can place C records in it.
#[derive(Default)]
pub struct AlignedBuffer {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `len` zeroed bytes
    pub fn resize(&mut self, len: usize) {
        self.words.clear();
        self.words.resize((len + 7) / 8, 0);
        self.len = len;
    }

    /// Forget trailing bytes the library did not write
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.words)[..self.len]
    }
}

/// Fetch a variable-length record through a two-call entry point.
///
/// `fetch` is first called without a buffer to learn the size, then with a buffer of that size.
/// If the fill reports `BUFFER_OVERFLOW` (the record grew in between), the whole sequence is
/// retried, up to [`MAX_FETCH_ATTEMPTS`] fill calls. Returns `false` when the library reports
/// zero bytes, in which case no fill call is made. On success `buffer` holds exactly the bytes
/// written, at least `min_size` of them.
pub fn fetch_growable<F>(
    call: &'static str,
    buffer: &mut AlignedBuffer,
    min_size: usize,
    mut fetch: F,
) -> Result<bool, Error>
where
    F: FnMut(Option<&mut [u8]>, &mut u32) -> RsError,
{
    for attempt in 1..=MAX_FETCH_ATTEMPTS {
        let mut n_bytes = 0;
        match Status::check(fetch(None, &mut n_bytes)) {
            Ok(()) | Err(Status::BufferOverflow) => (),
            Err(status) => return Err(Error::status(call, status)),
        }

        if n_bytes == 0 {
            debug!("{} reported no data", call);
            buffer.resize(0);
            return Ok(false);
        }

        buffer.resize(n_bytes as usize);
        let mut written = n_bytes;
        match Status::check(fetch(Some(buffer.as_bytes_mut()), &mut written)) {
            Ok(()) => {
                let written = written as usize;
                if written > buffer.len() {
                    return Err(Error::invalid_buffer(
                        call,
                        format!("reported {} bytes written into {}", written, buffer.len()),
                    ));
                }
                if written < min_size {
                    return Err(Error::invalid_buffer(
                        call,
                        format!("{} bytes is smaller than the {} byte header", written, min_size),
                    ));
                }
                buffer.truncate(written);
                return Ok(true);
            }
            Err(Status::BufferOverflow) => {
                warn!(
                    "{} overflowed a {} byte buffer (attempt {}/{})",
                    call, n_bytes, attempt, MAX_FETCH_ATTEMPTS
                );
            }
            Err(status) => return Err(Error::status(call, status)),
        }
    }

    Err(Error::RetriesExhausted {
        call,
        attempts: MAX_FETCH_ATTEMPTS,
    })
}

/// Reads records out of a buffer the library filled, following the absolute pointers it wrote.
///
/// Pointers are never dereferenced; they are translated to offsets and every read is checked
/// against the buffer's bounds.
pub struct BufferView<'a> {
    call: &'static str,
    bytes: &'a [u8],
}

impl<'a> BufferView<'a> {
    pub fn new(call: &'static str, bytes: &'a [u8]) -> Self {
        Self { call, bytes }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_buffer(self.call, reason)
    }

    /// Translate an address written by the library into an offset of `len` bytes in the buffer
    fn offset_of(&self, address: usize, len: usize) -> Result<usize, Error> {
        let base = self.bytes.as_ptr() as usize;
        address
            .checked_sub(base)
            .filter(|offset| {
                offset
                    .checked_add(len)
                    .map_or(false, |end| end <= self.bytes.len())
            })
            .ok_or_else(|| {
                self.error(format!(
                    "{} bytes at {:#x} lie outside the {} byte buffer",
                    len,
                    address,
                    self.bytes.len()
                ))
            })
    }

    /// Read a `T` at byte `offset`
    pub fn read<T: AnyBitPattern>(&self, offset: usize) -> Result<T, Error> {
        let end = offset
            .checked_add(size_of::<T>())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.error(format!("record at offset {} is truncated", offset)))?;
        bytemuck::try_pod_read_unaligned(&self.bytes[offset..end])
            .map_err(|e| self.error(format!("{:?}", e)))
    }

    /// Read `count` consecutive `T`s starting at `address`
    pub fn read_array<T: AnyBitPattern>(
        &self,
        address: usize,
        count: u32,
    ) -> Result<Vec<T>, Error> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if address == 0 {
            return Err(self.error(format!("null array with {} elements", count)));
        }
        let count = count as usize;
        let len = size_of::<T>()
            .checked_mul(count)
            .ok_or_else(|| self.error("array length overflows"))?;
        let offset = self.offset_of(address, len)?;
        (0..count)
            .map(|i| self.read(offset + i * size_of::<T>()))
            .collect()
    }

    /// Read the NUL-terminated string at `address`. Null reads as the empty string.
    pub fn read_str(&self, address: usize) -> Result<String, Error> {
        if address == 0 {
            return Ok(String::new());
        }
        let offset = self.offset_of(address, 1)?;
        CStr::from_bytes_until_nul(&self.bytes[offset..])
            .map(|s| s.to_string_lossy().into_owned())
            .map_err(|_| self.error(format!("unterminated string at offset {}", offset)))
    }
}
