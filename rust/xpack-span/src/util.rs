//! Byte-level helpers over checked spans.

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use xpack_common::{Result, error::Error};

use crate::{policy::SpanPolicy, range::fail_null, span::CheckedSpan};

/// Anything that has an address: spans, raw pointers and slices.
pub trait RawAddress {
    fn raw_address(&self) -> usize;
}

impl<T, P: SpanPolicy> RawAddress for CheckedSpan<'_, T, P> {
    fn raw_address(&self) -> usize {
        self.raw_ptr() as usize
    }
}

impl<T> RawAddress for *const T {
    fn raw_address(&self) -> usize {
        *self as usize
    }
}

impl<T> RawAddress for *mut T {
    fn raw_address(&self) -> usize {
        *self as usize
    }
}

impl<T> RawAddress for &[T] {
    fn raw_address(&self) -> usize {
        self.as_ptr() as usize
    }
}

/// Signed distance `a - b` in bytes.
pub fn ptr_diff_bytes(a: impl RawAddress, b: impl RawAddress) -> isize {
    a.raw_address().wrapping_sub(b.raw_address()) as isize
}

impl<P: SpanPolicy> CheckedSpan<'_, u8, P> {
    /// Borrows `n` bytes at the current position after checking them.
    fn bytes(&self, n: usize) -> Result<&[u8]> {
        if n == 0 {
            return Ok(&[]);
        }
        let p = self.raw_bytes(n)?;
        // SAFETY: `raw_bytes` verified the bytes lie inside the range (or the
        // span has no range and its constructor's contract applies). The
        // borrow does not escape the calling helper.
        Ok(unsafe { std::slice::from_raw_parts(p, n) })
    }

    pub fn get_le16(&self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    pub fn get_le32(&self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    pub fn get_le64(&self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.bytes(8)?))
    }

    pub fn get_be16(&self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.bytes(2)?))
    }

    pub fn get_be32(&self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.bytes(4)?))
    }

    pub fn set_le16(&self, v: u16) -> Result<()> {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.copy_from(&b)
    }

    pub fn set_le32(&self, v: u32) -> Result<()> {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.copy_from(&b)
    }

    pub fn set_be16(&self, v: u16) -> Result<()> {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.copy_from(&b)
    }

    pub fn set_be32(&self, v: u32) -> Result<()> {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.copy_from(&b)
    }

    /// Copies `dst.len()` bytes starting at the current position.
    pub fn copy_to(&self, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(self.bytes(dst.len())?);
        Ok(())
    }

    /// Overwrites `src.len()` bytes starting at the current position.
    pub fn copy_from(&self, src: &[u8]) -> Result<()> {
        let p = self.raw_bytes(src.len())?;
        if !src.is_empty() {
            // SAFETY: `raw_bytes` verified the destination bytes; `copy`
            // tolerates overlap with `src`.
            unsafe { std::ptr::copy(src.as_ptr(), p, src.len()) };
        }
        Ok(())
    }

    /// Length of the NUL-terminated string at the current position.
    ///
    /// With a base, the terminator must occur before the end of the range;
    /// otherwise the scan fails with a range violation instead of running off
    /// the buffer.
    pub fn safe_strlen(&self) -> Result<usize> {
        let p = self.raw_ptr();
        if p.is_null() {
            return Err(fail_null());
        }
        match self.remaining() {
            Some(n) => self
                .bytes(n)?
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::cant_unpack("safe_strlen: missing NUL terminator")),
            None => {
                // SAFETY: a span without a range is only created through the
                // unsafe constructors, whose contract covers this scan.
                Ok(unsafe { std::ffi::CStr::from_ptr(p as *const std::ffi::c_char) }
                    .to_bytes()
                    .len())
            }
        }
    }
}

/// Compares `n` bytes at the current positions of `a` and `b`, both of which
/// must hold at least `n` accessible bytes.
pub fn compare_bytes<P: SpanPolicy, Q: SpanPolicy>(
    a: &CheckedSpan<'_, u8, P>,
    b: &CheckedSpan<'_, u8, Q>,
    n: usize,
) -> Result<Ordering> {
    Ok(a.bytes(n)?.cmp(b.bytes(n)?))
}
