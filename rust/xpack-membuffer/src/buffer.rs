use std::{
    alloc::{self, Layout},
    ffi::c_void,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU32, Ordering},
};

use xpack_common::{
    error::Error,
    result::{Result, internal_error},
    size::{mem_size, mem_size_valid, to_u32},
    verify_internal,
};
use xpack_span::Span;

use crate::{
    guard::{self, GUARD_HEAD, GUARD_OVERHEAD, use_guard_words, use_poisoning},
    sizing,
};

const BLOCK_ALIGN: usize = 16;

/// Template used by [`GuardedBuffer::subref`] when the caller passes an
/// empty one.
pub const DEFAULT_SUBREF_ERROR: &str = "bad subref {} {}";

/// Process-wide number of successful allocations.
static ALLOC_COUNTER: AtomicU32 = AtomicU32::new(0);

/// An owned, guarded heap buffer.
///
/// The buffer is either empty (no payload, size 0) or owns exactly one heap
/// block. With the `guard-check` feature the payload is surrounded by guard
/// words (see [`crate::guard`]) that are re-verified by [`check_state`],
/// [`fill`] and on release.
///
/// `GuardedBuffer` is neither `Clone` nor `Sync`. Moving the handle is fine:
/// the payload lives on the heap and does not move with it.
///
/// [`check_state`]: GuardedBuffer::check_state
/// [`fill`]: GuardedBuffer::fill
pub struct GuardedBuffer {
    /// Start of the payload, null while empty.
    ptr: *mut u8,
    size: u32,
    alloc_id: u32,
}

impl GuardedBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> GuardedBuffer {
        GuardedBuffer {
            ptr: std::ptr::null_mut(),
            size: 0,
            alloc_id: 0,
        }
    }

    /// Creates a buffer holding `size` bytes.
    pub fn with_size(size: u64) -> Result<GuardedBuffer> {
        let mut buf = GuardedBuffer::new();
        buf.alloc(size)?;
        Ok(buf)
    }

    /// Number of successful allocations made by all buffers in this process.
    pub fn alloc_count() -> u32 {
        ALLOC_COUNTER.load(Ordering::Relaxed)
    }

    /// Worst-case output size for compressing `uncompressed_size` bytes.
    pub fn size_for_compression(uncompressed_size: u32, extra: u32) -> Result<u32> {
        sizing::size_for_compression(uncompressed_size, extra)
    }

    /// Output size for decompressing into `uncompressed_size` bytes.
    pub fn size_for_uncompression(uncompressed_size: u32, extra: u32) -> Result<u32> {
        sizing::size_for_uncompression(uncompressed_size, extra)
    }

    /// Allocates the payload.
    ///
    /// Fails with an internal error when the buffer already holds a block or
    /// `size` is zero, and with `OutOfMemory` when `size` exceeds the global
    /// limit or the allocator refuses.
    pub fn alloc(&mut self, size: u64) -> Result<()> {
        verify_internal!(self.ptr.is_null(), "buffer already allocated");
        verify_internal!(size > 0, "zero-sized buffer allocation");
        let size = to_u32(mem_size(1, size, &[])?)?;
        let total = if use_guard_words() {
            mem_size(1, size as u64, &[GUARD_OVERHEAD])?
        } else {
            size as usize
        };
        let layout = Layout::from_size_align(total, BLOCK_ALIGN)?;
        // Poisoned payloads are overwritten right away; everything else
        // starts zeroed so the bytes are initialized.
        let block = unsafe {
            if use_poisoning() {
                alloc::alloc(layout)
            } else {
                alloc::alloc_zeroed(layout)
            }
        };
        if block.is_null() {
            log::error!("allocation of {total} bytes failed");
            return Err(Error::out_of_memory(Some(total as u64)));
        }

        let alloc_id = ALLOC_COUNTER.fetch_add(1, Ordering::Relaxed);
        let payload = if use_guard_words() {
            unsafe {
                // head and tail padding are never read
                std::ptr::write_bytes(block, 0, GUARD_HEAD);
                std::ptr::write_bytes(block.add(GUARD_HEAD + size as usize), 0, GUARD_HEAD);
                let payload = block.add(GUARD_HEAD);
                guard::write_guards(payload, size, alloc_id);
                payload
            }
        } else {
            block
        };
        if use_poisoning() {
            let poison = fastrand::u8(..) | 1;
            unsafe { std::ptr::write_bytes(payload, poison, size as usize) };
        }

        self.ptr = payload;
        self.size = size;
        self.alloc_id = alloc_id;
        log::trace!("allocated buffer #{alloc_id} of {size} bytes");
        self.check_state()
    }

    /// Allocates enough room to compress `uncompressed_size` bytes.
    pub fn alloc_for_compression(&mut self, uncompressed_size: u32, extra: u32) -> Result<()> {
        let size = sizing::size_for_compression(uncompressed_size, extra)?;
        self.alloc(size as u64)
    }

    /// Allocates enough room to decompress into `uncompressed_size` bytes.
    pub fn alloc_for_uncompression(&mut self, uncompressed_size: u32, extra: u32) -> Result<()> {
        let size = sizing::size_for_uncompression(uncompressed_size, extra)?;
        self.alloc(size as u64)
    }

    /// Releases the payload and returns the buffer to the empty state.
    ///
    /// A no-op on an empty buffer. If the guard words are corrupted the block
    /// is deliberately leaked, the handle is still reset and the corruption
    /// is reported.
    pub fn dealloc(&mut self) -> Result<()> {
        if self.ptr.is_null() {
            return Ok(());
        }
        if let Err(e) = self.check_state() {
            log::error!("leaking corrupted buffer #{}: {e}", self.alloc_id);
            self.reset();
            return Err(e);
        }

        let payload = self.ptr;
        let size = self.size;
        log::trace!("releasing buffer #{} of {size} bytes", self.alloc_id);
        self.reset();
        unsafe {
            let (block, total) = if use_guard_words() {
                guard::clear_guards(payload, size);
                (payload.sub(GUARD_HEAD), size as usize + GUARD_OVERHEAD as usize)
            } else {
                (payload, size as usize)
            };
            // Same layout as in `alloc`, which already validated it.
            let layout = Layout::from_size_align_unchecked(total, BLOCK_ALIGN);
            alloc::dealloc(block, layout);
        }
        Ok(())
    }

    /// Verifies the buffer's integrity.
    ///
    /// Fails on an empty buffer. An allocated one must have a valid size
    /// and, with guard-checking active, intact guard words.
    pub fn check_state(&self) -> Result<()> {
        if self.ptr.is_null() {
            return internal_error("block not allocated");
        }
        if !mem_size_valid(1, self.size as u64, &[]) {
            return internal_error(&format!("invalid buffer size {}", self.size));
        }
        if use_guard_words() {
            if let Some(marker) = unsafe { guard::find_clobbered(self.ptr, self.size) } {
                log::error!("buffer #{} corrupted: {marker}", self.alloc_id);
                return internal_error(&marker.to_string());
            }
        }
        Ok(())
    }

    /// Payload size in bytes, zero while empty.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.ptr.is_null()
    }

    /// Sequence number of the current block, if any.
    ///
    /// With guard-checking active the value is read back from the block
    /// trailer.
    pub fn allocation_id(&self) -> Option<u32> {
        if self.ptr.is_null() {
            return None;
        }
        if use_guard_words() {
            Some(unsafe { guard::read_alloc_id(self.ptr, self.size) })
        } else {
            Some(self.alloc_id)
        }
    }

    /// Start of the payload, null while empty.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Untyped start of the payload, for byte-level interfaces.
    #[inline]
    pub fn void_ptr(&mut self) -> *mut c_void {
        self.ptr.cast()
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, self.size as usize) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.ptr.is_null() {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size as usize) }
    }

    /// Returns a strict span over the whole payload.
    pub fn span(&mut self) -> Result<Span<'_, u8>> {
        self.check_state()?;
        Ok(Span::new(self.as_mut_slice()))
    }

    /// Returns the payload start after checking that `bytes` fit in it.
    pub fn raw_bytes(&self, bytes: usize) -> Result<*mut u8> {
        if bytes > 0 {
            if self.ptr.is_null() {
                return internal_error("raw_bytes on unallocated buffer");
            }
            if bytes > self.size as usize {
                return internal_error(&format!(
                    "raw_bytes {bytes} exceeds buffer size {}",
                    self.size
                ));
            }
        }
        Ok(self.ptr)
    }

    /// Pointer to the payload byte at offset `n`, which may be one past the
    /// end.
    pub fn ptr_at(&self, n: u64) -> Result<*mut u8> {
        let n = mem_size(1, n, &[])?;
        let start = self.raw_bytes(n)?;
        Ok(start.wrapping_add(n))
    }

    /// Writes `len` copies of `value` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics when the range does not lie within the payload.
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<()> {
        self.check_state()?;
        let size = self.size as usize;
        assert!(
            offset <= size && len <= size && offset.checked_add(len).is_some_and(|end| end <= size),
            "fill out of range: offset {offset}, len {len}, size {size}"
        );
        if len > 0 {
            unsafe { std::ptr::write_bytes(self.ptr.add(offset), value, len) };
        }
        Ok(())
    }

    /// Zeroes `len` bytes starting at `offset`.
    pub fn clear_range(&mut self, offset: usize, len: usize) -> Result<()> {
        self.fill(offset, len, 0)
    }

    /// Zeroes the whole payload.
    pub fn clear(&mut self) -> Result<()> {
        self.fill(0, self.size as usize, 0)
    }

    /// Returns the `take` bytes starting at `skip`.
    ///
    /// On overflow or out-of-range access this fails with `CantPack`, using
    /// `errfmt` as the message; its first two `{}` placeholders are replaced
    /// with `skip` and `take` in hex. An empty `errfmt` selects
    /// [`DEFAULT_SUBREF_ERROR`].
    pub fn subref(&mut self, errfmt: &str, skip: usize, take: usize) -> Result<&mut [u8]> {
        let size = self.size as usize;
        match skip.checked_add(take) {
            Some(end) if end <= size => Ok(&mut self.as_mut_slice()[skip..end]),
            _ => Err(Error::cant_pack(format_subref_error(errfmt, skip, take))),
        }
    }

    fn reset(&mut self) {
        self.ptr = std::ptr::null_mut();
        self.size = 0;
        self.alloc_id = 0;
    }
}

fn format_subref_error(errfmt: &str, skip: usize, take: usize) -> String {
    let template = if errfmt.is_empty() { DEFAULT_SUBREF_ERROR } else { errfmt };
    let mut args = [skip, take].into_iter();
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(v) => out.push_str(&format!("{v:#x}")),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

impl Default for GuardedBuffer {
    fn default() -> Self {
        GuardedBuffer::new()
    }
}

impl Drop for GuardedBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.dealloc() {
            if !std::thread::panicking() {
                panic!("{e}");
            }
        }
    }
}

impl Deref for GuardedBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for GuardedBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for GuardedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for GuardedBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for GuardedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedBuffer")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("alloc_id", &self.alloc_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::format_subref_error;

    #[test]
    fn test_format_subref_error() {
        assert_eq!(format_subref_error("", 0x10, 0x20), "bad subref 0x10 0x20");
        assert_eq!(
            format_subref_error("bad header {} len {}", 3, 255),
            "bad header 0x3 len 0xff"
        );
        assert_eq!(format_subref_error("only {}", 1, 2), "only 0x1");
        assert_eq!(format_subref_error("{} {} {}", 1, 2), "0x1 0x2 {}");
        assert_eq!(format_subref_error("no placeholders", 1, 2), "no placeholders");
    }
}
