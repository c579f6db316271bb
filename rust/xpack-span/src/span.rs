//! `CheckedSpan`: a bounds-checked pointer over externally owned memory.

use std::{cell::Cell, fmt, marker::PhantomData};

use xpack_common::{Result, error::Error, verify_unpack};

use crate::{
    policy::{Bounded, MaybeBase, MaybeNull, SpanPolicy},
    range::{check_range, fail_not_same_base, fail_null, fail_overflow},
};

/// Nullable span with an optional base.
pub type SpanOrNull<'a, T> = CheckedSpan<'a, T, MaybeNull>;

/// Non-null span with an optional base.
pub type SpanOrPtr<'a, T> = CheckedSpan<'a, T, MaybeBase>;

/// Non-null span with a mandatory base; the default choice for new code.
pub type Span<'a, T> = CheckedSpan<'a, T, Bounded>;

/// Extent of a span's valid range, given either in bytes or in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanLen {
    Bytes(usize),
    Count(usize),
}

impl SpanLen {
    fn size_in_bytes(self, element_size: usize) -> Result<usize> {
        let bytes = match self {
            SpanLen::Bytes(n) => n,
            SpanLen::Count(n) => n.checked_mul(element_size).ok_or_else(fail_overflow)?,
        };
        if bytes > isize::MAX as usize {
            return Err(fail_overflow());
        }
        Ok(bytes)
    }
}

/// A pointer into a contiguous region of `T`, optionally carrying the region's
/// origin (`base`) and extent (`size_in_bytes`).
///
/// Whenever a base is present, every pointer the span accepts lies in
/// `[base, base + size_in_bytes]`, and every element it reads or writes lies
/// entirely inside `[base, base + size_in_bytes)`. Without a base (allowed by
/// the `MaybeNull` and `MaybeBase` policies only) accesses are unchecked.
///
/// Spans are cheap `Copy` values and never own memory. Reads and writes go
/// through the span by value, much like a shared slice of `Cell<T>`; the
/// lifetime `'a` ties safely constructed spans to the borrow of the
/// underlying storage.
pub struct CheckedSpan<'a, T, P: SpanPolicy> {
    ptr: *mut T,
    base: *mut T,
    size_in_bytes: usize,
    _marker: PhantomData<(&'a [Cell<T>], P)>,
}

impl<T, P: SpanPolicy> Clone for CheckedSpan<'_, T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, P: SpanPolicy> Copy for CheckedSpan<'_, T, P> {}

impl<'a, T, P: SpanPolicy> CheckedSpan<'a, T, P> {
    const ELEMENT_SIZE: usize = {
        assert!(std::mem::size_of::<T>() != 0, "spans over zero-sized types");
        std::mem::size_of::<T>()
    };

    /// Creates a span over the whole slice, based at its first element.
    pub fn new(slice: &'a mut [T]) -> Self {
        let ptr = slice.as_mut_ptr();
        CheckedSpan {
            ptr,
            base: ptr,
            size_in_bytes: std::mem::size_of_val(slice),
            _marker: PhantomData,
        }
    }

    /// Creates a span over a slice of cells, based at its first element.
    ///
    /// Unlike [`CheckedSpan::new`], this leaves the cells accessible through
    /// the shared reference while the span is alive.
    pub fn from_cells(cells: &'a [Cell<T>]) -> Self {
        CheckedSpan {
            ptr: cells.as_ptr() as *mut T,
            base: cells.as_ptr() as *mut T,
            size_in_bytes: std::mem::size_of_val(cells),
            _marker: PhantomData,
        }
    }

    /// Creates a span from a bare pointer, without range information.
    ///
    /// Fails for the `Bounded` policy (no base) and for non-null policies when
    /// `ptr` is null.
    ///
    /// # Safety
    ///
    /// Every element later accessed through the span (or through spans derived
    /// from it) must be valid for reads and writes for the lifetime `'a`.
    pub unsafe fn from_ptr(ptr: *mut T) -> Result<Self> {
        Self::make(ptr, std::ptr::null_mut(), 0)
    }

    /// Creates a span covering `len` starting at `ptr`, based at `ptr`.
    ///
    /// # Safety
    ///
    /// The region `[ptr, ptr + len)` must be valid for reads and writes for
    /// the lifetime `'a`. For nullable spans a null `ptr` yields a span with
    /// neither pointer nor base, and then the obligations of
    /// [`CheckedSpan::from_ptr`] apply.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: SpanLen) -> Result<Self> {
        let size = len.size_in_bytes(Self::ELEMENT_SIZE)?;
        Self::make(ptr, ptr, size)
    }

    /// Creates a span positioned at `ptr` inside the range `[base, base + len)`.
    ///
    /// # Safety
    ///
    /// The region `[base, base + len)` must be valid for reads and writes for
    /// the lifetime `'a`.
    pub unsafe fn from_raw_parts_with_base(
        ptr: *mut T,
        len: SpanLen,
        base: *mut T,
    ) -> Result<Self> {
        let size = len.size_in_bytes(Self::ELEMENT_SIZE)?;
        Self::make(ptr, base, size)
    }

    /// Validates the raw parts against the policy.
    pub(crate) fn make(ptr: *mut T, base: *mut T, size_in_bytes: usize) -> Result<Self> {
        if !P::NULLABLE && ptr.is_null() {
            return Err(fail_null());
        }
        if P::BASE_REQUIRED && base.is_null() {
            return Err(Error::cant_unpack("span unexpected NULL base; take care!"));
        }
        if size_in_bytes > isize::MAX as usize {
            return Err(fail_overflow());
        }
        let span = CheckedSpan {
            ptr,
            base,
            size_in_bytes: if base.is_null() { 0 } else { size_in_bytes },
            _marker: PhantomData,
        };
        if !ptr.is_null() && !base.is_null() {
            span.check_ptr(ptr)?;
        }
        Ok(span)
    }

    /// The current pointer.
    #[inline]
    pub fn raw_ptr(&self) -> *mut T {
        self.ptr
    }

    /// The base pointer, or null if the span carries no range.
    #[inline]
    pub fn raw_base(&self) -> *mut T {
        self.base
    }

    /// Extent of the valid range, measured from the base. Zero without a base.
    #[inline]
    pub fn raw_size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// The current pointer as a plain `*const T`, for legacy interop.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    /// Drops the range information and returns the current pointer.
    #[inline]
    pub fn into_raw(self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    #[inline]
    pub fn has_base(&self) -> bool {
        !self.base.is_null()
    }

    /// Number of whole elements between the current pointer and the end of
    /// the range, or `None` without a base or with a null pointer.
    pub fn remaining(&self) -> Option<usize> {
        if self.base.is_null() || self.ptr.is_null() {
            return None;
        }
        let end = (self.base as usize).wrapping_add(self.size_in_bytes);
        Some(end.wrapping_sub(self.ptr as usize) / Self::ELEMENT_SIZE)
    }

    /// Offset of the current pointer from the base, in bytes.
    pub fn offset_from_base(&self) -> Option<usize> {
        if self.base.is_null() || self.ptr.is_null() {
            return None;
        }
        Some((self.ptr as usize).wrapping_sub(self.base as usize))
    }

    /// Reads the element at `self[index]`.
    pub fn get(&self, index: isize) -> Result<T>
    where
        T: Copy,
    {
        let p = self.element_ptr(index)?;
        // SAFETY: `element_ptr` verified the element lies inside the range, or
        // the span has no range and the constructor's contract applies.
        Ok(unsafe { p.read_unaligned() })
    }

    /// Reads the element at the current pointer.
    #[inline]
    pub fn read(&self) -> Result<T>
    where
        T: Copy,
    {
        self.get(0)
    }

    /// Writes `value` to `self[index]`.
    pub fn set(&self, index: isize, value: T) -> Result<()>
    where
        T: Copy,
    {
        let p = self.element_ptr(index)?;
        // SAFETY: see `get`.
        unsafe { p.write_unaligned(value) };
        Ok(())
    }

    /// Writes `value` to the element at the current pointer.
    #[inline]
    pub fn write(&self, value: T) -> Result<()>
    where
        T: Copy,
    {
        self.set(0, value)
    }

    /// Returns a span moved by `n` elements (`self + n`).
    pub fn offset(self, n: isize) -> Result<Self> {
        let ptr = self.check_add(n)?;
        Ok(CheckedSpan { ptr, ..self })
    }

    /// Moves the span by `n` elements (`self += n`).
    pub fn advance(&mut self, n: isize) -> Result<()> {
        self.ptr = self.check_add(n)?;
        Ok(())
    }

    /// Moves the span back by `n` elements (`self -= n`).
    pub fn retreat(&mut self, n: isize) -> Result<()> {
        let n = n.checked_neg().ok_or_else(fail_overflow)?;
        self.advance(n)
    }

    /// Pre-increment: moves by one element.
    #[inline]
    pub fn inc(&mut self) -> Result<()> {
        self.advance(1)
    }

    /// Pre-decrement: moves back by one element.
    #[inline]
    pub fn dec(&mut self) -> Result<()> {
        self.advance(-1)
    }

    /// Post-increment: moves by one element and returns the previous span.
    pub fn post_inc(&mut self) -> Result<Self> {
        let prev = *self;
        self.advance(1)?;
        Ok(prev)
    }

    /// Post-decrement: moves back by one element and returns the previous span.
    pub fn post_dec(&mut self) -> Result<Self> {
        let prev = *self;
        self.advance(-1)?;
        Ok(prev)
    }

    /// Replaces the current pointer, keeping base and size.
    ///
    /// Non-null policies reject a null `p`. With a base, `p` must lie in
    /// `[base, base + size]`.
    ///
    /// # Safety
    ///
    /// If the span carries no base, `p` must satisfy the contract of
    /// [`CheckedSpan::from_ptr`].
    pub unsafe fn assign_ptr(&mut self, p: *mut T) -> Result<()> {
        self.ptr = self.make_ptr(p)?;
        Ok(())
    }

    /// Assigns from another span of the same policy.
    ///
    /// Fails with an internal error if both spans carry a base and the bases
    /// differ, even if the incoming pointer is numerically in range. A span
    /// without a base adopts the base and size of `other`.
    pub fn assign(&mut self, other: Self) -> Result<()> {
        self.assign_parts(other.ptr, other.base, other.size_in_bytes)
    }

    /// Returns a sub-window starting `offset` elements past the current
    /// pointer.
    ///
    /// With `count >= 0` the window ends `min(count, remaining)` elements past
    /// its start; a negative `count` keeps everything up to the end of the
    /// range except the last `-count` elements. The base is inherited, so the
    /// window may still index backwards into the parent range; only its end
    /// shrinks. A span without a base has no known end and yields a window
    /// without a base, ignoring `count`.
    pub fn subspan(&self, offset: isize, count: isize) -> Result<Self> {
        let begin = self.check_add(offset)?;
        if self.base.is_null() {
            return Ok(CheckedSpan { ptr: begin, ..*self });
        }
        // `check_add` keeps `begin` within `[base, base + size]`
        let head = (begin as usize).wrapping_sub(self.base as usize);
        let remaining = (self.size_in_bytes - head) / Self::ELEMENT_SIZE;
        let elements = if count >= 0 {
            (count as usize).min(remaining)
        } else {
            let trim = count.unsigned_abs();
            verify_unpack!(trim <= remaining, "span subspan: count out of range; take care!");
            remaining - trim
        };
        Ok(CheckedSpan {
            ptr: begin,
            base: self.base,
            size_in_bytes: head + elements * Self::ELEMENT_SIZE,
            _marker: PhantomData,
        })
    }

    /// Returns the current pointer after verifying that `size_in_bytes` bytes
    /// starting there are accessible.
    pub fn raw_bytes(&self, size_in_bytes: usize) -> Result<*mut T> {
        if size_in_bytes > 0 {
            if self.ptr.is_null() {
                return Err(fail_null());
            }
            if !self.base.is_null() {
                let limit = self.size_in_bytes as isize
                    - size_in_bytes.min(isize::MAX as usize) as isize;
                check_range(self.ptr as *const u8, self.base as *const u8, limit)?;
            }
        }
        Ok(self.ptr)
    }

    pub(crate) fn assign_parts(
        &mut self,
        ptr: *mut T,
        base: *mut T,
        size_in_bytes: usize,
    ) -> Result<()> {
        if !self.base.is_null() && !base.is_null() && self.base != base {
            return Err(fail_not_same_base());
        }
        if self.base.is_null() {
            if !P::NULLABLE && ptr.is_null() {
                return Err(fail_null());
            }
            self.ptr = ptr;
            self.base = base;
            self.size_in_bytes = size_in_bytes;
        } else {
            self.ptr = self.make_ptr(ptr)?;
        }
        Ok(())
    }

    /// Validates a pointer about to become the current pointer.
    fn make_ptr(&self, p: *mut T) -> Result<*mut T> {
        if p.is_null() {
            if P::NULLABLE {
                return Ok(p);
            }
            return Err(fail_null());
        }
        if !self.base.is_null() {
            self.check_ptr(p)?;
        }
        Ok(p)
    }

    #[inline]
    fn check_ptr(&self, p: *mut T) -> Result<()> {
        check_range(
            p as *const u8,
            self.base as *const u8,
            self.size_in_bytes as isize,
        )
    }

    /// Computes `ptr + n` and checks it against the range.
    fn check_add(&self, n: isize) -> Result<*mut T> {
        if self.ptr.is_null() {
            return Err(fail_null());
        }
        let p = self.shifted(n)?;
        if !self.base.is_null() {
            self.check_ptr(p)?;
        }
        Ok(p)
    }

    /// Computes `ptr + index` and checks that a whole element fits there.
    fn element_ptr(&self, index: isize) -> Result<*mut T> {
        if self.ptr.is_null() {
            return Err(fail_null());
        }
        let p = self.shifted(index)?;
        if !self.base.is_null() {
            check_range(
                p as *const u8,
                self.base as *const u8,
                self.size_in_bytes as isize - Self::ELEMENT_SIZE as isize,
            )?;
        }
        Ok(p)
    }

    fn shifted(&self, n: isize) -> Result<*mut T> {
        let bytes = n
            .checked_mul(Self::ELEMENT_SIZE as isize)
            .ok_or_else(fail_overflow)?;
        Ok((self.ptr as *mut u8).wrapping_offset(bytes) as *mut T)
    }
}

impl<'a, T> CheckedSpan<'a, T, MaybeNull> {
    /// A span with neither pointer nor base.
    pub const fn null() -> Self {
        CheckedSpan {
            ptr: std::ptr::null_mut(),
            base: std::ptr::null_mut(),
            size_in_bytes: 0,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CheckedSpan<'_, T, MaybeNull> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, P: SpanPolicy> fmt::Debug for CheckedSpan<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(P::NAME)
            .field("ptr", &self.ptr)
            .field("base", &self.base)
            .field("size_in_bytes", &self.size_in_bytes)
            .finish()
    }
}

impl<T, P: SpanPolicy, Q: SpanPolicy> PartialEq<CheckedSpan<'_, T, Q>> for CheckedSpan<'_, T, P> {
    fn eq(&self, other: &CheckedSpan<'_, T, Q>) -> bool {
        self.ptr == other.ptr
    }
}

impl<T, P: SpanPolicy> Eq for CheckedSpan<'_, T, P> {}

impl<T, P: SpanPolicy> PartialEq<*mut T> for CheckedSpan<'_, T, P> {
    fn eq(&self, other: &*mut T) -> bool {
        self.ptr == *other
    }
}

impl<T, P: SpanPolicy> PartialEq<*const T> for CheckedSpan<'_, T, P> {
    fn eq(&self, other: &*const T) -> bool {
        self.ptr as *const T == *other
    }
}

impl<'a, T, P: SpanPolicy> From<&'a mut [T]> for CheckedSpan<'a, T, P> {
    fn from(slice: &'a mut [T]) -> Self {
        CheckedSpan::new(slice)
    }
}

impl<'a, T, P: SpanPolicy, const N: usize> From<&'a mut [T; N]> for CheckedSpan<'a, T, P> {
    fn from(array: &'a mut [T; N]) -> Self {
        CheckedSpan::new(array.as_mut_slice())
    }
}
