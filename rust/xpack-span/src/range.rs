//! The shared range-check primitive.

use std::sync::atomic::{AtomicU64, Ordering};

use xpack_common::{Result, error::Error};

/// Number of successful [`check_range`] calls since process start.
static CHECK_RANGE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Verifies that `p` lies within `[base, base + size_in_bytes]`.
///
/// Fails with a `CantUnpack` error if `p` is null, if `base` is null, or if
/// `p - base` is negative or greater than `size_in_bytes`. A negative
/// `size_in_bytes` (as produced when asking for an element that does not fit)
/// rejects every pointer.
#[inline(never)]
pub fn check_range(p: *const u8, base: *const u8, size_in_bytes: isize) -> Result<()> {
    if p.is_null() {
        return Err(Error::cant_unpack(
            "span check_range: unexpected NULL pointer; take care!",
        ));
    }
    if base.is_null() {
        return Err(Error::cant_unpack(
            "span check_range: unexpected NULL base; take care!",
        ));
    }
    let off = (p as usize).wrapping_sub(base as usize) as isize;
    if off < 0 || off > size_in_bytes {
        return Err(Error::cant_unpack(
            "span check_range: pointer out of range; take care!",
        ));
    }
    CHECK_RANGE_COUNT.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Returns the number of range checks that passed so far.
///
/// This is a coverage aid only; nothing depends on its value.
pub fn check_range_count() -> u64 {
    CHECK_RANGE_COUNT.load(Ordering::Relaxed)
}

#[cold]
pub(crate) fn fail_null() -> Error {
    Error::cant_unpack("span unexpected NULL pointer; take care!")
}

#[cold]
pub(crate) fn fail_not_same_base() -> Error {
    Error::internal("span unexpected base pointer; take care!")
}

#[cold]
pub(crate) fn fail_overflow() -> Error {
    Error::cant_unpack("span offset overflow; take care!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_bounds() {
        let buf = [0u8; 8];
        let base = buf.as_ptr();
        assert!(check_range(base, base, 8).is_ok());
        assert!(check_range(base.wrapping_add(8), base, 8).is_ok());
        assert!(check_range(base.wrapping_add(9), base, 8).is_err());
        assert!(check_range(base.wrapping_sub(1), base, 8).is_err());
        assert!(check_range(base, base, 0).is_ok());
        assert!(check_range(base, base, -1).is_err());
    }

    #[test]
    fn test_check_range_null() {
        let buf = [0u8; 4];
        let err = check_range(std::ptr::null(), buf.as_ptr(), 4).unwrap_err();
        assert!(err.is_cant_unpack());
        assert!(err.message().contains("NULL pointer"));
        let err = check_range(buf.as_ptr(), std::ptr::null(), 4).unwrap_err();
        assert!(err.message().contains("NULL base"));
    }

    #[test]
    fn test_check_range_counter() {
        let buf = [0u8; 4];
        let before = check_range_count();
        check_range(buf.as_ptr(), buf.as_ptr(), 4).unwrap();
        assert!(check_range_count() > before);
    }
}
