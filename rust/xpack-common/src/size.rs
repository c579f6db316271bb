//! Overflow-checked allocation size arithmetic.
//!
//! Every buffer size derived from (possibly attacker-controlled) header fields
//! goes through [`mem_size`], which either yields a combined byte count below
//! [`MAX_MEM_SIZE`] or fails with `OutOfMemory`.

use crate::{Result, result::out_of_memory};

/// Upper limit for a single allocation, in bytes (768 MiB).
pub const MAX_MEM_SIZE: u64 = 768 * 1024 * 1024;

/// Returns `element_size * count + sum(extra)`, or `OutOfMemory` if any
/// intermediate value overflows or the total exceeds [`MAX_MEM_SIZE`].
///
/// `element_size` must be non-zero.
///
/// # Examples
///
/// ```
/// use xpack_common::size::mem_size;
///
/// assert_eq!(mem_size(4, 10, &[]).unwrap(), 40);
/// assert_eq!(mem_size(1, 100, &[28, 256]).unwrap(), 384);
/// assert!(mem_size(8, u64::MAX, &[]).is_err());
/// ```
pub fn mem_size(element_size: u64, count: u64, extra: &[u64]) -> Result<usize> {
    if element_size == 0 || element_size > MAX_MEM_SIZE || count > MAX_MEM_SIZE {
        return out_of_memory(None);
    }
    let mut bytes = element_size * count;
    if bytes > MAX_MEM_SIZE {
        return out_of_memory(Some(bytes));
    }
    for &e in extra {
        if e > MAX_MEM_SIZE {
            return out_of_memory(None);
        }
        bytes += e;
        if bytes > MAX_MEM_SIZE {
            return out_of_memory(Some(bytes));
        }
    }
    Ok(usize::try_from(bytes)?)
}

/// Returns `true` if [`mem_size`] would succeed for the same arguments.
pub fn mem_size_valid(element_size: u64, count: u64, extra: &[u64]) -> bool {
    mem_size(element_size, count, extra).is_ok()
}

/// Narrowing conversion of a validated size to `u32`, failing with
/// `OutOfMemory` if it does not fit.
pub fn to_u32(bytes: usize) -> Result<u32> {
    Ok(u32::try_from(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_size_basic() {
        assert_eq!(mem_size(1, 0, &[]).unwrap(), 0);
        assert_eq!(mem_size(1, 1, &[]).unwrap(), 1);
        assert_eq!(mem_size(2, 3, &[4, 5]).unwrap(), 15);
        assert_eq!(mem_size(1, MAX_MEM_SIZE, &[]).unwrap() as u64, MAX_MEM_SIZE);
    }

    #[test]
    fn test_mem_size_limits() {
        assert!(mem_size(0, 1, &[]).unwrap_err().is_out_of_memory());
        assert!(mem_size(1, MAX_MEM_SIZE + 1, &[]).is_err());
        assert!(mem_size(1, MAX_MEM_SIZE, &[1]).is_err());
        assert!(mem_size(2, MAX_MEM_SIZE / 2 + 1, &[]).is_err());
        assert!(mem_size(1, 1, &[u64::MAX]).is_err());
        assert!(mem_size(u64::MAX, u64::MAX, &[]).is_err());
        assert!(!mem_size_valid(1, 1, &[MAX_MEM_SIZE]));
        assert!(mem_size_valid(1, 1, &[MAX_MEM_SIZE - 1]));
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(to_u32(17).unwrap(), 17);
        if usize::BITS > 32 {
            assert!(to_u32((u32::MAX as usize).saturating_add(1)).unwrap_err().is_out_of_memory());
        }
    }
}
