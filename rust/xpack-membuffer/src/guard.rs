//! Guard words around heap payloads.
//!
//! With guard-checking active, each block is laid out as
//!
//! ```text
//! | 8 bytes unused | size | MAGIC1 | payload ... | MAGIC2 | alloc id | 8 bytes unused |
//!                  ^-8    ^-4      ^0            ^size
//! ```
//!
//! All words are big-endian `u32`. The magic values are derived from the low
//! 32 bits of the payload address, so a block copied elsewhere or a stale
//! pointer into a recycled block fails verification. This is a best-effort
//! corruption detector, not a security boundary.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

/// Bytes reserved in front of the payload.
pub(crate) const GUARD_HEAD: usize = 16;

/// Total bytes added to every allocation.
pub(crate) const GUARD_OVERHEAD: u64 = 32;

const MAGIC1_XOR: u32 = 0xfefd_beeb;
const MAGIC2_XOR: u32 = 0x8002_4001;

/// Whether allocations carry guard words.
///
/// Miri tracks every allocation precisely, which makes the markers redundant.
pub const fn use_guard_words() -> bool {
    cfg!(feature = "guard-check") && !cfg!(miri)
}

/// Whether fresh payloads are filled with a random non-zero byte.
pub const fn use_poisoning() -> bool {
    cfg!(debug_assertions) || cfg!(miri)
}

/// One of the three verified guard words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMarker {
    BeforeSize,
    BeforeMagic,
    AfterMagic,
}

impl fmt::Display for GuardMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardMarker::BeforeSize => "memory clobbered before allocated block (size)",
            GuardMarker::BeforeMagic => "memory clobbered before allocated block (magic)",
            GuardMarker::AfterMagic => "memory clobbered past end of allocated block",
        };
        f.write_str(s)
    }
}

#[inline]
fn magic1(payload: *const u8) -> u32 {
    (payload as usize as u32) ^ MAGIC1_XOR
}

#[inline]
fn magic2(payload: *const u8) -> u32 {
    magic1(payload) ^ MAGIC2_XOR
}

/// # Safety
///
/// `p` must be valid for reads of 4 bytes.
unsafe fn read_word(p: *const u8) -> u32 {
    BigEndian::read_u32(unsafe { std::slice::from_raw_parts(p, 4) })
}

/// # Safety
///
/// `p` must be valid for writes of 4 bytes.
unsafe fn write_word(p: *mut u8, v: u32) {
    BigEndian::write_u32(unsafe { std::slice::from_raw_parts_mut(p, 4) }, v);
}

/// Writes all guard words for a payload of `size` bytes.
///
/// # Safety
///
/// `payload` must come from a guarded block of `size + GUARD_OVERHEAD` bytes,
/// offset by `GUARD_HEAD`.
pub(crate) unsafe fn write_guards(payload: *mut u8, size: u32, alloc_id: u32) {
    let end = size as usize;
    unsafe {
        write_word(payload.sub(8), size);
        write_word(payload.sub(4), magic1(payload));
        write_word(payload.add(end), magic2(payload));
        write_word(payload.add(end + 4), alloc_id);
    }
}

/// Zeroes all guard words so a stale pointer into a freed block cannot pass
/// verification.
///
/// # Safety
///
/// Same as [`write_guards`].
pub(crate) unsafe fn clear_guards(payload: *mut u8, size: u32) {
    let end = size as usize;
    unsafe {
        write_word(payload.sub(8), 0);
        write_word(payload.sub(4), 0);
        write_word(payload.add(end), 0);
        write_word(payload.add(end + 4), 0);
    }
}

/// Returns the first guard word that does not hold its expected value.
///
/// # Safety
///
/// Same as [`write_guards`].
pub(crate) unsafe fn find_clobbered(payload: *const u8, size: u32) -> Option<GuardMarker> {
    let end = size as usize;
    unsafe {
        if read_word(payload.sub(4)) != magic1(payload) {
            return Some(GuardMarker::BeforeMagic);
        }
        if read_word(payload.sub(8)) != size {
            return Some(GuardMarker::BeforeSize);
        }
        if read_word(payload.add(end)) != magic2(payload) {
            return Some(GuardMarker::AfterMagic);
        }
    }
    None
}

/// Reads the allocation id stored behind the payload.
///
/// # Safety
///
/// Same as [`write_guards`].
pub(crate) unsafe fn read_alloc_id(payload: *const u8, size: u32) -> u32 {
    unsafe { read_word(payload.add(size as usize + 4)) }
}
