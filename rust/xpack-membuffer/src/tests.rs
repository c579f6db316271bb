use crate::{GuardedBuffer, use_guard_words, use_poisoning};

#[test]
fn test_empty_buffer() {
    let mut buf = GuardedBuffer::new();
    assert!(!buf.is_allocated());
    assert_eq!(buf.size(), 0);
    assert!(buf.as_ptr().is_null());
    assert!(buf.as_slice().is_empty());
    assert_eq!(buf.allocation_id(), None);
    assert!(buf.check_state().unwrap_err().is_internal());
    assert!(buf.fill(0, 0, 0).unwrap_err().is_internal());
    // releasing an empty buffer is a no-op
    buf.dealloc().unwrap();
    buf.dealloc().unwrap();
    assert!(buf.span().unwrap_err().is_internal());
}

#[test]
fn test_alloc_and_dealloc() {
    let before = GuardedBuffer::alloc_count();
    let mut buf = GuardedBuffer::new();
    buf.alloc(100).unwrap();
    assert!(buf.is_allocated());
    assert_eq!(buf.size(), 100);
    assert_eq!(buf.len(), 100);
    assert_eq!(buf.as_ptr() as usize % 16, 0);
    assert!(GuardedBuffer::alloc_count() > before);
    assert!(buf.allocation_id().unwrap() >= before);
    buf.check_state().unwrap();

    buf.dealloc().unwrap();
    assert!(!buf.is_allocated());
    assert_eq!(buf.size(), 0);

    // the handle can be reused
    buf.alloc(7).unwrap();
    assert_eq!(buf.size(), 7);
}

#[test]
fn test_alloc_rejects_bad_requests() {
    let mut buf = GuardedBuffer::new();
    assert!(buf.alloc(0).unwrap_err().is_internal());
    assert!(buf.alloc(u64::MAX).unwrap_err().is_out_of_memory());
    assert!(buf.alloc(xpack_common::size::MAX_MEM_SIZE + 1).unwrap_err().is_out_of_memory());
    assert!(!buf.is_allocated());

    buf.alloc(16).unwrap();
    let err = buf.alloc(16).unwrap_err();
    assert!(err.is_internal());
    assert_eq!(buf.size(), 16);
}

#[test]
fn test_fresh_payload_contents() {
    let buf = GuardedBuffer::with_size(64).unwrap();
    let first = buf[0];
    if use_poisoning() {
        assert_ne!(first, 0);
        assert!(buf.iter().all(|&b| b == first));
    } else {
        assert!(buf.iter().all(|&b| b == 0));
    }
}

#[test]
fn test_fill_and_clear() {
    let mut buf = GuardedBuffer::with_size(32).unwrap();
    buf.fill(4, 8, 0xab).unwrap();
    assert!(buf[4..12].iter().all(|&b| b == 0xab));
    buf.fill(32, 0, 0xcd).unwrap();
    buf.clear_range(6, 2).unwrap();
    assert_eq!(&buf[4..8], &[0xab, 0xab, 0, 0]);
    buf.clear().unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
#[should_panic(expected = "fill out of range")]
fn test_fill_past_end_panics() {
    let mut buf = GuardedBuffer::with_size(32).unwrap();
    let _ = buf.fill(30, 3, 0);
}

#[test]
#[should_panic(expected = "fill out of range")]
fn test_fill_overflow_panics() {
    let mut buf = GuardedBuffer::with_size(32).unwrap();
    let _ = buf.fill(usize::MAX, 2, 0);
}

#[test]
fn test_subref() {
    let mut buf = GuardedBuffer::with_size(16).unwrap();
    buf.clear().unwrap();
    let part = buf.subref("", 4, 4).unwrap();
    part.copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(&buf[3..9], &[0, 1, 2, 3, 4, 0]);

    assert!(buf.subref("", 16, 0).unwrap().is_empty());
    assert_eq!(buf.subref("", 0, 16).unwrap().len(), 16);

    let err = buf.subref("", 10, 7).unwrap_err();
    assert!(err.is_cant_pack());
    assert!(err.to_string().contains("bad subref 0xa 0x7"));

    let err = buf.subref("truncated section {} + {}", usize::MAX, 2).unwrap_err();
    assert!(err.is_cant_pack());
    assert!(err.to_string().contains(&format!("truncated section {:#x} + 0x2", usize::MAX)));
}

#[test]
fn test_raw_bytes_and_ptr_at() {
    let buf = GuardedBuffer::with_size(10).unwrap();
    let start = buf.raw_bytes(0).unwrap();
    assert_eq!(start as *const u8, buf.as_ptr());
    assert_eq!(buf.raw_bytes(10).unwrap(), start);
    assert!(buf.raw_bytes(11).unwrap_err().is_internal());

    assert_eq!(buf.ptr_at(3).unwrap(), start.wrapping_add(3));
    assert_eq!(buf.ptr_at(10).unwrap(), start.wrapping_add(10));
    assert!(buf.ptr_at(11).is_err());
    assert!(buf.ptr_at(u64::MAX).unwrap_err().is_out_of_memory());

    let empty = GuardedBuffer::new();
    assert!(empty.raw_bytes(0).unwrap().is_null());
    assert!(empty.raw_bytes(1).unwrap_err().is_internal());
}

#[test]
fn test_span_over_payload() {
    let mut buf = GuardedBuffer::with_size(8).unwrap();
    for (i, b) in buf.iter_mut().enumerate() {
        *b = i as u8;
    }
    let mut s = buf.span().unwrap();
    assert_eq!(s.raw_size_in_bytes(), 8);
    s.advance(7).unwrap();
    assert_eq!(s.read().unwrap(), 7);
    s.advance(1).unwrap();
    assert!(s.read().unwrap_err().is_cant_unpack());
    assert!(s.advance(1).is_err());
}

#[test]
fn test_void_ptr() {
    let mut buf = GuardedBuffer::with_size(4).unwrap();
    let p = buf.void_ptr();
    assert_eq!(p as *const u8, buf.as_ptr());
}

#[test]
fn test_buffer_moves_keep_payload() {
    let mut buf = GuardedBuffer::with_size(12).unwrap();
    buf.fill(0, 12, 0x5a).unwrap();
    let p = buf.as_ptr();
    let moved = buf;
    assert_eq!(moved.as_ptr(), p);
    moved.check_state().unwrap();
    assert!(moved.iter().all(|&b| b == 0x5a));
}

#[test]
fn test_overrun_past_end_detected() {
    if !use_guard_words() {
        return;
    }
    let mut buf = GuardedBuffer::with_size(24).unwrap();
    let id = buf.allocation_id();
    unsafe { *buf.as_mut_ptr().add(24) ^= 0xff };
    let err = buf.check_state().unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().contains("past end"));
    assert!(buf.fill(0, 1, 0).unwrap_err().is_internal());
    assert_eq!(buf.allocation_id(), id);

    // the corrupted block is leaked and the handle reset
    assert!(buf.dealloc().unwrap_err().is_internal());
    assert!(!buf.is_allocated());
    assert_eq!(buf.size(), 0);
    buf.dealloc().unwrap();
}

#[test]
fn test_underrun_detected() {
    if !use_guard_words() {
        return;
    }
    let mut buf = GuardedBuffer::with_size(24).unwrap();
    unsafe { *buf.as_mut_ptr().sub(1) ^= 0x01 };
    let err = buf.check_state().unwrap_err();
    assert!(err.to_string().contains("before allocated block (magic)"));
    assert!(buf.span().is_err());
    assert!(buf.dealloc().is_err());

    let mut buf = GuardedBuffer::with_size(24).unwrap();
    unsafe { *buf.as_mut_ptr().sub(5) ^= 0x01 };
    let err = buf.check_state().unwrap_err();
    assert!(err.to_string().contains("before allocated block (size)"));
    assert!(buf.dealloc().is_err());
}

#[test]
fn test_trailing_id_is_not_checked() {
    if !use_guard_words() {
        return;
    }
    let mut buf = GuardedBuffer::with_size(8).unwrap();
    unsafe { *buf.as_mut_ptr().add(8 + 4) ^= 0xff };
    buf.check_state().unwrap();
    buf.dealloc().unwrap();
}
