use xpack_membuffer::{GuardedBuffer, sizing};

#[test]
fn test_size_for_compression_is_monotonic() {
    let mut rng = fastrand::Rng::with_seed(0xb0f);
    let mut samples: Vec<u32> = (0..2000).map(|_| rng.u32(0..64 * 1024 * 1024)).collect();
    samples.extend((0..=26).map(|bit| 1u32 << bit));
    samples.extend((1..=26).map(|bit| (1u32 << bit) - 1));
    samples.sort_unstable();

    let mut prev = 0;
    for z in samples {
        let size = sizing::size_for_compression(z, 0).unwrap();
        assert!(size >= prev, "not monotonic at {z}");
        assert!(size as u64 >= z as u64 + 1);
        assert!(size as u64 >= z as u64 + z as u64 / 8 + 256);
        prev = size;
    }
}

#[test]
fn test_extra_is_additive() {
    for z in [0u32, 1, 17, 4096, 1 << 20] {
        let base = sizing::size_for_compression(z, 0).unwrap();
        assert_eq!(sizing::size_for_compression(z, 100).unwrap(), base + 100);
        assert_eq!(sizing::size_for_uncompression(z, 100).unwrap(), z + 100);
    }
}

#[test]
fn test_alloc_for_compression_capacity() {
    let extra = 48;
    let mut buf = GuardedBuffer::new();
    buf.alloc_for_compression(1000, extra).unwrap();
    assert!(buf.size() >= 1000 + 1 + extra + 256);
    buf.clear().unwrap();
    buf.dealloc().unwrap();

    buf.alloc_for_uncompression(1000, extra).unwrap();
    assert_eq!(buf.size(), 1000 + extra);
}

#[test]
fn test_subref_accepts_exactly_the_in_range_windows() {
    let mut rng = fastrand::Rng::with_seed(0x5b7e);
    let mut buf = GuardedBuffer::with_size(257).unwrap();
    let size = buf.len();
    for _ in 0..5000 {
        let skip = rng.usize(0..300);
        let take = rng.usize(0..300);
        let start = buf.as_ptr() as usize;
        match buf.subref("", skip, take) {
            Ok(part) => {
                assert!(skip + take <= size);
                assert_eq!(part.len(), take);
                assert_eq!(part.as_ptr() as usize, start + skip);
            }
            Err(e) => {
                assert!(skip + take > size);
                assert!(e.is_cant_pack());
            }
        }
    }
    buf.check_state().unwrap();
}

#[test]
fn test_many_buffers_stay_intact() {
    let mut rng = fastrand::Rng::with_seed(7);
    let mut bufs = Vec::new();
    for i in 0..64u8 {
        let mut buf = GuardedBuffer::with_size(rng.u64(1..4096)).unwrap();
        let len = buf.len();
        buf.fill(0, len, i).unwrap();
        bufs.push(buf);
    }
    for (i, buf) in bufs.iter().enumerate() {
        buf.check_state().unwrap();
        assert!(buf.iter().all(|&b| b == i as u8));
    }
    let ids: std::collections::HashSet<_> = bufs.iter().map(|b| b.allocation_id()).collect();
    assert_eq!(ids.len(), bufs.len());
    for mut buf in bufs {
        buf.dealloc().unwrap();
    }
}
