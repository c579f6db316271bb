//! Worst-case buffer sizes for the compression pipeline.

use xpack_common::{
    Result,
    size::{mem_size, to_u32},
};

/// Slack every compression buffer carries beyond its estimate.
const COMPRESSION_SLACK: u64 = 256;

/// Number of significant bits in `x`, at least 1.
#[inline]
pub(crate) fn bit_width(x: u32) -> u32 {
    (u32::BITS - x.leading_zeros()).max(1)
}

/// Upper bound on compressed output for `uncompressed_size` input bytes,
/// plus `extra` bytes and a fixed 256-byte slack.
///
/// Covers both the 1/8 expansion of literal runs and the worst-case growth of
/// the NRV2B and NRV2E bit streams, whose offset encodings widen with the
/// input size. Monotonically non-decreasing in `uncompressed_size`.
pub fn size_for_compression(uncompressed_size: u32, extra: u32) -> Result<u32> {
    let z = uncompressed_size as u64;
    let w = bit_width(uncompressed_size.wrapping_sub(1)).max(8) as u64;

    let mut bytes = mem_size(1, z, &[])? as u64;
    bytes = bytes.max(bytes + z / 8);
    // nrv2b
    bytes = bytes.max((z / 3 * (8 + 2 * (w - 8))) / 8);
    // nrv2e
    bytes = bytes.max((z / 3 * (8 + 3 * (w - 7) / 2)) / 8);

    to_u32(mem_size(1, bytes, &[extra as u64, COMPRESSION_SLACK])?)
}

/// Buffer size for decompressing into `uncompressed_size` bytes plus `extra`.
pub fn size_for_uncompression(uncompressed_size: u32, extra: u32) -> Result<u32> {
    to_u32(mem_size(1, uncompressed_size as u64, &[extra as u64])?)
}
