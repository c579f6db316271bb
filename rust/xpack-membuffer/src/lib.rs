//! Guarded heap buffers for the compression pipeline.
//!
//! [`GuardedBuffer`] owns a single heap block whose payload is, with the
//! default `guard-check` feature, bracketed by size and magic words. Overruns
//! in either direction are detected on the next state check or on release.
//! Debug builds additionally fill fresh payloads with a random non-zero byte
//! so reads of uninitialized data show up as garbage rather than zeroes.
//!
//! ```
//! use xpack_membuffer::GuardedBuffer;
//!
//! let mut buf = GuardedBuffer::new();
//! buf.alloc_for_compression(1000, 32).unwrap();
//! assert!(buf.size() >= 1000 + 32 + 256);
//! buf.clear().unwrap();
//! buf.dealloc().unwrap();
//! assert!(!buf.is_allocated());
//! ```

mod buffer;
pub mod guard;
pub mod sizing;

pub use buffer::{DEFAULT_SUBREF_ERROR, GuardedBuffer};
pub use guard::{GuardMarker, use_guard_words, use_poisoning};

#[cfg(test)]
mod tests;
