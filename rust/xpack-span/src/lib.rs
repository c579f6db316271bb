//! Bounds-checked pointer-like spans for raw buffer manipulation.
//!
//! A [`CheckedSpan`] tracks a current pointer together with the origin
//! (`base`) and extent of the region it may move in. Every dereference,
//! pointer move and assignment is validated against that region through one
//! shared routine, [`range::check_range`], and violations surface as
//! `CantUnpack` errors instead of silent memory corruption.
//!
//! Three policies trade ergonomics against strictness:
//!
//! | Alias | Null allowed | Base required |
//! |---|---|---|
//! | [`SpanOrNull`] | yes | no |
//! | [`SpanOrPtr`] | no | no |
//! | [`Span`] | no | yes |
//!
//! New code should use [`Span`]; the weaker policies exist for call sites
//! that still traffic in bare or null pointers.
//!
//! ```
//! use xpack_span::Span;
//!
//! let mut buf = [0u8, 1, 2, 3, 4, 5, 6, 7];
//! let mut s = Span::new(&mut buf);
//! s.advance(7).unwrap();
//! assert_eq!(s.read().unwrap(), 7);
//! s.advance(1).unwrap();
//! assert!(s.read().unwrap_err().is_cant_unpack());
//! ```

#[cfg(feature = "span-conversion")]
mod convert;
pub mod policy;
pub mod range;
pub mod span;
pub mod util;

pub use policy::{Bounded, MaybeBase, MaybeNull, SpanPolicy};
pub use span::{CheckedSpan, Span, SpanLen, SpanOrNull, SpanOrPtr};
pub use util::{RawAddress, compare_bytes, ptr_diff_bytes};
