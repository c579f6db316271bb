//! The three span policies.
//!
//! A policy fixes, at the type level, whether a span may hold a null pointer
//! and whether it must always carry a base pointer. All policies share the
//! same range-check routine; they only differ in which checks are mandatory.

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::MaybeNull {}
    impl Sealed for super::MaybeBase {}
    impl Sealed for super::Bounded {}
}

/// Compile-time description of a span variant.
pub trait SpanPolicy: sealed::Sealed + Copy + std::fmt::Debug + 'static {
    /// Whether the current pointer may be null.
    const NULLABLE: bool;
    /// Whether a base pointer is mandatory.
    const BASE_REQUIRED: bool;
    /// Short name used in diagnostics.
    const NAME: &'static str;
}

/// Nullable pointer with an optional range: the weakest policy, intended for
/// legacy call sites that pass null around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaybeNull;

/// Non-null pointer with an optional range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaybeBase;

/// Non-null pointer that is always range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounded;

impl SpanPolicy for MaybeNull {
    const NULLABLE: bool = true;
    const BASE_REQUIRED: bool = false;
    const NAME: &'static str = "SpanOrNull";
}

impl SpanPolicy for MaybeBase {
    const NULLABLE: bool = false;
    const BASE_REQUIRED: bool = false;
    const NAME: &'static str = "SpanOrPtr";
}

impl SpanPolicy for Bounded {
    const NULLABLE: bool = false;
    const BASE_REQUIRED: bool = true;
    const NAME: &'static str = "Span";
}
