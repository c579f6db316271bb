//! Conversions between span policies.
//!
//! Widening (towards fewer guarantees) is infallible; narrowing re-validates
//! the raw parts against the stricter policy. Assignment across policies
//! follows the same base rules as same-policy assignment.

use xpack_common::{Result, error::Error};

use crate::{
    policy::{Bounded, MaybeBase, MaybeNull, SpanPolicy},
    span::CheckedSpan,
};

impl<'a, T, P: SpanPolicy> CheckedSpan<'a, T, P> {
    /// Re-wraps the span under policy `Q`, validating it against `Q`.
    pub fn convert<Q: SpanPolicy>(self) -> Result<CheckedSpan<'a, T, Q>> {
        CheckedSpan::make(self.raw_ptr(), self.raw_base(), self.raw_size_in_bytes())
    }

    /// Assigns from a span of any policy.
    ///
    /// See [`CheckedSpan::assign`] for the base rules; a non-null destination
    /// additionally rejects a null source pointer.
    pub fn assign_from<Q: SpanPolicy>(&mut self, other: CheckedSpan<'a, T, Q>) -> Result<()> {
        self.assign_parts(other.raw_ptr(), other.raw_base(), other.raw_size_in_bytes())
    }
}

macro_rules! widen {
    ($from:ty => $to:ty) => {
        impl<'a, T> From<CheckedSpan<'a, T, $from>> for CheckedSpan<'a, T, $to> {
            fn from(span: CheckedSpan<'a, T, $from>) -> Self {
                match span.convert() {
                    Ok(span) => span,
                    Err(_) => unreachable!("widening span conversion cannot fail"),
                }
            }
        }
    };
}

macro_rules! narrow {
    ($from:ty => $to:ty) => {
        impl<'a, T> TryFrom<CheckedSpan<'a, T, $from>> for CheckedSpan<'a, T, $to> {
            type Error = Error;

            fn try_from(span: CheckedSpan<'a, T, $from>) -> Result<Self> {
                span.convert()
            }
        }
    };
}

widen!(Bounded => MaybeBase);
widen!(Bounded => MaybeNull);
widen!(MaybeBase => MaybeNull);

narrow!(MaybeNull => MaybeBase);
narrow!(MaybeNull => Bounded);
narrow!(MaybeBase => Bounded);
