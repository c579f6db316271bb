/// Returns an internal error from the enclosing function unless `expr` holds.
///
/// The message names the failed condition, e.g. `verify_internal!(b.is_null())`
/// fails with "internal error: b.is_null()". An explicit message can be given
/// as the second argument.
#[macro_export]
macro_rules! verify_internal {
    ($expr:expr) => {{
        let result = $expr;
        $crate::result::verify_internal(result, stringify!($expr))?;
    }};
    ($expr:expr, $msg:expr) => {{
        let result = $expr;
        $crate::result::verify_internal(result, $msg)?;
    }};
}

/// Returns a range-violation (`CantUnpack`) error from the enclosing function
/// unless `expr` holds.
#[macro_export]
macro_rules! verify_unpack {
    ($expr:expr) => {{
        let result = $expr;
        $crate::result::verify_unpack(result, stringify!($expr))?;
    }};
    ($expr:expr, $msg:expr) => {{
        let result = $expr;
        $crate::result::verify_unpack(result, $msg)?;
    }};
}
