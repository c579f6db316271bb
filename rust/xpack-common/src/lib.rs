//! Core definitions (errors and size arithmetic), relied upon by all xpack-* crates.

pub mod error;
pub mod macros;
pub mod result;
pub mod size;

pub use result::Result;
