#![no_std]

extern crate alloc;

mod pool;

pub use pool::*;

/// Forwards to `gstd::debug!` when this crate is built with the `gstd`
/// feature (hosted inside an actual gstd runtime); a no-op otherwise, so the
/// registry can be built and tested as a plain library. Used at entry-point
/// boundaries only, never inside a matching loop.
#[cfg(feature = "gstd")]
#[doc(hidden)]
pub use gstd as __gstd;

#[cfg(feature = "gstd")]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__gstd::debug!($($arg)*)
    };
}

#[cfg(not(feature = "gstd"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {};
}
