#![no_std]

/// Fixed-point scale shared by every rate/ratio this crate multiplies by.
pub const SCALE: u64 = 1_000_000_000;

/// Result of a rounding multiply: the floored result, and whether the exact
/// product had a nonzero remainder mod `SCALE` (i.e. rounded down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulRound {
    pub result: u64,
    pub rounded_down: bool,
}

/// `(a * b) / SCALE`, widened through `u128`. Returns `None` on overflow —
/// callers must treat that as an abort, never silently saturate.
pub fn mul(a: u64, b: u64) -> Option<u64> {
    let wide = (a as u128).checked_mul(b as u128)?;
    let scaled = wide / SCALE as u128;
    u64::try_from(scaled).ok()
}

/// Same contract as [`mul`] but wraps instead of erroring. Only call this
/// where the caller has already proved `a * b / SCALE` fits in a `u64`.
pub fn unsafe_mul(a: u64, b: u64) -> u64 {
    let wide = (a as u128).wrapping_mul(b as u128);
    (wide / SCALE as u128) as u64
}

/// Like [`unsafe_mul`] but also reports whether the division truncated a
/// nonzero remainder, so a caller can round the protocol's own share up.
pub fn unsafe_mul_round(a: u64, b: u64) -> MulRound {
    let wide = (a as u128).wrapping_mul(b as u128);
    let scale = SCALE as u128;
    let result = (wide / scale) as u64;
    let rounded_down = wide % scale != 0;
    MulRound {
        result,
        rounded_down,
    }
}

/// Plain floored integer division. `b == 0` is a caller bug, not a value
/// this function can meaningfully return — it panics like any other
/// division by zero would.
pub fn unsafe_div(a: u64, b: u64) -> u64 {
    a / b
}
