//! Numeric primitives the reference treats as external collaborator calls
//! (`pow2`, natural `log`) rather than hand-rolled math, so this crate can
//! stay `no_std`/libm-free by default. A `std`-feature blanket
//! implementation is provided for hosted callers and for the crate's own
//! tests.

/// `pow2`/natural-log/`round` primitives supplied by the caller.
pub trait Arith {
    /// `2^n`.
    fn pow2(&self, n: u32) -> u32;
    /// Natural logarithm.
    fn ln(&self, x: f64) -> f64;
    /// Round to nearest integer, ties away from zero.
    fn round(&self, x: f64) -> f64;
}

/// A [`Arith`] implementation backed by `f64`'s own methods, for hosted
/// (`std`) callers and tests.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdArith;

#[cfg(feature = "std")]
impl Arith for StdArith {
    fn pow2(&self, n: u32) -> u32 {
        1u32 << n
    }

    fn ln(&self, x: f64) -> f64 {
        x.ln()
    }

    fn round(&self, x: f64) -> f64 {
        x.round()
    }
}
