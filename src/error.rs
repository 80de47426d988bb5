//! Numeric status taxonomy for the intersection core.
//!
//! Every fallible entry point in this crate returns `Result<T, Error>`. The
//! success-adjacent statuses used by the C renderer this core is modeled on
//! (`NoIntersection`, `Done`, plain `Success`) are folded into native Rust
//! control flow (`Option`, `std::ops::ControlFlow`, `Ok`) rather than kept as
//! error variants; only the genuine failure cases remain here.

use thiserror::Error as ThisError;

/// Failure outcomes for the intersection core.
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A fixed-size allocation inside a hit arena could not be satisfied.
    #[error("allocation failed")]
    AllocationFailed,

    /// A matrix could not be inverted (singular to within full pivoting), or
    /// a multiply step produced a non-finite result.
    #[error("arithmetic error")]
    ArithmeticError,

    /// Argument at `position` (0-indexed, per the callee's own signature)
    /// failed validation on its own.
    #[error("invalid argument at position {0}")]
    InvalidArgument(u32),

    /// A combination of otherwise individually-valid arguments is invalid
    /// together (e.g. a degenerate orthographic extent).
    #[error("invalid argument combination at position {0}")]
    InvalidArgumentCombination(u32),

    /// A low-discrepancy sequence was asked for more dimensions than it can
    /// produce.
    #[error("out of entropy")]
    OutOfEntropy,
}

pub type Result<T> = std::result::Result<T, Error>;
