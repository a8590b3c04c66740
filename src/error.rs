//! The kernel core's single error type.
//!
//! Every fallible operation in this crate returns `Result<T, Error>` rather
//! than an out-parameter or a sentinel value.

/// Error conditions surfaced by the kernel core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An input violated a documented precondition (negative duration,
    /// a target time already in the past, a negative conversion input).
    InvalidArg,
    /// An operation was attempted out of order (exit without a matching
    /// enter).
    InvalidState,
    /// A bounded wait elapsed without making progress.
    Timeout,
    /// A unit conversion overflowed signed 64-bit arithmetic.
    Overflow,
    /// A sub-operation (almost always a clock read) failed outright.
    Internal,
    /// Reserved for non-blocking variants of the exclusive-section API;
    /// not currently raised by anything in this crate.
    Busy,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidArg => "invalid argument",
            Error::InvalidState => "invalid state",
            Error::Timeout => "timed out",
            Error::Overflow => "arithmetic overflow",
            Error::Internal => "internal error",
            Error::Busy => "busy",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
