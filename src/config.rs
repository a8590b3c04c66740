//! Compile-time configuration knobs for the kernel core.
//!
//! All of these are plain `pub const`s rather than a runtime-loaded config
//! struct: this is firmware, the values are fixed at link time, and a
//! `no_std` binary has nowhere to read a config file from anyway.

/// Kernel tick frequency, in Hz. Must evenly divide 1_000_000 so that
/// [`TICK_INCREMENT_US`] is an exact number of microseconds per tick.
pub const KERNEL_TICK_FREQ_HZ: u32 = 1_000;

/// Microseconds added to the monotonic clock on every tick:
/// `1_000_000 / KERNEL_TICK_FREQ_HZ`.
pub const TICK_INCREMENT_US: i64 = (1_000_000 / KERNEL_TICK_FREQ_HZ) as i64;

const _: () = assert!(
    1_000_000 % KERNEL_TICK_FREQ_HZ == 0,
    "KERNEL_TICK_FREQ_HZ must evenly divide 1_000_000us so the tick increment is exact"
);

/// Maximum number of seq-lock retries [`crate::time::get_time`] attempts
/// before reporting [`crate::error::Error::Timeout`].
pub const TIME_LOCK_ATTEMPTS: u32 = 8;

/// Bound, in microseconds, on how long [`crate::exclusive::enter_exclusive`]
/// spins attempting to take the cross-core lock before giving up.
pub const EXCLUSIVE_SECTION_TIMEOUT_US: i64 = 50_000;

/// Bound, in microseconds, on how long the entry/exit protocol in
/// [`crate::exclusive`] waits for the peer core's acknowledgment flag.
pub const EXCLUSIVE_SECTION_ACK_TIMEOUT_US: i64 = 5_000;

/// BASEPRI value the critical-section manager raises to on entry. Any
/// interrupt at this priority or lower (numerically greater) is blocked;
/// the tick interrupt must be configured above this floor so the clock
/// keeps advancing while a core is inside a critical section.
pub const CRITICAL_SECTION_PRIORITY_FLOOR: u8 = 0x40;
