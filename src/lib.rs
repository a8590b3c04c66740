#![cfg_attr(all(not(test), target_arch = "arm"), no_std)]
#![deny(unused_must_use)]

//! Dual-core kernel coordination primitives for a CM7/CM4 flight computer.
//!
//! This crate owns the small set of cross-core and per-core services that
//! the rest of the firmware is built on: a monotonic microsecond clock
//! shared by both cores ([`time`]), a per-core reentrant critical section
//! ([`critical`]), a cross-core exclusive section built on top of it
//! ([`exclusive`]), and a coordinated shutdown/restart sequence
//! ([`shutdown`]). Everything that touches real hardware goes through the
//! [`platform`] facade, which is swapped for an OS-thread-backed mock under
//! `cargo test` so the cross-core protocols can be exercised on a host.
//!
//! ## Features
//! - `defmt` - route this crate's tracing through `defmt` instead of
//!   discarding it
//! - `critical-section-impl` - register [`critical`] as the process-wide
//!   `critical_section::Impl`

pub mod config;
pub mod core_id;
pub mod critical;
pub mod error;
pub mod exclusive;
pub mod fmt;
pub mod platform;
pub mod shutdown;
pub mod time;

pub use core_id::Core;
pub use error::Error;

#[cfg(test)]
mod tests;
