//! Per-core reentrant critical-section manager.
//!
//! `crit_depth` is mutated only by code running on its owning core, so no
//! cross-core atomicity is required — but the counter still has to survive
//! preemption by same-core interrupts, which is why the hardware mask is
//! only touched on the 0→1 and 1→0 transitions and the depth itself lives
//! in a plain per-core `AtomicI32`.
//!
//! This module also backs the crate's [`critical_section::Impl`] when the
//! `critical-section-impl` feature is enabled, so the rest of the firmware
//! (and [`crate::exclusive`], which relies on it for its local mutex) all
//! share one nested interrupt mask instead of each rolling their own.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::core_id::get_core;
use crate::error::Error;
use crate::fmt::error;
use crate::platform;

const NUM_CORES: usize = 2;

static CRIT_DEPTH: [AtomicI32; NUM_CORES] = [AtomicI32::new(0), AtomicI32::new(0)];

/// Enter a critical section on the calling core. Always succeeds; nested
/// calls simply increment the depth counter.
pub fn enter_critical() {
    let idx = get_core().index();
    let prev = CRIT_DEPTH[idx].fetch_add(1, Ordering::AcqRel);
    if prev == 0 {
        platform::raise_mask(crate::config::CRITICAL_SECTION_PRIORITY_FLOOR);
    }
}

/// Exit a critical section on the calling core.
///
/// Returns [`Error::InvalidState`] (leaving the counter unchanged) if
/// called while the calling core's depth is already zero.
pub fn exit_critical() -> Result<(), Error> {
    let idx = get_core().index();
    if CRIT_DEPTH[idx].load(Ordering::Acquire) == 0 {
        error!("exit_critical: called at depth 0");
        return Err(Error::InvalidState);
    }
    let prev = CRIT_DEPTH[idx].fetch_sub(1, Ordering::AcqRel);
    if prev == 1 {
        platform::lower_mask();
    }
    Ok(())
}

/// Whether the calling core currently holds a critical section.
pub fn is_critical() -> bool {
    CRIT_DEPTH[get_core().index()].load(Ordering::Acquire) > 0
}

/// Forcibly zero the calling core's depth and lower its mask. Intended
/// only for fault-recovery paths, not normal nesting/unwinding.
pub fn _reset_critical() {
    let idx = get_core().index();
    CRIT_DEPTH[idx].store(0, Ordering::Release);
    platform::lower_mask();
}

#[cfg(feature = "critical-section-impl")]
struct KernelCriticalSection;

#[cfg(feature = "critical-section-impl")]
unsafe impl critical_section::Impl for KernelCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        enter_critical();
    }

    unsafe fn release(_restore_state: critical_section::RawRestoreState) {
        exit_critical().expect("critical_section::release without a matching acquire");
    }
}

#[cfg(feature = "critical-section-impl")]
critical_section::set_impl!(KernelCriticalSection);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock;

    #[test]
    fn balanced_nesting_returns_depth_to_zero() {
        mock::set_current_core(crate::Core::Cm7);
        assert!(!is_critical());
        enter_critical();
        enter_critical();
        enter_critical();
        assert!(is_critical());
        exit_critical().unwrap();
        exit_critical().unwrap();
        assert!(is_critical());
        exit_critical().unwrap();
        assert!(!is_critical());
    }

    #[test]
    fn exit_with_zero_depth_is_invalid_state() {
        mock::set_current_core(crate::Core::Cm4);
        // Make sure depth really is zero regardless of test order.
        while is_critical() {
            exit_critical().unwrap();
        }
        assert_eq!(exit_critical(), Err(Error::InvalidState));
        assert!(!is_critical());
    }

    #[test]
    fn mask_only_toggles_on_transitions() {
        mock::set_current_core(crate::Core::Cm7);
        while is_critical() {
            exit_critical().unwrap();
        }
        let before = mock::mask_depth();
        enter_critical();
        enter_critical();
        assert_eq!(mock::mask_depth(), before + 1);
        exit_critical().unwrap();
        assert_eq!(mock::mask_depth(), before + 1);
        exit_critical().unwrap();
        assert_eq!(mock::mask_depth(), before);
    }

    #[test]
    fn cores_have_independent_depth_counters() {
        mock::set_current_core(crate::Core::Cm7);
        while is_critical() {
            exit_critical().unwrap();
        }
        enter_critical();

        mock::set_current_core(crate::Core::Cm4);
        while is_critical() {
            exit_critical().unwrap();
        }
        assert!(!is_critical());

        mock::set_current_core(crate::Core::Cm7);
        assert!(is_critical());
        exit_critical().unwrap();
    }
}
