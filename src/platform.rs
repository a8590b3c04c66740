//! Platform facade: everything in this crate that touches real hardware
//! (interrupt masking, core identity, power-management fences) goes through
//! the free functions in this module, with one concrete backend compiled in
//! per target so generic code above never sees the difference.
//!
//! `cortex_m` backs the real Cortex-M7/M4 targets; `mock` backs host
//! `cargo test` runs, standing each OS thread in as one of the two cores so
//! the scenario tests in [`crate::tests`] can actually exercise the
//! cross-core protocols.

use crate::core_id::Core;

#[cfg(any(test, not(target_arch = "arm")))]
mod imp {
    use super::Core;
    use core::cell::Cell;
    use core::sync::atomic::{AtomicBool, Ordering};

    std::thread_local! {
        static THIS_CORE: Cell<Core> = const { Cell::new(Core::Cm7) };
        static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
        static MASK_DEPTH: Cell<u32> = const { Cell::new(0) };
    }

    static SLEEPDEEP: AtomicBool = AtomicBool::new(false);

    pub fn core_id() -> Core {
        THIS_CORE.with(|c| c.get())
    }

    pub fn is_interrupt() -> bool {
        IN_INTERRUPT.with(|c| c.get())
    }

    pub fn raise_mask(_floor: u8) {
        MASK_DEPTH.with(|c| c.set(c.get() + 1));
    }

    pub fn lower_mask() {
        MASK_DEPTH.with(|c| c.set(c.get().saturating_sub(1)));
    }

    pub fn disable_all() {
        MASK_DEPTH.with(|c| c.set(c.get() + 1));
    }

    pub fn isb() {}
    pub fn dsb() {}

    pub fn wfi() {
        std::thread::yield_now();
    }

    pub fn wfe() {
        std::thread::yield_now();
    }

    pub fn sev() {}

    pub fn set_sleepdeep() {
        SLEEPDEEP.store(true, Ordering::SeqCst);
    }

    pub fn yield_now() {
        std::thread::yield_now();
    }

    /// Test-only hooks for pinning the calling OS thread to a simulated
    /// core and toggling simulated interrupt context.
    pub mod mock {
        use super::*;

        pub fn set_current_core(core: Core) {
            THIS_CORE.with(|c| c.set(core));
        }

        pub fn set_interrupt_context(active: bool) {
            IN_INTERRUPT.with(|c| c.set(active));
        }

        pub fn mask_depth() -> u32 {
            MASK_DEPTH.with(|c| c.get())
        }

        pub fn sleepdeep_set() -> bool {
            SLEEPDEEP.load(Ordering::SeqCst)
        }
    }
}

#[cfg(all(not(test), target_arch = "arm"))]
mod imp {
    use super::Core;
    use cortex_m::peripheral::{CPUID, SCB};
    use cortex_m::register::basepri;

    pub fn core_id() -> Core {
        // PARTNO lives in CPUID.BASE[15:4]: 0xC27 for Cortex-M7, 0xC24 for
        // Cortex-M4. Read the register directly; it predates any
        // chip-specific PAC.
        let cpuid = unsafe { &*CPUID::PTR };
        let partno = (cpuid.base.read() >> 4) & 0xFFF;
        match partno {
            0xC27 => Core::Cm7,
            0xC24 => Core::Cm4,
            other => panic!("unrecognized CPUID partno: {:#x}", other),
        }
    }

    pub fn is_interrupt() -> bool {
        let scb = unsafe { &*SCB::PTR };
        (scb.icsr.read() & 0x1FF) != 0
    }

    pub fn raise_mask(floor: u8) {
        // SAFETY: writing BASEPRI only narrows which interrupts may
        // preempt this core; it never affects the other core.
        unsafe { basepri::write(floor) };
        cortex_m::asm::isb();
    }

    pub fn lower_mask() {
        unsafe { basepri::write(0) };
    }

    pub fn disable_all() {
        cortex_m::interrupt::disable();
    }

    pub fn isb() {
        cortex_m::asm::isb();
    }

    pub fn dsb() {
        cortex_m::asm::dsb();
    }

    pub fn wfi() {
        cortex_m::asm::wfi();
    }

    pub fn wfe() {
        cortex_m::asm::wfe();
    }

    pub fn sev() {
        cortex_m::asm::sev();
    }

    pub fn set_sleepdeep() {
        // SAFETY: SCB.SCR is only ever written here; setting SLEEPDEEP
        // changes the depth of the terminal WFE sleep, not correctness of
        // the rest of the core.
        unsafe { SCB::set_sleepdeep() };
    }

    pub fn yield_now() {
        cortex_m::asm::nop();
    }

    pub fn request_system_reset() -> ! {
        SCB::sys_reset()
    }
}

pub use imp::*;

#[cfg(any(test, not(target_arch = "arm")))]
pub fn request_system_reset() -> ! {
    panic!("system reset requested (host build has no reset vector)");
}
