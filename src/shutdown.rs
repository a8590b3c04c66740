//! Coordinated two-core shutdown.
//!
//! `sys_shutdown` never returns: it rendezvous with the peer core (whichever
//! core calls it first sets its flag and spins on the other core's flag, so
//! no matter which side starts the sequence both cores observe both flags
//! set), runs that core's registered exit handlers in link order, and
//! parks in an interrupt-masked WFE loop. Exit-handler tables are built at
//! init time via [`register_cm7_exit`]/[`register_cm4_exit`]/
//! [`register_mcu_exit`] rather than read out of a linker section —
//! handlers are registered into a fixed-capacity table at init time
//! instead of relying on a linker-array trick.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;

use crate::core_id::{get_core, Core};
use crate::critical;
use crate::error::Error;
use crate::fmt::{error, trace};
use crate::platform;

/// Default capacity of each exit-handler table. Generous for a firmware
/// with a handful of subsystems to tear down; raise it if a board needs
/// more registered handlers than this.
pub const EXIT_TABLE_CAPACITY: usize = 16;

/// A fixed-capacity, front-to-back ordered sequence of exit handlers.
pub struct ExitHandlerTable<const N: usize> {
    handlers: [Option<fn()>; N],
    len: usize,
}

impl<const N: usize> ExitHandlerTable<N> {
    pub const fn new() -> Self {
        Self {
            handlers: [None; N],
            len: 0,
        }
    }

    /// Append a handler to the end of the table.
    ///
    /// Returns [`Error::InvalidState`] if the table is already at capacity.
    pub fn register(&mut self, handler: fn()) -> Result<(), Error> {
        if self.len == N {
            error!("ExitHandlerTable::register: table at capacity");
            return Err(Error::InvalidState);
        }
        self.handlers[self.len] = Some(handler);
        self.len += 1;
        Ok(())
    }

    /// Run every registered handler, front to back.
    pub fn run_all(&self) {
        for slot in &self.handlers[..self.len] {
            if let Some(handler) = slot {
                handler();
            }
        }
    }

    /// Number of handlers currently registered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

static KERNEL_CM7_EXIT: Mutex<RefCell<ExitHandlerTable<EXIT_TABLE_CAPACITY>>> =
    Mutex::new(RefCell::new(ExitHandlerTable::new()));
static KERNEL_CM4_EXIT: Mutex<RefCell<ExitHandlerTable<EXIT_TABLE_CAPACITY>>> =
    Mutex::new(RefCell::new(ExitHandlerTable::new()));
static MCU_EXIT: Mutex<RefCell<ExitHandlerTable<EXIT_TABLE_CAPACITY>>> =
    Mutex::new(RefCell::new(ExitHandlerTable::new()));

fn table_for(core: Core) -> &'static Mutex<RefCell<ExitHandlerTable<EXIT_TABLE_CAPACITY>>> {
    match core {
        Core::Cm7 => &KERNEL_CM7_EXIT,
        Core::Cm4 => &KERNEL_CM4_EXIT,
    }
}

/// Register a handler to run during CM7's shutdown, after the rendezvous
/// but before the terminal WFE loop.
pub fn register_cm7_exit(handler: fn()) -> Result<(), Error> {
    critical_section::with(|cs| KERNEL_CM7_EXIT.borrow(cs).borrow_mut().register(handler))
}

/// Register a handler to run during CM4's shutdown.
pub fn register_cm4_exit(handler: fn()) -> Result<(), Error> {
    critical_section::with(|cs| KERNEL_CM4_EXIT.borrow(cs).borrow_mut().register(handler))
}

/// Register a handler in the shared table that only CM7 runs, after its own
/// per-core exit table.
pub fn register_mcu_exit(handler: fn()) -> Result<(), Error> {
    critical_section::with(|cs| MCU_EXIT.borrow(cs).borrow_mut().register(handler))
}

static SHUTDOWN_FLAG_CM7: AtomicU32 = AtomicU32::new(0);
static SHUTDOWN_FLAG_CM4: AtomicU32 = AtomicU32::new(0);
static EXIT_HANDLERS_RAN: [AtomicBool; 2] = [AtomicBool::new(false), AtomicBool::new(false)];

fn flag(core: Core) -> &'static AtomicU32 {
    match core {
        Core::Cm7 => &SHUTDOWN_FLAG_CM7,
        Core::Cm4 => &SHUTDOWN_FLAG_CM4,
    }
}

/// The rendezvous-and-teardown sequence shared by [`sys_shutdown`] and the
/// peer-wake handler. Idempotent per core: a second call after the first
/// has already run this core's exit handlers is a no-op, which is what
/// keeps a concurrent shutdown from both cores running any handler twice.
fn run_shutdown_sequence(this: Core) {
    flag(this).store(1, Ordering::SeqCst);
    platform::sev();

    while flag(this.other()).load(Ordering::SeqCst) == 0 {
        platform::wfe();
    }

    if EXIT_HANDLERS_RAN[this.index()].swap(true, Ordering::AcqRel) {
        return;
    }

    trace!("sys_shutdown: running exit handlers");
    critical_section::with(|cs| table_for(this).borrow(cs).borrow().run_all());
    if this == Core::Cm7 {
        critical_section::with(|cs| MCU_EXIT.borrow(cs).borrow().run_all());
    }
}

/// Begin coordinated shutdown. Does not return: masks interrupts and
/// faults so a fault can't abort teardown, rendezvous with the peer core,
/// runs this core's exit handlers (and, on CM7, the shared `mcu_exit`
/// table), then parks forever in a deep-sleep WFE loop.
pub fn sys_shutdown() -> ! {
    platform::disable_all();
    run_shutdown_sequence(get_core());

    platform::set_sleepdeep();
    platform::dsb();
    platform::isb();
    loop {
        platform::wfe();
    }
}

/// Call from the cross-core wake interrupt handler. If the peer has begun
/// shutdown and this core hasn't yet, joins the rendezvous by shutting
/// down too — this is what closes the loop so whichever core calls
/// [`sys_shutdown`] first still brings both cores down together.
pub fn on_cross_core_wake() {
    let this = get_core();
    if flag(this.other()).load(Ordering::SeqCst) == 1 && flag(this).load(Ordering::SeqCst) == 0 {
        sys_shutdown();
    }
}

/// Request an architectural system reset. Does not return: masks
/// interrupts and faults, then writes the reset-request bits (with the
/// required key value) to the system reset register and spins on WFE
/// until the reset latches.
pub fn sys_restart() -> ! {
    platform::disable_all();
    platform::request_system_reset()
}

/// Issue WFI, but only if this core isn't holding a critical section —
/// sleeping with interrupts masked would defeat the wake.
pub fn sys_sleep() {
    if critical::is_critical() {
        return;
    }
    platform::wfi();
}
