//! Cross-core exclusive-section manager.
//!
//! A mutual-exclusion primitive between the two cores with no hardware
//! mutex to rely on: `lock_tag` is a single `AtomicI32` CAS'd between
//! `0` (free), `+1` (CM7 holds) and `-1` (CM4 holds). The hard part is that
//! taking the cross-core lock requires holding a *local* critical section
//! (so a same-core ISR can't re-enter the protocol out from under us), but
//! the other core might itself be spinning inside its own critical section
//! waiting on ours — hence the acknowledgment handshake in steps 3–5
//! below, which is what lets each side observe the other yielding without
//! either one ever dropping its local mask.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::config;
use crate::core_id::{get_core, Core};
use crate::critical;
use crate::error::Error;
use crate::fmt::{error, trace, warn};
use crate::time;

static LOCK_TAG: AtomicI32 = AtomicI32::new(0);
static EX_DEPTH: AtomicI32 = AtomicI32::new(0);
static ACK_CM7: AtomicU32 = AtomicU32::new(0);
static ACK_CM4: AtomicU32 = AtomicU32::new(0);

fn ack_flag(core: Core) -> &'static AtomicU32 {
    match core {
        Core::Cm7 => &ACK_CM7,
        Core::Cm4 => &ACK_CM4,
    }
}

/// Acquire the exclusive section, blocking this core until it does.
/// Reentrant: a core that already holds it just bumps the depth counter.
pub fn enter_exclusive() -> Result<(), Error> {
    critical::enter_critical();
    let this = get_core();
    let this_tag = this.tag();
    let other_tag = this.other().tag();

    if LOCK_TAG.load(Ordering::Acquire) == this_tag {
        EX_DEPTH.fetch_add(1, Ordering::AcqRel);
    } else if let Err(e) = acquire_lock(this_tag, other_tag) {
        critical::exit_critical().ok();
        return Err(e);
    }

    if let Err(e) = wait_for_ack(this.other()) {
        rollback_acquire();
        critical::exit_critical().ok();
        return Err(e);
    }

    critical::exit_critical().ok();
    Ok(())
}

fn acquire_lock(this_tag: i32, other_tag: i32) -> Result<(), Error> {
    let start = time::get_time().map_err(|_| Error::Internal)?;
    loop {
        match LOCK_TAG.compare_exchange(0, this_tag, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                ack_flag(get_core()).store(0, Ordering::Release);
                EX_DEPTH.store(1, Ordering::Release);
                return Ok(());
            }
            Err(observed) => {
                if observed == other_tag {
                    // The other core holds it and may itself be spinning in
                    // a critical section waiting for our ack; assert it so
                    // it can make progress instead of deadlocking against us.
                    ack_flag(get_core()).store(1, Ordering::Release);
                }
                let now = time::get_time().map_err(|_| Error::Internal)?;
                if now.wrapping_sub(start) > config::EXCLUSIVE_SECTION_TIMEOUT_US {
                    warn!("enter_exclusive: timed out acquiring lock_tag");
                    return Err(Error::Timeout);
                }
            }
        }
    }
}

fn wait_for_ack(other: Core) -> Result<(), Error> {
    let start = time::get_time().map_err(|_| Error::Internal)?;
    loop {
        if ack_flag(other).load(Ordering::Acquire) == 1 {
            return Ok(());
        }
        let now = time::get_time().map_err(|_| Error::Internal)?;
        if now.wrapping_sub(start) > config::EXCLUSIVE_SECTION_ACK_TIMEOUT_US {
            warn!("enter_exclusive: timed out waiting for peer ack");
            return Err(Error::Timeout);
        }
    }
}

fn rollback_acquire() {
    let prev = EX_DEPTH.fetch_sub(1, Ordering::AcqRel);
    if prev <= 1 {
        LOCK_TAG.store(0, Ordering::Release);
    }
}

/// Release one level of the exclusive section. On the outermost exit this
/// releases `lock_tag` back to free.
pub fn exit_exclusive() -> Result<(), Error> {
    critical::enter_critical();
    let this = get_core();

    if LOCK_TAG.load(Ordering::Acquire) != this.tag() {
        critical::exit_critical().ok();
        error!("exit_exclusive: called without holding lock_tag");
        return Err(Error::InvalidState);
    }
    if ack_flag(this.other()).load(Ordering::Acquire) == 0 {
        critical::exit_critical().ok();
        warn!("exit_exclusive: peer ack dropped while we held the lock");
        return Err(Error::Timeout);
    }

    let prev = EX_DEPTH.fetch_sub(1, Ordering::AcqRel);
    if prev == 1 {
        LOCK_TAG.store(0, Ordering::Release);
        trace!("exit_exclusive: released lock_tag");
    }

    critical::exit_critical().ok();
    Ok(())
}

/// Whether the calling core currently holds the exclusive section.
pub fn is_exclusive() -> bool {
    LOCK_TAG.load(Ordering::Acquire) == get_core().tag()
}

/// Acknowledgment handler: run this from the cross-core wake interrupt.
/// While the *other* core holds the lock, continuously asserts this core's
/// ack flag for up to [`config::EXCLUSIVE_SECTION_ACK_TIMEOUT_US`], then
/// clears it. This is what closes the anti-deadlock handshake described in
/// [`enter_exclusive`]'s module docs.
pub fn run_ack_handler() {
    let this = get_core();
    let other_tag = this.other().tag();
    let Ok(start) = time::get_time() else {
        ack_flag(this).store(0, Ordering::Release);
        return;
    };
    loop {
        if LOCK_TAG.load(Ordering::Acquire) != other_tag {
            break;
        }
        ack_flag(this).store(1, Ordering::Release);
        match time::get_time() {
            Ok(now) if now.wrapping_sub(start) <= config::EXCLUSIVE_SECTION_ACK_TIMEOUT_US => {}
            _ => break,
        }
    }
    ack_flag(this).store(0, Ordering::Release);
}

/// Release the lock if this core holds it, and zero the reentrancy depth.
/// Intended only for fault-recovery paths.
pub fn _reset_exclusive() {
    let this = get_core();
    if LOCK_TAG.load(Ordering::Acquire) == this.tag() {
        LOCK_TAG.store(0, Ordering::Release);
    }
    EX_DEPTH.store(0, Ordering::Release);
    ack_flag(this).store(0, Ordering::Release);
}
