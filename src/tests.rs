//! Crate-level scenario tests spanning more than one module's internals.
//!
//! Single-module behavior lives in each module's own `#[cfg(test)] mod
//! tests`; what's here needs two or more of [`crate::time`],
//! [`crate::critical`], [`crate::exclusive`] and [`crate::shutdown`]
//! cooperating across simulated cores.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use crate::config;
use crate::critical;
use crate::error::Error;
use crate::exclusive;
use crate::platform::mock;
use crate::time;
use crate::Core;

fn spawn_ticker(stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            time::_update_time();
            thread::yield_now();
        }
    })
}

/// S1 — one thread hammers `_update_time` while another spins on `get_time`;
/// every successful read must land on some `tick_increment_us * k` with
/// nondecreasing `k`, never a torn mix of an old half and a new half.
#[test]
fn seq_lock_consistency_under_contention() {
    const UPDATES: u32 = 200_000;
    let stop = Arc::new(AtomicBool::new(false));
    let stop2 = stop.clone();

    let writer = thread::spawn(move || {
        for _ in 0..UPDATES {
            time::_update_time();
        }
        stop2.store(true, Ordering::Relaxed);
    });

    let reader = thread::spawn(move || {
        let mut last_k = i64::MIN;
        while !stop.load(Ordering::Relaxed) {
            match time::get_time() {
                Ok(value) => {
                    assert_eq!(
                        value % config::TICK_INCREMENT_US,
                        0,
                        "torn read: {value} is not a whole number of ticks"
                    );
                    let k = value / config::TICK_INCREMENT_US;
                    assert!(k >= last_k, "time went backwards: {k} < {last_k}");
                    last_k = k;
                }
                Err(Error::Timeout) => {}
                Err(e) => panic!("unexpected error from get_time: {e:?}"),
            }
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
}

/// S3 — both cores take their own local critical section and then race to
/// request the exclusive section. Exactly one wins; the other must observe
/// `Timeout` within `EXCLUSIVE_SECTION_TIMEOUT_US` rather than spin forever.
#[test]
fn anti_deadlock_handshake_one_wins_one_times_out() {
    exclusive::_reset_exclusive();
    mock::set_current_core(Core::Cm4);
    exclusive::_reset_exclusive();
    critical::_reset_critical();
    mock::set_current_core(Core::Cm7);
    critical::_reset_critical();

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = spawn_ticker(stop.clone());

    static WON: AtomicU32 = AtomicU32::new(0);
    static TIMED_OUT: AtomicU32 = AtomicU32::new(0);

    let run = |core: Core| {
        mock::set_current_core(core);
        critical::enter_critical();
        match exclusive::enter_exclusive() {
            Ok(()) => {
                WON.fetch_add(1, Ordering::SeqCst);
                exclusive::exit_exclusive().unwrap();
            }
            Err(Error::Timeout) => {
                TIMED_OUT.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => panic!("unexpected error: {e:?}"),
        }
        critical::exit_critical().unwrap();
    };

    let t_cm7 = thread::spawn(move || run(Core::Cm7));
    let t_cm4 = thread::spawn(move || run(Core::Cm4));
    t_cm7.join().unwrap();
    t_cm4.join().unwrap();

    stop.store(true, Ordering::Relaxed);
    ticker.join().unwrap();

    assert_eq!(WON.load(Ordering::SeqCst), 1);
    assert_eq!(TIMED_OUT.load(Ordering::SeqCst), 1);
}
