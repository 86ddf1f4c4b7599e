/*
 * Cooperative pause/stop token for one translation run. The token is created per
 * run, cloned into whoever needs to raise a signal (console controls, tests), and
 * passed explicitly down through the tree walker, file pipeline, translator and
 * rate pacer. Every wait loop polls it with a short tick, so a stop raised while
 * waiting is observed within `POLL_TICK`.
 */
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub const POLL_TICK: Duration = Duration::from_millis(250);

/*
 * Marker returned when a wait was aborted because the run was stopped.
 * Cancellation is an outcome, not an application error.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Run was stopped")
    }
}

#[derive(Debug, Default)]
struct RunFlags {
    paused: AtomicBool,
    stopped: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct RunControl {
    flags: Arc<RunFlags>,
}

impl RunControl {
    pub fn new() -> Self {
        RunControl::default()
    }

    pub fn pause(&self) {
        log::info!("RunControl: Pause requested.");
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        log::info!("RunControl: Resume requested.");
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        log::info!("RunControl: Stop requested.");
        self.flags.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stopped.load(Ordering::SeqCst)
    }

    /*
     * Blocks while the run is paused. Returns `Err(Cancelled)` if the run is (or
     * becomes) stopped; a stop always wins over a pause.
     */
    pub fn wait_while_paused(&self) -> Result<(), Cancelled> {
        let mut announced = false;
        while self.is_paused() && !self.is_stopped() {
            if !announced {
                log::info!("RunControl: Translation paused, waiting for resume...");
                announced = true;
            }
            thread::sleep(POLL_TICK);
        }
        if self.is_stopped() {
            if announced {
                log::info!("RunControl: Stop detected while paused.");
            }
            return Err(Cancelled);
        }
        Ok(())
    }

    /*
     * Sleeps for `duration` in ticks of at most `POLL_TICK`, returning early with
     * `Err(Cancelled)` once the run is stopped.
     */
    pub fn sleep_unless_stopped(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(POLL_TICK));
        }
    }
}
