/*
 * Per-vendor request pacing. A `RatePacer` is created for one run and shared by
 * every translator call in that run; it remembers when the last request to each
 * vendor was issued and makes the caller wait until `60000 / requests_per_minute`
 * milliseconds have passed. The wait polls the run's stop signal, so a stop
 * aborts it within one tick instead of letting the request through.
 */
use crate::core::run_control::{Cancelled, RunControl};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct RatePacer {
    last_calls: Mutex<HashMap<String, Instant>>,
}

impl RatePacer {
    pub fn new() -> Self {
        RatePacer::default()
    }

    pub fn min_interval(requests_per_minute: u32) -> Duration {
        Duration::from_secs(60) / requests_per_minute
    }

    /*
     * Blocks until a request to `vendor` may be issued, then records the issue time.
     * `None` or zero disables pacing. Returns `Err(Cancelled)` without recording if
     * the run is stopped before or during the wait.
     */
    pub fn wait_for_slot(
        &self,
        vendor: &str,
        requests_per_minute: Option<u32>,
        control: &RunControl,
    ) -> Result<(), Cancelled> {
        if control.is_stopped() {
            return Err(Cancelled);
        }
        let Some(rpm) = requests_per_minute.filter(|rpm| *rpm > 0) else {
            return Ok(());
        };

        let min_interval = RatePacer::min_interval(rpm);
        let last_call = self.last_call(vendor);
        if let Some(last_call) = last_call {
            let elapsed = last_call.elapsed();
            if elapsed < min_interval {
                let remaining = min_interval - elapsed;
                log::info!(
                    "RatePacer: Waiting {:.1}s for vendor '{vendor}' rate limit ({rpm} rpm).",
                    remaining.as_secs_f64()
                );
                if let Err(cancelled) = control.sleep_unless_stopped(remaining) {
                    log::info!("RatePacer: Stop detected, abandoning rate limit wait.");
                    return Err(cancelled);
                }
            }
        }

        self.record_call(vendor);
        Ok(())
    }

    fn last_call(&self, vendor: &str) -> Option<Instant> {
        self.last_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(vendor)
            .copied()
    }

    fn record_call(&self, vendor: &str) {
        self.last_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(vendor.to_string(), Instant::now());
    }
}
