/*
 * Run-scoped accumulators of the token usage reported by the translation vendor.
 * The counters are atomics so a translator shared behind `&self` can update them,
 * and `snapshot` hands the reporting layer an immutable copy.
 */
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /*
     * Total tokens per minute over `elapsed`, or `None` when no time has passed.
     */
    pub fn tokens_per_minute(&self, elapsed: Duration) -> Option<f64> {
        let minutes = elapsed.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return None;
        }
        Some(self.total() as f64 / minutes)
    }
}

#[derive(Debug, Default)]
pub struct TokenCounters {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl TokenCounters {
    pub fn new() -> Self {
        TokenCounters::default()
    }

    pub fn add(&self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.input_tokens.store(0, Ordering::Relaxed);
        self.output_tokens.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }
}
