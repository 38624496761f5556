//! Rate limiting for processes spawned by the upload tools
//!
//! Every remote-copy invocation (`rsync`, `ssh`, `scp`) takes one token before it is spawned.
//! Tokens live in a token-bucket semaphore that is refilled by a background task, which caps
//! the number of spawned processes per second across all concurrent transfers.
//!
//! Throttling is disabled until [`init_spawn_tokens`] is called with a non-zero value; until
//! then [`get_spawn_token`] returns immediately.
//!
//! ```rust,no_run
//! use throttle::{get_spawn_token, init_spawn_tokens, run_spawn_replenish_thread};
//! use std::time::Duration;
//!
//! # async fn example() {
//! // 10 tokens every 100ms = 100 process spawns per second
//! init_spawn_tokens(10);
//! tokio::spawn(run_spawn_replenish_thread(10, Duration::from_millis(100)));
//!
//! get_spawn_token().await;
//! // spawn the process here
//! # }
//! ```
//!
//! # Replenishment
//!
//! To achieve N spawns per second the caller picks a (tokens, interval) pair, e.g. for
//! 1000/sec either 100 tokens every 100ms or 10 tokens every 10ms. The bucket never holds
//! more than `tokens` at once, so bursts are bounded by a single interval's worth.

mod semaphore;

static SPAWN_THROTTLE: semaphore::Semaphore = semaphore::Semaphore::new();

pub fn init_spawn_tokens(spawn_tokens: usize) {
    SPAWN_THROTTLE.setup(spawn_tokens);
}

pub async fn get_spawn_token() {
    SPAWN_THROTTLE.consume().await;
}

pub async fn run_spawn_replenish_thread(replenish: usize, interval: std::time::Duration) {
    SPAWN_THROTTLE
        .run_replenish_thread(replenish, interval)
        .await;
}

/// Splits a per-second rate into (tokens, interval). Rates divisible by 10 are smoothed over
/// 100ms slices, anything else is refilled once a second.
pub fn replenish_schedule(per_second: usize) -> (usize, std::time::Duration) {
    if per_second >= 10 && per_second % 10 == 0 {
        (per_second / 10, std::time::Duration::from_millis(100))
    } else {
        (per_second, std::time::Duration::from_secs(1))
    }
}
