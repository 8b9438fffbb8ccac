//! Dedicated threads for store page parsing.
//!
//! `scraper::Html` is neither `Send` nor cheap to build, so HTML stores fetch
//! the body on the async runtime and hand it to this pool. The pool keeps a
//! per-store count of pages waiting or being parsed, which shows which store
//! is flooding it when searches start to queue.

use crate::error::ProviderError;
use once_cell::sync::OnceCell;
use rayon::ThreadPool;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Pages of one store beyond this many in flight get a warning.
const BACKLOG_PER_STORE: usize = 4;

/// Queue waits longer than this are logged as slow.
const SLOW_WAIT_MS: u128 = 250;

static POOL: OnceCell<ParsePool> = OnceCell::new();

struct ParsePool {
    threads: ThreadPool,
    size: usize,
    pending: Mutex<HashMap<&'static str, usize>>,
}

impl ParsePool {
    fn build(size: usize) -> Result<Self, ProviderError> {
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|idx| format!("cotiza-parse-{idx}"))
            .build()
            .map_err(|e| ProviderError::Config(format!("cannot start parse threads: {e}")))?;
        Ok(Self {
            threads,
            size,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Adjust the pending count of `store` and return the new value.
    fn track(&self, store: &'static str, delta: isize) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let count = pending.entry(store).or_insert(0);
        *count = count.saturating_add_signed(delta);
        let now = *count;
        if now == 0 {
            pending.remove(store);
        }
        now
    }
}

/// Default size: one thread per core minus the one driving the runtime,
/// between 2 and 8.
fn default_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(4)
        .clamp(2, 8)
}

fn pool() -> Result<&'static ParsePool, ProviderError> {
    POOL.get_or_try_init(|| ParsePool::build(default_size()))
}

/// Size the pool from `[engine] parse_threads`.
///
/// Only the first call before any parse takes effect; the pool lives for the
/// whole process.
pub fn configure(threads: Option<usize>) -> Result<(), ProviderError> {
    let Some(size) = threads else {
        return Ok(());
    };
    if POOL.get().is_none() {
        let built = ParsePool::build(size.max(1))?;
        // A concurrent first parse may have won the race; either pool works.
        let _ = POOL.set(built);
    }
    if let Some(active) = POOL.get().map(|p| p.size).filter(|s| *s != size.max(1)) {
        debug!(target: "cotiza.parse", requested = size, active, "parse pool already running");
    }
    Ok(())
}

/// Pages of `store` currently queued or being parsed.
pub fn pending(store: &str) -> usize {
    POOL.get()
        .and_then(|p| {
            let pending = p.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.get(store).copied()
        })
        .unwrap_or(0)
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Parse one page of `store` on the pool.
///
/// A panicking parser fails this search of `store` only.
pub async fn parse_page<R, F>(store: &'static str, body: String, parse: F) -> Result<R, ProviderError>
where
    F: FnOnce(&str) -> R + Send + 'static,
    R: Send + 'static,
{
    let pool = pool()?;
    let bytes = body.len();
    let in_flight = pool.track(store, 1);
    if in_flight > BACKLOG_PER_STORE {
        warn!(target: "cotiza.parse", store, in_flight, threads = pool.size, "parse backlog growing");
    }

    let (tx, rx) = oneshot::channel();
    let queued_at = Instant::now();
    pool.threads.spawn(move || {
        let wait_ms = queued_at.elapsed().as_millis();
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| parse(&body))).map_err(|payload| {
            ProviderError::Parse(format!(
                "{store} page parser panicked: {}",
                panic_reason(payload.as_ref())
            ))
        });
        pool.track(store, -1);
        // The caller may have timed out and gone away.
        let _ = tx.send((outcome, wait_ms, started.elapsed().as_millis()));
    });

    let (outcome, wait_ms, parse_ms) = rx
        .await
        .map_err(|_| ProviderError::Other(format!("{store} parse job was dropped")))?;
    if wait_ms > SLOW_WAIT_MS {
        warn!(target: "cotiza.parse", store, bytes, wait_ms, parse_ms, "page waited for a parse thread");
    } else {
        debug!(target: "cotiza.parse", store, bytes, wait_ms, parse_ms, "page parsed");
    }
    outcome
}
