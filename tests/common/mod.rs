//! Integration test common infrastructure.
//!
//! Provides an in-process hub backed by an in-memory database, WebSocket
//! test clients, and helpers for waiting on asynchronous hub state.

pub mod client;
pub mod hub;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use hub::TestHub;

use std::future::Future;
use std::time::Duration;

/// Poll `check` until it returns true or `dur` elapses.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(dur: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + dur;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
