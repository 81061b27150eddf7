//! Post-drain shutdown grace period
//!
//! Once the last job settles, the process lingers for a fixed grace period so
//! in-flight report writes and logging can flush, then exits. There is no
//! cancellation path once the linger starts.

use std::time::Duration;

use tracing::info;

/// Wait out the grace period after the last job drains.
///
/// The caller terminates the process (exit code 0) when this returns.
pub async fn linger(grace: Duration) {
    info!(
        "calls ended, waiting {} second(s) to close application",
        grace.as_secs()
    );
    tokio::time::sleep(grace).await;
}
