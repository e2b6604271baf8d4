// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use tokio::sync::watch;

/// A background worker: a periodic `run`, paced by `trigger`.
///
/// Mirrors this codebase's generic telemetry worker trait; the process
/// entrypoint drives each worker with [`drive`] instead of hand-rolling a
/// loop per worker.
#[async_trait]
pub trait Worker: Send {
    /// Main worker action, invoked once per period.
    async fn run(&mut self);

    /// Waits for the next period. Expected to be the only long sleep in
    /// the loop, so it is the point raced against shutdown.
    async fn trigger(&mut self);

    /// Alternative trigger called before the very first `run`. Defaults to
    /// `trigger`'s behavior (wait one period before the first tick).
    async fn initial_trigger(&mut self) {
        self.trigger().await
    }

    /// Hook called once, after the loop observes shutdown.
    fn shutdown(&mut self) {}
}

/// Drives `worker` until `shutdown` is signaled. Shutdown is observed
/// between `run` and `trigger`, and can interrupt `trigger` mid-sleep, so a
/// worker with a long period still exits promptly.
pub async fn drive(mut worker: impl Worker, mut shutdown: watch::Receiver<bool>) {
    worker.initial_trigger().await;
    loop {
        if *shutdown.borrow() {
            worker.shutdown();
            return;
        }
        worker.run().await;
        if *shutdown.borrow() {
            worker.shutdown();
            return;
        }
        tokio::select! {
            _ = shutdown.changed() => {
                worker.shutdown();
                return;
            }
            _ = worker.trigger() => {}
        }
    }
}
