// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic health daemon.
//!
//! The daemon task lives as long as its session. It is *enabled* on connect
//! attempts and on shutdown recovery, *disabled* on explicit disconnect and
//! *terminated* when the session shuts down or is dropped. While enabled,
//! every tick calls [`HealthTarget::health_tick`]; the session decides there
//! whether to reconnect or to re-register items.
//!
//! Ticks never overlap and missed ticks are delayed rather than bursted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Work performed on every enabled tick.
#[async_trait]
pub(crate) trait HealthTarget: Send + Sync {
    async fn health_tick(&self);
}

/// Periodic reconnect / re-register timer.
pub struct HealthDaemon {
    interval: Duration,
    enabled: Arc<AtomicBool>,
    restart: Arc<Notify>,
    shutdown: Arc<Notify>,
    ticks: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthDaemon {
    /// Creates a disabled daemon with the given period.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            enabled: Arc::new(AtomicBool::new(false)),
            restart: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            ticks: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    /// Spawns the timer task. Must be called from within a tokio runtime.
    pub(crate) fn spawn(&self, target: Weak<dyn HealthTarget>) {
        let period = self.interval;
        let enabled = Arc::clone(&self.enabled);
        let restart = Arc::clone(&self.restart);
        let shutdown = Arc::clone(&self.shutdown);
        let ticks = Arc::clone(&self.ticks);

        let handle = tokio::spawn(async move {
            debug!(interval_ms = period.as_millis() as u64, "Health daemon task started");

            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !enabled.load(Ordering::SeqCst) {
                            continue;
                        }
                        let Some(target) = target.upgrade() else {
                            break;
                        };
                        ticks.fetch_add(1, Ordering::Relaxed);
                        target.health_tick().await;
                    }
                    _ = restart.notified() => {
                        interval.reset();
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }

            debug!("Health daemon task stopped");
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Enables the daemon; the next tick fires one full period from now.
    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            self.restart.notify_one();
            info!(interval_ms = self.interval.as_millis() as u64, "Health daemon started");
        }
    }

    /// Disables the daemon without ending its task.
    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("Health daemon stopped");
        }
    }

    /// Ends the daemon task.
    pub fn terminate(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }

    /// Returns `true` while ticks are acted on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns `true` while the timer task exists.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Returns the tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of enabled ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for HealthDaemon {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for HealthDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthDaemon")
            .field("interval", &self.interval)
            .field("enabled", &self.is_enabled())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTarget {
        calls: AtomicU64,
    }

    #[async_trait]
    impl HealthTarget for CountingTarget {
        async fn health_tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn target() -> Arc<CountingTarget> {
        Arc::new(CountingTarget {
            calls: AtomicU64::new(0),
        })
    }

    fn spawn_for(daemon: &HealthDaemon, target: &Arc<CountingTarget>) {
        let as_dyn: Arc<dyn HealthTarget> = target.clone();
        daemon.spawn(Arc::downgrade(&as_dyn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_daemon_does_not_tick() {
        let daemon = HealthDaemon::new(Duration::from_secs(5));
        let target = target();
        spawn_for(&daemon, &target);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);
        assert!(daemon.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_daemon_ticks_every_interval() {
        let daemon = HealthDaemon::new(Duration::from_secs(5));
        let target = target();
        spawn_for(&daemon, &target);
        daemon.start();

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 3);
        assert_eq!(daemon.ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_terminate() {
        let daemon = HealthDaemon::new(Duration::from_secs(1));
        let target = target();
        spawn_for(&daemon, &target);
        daemon.start();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);

        daemon.stop();
        assert!(!daemon.is_enabled());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);

        daemon.terminate();
        tokio::task::yield_now().await;
        assert!(!daemon.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_target_ends_task() {
        let daemon = HealthDaemon::new(Duration::from_secs(1));
        let target = target();
        spawn_for(&daemon, &target);
        daemon.start();
        drop(target);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!daemon.is_running());
    }
}
