// src/cycle.rs
//! Auto-cycle driver: one repeating timer that walks a URL list.
//!
//! The driver only owns the timer. What a tick does (apply to viewers,
//! honour a manual selection) is decided by the tick closure, which can end
//! the cycle by returning `TickControl::Stop`.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

struct Running {
    // dropping the sender is the stop signal
    _stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct AutoCycle {
    running: Mutex<Option<Running>>,
}

impl AutoCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CycleState {
        match &*self.running.lock() {
            Some(run) if !run.handle.is_finished() => CycleState::Running,
            _ => CycleState::Idle,
        }
    }

    /// Start cycling `urls`, replacing any active cycle. The first tick fires
    /// one `interval` after the call. Returns false (and stays Idle) for an
    /// empty list, a zero interval, or when called outside a tokio runtime.
    pub fn start<F, Fut>(&self, urls: Vec<String>, interval: Duration, mut tick: F) -> bool
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = TickControl> + Send + 'static,
    {
        self.stop();

        if urls.is_empty() {
            log::debug!("auto-cycle: nothing to cycle");
            return false;
        }
        if interval.is_zero() {
            log::warn!("auto-cycle: zero interval refused");
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("auto-cycle: no runtime: {}", e);
                return false;
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let count = urls.len();
        log::info!("auto-cycle: {} patterns every {:?}", count, interval);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut index = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }
                let url = urls[index].clone();
                index = (index + 1) % count;
                if tick(url).await == TickControl::Stop {
                    log::info!("auto-cycle: stopped by tick");
                    break;
                }
            }
        });

        *self.running.lock() = Some(Running {
            _stop: stop_tx,
            handle,
        });
        true
    }

    /// Cancel the timer. A tick already in progress finishes; nothing is
    /// undone. Returns whether a cycle was active.
    pub fn stop(&self) -> bool {
        let previous = self.running.lock().take();
        match previous {
            Some(run) => {
                let was_running = !run.handle.is_finished();
                if was_running {
                    log::debug!("auto-cycle: stopping");
                }
                was_running
            }
            None => false,
        }
    }
}

impl Drop for AutoCycle {
    fn drop(&mut self) {
        self.stop();
    }
}
