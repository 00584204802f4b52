// src/functions/metrics.rs

//! Best-effort peak memory of a handler process.
//!
//! The child is polled on a tokio interval, so short spikes between samples
//! are missed. A pid that cannot be inspected simply yields `None`.

use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// Background sampler for one child process.
pub struct PeakMemory {
    done: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

impl PeakMemory {
    pub fn sample(pid: u32) -> Self {
        let (done, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            let pid = Pid::from_u32(pid);
            let mut system = System::new();
            let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
            let mut peak = 0u64;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        if !system.refresh_process(pid) {
                            break;
                        }
                        match system.process(pid) {
                            Some(p) => peak = peak.max(p.memory()),
                            None => break,
                        }
                    }
                }
            }
            peak
        });

        Self { done, task }
    }

    /// Stop sampling; returns the peak RSS in KB if anything was observed.
    pub async fn finish(self) -> Option<u64> {
        let _ = self.done.send(());
        let peak = self.task.await.unwrap_or(0);
        (peak > 0).then_some(peak / 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn samples_own_process() {
        let sampler = PeakMemory::sample(std::process::id());
        tokio::time::sleep(SAMPLE_INTERVAL * 3).await;
        assert!(sampler.finish().await.is_some());
    }

    #[tokio::test]
    async fn unknown_pid_yields_none() {
        let sampler = PeakMemory::sample(u32::MAX - 1);
        tokio::time::sleep(SAMPLE_INTERVAL * 2).await;
        assert_eq!(sampler.finish().await, None);
    }
}
