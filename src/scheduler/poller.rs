use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::action::Action;

/// Fixed-interval source of `RefreshServices`. Overlapping refreshes join
/// the running job, so a slow Docker daemon never piles up requests.
pub struct ServicePoller {
    interval: Duration,
    handle: JoinHandle<()>,
}

impl ServicePoller {
    pub fn spawn(sink: mpsc::UnboundedSender<Action>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if sink.send(Action::RefreshServices).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("Polling services every {:?}", interval);
        Self { interval, handle }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for ServicePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_send_refresh_until_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = ServicePoller::spawn(tx, Duration::from_millis(10));
        assert_eq!(poller.interval(), Duration::from_millis(10));

        for _ in 0..2 {
            assert_eq!(rx.recv().await, Some(Action::RefreshServices));
        }

        drop(poller);
        let closed = tokio::time::timeout(Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "sender should close once the poller is dropped");
    }
}
